use linked_hash_map::LinkedHashMap;
use log::debug;

use super::table::Table;
use crate::query::executor::result::{QueryError, QueryResult, Row};

/// The Catalog is the registry of every live table, keyed by name
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    tables: LinkedHashMap<String, Table>,
}

impl Catalog {
    pub fn new() -> Self {
        Catalog {
            tables: LinkedHashMap::new(),
        }
    }

    /// Build a catalog seeded with tables that have no declared columns
    pub fn from_tables<I, S>(tables: I) -> Self
    where
        I: IntoIterator<Item = (S, Vec<Row>)>,
        S: Into<String>,
    {
        let mut catalog = Catalog::new();
        for (name, rows) in tables {
            let name = name.into();
            catalog.tables.insert(name.clone(), Table::with_rows(name, rows));
        }
        catalog
    }

    pub fn create_table(&mut self, table: Table) -> QueryResult<()> {
        if self.tables.contains_key(table.name()) {
            return Err(QueryError::TableExists(table.name().to_string()));
        }
        debug!("Creating table '{}' with columns {:?}", table.name(), table.declared_columns());
        self.tables.insert(table.name().to_string(), table);
        Ok(())
    }

    pub fn drop_table(&mut self, table_name: &str) -> QueryResult<Table> {
        debug!("Dropping table '{}'", table_name);
        self.tables
            .remove(table_name)
            .ok_or_else(|| QueryError::UnknownTable(table_name.to_string()))
    }

    pub fn table_exists(&self, table_name: &str) -> bool {
        self.tables.contains_key(table_name)
    }

    pub fn get_table(&self, table_name: &str) -> Option<&Table> {
        self.tables.get(table_name)
    }

    pub fn get_table_mut(&mut self, table_name: &str) -> Option<&mut Table> {
        self.tables.get_mut(table_name)
    }

    /// Table names in creation order
    pub fn table_names(&self) -> Vec<String> {
        self.tables.keys().cloned().collect()
    }
}

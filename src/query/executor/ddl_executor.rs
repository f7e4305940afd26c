// Data Definition Language Executor
//
// This module handles execution of DDL statements: CREATE TABLE and DROP TABLE.

use std::sync::Arc;

use log::debug;
use parking_lot::RwLock;

use crate::catalog::{Catalog, Table};
use crate::query::ast::{CreateStatement, DropStatement};
use crate::query::executor::result::QueryResult;

/// Handles execution of DDL operations
pub struct DdlExecutor {
    catalog: Arc<RwLock<Catalog>>,
}

impl DdlExecutor {
    pub fn new(catalog: Arc<RwLock<Catalog>>) -> Self {
        DdlExecutor { catalog }
    }

    /// Register a new empty table. Returns the number of affected rows,
    /// which is always 0.
    pub fn execute_create(&self, create: &CreateStatement) -> QueryResult<usize> {
        let mut catalog = self.catalog.write();

        if create.if_not_exists && catalog.table_exists(&create.table_name) {
            debug!("Table '{}' already exists, skipping CREATE", create.table_name);
            return Ok(0);
        }

        let columns = create.columns.iter().map(|col| col.name.clone()).collect();
        catalog.create_table(Table::new(create.table_name.clone(), columns))?;
        Ok(0)
    }

    pub fn execute_drop(&self, drop: &DropStatement) -> QueryResult<usize> {
        let mut catalog = self.catalog.write();

        if drop.if_exists && !catalog.table_exists(&drop.table_name) {
            debug!("Table '{}' does not exist, skipping DROP", drop.table_name);
            return Ok(0);
        }

        catalog.drop_table(&drop.table_name)?;
        Ok(0)
    }
}

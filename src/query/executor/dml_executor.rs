// Data Manipulation Language Executor
//
// This module handles execution of DML statements like INSERT, UPDATE, DELETE.
// INSERT and DELETE compute their full effect before touching the table.
// UPDATE writes each row back as soon as it is computed, so later rows of the
// same statement see earlier updates; on failure the table is restored from a
// snapshot taken before the first write.

use log::debug;

use crate::query::ast::{DeleteStatement, Expression, InsertStatement, TableExpr, UpdateStatement};
use crate::query::executor::engine::Engine;
use crate::query::executor::result::{DataValue, QueryError, QueryResult, Row};
use crate::query::executor::scope::Scope;

/// Handles execution of DML operations
pub struct DmlExecutor<'e> {
    engine: &'e Engine,
}

impl<'e> DmlExecutor<'e> {
    pub fn new(engine: &'e Engine) -> Self {
        DmlExecutor { engine }
    }

    /// Append the rows produced by the statement's source. Returns the number
    /// of inserted rows.
    pub fn execute_insert(&self, insert: &InsertStatement) -> QueryResult<usize> {
        let declared = self.declared_columns(&insert.table_name)?;

        // The source may read the target table, so drain it before appending
        let produced: Vec<Row> = self
            .engine
            .iterate(Scope::new(), &insert.source)
            .map(|item| item.map(|(_, scope)| scope.into_last_row()))
            .collect::<QueryResult<_>>()?;

        let target_columns = match &insert.columns {
            Some(columns) => Some(columns.clone()),
            None if !declared.is_empty() => Some(declared.clone()),
            None => None,
        };

        let rows = match target_columns {
            Some(columns) => {
                if !declared.is_empty() {
                    if let Some(unknown) = columns.iter().find(|col| !declared.contains(col)) {
                        return Err(QueryError::ColumnNotFound(unknown.clone()));
                    }
                }
                produced
                    .into_iter()
                    .map(|row| remap(row, &columns, &declared))
                    .collect::<QueryResult<Vec<_>>>()?
            }
            None => produced,
        };

        let count = rows.len();
        let mut catalog = self.engine.catalog.write();
        let table = catalog
            .get_table_mut(&insert.table_name)
            .ok_or_else(|| QueryError::UnknownTable(insert.table_name.clone()))?;
        table.insert_all(rows);

        debug!("Inserted {} rows into '{}'", count, insert.table_name);
        Ok(count)
    }

    /// Update matching rows in place. Returns the number of updated rows.
    pub fn execute_update(&self, update: &UpdateStatement) -> QueryResult<usize> {
        let declared = self.declared_columns(&update.table_name)?;
        if !declared.is_empty() {
            if let Some(assignment) = update
                .assignments
                .iter()
                .find(|assignment| !declared.contains(&assignment.column))
            {
                return Err(QueryError::ColumnNotFound(assignment.column.clone()));
            }
        }

        let snapshot = self.table_rows(&update.table_name)?;

        match self.apply_update(update) {
            Ok(count) => {
                debug!("Updated {} rows in '{}'", count, update.table_name);
                Ok(count)
            }
            Err(err) => {
                if let Some(table) = self.engine.catalog.write().get_table_mut(&update.table_name) {
                    table.replace_rows(snapshot);
                }
                Err(err)
            }
        }
    }

    fn apply_update(&self, update: &UpdateStatement) -> QueryResult<usize> {
        let binding = update.alias.clone().unwrap_or_else(|| update.table_name.clone());
        let mut updated = 0;
        let mut position = 0;

        // Rows are re-read on every step so an updated row is what later
        // rows see
        while let Some(row) = self.live_row(&update.table_name, position)? {
            let scope = Scope::new().bind(Some(binding.clone()), row);

            if let Some(scope) = self.first_match(scope, &update.from, update.where_clause.as_ref())? {
                let values = update
                    .assignments
                    .iter()
                    .map(|assignment| -> QueryResult<(String, DataValue)> {
                        let value = self.engine.evaluate(&scope, &assignment.value)?;
                        Ok((assignment.column.clone(), value))
                    })
                    .collect::<QueryResult<Vec<_>>>()?;

                let mut catalog = self.engine.catalog.write();
                let row = catalog
                    .get_table_mut(&update.table_name)
                    .and_then(|table| table.row_mut(position))
                    .ok_or_else(|| QueryError::UnknownTable(update.table_name.clone()))?;
                for (column, value) in values {
                    row.set(column, value);
                }
                updated += 1;
            }

            position += 1;
        }

        Ok(updated)
    }

    /// The first combination of `from` sources on top of `scope` that
    /// satisfies `predicate`
    fn first_match<'a>(
        &'a self,
        scope: Scope<'a>,
        from: &'a [TableExpr],
        predicate: Option<&'a Expression>,
    ) -> QueryResult<Option<Scope<'a>>> {
        for item in self.engine.iterate_list(scope, from) {
            let (_, scope) = item?;
            if self.matches(&scope, predicate)? {
                return Ok(Some(scope));
            }
        }
        Ok(None)
    }

    /// Remove matching rows. Returns the number of deleted rows.
    pub fn execute_delete(&self, delete: &DeleteStatement) -> QueryResult<usize> {
        self.declared_columns(&delete.table_name)?;

        let binding = Some(delete.table_name.clone());
        let mut positions = Vec::new();
        let mut position = 0;
        while let Some(row) = self.live_row(&delete.table_name, position)? {
            let scope = Scope::new().bind(binding.clone(), row);
            if self.matches(&scope, delete.where_clause.as_ref())? {
                positions.push(position);
            }
            position += 1;
        }

        let mut catalog = self.engine.catalog.write();
        let table = catalog
            .get_table_mut(&delete.table_name)
            .ok_or_else(|| QueryError::UnknownTable(delete.table_name.clone()))?;
        let count = table.remove_rows(&positions);

        debug!("Deleted {} rows from '{}'", count, delete.table_name);
        Ok(count)
    }

    fn matches(&self, scope: &Scope<'_>, predicate: Option<&Expression>) -> QueryResult<bool> {
        match predicate {
            Some(predicate) => Ok(self.engine.evaluate(scope, predicate)?.is_truthy()),
            None => Ok(true),
        }
    }

    /// Declared columns of the target table; fails when it does not exist
    fn declared_columns(&self, table_name: &str) -> QueryResult<Vec<String>> {
        self.engine
            .catalog
            .read()
            .get_table(table_name)
            .map(|table| table.declared_columns().to_vec())
            .ok_or_else(|| QueryError::UnknownTable(table_name.to_string()))
    }

    fn table_rows(&self, table_name: &str) -> QueryResult<Vec<Row>> {
        self.engine
            .catalog
            .read()
            .get_table(table_name)
            .map(|table| table.rows().to_vec())
            .ok_or_else(|| QueryError::UnknownTable(table_name.to_string()))
    }

    fn live_row(&self, table_name: &str, position: usize) -> QueryResult<Option<Row>> {
        let catalog = self.engine.catalog.read();
        let table = catalog
            .get_table(table_name)
            .ok_or_else(|| QueryError::UnknownTable(table_name.to_string()))?;
        Ok(table.row(position).cloned())
    }
}

/// Key a produced row's values, in order, by `columns`. Declared columns the
/// statement did not name are filled with NULL.
fn remap(row: Row, columns: &[String], declared: &[String]) -> QueryResult<Row> {
    if row.len() != columns.len() {
        return Err(QueryError::DimensionMismatch {
            expected: columns.len(),
            actual: row.len(),
        });
    }

    let named = Row::from_values(columns.to_vec(), row.into_values());
    if declared.is_empty() {
        return Ok(named);
    }

    let mut full = Row::new();
    for col in declared {
        full.set(col.clone(), named.get(col).cloned().unwrap_or(DataValue::Null));
    }
    Ok(full)
}

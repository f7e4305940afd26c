//! Table Management Module
//!
//! This module defines the Table type: a named, insertion-ordered collection
//! of rows with an optional declared column list.

use serde::Serialize;

use crate::query::executor::result::Row;

/// Represents an in-memory table
#[derive(Debug, Clone, Default, Serialize)]
pub struct Table {
    /// Table name
    name: String,
    /// Columns declared by CREATE TABLE, empty when the table was seeded
    /// directly
    columns: Vec<String>,
    /// Rows in insertion order
    rows: Vec<Row>,
}

impl Table {
    /// Create a new empty table with the given name and columns
    pub fn new(name: String, columns: Vec<String>) -> Self {
        Table {
            name,
            columns,
            rows: Vec::new(),
        }
    }

    /// Create a table without declared columns holding `rows`
    pub fn with_rows(name: String, rows: Vec<Row>) -> Self {
        Table {
            name,
            columns: Vec::new(),
            rows,
        }
    }

    /// Get the table name
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn declared_columns(&self) -> &[String] {
        &self.columns
    }

    /// Declared columns, or the columns of the first row when none were
    /// declared
    pub fn columns(&self) -> Vec<String> {
        if !self.columns.is_empty() {
            return self.columns.clone();
        }
        self.rows
            .first()
            .map(|row| row.columns().cloned().collect())
            .unwrap_or_default()
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn row(&self, index: usize) -> Option<&Row> {
        self.rows.get(index)
    }

    pub fn row_mut(&mut self, index: usize) -> Option<&mut Row> {
        self.rows.get_mut(index)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Append a row
    pub fn insert(&mut self, row: Row) {
        self.rows.push(row);
    }

    pub fn insert_all(&mut self, rows: impl IntoIterator<Item = Row>) {
        self.rows.extend(rows);
    }

    /// Remove the rows at the given positions. Positions refer to the table
    /// before any removal.
    pub fn remove_rows(&mut self, positions: &[usize]) -> usize {
        let before = self.rows.len();
        let mut index = 0;
        self.rows.retain(|_| {
            let keep = !positions.contains(&index);
            index += 1;
            keep
        });
        before - self.rows.len()
    }

    /// Replace every row, used to restore a snapshot
    pub fn replace_rows(&mut self, rows: Vec<Row>) {
        self.rows = rows;
    }
}

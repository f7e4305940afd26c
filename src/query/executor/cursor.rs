// Cursor Implementation
//
// Forward-only result fetching over the engine, in the shape of a
// conventional database cursor.

use crate::query::ast::Statement;
use crate::query::executor::engine::{Engine, Execution};
use crate::query::executor::result::{ColumnDescription, QueryResult, Row};
use crate::query::executor::source::RowStream;

pub struct Cursor<'a> {
    engine: &'a Engine,
    rows: Option<RowStream<'a>>,
    description: Vec<ColumnDescription>,
    rowcount: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(engine: &'a Engine) -> Self {
        Cursor {
            engine,
            rows: None,
            description: Vec::new(),
            rowcount: 0,
        }
    }

    /// Execute a statement. A SELECT is bound lazily and nothing is read
    /// until a fetch; any other statement runs to completion and sets
    /// `rowcount` to the number of affected rows.
    pub fn execute(&mut self, statement: &'a Statement) -> QueryResult<()> {
        self.reset();
        match self.engine.execute(statement)? {
            Execution::Rows(rows) => self.rows = Some(rows),
            Execution::Affected(count) => self.rowcount = count,
        }
        Ok(())
    }

    /// Pull the next row, or `None` once the result is exhausted
    pub fn fetchone(&mut self) -> QueryResult<Option<Row>> {
        let Some(rows) = self.rows.as_mut() else {
            return Ok(None);
        };

        match rows.next() {
            Some(Ok(row)) => {
                self.rowcount += 1;
                self.description = row.describe();
                Ok(Some(row))
            }
            Some(Err(err)) => {
                self.reset();
                Err(err)
            }
            None => {
                self.reset();
                Ok(None)
            }
        }
    }

    /// Up to `size` more rows
    pub fn fetchmany(&mut self, size: usize) -> QueryResult<Vec<Row>> {
        let mut rows = Vec::with_capacity(size);
        while rows.len() < size {
            match self.fetchone()? {
                Some(row) => rows.push(row),
                None => break,
            }
        }
        Ok(rows)
    }

    /// Every remaining row
    pub fn fetchall(&mut self) -> QueryResult<Vec<Row>> {
        let mut rows = Vec::new();
        while let Some(row) = self.fetchone()? {
            rows.push(row);
        }
        Ok(rows)
    }

    /// Columns of the most recently fetched row; empty when no row is current
    pub fn description(&self) -> &[ColumnDescription] {
        &self.description
    }

    /// Rows fetched so far from a SELECT, or rows affected by the last DML
    /// statement
    pub fn rowcount(&self) -> usize {
        self.rowcount
    }

    fn reset(&mut self) {
        self.rows = None;
        self.description.clear();
        self.rowcount = 0;
    }
}

impl Iterator for Cursor<'_> {
    type Item = QueryResult<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        self.fetchone().transpose()
    }
}

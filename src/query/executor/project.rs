// Row Materializer
//
// Turns a scope into an output row according to a projection list.

use crate::query::ast::{Expression, Projection};
use crate::query::executor::engine::Engine;
use crate::query::executor::result::{QueryError, QueryResult, Row};
use crate::query::executor::scope::Scope;

impl Engine {
    /// Build the output row of one SELECT core. Later items never overwrite
    /// a column an earlier item already wrote.
    pub fn project(&self, scope: &Scope<'_>, projection: &[Projection]) -> QueryResult<Row> {
        let mut row = Row::new();

        for (index, item) in projection.iter().enumerate() {
            match item {
                Projection::Column(col) => {
                    if row.contains_column(&col.name) {
                        continue;
                    }
                    let value = self.evaluate(scope, &Expression::Column(col.clone()))?;
                    row.set(col.name.clone(), value);
                }
                Projection::Alias { expr, alias } => {
                    if row.contains_column(alias) {
                        continue;
                    }
                    let value = self.evaluate(scope, expr)?;
                    row.set(alias.clone(), value);
                }
                Projection::Expression(expr) => {
                    let key = index.to_string();
                    if row.contains_column(&key) {
                        continue;
                    }
                    let value = self.evaluate(scope, expr)?;
                    row.set(key, value);
                }
                Projection::All(qualifier) => expand_wildcard(scope, qualifier.as_deref(), &mut row)?,
            }
        }

        Ok(row)
    }

    /// Row of one VALUES tuple, keyed by position
    pub fn materialize_values(&self, scope: &Scope<'_>, exprs: &[Expression]) -> QueryResult<Row> {
        let mut row = Row::new();
        for (index, expr) in exprs.iter().enumerate() {
            row.set(index.to_string(), self.evaluate(scope, expr)?);
        }
        Ok(row)
    }
}

/// Copy every column of the current query level's bindings, or of the
/// bindings named `qualifier`, into `row`
fn expand_wildcard(scope: &Scope<'_>, qualifier: Option<&str>, row: &mut Row) -> QueryResult<()> {
    let mut found = qualifier.is_none();

    for binding in scope.frame() {
        if let Some(qualifier) = qualifier {
            if binding.name.as_deref() != Some(qualifier) {
                continue;
            }
            found = true;
        }
        for (col, value) in binding.row.iter() {
            if !row.contains_column(col) {
                row.set(col.clone(), value.clone());
            }
        }
    }

    match (found, qualifier) {
        (false, Some(qualifier)) => Err(QueryError::UnknownTable(qualifier.to_string())),
        _ => Ok(()),
    }
}

// Common Table Expressions
//
// A CTE is materialized on demand by a fixpoint driver. The defining query
// runs once with the CTE bound to no rows; after that only its recursive
// branch is re-run, each time against the rows the previous round produced,
// until a round produces nothing new.

use std::collections::HashSet;
use std::rc::Rc;

use log::{debug, trace};
use once_cell::unsync::OnceCell;

use crate::query::ast::{CommonTableExpr, SelectStatement, SetOperator, TableExpr};
use crate::query::executor::engine::Engine;
use crate::query::executor::result::{QueryError, QueryResult, Row, RowKey};
use crate::query::executor::scope::Scope;
use crate::query::executor::source::RowStream;

/// What a CTE name resolves to inside a scope
#[derive(Debug, Clone)]
pub enum CteEntry<'a> {
    /// Registered by a WITH clause, materialized when first iterated
    Deferred(Rc<CommonTable<'a>>),
    /// Rows produced by the previous fixpoint round
    Working { columns: Vec<String>, rows: Rc<Vec<Row>> },
}

impl CteEntry<'_> {
    pub fn columns(&self) -> Vec<String> {
        match self {
            CteEntry::Deferred(table) => table.columns(),
            CteEntry::Working { columns, rows } => {
                if !columns.is_empty() {
                    return columns.clone();
                }
                rows.first()
                    .map(|row| row.columns().cloned().collect())
                    .unwrap_or_default()
            }
        }
    }
}

/// A named query from a WITH clause
#[derive(Debug)]
pub struct CommonTable<'a> {
    name: &'a str,
    columns: &'a [String],
    query: &'a SelectStatement,
    /// Side of a top-level set operation that refers back to the CTE,
    /// decided once at registration
    recursive_branch: Option<&'a TableExpr>,
    /// Drop rows already produced by an earlier round
    distinct: bool,
    /// Scope the CTE was registered in, holding the earlier CTEs of the
    /// same WITH clause
    outer: Scope<'a>,
    materialized: OnceCell<Rc<Vec<Row>>>,
}

impl<'a> CommonTable<'a> {
    pub fn new(definition: &'a CommonTableExpr, outer: Scope<'a>) -> Self {
        let name = definition.name.as_str();
        let (recursive_branch, distinct) = match &definition.query.body {
            TableExpr::SetOperation { op, left, right } => {
                let branch = if right.references_table(name) {
                    Some(right.as_ref())
                } else if left.references_table(name) {
                    Some(left.as_ref())
                } else {
                    None
                };
                (branch, *op != SetOperator::UnionAll)
            }
            _ => (None, false),
        };

        CommonTable {
            name,
            columns: &definition.columns,
            query: &definition.query,
            recursive_branch,
            distinct,
            outer,
            materialized: OnceCell::new(),
        }
    }

    pub fn name(&self) -> &str {
        self.name
    }

    pub fn is_recursive(&self) -> bool {
        self.recursive_branch.is_some()
    }

    /// Declared columns, or the columns of the first materialized row
    pub fn columns(&self) -> Vec<String> {
        if !self.columns.is_empty() {
            return self.columns.to_vec();
        }
        self.materialized
            .get()
            .and_then(|rows| rows.first())
            .map(|row| row.columns().cloned().collect())
            .unwrap_or_default()
    }

    /// Stream the CTE's rows. The first complete iteration is cached for
    /// the rest of the statement.
    pub fn rows(self: &Rc<Self>, engine: &'a Engine) -> RowStream<'a> {
        match self.materialized.get() {
            Some(rows) => {
                let rows = Rc::clone(rows);
                Box::new((0..rows.len()).map(move |index| Ok(rows[index].clone())))
            }
            None => Box::new(Fixpoint::new(engine, Rc::clone(self))),
        }
    }

    /// Key a produced row positionally by `columns`. Rows pass through
    /// unchanged until the column names are known.
    fn shape(columns: &[String], row: Row) -> QueryResult<Row> {
        if columns.is_empty() {
            return Ok(row);
        }
        if row.len() != columns.len() {
            return Err(QueryError::DimensionMismatch {
                expected: columns.len(),
                actual: row.len(),
            });
        }
        Ok(Row::from_values(columns.to_vec(), row.into_values()))
    }

    /// One evaluation round. The first round runs the whole defining query;
    /// later rounds run only the recursive branch.
    fn pass(&self, engine: &'a Engine, columns: &[String], working: Rc<Vec<Row>>, first: bool) -> RowStream<'a> {
        let mut scope = self.outer.clone();
        if self.is_recursive() {
            scope = scope.with_cte(
                self.name,
                CteEntry::Working {
                    columns: columns.to_vec(),
                    rows: working,
                },
            );
        }

        match (first, self.recursive_branch) {
            (false, Some(branch)) => {
                let scope = engine.register_ctes(scope, self.query.with.as_ref());
                Box::new(
                    engine
                        .iterate(scope, branch)
                        .map(|item| item.map(|(_, scope)| scope.into_last_row())),
                )
            }
            _ => engine.select(scope, self.query),
        }
    }
}

/// Fixpoint driver: yields rows as rounds produce them
struct Fixpoint<'a> {
    engine: &'a Engine,
    table: Rc<CommonTable<'a>>,
    /// Declared columns, or the columns of the first produced row
    columns: Vec<String>,
    pass: Option<RowStream<'a>>,
    round: usize,
    /// Rows of the current round, the working set of the next
    produced: Vec<Row>,
    seen: HashSet<RowKey>,
    all: Vec<Row>,
    done: bool,
}

impl<'a> Fixpoint<'a> {
    fn new(engine: &'a Engine, table: Rc<CommonTable<'a>>) -> Self {
        let columns = table.columns.to_vec();
        let pass = table.pass(engine, &columns, Rc::new(Vec::new()), true);
        Fixpoint {
            engine,
            table,
            columns,
            pass: Some(pass),
            round: 1,
            produced: Vec::new(),
            seen: HashSet::new(),
            all: Vec::new(),
            done: false,
        }
    }

    fn next_round(&mut self) -> QueryResult<Option<RowStream<'a>>> {
        if self.produced.is_empty() || !self.table.is_recursive() {
            return Ok(None);
        }
        if let Some(limit) = self.engine.config().max_recursion_rounds {
            if self.round >= limit {
                return Err(QueryError::RecursionNonTermination {
                    name: self.table.name().to_string(),
                    rounds: limit,
                });
            }
        }

        self.round += 1;
        trace!(
            "CTE '{}' round {} over {} working rows",
            self.table.name(),
            self.round,
            self.produced.len()
        );
        let working = Rc::new(std::mem::take(&mut self.produced));
        Ok(Some(self.table.pass(self.engine, &self.columns, working, false)))
    }

    fn finish(&mut self) {
        self.done = true;
        debug!(
            "CTE '{}' reached a fixpoint after {} rounds with {} rows",
            self.table.name(),
            self.round,
            self.all.len()
        );
        // Another iteration of the same CTE may have finished first
        let _ = self.table.materialized.set(Rc::new(std::mem::take(&mut self.all)));
    }

    fn fail(&mut self, err: QueryError) -> Option<QueryResult<Row>> {
        self.done = true;
        self.pass = None;
        Some(Err(err))
    }
}

impl Iterator for Fixpoint<'_> {
    type Item = QueryResult<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            let item = match self.pass.as_mut() {
                Some(pass) => pass.next(),
                None => None,
            };

            match item {
                Some(Ok(row)) => {
                    if self.columns.is_empty() {
                        self.columns = row.columns().cloned().collect();
                    }
                    let row = match CommonTable::shape(&self.columns, row) {
                        Ok(row) => row,
                        Err(err) => return self.fail(err),
                    };
                    if self.table.distinct && !self.seen.insert(row.key()) {
                        continue;
                    }
                    self.produced.push(row.clone());
                    self.all.push(row.clone());
                    return Some(Ok(row));
                }
                Some(Err(err)) => return self.fail(err),
                None => match self.next_round() {
                    Ok(Some(pass)) => self.pass = Some(pass),
                    Ok(None) => {
                        self.pass = None;
                        self.finish();
                    }
                    Err(err) => return self.fail(err),
                },
            }
        }
        None
    }
}

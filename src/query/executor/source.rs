// Table Source Iterator
//
// Expands one FROM-clause node into a lazy stream of `(binding name, scope)`
// pairs. Every stream is single-pass and produces items only when pulled;
// ordering is the left-to-right, depth-first order of the AST.

use std::collections::HashSet;
use std::iter;

use crate::common::types::BindingName;
use crate::query::ast::{JoinConstraint, JoinKind, Projection, SelectCore, SetOperator, TableExpr};
use crate::query::executor::cte::CteEntry;
use crate::query::executor::engine::Engine;
use crate::query::executor::join::NestedLoopJoin;
use crate::query::executor::result::{QueryError, QueryResult, Row, RowKey};
use crate::query::executor::scope::Scope;

/// A scope produced by one table-source step, with the name of the binding
/// that step added
pub type Bound<'a> = (BindingName, Scope<'a>);

pub type ScopeStream<'a> = Box<dyn Iterator<Item = QueryResult<Bound<'a>>> + 'a>;

pub type RowStream<'a> = Box<dyn Iterator<Item = QueryResult<Row>> + 'a>;

/// Binding names and columns a source adds to a scope, used to build the
/// NULL side of an outer join
pub type Shape = Vec<(BindingName, Vec<String>)>;

pub(crate) fn fail<'a, T: 'a>(err: QueryError) -> Box<dyn Iterator<Item = QueryResult<T>> + 'a> {
    Box::new(iter::once(Err(err)))
}

/// Key of the row a set-operation operand produced
fn produced_key(scope: &Scope<'_>) -> RowKey {
    scope.last().map(|binding| binding.row.key()).unwrap_or_default()
}

impl Engine {
    /// Iterate one table reference against `scope`
    pub fn iterate<'a>(&'a self, scope: Scope<'a>, node: &'a TableExpr) -> ScopeStream<'a> {
        match node {
            TableExpr::Table(name) => self.iterate_table(scope, name),
            // No indexes: the hint is ignored
            TableExpr::Indexed { table, .. } => self.iterate_table(scope, table),
            TableExpr::Alias { source, alias } => {
                let start = scope.len();
                Box::new(self.iterate(scope, source).map(move |item| {
                    let (_, mut scope) = item?;
                    scope.alias_from(start, alias);
                    Ok((Some(alias.clone()), scope))
                }))
            }
            TableExpr::Values(rows) => Box::new(rows.iter().map(move |exprs| {
                let row = self.materialize_values(&scope, exprs)?;
                Ok((None, scope.bind(None, row)))
            })),
            TableExpr::Select(select) => {
                let parent = scope.clone();
                Box::new(
                    self.select(scope, select)
                        .map(move |row| Ok((None, parent.bind(None, row?)))),
                )
            }
            TableExpr::Core(core) => self.iterate_core(scope, core),
            TableExpr::List(items) => self.iterate_list(scope, items),
            TableExpr::Join { kind, left, right, constraint } => {
                if let JoinConstraint::Natural = constraint {
                    return fail(QueryError::UnsupportedJoinMethod(constraint.to_string()));
                }
                // CROSS JOIN with a predicate filters like an inner join
                let kind = if *kind == JoinKind::Cross { JoinKind::Inner } else { *kind };
                Box::new(NestedLoopJoin::new(self, scope, kind, left, right, constraint))
            }
            TableExpr::SetOperation { op, left, right } => self.iterate_set_operation(scope, *op, left, right),
        }
    }

    /// Nested-loop expansion of comma-separated references
    pub(crate) fn iterate_list<'a>(&'a self, scope: Scope<'a>, items: &'a [TableExpr]) -> ScopeStream<'a> {
        match items {
            [] => Box::new(iter::once(Ok((None, scope)))),
            [only] => self.iterate(scope, only),
            [first, rest @ ..] => Box::new(self.iterate(scope, first).flat_map(move |item| match item {
                Ok((_, scope)) => self.iterate_list(scope, rest),
                Err(err) => fail(err),
            })),
        }
    }

    fn iterate_table<'a>(&'a self, scope: Scope<'a>, name: &'a str) -> ScopeStream<'a> {
        let binding = Some(name.to_string());

        if self.catalog.read().table_exists(name) {
            // Read the live table one row at a time
            let mut position = 0;
            return Box::new(iter::from_fn(move || {
                let row = self
                    .catalog
                    .read()
                    .get_table(name)
                    .and_then(|table| table.row(position).cloned());
                position += 1;
                row.map(|row| Ok((binding.clone(), scope.bind(binding.clone(), row))))
            }));
        }

        match scope.cte(name).cloned() {
            Some(CteEntry::Working { rows, .. }) => Box::new(
                (0..rows.len()).map(move |index| Ok((binding.clone(), scope.bind(binding.clone(), rows[index].clone())))),
            ),
            Some(CteEntry::Deferred(table)) => Box::new(table.rows(self).map(move |row| {
                let row = row?;
                Ok((binding.clone(), scope.bind(binding.clone(), row)))
            })),
            None => fail(QueryError::UnknownTable(name.to_string())),
        }
    }

    /// FROM, WHERE, projection and DISTINCT of one SELECT core. Each result
    /// row is bound anonymously on top of `scope`.
    fn iterate_core<'a>(&'a self, scope: Scope<'a>, core: &'a SelectCore) -> ScopeStream<'a> {
        let parent = scope.clone();
        let sources = self.iterate_list(scope.new_frame(), &core.from);

        let filtered = sources.filter_map(move |item| {
            let (_, scope) = match item {
                Ok(bound) => bound,
                Err(err) => return Some(Err(err)),
            };
            match &core.where_clause {
                None => Some(Ok(scope)),
                Some(predicate) => match self.evaluate(&scope, predicate) {
                    Ok(value) if value.is_truthy() => Some(Ok(scope)),
                    Ok(_) => None,
                    Err(err) => Some(Err(err)),
                },
            }
        });

        let rows = filtered.map(move |scope| scope.and_then(|scope| self.project(&scope, &core.projection)));
        let rows: RowStream<'a> = if core.distinct {
            Box::new(distinct(rows))
        } else {
            Box::new(rows)
        };

        Box::new(rows.map(move |row| Ok((None, parent.bind(None, row?)))))
    }

    fn iterate_set_operation<'a>(
        &'a self,
        scope: Scope<'a>,
        op: SetOperator,
        left: &'a TableExpr,
        right: &'a TableExpr,
    ) -> ScopeStream<'a> {
        match op {
            SetOperator::UnionAll => {
                let right_scope = scope.clone();
                Box::new(
                    self.iterate(scope, left)
                        .chain(iter::once_with(move || self.iterate(right_scope, right)).flatten()),
                )
            }
            SetOperator::Union => {
                let right_scope = scope.clone();
                let mut seen = HashSet::new();
                Box::new(
                    self.iterate(scope, left)
                        .chain(iter::once_with(move || self.iterate(right_scope, right)).flatten())
                        .filter(move |item| match item {
                            Ok((_, scope)) => seen.insert(produced_key(scope)),
                            Err(_) => true,
                        }),
                )
            }
            SetOperator::Intersect => Box::new(
                iter::once_with(move || -> ScopeStream<'a> {
                    let left_keys = match self.collect_keys(scope.clone(), left) {
                        Ok(keys) => keys,
                        Err(err) => return fail(err),
                    };
                    let mut emitted = HashSet::new();
                    Box::new(self.iterate(scope, right).filter(move |item| match item {
                        Ok((_, scope)) => {
                            let key = produced_key(scope);
                            left_keys.contains(&key) && emitted.insert(key)
                        }
                        Err(_) => true,
                    }))
                })
                .flatten(),
            ),
            SetOperator::Except => Box::new(
                iter::once_with(move || -> ScopeStream<'a> {
                    let right_keys = match self.collect_keys(scope.clone(), right) {
                        Ok(keys) => keys,
                        Err(err) => return fail(err),
                    };
                    let mut emitted = HashSet::new();
                    Box::new(self.iterate(scope, left).filter(move |item| match item {
                        Ok((_, scope)) => {
                            let key = produced_key(scope);
                            !right_keys.contains(&key) && emitted.insert(key)
                        }
                        Err(_) => true,
                    }))
                })
                .flatten(),
            ),
        }
    }

    fn collect_keys<'a>(&'a self, scope: Scope<'a>, node: &'a TableExpr) -> QueryResult<HashSet<RowKey>> {
        self.iterate(scope, node)
            .map(|item| item.map(|(_, scope)| produced_key(&scope)))
            .collect()
    }

    /// Bindings `node` adds when iterated, without iterating it
    pub(crate) fn shape<'a>(&'a self, scope: &Scope<'a>, node: &'a TableExpr) -> QueryResult<Shape> {
        match node {
            TableExpr::Table(name) | TableExpr::Indexed { table: name, .. } => {
                if let Some(table) = self.catalog.read().get_table(name) {
                    return Ok(vec![(Some(name.clone()), table.columns())]);
                }
                match scope.cte(name) {
                    Some(entry) => Ok(vec![(Some(name.clone()), entry.columns())]),
                    None => Err(QueryError::UnknownTable(name.clone())),
                }
            }
            TableExpr::Alias { source, alias } => {
                let mut columns: Vec<String> = Vec::new();
                for (_, source_columns) in self.shape(scope, source)? {
                    for col in source_columns {
                        if !columns.contains(&col) {
                            columns.push(col);
                        }
                    }
                }
                Ok(vec![(Some(alias.clone()), columns)])
            }
            TableExpr::Values(rows) => {
                let width = rows.first().map_or(0, Vec::len);
                Ok(vec![(None, (0..width).map(|index| index.to_string()).collect())])
            }
            TableExpr::Select(select) => {
                let scope = self.register_ctes(scope.clone(), select.with.as_ref());
                self.shape(&scope, &select.body)
            }
            TableExpr::Core(core) => Ok(vec![(None, self.projection_columns(scope, core)?)]),
            TableExpr::List(items) => {
                let mut shape = Vec::new();
                for item in items {
                    shape.extend(self.shape(scope, item)?);
                }
                Ok(shape)
            }
            TableExpr::Join { left, right, .. } => {
                let mut shape = self.shape(scope, left)?;
                shape.extend(self.shape(scope, right)?);
                Ok(shape)
            }
            TableExpr::SetOperation { left, .. } => self.shape(scope, left),
        }
    }

    /// Column names a SELECT core's rows will carry
    fn projection_columns<'a>(&'a self, scope: &Scope<'a>, core: &'a SelectCore) -> QueryResult<Vec<String>> {
        fn push_unique(columns: &mut Vec<String>, name: &str) {
            if !columns.iter().any(|col| col == name) {
                columns.push(name.to_string());
            }
        }

        let mut columns = Vec::new();
        for (index, item) in core.projection.iter().enumerate() {
            match item {
                Projection::Column(col) => push_unique(&mut columns, &col.name),
                Projection::Alias { alias, .. } => push_unique(&mut columns, alias),
                Projection::Expression(_) => push_unique(&mut columns, &index.to_string()),
                Projection::All(qualifier) => {
                    for source in &core.from {
                        for (name, source_columns) in self.shape(scope, source)? {
                            if qualifier.is_some() && name.as_deref() != qualifier.as_deref() {
                                continue;
                            }
                            for col in &source_columns {
                                push_unique(&mut columns, col);
                            }
                        }
                    }
                }
            }
        }
        Ok(columns)
    }
}

/// Drop rows whose structural key was already seen, keeping first-seen order
fn distinct<'a>(rows: impl Iterator<Item = QueryResult<Row>> + 'a) -> impl Iterator<Item = QueryResult<Row>> + 'a {
    let mut seen = HashSet::new();
    rows.filter(move |row| match row {
        Ok(row) => seen.insert(row.key()),
        Err(_) => true,
    })
}

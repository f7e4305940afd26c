// Query Execution Engine Implementation
//
// This module implements the engine for executing statements against the
// in-memory catalog. SELECT produces a lazy row stream; every other statement
// runs to completion and reports the number of rows it affected.

use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use log::debug;
use parking_lot::RwLock;

use crate::catalog::Catalog;
use crate::common::types::EngineConfig;
use crate::query::ast::{Expression, SelectStatement, Statement, WithClause};
use crate::query::executor::cte::{CommonTable, CteEntry};
use crate::query::executor::cursor::Cursor;
use crate::query::executor::ddl_executor::DdlExecutor;
use crate::query::executor::dml_executor::DmlExecutor;
use crate::query::executor::expression_eval::{DefaultEvaluator, ExpressionEvaluator};
use crate::query::executor::result::{DataValue, QueryError, QueryResult, Row};
use crate::query::executor::scope::Scope;
use crate::query::executor::source::RowStream;

/// Outcome of executing one statement
pub enum Execution<'a> {
    /// Rows of a SELECT, produced as they are pulled
    Rows(RowStream<'a>),
    /// Rows touched by INSERT, UPDATE or DELETE; 0 for CREATE and DROP
    Affected(usize),
}

impl fmt::Debug for Execution<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Execution::Rows(_) => f.write_str("Rows(..)"),
            Execution::Affected(count) => write!(f, "Affected({})", count),
        }
    }
}

pub struct Engine {
    pub(crate) catalog: Arc<RwLock<Catalog>>,
    evaluator: Box<dyn ExpressionEvaluator>,
    config: EngineConfig,
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("catalog", &self.catalog)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Create an engine over a shared catalog with the default configuration
    pub fn new(catalog: Arc<RwLock<Catalog>>) -> Self {
        Self::with_config(catalog, EngineConfig::default())
    }

    /// Create an engine that owns `catalog`
    pub fn from_catalog(catalog: Catalog) -> Self {
        Self::new(Arc::new(RwLock::new(catalog)))
    }

    pub fn with_config(catalog: Arc<RwLock<Catalog>>, config: EngineConfig) -> Self {
        Self::with_evaluator(catalog, config, DefaultEvaluator)
    }

    /// Create an engine that hands expressions to a custom evaluator
    pub fn with_evaluator(
        catalog: Arc<RwLock<Catalog>>,
        config: EngineConfig,
        evaluator: impl ExpressionEvaluator + 'static,
    ) -> Self {
        Engine {
            catalog,
            evaluator: Box::new(evaluator),
            config,
        }
    }

    /// Shared handle to the table registry, for seeding and inspecting state
    pub fn catalog(&self) -> &Arc<RwLock<Catalog>> {
        &self.catalog
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn cursor(&self) -> Cursor<'_> {
        Cursor::new(self)
    }

    /// Evaluate a scalar expression in `scope`
    pub fn evaluate(&self, scope: &Scope<'_>, expr: &Expression) -> QueryResult<DataValue> {
        self.evaluator.evaluate(self, scope, expr)
    }

    /// Stream the rows of a SELECT evaluated inside `scope`. Rows are
    /// produced only as the stream is pulled.
    pub fn select<'a>(&'a self, scope: Scope<'a>, stmt: &'a SelectStatement) -> RowStream<'a> {
        let scope = self.register_ctes(scope, stmt.with.as_ref());
        Box::new(
            self.iterate(scope, &stmt.body)
                .map(|item| item.map(|(_, scope)| scope.into_last_row())),
        )
    }

    /// Run a SELECT to completion
    pub fn query(&self, stmt: &SelectStatement) -> QueryResult<Vec<Row>> {
        self.select(Scope::new(), stmt).collect()
    }

    /// Make the CTEs of a WITH clause visible in `scope`. Each CTE sees the
    /// ones declared before it.
    pub(crate) fn register_ctes<'a>(&self, mut scope: Scope<'a>, with: Option<&'a WithClause>) -> Scope<'a> {
        if let Some(with) = with {
            for cte in &with.tables {
                let table = CommonTable::new(cte, scope.clone());
                scope = scope.with_cte(&cte.name, CteEntry::Deferred(Rc::new(table)));
            }
        }
        scope
    }

    /// Execute one statement
    pub fn execute<'a>(&'a self, statement: &'a Statement) -> QueryResult<Execution<'a>> {
        debug!("Executing {}", statement);

        match statement {
            Statement::Select(select) => Ok(Execution::Rows(self.select(Scope::new(), select))),
            Statement::Create(create) => {
                let ddl_executor = DdlExecutor::new(self.catalog.clone());
                ddl_executor.execute_create(create).map(Execution::Affected)
            }
            Statement::Drop(drop) => {
                let ddl_executor = DdlExecutor::new(self.catalog.clone());
                ddl_executor.execute_drop(drop).map(Execution::Affected)
            }
            Statement::Insert(insert) => DmlExecutor::new(self).execute_insert(insert).map(Execution::Affected),
            Statement::Update(update) => DmlExecutor::new(self).execute_update(update).map(Execution::Affected),
            Statement::Delete(delete) => DmlExecutor::new(self).execute_delete(delete).map(Execution::Affected),
            Statement::Explain(_) => Err(QueryError::UnsupportedStatement(statement.to_string())),
        }
    }
}

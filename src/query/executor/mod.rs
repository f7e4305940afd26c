// Query Executor Module
//
// This module is responsible for executing statements and producing results.
// It implements the lazy, iterator-based execution model: table sources,
// joins and CTEs yield scopes one at a time as the consumer pulls.

pub mod cte;
pub mod cursor;
pub mod ddl_executor;
pub mod dml_executor;
pub mod engine;
pub mod expression_eval;
pub mod join;
pub mod project;
pub mod result;
pub mod scope;
pub mod source;

// Export key types
pub use self::cursor::Cursor;
pub use self::engine::{Engine, Execution};
pub use self::expression_eval::{DefaultEvaluator, ExpressionEvaluator};
pub use self::result::{ColumnDescription, DataType, DataValue, QueryError, QueryResult, QueryResultSet, Row};
pub use self::scope::Scope;
pub use self::source::{RowStream, ScopeStream};

// Tabula: an in-memory relational query engine

pub mod catalog;
pub mod common;
pub mod query;

// Re-export key items for convenient access
pub use catalog::{Catalog, Table};
pub use common::types::EngineConfig;
pub use query::executor::cursor::Cursor;
pub use query::executor::engine::{Engine, Execution};
pub use query::executor::result::{DataValue, QueryError, QueryResult, Row};

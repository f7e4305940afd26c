// Query Processing Module
//
// This module contains the statement AST and the executor that evaluates it.

pub mod ast;
pub mod executor;

// Export key public interfaces
pub use executor::engine::Engine;
pub use executor::result::QueryResult;

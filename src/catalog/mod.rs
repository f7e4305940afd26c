//! Catalog Management Module
//!
//! This module holds the table registry the engine reads and mutates.

pub mod catalog;
pub mod table;

// Re-export key types
pub use self::catalog::Catalog;
pub use self::table::Table;

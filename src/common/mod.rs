// Common types shared across the engine

pub mod types;

pub use self::types::{BindingName, EngineConfig};

use serde::{Deserialize, Serialize};

/// Name a row is bound under in a scope. `None` is the anonymous binding
/// used for projected rows and `VALUES` tuples.
pub type BindingName = Option<String>;

/// Default cap on recursive CTE fixpoint passes
pub const DEFAULT_MAX_RECURSION_ROUNDS: usize = 1000;

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum number of passes a recursive CTE may evaluate, counting the
    /// final pass that produces no rows. `None` removes the cap.
    pub max_recursion_rounds: Option<usize>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            max_recursion_rounds: Some(DEFAULT_MAX_RECURSION_ROUNDS),
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_recursion_rounds(mut self, rounds: Option<usize>) -> Self {
        self.max_recursion_rounds = rounds;
        self
    }
}

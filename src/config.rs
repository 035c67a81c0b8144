//! Engine configuration.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum number of re-entrant notification rounds per dispatch.
    pub max_event_cascade: usize,
    /// Evaluate behaviors after every update pass.
    pub run_behaviors: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_event_cascade: 64,
            run_behaviors: true,
        }
    }
}

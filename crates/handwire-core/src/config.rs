//! Chain tuning knobs.
//!
//! [`ChainConfig`] is plain serde data so it can be embedded in a larger
//! configuration file and loaded by `handwire-runtime`.

use serde::{Deserialize, Serialize};

/// Per-chain settings shared by every request the chain serves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainConfig {
    /// Number of history entries pre-allocated for each request registry.
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,

    /// Emit a `trace!` event for every value published into a registry.
    #[serde(default)]
    pub trace_publishes: bool,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            history_capacity: default_history_capacity(),
            trace_publishes: false,
        }
    }
}

fn default_history_capacity() -> usize {
    16
}

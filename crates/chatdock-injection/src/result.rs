//! Structured outcome of one injected action sequence.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Outcome of a single step, in sequence order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionOutcome {
    pub index: usize,
    /// Action tag (`fill`, `click`, ...), or `error` for the aborting
    /// failure entry.
    pub kind: String,
    pub success: bool,
    #[serde(default)]
    pub detail: Option<Value>,
}

/// Aggregated result of one sequence, decoded from the side-channel.
///
/// Always a returned value, never a thrown error: the host can only
/// receive what the injected script hands back across the boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InjectionResult {
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
    pub duration_ms: u64,
    pub actions_executed: usize,
    #[serde(default)]
    pub results: Vec<ActionOutcome>,
}

impl InjectionResult {
    /// Host-side failure shape for errors that never reached the page
    /// (compile failures, timeouts, transport faults).
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            duration_ms: 0,
            actions_executed: 0,
            results: Vec::new(),
        }
    }
}

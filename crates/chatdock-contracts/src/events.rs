//! Events emitted by the host runtime and consumed by the UI layer.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use ts_rs::TS;

/// Wire names the UI subscribes to.
pub const EVENT_LOAD_STARTED: &str = "surface:load-started";
pub const EVENT_READY: &str = "surface:ready";
pub const EVENT_INJECTION_RESULT: &str = "surface:injection-result";
pub const EVENT_HIDE_ALL_SURFACES: &str = "hide-all-surfaces";
pub const EVENT_RESTORE_SURFACES: &str = "restore-surfaces";

/// One event crossing the host → UI boundary.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HostEvent {
    /// A surface began loading a page; it is no longer ready.
    LoadStarted { id: String },
    /// A surface finished loading its current page.
    Ready { id: String },
    /// Decoded outcome of one script evaluation.
    #[serde(rename_all = "camelCase")]
    InjectionResult {
        correlation_id: String,
        success: bool,
        result: Option<Value>,
        error: Option<String>,
    },
    /// Hide every surface; the host window is about to hide.
    #[serde(rename_all = "camelCase")]
    HideAllSurfaces { mark_for_restore: bool },
    /// The host window is visible again; re-show restorable surfaces.
    RestoreSurfaces,
}

impl HostEvent {
    /// Wire name the event is published under.
    pub fn event_name(&self) -> &'static str {
        match self {
            HostEvent::LoadStarted { .. } => EVENT_LOAD_STARTED,
            HostEvent::Ready { .. } => EVENT_READY,
            HostEvent::InjectionResult { .. } => EVENT_INJECTION_RESULT,
            HostEvent::HideAllSurfaces { .. } => EVENT_HIDE_ALL_SURFACES,
            HostEvent::RestoreSurfaces => EVENT_RESTORE_SURFACES,
        }
    }
}

//! Declarative automation steps executed inside a surface.
//!
//! Actions are produced by the platform layer (which knows each
//! service's selectors) and consumed here as ordered lists. The set is
//! closed: adding a kind means adding a variant and its compiler arm.

use serde::{Deserialize, Serialize};

/// Default element-finder timeout, in milliseconds.
pub const DEFAULT_FINDER_TIMEOUT_MS: u64 = 5_000;
/// Interval between finder attempts, in milliseconds.
pub const FINDER_POLL_INTERVAL_MS: u64 = 100;
/// Default polling interval for extract steps, in milliseconds.
pub const DEFAULT_EXTRACT_INTERVAL_MS: u64 = 500;
/// Default overall timeout for extract steps, in milliseconds.
pub const DEFAULT_EXTRACT_TIMEOUT_MS: u64 = 30_000;

/// Where to find a target element, optionally descending through one
/// iframe and one shadow root on the way.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectorConfig {
    pub selector: String,
    /// Selector for an iframe whose inner document holds the target.
    #[serde(default)]
    pub frame_selector: Option<String>,
    /// Selector for a shadow host whose shadow root holds the target.
    #[serde(default)]
    pub shadow_host: Option<String>,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

impl SelectorConfig {
    pub fn new(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            frame_selector: None,
            shadow_host: None,
            timeout_ms: None,
        }
    }

    pub fn in_frame(mut self, frame_selector: impl Into<String>) -> Self {
        self.frame_selector = Some(frame_selector.into());
        self
    }

    pub fn in_shadow(mut self, shadow_host: impl Into<String>) -> Self {
        self.shadow_host = Some(shadow_host.into());
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }
}

/// One automation step.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InjectionAction {
    /// Put text into an input, textarea or contenteditable region.
    Fill {
        target: SelectorConfig,
        content: String,
        /// Dispatch input/change notifications after setting the value.
        #[serde(default = "default_true")]
        trigger_events: bool,
        /// Pause inserted before this step runs.
        #[serde(default)]
        delay_ms: Option<u64>,
        #[serde(default)]
        timeout_ms: Option<u64>,
    },
    /// Dispatch a full pointer/mouse press sequence on an element.
    Click {
        target: SelectorConfig,
        /// Fail instead of clicking when the element has no visible box.
        #[serde(default = "default_true")]
        wait_for_visible: bool,
        #[serde(default)]
        timeout_ms: Option<u64>,
    },
    /// Fixed pause between steps.
    Wait { duration_ms: u64 },
    /// Caller-supplied script body, run verbatim.
    Custom { script: String },
    /// Poll a caller-supplied routine until it yields non-empty content.
    Extract {
        extract_script: String,
        #[serde(default)]
        poll_interval_ms: Option<u64>,
        #[serde(default)]
        timeout_ms: Option<u64>,
    },
}

fn default_true() -> bool {
    true
}

impl InjectionAction {
    /// Tag string the action serializes under; also the `kind` reported
    /// in per-action outcomes.
    pub fn kind(&self) -> &'static str {
        match self {
            InjectionAction::Fill { .. } => "fill",
            InjectionAction::Click { .. } => "click",
            InjectionAction::Wait { .. } => "wait",
            InjectionAction::Custom { .. } => "custom",
            InjectionAction::Extract { .. } => "extract",
        }
    }
}

// ============ Tests ============

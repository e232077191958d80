//! ChatDock host runtime.
//!
//! Drives the embedded browser surfaces that show third-party AI chat
//! and translation services:
//! - Surface lifecycle: create-or-reuse, placement, visibility, close
//! - Script evaluation with result correlation over the navigation
//!   side-channel
//! - Per-surface readiness tracking with resolve-on-timeout waiters
//! - Window/surface visibility coordination for both hide origins
//! - Proxy connectivity probing
//!
//! The only contact with native widgets is the [`SurfaceHost`] trait;
//! the embedding shell implements it, tests mock it.

pub mod error;
pub mod events;
pub mod host;
pub mod probe;
pub mod readiness;
pub mod retry;
pub mod router;
pub mod service;
pub mod visibility;

// ── Top-level re-exports ─────────────────────────────────────────────

pub use error::{Result, SurfaceError};
pub use events::EventBus;
pub use host::{HostError, SurfaceHost};
pub use probe::{ProxyProbe, test_proxy_connection};
pub use readiness::ReadinessTracker;
pub use retry::poll_until;
pub use router::{InjectionRouter, PreparedInjection};
pub use service::{ServiceConfig, SurfaceService};
pub use visibility::{VisibilityCoordinator, VisibilityState};

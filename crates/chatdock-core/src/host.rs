//! Host bridge: the single seam between the runtime and the embedding
//! shell that owns native widget handles.

use async_trait::async_trait;
use thiserror::Error;

use chatdock_contracts::{Bounds, SurfaceDescriptor};

/// Host-side failure, as reported by the embedding shell.
#[derive(Debug, Error)]
pub enum HostError {
    #[error("failed to create surface: {0}")]
    SurfaceCreate(String),

    #[error("no such surface: {0}")]
    SurfaceMissing(String),

    #[error("host window unavailable")]
    WindowUnavailable,

    #[error(transparent)]
    Bridge(#[from] anyhow::Error),
}

/// Operations the host process performs on behalf of the runtime.
///
/// Every call is an asynchronous message send acknowledged by the
/// host; none of them block the caller's thread. The production
/// implementation wraps the desktop shell's webview API; tests
/// substitute a mock.
#[async_trait]
pub trait SurfaceHost: Send + Sync {
    /// Create the native widget described by `descriptor`. The widget
    /// starts hidden regardless of prior state.
    async fn create_surface(&self, descriptor: &SurfaceDescriptor) -> Result<(), HostError>;

    async fn set_surface_bounds(&self, id: &str, bounds: &Bounds) -> Result<(), HostError>;

    async fn show_surface(&self, id: &str) -> Result<(), HostError>;

    async fn hide_surface(&self, id: &str) -> Result<(), HostError>;

    /// Destroy the widget. Destroying an unknown id reports
    /// [`HostError::SurfaceMissing`].
    async fn close_surface(&self, id: &str) -> Result<(), HostError>;

    async fn focus_surface(&self, id: &str) -> Result<(), HostError>;

    async fn surface_exists(&self, id: &str) -> Result<bool, HostError>;

    /// Run a script inside the surface's page. Fire-and-forget: results
    /// come back through the navigation side-channel, not this call.
    async fn run_script(&self, id: &str, script: &str) -> Result<(), HostError>;

    /// Show the application window, unminimizing first when needed,
    /// and give it focus.
    async fn show_window(&self) -> Result<(), HostError>;

    async fn hide_window(&self) -> Result<(), HostError>;

    async fn window_visible(&self) -> Result<bool, HostError>;
}

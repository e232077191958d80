//! ChatDock Contracts - Shared boundary types between the host runtime and the UI.
//!
//! This crate defines the payloads that cross the host/UI boundary:
//! - Surface placement geometry (logical bounds, layout-derived placement)
//! - Surface creation descriptors and script-evaluation acknowledgements
//! - Host events consumed by the UI layer
//! - Proxy address normalization shared by the probe and the host
//!
//! Everything here is plain data: serde for the wire, ts-rs for the
//! generated TypeScript bindings. No I/O, no async.

pub mod bounds;
pub mod events;
pub mod proxy;
pub mod surface;

// ── Top-level re-exports ─────────────────────────────────────────────

pub use bounds::{
    BOUNDS_EPSILON, Bounds, ContentRect, LogicalPosition, LogicalSize, WindowLayout,
    compute_surface_bounds,
};
pub use events::{
    EVENT_HIDE_ALL_SURFACES, EVENT_INJECTION_RESULT, EVENT_LOAD_STARTED, EVENT_READY,
    EVENT_RESTORE_SURFACES, HostEvent,
};
pub use proxy::{ProxyConfig, ProxyError, normalize_proxy_url, sanitize_for_directory};
pub use surface::{EvaluateAck, SurfaceDescriptor};

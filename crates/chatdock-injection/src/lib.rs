//! Script injection layer for ChatDock surfaces.
//!
//! Surfaces show foreign-origin pages, so nothing inside them can call
//! back through the normal host bridge. This crate owns both directions
//! of that boundary:
//! - Compiling a declarative action list (fill / click / wait / custom /
//!   extract) into one self-contained script injected into a surface
//! - Decoding the script's result from the navigation side-channel the
//!   page uses to smuggle data back out (begin/chunk/end framing)
//!
//! Everything here is pure logic over strings and frames; the host
//! runtime in `chatdock-core` wires it to real surfaces.

pub mod action;
pub mod compiler;
pub mod error;
pub mod result;
pub mod sidechannel;

// ── Top-level re-exports ─────────────────────────────────────────────

pub use action::{InjectionAction, SelectorConfig};
pub use compiler::compile_sequence;
pub use error::InjectionError;
pub use result::{ActionOutcome, InjectionResult};
pub use sidechannel::{
    ChannelConfig, Reassembler, SideChannelFrame, decode_payload, parse_side_channel_url,
};

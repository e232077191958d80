//! Runtime error taxonomy.

use thiserror::Error;

use chatdock_contracts::ProxyError;
use chatdock_injection::InjectionError;

use crate::host::HostError;

pub type Result<T> = std::result::Result<T, SurfaceError>;

#[derive(Debug, Error)]
pub enum SurfaceError {
    /// The native widget could not be created. Fatal for that `ensure`;
    /// not retried automatically.
    #[error("failed to create surface {id}: {reason}")]
    Create { id: String, reason: String },

    /// The target surface disappeared mid-operation (closed
    /// concurrently). Callers may retry `ensure` once.
    #[error("surface {0} no longer exists")]
    TransientMissing(String),

    /// No matching end frame arrived before the caller's deadline. The
    /// host-side work is not cancelled; a late result is dropped.
    #[error("script evaluation {correlation_id} timed out after {elapsed_ms}ms")]
    InjectionTimeout {
        correlation_id: String,
        elapsed_ms: u64,
    },

    #[error(transparent)]
    Injection(#[from] InjectionError),

    #[error(transparent)]
    Proxy(#[from] ProxyError),

    #[error(transparent)]
    Host(#[from] HostError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_create_failures_keep_their_reason() {
        let err = SurfaceError::Create {
            id: "gemini".into(),
            reason: "widget limit reached".into(),
        };
        assert!(err.to_string().contains("widget limit reached"));
    }

    #[test]
    fn injection_errors_convert_transparently() {
        let err: SurfaceError = InjectionError::ElementNotFound("#send".into()).into();
        assert_eq!(err.to_string(), "element not found: #send");
    }
}

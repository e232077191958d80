//! Injection error taxonomy.

use thiserror::Error;

/// Marker third-party pages use (via Custom/Extract steps) to signal
/// that the service needs a login before automation can proceed.
pub const NOT_LOGGED_IN_MARKER: &str = "NOT_LOGGED_IN";

#[derive(Debug, Error)]
pub enum InjectionError {
    #[error("element not found: {0}")]
    ElementNotFound(String),

    #[error("element is not visible: {0}")]
    ElementNotVisible(String),

    #[error("element is not editable: {0}")]
    ElementNotEditable(String),

    #[error("injection timed out: {0}")]
    Timeout(String),

    #[error("chunk out of order for {cid}: expected {expected}, got {got}")]
    ChunkOrder {
        cid: String,
        expected: u64,
        got: u64,
    },

    #[error("not logged in")]
    NotLoggedIn,

    #[error("failed to decode injection payload: {0}")]
    Decode(String),

    #[error("malformed side-channel frame: {0}")]
    Frame(String),

    /// Script-reported failure that fits no narrower variant.
    #[error("injection failed: {0}")]
    Script(String),
}

impl InjectionError {
    /// Map an error string reported by an injected script back onto the
    /// taxonomy. Scripts can only return strings across the boundary;
    /// the prefixes match what the compiled routines throw.
    pub fn from_script_error(message: &str) -> Self {
        if message.contains(NOT_LOGGED_IN_MARKER) {
            return InjectionError::NotLoggedIn;
        }
        if let Some(rest) = message.strip_prefix("element not found: ") {
            return InjectionError::ElementNotFound(rest.to_string());
        }
        if let Some(rest) = message.strip_prefix("element is not visible: ") {
            return InjectionError::ElementNotVisible(rest.to_string());
        }
        if let Some(rest) = message.strip_prefix("element is not editable: ") {
            return InjectionError::ElementNotEditable(rest.to_string());
        }
        if message.contains("timed out") {
            return InjectionError::Timeout(message.to_string());
        }
        InjectionError::Script(message.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn script_errors_map_back_onto_the_taxonomy() {
        assert!(matches!(
            InjectionError::from_script_error("element not found: #send"),
            InjectionError::ElementNotFound(s) if s == "#send"
        ));
        assert!(matches!(
            InjectionError::from_script_error("element is not visible: .btn"),
            InjectionError::ElementNotVisible(_)
        ));
        assert!(matches!(
            InjectionError::from_script_error("NOT_LOGGED_IN: please sign in"),
            InjectionError::NotLoggedIn
        ));
        assert!(matches!(
            InjectionError::from_script_error("extract timed out after 4000ms"),
            InjectionError::Timeout(_)
        ));
        assert!(matches!(
            InjectionError::from_script_error("TypeError: x is undefined"),
            InjectionError::Script(_)
        ));
    }

    #[test]
    fn chunk_order_message_names_both_sequences() {
        let err = InjectionError::ChunkOrder {
            cid: "abc".into(),
            expected: 1,
            got: 3,
        };
        let text = err.to_string();
        assert!(text.contains("expected 1"));
        assert!(text.contains("got 3"));
    }
}

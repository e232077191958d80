//! Proxy address normalization.
//!
//! Users supply a host that may already embed a scheme and/or port
//! (`127.0.0.1`, `127.0.0.1:7890`, `socks5://10.0.0.2:1080`), plus an
//! optional override port. The host process only accepts a normalized
//! `scheme://host:port` with an `http` or `socks5` scheme.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;
use url::Url;

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("proxy host is empty")]
    EmptyHost,

    #[error("unsupported proxy scheme: {0}")]
    UnsupportedScheme(String),

    #[error("proxy port is missing")]
    MissingPort,

    #[error("invalid proxy address: {0}")]
    Invalid(String),
}

/// User-facing proxy configuration, before normalization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct ProxyConfig {
    pub host: String,
    /// Overrides (or supplies) the port regardless of what `host` embeds.
    pub port: Option<u16>,
}

impl ProxyConfig {
    pub fn new(host: impl Into<String>, port: Option<u16>) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

/// Normalize a proxy configuration to `scheme://host:port`.
///
/// A bare host defaults to the `http` scheme. Only `http` and `socks5`
/// are accepted. The explicit `port` field wins over a port embedded in
/// the host string; having neither is an error.
pub fn normalize_proxy_url(config: &ProxyConfig) -> Result<String, ProxyError> {
    let raw = config.host.trim();
    if raw.is_empty() {
        return Err(ProxyError::EmptyHost);
    }

    let candidate = if raw.contains("://") {
        raw.to_string()
    } else {
        format!("http://{raw}")
    };

    let parsed = Url::parse(&candidate).map_err(|e| ProxyError::Invalid(e.to_string()))?;
    let scheme = parsed.scheme();
    if scheme != "http" && scheme != "socks5" {
        return Err(ProxyError::UnsupportedScheme(scheme.to_string()));
    }

    let host = parsed
        .host_str()
        .ok_or_else(|| ProxyError::Invalid(format!("no host in '{raw}'")))?;
    let port = config
        .port
        .or(parsed.port())
        .ok_or(ProxyError::MissingPort)?;

    Ok(format!("{scheme}://{host}:{port}"))
}

/// Map an arbitrary string to a filesystem-safe directory component.
/// Surfaces behind different proxies get isolated storage directories
/// derived from the normalized proxy address.
pub fn sanitize_for_directory(input: &str) -> String {
    input
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

// ============ Tests ============

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_host_with_port_field() {
        let url = normalize_proxy_url(&ProxyConfig::new("127.0.0.1", Some(7890))).unwrap();
        assert_eq!(url, "http://127.0.0.1:7890");
    }

    #[test]
    fn host_embedding_port() {
        let url = normalize_proxy_url(&ProxyConfig::new("127.0.0.1:7890", None)).unwrap();
        assert_eq!(url, "http://127.0.0.1:7890");
    }

    #[test]
    fn explicit_port_overrides_embedded_port() {
        let url = normalize_proxy_url(&ProxyConfig::new("http://127.0.0.1:7890", Some(1080)))
            .unwrap();
        assert_eq!(url, "http://127.0.0.1:1080");
    }

    #[test]
    fn socks5_scheme_is_kept() {
        let url = normalize_proxy_url(&ProxyConfig::new("socks5://10.0.0.2:1080", None)).unwrap();
        assert_eq!(url, "socks5://10.0.0.2:1080");
    }

    #[test]
    fn unsupported_scheme_is_rejected() {
        let err = normalize_proxy_url(&ProxyConfig::new("ftp://10.0.0.2:21", None)).unwrap_err();
        assert!(matches!(err, ProxyError::UnsupportedScheme(s) if s == "ftp"));
    }

    #[test]
    fn missing_port_everywhere_is_an_error() {
        let err = normalize_proxy_url(&ProxyConfig::new("proxy.internal", None)).unwrap_err();
        assert!(matches!(err, ProxyError::MissingPort));
    }

    #[test]
    fn empty_host_is_an_error() {
        let err = normalize_proxy_url(&ProxyConfig::new("   ", Some(8080))).unwrap_err();
        assert!(matches!(err, ProxyError::EmptyHost));
    }

    #[test]
    fn sanitize_flattens_non_alphanumerics() {
        assert_eq!(
            sanitize_for_directory("http://127.0.0.1:7890"),
            "http___127_0_0_1_7890"
        );
        assert_eq!(sanitize_for_directory("plain"), "plain");
    }
}

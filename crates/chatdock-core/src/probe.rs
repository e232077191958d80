//! One-shot connectivity check for a configured proxy.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use chatdock_contracts::{ProxyConfig, normalize_proxy_url};

const PROBE_URL: &str = "https://www.example.com";
const PROBE_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_REDIRECTS: usize = 5;

/// Outcome of a probe, shaped for direct display in the settings UI.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyProbe {
    pub success: bool,
    pub message: String,
    /// Time to first response. `None` when nothing came back at all.
    pub latency_ms: Option<u64>,
}

impl ProxyProbe {
    fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            latency_ms: None,
        }
    }
}

/// Drive one HTTPS request through the proxy and report what happened.
/// Never errors: a malformed config, an unreachable proxy, and an
/// upstream failure all come back as an unsuccessful probe.
pub async fn test_proxy_connection(config: &ProxyConfig) -> ProxyProbe {
    let proxy_url = match normalize_proxy_url(config) {
        Ok(url) => url,
        Err(e) => return ProxyProbe::failure(format!("invalid proxy: {e}")),
    };

    let proxy = match reqwest::Proxy::all(&proxy_url) {
        Ok(proxy) => proxy,
        Err(e) => return ProxyProbe::failure(format!("proxy rejected: {e}")),
    };

    let client = match reqwest::Client::builder()
        .proxy(proxy)
        .timeout(PROBE_TIMEOUT)
        .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
        .build()
    {
        Ok(client) => client,
        Err(e) => return ProxyProbe::failure(format!("client build failed: {e}")),
    };

    let started = Instant::now();
    match client.get(PROBE_URL).send().await {
        Ok(response) => {
            let latency_ms = started.elapsed().as_millis() as u64;
            let status = response.status();
            debug!(proxy = %proxy_url, %status, latency_ms, "proxy probe completed");
            let message = if status.is_success() {
                format!("connected through {proxy_url} in {latency_ms}ms")
            } else {
                format!("proxy reachable but upstream returned {status}")
            };
            ProxyProbe {
                success: status.is_success(),
                message,
                latency_ms: Some(latency_ms),
            }
        }
        Err(e) => {
            warn!(proxy = %proxy_url, error = %e, "proxy probe failed");
            ProxyProbe::failure(format!("connection failed: {e}"))
        }
    }
}

// ============ Tests ============

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_host_fails_without_erroring() {
        let probe = test_proxy_connection(&ProxyConfig::new("", None)).await;
        assert!(!probe.success);
        assert!(probe.message.contains("invalid proxy"), "{}", probe.message);
        assert!(probe.latency_ms.is_none());
    }

    #[tokio::test]
    async fn unsupported_scheme_fails_without_erroring() {
        let probe = test_proxy_connection(&ProxyConfig::new("ftp://127.0.0.1:21", None)).await;
        assert!(!probe.success);
        assert!(probe.message.contains("invalid proxy"), "{}", probe.message);
    }

    #[test]
    fn probe_serializes_for_the_ui() {
        let probe = ProxyProbe {
            success: true,
            message: "ok".into(),
            latency_ms: Some(41),
        };
        let json = serde_json::to_value(&probe).unwrap();
        assert_eq!(json["latencyMs"], 41);
        assert_eq!(json["success"], true);
    }
}

//! Surface creation and script-evaluation payloads.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::bounds::Bounds;

/// Everything the host needs to create (or attach to) one surface.
///
/// `url` and `proxy_url` are fixed for the surface's lifetime; a proxy
/// change requires tearing the surface down and creating a fresh one.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct SurfaceDescriptor {
    /// Opaque surface identity, unique among live surfaces.
    pub id: String,
    /// Target page the surface serves.
    pub url: String,
    pub bounds: Bounds,
    /// Normalized `scheme://host:port` proxy address, if any.
    pub proxy_url: Option<String>,
    /// Script installed into every document the surface loads.
    pub init_script: Option<String>,
}

impl SurfaceDescriptor {
    pub fn new(id: impl Into<String>, url: impl Into<String>, bounds: Bounds) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
            bounds,
            proxy_url: None,
            init_script: None,
        }
    }

    pub fn with_proxy_url(mut self, proxy_url: Option<String>) -> Self {
        self.proxy_url = proxy_url;
        self
    }

    pub fn with_init_script(mut self, script: impl Into<String>) -> Self {
        self.init_script = Some(script.into());
        self
    }
}

/// Immediate acknowledgement of `evaluate_script`. The decoded result
/// arrives later as an injection-result event carrying the same
/// correlation id.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateAck {
    pub success: bool,
    pub correlation_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_round_trips_with_camel_case_keys() {
        let descriptor = SurfaceDescriptor::new(
            "chatgpt",
            "https://chat.example.com",
            Bounds::new(0.0, 0.0, 100.0, 100.0, 1.0),
        )
        .with_proxy_url(Some("http://127.0.0.1:7890".into()));

        let json = serde_json::to_value(&descriptor).unwrap();
        assert_eq!(json["proxyUrl"], "http://127.0.0.1:7890");
        assert!(json["initScript"].is_null());

        let back: SurfaceDescriptor = serde_json::from_value(json).unwrap();
        assert_eq!(back.id, "chatgpt");
    }
}

//! Navigation side-channel: framing, parsing, reassembly.
//!
//! Foreign-origin pages cannot call the host bridge, but any page can
//! attempt a navigation and the host can always intercept it first. An
//! injected script smuggles its result out as a sequence of
//! navigations to a reserved scheme/host:
//!
//! ```text
//! chatdock://injection/begin?cid=<id>
//! chatdock://injection/chunk?cid=<id>&seq=<n>&data=<base64url>
//! chatdock://injection/end?cid=<id>
//! ```
//!
//! Navigation events are not guaranteed ordered across embedding
//! runtimes, so ordering is enforced by the explicit sequence numbers,
//! not by arrival order. An out-of-order or duplicate chunk fails the
//! whole extraction; there is no partial reassembly or retransmission.

use std::collections::HashMap;

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use tracing::{debug, warn};
use url::Url;

use crate::error::InjectionError;
use crate::result::InjectionResult;

/// Chunk payload ceiling, chosen well below practical URL-length limits.
pub const DEFAULT_MAX_CHUNK_LEN: usize = 1_800;
/// How long an unfinished reassembly buffer may live before reclaim.
pub const DEFAULT_BUFFER_TTL_MS: u64 = 30_000;

/// Reserved addressing the channel listens on.
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    pub scheme: String,
    pub host: String,
    pub max_chunk_len: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            scheme: "chatdock".into(),
            host: "injection".into(),
            max_chunk_len: DEFAULT_MAX_CHUNK_LEN,
        }
    }
}

impl ChannelConfig {
    /// `scheme://host` prefix the compiled script navigates to.
    pub fn base_url(&self) -> String {
        format!("{}://{}", self.scheme, self.host)
    }

    pub fn matches(&self, url: &Url) -> bool {
        url.scheme() == self.scheme && url.host_str() == Some(self.host.as_str())
    }
}

/// One intercepted navigation, decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SideChannelFrame {
    Begin { cid: String },
    Chunk { cid: String, seq: u64, data: String },
    End { cid: String },
}

impl SideChannelFrame {
    pub fn cid(&self) -> &str {
        match self {
            SideChannelFrame::Begin { cid }
            | SideChannelFrame::Chunk { cid, .. }
            | SideChannelFrame::End { cid } => cid,
        }
    }
}

/// Decode an intercepted navigation URL.
///
/// Returns `None` for navigations that do not target the reserved
/// scheme/host (ordinary page navigation, let through), and
/// `Some(Err(_))` for reserved navigations that are malformed.
pub fn parse_side_channel_url(
    url: &Url,
    config: &ChannelConfig,
) -> Option<Result<SideChannelFrame, InjectionError>> {
    if !config.matches(url) {
        return None;
    }
    Some(parse_frame(url))
}

fn parse_frame(url: &Url) -> Result<SideChannelFrame, InjectionError> {
    let mut cid = None;
    let mut seq = None;
    let mut data = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "cid" => cid = Some(value.into_owned()),
            "seq" => {
                let parsed = value
                    .parse::<u64>()
                    .map_err(|_| InjectionError::Frame(format!("bad seq '{value}'")))?;
                seq = Some(parsed);
            }
            "data" => data = Some(value.into_owned()),
            _ => {}
        }
    }

    let cid = cid
        .filter(|c| !c.is_empty())
        .ok_or_else(|| InjectionError::Frame("missing cid".into()))?;

    match url.path() {
        "/begin" => Ok(SideChannelFrame::Begin { cid }),
        "/chunk" => {
            let seq = seq.ok_or_else(|| InjectionError::Frame("chunk without seq".into()))?;
            let data = data.ok_or_else(|| InjectionError::Frame("chunk without data".into()))?;
            Ok(SideChannelFrame::Chunk { cid, seq, data })
        }
        "/end" => Ok(SideChannelFrame::End { cid }),
        other => Err(InjectionError::Frame(format!("unknown path '{other}'"))),
    }
}

/// Decode a fully reassembled payload into the structured result.
pub fn decode_payload(encoded: &str) -> Result<InjectionResult, InjectionError> {
    // Tolerate an emitter that padded anyway.
    let bytes = URL_SAFE_NO_PAD
        .decode(encoded.trim_end_matches('='))
        .map_err(|e| InjectionError::Decode(e.to_string()))?;
    serde_json::from_slice(&bytes).map_err(|e| InjectionError::Decode(e.to_string()))
}

/// A healthy stream's reassembled output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReassembledPayload {
    pub cid: String,
    /// Chunk data concatenated in sequence order, still encoded.
    pub payload: String,
}

struct ChunkBuffer {
    payload: String,
    next_seq: u64,
    created_at_ms: u64,
}

/// Reassembles chunk streams keyed by correlation id.
///
/// Owned by the host side of the channel. Buffers whose `end` never
/// arrives are reclaimed by [`Reassembler::purge_stale`].
pub struct Reassembler {
    buffers: HashMap<String, ChunkBuffer>,
    ttl_ms: u64,
}

impl Default for Reassembler {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER_TTL_MS)
    }
}

impl Reassembler {
    pub fn new(ttl_ms: u64) -> Self {
        Self {
            buffers: HashMap::new(),
            ttl_ms,
        }
    }

    /// Feed one frame. Returns the concatenated payload when `frame`
    /// completes a healthy stream. A sequencing violation removes the
    /// buffer and fails that correlation id's extraction.
    pub fn ingest(
        &mut self,
        frame: SideChannelFrame,
    ) -> Result<Option<ReassembledPayload>, InjectionError> {
        match frame {
            SideChannelFrame::Begin { cid } => {
                let replaced = self
                    .buffers
                    .insert(
                        cid.clone(),
                        ChunkBuffer {
                            payload: String::new(),
                            next_seq: 0,
                            created_at_ms: current_timestamp_ms(),
                        },
                    )
                    .is_some();
                if replaced {
                    warn!(cid = %cid, "begin frame reset an open reassembly buffer");
                }
                Ok(None)
            }
            SideChannelFrame::Chunk { cid, seq, data } => {
                let Some(buffer) = self.buffers.get_mut(&cid) else {
                    return Err(InjectionError::Frame(format!(
                        "chunk for unknown correlation id {cid}"
                    )));
                };
                if seq != buffer.next_seq {
                    let expected = buffer.next_seq;
                    self.buffers.remove(&cid);
                    return Err(InjectionError::ChunkOrder {
                        cid,
                        expected,
                        got: seq,
                    });
                }
                buffer.payload.push_str(&data);
                buffer.next_seq += 1;
                Ok(None)
            }
            SideChannelFrame::End { cid } => {
                let Some(buffer) = self.buffers.remove(&cid) else {
                    return Err(InjectionError::Frame(format!(
                        "end for unknown correlation id {cid}"
                    )));
                };
                debug!(cid = %cid, chunks = buffer.next_seq, "reassembled side-channel payload");
                Ok(Some(ReassembledPayload {
                    cid,
                    payload: buffer.payload,
                }))
            }
        }
    }

    /// Drop buffers older than the TTL. Returns how many were removed.
    pub fn purge_stale(&mut self) -> usize {
        let now = current_timestamp_ms();
        let ttl = self.ttl_ms;
        let before = self.buffers.len();
        self.buffers
            .retain(|_, buffer| now.saturating_sub(buffer.created_at_ms) < ttl);
        let purged = before - self.buffers.len();
        if purged > 0 {
            warn!(purged, "reclaimed stale side-channel buffers");
        }
        purged
    }

    pub fn open_buffers(&self) -> usize {
        self.buffers.len()
    }
}

fn current_timestamp_ms() -> u64 {
    chrono::Utc::now().timestamp_millis().max(0) as u64
}

// ============ Tests ============

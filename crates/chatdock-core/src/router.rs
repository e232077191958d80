//! Correlates script evaluations with their side-channel results.
//!
//! Each evaluation gets a fresh correlation id, compiled into the
//! script and echoed by every frame the page emits. A pending map of
//! oneshot senders resolves the caller's future when the end frame
//! completes reassembly; the caller's timeout only abandons the local
//! slot, never the page-side work.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, oneshot};
use tracing::{debug, warn};
use url::Url;
use uuid::Uuid;

use chatdock_contracts::{EvaluateAck, HostEvent};
use chatdock_injection::{
    ChannelConfig, InjectionAction, InjectionError, InjectionResult, Reassembler,
    compile_sequence, decode_payload, parse_side_channel_url,
};

use crate::error::{Result, SurfaceError};
use crate::events::EventBus;

/// How often the reclaim task sweeps stale reassembly buffers.
const RECLAIM_SWEEP_INTERVAL: Duration = Duration::from_secs(10);

/// A compiled sequence with its pending result slot registered.
pub struct PreparedInjection {
    pub correlation_id: String,
    pub script: String,
    receiver: oneshot::Receiver<InjectionResult>,
}

impl PreparedInjection {
    /// The immediate acknowledgement handed back to the command caller.
    pub fn ack(&self) -> EvaluateAck {
        EvaluateAck {
            success: true,
            correlation_id: self.correlation_id.clone(),
        }
    }
}

pub struct InjectionRouter {
    channel: ChannelConfig,
    pending: Arc<Mutex<HashMap<String, oneshot::Sender<InjectionResult>>>>,
    reassembler: Arc<Mutex<Reassembler>>,
    events: EventBus,
}

impl InjectionRouter {
    pub fn new(channel: ChannelConfig, events: EventBus) -> Self {
        let router = Self {
            channel,
            pending: Arc::new(Mutex::new(HashMap::new())),
            reassembler: Arc::new(Mutex::new(Reassembler::default())),
            events,
        };

        router.spawn_reclaim_task();
        router
    }

    pub fn channel(&self) -> &ChannelConfig {
        &self.channel
    }

    /// Compile `actions` under a fresh correlation id and register the
    /// pending slot its end frame will resolve.
    pub async fn prepare(&self, actions: &[InjectionAction]) -> Result<PreparedInjection> {
        let correlation_id = Uuid::new_v4().to_string();
        let script = compile_sequence(actions, &correlation_id, &self.channel)?;
        let (tx, rx) = oneshot::channel();
        self.pending
            .lock()
            .await
            .insert(correlation_id.clone(), tx);
        Ok(PreparedInjection {
            correlation_id,
            script,
            receiver: rx,
        })
    }

    /// Drop a pending slot whose script never made it into the page.
    pub async fn abandon(&self, correlation_id: &str) {
        self.pending.lock().await.remove(correlation_id);
    }

    /// Await the decoded result, bounded by `timeout`.
    pub async fn wait(
        &self,
        prepared: PreparedInjection,
        timeout: Duration,
    ) -> Result<InjectionResult> {
        let started = tokio::time::Instant::now();
        let PreparedInjection {
            correlation_id,
            receiver,
            ..
        } = prepared;

        match tokio::time::timeout(timeout, receiver).await {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(_)) => Err(SurfaceError::InjectionTimeout {
                correlation_id,
                elapsed_ms: started.elapsed().as_millis() as u64,
            }),
            Err(_) => {
                self.pending.lock().await.remove(&correlation_id);
                Err(SurfaceError::InjectionTimeout {
                    correlation_id,
                    elapsed_ms: started.elapsed().as_millis() as u64,
                })
            }
        }
    }

    /// Resolve the slot in the background. The outcome is observable
    /// only through the injection-result event; the deadline still
    /// bounds how long the slot may stay pending.
    pub fn detach(self: &Arc<Self>, prepared: PreparedInjection, timeout: Duration) {
        let router = self.clone();
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                if let Err(e) = router.wait(prepared, timeout).await {
                    debug!(error = %e, "detached evaluation did not resolve");
                }
            });
        } else {
            warn!("no tokio runtime found for detached evaluation");
        }
    }

    /// Feed one intercepted navigation. Returns `true` when the
    /// navigation targeted the reserved channel and the host must
    /// cancel it.
    pub async fn handle_navigation(&self, url: &Url) -> bool {
        let Some(parsed) = parse_side_channel_url(url, &self.channel) else {
            return false;
        };

        match parsed {
            Ok(frame) => {
                let outcome = self.reassembler.lock().await.ingest(frame);
                match outcome {
                    Ok(Some(done)) => {
                        let result = match decode_payload(&done.payload) {
                            Ok(result) => result,
                            Err(e) => {
                                warn!(cid = %done.cid, error = %e, "side-channel payload failed to decode");
                                InjectionResult::failure(e.to_string())
                            }
                        };
                        self.resolve(&done.cid, result).await;
                    }
                    Ok(None) => {}
                    Err(e) => match &e {
                        InjectionError::ChunkOrder { cid, expected, got } => {
                            warn!(cid = %cid, expected, got, "chunk out of order; extraction failed");
                            let cid = cid.clone();
                            self.resolve(&cid, InjectionResult::failure(e.to_string()))
                                .await;
                        }
                        _ => debug!(error = %e, "stray side-channel frame"),
                    },
                }
            }
            Err(e) => {
                warn!(error = %e, "malformed side-channel navigation");
            }
        }

        true
    }

    async fn resolve(&self, correlation_id: &str, result: InjectionResult) {
        self.events.publish(HostEvent::InjectionResult {
            correlation_id: correlation_id.to_string(),
            success: result.success,
            result: serde_json::to_value(&result).ok(),
            error: result.error.clone(),
        });

        let sender = self.pending.lock().await.remove(correlation_id);
        match sender {
            Some(tx) => {
                let _ = tx.send(result);
            }
            None => {
                debug!(cid = %correlation_id, "injection result arrived after its caller gave up");
            }
        }
    }

    /// Sweep stale reassembly buffers so a lost end frame cannot pin
    /// memory. Skips when no runtime is available.
    fn spawn_reclaim_task(&self) {
        let reassembler = self.reassembler.clone();
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                loop {
                    tokio::time::sleep(RECLAIM_SWEEP_INTERVAL).await;
                    reassembler.lock().await.purge_stale();
                }
            });
        } else {
            warn!("no tokio runtime found for side-channel reclaim task");
        }
    }

    pub async fn open_buffers(&self) -> usize {
        self.reassembler.lock().await.open_buffers()
    }

    pub async fn pending_count(&self) -> usize {
        self.pending.lock().await.len()
    }
}

// ============ Tests ============

#[cfg(test)]
mod tests {
    use super::*;
    use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
    use chatdock_injection::SelectorConfig;

    fn router() -> (Arc<InjectionRouter>, tokio::sync::mpsc::UnboundedReceiver<HostEvent>) {
        let (events, receiver) = EventBus::channel();
        (
            Arc::new(InjectionRouter::new(ChannelConfig::default(), events)),
            receiver,
        )
    }

    fn sample_actions() -> Vec<InjectionAction> {
        vec![InjectionAction::Click {
            target: SelectorConfig::new("#send"),
            wait_for_visible: true,
            timeout_ms: None,
        }]
    }

    fn encoded_result(success: bool) -> String {
        let result = InjectionResult {
            success,
            error: None,
            duration_ms: 7,
            actions_executed: 1,
            results: Vec::new(),
        };
        URL_SAFE_NO_PAD.encode(serde_json::to_string(&result).unwrap().as_bytes())
    }

    fn channel_url(path_and_query: &str) -> Url {
        Url::parse(&format!("chatdock://injection{path_and_query}")).unwrap()
    }

    #[tokio::test]
    async fn resolves_the_pending_future_from_frames() {
        let (router, mut events) = router();
        let prepared = router.prepare(&sample_actions()).await.unwrap();
        let cid = prepared.correlation_id.clone();
        assert!(prepared.ack().success);

        let encoded = encoded_result(true);
        let (first, second) = encoded.split_at(encoded.len() / 2);

        let feeder = {
            let router = router.clone();
            let cid = cid.clone();
            let first = first.to_string();
            let second = second.to_string();
            tokio::spawn(async move {
                assert!(router.handle_navigation(&channel_url(&format!("/begin?cid={cid}"))).await);
                assert!(
                    router
                        .handle_navigation(&channel_url(&format!(
                            "/chunk?cid={cid}&seq=0&data={first}"
                        )))
                        .await
                );
                assert!(
                    router
                        .handle_navigation(&channel_url(&format!(
                            "/chunk?cid={cid}&seq=1&data={second}"
                        )))
                        .await
                );
                assert!(router.handle_navigation(&channel_url(&format!("/end?cid={cid}"))).await);
            })
        };

        let result = router.wait(prepared, Duration::from_secs(2)).await.unwrap();
        feeder.await.unwrap();
        assert!(result.success);
        assert_eq!(result.actions_executed, 1);
        assert_eq!(router.pending_count().await, 0);
        assert_eq!(router.open_buffers().await, 0);

        match events.recv().await.unwrap() {
            HostEvent::InjectionResult {
                correlation_id,
                success,
                ..
            } => {
                assert_eq!(correlation_id, cid);
                assert!(success);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn timeout_abandons_the_slot_and_late_results_are_event_only() {
        let (router, mut events) = router();
        let prepared = router.prepare(&sample_actions()).await.unwrap();
        let cid = prepared.correlation_id.clone();

        let err = router
            .wait(prepared, Duration::from_millis(40))
            .await
            .unwrap_err();
        assert!(matches!(err, SurfaceError::InjectionTimeout { .. }));
        assert_eq!(router.pending_count().await, 0);

        // The page finishes anyway; the result surfaces as an event.
        let encoded = encoded_result(true);
        router
            .handle_navigation(&channel_url(&format!("/begin?cid={cid}")))
            .await;
        router
            .handle_navigation(&channel_url(&format!("/chunk?cid={cid}&seq=0&data={encoded}")))
            .await;
        router
            .handle_navigation(&channel_url(&format!("/end?cid={cid}")))
            .await;

        assert!(matches!(
            events.recv().await,
            Some(HostEvent::InjectionResult { .. })
        ));
    }

    #[tokio::test]
    async fn chunk_order_violation_fails_the_pending_evaluation() {
        let (router, _events) = router();
        let prepared = router.prepare(&sample_actions()).await.unwrap();
        let cid = prepared.correlation_id.clone();

        let feeder = {
            let router = router.clone();
            tokio::spawn(async move {
                router
                    .handle_navigation(&channel_url(&format!("/begin?cid={cid}")))
                    .await;
                router
                    .handle_navigation(&channel_url(&format!("/chunk?cid={cid}&seq=0&data=QQ")))
                    .await;
                // seq 1 never sent; 2 arrives instead.
                router
                    .handle_navigation(&channel_url(&format!("/chunk?cid={cid}&seq=2&data=Qg")))
                    .await;
            })
        };

        let result = router.wait(prepared, Duration::from_secs(2)).await.unwrap();
        feeder.await.unwrap();
        assert!(!result.success);
        let error = result.error.unwrap();
        assert!(error.contains("expected 1"), "error was: {error}");
        assert_eq!(router.open_buffers().await, 0);
    }

    #[tokio::test]
    async fn ordinary_navigations_pass_through() {
        let (router, _events) = router();
        let url = Url::parse("https://chat.example.com/thread/42").unwrap();
        assert!(!router.handle_navigation(&url).await);
    }

    #[tokio::test]
    async fn detach_publishes_without_a_waiter() {
        let (router, mut events) = router();
        let prepared = router.prepare(&sample_actions()).await.unwrap();
        let cid = prepared.correlation_id.clone();
        router.detach(prepared, Duration::from_secs(2));

        let encoded = encoded_result(false);
        router
            .handle_navigation(&channel_url(&format!("/begin?cid={cid}")))
            .await;
        router
            .handle_navigation(&channel_url(&format!("/chunk?cid={cid}&seq=0&data={encoded}")))
            .await;
        router
            .handle_navigation(&channel_url(&format!("/end?cid={cid}")))
            .await;

        match events.recv().await.unwrap() {
            HostEvent::InjectionResult { success, .. } => assert!(!success),
            other => panic!("unexpected event: {other:?}"),
        }
    }
}

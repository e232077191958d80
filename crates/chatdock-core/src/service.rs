//! Surface lifecycle and the operations the UI layer calls against it.
//!
//! The service owns the cached view of every embedded surface:
//! - `ensure` creates on first use and attaches afterwards; a live
//!   page is never renavigated
//! - bounds and visibility calls short-circuit against the cache so
//!   resize storms and repeated toggles cost one host call per real
//!   transition
//! - action sequences and ad-hoc scripts flow through the injection
//!   router, results come back over the side channel

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use url::Url;

use chatdock_contracts::{
    Bounds, EvaluateAck, HostEvent, ProxyConfig, SurfaceDescriptor, WindowLayout,
    compute_surface_bounds, normalize_proxy_url,
};
use chatdock_injection::{ChannelConfig, InjectionAction, InjectionResult};

use crate::error::{Result, SurfaceError};
use crate::events::EventBus;
use crate::host::{HostError, SurfaceHost};
use crate::readiness::ReadinessTracker;
use crate::retry::poll_until;
use crate::router::InjectionRouter;

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub channel: ChannelConfig,
    /// Upper bound on a full action sequence, side channel included.
    pub evaluate_timeout: Duration,
    /// How long to keep probing the host when existence checks error.
    pub exists_probe_timeout: Duration,
    /// Ready-wait budget for a surface that already existed.
    pub reused_ready_timeout: Duration,
    /// Ready-wait budget for a surface created this call.
    pub fresh_ready_timeout: Duration,
    /// Script installed into every new surface before its page runs.
    pub init_script: Option<String>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            channel: ChannelConfig::default(),
            evaluate_timeout: Duration::from_secs(30),
            exists_probe_timeout: Duration::from_millis(500),
            reused_ready_timeout: Duration::from_secs(3),
            fresh_ready_timeout: Duration::from_secs(15),
            init_script: None,
        }
    }
}

/// Cached per-surface state. `bounds` and `visible` mirror the last
/// acknowledged host calls, not live platform state.
#[derive(Debug, Clone)]
struct SurfaceState {
    url: String,
    proxy_url: Option<String>,
    bounds: Option<Bounds>,
    visible: bool,
}

pub struct SurfaceService {
    host: Arc<dyn SurfaceHost>,
    surfaces: RwLock<HashMap<String, SurfaceState>>,
    readiness: ReadinessTracker,
    router: Arc<InjectionRouter>,
    events: EventBus,
    config: ServiceConfig,
}

impl SurfaceService {
    pub fn new(host: Arc<dyn SurfaceHost>, events: EventBus) -> Self {
        Self::with_config(host, events, ServiceConfig::default())
    }

    pub fn with_config(
        host: Arc<dyn SurfaceHost>,
        events: EventBus,
        config: ServiceConfig,
    ) -> Self {
        let router = Arc::new(InjectionRouter::new(config.channel.clone(), events.clone()));
        Self {
            host,
            surfaces: RwLock::new(HashMap::new()),
            readiness: ReadinessTracker::default(),
            router,
            events,
            config,
        }
    }

    pub fn router(&self) -> Arc<InjectionRouter> {
        self.router.clone()
    }

    pub fn readiness(&self) -> &ReadinessTracker {
        &self.readiness
    }

    /// Create the surface if it does not exist, otherwise attach to the
    /// cached one. An existing surface keeps its page: only bounds are
    /// refreshed. A proxy change is the one exception, the old surface
    /// is closed and a fresh one created under the new proxy.
    pub async fn ensure(
        &self,
        id: &str,
        url: &str,
        bounds: Bounds,
        proxy: Option<&ProxyConfig>,
    ) -> Result<()> {
        let proxy_url = match proxy {
            Some(config) => Some(normalize_proxy_url(config)?),
            None => None,
        };

        let existing = self.surfaces.read().await.get(id).cloned();
        if let Some(state) = existing {
            if state.proxy_url == proxy_url {
                if state.url != url {
                    debug!(surface_id = %id, "surface reused, keeping its live page");
                }
                return self.update_bounds(id, &bounds).await;
            }
            info!(surface_id = %id, "proxy changed, recreating surface");
            self.close(id).await?;
        }

        let mut descriptor =
            SurfaceDescriptor::new(id, url, bounds.clone()).with_proxy_url(proxy_url.clone());
        if let Some(script) = &self.config.init_script {
            descriptor = descriptor.with_init_script(script.clone());
        }

        if let Err(e) = self.host.create_surface(&descriptor).await {
            return Err(match e {
                HostError::SurfaceCreate(reason) => SurfaceError::Create {
                    id: id.to_string(),
                    reason,
                },
                other => other.into(),
            });
        }

        self.readiness.mark_load_started(id);
        self.events.publish(HostEvent::LoadStarted { id: id.to_string() });

        self.surfaces.write().await.insert(
            id.to_string(),
            SurfaceState {
                url: url.to_string(),
                proxy_url,
                bounds: Some(bounds),
                visible: false,
            },
        );
        info!(surface_id = %id, url = %url, "surface created");
        Ok(())
    }

    /// Push new bounds to the host unless they match the cache within
    /// the shared epsilon.
    pub async fn update_bounds(&self, id: &str, bounds: &Bounds) -> Result<()> {
        {
            let surfaces = self.surfaces.read().await;
            let Some(state) = surfaces.get(id) else {
                return Err(SurfaceError::TransientMissing(id.to_string()));
            };
            if let Some(cached) = &state.bounds
                && cached.approx_eq(bounds)
            {
                return Ok(());
            }
        }

        self.host
            .set_surface_bounds(id, bounds)
            .await
            .map_err(map_missing(id))?;

        if let Some(state) = self.surfaces.write().await.get_mut(id) {
            state.bounds = Some(bounds.clone());
        }
        Ok(())
    }

    /// Recompute bounds from a fresh window layout and push if changed.
    pub async fn sync_bounds(&self, id: &str, layout: &WindowLayout) -> Result<()> {
        self.update_bounds(id, &compute_surface_bounds(layout)).await
    }

    pub async fn show(&self, id: &str) -> Result<()> {
        self.set_visibility(id, true).await
    }

    pub async fn hide(&self, id: &str) -> Result<()> {
        self.set_visibility(id, false).await
    }

    async fn set_visibility(&self, id: &str, visible: bool) -> Result<()> {
        {
            let surfaces = self.surfaces.read().await;
            let Some(state) = surfaces.get(id) else {
                return Err(SurfaceError::TransientMissing(id.to_string()));
            };
            if state.visible == visible {
                return Ok(());
            }
        }

        let call = if visible {
            self.host.show_surface(id).await
        } else {
            self.host.hide_surface(id).await
        };
        call.map_err(map_missing(id))?;

        if let Some(state) = self.surfaces.write().await.get_mut(id) {
            state.visible = visible;
        }
        Ok(())
    }

    pub async fn is_visible(&self, id: &str) -> bool {
        self.surfaces
            .read()
            .await
            .get(id)
            .map(|state| state.visible)
            .unwrap_or(false)
    }

    /// Close and drop all local state. The host call is always issued,
    /// the cache only says what we last saw. A host that no longer
    /// knows the id is treated as already closed.
    pub async fn close(&self, id: &str) -> Result<()> {
        let result = self.host.close_surface(id).await;
        self.surfaces.write().await.remove(id);
        self.readiness.forget(id);
        match result {
            Ok(()) => Ok(()),
            Err(HostError::SurfaceMissing(_)) => {
                debug!(surface_id = %id, "close on a surface that was already gone");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Best effort. Focus is a nicety, a failure is logged and dropped.
    pub async fn set_focus(&self, id: &str) {
        if let Err(e) = self.host.focus_surface(id).await {
            warn!(surface_id = %id, error = %e, "focus request failed");
        }
    }

    /// Ask the host whether the surface really exists, retrying brief
    /// host errors. Persistent errors count as "does not exist".
    pub async fn check_exists(&self, id: &str) -> bool {
        let host = self.host.clone();
        poll_until(
            Duration::from_millis(50),
            self.config.exists_probe_timeout,
            || {
                let host = host.clone();
                async move { host.surface_exists(id).await.ok() }
            },
        )
        .await
        .unwrap_or(false)
    }

    /// Resolves `true` once the page reports ready, `false` when the
    /// timeout lapses first. Never errors.
    pub async fn wait_for_load_finished(&self, id: &str, timeout: Duration) -> bool {
        self.readiness.wait_ready(id, timeout).await
    }

    /// A surviving surface is usually already loaded, a fresh one gets
    /// the long budget.
    pub async fn ready_timeout_for(&self, id: &str) -> Duration {
        if self.check_exists(id).await {
            self.config.reused_ready_timeout
        } else {
            self.config.fresh_ready_timeout
        }
    }

    pub async fn run_actions(
        &self,
        id: &str,
        actions: &[InjectionAction],
    ) -> Result<InjectionResult> {
        self.run_actions_with_timeout(id, actions, self.config.evaluate_timeout)
            .await
    }

    /// Compile, inject, and await the aggregated result of a sequence.
    pub async fn run_actions_with_timeout(
        &self,
        id: &str,
        actions: &[InjectionAction],
        timeout: Duration,
    ) -> Result<InjectionResult> {
        if !self.surfaces.read().await.contains_key(id) {
            return Err(SurfaceError::TransientMissing(id.to_string()));
        }

        let prepared = self.router.prepare(actions).await?;
        debug!(
            surface_id = %id,
            correlation_id = %prepared.correlation_id,
            actions = actions.len(),
            "running action sequence"
        );

        if let Err(e) = self.host.run_script(id, &prepared.script).await {
            self.router.abandon(&prepared.correlation_id).await;
            return Err(map_missing(id)(e));
        }

        self.router.wait(prepared, timeout).await
    }

    /// Inject an ad-hoc script and return immediately. The outcome
    /// arrives later as an injection-result event keyed by the ack's
    /// correlation id.
    pub async fn evaluate_script(&self, id: &str, script: &str) -> Result<EvaluateAck> {
        if !self.surfaces.read().await.contains_key(id) {
            return Err(SurfaceError::TransientMissing(id.to_string()));
        }

        let action = InjectionAction::Custom {
            script: script.to_string(),
        };
        let prepared = self.router.prepare(std::slice::from_ref(&action)).await?;
        let ack = prepared.ack();

        if let Err(e) = self.host.run_script(id, &prepared.script).await {
            self.router.abandon(&prepared.correlation_id).await;
            return Err(map_missing(id)(e));
        }

        self.router.detach(prepared, self.config.evaluate_timeout);
        Ok(ack)
    }

    pub async fn surface_ids(&self) -> Vec<String> {
        self.surfaces.read().await.keys().cloned().collect()
    }

    /// Route an intercepted navigation. `true` means it carried a
    /// side-channel frame and the host must cancel it.
    pub async fn handle_navigation(&self, url: &Url) -> bool {
        self.router.handle_navigation(url).await
    }

    /// Host callback: the page began a navigation.
    pub fn notify_load_started(&self, id: &str) {
        self.readiness.mark_load_started(id);
        self.events.publish(HostEvent::LoadStarted { id: id.to_string() });
    }

    /// Host callback: the page finished loading.
    pub fn notify_load_finished(&self, id: &str) {
        self.readiness.mark_ready(id);
        self.events.publish(HostEvent::Ready { id: id.to_string() });
    }
}

fn map_missing(id: &str) -> impl FnOnce(HostError) -> SurfaceError + '_ {
    move |e| match e {
        HostError::SurfaceMissing(_) => SurfaceError::TransientMissing(id.to_string()),
        other => other.into(),
    }
}

// ============ Tests ============

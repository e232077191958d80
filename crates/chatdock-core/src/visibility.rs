//! Window-level show/hide orchestration.
//!
//! Embedded surfaces are siblings of the UI layer, not children of it:
//! hiding the host window alone would leave them floating. The
//! coordinator sequences both layers and remembers which surfaces it
//! hid so restore brings back exactly those.
//!
//! Two hide paths exist. A UI-initiated hide puts the surfaces away
//! first and lets the window close over a finished scene. A
//! host-initiated hide (global shortcut, tray) broadcasts first so the
//! UI can settle, then hides surfaces and gives the scene a short
//! grace period before the window goes.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use chatdock_contracts::HostEvent;

use crate::error::Result;
use crate::events::EventBus;
use crate::host::SurfaceHost;
use crate::service::SurfaceService;

/// Settle time between hiding surfaces and hiding the window on the
/// host-initiated path.
const HIDE_GRACE: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisibilityState {
    Visible,
    Hiding,
    Hidden,
    Showing,
}

struct CoordinatorState {
    phase: VisibilityState,
    /// Surfaces this coordinator hid and still owes a show.
    restorable: Vec<String>,
}

pub struct VisibilityCoordinator {
    service: Arc<SurfaceService>,
    host: Arc<dyn SurfaceHost>,
    events: EventBus,
    state: Mutex<CoordinatorState>,
}

impl VisibilityCoordinator {
    pub fn new(service: Arc<SurfaceService>, host: Arc<dyn SurfaceHost>, events: EventBus) -> Self {
        Self {
            service,
            host,
            events,
            state: Mutex::new(CoordinatorState {
                phase: VisibilityState::Visible,
                restorable: Vec::new(),
            }),
        }
    }

    pub async fn state(&self) -> VisibilityState {
        self.state.lock().await.phase
    }

    /// Hide requested from inside the UI (close button, menu item).
    /// Surfaces go first, then the broadcast, then the window.
    pub async fn hide_from_ui(&self) -> Result<()> {
        if !self.begin(VisibilityState::Visible, VisibilityState::Hiding).await {
            return Ok(());
        }

        let hidden = self.hide_all_surfaces().await;
        self.events.publish(HostEvent::HideAllSurfaces {
            mark_for_restore: true,
        });

        self.finish_hide(hidden).await
    }

    /// Hide requested from outside the UI (global shortcut, tray). The
    /// broadcast goes out while the window is still up, then surfaces
    /// hide and the window follows after a short grace.
    pub async fn hide_from_host(&self) -> Result<()> {
        if !self.begin(VisibilityState::Visible, VisibilityState::Hiding).await {
            return Ok(());
        }

        self.events.publish(HostEvent::HideAllSurfaces {
            mark_for_restore: true,
        });
        let hidden = self.hide_all_surfaces().await;
        tokio::time::sleep(HIDE_GRACE).await;

        self.finish_hide(hidden).await
    }

    /// Bring the window back first so surfaces reattach to a visible
    /// parent, then show everything hidden on the way down.
    pub async fn restore(&self) -> Result<()> {
        if !self.begin(VisibilityState::Hidden, VisibilityState::Showing).await {
            return Ok(());
        }

        if let Err(e) = self.host.show_window().await {
            self.finish(VisibilityState::Hidden, Vec::new()).await;
            return Err(e.into());
        }

        self.events.publish(HostEvent::RestoreSurfaces);

        let restorable = {
            let mut state = self.state.lock().await;
            std::mem::take(&mut state.restorable)
        };
        for id in &restorable {
            if let Err(e) = self.service.show(id).await {
                warn!(surface_id = %id, error = %e, "surface did not come back");
            }
        }

        self.finish(VisibilityState::Visible, Vec::new()).await;
        info!(restored = restorable.len(), "window restored");
        Ok(())
    }

    /// Global-shortcut entry point. Mid-transition presses are dropped,
    /// the running transition finishes first.
    pub async fn toggle(&self) -> Result<()> {
        match self.state().await {
            VisibilityState::Visible => {
                // The OS can minimize the window without the
                // coordinator noticing; a press then means surface it.
                if matches!(self.host.window_visible().await, Ok(false)) {
                    if self
                        .begin(VisibilityState::Visible, VisibilityState::Hidden)
                        .await
                    {
                        return self.restore().await;
                    }
                    return Ok(());
                }
                self.hide_from_host().await
            }
            VisibilityState::Hidden => self.restore().await,
            other => {
                debug!(state = ?other, "toggle ignored mid-transition");
                Ok(())
            }
        }
    }

    /// Atomically claim the transition. Any other phase means another
    /// flow is mid-flight or the work is already done.
    async fn begin(&self, expected: VisibilityState, next: VisibilityState) -> bool {
        let mut state = self.state.lock().await;
        if state.phase != expected {
            debug!(current = ?state.phase, requested = ?next, "visibility transition rejected");
            return false;
        }
        state.phase = next;
        true
    }

    async fn finish(&self, phase: VisibilityState, newly_hidden: Vec<String>) {
        let mut state = self.state.lock().await;
        state.phase = phase;
        for id in newly_hidden {
            if !state.restorable.contains(&id) {
                state.restorable.push(id);
            }
        }
    }

    /// Hide every visible surface, best effort. A surface that refuses
    /// stays off the restore list; a retry can pick it up later.
    async fn hide_all_surfaces(&self) -> Vec<String> {
        let mut hidden = Vec::new();
        for id in self.service.surface_ids().await {
            if !self.service.is_visible(&id).await {
                continue;
            }
            match self.service.hide(&id).await {
                Ok(()) => hidden.push(id),
                Err(e) => warn!(surface_id = %id, error = %e, "surface did not hide"),
            }
        }
        hidden
    }

    async fn finish_hide(&self, hidden: Vec<String>) -> Result<()> {
        match self.host.hide_window().await {
            Ok(()) => {
                self.finish(VisibilityState::Hidden, hidden).await;
                info!("window hidden");
                Ok(())
            }
            Err(e) => {
                // Surfaces are already away; keep them on the restore
                // list so a retry or restore still finds them.
                self.finish(VisibilityState::Visible, hidden).await;
                Err(e.into())
            }
        }
    }
}

// ============ Tests ============

//! Per-surface readiness: a load flag plus waiters.
//!
//! "Load started" flips a surface not-ready; "load finished" flips it
//! ready and wakes every waiter. Waits are bounded and resolve on
//! timeout instead of failing: a lost finished signal should degrade
//! into optimistic progress, not a hang.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::Notify;
use tracing::debug;

#[derive(Default)]
struct ReadinessEntry {
    ready: AtomicBool,
    notify: Notify,
}

/// Tracks readiness per surface id. Cloning shares the same state.
#[derive(Clone, Default)]
pub struct ReadinessTracker {
    entries: Arc<DashMap<String, Arc<ReadinessEntry>>>,
}

impl ReadinessTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&self, id: &str) -> Arc<ReadinessEntry> {
        self.entries
            .entry(id.to_string())
            .or_insert_with(|| Arc::new(ReadinessEntry::default()))
            .value()
            .clone()
    }

    /// A new page load began (including the first one on creation).
    pub fn mark_load_started(&self, id: &str) {
        let entry = self.entry(id);
        entry.ready.store(false, Ordering::SeqCst);
        debug!(surface_id = %id, "load started");
    }

    /// The current page finished loading; wake all waiters.
    pub fn mark_ready(&self, id: &str) {
        let entry = self.entry(id);
        entry.ready.store(true, Ordering::SeqCst);
        entry.notify.notify_waiters();
        debug!(surface_id = %id, "surface ready");
    }

    pub fn is_ready(&self, id: &str) -> bool {
        self.entries
            .get(id)
            .map(|entry| entry.ready.load(Ordering::SeqCst))
            .unwrap_or(false)
    }

    /// Wait until the surface is ready or `timeout` elapses.
    ///
    /// Resolves immediately for an already-ready surface. Returns the
    /// final ready state; `false` means the deadline passed without a
    /// finished signal. Never an error.
    pub async fn wait_ready(&self, id: &str, timeout: Duration) -> bool {
        let entry = self.entry(id);
        let start = tokio::time::Instant::now();
        loop {
            if entry.ready.load(Ordering::SeqCst) {
                return true;
            }

            let remaining = timeout
                .checked_sub(start.elapsed())
                .unwrap_or_else(|| Duration::from_millis(0));
            if remaining.is_zero() {
                debug!(surface_id = %id, "ready wait timed out; proceeding");
                return false;
            }

            let notified = tokio::time::timeout(remaining, entry.notify.notified()).await;
            if notified.is_err() {
                return entry.ready.load(Ordering::SeqCst);
            }
        }
    }

    /// Drop state for a closed surface and wake anyone still waiting.
    pub fn forget(&self, id: &str) {
        if let Some((_, entry)) = self.entries.remove(id) {
            entry.notify.notify_waiters();
        }
    }
}

// ============ Tests ============

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn already_ready_resolves_immediately() {
        let tracker = ReadinessTracker::new();
        tracker.mark_ready("a");

        let start = tokio::time::Instant::now();
        assert!(tracker.wait_ready("a", Duration::from_secs(5)).await);
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[tokio::test]
    async fn waiter_wakes_on_ready_signal() {
        let tracker = ReadinessTracker::new();
        tracker.mark_load_started("a");

        let waiter = {
            let tracker = tracker.clone();
            tokio::spawn(async move { tracker.wait_ready("a", Duration::from_secs(5)).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        tracker.mark_ready("a");

        assert!(waiter.await.unwrap());
    }

    #[tokio::test]
    async fn timeout_resolves_false_instead_of_failing() {
        let tracker = ReadinessTracker::new();
        let start = tokio::time::Instant::now();
        let ready = tracker.wait_ready("never", Duration::from_millis(60)).await;
        assert!(!ready);
        assert!(start.elapsed() >= Duration::from_millis(60));
    }

    #[tokio::test]
    async fn new_load_resets_readiness() {
        let tracker = ReadinessTracker::new();
        tracker.mark_ready("a");
        assert!(tracker.is_ready("a"));

        tracker.mark_load_started("a");
        assert!(!tracker.is_ready("a"));
        assert!(!tracker.wait_ready("a", Duration::from_millis(30)).await);
    }

    #[tokio::test]
    async fn forget_clears_state() {
        let tracker = ReadinessTracker::new();
        tracker.mark_ready("a");
        tracker.forget("a");
        assert!(!tracker.is_ready("a"));
    }
}

//! Bounded retry-until-deadline combinator.

use std::future::Future;
use std::time::Duration;

/// Poll `probe` every `interval` until it yields a value or `timeout`
/// elapses. Returns `None` on deadline; the probe runs once more right
/// at the deadline so a late success is not thrown away.
///
/// Host-side twin of the in-page poll combinator the injected scripts
/// carry.
pub async fn poll_until<T, F, Fut>(interval: Duration, timeout: Duration, mut probe: F) -> Option<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Option<T>>,
{
    let start = tokio::time::Instant::now();
    loop {
        if let Some(value) = probe().await {
            return Some(value);
        }
        let elapsed = start.elapsed();
        if elapsed >= timeout {
            return None;
        }
        let remaining = timeout - elapsed;
        tokio::time::sleep(remaining.min(interval)).await;
    }
}

// ============ Tests ============

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn resolves_as_soon_as_the_probe_yields() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let probe_attempts = attempts.clone();
        let value = poll_until(
            Duration::from_millis(5),
            Duration::from_millis(500),
            move || {
                let attempts = probe_attempts.clone();
                async move {
                    if attempts.fetch_add(1, Ordering::SeqCst) >= 2 {
                        Some(42)
                    } else {
                        None
                    }
                }
            },
        )
        .await;
        assert_eq!(value, Some(42));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn returns_none_at_the_deadline() {
        let start = tokio::time::Instant::now();
        let value: Option<()> = poll_until(
            Duration::from_millis(10),
            Duration::from_millis(60),
            || async { None },
        )
        .await;
        assert_eq!(value, None);
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(60), "gave up early: {elapsed:?}");
        assert!(elapsed < Duration::from_millis(200), "overshot: {elapsed:?}");
    }
}

//! Coalesced change signal shared by all monitored entries

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::Notify;

/// Why a wait returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wake {
    /// At least one watched value changed since the last wake
    Changed,
    /// The full wait period elapsed without a change
    Elapsed,
}

/// A single coalesced wake condition.
///
/// Every monitored entry signals the same aggregator on every delivered
/// update. The waiter consumes the pending signal atomically on wake, and
/// any number of updates between two wakes collapse into one: correctness
/// relies on each expansion pass re-reading every cache entry, so
/// intermediate values are allowed to go unrendered.
#[derive(Debug, Default)]
pub struct ChangeAggregator {
    notify: Notify,
    signals: AtomicU64,
}

impl ChangeAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one update. Never blocks; safe to call from any delivery
    /// path.
    pub fn signal(&self) {
        self.signals.fetch_add(1, Ordering::Relaxed);
        self.notify.notify_one();
    }

    /// Wait until a signal arrives or `period` elapses, whichever comes
    /// first. A signal raised while nobody was waiting is consumed by the
    /// next call, so an update is never lost between wakes.
    pub async fn wait_timeout(&self, period: Duration) -> Wake {
        tokio::select! {
            _ = self.notify.notified() => Wake::Changed,
            _ = tokio::time::sleep(period) => Wake::Elapsed,
        }
    }

    /// Total updates signaled since construction.
    pub fn signal_count(&self) -> u64 {
        self.signals.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_signal_wakes_waiter() {
        let agg = std::sync::Arc::new(ChangeAggregator::new());
        let waiter = {
            let agg = agg.clone();
            tokio::spawn(async move { agg.wait_timeout(Duration::from_secs(5)).await })
        };
        tokio::task::yield_now().await;
        agg.signal();
        assert_eq!(waiter.await.unwrap(), Wake::Changed);
    }

    #[tokio::test]
    async fn test_timeout_without_signal() {
        let agg = ChangeAggregator::new();
        assert_eq!(
            agg.wait_timeout(Duration::from_millis(10)).await,
            Wake::Elapsed
        );
    }

    #[tokio::test]
    async fn test_rapid_signals_coalesce_into_one_wake() {
        let agg = ChangeAggregator::new();
        for _ in 0..5 {
            agg.signal();
        }
        assert_eq!(agg.signal_count(), 5);

        // one pending wake for all five updates
        assert_eq!(
            agg.wait_timeout(Duration::from_millis(50)).await,
            Wake::Changed
        );
        assert_eq!(
            agg.wait_timeout(Duration::from_millis(20)).await,
            Wake::Elapsed
        );
    }

    #[tokio::test]
    async fn test_signal_before_wait_is_not_lost() {
        let agg = ChangeAggregator::new();
        agg.signal();
        assert_eq!(
            agg.wait_timeout(Duration::from_secs(5)).await,
            Wake::Changed
        );
    }
}

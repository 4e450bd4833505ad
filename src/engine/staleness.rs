use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::model::{MonthKey, Ms};
use crate::observability;

use super::cache::MonthCache;

/// Time-based background refresh trigger. A single `refreshing` flag
/// serializes background refreshes; the cache's own `last_refresh` stamp is
/// the staleness clock. The refresh is silent and does not rebuild the grid —
/// the next natural trigger picks up the merged data, avoiding mid-gesture
/// flicker.
pub struct StalenessGuard {
    refreshing: AtomicBool,
    stale_after: Duration,
}

impl StalenessGuard {
    pub fn new(stale_after: Duration) -> Self {
        Self {
            refreshing: AtomicBool::new(false),
            stale_after,
        }
    }

    pub fn is_refreshing(&self) -> bool {
        self.refreshing.load(Ordering::Acquire)
    }

    /// Check staleness and, if due, start one background forced refresh of
    /// the given months. Returns whether a refresh task was spawned.
    pub fn maybe_refresh(
        self: &Arc<Self>,
        cache: Arc<MonthCache>,
        months: BTreeSet<MonthKey>,
        now: Ms,
    ) -> bool {
        let age_ms = now - cache.last_refresh_ms();
        if age_ms <= self.stale_after.as_millis() as Ms {
            return false;
        }
        if self
            .refreshing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }

        metrics::counter!(observability::BACKGROUND_REFRESHES_TOTAL).increment(1);
        let guard = self.clone();
        tokio::spawn(async move {
            if let Err(e) = cache.ensure(&months, true, true).await {
                // Non-fatal: the cache is untouched and a later trigger retries.
                tracing::debug!("background refresh failed: {e}");
            }
            guard.refreshing.store(false, Ordering::Release);
        });
        true
    }
}

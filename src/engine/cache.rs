use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use dashmap::DashMap;

use crate::api::CalendarSource;
use crate::model::{MonthKey, Ms, SlotKey, SlotKind, SlotRecord};
use crate::notify::{NoticeKind, Signal, SignalHub};
use crate::observability;

use super::{now_ms, EngineError};

/// Month-granular slot cache. Records are keyed by (date, kind); months are
/// tracked in a loaded-set so one `ensure` call fetches each month at most
/// once. Merge is last-write-wins per key, so out-of-order completions and
/// overlapping concurrent ensures are safe (only bandwidth is wasted).
pub struct MonthCache {
    slots: DashMap<SlotKey, SlotRecord>,
    loaded: DashMap<MonthKey, ()>,
    /// When the cache was last confirmed fresh against the backend.
    last_refresh_ms: AtomicI64,
    source: Arc<dyn CalendarSource>,
    signals: Arc<SignalHub>,
}

impl MonthCache {
    pub fn new(source: Arc<dyn CalendarSource>, signals: Arc<SignalHub>) -> Self {
        Self {
            slots: DashMap::new(),
            loaded: DashMap::new(),
            last_refresh_ms: AtomicI64::new(0),
            source,
            signals,
        }
    }

    /// Make sure every month in `months` is loaded. `force` refetches even
    /// already-loaded months; `silent` suppresses the loading indicator and
    /// failure notice (background refresh). Returns whether a fetch was
    /// issued. On failure the cache is left exactly as it was — no partial
    /// merge, failed months stay unloaded.
    pub async fn ensure(
        &self,
        months: &BTreeSet<MonthKey>,
        silent: bool,
        force: bool,
    ) -> Result<bool, EngineError> {
        let missing: BTreeSet<MonthKey> = if force {
            months.clone()
        } else {
            months
                .iter()
                .copied()
                .filter(|m| !self.loaded.contains_key(m))
                .collect()
        };
        if missing.is_empty() {
            return Ok(false);
        }

        if !silent {
            self.signals.send(Signal::Loading(true));
        }
        metrics::histogram!(observability::FETCH_BATCH_SIZE).record(missing.len() as f64);
        let fetch_start = std::time::Instant::now();
        let result = self.source.fetch_months(&missing).await;
        metrics::histogram!(observability::FETCH_DURATION_SECONDS)
            .record(fetch_start.elapsed().as_secs_f64());
        if !silent {
            self.signals.send(Signal::Loading(false));
        }

        let by_month = match result {
            Ok(by_month) => by_month,
            Err(e) => {
                metrics::counter!(observability::FETCHES_TOTAL, "outcome" => "error").increment(1);
                tracing::warn!("month fetch failed for {:?}: {e}", missing);
                if !silent {
                    self.signals.notice(NoticeKind::Error, format!("calendar refresh failed: {e}"));
                }
                return Err(e.into());
            }
        };
        metrics::counter!(observability::FETCHES_TOTAL, "outcome" => "ok").increment(1);

        for records in by_month.values() {
            for record in records {
                self.merge(record.clone());
            }
        }
        for month in &missing {
            self.loaded.insert(*month, ());
        }
        self.last_refresh_ms.store(now_ms(), Ordering::Relaxed);
        metrics::gauge!(observability::CACHED_SLOTS).set(self.slots.len() as f64);
        Ok(true)
    }

    /// Overwrite-merge one record. Idempotent and commutative per key.
    pub fn merge(&self, record: SlotRecord) {
        self.slots.insert(record.key(), record);
    }

    pub fn get(&self, date: chrono::NaiveDate, kind: SlotKind) -> Option<SlotRecord> {
        self.slots.get(&SlotKey::new(date, kind)).map(|e| e.value().clone())
    }

    pub fn get_by_key(&self, key: &SlotKey) -> Option<SlotRecord> {
        self.slots.get(key).map(|e| e.value().clone())
    }

    pub fn is_loaded(&self, month: &MonthKey) -> bool {
        self.loaded.contains_key(month)
    }

    pub fn last_refresh_ms(&self) -> Ms {
        self.last_refresh_ms.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Drop everything — records, loaded-set, refresh stamp. Used on
    /// credential change, where the whole visible dataset is re-scoped.
    pub fn reset(&self) {
        self.slots.clear();
        self.loaded.clear();
        self.last_refresh_ms.store(0, Ordering::Relaxed);
        metrics::gauge!(observability::CACHED_SLOTS).set(0.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::HashMap;
    use std::sync::atomic::AtomicBool;

    use async_trait::async_trait;
    use chrono::NaiveDate;
    use tokio::sync::Mutex;
    use ulid::Ulid;

    use crate::api::{ApiError, CalendarSource};
    use crate::model::{SlotStatus, SlotKind};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn record(d: NaiveDate, kind: SlotKind, reserved: u32) -> SlotRecord {
        SlotRecord {
            id: Ulid::new(),
            date: d,
            kind,
            status: SlotStatus::Published,
            title: None,
            description: None,
            capacity: 50,
            reserved,
            base_price_cents: 2000,
            per_user_limit: 1,
            addons: Vec::new(),
            viewer_reserved: false,
        }
    }

    /// Records every fetch; serves a fixed record set; can be told to fail.
    struct ScriptedSource {
        records: Vec<SlotRecord>,
        calls: Mutex<Vec<BTreeSet<MonthKey>>>,
        fail: AtomicBool,
    }

    impl ScriptedSource {
        fn new(records: Vec<SlotRecord>) -> Self {
            Self {
                records,
                calls: Mutex::new(Vec::new()),
                fail: AtomicBool::new(false),
            }
        }
    }

    #[async_trait]
    impl CalendarSource for ScriptedSource {
        async fn fetch_months(
            &self,
            months: &BTreeSet<MonthKey>,
        ) -> Result<HashMap<MonthKey, Vec<SlotRecord>>, ApiError> {
            self.calls.lock().await.push(months.clone());
            if self.fail.load(Ordering::Relaxed) {
                return Err(ApiError::Network("fetch refused".into()));
            }
            let mut out: HashMap<MonthKey, Vec<SlotRecord>> = HashMap::new();
            for m in months {
                out.insert(
                    *m,
                    self.records
                        .iter()
                        .filter(|r| m.contains(r.date))
                        .cloned()
                        .collect(),
                );
            }
            Ok(out)
        }

        async fn fetch_slot(&self, slot_id: Ulid) -> Result<SlotRecord, ApiError> {
            self.records
                .iter()
                .find(|r| r.id == slot_id)
                .cloned()
                .ok_or_else(|| ApiError::Validation("no such slot".into()))
        }
    }

    fn cache_with(records: Vec<SlotRecord>) -> (MonthCache, Arc<ScriptedSource>) {
        let source = Arc::new(ScriptedSource::new(records));
        let cache = MonthCache::new(source.clone(), Arc::new(SignalHub::new()));
        (cache, source)
    }

    #[tokio::test]
    async fn ensure_fetches_exactly_the_missing_subset() {
        let (cache, source) = cache_with(vec![record(date(2024, 6, 3), SlotKind::First, 0)]);
        let june = MonthKey::new(2024, 6);
        let july = MonthKey::new(2024, 7);

        let fetched = cache.ensure(&BTreeSet::from([june]), false, false).await.unwrap();
        assert!(fetched);

        // June is now loaded — asking for June+July must fetch only July.
        let fetched = cache.ensure(&BTreeSet::from([june, july]), false, false).await.unwrap();
        assert!(fetched);

        let calls = source.calls.lock().await;
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1], BTreeSet::from([july]));
    }

    #[tokio::test]
    async fn ensure_with_everything_loaded_is_a_noop() {
        let (cache, source) = cache_with(vec![]);
        let june = MonthKey::new(2024, 6);
        cache.ensure(&BTreeSet::from([june]), false, false).await.unwrap();

        let fetched = cache.ensure(&BTreeSet::from([june]), false, false).await.unwrap();
        assert!(!fetched);
        assert_eq!(source.calls.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn force_refetches_loaded_months() {
        let (cache, source) = cache_with(vec![]);
        let june = MonthKey::new(2024, 6);
        cache.ensure(&BTreeSet::from([june]), false, false).await.unwrap();
        cache.ensure(&BTreeSet::from([june]), true, true).await.unwrap();
        assert_eq!(source.calls.lock().await.len(), 2);
    }

    #[tokio::test]
    async fn failed_fetch_leaves_cache_untouched() {
        let d = date(2024, 6, 3);
        let (cache, source) = cache_with(vec![record(d, SlotKind::First, 5)]);
        let june = MonthKey::new(2024, 6);
        cache.ensure(&BTreeSet::from([june]), false, false).await.unwrap();
        let before = cache.get(d, SlotKind::First).unwrap();
        let stamp_before = cache.last_refresh_ms();

        source.fail.store(true, Ordering::Relaxed);
        let july = MonthKey::new(2024, 7);
        let err = cache
            .ensure(&BTreeSet::from([july]), false, false)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Api(ApiError::Network(_))));

        // July not marked loaded; June's record and the stamp are unchanged.
        assert!(!cache.is_loaded(&july));
        assert_eq!(cache.get(d, SlotKind::First).unwrap(), before);
        assert_eq!(cache.last_refresh_ms(), stamp_before);
    }

    #[tokio::test]
    async fn merge_is_last_write_wins_regardless_of_order() {
        let (cache, _) = cache_with(vec![]);
        let d = date(2024, 6, 3);

        let mut a = record(d, SlotKind::First, 1);
        let mut b = record(d, SlotKind::First, 2);
        b.id = a.id;
        a.reserved = 1;
        b.reserved = 2;

        cache.merge(a.clone());
        cache.merge(b.clone());
        assert_eq!(cache.get(d, SlotKind::First).unwrap().reserved, 2);

        // Reapplying an older snapshot is safe — last merge wins again.
        cache.merge(a.clone());
        assert_eq!(cache.get(d, SlotKind::First).unwrap().reserved, 1);
        cache.merge(a);
        assert_eq!(cache.get(d, SlotKind::First).unwrap().reserved, 1);
    }

    #[tokio::test]
    async fn first_and_second_slots_are_distinct_keys() {
        let d = date(2024, 6, 3);
        let (cache, _) = cache_with(vec![
            record(d, SlotKind::First, 1),
            record(d, SlotKind::Second, 2),
        ]);
        cache
            .ensure(&BTreeSet::from([MonthKey::new(2024, 6)]), false, false)
            .await
            .unwrap();
        assert_eq!(cache.get(d, SlotKind::First).unwrap().reserved, 1);
        assert_eq!(cache.get(d, SlotKind::Second).unwrap().reserved, 2);
    }

    #[tokio::test]
    async fn reset_clears_records_and_loaded_set() {
        let d = date(2024, 6, 3);
        let (cache, source) = cache_with(vec![record(d, SlotKind::First, 0)]);
        let june = MonthKey::new(2024, 6);
        cache.ensure(&BTreeSet::from([june]), false, false).await.unwrap();
        assert!(cache.get(d, SlotKind::First).is_some());

        cache.reset();
        assert!(cache.get(d, SlotKind::First).is_none());
        assert!(!cache.is_loaded(&june));
        assert_eq!(cache.last_refresh_ms(), 0);

        // A later ensure refetches the month.
        cache.ensure(&BTreeSet::from([june]), false, false).await.unwrap();
        assert_eq!(source.calls.lock().await.len(), 2);
        assert!(cache.get(d, SlotKind::First).is_some());
    }

    #[tokio::test]
    async fn non_silent_ensure_emits_loading_signals() {
        let source = Arc::new(ScriptedSource::new(vec![]));
        let hub = Arc::new(SignalHub::new());
        let mut rx = hub.subscribe();
        let cache = MonthCache::new(source, hub);

        cache
            .ensure(&BTreeSet::from([MonthKey::new(2024, 6)]), false, false)
            .await
            .unwrap();
        assert_eq!(rx.try_recv().unwrap(), Signal::Loading(true));
        assert_eq!(rx.try_recv().unwrap(), Signal::Loading(false));
    }

    #[tokio::test]
    async fn silent_ensure_emits_nothing() {
        let source = Arc::new(ScriptedSource::new(vec![]));
        let hub = Arc::new(SignalHub::new());
        let mut rx = hub.subscribe();
        let cache = MonthCache::new(source, hub);

        cache
            .ensure(&BTreeSet::from([MonthKey::new(2024, 6)]), true, true)
            .await
            .unwrap();
        assert!(rx.try_recv().is_err());
    }
}

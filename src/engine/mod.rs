mod admin;
mod booking;
mod cache;
mod error;
mod gesture;
mod project;
mod staleness;
mod window;

pub use admin::{can_transition, needs_destructive_change, validate_draft, MutationPlanner};
pub use booking::{decide_action, BookingCoordinator, SlotAction};
pub use cache::MonthCache;
pub use error::EngineError;
pub use gesture::{DragOutcome, GesturePager, PageDirection, PagerPhase};
pub use project::{colors_for, project};
pub use staleness::StalenessGuard;
pub use window::{months_covering, monday_of, WindowState, DAYS_PER_WEEK, PAGE_DAYS, WINDOW_WEEKS};

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use chrono::NaiveDate;
use tokio::sync::broadcast;

use crate::api::{
    effective_page_height, ApiError, CalendarSource, ReservationApi, SlotApi, Viewport,
};
use crate::config::EngineConfig;
use crate::model::{
    LedgerInfo, Ms, PublishDraft, SlotKey, SlotRecord, SlotStatus, ViewerContext,
};
use crate::notify::{NoticeKind, Signal, SignalHub};
use crate::observability;

pub(crate) fn now_ms() -> Ms {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_millis() as Ms
}

/// Re-entrancy guard for a mutating workflow. Client-side UX guard only —
/// the server stays the authority on idempotency.
pub(crate) struct SubmitGuard {
    busy: AtomicBool,
}

impl SubmitGuard {
    pub(crate) fn new() -> Self {
        Self {
            busy: AtomicBool::new(false),
        }
    }

    pub(crate) fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    fn try_begin(&self) -> bool {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn end(&self) {
        self.busy.store(false, Ordering::Release);
    }
}

/// Run one mutation under the workflow's submit guard with the client-side
/// safety timeout. The timeout force-clears the busy flag and reports a
/// notice; the request may still land server-side, reconciled by the next
/// forced refresh.
pub(crate) async fn submit_with_timeout<T, F>(
    guard: &SubmitGuard,
    timeout: Duration,
    what: &'static str,
    signals: &SignalHub,
    fut: F,
) -> Result<T, EngineError>
where
    F: Future<Output = Result<T, ApiError>>,
{
    if !guard.try_begin() {
        return Err(EngineError::Busy(what));
    }
    let outcome = tokio::time::timeout(timeout, fut).await;
    guard.end();
    match outcome {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => {
            tracing::warn!("{what} failed: {e}");
            signals.notice(NoticeKind::Error, e.to_string());
            Err(e.into())
        }
        Err(_) => {
            metrics::counter!(observability::SUBMIT_TIMEOUTS_TOTAL).increment(1);
            tracing::warn!("{what} hit the client-side safety timeout");
            signals.notice(NoticeKind::Error, "network timeout");
            Err(EngineError::Timeout(what))
        }
    }
}

/// The sliding-window calendar engine: month cache, 9-week grid, gesture
/// paging, staleness refresh, and the two mutation workflows, wired together
/// behind explicit collaborator traits.
pub struct CalendarEngine {
    cfg: EngineConfig,
    cache: Arc<MonthCache>,
    signals: Arc<SignalHub>,
    staleness: Arc<StalenessGuard>,
    pager: Mutex<GesturePager>,
    window: RwLock<WindowState>,
    viewer: RwLock<ViewerContext>,
    planner: MutationPlanner,
    booking: BookingCoordinator,
}

impl CalendarEngine {
    pub fn new(
        source: Arc<dyn CalendarSource>,
        slots: Arc<dyn SlotApi>,
        reservations: Arc<dyn ReservationApi>,
        viewport: Arc<dyn Viewport>,
        viewer: ViewerContext,
        cfg: EngineConfig,
        anchor: NaiveDate,
    ) -> Arc<Self> {
        let signals = Arc::new(SignalHub::new());
        let cache = Arc::new(MonthCache::new(source, signals.clone()));
        let staleness = Arc::new(StalenessGuard::new(cfg.stale_after));
        let page_height =
            effective_page_height(viewport.as_ref(), cfg.viewport_fallback_ratio);
        let pager = Mutex::new(GesturePager::new(cfg.clone(), page_height));
        let planner =
            MutationPlanner::new(slots, cache.clone(), signals.clone(), cfg.clone());
        let booking =
            BookingCoordinator::new(reservations, cache.clone(), signals.clone(), cfg.clone());
        let grid = window::build(anchor, today(), &cache);

        Arc::new(Self {
            cfg,
            cache,
            signals,
            staleness,
            pager,
            window: RwLock::new(grid),
            viewer: RwLock::new(viewer),
            planner,
            booking,
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Signal> {
        self.signals.subscribe()
    }

    pub fn cache(&self) -> &MonthCache {
        &self.cache
    }

    pub fn planner(&self) -> &MutationPlanner {
        &self.planner
    }

    pub fn booking(&self) -> &BookingCoordinator {
        &self.booking
    }

    pub fn viewer(&self) -> ViewerContext {
        self.viewer.read().expect("viewer lock").clone()
    }

    /// Snapshot of the current grid with the live gesture state overlaid.
    pub fn window(&self) -> WindowState {
        let mut w = self.window.read().expect("window lock").clone();
        let pager = self.pager.lock().expect("pager lock");
        w.drag_offset_px = pager.offset_px();
        w.page_offset = pager.page_offset();
        w.animating = pager.animating();
        w
    }

    pub fn anchor(&self) -> NaiveDate {
        self.window.read().expect("window lock").anchor
    }

    // ── Navigation ───────────────────────────────────────────

    /// Jump to a date: load its window's months, then rebuild the grid.
    pub async fn show(&self, anchor: NaiveDate) {
        let _ = self
            .cache
            .ensure(&window::months_covering(anchor), false, false)
            .await;
        self.rebuild_at(anchor);
    }

    /// Re-ensure the current window's months and rebuild. `force` refetches
    /// even loaded months.
    pub async fn refresh(&self, force: bool) {
        let anchor = self.anchor();
        let _ = self
            .cache
            .ensure(&window::months_covering(anchor), false, force)
            .await;
        self.rebuild_at(anchor);
    }

    fn rebuild_at(&self, anchor: NaiveDate) {
        let grid = window::build(anchor, today(), &self.cache);
        *self.window.write().expect("window lock") = grid;
        self.signals.send(Signal::GridRebuilt);
    }

    // ── Gesture paging ───────────────────────────────────────

    /// Touch down. Also the staleness checkpoint: a stale cache starts one
    /// silent background refresh (no grid rebuild until the next trigger).
    pub fn drag_start(&self, x: f32, y: f32) -> bool {
        let accepted = self
            .pager
            .lock()
            .expect("pager lock")
            .drag_start(x, y, now_ms());
        if accepted {
            let months = window::months_covering(self.anchor());
            self.staleness
                .maybe_refresh(self.cache.clone(), months, now_ms());
        }
        accepted
    }

    /// Touch move: transient visual offset only. Never touches the network.
    pub fn drag_move(&self, x: f32, y: f32) -> f32 {
        self.pager.lock().expect("pager lock").drag_move(x, y)
    }

    /// Touch up: decide commit vs snap-back and run the fixed-duration
    /// transition on a wall-clock timer, independent of any fetch.
    pub fn drag_end(self: &Arc<Self>, x: f32, y: f32) -> DragOutcome {
        let outcome = self.pager.lock().expect("pager lock").drag_end(x, y);
        if outcome != DragOutcome::Ignored {
            let engine = self.clone();
            tokio::spawn(async move {
                engine.run_transition().await;
            });
        }
        outcome
    }

    async fn run_transition(&self) {
        tokio::time::sleep(self.cfg.page_duration).await;
        let delta = self.pager.lock().expect("pager lock").finish();
        let Some(days) = delta else {
            return; // snap-back: grid unchanged
        };

        let direction = if days > 0 { "forward" } else { "backward" };
        metrics::counter!(observability::PAGE_TRANSITIONS_TOTAL, "direction" => direction)
            .increment(1);

        // Rebuild immediately from whatever is cached; cells for unloaded
        // months render empty until the pending load resolves.
        let anchor = self.anchor() + chrono::Duration::days(days);
        self.rebuild_at(anchor);
        if let Ok(true) = self
            .cache
            .ensure(&window::months_covering(anchor), false, false)
            .await
        {
            self.rebuild_at(anchor);
        }
    }

    // ── Viewer context ───────────────────────────────────────

    /// Apply an updated viewer context. A credential change invalidates the
    /// whole cache and force-reloads the window currently on screen.
    pub async fn set_viewer(&self, viewer: ViewerContext) {
        let credential_changed = {
            let mut current = self.viewer.write().expect("viewer lock");
            let changed = current.credential != viewer.credential;
            *current = viewer;
            changed
        };
        if credential_changed {
            self.cache.reset();
            let anchor = self.anchor();
            let _ = self
                .cache
                .ensure(&window::months_covering(anchor), false, true)
                .await;
            self.rebuild_at(anchor);
        }
    }

    // ── Actions and mutations ────────────────────────────────

    /// What tapping the given slot cell should do for the current viewer.
    pub fn action_for(&self, key: &SlotKey) -> SlotAction {
        let viewer = self.viewer();
        match self.cache.get_by_key(key) {
            Some(r) => decide_action(r.status, r.remaining(), r.viewer_reserved, &viewer),
            None => decide_action(SlotStatus::Unpublished, 0, false, &viewer),
        }
    }

    /// Draft + original snapshot for the publish form at `key`.
    pub fn draft_for(&self, key: &SlotKey) -> (PublishDraft, Option<SlotRecord>) {
        match self.cache.get_by_key(key) {
            Some(r) if r.status != SlotStatus::Canceled => {
                (PublishDraft::from_record(&r), Some(r))
            }
            // Canceled republishes fresh — the old record is not an original.
            _ => (PublishDraft::blank(key.date, key.kind), None),
        }
    }

    pub async fn publish(
        &self,
        draft: &PublishDraft,
        original: Option<&SlotRecord>,
    ) -> Result<SlotRecord, EngineError> {
        let viewer = self.viewer();
        let record = self.planner.submit_publish(&viewer, draft, original).await?;
        self.rebuild_at(self.anchor());
        Ok(record)
    }

    pub async fn change_status(
        &self,
        key: &SlotKey,
        to: SlotStatus,
    ) -> Result<SlotRecord, EngineError> {
        let viewer = self.viewer();
        let record = self.planner.transition(&viewer, key, to).await?;
        self.rebuild_at(self.anchor());
        Ok(record)
    }

    pub async fn reserve(
        &self,
        key: &SlotKey,
        addon_ids: &[String],
    ) -> Result<LedgerInfo, EngineError> {
        let viewer = self.viewer();
        let ledger = self.booking.reserve(&viewer, key, addon_ids).await?;
        self.rebuild_at(self.anchor());
        Ok(ledger)
    }

    pub async fn modify_reservation(
        &self,
        key: &SlotKey,
        addon_ids: &[String],
    ) -> Result<LedgerInfo, EngineError> {
        let viewer = self.viewer();
        let ledger = self.booking.modify(&viewer, key, addon_ids).await?;
        self.rebuild_at(self.anchor());
        Ok(ledger)
    }

    pub async fn cancel_reservation(&self, key: &SlotKey) -> Result<LedgerInfo, EngineError> {
        let viewer = self.viewer();
        let ledger = self.booking.cancel(&viewer, key).await?;
        self.rebuild_at(self.anchor());
        Ok(ledger)
    }
}

fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::api::ReservationApi;
use crate::config::EngineConfig;
use crate::model::{LedgerInfo, MonthKey, SlotKey, SlotStatus, ViewerContext};
use crate::notify::{Signal, SignalHub};
use crate::observability;

use super::cache::MonthCache;
use super::{submit_with_timeout, EngineError, SubmitGuard};

/// What a tap on a slot cell offers the viewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotAction {
    /// Bookable and not yet booked — open the reservation form.
    Create,
    /// Viewer already holds the reservation — open it for editing.
    Modify,
    /// Nothing to change; the reason is shown as-is.
    ReadOnly(&'static str),
    /// Admin on an unpublished/canceled cell — open the publish draft.
    Publish,
    /// Consumer on an unpublished/canceled cell — just a notice.
    Unavailable,
}

/// Status-driven action selection. Pure — the table from which every tap
/// handler is derived.
pub fn decide_action(
    status: SlotStatus,
    remaining: u32,
    viewer_reserved: bool,
    viewer: &ViewerContext,
) -> SlotAction {
    match status {
        SlotStatus::Published if viewer_reserved => SlotAction::Modify,
        SlotStatus::Published if remaining > 0 => SlotAction::Create,
        SlotStatus::Published => SlotAction::ReadOnly("sold out"),
        SlotStatus::Locked if viewer_reserved => {
            SlotAction::ReadOnly("locked, you have a reservation")
        }
        SlotStatus::Locked => SlotAction::ReadOnly("locked, you missed it"),
        SlotStatus::Completed => SlotAction::ReadOnly("ended"),
        SlotStatus::Unpublished | SlotStatus::Canceled => {
            if viewer.is_admin && viewer.admin_view {
                SlotAction::Publish
            } else {
                SlotAction::Unavailable
            }
        }
    }
}

/// Consumer booking workflow. Routes create/modify/cancel to the reservation
/// API, forwards the returned ledger figures for display, and force-refreshes
/// the owning month afterwards — remaining capacity and reservation ownership
/// are never derived from the request payload.
pub struct BookingCoordinator {
    api: Arc<dyn ReservationApi>,
    cache: Arc<MonthCache>,
    signals: Arc<SignalHub>,
    cfg: EngineConfig,
    submitting: SubmitGuard,
}

impl BookingCoordinator {
    pub fn new(
        api: Arc<dyn ReservationApi>,
        cache: Arc<MonthCache>,
        signals: Arc<SignalHub>,
        cfg: EngineConfig,
    ) -> Self {
        Self {
            api,
            cache,
            signals,
            cfg,
            submitting: SubmitGuard::new(),
        }
    }

    pub fn is_submitting(&self) -> bool {
        self.submitting.is_busy()
    }

    /// Place a new reservation on the slot at `key`.
    pub async fn reserve(
        &self,
        viewer: &ViewerContext,
        key: &SlotKey,
        addon_ids: &[String],
    ) -> Result<LedgerInfo, EngineError> {
        let record = self.lookup(key)?;
        match decide_action(record.status, record.remaining(), record.viewer_reserved, viewer) {
            SlotAction::Create => {}
            _ => return Err(EngineError::NotActionable(record.status)),
        }
        let api = self.api.clone();
        let id = record.id;
        let addons = addon_ids.to_vec();
        let ledger = submit_with_timeout(
            &self.submitting,
            self.cfg.submit_timeout,
            "reservation",
            &self.signals,
            async move { api.create_reservation(id, &addons).await },
        )
        .await?;
        self.settle(key, "create_reservation", ledger).await;
        Ok(ledger)
    }

    /// Change the addon selection on the viewer's existing reservation.
    pub async fn modify(
        &self,
        viewer: &ViewerContext,
        key: &SlotKey,
        addon_ids: &[String],
    ) -> Result<LedgerInfo, EngineError> {
        let record = self.lookup(key)?;
        match decide_action(record.status, record.remaining(), record.viewer_reserved, viewer) {
            SlotAction::Modify => {}
            _ => return Err(EngineError::NotActionable(record.status)),
        }
        let api = self.api.clone();
        let id = record.id;
        let addons = addon_ids.to_vec();
        let ledger = submit_with_timeout(
            &self.submitting,
            self.cfg.submit_timeout,
            "reservation",
            &self.signals,
            async move { api.update_reservation(id, &addons).await },
        )
        .await?;
        self.settle(key, "update_reservation", ledger).await;
        Ok(ledger)
    }

    /// Cancel the viewer's reservation. Only possible while the slot is
    /// still published (modifiable).
    pub async fn cancel(
        &self,
        viewer: &ViewerContext,
        key: &SlotKey,
    ) -> Result<LedgerInfo, EngineError> {
        let record = self.lookup(key)?;
        match decide_action(record.status, record.remaining(), record.viewer_reserved, viewer) {
            SlotAction::Modify => {}
            _ => return Err(EngineError::NotActionable(record.status)),
        }
        let api = self.api.clone();
        let id = record.id;
        let ledger = submit_with_timeout(
            &self.submitting,
            self.cfg.submit_timeout,
            "reservation",
            &self.signals,
            async move { api.cancel_reservation(id).await },
        )
        .await?;
        self.settle(key, "cancel_reservation", ledger).await;
        Ok(ledger)
    }

    fn lookup(&self, key: &SlotKey) -> Result<crate::model::SlotRecord, EngineError> {
        self.cache
            .get_by_key(key)
            .ok_or(EngineError::SlotNotFound(*key))
    }

    /// Post-success bookkeeping: forward the ledger, record the metric, and
    /// force-refresh the owning month so the next grid build shows the
    /// server's counts.
    async fn settle(&self, key: &SlotKey, op: &'static str, ledger: LedgerInfo) {
        metrics::counter!(observability::MUTATIONS_TOTAL, "op" => op, "outcome" => "ok")
            .increment(1);
        self.signals.send(Signal::Ledger(ledger));
        let months = BTreeSet::from([MonthKey::of(key.date)]);
        let _ = self.cache.ensure(&months, false, true).await;
    }
}

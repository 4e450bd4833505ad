use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use crate::api::{SlotApi, SlotFields};
use crate::config::EngineConfig;
use crate::model::{PublishDraft, SlotKey, SlotRecord, SlotStatus, ViewerContext};
use crate::notify::SignalHub;
use crate::observability;

use super::cache::MonthCache;
use super::{submit_with_timeout, EngineError, SubmitGuard};

/// True iff submitting the draft over the original can silently invalidate
/// commitments already made against the slot: a price change (already
/// charged), a capacity below the existing reservation count, or the removal
/// of an addon someone may have selected. Any of these must route through
/// repost instead of an in-place update.
pub fn needs_destructive_change(original: &SlotRecord, draft: &PublishDraft) -> bool {
    if draft.base_price_cents != original.base_price_cents {
        return true;
    }
    if draft.capacity < original.reserved {
        return true;
    }
    let draft_ids: HashSet<&str> = draft.addons.iter().map(|a| a.id.as_str()).collect();
    original
        .addons
        .iter()
        .any(|a| !draft_ids.contains(a.id.as_str()))
}

/// Slot status machine. Completed and Canceled are terminal.
pub fn can_transition(from: SlotStatus, to: SlotStatus) -> bool {
    use SlotStatus::*;
    matches!(
        (from, to),
        (Unpublished, Published)
            | (Published, Locked)
            | (Published, Completed)
            | (Published, Canceled)
            | (Locked, Published)
            | (Locked, Completed)
            | (Locked, Canceled)
    )
}

/// Field checks before a draft goes on the wire. The server revalidates;
/// this only saves a round trip.
pub fn validate_draft(draft: &PublishDraft) -> Result<(), EngineError> {
    if draft.capacity < 1 {
        return Err(EngineError::InvalidDraft("capacity must be at least 1"));
    }
    if draft.base_price_cents <= 0 {
        return Err(EngineError::InvalidDraft("base price must be positive"));
    }
    let mut seen = HashSet::new();
    for addon in &draft.addons {
        if !seen.insert(addon.id.as_str()) {
            return Err(EngineError::InvalidDraft("addon ids must be unique"));
        }
    }
    Ok(())
}

fn fields_from(draft: &PublishDraft) -> SlotFields {
    SlotFields {
        date: draft.date,
        kind: draft.kind,
        title: draft.title.clone(),
        description: draft.description.clone(),
        base_price_cents: draft.base_price_cents,
        capacity: draft.capacity,
        per_user_limit: draft.per_user_limit,
        addons: draft.addons.clone(),
    }
}

/// Admin slot-publishing workflow: decides create vs update vs repost,
/// validates status transitions, and force-refreshes the owning month after
/// every successful mutation — the server response is displayed but never
/// merged as the source of truth for counts.
pub struct MutationPlanner {
    api: Arc<dyn SlotApi>,
    cache: Arc<MonthCache>,
    signals: Arc<SignalHub>,
    cfg: EngineConfig,
    submitting: SubmitGuard,
}

impl MutationPlanner {
    pub fn new(
        api: Arc<dyn SlotApi>,
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

    /// Submit a publish draft. `original` is the snapshot the draft was
    /// seeded from: `None` publishes a new slot; otherwise the destructive-
    /// change check picks update vs repost. On failure the draft is the
    /// caller's to keep — nothing here is mutated.
    pub async fn submit_publish(
        &self,
        viewer: &ViewerContext,
        draft: &PublishDraft,
        original: Option<&SlotRecord>,
    ) -> Result<SlotRecord, EngineError> {
        if !viewer.is_admin {
            return Err(EngineError::NotAdmin);
        }
        validate_draft(draft)?;

        let fields = fields_from(draft);
        let (op, call): (&'static str, _) = match original {
            None => ("create_slot", OpCall::Create(fields)),
            Some(orig) if needs_destructive_change(orig, draft) => {
                ("repost_slot", OpCall::Repost(orig.id, fields))
            }
            Some(orig) => ("update_slot", OpCall::Update(orig.id, fields)),
        };

        let api = self.api.clone();
        let record = submit_with_timeout(
            &self.submitting,
            self.cfg.submit_timeout,
            "publish",
            &self.signals,
            async move {
                match call {
                    OpCall::Create(f) => api.create_slot(f).await,
                    OpCall::Update(id, f) => api.update_slot(id, f).await,
                    OpCall::Repost(id, f) => api.repost_slot(id, f).await,
                }
            },
        )
        .await?;
        metrics::counter!(observability::MUTATIONS_TOTAL, "op" => op, "outcome" => "ok")
            .increment(1);

        self.refresh_after(draft.date, original.map(|o| o.date)).await;
        Ok(record)
    }

    /// Direct status transition: lock, unlock, complete or cancel. Cancel's
    /// refunds happen server-side. The transition is validated against the
    /// cached record before the call goes out.
    pub async fn transition(
        &self,
        viewer: &ViewerContext,
        key: &SlotKey,
        to: SlotStatus,
    ) -> Result<SlotRecord, EngineError> {
        if !viewer.is_admin {
            return Err(EngineError::NotAdmin);
        }
        let record = self
            .cache
            .get_by_key(key)
            .ok_or(EngineError::SlotNotFound(*key))?;
        if !can_transition(record.status, to) {
            return Err(EngineError::InvalidTransition {
                from: record.status,
                to,
            });
        }

        let api = self.api.clone();
        let id = record.id;
        let from = record.status;
        let (op, fut): (&'static str, _) = match (from, to) {
            (SlotStatus::Published, SlotStatus::Locked) => {
                ("lock_slot", OpCall2::Lock(id))
            }
            (SlotStatus::Locked, SlotStatus::Published) => {
                ("unlock_slot", OpCall2::Unlock(id))
            }
            (_, SlotStatus::Completed) => ("complete_slot", OpCall2::Complete(id)),
            (_, SlotStatus::Canceled) => ("cancel_slot", OpCall2::Cancel(id)),
            _ => return Err(EngineError::InvalidTransition { from, to }),
        };

        let result = submit_with_timeout(
            &self.submitting,
            self.cfg.submit_timeout,
            "status change",
            &self.signals,
            async move {
                match fut {
                    OpCall2::Lock(id) => api.lock_slot(id).await,
                    OpCall2::Unlock(id) => api.unlock_slot(id).await,
                    OpCall2::Complete(id) => api.complete_slot(id).await,
                    OpCall2::Cancel(id) => api.cancel_slot(id).await,
                }
            },
        )
        .await?;
        metrics::counter!(observability::MUTATIONS_TOTAL, "op" => op, "outcome" => "ok")
            .increment(1);

        self.refresh_after(key.date, None).await;
        Ok(result)
    }

    /// Force-refresh the month(s) a mutation touched. A refresh failure is
    /// already surfaced as a notice by the cache; the stale view stands
    /// until the next trigger.
    async fn refresh_after(&self, date: chrono::NaiveDate, original_date: Option<chrono::NaiveDate>) {
        let mut months = BTreeSet::from([crate::model::MonthKey::of(date)]);
        if let Some(d) = original_date {
            months.insert(crate::model::MonthKey::of(d));
        }
        let _ = self.cache.ensure(&months, false, true).await;
    }
}

enum OpCall {
    Create(SlotFields),
    Update(ulid::Ulid, SlotFields),
    Repost(ulid::Ulid, SlotFields),
}

enum OpCall2 {
    Lock(ulid::Ulid),
    Unlock(ulid::Ulid),
    Complete(ulid::Ulid),
    Cancel(ulid::Ulid),
}

use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use ulid::Ulid;

use crate::model::{LedgerInfo, MonthKey, SlotRecord};

/// Failure surfaced by an external collaborator. The engine treats all of
/// these as transient notices; it never mutates cache or draft state on
/// failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// Transport-level failure (unreachable, 5xx, decode).
    Network(String),
    /// The request was understood and rejected (bad fields).
    Validation(String),
    /// The credential is not allowed to perform the operation.
    Permission(String),
    /// Server-side capacity or concurrent-edit conflict.
    Conflict(String),
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiError::Network(m) => write!(f, "network error: {m}"),
            ApiError::Validation(m) => write!(f, "validation error: {m}"),
            ApiError::Permission(m) => write!(f, "permission denied: {m}"),
            ApiError::Conflict(m) => write!(f, "conflict: {m}"),
        }
    }
}

impl std::error::Error for ApiError {}

/// Fields sent with create/update/repost slot mutations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotFields {
    pub date: chrono::NaiveDate,
    pub kind: crate::model::SlotKind,
    pub title: Option<String>,
    pub description: Option<String>,
    pub base_price_cents: crate::model::Cents,
    pub capacity: u32,
    pub per_user_limit: u32,
    pub addons: Vec<crate::model::Addon>,
}

/// Read side of the calendar service.
#[async_trait]
pub trait CalendarSource: Send + Sync {
    /// Batched month fetch — one round trip for the whole set.
    async fn fetch_months(
        &self,
        months: &BTreeSet<MonthKey>,
    ) -> Result<HashMap<MonthKey, Vec<SlotRecord>>, ApiError>;

    /// Full single-slot detail, including addons.
    async fn fetch_slot(&self, slot_id: Ulid) -> Result<SlotRecord, ApiError>;
}

/// Admin slot mutations. Each returns the resulting record as the server
/// sees it; the engine still re-fetches the owning month afterwards.
#[async_trait]
pub trait SlotApi: Send + Sync {
    async fn create_slot(&self, fields: SlotFields) -> Result<SlotRecord, ApiError>;
    async fn update_slot(&self, slot_id: Ulid, fields: SlotFields) -> Result<SlotRecord, ApiError>;
    /// Destructive replace: discards existing reservations and republishes.
    async fn repost_slot(&self, slot_id: Ulid, fields: SlotFields) -> Result<SlotRecord, ApiError>;
    async fn lock_slot(&self, slot_id: Ulid) -> Result<SlotRecord, ApiError>;
    async fn unlock_slot(&self, slot_id: Ulid) -> Result<SlotRecord, ApiError>;
    async fn complete_slot(&self, slot_id: Ulid) -> Result<SlotRecord, ApiError>;
    /// Refunds for existing reservations happen server-side.
    async fn cancel_slot(&self, slot_id: Ulid) -> Result<SlotRecord, ApiError>;
}

/// Consumer reservation mutations. Returned ledger figures are owned by the
/// external ledger; the engine forwards them for display only.
#[async_trait]
pub trait ReservationApi: Send + Sync {
    async fn create_reservation(
        &self,
        slot_id: Ulid,
        addon_ids: &[String],
    ) -> Result<LedgerInfo, ApiError>;
    async fn update_reservation(
        &self,
        slot_id: Ulid,
        addon_ids: &[String],
    ) -> Result<LedgerInfo, ApiError>;
    async fn cancel_reservation(&self, slot_id: Ulid) -> Result<LedgerInfo, ApiError>;
}

/// Pixel-measurement collaborator for the paging gesture.
pub trait Viewport: Send + Sync {
    /// Height available for one page (3 weeks). `None` or zero means the
    /// measurement failed and the fallback ratio applies.
    fn page_height_px(&self) -> Option<f32>;
    fn screen_height_px(&self) -> f32;
}

/// Resolve the effective page height, falling back to a configured fraction
/// of screen height when measurement fails.
pub fn effective_page_height(viewport: &dyn Viewport, fallback_ratio: f32) -> f32 {
    match viewport.page_height_px() {
        Some(h) if h > 0.0 => h,
        _ => viewport.screen_height_px() * fallback_ratio,
    }
}

use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Unix milliseconds — the only wall-clock time type.
pub type Ms = i64;

/// Money in cents. Addon prices may be negative (discounts).
pub type Cents = i64;

/// Which of the two daily slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotKind {
    First,
    Second,
}

/// Lifecycle status of a slot. Never physically deleted — only transitioned
/// to `Canceled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotStatus {
    Unpublished,
    Published,
    Locked,
    Completed,
    Canceled,
}

/// Optional extra item attached to a slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Addon {
    pub id: String,
    pub name: String,
    pub price_cents: Cents,
}

/// Year-month key for the calendar cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MonthKey {
    pub year: i32,
    pub month: u32,
}

impl MonthKey {
    pub fn new(year: i32, month: u32) -> Self {
        debug_assert!((1..=12).contains(&month), "month out of range");
        Self { year, month }
    }

    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date.year() == self.year && date.month() == self.month
    }
}

impl std::fmt::Display for MonthKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// Unique slot address: one slot per (date, kind).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SlotKey {
    pub date: NaiveDate,
    pub kind: SlotKind,
}

impl SlotKey {
    pub fn new(date: NaiveDate, kind: SlotKind) -> Self {
        Self { date, kind }
    }

    pub fn month(&self) -> MonthKey {
        MonthKey::of(self.date)
    }
}

/// A slot record as the calendar service returns it. `viewer_reserved` is
/// scoped to the credential the fetch was made with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotRecord {
    pub id: Ulid,
    pub date: NaiveDate,
    pub kind: SlotKind,
    pub status: SlotStatus,
    pub title: Option<String>,
    pub description: Option<String>,
    /// Always ≥ 1 for a published slot.
    pub capacity: u32,
    pub reserved: u32,
    pub base_price_cents: Cents,
    pub per_user_limit: u32,
    pub addons: Vec<Addon>,
    pub viewer_reserved: bool,
}

impl SlotRecord {
    pub fn key(&self) -> SlotKey {
        SlotKey::new(self.date, self.kind)
    }

    pub fn remaining(&self) -> u32 {
        self.capacity.saturating_sub(self.reserved)
    }

    pub fn is_bookable(&self) -> bool {
        self.status == SlotStatus::Published && self.remaining() > 0
    }
}

/// Ledger figures returned by reservation mutations. Owned by the external
/// ledger collaborator; the engine only forwards them for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerInfo {
    pub balance_cents: Cents,
    pub overdraft_cents: Cents,
}

/// Background/foreground color pair for a calendar cell half.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellColors {
    pub background: &'static str,
    pub foreground: &'static str,
}

/// Ephemeral display projection of one slot. Derived, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotView {
    pub status: SlotStatus,
    pub remaining: u32,
    pub viewer_reserved: bool,
    /// Status line, e.g. "open" / "sold out" / "locked".
    pub status_line: String,
    /// Booking line, e.g. "booked" / "12 left" / "not booked".
    pub booking_line: String,
    pub colors: CellColors,
}

/// One cell of the 9×7 window grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarCell {
    pub date: NaiveDate,
    pub weekday: Weekday,
    pub in_display_month: bool,
    pub is_today: bool,
    pub label: String,
    pub first: SlotView,
    pub second: SlotView,
}

/// Admin edit buffer for publishing or editing a slot, diffed against a
/// snapshot of the original record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishDraft {
    pub date: NaiveDate,
    pub kind: SlotKind,
    pub title: Option<String>,
    pub description: Option<String>,
    pub base_price_cents: Cents,
    pub capacity: u32,
    pub per_user_limit: u32,
    pub addons: Vec<Addon>,
}

impl PublishDraft {
    /// Start a fresh draft for an empty (unpublished) cell.
    pub fn blank(date: NaiveDate, kind: SlotKind) -> Self {
        Self {
            date,
            kind,
            title: None,
            description: None,
            base_price_cents: 0,
            capacity: 1,
            per_user_limit: 1,
            addons: Vec::new(),
        }
    }

    /// Seed a draft from an existing record for in-place editing.
    pub fn from_record(record: &SlotRecord) -> Self {
        Self {
            date: record.date,
            kind: record.kind,
            title: record.title.clone(),
            description: record.description.clone(),
            base_price_cents: record.base_price_cents,
            capacity: record.capacity,
            per_user_limit: record.per_user_limit,
            addons: record.addons.clone(),
        }
    }
}

/// Who is looking. Passed in explicitly — the engine never reads ambient
/// globals for role flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewerContext {
    pub is_admin: bool,
    /// Admin may toggle the management view off to see the consumer layout.
    pub admin_view: bool,
    /// Opaque access credential scoping the visible dataset.
    pub credential: String,
}

impl ViewerContext {
    pub fn consumer(credential: impl Into<String>) -> Self {
        Self {
            is_admin: false,
            admin_view: false,
            credential: credential.into(),
        }
    }

    pub fn admin(credential: impl Into<String>) -> Self {
        Self {
            is_admin: true,
            admin_view: true,
            credential: credential.into(),
        }
    }
}

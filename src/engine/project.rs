use crate::model::{CellColors, SlotRecord, SlotStatus, SlotView};

// Cell palette. Background first, foreground second.
const TONE_MUTED: CellColors = CellColors { background: "#f5f5f5", foreground: "#9e9e9e" };
const TONE_OPEN: CellColors = CellColors { background: "#e8f5e9", foreground: "#2e7d32" };
const TONE_BOOKED: CellColors = CellColors { background: "#e3f2fd", foreground: "#1565c0" };
const TONE_FULL: CellColors = CellColors { background: "#fff3e0", foreground: "#e65100" };
const TONE_LOCKED: CellColors = CellColors { background: "#ede7f6", foreground: "#4527a0" };
const TONE_ENDED: CellColors = CellColors { background: "#eeeeee", foreground: "#616161" };

/// Project a slot record into its display view. `None` means the cell has no
/// record for this (date, kind) — rendered as an implicit unpublished slot.
/// Pure: no I/O, no randomness.
pub fn project(record: Option<&SlotRecord>) -> SlotView {
    let Some(record) = record else {
        return unpublished_view();
    };

    let remaining = record.remaining();
    let viewer_reserved = record.viewer_reserved;
    let booking_line = if viewer_reserved {
        "booked".to_string()
    } else {
        "not booked".to_string()
    };

    match record.status {
        // Canceled gets the same visual treatment as unpublished.
        SlotStatus::Unpublished | SlotStatus::Canceled => unpublished_view(),
        SlotStatus::Published if remaining > 0 => SlotView {
            status: SlotStatus::Published,
            remaining,
            viewer_reserved,
            status_line: "open".to_string(),
            booking_line: if viewer_reserved {
                "booked".to_string()
            } else {
                format!("{remaining} left")
            },
            colors: colors_for(SlotStatus::Published, true, viewer_reserved),
        },
        SlotStatus::Published => SlotView {
            status: SlotStatus::Published,
            remaining: 0,
            viewer_reserved,
            status_line: "sold out".to_string(),
            booking_line,
            colors: colors_for(SlotStatus::Published, false, viewer_reserved),
        },
        SlotStatus::Locked => SlotView {
            status: SlotStatus::Locked,
            remaining,
            viewer_reserved,
            status_line: "locked".to_string(),
            booking_line,
            colors: colors_for(SlotStatus::Locked, remaining > 0, viewer_reserved),
        },
        SlotStatus::Completed => SlotView {
            status: SlotStatus::Completed,
            remaining,
            viewer_reserved,
            status_line: "ended".to_string(),
            booking_line,
            colors: colors_for(SlotStatus::Completed, remaining > 0, viewer_reserved),
        },
    }
}

fn unpublished_view() -> SlotView {
    SlotView {
        status: SlotStatus::Unpublished,
        remaining: 0,
        viewer_reserved: false,
        status_line: "not published".to_string(),
        booking_line: "not booked".to_string(),
        colors: colors_for(SlotStatus::Unpublished, false, false),
    }
}

/// Deterministic color table over (status, has remaining, viewer reserved).
pub fn colors_for(status: SlotStatus, has_remaining: bool, viewer_reserved: bool) -> CellColors {
    match (status, has_remaining, viewer_reserved) {
        (SlotStatus::Unpublished | SlotStatus::Canceled, _, _) => TONE_MUTED,
        (SlotStatus::Published, _, true) => TONE_BOOKED,
        (SlotStatus::Published, true, false) => TONE_OPEN,
        (SlotStatus::Published, false, false) => TONE_FULL,
        (SlotStatus::Locked, _, _) => TONE_LOCKED,
        (SlotStatus::Completed, _, _) => TONE_ENDED,
    }
}

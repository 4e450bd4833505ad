use crate::config::EngineConfig;
use crate::model::Ms;

use super::window::PAGE_DAYS;

/// Which way a committed page transition moves the anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageDirection {
    /// Swipe up — anchor advances by one page (+21 days).
    Forward,
    /// Swipe down — anchor moves back by one page (−21 days).
    Backward,
}

impl PageDirection {
    pub fn day_delta(self) -> i64 {
        match self {
            PageDirection::Forward => PAGE_DAYS as i64,
            PageDirection::Backward => -(PAGE_DAYS as i64),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            PageDirection::Forward => "forward",
            PageDirection::Backward => "backward",
        }
    }
}

/// Drag/animation state, modeled as an explicit machine instead of scattered
/// flags. `Committing` and `SnappingBack` last one animation timer tick and
/// are left via `finish`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PagerPhase {
    Idle,
    Dragging { origin_x: f32, origin_y: f32, started_at: Ms },
    Committing { direction: PageDirection },
    SnappingBack,
}

/// Outcome of a drag-end, decided against the commit threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragOutcome {
    /// Horizontal-dominant gesture — snap back, anchor untouched.
    Ignored,
    /// Vertical but under threshold — animate back to 0, anchor untouched.
    SnapBack,
    /// Past threshold — animate one page and shift the anchor.
    Commit(PageDirection),
}

/// Touch-delta → page-transition state machine. Drag handling is purely
/// visual; only a committed transition changes the anchor, and that happens
/// in the engine after the animation timer fires.
pub struct GesturePager {
    phase: PagerPhase,
    page_height: f32,
    /// Transient visual offset in pixels, clamped while dragging.
    offset_px: f32,
    cfg: EngineConfig,
}

impl GesturePager {
    pub fn new(cfg: EngineConfig, page_height: f32) -> Self {
        Self {
            phase: PagerPhase::Idle,
            page_height,
            offset_px: 0.0,
            cfg,
        }
    }

    pub fn phase(&self) -> PagerPhase {
        self.phase
    }

    pub fn offset_px(&self) -> f32 {
        self.offset_px
    }

    pub fn page_height(&self) -> f32 {
        self.page_height
    }

    /// Re-measure (e.g. on rotation). Ignored mid-gesture.
    pub fn set_page_height(&mut self, page_height: f32) {
        if self.phase == PagerPhase::Idle {
            self.page_height = page_height;
        }
    }

    /// Visual translate target during a transition: −1 page for forward,
    /// +1 for backward, 0 otherwise.
    pub fn page_offset(&self) -> i8 {
        match self.phase {
            PagerPhase::Committing { direction: PageDirection::Forward } => -1,
            PagerPhase::Committing { direction: PageDirection::Backward } => 1,
            _ => 0,
        }
    }

    pub fn animating(&self) -> bool {
        matches!(self.phase, PagerPhase::Committing { .. } | PagerPhase::SnappingBack)
    }

    /// Begin a drag. Returns false (and ignores the touch) while a
    /// transition animation is still running.
    pub fn drag_start(&mut self, x: f32, y: f32, now: Ms) -> bool {
        if self.animating() {
            return false;
        }
        self.phase = PagerPhase::Dragging { origin_x: x, origin_y: y, started_at: now };
        self.offset_px = 0.0;
        true
    }

    /// Update the transient offset. No state mutation beyond the visual
    /// offset, no I/O. Returns the clamped offset.
    pub fn drag_move(&mut self, _x: f32, y: f32) -> f32 {
        if let PagerPhase::Dragging { origin_y, .. } = self.phase {
            let clamp = self.cfg.drag_clamp(self.page_height);
            self.offset_px = (y - origin_y).clamp(-clamp, clamp);
        }
        self.offset_px
    }

    /// End the drag and decide commit vs snap-back. Ignores non-vertical
    /// gestures entirely.
    pub fn drag_end(&mut self, x: f32, y: f32) -> DragOutcome {
        let PagerPhase::Dragging { origin_x, origin_y, .. } = self.phase else {
            return DragOutcome::Ignored;
        };
        let dx = x - origin_x;
        let dy = y - origin_y;

        if dy.abs() <= dx.abs() {
            self.phase = PagerPhase::Idle;
            self.offset_px = 0.0;
            return DragOutcome::Ignored;
        }

        let threshold = self.cfg.commit_threshold(self.page_height);
        if dy <= -threshold {
            self.phase = PagerPhase::Committing { direction: PageDirection::Forward };
            DragOutcome::Commit(PageDirection::Forward)
        } else if dy >= threshold {
            self.phase = PagerPhase::Committing { direction: PageDirection::Backward };
            DragOutcome::Commit(PageDirection::Backward)
        } else {
            self.phase = PagerPhase::SnappingBack;
            DragOutcome::SnapBack
        }
    }

    /// Called when the fixed-duration animation timer fires. Resets the
    /// transient offset and returns the anchor day delta for a committed
    /// transition.
    pub fn finish(&mut self) -> Option<i64> {
        let delta = match self.phase {
            PagerPhase::Committing { direction } => Some(direction.day_delta()),
            PagerPhase::SnappingBack => None,
            // Idle/Dragging: spurious timer, nothing to do.
            PagerPhase::Idle | PagerPhase::Dragging { .. } => None,
        };
        if self.animating() {
            self.phase = PagerPhase::Idle;
            self.offset_px = 0.0;
        }
        delta
    }
}

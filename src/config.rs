use std::time::Duration;

/// Engine tuning knobs. Every constant the paging/refresh behavior depends on
/// is named and overridable here rather than buried in call sites.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Cache age beyond which a gesture start triggers a background refresh.
    pub stale_after: Duration,
    /// Client-side safety timeout that force-clears a stuck submitting flag.
    pub submit_timeout: Duration,
    /// Duration of the page-transition animation (wall clock, independent of
    /// network completion).
    pub page_duration: Duration,
    /// Fraction of screen height used when the viewport reports no usable
    /// page height.
    pub viewport_fallback_ratio: f32,
    /// Commit threshold as a fraction of page height, clamped below.
    pub drag_threshold_ratio: f32,
    pub drag_threshold_min_px: f32,
    pub drag_threshold_max_px: f32,
    /// Maximum transient drag offset as a fraction of page height.
    pub drag_clamp_ratio: f32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            stale_after: Duration::from_secs(10),
            submit_timeout: Duration::from_secs(15),
            page_duration: Duration::from_millis(180),
            viewport_fallback_ratio: 2.0 / 3.0,
            drag_threshold_ratio: 0.18,
            drag_threshold_min_px: 72.0,
            drag_threshold_max_px: 220.0,
            drag_clamp_ratio: 0.9,
        }
    }
}

impl EngineConfig {
    /// Commit threshold in pixels for a given page height.
    pub fn commit_threshold(&self, page_height: f32) -> f32 {
        (self.drag_threshold_ratio * page_height)
            .clamp(self.drag_threshold_min_px, self.drag_threshold_max_px)
    }

    /// Maximum visual drag offset in pixels.
    pub fn drag_clamp(&self, page_height: f32) -> f32 {
        self.drag_clamp_ratio * page_height
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_clamps_small_pages() {
        let cfg = EngineConfig::default();
        // 0.18 * 200 = 36 → clamped up to 72
        assert_eq!(cfg.commit_threshold(200.0), 72.0);
    }

    #[test]
    fn threshold_clamps_large_pages() {
        let cfg = EngineConfig::default();
        // 0.18 * 2000 = 360 → clamped down to 220
        assert_eq!(cfg.commit_threshold(2000.0), 220.0);
    }

    #[test]
    fn threshold_midrange_is_proportional() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.commit_threshold(600.0), 108.0);
    }
}

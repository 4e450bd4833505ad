// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: batched month fetches issued. Labels: outcome.
pub const FETCHES_TOTAL: &str = "mealcal_fetches_total";

/// Histogram: batched fetch latency in seconds.
pub const FETCH_DURATION_SECONDS: &str = "mealcal_fetch_duration_seconds";

/// Histogram: months per batched fetch.
pub const FETCH_BATCH_SIZE: &str = "mealcal_fetch_batch_size";

/// Counter: mutation submissions. Labels: operation, outcome.
pub const MUTATIONS_TOTAL: &str = "mealcal_mutations_total";

/// Counter: submissions cleared by the client-side safety timeout.
pub const SUBMIT_TIMEOUTS_TOTAL: &str = "mealcal_submit_timeouts_total";

// ── USE metrics (engine utilization) ────────────────────────────

/// Counter: background staleness refreshes actually started.
pub const BACKGROUND_REFRESHES_TOTAL: &str = "mealcal_background_refreshes_total";

/// Counter: committed page transitions. Labels: direction.
pub const PAGE_TRANSITIONS_TOTAL: &str = "mealcal_page_transitions_total";

/// Gauge: slot records currently cached.
pub const CACHED_SLOTS: &str = "mealcal_cached_slots";

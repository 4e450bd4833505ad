use std::collections::BTreeSet;

use chrono::{Datelike, Days, NaiveDate, Weekday};

use crate::model::{CalendarCell, MonthKey, SlotKind};

use super::cache::MonthCache;
use super::project;

/// Rows above/below the anchor week. 4 + 1 + 4 = 9 materialized weeks.
pub const WEEK_RADIUS: i64 = 4;
pub const WINDOW_WEEKS: usize = (WEEK_RADIUS * 2 + 1) as usize;
pub const DAYS_PER_WEEK: usize = 7;

/// One page of the gesture pager = 3 weeks.
pub const PAGE_WEEKS: i64 = 3;
pub const PAGE_DAYS: u64 = (PAGE_WEEKS * 7) as u64;

/// The materialized 9-week grid plus transient gesture state.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowState {
    pub anchor: NaiveDate,
    /// Monday of the anchor's ISO week; rows are offset −4..+4 from it.
    pub week_start: NaiveDate,
    /// Exactly 9 rows of 7 cells, Sunday through Saturday.
    pub rows: Vec<Vec<CalendarCell>>,
    /// Transient visual offset while dragging. Purely cosmetic.
    pub drag_offset_px: f32,
    /// −1, 0 or +1 page during a transition animation.
    pub page_offset: i8,
    pub animating: bool,
}

/// Monday on or before the given date.
pub fn monday_of(date: NaiveDate) -> NaiveDate {
    date - Days::new(date.weekday().num_days_from_monday() as u64)
}

/// All dates the 9-week window around `anchor` materializes, in order.
/// Each week row spans Sunday-before through Saturday (day offsets −1..5
/// from that week's Monday).
fn window_dates(anchor: NaiveDate) -> impl Iterator<Item = NaiveDate> {
    let week_start = monday_of(anchor);
    (-WEEK_RADIUS..=WEEK_RADIUS).flat_map(move |week| {
        let monday = week_start + chrono::Duration::days(week * 7);
        (-1..=5).map(move |day| monday + chrono::Duration::days(day))
    })
}

/// Months the current window touches — the set handed to `MonthCache::ensure`.
pub fn months_covering(anchor: NaiveDate) -> BTreeSet<MonthKey> {
    window_dates(anchor).map(MonthKey::of).collect()
}

/// Build the window grid from cached records only. Pure read — never fetches;
/// cells for unloaded months render as implicit unpublished slots.
pub fn build(anchor: NaiveDate, today: NaiveDate, cache: &MonthCache) -> WindowState {
    let week_start = monday_of(anchor);
    let display_month = MonthKey::of(anchor);

    let mut rows = Vec::with_capacity(WINDOW_WEEKS);
    let mut row = Vec::with_capacity(DAYS_PER_WEEK);
    for date in window_dates(anchor) {
        row.push(build_cell(date, today, display_month, cache));
        if row.len() == DAYS_PER_WEEK {
            rows.push(std::mem::replace(&mut row, Vec::with_capacity(DAYS_PER_WEEK)));
        }
    }

    WindowState {
        anchor,
        week_start,
        rows,
        drag_offset_px: 0.0,
        page_offset: 0,
        animating: false,
    }
}

fn build_cell(
    date: NaiveDate,
    today: NaiveDate,
    display_month: MonthKey,
    cache: &MonthCache,
) -> CalendarCell {
    let first = project::project(cache.get(date, SlotKind::First).as_ref());
    let second = project::project(cache.get(date, SlotKind::Second).as_ref());
    CalendarCell {
        date,
        weekday: date.weekday(),
        in_display_month: display_month.contains(date),
        is_today: date == today,
        label: cell_label(date, today, display_month),
        first,
        second,
    }
}

/// Date label: day-only for weekends and for the displayed month; otherwise
/// month/day, with the year prefixed when it differs from today's.
fn cell_label(date: NaiveDate, today: NaiveDate, display_month: MonthKey) -> String {
    let weekend = matches!(date.weekday(), Weekday::Sat | Weekday::Sun);
    if weekend || display_month.contains(date) {
        format!("{}", date.day())
    } else if date.year() != today.year() {
        format!("{}/{}/{}", date.year(), date.month(), date.day())
    } else {
        format!("{}/{}", date.month(), date.day())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use std::collections::HashMap;

    use async_trait::async_trait;
    use ulid::Ulid;

    use crate::api::{ApiError, CalendarSource};
    use crate::model::{SlotRecord, SlotStatus};
    use crate::notify::SignalHub;

    struct EmptySource;

    #[async_trait]
    impl CalendarSource for EmptySource {
        async fn fetch_months(
            &self,
            months: &BTreeSet<MonthKey>,
        ) -> Result<HashMap<MonthKey, Vec<SlotRecord>>, ApiError> {
            Ok(months.iter().map(|m| (*m, Vec::new())).collect())
        }
        async fn fetch_slot(&self, _slot_id: Ulid) -> Result<SlotRecord, ApiError> {
            Err(ApiError::Validation("empty".into()))
        }
    }

    fn empty_cache() -> MonthCache {
        MonthCache::new(Arc::new(EmptySource), Arc::new(SignalHub::new()))
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn monday_of_mid_week_and_monday() {
        // 2024-06-05 is a Wednesday
        assert_eq!(monday_of(date(2024, 6, 5)), date(2024, 6, 3));
        assert_eq!(monday_of(date(2024, 6, 3)), date(2024, 6, 3));
        // Sunday belongs to the week starting the previous Monday
        assert_eq!(monday_of(date(2024, 6, 9)), date(2024, 6, 3));
    }

    #[test]
    fn window_is_nine_by_seven() {
        let cache = empty_cache();
        let w = build(date(2024, 6, 5), date(2024, 6, 5), &cache);
        assert_eq!(w.rows.len(), 9);
        for row in &w.rows {
            assert_eq!(row.len(), 7);
        }
    }

    #[test]
    fn center_row_columns_1_to_5_are_mon_to_fri_of_anchor_week() {
        let cache = empty_cache();
        let anchor = date(2024, 6, 5); // Wednesday of the week starting Mon 2024-06-03
        let w = build(anchor, anchor, &cache);
        let center = &w.rows[4];
        assert_eq!(center[0].date, date(2024, 6, 2)); // Sunday before
        for (i, expected) in (3..=7).enumerate() {
            assert_eq!(center[i + 1].date, date(2024, 6, expected));
        }
        assert_eq!(center[1].weekday, Weekday::Mon);
        assert_eq!(center[5].weekday, Weekday::Fri);
        assert_eq!(center[6].weekday, Weekday::Sat);
    }

    #[test]
    fn rows_are_consecutive_weeks() {
        let cache = empty_cache();
        let w = build(date(2024, 6, 5), date(2024, 6, 5), &cache);
        for pair in w.rows.windows(2) {
            assert_eq!(pair[1][0].date, pair[0][0].date + chrono::Duration::days(7));
        }
        // First row starts 4 weeks + 1 day before the anchor week's Monday.
        assert_eq!(w.rows[0][0].date, w.week_start - chrono::Duration::days(29));
    }

    #[test]
    fn months_covering_spans_boundaries() {
        // Anchor near a month edge pulls in the neighbors.
        let months = months_covering(date(2024, 6, 2));
        assert!(months.contains(&MonthKey::new(2024, 5)));
        assert!(months.contains(&MonthKey::new(2024, 6)));
        // Window reaches at most into the following month.
        assert!(months.len() >= 2 && months.len() <= 3);
    }

    #[test]
    fn months_covering_year_boundary() {
        let months = months_covering(date(2025, 1, 2));
        assert!(months.contains(&MonthKey::new(2024, 12)));
        assert!(months.contains(&MonthKey::new(2025, 1)));
    }

    #[test]
    fn labels_follow_display_month_and_weekend_rules() {
        let today = date(2024, 6, 5);
        let display = MonthKey::new(2024, 6);
        // In the displayed month: day only.
        assert_eq!(cell_label(date(2024, 6, 14), today, display), "14");
        // Weekday outside the displayed month, same year: month/day.
        assert_eq!(cell_label(date(2024, 5, 20), today, display), "5/20");
        // Weekend outside the displayed month: still day only.
        assert_eq!(cell_label(date(2024, 5, 18), today, display), "18");
        // Different year from today: year/month/day.
        let today_jan = date(2025, 1, 2);
        let display_jan = MonthKey::new(2025, 1);
        assert_eq!(cell_label(date(2024, 12, 30), today_jan, display_jan), "2024/12/30");
    }

    #[test]
    fn today_and_display_month_flags() {
        let cache = empty_cache();
        let anchor = date(2024, 6, 5);
        let w = build(anchor, anchor, &cache);
        let today_cells: Vec<_> = w
            .rows
            .iter()
            .flatten()
            .filter(|c| c.is_today)
            .collect();
        assert_eq!(today_cells.len(), 1);
        assert_eq!(today_cells[0].date, anchor);
        assert!(today_cells[0].in_display_month);
    }

    #[test]
    fn cells_without_records_project_unpublished() {
        let cache = empty_cache();
        let w = build(date(2024, 6, 5), date(2024, 6, 5), &cache);
        let cell = &w.rows[4][1];
        assert_eq!(cell.first.status, SlotStatus::Unpublished);
        assert_eq!(cell.second.status_line, "not published");
    }
}

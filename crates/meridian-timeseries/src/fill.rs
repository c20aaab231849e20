//! Meridian Period Gap-Filler
//!
//! Densifies grouped weekly series so that every group covers the same
//! ordered set of windows. Missing windows are only ever filled with zero
//! counts; observed cells are never touched.
//!
//! @version 0.1.0
//! @author Meridian Development Team

use crate::period::{weeks_between, PeriodWindow};
use chrono::{DateTime, Utc};
use meridian_document::Value;
use std::collections::BTreeSet;

// =============================================================================
// Period Cells and Groups
// =============================================================================

/// Count of records inside one window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeriodCell {
    pub window: PeriodWindow,
    pub count: u64,
}

impl PeriodCell {
    pub fn new(window: PeriodWindow, count: u64) -> Self {
        Self { window, count }
    }

    /// Zero-count cell standing in for a window without data.
    pub fn empty(window: PeriodWindow) -> Self {
        Self { window, count: 0 }
    }
}

/// One value of the grouping field with its weekly cells.
#[derive(Debug, Clone, PartialEq)]
pub struct PeriodGroup {
    pub value: Value,
    pub cells: Vec<PeriodCell>,
}

impl PeriodGroup {
    pub fn new(value: impl Into<Value>, cells: Vec<PeriodCell>) -> Self {
        Self {
            value: value.into(),
            cells,
        }
    }

    fn windows(&self) -> BTreeSet<PeriodWindow> {
        self.cells.iter().map(|cell| cell.window).collect()
    }

    fn sort_cells(&mut self) {
        self.cells.sort_by_key(|cell| cell.window.start_at);
    }
}

// =============================================================================
// Filling
// =============================================================================

/// Every distinct window appearing in any group, ascending.
pub fn union_windows(groups: &[PeriodGroup]) -> BTreeSet<PeriodWindow> {
    groups.iter().flat_map(|g| g.cells.iter().map(|c| c.window)).collect()
}

fn fill_to(groups: &mut [PeriodGroup], windows: &BTreeSet<PeriodWindow>) -> usize {
    let mut added = 0;
    for group in groups.iter_mut() {
        let own = group.windows();
        for window in windows.difference(&own) {
            group.cells.push(PeriodCell::empty(*window));
            added += 1;
        }
        group.sort_cells();
    }
    added
}

/// Give every group a zero cell for each window another group has.
///
/// Returns the number of synthetic cells added.
pub fn fill_missing_periods(groups: &mut [PeriodGroup]) -> usize {
    let windows = union_windows(groups);
    fill_to(groups, &windows)
}

/// Like [`fill_missing_periods`], additionally covering every week whose
/// start lies in `[week_start(start), end)`.
pub fn fill_missing_periods_between(
    groups: &mut [PeriodGroup],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> usize {
    let mut windows = union_windows(groups);
    windows.extend(weeks_between(start, end));
    fill_to(groups, &windows)
}

/// How many windows a series view should shift to skip empty data.
///
/// Counts consecutive windows whose total across all groups is zero, from
/// the latest window backwards when `delta` is positive or from the earliest
/// forwards when negative, at most `|delta|` of them. The result carries the
/// sign of `delta`; empty data yields zero.
pub fn amount_to_shift(groups: &[PeriodGroup], delta: i64) -> i64 {
    let axis: Vec<PeriodWindow> = union_windows(groups).into_iter().collect();
    let total = |window: &PeriodWindow| -> u64 {
        groups
            .iter()
            .flat_map(|g| g.cells.iter())
            .filter(|c| c.window == *window)
            .map(|c| c.count)
            .sum()
    };

    let limit = delta.unsigned_abs() as usize;
    let empty = if delta >= 0 {
        axis.iter().rev().take(limit).take_while(|w| total(w) == 0).count()
    } else {
        axis.iter().take(limit).take_while(|w| total(w) == 0).count()
    };

    let empty = empty as i64;
    if delta < 0 {
        -empty
    } else {
        empty
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use proptest::prelude::*;

    fn d(year: i32, month: u32, day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(year, month, day, 0, 0, 0).unwrap()
    }

    fn cell(start: DateTime<Utc>, count: u64) -> PeriodCell {
        PeriodCell::new(PeriodWindow::week_starting(start).unwrap(), count)
    }

    fn starts(group: &PeriodGroup) -> Vec<DateTime<Utc>> {
        group.cells.iter().map(|c| c.window.start_at).collect()
    }

    #[test]
    fn test_fill_between_bounds() {
        let mut groups = vec![PeriodGroup::new(
            "licence",
            vec![cell(d(2013, 4, 1), 1), cell(d(2013, 4, 15), 5)],
        )];

        let added = fill_missing_periods_between(&mut groups, d(2013, 4, 1), d(2013, 4, 16));

        assert_eq!(added, 1);
        assert_eq!(
            groups[0].cells,
            vec![
                cell(d(2013, 4, 1), 1),
                cell(d(2013, 4, 8), 0),
                cell(d(2013, 4, 15), 5),
            ]
        );
    }

    #[test]
    fn test_fill_aligns_groups_to_union() {
        let mut groups = vec![
            PeriodGroup::new("a", vec![cell(d(2013, 4, 8), 2)]),
            PeriodGroup::new("b", vec![cell(d(2013, 4, 15), 3), cell(d(2013, 4, 1), 1)]),
        ];

        assert_eq!(fill_missing_periods(&mut groups), 3);

        let expected = vec![d(2013, 4, 1), d(2013, 4, 8), d(2013, 4, 15)];
        assert_eq!(starts(&groups[0]), expected);
        assert_eq!(starts(&groups[1]), expected);
        assert_eq!(groups[0].cells[1].count, 2);
        assert_eq!(groups[1].cells[1].count, 0);
        assert_eq!(groups[1].cells[2].count, 3);
    }

    #[test]
    fn test_empty_input_is_valid() {
        let mut groups: Vec<PeriodGroup> = Vec::new();
        assert_eq!(fill_missing_periods(&mut groups), 0);
        assert!(groups.is_empty());

        let mut groups = vec![PeriodGroup::new("a", Vec::new())];
        assert_eq!(fill_missing_periods(&mut groups), 0);
        assert!(groups[0].cells.is_empty());
    }

    #[test]
    fn test_amount_to_shift_with_empty_data() {
        assert_eq!(amount_to_shift(&[], 7), 0);
        assert_eq!(amount_to_shift(&[PeriodGroup::new("a", Vec::new())], -7), 0);
    }

    #[test]
    fn test_amount_to_shift_counts_trailing_empty_windows() {
        let mut groups = vec![
            PeriodGroup::new("a", vec![cell(d(2013, 4, 1), 4), cell(d(2013, 4, 22), 0)]),
            PeriodGroup::new("b", vec![cell(d(2013, 4, 15), 0)]),
        ];
        fill_missing_periods(&mut groups);

        // Windows: 04-01 (4), 04-08 (0), 04-15 (0), 04-22 (0).
        assert_eq!(amount_to_shift(&groups, 7), 3);
        assert_eq!(amount_to_shift(&groups, 2), 2);
        assert_eq!(amount_to_shift(&groups, -7), 0);
    }

    #[test]
    fn test_amount_to_shift_counts_leading_empty_windows() {
        let groups = vec![PeriodGroup::new(
            "a",
            vec![cell(d(2013, 4, 1), 0), cell(d(2013, 4, 8), 0), cell(d(2013, 4, 15), 1)],
        )];
        assert_eq!(amount_to_shift(&groups, -7), -2);
        assert_eq!(amount_to_shift(&groups, 7), 0);
    }

    fn arb_groups() -> impl Strategy<Value = Vec<PeriodGroup>> {
        let base = d(2013, 1, 7);
        prop::collection::vec(
            prop::collection::btree_map(0i64..20, 1u64..100, 0..8),
            0..6,
        )
        .prop_map(move |groups| {
            groups
                .into_iter()
                .enumerate()
                .map(|(i, weeks)| {
                    let cells = weeks
                        .into_iter()
                        .map(|(week, count)| cell(base + Duration::weeks(week), count))
                        .collect();
                    PeriodGroup::new(i as i64, cells)
                })
                .collect()
        })
    }

    proptest! {
        #[test]
        fn filled_groups_share_the_union_axis(groups in arb_groups()) {
            let union = union_windows(&groups);
            let mut filled = groups.clone();
            fill_missing_periods(&mut filled);

            let axis: Vec<PeriodWindow> = union.into_iter().collect();
            for group in &filled {
                let windows: Vec<PeriodWindow> = group.cells.iter().map(|c| c.window).collect();
                prop_assert_eq!(&windows, &axis);
            }
        }

        #[test]
        fn filling_keeps_observed_cells(groups in arb_groups()) {
            let mut filled = groups.clone();
            fill_missing_periods(&mut filled);

            for (before, after) in groups.iter().zip(&filled) {
                for original in &before.cells {
                    let matching = after.cells.iter().filter(|c| c.window == original.window).count();
                    prop_assert_eq!(matching, 1);
                    prop_assert!(after.cells.contains(original));
                }
                for synthetic in after.cells.iter().filter(|c| !before.cells.contains(c)) {
                    prop_assert_eq!(synthetic.count, 0);
                }
            }
        }

        #[test]
        fn filling_is_idempotent(groups in arb_groups()) {
            let mut filled = groups;
            fill_missing_periods(&mut filled);
            let once = filled.clone();

            prop_assert_eq!(fill_missing_periods(&mut filled), 0);
            prop_assert_eq!(filled, once);
        }
    }
}

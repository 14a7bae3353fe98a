//! Per-day activity aggregation for the calendar heatmap.

use crate::error::{LedgerError, LedgerResult};
use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Highest activity level.
pub const MAX_LEVEL: u8 = 4;

/// Map a per-day completion count to a heatmap level.
///
/// 0 -> 0, 1-2 -> 1, 3-4 -> 2, 5-6 -> 3, 7+ -> 4.
pub fn level_for_count(count: u32) -> u8 {
    match count {
        0 => 0,
        1..=2 => 1,
        3..=4 => 2,
        5..=6 => 3,
        _ => MAX_LEVEL,
    }
}

/// One day of the heatmap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityCell {
    pub date: NaiveDate,
    pub count: u32,
    pub level: u8,
}

/// Chronological day cells covering an inclusive date range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityGrid {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub cells: Vec<ActivityCell>,
}

/// Build one cell per day in `[range_start, range_end]`.
///
/// `completions` is a multiset: every occurrence of a date counts. Dates
/// outside the range are ignored.
pub fn build_grid<I>(
    completions: I,
    range_start: NaiveDate,
    range_end: NaiveDate,
) -> LedgerResult<ActivityGrid>
where
    I: IntoIterator<Item = NaiveDate>,
{
    if range_end < range_start {
        return Err(LedgerError::date_range(range_start, range_end));
    }

    let mut counts: HashMap<NaiveDate, u32> = HashMap::new();
    for date in completions {
        if date >= range_start && date <= range_end {
            *counts.entry(date).or_default() += 1;
        }
    }

    let cells = range_start
        .iter_days()
        .take_while(|date| *date <= range_end)
        .map(|date| {
            let count = counts.get(&date).copied().unwrap_or(0);
            ActivityCell {
                date,
                count,
                level: level_for_count(count),
            }
        })
        .collect();

    Ok(ActivityGrid {
        start: range_start,
        end: range_end,
        cells,
    })
}

impl ActivityGrid {
    pub fn total_completions(&self) -> u32 {
        self.cells.iter().map(|c| c.count).sum()
    }

    /// Days with at least one completion.
    pub fn active_days(&self) -> usize {
        self.cells.iter().filter(|c| c.count > 0).count()
    }

    pub fn max_count(&self) -> u32 {
        self.cells.iter().map(|c| c.count).max().unwrap_or(0)
    }

    /// Lay the cells out in week columns for heatmap rendering.
    ///
    /// Each column has seven slots starting at `week_start`; slots before
    /// the range start or after its end are `None`.
    pub fn weeks(&self, week_start: Weekday) -> Vec<[Option<ActivityCell>; 7]> {
        let mut columns: Vec<[Option<ActivityCell>; 7]> = Vec::new();
        let mut column = [None; 7];
        for cell in &self.cells {
            let slot = weekday_offset(cell.date.weekday(), week_start);
            if slot == 0 && column.iter().any(Option::is_some) {
                columns.push(column);
                column = [None; 7];
            }
            column[slot] = Some(*cell);
        }
        if column.iter().any(Option::is_some) {
            columns.push(column);
        }
        columns
    }
}

fn weekday_offset(day: Weekday, week_start: Weekday) -> usize {
    let day = day.num_days_from_monday();
    let start = week_start.num_days_from_monday();
    ((day + 7 - start) % 7) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn level_thresholds() {
        let levels: Vec<u8> = (0..=7).map(level_for_count).collect();
        assert_eq!(levels, vec![0, 1, 1, 2, 2, 3, 3, 4]);
        assert_eq!(level_for_count(100), 4);
    }

    #[test]
    fn grid_has_one_cell_per_day_inclusive() {
        let grid = build_grid(Vec::new(), d(2024, 2, 27), d(2024, 3, 2)).unwrap();
        let dates: Vec<_> = grid.cells.iter().map(|c| c.date).collect();
        assert_eq!(
            dates,
            vec![d(2024, 2, 27), d(2024, 2, 28), d(2024, 2, 29), d(2024, 3, 1), d(2024, 3, 2)]
        );
        assert!(grid.cells.iter().all(|c| c.count == 0 && c.level == 0));
    }

    #[test]
    fn counts_every_completion_and_ignores_out_of_range() {
        let completions = vec![
            d(2024, 1, 1),
            d(2024, 1, 2),
            d(2024, 1, 2),
            d(2024, 1, 2),
            d(2023, 12, 31),
            d(2024, 1, 4),
        ];
        let grid = build_grid(completions, d(2024, 1, 1), d(2024, 1, 3)).unwrap();
        let counts: Vec<_> = grid.cells.iter().map(|c| (c.count, c.level)).collect();
        assert_eq!(counts, vec![(1, 1), (3, 2), (0, 0)]);
        assert_eq!(grid.total_completions(), 4);
        assert_eq!(grid.active_days(), 2);
        assert_eq!(grid.max_count(), 3);
    }

    #[test]
    fn single_day_range() {
        let grid = build_grid(vec![d(2024, 5, 5); 8], d(2024, 5, 5), d(2024, 5, 5)).unwrap();
        assert_eq!(grid.cells.len(), 1);
        assert_eq!(grid.cells[0].level, 4);
    }

    #[test]
    fn reversed_range_is_rejected() {
        let err = build_grid(Vec::new(), d(2024, 1, 2), d(2024, 1, 1)).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidDateRange { .. }));
    }

    #[test]
    fn weeks_pad_partial_columns() {
        // 2024-01-03 is a Wednesday, 2024-01-09 a Tuesday.
        let grid = build_grid(Vec::new(), d(2024, 1, 3), d(2024, 1, 9)).unwrap();
        let weeks = grid.weeks(Weekday::Mon);
        assert_eq!(weeks.len(), 2);
        assert!(weeks[0][0].is_none() && weeks[0][1].is_none());
        assert_eq!(weeks[0][2].map(|c| c.date), Some(d(2024, 1, 3)));
        assert_eq!(weeks[1][1].map(|c| c.date), Some(d(2024, 1, 9)));
        assert!(weeks[1][2].is_none());

        let sunday_weeks = grid.weeks(Weekday::Sun);
        // Sunday the 7th opens a new column.
        assert_eq!(sunday_weeks.len(), 2);
        assert_eq!(sunday_weeks[1][0].map(|c| c.date), Some(d(2024, 1, 7)));
    }
}

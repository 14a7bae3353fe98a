//! Occurrence expansion over a date window.

use super::{RecurrencePattern, RecurrenceRule};
use crate::error::{LedgerError, LedgerResult};
use chrono::{Datelike, NaiveDate};
use std::collections::BTreeSet;

/// Lazy iterator over the occurrences of a rule inside a window.
///
/// Holds only its cursor, so a clone replays the remaining dates independently.
#[derive(Debug, Clone)]
pub struct Occurrences {
    rule: RecurrenceRule,
    anchor: NaiveDate,
    window_start: NaiveDate,
    window_end: NaiveDate,
    next_k: u64,
    done: bool,
}

impl Iterator for Occurrences {
    type Item = NaiveDate;

    fn next(&mut self) -> Option<NaiveDate> {
        while !self.done {
            let Some(date) = self.rule.nth_after(self.anchor, self.next_k) else {
                self.done = true;
                break;
            };
            self.next_k += 1;
            if date > self.window_end {
                self.done = true;
                break;
            }
            if date >= self.window_start {
                return Some(date);
            }
        }
        None
    }
}

impl std::iter::FusedIterator for Occurrences {}

/// Expand `rule` from `anchor` into the dates falling in
/// `[window_start, window_end]`.
///
/// Non-recurring rules yield nothing.
pub fn expand(
    rule: RecurrenceRule,
    anchor: NaiveDate,
    window_start: NaiveDate,
    window_end: NaiveDate,
) -> LedgerResult<Occurrences> {
    rule.validate()?;
    if window_end < window_start {
        return Err(LedgerError::date_range(window_start, window_end));
    }

    Ok(Occurrences {
        rule,
        anchor,
        window_start,
        window_end,
        next_k: first_candidate(&rule, anchor, window_start),
        done: !rule.is_recurring(),
    })
}

/// Lower bound on the first occurrence index that can reach `window_start`.
///
/// Never overshoots: the iterator still filters anything before the window.
fn first_candidate(rule: &RecurrenceRule, anchor: NaiveDate, window_start: NaiveDate) -> u64 {
    if window_start <= anchor {
        return 0;
    }
    let interval = i64::from(rule.interval);
    let units = match rule.pattern {
        RecurrencePattern::None => return 0,
        RecurrencePattern::Daily => (window_start - anchor).num_days(),
        RecurrencePattern::Weekly => (window_start - anchor).num_days() / 7,
        RecurrencePattern::Monthly => months_between(anchor, window_start) - 1,
        RecurrencePattern::Yearly => (months_between(anchor, window_start) - 1) / 12,
    };
    u64::try_from(units.max(0) / interval).unwrap_or(0)
}

fn months_between(from: NaiveDate, to: NaiveDate) -> i64 {
    (i64::from(to.year()) - i64::from(from.year())) * 12 + i64::from(to.month())
        - i64::from(from.month())
}

/// First occurrence strictly after `after`, or `None` for non-recurring rules.
pub fn next_occurrence_after(
    rule: RecurrenceRule,
    anchor: NaiveDate,
    after: NaiveDate,
) -> LedgerResult<Option<NaiveDate>> {
    rule.validate()?;
    if !rule.is_recurring() {
        return Ok(None);
    }
    let Some(start) = after.succ_opt() else {
        return Ok(None);
    };
    let mut occurrences = Occurrences {
        rule,
        anchor,
        window_start: start,
        window_end: NaiveDate::MAX,
        next_k: first_candidate(&rule, anchor, start),
        done: false,
    };
    Ok(occurrences.next())
}

/// Occurrences in the window that have no completed instance yet.
pub fn pending_occurrences(
    rule: RecurrenceRule,
    anchor: NaiveDate,
    window_start: NaiveDate,
    window_end: NaiveDate,
    completed: &BTreeSet<NaiveDate>,
) -> LedgerResult<Vec<NaiveDate>> {
    Ok(expand(rule, anchor, window_start, window_end)?
        .filter(|date| !completed.contains(date))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn daily_every_other_day_in_window() {
        let rule = RecurrenceRule::daily(2).unwrap();
        let dates: Vec<_> = expand(rule, d(2024, 1, 1), d(2024, 1, 4), d(2024, 1, 10))
            .unwrap()
            .collect();
        assert_eq!(dates, vec![d(2024, 1, 5), d(2024, 1, 7), d(2024, 1, 9)]);
    }

    #[test]
    fn monthly_from_jan_31_clamps_each_month() {
        let rule = RecurrenceRule::monthly(1).unwrap();
        let dates: Vec<_> = expand(rule, d(2023, 1, 31), d(2023, 1, 1), d(2023, 6, 30))
            .unwrap()
            .collect();
        assert_eq!(
            dates,
            vec![
                d(2023, 1, 31),
                d(2023, 2, 28),
                d(2023, 3, 31),
                d(2023, 4, 30),
                d(2023, 5, 31),
                d(2023, 6, 30),
            ]
        );
    }

    #[test]
    fn monthly_window_far_from_anchor_skips_ahead() {
        let rule = RecurrenceRule::monthly(3).unwrap();
        let dates: Vec<_> = expand(rule, d(2000, 1, 31), d(2024, 2, 1), d(2024, 12, 31))
            .unwrap()
            .collect();
        assert_eq!(
            dates,
            vec![d(2024, 4, 30), d(2024, 7, 31), d(2024, 10, 31)]
        );
    }

    #[test]
    fn none_pattern_is_empty() {
        let rule = RecurrenceRule::none();
        let dates: Vec<_> = expand(rule, d(2024, 1, 1), d(2024, 1, 1), d(2024, 12, 31))
            .unwrap()
            .collect();
        assert!(dates.is_empty());
    }

    #[test]
    fn reversed_window_is_rejected() {
        let rule = RecurrenceRule::daily(1).unwrap();
        let err = expand(rule, d(2024, 1, 1), d(2024, 2, 1), d(2024, 1, 1)).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidDateRange { .. }));
    }

    #[test]
    fn invalid_interval_is_rejected() {
        let rule = RecurrenceRule {
            pattern: RecurrencePattern::Weekly,
            interval: 0,
        };
        let err = expand(rule, d(2024, 1, 1), d(2024, 1, 1), d(2024, 2, 1)).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidRule(_)));
    }

    #[test]
    fn anchor_after_window_yields_nothing() {
        let rule = RecurrenceRule::daily(1).unwrap();
        let mut it = expand(rule, d(2025, 1, 1), d(2024, 1, 1), d(2024, 12, 31)).unwrap();
        assert_eq!(it.next(), None);
        assert_eq!(it.next(), None);
    }

    #[test]
    fn iterator_is_restartable_by_clone() {
        let rule = RecurrenceRule::weekly(1).unwrap();
        let it = expand(rule, d(2024, 1, 1), d(2024, 1, 1), d(2024, 1, 31)).unwrap();
        let first: Vec<_> = it.clone().collect();
        let second: Vec<_> = it.collect();
        assert_eq!(first, second);
        assert_eq!(first.len(), 5);
    }

    #[test]
    fn weekly_dates_are_strictly_increasing_and_evenly_spaced() {
        let rule = RecurrenceRule::weekly(2).unwrap();
        let dates: Vec<_> = expand(rule, d(2024, 1, 3), d(2024, 1, 1), d(2024, 12, 31))
            .unwrap()
            .collect();
        for pair in dates.windows(2) {
            assert_eq!((pair[1] - pair[0]).num_days(), 14);
        }
    }

    #[test]
    fn next_occurrence_after_skips_to_following_date() {
        let rule = RecurrenceRule::monthly(1).unwrap();
        let next = next_occurrence_after(rule, d(2024, 1, 31), d(2024, 2, 29)).unwrap();
        assert_eq!(next, Some(d(2024, 3, 31)));

        let none =
            next_occurrence_after(RecurrenceRule::none(), d(2024, 1, 31), d(2024, 1, 1)).unwrap();
        assert_eq!(none, None);
    }

    #[test]
    fn pending_occurrences_exclude_completed_instances() {
        let rule = RecurrenceRule::daily(1).unwrap();
        let completed: BTreeSet<_> = [d(2024, 1, 2), d(2024, 1, 3)].into_iter().collect();
        let (start, end) = (d(2024, 1, 1), d(2024, 1, 4));
        let pending = pending_occurrences(rule, start, start, end, &completed).unwrap();
        assert_eq!(pending, vec![d(2024, 1, 1), d(2024, 1, 4)]);
    }
}

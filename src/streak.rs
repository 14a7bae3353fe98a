//! Streak computation from completion history.
//!
//! Completions are bucketed into calendar periods of the rule's unit. A
//! streak is a chain of qualifying buckets spaced exactly `interval` periods
//! apart, ending at the most recent one. Values are always derived from the
//! history passed in; nothing here is cached.

use crate::error::LedgerResult;
use crate::recurrence::{RecurrencePattern, RecurrenceRule, period_index};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Current and best streak for a completion history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StreakSummary {
    pub current: u32,
    pub best: u32,
    pub last_completion: Option<NaiveDate>,
}

/// Computes streaks for one recurrence rule.
#[derive(Debug, Clone, Copy)]
pub struct StreakCalculator {
    pattern: RecurrencePattern,
    interval: i64,
    target: u32,
}

impl StreakCalculator {
    /// Non-recurring rules are treated as daily.
    pub fn new(rule: RecurrenceRule) -> LedgerResult<Self> {
        rule.validate()?;
        let pattern = match rule.pattern {
            RecurrencePattern::None => RecurrencePattern::Daily,
            other => other,
        };
        Ok(Self {
            pattern,
            interval: i64::from(rule.interval),
            target: 1,
        })
    }

    /// Daily calculator with interval 1.
    pub fn daily() -> Self {
        Self {
            pattern: RecurrencePattern::Daily,
            interval: 1,
            target: 1,
        }
    }

    /// Require `target` distinct completion days in a period before it counts.
    pub fn with_target(mut self, target: u32) -> Self {
        self.target = target.max(1);
        self
    }

    /// Qualifying period indices, ascending. Same-day duplicates collapse.
    fn periods<I>(&self, completions: I) -> BTreeSet<i64>
    where
        I: IntoIterator<Item = NaiveDate>,
    {
        let days: BTreeSet<NaiveDate> = completions.into_iter().collect();
        let mut per_period: BTreeMap<i64, u32> = BTreeMap::new();
        for day in days {
            *per_period.entry(period_index(self.pattern, day)).or_default() += 1;
        }
        per_period
            .into_iter()
            .filter(|(_, count)| *count >= self.target)
            .map(|(period, _)| period)
            .collect()
    }

    fn chain_ending_at(&self, periods: &BTreeSet<i64>, last: i64) -> u32 {
        let mut count = 0;
        let mut cursor = last;
        while periods.contains(&cursor) {
            count += 1;
            cursor -= self.interval;
        }
        count
    }

    /// Length of the chain ending at the most recent qualifying period.
    pub fn current_streak<I>(&self, completions: I) -> u32
    where
        I: IntoIterator<Item = NaiveDate>,
    {
        let periods = self.periods(completions);
        match periods.last() {
            Some(&last) => self.chain_ending_at(&periods, last),
            None => 0,
        }
    }

    /// Like [`current_streak`](Self::current_streak), but 0 once the chain is
    /// broken relative to `today`.
    ///
    /// The chain is alive while its last period is the current one or the one
    /// expected just before it (for a daily rule: today or yesterday).
    pub fn current_streak_as_of<I>(&self, completions: I, today: NaiveDate) -> u32
    where
        I: IntoIterator<Item = NaiveDate>,
    {
        let periods = self.periods(completions);
        let Some(&last) = periods.last() else {
            return 0;
        };
        if period_index(self.pattern, today) - last > self.interval {
            return 0;
        }
        self.chain_ending_at(&periods, last)
    }

    /// Longest chain anywhere in the history.
    pub fn best_streak<I>(&self, completions: I) -> u32
    where
        I: IntoIterator<Item = NaiveDate>,
    {
        let periods = self.periods(completions);
        let mut lengths: HashMap<i64, u32> = HashMap::with_capacity(periods.len());
        let mut best = 0;
        for &period in &periods {
            let len = lengths.get(&(period - self.interval)).copied().unwrap_or(0) + 1;
            lengths.insert(period, len);
            best = best.max(len);
        }
        best
    }

    /// Current (relative to `today`) and best streak in one pass over the input.
    pub fn summarize<I>(&self, completions: I, today: NaiveDate) -> StreakSummary
    where
        I: IntoIterator<Item = NaiveDate>,
    {
        let days: Vec<NaiveDate> = completions.into_iter().collect();
        StreakSummary {
            current: self.current_streak_as_of(days.iter().copied(), today),
            best: self.best_streak(days.iter().copied()),
            last_completion: days.iter().max().copied(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn jan(days: &[u32]) -> Vec<NaiveDate> {
        days.iter().map(|&day| d(2024, 1, day)).collect()
    }

    #[test]
    fn empty_history_has_no_streak() {
        for rule in [
            RecurrenceRule::none(),
            RecurrenceRule::daily(1).unwrap(),
            RecurrenceRule::weekly(2).unwrap(),
            RecurrenceRule::monthly(1).unwrap(),
            RecurrenceRule::yearly(1).unwrap(),
        ] {
            let calc = StreakCalculator::new(rule).unwrap();
            assert_eq!(calc.current_streak(Vec::new()), 0);
            assert_eq!(calc.best_streak(Vec::new()), 0);
            assert_eq!(calc.current_streak_as_of(Vec::new(), d(2024, 1, 1)), 0);
        }
    }

    #[test]
    fn consecutive_days_count_fully() {
        let calc = StreakCalculator::daily();
        assert_eq!(calc.current_streak(jan(&[1, 2, 3, 4, 5, 6, 7])), 7);
    }

    #[test]
    fn gap_resets_to_trailing_run() {
        let calc = StreakCalculator::daily();
        let history = jan(&[1, 2, 3, 4, 7, 8]);
        assert_eq!(calc.current_streak(history.clone()), 2);
        assert_eq!(calc.best_streak(history), 4);
    }

    #[test]
    fn duplicates_on_same_day_count_once() {
        let calc = StreakCalculator::daily();
        assert_eq!(calc.current_streak(jan(&[3, 3, 2, 2, 1])), 3);
    }

    #[test]
    fn unsorted_input_is_accepted() {
        let calc = StreakCalculator::daily();
        assert_eq!(calc.current_streak(jan(&[5, 1, 3, 2, 4])), 5);
    }

    #[test]
    fn streak_breaks_when_neither_today_nor_yesterday() {
        let calc = StreakCalculator::daily();
        let history = jan(&[1, 2, 3]);
        assert_eq!(calc.current_streak_as_of(history.clone(), d(2024, 1, 3)), 3);
        assert_eq!(calc.current_streak_as_of(history.clone(), d(2024, 1, 4)), 3);
        assert_eq!(calc.current_streak_as_of(history.clone(), d(2024, 1, 5)), 0);
        assert_eq!(calc.best_streak(history), 3);
    }

    #[test]
    fn weekly_streak_uses_week_buckets() {
        let calc = StreakCalculator::new(RecurrenceRule::weekly(1).unwrap()).unwrap();
        // Mon 1st, Sun 7th (same week), Wed 10th, Fri 19th: three consecutive weeks.
        let history = jan(&[1, 7, 10, 19]);
        assert_eq!(calc.current_streak(history.clone()), 3);
        // A missing week breaks it.
        assert_eq!(calc.current_streak(jan(&[1, 19])), 1);
        // Still alive in the following week, broken two weeks later.
        assert_eq!(calc.current_streak_as_of(history.clone(), d(2024, 1, 22)), 3);
        assert_eq!(calc.current_streak_as_of(history, d(2024, 1, 29)), 0);
    }

    #[test]
    fn interval_spaced_periods_form_a_chain() {
        let calc = StreakCalculator::new(RecurrenceRule::daily(2).unwrap()).unwrap();
        assert_eq!(calc.current_streak(jan(&[1, 3, 5, 7])), 4);
        // An extra completion between expected dates does not break the chain.
        assert_eq!(calc.current_streak(jan(&[1, 3, 4, 5])), 3);
    }

    #[test]
    fn monthly_streak_crosses_year_end() {
        let calc = StreakCalculator::new(RecurrenceRule::monthly(1).unwrap()).unwrap();
        let history = vec![d(2023, 11, 30), d(2023, 12, 1), d(2024, 1, 15)];
        assert_eq!(calc.current_streak(history), 3);
    }

    #[test]
    fn target_count_requires_enough_days_per_period() {
        let calc = StreakCalculator::new(RecurrenceRule::weekly(1).unwrap())
            .unwrap()
            .with_target(2);
        // Week of 1st: two days. Week of 8th: one day. Week of 15th: two days.
        let history = jan(&[1, 2, 8, 15, 16]);
        assert_eq!(calc.current_streak(history.clone()), 1);
        assert_eq!(calc.best_streak(history), 1);
        assert_eq!(calc.current_streak(jan(&[1, 2, 8, 9, 15, 16])), 3);
    }

    #[test]
    fn best_streak_never_decreases_as_history_grows() {
        let calc = StreakCalculator::daily();
        let additions = jan(&[1, 2, 3, 10, 4, 11, 12, 13, 14, 20]);
        let mut history = Vec::new();
        let mut previous = 0;
        for day in additions {
            history.push(day);
            let best = calc.best_streak(history.clone());
            assert!(best >= previous);
            previous = best;
        }
        assert_eq!(previous, 5);
    }

    #[test]
    fn summarize_reports_last_completion() {
        let calc = StreakCalculator::daily();
        let summary = calc.summarize(jan(&[1, 2, 3, 4, 5, 7]), d(2024, 1, 7));
        assert_eq!(
            summary,
            StreakSummary {
                current: 1,
                best: 5,
                last_completion: Some(d(2024, 1, 7)),
            }
        );
    }
}

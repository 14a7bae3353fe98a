//! Habit check-ins and derived streaks.
//!
//! A habit's `streak` and `best_streak` are never edited directly. Every
//! check-in change goes through [`recompute`], which derives both from
//! `completed_dates`, `frequency` and `target_count`.

use crate::streak::{StreakCalculator, StreakSummary};
use crate::types::Habit;
use chrono::NaiveDate;

/// Streak calculator for a habit's cadence and per-period target.
pub fn calculator(habit: &Habit) -> StreakCalculator {
    // Habit rules always have interval 1.
    StreakCalculator::new(habit.frequency.rule())
        .unwrap_or_else(|_| StreakCalculator::daily())
        .with_target(habit.target_count)
}

/// Derive streak fields from the check-in dates.
pub fn recompute(habit: &mut Habit, today: NaiveDate) -> StreakSummary {
    let summary = calculator(habit).summarize(habit.completed_dates.iter().copied(), today);
    habit.streak = summary.current;
    habit.best_streak = summary.best;
    summary
}

/// Record a check-in. Returns `false` when the date was already checked.
pub fn check_in(habit: &mut Habit, date: NaiveDate, today: NaiveDate) -> bool {
    let added = habit.completed_dates.insert(date);
    recompute(habit, today);
    added
}

/// Remove a check-in. Returns `false` when the date was not checked.
pub fn uncheck(habit: &mut Habit, date: NaiveDate, today: NaiveDate) -> bool {
    let removed = habit.completed_dates.remove(&date);
    recompute(habit, today);
    removed
}

/// Points earned by all check-ins so far.
pub fn earned_points(habit: &Habit) -> i64 {
    habit.points * habit.completed_dates.len() as i64
}

/// Whether the current period already meets the target.
pub fn is_done_for_period(habit: &Habit, today: NaiveDate) -> bool {
    let pattern = habit.frequency.rule().pattern;
    let current = crate::recurrence::period_index(pattern, today);
    let count = habit
        .completed_dates
        .iter()
        .filter(|d| crate::recurrence::period_index(pattern, **d) == current)
        .count();
    count >= habit.target_count.max(1) as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::HabitFrequency;
    use chrono::Utc;
    use std::collections::BTreeSet;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn habit(frequency: HabitFrequency, target: u32) -> Habit {
        Habit {
            id: "h1".into(),
            user_id: "u1".into(),
            name: "Read".into(),
            frequency,
            target_count: target,
            completed_dates: BTreeSet::new(),
            streak: 0,
            best_streak: 0,
            points: 5,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn daily_habit_scenario() {
        let mut h = habit(HabitFrequency::Daily, 1);
        for day in 1..=5 {
            check_in(&mut h, d(2024, 1, day), d(2024, 1, day));
        }
        assert_eq!(h.streak, 5);
        assert_eq!(h.best_streak, 5);

        // Skip the 6th, check in on the 7th.
        check_in(&mut h, d(2024, 1, 7), d(2024, 1, 7));
        assert_eq!(h.streak, 1);
        assert_eq!(h.best_streak, 5);
    }

    #[test]
    fn stale_streak_is_zero_but_best_persists() {
        let mut h = habit(HabitFrequency::Daily, 1);
        for day in 1..=3 {
            check_in(&mut h, d(2024, 1, day), d(2024, 1, day));
        }
        recompute(&mut h, d(2024, 1, 10));
        assert_eq!(h.streak, 0);
        assert_eq!(h.best_streak, 3);
    }

    #[test]
    fn duplicate_check_in_is_ignored() {
        let mut h = habit(HabitFrequency::Daily, 1);
        assert!(check_in(&mut h, d(2024, 1, 1), d(2024, 1, 1)));
        assert!(!check_in(&mut h, d(2024, 1, 1), d(2024, 1, 1)));
        assert_eq!(earned_points(&h), 5);
    }

    #[test]
    fn uncheck_recomputes_from_dates() {
        let mut h = habit(HabitFrequency::Daily, 1);
        for day in 1..=4 {
            check_in(&mut h, d(2024, 1, day), d(2024, 1, 4));
        }
        assert!(uncheck(&mut h, d(2024, 1, 4), d(2024, 1, 4)));
        assert_eq!(h.streak, 3);
        assert_eq!(h.best_streak, 3);
        assert!(!uncheck(&mut h, d(2024, 1, 4), d(2024, 1, 4)));
    }

    #[test]
    fn weekly_target_counts_distinct_days() {
        let mut h = habit(HabitFrequency::Weekly, 2);
        check_in(&mut h, d(2024, 1, 1), d(2024, 1, 1));
        assert!(!is_done_for_period(&h, d(2024, 1, 3)));
        assert_eq!(h.streak, 0);
        check_in(&mut h, d(2024, 1, 3), d(2024, 1, 3));
        assert!(is_done_for_period(&h, d(2024, 1, 3)));
        assert_eq!(h.streak, 1);
    }
}

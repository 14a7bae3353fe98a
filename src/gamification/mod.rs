//! Points, levels and achievements over the completion ledger.
//!
//! The ledger is the source of truth. `UserGamification` values held here
//! are a cache rebuilt from the ledger after every change, so recording and
//! then reversing a completion restores the previous totals exactly.

pub mod achievements;
pub mod ledger;
pub mod levels;

pub use achievements::{Achievement, AchievementMetric, CATALOG};
pub use ledger::{CompletionLedger, CompletionRecord};
pub use levels::{LevelProgress, LevelThresholds};

use crate::error::{LedgerError, LedgerResult};
use crate::streak::StreakCalculator;
use crate::types::{
    CompletionEvent, CompletionInstance, CompletionState, UserAchievement, UserGamification,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Outcome of recording a completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionAward {
    pub entry_id: i64,
    pub points_awarded: i64,
    pub new_total: i64,
    pub level: u32,
    pub leveled_up: bool,
    /// Keys of achievements unlocked by this completion.
    pub unlocked: Vec<String>,
}

/// Outcome of reversing a completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionReversal {
    pub entry_id: i64,
    pub points_reverted: i64,
    pub new_total: i64,
    pub level: u32,
    pub leveled_down: bool,
}

/// Recompute a user's aggregate from their active ledger entries.
///
/// The user streak counts consecutive calendar days with a completion,
/// ending at the most recent one.
pub fn compute_stats<'a, I>(user_id: &str, entries: I, levels: &LevelThresholds) -> UserGamification
where
    I: IntoIterator<Item = &'a CompletionInstance>,
{
    let mut total_points = 0;
    let mut days = Vec::new();
    for entry in entries.into_iter().filter(|e| e.is_active() && e.user_id == user_id) {
        total_points += entry.points_earned;
        days.push(entry.activity_date());
    }

    let calc = StreakCalculator::daily();
    UserGamification {
        user_id: user_id.to_string(),
        total_points,
        current_streak: calc.current_streak(days.iter().copied()),
        best_streak: calc.best_streak(days.iter().copied()),
        last_completion_date: days.iter().max().copied(),
        level: levels.level_for(total_points),
    }
}

/// Completion state of a task instance as recorded in the ledger.
///
/// The state belongs to the instance, not to a user: once anyone has
/// completed it, it reads as completed for everyone.
pub fn instance_state(
    ledger: &CompletionLedger,
    task_id: &str,
    instance_date: Option<NaiveDate>,
) -> CompletionState {
    match ledger.find_active(task_id, instance_date) {
        Some(_) => CompletionState::Completed,
        None => CompletionState::Pending,
    }
}

/// In-memory points ledger with a derived per-user cache.
#[derive(Debug, Clone, Default)]
pub struct GamificationLedger {
    ledger: CompletionLedger,
    levels: LevelThresholds,
    stats: HashMap<String, UserGamification>,
    achievements: HashMap<String, Vec<UserAchievement>>,
}

impl GamificationLedger {
    pub fn new(levels: LevelThresholds) -> Self {
        Self {
            levels,
            ..Self::default()
        }
    }

    /// Build from stored ledger entries; caches are rebuilt immediately.
    pub fn from_entries(entries: Vec<CompletionInstance>, levels: LevelThresholds) -> Self {
        let mut this = Self {
            ledger: CompletionLedger::from_entries(entries),
            levels,
            ..Self::default()
        };
        let users: Vec<String> = this
            .ledger
            .entries()
            .iter()
            .map(|e| e.user_id.clone())
            .collect();
        for user in users {
            this.rebuild(&user);
        }
        this
    }

    pub fn ledger(&self) -> &CompletionLedger {
        &self.ledger
    }

    pub fn levels(&self) -> &LevelThresholds {
        &self.levels
    }

    /// Award `base_points` for one completion event.
    ///
    /// Not idempotent: each call appends a ledger entry. Completing an
    /// instance that already has an active entry is rejected.
    pub fn record_completion(
        &mut self,
        user_id: &str,
        task_id: &str,
        base_points: i64,
        completed_at: DateTime<Utc>,
        instance_date: Option<NaiveDate>,
    ) -> LedgerResult<CompletionAward> {
        if base_points < 0 {
            return Err(LedgerError::invalid_value(
                "base_points",
                "points must not be negative",
            ));
        }
        instance_state(&self.ledger, task_id, instance_date).apply(CompletionEvent::Complete)?;

        let before = self.stats(user_id);
        let entry_id = self
            .ledger
            .append(CompletionRecord {
                user_id: user_id.to_string(),
                task_id: task_id.to_string(),
                completed_at,
                points: base_points,
                instance_date,
            })
            .id;
        let after = self.rebuild(user_id);

        let unlocked = self.unlock_achievements(&after, completed_at);
        let leveled_up = after.level > before.level;
        if leveled_up {
            info!(user_id, level = after.level, "Level up");
        }
        debug!(
            user_id,
            task_id,
            points = base_points,
            total = after.total_points,
            "Completion recorded"
        );

        Ok(CompletionAward {
            entry_id,
            points_awarded: base_points,
            new_total: after.total_points,
            level: after.level,
            leveled_up,
            unlocked,
        })
    }

    /// Reverse the completion of one task instance.
    ///
    /// Points go back from whoever earned them, which need not be
    /// `user_id`. A missing entry is not fatal: it is logged as a warning
    /// and `None` is returned without touching the ledger.
    pub fn reverse_completion(
        &mut self,
        user_id: &str,
        task_id: &str,
        instance_date: Option<NaiveDate>,
        reversed_at: DateTime<Utc>,
    ) -> Option<CompletionReversal> {
        let before = self
            .ledger
            .find_active(task_id, instance_date)
            .map(|entry| self.stats(&entry.user_id));
        let entry = match self.ledger.reverse(task_id, instance_date, reversed_at) {
            Ok(entry) => entry,
            Err(err) => {
                warn!(user_id, task_id, error = %err, "Uncomplete ignored");
                return None;
            }
        };
        let earner = entry.user_id.clone();
        let before = before.unwrap_or_else(|| UserGamification::empty(&earner));
        let after = self.rebuild(&earner);
        debug!(
            user_id = %earner,
            task_id,
            points = entry.points_earned,
            total = after.total_points,
            "Completion reversed"
        );

        Some(CompletionReversal {
            entry_id: entry.id,
            points_reverted: entry.points_earned,
            new_total: after.total_points,
            level: after.level,
            leveled_down: after.level < before.level,
        })
    }

    /// Cached aggregate for a user (empty when the user has no entries).
    pub fn stats(&self, user_id: &str) -> UserGamification {
        self.stats
            .get(user_id)
            .cloned()
            .unwrap_or_else(|| UserGamification::empty(user_id))
    }

    /// Recompute the cache for a user from the ledger.
    pub fn rebuild(&mut self, user_id: &str) -> UserGamification {
        let stats = compute_stats(user_id, self.ledger.entries(), &self.levels);
        self.stats.insert(user_id.to_string(), stats.clone());
        stats
    }

    pub fn achievements(&self, user_id: &str) -> &[UserAchievement] {
        self.achievements
            .get(user_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    fn unlock_achievements(&mut self, stats: &UserGamification, now: DateTime<Utc>) -> Vec<String> {
        let unlocked = self.achievements.entry(stats.user_id.clone()).or_default();
        let fresh = achievements::newly_unlocked(
            stats,
            unlocked.iter().map(|a| a.achievement_key.as_str()),
        );
        let keys: Vec<String> = fresh.iter().map(|a| a.key.to_string()).collect();
        for key in &keys {
            info!(user_id = %stats.user_id, achievement = %key, "Achievement unlocked");
            unlocked.push(UserAchievement {
                user_id: stats.user_id.clone(),
                achievement_key: key.clone(),
                unlocked_at: now,
            });
        }
        keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, day, 12, 0, 0).unwrap()
    }

    fn ledger() -> GamificationLedger {
        GamificationLedger::new(LevelThresholds::new(vec![50, 100]))
    }

    #[test]
    fn award_adds_base_points() {
        let mut g = ledger();
        let award = g.record_completion("u1", "t1", 20, at(1), None).unwrap();
        assert_eq!(award.points_awarded, 20);
        assert_eq!(award.new_total, 20);
        assert_eq!(award.level, 1);
        assert!(!award.leveled_up);
        assert_eq!(award.unlocked, vec!["first_points".to_string()]);
    }

    #[test]
    fn crossing_threshold_levels_up() {
        let mut g = ledger();
        g.record_completion("u1", "t1", 40, at(1), None).unwrap();
        let award = g.record_completion("u1", "t2", 15, at(1), None).unwrap();
        assert!(award.leveled_up);
        assert_eq!(award.level, 2);
    }

    #[test]
    fn double_completion_is_rejected() {
        let mut g = ledger();
        g.record_completion("u1", "t1", 10, at(1), None).unwrap();
        let err = g.record_completion("u1", "t1", 10, at(1), None).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidTransition { .. }));
        assert_eq!(g.stats("u1").total_points, 10);
    }

    #[test]
    fn negative_points_are_rejected() {
        let mut g = ledger();
        assert!(g.record_completion("u1", "t1", -5, at(1), None).is_err());
        assert!(g.ledger().is_empty());
    }

    #[test]
    fn record_then_reverse_restores_totals_and_streak() {
        let mut g = ledger();
        let d = |day| NaiveDate::from_ymd_opt(2024, 1, day).unwrap();
        for day in 1..=3 {
            g.record_completion("u1", "daily", 10, at(day), Some(d(day))).unwrap();
        }
        let before = g.stats("u1");
        assert_eq!(before.current_streak, 3);

        g.record_completion("u1", "daily", 10, at(4), Some(d(4))).unwrap();
        assert_eq!(g.stats("u1").current_streak, 4);

        let reversal = g.reverse_completion("u1", "daily", Some(d(4)), at(4)).unwrap();
        assert_eq!(reversal.points_reverted, 10);
        assert_eq!(g.stats("u1"), before);
    }

    #[test]
    fn reversing_unknown_instance_is_a_noop() {
        let mut g = ledger();
        g.record_completion("u1", "t1", 10, at(1), None).unwrap();
        let before = g.stats("u1");
        let missing = NaiveDate::from_ymd_opt(2024, 1, 9);
        assert!(g.reverse_completion("u1", "t1", missing, at(2)).is_none());
        assert_eq!(g.stats("u1"), before);
    }

    #[test]
    fn reversal_can_level_down() {
        let mut g = ledger();
        g.record_completion("u1", "t1", 60, at(1), None).unwrap();
        let reversal = g.reverse_completion("u1", "t1", None, at(1)).unwrap();
        assert!(reversal.leveled_down);
        assert_eq!(reversal.new_total, 0);
        // Achievements stay unlocked.
        assert_eq!(g.achievements("u1").len(), 1);
    }

    #[test]
    fn instance_is_completed_once_across_users() {
        let mut g = ledger();
        g.record_completion("u1", "shared", 60, at(1), None).unwrap();
        let err = g.record_completion("u2", "shared", 60, at(1), None).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidTransition { .. }));
        assert_eq!(g.stats("u2").total_points, 0);
        assert_eq!(
            instance_state(g.ledger(), "shared", None),
            CompletionState::Completed
        );
    }

    #[test]
    fn reversal_by_another_user_reverts_the_earner() {
        let mut g = ledger();
        g.record_completion("u1", "shared", 60, at(1), None).unwrap();
        g.record_completion("u2", "own", 30, at(1), None).unwrap();

        let reversal = g.reverse_completion("u2", "shared", None, at(2)).unwrap();
        assert_eq!(reversal.points_reverted, 60);
        assert_eq!(reversal.new_total, 0);
        assert!(reversal.leveled_down);
        assert_eq!(g.stats("u1").total_points, 0);
        assert_eq!(g.stats("u2").total_points, 30);

        // The instance is open again for anyone.
        g.record_completion("u2", "shared", 60, at(2), None).unwrap();
        assert_eq!(g.stats("u2").total_points, 90);
    }

    #[test]
    fn users_are_isolated() {
        let mut g = ledger();
        g.record_completion("u1", "t1", 10, at(1), None).unwrap();
        g.record_completion("u2", "t1", 30, at(1), None).unwrap();
        assert_eq!(g.stats("u1").total_points, 10);
        assert_eq!(g.stats("u2").total_points, 30);
    }

    #[test]
    fn from_entries_rebuilds_cache() {
        let mut g = ledger();
        g.record_completion("u1", "t1", 10, at(1), None).unwrap();
        g.record_completion("u1", "t2", 10, at(2), None).unwrap();
        let restored = GamificationLedger::from_entries(
            g.ledger().entries().to_vec(),
            LevelThresholds::new(vec![50, 100]),
        );
        assert_eq!(restored.stats("u1"), g.stats("u1"));
    }
}

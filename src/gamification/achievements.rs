//! Static achievement catalog.
//!
//! Every achievement is a threshold over one field of [`UserGamification`].

use crate::types::UserGamification;
use serde::{Deserialize, Serialize};

/// Field an achievement threshold applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AchievementMetric {
    TotalPoints,
    CurrentStreak,
    BestStreak,
    Level,
}

/// A catalog entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Achievement {
    pub key: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub metric: AchievementMetric,
    pub threshold: i64,
}

impl Achievement {
    pub fn is_met(&self, stats: &UserGamification) -> bool {
        let value = match self.metric {
            AchievementMetric::TotalPoints => stats.total_points,
            AchievementMetric::CurrentStreak => i64::from(stats.current_streak),
            AchievementMetric::BestStreak => i64::from(stats.best_streak),
            AchievementMetric::Level => i64::from(stats.level),
        };
        value >= self.threshold
    }
}

pub const CATALOG: &[Achievement] = &[
    Achievement {
        key: "first_points",
        name: "First Steps",
        description: "Earn your first points",
        metric: AchievementMetric::TotalPoints,
        threshold: 1,
    },
    Achievement {
        key: "points_100",
        name: "Centurion",
        description: "Earn 100 points",
        metric: AchievementMetric::TotalPoints,
        threshold: 100,
    },
    Achievement {
        key: "points_1000",
        name: "Grinder",
        description: "Earn 1000 points",
        metric: AchievementMetric::TotalPoints,
        threshold: 1000,
    },
    Achievement {
        key: "streak_3",
        name: "Warming Up",
        description: "Complete something three days in a row",
        metric: AchievementMetric::CurrentStreak,
        threshold: 3,
    },
    Achievement {
        key: "streak_7",
        name: "Week Warrior",
        description: "Keep a seven day streak",
        metric: AchievementMetric::CurrentStreak,
        threshold: 7,
    },
    Achievement {
        key: "streak_30",
        name: "Unstoppable",
        description: "Reach a thirty day streak",
        metric: AchievementMetric::BestStreak,
        threshold: 30,
    },
    Achievement {
        key: "level_5",
        name: "Rising Star",
        description: "Reach level 5",
        metric: AchievementMetric::Level,
        threshold: 5,
    },
];

pub fn find(key: &str) -> Option<&'static Achievement> {
    CATALOG.iter().find(|a| a.key == key)
}

/// Catalog entries whose predicate holds and that are not yet unlocked.
pub fn newly_unlocked<'a, S>(stats: &UserGamification, unlocked: S) -> Vec<&'static Achievement>
where
    S: IntoIterator<Item = &'a str>,
{
    let unlocked: Vec<&str> = unlocked.into_iter().collect();
    CATALOG
        .iter()
        .filter(|a| !unlocked.contains(&a.key) && a.is_met(stats))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(points: i64, current: u32, best: u32, level: u32) -> UserGamification {
        UserGamification {
            total_points: points,
            current_streak: current,
            best_streak: best,
            level,
            ..UserGamification::empty("u")
        }
    }

    #[test]
    fn catalog_keys_are_unique() {
        for (i, a) in CATALOG.iter().enumerate() {
            assert!(CATALOG[i + 1..].iter().all(|b| b.key != a.key), "{}", a.key);
        }
    }

    #[test]
    fn unlocks_thresholds_that_are_met() {
        let keys: Vec<_> = newly_unlocked(&stats(120, 3, 3, 2), Vec::new())
            .iter()
            .map(|a| a.key)
            .collect();
        assert_eq!(keys, vec!["first_points", "points_100", "streak_3"]);
    }

    #[test]
    fn skips_already_unlocked() {
        let keys: Vec<_> = newly_unlocked(&stats(120, 0, 3, 2), ["first_points"])
            .iter()
            .map(|a| a.key)
            .collect();
        assert_eq!(keys, vec!["points_100"]);
    }

    #[test]
    fn find_by_key() {
        assert_eq!(find("level_5").map(|a| a.threshold), Some(5));
        assert!(find("nope").is_none());
    }
}

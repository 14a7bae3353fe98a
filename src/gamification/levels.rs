//! Level as a step function of total points.

use serde::{Deserialize, Serialize};

/// Default point totals at which levels 2, 3, ... are reached.
pub const DEFAULT_LEVEL_THRESHOLDS: [i64; 9] = [100, 250, 500, 1000, 2000, 3500, 5500, 8000, 11000];

/// Ascending point thresholds. Level 1 sits below the first threshold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<i64>", into = "Vec<i64>")]
pub struct LevelThresholds(Vec<i64>);

impl From<Vec<i64>> for LevelThresholds {
    fn from(thresholds: Vec<i64>) -> Self {
        Self::new(thresholds)
    }
}

impl From<LevelThresholds> for Vec<i64> {
    fn from(levels: LevelThresholds) -> Self {
        levels.0
    }
}

impl Default for LevelThresholds {
    fn default() -> Self {
        Self(DEFAULT_LEVEL_THRESHOLDS.to_vec())
    }
}

/// Where a point total sits inside its level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelProgress {
    pub level: u32,
    /// Points earned since reaching `level`.
    pub xp_into_level: i64,
    /// Points still needed for the next level; `None` at the top level.
    pub xp_to_next: Option<i64>,
}

impl LevelThresholds {
    /// Thresholds are sorted and deduplicated; non-positive ones are dropped.
    pub fn new(mut thresholds: Vec<i64>) -> Self {
        thresholds.retain(|t| *t > 0);
        thresholds.sort_unstable();
        thresholds.dedup();
        Self(thresholds)
    }

    pub fn as_slice(&self) -> &[i64] {
        &self.0
    }

    pub fn max_level(&self) -> u32 {
        self.0.len() as u32 + 1
    }

    pub fn level_for(&self, total_points: i64) -> u32 {
        self.0.partition_point(|t| *t <= total_points) as u32 + 1
    }

    pub fn progress(&self, total_points: i64) -> LevelProgress {
        let level = self.level_for(total_points);
        let floor = match level {
            1 => 0,
            n => self.0[(n - 2) as usize],
        };
        let xp_to_next = self.0.get((level - 1) as usize).map(|next| next - total_points);
        LevelProgress {
            level,
            xp_into_level: total_points.max(0) - floor,
            xp_to_next,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_steps_at_thresholds() {
        let levels = LevelThresholds::new(vec![100, 250]);
        assert_eq!(levels.level_for(0), 1);
        assert_eq!(levels.level_for(99), 1);
        assert_eq!(levels.level_for(100), 2);
        assert_eq!(levels.level_for(249), 2);
        assert_eq!(levels.level_for(250), 3);
        assert_eq!(levels.level_for(10_000), 3);
        assert_eq!(levels.max_level(), 3);
    }

    #[test]
    fn negative_totals_stay_at_level_one() {
        let levels = LevelThresholds::default();
        assert_eq!(levels.level_for(-50), 1);
        assert_eq!(levels.progress(-50).xp_into_level, 0);
    }

    #[test]
    fn thresholds_are_normalized() {
        let levels = LevelThresholds::new(vec![500, 0, 100, 100, -3]);
        assert_eq!(levels.as_slice(), &[100, 500]);
    }

    #[test]
    fn deserialized_thresholds_are_normalized() {
        let levels: LevelThresholds = serde_json::from_str("[250, 100]").unwrap();
        assert_eq!(levels.as_slice(), &[100, 250]);
        assert_eq!(serde_json::to_string(&levels).unwrap(), "[100,250]");
    }

    #[test]
    fn progress_within_level() {
        let levels = LevelThresholds::new(vec![100, 250]);
        assert_eq!(
            levels.progress(130),
            LevelProgress {
                level: 2,
                xp_into_level: 30,
                xp_to_next: Some(120),
            }
        );
        assert_eq!(levels.progress(300).xp_to_next, None);
    }
}

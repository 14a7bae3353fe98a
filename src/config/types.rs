//! Configuration types and structures.

use crate::format::OutputFormat;
use crate::gamification::LevelThresholds;
use crate::error::{LedgerError, LedgerResult};
use crate::types::Difficulty;
use anyhow::{Context, Result};
use chrono::Weekday;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub gamification: GamificationConfig,

    #[serde(default)]
    pub calendar: CalendarConfig,

    #[serde(default)]
    pub output: OutputConfig,
}

impl Config {
    /// Load configuration from a single YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        config
            .validate()
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        Ok(config)
    }

    /// Reject values the ledger cannot store.
    pub fn validate(&self) -> LedgerResult<()> {
        self.gamification.points.validate()
    }

    /// Ensure the database directory exists.
    pub fn ensure_db_dir(&self) -> Result<()> {
        if let Some(parent) = self.storage.db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Ok(())
    }
}

/// Storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("taskstreak/taskstreak.db")
}

/// Points and level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GamificationConfig {
    /// Point totals at which levels 2, 3, ... are reached.
    #[serde(default)]
    pub level_thresholds: LevelThresholds,

    /// Default base points per difficulty for tasks without explicit points.
    #[serde(default)]
    pub points: DifficultyPoints,
}

/// Base points per difficulty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DifficultyPoints {
    #[serde(default = "default_easy_points")]
    pub easy: i64,
    #[serde(default = "default_medium_points")]
    pub medium: i64,
    #[serde(default = "default_hard_points")]
    pub hard: i64,
}

impl Default for DifficultyPoints {
    fn default() -> Self {
        Self {
            easy: default_easy_points(),
            medium: default_medium_points(),
            hard: default_hard_points(),
        }
    }
}

impl DifficultyPoints {
    /// Points must not be negative.
    pub fn validate(&self) -> LedgerResult<()> {
        let fields = [("easy", self.easy), ("medium", self.medium), ("hard", self.hard)];
        for (name, points) in fields {
            if points < 0 {
                return Err(LedgerError::invalid_value(
                    &format!("gamification.points.{}", name),
                    format!("must not be negative, got {}", points),
                ));
            }
        }
        Ok(())
    }

    pub fn for_difficulty(&self, difficulty: Difficulty) -> i64 {
        match difficulty {
            Difficulty::Easy => self.easy,
            Difficulty::Medium => self.medium,
            Difficulty::Hard => self.hard,
        }
    }
}

fn default_easy_points() -> i64 {
    5
}

fn default_medium_points() -> i64 {
    10
}

fn default_hard_points() -> i64 {
    20
}

/// First day of the week for heatmap columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeekStart {
    #[default]
    Monday,
    Sunday,
}

impl WeekStart {
    pub fn weekday(&self) -> Weekday {
        match self {
            WeekStart::Monday => Weekday::Mon,
            WeekStart::Sunday => Weekday::Sun,
        }
    }
}

/// Calendar display configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CalendarConfig {
    #[serde(default)]
    pub week_start: WeekStart,
}

/// CLI output configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Default output format (json or markdown).
    #[serde(default)]
    pub format: OutputFormat,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.storage.db_path, PathBuf::from("taskstreak/taskstreak.db"));
        assert_eq!(config.gamification.points.for_difficulty(Difficulty::Hard), 20);
        assert_eq!(config.gamification.level_thresholds.level_for(100), 2);
        assert_eq!(config.calendar.week_start.weekday(), Weekday::Mon);
        assert_eq!(config.output.format, OutputFormat::Markdown);
    }

    #[test]
    fn partial_yaml_keeps_defaults() {
        let yaml = r#"
gamification:
  level_thresholds: [10, 20]
  points:
    hard: 50
calendar:
  week_start: sunday
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.gamification.level_thresholds.as_slice(), &[10, 20]);
        assert_eq!(config.gamification.points.hard, 50);
        assert_eq!(config.gamification.points.easy, 5);
        assert_eq!(config.calendar.week_start, WeekStart::Sunday);
    }

    #[test]
    fn negative_points_are_rejected() {
        let yaml = "gamification:\n  points:\n    medium: -3\n";
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        let err = config.validate().unwrap_err();
        assert_eq!(err.code(), crate::error::ErrorCode::InvalidFieldValue);
        assert!(err.to_string().contains("gamification.points.medium"));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, yaml).unwrap();
        assert!(Config::load(&path).is_err());

        assert!(Config::default().validate().is_ok());
    }
}

//! Core types for tasks, habits and the completion ledger.

use crate::error::{LedgerError, LedgerResult};
use crate::recurrence::{RecurrencePattern, RecurrenceRule};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Task priority: 1 = low, 2 = medium, 3 = high.
pub type Priority = u8;

pub const PRIORITY_LOW: Priority = 1;
pub const PRIORITY_MEDIUM: Priority = 2;
pub const PRIORITY_HIGH: Priority = 3;

/// Parse a priority string ("high", "medium", "low" or 1-3).
pub fn parse_priority(s: &str) -> LedgerResult<Priority> {
    match s.to_lowercase().as_str() {
        "high" => Ok(PRIORITY_HIGH),
        "medium" => Ok(PRIORITY_MEDIUM),
        "low" => Ok(PRIORITY_LOW),
        other => match other.parse::<Priority>() {
            Ok(p) if (PRIORITY_LOW..=PRIORITY_HIGH).contains(&p) => Ok(p),
            _ => Err(LedgerError::invalid_value(
                "priority",
                format!("expected low, medium, high or 1-3, got '{}'", s),
            )),
        },
    }
}

/// Convert priority to its name.
pub fn priority_to_str(p: Priority) -> &'static str {
    match p {
        PRIORITY_HIGH => "high",
        PRIORITY_LOW => "low",
        _ => "medium",
    }
}

/// How hard a task is; drives the default points when a task has none.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

impl FromStr for Difficulty {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            _ => Err(LedgerError::invalid_value(
                "difficulty",
                format!("expected easy, medium or hard, got '{}'", s),
            )),
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A task owned by a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub description: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub priority: Priority,
    pub category: Option<String>,
    pub tags: Vec<String>,
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub parent_task_id: Option<String>,
    pub depends_on: BTreeSet<String>,
    pub recurrence: RecurrenceRule,
    pub estimated_duration_minutes: Option<u32>,
    pub difficulty: Difficulty,
    /// Explicit base points; `None` falls back to the difficulty default.
    pub points: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    pub fn is_recurring(&self) -> bool {
        self.recurrence.is_recurring()
    }

    /// First occurrence of a recurring task: the due date, else the creation day.
    pub fn recurrence_anchor(&self) -> NaiveDate {
        self.due_date.unwrap_or_else(|| self.created_at.date_naive())
    }
}

/// Input for creating a task.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewTask {
    /// Custom task ID (optional, UUID7 generated if not provided)
    pub id: Option<String>,
    pub user_id: String,
    pub title: String,
    pub description: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub priority: Option<Priority>,
    pub category: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub parent_task_id: Option<String>,
    #[serde(default)]
    pub recurrence: RecurrenceRule,
    pub estimated_duration_minutes: Option<u32>,
    #[serde(default)]
    pub difficulty: Difficulty,
    pub points: Option<i64>,
}

/// One entry of the completion ledger.
///
/// Entries are appended once per completion event. A reversal sets
/// `reversed_at`; no other field ever changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionInstance {
    pub id: i64,
    pub user_id: String,
    pub task_id: String,
    pub completed_at: DateTime<Utc>,
    pub points_earned: i64,
    pub is_recurring_instance: bool,
    pub recurring_instance_date: Option<NaiveDate>,
    pub reversed_at: Option<DateTime<Utc>>,
}

impl CompletionInstance {
    pub fn is_active(&self) -> bool {
        self.reversed_at.is_none()
    }

    /// Calendar day this completion counts for in streaks and the heatmap.
    pub fn activity_date(&self) -> NaiveDate {
        self.completed_at.date_naive()
    }

    /// Whether this entry records the given task instance.
    pub fn matches(&self, task_id: &str, instance_date: Option<NaiveDate>) -> bool {
        self.task_id == task_id && self.recurring_instance_date == instance_date
    }
}

/// Completion state of a task or of one recurring task instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionState {
    Pending,
    Completed,
}

/// Events driving [`CompletionState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionEvent {
    Complete,
    Uncomplete,
}

impl CompletionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompletionState::Pending => "pending",
            CompletionState::Completed => "completed",
        }
    }

    /// Apply an event. Only `pending -> completed` and `completed -> pending`
    /// exist; anything else would award or reverse twice.
    pub fn apply(self, event: CompletionEvent) -> LedgerResult<CompletionState> {
        match (self, event) {
            (CompletionState::Pending, CompletionEvent::Complete) => {
                Ok(CompletionState::Completed)
            }
            (CompletionState::Completed, CompletionEvent::Uncomplete) => {
                Ok(CompletionState::Pending)
            }
            (state, event) => Err(LedgerError::InvalidTransition {
                event: match event {
                    CompletionEvent::Complete => "complete".to_string(),
                    CompletionEvent::Uncomplete => "uncomplete".to_string(),
                },
                state: state.as_str().to_string(),
            }),
        }
    }
}

/// Habit cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HabitFrequency {
    #[default]
    Daily,
    Weekly,
    Monthly,
}

impl HabitFrequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            HabitFrequency::Daily => "daily",
            HabitFrequency::Weekly => "weekly",
            HabitFrequency::Monthly => "monthly",
        }
    }

    /// Rule used for streak bucketing.
    pub fn rule(&self) -> RecurrenceRule {
        let pattern = match self {
            HabitFrequency::Daily => RecurrencePattern::Daily,
            HabitFrequency::Weekly => RecurrencePattern::Weekly,
            HabitFrequency::Monthly => RecurrencePattern::Monthly,
        };
        RecurrenceRule {
            pattern,
            interval: 1,
        }
    }
}

impl FromStr for HabitFrequency {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "daily" => Ok(HabitFrequency::Daily),
            "weekly" => Ok(HabitFrequency::Weekly),
            "monthly" => Ok(HabitFrequency::Monthly),
            _ => Err(LedgerError::invalid_value(
                "frequency",
                format!("expected daily, weekly or monthly, got '{}'", s),
            )),
        }
    }
}

/// A habit and its check-in history.
///
/// `streak` and `best_streak` are derived from `completed_dates`; see
/// [`crate::habits`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Habit {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub frequency: HabitFrequency,
    pub target_count: u32,
    pub completed_dates: BTreeSet<NaiveDate>,
    pub streak: u32,
    pub best_streak: u32,
    /// Points per check-in.
    pub points: i64,
    pub created_at: DateTime<Utc>,
}

/// Input for creating a habit.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewHabit {
    pub id: Option<String>,
    pub user_id: String,
    pub name: String,
    #[serde(default)]
    pub frequency: HabitFrequency,
    /// Check-ins needed per period; defaults to 1.
    pub target_count: Option<u32>,
    #[serde(default)]
    pub points: i64,
}

/// Per-user aggregate over the ledger. Always rebuildable from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserGamification {
    pub user_id: String,
    pub total_points: i64,
    pub current_streak: u32,
    pub best_streak: u32,
    pub last_completion_date: Option<NaiveDate>,
    pub level: u32,
}

impl UserGamification {
    pub fn empty(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            total_points: 0,
            current_streak: 0,
            best_streak: 0,
            last_completion_date: None,
            level: 1,
        }
    }

    /// The aggregate as seen on `today`: a streak whose last completion is
    /// neither today nor yesterday has lapsed and reads as 0.
    pub fn as_of(mut self, today: NaiveDate) -> Self {
        let lapsed = self
            .last_completion_date
            .is_none_or(|last| today.signed_duration_since(last).num_days() > 1);
        if lapsed {
            self.current_streak = 0;
        }
        self
    }
}

/// An unlocked achievement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAchievement {
    pub user_id: String,
    pub achievement_key: String,
    pub unlocked_at: DateTime<Utc>,
}

/// Access granted on a shared task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    View,
    Comment,
    Edit,
}

impl Permission {
    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::View => "view",
            Permission::Comment => "comment",
            Permission::Edit => "edit",
        }
    }

    /// `Edit` implies `Comment` implies `View`.
    pub fn allows(&self, required: Permission) -> bool {
        *self >= required
    }
}

impl FromStr for Permission {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "view" => Ok(Permission::View),
            "comment" => Ok(Permission::Comment),
            "edit" => Ok(Permission::Edit),
            _ => Err(LedgerError::invalid_value(
                "permission",
                format!("expected view, comment or edit, got '{}'", s),
            )),
        }
    }
}

/// A task shared with another user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharedTask {
    pub task_id: String,
    pub owner_id: String,
    pub shared_with: String,
    pub permission: Permission,
    pub expires_at: Option<DateTime<Utc>>,
}

impl SharedTask {
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_none_or(|expires| now < expires)
    }

    /// Effective permission at `now`, or `None` once expired.
    pub fn effective_permission(&self, now: DateTime<Utc>) -> Option<Permission> {
        self.is_active(now).then_some(self.permission)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn parse_priority_names_and_numbers() {
        assert_eq!(parse_priority("High").unwrap(), PRIORITY_HIGH);
        assert_eq!(parse_priority("1").unwrap(), PRIORITY_LOW);
        assert!(parse_priority("4").is_err());
        assert!(parse_priority("urgent").is_err());
        assert_eq!(priority_to_str(PRIORITY_MEDIUM), "medium");
    }

    #[test]
    fn completion_state_allows_only_toggles() {
        let state = CompletionState::Pending;
        let state = state.apply(CompletionEvent::Complete).unwrap();
        assert_eq!(state, CompletionState::Completed);

        let err = state.apply(CompletionEvent::Complete).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidTransition { .. }));

        let state = state.apply(CompletionEvent::Uncomplete).unwrap();
        assert_eq!(state, CompletionState::Pending);
        assert!(state.apply(CompletionEvent::Uncomplete).is_err());
    }

    #[test]
    fn permissions_are_ordered() {
        assert!(Permission::Edit.allows(Permission::Comment));
        assert!(Permission::Comment.allows(Permission::View));
        assert!(!Permission::View.allows(Permission::Edit));
    }

    #[test]
    fn shared_task_expires() {
        let expires = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let share = SharedTask {
            task_id: "t".into(),
            owner_id: "alice".into(),
            shared_with: "bob".into(),
            permission: Permission::Comment,
            expires_at: Some(expires),
        };
        let before = Utc.with_ymd_and_hms(2024, 5, 31, 23, 0, 0).unwrap();
        assert_eq!(share.effective_permission(before), Some(Permission::Comment));
        assert_eq!(share.effective_permission(expires), None);
    }

    #[test]
    fn habit_frequency_maps_to_unit_rule() {
        assert_eq!(HabitFrequency::Weekly.rule(), RecurrenceRule::weekly(1).unwrap());
        assert!("hourly".parse::<HabitFrequency>().is_err());
    }

    #[test]
    fn streak_lapses_after_a_missed_day() {
        let d = |day| NaiveDate::from_ymd_opt(2024, 1, day).unwrap();
        let stats = UserGamification {
            current_streak: 5,
            best_streak: 5,
            last_completion_date: Some(d(5)),
            ..UserGamification::empty("alice")
        };

        assert_eq!(stats.clone().as_of(d(5)).current_streak, 5);
        assert_eq!(stats.clone().as_of(d(6)).current_streak, 5);

        let lapsed = stats.as_of(d(7));
        assert_eq!(lapsed.current_streak, 0);
        assert_eq!(lapsed.best_streak, 5);
        assert_eq!(UserGamification::empty("bob").as_of(d(1)).current_streak, 0);
    }
}

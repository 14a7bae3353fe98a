//! Structured error types for ledger and scheduling operations.

use chrono::NaiveDate;
use serde::Serialize;

/// Error codes for programmatic error handling.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Validation errors
    InvalidRule,
    InvalidDateRange,
    InvalidFieldValue,
    InvalidTransition,

    // Not found errors
    TaskNotFound,
    HabitNotFound,
    CompletionNotFound,

    // Conflict errors
    DependencyCycle,

    // Access errors
    PermissionDenied,
}

/// Errors raised by the recurrence, streak and ledger operations.
///
/// All variants are recoverable; callers map them to a user-facing message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("Invalid recurrence rule: {0}")]
    InvalidRule(String),

    #[error("Invalid date range: end {end} is before start {start}")]
    InvalidDateRange { start: NaiveDate, end: NaiveDate },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Cannot {event} a task instance that is already {state}")]
    InvalidTransition { event: String, state: String },

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Habit not found: {0}")]
    HabitNotFound(String),

    #[error("No completion recorded for task {task_id}{}", instance_suffix(.instance_date))]
    CompletionNotFound {
        task_id: String,
        instance_date: Option<NaiveDate>,
    },

    #[error("Adding dependency {from} -> {to} would create a cycle")]
    DependencyCycle { from: String, to: String },

    #[error("User {user_id} may not {action} task {task_id}")]
    PermissionDenied {
        user_id: String,
        task_id: String,
        action: String,
    },
}

fn instance_suffix(date: &Option<NaiveDate>) -> String {
    match date {
        Some(d) => format!(" on {}", d),
        None => String::new(),
    }
}

impl LedgerError {
    pub fn code(&self) -> ErrorCode {
        match self {
            LedgerError::InvalidRule(_) => ErrorCode::InvalidRule,
            LedgerError::InvalidDateRange { .. } => ErrorCode::InvalidDateRange,
            LedgerError::InvalidValue { .. } => ErrorCode::InvalidFieldValue,
            LedgerError::InvalidTransition { .. } => ErrorCode::InvalidTransition,
            LedgerError::TaskNotFound(_) => ErrorCode::TaskNotFound,
            LedgerError::HabitNotFound(_) => ErrorCode::HabitNotFound,
            LedgerError::CompletionNotFound { .. } => ErrorCode::CompletionNotFound,
            LedgerError::DependencyCycle { .. } => ErrorCode::DependencyCycle,
            LedgerError::PermissionDenied { .. } => ErrorCode::PermissionDenied,
        }
    }

    // Convenience constructors

    pub fn invalid_value(field: &str, reason: impl Into<String>) -> Self {
        LedgerError::InvalidValue {
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    pub fn date_range(start: NaiveDate, end: NaiveDate) -> Self {
        LedgerError::InvalidDateRange { start, end }
    }

    pub fn task_not_found(task_id: &str) -> Self {
        LedgerError::TaskNotFound(task_id.to_string())
    }

    pub fn habit_not_found(habit_id: &str) -> Self {
        LedgerError::HabitNotFound(habit_id.to_string())
    }

    pub fn completion_not_found(task_id: &str, instance_date: Option<NaiveDate>) -> Self {
        LedgerError::CompletionNotFound {
            task_id: task_id.to_string(),
            instance_date,
        }
    }

    pub fn dependency_cycle(from: &str, to: &str) -> Self {
        LedgerError::DependencyCycle {
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    pub fn permission_denied(user_id: &str, task_id: &str, action: &str) -> Self {
        LedgerError::PermissionDenied {
            user_id: user_id.to_string(),
            task_id: task_id.to_string(),
            action: action.to_string(),
        }
    }

    /// Serializable report for JSON output.
    pub fn report(&self) -> ErrorReport {
        ErrorReport {
            code: self.code(),
            message: self.to_string(),
        }
    }
}

/// Error payload for JSON consumers.
#[derive(Debug, Serialize)]
pub struct ErrorReport {
    pub code: ErrorCode,
    pub message: String,
}

/// Result type for ledger operations.
pub type LedgerResult<T> = std::result::Result<T, LedgerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_serialize_screaming_snake_case() {
        let json = serde_json::to_string(&ErrorCode::CompletionNotFound).unwrap();
        assert_eq!(json, "\"COMPLETION_NOT_FOUND\"");
    }

    #[test]
    fn completion_not_found_mentions_instance_date() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let err = LedgerError::completion_not_found("t1", Some(date));
        assert_eq!(err.to_string(), "No completion recorded for task t1 on 2024-03-01");
        assert_eq!(err.code(), ErrorCode::CompletionNotFound);

        let err = LedgerError::completion_not_found("t1", None);
        assert_eq!(err.to_string(), "No completion recorded for task t1");
    }

    #[test]
    fn report_carries_code_and_message() {
        let err = LedgerError::dependency_cycle("a", "b");
        let report = serde_json::to_value(err.report()).unwrap();
        assert_eq!(report["code"], "DEPENDENCY_CYCLE");
        assert_eq!(report["message"], "Adding dependency a -> b would create a cycle");
    }
}

//! Task subcommands.

use crate::error::LedgerResult;
use crate::recurrence::RecurrenceRule;
use crate::types::{Difficulty, NewTask, parse_priority};
use chrono::NaiveDate;
use clap::{Args, Subcommand};

#[derive(Subcommand, Debug)]
pub enum TaskCommand {
    /// Create a task
    Add(AddTaskArgs),

    /// List tasks
    List(ListTaskArgs),

    /// Show one task
    Show {
        id: String,
    },

    /// Complete a task, or one instance of a recurring task
    Complete(InstanceArgs),

    /// Undo a completion
    Uncomplete(InstanceArgs),

    /// Add, replace or remove dependencies
    Depend(DependArgs),

    /// List due dates in a window
    Due(DueArgs),

    /// Share a task with another user
    Share(ShareArgs),

    /// Delete a task
    Delete {
        id: String,
    },
}

/// Arguments for `task add`
#[derive(Args, Debug)]
pub struct AddTaskArgs {
    pub title: String,

    #[arg(long)]
    pub description: Option<String>,

    /// Due date; for repeating tasks, the first occurrence
    #[arg(long, value_name = "DATE")]
    pub due: Option<NaiveDate>,

    /// low, medium, high or 1-3
    #[arg(short, long)]
    pub priority: Option<String>,

    #[arg(long)]
    pub category: Option<String>,

    /// Tag (repeatable)
    #[arg(short, long = "tag")]
    pub tags: Vec<String>,

    #[arg(long)]
    pub parent: Option<String>,

    /// Repeat pattern: daily, weekly, monthly or yearly
    #[arg(short, long, default_value = "none")]
    pub repeat: String,

    /// Repeat every N pattern units
    #[arg(short, long, default_value_t = 1)]
    pub every: i64,

    /// Estimated duration in minutes
    #[arg(long)]
    pub estimate: Option<u32>,

    /// easy, medium or hard
    #[arg(long, default_value = "medium")]
    pub difficulty: String,

    /// Base points (defaults to the difficulty's points)
    #[arg(long)]
    pub points: Option<i64>,

    /// Custom task ID
    #[arg(long)]
    pub id: Option<String>,
}

impl AddTaskArgs {
    pub fn into_new_task(self, user_id: &str) -> LedgerResult<NewTask> {
        Ok(NewTask {
            id: self.id,
            user_id: user_id.to_string(),
            title: self.title,
            description: self.description,
            due_date: self.due,
            priority: self.priority.as_deref().map(parse_priority).transpose()?,
            category: self.category,
            tags: self.tags,
            parent_task_id: self.parent,
            recurrence: RecurrenceRule::from_parts(&self.repeat, self.every)?,
            estimated_duration_minutes: self.estimate,
            difficulty: self.difficulty.parse::<Difficulty>()?,
            points: self.points,
        })
    }
}

/// Arguments for `task list`
#[derive(Args, Debug)]
pub struct ListTaskArgs {
    /// Include completed tasks
    #[arg(short, long)]
    pub all: bool,

    /// Only completed tasks
    #[arg(long, conflicts_with = "all")]
    pub completed: bool,

    #[arg(long)]
    pub category: Option<String>,

    #[arg(long)]
    pub tag: Option<String>,

    /// Only repeating tasks
    #[arg(long)]
    pub recurring: bool,

    #[arg(long)]
    pub limit: Option<u32>,
}

impl ListTaskArgs {
    /// Completed filter: open tasks unless `--all` or `--completed`.
    pub fn completed_filter(&self) -> Option<bool> {
        match (self.all, self.completed) {
            (_, true) => Some(true),
            (true, false) => None,
            (false, false) => Some(false),
        }
    }
}

/// A task and, for repeating tasks, the instance date.
#[derive(Args, Debug)]
pub struct InstanceArgs {
    pub id: String,

    /// Instance date of a repeating task
    #[arg(long, value_name = "DATE")]
    pub date: Option<NaiveDate>,
}

/// Arguments for `task depend`
#[derive(Args, Debug)]
pub struct DependArgs {
    pub id: String,

    /// Tasks this task depends on (repeatable)
    #[arg(long = "on", value_name = "TASK")]
    pub on: Vec<String>,

    /// Replace existing dependencies instead of adding
    #[arg(long)]
    pub replace: bool,

    /// Remove the given dependencies instead of adding
    #[arg(long, conflicts_with = "replace")]
    pub remove: bool,
}

/// Arguments for `task due`
#[derive(Args, Debug)]
pub struct DueArgs {
    /// Window start (defaults to today)
    #[arg(long, value_name = "DATE")]
    pub from: Option<NaiveDate>,

    /// Window end (defaults to a week after the start)
    #[arg(long, value_name = "DATE")]
    pub to: Option<NaiveDate>,
}

/// Arguments for `task share`
#[derive(Args, Debug)]
pub struct ShareArgs {
    pub id: String,

    /// User to share with
    #[arg(long = "with", value_name = "USER")]
    pub with: String,

    /// view, comment or edit
    #[arg(long, default_value = "view")]
    pub permission: String,

    /// Last day of access
    #[arg(long, value_name = "DATE")]
    pub until: Option<NaiveDate>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recurrence::RecurrencePattern;

    fn add_args(repeat: &str, every: i64) -> AddTaskArgs {
        AddTaskArgs {
            title: "Water plants".to_string(),
            description: None,
            due: NaiveDate::from_ymd_opt(2024, 1, 1),
            priority: Some("high".to_string()),
            category: None,
            tags: vec!["home".to_string()],
            parent: None,
            repeat: repeat.to_string(),
            every,
            estimate: None,
            difficulty: "easy".to_string(),
            points: None,
            id: None,
        }
    }

    #[test]
    fn add_args_build_new_task() {
        let task = add_args("weekly", 2).into_new_task("alice").unwrap();
        assert_eq!(task.user_id, "alice");
        assert_eq!(task.priority, Some(3));
        assert_eq!(task.recurrence.pattern, RecurrencePattern::Weekly);
        assert_eq!(task.recurrence.interval, 2);
        assert_eq!(task.difficulty, Difficulty::Easy);
    }

    #[test]
    fn add_args_reject_bad_rules() {
        assert!(add_args("weekly", 0).into_new_task("alice").is_err());
        assert!(add_args("fortnightly", 1).into_new_task("alice").is_err());
    }

    #[test]
    fn list_defaults_to_open_tasks() {
        let args = ListTaskArgs {
            all: false,
            completed: false,
            category: None,
            tag: None,
            recurring: false,
            limit: None,
        };
        assert_eq!(args.completed_filter(), Some(false));
    }
}

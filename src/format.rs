//! Output formatting utilities for markdown and JSON.

use crate::activity::ActivityGrid;
use crate::gamification::{LevelProgress, achievements};
use crate::types::{Habit, PRIORITY_HIGH, Task, UserAchievement, UserGamification, priority_to_str};
use chrono::{NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

/// Output format for command results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Json,
    #[default]
    Markdown,
}

impl OutputFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "json" => Some(OutputFormat::Json),
            "markdown" | "md" => Some(OutputFormat::Markdown),
            _ => None,
        }
    }
}

/// Format a single task as markdown.
pub fn format_task_markdown(task: &Task, unmet: &[String]) -> String {
    let mut md = String::new();

    md.push_str(&format!("## Task: {}\n", task.title));
    md.push_str(&format!("- **id**: `{}`\n", task.id));
    let status = if task.completed { "completed" } else { "pending" };
    md.push_str(&format!("- **status**: {}\n", status));
    md.push_str(&format!("- **priority**: {}\n", priority_to_str(task.priority)));
    md.push_str(&format!("- **difficulty**: {}\n", task.difficulty));

    if task.is_recurring() {
        md.push_str(&format!("- **repeats**: {}\n", task.recurrence));
    }

    if let Some(due) = task.due_date {
        md.push_str(&format!("- **due**: {}\n", due));
    }

    if let Some(ref category) = task.category {
        md.push_str(&format!("- **category**: {}\n", category));
    }

    if !task.tags.is_empty() {
        md.push_str(&format!("- **tags**: {}\n", task.tags.join(", ")));
    }

    if let Some(ref parent_id) = task.parent_task_id {
        md.push_str(&format!("- **parent_id**: `{}`\n", parent_id));
    }

    if !unmet.is_empty() {
        let blockers: Vec<String> = unmet.iter().map(|id| format!("`{}`", id)).collect();
        md.push_str(&format!("- **blocked_by**: {}\n", blockers.join(", ")));
    }

    if let Some(points) = task.points {
        md.push_str(&format!("- **points**: {}\n", points));
    }

    if let Some(minutes) = task.estimated_duration_minutes {
        md.push_str(&format!("- **estimate**: {} min\n", minutes));
    }

    if let Some(ref desc) = task.description {
        md.push_str("\n### Description\n");
        md.push_str(desc);
        md.push('\n');
    }

    md
}

/// Format a list of tasks as markdown, open tasks first.
pub fn format_tasks_markdown(tasks: &[Task]) -> String {
    let mut md = String::new();

    md.push_str(&format!("# Tasks ({})\n\n", tasks.len()));

    let (done, open): (Vec<&Task>, Vec<&Task>) = tasks.iter().partition(|t| t.completed);
    for (heading, group) in [("Pending", open), ("Completed", done)] {
        if group.is_empty() {
            continue;
        }
        md.push_str(&format!("## {}\n\n", heading));
        for task in group {
            md.push_str(&format_task_short(task));
        }
        md.push('\n');
    }

    md
}

/// Format a task in short form for lists.
fn format_task_short(task: &Task) -> String {
    let priority_marker = if task.priority == PRIORITY_HIGH { "!!! " } else { "" };

    let due = task
        .due_date
        .map(|d| format!(" (due {})", d))
        .unwrap_or_default();

    let repeats = if task.is_recurring() {
        format!(" [{}]", task.recurrence)
    } else {
        String::new()
    };

    format!(
        "- {}{} `{}`{}{}\n",
        priority_marker,
        task.title,
        &task.id[..8.min(task.id.len())],
        due,
        repeats,
    )
}

/// Format one habit as markdown.
pub fn format_habit_markdown(habit: &Habit, done_for_period: bool) -> String {
    let mut md = String::new();

    md.push_str(&format!("## Habit: {}\n", habit.name));
    md.push_str(&format!("- **id**: `{}`\n", habit.id));
    md.push_str(&format!(
        "- **frequency**: {} (target {})\n",
        habit.frequency.as_str(),
        habit.target_count
    ));
    md.push_str(&format!("- **streak**: {} (best {})\n", habit.streak, habit.best_streak));
    md.push_str(&format!("- **check-ins**: {}\n", habit.completed_dates.len()));
    md.push_str(&format!(
        "- **this period**: {}\n",
        if done_for_period { "done" } else { "open" }
    ));
    if let Some(last) = habit.completed_dates.last() {
        md.push_str(&format!("- **last check-in**: {}\n", last));
    }

    md
}

/// Format habits as a markdown list.
pub fn format_habits_markdown(habits: &[Habit]) -> String {
    let mut md = String::new();

    md.push_str(&format!("# Habits ({})\n\n", habits.len()));
    for habit in habits {
        md.push_str(&format!(
            "- {} `{}` {} streak {} (best {})\n",
            habit.name,
            &habit.id[..8.min(habit.id.len())],
            habit.frequency.as_str(),
            habit.streak,
            habit.best_streak,
        ));
    }

    md
}

/// Format a user's points, level and achievements.
pub fn format_stats_markdown(
    stats: &UserGamification,
    progress: &LevelProgress,
    unlocked: &[UserAchievement],
) -> String {
    let mut md = String::new();

    md.push_str(&format!("# Stats: {}\n\n", stats.user_id));
    md.push_str(&format!("- **points**: {}\n", stats.total_points));
    match progress.xp_to_next {
        Some(next) => md.push_str(&format!("- **level**: {} ({} to next)\n", stats.level, next)),
        None => md.push_str(&format!("- **level**: {} (max)\n", stats.level)),
    }
    md.push_str(&format!(
        "- **streak**: {} days (best {})\n",
        stats.current_streak, stats.best_streak
    ));
    if let Some(last) = stats.last_completion_date {
        md.push_str(&format!("- **last completion**: {}\n", last));
    }

    if !unlocked.is_empty() {
        md.push_str("\n## Achievements\n\n");
        for row in unlocked {
            let name = achievements::find(&row.achievement_key)
                .map(|a| a.name)
                .unwrap_or(row.achievement_key.as_str());
            md.push_str(&format!(
                "- {} ({})\n",
                name,
                row.unlocked_at.date_naive()
            ));
        }
    }

    md
}

const LEVEL_GLYPHS: [char; 5] = ['·', '░', '▒', '▓', '█'];

/// Render the grid as a text heatmap: one row per weekday, one column per week.
pub fn format_heatmap_markdown(grid: &ActivityGrid, week_start: Weekday) -> String {
    let mut md = String::new();

    md.push_str(&format!("# Activity {} to {}\n\n", grid.start, grid.end));

    let columns = grid.weeks(week_start);
    md.push_str("```\n");
    let mut day = week_start;
    for row in 0..7 {
        md.push_str(&format!("{} ", day));
        for column in &columns {
            let glyph = column[row]
                .map(|cell| LEVEL_GLYPHS[cell.level as usize])
                .unwrap_or(' ');
            md.push(glyph);
        }
        md.push('\n');
        day = day.succ();
    }
    md.push_str("```\n\n");

    md.push_str(&format!(
        "{} completions on {} days (max {} in a day)\n",
        grid.total_completions(),
        grid.active_days(),
        grid.max_count()
    ));

    md
}

/// Format a list of dates under a heading.
pub fn format_dates_markdown(title: &str, dates: &[NaiveDate]) -> String {
    let mut md = String::new();

    md.push_str(&format!("# {} ({})\n\n", title, dates.len()));
    for date in dates {
        md.push_str(&format!("- {} ({})\n", date, date.format("%a")));
    }

    md
}

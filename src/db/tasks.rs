//! Task CRUD and due-date queries.

use super::{Database, column_error, date_to_sql, from_ms, now_ms, parse_date};
use crate::error::LedgerError;
use crate::recurrence::{self, RecurrenceRule};
use crate::types::{
    Difficulty, NewTask, PRIORITY_HIGH, PRIORITY_LOW, PRIORITY_MEDIUM, Task,
};
use anyhow::Result;
use chrono::NaiveDate;
use rusqlite::{Connection, Row, params};
use std::collections::BTreeSet;
use tracing::{debug, info};
use uuid::Uuid;

/// Filters for [`Database::list_tasks`].
#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub user_id: Option<String>,
    pub completed: Option<bool>,
    pub category: Option<String>,
    pub tag: Option<String>,
    pub recurring: Option<bool>,
    pub limit: Option<u32>,
}

/// Replace all tags of a task, keeping their order.
fn sync_task_tags(conn: &Connection, task_id: &str, tags: &[String]) -> Result<()> {
    conn.execute("DELETE FROM task_tags WHERE task_id = ?1", params![task_id])?;
    for (position, tag) in tags.iter().enumerate() {
        conn.execute(
            "INSERT OR IGNORE INTO task_tags (task_id, tag, position) VALUES (?1, ?2, ?3)",
            params![task_id, tag, position as i64],
        )?;
    }
    Ok(())
}

/// Parse a `tasks` row. Tags and dependencies are loaded separately.
pub fn parse_task_row(row: &Row) -> rusqlite::Result<Task> {
    let due_date: Option<String> = row.get("due_date")?;
    let completed_at: Option<i64> = row.get("completed_at")?;
    let pattern: String = row.get("recurrence_pattern")?;
    let interval: i64 = row.get("recurrence_interval")?;
    let difficulty: String = row.get("difficulty")?;
    let created_at: i64 = row.get("created_at")?;
    let updated_at: i64 = row.get("updated_at")?;

    Ok(Task {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        title: row.get("title")?,
        description: row.get("description")?,
        due_date: due_date.map(|d| parse_date(4, &d)).transpose()?,
        priority: row.get("priority")?,
        category: row.get("category")?,
        tags: Vec::new(),
        completed: row.get("completed")?,
        completed_at: completed_at.map(|ms| from_ms(8, ms)).transpose()?,
        parent_task_id: row.get("parent_task_id")?,
        depends_on: BTreeSet::new(),
        recurrence: RecurrenceRule::from_parts(&pattern, interval)
            .map_err(|e| column_error(10, e))?,
        estimated_duration_minutes: row.get("estimated_duration_minutes")?,
        difficulty: difficulty
            .parse::<Difficulty>()
            .map_err(|e| column_error(13, e))?,
        points: row.get("points")?,
        created_at: from_ms(15, created_at)?,
        updated_at: from_ms(16, updated_at)?,
    })
}

fn load_relations(conn: &Connection, task: &mut Task) -> Result<()> {
    let mut stmt =
        conn.prepare("SELECT tag FROM task_tags WHERE task_id = ?1 ORDER BY position")?;
    task.tags = stmt
        .query_map(params![&task.id], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<String>>>()?;

    let mut stmt = conn.prepare("SELECT depends_on FROM task_dependencies WHERE task_id = ?1")?;
    task.depends_on = stmt
        .query_map(params![&task.id], |row| row.get(0))?
        .collect::<rusqlite::Result<BTreeSet<String>>>()?;
    Ok(())
}

/// Get a task using an existing connection.
pub(crate) fn get_task_internal(conn: &Connection, task_id: &str) -> Result<Option<Task>> {
    let mut stmt = conn.prepare("SELECT * FROM tasks WHERE id = ?1")?;

    let result = stmt.query_row(params![task_id], parse_task_row);

    match result {
        Ok(mut task) => {
            load_relations(conn, &mut task)?;
            Ok(Some(task))
        }
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Like [`get_task_internal`], but a missing task is a `TaskNotFound` error.
pub(crate) fn require_task(conn: &Connection, task_id: &str) -> Result<Task> {
    get_task_internal(conn, task_id)?.ok_or_else(|| LedgerError::task_not_found(task_id).into())
}

/// Active completion instance dates recorded for a task.
pub(crate) fn completed_instance_dates(
    conn: &Connection,
    task_id: &str,
) -> Result<BTreeSet<NaiveDate>> {
    let mut stmt = conn.prepare(
        "SELECT recurring_instance_date FROM completion_instances
         WHERE task_id = ?1 AND reversed_at IS NULL AND recurring_instance_date IS NOT NULL",
    )?;
    let dates = stmt
        .query_map(params![task_id], |row| {
            let value: String = row.get(0)?;
            parse_date(0, &value)
        })?
        .collect::<rusqlite::Result<BTreeSet<NaiveDate>>>()?;
    Ok(dates)
}

fn validate_new_task(input: &NewTask) -> Result<()> {
    if input.title.trim().is_empty() {
        return Err(LedgerError::invalid_value("title", "must not be empty").into());
    }
    if input.user_id.trim().is_empty() {
        return Err(LedgerError::invalid_value("user_id", "must not be empty").into());
    }
    if let Some(p) = input.priority {
        if !(PRIORITY_LOW..=PRIORITY_HIGH).contains(&p) {
            return Err(LedgerError::invalid_value(
                "priority",
                format!("expected 1-3, got {}", p),
            )
            .into());
        }
    }
    if input.points.is_some_and(|p| p < 0) {
        return Err(LedgerError::invalid_value("points", "must not be negative").into());
    }
    input.recurrence.validate()?;
    Ok(())
}

impl Database {
    /// Create a task.
    pub fn create_task(&self, input: NewTask) -> Result<Task> {
        validate_new_task(&input)?;
        let task_id = input.id.clone().unwrap_or_else(|| Uuid::now_v7().to_string());
        let now = now_ms();
        let priority = input.priority.unwrap_or(PRIORITY_MEDIUM);

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            if let Some(ref parent_id) = input.parent_task_id {
                require_task(&tx, parent_id)?;
                if super::deps::parent_would_cycle(&tx, &task_id, parent_id)? {
                    return Err(LedgerError::dependency_cycle(&task_id, parent_id).into());
                }
            }

            tx.execute(
                "INSERT INTO tasks (
                    id, user_id, title, description, due_date, priority, category,
                    parent_task_id, recurrence_pattern, recurrence_interval,
                    estimated_duration_minutes, difficulty, points, created_at, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
                params![
                    &task_id,
                    &input.user_id,
                    &input.title,
                    &input.description,
                    input.due_date.map(date_to_sql),
                    priority,
                    &input.category,
                    &input.parent_task_id,
                    input.recurrence.pattern.as_str(),
                    input.recurrence.interval,
                    input.estimated_duration_minutes,
                    input.difficulty.as_str(),
                    input.points,
                    now,
                    now,
                ],
            )?;

            sync_task_tags(&tx, &task_id, &input.tags)?;

            let task = require_task(&tx, &task_id)?;
            tx.commit()?;

            debug!(task_id = %task.id, user_id = %task.user_id, "Task created");
            Ok(task)
        })
    }

    /// Get a task by ID.
    pub fn get_task(&self, task_id: &str) -> Result<Option<Task>> {
        self.with_conn(|conn| get_task_internal(conn, task_id))
    }

    /// List tasks matching the filter, highest priority first.
    pub fn list_tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>> {
        self.with_conn(|conn| {
            let mut sql = String::from("SELECT t.* FROM tasks t WHERE 1 = 1");
            let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

            if let Some(ref user_id) = filter.user_id {
                sql.push_str(" AND t.user_id = ?");
                params_vec.push(Box::new(user_id.clone()));
            }

            if let Some(completed) = filter.completed {
                sql.push_str(" AND t.completed = ?");
                params_vec.push(Box::new(completed));
            }

            if let Some(ref category) = filter.category {
                sql.push_str(" AND t.category = ?");
                params_vec.push(Box::new(category.clone()));
            }

            if let Some(ref tag) = filter.tag {
                sql.push_str(" AND t.id IN (SELECT task_id FROM task_tags WHERE tag = ?)");
                params_vec.push(Box::new(tag.clone()));
            }

            match filter.recurring {
                Some(true) => sql.push_str(" AND t.recurrence_pattern != 'none'"),
                Some(false) => sql.push_str(" AND t.recurrence_pattern = 'none'"),
                None => {}
            }

            sql.push_str(" ORDER BY t.priority DESC, t.due_date IS NULL, t.due_date, t.created_at");

            if let Some(limit) = filter.limit {
                sql.push_str(&format!(" LIMIT {}", limit));
            }

            let params_refs: Vec<&dyn rusqlite::ToSql> =
                params_vec.iter().map(|b| b.as_ref()).collect();

            let mut stmt = conn.prepare(&sql)?;
            let mut tasks = stmt
                .query_map(params_refs.as_slice(), parse_task_row)?
                .collect::<rusqlite::Result<Vec<Task>>>()?;

            for task in &mut tasks {
                load_relations(conn, task)?;
            }

            Ok(tasks)
        })
    }

    /// Delete a task. Tags, dependency edges and shares go with it; subtasks
    /// are detached. Ledger entries are kept so earned points survive.
    pub fn delete_task(&self, task_id: &str) -> Result<bool> {
        let deleted = self.with_conn(|conn| {
            Ok(conn.execute("DELETE FROM tasks WHERE id = ?1", params![task_id])?)
        })?;
        if deleted > 0 {
            info!(task_id, "Task deleted");
        }
        Ok(deleted > 0)
    }

    /// Due dates of a task inside `[start, end]` that are not completed yet.
    ///
    /// A one-off task yields its due date while open; a recurring task yields
    /// every occurrence in the window without an active completion instance.
    pub fn pending_occurrences(
        &self,
        task_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<NaiveDate>> {
        if end < start {
            return Err(LedgerError::date_range(start, end).into());
        }
        self.with_conn(|conn| {
            let task = require_task(conn, task_id)?;
            pending_for_task(conn, &task, start, end)
        })
    }

    /// Open tasks of a user with their pending due dates in `[start, end]`.
    pub fn due_between(
        &self,
        user_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<(Task, Vec<NaiveDate>)>> {
        if end < start {
            return Err(LedgerError::date_range(start, end).into());
        }
        let tasks = self.list_tasks(&TaskFilter {
            user_id: Some(user_id.to_string()),
            completed: Some(false),
            ..TaskFilter::default()
        })?;
        self.with_conn(|conn| {
            let mut due = Vec::new();
            for task in tasks {
                let dates = pending_for_task(conn, &task, start, end)?;
                if !dates.is_empty() {
                    due.push((task, dates));
                }
            }
            Ok(due)
        })
    }
}

fn pending_for_task(
    conn: &Connection,
    task: &Task,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<NaiveDate>> {
    if !task.is_recurring() {
        return Ok(task
            .due_date
            .filter(|due| !task.completed && *due >= start && *due <= end)
            .into_iter()
            .collect());
    }
    let completed = completed_instance_dates(conn, &task.id)?;
    Ok(recurrence::pending_occurrences(
        task.recurrence,
        task.recurrence_anchor(),
        start,
        end,
        &completed,
    )?)
}


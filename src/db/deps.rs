//! Dependency and parent edges, validated acyclic when written.

use super::Database;
use super::tasks::require_task;
use crate::deps::would_create_cycle;
use crate::error::LedgerError;
use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, params};
use tracing::debug;

fn dependencies_internal(conn: &Connection, task_id: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT depends_on FROM task_dependencies WHERE task_id = ?1 ORDER BY depends_on",
    )?;
    let deps = stmt
        .query_map(params![task_id], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<String>>>()?;
    Ok(deps)
}

/// Whether `task -> depends_on` would close a cycle in the stored graph.
fn dependency_would_cycle(conn: &Connection, task_id: &str, depends_on: &str) -> Result<bool> {
    would_create_cycle(task_id, depends_on, |node| dependencies_internal(conn, node))
}

/// Whether making `parent_id` the parent of `task_id` would close a cycle.
///
/// Parent links form their own graph: walking up from `parent_id` must not
/// reach `task_id`.
pub(crate) fn parent_would_cycle(
    conn: &Connection,
    task_id: &str,
    parent_id: &str,
) -> Result<bool> {
    would_create_cycle::<_, anyhow::Error>(task_id, parent_id, |node| {
        let parent: Option<Option<String>> = conn
            .query_row(
                "SELECT parent_task_id FROM tasks WHERE id = ?1",
                params![node],
                |row| row.get(0),
            )
            .optional()?;
        Ok(parent.flatten().into_iter().collect())
    })
}

fn add_dependency_internal(conn: &Connection, task_id: &str, depends_on: &str) -> Result<()> {
    require_task(conn, depends_on)?;
    if dependency_would_cycle(conn, task_id, depends_on)? {
        return Err(LedgerError::dependency_cycle(task_id, depends_on).into());
    }
    conn.execute(
        "INSERT OR IGNORE INTO task_dependencies (task_id, depends_on) VALUES (?1, ?2)",
        params![task_id, depends_on],
    )?;
    Ok(())
}

impl Database {
    /// Add `task_id -> depends_on`.
    pub fn add_dependency(&self, task_id: &str, depends_on: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            require_task(&tx, task_id)?;
            add_dependency_internal(&tx, task_id, depends_on)?;
            tx.commit()?;
            Ok(())
        })
    }

    /// Remove a dependency. Returns whether an edge was removed.
    pub fn remove_dependency(&self, task_id: &str, depends_on: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let removed = conn.execute(
                "DELETE FROM task_dependencies WHERE task_id = ?1 AND depends_on = ?2",
                params![task_id, depends_on],
            )?;
            Ok(removed > 0)
        })
    }

    /// Replace all dependencies of a task. Nothing is written if any new
    /// edge would create a cycle.
    pub fn set_dependencies(&self, task_id: &str, depends_on: &[String]) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            require_task(&tx, task_id)?;
            tx.execute(
                "DELETE FROM task_dependencies WHERE task_id = ?1",
                params![task_id],
            )?;
            for dep in depends_on {
                add_dependency_internal(&tx, task_id, dep)?;
            }
            tx.commit()?;
            debug!(task_id, count = depends_on.len(), "Dependencies replaced");
            Ok(())
        })
    }

    /// Set or clear the parent of a task.
    pub fn set_parent(&self, task_id: &str, parent_id: Option<&str>) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            require_task(&tx, task_id)?;
            if let Some(parent_id) = parent_id {
                require_task(&tx, parent_id)?;
                if parent_would_cycle(&tx, task_id, parent_id)? {
                    return Err(LedgerError::dependency_cycle(task_id, parent_id).into());
                }
            }
            tx.execute(
                "UPDATE tasks SET parent_task_id = ?1, updated_at = ?2 WHERE id = ?3",
                params![parent_id, super::now_ms(), task_id],
            )?;
            tx.commit()?;
            Ok(())
        })
    }

    /// Dependencies of `task_id` that are not completed yet.
    pub fn unmet_dependencies(&self, task_id: &str) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT d.depends_on FROM task_dependencies d
                 JOIN tasks t ON t.id = d.depends_on
                 WHERE d.task_id = ?1 AND t.completed = 0
                 ORDER BY d.depends_on",
            )?;
            let unmet = stmt
                .query_map(params![task_id], |row| row.get(0))?
                .collect::<rusqlite::Result<Vec<String>>>()?;
            Ok(unmet)
        })
    }

    /// Subtasks of a task.
    pub fn children(&self, parent_id: &str) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id FROM tasks WHERE parent_task_id = ?1 ORDER BY created_at",
            )?;
            let ids = stmt
                .query_map(params![parent_id], |row| row.get(0))?
                .collect::<rusqlite::Result<Vec<String>>>()?;
            Ok(ids)
        })
    }
}

//! Task sharing and access checks.

use super::tasks::require_task;
use super::{Database, from_ms, to_ms};
use crate::error::LedgerError;
use crate::types::{Permission, SharedTask, Task};
use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, Row, params};
use tracing::info;

fn parse_share_row(row: &Row) -> rusqlite::Result<SharedTask> {
    let permission: String = row.get("permission")?;
    let expires_at: Option<i64> = row.get("expires_at")?;
    Ok(SharedTask {
        task_id: row.get("task_id")?,
        owner_id: row.get("owner_id")?,
        shared_with: row.get("shared_with")?,
        permission: permission
            .parse::<Permission>()
            .map_err(|e| super::column_error(3, e))?,
        expires_at: expires_at.map(|ms| from_ms(4, ms)).transpose()?,
    })
}

/// Effective permission of `user_id` on `task` at `now`.
///
/// The owner always has `Edit`; other users need an unexpired share.
pub(crate) fn permission_internal(
    conn: &Connection,
    task: &Task,
    user_id: &str,
    now: DateTime<Utc>,
) -> Result<Option<Permission>> {
    if task.user_id == user_id {
        return Ok(Some(Permission::Edit));
    }
    let mut stmt = conn.prepare(
        "SELECT * FROM shared_tasks WHERE task_id = ?1 AND shared_with = ?2",
    )?;
    match stmt.query_row(params![&task.id, user_id], parse_share_row) {
        Ok(share) => Ok(share.effective_permission(now)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

impl Database {
    /// Share a task owned by `owner_id`. Re-sharing replaces the previous grant.
    pub fn share_task(
        &self,
        task_id: &str,
        owner_id: &str,
        shared_with: &str,
        permission: Permission,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<SharedTask> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let task = require_task(&tx, task_id)?;
            if task.user_id != owner_id {
                return Err(LedgerError::permission_denied(owner_id, task_id, "share").into());
            }
            if shared_with == owner_id {
                return Err(LedgerError::invalid_value(
                    "shared_with",
                    "a task cannot be shared with its owner",
                )
                .into());
            }
            tx.execute(
                "INSERT INTO shared_tasks (task_id, owner_id, shared_with, permission, expires_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(task_id, shared_with) DO UPDATE SET
                    permission = excluded.permission,
                    expires_at = excluded.expires_at",
                params![
                    task_id,
                    owner_id,
                    shared_with,
                    permission.as_str(),
                    expires_at.map(to_ms),
                ],
            )?;
            tx.commit()?;
            info!(task_id, shared_with, permission = permission.as_str(), "Task shared");
            Ok(SharedTask {
                task_id: task_id.to_string(),
                owner_id: owner_id.to_string(),
                shared_with: shared_with.to_string(),
                permission,
                expires_at,
            })
        })
    }

    /// Remove a share. Returns whether one existed.
    pub fn unshare_task(&self, task_id: &str, shared_with: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let removed = conn.execute(
                "DELETE FROM shared_tasks WHERE task_id = ?1 AND shared_with = ?2",
                params![task_id, shared_with],
            )?;
            Ok(removed > 0)
        })
    }

    /// Effective permission of a user on a task, `None` without access.
    pub fn task_permission(
        &self,
        task_id: &str,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Permission>> {
        self.with_conn(|conn| {
            let task = require_task(conn, task_id)?;
            permission_internal(conn, &task, user_id, now)
        })
    }

    /// Shares granted on a task.
    pub fn list_shares(&self, task_id: &str) -> Result<Vec<SharedTask>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT * FROM shared_tasks WHERE task_id = ?1 ORDER BY shared_with",
            )?;
            let shares = stmt
                .query_map(params![task_id], parse_share_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(shares)
        })
    }
}

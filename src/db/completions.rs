//! Completion toggles over the persisted ledger.
//!
//! Every complete/uncomplete runs in one transaction: access check, state
//! check, ledger append or invalidation, task flag update and a rebuild of
//! the `user_gamification` cache from the ledger.

use super::sharing::permission_internal;
use super::tasks::require_task;
use super::{Database, date_to_sql, from_ms, now_ms, parse_date, to_ms};
use crate::activity::{self, ActivityGrid};
use crate::config::GamificationConfig;
use crate::error::LedgerError;
use crate::gamification::{
    CompletionAward, CompletionReversal, GamificationLedger, LevelThresholds, achievements,
    compute_stats,
};
use crate::recurrence;
use crate::types::{
    CompletionEvent, CompletionInstance, CompletionState, Permission, Task, UserAchievement,
    UserGamification,
};
use anyhow::Result;
use chrono::{DateTime, Days, NaiveDate, NaiveTime, Utc};
use rusqlite::{Connection, Row, params};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Heatmap query: one user's activity over an inclusive date range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityRequest {
    pub user_id: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    /// Count habit check-ins alongside task completions.
    #[serde(default)]
    pub include_habits: bool,
}

impl ActivityRequest {
    /// The `weeks` full weeks ending at `today`.
    pub fn last_weeks(user_id: &str, today: NaiveDate, weeks: u32) -> Self {
        let days = u64::from(weeks.max(1)) * 7 - 1;
        Self {
            user_id: user_id.to_string(),
            start: today.checked_sub_days(Days::new(days)).unwrap_or(NaiveDate::MIN),
            end: today,
            include_habits: false,
        }
    }
}

fn parse_completion_row(row: &Row) -> rusqlite::Result<CompletionInstance> {
    let completed_at: i64 = row.get("completed_at")?;
    let instance_date: Option<String> = row.get("recurring_instance_date")?;
    let reversed_at: Option<i64> = row.get("reversed_at")?;

    Ok(CompletionInstance {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        task_id: row.get("task_id")?,
        completed_at: from_ms(3, completed_at)?,
        points_earned: row.get("points_earned")?,
        is_recurring_instance: row.get("is_recurring_instance")?,
        recurring_instance_date: instance_date.map(|d| parse_date(6, &d)).transpose()?,
        reversed_at: reversed_at.map(|ms| from_ms(7, ms)).transpose()?,
    })
}

/// All ledger entries of a user, reversed ones included, oldest first.
fn user_entries(conn: &Connection, user_id: &str) -> Result<Vec<CompletionInstance>> {
    let mut stmt =
        conn.prepare("SELECT * FROM completion_instances WHERE user_id = ?1 ORDER BY id")?;
    let entries = stmt
        .query_map(params![user_id], parse_completion_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(entries)
}

/// The active entry for a task instance, whoever recorded it.
fn find_active_entry(
    conn: &Connection,
    task_id: &str,
    instance_date: Option<NaiveDate>,
) -> Result<Option<CompletionInstance>> {
    let mut stmt = conn.prepare(
        "SELECT * FROM completion_instances
         WHERE task_id = ?1 AND reversed_at IS NULL
           AND COALESCE(recurring_instance_date, '') = ?2
         ORDER BY id DESC LIMIT 1",
    )?;
    let date = instance_date.map(date_to_sql).unwrap_or_default();
    match stmt.query_row(params![task_id, date], parse_completion_row) {
        Ok(entry) => Ok(Some(entry)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn write_stats(conn: &Connection, stats: &UserGamification) -> Result<()> {
    conn.execute(
        "INSERT INTO user_gamification (
            user_id, total_points, current_streak, best_streak,
            last_completion_date, level, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        ON CONFLICT(user_id) DO UPDATE SET
            total_points = excluded.total_points,
            current_streak = excluded.current_streak,
            best_streak = excluded.best_streak,
            last_completion_date = excluded.last_completion_date,
            level = excluded.level,
            updated_at = excluded.updated_at",
        params![
            &stats.user_id,
            stats.total_points,
            stats.current_streak,
            stats.best_streak,
            stats.last_completion_date.map(date_to_sql),
            stats.level,
            now_ms(),
        ],
    )?;
    Ok(())
}

/// Recompute a user's cache row from the ledger.
fn refresh_stats(
    conn: &Connection,
    user_id: &str,
    levels: &LevelThresholds,
) -> Result<UserGamification> {
    let entries = user_entries(conn, user_id)?;
    let stats = compute_stats(user_id, &entries, levels);
    write_stats(conn, &stats)?;
    Ok(stats)
}

fn list_achievements_internal(conn: &Connection, user_id: &str) -> Result<Vec<UserAchievement>> {
    let mut stmt = conn.prepare(
        "SELECT user_id, achievement_key, unlocked_at FROM user_achievements
         WHERE user_id = ?1 ORDER BY unlocked_at, achievement_key",
    )?;
    let rows = stmt
        .query_map(params![user_id], |row| {
            let unlocked_at: i64 = row.get(2)?;
            Ok(UserAchievement {
                user_id: row.get(0)?,
                achievement_key: row.get(1)?,
                unlocked_at: from_ms(2, unlocked_at)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

/// Store achievements whose threshold now holds. Existing unlocks are kept.
fn unlock_achievements(
    conn: &Connection,
    stats: &UserGamification,
    at: DateTime<Utc>,
) -> Result<Vec<String>> {
    let existing = list_achievements_internal(conn, &stats.user_id)?;
    let fresh =
        achievements::newly_unlocked(stats, existing.iter().map(|a| a.achievement_key.as_str()));
    let mut keys = Vec::with_capacity(fresh.len());
    for achievement in fresh {
        conn.execute(
            "INSERT OR IGNORE INTO user_achievements (user_id, achievement_key, unlocked_at)
             VALUES (?1, ?2, ?3)",
            params![&stats.user_id, achievement.key, to_ms(at)],
        )?;
        info!(user_id = %stats.user_id, achievement = achievement.key, "Achievement unlocked");
        keys.push(achievement.key.to_string());
    }
    Ok(keys)
}

fn require_permission(
    conn: &Connection,
    task: &Task,
    user_id: &str,
    now: DateTime<Utc>,
    action: &str,
) -> Result<()> {
    let allowed = permission_internal(conn, task, user_id, now)?
        .is_some_and(|p| p.allows(Permission::Edit));
    if !allowed {
        return Err(LedgerError::permission_denied(user_id, &task.id, action).into());
    }
    Ok(())
}

/// Check that `instance_date` is given exactly when the task recurs, and
/// that it names a real occurrence.
fn validate_instance(task: &Task, instance_date: Option<NaiveDate>) -> Result<()> {
    match (task.is_recurring(), instance_date) {
        (true, Some(date)) => {
            let anchor = task.recurrence_anchor();
            let mut hit = recurrence::expand(task.recurrence, anchor, date, date)?;
            if hit.next().is_none() {
                return Err(LedgerError::invalid_value(
                    "instance_date",
                    format!(
                        "{} is not an occurrence of task {} ({})",
                        date, task.id, task.recurrence
                    ),
                )
                .into());
            }
            Ok(())
        }
        (true, None) => Err(LedgerError::invalid_value(
            "instance_date",
            format!("task {} recurs; an instance date is required", task.id),
        )
        .into()),
        (false, Some(_)) => Err(LedgerError::invalid_value(
            "instance_date",
            format!("task {} does not recur", task.id),
        )
        .into()),
        (false, None) => Ok(()),
    }
}

impl Database {
    /// Complete a task (or one instance of a recurring task) and award points.
    ///
    /// Base points are the task's explicit points, else the configured
    /// points for its difficulty. Completing an instance that is already
    /// completed fails with `InvalidTransition`.
    pub fn complete_task(
        &self,
        user_id: &str,
        task_id: &str,
        instance_date: Option<NaiveDate>,
        settings: &GamificationConfig,
        completed_at: DateTime<Utc>,
    ) -> Result<CompletionAward> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let task = require_task(&tx, task_id)?;
            require_permission(&tx, &task, user_id, completed_at, "complete")?;
            validate_instance(&task, instance_date)?;

            let state = match find_active_entry(&tx, task_id, instance_date)? {
                Some(_) => CompletionState::Completed,
                None => CompletionState::Pending,
            };
            state.apply(CompletionEvent::Complete)?;

            let levels = &settings.level_thresholds;
            let before = compute_stats(user_id, &user_entries(&tx, user_id)?, levels);
            let points = task
                .points
                .unwrap_or_else(|| settings.points.for_difficulty(task.difficulty));
            if points < 0 {
                return Err(LedgerError::invalid_value("points", "must not be negative").into());
            }

            tx.execute(
                "INSERT INTO completion_instances (
                    user_id, task_id, completed_at, points_earned,
                    is_recurring_instance, recurring_instance_date
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    user_id,
                    task_id,
                    to_ms(completed_at),
                    points,
                    instance_date.is_some(),
                    instance_date.map(date_to_sql),
                ],
            )?;
            let entry_id = tx.last_insert_rowid();

            if task.is_recurring() {
                tx.execute(
                    "UPDATE tasks SET completed_at = ?1, updated_at = ?2 WHERE id = ?3",
                    params![to_ms(completed_at), now_ms(), task_id],
                )?;
            } else {
                tx.execute(
                    "UPDATE tasks SET completed = 1, completed_at = ?1, updated_at = ?2
                     WHERE id = ?3",
                    params![to_ms(completed_at), now_ms(), task_id],
                )?;
            }

            let after = refresh_stats(&tx, user_id, levels)?;
            let unlocked = unlock_achievements(&tx, &after, completed_at)?;

            tx.commit()?;

            let leveled_up = after.level > before.level;
            if leveled_up {
                info!(user_id, level = after.level, "Level up");
            }
            debug!(user_id, task_id, points, total = after.total_points, "Completion recorded");

            Ok(CompletionAward {
                entry_id,
                points_awarded: points,
                new_total: after.total_points,
                level: after.level,
                leveled_up,
                unlocked,
            })
        })
    }

    /// Reverse the completion of a task instance.
    ///
    /// Points go back from whoever earned them. With no active completion
    /// the call logs a warning and returns `None` without writing anything.
    pub fn uncomplete_task(
        &self,
        user_id: &str,
        task_id: &str,
        instance_date: Option<NaiveDate>,
        levels: &LevelThresholds,
        reversed_at: DateTime<Utc>,
    ) -> Result<Option<CompletionReversal>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let task = require_task(&tx, task_id)?;
            require_permission(&tx, &task, user_id, reversed_at, "uncomplete")?;

            let Some(entry) = find_active_entry(&tx, task_id, instance_date)? else {
                let err = LedgerError::completion_not_found(task_id, instance_date);
                warn!(user_id, task_id, error = %err, "Uncomplete ignored");
                return Ok(None);
            };

            let earner = entry.user_id.clone();
            let before = compute_stats(&earner, &user_entries(&tx, &earner)?, levels);

            tx.execute(
                "UPDATE completion_instances SET reversed_at = ?1
                 WHERE id = ?2 AND reversed_at IS NULL",
                params![to_ms(reversed_at), entry.id],
            )?;

            if task.is_recurring() {
                // Latest remaining completion, if any
                tx.execute(
                    "UPDATE tasks SET completed_at = (
                        SELECT MAX(completed_at) FROM completion_instances
                        WHERE task_id = ?2 AND reversed_at IS NULL
                     ), updated_at = ?1
                     WHERE id = ?2",
                    params![now_ms(), task_id],
                )?;
            } else {
                tx.execute(
                    "UPDATE tasks SET completed = 0, completed_at = NULL, updated_at = ?1
                     WHERE id = ?2",
                    params![now_ms(), task_id],
                )?;
            }

            let after = refresh_stats(&tx, &earner, levels)?;
            tx.commit()?;

            debug!(
                user_id = %earner,
                task_id,
                points = entry.points_earned,
                total = after.total_points,
                "Completion reversed"
            );

            Ok(Some(CompletionReversal {
                entry_id: entry.id,
                points_reverted: entry.points_earned,
                new_total: after.total_points,
                level: after.level,
                leveled_down: after.level < before.level,
            }))
        })
    }

    /// Latest completed instance date of a recurring task.
    pub fn last_completed_instance(&self, task_id: &str) -> Result<Option<NaiveDate>> {
        self.with_conn(|conn| {
            let last: Option<String> = conn.query_row(
                "SELECT MAX(recurring_instance_date) FROM completion_instances
                 WHERE task_id = ?1 AND reversed_at IS NULL",
                params![task_id],
                |row| row.get(0),
            )?;
            Ok(last.map(|d| parse_date(0, &d)).transpose()?)
        })
    }

    /// Ledger entries of a user, oldest first.
    pub fn list_completions(
        &self,
        user_id: &str,
        include_reversed: bool,
    ) -> Result<Vec<CompletionInstance>> {
        let entries = self.with_conn(|conn| user_entries(conn, user_id))?;
        Ok(entries
            .into_iter()
            .filter(|e| include_reversed || e.is_active())
            .collect())
    }

    /// Load a user's ledger into memory.
    pub fn load_ledger(
        &self,
        user_id: &str,
        levels: &LevelThresholds,
    ) -> Result<GamificationLedger> {
        let entries = self.list_completions(user_id, true)?;
        Ok(GamificationLedger::from_entries(entries, levels.clone()))
    }

    /// Recompute the cached aggregate from the ledger and unlock any
    /// achievement that now holds (e.g. after level thresholds change).
    pub fn rebuild_gamification(
        &self,
        user_id: &str,
        levels: &LevelThresholds,
    ) -> Result<UserGamification> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let stats = refresh_stats(&tx, user_id, levels)?;
            unlock_achievements(&tx, &stats, Utc::now())?;
            tx.commit()?;
            info!(user_id, total = stats.total_points, level = stats.level, "Gamification rebuilt");
            Ok(stats)
        })
    }

    /// Aggregate for a user as seen on `today`; empty when nothing was
    /// recorded yet. A lapsed current streak reads as 0.
    pub fn get_gamification(&self, user_id: &str, today: NaiveDate) -> Result<UserGamification> {
        let stats = self.with_conn(|conn| {
            let result = conn.query_row(
                "SELECT user_id, total_points, current_streak, best_streak,
                        last_completion_date, level
                 FROM user_gamification WHERE user_id = ?1",
                params![user_id],
                |row| {
                    let last: Option<String> = row.get(4)?;
                    Ok(UserGamification {
                        user_id: row.get(0)?,
                        total_points: row.get(1)?,
                        current_streak: row.get(2)?,
                        best_streak: row.get(3)?,
                        last_completion_date: last.map(|d| parse_date(4, &d)).transpose()?,
                        level: row.get(5)?,
                    })
                },
            );
            match result {
                Ok(stats) => Ok(stats),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(UserGamification::empty(user_id)),
                Err(e) => Err(e.into()),
            }
        })?;
        Ok(stats.as_of(today))
    }

    pub fn list_achievements(&self, user_id: &str) -> Result<Vec<UserAchievement>> {
        self.with_conn(|conn| list_achievements_internal(conn, user_id))
    }

    /// Per-day activity from active ledger entries (and optionally habit
    /// check-ins) for the heatmap.
    pub fn activity_grid(&self, request: &ActivityRequest) -> Result<ActivityGrid> {
        if request.end < request.start {
            return Err(LedgerError::date_range(request.start, request.end).into());
        }
        let start_ms = to_ms(request.start.and_time(NaiveTime::MIN).and_utc());
        let end_ms = request
            .end
            .succ_opt()
            .map(|d| to_ms(d.and_time(NaiveTime::MIN).and_utc()))
            .unwrap_or(i64::MAX);

        let dates = self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT completed_at FROM completion_instances
                 WHERE user_id = ?1 AND reversed_at IS NULL
                   AND completed_at >= ?2 AND completed_at < ?3",
            )?;
            let mut dates = stmt
                .query_map(params![&request.user_id, start_ms, end_ms], |row| {
                    let ms: i64 = row.get(0)?;
                    Ok(from_ms(0, ms)?.date_naive())
                })?
                .collect::<rusqlite::Result<Vec<NaiveDate>>>()?;

            if request.include_habits {
                let mut stmt = conn.prepare(
                    "SELECT hc.completed_date FROM habit_completions hc
                     JOIN habits h ON h.id = hc.habit_id
                     WHERE h.user_id = ?1 AND hc.completed_date BETWEEN ?2 AND ?3",
                )?;
                let habit_dates = stmt
                    .query_map(
                        params![
                            &request.user_id,
                            date_to_sql(request.start),
                            date_to_sql(request.end)
                        ],
                        |row| {
                            let value: String = row.get(0)?;
                            parse_date(0, &value)
                        },
                    )?
                    .collect::<rusqlite::Result<Vec<NaiveDate>>>()?;
                dates.extend(habit_dates);
            }
            Ok(dates)
        })?;

        Ok(activity::build_grid(dates, request.start, request.end)?)
    }
}

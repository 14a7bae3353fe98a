//! Habit storage. Streak columns are rewritten from check-in dates on
//! every change and never set directly.

use super::{Database, date_to_sql, from_ms, now_ms, parse_date};
use crate::error::LedgerError;
use crate::habits;
use crate::types::{Habit, HabitFrequency, NewHabit};
use anyhow::Result;
use chrono::NaiveDate;
use rusqlite::{Connection, Row, params};
use std::collections::BTreeSet;
use tracing::debug;
use uuid::Uuid;

fn parse_habit_row(row: &Row) -> rusqlite::Result<Habit> {
    let frequency: String = row.get("frequency")?;
    let created_at: i64 = row.get("created_at")?;
    Ok(Habit {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        name: row.get("name")?,
        frequency: frequency
            .parse::<HabitFrequency>()
            .map_err(|e| super::column_error(3, e))?,
        target_count: row.get("target_count")?,
        completed_dates: BTreeSet::new(),
        streak: row.get("streak")?,
        best_streak: row.get("best_streak")?,
        points: row.get("points")?,
        created_at: from_ms(8, created_at)?,
    })
}

fn load_dates(conn: &Connection, habit: &mut Habit) -> Result<()> {
    let mut stmt = conn.prepare(
        "SELECT completed_date FROM habit_completions WHERE habit_id = ?1 ORDER BY completed_date",
    )?;
    habit.completed_dates = stmt
        .query_map(params![&habit.id], |row| {
            let value: String = row.get(0)?;
            parse_date(0, &value)
        })?
        .collect::<rusqlite::Result<BTreeSet<NaiveDate>>>()?;
    Ok(())
}

fn get_habit_internal(conn: &Connection, habit_id: &str) -> Result<Option<Habit>> {
    let mut stmt = conn.prepare("SELECT * FROM habits WHERE id = ?1")?;
    match stmt.query_row(params![habit_id], parse_habit_row) {
        Ok(mut habit) => {
            load_dates(conn, &mut habit)?;
            Ok(Some(habit))
        }
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn require_habit(conn: &Connection, habit_id: &str) -> Result<Habit> {
    get_habit_internal(conn, habit_id)?.ok_or_else(|| LedgerError::habit_not_found(habit_id).into())
}

fn write_streaks(conn: &Connection, habit: &Habit) -> Result<()> {
    conn.execute(
        "UPDATE habits SET streak = ?1, best_streak = ?2 WHERE id = ?3",
        params![habit.streak, habit.best_streak, &habit.id],
    )?;
    Ok(())
}

impl Database {
    /// Create a habit.
    pub fn create_habit(&self, input: NewHabit) -> Result<Habit> {
        if input.name.trim().is_empty() {
            return Err(LedgerError::invalid_value("name", "must not be empty").into());
        }
        let target_count = input.target_count.unwrap_or(1);
        if target_count < 1 {
            return Err(LedgerError::invalid_value("target_count", "must be at least 1").into());
        }
        if input.points < 0 {
            return Err(LedgerError::invalid_value("points", "must not be negative").into());
        }
        let habit_id = input.id.clone().unwrap_or_else(|| Uuid::now_v7().to_string());

        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO habits (id, user_id, name, frequency, target_count, points, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    &habit_id,
                    &input.user_id,
                    &input.name,
                    input.frequency.as_str(),
                    target_count,
                    input.points,
                    now_ms(),
                ],
            )?;
            require_habit(conn, &habit_id)
        })
    }

    pub fn get_habit(&self, habit_id: &str) -> Result<Option<Habit>> {
        self.with_conn(|conn| get_habit_internal(conn, habit_id))
    }

    /// Habits of a user with streaks recomputed as of `today`.
    ///
    /// Stored streak columns reflect the last check-in change; a streak that
    /// lapsed since then reads as 0 here.
    pub fn list_habits(&self, user_id: &str, today: NaiveDate) -> Result<Vec<Habit>> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT * FROM habits WHERE user_id = ?1 ORDER BY created_at, id")?;
            let mut list = stmt
                .query_map(params![user_id], parse_habit_row)?
                .collect::<rusqlite::Result<Vec<Habit>>>()?;
            for habit in &mut list {
                load_dates(conn, habit)?;
                habits::recompute(habit, today);
            }
            Ok(list)
        })
    }

    /// Check a habit in on `date`. Checking the same date twice is a no-op.
    pub fn check_habit(&self, habit_id: &str, date: NaiveDate, today: NaiveDate) -> Result<Habit> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let mut habit = require_habit(&tx, habit_id)?;
            if habits::check_in(&mut habit, date, today) {
                tx.execute(
                    "INSERT INTO habit_completions (habit_id, completed_date) VALUES (?1, ?2)",
                    params![habit_id, date_to_sql(date)],
                )?;
            }
            write_streaks(&tx, &habit)?;
            tx.commit()?;
            debug!(
                habit_id,
                %date,
                streak = habit.streak,
                best = habit.best_streak,
                "Habit checked"
            );
            Ok(habit)
        })
    }

    /// Remove the check-in on `date`, if any.
    pub fn uncheck_habit(
        &self,
        habit_id: &str,
        date: NaiveDate,
        today: NaiveDate,
    ) -> Result<Habit> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let mut habit = require_habit(&tx, habit_id)?;
            if habits::uncheck(&mut habit, date, today) {
                tx.execute(
                    "DELETE FROM habit_completions WHERE habit_id = ?1 AND completed_date = ?2",
                    params![habit_id, date_to_sql(date)],
                )?;
            }
            write_streaks(&tx, &habit)?;
            tx.commit()?;
            debug!(habit_id, %date, streak = habit.streak, "Habit unchecked");
            Ok(habit)
        })
    }

    pub fn delete_habit(&self, habit_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let deleted = conn.execute("DELETE FROM habits WHERE id = ?1", params![habit_id])?;
            Ok(deleted > 0)
        })
    }
}

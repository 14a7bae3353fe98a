//! Recurrence, streak, activity and points ledger core for task and habit
//! tracking, with SQLite persistence and a CLI.
//!
//! The pure modules (`recurrence`, `streak`, `activity`, `gamification`)
//! take plain dates and records; `db` persists them.

pub mod activity;
pub mod cli;
pub mod config;
pub mod db;
pub mod deps;
pub mod error;
pub mod format;
pub mod gamification;
pub mod habits;
pub mod logging;
pub mod recurrence;
pub mod streak;
pub mod types;

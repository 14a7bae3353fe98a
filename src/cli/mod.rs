//! CLI command definitions for taskstreak
//!
//! This module defines the CLI structure using clap's derive macros.
//! The main entry point is the `Cli` struct which contains subcommands.

pub mod habit;
pub mod task;

use chrono::{DateTime, NaiveDate, Utc};
use clap::{Args, Parser, Subcommand};
use habit::HabitCommand;
use task::TaskCommand;

/// Tasks, habits, streaks and points from the command line
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Path to database file (overrides config)
    #[arg(short, long, global = true)]
    pub database: Option<String>,

    /// Acting user
    #[arg(short, long, global = true, env = "TASKSTREAK_USER", default_value = "local")]
    pub user: String,

    /// Output format: json or markdown (overrides config)
    #[arg(short, long, global = true)]
    pub format: Option<String>,

    /// Treat this date as today (YYYY-MM-DD)
    #[arg(long, global = true, value_name = "DATE")]
    pub today: Option<NaiveDate>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Logging output: 0/off, 1/stdout, 2/stderr (default), or filename
    #[arg(short, long, default_value = "2", global = true)]
    pub log: String,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Timestamp for ledger writes. With `--today` it keeps the time of day
    /// of `now` but moves to that date.
    pub fn ledger_timestamp(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self.today {
            Some(today) => today.and_time(now.time()).and_utc(),
            None => now,
        }
    }
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create, list and complete tasks
    #[command(subcommand)]
    Task(TaskCommand),

    /// Track habits and their streaks
    #[command(subcommand)]
    Habit(HabitCommand),

    /// Show points, level, streaks and achievements
    Stats,

    /// Show the activity heatmap
    Heatmap(HeatmapArgs),

    /// List the occurrences of a recurrence rule in a date window
    Expand(ExpandArgs),

    /// Recompute points and streaks from the completion ledger
    Rebuild,
}

/// Arguments for the heatmap subcommand
#[derive(Args, Debug)]
pub struct HeatmapArgs {
    /// Number of weeks ending today
    #[arg(short, long, default_value_t = 12)]
    pub weeks: u32,

    /// First day (overrides --weeks)
    #[arg(long, value_name = "DATE")]
    pub from: Option<NaiveDate>,

    /// Last day (defaults to today)
    #[arg(long, value_name = "DATE")]
    pub to: Option<NaiveDate>,

    /// Count habit check-ins too
    #[arg(long)]
    pub habits: bool,
}

/// Arguments for the expand subcommand
#[derive(Args, Debug)]
pub struct ExpandArgs {
    /// Pattern: daily, weekly, monthly, yearly or none
    #[arg(value_name = "PATTERN")]
    pub pattern: String,

    /// Step between occurrences, in pattern units
    #[arg(short, long, default_value_t = 1)]
    pub every: i64,

    /// First occurrence
    #[arg(short, long, value_name = "DATE")]
    pub anchor: NaiveDate,

    /// Window start (defaults to the anchor)
    #[arg(long, value_name = "DATE")]
    pub from: Option<NaiveDate>,

    /// Window end (inclusive)
    #[arg(long, value_name = "DATE")]
    pub to: NaiveDate,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ledger_timestamp_follows_today_flag() {
        let now = NaiveDate::from_ymd_opt(2026, 10, 19)
            .unwrap()
            .and_hms_opt(15, 30, 0)
            .unwrap()
            .and_utc();

        let cli = Cli::try_parse_from(["taskstreak", "--today", "2024-01-05", "stats"]).unwrap();
        let stamped = cli.ledger_timestamp(now);
        assert_eq!(stamped.date_naive(), NaiveDate::from_ymd_opt(2024, 1, 5).unwrap());
        assert_eq!(stamped.time(), now.time());

        let cli = Cli::try_parse_from(["taskstreak", "stats"]).unwrap();
        assert_eq!(cli.ledger_timestamp(now), now);
    }
}

//! Habit subcommands.

use chrono::NaiveDate;
use clap::{Args, Subcommand};

#[derive(Subcommand, Debug)]
pub enum HabitCommand {
    /// Create a habit
    Add(AddHabitArgs),

    /// List habits with their current streaks
    List,

    /// Show one habit
    Show {
        id: String,
    },

    /// Check a habit in
    Check(CheckArgs),

    /// Remove a check-in
    Uncheck(CheckArgs),

    /// Delete a habit and its check-ins
    Delete {
        id: String,
    },
}

/// Arguments for `habit add`
#[derive(Args, Debug)]
pub struct AddHabitArgs {
    pub name: String,

    /// daily, weekly or monthly
    #[arg(long, default_value = "daily")]
    pub frequency: String,

    /// Check-ins needed per period
    #[arg(short, long, default_value_t = 1)]
    pub target: u32,

    /// Points per check-in
    #[arg(short, long, default_value_t = 0)]
    pub points: i64,

    /// Custom habit ID
    #[arg(long)]
    pub id: Option<String>,
}

/// A habit and the check-in date.
#[derive(Args, Debug)]
pub struct CheckArgs {
    pub id: String,

    /// Check-in date (defaults to today)
    #[arg(long, value_name = "DATE")]
    pub date: Option<NaiveDate>,
}

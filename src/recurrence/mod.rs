//! Recurrence rules and calendar period arithmetic.
//!
//! A rule is stored the way the task table stores it: a pattern name and an
//! integer interval. `RecurrenceRule` validates the pair once so the expander
//! and streak calculator can rely on `interval >= 1`.

pub mod expand;

pub use expand::{Occurrences, expand, next_occurrence_after, pending_occurrences};

use crate::error::{LedgerError, LedgerResult};
use chrono::{Datelike, Days, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Repeat cadence of a task or habit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecurrencePattern {
    #[default]
    None,
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl RecurrencePattern {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecurrencePattern::None => "none",
            RecurrencePattern::Daily => "daily",
            RecurrencePattern::Weekly => "weekly",
            RecurrencePattern::Monthly => "monthly",
            RecurrencePattern::Yearly => "yearly",
        }
    }
}

impl fmt::Display for RecurrencePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecurrencePattern {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" | "none" => Ok(RecurrencePattern::None),
            "daily" => Ok(RecurrencePattern::Daily),
            "weekly" => Ok(RecurrencePattern::Weekly),
            "monthly" => Ok(RecurrencePattern::Monthly),
            "yearly" => Ok(RecurrencePattern::Yearly),
            other => Err(LedgerError::InvalidRule(format!(
                "unknown pattern '{}'",
                other
            ))),
        }
    }
}

/// A repeat pattern with its interval (every N days/weeks/months/years).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecurrenceRule {
    pub pattern: RecurrencePattern,
    pub interval: u32,
}

impl Default for RecurrenceRule {
    fn default() -> Self {
        Self::none()
    }
}

impl RecurrenceRule {
    /// Build a validated rule. `interval` must be at least 1.
    pub fn new(pattern: RecurrencePattern, interval: u32) -> LedgerResult<Self> {
        let rule = Self { pattern, interval };
        rule.validate()?;
        Ok(rule)
    }

    /// Build a rule from its stored columns.
    pub fn from_parts(pattern: &str, interval: i64) -> LedgerResult<Self> {
        let pattern = pattern.parse()?;
        let interval = u32::try_from(interval).map_err(|_| {
            LedgerError::InvalidRule(format!("interval {} is out of range", interval))
        })?;
        Self::new(pattern, interval)
    }

    /// A non-recurring rule.
    pub fn none() -> Self {
        Self {
            pattern: RecurrencePattern::None,
            interval: 1,
        }
    }

    pub fn daily(interval: u32) -> LedgerResult<Self> {
        Self::new(RecurrencePattern::Daily, interval)
    }

    pub fn weekly(interval: u32) -> LedgerResult<Self> {
        Self::new(RecurrencePattern::Weekly, interval)
    }

    pub fn monthly(interval: u32) -> LedgerResult<Self> {
        Self::new(RecurrencePattern::Monthly, interval)
    }

    pub fn yearly(interval: u32) -> LedgerResult<Self> {
        Self::new(RecurrencePattern::Yearly, interval)
    }

    /// Reject rules that cannot be stepped.
    pub fn validate(&self) -> LedgerResult<()> {
        if self.interval < 1 {
            return Err(LedgerError::InvalidRule(format!(
                "interval must be at least 1, got {}",
                self.interval
            )));
        }
        Ok(())
    }

    pub fn is_recurring(&self) -> bool {
        self.pattern != RecurrencePattern::None
    }

    /// Date of occurrence `k` counted from `anchor`.
    ///
    /// Computed from the anchor rather than from occurrence `k - 1`, so a
    /// clamped month end (Jan 31 -> Feb 29) does not drift later occurrences.
    pub fn nth_after(&self, anchor: NaiveDate, k: u64) -> Option<NaiveDate> {
        let steps = k.checked_mul(u64::from(self.interval))?;
        match self.pattern {
            RecurrencePattern::None => (k == 0).then_some(anchor),
            RecurrencePattern::Daily => anchor.checked_add_days(Days::new(steps)),
            RecurrencePattern::Weekly => anchor.checked_add_days(Days::new(steps.checked_mul(7)?)),
            RecurrencePattern::Monthly => {
                anchor.checked_add_months(Months::new(u32::try_from(steps).ok()?))
            }
            RecurrencePattern::Yearly => {
                let months = steps.checked_mul(12)?;
                anchor.checked_add_months(Months::new(u32::try_from(months).ok()?))
            }
        }
    }
}

impl fmt::Display for RecurrenceRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.pattern, self.interval) {
            (RecurrencePattern::None, _) => write!(f, "none"),
            (pattern, 1) => write!(f, "{}", pattern),
            (pattern, n) => write!(f, "every {} {}", n, period_noun(pattern)),
        }
    }
}

fn period_noun(pattern: RecurrencePattern) -> &'static str {
    match pattern {
        RecurrencePattern::None | RecurrencePattern::Daily => "days",
        RecurrencePattern::Weekly => "weeks",
        RecurrencePattern::Monthly => "months",
        RecurrencePattern::Yearly => "years",
    }
}

/// Index of the calendar bucket containing `date` for the given pattern.
///
/// Consecutive buckets have consecutive indices: days, ISO weeks starting on
/// Monday, calendar months, calendar years. `None` buckets by day.
pub fn period_index(pattern: RecurrencePattern, date: NaiveDate) -> i64 {
    match pattern {
        RecurrencePattern::None | RecurrencePattern::Daily => i64::from(date.num_days_from_ce()),
        RecurrencePattern::Weekly => {
            // 0001-01-01 (day 1 from CE) is a Monday.
            let monday = i64::from(date.num_days_from_ce())
                - i64::from(date.weekday().num_days_from_monday());
            (monday - 1).div_euclid(7)
        }
        RecurrencePattern::Monthly => i64::from(date.year()) * 12 + i64::from(date.month0()),
        RecurrencePattern::Yearly => i64::from(date.year()),
    }
}

/// First day of the bucket containing `date`.
pub fn period_start(pattern: RecurrencePattern, date: NaiveDate) -> NaiveDate {
    match pattern {
        RecurrencePattern::None | RecurrencePattern::Daily => date,
        RecurrencePattern::Weekly => {
            date - chrono::Duration::days(i64::from(date.weekday().num_days_from_monday()))
        }
        RecurrencePattern::Monthly => date.with_day(1).unwrap_or(date),
        RecurrencePattern::Yearly => NaiveDate::from_ymd_opt(date.year(), 1, 1).unwrap_or(date),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn parse_patterns_case_insensitively() {
        assert_eq!("Daily".parse::<RecurrencePattern>().unwrap(), RecurrencePattern::Daily);
        assert_eq!("".parse::<RecurrencePattern>().unwrap(), RecurrencePattern::None);
        assert_eq!("YEARLY".parse::<RecurrencePattern>().unwrap(), RecurrencePattern::Yearly);
        let err = "fortnightly".parse::<RecurrencePattern>().unwrap_err();
        assert!(matches!(err, LedgerError::InvalidRule(_)));
    }

    #[test]
    fn zero_interval_is_rejected() {
        assert!(matches!(
            RecurrenceRule::daily(0),
            Err(LedgerError::InvalidRule(_))
        ));
        assert!(RecurrenceRule::from_parts("weekly", -2).is_err());
        assert!(RecurrenceRule::from_parts("weekly", 0).is_err());
        assert_eq!(
            RecurrenceRule::from_parts("weekly", 2).unwrap(),
            RecurrenceRule::weekly(2).unwrap()
        );
    }

    #[test]
    fn nth_after_clamps_month_ends_from_anchor() {
        let rule = RecurrenceRule::monthly(1).unwrap();
        let anchor = d(2024, 1, 31);
        assert_eq!(rule.nth_after(anchor, 1), Some(d(2024, 2, 29)));
        assert_eq!(rule.nth_after(anchor, 2), Some(d(2024, 3, 31)));
        assert_eq!(rule.nth_after(anchor, 3), Some(d(2024, 4, 30)));
    }

    #[test]
    fn yearly_from_leap_day_lands_on_feb_28() {
        let rule = RecurrenceRule::yearly(1).unwrap();
        let anchor = d(2024, 2, 29);
        assert_eq!(rule.nth_after(anchor, 1), Some(d(2025, 2, 28)));
        assert_eq!(rule.nth_after(anchor, 4), Some(d(2028, 2, 29)));
    }

    #[test]
    fn weekly_buckets_start_on_monday() {
        // 2024-01-01 is a Monday, 2024-01-07 a Sunday.
        let monday = period_index(RecurrencePattern::Weekly, d(2024, 1, 1));
        assert_eq!(period_index(RecurrencePattern::Weekly, d(2024, 1, 7)), monday);
        assert_eq!(period_index(RecurrencePattern::Weekly, d(2024, 1, 8)), monday + 1);
        assert_eq!(period_index(RecurrencePattern::Weekly, d(2023, 12, 31)), monday - 1);
        assert_eq!(period_start(RecurrencePattern::Weekly, d(2024, 1, 7)), d(2024, 1, 1));
    }

    #[test]
    fn monthly_buckets_cross_year_boundary() {
        let dec = period_index(RecurrencePattern::Monthly, d(2023, 12, 15));
        let jan = period_index(RecurrencePattern::Monthly, d(2024, 1, 2));
        assert_eq!(jan, dec + 1);
    }

    #[test]
    fn display_names_interval() {
        assert_eq!(RecurrenceRule::none().to_string(), "none");
        assert_eq!(RecurrenceRule::weekly(1).unwrap().to_string(), "weekly");
        assert_eq!(RecurrenceRule::monthly(3).unwrap().to_string(), "every 3 months");
    }
}

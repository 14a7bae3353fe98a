//! In-memory append-only completion ledger.

use crate::error::{LedgerError, LedgerResult};
use crate::types::CompletionInstance;
use chrono::{DateTime, NaiveDate, Utc};

/// Completion entry to append.
#[derive(Debug, Clone)]
pub struct CompletionRecord {
    pub user_id: String,
    pub task_id: String,
    pub completed_at: DateTime<Utc>,
    pub points: i64,
    /// Set for recurring task instances.
    pub instance_date: Option<NaiveDate>,
}

/// Append-only log of completion events.
///
/// Entries are never removed or edited; a reversal only stamps
/// `reversed_at` on exactly one active entry.
#[derive(Debug, Clone, Default)]
pub struct CompletionLedger {
    entries: Vec<CompletionInstance>,
    next_id: i64,
}

impl CompletionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a ledger from stored entries.
    pub fn from_entries(mut entries: Vec<CompletionInstance>) -> Self {
        entries.sort_by_key(|e| e.id);
        let next_id = entries.last().map_or(0, |e| e.id);
        Self { entries, next_id }
    }

    pub fn append(&mut self, record: CompletionRecord) -> &CompletionInstance {
        self.next_id += 1;
        self.entries.push(CompletionInstance {
            id: self.next_id,
            user_id: record.user_id,
            task_id: record.task_id,
            completed_at: record.completed_at,
            points_earned: record.points,
            is_recurring_instance: record.instance_date.is_some(),
            recurring_instance_date: record.instance_date,
            reversed_at: None,
        });
        &self.entries[self.entries.len() - 1]
    }

    /// Active entry for a task instance, whoever completed it.
    pub fn find_active(
        &self,
        task_id: &str,
        instance_date: Option<NaiveDate>,
    ) -> Option<&CompletionInstance> {
        self.entries
            .iter()
            .rev()
            .find(|e| e.is_active() && e.matches(task_id, instance_date))
    }

    /// Invalidate the active entry for a task instance and return it.
    pub fn reverse(
        &mut self,
        task_id: &str,
        instance_date: Option<NaiveDate>,
        reversed_at: DateTime<Utc>,
    ) -> LedgerResult<CompletionInstance> {
        let entry = self
            .entries
            .iter_mut()
            .rev()
            .find(|e| e.is_active() && e.matches(task_id, instance_date))
            .ok_or_else(|| LedgerError::completion_not_found(task_id, instance_date))?;
        entry.reversed_at = Some(reversed_at);
        Ok(entry.clone())
    }

    /// All entries, including reversed ones, in append order.
    pub fn entries(&self) -> &[CompletionInstance] {
        &self.entries
    }

    /// Active entries for one user.
    pub fn active_for<'a>(
        &'a self,
        user_id: &'a str,
    ) -> impl Iterator<Item = &'a CompletionInstance> + 'a {
        self.entries
            .iter()
            .filter(move |e| e.is_active() && e.user_id == user_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

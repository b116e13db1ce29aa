use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;

use crate::models::{ActivityRecord, MemberId, Task, TaskId};

/// Which tasks to show for a given day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusFilter {
    #[default]
    All,
    Pending,
    Completed,
}

impl StatusFilter {
    /// Cycles all → pending → completed → all.
    pub fn next(self) -> StatusFilter {
        match self {
            StatusFilter::All => StatusFilter::Pending,
            StatusFilter::Pending => StatusFilter::Completed,
            StatusFilter::Completed => StatusFilter::All,
        }
    }
}

impl fmt::Display for StatusFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StatusFilter::All => "all",
            StatusFilter::Pending => "pending",
            StatusFilter::Completed => "completed",
        })
    }
}

impl FromStr for StatusFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "all" => Ok(StatusFilter::All),
            "pending" => Ok(StatusFilter::Pending),
            "completed" | "done" => Ok(StatusFilter::Completed),
            other => Err(format!(
                "unknown filter '{}' (expected all, pending or completed)",
                other
            )),
        }
    }
}

/// Returns true if any record marks `task_id` as done on `date`.
///
/// Only the calendar day matters; records whose date does not parse are
/// ignored rather than treated as an error.
pub fn is_completed_for_date(records: &[ActivityRecord], task_id: TaskId, date: NaiveDate) -> bool {
    records
        .iter()
        .any(|r| r.task_id == task_id && r.completed_on(date))
}

/// Keeps the tasks matching `filter` on `date`, preserving input order.
pub fn filter_by_status<'a>(
    tasks: &'a [Task],
    records: &[ActivityRecord],
    date: NaiveDate,
    filter: StatusFilter,
) -> Vec<&'a Task> {
    tasks
        .iter()
        .filter(|t| match filter {
            StatusFilter::All => true,
            StatusFilter::Pending => !is_completed_for_date(records, t.id, date),
            StatusFilter::Completed => is_completed_for_date(records, t.id, date),
        })
        .collect()
}

/// Members who completed `task_id` on `date`, in record order, without repeats.
pub fn completed_by_on(
    records: &[ActivityRecord],
    task_id: TaskId,
    date: NaiveDate,
) -> Vec<MemberId> {
    let mut members = Vec::new();
    for r in records.iter().filter(|r| r.task_id == task_id && r.completed_on(date)) {
        if !members.contains(&r.completed_by) {
            members.push(r.completed_by);
        }
    }
    members
}

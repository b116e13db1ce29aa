use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use chrono::{Duration, NaiveDate};

use crate::models::{ActivityRecord, TaskId};

/// Trailing span covered by the completion chart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrendWindow {
    #[default]
    Week,
    Month,
}

impl TrendWindow {
    pub fn days(self) -> usize {
        match self {
            TrendWindow::Week => 7,
            TrendWindow::Month => 30,
        }
    }

    pub fn toggle(self) -> TrendWindow {
        match self {
            TrendWindow::Week => TrendWindow::Month,
            TrendWindow::Month => TrendWindow::Week,
        }
    }
}

impl fmt::Display for TrendWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TrendWindow::Week => "last week",
            TrendWindow::Month => "last month",
        })
    }
}

impl FromStr for TrendWindow {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "week" | "7" => Ok(TrendWindow::Week),
            "month" | "30" => Ok(TrendWindow::Month),
            other => Err(format!("unknown window '{}' (expected week or month)", other)),
        }
    }
}

/// One day on the completion chart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrendPoint {
    pub day: NaiveDate,
    /// Short label such as "May 01".
    pub date: String,
    /// Distinct tasks completed that day.
    pub completed: usize,
}

/// Builds the completion series for the `window` ending on `today`.
///
/// Always returns exactly `window.days()` points in ascending order. A task
/// completed by several members on the same day counts once. Records with a
/// date that does not parse are skipped.
pub fn build_series(
    records: &[ActivityRecord],
    window: TrendWindow,
    today: NaiveDate,
) -> Vec<TrendPoint> {
    let first = today - Duration::days(window.days() as i64 - 1);

    let mut per_day: HashMap<NaiveDate, HashSet<TaskId>> = HashMap::new();
    for record in records.iter().filter(|r| r.completed) {
        let Some(day) = record.day() else { continue };
        if day < first || day > today {
            continue;
        }
        per_day.entry(day).or_default().insert(record.task_id);
    }

    first
        .iter_days()
        .take(window.days())
        .map(|day| TrendPoint {
            day,
            date: day.format("%b %d").to_string(),
            completed: per_day.get(&day).map_or(0, HashSet::len),
        })
        .collect()
}

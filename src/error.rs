use std::io;

use chrono::NaiveDate;

/// Everything that can go wrong outside the pure grouping and matching code.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Corrupt data file: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Not signed in: pass --user or set CHORELOG_USER")]
    Unauthenticated,

    #[error("No family set up for this user yet (try `chorelog family create`)")]
    FamilyNotFound,

    #[error("A family already exists for this user")]
    FamilyExists,

    #[error("Family member '{0}' not found")]
    MemberNotFound(String),

    #[error("A family member named '{0}' already exists")]
    DuplicateMember(String),

    #[error("Task '{0}' not found")]
    TaskNotFound(String),

    #[error("Activity record '{0}' not found")]
    RecordNotFound(String),

    #[error("'{0}' matches more than one entry; use a longer id")]
    AmbiguousId(String),

    #[error("The {0} must not be empty")]
    Empty(&'static str),

    #[error("Invalid task: {0}")]
    InvalidTask(String),

    #[error("Invalid date '{0}'. Use YYYY-MM-DD.")]
    InvalidDate(String),

    #[error("{member} is not assigned to '{task}'")]
    NotAssigned { task: String, member: String },

    #[error("'{task}' is already recorded as done on {date}")]
    AlreadyRecorded { task: String, date: NaiveDate },

    #[error("Nothing to record: pick at least one task and who completed it")]
    NothingToRecord,
}

pub type Result<T> = std::result::Result<T, Error>;

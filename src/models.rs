use std::fmt;
use std::num::NonZeroU32;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Generates a fresh random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// First eight hex digits, enough to tell rows apart on screen.
            pub fn short(&self) -> String {
                self.0.simple().to_string()[..8].to_string()
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self)
            }
        }
    };
}

id_type!(
    /// Identity of a family (household).
    FamilyId
);
id_type!(
    /// Identity of a family member. Tasks and records point here, never at a name.
    MemberId
);
id_type!(
    /// Identity of a task.
    TaskId
);
id_type!(
    /// Identity of a single completion record.
    RecordId
);

/// A household, owned by the user who created it.
#[derive(Debug, Clone, PartialEq)]
pub struct Family {
    pub id: FamilyId,
    pub name: String,
    /// Identity of the owning user.
    pub created_by: String,
    pub members: Vec<FamilyMember>,
}

impl Family {
    pub fn member(&self, id: MemberId) -> Option<&FamilyMember> {
        self.members.iter().find(|m| m.id == id)
    }

    /// Looks a member up by display name, ignoring case.
    pub fn member_by_name(&self, name: &str) -> Option<&FamilyMember> {
        let name = name.trim();
        self.members.iter().find(|m| m.name.eq_ignore_ascii_case(name))
    }

    /// Display name for a member id, for rendering only.
    pub fn member_name(&self, id: MemberId) -> &str {
        self.member(id).map(|m| m.name.as_str()).unwrap_or("Unknown member")
    }

    /// Resolves a list of member ids to a comma separated list of names.
    pub fn member_names(&self, ids: &[MemberId]) -> String {
        ids.iter()
            .map(|id| self.member_name(*id))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct FamilyMember {
    pub id: MemberId,
    pub family_id: FamilyId,
    pub name: String,
    pub role: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        })
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            other => Err(format!("unknown priority '{}' (expected low, medium or high)", other)),
        }
    }
}

/// How often a task comes around, as persisted in the `frequency` column.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Once,
    Daily,
    Weekly,
    Custom,
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Frequency::Once => "once",
            Frequency::Daily => "daily",
            Frequency::Weekly => "weekly",
            Frequency::Custom => "custom",
        })
    }
}

impl FromStr for Frequency {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "once" => Ok(Frequency::Once),
            "daily" => Ok(Frequency::Daily),
            "weekly" => Ok(Frequency::Weekly),
            "custom" => Ok(Frequency::Custom),
            other => Err(format!(
                "unknown frequency '{}' (expected once, daily, weekly or custom)",
                other
            )),
        }
    }
}

/// When a task is due.
///
/// A one-off task carries a due date; a recurring task carries a start/end
/// window instead. The two never coexist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schedule {
    Once { due: NaiveDate },
    Daily { start: NaiveDate, end: NaiveDate },
    Weekly { start: NaiveDate, end: NaiveDate },
    Custom {
        every_days: NonZeroU32,
        start: NaiveDate,
        end: NaiveDate,
    },
}

impl Schedule {
    /// Builds a schedule from the flat column layout used in storage.
    ///
    /// Fails if the fields required by `frequency` are missing, if
    /// `custom_days` is zero or missing for a custom schedule, or if the
    /// window ends before it starts.
    pub fn new(
        frequency: Frequency,
        custom_days: Option<u32>,
        due: Option<NaiveDate>,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<Schedule> {
        match frequency {
            Frequency::Once => due
                .map(|due| Schedule::Once { due })
                .ok_or_else(|| Error::InvalidTask("a one-off task needs a due date".into())),
            Frequency::Daily => {
                let (start, end) = checked_window(frequency, start, end)?;
                Ok(Schedule::Daily { start, end })
            }
            Frequency::Weekly => {
                let (start, end) = checked_window(frequency, start, end)?;
                Ok(Schedule::Weekly { start, end })
            }
            Frequency::Custom => {
                let (start, end) = checked_window(frequency, start, end)?;
                let every_days = custom_days.and_then(NonZeroU32::new).ok_or_else(|| {
                    Error::InvalidTask("a custom task needs a repeat interval above zero".into())
                })?;
                Ok(Schedule::Custom {
                    every_days,
                    start,
                    end,
                })
            }
        }
    }

    pub fn frequency(&self) -> Frequency {
        match self {
            Schedule::Once { .. } => Frequency::Once,
            Schedule::Daily { .. } => Frequency::Daily,
            Schedule::Weekly { .. } => Frequency::Weekly,
            Schedule::Custom { .. } => Frequency::Custom,
        }
    }

    pub fn custom_days(&self) -> Option<u32> {
        match self {
            Schedule::Custom { every_days, .. } => Some(every_days.get()),
            _ => None,
        }
    }

    pub fn due_date(&self) -> Option<NaiveDate> {
        match self {
            Schedule::Once { due } => Some(*due),
            _ => None,
        }
    }

    pub fn start_date(&self) -> Option<NaiveDate> {
        match self {
            Schedule::Once { .. } => None,
            Schedule::Daily { start, .. }
            | Schedule::Weekly { start, .. }
            | Schedule::Custom { start, .. } => Some(*start),
        }
    }

    pub fn end_date(&self) -> Option<NaiveDate> {
        match self {
            Schedule::Once { .. } => None,
            Schedule::Daily { end, .. }
            | Schedule::Weekly { end, .. }
            | Schedule::Custom { end, .. } => Some(*end),
        }
    }
}

fn checked_window(
    frequency: Frequency,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> Result<(NaiveDate, NaiveDate)> {
    let (Some(start), Some(end)) = (start, end) else {
        return Err(Error::InvalidTask(format!(
            "a {} task needs both a start and an end date",
            frequency
        )));
    };
    if end < start {
        return Err(Error::InvalidTask(format!(
            "end date {} is before start date {}",
            end, start
        )));
    }
    Ok((start, end))
}

impl fmt::Display for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Schedule::Once { due } => write!(f, "once, due {}", due),
            Schedule::Daily { start, end } => write!(f, "daily {} → {}", start, end),
            Schedule::Weekly { start, end } => write!(f, "weekly {} → {}", start, end),
            Schedule::Custom { every_days, start, end } => {
                write!(f, "every {} days {} → {}", every_days, start, end)
            }
        }
    }
}

/// A chore assigned to one or more family members.
#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    pub id: TaskId,
    pub family_id: FamilyId,
    pub title: String,
    pub priority: Priority,
    pub schedule: Schedule,
    /// Assignees in the order they were assigned. Never empty for tasks
    /// coming out of the store.
    pub assigned_to: Vec<MemberId>,
}

impl Task {
    /// More than one assignee.
    pub fn is_shared(&self) -> bool {
        self.assigned_to.len() > 1
    }

    pub fn is_assigned_to(&self, member: MemberId) -> bool {
        self.assigned_to.contains(&member)
    }
}

/// One member completing one task on one calendar day.
#[derive(Debug, Clone, PartialEq)]
pub struct ActivityRecord {
    pub id: RecordId,
    pub task_id: TaskId,
    /// Always true for stored records; absence of a record means "not done".
    pub completed: bool,
    /// Raw `completed_at` value. Kept unparsed so a bad value only hides
    /// this record instead of failing the whole load.
    pub date: String,
    pub completed_by: MemberId,
}

impl ActivityRecord {
    /// The calendar day this record counts towards, if its date parses.
    pub fn day(&self) -> Option<NaiveDate> {
        parse_day(&self.date)
    }

    /// True when this is a completion on `date`.
    pub fn completed_on(&self, date: NaiveDate) -> bool {
        self.completed && self.day() == Some(date)
    }
}

/// Truncates a stored `completed_at` value to its calendar day.
///
/// Plain `yyyy-MM-dd` values are taken as-is. Timestamps carrying an offset
/// are converted to UTC first; timestamps without one are read as UTC.
/// Anything not starting with a zero-padded `yyyy-MM-dd` is rejected.
pub fn parse_day(value: &str) -> Option<NaiveDate> {
    let prefix = value.get(..10)?;
    let day = NaiveDate::parse_from_str(prefix, "%Y-%m-%d")
        .ok()
        .filter(|d| d.format("%Y-%m-%d").to_string() == prefix)?;
    if value.len() == 10 {
        return Some(day);
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Some(ts.with_timezone(&Utc).date_naive());
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .map(|ts| ts.date())
}

/// Today's calendar day, by the same UTC rule used for stored timestamps.
pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}

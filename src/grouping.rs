use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::models::{MemberId, Task};

pub const SHARED_TASKS: &str = "Shared Tasks";
pub const INDIVIDUAL_TASKS: &str = "Individual Tasks";

/// How the dashboard lays out its task sections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GroupBy {
    /// One section per assignee.
    #[default]
    Individual,
    /// Two sections: shared and individual tasks.
    Shared,
}

impl GroupBy {
    pub fn toggle(self) -> GroupBy {
        match self {
            GroupBy::Individual => GroupBy::Shared,
            GroupBy::Shared => GroupBy::Individual,
        }
    }
}

impl fmt::Display for GroupBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            GroupBy::Individual => "individual",
            GroupBy::Shared => "shared",
        })
    }
}

impl FromStr for GroupBy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "individual" | "member" => Ok(GroupBy::Individual),
            "shared" => Ok(GroupBy::Shared),
            other => Err(format!("unknown grouping '{}' (expected individual or shared)", other)),
        }
    }
}

/// Tasks split by assignee count.
#[derive(Debug, Default, PartialEq)]
pub struct SharedSplit<'a> {
    pub shared: Vec<&'a Task>,
    pub individual: Vec<&'a Task>,
}

impl<'a> SharedSplit<'a> {
    /// Both sections with their headings, shared first.
    pub fn sections(&self) -> [(&'static str, &[&'a Task]); 2] {
        [
            (SHARED_TASKS, self.shared.as_slice()),
            (INDIVIDUAL_TASKS, self.individual.as_slice()),
        ]
    }

    pub fn len(&self) -> usize {
        self.shared.len() + self.individual.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Heading of a dashboard section. Member names are resolved when rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupKey {
    Member(MemberId),
    Shared,
    Individual,
}

#[derive(Debug, PartialEq)]
pub struct TaskGroup<'a> {
    pub key: GroupKey,
    pub tasks: Vec<&'a Task>,
}

/// Buckets tasks under every member they are assigned to.
///
/// A task is listed at most once per member, even if the member appears
/// twice in its assignee list. Members without tasks get no bucket.
pub fn group_by_assignee(tasks: &[Task]) -> BTreeMap<MemberId, Vec<&Task>> {
    let mut grouped: BTreeMap<MemberId, Vec<&Task>> = BTreeMap::new();
    for task in tasks {
        for member in &task.assigned_to {
            let bucket = grouped.entry(*member).or_default();
            if !bucket.iter().any(|t| t.id == task.id) {
                bucket.push(task);
            }
        }
    }
    grouped
}

/// Splits tasks into shared (several assignees) and individual (exactly one).
///
/// Tasks with nobody assigned are left out of both. Input order is kept.
pub fn group_by_shared_vs_individual(tasks: &[Task]) -> SharedSplit<'_> {
    let mut split = SharedSplit::default();
    for task in tasks {
        match task.assigned_to.len() {
            0 => {}
            1 => split.individual.push(task),
            _ => split.shared.push(task),
        }
    }
    split
}

/// Sections for the dashboard according to `group_by`.
///
/// Shared/individual grouping always yields both sections, even when empty.
pub fn group(tasks: &[Task], group_by: GroupBy) -> Vec<TaskGroup<'_>> {
    match group_by {
        GroupBy::Individual => group_by_assignee(tasks)
            .into_iter()
            .map(|(member, tasks)| TaskGroup {
                key: GroupKey::Member(member),
                tasks,
            })
            .collect(),
        GroupBy::Shared => {
            let split = group_by_shared_vs_individual(tasks);
            vec![
                TaskGroup {
                    key: GroupKey::Shared,
                    tasks: split.shared,
                },
                TaskGroup {
                    key: GroupKey::Individual,
                    tasks: split.individual,
                },
            ]
        }
    }
}

use std::fs::{self, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::models::{
    ActivityRecord, Family, FamilyId, FamilyMember, Frequency, MemberId, Priority, RecordId,
    Schedule, Task, TaskId,
};
use crate::session::Session;

const FAMILIES: &str = "families.json";
const MEMBERS: &str = "family_members.json";
const TASKS: &str = "tasks.json";
const ASSIGNMENTS: &str = "task_assignments.json";
const RECORDS: &str = "task_records.json";

const TABLES: [&str; 5] = [FAMILIES, MEMBERS, TASKS, ASSIGNMENTS, RECORDS];

/// Returns the directory holding the data files.
///
/// The path is determined in the following order:
/// 1. `CHORELOG_DIR` environment variable.
/// 2. `~/.local/share/chorelog` (on Linux).
/// 3. `./chorelog` (fallback).
pub fn data_dir() -> PathBuf {
    std::env::var("CHORELOG_DIR").map(PathBuf::from).unwrap_or_else(|_| {
        let mut p = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
        p.push("chorelog");
        p
    })
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct FamilyRow {
    pub id: FamilyId,
    pub name: String,
    pub created_by: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct TaskRow {
    pub id: TaskId,
    pub family_id: FamilyId,
    pub title: String,
    pub priority: Priority,
    pub frequency: Frequency,
    #[serde(default)]
    pub custom_days: Option<u32>,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AssignmentRow {
    pub task_id: TaskId,
    pub family_member_id: MemberId,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RecordRow {
    pub id: RecordId,
    pub task_id: TaskId,
    pub completed_by: MemberId,
    /// Calendar day (`yyyy-MM-dd`) or a full timestamp from older data.
    pub completed_at: String,
}

impl TaskRow {
    fn from_task(task: &Task) -> TaskRow {
        TaskRow {
            id: task.id,
            family_id: task.family_id,
            title: task.title.clone(),
            priority: task.priority,
            frequency: task.schedule.frequency(),
            custom_days: task.schedule.custom_days(),
            due_date: task.schedule.due_date(),
            start_date: task.schedule.start_date(),
            end_date: task.schedule.end_date(),
        }
    }

    /// Validates the row and joins it with its assignees.
    fn into_task(self, assignments: &[AssignmentRow]) -> Result<Task> {
        let schedule = Schedule::new(
            self.frequency,
            self.custom_days,
            self.due_date,
            self.start_date,
            self.end_date,
        )?;
        let mut assigned_to: Vec<MemberId> = Vec::new();
        for a in assignments.iter().filter(|a| a.task_id == self.id) {
            if !assigned_to.contains(&a.family_member_id) {
                assigned_to.push(a.family_member_id);
            }
        }
        if assigned_to.is_empty() {
            return Err(Error::InvalidTask(format!("'{}' has nobody assigned", self.title)));
        }
        Ok(Task {
            id: self.id,
            family_id: self.family_id,
            title: self.title,
            priority: self.priority,
            schedule,
            assigned_to,
        })
    }
}

impl From<RecordRow> for ActivityRecord {
    fn from(row: RecordRow) -> ActivityRecord {
        ActivityRecord {
            id: row.id,
            task_id: row.task_id,
            completed: true,
            date: row.completed_at,
            completed_by: row.completed_by,
        }
    }
}

/// A member to create along with a new family.
#[derive(Debug, Clone)]
pub struct NewMember {
    pub name: String,
    pub role: String,
}

/// Fields of a task about to be created.
#[derive(Debug, Clone)]
pub struct NewTask {
    pub title: String,
    pub priority: Priority,
    pub schedule: Schedule,
    pub assigned_to: Vec<MemberId>,
}

/// Partial update of a task; `None` keeps the current value.
#[derive(Debug, Clone, Default)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub priority: Option<Priority>,
    pub schedule: Option<Schedule>,
    pub assigned_to: Option<Vec<MemberId>>,
}

/// One task ticked off in the activity recorder, with everyone who did it.
#[derive(Debug, Clone)]
pub struct RecordEntry {
    pub task_id: TaskId,
    pub completed_by: Vec<MemberId>,
}

/// JSON file backed store, one file per table.
///
/// Every operation returns a [`Result`]; callers report failures once
/// instead of at each call site.
#[derive(Debug, Clone)]
pub struct Store {
    dir: PathBuf,
}

impl Store {
    /// Opens the store in [`data_dir`].
    pub fn open() -> Result<Store> {
        Store::at(data_dir())
    }

    /// Opens (and creates if needed) a store rooted at `dir`.
    pub fn at(dir: impl Into<PathBuf>) -> Result<Store> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        debug!(dir = %dir.display(), "opened store");
        Ok(Store { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn load<T: DeserializeOwned>(&self, table: &str) -> Result<Vec<T>> {
        let path = self.dir.join(table);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let mut f = OpenOptions::new().read(true).open(&path)?;
        let mut s = String::new();
        f.read_to_string(&mut s)?;
        if s.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_str(&s)?)
    }

    /// Writes a whole table through a sibling temp file, so a failed write
    /// leaves the previous contents in place.
    fn save<T: Serialize>(&self, table: &str, rows: &[T]) -> Result<()> {
        let path = self.dir.join(table);
        let tmp = path.with_extension("json.tmp");
        let s = serde_json::to_string_pretty(rows)?;
        let mut f = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&tmp)?;
        f.write_all(s.as_bytes())?;
        f.sync_all()?;
        fs::rename(&tmp, &path)?;
        debug!(table, rows = rows.len(), "saved table");
        Ok(())
    }

    fn family_row(&self, session: &Session) -> Result<FamilyRow> {
        self.load::<FamilyRow>(FAMILIES)?
            .into_iter()
            .find(|f| f.created_by == session.user())
            .ok_or(Error::FamilyNotFound)
    }

    // ---- families ----

    /// Loads the session user's family with its members.
    pub fn family(&self, session: &Session) -> Result<Family> {
        let row = self.family_row(session)?;
        let members = self
            .load::<FamilyMember>(MEMBERS)?
            .into_iter()
            .filter(|m| m.family_id == row.id)
            .collect();
        Ok(Family {
            id: row.id,
            name: row.name,
            created_by: row.created_by,
            members,
        })
    }

    /// Creates a family owned by the session user, with its initial members.
    pub fn create_family(
        &self,
        session: &Session,
        name: &str,
        members: &[NewMember],
    ) -> Result<Family> {
        let mut families = self.load::<FamilyRow>(FAMILIES)?;
        if families.iter().any(|f| f.created_by == session.user()) {
            return Err(Error::FamilyExists);
        }
        let name = non_empty(name, "family name")?;

        let family = FamilyRow {
            id: FamilyId::new(),
            name,
            created_by: session.user().to_string(),
        };
        let mut new_members: Vec<FamilyMember> = Vec::new();
        for m in members {
            let member_name = non_empty(&m.name, "member name")?;
            if new_members.iter().any(|x| x.name.eq_ignore_ascii_case(&member_name)) {
                return Err(Error::DuplicateMember(member_name));
            }
            new_members.push(FamilyMember {
                id: MemberId::new(),
                family_id: family.id,
                name: member_name,
                role: role_or_default(&m.role),
            });
        }

        let mut all_members = self.load::<FamilyMember>(MEMBERS)?;
        all_members.extend(new_members.iter().cloned());
        families.push(family.clone());
        self.save(FAMILIES, &families)?;
        self.save(MEMBERS, &all_members)?;
        info!(family = %family.id, members = new_members.len(), "created family");

        Ok(Family {
            id: family.id,
            name: family.name,
            created_by: family.created_by,
            members: new_members,
        })
    }

    pub fn rename_family(&self, session: &Session, name: &str) -> Result<()> {
        let own = self.family_row(session)?;
        let name = non_empty(name, "family name")?;
        let mut families = self.load::<FamilyRow>(FAMILIES)?;
        if let Some(f) = families.iter_mut().find(|f| f.id == own.id) {
            f.name = name;
        }
        self.save(FAMILIES, &families)
    }

    pub fn add_member(&self, session: &Session, name: &str, role: &str) -> Result<FamilyMember> {
        let family = self.family(session)?;
        let name = non_empty(name, "member name")?;
        if family.member_by_name(&name).is_some() {
            return Err(Error::DuplicateMember(name));
        }
        let member = FamilyMember {
            id: MemberId::new(),
            family_id: family.id,
            name,
            role: role_or_default(role),
        };
        let mut members = self.load::<FamilyMember>(MEMBERS)?;
        members.push(member.clone());
        self.save(MEMBERS, &members)?;
        info!(member = %member.id, "added family member");
        Ok(member)
    }

    /// Renames a member. Tasks and records refer to the id, so nothing else changes.
    pub fn rename_member(&self, session: &Session, member: MemberId, name: &str) -> Result<()> {
        let family = self.family(session)?;
        let name = non_empty(name, "member name")?;
        if family.member(member).is_none() {
            return Err(Error::MemberNotFound(member.short()));
        }
        if let Some(other) = family.member_by_name(&name) {
            if other.id != member {
                return Err(Error::DuplicateMember(name));
            }
        }
        let mut members = self.load::<FamilyMember>(MEMBERS)?;
        if let Some(m) = members.iter_mut().find(|m| m.id == member) {
            m.name = name;
        }
        self.save(MEMBERS, &members)
    }

    /// Removes a member along with their task assignments and records.
    ///
    /// Tasks left without assignees are not deleted here; see
    /// [`Store::cleanup_orphaned_tasks`], which also drops any links to the
    /// member left behind by an interrupted removal.
    pub fn remove_member(&self, session: &Session, member: MemberId) -> Result<()> {
        let family = self.family(session)?;
        if family.member(member).is_none() {
            return Err(Error::MemberNotFound(member.short()));
        }
        let mut members = self.load::<FamilyMember>(MEMBERS)?;
        members.retain(|m| m.id != member);
        let mut assignments = self.load::<AssignmentRow>(ASSIGNMENTS)?;
        assignments.retain(|a| a.family_member_id != member);
        let mut records = self.load::<RecordRow>(RECORDS)?;
        records.retain(|r| r.completed_by != member);

        // Parent table first: a later failure leaves only dangling links
        self.save(MEMBERS, &members)?;
        self.save(ASSIGNMENTS, &assignments)?;
        self.save(RECORDS, &records)?;
        info!(member = %member, "removed family member");
        Ok(())
    }

    // ---- tasks ----

    /// All valid tasks of the session user's family, in creation order.
    ///
    /// Rows that fail validation are skipped with a warning.
    pub fn tasks(&self, session: &Session) -> Result<Vec<Task>> {
        let family = self.family_row(session)?;
        let assignments = self.load::<AssignmentRow>(ASSIGNMENTS)?;
        let mut tasks = Vec::new();
        for row in self.load::<TaskRow>(TASKS)? {
            if row.family_id != family.id {
                continue;
            }
            let id = row.id;
            match row.into_task(&assignments) {
                Ok(task) => tasks.push(task),
                Err(e) => warn!(task = %id, error = %e, "skipping invalid task"),
            }
        }
        Ok(tasks)
    }

    pub fn task(&self, session: &Session, id: TaskId) -> Result<Task> {
        self.tasks(session)?
            .into_iter()
            .find(|t| t.id == id)
            .ok_or_else(|| Error::TaskNotFound(id.short()))
    }

    pub fn create_task(&self, session: &Session, new: NewTask) -> Result<Task> {
        let family = self.family(session)?;
        let task = Task {
            id: TaskId::new(),
            family_id: family.id,
            title: non_empty(&new.title, "task title")?,
            priority: new.priority,
            schedule: new.schedule,
            assigned_to: checked_assignees(&family, new.assigned_to)?,
        };

        let mut rows = self.load::<TaskRow>(TASKS)?;
        let mut assignments = self.load::<AssignmentRow>(ASSIGNMENTS)?;
        rows.push(TaskRow::from_task(&task));
        assignments.extend(task.assigned_to.iter().map(|m| AssignmentRow {
            task_id: task.id,
            family_member_id: *m,
        }));
        self.save(TASKS, &rows)?;
        self.save(ASSIGNMENTS, &assignments)?;
        info!(task = %task.id, assignees = task.assigned_to.len(), "created task");
        Ok(task)
    }

    pub fn update_task(&self, session: &Session, id: TaskId, patch: TaskPatch) -> Result<Task> {
        let family = self.family(session)?;
        let mut task = self.task(session, id)?;

        if let Some(title) = patch.title {
            task.title = non_empty(&title, "task title")?;
        }
        if let Some(p) = patch.priority {
            task.priority = p;
        }
        if let Some(s) = patch.schedule {
            task.schedule = s;
        }
        let reassigned = match patch.assigned_to {
            Some(members) => {
                task.assigned_to = checked_assignees(&family, members)?;
                true
            }
            None => false,
        };

        let mut rows = self.load::<TaskRow>(TASKS)?;
        if let Some(row) = rows.iter_mut().find(|r| r.id == id) {
            *row = TaskRow::from_task(&task);
        }
        self.save(TASKS, &rows)?;
        if reassigned {
            let mut assignments = self.load::<AssignmentRow>(ASSIGNMENTS)?;
            assignments.retain(|a| a.task_id != id);
            assignments.extend(task.assigned_to.iter().map(|m| AssignmentRow {
                task_id: id,
                family_member_id: *m,
            }));
            self.save(ASSIGNMENTS, &assignments)?;
        }
        info!(task = %id, "updated task");
        Ok(task)
    }

    /// Deletes a task with its assignments and records.
    pub fn delete_task(&self, session: &Session, id: TaskId) -> Result<()> {
        let family = self.family_row(session)?;
        let mut rows = self.load::<TaskRow>(TASKS)?;
        let before = rows.len();
        rows.retain(|r| !(r.id == id && r.family_id == family.id));
        if rows.len() == before {
            return Err(Error::TaskNotFound(id.short()));
        }
        let assignments = self.load::<AssignmentRow>(ASSIGNMENTS)?;
        let records = self.load::<RecordRow>(RECORDS)?;
        self.delete_task_rows(rows, assignments, records, &[id])?;
        info!(task = %id, "deleted task");
        Ok(())
    }

    /// Deletes the family's tasks that nobody is assigned to. Returns how many went.
    ///
    /// Assignments and records of the family's tasks that point at a member
    /// who is no longer in the family are dropped first.
    pub fn cleanup_orphaned_tasks(&self, session: &Session) -> Result<usize> {
        let family = self.family(session)?;
        let rows = self.load::<TaskRow>(TASKS)?;
        let own: Vec<TaskId> = rows
            .iter()
            .filter(|r| r.family_id == family.id)
            .map(|r| r.id)
            .collect();
        let dangling =
            |task: TaskId, member: MemberId| own.contains(&task) && family.member(member).is_none();

        let mut assignments = self.load::<AssignmentRow>(ASSIGNMENTS)?;
        let mut records = self.load::<RecordRow>(RECORDS)?;
        let before = assignments.len() + records.len();
        assignments.retain(|a| !dangling(a.task_id, a.family_member_id));
        records.retain(|r| !dangling(r.task_id, r.completed_by));
        let pruned = before - assignments.len() - records.len();

        let (orphaned, kept): (Vec<TaskRow>, Vec<TaskRow>) = rows
            .into_iter()
            .partition(|r| own.contains(&r.id) && !assignments.iter().any(|a| a.task_id == r.id));
        if orphaned.is_empty() && pruned == 0 {
            return Ok(0);
        }
        if pruned > 0 {
            warn!(count = pruned, "dropped links to removed members");
        }
        let ids: Vec<TaskId> = orphaned.iter().map(|r| r.id).collect();
        self.delete_task_rows(kept, assignments, records, &ids)?;
        info!(count = ids.len(), "cleaned up orphaned tasks");
        Ok(ids.len())
    }

    /// Saves the task table without `ids`, then their assignments and records.
    ///
    /// Tasks go first so an interrupted cascade leaves only rows pointing at
    /// missing tasks, which every reader ignores.
    fn delete_task_rows(
        &self,
        remaining: Vec<TaskRow>,
        mut assignments: Vec<AssignmentRow>,
        mut records: Vec<RecordRow>,
        ids: &[TaskId],
    ) -> Result<()> {
        assignments.retain(|a| !ids.contains(&a.task_id));
        records.retain(|r| !ids.contains(&r.task_id));
        self.save(TASKS, &remaining)?;
        self.save(ASSIGNMENTS, &assignments)?;
        self.save(RECORDS, &records)
    }

    // ---- records ----

    /// Completion records for the family's tasks, in insertion order.
    pub fn records(&self, session: &Session) -> Result<Vec<ActivityRecord>> {
        let family = self.family_row(session)?;
        let task_ids: Vec<TaskId> = self
            .load::<TaskRow>(TASKS)?
            .into_iter()
            .filter(|t| t.family_id == family.id)
            .map(|t| t.id)
            .collect();
        let records: Vec<ActivityRecord> = self
            .load::<RecordRow>(RECORDS)?
            .into_iter()
            .filter(|r| task_ids.contains(&r.task_id))
            .map(ActivityRecord::from)
            .collect();
        for r in records.iter().filter(|r| r.day().is_none()) {
            warn!(record = %r.id, date = %r.date, "record has an unreadable date");
        }
        Ok(records)
    }

    /// Records completions for `date`.
    ///
    /// All entries are checked before anything is written: every task must
    /// belong to the family and not be done yet that day, and every
    /// completer must be one of its assignees. Any failure writes nothing.
    pub fn record_activity(
        &self,
        session: &Session,
        date: NaiveDate,
        entries: &[RecordEntry],
    ) -> Result<Vec<ActivityRecord>> {
        if entries.is_empty() {
            return Err(Error::NothingToRecord);
        }
        let family = self.family(session)?;
        let tasks = self.tasks(session)?;
        let existing = self.records(session)?;

        let mut new_rows: Vec<RecordRow> = Vec::new();
        for entry in entries {
            let task = tasks
                .iter()
                .find(|t| t.id == entry.task_id)
                .ok_or_else(|| Error::TaskNotFound(entry.task_id.short()))?;
            if entry.completed_by.is_empty() {
                return Err(Error::NothingToRecord);
            }
            if crate::completion::is_completed_for_date(&existing, task.id, date)
                || new_rows.iter().any(|r| r.task_id == task.id)
            {
                return Err(Error::AlreadyRecorded {
                    task: task.title.clone(),
                    date,
                });
            }
            for member in &entry.completed_by {
                let m = family
                    .member(*member)
                    .ok_or_else(|| Error::MemberNotFound(member.short()))?;
                if !task.is_assigned_to(m.id) {
                    return Err(Error::NotAssigned {
                        task: task.title.clone(),
                        member: m.name.clone(),
                    });
                }
                if new_rows.iter().any(|r| r.task_id == task.id && r.completed_by == m.id) {
                    continue;
                }
                new_rows.push(RecordRow {
                    id: RecordId::new(),
                    task_id: task.id,
                    completed_by: m.id,
                    completed_at: date.format("%Y-%m-%d").to_string(),
                });
            }
        }

        let mut rows = self.load::<RecordRow>(RECORDS)?;
        rows.extend(new_rows.iter().cloned());
        self.save(RECORDS, &rows)?;
        info!(count = new_rows.len(), %date, "recorded activity");
        Ok(new_rows.into_iter().map(ActivityRecord::from).collect())
    }

    /// Rewrites who completed a record, keeping its task and date.
    pub fn reassign_record(
        &self,
        session: &Session,
        id: RecordId,
        member: MemberId,
    ) -> Result<ActivityRecord> {
        let family = self.family(session)?;
        if family.member(member).is_none() {
            return Err(Error::MemberNotFound(member.short()));
        }
        self.own_record(session, id)?;
        let mut rows = self.load::<RecordRow>(RECORDS)?;
        let row = rows
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| Error::RecordNotFound(id.short()))?;
        row.completed_by = member;
        let updated = ActivityRecord::from(row.clone());
        self.save(RECORDS, &rows)?;
        info!(record = %id, "reassigned record");
        Ok(updated)
    }

    pub fn delete_record(&self, session: &Session, id: RecordId) -> Result<()> {
        self.own_record(session, id)?;
        let mut rows = self.load::<RecordRow>(RECORDS)?;
        rows.retain(|r| r.id != id);
        self.save(RECORDS, &rows)?;
        info!(record = %id, "deleted record");
        Ok(())
    }

    fn own_record(&self, session: &Session, id: RecordId) -> Result<ActivityRecord> {
        self.records(session)?
            .into_iter()
            .find(|r| r.id == id)
            .ok_or_else(|| Error::RecordNotFound(id.short()))
    }

    /// Deletes every data file, including temp files left by failed writes.
    pub fn reset(&self) -> Result<()> {
        for table in TABLES {
            let path = self.dir.join(table);
            for file in [path.with_extension("json.tmp"), path] {
                if file.is_file() {
                    fs::remove_file(file)?;
                }
            }
        }
        info!(dir = %self.dir.display(), "reset store");
        Ok(())
    }
}

fn non_empty(value: &str, what: &'static str) -> Result<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(Error::Empty(what));
    }
    Ok(value.to_string())
}

fn role_or_default(role: &str) -> String {
    let role = role.trim();
    if role.is_empty() { "member".to_string() } else { role.to_string() }
}

/// Checks that every assignee belongs to the family and drops repeats.
fn checked_assignees(family: &Family, members: Vec<MemberId>) -> Result<Vec<MemberId>> {
    let mut out: Vec<MemberId> = Vec::new();
    for m in members {
        if family.member(m).is_none() {
            return Err(Error::MemberNotFound(m.short()));
        }
        if !out.contains(&m) {
            out.push(m);
        }
    }
    if out.is_empty() {
        return Err(Error::InvalidTask("assign the task to at least one family member".into()));
    }
    Ok(out)
}

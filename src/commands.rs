use std::io::{self, Write};

use chrono::NaiveDate;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, Color, ContentArrangement, Table};
use uuid::Uuid;

use crate::completion::{completed_by_on, filter_by_status, is_completed_for_date, StatusFilter};
use crate::error::{Error, Result};
use crate::grouping::{group, GroupBy, GroupKey, INDIVIDUAL_TASKS, SHARED_TASKS};
use crate::models::{
    today, ActivityRecord, Family, Frequency, MemberId, Priority, RecordId, Schedule, Task, TaskId,
};
use crate::session::Session;
use crate::storage::{NewMember, NewTask, RecordEntry, Store, TaskPatch};
use crate::trends::{build_series, TrendWindow};

/// Task fields as typed on the command line. Unset fields are `None`.
#[derive(Debug, Clone, Default)]
pub struct TaskFields {
    pub title: Option<String>,
    pub priority: Option<Priority>,
    pub frequency: Option<Frequency>,
    pub custom_days: Option<u32>,
    pub due: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
    /// Member names.
    pub assign: Vec<String>,
}

impl TaskFields {
    fn touches_schedule(&self) -> bool {
        self.frequency.is_some()
            || self.custom_days.is_some()
            || self.due.is_some()
            || self.start.is_some()
            || self.end.is_some()
    }

    /// Builds a schedule, falling back to `current` for anything not given.
    fn schedule(&self, current: Option<&Schedule>) -> Result<Schedule> {
        let frequency = self
            .frequency
            .or(current.map(|s| s.frequency()))
            .unwrap_or(Frequency::Once);
        let due = parse_opt_date(self.due.as_deref())?
            .or(current.and_then(|s| s.due_date()));
        let start = parse_opt_date(self.start.as_deref())?
            .or(current.and_then(|s| s.start_date()))
            .or(current.and_then(|s| s.due_date()));
        let end = parse_opt_date(self.end.as_deref())?
            .or(current.and_then(|s| s.end_date()));
        let custom_days = self.custom_days.or(current.and_then(|s| s.custom_days()));
        Schedule::new(frequency, custom_days, due, start, end)
    }
}

/// Parses a `YYYY-MM-DD` date.
pub fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|_| Error::InvalidDate(s.to_string()))
}

fn parse_opt_date(s: Option<&str>) -> Result<Option<NaiveDate>> {
    s.map(parse_date).transpose()
}

/// Whether `key` is the full id or an unambiguous leading part of it.
fn id_matches(id: &Uuid, key: &str) -> bool {
    let key = key.trim().to_lowercase().replace('-', "");
    !key.is_empty() && id.simple().to_string().starts_with(&key)
}

/// Finds the single item whose id starts with `key`.
fn resolve<'a, T>(
    items: &'a [T],
    key: &str,
    id: impl Fn(&T) -> &Uuid,
    not_found: impl FnOnce(String) -> Error,
) -> Result<&'a T> {
    let mut hits = items.iter().filter(|item| id_matches(id(item), key));
    match (hits.next(), hits.next()) {
        (Some(item), None) => Ok(item),
        (Some(_), Some(_)) => Err(Error::AmbiguousId(key.to_string())),
        (None, _) => Err(not_found(key.to_string())),
    }
}

pub fn resolve_task<'a>(tasks: &'a [Task], key: &str) -> Result<&'a Task> {
    resolve(tasks, key, |t| &t.id.0, Error::TaskNotFound)
}

pub fn resolve_record<'a>(records: &'a [ActivityRecord], key: &str) -> Result<&'a ActivityRecord> {
    resolve(records, key, |r| &r.id.0, Error::RecordNotFound)
}

/// Looks up members by display name.
pub fn resolve_members(family: &Family, names: &[String]) -> Result<Vec<MemberId>> {
    names
        .iter()
        .flat_map(|n| n.split(','))
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(|n| {
            family
                .member_by_name(n)
                .map(|m| m.id)
                .ok_or_else(|| Error::MemberNotFound(n.to_string()))
        })
        .collect()
}

fn bold(text: &str) -> Cell {
    Cell::new(text).add_attribute(Attribute::Bold)
}

fn new_table(headers: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(headers.iter().map(|h| bold(h)).collect::<Vec<_>>());
    table
}

fn priority_color(p: Priority) -> Color {
    match p {
        Priority::High => Color::Red,
        Priority::Medium => Color::Yellow,
        Priority::Low => Color::Green,
    }
}

// ---- family ----

/// Creates the user's family. Members are given as `Name` or `Name:role`.
pub fn cmd_family_create(
    store: &Store,
    session: &Session,
    name: String,
    members: Vec<String>,
    silent: bool,
) -> Result<()> {
    let members: Vec<NewMember> = members
        .iter()
        .map(|m| match m.split_once(':') {
            Some((name, role)) => NewMember {
                name: name.into(),
                role: role.into(),
            },
            None => NewMember {
                name: m.clone(),
                role: String::new(),
            },
        })
        .collect();
    let family = store.create_family(session, &name, &members)?;
    if !silent {
        println!(
            "Family '{}' created with {} member(s).",
            family.name,
            family.members.len()
        );
    }
    Ok(())
}

pub fn cmd_family_show(store: &Store, session: &Session) -> Result<()> {
    let family = store.family(session)?;
    let tasks = store.tasks(session)?;
    println!("{}", family.name);
    if family.members.is_empty() {
        println!("No family members yet.");
        return Ok(());
    }
    let mut table = new_table(&["ID", "Name", "Role", "Tasks"]);
    for m in &family.members {
        let count = tasks.iter().filter(|t| t.is_assigned_to(m.id)).count();
        table.add_row(vec![
            Cell::new(m.id.short()),
            Cell::new(&m.name),
            Cell::new(&m.role),
            Cell::new(count),
        ]);
    }
    println!("{table}");
    Ok(())
}

pub fn cmd_family_rename(
    store: &Store,
    session: &Session,
    name: String,
    silent: bool,
) -> Result<()> {
    store.rename_family(session, &name)?;
    if !silent {
        println!("Family renamed to '{}'.", name.trim());
    }
    Ok(())
}

pub fn cmd_member_add(
    store: &Store,
    session: &Session,
    name: String,
    role: Option<String>,
    silent: bool,
) -> Result<()> {
    let member = store.add_member(session, &name, role.as_deref().unwrap_or(""))?;
    if !silent {
        println!("Added {} ({}).", member.name, member.role);
    }
    Ok(())
}

pub fn cmd_member_rename(
    store: &Store,
    session: &Session,
    name: String,
    new_name: String,
    silent: bool,
) -> Result<()> {
    let family = store.family(session)?;
    let member = family
        .member_by_name(&name)
        .ok_or_else(|| Error::MemberNotFound(name.clone()))?;
    store.rename_member(session, member.id, &new_name)?;
    if !silent {
        println!("{} is now called {}.", name, new_name.trim());
    }
    Ok(())
}

/// Removes a member, then deletes any task that lost its last assignee.
pub fn cmd_member_remove(
    store: &Store,
    session: &Session,
    name: String,
    silent: bool,
) -> Result<()> {
    let family = store.family(session)?;
    let member = family
        .member_by_name(&name)
        .ok_or_else(|| Error::MemberNotFound(name.clone()))?;
    store.remove_member(session, member.id)?;
    let orphaned = store.cleanup_orphaned_tasks(session)?;
    if !silent {
        println!("{} removed.", member.name);
        if orphaned > 0 {
            println!("Cleaned up {} task(s) without assignments.", orphaned);
        }
    }
    Ok(())
}

// ---- tasks ----

/// Adds a task. Returns its id.
pub fn cmd_task_add(
    store: &Store,
    session: &Session,
    fields: TaskFields,
    silent: bool,
) -> Result<TaskId> {
    let family = store.family(session)?;
    let schedule = fields.schedule(None)?;
    let task = store.create_task(
        session,
        NewTask {
            title: fields.title.clone().unwrap_or_default(),
            priority: fields.priority.unwrap_or(Priority::Medium),
            schedule,
            assigned_to: resolve_members(&family, &fields.assign)?,
        },
    )?;
    if !silent {
        println!("Task added (id = {})", task.id.short());
    }
    Ok(task.id)
}

/// Edits a task. Only the given fields change; `assign` replaces all assignees.
pub fn cmd_task_edit(
    store: &Store,
    session: &Session,
    id: String,
    fields: TaskFields,
    silent: bool,
) -> Result<()> {
    let family = store.family(session)?;
    let tasks = store.tasks(session)?;
    let task = resolve_task(&tasks, &id)?;

    let schedule = if fields.touches_schedule() {
        Some(fields.schedule(Some(&task.schedule))?)
    } else {
        None
    };
    let assigned_to = if fields.assign.is_empty() {
        None
    } else {
        Some(resolve_members(&family, &fields.assign)?)
    };
    let patch = TaskPatch {
        title: fields.title.clone(),
        priority: fields.priority,
        schedule,
        assigned_to,
    };
    store.update_task(session, task.id, patch)?;
    if !silent {
        println!("Task {} updated.", task.id.short());
    }
    Ok(())
}

pub fn cmd_task_remove(
    store: &Store,
    session: &Session,
    id: String,
    silent: bool,
) -> Result<()> {
    let tasks = store.tasks(session)?;
    let task = resolve_task(&tasks, &id)?;
    store.delete_task(session, task.id)?;
    if !silent {
        println!("Task {} removed.", task.id.short());
    }
    Ok(())
}

pub fn cmd_task_cleanup(store: &Store, session: &Session, silent: bool) -> Result<usize> {
    let removed = store.cleanup_orphaned_tasks(session)?;
    if !silent {
        if removed == 0 {
            println!("Every task has someone assigned.");
        } else {
            println!("Cleaned up {} task(s) without assignments.", removed);
        }
    }
    Ok(removed)
}

/// Lists tasks in sections, either per member or shared vs individual.
pub fn cmd_task_list(store: &Store, session: &Session, group_by: GroupBy) -> Result<()> {
    let family = store.family(session)?;
    let tasks = store.tasks(session)?;
    if tasks.is_empty() {
        println!("No tasks found.");
        return Ok(());
    }

    let mut groups = group(&tasks, group_by);
    groups.sort_by_key(|g| match g.key {
        GroupKey::Member(m) => family.member_name(m).to_lowercase(),
        _ => String::new(),
    });

    for g in groups {
        let heading = match g.key {
            GroupKey::Member(m) => family.member_name(m).to_string(),
            GroupKey::Shared => SHARED_TASKS.to_string(),
            GroupKey::Individual => INDIVIDUAL_TASKS.to_string(),
        };
        println!("{} ({})", heading, g.tasks.len());
        if g.tasks.is_empty() {
            println!("  none");
            continue;
        }
        let mut table = new_table(&["ID", "Title", "Priority", "Schedule", "Assigned to"]);
        for t in g.tasks {
            table.add_row(vec![
                Cell::new(t.id.short()),
                Cell::new(&t.title),
                Cell::new(t.priority).fg(priority_color(t.priority)),
                Cell::new(t.schedule),
                Cell::new(family.member_names(&t.assigned_to)),
            ]);
        }
        println!("{table}");
    }
    Ok(())
}

// ---- records ----

/// Records that `by` completed a task on `date` (today if not given).
pub fn cmd_record_add(
    store: &Store,
    session: &Session,
    task: String,
    by: Vec<String>,
    date: Option<String>,
    silent: bool,
) -> Result<()> {
    let family = store.family(session)?;
    let tasks = store.tasks(session)?;
    let task = resolve_task(&tasks, &task)?;
    let date = match date {
        Some(d) => parse_date(&d)?,
        None => today(),
    };
    // A single-assignee task does not need --by.
    let completed_by = if by.is_empty() && task.assigned_to.len() == 1 {
        task.assigned_to.clone()
    } else {
        resolve_members(&family, &by)?
    };
    let entry = RecordEntry {
        task_id: task.id,
        completed_by,
    };
    let saved = store.record_activity(session, date, &[entry])?;
    if !silent {
        let ids: Vec<MemberId> = saved.iter().map(|r| r.completed_by).collect();
        println!(
            "'{}' done on {} by {}.",
            task.title,
            date,
            family.member_names(&ids)
        );
    }
    Ok(())
}

pub fn cmd_record_edit(
    store: &Store,
    session: &Session,
    id: String,
    by: String,
    silent: bool,
) -> Result<()> {
    let family = store.family(session)?;
    let records = store.records(session)?;
    let record = resolve_record(&records, &id)?;
    let member = family
        .member_by_name(&by)
        .ok_or_else(|| Error::MemberNotFound(by.clone()))?;
    store.reassign_record(session, record.id, member.id)?;
    if !silent {
        println!(
            "Record {} now credited to {}.",
            record.id.short(),
            member.name
        );
    }
    Ok(())
}

pub fn cmd_record_remove(
    store: &Store,
    session: &Session,
    id: String,
    silent: bool,
) -> Result<RecordId> {
    let records = store.records(session)?;
    let record = resolve_record(&records, &id)?;
    store.delete_record(session, record.id)?;
    if !silent {
        println!("Record {} removed.", record.id.short());
    }
    Ok(record.id)
}

/// Shows every completion, newest first.
pub fn cmd_history(store: &Store, session: &Session) -> Result<()> {
    let family = store.family(session)?;
    let tasks = store.tasks(session)?;
    let mut records = store.records(session)?;
    if records.is_empty() {
        println!("No activity records yet.");
        return Ok(());
    }
    records.sort_by(|a, b| b.day().cmp(&a.day()));

    let mut table = new_table(&["ID", "Date", "Task", "Completed by"]);
    for r in &records {
        let title = tasks
            .iter()
            .find(|t| t.id == r.task_id)
            .map(|t| t.title.as_str())
            .unwrap_or("Unknown task");
        let date = match r.day() {
            Some(d) => Cell::new(d.format("%a %b %d, %Y")),
            None => Cell::new(&r.date).fg(Color::Red),
        };
        table.add_row(vec![
            Cell::new(r.id.short()),
            date,
            Cell::new(title),
            Cell::new(family.member_name(r.completed_by)),
        ]);
    }
    println!("{table}");
    Ok(())
}

/// Shows which tasks are done on `date`.
pub fn cmd_status(
    store: &Store,
    session: &Session,
    date: Option<String>,
    show: StatusFilter,
) -> Result<()> {
    let family = store.family(session)?;
    let tasks = store.tasks(session)?;
    let records = store.records(session)?;
    let date = match date {
        Some(d) => parse_date(&d)?,
        None => today(),
    };

    let shown = filter_by_status(&tasks, &records, date, show);
    println!("{} ({} tasks)", date.format("%A %B %d, %Y"), show);
    if shown.is_empty() {
        println!("No tasks available.");
        return Ok(());
    }

    let mut table = new_table(&["ID", "Title", "Assigned to", "Status", "Completed by"]);
    for t in shown {
        let done = is_completed_for_date(&records, t.id, date);
        let (status, color) = if done {
            ("Done", Color::Green)
        } else {
            ("Pending", Color::Yellow)
        };
        table.add_row(vec![
            Cell::new(t.id.short()),
            Cell::new(&t.title),
            Cell::new(family.member_names(&t.assigned_to)),
            Cell::new(status).fg(color),
            Cell::new(family.member_names(&completed_by_on(&records, t.id, date))),
        ]);
    }
    println!("{table}");
    Ok(())
}

/// Prints the completion trend ending on `today`.
pub fn cmd_trends(store: &Store, session: &Session, window: TrendWindow) -> Result<()> {
    let records = store.records(session)?;
    let series = build_series(&records, window, today());

    let mut table = new_table(&["Date", "Completed", ""]);
    for p in &series {
        table.add_row(vec![
            Cell::new(&p.date),
            Cell::new(p.completed),
            Cell::new("█".repeat(p.completed)).fg(Color::Cyan),
        ]);
    }
    println!("Task completion trends ({})", window);
    println!("{table}");
    Ok(())
}

/// Resets the store by deleting every data file.
pub fn cmd_reset(store: &Store, force: bool) -> Result<()> {
    if !force {
        print!(
            "Are you sure you want to delete all families, tasks and records? \
             This cannot be undone. [y/N] "
        );
        io::stdout().flush()?;
        let mut input = String::new();
        io::stdin().read_line(&mut input)?;
        if input.trim().to_lowercase() != "y" {
            println!("Aborted.");
            return Ok(());
        }
    }
    store.reset()?;
    println!("Database reset successfully.");
    Ok(())
}

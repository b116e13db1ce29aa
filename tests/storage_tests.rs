use std::env;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use chrono::NaiveDate;

use chorelog::error::Error;
use chorelog::models::{MemberId, Priority, Schedule, TaskId};
use chorelog::session::Session;
use chorelog::storage::{data_dir, NewMember, NewTask, RecordEntry, Store, TaskPatch};
use chorelog::trends::{build_series, TrendWindow};

// Serialises tests that touch CHORELOG_DIR
static ENV_MUTEX: Mutex<()> = Mutex::new(());

fn day(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

fn test_store(test_name: &str) -> Store {
    let mut dir = env::temp_dir();
    dir.push(format!("chorelog_storage_test_{}", test_name));
    if dir.exists() {
        fs::remove_dir_all(&dir).unwrap();
    }
    Store::at(dir).unwrap()
}

fn member(name: &str, role: &str) -> NewMember {
    NewMember {
        name: name.into(),
        role: role.into(),
    }
}

/// A store with the Smith family (Alice, Bob) owned by "sam".
fn smiths(test_name: &str) -> (Store, Session, MemberId, MemberId) {
    let store = test_store(test_name);
    let session = Session::new("sam").unwrap();
    let family = store
        .create_family(&session, "Smiths", &[member("Alice", "parent"), member("Bob", "child")])
        .unwrap();
    let alice = family.member_by_name("alice").unwrap().id;
    let bob = family.member_by_name("Bob").unwrap().id;
    (store, session, alice, bob)
}

/// Makes the next write of `table` fail by putting a directory where its
/// temp file goes.
fn block_writes(store: &Store, table: &str) -> PathBuf {
    let blocker = store.dir().join(format!("{}.tmp", table));
    fs::create_dir_all(&blocker).unwrap();
    blocker
}

fn done(task_id: TaskId, completed_by: Vec<MemberId>) -> RecordEntry {
    RecordEntry {
        task_id,
        completed_by,
    }
}

fn once(title: &str, assigned_to: Vec<MemberId>) -> NewTask {
    NewTask {
        title: title.into(),
        priority: Priority::High,
        schedule: Schedule::Once {
            due: day("2024-05-10"),
        },
        assigned_to,
    }
}

#[test]
fn test_family_is_scoped_to_its_owner() {
    let (store, session, _, _) = smiths("scoped");
    let family = store.family(&session).unwrap();
    assert_eq!(family.name, "Smiths");
    assert_eq!(family.members.len(), 2);
    assert_eq!(family.created_by, "sam");

    let stranger = Session::new("eve").unwrap();
    assert!(matches!(store.family(&stranger), Err(Error::FamilyNotFound)));
    assert!(matches!(store.tasks(&stranger), Err(Error::FamilyNotFound)));
    assert!(matches!(store.create_family(&session, "Again", &[]), Err(Error::FamilyExists)));
}

#[test]
fn test_writes_cannot_reach_another_family() {
    let (store, sam, alice, _) = smiths("cross_family");
    let dishes = store.create_task(&sam, once("Dishes", vec![alice])).unwrap();
    let saved = store
        .record_activity(&sam, day("2024-05-01"), &[done(dishes.id, vec![alice])])
        .unwrap();
    let record = saved[0].id;

    let eve = Session::new("eve").unwrap();
    let joneses = store.create_family(&eve, "Joneses", &[member("Dana", "parent")]).unwrap();
    let dana = joneses.members[0].id;

    let patch = TaskPatch {
        title: Some("Hijacked".into()),
        ..Default::default()
    };
    assert!(matches!(store.update_task(&eve, dishes.id, patch), Err(Error::TaskNotFound(_))));
    assert!(matches!(store.delete_task(&eve, dishes.id), Err(Error::TaskNotFound(_))));
    assert!(matches!(store.reassign_record(&eve, record, dana), Err(Error::RecordNotFound(_))));
    assert!(matches!(store.reassign_record(&eve, record, alice), Err(Error::MemberNotFound(_))));
    assert!(matches!(store.delete_record(&eve, record), Err(Error::RecordNotFound(_))));
    let entry = done(dishes.id, vec![dana]);
    assert!(matches!(
        store.record_activity(&eve, day("2024-05-02"), &[entry]),
        Err(Error::TaskNotFound(_))
    ));
    assert_eq!(store.cleanup_orphaned_tasks(&eve).unwrap(), 0);

    // The Smiths' data is untouched
    let tasks = store.tasks(&sam).unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0], dishes);
    let records = store.records(&sam).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].id, record);
    assert_eq!(records[0].completed_by, alice);
    assert_eq!(records[0].date, "2024-05-01");

    assert!(store.tasks(&eve).unwrap().is_empty());
    assert!(store.records(&eve).unwrap().is_empty());
}

#[test]
fn test_duplicate_member_names_are_refused() {
    let store = test_store("dup_members");
    let session = Session::new("sam").unwrap();
    let res = store.create_family(&session, "Smiths", &[member("Alice", ""), member("alice", "")]);
    assert!(matches!(res, Err(Error::DuplicateMember(_))));

    let (store, session, _, _) = smiths("dup_members_add");
    assert!(matches!(store.add_member(&session, "BOB", "child"), Err(Error::DuplicateMember(_))));
    let carol = store.add_member(&session, "Carol", "").unwrap();
    assert_eq!(carol.role, "member");
}

#[test]
fn test_create_and_load_task() {
    let (store, session, alice, bob) = smiths("create_task");
    let weekly = Schedule::new(
        chorelog::models::Frequency::Weekly,
        None,
        None,
        Some(day("2024-05-01")),
        Some(day("2024-06-30")),
    )
    .unwrap();
    let created = store
        .create_task(
            &session,
            NewTask {
                title: "Vacuum".into(),
                priority: Priority::Low,
                schedule: weekly,
                assigned_to: vec![bob, alice, bob],
            },
        )
        .unwrap();
    assert_eq!(created.assigned_to, vec![bob, alice]);

    let tasks = store.tasks(&session).unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0], created);
    assert!(tasks[0].is_shared());
}

#[test]
fn test_task_needs_known_assignees() {
    let (store, session, _, _) = smiths("assignees");
    let nobody = store.create_task(&session, once("Nobody", vec![]));
    assert!(matches!(nobody, Err(Error::InvalidTask(_))));
    assert!(matches!(
        store.create_task(&session, once("Ghost", vec![MemberId::new()])),
        Err(Error::MemberNotFound(_))
    ));
    let blank = store.create_task(&session, once("  ", vec![MemberId::new()]));
    assert!(matches!(blank, Err(Error::Empty(_))));
    assert!(store.tasks(&session).unwrap().is_empty());
}

#[test]
fn test_update_task() {
    let (store, session, alice, bob) = smiths("update_task");
    let task = store.create_task(&session, once("Dishes", vec![alice])).unwrap();

    let updated = store
        .update_task(
            &session,
            task.id,
            TaskPatch {
                title: Some("Wash dishes".into()),
                assigned_to: Some(vec![bob]),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(updated.title, "Wash dishes");
    assert_eq!(updated.priority, Priority::High);

    let loaded = store.task(&session, task.id).unwrap();
    assert_eq!(loaded.assigned_to, vec![bob]);
    let due = day("2024-05-10");
    assert_eq!(loaded.schedule, Schedule::Once { due });
}

#[test]
fn test_renaming_a_member_keeps_links() {
    let (store, session, alice, _) = smiths("rename_member");
    let task = store.create_task(&session, once("Dishes", vec![alice])).unwrap();
    store
        .record_activity(&session, day("2024-05-01"), &[done(task.id, vec![alice])])
        .unwrap();

    store.rename_member(&session, alice, "Ally").unwrap();

    let family = store.family(&session).unwrap();
    assert_eq!(family.member_name(alice), "Ally");
    assert!(store.task(&session, task.id).unwrap().is_assigned_to(alice));
    assert_eq!(store.records(&session).unwrap()[0].completed_by, alice);
}

#[test]
fn test_record_activity_for_shared_task() {
    let (store, session, alice, bob) = smiths("record_shared");
    let task = store.create_task(&session, once("Laundry", vec![alice, bob])).unwrap();

    let saved = store
        .record_activity(&session, day("2024-05-01"), &[done(task.id, vec![alice, bob])])
        .unwrap();
    assert_eq!(saved.len(), 2);
    assert!(saved.iter().all(|r| r.date == "2024-05-01" && r.completed));

    // Recording the same task again that day is refused
    let again = store.record_activity(&session, day("2024-05-01"), &[done(task.id, vec![bob])]);
    assert!(matches!(again, Err(Error::AlreadyRecorded { .. })));

    let records = store.records(&session).unwrap();
    let series = build_series(&records, TrendWindow::Week, day("2024-05-01"));
    assert_eq!(series.last().unwrap().completed, 1);
}

#[test]
fn test_record_activity_is_all_or_nothing() {
    let (store, session, alice, bob) = smiths("all_or_nothing");
    let dishes = store.create_task(&session, once("Dishes", vec![alice])).unwrap();
    let trash = store.create_task(&session, once("Trash", vec![bob])).unwrap();

    let res = store.record_activity(
        &session,
        day("2024-05-01"),
        &[
            done(dishes.id, vec![alice]),
            done(trash.id, vec![alice]),
        ],
    );
    assert!(matches!(res, Err(Error::NotAssigned { .. })));
    assert!(store.records(&session).unwrap().is_empty());

    let empty = store.record_activity(&session, day("2024-05-01"), &[]);
    assert!(matches!(empty, Err(Error::NothingToRecord)));
    let nobody = store.record_activity(&session, day("2024-05-01"), &[done(dishes.id, vec![])]);
    assert!(matches!(nobody, Err(Error::NothingToRecord)));
}

#[test]
fn test_reassign_and_delete_record() {
    let (store, session, alice, bob) = smiths("reassign");
    let task = store.create_task(&session, once("Laundry", vec![alice, bob])).unwrap();
    let saved = store
        .record_activity(&session, day("2024-05-01"), &[done(task.id, vec![alice])])
        .unwrap();
    let id = saved[0].id;

    let updated = store.reassign_record(&session, id, bob).unwrap();
    assert_eq!(updated.completed_by, bob);
    assert_eq!(updated.date, "2024-05-01");
    let stranger = store.reassign_record(&session, id, MemberId::new());
    assert!(matches!(stranger, Err(Error::MemberNotFound(_))));

    store.delete_record(&session, id).unwrap();
    assert!(store.records(&session).unwrap().is_empty());
    assert!(matches!(store.delete_record(&session, id), Err(Error::RecordNotFound(_))));
}

#[test]
fn test_delete_task_cascades() {
    let (store, session, alice, _) = smiths("delete_task");
    let task = store.create_task(&session, once("Dishes", vec![alice])).unwrap();
    store
        .record_activity(&session, day("2024-05-01"), &[done(task.id, vec![alice])])
        .unwrap();

    store.delete_task(&session, task.id).unwrap();
    assert!(store.tasks(&session).unwrap().is_empty());
    assert!(store.records(&session).unwrap().is_empty());
    let assignments = fs::read_to_string(store.dir().join("task_assignments.json")).unwrap();
    assert!(!assignments.contains(&task.id.to_string()));
    assert!(matches!(store.delete_task(&session, task.id), Err(Error::TaskNotFound(_))));
}

#[test]
fn test_remove_member_then_cleanup() {
    let (store, session, alice, bob) = smiths("remove_member");
    let dishes = store.create_task(&session, once("Dishes", vec![alice])).unwrap();
    let laundry = store.create_task(&session, once("Laundry", vec![alice, bob])).unwrap();
    store
        .record_activity(&session, day("2024-05-01"), &[done(laundry.id, vec![alice, bob])])
        .unwrap();

    store.remove_member(&session, alice).unwrap();

    // Dishes has nobody left and is skipped until cleaned up
    let tasks = store.tasks(&session).unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].assigned_to, vec![bob]);
    assert_eq!(store.records(&session).unwrap().len(), 1);

    assert_eq!(store.cleanup_orphaned_tasks(&session).unwrap(), 1);
    assert_eq!(store.cleanup_orphaned_tasks(&session).unwrap(), 0);
    assert!(matches!(store.task(&session, dishes.id), Err(Error::TaskNotFound(_))));
}

#[test]
fn test_failed_write_keeps_the_previous_table() {
    let (store, session, alice, _) = smiths("failed_write");
    let task = store.create_task(&session, once("Dishes", vec![alice])).unwrap();
    store
        .record_activity(&session, day("2024-05-01"), &[done(task.id, vec![alice])])
        .unwrap();

    let blocker = block_writes(&store, "tasks.json");
    assert!(matches!(store.delete_task(&session, task.id), Err(Error::Io(_))));
    fs::remove_dir(&blocker).unwrap();

    assert_eq!(store.tasks(&session).unwrap(), vec![task]);
    assert_eq!(store.records(&session).unwrap().len(), 1);
}

#[test]
fn test_interrupted_task_delete_leaves_no_visible_rows() {
    let (store, session, alice, _) = smiths("interrupted_delete");
    let task = store.create_task(&session, once("Dishes", vec![alice])).unwrap();
    store
        .record_activity(&session, day("2024-05-01"), &[done(task.id, vec![alice])])
        .unwrap();

    // The task table is saved, its records are not
    let blocker = block_writes(&store, "task_records.json");
    assert!(matches!(store.delete_task(&session, task.id), Err(Error::Io(_))));
    fs::remove_dir(&blocker).unwrap();

    assert!(store.tasks(&session).unwrap().is_empty());
    assert!(store.records(&session).unwrap().is_empty());
    let records = store.records(&session).unwrap();
    let series = build_series(&records, TrendWindow::Week, day("2024-05-01"));
    assert_eq!(series.last().unwrap().completed, 0);
}

#[test]
fn test_cleanup_repairs_interrupted_member_removal() {
    let (store, session, alice, bob) = smiths("interrupted_remove");
    let laundry = store.create_task(&session, once("Laundry", vec![alice, bob])).unwrap();
    let trash = store.create_task(&session, once("Trash", vec![bob])).unwrap();
    store
        .record_activity(&session, day("2024-05-01"), &[done(laundry.id, vec![bob])])
        .unwrap();

    // Bob leaves the member table but his assignments and records stay
    let blocker = block_writes(&store, "task_assignments.json");
    assert!(matches!(store.remove_member(&session, bob), Err(Error::Io(_))));
    fs::remove_dir(&blocker).unwrap();
    assert!(store.family(&session).unwrap().member(bob).is_none());

    assert_eq!(store.cleanup_orphaned_tasks(&session).unwrap(), 1);
    let tasks = store.tasks(&session).unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].id, laundry.id);
    assert_eq!(tasks[0].assigned_to, vec![alice]);
    assert!(matches!(store.task(&session, trash.id), Err(Error::TaskNotFound(_))));
    assert!(store.records(&session).unwrap().is_empty());
    assert_eq!(store.cleanup_orphaned_tasks(&session).unwrap(), 0);
}

#[test]
fn test_invalid_rows_are_skipped_not_fatal() {
    let (store, session, alice, _) = smiths("invalid_rows");
    let task = store.create_task(&session, once("Dishes", vec![alice])).unwrap();
    let family = store.family(&session).unwrap();

    // A once task without a due date cannot be loaded
    let tasks_path = store.dir().join("tasks.json");
    let raw = fs::read_to_string(&tasks_path).unwrap();
    let mut rows: Vec<serde_json::Value> = serde_json::from_str(&raw).unwrap();
    rows.push(serde_json::json!({
        "id": "6f1c2f8e-5c5b-4c61-9a55-0c8f6ad1c2aa",
        "family_id": family.id,
        "title": "Broken",
        "priority": "low",
        "frequency": "once"
    }));
    fs::write(&tasks_path, serde_json::to_string(&rows).unwrap()).unwrap();

    // A record with an unreadable day still loads but counts nowhere
    let records_path = store.dir().join("task_records.json");
    let bad_record = serde_json::json!([{
        "id": "0d6f0f0a-93a8-4b8e-8a8e-3b1d7c0e4f11",
        "task_id": task.id,
        "completed_by": alice,
        "completed_at": "not-a-date"
    }]);
    fs::write(&records_path, bad_record.to_string()).unwrap();

    let tasks = store.tasks(&session).unwrap();
    assert_eq!(tasks.len(), 1);
    let records = store.records(&session).unwrap();
    assert_eq!(records.len(), 1);
    assert!(records[0].day().is_none());
    let series = build_series(&records, TrendWindow::Month, day("2024-05-01"));
    assert!(series.iter().all(|p| p.completed == 0));
}

#[test]
fn test_corrupt_file_is_an_error() {
    let (store, session, _, _) = smiths("corrupt");
    fs::write(store.dir().join("tasks.json"), "{ not json").unwrap();
    assert!(matches!(store.tasks(&session), Err(Error::Json(_))));
}

#[test]
fn test_reset_removes_everything() {
    let (store, session, alice, _) = smiths("reset");
    store.create_task(&session, once("Dishes", vec![alice])).unwrap();
    store.reset().unwrap();
    assert!(matches!(store.family(&session), Err(Error::FamilyNotFound)));
    assert_eq!(fs::read_dir(store.dir()).unwrap().count(), 0);
}

#[test]
fn test_data_dir_from_env() {
    let _guard = ENV_MUTEX.lock().unwrap();
    let dir: PathBuf = env::temp_dir().join("chorelog_storage_env");
    env::set_var("CHORELOG_DIR", &dir);
    assert_eq!(data_dir(), dir);
    env::remove_var("CHORELOG_DIR");
}

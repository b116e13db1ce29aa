use chorelog::commands::*;
use chorelog::error::Error;
use chorelog::completion::StatusFilter;
use chorelog::grouping::GroupBy;
use chorelog::models::{today, Frequency, Priority};
use chorelog::session::Session;
use chorelog::storage::Store;
use chorelog::trends::TrendWindow;
use std::env;
use std::fs;

fn with_test_store<F>(test_name: &str, f: F)
where
    F: FnOnce(&Store, &Session),
{
    let mut dir = env::temp_dir();
    dir.push(format!("chorelog_test_{}", test_name));

    // Clean up before test
    if dir.exists() {
        fs::remove_dir_all(&dir).unwrap();
    }

    let store = Store::at(&dir).unwrap();
    let session = Session::new("tester").unwrap();
    cmd_family_create(
        &store,
        &session,
        "Test Family".into(),
        vec!["Alice:parent".into(), "Bob".into()],
        true,
    )
    .unwrap();

    // Run test
    f(&store, &session);

    // Clean up after test
    if dir.exists() {
        fs::remove_dir_all(&dir).unwrap();
    }
}

fn chore(title: &str, assign: &[&str]) -> TaskFields {
    TaskFields {
        title: Some(title.into()),
        due: Some("2025-12-01".into()),
        assign: assign.iter().map(|s| s.to_string()).collect(),
        ..Default::default()
    }
}

#[test]
fn test_family_create_parses_roles() {
    with_test_store("family_roles", |store, session| {
        let family = store.family(session).unwrap();
        assert_eq!(family.name, "Test Family");
        assert_eq!(family.member_by_name("alice").unwrap().role, "parent");
        assert_eq!(family.member_by_name("bob").unwrap().role, "member");
    });
}

#[test]
fn test_add_and_list() {
    with_test_store("add_list", |store, session| {
        let id = cmd_task_add(store, session, chore("Test Task", &["Alice"]), true).unwrap();

        let tasks = store.tasks(session).unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].id, id);
        assert_eq!(tasks[0].title, "Test Task");
        assert_eq!(tasks[0].priority, Priority::Medium);

        cmd_task_list(store, session, GroupBy::Individual).unwrap();
        cmd_task_list(store, session, GroupBy::Shared).unwrap();
    });
}

#[test]
fn test_add_recurring_task_with_comma_separated_assignees() {
    with_test_store("add_recurring", |store, session| {
        let fields = TaskFields {
            title: Some("Vacuum".into()),
            frequency: Some(Frequency::Custom),
            custom_days: Some(3),
            start: Some("2025-01-01".into()),
            end: Some("2025-03-31".into()),
            assign: vec!["Alice, Bob".into()],
            ..Default::default()
        };
        cmd_task_add(store, session, fields, true).unwrap();

        let task = &store.tasks(session).unwrap()[0];
        assert!(task.is_shared());
        assert_eq!(task.schedule.custom_days(), Some(3));
    });
}

#[test]
fn test_add_rejects_bad_input() {
    with_test_store("add_bad", |store, session| {
        let mut bad_date = chore("Task", &["Alice"]);
        bad_date.due = Some("12/01/2025".into());
        assert!(matches!(cmd_task_add(store, session, bad_date, true), Err(Error::InvalidDate(_))));

        let stranger = chore("Task", &["Zed"]);
        let res = cmd_task_add(store, session, stranger, true);
        assert!(matches!(res, Err(Error::MemberNotFound(_))));

        let no_window = TaskFields {
            title: Some("Daily".into()),
            frequency: Some(Frequency::Daily),
            assign: vec!["Alice".into()],
            ..Default::default()
        };
        let res = cmd_task_add(store, session, no_window, true);
        assert!(matches!(res, Err(Error::InvalidTask(_))));
        assert!(store.tasks(session).unwrap().is_empty());
    });
}

#[test]
fn test_edit_by_id_prefix() {
    with_test_store("edit_prefix", |store, session| {
        let id = cmd_task_add(store, session, chore("Dishes", &["Alice"]), true).unwrap();

        let fields = TaskFields {
            priority: Some(Priority::High),
            frequency: Some(Frequency::Weekly),
            end: Some("2026-01-31".into()),
            assign: vec!["Bob".into()],
            ..Default::default()
        };
        cmd_task_edit(store, session, id.short(), fields, true).unwrap();

        let task = store.task(session, id).unwrap();
        assert_eq!(task.priority, Priority::High);
        assert_eq!(task.title, "Dishes");
        // the old due date becomes the start of the window
        assert_eq!(task.schedule.start_date(), chrono::NaiveDate::from_ymd_opt(2025, 12, 1));
        assert_eq!(task.schedule.due_date(), None);
        let family = store.family(session).unwrap();
        assert_eq!(family.member_names(&task.assigned_to), "Bob");
    });
}

#[test]
fn test_remove_task() {
    with_test_store("remove_task", |store, session| {
        let id = cmd_task_add(store, session, chore("Dishes", &["Alice"]), true).unwrap();
        let res = cmd_task_remove(store, session, "zzzz".into(), true);
        assert!(matches!(res, Err(Error::TaskNotFound(_))));
        cmd_task_remove(store, session, id.to_string(), true).unwrap();
        assert!(store.tasks(session).unwrap().is_empty());
    });
}

#[test]
fn test_record_complete_task() {
    with_test_store("record", |store, session| {
        let id = cmd_task_add(store, session, chore("Dishes", &["Alice"]), true).unwrap();

        // single assignee: --by is optional
        let day = Some("2025-05-01".to_string());
        cmd_record_add(store, session, id.short(), vec![], day.clone(), true).unwrap();

        let records = store.records(session).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].date, "2025-05-01");

        let again = cmd_record_add(store, session, id.short(), vec!["Alice".into()], day, true);
        assert!(matches!(again, Err(Error::AlreadyRecorded { .. })));

        cmd_status(store, session, Some("2025-05-01".into()), StatusFilter::Completed).unwrap();
        cmd_history(store, session).unwrap();
    });
}

#[test]
fn test_record_shared_task_needs_completers() {
    with_test_store("record_shared", |store, session| {
        let id = cmd_task_add(store, session, chore("Laundry", &["Alice", "Bob"]), true).unwrap();

        let nobody = cmd_record_add(store, session, id.short(), vec![], None, true);
        assert!(matches!(nobody, Err(Error::NothingToRecord)));

        let both = vec!["Alice".into(), "Bob".into()];
        cmd_record_add(store, session, id.short(), both, None, true).unwrap();
        let records = store.records(session).unwrap();
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.day() == Some(today())));

        cmd_trends(store, session, TrendWindow::Week).unwrap();
    });
}

#[test]
fn test_record_edit_and_remove() {
    with_test_store("record_edit", |store, session| {
        let id = cmd_task_add(store, session, chore("Laundry", &["Alice", "Bob"]), true).unwrap();
        let day = Some("2025-05-01".to_string());
        cmd_record_add(store, session, id.short(), vec!["Alice".into()], day, true).unwrap();
        let record = store.records(session).unwrap()[0].clone();

        cmd_record_edit(store, session, record.id.short(), "Bob".into(), true).unwrap();
        let family = store.family(session).unwrap();
        let edited = &store.records(session).unwrap()[0];
        assert_eq!(family.member_name(edited.completed_by), "Bob");

        let removed = cmd_record_remove(store, session, record.id.short(), true).unwrap();
        assert_eq!(removed, record.id);
        assert!(store.records(session).unwrap().is_empty());
    });
}

#[test]
fn test_member_rename_and_remove() {
    with_test_store("members", |store, session| {
        let dishes = cmd_task_add(store, session, chore("Dishes", &["Bob"]), true).unwrap();
        let shared = chore("Laundry", &["Alice", "Bob"]);
        let laundry = cmd_task_add(store, session, shared, true).unwrap();

        cmd_member_rename(store, session, "Bob".into(), "Robert".into(), true).unwrap();
        let family = store.family(session).unwrap();
        let robert = family.member_by_name("Robert").unwrap().id;
        assert!(store.task(session, dishes).unwrap().is_assigned_to(robert));

        cmd_member_add(store, session, "Carol".into(), Some("child".into()), true).unwrap();
        cmd_member_remove(store, session, "Robert".into(), true).unwrap();

        let tasks = store.tasks(session).unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].id, laundry);
        assert_eq!(store.family(session).unwrap().members.len(), 2);
        assert!(matches!(
            cmd_member_remove(store, session, "Robert".into(), true),
            Err(Error::MemberNotFound(_))
        ));
    });
}

#[test]
fn test_cleanup_with_nothing_orphaned() {
    with_test_store("cleanup", |store, session| {
        cmd_task_add(store, session, chore("Dishes", &["Alice"]), true).unwrap();
        assert_eq!(cmd_task_cleanup(store, session, true).unwrap(), 0);
        cmd_family_rename(store, session, "Renamed".into(), true).unwrap();
        assert_eq!(store.family(session).unwrap().name, "Renamed");
    });
}

use chrono::{Duration, NaiveDate};
use ratatui::widgets::TableState;

use crate::completion::{filter_by_status, is_completed_for_date, StatusFilter};
use crate::error::Result;
use crate::grouping::{group, GroupBy, GroupKey, INDIVIDUAL_TASKS, SHARED_TASKS};
use crate::models::{today, ActivityRecord, Family, RecordId, Task, TaskId};
use crate::session::Session;
use crate::storage::{RecordEntry, Store};
use crate::trends::{build_series, TrendPoint, TrendWindow};

#[derive(PartialEq, Debug)]
pub enum InputMode {
    Normal,
    /// Typing who completed the task in `App::target`.
    CompletedBy,
}

/// The view currently on screen. Only one is ever open.
#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum View {
    Tasks,
    Recorder,
    History,
    Trends,
}

impl View {
    pub const ALL: [View; 4] = [View::Tasks, View::Recorder, View::History, View::Trends];

    pub fn title(self) -> &'static str {
        match self {
            View::Tasks => "Tasks",
            View::Recorder => "Record activity",
            View::History => "History",
            View::Trends => "Trends",
        }
    }
}

pub enum DisplayItem {
    Header(String, usize), // Heading, count
    Task(TaskId),
}

pub struct App {
    store: Store,
    session: Session,
    pub family: Family,
    pub tasks: Vec<Task>,
    pub records: Vec<ActivityRecord>,
    pub view: View,
    pub state: TableState,
    pub input_mode: InputMode,
    pub input_buffer: String,
    pub target: Option<TaskId>,
    pub group_by: GroupBy,
    pub filter: StatusFilter,
    pub window: TrendWindow,
    /// Day shown in the recorder.
    pub date: NaiveDate,
    /// Last outcome, shown in the footer.
    pub status: Option<String>,
}

impl App {
    /// Creates a new App and loads the session user's data.
    pub fn new(store: Store, session: Session) -> Result<App> {
        let family = store.family(&session)?;
        let mut app = App {
            store,
            session,
            family,
            tasks: Vec::new(),
            records: Vec::new(),
            view: View::Tasks,
            state: TableState::default(),
            input_mode: InputMode::Normal,
            input_buffer: String::new(),
            target: None,
            group_by: GroupBy::default(),
            filter: StatusFilter::default(),
            window: TrendWindow::default(),
            date: today(),
            status: None,
        };
        app.reload()?;
        Ok(app)
    }

    /// Reloads family, tasks and records from the store.
    pub fn reload(&mut self) -> Result<()> {
        self.family = self.store.family(&self.session)?;
        self.tasks = self.store.tasks(&self.session)?;
        self.records = self.store.records(&self.session)?;
        self.clamp_selection();
        Ok(())
    }

    /// Switches to `view`, closing whatever was open and dropping any input.
    pub fn open(&mut self, view: View) {
        self.view = view;
        self.input_mode = InputMode::Normal;
        self.input_buffer.clear();
        self.target = None;
        self.state.select(None);
        self.clamp_selection();
    }

    pub fn task(&self, id: TaskId) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    /// Rows of the Tasks view: a header per section followed by its tasks.
    pub fn display_items(&self) -> Vec<DisplayItem> {
        let mut groups = group(&self.tasks, self.group_by);
        groups.sort_by_key(|g| match g.key {
            GroupKey::Member(m) => self.family.member_name(m).to_lowercase(),
            _ => String::new(),
        });
        let mut items = Vec::new();
        for g in groups {
            let heading = match g.key {
                GroupKey::Member(m) => self.family.member_name(m).to_string(),
                GroupKey::Shared => SHARED_TASKS.to_string(),
                GroupKey::Individual => INDIVIDUAL_TASKS.to_string(),
            };
            items.push(DisplayItem::Header(heading, g.tasks.len()));
            items.extend(g.tasks.iter().map(|t| DisplayItem::Task(t.id)));
        }
        items
    }

    /// Tasks in the recorder for the selected day and filter.
    pub fn recorder_tasks(&self) -> Vec<&Task> {
        filter_by_status(&self.tasks, &self.records, self.date, self.filter)
    }

    pub fn is_done(&self, task: TaskId) -> bool {
        is_completed_for_date(&self.records, task, self.date)
    }

    /// Records, newest day first.
    pub fn history(&self) -> Vec<&ActivityRecord> {
        let mut records: Vec<&ActivityRecord> = self.records.iter().collect();
        records.sort_by(|a, b| b.day().cmp(&a.day()));
        records
    }

    pub fn series(&self) -> Vec<TrendPoint> {
        build_series(&self.records, self.window, today())
    }

    fn row_count(&self) -> usize {
        match self.view {
            View::Tasks => self.display_items().len(),
            View::Recorder => self.recorder_tasks().len(),
            View::History => self.records.len(),
            View::Trends => 0,
        }
    }

    fn clamp_selection(&mut self) {
        let len = self.row_count();
        match self.state.selected() {
            _ if len == 0 => self.state.select(None),
            Some(i) if i >= len => self.state.select(Some(len - 1)),
            None => self.state.select(Some(0)),
            Some(_) => {}
        }
    }

    /// Selects the next row, wrapping around.
    pub fn next(&mut self) {
        let len = self.row_count();
        if len == 0 {
            return;
        }
        let i = match self.state.selected() {
            Some(i) if i + 1 < len => i + 1,
            _ => 0,
        };
        self.state.select(Some(i));
    }

    /// Selects the previous row, wrapping around.
    pub fn previous(&mut self) {
        let len = self.row_count();
        if len == 0 {
            return;
        }
        let i = match self.state.selected() {
            Some(0) | None => len - 1,
            Some(i) => i - 1,
        };
        self.state.select(Some(i));
    }

    pub fn toggle_group_by(&mut self) {
        self.group_by = self.group_by.toggle();
        self.clamp_selection();
    }

    pub fn cycle_filter(&mut self) {
        self.filter = self.filter.next();
        self.clamp_selection();
    }

    pub fn toggle_window(&mut self) {
        self.window = self.window.toggle();
    }

    /// Moves the recorder's day by `days`.
    pub fn shift_date(&mut self, days: i64) {
        self.date += Duration::days(days);
        self.clamp_selection();
    }

    fn selected_recorder_task(&self) -> Option<TaskId> {
        let i = self.state.selected()?;
        self.recorder_tasks().get(i).map(|t| t.id)
    }

    fn selected_task(&self) -> Option<TaskId> {
        let i = self.state.selected()?;
        match self.display_items().get(i)? {
            DisplayItem::Task(id) => Some(*id),
            DisplayItem::Header(..) => None,
        }
    }

    fn selected_record(&self) -> Option<RecordId> {
        let i = self.state.selected()?;
        self.history().get(i).map(|r| r.id)
    }

    /// Starts recording the selected recorder task.
    ///
    /// Single-assignee tasks are recorded at once; shared tasks ask who did it,
    /// prefilled with every assignee.
    pub fn start_record(&mut self) {
        let Some(id) = self.selected_recorder_task() else {
            return;
        };
        let Some(task) = self.task(id) else {
            return;
        };
        if self.is_done(id) {
            self.status = Some(format!("'{}' is already done on {}", task.title, self.date));
            return;
        }
        if task.assigned_to.len() == 1 {
            let entry = RecordEntry {
                task_id: id,
                completed_by: task.assigned_to.clone(),
            };
            let title = task.title.clone();
            let res = self.store.record_activity(&self.session, self.date, &[entry]);
            self.report(res, format!("Recorded '{}'", title));
            return;
        }
        self.input_buffer = self.family.member_names(&task.assigned_to);
        self.target = Some(id);
        self.input_mode = InputMode::CompletedBy;
    }

    /// Handles Enter while typing.
    pub fn handle_input(&mut self) {
        let Some(id) = self.target.take() else {
            self.cancel_input();
            return;
        };
        let names: Vec<String> = vec![std::mem::take(&mut self.input_buffer)];
        self.input_mode = InputMode::Normal;

        let res = crate::commands::resolve_members(&self.family, &names).and_then(|completed_by| {
            let entry = RecordEntry {
                task_id: id,
                completed_by,
            };
            self.store.record_activity(&self.session, self.date, &[entry])
        });
        let title = self.task(id).map(|t| t.title.clone()).unwrap_or_default();
        self.report(res, format!("Recorded '{}'", title));
    }

    pub fn cancel_input(&mut self) {
        self.input_mode = InputMode::Normal;
        self.input_buffer.clear();
        self.target = None;
    }

    /// Deletes the selected task (Tasks view) or record (History view).
    pub fn delete_selected(&mut self) {
        match self.view {
            View::Tasks => {
                if let Some(id) = self.selected_task() {
                    let res = self.store.delete_task(&self.session, id);
                    self.report(res, "Task deleted".to_string());
                }
            }
            View::History => {
                if let Some(id) = self.selected_record() {
                    let res = self.store.delete_record(&self.session, id);
                    self.report(res, "Activity record deleted".to_string());
                }
            }
            View::Recorder | View::Trends => {}
        }
    }

    /// Shows the outcome of a write and reloads on success. Prior state stays on failure.
    fn report<T>(&mut self, res: Result<T>, ok: String) {
        match res.and_then(|_| self.reload()) {
            Ok(()) => self.status = Some(ok),
            Err(e) => {
                tracing::warn!(error = %e, "dashboard action failed");
                self.status = Some(format!("Error: {}", e));
            }
        }
    }
}

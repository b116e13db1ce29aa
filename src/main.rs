//! # chorelog
//!
//! A terminal chore tracker for households. Set up your family once, assign
//! chores to one or more members, and tick them off day by day. A dashboard
//! (TUI) shows tasks grouped per member or as shared/individual, a daily
//! recorder, the activity history and a completion trend chart.
//!
//! ## Usage
//!
//! Every command acts on behalf of a user, given with `--user` or the
//! `CHORELOG_USER` environment variable.
//!
//! ```bash
//! export CHORELOG_USER=sam
//!
//! # Set up the household
//! chorelog family create "The Smiths" --member Alice:parent --member Bob:child
//!
//! # A one-off task and a shared weekly one
//! chorelog task add "Fix the fence" --due 2025-06-01 --assign Alice
//! chorelog task add "Vacuum" -f weekly -s 2025-05-01 -e 2025-12-31 -a Alice,Bob
//!
//! # See tasks grouped per member or as shared/individual
//! chorelog task list --group-by shared
//!
//! # Record a completion (ids can be shortened to a unique prefix)
//! chorelog record add 3f2a --by Bob --date 2025-05-04
//!
//! # What is still pending today, and how the last month went
//! chorelog status --show pending
//! chorelog trends --window month
//! ```
//!
//! Run without a subcommand to open the dashboard.
//!
//! ## Data Storage
//!
//! Data lives in one JSON file per table under your local data directory
//! (`~/.local/share/chorelog` on Linux). Override it with `CHORELOG_DIR`.
//!
//! ## Logging
//!
//! Diagnostics go to stderr. Set `RUST_LOG` (e.g. `RUST_LOG=chorelog=debug`)
//! for more detail; the default level is `warn`.

use std::io;
use std::process;

use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use tracing_subscriber::EnvFilter;

use chorelog::commands::*;
use chorelog::completion::StatusFilter;
use chorelog::grouping::GroupBy;
use chorelog::models::{Frequency, Priority};
use chorelog::session::Session;
use chorelog::storage::Store;
use chorelog::trends::TrendWindow;
use chorelog::tui::run_tui;
use chorelog::Result;

#[derive(Parser)]
#[command(name = "chorelog")]
#[command(about = "Household chore tracker", long_about = None)]
struct Cli {
    /// Who you are; families belong to the user who created them
    #[arg(short, long, global = true, env = "CHORELOG_USER")]
    user: Option<String>,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Set up or inspect your family
    Family {
        #[command(subcommand)]
        command: FamilyCommands,
    },
    /// Manage family members
    Member {
        #[command(subcommand)]
        command: MemberCommands,
    },
    /// Manage tasks
    Task {
        #[command(subcommand)]
        command: TaskCommands,
    },
    /// Record and correct completions
    Record {
        #[command(subcommand)]
        command: RecordCommands,
    },
    /// Show which tasks are done on a day
    Status {
        /// Day in YYYY-MM-DD (default: today)
        #[arg(short, long)]
        date: Option<String>,
        /// all, pending or completed
        #[arg(short, long, default_value = "all")]
        show: StatusFilter,
    },
    /// Show completed tasks per day
    Trends {
        /// week (7 days) or month (30 days)
        #[arg(short, long, default_value = "week")]
        window: TrendWindow,
    },
    /// Reset the database (delete all families, tasks and records)
    Reset {
        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,
    },
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for (bash, zsh, fish, powershell, elvish)
        shell: String,
    },
    /// Open interactive dashboard
    Ui,
}

#[derive(Subcommand)]
enum FamilyCommands {
    /// Create your family
    Create {
        /// Family name
        name: String,
        /// Member as NAME or NAME:ROLE (repeatable)
        #[arg(short, long = "member")]
        members: Vec<String>,
    },
    /// Show your family and its members
    Show,
    /// Rename your family
    Rename { name: String },
}

#[derive(Subcommand)]
enum MemberCommands {
    /// Add a family member
    Add {
        name: String,
        /// Role, e.g. parent or child
        #[arg(short, long)]
        role: Option<String>,
    },
    /// Rename a family member (assignments and records follow)
    Rename {
        name: String,
        new_name: String,
    },
    /// Remove a family member with their assignments and records
    Remove {
        name: String,
    },
}

#[derive(Args)]
struct ScheduleArgs {
    /// once, daily, weekly or custom
    #[arg(short, long)]
    frequency: Option<Frequency>,
    /// Repeat every N days (custom frequency)
    #[arg(short = 'n', long)]
    every: Option<u32>,
    /// Due date in YYYY-MM-DD (one-off tasks)
    #[arg(short, long)]
    due: Option<String>,
    /// First day in YYYY-MM-DD (recurring tasks)
    #[arg(short, long)]
    start: Option<String>,
    /// Last day in YYYY-MM-DD (recurring tasks)
    #[arg(short, long)]
    end: Option<String>,
    /// low, medium or high
    #[arg(short, long)]
    priority: Option<Priority>,
    /// Member name(s), comma separated or repeated
    #[arg(short, long)]
    assign: Vec<String>,
}

impl ScheduleArgs {
    fn into_fields(self, title: Option<String>) -> TaskFields {
        TaskFields {
            title,
            priority: self.priority,
            frequency: self.frequency,
            custom_days: self.every,
            due: self.due,
            start: self.start,
            end: self.end,
            assign: self.assign,
        }
    }
}

#[derive(Subcommand)]
enum TaskCommands {
    /// Add a new task
    Add {
        /// Task title (quoted if it has spaces)
        title: String,
        #[command(flatten)]
        fields: ScheduleArgs,
    },
    /// Edit a task
    Edit {
        id: String,
        /// New title
        #[arg(short, long)]
        title: Option<String>,
        #[command(flatten)]
        fields: ScheduleArgs,
    },
    /// Remove a task with its records
    Remove {
        id: String,
    },
    /// List tasks in sections
    List {
        /// individual (per member) or shared (shared vs individual)
        #[arg(short, long, default_value = "individual")]
        group_by: GroupBy,
    },
    /// Delete tasks nobody is assigned to
    Cleanup,
}

#[derive(Subcommand)]
enum RecordCommands {
    /// Record that a task was done
    Add {
        /// Task id (or unique prefix)
        task: String,
        /// Who completed it (repeatable; optional for single-assignee tasks)
        #[arg(short, long)]
        by: Vec<String>,
        /// Day in YYYY-MM-DD (default: today)
        #[arg(short, long)]
        date: Option<String>,
    },
    /// Change who completed a record
    Edit {
        id: String,
        #[arg(short, long)]
        by: String,
    },
    /// Remove a record
    Remove {
        id: String,
    },
    /// List all records, newest first
    History,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

fn main() {
    init_tracing();
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        tracing::debug!(error = ?e, "command failed");
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    if let Some(Commands::Completions { shell }) = &cli.command {
        let shell_enum = match shell.as_str() {
            "bash" => Shell::Bash,
            "zsh" => Shell::Zsh,
            "fish" => Shell::Fish,
            "powershell" => Shell::PowerShell,
            "elvish" => Shell::Elvish,
            _ => {
                eprintln!("Unsupported shell: {}", shell);
                return Ok(());
            }
        };
        let mut cmd = Cli::command();
        generate(shell_enum, &mut cmd, "chorelog", &mut io::stdout());
        return Ok(());
    }

    let store = Store::open()?;
    if let Some(Commands::Reset { force }) = cli.command {
        return cmd_reset(&store, force);
    }

    let session = Session::from_user(cli.user)?;
    match cli.command {
        Some(Commands::Family { command }) => match command {
            FamilyCommands::Create { name, members } => {
                cmd_family_create(&store, &session, name, members, false)
            }
            FamilyCommands::Show => cmd_family_show(&store, &session),
            FamilyCommands::Rename { name } => cmd_family_rename(&store, &session, name, false),
        },
        Some(Commands::Member { command }) => match command {
            MemberCommands::Add { name, role } => {
                cmd_member_add(&store, &session, name, role, false)
            }
            MemberCommands::Rename { name, new_name } => {
                cmd_member_rename(&store, &session, name, new_name, false)
            }
            MemberCommands::Remove { name } => cmd_member_remove(&store, &session, name, false),
        },
        Some(Commands::Task { command }) => match command {
            TaskCommands::Add { title, fields } => {
                let fields = fields.into_fields(Some(title));
                cmd_task_add(&store, &session, fields, false).map(|_| ())
            }
            TaskCommands::Edit { id, title, fields } => {
                cmd_task_edit(&store, &session, id, fields.into_fields(title), false)
            }
            TaskCommands::Remove { id } => cmd_task_remove(&store, &session, id, false),
            TaskCommands::List { group_by } => cmd_task_list(&store, &session, group_by),
            TaskCommands::Cleanup => cmd_task_cleanup(&store, &session, false).map(|_| ()),
        },
        Some(Commands::Record { command }) => match command {
            RecordCommands::Add { task, by, date } => {
                cmd_record_add(&store, &session, task, by, date, false)
            }
            RecordCommands::Edit { id, by } => cmd_record_edit(&store, &session, id, by, false),
            RecordCommands::Remove { id } => {
                cmd_record_remove(&store, &session, id, false).map(|_| ())
            }
            RecordCommands::History => cmd_history(&store, &session),
        },
        Some(Commands::Status { date, show }) => cmd_status(&store, &session, date, show),
        Some(Commands::Trends { window }) => cmd_trends(&store, &session, window),
        Some(Commands::Ui) | None => run_tui(store, session),
        Some(Commands::Reset { .. }) | Some(Commands::Completions { .. }) => Ok(()),
    }
}

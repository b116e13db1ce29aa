pub mod app;
pub mod ui;

use std::io;

use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};

use app::{App, InputMode, View};
use ui::ui;

use crate::error::Result;
use crate::session::Session;
use crate::storage::Store;

/// Runs the dashboard until the user quits.
pub fn run_tui(store: Store, session: Session) -> Result<()> {
    // Load before touching the terminal so errors print normally
    let mut app = App::new(store, session)?;

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, &mut app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    res?;
    Ok(())
}

fn run_app<B: Backend>(terminal: &mut Terminal<B>, app: &mut App) -> io::Result<()> {
    loop {
        terminal.draw(|f| ui(f, app))?;

        if let Event::Key(key) = event::read()? {
            if key.kind != KeyEventKind::Press {
                continue;
            }
            match app.input_mode {
                InputMode::Normal => match key.code {
                    KeyCode::Char('q') => return Ok(()),
                    KeyCode::Down | KeyCode::Char('j') => app.next(),
                    KeyCode::Up | KeyCode::Char('k') => app.previous(),
                    KeyCode::Char('1') => app.open(View::Tasks),
                    KeyCode::Char('2') => app.open(View::Recorder),
                    KeyCode::Char('3') => app.open(View::History),
                    KeyCode::Char('4') => app.open(View::Trends),
                    KeyCode::Char('g') if app.view == View::Tasks => app.toggle_group_by(),
                    KeyCode::Char('f') if app.view == View::Recorder => app.cycle_filter(),
                    KeyCode::Left | KeyCode::Char('h') if app.view == View::Recorder => {
                        app.shift_date(-1)
                    }
                    KeyCode::Right | KeyCode::Char('l') if app.view == View::Recorder => {
                        app.shift_date(1)
                    }
                    KeyCode::Char(' ') | KeyCode::Enter if app.view == View::Recorder => {
                        app.start_record()
                    }
                    KeyCode::Char('w') if app.view == View::Trends => app.toggle_window(),
                    KeyCode::Char('d') | KeyCode::Delete => app.delete_selected(),
                    _ => {}
                },
                InputMode::CompletedBy => match key.code {
                    KeyCode::Enter => app.handle_input(),
                    KeyCode::Esc => app.cancel_input(),
                    KeyCode::Char(c) => {
                        app.input_buffer.push(c);
                    }
                    KeyCode::Backspace => {
                        app.input_buffer.pop();
                    }
                    _ => {}
                },
            }
        }
    }
}

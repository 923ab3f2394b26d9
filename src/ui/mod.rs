pub mod app;
pub mod components;

use crate::ui::app::{App, AppState};
use crate::ui::components::{
    render_details, render_footer, render_header, render_popup, render_toast, render_tree,
};
use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use ratatui::prelude::*;
use std::time::{Duration, Instant};

pub fn ui(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(0),
            Constraint::Length(3),
        ])
        .split(f.area());

    render_header(f, app, chunks[0]);

    let main_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(65), Constraint::Percentage(35)])
        .split(chunks[1]);

    render_tree(f, app, main_chunks[0]);
    render_details(f, app, main_chunks[1]);

    render_footer(f, app, chunks[2]);
    render_popup(f, app);
    render_toast(f, app);
}

pub fn run_app(
    terminal: &mut Terminal<CrosstermBackend<std::io::Stderr>>,
    app: &mut App,
) -> Result<()> {
    loop {
        app.tick(Instant::now());
        terminal.draw(|f| ui(f, app))?;

        // Event polling with timeout so debounced search and background work advance
        if event::poll(Duration::from_millis(100))?
            && let Event::Key(key) = event::read()?
            && key.kind == KeyEventKind::Press
        {
            match app.state {
                AppState::Browsing => match key.code {
                    KeyCode::Char('q') => return Ok(()),
                    KeyCode::Down | KeyCode::Char('j') => app.next(),
                    KeyCode::Up | KeyCode::Char('k') => app.previous(),
                    KeyCode::Right | KeyCode::Left | KeyCode::Char('l' | 'h') => {
                        app.toggle_expand();
                    }
                    KeyCode::Char(' ') => app.toggle_select(),
                    KeyCode::Enter => app.open(),
                    KeyCode::Char('/') => app.begin_search(),
                    KeyCode::Char('s') => app.cycle_sort(),
                    KeyCode::Char('v') => app.toggle_view(),
                    KeyCode::Char('r') => app.begin_rename(),
                    KeyCode::Char('d') | KeyCode::Delete => app.request_delete(),
                    KeyCode::Char('x') => app.download(),
                    KeyCode::Char('c') => app.request_cleanup(),
                    KeyCode::Char('R') => app.start_refresh(),
                    KeyCode::Esc => app.toasts.dismiss(),
                    _ => {}
                },
                AppState::Searching => match key.code {
                    KeyCode::Enter => app.end_search(),
                    KeyCode::Esc => app.cancel_search(),
                    KeyCode::Backspace => app.search_pop(Instant::now()),
                    KeyCode::Char(c) => app.search_push(c, Instant::now()),
                    _ => {}
                },
                AppState::Renaming { .. } => match key.code {
                    KeyCode::Enter => app.commit_rename(),
                    KeyCode::Esc => app.cancel(),
                    KeyCode::Backspace => app.rename_pop(),
                    KeyCode::Char(c) => app.rename_push(c),
                    _ => {}
                },
                AppState::Confirming(_) => match key.code {
                    KeyCode::Char('y') | KeyCode::Enter => app.confirm(),
                    KeyCode::Char('n' | 'q') | KeyCode::Esc => app.cancel(),
                    _ => {}
                },
                AppState::Loading => {
                    if let KeyCode::Char('q') | KeyCode::Esc = key.code {
                        return Ok(());
                    }
                }
            }
        }
    }
}

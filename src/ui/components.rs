use crate::model::{DisplayNode, Item, Projection, Status};
use crate::notify::Severity;
use crate::ui::app::{App, AppState};
use humansize::{BINARY, format_size};
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Clear, List, ListItem, Paragraph, Wrap},
};
use std::fmt::Write as _;

const TILE_WIDTH: u16 = 26;
const TILE_HEIGHT: u16 = 5;

pub fn render_header(f: &mut Frame, app: &App, area: Rect) {
    let store = app.store();
    let mut header_text = format!(
        "runtree v{} | {} | {} items, {} | View: {} | Sort: {}",
        env!("CARGO_PKG_VERSION"),
        app.source,
        store.len(),
        format_size(store.total_size(), BINARY),
        store.view().as_str(),
        store.sort(),
    );
    if !store.search().is_empty() {
        let _ = write!(header_text, " | Search: \"{}\"", store.search());
    }

    let title = Paragraph::new(header_text).block(Block::default().borders(Borders::ALL));
    f.render_widget(title, area);
}

fn status_color(status: Status) -> Color {
    match status {
        Status::Success => Color::Green,
        Status::Warning => Color::Yellow,
        Status::Error => Color::Red,
        Status::Info => Color::Blue,
    }
}

fn severity_color(severity: Severity) -> Color {
    match severity {
        Severity::Success => Color::Green,
        Severity::Info => Color::Blue,
        Severity::Warning => Color::Yellow,
        Severity::Error => Color::Red,
    }
}

fn toggle_glyph(node: &DisplayNode<'_>) -> &'static str {
    match (node.has_visible_children, node.expanded) {
        (false, _) => " ",
        (true, false) => "▶",
        (true, true) => "▼",
    }
}

fn format_date(item: &Item) -> String {
    item.modified_at.format("%Y-%m-%d").to_string()
}

fn row_line(node: &DisplayNode<'_>) -> Line<'static> {
    let item = node.item;
    let indent = "  ".repeat(node.depth);
    let marker = if node.selected { "●" } else { " " };
    let mut name_style = Style::default();
    if node.selected {
        name_style = name_style.fg(Color::Cyan).add_modifier(Modifier::BOLD);
    }
    if item.is_folder() && !node.has_visible_children {
        name_style = name_style.add_modifier(Modifier::DIM);
    }

    let mut spans = vec![
        Span::raw(format!("{marker} {indent}{} {} ", toggle_glyph(node), item.kind.icon())),
        Span::styled(format!("{:<28}", item.name), name_style),
        Span::raw(format!(
            " {:>10}  {}",
            format_size(item.size_bytes, BINARY),
            format_date(item)
        )),
    ];
    if let Some(status) = item.status {
        spans.push(Span::styled(
            format!("  {}", status.label()),
            Style::default().fg(status_color(status)),
        ));
    }
    Line::from(spans)
}

fn render_empty_state(f: &mut Frame, area: Rect, block: Block<'_>) {
    let text = "📁\n\nNo folders found\n\nTry changing the search or press [R] to refresh.";
    let empty = Paragraph::new(text)
        .alignment(Alignment::Center)
        .block(block)
        .wrap(Wrap { trim: true });
    f.render_widget(empty, area);
}

pub fn render_tree(f: &mut Frame, app: &mut App, area: Rect) {
    let title = format!("Items ({})", app.store().view().as_str());
    let block = Block::default().borders(Borders::ALL).title(title);

    let projection = app.session.store().project();
    if projection.is_empty() {
        render_empty_state(f, area, block);
        return;
    }

    match app.store().view() {
        crate::model::View::List => {
            let items: Vec<ListItem> = projection
                .iter()
                .map(|node| ListItem::new(row_line(node)))
                .collect();

            let list = List::new(items)
                .block(block)
                .highlight_style(
                    Style::default()
                        .add_modifier(Modifier::BOLD)
                        .fg(Color::Yellow),
                )
                .highlight_symbol("> ");
            f.render_stateful_widget(list, area, &mut app.list_state);
        }
        crate::model::View::Grid => {
            let cursor = app.list_state.selected();
            render_grid(f, &projection, cursor, area, block);
        }
    }
}

/// Lays the rows out as tiles, scrolled so the cursor tile stays visible.
fn render_grid(
    f: &mut Frame,
    projection: &Projection<'_>,
    cursor: Option<usize>,
    area: Rect,
    block: Block<'_>,
) {
    let inner = block.inner(area);
    f.render_widget(block, area);

    let columns = usize::from((inner.width / TILE_WIDTH).max(1));
    let visible_rows = usize::from((inner.height / TILE_HEIGHT).max(1));
    let cursor_row = cursor.unwrap_or(0) / columns;
    let first_row = cursor_row.saturating_sub(visible_rows - 1);

    for (i, node) in projection.iter().enumerate().skip(first_row * columns) {
        let row = i / columns - first_row;
        if row >= visible_rows {
            break;
        }
        let col = i % columns;
        #[allow(clippy::cast_possible_truncation)]
        let tile = Rect {
            x: inner.x + col as u16 * TILE_WIDTH,
            y: inner.y + row as u16 * TILE_HEIGHT,
            width: TILE_WIDTH.min(inner.width),
            height: TILE_HEIGHT.min(inner.height),
        };
        render_tile(f, node, cursor == Some(i), tile);
    }
}

fn render_tile(f: &mut Frame, node: &DisplayNode<'_>, focused: bool, area: Rect) {
    let item = node.item;
    let mut border = Style::default();
    if node.selected {
        border = border.fg(Color::Cyan);
    }
    if focused {
        border = border.fg(Color::Yellow).add_modifier(Modifier::BOLD);
    }

    let mut lines = vec![
        Line::from(format!("{} {}", toggle_glyph(node), item.kind.icon())),
        Line::from(format!(
            "{} · {}",
            format_size(item.size_bytes, BINARY),
            format_date(item)
        )),
    ];
    if let Some(status) = item.status {
        lines.push(Line::styled(
            status.label(),
            Style::default().fg(status_color(status)),
        ));
    }

    let tile = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(border)
            .title(item.name.clone()),
    );
    f.render_widget(tile, area);
}

pub fn render_details(f: &mut Frame, app: &App, area: Rect) {
    let block = Block::default().borders(Borders::ALL).title("Details");
    let Some(item) = app
        .cursor_id()
        .and_then(|id| app.store().find_by_id(&id).ok())
    else {
        f.render_widget(block, area);
        return;
    };

    let mut details_text = format!(
        "Name: {}\nId: {}\nType: {:?}\nSize: {}\nModified: {}\n",
        item.name,
        item.id,
        item.kind,
        format_size(item.size_bytes, BINARY),
        item.modified_at.format("%Y-%m-%d %H:%M"),
    );
    if let Some(status) = item.status {
        let _ = writeln!(details_text, "Status: {}", status.label());
    }
    if item.is_folder() {
        let _ = writeln!(details_text, "\nContents ({}):", item.children().len());
        for child in item.children().iter().take(10) {
            let _ = writeln!(
                details_text,
                " - {} {} ({})",
                child.kind.icon(),
                child.name,
                format_size(child.size_bytes, BINARY)
            );
        }
    }

    let details = Paragraph::new(details_text)
        .block(block)
        .wrap(Wrap { trim: false });
    f.render_widget(details, area);
}

pub fn render_footer(f: &mut Frame, app: &App, area: Rect) {
    let footer_text = match &app.state {
        AppState::Browsing => "[j/k] Move [l/h] Expand [Space] Select [Enter] Open [/] Search \
            [s] Sort [v] View [r] Rename [x] Download [d] Delete [c] Cleanup [R] Refresh [q] Quit"
            .to_string(),
        AppState::Searching => format!(
            "Search: {}_ | [Enter] Apply [Esc] Clear",
            app.session.input()
        ),
        AppState::Renaming { buffer, .. } => {
            format!("New name: {buffer}_ | [Enter] Save [Esc] Cancel")
        }
        AppState::Confirming(_) => "[y/Enter] Confirm [n/Esc] Cancel".to_string(),
        AppState::Loading => "Loading data...".to_string(),
    };

    let footer = Paragraph::new(footer_text).block(Block::default().borders(Borders::ALL));
    f.render_widget(footer, area);
}

pub fn render_popup(f: &mut Frame, app: &App) {
    let (title, message) = match &app.state {
        AppState::Confirming(action) => (action.title(), action.message()),
        AppState::Loading => ("Refresh", format!("Loading data from {}...", app.source)),
        _ => return,
    };

    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow));
    let area = centered_rect(60, 30, f.area());
    f.render_widget(Clear, area);
    f.render_widget(
        Paragraph::new(message)
            .block(block)
            .wrap(Wrap { trim: true }),
        area,
    );
}

pub fn render_toast(f: &mut Frame, app: &App) {
    let Some(toast) = app.toasts.latest() else {
        return;
    };

    let screen = f.area();
    let width = screen.width.min(50);
    let area = Rect {
        x: screen.x + screen.width - width,
        y: screen.y + 1,
        width,
        height: 3.min(screen.height),
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(severity_color(toast.severity)));
    f.render_widget(Clear, area);
    f.render_widget(Paragraph::new(toast.message.clone()).block(block), area);
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

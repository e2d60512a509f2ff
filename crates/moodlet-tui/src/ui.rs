//! TUI rendering with Ratatui

use crate::app::{App, Focus, LoginField};
use crate::vim::VimMode;
use moodlet_core::{MaterialKind, View};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph},
    Frame,
};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

/// Draw the complete UI
pub fn draw(frame: &mut Frame, app: &App) {
    let size = frame.size();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // Header
            Constraint::Min(1),    // Content
            Constraint::Length(1), // Status bar
            Constraint::Length(1), // Command/input line
        ])
        .split(size);

    draw_header(frame, app, chunks[0]);
    if app.mode == VimMode::Login {
        draw_login(frame, app, chunks[1]);
    } else {
        draw_lists(frame, app, chunks[1]);
    }
    draw_status_bar(frame, app, chunks[2]);
    draw_command_line(frame, app, chunks[3]);
}

fn draw_header(frame: &mut Frame, app: &App, area: Rect) {
    let mut spans = vec![
        Span::styled(" moodlet ", Style::default().fg(Color::Black).bg(Color::Yellow)),
        Span::styled(format!(" {} ", app.base_url()), Style::default().fg(Color::Blue)),
    ];
    if app.mode != VimMode::Login {
        spans.push(Span::styled(
            format!(" {} ", app.profile.display_name),
            Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
        ));
    }
    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

/// Rectangle of the given size centred in `area`
fn centered(width: u16, height: u16, area: Rect) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}

fn draw_login(frame: &mut Frame, app: &App, area: Rect) {
    let form = &app.login;
    let inner_width = 46usize;

    let field_style = |field: LoginField| {
        if form.field == field {
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::White)
        }
    };

    let mut lines = vec![
        Line::from(vec![
            Span::styled("Username: ", field_style(LoginField::Username)),
            Span::raw(form.username.clone()),
        ]),
        Line::from(vec![
            Span::styled("Password: ", field_style(LoginField::Password)),
            Span::raw("*".repeat(form.password.chars().count())),
        ]),
        Line::from(""),
    ];

    if app.loading {
        lines.push(Line::styled("Logging in...", Style::default().fg(Color::Yellow)));
    }
    if let Some(error) = &form.error {
        for wrapped in textwrap::wrap(error, inner_width) {
            lines.push(Line::styled(wrapped.into_owned(), Style::default().fg(Color::Red)));
        }
    }
    lines.push(Line::styled(
        "Tab switch field  Enter log in  Esc quit",
        Style::default().fg(Color::DarkGray),
    ));

    let height = lines.len() as u16 + 2;
    let rect = centered(inner_width as u16 + 2, height, area);
    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Moodle login ");

    frame.render_widget(Clear, rect);
    frame.render_widget(Paragraph::new(lines).block(block), rect);

    // Cursor at the end of the active field
    let (value, row) = match form.field {
        LoginField::Username => (form.username.width(), 0),
        LoginField::Password => (form.password.chars().count(), 1),
    };
    frame.set_cursor(cursor_column(rect, value), rect.y + 1 + row);
}

/// Column after `value` columns of field text, kept inside `rect`
fn cursor_column(rect: Rect, value: usize) -> u16 {
    const LABEL: usize = "Username: ".len();
    let last = rect.width.saturating_sub(2) as usize;
    let offset = (1 + LABEL).saturating_add(value).min(last) as u16;
    rect.x.saturating_add(offset)
}

fn kind_tag(kind: MaterialKind) -> (&'static str, Color) {
    match kind {
        MaterialKind::File => ("FILE", Color::White),
        MaterialKind::Folder => ("DIR ", Color::Blue),
        MaterialKind::Assignment => ("TASK", Color::Magenta),
        MaterialKind::Url => ("LINK", Color::Cyan),
        MaterialKind::Forum => ("TALK", Color::DarkGray),
    }
}

/// Cut `text` to `max` display columns, marking the cut with an ellipsis
fn truncate(text: &str, max: usize) -> String {
    if text.width() <= max {
        return text.to_string();
    }
    let mut out = String::new();
    let mut used = 0;
    for c in text.chars() {
        let w = c.width().unwrap_or(0);
        if used + w + 1 > max {
            break;
        }
        used += w;
        out.push(c);
    }
    out.push('…');
    out
}

fn pane_block(title: String, focused: bool) -> Block<'static> {
    let border = if focused { Color::Yellow } else { Color::DarkGray };
    Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border))
        .title(title)
}

fn draw_lists(frame: &mut Frame, app: &App, area: Rect) {
    let panes = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(30), Constraint::Percentage(70)])
        .split(area);

    let current_id = app.navigator.current_course().map(|c| c.id.as_str());
    let width = panes[0].width.saturating_sub(4) as usize;
    let courses: Vec<ListItem> = app
        .courses
        .iter()
        .map(|course| {
            let style = if Some(course.id.as_str()) == current_id {
                Style::default().fg(Color::Green)
            } else {
                Style::default()
            };
            ListItem::new(Span::styled(truncate(&course.name, width), style))
        })
        .collect();

    let mut course_state = ListState::default();
    if !app.courses.is_empty() {
        course_state.select(Some(app.course_index));
    }
    let course_list = List::new(courses)
        .block(pane_block(
            format!(" Courses ({}) ", app.courses.len()),
            app.focus == Focus::Courses,
        ))
        .highlight_style(Style::default().add_modifier(Modifier::REVERSED))
        .highlight_symbol("> ");
    frame.render_stateful_widget(course_list, panes[0], &mut course_state);

    let title = match app.navigator.view() {
        View::Course(cv) => format!(" {} ", cv.breadcrumbs().join(" / ")),
        _ => format!(" {} ", app.navigator.title()),
    };
    let width = panes[1].width.saturating_sub(11) as usize;
    let materials: Vec<ListItem> = app
        .navigator
        .materials()
        .iter()
        .map(|material| {
            let (tag, color) = kind_tag(material.kind);
            ListItem::new(Line::from(vec![
                Span::styled(format!("[{}] ", tag), Style::default().fg(color)),
                Span::raw(truncate(&material.name, width)),
            ]))
        })
        .collect();

    let empty = materials.is_empty();
    let mut material_state = ListState::default();
    if !empty {
        material_state.select(Some(app.material_index));
    }
    let block = pane_block(title, app.focus == Focus::Materials);
    if empty {
        let hint = match app.navigator.view() {
            View::Dashboard => "Select a course with Enter",
            _ => "Nothing here",
        };
        let paragraph = Paragraph::new(Span::styled(hint, Style::default().fg(Color::DarkGray)))
            .block(block);
        frame.render_widget(paragraph, panes[1]);
    } else {
        let list = List::new(materials)
            .block(block)
            .highlight_style(Style::default().add_modifier(Modifier::REVERSED))
            .highlight_symbol("> ");
        frame.render_stateful_widget(list, panes[1], &mut material_state);
    }
}

fn draw_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let mode_style = match app.mode {
        VimMode::Login => Style::default().fg(Color::Magenta),
        VimMode::Normal => Style::default().fg(Color::Green),
        VimMode::Command => Style::default().fg(Color::Yellow),
    };

    let mut spans = vec![Span::styled(
        format!(" {} ", app.mode.indicator()),
        mode_style.add_modifier(Modifier::BOLD),
    )];

    if app.mode != VimMode::Login {
        spans.push(Span::styled(
            format!(" {} ", app.navigator.title()),
            Style::default().fg(Color::Blue),
        ));
        if let Some(material) = app.selected_material() {
            spans.push(Span::styled(
                format!(" → {} ", material.url),
                Style::default().fg(Color::Cyan),
            ));
        }
    }

    if app.loading {
        spans.push(Span::styled(" Loading... ", Style::default().fg(Color::Yellow)));
    }

    let status = Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(status, area);
}

fn draw_command_line(frame: &mut Frame, app: &App, area: Rect) {
    let content = match app.mode {
        VimMode::Command => format!(":{}", app.input),
        _ => app.status.clone().unwrap_or_default(),
    };

    let style = match app.mode {
        VimMode::Command => Style::default().fg(Color::White),
        _ => Style::default().fg(Color::DarkGray),
    };

    let paragraph = Paragraph::new(content).style(style);
    frame.render_widget(paragraph, area);

    if app.mode == VimMode::Command {
        let cursor_x = area.x + app.input.width() as u16 + 1; // +1 for :
        frame.set_cursor(cursor_x, area.y);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("Databases", 20), "Databases");
        assert_eq!(truncate("Operating Systems", 8), "Operati…");
        assert_eq!(truncate("数据库系统", 5), "数据…");
    }

    #[test]
    fn test_cursor_column_stays_in_box() {
        let rect = Rect::new(10, 5, 48, 8);
        assert_eq!(cursor_column(rect, 3), 10 + 1 + 10 + 3);
        assert_eq!(cursor_column(rect, 100_000), 10 + 46);
        assert_eq!(cursor_column(Rect::new(u16::MAX - 4, 0, 4, 4), usize::MAX), u16::MAX - 2);
    }

    #[test]
    fn test_forum_tag() {
        assert_eq!(kind_tag(MaterialKind::Forum).0, "TALK");
    }

    #[test]
    fn test_centered() {
        let area = Rect::new(0, 0, 100, 40);
        let rect = centered(20, 10, area);
        assert_eq!(rect, Rect::new(40, 15, 20, 10));
        assert_eq!(centered(200, 50, area), area);
    }
}

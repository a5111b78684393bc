// ============================================================================
// RENDERING - All UI output functions
// ============================================================================

use chrono::Datelike;
use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Clear, List, ListItem, Paragraph, Wrap},
};
use tui_textarea::TextArea;

use crate::app::{App, Screen};
use crate::calendar::MonthlyCalendarData;
use crate::journal::SaveStatus;
use crate::models::{UNKNOWN_FRAMEWORK_LABEL, framework_label};

const MONTH_NAMES: [&str; 12] = [
    "January", "February", "March", "April", "May", "June", "July", "August", "September",
    "October", "November", "December",
];

/// Parse `#RRGGBB`, falling back to gray.
pub fn hex_color(hex: &str) -> Color {
    let digits = hex.trim_start_matches('#');
    if digits.len() != 6 || !digits.is_ascii() {
        return Color::Gray;
    }
    let channel = |range: std::ops::Range<usize>| u8::from_str_radix(&digits[range], 16).ok();
    match (channel(0..2), channel(2..4), channel(4..6)) {
        (Some(r), Some(g), Some(b)) => Color::Rgb(r, g, b),
        _ => Color::Gray,
    }
}

/// Get centered popup area for overlays
fn get_popup_area(frame_width: u16, frame_height: u16, width_percent: u16, height_percent: u16) -> Rect {
    let width = frame_width.saturating_mul(width_percent) / 100;
    let height = frame_height.saturating_mul(height_percent) / 100;
    let x = (frame_width.saturating_sub(width)) / 2;
    let y = (frame_height.saturating_sub(height)) / 2;
    Rect { x, y, width, height }
}

pub fn draw(frame: &mut Frame, app: &mut App) {
    let size = frame.size();
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Min(5), Constraint::Length(1)])
        .split(size);

    draw_status_bar(frame, app, chunks[0]);
    match app.screen {
        Screen::SignIn => draw_sign_in(frame, app, chunks[1]),
        Screen::Frameworks => draw_frameworks(frame, app, chunks[1]),
        Screen::Editor => draw_editor(frame, app, chunks[1]),
        Screen::History => draw_history(frame, app, chunks[1]),
        Screen::Detail => draw_detail(frame, app, chunks[1]),
    }
    draw_help_line(frame, app, chunks[2]);

    if app.show_error_popup {
        draw_message_popup(frame, "[!] Error", &app.error_message, Color::Red);
    } else if app.show_success_popup {
        draw_message_popup(frame, "[OK] Done", &app.success_message, Color::Green);
    }
}

fn draw_status_bar(frame: &mut Frame, app: &mut App, area: Rect) {
    let mut spans = vec![Span::styled(
        " furikaeri ",
        Style::default().fg(Color::Black).bg(Color::Cyan).add_modifier(Modifier::BOLD),
    )];

    if let Some(user) = app.ctx.user().cloned() {
        let who = if user.is_guest { "Guest".to_string() } else { user.display_name };
        spans.push(Span::raw(format!("  {who}")));
        match app.session_expires_in() {
            Some(secs) if secs > 0 => {
                spans.push(Span::styled(
                    format!("  session {}m", secs / 60),
                    Style::default().fg(Color::DarkGray),
                ));
            }
            Some(_) => spans.push(Span::styled("  session expired", Style::default().fg(Color::Red))),
            None => {}
        }
    }

    if let Some(journal) = app.journal.as_ref() {
        let status = match &journal.status {
            SaveStatus::Idle => None,
            SaveStatus::Saving => Some(Span::styled("  saving...", Style::default().fg(Color::Yellow))),
            SaveStatus::Saved => Some(Span::styled("  saved", Style::default().fg(Color::Green))),
            SaveStatus::Failed(_) => Some(Span::styled("  not saved", Style::default().fg(Color::Red))),
        };
        spans.extend(status);
    }

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn draw_help_line(frame: &mut Frame, app: &App, area: Rect) {
    let text = match app.screen {
        Screen::SignIn => "Type a name and press Enter (empty name = guest)  Esc: quit",
        Screen::Frameworks => "↑/↓: choose  Enter: write  h: history  o: sign out  q: quit",
        Screen::Editor => "Tab/Shift+Tab: field  Ctrl+S: save  Ctrl+P/Ctrl+N: day  Esc: back",
        Screen::History => "←/→/↑/↓: day  PgUp/PgDn: month  t: today  Enter/1-9: open  n: new  x: export  Esc: back",
        Screen::Detail => "e: edit  d: delete  Esc: back",
    };
    let help = Paragraph::new(text).style(Style::default().fg(Color::DarkGray));
    frame.render_widget(help, area);
}

fn draw_message_popup(frame: &mut Frame, title: &str, message: &str, color: Color) {
    let size = frame.size();
    let area = get_popup_area(size.width, size.height, 60, 30);

    let block = Block::default()
        .title(title.to_string())
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .style(Style::default().fg(color).bg(Color::Black));

    let inner = block.inner(area);
    frame.render_widget(Clear, area);
    frame.render_widget(block, area);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(2), Constraint::Length(1)])
        .split(inner);

    let para = Paragraph::new(message.to_string())
        .wrap(Wrap { trim: true })
        .alignment(Alignment::Center)
        .style(Style::default().fg(Color::White));
    frame.render_widget(para, chunks[0]);

    let hint = Paragraph::new("Press Esc to dismiss")
        .alignment(Alignment::Center)
        .style(Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC));
    frame.render_widget(hint, chunks[1]);
}

// ----------------------------------------------------------------------------
// Sign-in & framework selection
// ----------------------------------------------------------------------------

fn draw_sign_in(frame: &mut Frame, app: &App, area: Rect) {
    let popup = get_popup_area(area.width, area.height, 50, 40);
    let popup = Rect { y: popup.y + area.y, ..popup };

    let mut lines = vec![
        Line::from(Span::styled(
            "Welcome back",
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from("Name:"),
        Line::from(Span::styled(
            format!("{}|", app.sign_in_name),
            Style::default().fg(Color::Yellow).bg(Color::Rgb(30, 30, 40)),
        )),
        Line::from(""),
        Line::from(Span::styled(
            "Leave empty to continue as guest.",
            Style::default().fg(Color::Gray),
        )),
    ];
    if let Some(err) = &app.sign_in_error {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(err.clone(), Style::default().fg(Color::Red))));
    }

    let panel = Paragraph::new(lines)
        .block(
            Block::default()
                .title("Sign in")
                .borders(Borders::ALL)
                .border_type(BorderType::Rounded),
        )
        .alignment(Alignment::Center);
    frame.render_widget(panel, popup);
}

fn draw_frameworks(frame: &mut Frame, app: &mut App, area: Rect) {
    app.framework_items.clear();
    let Some(journal) = app.journal.as_ref() else {
        return;
    };

    let block = Block::default()
        .title(format!("Choose a framework - reflecting on {}", app.selected_date))
        .borders(Borders::ALL);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let mut items = Vec::new();
    for (idx, framework) in journal.active_frameworks().into_iter().enumerate() {
        let selected = idx == app.framework_idx;
        let marker = if selected { "> " } else { "  " };
        let title_style = if selected {
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::White)
        };
        items.push(ListItem::new(vec![
            Line::from(vec![
                Span::raw(marker),
                Span::styled(format!("[{}] ", framework.icon), Style::default().fg(hex_color(&framework.color))),
                Span::styled(framework.display_name.clone(), title_style),
                Span::styled(format!("  ({})", framework.name), Style::default().fg(Color::DarkGray)),
            ]),
            Line::from(Span::styled(
                format!("      {}", framework.description),
                Style::default().fg(Color::Gray),
            )),
        ]));

        let y = inner.y + (idx as u16) * 2;
        if y + 2 <= inner.y + inner.height {
            app.framework_items.push((idx, Rect { x: inner.x, y, width: inner.width, height: 2 }));
        }
    }

    frame.render_widget(List::new(items), inner);
}

// ----------------------------------------------------------------------------
// Editor
// ----------------------------------------------------------------------------

fn textarea_lines_with_cursor(textarea: &TextArea<'static>, height: u16) -> Vec<Line<'static>> {
    let (cursor_row, cursor_col) = textarea.cursor();
    let mut lines = Vec::new();
    let text_lines = textarea.lines();

    if text_lines.is_empty() {
        lines.push(Line::from("|"));
        return lines;
    }

    for (idx, line) in text_lines.iter().enumerate() {
        if idx == cursor_row {
            let char_col = cursor_col.min(line.chars().count());
            let mut new_line = String::new();
            for (i, c) in line.chars().enumerate() {
                if i == char_col {
                    new_line.push('|');
                }
                new_line.push(c);
            }
            if char_col == line.chars().count() {
                new_line.push('|');
            }
            lines.push(Line::from(Span::styled(
                new_line,
                Style::default().fg(Color::Yellow).bg(Color::Rgb(30, 30, 40)),
            )));
        } else {
            lines.push(Line::from(line.clone()));
        }
    }
    let view_height = height.max(1) as usize;
    if lines.len() > view_height {
        let start = cursor_row.saturating_sub(view_height.saturating_sub(1));
        let end = (start + view_height).min(lines.len());
        lines[start..end].to_vec()
    } else {
        lines
    }
}

fn draw_editor(frame: &mut Frame, app: &mut App, area: Rect) {
    app.field_rects.clear();
    let (Some(journal), Some(draft)) = (app.journal.as_ref(), app.draft.as_ref()) else {
        return;
    };
    let Some(framework) = journal.framework(&draft.framework_id) else {
        return;
    };
    let fields = framework.ordered_fields();
    let form_error = app.validation.as_ref().and_then(|v| v.form_error()).cloned();

    let mut constraints = vec![Constraint::Length(3)];
    if form_error.is_some() {
        constraints.push(Constraint::Length(1));
    }
    constraints.extend(fields.iter().map(|_| Constraint::Min(4)));
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(constraints)
        .split(area);

    let mode = if draft.record_id.is_some() { "Editing" } else { "New" };
    let header = Paragraph::new(Line::from(vec![
        Span::styled(
            format!("[{}] {}", framework.icon, framework.display_name),
            Style::default().fg(hex_color(&framework.color)).add_modifier(Modifier::BOLD),
        ),
        Span::raw(format!("  {mode} reflection for ")),
        Span::styled(draft.date.to_string(), Style::default().fg(Color::Yellow)),
    ]))
    .block(Block::default().borders(Borders::ALL));
    frame.render_widget(header, chunks[0]);

    let mut next = 1;
    if let Some(err) = form_error {
        let banner = Paragraph::new(format!(" {} ", err.message))
            .style(Style::default().fg(Color::White).bg(Color::Red).add_modifier(Modifier::BOLD));
        frame.render_widget(banner, chunks[1]);
        next = 2;
    }

    for (idx, field) in fields.iter().enumerate() {
        let area = chunks[next + idx];
        let focused = idx == app.focused_field;
        let error = app
            .validation
            .as_ref()
            .and_then(|v| v.errors_for(&field.id).next().cloned());

        let mut title = field.label.clone();
        if field.required {
            title.push_str(" *");
        }
        let border_style = if error.is_some() {
            Style::default().fg(Color::Red)
        } else if focused {
            Style::default().fg(Color::Yellow)
        } else {
            Style::default().fg(Color::Gray)
        };
        let block = Block::default()
            .title(title)
            .borders(Borders::ALL)
            .border_style(border_style);
        let inner = block.inner(area);
        frame.render_widget(block, area);

        let text_height = inner.height.saturating_sub(if error.is_some() { 1 } else { 0 });
        let mut lines = match app.field_editors.get(idx) {
            Some(editor) if focused => textarea_lines_with_cursor(&editor.textarea, text_height),
            Some(editor) if editor.textarea.lines().iter().any(|l| !l.is_empty()) => editor
                .textarea
                .lines()
                .iter()
                .take(text_height as usize)
                .map(|l| Line::from(l.clone()))
                .collect(),
            _ => vec![Line::from(Span::styled(
                field.placeholder.clone(),
                Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
            ))],
        };
        lines.truncate(text_height.max(1) as usize);
        if let Some(err) = error {
            while lines.len() < text_height as usize {
                lines.push(Line::from(""));
            }
            lines.push(Line::from(Span::styled(err.message, Style::default().fg(Color::Red))));
        }
        frame.render_widget(Paragraph::new(lines), inner);
        app.field_rects.push((idx, area));
    }
}

// ----------------------------------------------------------------------------
// History
// ----------------------------------------------------------------------------

fn draw_history(frame: &mut Frame, app: &mut App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(38), Constraint::Min(30)])
        .split(area);
    let left = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(12), Constraint::Min(4)])
        .split(chunks[0]);

    draw_calendar_grid(frame, app, left[0]);
    draw_day_records(frame, app, left[1]);
    draw_month_stats(frame, app, chunks[1]);
}

fn draw_calendar_grid(frame: &mut Frame, app: &mut App, area: Rect) {
    app.calendar_day_rects.clear();
    let Some(calendar) = app.calendar.as_ref() else {
        return;
    };

    let month_name = MONTH_NAMES
        .get(calendar.month.saturating_sub(1) as usize)
        .copied()
        .unwrap_or("Unknown");
    let block = Block::default()
        .title(format!("◄ {} {} ►", month_name, calendar.year))
        .borders(Borders::ALL)
        .style(Style::default().fg(Color::Cyan));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let mut lines = Vec::new();
    lines.push(Line::from(
        calendar
            .week_start
            .headers()
            .iter()
            .map(|h| Span::styled(format!(" {h}  "), Style::default().fg(Color::Cyan)))
            .collect::<Vec<_>>(),
    ));
    lines.push(Line::from(""));

    for (week_idx, week) in calendar.weeks().enumerate() {
        let mut week_spans = Vec::new();
        for (col, day) in week.iter().enumerate() {
            let marker = if day.count > 0 { "•" } else { " " };
            let mut style = if !day.in_month {
                Style::default().fg(Color::DarkGray)
            } else if let Some(color) = day.colors.first() {
                Style::default().fg(hex_color(color))
            } else {
                Style::default().fg(Color::White)
            };
            if day.is_today {
                style = style.add_modifier(Modifier::BOLD | Modifier::UNDERLINED);
            }
            if day.date == app.selected_date {
                style = style.add_modifier(Modifier::REVERSED);
            }
            week_spans.push(Span::styled(format!(" {:2}{} ", day.date.day(), marker), style));

            let day_rect = Rect {
                x: inner.x + (col * 5) as u16,
                y: inner.y + 2 + week_idx as u16,
                width: 5,
                height: 1,
            };
            if day_rect.y < inner.y + inner.height {
                app.calendar_day_rects.push((day.date, day_rect));
            }
        }
        lines.push(Line::from(week_spans));
    }

    frame.render_widget(Paragraph::new(lines), inner);
}

fn draw_day_records(frame: &mut Frame, app: &mut App, area: Rect) {
    app.day_record_items.clear();
    let Some(journal) = app.journal.as_ref() else {
        return;
    };
    let block = Block::default()
        .title(format!("{}", app.selected_date))
        .borders(Borders::ALL);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let records = journal.records_on(app.selected_date);
    if records.is_empty() {
        let empty = Paragraph::new("No reflection on this day.\nPress n to write one.")
            .style(Style::default().fg(Color::Gray));
        frame.render_widget(empty, inner);
        return;
    }

    let mut items = Vec::new();
    for (idx, record) in records.iter().enumerate() {
        let framework = journal.framework(&record.framework_id);
        let color = framework.map(|f| hex_color(&f.color)).unwrap_or(Color::Gray);
        let preview = record
            .ordered_content(framework)
            .into_iter()
            .map(|(_, v)| v)
            .find(|v| !v.trim().is_empty())
            .and_then(|v| v.lines().next().map(str::to_string))
            .unwrap_or_default();
        items.push(ListItem::new(vec![
            Line::from(vec![
                Span::styled(format!("{}. ", idx + 1), Style::default().fg(Color::Yellow)),
                Span::styled(framework_label(journal.frameworks(), &record.framework_id), Style::default().fg(color)),
            ]),
            Line::from(Span::styled(format!("   {preview}"), Style::default().fg(Color::Gray))),
        ]));
        let y = inner.y + (idx as u16) * 2;
        if y + 2 <= inner.y + inner.height {
            app.day_record_items.push((idx, Rect { x: inner.x, y, width: inner.width, height: 2 }));
        }
    }
    frame.render_widget(List::new(items), inner);
}

fn stats_lines(calendar: &MonthlyCalendarData, app: &App) -> Vec<Line<'static>> {
    let stats = &calendar.monthly_stats;
    let mut lines = vec![
        Line::from(Span::styled(
            format!(
                "Total: {} | Days: {} | Avg/day: {:.2} | Streak: {} day(s)",
                stats.total_reflections, stats.unique_dates, stats.average_per_day, stats.consecutive_days
            ),
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from(Span::styled("By framework", Style::default().fg(Color::Yellow))),
    ];

    if stats.framework_breakdown.is_empty() {
        lines.push(Line::from(Span::styled("  (no reflections this month)", Style::default().fg(Color::Gray))));
    }
    let frameworks = app.journal.as_ref().map(|j| j.frameworks()).unwrap_or(&[]);
    for (id, stat) in &stats.framework_breakdown {
        let label = framework_label(frameworks, id);
        let bar = "█".repeat(stat.count.min(30));
        let label_style = if label == UNKNOWN_FRAMEWORK_LABEL {
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC)
        } else {
            Style::default().fg(Color::White)
        };
        lines.push(Line::from(vec![
            Span::styled(format!("  {label:<32} "), label_style),
            Span::styled(bar, Style::default().fg(hex_color(&stat.color))),
            Span::raw(format!(" {}", stat.count)),
        ]));
    }

    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled("By week", Style::default().fg(Color::Yellow))));
    for week in &calendar.weekly_stats {
        let names: Vec<String> = week
            .framework_ids
            .iter()
            .map(|id| {
                frameworks
                    .iter()
                    .find(|f| &f.id == id)
                    .map(|f| f.name.clone())
                    .unwrap_or_else(|| "?".to_string())
            })
            .collect();
        lines.push(Line::from(vec![
            Span::styled(
                format!("  W{} {}-{} ", week.week_number, week.start_date.format("%m/%d"), week.end_date.format("%m/%d")),
                Style::default().fg(Color::Gray),
            ),
            Span::raw(format!("{} active day(s)", week.active_days)),
            Span::styled(
                if names.is_empty() { String::new() } else { format!("  [{}]", names.join(", ")) },
                Style::default().fg(Color::DarkGray),
            ),
        ]));
    }
    lines
}

fn draw_month_stats(frame: &mut Frame, app: &App, area: Rect) {
    let lines = match app.calendar.as_ref() {
        Some(calendar) => stats_lines(calendar, app),
        None => vec![Line::from("No data.")],
    };
    let panel = Paragraph::new(lines)
        .block(Block::default().title("Statistics").borders(Borders::ALL))
        .wrap(Wrap { trim: false });
    frame.render_widget(panel, area);
}

// ----------------------------------------------------------------------------
// Detail
// ----------------------------------------------------------------------------

fn draw_detail(frame: &mut Frame, app: &App, area: Rect) {
    let Some(journal) = app.journal.as_ref() else {
        return;
    };
    let Some(record) = app.detail_record_id.as_deref().and_then(|id| journal.record(id)) else {
        let missing = Paragraph::new("This reflection no longer exists.").block(Block::default().borders(Borders::ALL));
        frame.render_widget(missing, area);
        return;
    };
    let framework = journal.framework(&record.framework_id);
    let color = framework.map(|f| hex_color(&f.color)).unwrap_or(Color::Gray);

    let mut lines = vec![
        Line::from(vec![
            Span::styled(
                framework_label(journal.frameworks(), &record.framework_id),
                Style::default().fg(color).add_modifier(Modifier::BOLD),
            ),
            Span::raw(format!("  {}", record.date)),
        ]),
        Line::from(Span::styled(
            format!("updated {}", record.updated_at.format("%Y-%m-%d %H:%M UTC")),
            Style::default().fg(Color::DarkGray),
        )),
        Line::from(""),
    ];
    for (label, value) in record.ordered_content(framework) {
        lines.push(Line::from(Span::styled(label, Style::default().fg(Color::Yellow))));
        if value.trim().is_empty() {
            lines.push(Line::from(Span::styled("  -", Style::default().fg(Color::DarkGray))));
        } else {
            lines.extend(value.lines().map(|l| Line::from(format!("  {l}"))));
        }
        lines.push(Line::from(""));
    }
    if app.confirm_delete {
        lines.push(Line::from(Span::styled(
            "Delete this reflection? (y/n)",
            Style::default().fg(Color::White).bg(Color::Red).add_modifier(Modifier::BOLD),
        )));
    }

    let panel = Paragraph::new(lines)
        .block(Block::default().title("Reflection").borders(Borders::ALL))
        .wrap(Wrap { trim: false });
    frame.render_widget(panel, area);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_color() {
        assert_eq!(hex_color("#3B82F6"), Color::Rgb(0x3B, 0x82, 0xF6));
        assert_eq!(hex_color("10B981"), Color::Rgb(0x10, 0xB9, 0x81));
        assert_eq!(hex_color("#zzzzzz"), Color::Gray);
        assert_eq!(hex_color("#fff"), Color::Gray);
    }

    #[test]
    fn test_popup_area_is_centered() {
        let area = get_popup_area(100, 50, 60, 30);
        assert_eq!(area, Rect { x: 20, y: 18, width: 60, height: 15 });
    }
}

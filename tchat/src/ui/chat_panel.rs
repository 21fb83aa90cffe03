//! Chat panel rendering (message log + input box).

use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
};

use super::theme;
use crate::app::{App, ChatLine};

/// Render the chat panel (messages + input box).
pub fn render(frame: &mut Frame, area: Rect, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(3)])
        .split(area);

    render_log(frame, chunks[0], app);
    render_input(frame, chunks[1], app);
}

/// Split one delivered line into terminal rows, prefixing the first with
/// its author.
fn rows(line: &ChatLine) -> Vec<Line<'_>> {
    let body_style = if line.is_system() {
        theme::system_message()
    } else {
        theme::normal()
    };
    let author_style = theme::bold().fg(theme::sender_color(&line.author));

    line.body
        .split('\n')
        .enumerate()
        .map(|(i, segment)| {
            if i == 0 {
                Line::from(vec![
                    Span::styled(line.author.as_str(), author_style),
                    Span::raw("> "),
                    Span::styled(segment, body_style),
                ])
            } else {
                Line::from(Span::styled(segment, body_style))
            }
        })
        .collect()
}

/// Render the message log, pinned to the bottom unless scrolled back.
fn render_log(frame: &mut Frame, area: Rect, app: &App) {
    let lines: Vec<Line> = app.log.lines().iter().flat_map(rows).collect();

    let visible = usize::from(area.height.saturating_sub(2));
    let bottom = lines.len().saturating_sub(visible);
    let offset = bottom.saturating_sub(app.scroll_back);
    let offset = u16::try_from(offset).unwrap_or(u16::MAX);

    let title = format!("Chat with {}", app.destination);
    let block = Block::default()
        .title(Span::styled(title, theme::panel_title(theme::CHAT_TITLE)))
        .borders(Borders::ALL)
        .border_style(theme::normal());

    let paragraph = Paragraph::new(lines).block(block).scroll((offset, 0));
    frame.render_widget(paragraph, area);
}

/// Render the input box.
fn render_input(frame: &mut Frame, area: Rect, app: &App) {
    let mut display_text = app.input.clone();
    let cursor_byte = display_text
        .char_indices()
        .nth(app.cursor_position)
        .map_or(display_text.len(), |(i, _)| i);
    display_text.insert(cursor_byte, '█');

    let input_line = if app.input.is_empty() && !app.sending {
        Line::from(vec![
            Span::styled("█", theme::input_cursor()),
            Span::styled(" Type a message...", theme::dimmed()),
        ])
    } else {
        Line::from(Span::styled(display_text, theme::normal()))
    };

    let title = if app.sending { "Sending..." } else { "Input" };
    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(if app.sending {
            theme::dimmed()
        } else {
            theme::highlighted()
        });

    let paragraph = Paragraph::new(input_line).block(block);
    frame.render_widget(paragraph, area);
}

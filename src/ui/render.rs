//! Render functions for the TUI.
//!
//! Lays out the tag bar, the dish card and the status bar, then draws the
//! delete confirmation on top when it is open.

use crate::app::App;
use dishdeck::api::Tag;
use dishdeck::query::QueryStatus;
use dishdeck::util::{sanitize, truncate_to_width};
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};

use super::{card, status};

/// Minimum terminal dimensions required for normal operation.
pub(super) const MIN_WIDTH: u16 = 40;
pub(super) const MIN_HEIGHT: u16 = 10;

/// Longest tag name shown in the tag bar.
const MAX_TAG_WIDTH: usize = 20;

/// Main render dispatch function.
pub(super) fn render(f: &mut Frame, app: &App) {
    let area = f.area();

    if area.width < 1 || area.height < 1 {
        return;
    }

    if area.width < MIN_WIDTH || area.height < MIN_HEIGHT {
        let msg = if area.height < 3 || area.width < 20 {
            Paragraph::new("Too small")
        } else {
            Paragraph::new(format!(
                "Terminal too small\n\nMinimum: {}x{}\nCurrent: {}x{}",
                MIN_WIDTH, MIN_HEIGHT, area.width, area.height
            ))
            .alignment(Alignment::Center)
        };
        f.render_widget(msg, area);
        return;
    }

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(0),
            Constraint::Length(1),
        ])
        .split(area);

    render_tag_bar(f, app, chunks[0]);
    card::render(f, app, chunks[1]);
    status::render(f, app, chunks[2]);

    if let Some(tag) = &app.pending_delete {
        render_confirm_overlay(f, tag);
    }
}

/// One line of tag names with the active tag highlighted.
fn render_tag_bar(f: &mut Frame, app: &App, area: Rect) {
    let line = match app.tags_status {
        QueryStatus::Pending => Line::from(Span::styled(
            "Loading tags...",
            Style::default().fg(Color::DarkGray),
        )),
        QueryStatus::Error => Line::from(Span::styled(
            "Tags unavailable, [r] to retry",
            Style::default().fg(Color::Red),
        )),
        QueryStatus::Success => {
            let mut spans = Vec::with_capacity(app.tags.len() * 2);
            for (i, tag) in app.tags.iter().enumerate() {
                if i > 0 {
                    spans.push(Span::raw(" "));
                }
                let name = sanitize(&tag.name);
                let label = format!(" {} ", truncate_to_width(&name, MAX_TAG_WIDTH));
                let style = if app.tag_cursor == Some(i) {
                    Style::default()
                        .fg(Color::Black)
                        .bg(Color::Yellow)
                        .add_modifier(Modifier::BOLD)
                } else {
                    Style::default().fg(Color::Gray)
                };
                spans.push(Span::styled(label, style));
            }
            Line::from(spans)
        }
    };

    f.render_widget(Paragraph::new(line), area);
}

/// Render the delete confirmation centered on screen.
fn render_confirm_overlay(f: &mut Frame, tag: &Tag) {
    let area = f.area();

    let text = format!(
        "Delete tag \"{}\"?\n\nThe tag is removed on the server.\n\n(y) Confirm  (n/Esc) Cancel",
        sanitize(&tag.name)
    );

    let width = 50u16.min(area.width.saturating_sub(4));
    let height = 7u16.min(area.height.saturating_sub(4));
    let x = area.x + (area.width.saturating_sub(width)) / 2;
    let y = area.y + (area.height.saturating_sub(height)) / 2;
    let overlay = Rect::new(x, y, width, height);

    if overlay.width < 10 || overlay.height < 5 {
        return;
    }

    f.render_widget(Clear, overlay);

    let paragraph = Paragraph::new(text)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Red))
                .title(" Confirm "),
        )
        .alignment(Alignment::Center);

    f.render_widget(paragraph, overlay);
}

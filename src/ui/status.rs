use crate::app::App;
use ratatui::{
    layout::Rect,
    style::{Color, Style},
    widgets::Paragraph,
    Frame,
};
use std::borrow::Cow;

/// Render the status bar
pub fn render(f: &mut Frame, app: &App, area: Rect) {
    if area.width < 1 || area.height < 1 {
        return;
    }

    let text: Cow<'_, str> = if let Some((msg, _)) = &app.status_message {
        Cow::Borrowed(msg.as_ref())
    } else if app.pending_delete.is_some() {
        Cow::Borrowed("[y] delete tag [n] cancel")
    } else if app.front_side {
        Cow::Borrowed("[j/k] dish [h/l] tag [space] flip [g] first [r] retry [x] delete tag [q] quit")
    } else {
        Cow::Borrowed("[space/Esc] flip back [+/-] servings [q] quit")
    };

    let style = Style::default().bg(Color::DarkGray).fg(Color::White);

    let paragraph = Paragraph::new(text).style(style);
    f.render_widget(paragraph, area);
}

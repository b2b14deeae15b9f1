use crate::app::App;
use dishdeck::api::Dish;
use dishdeck::feed::Direction;
use dishdeck::query::QueryResult;
use dishdeck::util::{sanitize, truncate_to_width};
use ratatui::{
    layout::{Alignment, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};

use super::loop_runner::SPINNER_FRAMES;

const SPINNER: [&str; SPINNER_FRAMES] = ["|", "/", "-", "\\"];

/// What the card area shows.
enum Card<'a> {
    Front(&'a Dish),
    Back(&'a Dish),
    /// Past the last dish of an exhausted feed.
    End,
    /// Waiting for the first page, or for the page after the last dish.
    Loading,
    /// The page after the last dish failed; loaded dishes stay browsable.
    MoreFailed(&'a str),
    /// The first page failed.
    Failed(&'a str),
    NoDishes,
    NoTag,
}

/// Render the dish card
pub fn render(f: &mut Frame, app: &App, area: Rect) {
    if area.width < 3 || area.height < 3 {
        return;
    }

    let card = if app.feed.active_tag().is_none() {
        Card::NoTag
    } else {
        QueryResult::create(app.feed.status())
            .on_success(loaded_card(app))
            .on_error(Card::Failed(app.feed.last_error().unwrap_or("unknown error")))
            .build()
            .unwrap_or(Card::Loading)
    };

    let title = match &card {
        Card::Front(dish) | Card::Back(dish) => {
            let name = sanitize(&dish.name);
            let max = (area.width as usize).saturating_sub(4);
            format!(" {} ", truncate_to_width(&name, max))
        }
        _ => String::from(" dishdeck "),
    };

    let text = match card {
        Card::Front(dish) => front_text(app, dish),
        Card::Back(dish) => back_text(dish, app.servings),
        Card::End => centered(vec![
            Line::from(Span::styled(
                "That's all the dishes for this tag",
                Style::default().add_modifier(Modifier::BOLD),
            )),
            Line::from(""),
            Line::from("[g] back to the first dish"),
        ]),
        Card::Loading => centered(vec![Line::from(format!(
            "{} Loading dishes...",
            SPINNER[app.spinner_frame % SPINNER_FRAMES]
        ))]),
        Card::MoreFailed(error) => centered(vec![
            Line::from(Span::styled(
                format!("Couldn't load more dishes: {}", error),
                Style::default().fg(Color::Red),
            )),
            Line::from(""),
            Line::from("[r] retry  [k] back"),
        ]),
        Card::Failed(error) => centered(vec![
            Line::from(Span::styled(
                format!("Failed to load dishes: {}", error),
                Style::default().fg(Color::Red),
            )),
            Line::from(""),
            Line::from("[r] retry"),
        ]),
        Card::NoDishes => centered(vec![Line::from("No dishes for this tag")]),
        Card::NoTag => centered(vec![Line::from("No tag selected")]),
    };

    let paragraph = Paragraph::new(text)
        .block(Block::default().borders(Borders::ALL).title(title))
        .wrap(Wrap { trim: false });
    f.render_widget(paragraph, area);
}

/// The card for a feed whose first page loaded.
fn loaded_card(app: &App) -> Card<'_> {
    if app.past_end {
        if app.feed.is_exhausted() {
            return Card::End;
        }
        if !app.feed.is_fetching() {
            if let Some(error) = app.feed.edge_error(Direction::Forward) {
                return Card::MoreFailed(error);
            }
        }
        return Card::Loading;
    }

    match app.active_dish() {
        Some(dish) if app.front_side => Card::Front(dish),
        Some(dish) => Card::Back(dish),
        None => Card::NoDishes,
    }
}

fn centered(lines: Vec<Line<'static>>) -> Text<'static> {
    Text::from(lines).alignment(Alignment::Center)
}

fn front_text(app: &App, dish: &Dish) -> Text<'static> {
    let dim = Style::default().fg(Color::DarkGray);
    let mut lines = vec![
        Line::from(Span::styled(
            sanitize(&dish.name).into_owned(),
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
    ];

    match &dish.image {
        Some(url) => lines.push(Line::from(vec![
            Span::styled("Image: ", dim),
            Span::raw(sanitize(url).into_owned()),
        ])),
        None => lines.push(Line::from(Span::styled("No image", dim))),
    }

    if !dish.tags.is_empty() {
        let names: Vec<String> = dish
            .tags
            .iter()
            .map(|t| sanitize(&t.name).into_owned())
            .collect();
        lines.push(Line::from(vec![
            Span::styled("Tags: ", dim),
            Span::raw(names.join(", ")),
        ]));
    }

    lines.push(Line::from(""));
    if let Some(index) = app.feed.active_index() {
        let more = if app.feed.is_exhausted() { "" } else { "+" };
        lines.push(Line::from(Span::styled(
            format!("Dish {} of {}{}", index + 1, app.feed.len(), more),
            dim,
        )));
    }
    lines.push(Line::from(Span::styled("[space] flip for the recipe", dim)));

    Text::from(lines)
}

fn back_text(dish: &Dish, servings: u32) -> Text<'static> {
    let heading = Style::default()
        .fg(Color::Yellow)
        .add_modifier(Modifier::BOLD);
    let title = match servings {
        1 => String::from("Ingredients"),
        n => format!("Ingredients (x{n})"),
    };
    let mut lines = vec![Line::from(Span::styled(title, heading))];

    if dish.ingredients.is_empty() {
        lines.push(Line::from("  (none listed)"));
    }
    for ingredient in &dish.ingredients {
        lines.push(Line::from(format!(
            "  • {}",
            sanitize(&ingredient.display(f64::from(servings)))
        )));
    }

    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled("Recipe", heading)));
    match &dish.recipe {
        Some(recipe) => {
            for line in sanitize(recipe).lines() {
                lines.push(Line::from(line.to_string()));
            }
        }
        None => lines.push(Line::from("  (no recipe)")),
    }

    Text::from(lines)
}

//! Input handling for the TUI.
//!
//! Keys map directly onto `App` operations; the tag-delete confirmation
//! captures all keys while it is open.

use crossterm::event::{KeyCode, KeyModifiers};
use dishdeck::api::ApiClient;
use dishdeck::query::QueryStatus;
use tokio::sync::mpsc;

use crate::app::{App, AppEvent};

use super::events::{spawn_delete_tag, spawn_load_tags};
use super::Action;

/// Main input dispatch function.
pub(super) fn handle_input(
    app: &mut App,
    api: &ApiClient,
    code: KeyCode,
    modifiers: KeyModifiers,
    event_tx: &mpsc::Sender<AppEvent>,
) -> Action {
    if modifiers.contains(KeyModifiers::CONTROL) && code == KeyCode::Char('c') {
        return Action::Quit;
    }

    if app.pending_delete.is_some() {
        handle_confirm_input(app, api, code, event_tx);
        return Action::Continue;
    }

    match code {
        KeyCode::Char('q') => return Action::Quit,

        KeyCode::Char('j') | KeyCode::Down => app.next_dish(),
        KeyCode::Char('k') | KeyCode::Up => app.prev_dish(),
        KeyCode::Char('g') | KeyCode::Home => app.go_first(),
        KeyCode::Char(' ') | KeyCode::Char('f') | KeyCode::Enter => app.flip(),
        KeyCode::Esc if !app.front_side => app.flip(),

        KeyCode::Char('l') | KeyCode::Right => {
            app.switch_tag(1);
        }
        KeyCode::Char('h') | KeyCode::Left => {
            app.switch_tag(-1);
        }
        KeyCode::Char('x') | KeyCode::Delete => app.request_delete(),

        KeyCode::Char('+') | KeyCode::Char('=') => {
            app.change_servings(1);
        }
        KeyCode::Char('-') => {
            app.change_servings(-1);
        }

        KeyCode::Char('r') => handle_retry(app, api, event_tx),

        _ => {}
    }
    Action::Continue
}

/// Reload the tag list if it failed, then retry the feed.
fn handle_retry(app: &mut App, api: &ApiClient, event_tx: &mpsc::Sender<AppEvent>) {
    let mut retried = false;
    if app.tags_status == QueryStatus::Error {
        app.tags_status = QueryStatus::Pending;
        spawn_load_tags(api, event_tx);
        retried = true;
    }
    if app.retry() {
        retried = true;
    }
    if !retried {
        app.set_status("Nothing to retry");
    }
}

/// Handle input while the delete confirmation is visible.
///
/// y/Y confirms the delete, n/N/Esc cancels.
fn handle_confirm_input(
    app: &mut App,
    api: &ApiClient,
    code: KeyCode,
    event_tx: &mpsc::Sender<AppEvent>,
) {
    match code {
        KeyCode::Char('y') | KeyCode::Char('Y') => {
            if let Some(tag) = app.confirm_delete() {
                spawn_delete_tag(api, tag, event_tx);
            }
        }
        KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => app.cancel_delete(),
        _ => {}
    }
}

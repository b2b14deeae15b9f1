//! Background tasks that are not page fetches, and their completion events.

use dishdeck::api::{ApiClient, Tag};
use tokio::sync::mpsc;

use crate::app::{App, AppEvent};

/// Apply a background task result to the app state.
pub(super) fn handle_app_event(app: &mut App, event: AppEvent) {
    match event {
        AppEvent::TagsLoaded(result) => app.tags_loaded(result),
        AppEvent::TagDeleted { tag, result } => app.tag_deleted(tag, result),
    }
}

/// Fetch the tag list and report it as `AppEvent::TagsLoaded`.
pub(super) fn spawn_load_tags(api: &ApiClient, event_tx: &mpsc::Sender<AppEvent>) {
    let api = api.clone();
    let tx = event_tx.clone();
    tokio::spawn(async move {
        let result = api.tags().await.map_err(|e| e.to_string());
        if let Err(e) = tx.send(AppEvent::TagsLoaded(result)).await {
            tracing::warn!(error = %e, event = "TagsLoaded", "Channel send failed (receiver dropped)");
        }
    });
}

pub(super) fn spawn_delete_tag(api: &ApiClient, tag: Tag, event_tx: &mpsc::Sender<AppEvent>) {
    let api = api.clone();
    let tx = event_tx.clone();
    tokio::spawn(async move {
        let result = api.delete_tag(tag.id).await.map_err(|e| {
            tracing::error!(error = %e, tag = tag.id, "Failed to delete tag");
            e.to_string()
        });
        if let Err(e) = tx.send(AppEvent::TagDeleted { tag, result }).await {
            tracing::warn!(error = %e, event = "TagDeleted", "Channel send failed (receiver dropped)");
        }
    });
}

//! Last-viewed position per tag, kept across sessions.
//!
//! Positions live in the `user_preferences` table under `position.tag.<id>`
//! as JSON, plus `position.last_tag` for the tag that was active last. The
//! whole set is loaded into memory at startup so reads are synchronous;
//! writes update the map and go to a single background writer task, which
//! applies them in call order.
//!
//! If storage is unavailable the store degrades: `get` returns `None`, `set`
//! does nothing, and the feed simply starts at index 0.
use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::schema::Database;
use crate::api::TagId;

const TAG_PREFIX: &str = "position.tag.";
const LAST_TAG_KEY: &str = "position.last_tag";

/// The last index viewed within a tag's feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub tag: TagId,
    pub index: usize,
}

enum Write {
    Position(Position),
    LastTag(TagId),
}

struct Writer {
    tx: mpsc::UnboundedSender<Write>,
    handle: JoinHandle<()>,
}

pub struct PositionStore {
    positions: HashMap<TagId, usize>,
    last_tag: Option<TagId>,
    writer: Option<Writer>,
}

impl PositionStore {
    /// Load every stored position and start the writer task.
    ///
    /// Never fails: a failed load is logged and yields an unavailable store.
    pub async fn load(db: &Database) -> Self {
        let rows = match db.get_preferences_by_prefix("position.").await {
            Ok(rows) => rows,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to load saved positions, position memory disabled");
                return Self::unavailable();
            }
        };

        let mut positions = HashMap::new();
        let mut last_tag = None;
        for (key, value) in rows {
            if key == LAST_TAG_KEY {
                last_tag = value.parse().ok();
            } else if key.starts_with(TAG_PREFIX) {
                match serde_json::from_str::<Position>(&value) {
                    Ok(position) => {
                        positions.insert(position.tag, position.index);
                    }
                    Err(e) => {
                        tracing::warn!(key = %key, error = %e, "Skipping malformed saved position");
                    }
                }
            }
        }

        tracing::debug!(count = positions.len(), ?last_tag, "Loaded saved positions");

        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(run_writer(db.clone(), rx));

        Self {
            positions,
            last_tag,
            writer: Some(Writer { tx, handle }),
        }
    }

    /// A store with no backing storage: remembers nothing.
    pub fn unavailable() -> Self {
        Self {
            positions: HashMap::new(),
            last_tag: None,
            writer: None,
        }
    }

    pub fn is_available(&self) -> bool {
        self.writer.is_some()
    }

    /// Saved position for `tag`, or `None` if the tag was never viewed.
    pub fn get(&self, tag: TagId) -> Option<Position> {
        self.positions
            .get(&tag)
            .map(|&index| Position { tag, index })
    }

    /// Overwrite the saved position for `position.tag`.
    pub fn set(&mut self, position: Position) {
        if self.writer.is_none() {
            return;
        }
        if self.positions.get(&position.tag) == Some(&position.index) {
            return;
        }
        self.positions.insert(position.tag, position.index);
        self.queue(Write::Position(position));
    }

    /// Tag that was active most recently.
    pub fn last_tag(&self) -> Option<TagId> {
        self.last_tag
    }

    pub fn remember_tag(&mut self, tag: TagId) {
        if self.writer.is_none() || self.last_tag == Some(tag) {
            return;
        }
        self.last_tag = Some(tag);
        self.queue(Write::LastTag(tag));
    }

    /// Wait for every queued write to land.
    pub async fn flush(self) {
        if let Some(Writer { tx, handle }) = self.writer {
            drop(tx);
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "Position writer task failed");
            }
        }
    }

    fn queue(&mut self, write: Write) {
        let Some(writer) = self.writer.as_ref() else {
            return;
        };
        if writer.tx.send(write).is_err() {
            tracing::warn!("Position writer stopped, position memory disabled");
            self.writer = None;
        }
    }
}

async fn run_writer(db: Database, mut rx: mpsc::UnboundedReceiver<Write>) {
    while let Some(write) = rx.recv().await {
        let result = match &write {
            Write::Position(position) => match serde_json::to_string(position) {
                Ok(value) => {
                    let key = format!("{}{}", TAG_PREFIX, position.tag);
                    db.set_preference(&key, &value).await
                }
                Err(e) => Err(e.into()),
            },
            Write::LastTag(tag) => db.set_preference(LAST_TAG_KEY, &tag.to_string()).await,
        };

        if let Err(e) = result {
            tracing::warn!(error = %e, "Failed to save position");
        }
    }
    tracing::debug!("Position writer finished");
}

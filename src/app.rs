use std::borrow::Cow;
use std::time::Instant;

use dishdeck::api::{ApiClient, Dish, Tag, TagId};
use dishdeck::feed::{Direction, FeedController, PageFetched, PageSource};
use dishdeck::query::QueryStatus;

/// Results of background tasks that are not page fetches.
pub enum AppEvent {
    TagsLoaded(Result<Vec<Tag>, String>),
    /// A tag delete finished.
    ///
    /// Fields:
    /// - `tag`: The tag that was deleted
    /// - `result`: Unit or the error from the API
    TagDeleted {
        tag: Tag,
        result: Result<(), String>,
    },
}

pub const MAX_SERVINGS: u32 = 12;

// ============================================================================
// Application State
// ============================================================================

/// Central application state
pub struct App<S: PageSource<Item = Dish> = ApiClient> {
    pub feed: FeedController<S>,

    // Tags
    pub tags: Vec<Tag>,
    pub tags_status: QueryStatus,
    /// Index into `tags` of the active tag, if it is in the list.
    pub tag_cursor: Option<usize>,
    pub pending_delete: Option<Tag>,

    // Card
    pub front_side: bool,
    /// Ingredient amounts on the back are scaled by this many servings.
    pub servings: u32,
    /// The cursor moved past the last loaded dish (end or loading card).
    pub past_end: bool,
    pub spinner_frame: usize,

    // UI state
    pub status_message: Option<(Cow<'static, str>, Instant)>,
    pub needs_redraw: bool,
}

impl<S: PageSource<Item = Dish>> App<S> {
    pub fn new(feed: FeedController<S>) -> Self {
        Self {
            feed,
            tags: Vec::new(),
            tags_status: QueryStatus::Pending,
            tag_cursor: None,
            pending_delete: None,
            front_side: true,
            servings: 1,
            past_end: false,
            spinner_frame: 0,
            status_message: None,
            needs_redraw: true,
        }
    }

    /// Flush position memory. Call once the event loop has stopped.
    pub async fn shutdown(self) {
        self.feed.shutdown().await;
    }

    // ========================================================================
    // Dish navigation
    // ========================================================================

    /// The dish on the card, `None` when the end or loading card is shown.
    pub fn active_dish(&self) -> Option<&Dish> {
        if self.past_end {
            return None;
        }
        self.feed.active_item()
    }

    pub fn next_dish(&mut self) {
        if !self.can_move() || self.past_end {
            return;
        }
        let Some(index) = self.feed.active_index() else {
            return;
        };

        if index + 1 < self.feed.len() {
            self.feed.set_active_index(index + 1);
        } else {
            self.past_end = true;
        }
        self.prefetch_at_edges();
    }

    pub fn prev_dish(&mut self) {
        if !self.can_move() {
            return;
        }
        if self.past_end {
            self.past_end = false;
            return;
        }
        let Some(index) = self.feed.active_index() else {
            return;
        };

        if index > 0 {
            self.feed.set_active_index(index - 1);
        }
        self.prefetch_at_edges();
    }

    /// Jump back to the first loaded dish.
    pub fn go_first(&mut self) {
        if self.feed.is_empty() {
            return;
        }
        self.past_end = false;
        self.front_side = true;
        self.feed.set_active_index(0);
        self.prefetch_at_edges();
    }

    pub fn flip(&mut self) {
        if self.active_dish().is_some() {
            self.front_side = !self.front_side;
        }
    }

    /// Scale ingredient amounts up or down by `delta` servings, within
    /// `1..=MAX_SERVINGS`. Returns true if the count changed.
    pub fn change_servings(&mut self, delta: i32) -> bool {
        let next = self
            .servings
            .saturating_add_signed(delta)
            .clamp(1, MAX_SERVINGS);
        if next == self.servings {
            return false;
        }
        self.servings = next;
        self.set_status(format!("Servings: {next}"));
        true
    }

    /// Retry whatever failed last in the feed. Returns true if a fetch or
    /// state change resulted.
    pub fn retry(&mut self) -> bool {
        let retried = self.feed.retry();
        if retried {
            self.set_status("Retrying...");
            self.prefetch_at_edges();
        }
        retried
    }

    /// Apply a page result from the feed channel.
    pub fn handle_page(&mut self, msg: PageFetched<Dish>) {
        if !self.feed.handle_page(msg) {
            return;
        }
        self.needs_redraw = true;

        // Waiting on the loading card: step onto the first new dish.
        if self.past_end {
            if let Some(index) = self.feed.active_index() {
                if index + 1 < self.feed.len() {
                    self.feed.set_active_index(index + 1);
                    self.past_end = false;
                }
            }
        }
        self.prefetch_at_edges();
    }

    fn can_move(&mut self) -> bool {
        if !self.front_side {
            self.set_status("Flip the card back to browse");
            return false;
        }
        true
    }

    /// Request adjacent pages once the cursor sits on a loaded edge.
    fn prefetch_at_edges(&mut self) {
        let (at_start, at_end) = self.feed.edges();
        if at_end {
            self.feed.advance(Direction::Forward);
        }
        if at_start {
            self.feed.advance(Direction::Backward);
        }
    }

    // ========================================================================
    // Tags
    // ========================================================================

    pub fn selected_tag(&self) -> Option<&Tag> {
        self.tag_cursor.and_then(|i| self.tags.get(i))
    }

    pub fn tags_loaded(&mut self, result: Result<Vec<Tag>, String>) {
        let tags = match result {
            Ok(tags) => tags,
            Err(e) => {
                self.tags_status = QueryStatus::Error;
                self.set_status(format!("Failed to load tags: {}", e));
                return;
            }
        };

        tracing::debug!(count = tags.len(), "Tags loaded");
        self.tags_status = QueryStatus::Success;
        self.tags = tags;

        match self.feed.active_tag() {
            Some(active) => {
                self.tag_cursor = self.tags.iter().position(|t| t.id == active);
            }
            None => match self.tags.first() {
                Some(first) => {
                    let id = first.id;
                    self.tag_cursor = Some(0);
                    self.activate(id);
                }
                None => self.set_status("No tags available"),
            },
        }
    }

    /// Move the tag selection by `delta` and activate the new tag.
    pub fn switch_tag(&mut self, delta: isize) -> bool {
        let Some(last) = self.tags.len().checked_sub(1) else {
            return false;
        };
        let target = match self.tag_cursor {
            Some(i) => i.saturating_add_signed(delta).min(last),
            None => 0,
        };
        if self.tag_cursor == Some(target) {
            return false;
        }

        self.tag_cursor = Some(target);
        let id = self.tags[target].id;
        self.activate(id);
        true
    }

    pub fn request_delete(&mut self) {
        match self.selected_tag().cloned() {
            Some(tag) => self.pending_delete = Some(tag),
            None => self.set_status("No tag selected"),
        }
    }

    /// Take the confirmed tag for deletion.
    pub fn confirm_delete(&mut self) -> Option<Tag> {
        let tag = self.pending_delete.take()?;
        self.set_status(format!("Deleting {}...", tag.name));
        Some(tag)
    }

    pub fn cancel_delete(&mut self) {
        self.pending_delete = None;
        self.set_status("Cancelled");
    }

    /// Drop a deleted tag from the list. If it was the active tag, its
    /// neighbour becomes active.
    pub fn tag_deleted(&mut self, tag: Tag, result: Result<(), String>) {
        if let Err(e) = result {
            self.set_status(format!("Failed to delete {}: {}", tag.name, e));
            return;
        }
        self.set_status(format!("Deleted {}", tag.name));

        let Some(pos) = self.tags.iter().position(|t| t.id == tag.id) else {
            return;
        };
        self.tags.remove(pos);
        let was_active = self.feed.active_tag() == Some(tag.id);

        if !was_active {
            let active = self.feed.active_tag();
            self.tag_cursor = active.and_then(|a| self.tags.iter().position(|t| t.id == a));
            return;
        }

        match self.tags.len().checked_sub(1) {
            Some(last) => {
                let next = pos.min(last);
                self.tag_cursor = Some(next);
                let id = self.tags[next].id;
                self.activate(id);
            }
            None => {
                self.tag_cursor = None;
                self.feed.deactivate();
                self.front_side = true;
                self.past_end = false;
            }
        }
    }

    fn activate(&mut self, tag: TagId) {
        self.feed.activate(tag);
        self.front_side = true;
        self.past_end = false;
    }

    // ========================================================================
    // Status bar
    // ========================================================================

    pub fn set_status(&mut self, msg: impl Into<Cow<'static, str>>) {
        self.status_message = Some((msg.into(), Instant::now()));
    }

    /// Clear status message if expired (older than 3 seconds)
    /// Returns true if a message was actually cleared
    pub fn clear_expired_status(&mut self) -> bool {
        if let Some((_, time)) = &self.status_message {
            if time.elapsed().as_secs() >= 3 {
                self.status_message = None;
                return true;
            }
        }
        false
    }
}

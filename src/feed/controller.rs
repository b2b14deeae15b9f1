use std::collections::HashMap;

use tokio::sync::mpsc;

use crate::api::{FetchError, TagId};
use crate::query::QueryStatus;
use crate::storage::{Position, PositionStore};

use super::page::{Page, PageSource};
use super::state::{FeedState, Placement};

/// Direction of travel through the feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

/// Why a page was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchKind {
    /// Page 0 after `activate` or `retry`.
    Initial,
    /// Adjacent page after the cursor reached an edge.
    Edge(Direction),
}

/// Result of a spawned page fetch, sent back to the controller's owner.
///
/// Fields:
/// - `tag`: The tag the page was requested for
/// - `generation`: The activation generation when the fetch was spawned
/// - `page`: Requested page index
/// - `kind`: Why it was requested
/// - `result`: The page, or the error from fetching
#[derive(Debug)]
pub struct PageFetched<T> {
    pub tag: TagId,
    pub generation: u64,
    pub page: u32,
    pub kind: FetchKind,
    pub result: Result<Page<T>, FetchError>,
}

/// Everything that lives exactly as long as one activation.
struct Session<T> {
    feed: FeedState<T>,
    status: QueryStatus,
    in_flight: HashMap<u32, FetchKind>,
    /// Why the first page failed; cleared when it loads.
    first_error: Option<String>,
    /// A failed edge fetch halts its direction until `retry`.
    forward_error: Option<String>,
    backward_error: Option<String>,
    /// Index to restore once enough pages are loaded.
    restore_target: Option<usize>,
}

impl<T> Session<T> {
    fn new(tag: TagId, restore_target: usize) -> Self {
        Self {
            feed: FeedState::new(tag),
            status: QueryStatus::Pending,
            in_flight: HashMap::new(),
            first_error: None,
            forward_error: None,
            backward_error: None,
            restore_target: Some(restore_target),
        }
    }

    fn fetching(&self, direction: Direction) -> bool {
        self.in_flight
            .values()
            .any(|kind| *kind == FetchKind::Edge(direction))
    }

    fn edge_error(&self, direction: Direction) -> Option<&str> {
        match direction {
            Direction::Forward => self.forward_error.as_deref(),
            Direction::Backward => self.backward_error.as_deref(),
        }
    }

    fn halted(&self, direction: Direction) -> bool {
        self.edge_error(direction).is_some()
    }

    /// Stop fetching in `direction` until `retry`.
    fn halt(&mut self, direction: Direction, error: String) {
        match direction {
            Direction::Forward => {
                self.forward_error = Some(error);
                self.restore_target = None;
            }
            Direction::Backward => self.backward_error = Some(error),
        }
    }
}

/// Owns the feed for the active tag and mediates every page fetch.
///
/// Fetches run on spawned tasks and report back through the `PageFetched`
/// channel; the owner passes each message to [`FeedController::handle_page`].
/// Every message carries the generation it was spawned under, and
/// `activate` bumps the generation, so results for a previous tag are
/// dropped on arrival instead of leaking into the new feed.
///
/// No operation returns an error: failures show up through `status()`,
/// `last_error()` and `edge_error()`.
pub struct FeedController<S: PageSource> {
    source: S,
    positions: PositionStore,
    event_tx: mpsc::Sender<PageFetched<S::Item>>,
    generation: u64,
    session: Option<Session<S::Item>>,
}

impl<S: PageSource> FeedController<S> {
    pub fn new(
        source: S,
        positions: PositionStore,
        event_tx: mpsc::Sender<PageFetched<S::Item>>,
    ) -> Self {
        Self {
            source,
            positions,
            event_tx,
            generation: 0,
            session: None,
        }
    }

    // ========================================================================
    // Operations
    // ========================================================================

    /// Make `tag` the active filter.
    ///
    /// Drops every cached page, requests page 0, and restores the cursor
    /// from the position store (index 0 if nothing was recorded).
    pub fn activate(&mut self, tag: TagId) {
        self.generation = self.generation.wrapping_add(1);

        let restore = self.positions.get(tag).map(|p| p.index).unwrap_or(0);
        self.positions.remember_tag(tag);
        self.session = Some(Session::new(tag, restore));

        tracing::info!(
            tag,
            restore_index = restore,
            generation = self.generation,
            "Activating feed"
        );
        self.spawn_fetch(0, FetchKind::Initial);
    }

    /// Drop the active feed without activating another one, e.g. after
    /// its tag was deleted. Results still in flight are discarded.
    pub fn deactivate(&mut self) {
        if self.session.take().is_some() {
            self.generation = self.generation.wrapping_add(1);
            tracing::debug!(generation = self.generation, "Feed deactivated");
        }
    }

    /// Request the page beyond the loaded edge in `direction`.
    ///
    /// Returns true if a fetch was issued. A no-op while the first page is
    /// outstanding, while a fetch in that direction is in flight, after a
    /// failed fetch halted that direction, or when the server reported no
    /// further page.
    pub fn advance(&mut self, direction: Direction) -> bool {
        let Some(session) = self.session.as_ref() else {
            return false;
        };
        if session.status != QueryStatus::Success {
            return false;
        }
        if session.fetching(direction) {
            tracing::trace!(?direction, "Edge fetch already in flight");
            return false;
        }
        if session.halted(direction) {
            tracing::trace!(?direction, "Direction halted after a failed fetch");
            return false;
        }

        let target = match direction {
            Direction::Forward if session.feed.has_next() => session
                .feed
                .last_page()
                .and_then(|p| p.index.checked_add(1)),
            Direction::Backward if session.feed.has_previous() => session
                .feed
                .first_page()
                .and_then(|p| p.index.checked_sub(1)),
            _ => {
                tracing::trace!(
                    tag = session.feed.tag(),
                    ?direction,
                    "No further pages in this direction"
                );
                None
            }
        };

        match target {
            Some(page) => self.spawn_fetch(page, FetchKind::Edge(direction)),
            None => false,
        }
    }

    /// Move the cursor and persist it for the active tag.
    ///
    /// Clamped to the loaded items; returns the index actually set, or
    /// `None` when nothing is loaded. Cancels any pending position restore.
    pub fn set_active_index(&mut self, index: usize) -> Option<usize> {
        let session = self.session.as_mut()?;
        let index = session.feed.set_active_index(index)?;
        session.restore_target = None;

        let tag = session.feed.tag();
        self.positions.set(Position { tag, index });
        Some(index)
    }

    /// Recover from failures.
    ///
    /// After a first-page failure this re-requests page 0; the status stays
    /// `Error` until that fetch resolves. Once the feed is loaded it clears
    /// halted directions so the next edge reach fetches again. Returns true
    /// if anything changed.
    pub fn retry(&mut self) -> bool {
        let Some(session) = self.session.as_mut() else {
            return false;
        };

        match session.status {
            QueryStatus::Error => {
                tracing::info!(tag = session.feed.tag(), "Retrying first page");
                self.spawn_fetch(0, FetchKind::Initial)
            }
            QueryStatus::Success => {
                let halted = session.forward_error.take().is_some();
                session.backward_error.take().is_some() || halted
            }
            QueryStatus::Pending => false,
        }
    }

    /// Apply the result of a spawned fetch.
    ///
    /// Returns false when the message was discarded as stale.
    pub fn handle_page(&mut self, msg: PageFetched<S::Item>) -> bool {
        let PageFetched {
            tag,
            generation,
            page,
            kind,
            result,
        } = msg;

        let current = self.generation;
        let Some(session) = self.session.as_mut() else {
            tracing::debug!(tag, page, "Discarding page result - no active feed");
            return false;
        };

        if generation != current || tag != session.feed.tag() {
            tracing::debug!(
                tag,
                page,
                expected = current,
                got = generation,
                "Ignoring stale page result (generation mismatch)"
            );
            return false;
        }

        session.in_flight.remove(&page);

        let result = result.and_then(|fetched| match kind {
            FetchKind::Edge(_) if fetched.current_page != page => {
                Err(FetchError::UnexpectedPage {
                    requested: page,
                    got: fetched.current_page,
                })
            }
            _ => Ok(fetched),
        });

        match result {
            Ok(fetched) => {
                let got = fetched.current_page;
                let placement = session.feed.insert_page(fetched);
                tracing::debug!(
                    tag,
                    page,
                    ?placement,
                    items = session.feed.len(),
                    "Page loaded"
                );
                match kind {
                    FetchKind::Initial => {
                        session.status = QueryStatus::Success;
                        session.first_error = None;
                    }
                    FetchKind::Edge(direction) => {
                        if matches!(placement, Placement::Duplicate | Placement::Detached) {
                            // Refetching would get the same page back
                            let e = FetchError::UnexpectedPage {
                                requested: page,
                                got,
                            };
                            tracing::warn!(tag, page, ?direction, error = %e, "Edge page not adjacent, halting");
                            session.halt(direction, e.to_string());
                            return true;
                        }
                    }
                }
            }
            Err(e) => {
                match kind {
                    FetchKind::Initial => {
                        if session.feed.first_page().is_none() {
                            session.status = QueryStatus::Error;
                        }
                        session.first_error = Some(e.to_string());
                        tracing::warn!(tag, page, error = %e, "First page failed");
                    }
                    FetchKind::Edge(direction) => {
                        tracing::warn!(tag, page, ?direction, error = %e, "Edge page failed, keeping loaded dishes");
                        session.halt(direction, e.to_string());
                    }
                }
                return true;
            }
        }

        self.continue_restore();
        true
    }

    /// Flush pending position writes. Call before exit.
    pub async fn shutdown(self) {
        self.positions.flush().await;
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn status(&self) -> QueryStatus {
        self.session
            .as_ref()
            .map(|s| s.status)
            .unwrap_or(QueryStatus::Pending)
    }

    /// True once the last loaded page reports no next page.
    pub fn is_exhausted(&self) -> bool {
        self.session.as_ref().is_some_and(|s| {
            s.status == QueryStatus::Success && s.feed.last_page().is_some() && !s.feed.has_next()
        })
    }

    pub fn is_fetching(&self) -> bool {
        self.session
            .as_ref()
            .is_some_and(|s| !s.in_flight.is_empty())
    }

    pub fn active_tag(&self) -> Option<TagId> {
        self.session.as_ref().map(|s| s.feed.tag())
    }

    pub fn items(&self) -> impl Iterator<Item = &S::Item> {
        self.session.iter().flat_map(|s| s.feed.items())
    }

    pub fn len(&self) -> usize {
        self.session.as_ref().map_or(0, |s| s.feed.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, index: usize) -> Option<&S::Item> {
        self.session.as_ref().and_then(|s| s.feed.get(index))
    }

    pub fn active_index(&self) -> Option<usize> {
        self.session.as_ref().and_then(|s| s.feed.active_index())
    }

    pub fn active_item(&self) -> Option<&S::Item> {
        self.active_index().and_then(|i| self.get(i))
    }

    /// Whether the cursor sits on the first / last loaded item.
    pub fn edges(&self) -> (bool, bool) {
        match self.active_index() {
            Some(i) => (i == 0, i + 1 == self.len()),
            None => (false, false),
        }
    }

    /// Why the first page failed, while the feed is in the error state.
    pub fn last_error(&self) -> Option<&str> {
        self.session.as_ref().and_then(|s| s.first_error.as_deref())
    }

    /// Why fetching in `direction` is halted, if it is.
    pub fn edge_error(&self, direction: Direction) -> Option<&str> {
        self.session.as_ref().and_then(|s| s.edge_error(direction))
    }

    pub fn positions(&self) -> &PositionStore {
        &self.positions
    }

    // ========================================================================
    // Internal Helpers
    // ========================================================================

    /// Spawn a fetch unless one for the same page is already in flight.
    fn spawn_fetch(&mut self, page: u32, kind: FetchKind) -> bool {
        let Some(session) = self.session.as_mut() else {
            return false;
        };
        if session.in_flight.contains_key(&page) {
            tracing::debug!(page, ?kind, "Fetch for page already in flight");
            return false;
        }
        session.in_flight.insert(page, kind);

        let tag = session.feed.tag();
        let generation = self.generation;
        let source = self.source.clone();
        let tx = self.event_tx.clone();

        tracing::debug!(tag, page, ?kind, generation, "Spawning page fetch");

        tokio::spawn(async move {
            let result = source.fetch_page(tag, page).await;
            let msg = PageFetched {
                tag,
                generation,
                page,
                kind,
                result,
            };
            if let Err(e) = tx.send(msg).await {
                tracing::debug!(tag, page, error = %e, "Page result dropped (receiver closed)");
            }
        });

        true
    }

    /// Walk the cursor toward the restored index, fetching forward while it
    /// is still out of reach.
    fn continue_restore(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let Some(target) = session.restore_target else {
            return;
        };

        session.feed.set_active_index(target);

        let reachable = target < session.feed.len();
        if reachable || !session.feed.has_next() || session.halted(Direction::Forward) {
            if !reachable {
                tracing::debug!(
                    tag = session.feed.tag(),
                    target,
                    loaded = session.feed.len(),
                    "Restored position beyond feed end, clamped"
                );
            }
            session.restore_target = None;
            return;
        }

        if session.fetching(Direction::Forward) {
            return;
        }
        let next = session.feed.last_page().and_then(|p| p.index.checked_add(1));
        if let Some(next) = next {
            self.spawn_fetch(next, FetchKind::Edge(Direction::Forward));
        }
    }
}

//! Integration tests for the paginated feed controller.
//!
//! Pages come from a scripted source: each (tag, page) key has a queue of
//! replies, and a key can be gated so its reply is held back until the test
//! releases it. Results are pumped from the channel by hand, the same way
//! the event loop does it.

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use dishdeck::api::{FetchError, TagId};
use dishdeck::feed::{Direction, FeedController, Page, PageFetched, PageSource};
use dishdeck::query::QueryStatus;
use dishdeck::storage::{Database, Position, PositionStore};
use pretty_assertions::assert_eq;
use tokio::sync::{mpsc, Notify};

// ============================================================================
// Scripted page source
// ============================================================================

enum Reply {
    Page(Page<String>),
    Fail(u16),
}

#[derive(Default)]
struct Script {
    replies: Mutex<HashMap<(TagId, u32), VecDeque<Reply>>>,
    gates: Mutex<HashMap<(TagId, u32), Arc<Notify>>>,
    calls: Mutex<Vec<(TagId, u32)>>,
}

#[derive(Clone, Default)]
struct ScriptedSource {
    script: Arc<Script>,
}

impl ScriptedSource {
    fn reply(&self, tag: TagId, page: u32, reply: Reply) -> &Self {
        self.script
            .replies
            .lock()
            .unwrap()
            .entry((tag, page))
            .or_default()
            .push_back(reply);
        self
    }

    fn page(&self, tag: TagId, index: u32, items: &[&str], has_next: bool) -> &Self {
        self.reply(tag, index, Reply::Page(page(index, items, has_next)))
    }

    /// Hold back replies for (tag, page) until the returned handle is notified.
    fn gate(&self, tag: TagId, page: u32) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        self.script
            .gates
            .lock()
            .unwrap()
            .insert((tag, page), notify.clone());
        notify
    }

    fn calls(&self) -> Vec<(TagId, u32)> {
        self.script.calls.lock().unwrap().clone()
    }
}

impl PageSource for ScriptedSource {
    type Item = String;

    fn fetch_page(
        &self,
        tag: TagId,
        page: u32,
    ) -> impl Future<Output = Result<Page<String>, FetchError>> + Send {
        self.script.calls.lock().unwrap().push((tag, page));
        let reply = self
            .script
            .replies
            .lock()
            .unwrap()
            .get_mut(&(tag, page))
            .and_then(|queue| queue.pop_front());
        let gate = self.script.gates.lock().unwrap().get(&(tag, page)).cloned();

        async move {
            if let Some(gate) = gate {
                gate.notified().await;
            }
            match reply {
                Some(Reply::Page(page)) => Ok(page),
                Some(Reply::Fail(status)) => Err(FetchError::HttpStatus(status)),
                None => Err(FetchError::HttpStatus(404)),
            }
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn page(index: u32, items: &[&str], has_next: bool) -> Page<String> {
    Page {
        items: items.iter().map(|s| s.to_string()).collect(),
        current_page: index,
        has_next,
        has_previous: index > 0,
    }
}

type Controller = FeedController<ScriptedSource>;
type Rx = mpsc::Receiver<PageFetched<String>>;

fn controller(source: &ScriptedSource, positions: PositionStore) -> (Controller, Rx) {
    let (tx, rx) = mpsc::channel(16);
    (FeedController::new(source.clone(), positions, tx), rx)
}

async fn next_msg(rx: &mut Rx) -> PageFetched<String> {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for a page result")
        .expect("page channel closed")
}

/// Receive one result and apply it.
async fn pump(feed: &mut Controller, rx: &mut Rx) -> bool {
    let msg = next_msg(rx).await;
    feed.handle_page(msg)
}

fn items(feed: &Controller) -> Vec<&str> {
    feed.items().map(String::as_str).collect()
}

// ============================================================================
// Paging
// ============================================================================

#[tokio::test]
async fn test_pages_load_in_order_until_exhausted() {
    let source = ScriptedSource::default();
    source
        .page(7, 0, &["i1", "i2"], true)
        .page(7, 1, &["i3"], false);
    let (mut feed, mut rx) = controller(&source, PositionStore::unavailable());

    feed.activate(7);
    assert_eq!(feed.status(), QueryStatus::Pending);
    assert!(feed.is_fetching());

    assert!(pump(&mut feed, &mut rx).await);
    assert_eq!(feed.status(), QueryStatus::Success);
    assert_eq!(items(&feed), vec!["i1", "i2"]);
    assert_eq!(feed.active_index(), Some(0));
    assert!(!feed.is_exhausted());

    assert_eq!(feed.set_active_index(1), Some(1));
    assert_eq!(feed.edges(), (false, true));
    assert!(feed.advance(Direction::Forward));
    assert!(pump(&mut feed, &mut rx).await);

    assert_eq!(items(&feed), vec!["i1", "i2", "i3"]);
    assert!(feed.is_exhausted());

    feed.set_active_index(2);
    assert!(!feed.advance(Direction::Forward));
    assert_eq!(source.calls(), vec![(7, 0), (7, 1)]);
}

#[tokio::test]
async fn test_no_fetch_when_server_reports_no_more_pages() {
    let source = ScriptedSource::default();
    source.page(7, 0, &["only"], false);
    let (mut feed, mut rx) = controller(&source, PositionStore::unavailable());

    feed.activate(7);
    pump(&mut feed, &mut rx).await;

    assert!(!feed.advance(Direction::Forward));
    assert!(!feed.advance(Direction::Backward));
    assert!(!feed.is_fetching());
    assert_eq!(source.calls(), vec![(7, 0)]);
}

#[tokio::test]
async fn test_advance_before_first_page_is_noop() {
    let source = ScriptedSource::default();
    let gate = source.gate(7, 0);
    source.page(7, 0, &["a"], true);
    let (mut feed, mut rx) = controller(&source, PositionStore::unavailable());

    feed.activate(7);
    assert!(!feed.advance(Direction::Forward));

    gate.notify_one();
    pump(&mut feed, &mut rx).await;
    assert_eq!(source.calls(), vec![(7, 0)]);
}

#[tokio::test]
async fn test_repeated_advance_issues_one_fetch() {
    let source = ScriptedSource::default();
    source
        .page(7, 0, &["a", "b"], true)
        .page(7, 1, &["c"], false);
    let gate = source.gate(7, 1);
    let (mut feed, mut rx) = controller(&source, PositionStore::unavailable());

    feed.activate(7);
    pump(&mut feed, &mut rx).await;
    feed.set_active_index(1);

    let issued: Vec<bool> = (0..5).map(|_| feed.advance(Direction::Forward)).collect();
    assert_eq!(issued, vec![true, false, false, false, false]);

    gate.notify_one();
    pump(&mut feed, &mut rx).await;
    assert_eq!(items(&feed), vec!["a", "b", "c"]);
    assert_eq!(source.calls(), vec![(7, 0), (7, 1)]);
}

#[tokio::test]
async fn test_empty_first_page() {
    let source = ScriptedSource::default();
    source.page(7, 0, &[], false);
    let (mut feed, mut rx) = controller(&source, PositionStore::unavailable());

    feed.activate(7);
    pump(&mut feed, &mut rx).await;

    assert_eq!(feed.status(), QueryStatus::Success);
    assert!(feed.is_empty());
    assert!(feed.is_exhausted());
    assert_eq!(feed.active_index(), None);
    assert_eq!(feed.set_active_index(3), None);
}

// ============================================================================
// Tag switching
// ============================================================================

#[tokio::test]
async fn test_late_result_for_previous_tag_is_discarded() {
    let source = ScriptedSource::default();
    source
        .page(7, 0, &["seven"], false)
        .page(8, 0, &["eight-a", "eight-b"], false);
    let gate = source.gate(7, 0);
    let (mut feed, mut rx) = controller(&source, PositionStore::unavailable());

    feed.activate(7);
    feed.activate(8);
    assert!(pump(&mut feed, &mut rx).await);
    assert_eq!(items(&feed), vec!["eight-a", "eight-b"]);

    gate.notify_one();
    assert!(!pump(&mut feed, &mut rx).await);
    assert_eq!(feed.active_tag(), Some(8));
    assert_eq!(items(&feed), vec!["eight-a", "eight-b"]);
}

#[tokio::test]
async fn test_reactivating_same_tag_drops_cache() {
    let source = ScriptedSource::default();
    source
        .page(7, 0, &["old"], false)
        .page(7, 0, &["new"], false);
    let (mut feed, mut rx) = controller(&source, PositionStore::unavailable());

    feed.activate(7);
    pump(&mut feed, &mut rx).await;
    assert_eq!(items(&feed), vec!["old"]);

    feed.activate(7);
    assert!(feed.is_empty());
    assert_eq!(feed.status(), QueryStatus::Pending);
    pump(&mut feed, &mut rx).await;
    assert_eq!(items(&feed), vec!["new"]);
}

#[tokio::test]
async fn test_deactivate_discards_in_flight_result() {
    let source = ScriptedSource::default();
    source.page(7, 0, &["a"], false);
    let (mut feed, mut rx) = controller(&source, PositionStore::unavailable());

    feed.activate(7);
    feed.deactivate();
    assert_eq!(feed.active_tag(), None);
    assert!(!pump(&mut feed, &mut rx).await);
    assert!(feed.is_empty());
}

// ============================================================================
// Failures
// ============================================================================

#[tokio::test]
async fn test_first_page_error_then_retry() {
    let source = ScriptedSource::default();
    source
        .reply(7, 0, Reply::Fail(500))
        .page(7, 0, &["a"], false);
    let gate = source.gate(7, 0);
    let (mut feed, mut rx) = controller(&source, PositionStore::unavailable());

    feed.activate(7);
    gate.notify_one();
    pump(&mut feed, &mut rx).await;

    assert_eq!(feed.status(), QueryStatus::Error);
    assert!(feed.last_error().is_some());
    assert!(!feed.is_exhausted());
    assert!(feed.is_empty());

    assert!(feed.retry());
    // Still an error until the retried fetch lands
    assert_eq!(feed.status(), QueryStatus::Error);
    assert!(!feed.retry());

    gate.notify_one();
    pump(&mut feed, &mut rx).await;
    assert_eq!(feed.status(), QueryStatus::Success);
    assert_eq!(feed.last_error(), None);
    assert_eq!(items(&feed), vec!["a"]);
}

#[tokio::test]
async fn test_next_page_failure_halts_forward_and_keeps_items() {
    let source = ScriptedSource::default();
    source
        .page(7, 0, &["a", "b"], true)
        .reply(7, 1, Reply::Fail(503))
        .page(7, 1, &["c"], false);
    let (mut feed, mut rx) = controller(&source, PositionStore::unavailable());

    feed.activate(7);
    pump(&mut feed, &mut rx).await;
    feed.set_active_index(1);

    assert!(feed.advance(Direction::Forward));
    pump(&mut feed, &mut rx).await;

    assert_eq!(feed.status(), QueryStatus::Success);
    assert_eq!(items(&feed), vec!["a", "b"]);
    assert!(feed.edge_error(Direction::Forward).is_some());
    assert_eq!(feed.edge_error(Direction::Backward), None);
    assert_eq!(feed.last_error(), None);
    assert!(!feed.advance(Direction::Forward));
    assert_eq!(source.calls().len(), 2);

    assert!(feed.retry());
    assert_eq!(feed.edge_error(Direction::Forward), None);
    assert!(feed.advance(Direction::Forward));
    pump(&mut feed, &mut rx).await;
    assert_eq!(items(&feed), vec!["a", "b", "c"]);
    assert_eq!(feed.edge_error(Direction::Forward), None);
    assert!(feed.is_exhausted());
}

#[tokio::test]
async fn test_previous_page_failure_does_not_block_forward() {
    let source = ScriptedSource::default();
    // The feed may open mid-way: page 0 is answered with page 3
    source
        .reply(7, 0, Reply::Page(page(3, &["d"], true)))
        .reply(7, 2, Reply::Fail(500))
        .page(7, 4, &["e"], false);
    let (mut feed, mut rx) = controller(&source, PositionStore::unavailable());

    feed.activate(7);
    pump(&mut feed, &mut rx).await;
    assert_eq!(items(&feed), vec!["d"]);

    assert!(feed.advance(Direction::Backward));
    pump(&mut feed, &mut rx).await;
    assert!(feed.edge_error(Direction::Backward).is_some());
    assert_eq!(feed.edge_error(Direction::Forward), None);
    assert!(!feed.advance(Direction::Backward));

    assert!(feed.advance(Direction::Forward));
    pump(&mut feed, &mut rx).await;
    assert_eq!(items(&feed), vec!["d", "e"]);
}

#[tokio::test]
async fn test_wrong_page_number_halts_direction() {
    let source = ScriptedSource::default();
    source
        .page(7, 0, &["a"], true)
        .reply(7, 1, Reply::Page(page(0, &["b"], true)));
    let (mut feed, mut rx) = controller(&source, PositionStore::unavailable());

    feed.activate(7);
    pump(&mut feed, &mut rx).await;
    assert!(feed.advance(Direction::Forward));
    assert!(pump(&mut feed, &mut rx).await);

    assert_eq!(items(&feed), vec!["a"]);
    assert_eq!(feed.status(), QueryStatus::Success);
    let error = feed.edge_error(Direction::Forward).unwrap();
    assert!(error.contains("page 0"), "{error}");
    assert!(!feed.advance(Direction::Forward));
    assert!(!feed.is_fetching());
    assert_eq!(source.calls(), vec![(7, 0), (7, 1)]);
}

#[tokio::test]
async fn test_wrong_page_number_ends_restore() {
    let source = ScriptedSource::default();
    source
        .page(7, 0, &["a", "b"], true)
        .reply(7, 1, Reply::Page(page(0, &["a", "b"], true)));
    let db = Database::open(":memory:").await.unwrap();
    let mut positions = PositionStore::load(&db).await;
    positions.set(Position { tag: 7, index: 5 });
    let (mut feed, mut rx) = controller(&source, positions);

    feed.activate(7);
    pump(&mut feed, &mut rx).await;
    // Restore asked for page 1 and got page 0 back
    pump(&mut feed, &mut rx).await;

    assert_eq!(feed.active_index(), Some(1));
    assert!(!feed.is_fetching());
    assert_eq!(source.calls().len(), 2);
}

// ============================================================================
// Position memory
// ============================================================================

#[tokio::test]
async fn test_position_survives_restart() {
    let dir = std::env::temp_dir().join(format!("dishdeck_feed_it_{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("state.db");
    let _ = std::fs::remove_file(&path);
    let path_str = path.to_str().unwrap();

    let source = ScriptedSource::default();
    source
        .page(7, 0, &["a", "b", "c"], false)
        .page(7, 0, &["a", "b", "c"], false);

    // First session: move to the third dish
    {
        let db = Database::open(path_str).await.unwrap();
        let positions = PositionStore::load(&db).await;
        let (mut feed, mut rx) = controller(&source, positions);

        feed.activate(7);
        pump(&mut feed, &mut rx).await;
        assert_eq!(feed.set_active_index(2), Some(2));

        feed.shutdown().await;
        db.close().await;
    }

    // Second session picks up there
    {
        let db = Database::open(path_str).await.unwrap();
        let positions = PositionStore::load(&db).await;
        assert_eq!(positions.last_tag(), Some(7));
        assert_eq!(positions.get(7), Some(Position { tag: 7, index: 2 }));

        let (mut feed, mut rx) = controller(&source, positions);
        feed.activate(7);
        pump(&mut feed, &mut rx).await;
        assert_eq!(feed.active_index(), Some(2));
        assert_eq!(feed.active_item().map(String::as_str), Some("c"));

        feed.shutdown().await;
        db.close().await;
    }

    std::fs::remove_dir_all(&dir).ok();
}

#[tokio::test]
async fn test_restore_fetches_forward_until_reachable() {
    let db = Database::open(":memory:").await.unwrap();
    let mut positions = PositionStore::load(&db).await;
    positions.set(Position { tag: 7, index: 4 });

    let source = ScriptedSource::default();
    source
        .page(7, 0, &["a", "b"], true)
        .page(7, 1, &["c", "d"], true)
        .page(7, 2, &["e"], false);
    let (mut feed, mut rx) = controller(&source, positions);

    feed.activate(7);
    pump(&mut feed, &mut rx).await;
    // Parked on the last loaded dish while the next page loads
    assert_eq!(feed.active_index(), Some(1));
    assert!(feed.is_fetching());

    pump(&mut feed, &mut rx).await;
    assert_eq!(feed.active_index(), Some(3));

    pump(&mut feed, &mut rx).await;
    assert_eq!(feed.active_index(), Some(4));
    assert_eq!(feed.active_item().map(String::as_str), Some("e"));
    assert_eq!(source.calls(), vec![(7, 0), (7, 1), (7, 2)]);
}

#[tokio::test]
async fn test_restore_beyond_end_is_clamped() {
    let db = Database::open(":memory:").await.unwrap();
    let mut positions = PositionStore::load(&db).await;
    positions.set(Position { tag: 7, index: 10 });

    let source = ScriptedSource::default();
    source.page(7, 0, &["a", "b"], false);
    let (mut feed, mut rx) = controller(&source, positions);

    feed.activate(7);
    pump(&mut feed, &mut rx).await;
    assert_eq!(feed.active_index(), Some(1));
    assert!(!feed.is_fetching());
}

#[tokio::test]
async fn test_user_move_cancels_pending_restore() {
    let db = Database::open(":memory:").await.unwrap();
    let mut positions = PositionStore::load(&db).await;
    positions.set(Position { tag: 7, index: 3 });

    let source = ScriptedSource::default();
    source
        .page(7, 0, &["a", "b"], true)
        .page(7, 1, &["c", "d"], false);
    let (mut feed, mut rx) = controller(&source, positions);

    feed.activate(7);
    pump(&mut feed, &mut rx).await;
    assert_eq!(feed.active_index(), Some(1));

    feed.set_active_index(0);
    pump(&mut feed, &mut rx).await;
    assert_eq!(feed.len(), 4);
    assert_eq!(feed.active_index(), Some(0));
    assert_eq!(feed.positions().get(7), Some(Position { tag: 7, index: 0 }));
}

#[tokio::test]
async fn test_unavailable_store_starts_at_zero() {
    let source = ScriptedSource::default();
    source.page(7, 0, &["a", "b"], false);
    let (mut feed, mut rx) = controller(&source, PositionStore::unavailable());

    feed.activate(7);
    pump(&mut feed, &mut rx).await;
    feed.set_active_index(1);

    assert_eq!(feed.positions().get(7), None);
    assert_eq!(feed.active_index(), Some(1));
}

// ============================================================================
// Properties
// ============================================================================

mod properties {
    use super::*;
    use proptest::prelude::*;

    const PAGES: u32 = 6;

    fn source_with_pages() -> ScriptedSource {
        let source = ScriptedSource::default();
        for index in 0..PAGES {
            let a = format!("p{index}a");
            let b = format!("p{index}b");
            source.page(7, index, &[a.as_str(), b.as_str()], index + 1 < PAGES);
        }
        source
    }

    proptest! {
        /// Any interleaving of forward edge reaches and arriving results
        /// fetches each page once and keeps items in page order.
        #[test]
        fn prop_forward_paging_dedups_and_orders(ops in proptest::collection::vec(any::<bool>(), 0..40)) {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();

            rt.block_on(async {
                let source = source_with_pages();
                let (mut feed, mut rx) = controller(&source, PositionStore::unavailable());
                feed.activate(7);
                pump(&mut feed, &mut rx).await;

                for advance in ops {
                    if advance {
                        let last = feed.len().saturating_sub(1);
                        feed.set_active_index(last);
                        feed.advance(Direction::Forward);
                    } else if feed.is_fetching() {
                        pump(&mut feed, &mut rx).await;
                    }
                }
                while feed.is_fetching() {
                    pump(&mut feed, &mut rx).await;
                }

                let calls = source.calls();
                let expected_calls: Vec<(TagId, u32)> =
                    (0..calls.len() as u32).map(|page| (7, page)).collect();
                prop_assert_eq!(&calls, &expected_calls);

                let expected_items: Vec<String> = (0..calls.len())
                    .flat_map(|page| [format!("p{page}a"), format!("p{page}b")])
                    .collect();
                let loaded: Vec<String> = feed.items().cloned().collect();
                prop_assert_eq!(loaded, expected_items);
                Ok(())
            })?;
        }
    }
}

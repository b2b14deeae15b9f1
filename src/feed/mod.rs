//! Paginated dish feed.
//!
//! - `page` - `Page<T>` and the `PageSource` trait the controller fetches through
//! - `state` - `FeedState<T>`: the contiguous page run and flattened items
//! - `controller` - `FeedController`: fetch orchestration, status, position memory

mod controller;
mod page;
mod state;

pub use controller::{Direction, FeedController, FetchKind, PageFetched};
pub use page::{Page, PageSource};
pub use state::{FeedState, PageMeta, Placement};

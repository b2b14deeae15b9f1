//! dishdeck: browse a recipe API one dish at a time.
//!
//! The library holds everything that is independent of the terminal front
//! end: the API client, the paginated feed controller, position memory and
//! the query-status result builder.

pub mod api;
pub mod config;
pub mod feed;
pub mod query;
pub mod storage;
pub mod util;

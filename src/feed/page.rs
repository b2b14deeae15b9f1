use std::future::Future;

use crate::api::{FetchError, TagId};

/// One server batch of items plus pagination flags.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub current_page: u32,
    pub has_next: bool,
    pub has_previous: bool,
}

/// Where the controller gets pages from.
///
/// Implemented by `ApiClient`; tests supply scripted sources. The returned
/// future runs on a spawned task, so it must be `Send`.
pub trait PageSource: Clone + Send + Sync + 'static {
    type Item: Send + 'static;

    fn fetch_page(
        &self,
        tag: TagId,
        page: u32,
    ) -> impl Future<Output = Result<Page<Self::Item>, FetchError>> + Send;
}

use std::collections::VecDeque;

use crate::api::TagId;

use super::page::Page;

/// Pagination metadata kept for each cached page; the items themselves live
/// in the flattened sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageMeta {
    pub index: u32,
    pub len: usize,
    pub has_next: bool,
    pub has_previous: bool,
}

/// Outcome of inserting a fetched page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// First page of an empty run.
    First,
    Appended,
    Prepended,
    /// Page index already cached; the cached copy is kept.
    Duplicate,
    /// Not adjacent to the cached run; rejected.
    Detached,
}

/// Cached pages for one tag, flattened into a single item sequence.
///
/// Pages always form a contiguous run ordered by page index, and the items
/// are the concatenation of those pages in server order.
#[derive(Debug)]
pub struct FeedState<T> {
    tag: TagId,
    pages: VecDeque<PageMeta>,
    items: VecDeque<T>,
    active_index: Option<usize>,
}

impl<T> FeedState<T> {
    pub fn new(tag: TagId) -> Self {
        Self {
            tag,
            pages: VecDeque::new(),
            items: VecDeque::new(),
            active_index: None,
        }
    }

    pub fn tag(&self) -> TagId {
        self.tag
    }

    /// Insert a page if it extends the run at either end.
    ///
    /// Prepending shifts `active_index` by the new page's length so the same
    /// item stays active.
    pub fn insert_page(&mut self, page: Page<T>) -> Placement {
        let meta = PageMeta {
            index: page.current_page,
            len: page.items.len(),
            has_next: page.has_next,
            has_previous: page.has_previous,
        };

        let placement = match (self.pages.front(), self.pages.back()) {
            (None, _) | (_, None) => Placement::First,
            (Some(first), Some(last)) => {
                if meta.index >= first.index && meta.index <= last.index {
                    Placement::Duplicate
                } else if last.index.checked_add(1) == Some(meta.index) {
                    Placement::Appended
                } else if first.index.checked_sub(1) == Some(meta.index) {
                    Placement::Prepended
                } else {
                    Placement::Detached
                }
            }
        };

        match placement {
            Placement::First | Placement::Appended => {
                self.pages.push_back(meta);
                self.items.extend(page.items);
            }
            Placement::Prepended => {
                self.pages.push_front(meta);
                for item in page.items.into_iter().rev() {
                    self.items.push_front(item);
                }
                if let Some(active) = self.active_index.as_mut() {
                    *active += meta.len;
                }
            }
            Placement::Duplicate | Placement::Detached => {
                tracing::debug!(
                    tag = self.tag,
                    page = meta.index,
                    ?placement,
                    "Page not inserted"
                );
            }
        }

        if self.active_index.is_none() && !self.items.is_empty() {
            self.active_index = Some(0);
        }

        placement
    }

    pub fn first_page(&self) -> Option<&PageMeta> {
        self.pages.front()
    }

    pub fn last_page(&self) -> Option<&PageMeta> {
        self.pages.back()
    }

    pub fn pages(&self) -> impl Iterator<Item = &PageMeta> {
        self.pages.iter()
    }

    pub fn contains_page(&self, index: u32) -> bool {
        self.pages.iter().any(|p| p.index == index)
    }

    /// Whether the server reported a page after the last cached one.
    pub fn has_next(&self) -> bool {
        self.pages.back().is_some_and(|p| p.has_next)
    }

    /// Whether the server reported a page before the first cached one.
    pub fn has_previous(&self) -> bool {
        self.pages
            .front()
            .is_some_and(|p| p.has_previous && p.index > 0)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.items.get(index)
    }

    pub fn items(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }

    pub fn active_index(&self) -> Option<usize> {
        self.active_index
    }

    /// Move the cursor, clamped to the loaded items. Returns the index
    /// actually set, or `None` while there are no items.
    pub fn set_active_index(&mut self, index: usize) -> Option<usize> {
        if self.items.is_empty() {
            return None;
        }
        let clamped = index.min(self.items.len() - 1);
        self.active_index = Some(clamped);
        Some(clamped)
    }
}

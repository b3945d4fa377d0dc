//! Offset pagination
//!
//! The Mailchimp API signals continuation only through page size: a full
//! page means there may be more records, a short page means the collection
//! is exhausted. There is no total-count or next-link field to consult.
//!
//! Transport concerns (retry, backoff) live in [`crate::http`]; this state
//! machine only decides whether another request should be issued and at
//! which offset.

use std::collections::HashMap;

/// Where a pagination loop currently stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageState {
    /// No request issued yet; the cursor is at zero
    AwaitingFirstPage,
    /// At least one full page received; the cursor points past it
    AwaitingNextPage { offset: u32 },
    /// A short page was received; no further requests
    Exhausted,
}

/// Offset cursor state machine for one (stream, context) extraction loop
///
/// A fresh paginator is created per stream invocation; cursors are never
/// shared across contexts.
#[derive(Debug, Clone)]
pub struct OffsetPaginator {
    page_size: u32,
    state: PageState,
}

impl OffsetPaginator {
    /// Create a paginator starting at offset zero
    pub fn new(page_size: u32) -> Self {
        Self {
            page_size,
            state: PageState::AwaitingFirstPage,
        }
    }

    /// Configured page size (the `count` request parameter)
    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Current state
    pub fn state(&self) -> PageState {
        self.state
    }

    /// Offset for the next request, or `None` when exhausted
    pub fn current_offset(&self) -> Option<u32> {
        match self.state {
            PageState::AwaitingFirstPage => Some(0),
            PageState::AwaitingNextPage { offset } => Some(offset),
            PageState::Exhausted => None,
        }
    }

    /// Record the size of the page just received and advance the cursor
    ///
    /// A page of exactly `page_size` records advances the offset; anything
    /// shorter (including zero) exhausts the loop. When a collection's true
    /// size is a multiple of the page size, one trailing empty request is
    /// issued to confirm exhaustion; that request is normal, not an error.
    pub fn observe_page(&mut self, record_count: usize) {
        let offset = match self.current_offset() {
            Some(offset) => offset,
            None => return,
        };

        if record_count == self.page_size as usize {
            self.state = PageState::AwaitingNextPage {
                offset: offset + self.page_size,
            };
        } else {
            self.state = PageState::Exhausted;
        }
    }

    /// Query parameters for the next request, or `None` when exhausted
    pub fn request_params(&self) -> Option<HashMap<String, String>> {
        self.current_offset().map(|offset| {
            let mut params = HashMap::new();
            params.insert("count".to_string(), self.page_size.to_string());
            params.insert("offset".to_string(), offset.to_string());
            params
        })
    }
}

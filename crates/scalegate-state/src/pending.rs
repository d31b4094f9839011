//! Lazy iteration over the admin approval queue.
//!
//! `PendingRequests` fetches one page of the oldest-first queue at a time
//! and only goes back to the store when its buffer runs dry. Each page is a
//! separate read snapshot, so requests decided while iterating simply stop
//! appearing. Iteration can be resumed from [`PendingRequests::cursor`].

use std::collections::VecDeque;

use crate::error::StateResult;
use crate::store::StateStore;
use crate::types::{ComponentKind, RequestId, ScaleRequest};

/// Page size used when a caller passes 0.
pub const DEFAULT_PAGE_SIZE: usize = 50;

pub struct PendingRequests {
    store: StateStore,
    kind: Option<ComponentKind>,
    page_size: usize,
    cursor: Option<RequestId>,
    buffer: VecDeque<ScaleRequest>,
    exhausted: bool,
}

impl PendingRequests {
    pub(crate) fn new(store: StateStore, kind: Option<ComponentKind>, page_size: usize) -> Self {
        let page_size = if page_size == 0 {
            DEFAULT_PAGE_SIZE
        } else {
            page_size
        };
        Self {
            store,
            kind,
            page_size,
            cursor: None,
            buffer: VecDeque::new(),
            exhausted: false,
        }
    }

    /// Continue behind a previously returned request id.
    pub fn resume_after(mut self, after: Option<RequestId>) -> Self {
        self.cursor = after;
        self.buffer.clear();
        self.exhausted = false;
        self
    }

    /// Id of the last request handed out; pass it to `resume_after` to restart.
    pub fn cursor(&self) -> Option<RequestId> {
        self.cursor
    }

    fn fill(&mut self) -> StateResult<()> {
        let page = self
            .store
            .list_pending_page(self.kind, self.cursor, self.page_size)?;
        self.exhausted = page.next.is_none();
        self.buffer.extend(page.items);
        Ok(())
    }
}

impl Iterator for PendingRequests {
    type Item = StateResult<ScaleRequest>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.buffer.is_empty() && !self.exhausted {
            if let Err(e) = self.fill() {
                // Stop after surfacing the error once.
                self.exhausted = true;
                return Some(Err(e));
            }
        }
        let request = self.buffer.pop_front()?;
        self.cursor = Some(request.id);
        Some(Ok(request))
    }
}

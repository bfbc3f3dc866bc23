//! Paginated, searchable view of the guest collection.
//!
//! The controller owns the only copy of the loaded [`GuestPage`]. Page loads
//! are tagged with a sequence number and only the response to the most
//! recently issued request is applied, so a slow reply to an earlier page
//! request can never overwrite a newer one. Mutations made elsewhere are
//! never spliced in locally; the controller refetches its current page when
//! it receives a [`DirectoryEvent`].

use std::sync::Arc;

use shared::{
    domain::{Guest, GuestPage},
    error::StoreError,
};
use tokio::{
    sync::{broadcast, Mutex},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

use crate::{error::ControllerError, events::DirectoryEvent, store::GuestCollection};

pub const DEFAULT_PAGE_SIZE: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Applied,
    /// A newer request was issued before this one resolved; its response was dropped.
    Stale,
    /// The requested page lies outside `[1, total_pages]`; nothing was requested.
    OutOfRange,
}

/// Identifies one issued page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadTicket {
    pub seq: u64,
    pub page: u32,
}

/// Render-ready copy of the directory state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectorySnapshot {
    pub page: GuestPage,
    /// Items of the loaded page that match the current search query.
    pub visible: Vec<Guest>,
    pub query: String,
    pub loading: bool,
    pub error: Option<String>,
}

struct DirectoryState {
    page: GuestPage,
    query: String,
    issued_seq: u64,
    settled_seq: u64,
    error: Option<String>,
}

impl DirectoryState {
    fn visible(&self) -> Vec<Guest> {
        filter_items(&self.page.items, &self.query)
    }

    fn last_page(&self) -> u32 {
        self.page.total_pages.max(1)
    }
}

pub struct GuestDirectoryController {
    guests: GuestCollection,
    page_size: u32,
    state: Mutex<DirectoryState>,
}

impl GuestDirectoryController {
    pub fn new(guests: GuestCollection, page_size: u32) -> Self {
        let page_size = page_size.max(1);
        Self {
            guests,
            page_size,
            state: Mutex::new(DirectoryState {
                page: GuestPage::empty(page_size),
                query: String::new(),
                issued_seq: 0,
                settled_seq: 0,
                error: None,
            }),
        }
    }

    /// Requests `page` and applies the response unless a newer request was
    /// issued in the meantime. On failure the loaded page is left untouched.
    pub async fn load_page(&self, page: u32) -> Result<LoadOutcome, ControllerError> {
        let ticket = self.begin_load(page).await;
        let result = self.guests.list_page(page, self.page_size).await;
        self.apply_load(ticket, result).await
    }

    pub async fn begin_load(&self, page: u32) -> LoadTicket {
        let mut state = self.state.lock().await;
        state.issued_seq += 1;
        let ticket = LoadTicket {
            seq: state.issued_seq,
            page,
        };
        debug!(seq = ticket.seq, page, "guest page requested");
        ticket
    }

    pub async fn apply_load(
        &self,
        ticket: LoadTicket,
        result: Result<GuestPage, StoreError>,
    ) -> Result<LoadOutcome, ControllerError> {
        let mut state = self.state.lock().await;
        if ticket.seq != state.issued_seq {
            debug!(
                seq = ticket.seq,
                latest = state.issued_seq,
                page = ticket.page,
                "discarding stale guest page response"
            );
            return Ok(LoadOutcome::Stale);
        }
        state.settled_seq = ticket.seq;

        match result {
            Ok(page) => {
                info!(
                    seq = ticket.seq,
                    page = page.page_number,
                    items = page.items.len(),
                    total_pages = page.total_pages,
                    "guest page loaded"
                );
                state.page = page;
                state.error = None;
                Ok(LoadOutcome::Applied)
            }
            Err(err) => {
                warn!(seq = ticket.seq, page = ticket.page, error = %err, "guest page load failed");
                state.error = Some(err.user_message());
                Err(err.into())
            }
        }
    }

    /// Reloads the current page. When the current page no longer exists
    /// (its last guest was deleted) the new last page is loaded instead.
    pub async fn refresh(&self) -> Result<LoadOutcome, ControllerError> {
        let current = self.state.lock().await.page.page_number.max(1);
        let outcome = self.load_page(current).await?;
        if outcome != LoadOutcome::Applied {
            return Ok(outcome);
        }

        let last_page = {
            let state = self.state.lock().await;
            (state.page.items.is_empty() && state.page.page_number > state.last_page())
                .then(|| state.last_page())
        };
        match last_page {
            Some(last_page) => self.load_page(last_page).await,
            None => Ok(outcome),
        }
    }

    /// Navigates to `page`; out-of-range requests are a no-op.
    pub async fn go_to_page(&self, page: u32) -> Result<LoadOutcome, ControllerError> {
        let last_page = self.state.lock().await.last_page();
        if page == 0 || page > last_page {
            debug!(page, last_page, "ignoring out-of-range page request");
            return Ok(LoadOutcome::OutOfRange);
        }
        self.load_page(page).await
    }

    pub async fn next_page(&self) -> Result<LoadOutcome, ControllerError> {
        let current = self.state.lock().await.page.page_number;
        self.go_to_page(current.saturating_add(1)).await
    }

    pub async fn previous_page(&self) -> Result<LoadOutcome, ControllerError> {
        let current = self.state.lock().await.page.page_number;
        self.go_to_page(current.saturating_sub(1)).await
    }

    /// Filters the loaded page by name or email. Only guests already on the
    /// loaded page can match; the store is not queried.
    pub async fn search(&self, query: &str) -> Vec<Guest> {
        let mut state = self.state.lock().await;
        state.query = query.trim().to_string();
        state.visible()
    }

    pub async fn snapshot(&self) -> DirectorySnapshot {
        let state = self.state.lock().await;
        DirectorySnapshot {
            page: state.page.clone(),
            visible: state.visible(),
            query: state.query.clone(),
            loading: state.settled_seq < state.issued_seq,
            error: state.error.clone(),
        }
    }

    pub async fn handle_event(
        &self,
        event: DirectoryEvent,
    ) -> Result<LoadOutcome, ControllerError> {
        info!(event = event.name(), "refreshing guest directory after mutation");
        self.refresh().await
    }

    /// Refreshes once per completion event until the sending controller is dropped.
    pub async fn follow(&self, mut events: broadcast::Receiver<DirectoryEvent>) {
        loop {
            let event = match events.recv().await {
                Ok(event) => event,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "directory event receiver lagged; refreshing once");
                    let _ = self.refresh().await;
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            };
            // Failures are already recorded in the directory state.
            let _ = self.handle_event(event).await;
        }
    }

    pub fn spawn_follower(
        self: &Arc<Self>,
        events: broadcast::Receiver<DirectoryEvent>,
    ) -> JoinHandle<()> {
        let directory = Arc::clone(self);
        tokio::spawn(async move { directory.follow(events).await })
    }
}

fn filter_items(items: &[Guest], query: &str) -> Vec<Guest> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return items.to_vec();
    }
    items
        .iter()
        .filter(|guest| guest.matches_lowercase(&needle))
        .cloned()
        .collect()
}

#[cfg(test)]
#[path = "tests/directory_tests.rs"]
mod tests;

//! Confirm-then-delete modal.

use shared::domain::{Guest, GuestId};
use tokio::sync::{broadcast, Mutex};
use tracing::{info, warn};

use crate::{
    error::ControllerError,
    events::{self, DirectoryEvent},
    store::GuestCollection,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletionTarget {
    pub id: GuestId,
    pub display_name: String,
}

impl From<&Guest> for DeletionTarget {
    fn from(guest: &Guest) -> Self {
        Self {
            id: guest.id.clone(),
            display_name: guest.display_name(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeletionState {
    Closed,
    Open {
        target: DeletionTarget,
        error: Option<String>,
    },
    Deleting {
        target: DeletionTarget,
    },
}

impl DeletionState {
    pub fn target(&self) -> Option<&DeletionTarget> {
        match self {
            Self::Closed => None,
            Self::Open { target, .. } | Self::Deleting { target } => Some(target),
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Open { error, .. } => error.as_deref(),
            _ => None,
        }
    }
}

struct DeletionInner {
    state: DeletionState,
    generation: u64,
}

pub struct GuestDeletionController {
    guests: GuestCollection,
    inner: Mutex<DeletionInner>,
    events: broadcast::Sender<DirectoryEvent>,
}

impl GuestDeletionController {
    pub fn new(guests: GuestCollection) -> Self {
        Self {
            guests,
            inner: Mutex::new(DeletionInner {
                state: DeletionState::Closed,
                generation: 0,
            }),
            events: events::channel(),
        }
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<DirectoryEvent> {
        self.events.subscribe()
    }

    pub async fn state(&self) -> DeletionState {
        self.inner.lock().await.state.clone()
    }

    pub async fn request(&self, guest: &Guest) {
        let mut inner = self.inner.lock().await;
        inner.generation += 1;
        inner.state = DeletionState::Open {
            target: DeletionTarget::from(guest),
            error: None,
        };
    }

    pub async fn cancel(&self) {
        let mut inner = self.inner.lock().await;
        inner.generation += 1;
        inner.state = DeletionState::Closed;
    }

    /// Deletes the requested guest. On failure, including a guest that was
    /// already removed elsewhere, the confirmation stays open with the error.
    pub async fn confirm(&self) -> Result<GuestId, ControllerError> {
        let (target, generation) = {
            let mut inner = self.inner.lock().await;
            let target = match &inner.state {
                DeletionState::Open { target, .. } => target.clone(),
                DeletionState::Deleting { .. } => {
                    return Err(ControllerError::InvalidState("guest is already being deleted"));
                }
                DeletionState::Closed => {
                    return Err(ControllerError::InvalidState("no guest selected for deletion"));
                }
            };
            inner.state = DeletionState::Deleting {
                target: target.clone(),
            };
            (target, inner.generation)
        };

        let result = self.guests.delete(&target.id).await;

        let mut inner = self.inner.lock().await;
        let still_current = inner.generation == generation;
        match result {
            Ok(()) => {
                info!(guest_id = %target.id, "guest deleted");
                if still_current {
                    inner.generation += 1;
                    inner.state = DeletionState::Closed;
                }
                drop(inner);
                let _ = self.events.send(DirectoryEvent::GuestDeleted {
                    id: target.id.clone(),
                });
                Ok(target.id)
            }
            Err(err) => {
                warn!(guest_id = %target.id, error = %err, "failed to delete guest");
                if still_current {
                    inner.state = DeletionState::Open {
                        target,
                        error: Some(err.user_message()),
                    };
                }
                Err(err.into())
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/deletion_tests.rs"]
mod tests;

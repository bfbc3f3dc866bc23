//! Completion notifications emitted by the form and deletion controllers.

use shared::domain::{Guest, GuestId};

const EVENT_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectoryEvent {
    GuestSaved { guest: Guest, created: bool },
    GuestDeleted { id: GuestId },
}

impl DirectoryEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::GuestSaved { created: true, .. } => "guest_created",
            Self::GuestSaved { created: false, .. } => "guest_updated",
            Self::GuestDeleted { .. } => "guest_deleted",
        }
    }
}

pub(crate) fn channel() -> tokio::sync::broadcast::Sender<DirectoryEvent> {
    let (events, _) = tokio::sync::broadcast::channel(EVENT_CHANNEL_CAPACITY);
    events
}

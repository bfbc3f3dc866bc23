//! Controllers that keep a paginated, searchable view of guest records in
//! step with a remote record store.
//!
//! [`GuestFormController`] and [`GuestDeletionController`] own their modal
//! state and publish a [`DirectoryEvent`] after every successful mutation;
//! [`GuestDirectoryController`] subscribes to those events and refetches its
//! current page. All three receive the store explicitly through a
//! [`GuestCollection`].

pub mod deletion;
pub mod directory;
pub mod error;
pub mod events;
pub mod form;
pub mod http_store;
pub mod store;
pub mod validation;

#[cfg(test)]
mod test_support;

pub use deletion::{DeletionState, DeletionTarget, GuestDeletionController};
pub use directory::{
    DirectorySnapshot, GuestDirectoryController, LoadOutcome, LoadTicket, DEFAULT_PAGE_SIZE,
};
pub use error::ControllerError;
pub use events::DirectoryEvent;
pub use form::{FormMode, FormState, GuestFormController};
pub use http_store::HttpRecordStore;
pub use store::{GuestCollection, MissingRecordStore, RecordStore, GUESTS_COLLECTION};
pub use validation::ValidationError;

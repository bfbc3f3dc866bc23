use shared::error::StoreError;
use thiserror::Error;

use crate::validation::ValidationError;

/// Outcome of a rejected controller operation. The same message is also
/// recorded in the controller state for the view to render.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ControllerError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("{0}")]
    InvalidState(&'static str),
}

impl ControllerError {
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(err) => err.to_string(),
            Self::Store(err) => err.user_message(),
            Self::InvalidState(reason) => (*reason).to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Store(err) if err.is_not_found())
    }
}

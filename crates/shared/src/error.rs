use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    NotFound,
    Rejected,
    Server,
    Transport,
    Timeout,
    Decode,
}

/// Failure reported by (or while talking to) the record store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("record {id} not found in collection {collection}")]
    NotFound { collection: String, id: String },
    #[error("{message}")]
    Rejected { message: String },
    #[error("record store returned {status}: {message}")]
    Server { status: u16, message: String },
    #[error("record store unreachable: {0}")]
    Transport(String),
    #[error("record store did not respond in time")]
    Timeout,
    #[error("unexpected record store response: {0}")]
    Decode(String),
}

impl StoreError {
    pub fn not_found(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            collection: collection.into(),
            id: id.into(),
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            Self::NotFound { .. } => ErrorCode::NotFound,
            Self::Rejected { .. } => ErrorCode::Rejected,
            Self::Server { .. } => ErrorCode::Server,
            Self::Transport(_) => ErrorCode::Transport,
            Self::Timeout => ErrorCode::Timeout,
            Self::Decode(_) => ErrorCode::Decode,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.code() == ErrorCode::NotFound
    }

    /// Text shown inline in a modal when the store call fails.
    pub fn user_message(&self) -> String {
        match self {
            Self::NotFound { .. } => {
                "This guest no longer exists; it may have been removed by another administrator."
                    .to_string()
            }
            Self::Rejected { message } | Self::Server { message, .. } if !message.is_empty() => {
                message.clone()
            }
            Self::Timeout => "The record store did not respond in time; please retry.".to_string(),
            Self::Transport(_) => {
                "Could not reach the record store; check the connection and retry.".to_string()
            }
            _ => "The record store rejected the request.".to_string(),
        }
    }
}

//! Error types for the change-feed bridge.

use crate::paths::ActionKind;
use crate::types::{DocumentId, Revision};
use thiserror::Error;

/// Main error type for bridge operations.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("no paths")]
    NoPaths,

    #[error("needs a db")]
    MissingSource { index: usize },

    #[error("no action provided for {0}")]
    UnconfiguredAction(ActionKind),

    #[error("Propagate hook failed: {0}")]
    Hook(String),

    #[error("Feed error: {0}")]
    Feed(String),

    #[error("Document not found: {0}")]
    DocumentNotFound(DocumentId),

    #[error("Document update conflict on {id}: expected {expected:?}, got {got:?}")]
    Conflict {
        id: DocumentId,
        expected: Option<Revision>,
        got: Option<Revision>,
    },

    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Pump worker panicked")]
    WorkerPanicked,
}

impl SyncError {
    /// True for errors raised while validating path configuration.
    pub fn is_configuration(&self) -> bool {
        matches!(self, SyncError::NoPaths | SyncError::MissingSource { .. })
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(e: serde_json::Error) -> Self {
        SyncError::Serialization(e.to_string())
    }
}

/// Result type for bridge operations.
pub type Result<T> = std::result::Result<T, SyncError>;

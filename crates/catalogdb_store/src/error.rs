//! Error types for document store operations.

use crate::session::SessionId;
use catalogdb_codec::CodecError;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur during document store operations.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// Another session committed conflicting changes. The whole unit of work
    /// may be retried.
    #[error("transient conflict: {message}")]
    TransientConflict {
        /// What conflicted.
        message: String,
    },

    /// The session is unknown, or was already committed or aborted.
    #[error("session not found: {session}")]
    SessionNotFound {
        /// The session handle.
        session: SessionId,
    },

    /// A filter could not be built.
    #[error("invalid filter: {message}")]
    InvalidFilter {
        /// Description of the problem.
        message: String,
    },

    /// An update could not be applied to a document.
    #[error("invalid update on '{path}': {message}")]
    InvalidUpdate {
        /// Path the update targeted.
        path: String,
        /// Description of the problem.
        message: String,
    },

    /// Encoding or decoding a stored document failed.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
}

impl StoreError {
    /// Create a transient conflict error.
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::TransientConflict {
            message: message.into(),
        }
    }

    /// Create an invalid filter error.
    pub fn invalid_filter(message: impl Into<String>) -> Self {
        Self::InvalidFilter {
            message: message.into(),
        }
    }

    /// Create an invalid update error.
    pub fn invalid_update(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidUpdate {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Whether retrying the enclosing transaction may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::TransientConflict { .. })
    }
}

//! Error types for CatalogDB core.

use thiserror::Error;

/// Result type for catalog operations.
pub type CatalogResult<T> = Result<T, CatalogError>;

/// Errors that can occur in catalog operations.
#[derive(Debug, Clone, Error)]
pub enum CatalogError {
    /// Document store error.
    #[error("store error: {0}")]
    Store(#[from] catalogdb_store::StoreError),

    /// Document codec error.
    #[error("codec error: {0}")]
    Codec(#[from] catalogdb_codec::CodecError),

    /// Entity or field is absent.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Kind of entity searched.
        entity: String,
        /// Identifier that was not found.
        id: String,
    },

    /// An id is already taken within its scope.
    #[error("{entity} '{id}' already exists")]
    AlreadyExists {
        /// Kind of entity.
        entity: String,
        /// The colliding id.
        id: String,
    },

    /// A single-entity operation matched more than one live entity.
    #[error("update of {entity} matched {matched} entities, expected one")]
    AmbiguousUpdate {
        /// Kind of entity.
        entity: String,
        /// Number of matches.
        matched: usize,
    },

    /// Malformed or unsupported abstract query.
    #[error("query error: {message}")]
    Query {
        /// Description of the problem.
        message: String,
    },

    /// A query value could not be parsed for its field.
    #[error("cannot parse value '{value}' of field '{field}'")]
    Parse {
        /// Offending field.
        field: String,
        /// Offending value.
        value: String,
    },

    /// Deletion or detachment blocked by live references.
    #[error("{entity} '{id}' is in use: {reason}")]
    InUse {
        /// Kind of entity.
        entity: String,
        /// The referenced entity's id.
        id: String,
        /// Who still references it.
        reason: String,
    },

    /// Retries exhausted on transient store conflicts.
    #[error("transaction still conflicting after {attempts} attempts")]
    TransientConflict {
        /// Number of attempts made.
        attempts: u32,
    },

    /// The acting user lacks a required permission.
    #[error("permission denied: user '{user}' cannot {permission}: {reason}")]
    Authorization {
        /// Acting user.
        user: String,
        /// Required permission.
        permission: String,
        /// Why it was denied.
        reason: String,
    },

    /// Invalid argument to an operation.
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// Description of the problem.
        message: String,
    },
}

impl CatalogError {
    /// Creates a not found error.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Creates an already exists error.
    pub fn already_exists(entity: impl Into<String>, id: impl Into<String>) -> Self {
        Self::AlreadyExists {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Creates an ambiguous update error.
    pub fn ambiguous_update(entity: impl Into<String>, matched: usize) -> Self {
        Self::AmbiguousUpdate {
            entity: entity.into(),
            matched,
        }
    }

    /// Creates a query error.
    pub fn query(message: impl Into<String>) -> Self {
        Self::Query {
            message: message.into(),
        }
    }

    /// Creates a parse error.
    pub fn parse(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Parse {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Creates an in-use error.
    pub fn in_use(
        entity: impl Into<String>,
        id: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InUse {
            entity: entity.into(),
            id: id.into(),
            reason: reason.into(),
        }
    }

    /// Creates an authorization error.
    pub fn authorization(
        user: impl Into<String>,
        permission: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::Authorization {
            user: user.into(),
            permission: permission.into(),
            reason: reason.into(),
        }
    }

    /// Creates an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Whether the error is a store conflict worth retrying.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Store(e) if e.is_transient())
    }
}

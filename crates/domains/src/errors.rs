//! # Errors
//!
//! Two layers of failure: `StoreError` is what an adapter reports about a
//! single store call, `DomainError` is what a service operation reports to
//! its caller. The boundary layer maps each `DomainError` kind to a distinct
//! outcome, so kinds must never be collapsed into one another.

use std::time::Duration;

use thiserror::Error;

/// Failure of a single call against the backing store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The store could not be reached (pool exhausted, connection refused)
    #[error("store unreachable: {0}")]
    Connection(String),

    /// The call did not complete within the configured budget
    #[error("store call timed out after {0:?}")]
    Timeout(Duration),

    /// Container layout only: the board has no container
    #[error("board container '{0}' does not exist")]
    ContainerNotFound(String),

    /// The adapter's layout has no notion of this operation
    #[error("operation not supported by this store: {0}")]
    Unsupported(&'static str),

    /// A record could not be converted to or from its persisted form
    #[error("record codec error: {0}")]
    Codec(#[from] serde_json::Error),

    /// Any other driver-level failure
    #[error("store backend error: {0}")]
    Backend(String),
}

/// The error type for all service operations.
#[derive(Error, Debug)]
pub enum DomainError {
    /// A required field is missing or malformed (board, text, ids)
    #[error("validation error: {0}")]
    Validation(String),

    /// Zero records matched an update or delete
    #[error("{resource} not found: {id}")]
    NotFound { resource: &'static str, id: String },

    /// A store call exceeded its timeout
    #[error("store timed out after {0:?}")]
    StoreTimeout(Duration),

    /// The underlying store is unreachable or failing
    #[error("store failure: {0}")]
    StoreConnection(#[source] StoreError),

    /// A multi-step sequence committed some steps but not all.
    ///
    /// Only produced when the store could not scope the steps atomically.
    #[error(
        "{operation} partially applied: committed [{}], failed at {failed_step}",
        .committed.join(", ")
    )]
    PartialFailure {
        operation: &'static str,
        committed: Vec<String>,
        failed_step: String,
        #[source]
        source: Box<DomainError>,
    },
}

impl DomainError {
    pub fn not_found(resource: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            resource,
            id: id.to_string(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Stable machine-readable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::NotFound { .. } => "not_found",
            Self::StoreTimeout(_) => "store_timeout",
            Self::StoreConnection(_) => "store_connection",
            Self::PartialFailure { .. } => "partial_failure",
        }
    }
}

impl From<StoreError> for DomainError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Timeout(after) => Self::StoreTimeout(after),
            StoreError::ContainerNotFound(board) => Self::NotFound {
                resource: "board",
                id: board,
            },
            other => Self::StoreConnection(other),
        }
    }
}

/// A specialized Result type for service operations.
pub type Result<T> = std::result::Result<T, DomainError>;

/// A specialized Result type for store adapters.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

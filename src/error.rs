//! Error types for the refresh pipeline
//!
//! Input errors (`UnknownAssociation`, `AmbiguousReference`, `UnknownManager`)
//! only reject the target that caused them. `CollectionFailed`, `Store` and
//! `Cancelled` abort the whole invocation before anything is committed.
//! `MalformedResource` is collected as a warning on the graph.

use crate::resource::ScopeKey;
use thiserror::Error;

/// Errors raised by the provider API boundary
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Network failure or retryable status (408, 429, 5xx)
    #[error("transient provider failure: {0}")]
    Transient(String),

    /// Non-retryable HTTP status
    #[error("provider returned {status}: {message}")]
    Status { status: u16, message: String },

    /// Response body could not be decoded
    #[error("failed to decode provider response: {0}")]
    Decode(String),
}

impl ProviderError {
    pub fn is_transient(&self) -> bool {
        matches!(self, ProviderError::Transient(_))
    }
}

/// Errors raised by the persistence boundary
#[derive(Debug, Error)]
pub enum StoreError {
    /// A change set violated a store invariant; nothing was applied
    #[error("constraint violation: {0}")]
    Constraint(String),

    #[error("store lock poisoned")]
    Poisoned,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors raised by a refresh invocation
#[derive(Debug, Error)]
pub enum RefreshError {
    #[error("unknown association '{0}'")]
    UnknownAssociation(String),

    #[error("reference '{reference}' matched {matches} candidates, expected exactly one")]
    AmbiguousReference { reference: String, matches: usize },

    #[error("unknown manager {0}")]
    UnknownManager(u64),

    #[error("collection failed for {entry}: {source}")]
    CollectionFailed {
        entry: ScopeKey,
        #[source]
        source: ProviderError,
    },

    #[error("malformed {kind} resource '{id}': {reason}")]
    MalformedResource {
        kind: String,
        id: String,
        reason: String,
    },

    #[error("refresh cancelled before persistence")]
    Cancelled,

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl RefreshError {
    /// True for errors that only reject a single target
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            RefreshError::UnknownAssociation(_)
                | RefreshError::AmbiguousReference { .. }
                | RefreshError::UnknownManager(_)
        )
    }
}

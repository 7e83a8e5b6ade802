//! Error types for the `mangarec` crate.

use thiserror::Error;

/// Errors that can occur while building or querying the recommendation engine.
///
/// Request-level failures are always surfaced as one of these variants, never
/// as an empty success, so callers can tell "nothing matched" apart from a
/// system failure.
#[derive(Debug, Error)]
pub enum RecError {
    /// The feature dataset or engine configuration is unusable.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Caller input was rejected before any scoring took place.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A requested user or item does not exist.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// What was being looked up (`"user"`, `"item"`, ...).
        kind: &'static str,
        /// The identifier that was not found.
        id: String,
    },

    /// Scoring succeeded but no candidate survived filtering.
    #[error("No matching recommendations: {0}")]
    NoMatch(String),

    /// A downstream collaborator (catalogue, interaction source, dataset loader) failed.
    #[error("Collaborator error ({collaborator}): {message}")]
    Collaborator {
        /// The collaborator that produced the error.
        collaborator: String,
        /// A description of the failure.
        message: String,
    },

    /// An engine invariant was violated.
    #[error("Internal error: {0}")]
    Internal(String),

    /// Reading a dataset from disk failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored settings could not be (de)serialized.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl RecError {
    /// Shorthand for a [`RecError::Collaborator`] error.
    pub fn collaborator(collaborator: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Collaborator { collaborator: collaborator.into(), message: message.into() }
    }

    /// Shorthand for a [`RecError::NotFound`] error.
    pub fn not_found(kind: &'static str, id: impl ToString) -> Self {
        Self::NotFound { kind, id: id.to_string() }
    }

    /// Whether the failure is transient and the operation may be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io(_) | Self::Collaborator { .. })
    }

    /// Stable machine-readable name for the error category.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::Validation(_) => "validation",
            Self::NotFound { .. } => "not_found",
            Self::NoMatch(_) => "no_match",
            Self::Collaborator { .. } => "collaborator",
            Self::Internal(_) => "internal",
            Self::Io(_) => "io",
            Self::Serialization(_) => "serialization",
        }
    }
}

/// A convenience result type for recommendation operations.
pub type Result<T> = std::result::Result<T, RecError>;

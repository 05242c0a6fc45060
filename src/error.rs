//! Error types for the docchat pipeline.
//!
//! Uses `thiserror` for ergonomic error definitions. The variants mirror the
//! failure boundaries of the pipeline: a single embedding call, a
//! provider-wide outage, a re-ingest write race, and storage/config faults.

use thiserror::Error;

/// The top-level error type for all docchat operations.
#[derive(Debug, Error)]
pub enum Error {
    /// A single embedding call failed. Recoverable at the batch boundary by
    /// skipping the item; carries the failing text's identity.
    #[error("embedding failed for \"{text}\": {reason}")]
    Embedding { text: String, reason: String },

    /// A provider could not be reached at all. Retryable with backoff.
    #[error("{provider} unavailable: {reason}")]
    ProviderUnavailable { provider: String, reason: String },

    /// A provider rejected the request with a non-retryable status.
    #[error("{provider} API error {status}: {message}")]
    Provider {
        provider: String,
        status: u16,
        message: String,
    },

    /// Concurrent re-ingest of the same source. Resolved by retrying with
    /// latest-wins semantics.
    #[error("write conflict while replacing chunks for source {source_id}")]
    WriteConflict { source_id: String },

    #[error("conversation not found: {0}")]
    ConversationNotFound(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("storage error: {0}")]
    Store(#[from] sqlx::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Whether the caller may retry the operation as-is and expect it to
    /// eventually succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::ProviderUnavailable { .. } | Error::WriteConflict { .. }
        )
    }
}

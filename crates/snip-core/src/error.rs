//! Error types for snip Core
//!
//! Rejected requests are not errors; they are reported through
//! [`Outcome::Rejected`](crate::resolver::Outcome). The types here cover
//! malformed input at construction time and failures of the store itself.

use thiserror::Error;

/// Core error types
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid slug: {0}")]
    InvalidSlug(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("No free slug after {attempts} attempts")]
    SlugSpaceExhausted { attempts: u32 },
}

impl Error {
    /// Whether the failed transaction may be re-run from scratch
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Storage(StorageError::Conflict(_)))
    }
}

/// Storage error types
#[derive(Error, Debug)]
pub enum StorageError {
    /// Another transaction changed a record this one depends on
    #[error("Write conflict on {0}")]
    Conflict(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Transaction still conflicting after {0} retries")]
    RetriesExhausted(u32),
}

/// Result type alias for snip Core operations
pub type Result<T> = std::result::Result<T, Error>;

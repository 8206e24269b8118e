use crate::slug::Slug;
use thiserror::Error;

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Error taxonomy at the storage boundary.
///
/// Payload-bearing variants carry the failing slug or url so callers can
/// classify structurally and echo the conflicting value back to clients.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// The url is already stored; carries the slug it was stored under.
    #[error("{url}: already stored as {existing}")]
    AlreadyExists { url: String, existing: Slug },
    /// The slug is already taken. Raised by back-ends that key on the slug
    /// rather than the url; the shortener retries with a fresh slug.
    #[error("{0}: slug already taken")]
    SlugExists(Slug),
    #[error("{0}: not found in storage")]
    NotFound(Slug),
    #[error("{0}: was deleted")]
    Deleted(Slug),
    #[error("storage operation timed out: {0}")]
    Timeout(String),
    #[error("storage backend unavailable: {0}")]
    Unavailable(String),
    #[error("storage query failed: {0}")]
    Query(String),
    #[error("stored data is invalid: {0}")]
    InvalidData(String),
    #[error("storage i/o failed: {0}")]
    Io(String),
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::InvalidData(err.to_string())
    }
}

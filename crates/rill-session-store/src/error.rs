//! Error types for cache backend operations.

/// Error type for cache backend operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The backend rejected or failed an operation.
    #[error("Backend error: {0}")]
    Backend(String),

    /// The backend could not be reached.
    #[error("Backend unavailable: {0}")]
    Unavailable(String),
}

/// Result type for cache backend operations.
pub type Result<T> = std::result::Result<T, StoreError>;

//! Error types for the protection layer.

use thiserror::Error;

/// Main error type for protection layer operations.
///
/// Nothing in this enum ever reaches a wrapped handler: guard checks absorb
/// every internal failure into a proceed/reject outcome. These errors surface
/// only at construction time (configuration) or inside the counter store
/// plumbing, where the rate limiter converts them to fail-open decisions.
#[derive(Error, Debug)]
pub enum ProtectionError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Shared counter store transport errors
    #[error("Counter store error: {0}")]
    Store(#[from] redis::RedisError),

    /// Shared counter store call exceeded its bounded timeout
    #[error("Counter store timed out after {0:?}")]
    StoreTimeout(std::time::Duration),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for protection layer operations.
pub type Result<T> = std::result::Result<T, ProtectionError>;

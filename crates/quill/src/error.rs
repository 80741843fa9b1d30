//! Error types for the provider and the message list.

use quill_core::CoreError;
use quill_store::StoreError;
use thiserror::Error;

/// Errors that can occur during provider operations.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The address does not name a target this operation accepts.
    #[error("unroutable request: {0}")]
    Unroutable(String),

    /// Storage error, passed through unchanged.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// Malformed address or form input.
    #[error("invalid input: {0}")]
    Core(#[from] CoreError),
}

impl ProviderError {
    pub fn is_unroutable(&self) -> bool {
        matches!(self, ProviderError::Unroutable(_))
    }
}

/// Result type for provider operations.
pub type Result<T> = std::result::Result<T, ProviderError>;

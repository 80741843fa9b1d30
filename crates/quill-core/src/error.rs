//! Error types for Quill core.

use thiserror::Error;

/// Errors raised while parsing addresses or validating form input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("invalid message id: {0:?}")]
    InvalidId(String),

    #[error("field `{0}` must not be empty")]
    EmptyField(&'static str),

    #[error("unknown column: {0}")]
    UnknownColumn(String),
}

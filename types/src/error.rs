//! Top-level error type shared across crates.

use thiserror::Error;

/// Errors raised while constructing or parsing fundamental types.
#[derive(Debug, Error)]
pub enum TesseraError {
    #[error("invalid hash encoding: {0}")]
    InvalidHash(String),

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("invalid protocol parameters: {0}")]
    InvalidParams(String),
}

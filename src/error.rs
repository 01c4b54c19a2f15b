//! Error types for the Turnstile service.

use thiserror::Error;

/// Main error type for Turnstile operations.
#[derive(Error, Debug)]
pub enum TurnstileError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for Turnstile operations.
pub type Result<T> = std::result::Result<T, TurnstileError>;

/// A client has used up its quota for the current window.
///
/// This is a decision rather than a fault, so it is kept apart from
/// [`TurnstileError`]. The message is fixed and carries no retry hint.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Too many requests, please try again later")]
pub struct QuotaExceeded;

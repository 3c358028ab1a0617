//! Error types for aimsync

use thiserror::Error;

/// Main error type for aimsync transport and adapter operations.
///
/// Protocol-level failures (expired window, bad token, ...) are not errors in
/// this sense; they travel as [`crate::protocol::ErrorCode`] on the session's
/// status surface.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Radio error: {0}")]
    Radio(String),

    #[error("SoftAP passphrase too short: {0} chars (radio requires at least 8)")]
    PskTooShort(usize),

    #[error("Server error: {0}")]
    Server(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("System clock error: {0}")]
    Clock(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

/// Result type alias using aimsync's Error
pub type Result<T> = std::result::Result<T, Error>;

//! Error types for session decoding and playback configuration.

use thiserror::Error;

/// Failures reading or writing a session file.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Invalid record data: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Initial value is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("Invalid speed: {0:?}")]
    InvalidSpeed(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Rejected [`crate::PlaybackOptions`] or compression level.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OptionsError {
    #[error("Speed must be a positive finite number, got {0}")]
    InvalidSpeed(f64),

    #[error("Batch size must be at least 1")]
    ZeroBatchSize,

    #[error("Unknown compression level: {0}")]
    InvalidLevel(u8),
}

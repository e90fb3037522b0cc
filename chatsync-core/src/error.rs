//! Error types for chatsync-core

use thiserror::Error;

/// Main error type for the chatsync-core library
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Transport-level HTTP failure (connect, timeout, body read)
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// The API answered with a non-success status
    #[error("API error ({status}): {body}")]
    Api { status: u16, body: String },

    /// Conversation (or other resource) not found
    #[error("not found: {0}")]
    NotFound(String),

    /// Realtime connection failure
    #[error("realtime error: {0}")]
    Realtime(String),

    /// Push frame that could not be decoded
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Upload rejected before any request was made
    #[error("unsupported file type: {filename}")]
    UnsupportedFile { filename: String },
}

impl Error {
    /// Whether this failure is a transient network problem.
    ///
    /// Mutating requests that fail this way are rolled back and surfaced
    /// to the user; nothing retries them automatically.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Http(_) | Error::Realtime(_) => true,
            Error::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Http(err.to_string())
    }
}

/// Result type alias for chatsync-core
pub type Result<T> = std::result::Result<T, Error>;

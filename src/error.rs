//! Centralized error types for mailpost.

use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the mailpost library.
#[derive(Error, Debug)]
pub enum MailpostError {
    /// I/O error with the associated file path.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Invalid or incomplete configuration. Fatal, reported before any message is read.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The input could not be parsed as a MIME message.
    #[error("Malformed message: {0}")]
    MalformedMessage(String),

    /// The signature primitive failed to run or could not understand its input.
    #[error("Signature verification failed: {0}")]
    Verification(String),

    /// The embed lookup service failed.
    #[error("Embed lookup failed: {0}")]
    Lookup(String),

    /// A post file could not be read back.
    #[error("Invalid front matter: {0}")]
    FrontMatter(String),
}

/// Convenience alias for `Result<T, MailpostError>`.
pub type Result<T> = std::result::Result<T, MailpostError>;

impl MailpostError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Allow `?` on `std::io::Error` when no path context is available
/// (rare, prefer `MailpostError::io`).
impl From<std::io::Error> for MailpostError {
    fn from(source: std::io::Error) -> Self {
        Self::Io {
            path: PathBuf::from("<unknown>"),
            source,
        }
    }
}

impl From<reqwest::Error> for MailpostError {
    fn from(source: reqwest::Error) -> Self {
        Self::Lookup(source.to_string())
    }
}

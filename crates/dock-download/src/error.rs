//! Download error types
//!
//! Display strings double as the user-facing failure reason.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("A download named \"{0}\" is already in progress")]
    AlreadyActive(String),

    #[error("Download cancelled")]
    Cancelled,

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Server responded with HTTP {0}")]
    Http(u16),

    #[error("The download was redirected to a sign-in or error page ({0}). Please log in again and retry.")]
    InvalidRedirect(String),

    #[error("The server returned a web page ({content_type}, {size} bytes) instead of a file")]
    HtmlErrorPage { content_type: String, size: usize },

    #[error("Could not save file: {0}")]
    Save(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Capability error: {0}")]
    Capability(#[from] CapabilityError),
}

/// Failure reported by a platform capability (filesystem, notifications)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct CapabilityError(pub String);

impl CapabilityError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl From<std::io::Error> for CapabilityError {
    fn from(e: std::io::Error) -> Self {
        Self(e.to_string())
    }
}

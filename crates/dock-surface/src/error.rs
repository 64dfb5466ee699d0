//! Surface error types

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SurfaceError {
    #[error("Surface capability failed: {0}")]
    Capability(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Invalid state transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Malformed page message: {0}")]
    MalformedMessage(String),

    #[error("Could not launch {0}")]
    Launch(String),
}

impl SurfaceError {
    pub fn capability(message: impl Into<String>) -> Self {
        SurfaceError::Capability(message.into())
    }
}

//! Injection catalog error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum InjectError {
    #[error("App id cannot be empty")]
    EmptyAppId,

    #[error("Bundle for '{0}' has neither CSS nor JS")]
    EmptyBundle(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

//! Session error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("App id cannot be empty")]
    EmptyAppId,

    #[error("Invalid app URL: {0}")]
    InvalidUrl(String),
}

//! Core error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Storage error: {0}")]
    Storage(#[from] dock_storage::StorageError),

    #[error("Session error: {0}")]
    Session(#[from] dock_session::SessionError),

    #[error("Download error: {0}")]
    Download(#[from] dock_download::DownloadError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

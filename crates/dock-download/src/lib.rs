//! Dock Download Engine
//!
//! Downloads requested from inside a hosted web app:
//! - GET or POST (URL-encoded form) requests, redirects followed
//! - Rejects login/error redirects and HTML pages posing as files
//! - Filename from Content-Disposition, request, or final URL
//! - Streamed with progress callbacks and a replacing progress notification
//! - Cancellable per filename; at most one active task per filename

mod capability;
mod engine;
mod error;
pub mod filename;
mod local_fs;
pub mod policy;
mod request;
mod response;
mod task;

pub use capability::{
    Dialogs, FileInfo, FileSystem, HeadlessDialogs, Notification, NoopNotifier, Notifier,
};
pub use engine::{DownloadConfig, DownloadEngine, DownloadReport};
pub use error::{CapabilityError, DownloadError};
pub use local_fs::LocalFileSystem;
pub use request::{
    Directory, DownloadOptions, DownloadProgress, DownloadRequest, HttpMethod, ProgressCallback,
};
pub use response::ApiResponse;
pub use task::{DownloadState, DownloadTask};

pub type Result<T> = std::result::Result<T, DownloadError>;

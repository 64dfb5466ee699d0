//! Platform capabilities the engine depends on

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CapabilityError;
use crate::request::Directory;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    pub name: String,
    pub size: u64,
    pub modified_at: Option<DateTime<Utc>>,
    /// Platform location of the file (path or content URI)
    pub uri: String,
}

#[async_trait]
pub trait FileSystem: Send + Sync {
    /// Write `data` as `name` inside `directory`, returning the file's location
    async fn write_file(
        &self,
        name: &str,
        data: &[u8],
        directory: Directory,
    ) -> Result<String, CapabilityError>;

    async fn read_dir(&self, directory: Directory) -> Result<Vec<FileInfo>, CapabilityError>;

    async fn delete_file(&self, name: &str, directory: Directory) -> Result<(), CapabilityError>;

    /// `Ok(None)` when the file does not exist
    async fn stat(&self, name: &str, directory: Directory)
        -> Result<Option<FileInfo>, CapabilityError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    /// Stable id; scheduling the same id again replaces the notification
    pub id: i32,
    pub title: String,
    pub body: String,
    /// Determinate progress, if known
    pub progress: Option<u8>,
    pub ongoing: bool,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn request_permission(&self) -> bool;

    async fn schedule(&self, notification: Notification) -> Result<(), CapabilityError>;
}

#[async_trait]
pub trait Dialogs: Send + Sync {
    /// Blocking binary choice; `true` when the user picked `ok_label`
    async fn confirm(&self, title: &str, message: &str, ok_label: &str, cancel_label: &str)
        -> bool;

    async fn alert(&self, title: &str, message: &str);
}

/// Notifier for platforms without local notifications
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn request_permission(&self) -> bool {
        false
    }

    async fn schedule(&self, _notification: Notification) -> Result<(), CapabilityError> {
        Ok(())
    }
}

/// Dialogs for environments with no UI: alerts go to the log and every
/// confirmation gets the same answer
#[derive(Debug, Clone, Copy)]
pub struct HeadlessDialogs {
    confirm_answer: bool,
}

impl HeadlessDialogs {
    pub fn new(confirm_answer: bool) -> Self {
        Self { confirm_answer }
    }
}

impl Default for HeadlessDialogs {
    fn default() -> Self {
        Self::new(true)
    }
}

#[async_trait]
impl Dialogs for HeadlessDialogs {
    async fn confirm(&self, title: &str, message: &str, _ok: &str, _cancel: &str) -> bool {
        tracing::info!(
            title = %title,
            message = %message,
            answer = self.confirm_answer,
            "Auto-answered confirmation"
        );
        self.confirm_answer
    }

    async fn alert(&self, title: &str, message: &str) {
        tracing::info!(title = %title, message = %message, "Alert");
    }
}

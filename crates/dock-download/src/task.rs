//! Download task data structure

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::request::{Directory, HttpMethod};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DownloadState {
    /// Registered, waiting for confirmation or the first response byte
    Pending,
    /// Body is streaming
    Downloading,
    /// Written to disk
    Completed,
    /// Any network, policy or save failure
    Failed,
    /// Declined by the user or cancelled explicitly
    Cancelled,
}

impl DownloadState {
    pub fn as_str(&self) -> &'static str {
        match self {
            DownloadState::Pending => "pending",
            DownloadState::Downloading => "downloading",
            DownloadState::Completed => "completed",
            DownloadState::Failed => "failed",
            DownloadState::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DownloadState::Completed | DownloadState::Failed | DownloadState::Cancelled
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadTask {
    pub id: String,
    pub url: String,
    pub file_name: String,
    pub method: HttpMethod,
    pub directory: Option<Directory>,
    pub total_bytes: u64,
    pub loaded_bytes: u64,
    pub state: DownloadState,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl DownloadTask {
    pub fn new(url: String, file_name: String, method: HttpMethod) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            url,
            file_name,
            method,
            directory: None,
            total_bytes: 0,
            loaded_bytes: 0,
            state: DownloadState::Pending,
            error: None,
            created_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Rounded percentage, or -1 when the total size is unknown
    pub fn percentage(&self) -> i32 {
        percentage(self.loaded_bytes, self.total_bytes)
    }

    pub fn finish(&mut self, state: DownloadState, error: Option<String>) {
        self.state = state;
        self.error = error;
        self.finished_at = Some(Utc::now());
    }
}

pub(crate) fn percentage(loaded: u64, total: u64) -> i32 {
    if total == 0 {
        return -1;
    }
    (loaded as f64 / total as f64 * 100.0).round() as i32
}

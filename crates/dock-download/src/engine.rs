//! Download engine
//!
//! One task per resolved filename. Each task owns a watch channel used as its
//! abort handle; the body is assembled in memory and only written once it is
//! complete, so a cancelled or rejected download never leaves a partial file.

use futures_util::StreamExt;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, OnceCell};
use tokio::time::Instant;

use crate::capability::{Dialogs, FileInfo, FileSystem, Notification, Notifier};
use crate::error::DownloadError;
use crate::filename::{self, ResolvedName};
use crate::policy;
use crate::request::{
    Directory, DownloadOptions, DownloadProgress, DownloadRequest, HttpMethod, ProgressCallback,
};
use crate::response::ApiResponse;
use crate::task::{percentage, DownloadState, DownloadTask};
use crate::Result;

const RECENT_LIMIT: usize = 20;
const MAX_PREALLOCATION: usize = 16 * 1024 * 1024;
const UNKNOWN_SIZE_NOTIFY_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum DownloadControl {
    Continue,
    Cancel,
}

struct ActiveDownload {
    task: DownloadTask,
    control: watch::Sender<DownloadControl>,
}

/// Per-task bookkeeping while the pipeline runs
struct TaskContext {
    id: String,
    /// Registry key; follows the filename once the response names the file
    key: String,
    file_name: String,
    directory: Option<Directory>,
    notify: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    /// Used when the caller did not pick a directory and the user confirmed
    pub default_directory: Directory,
    pub invalid_redirect_patterns: Vec<String>,
    pub html_error_page_max_bytes: usize,
    pub notifications: bool,
    pub user_agent: Option<String>,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            default_directory: Directory::Documents,
            invalid_redirect_patterns: policy::default_invalid_redirect_patterns(),
            html_error_page_max_bytes: policy::DEFAULT_HTML_ERROR_PAGE_MAX_BYTES,
            notifications: true,
            user_agent: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DownloadReport {
    pub file_name: String,
    pub directory: Directory,
    pub uri: String,
    pub size: u64,
    pub sha256: String,
    pub final_url: String,
    pub content_type: Option<String>,
}

pub struct DownloadEngine {
    client: reqwest::Client,
    config: Arc<DownloadConfig>,
    fs: Arc<dyn FileSystem>,
    notifier: Arc<dyn Notifier>,
    dialogs: Arc<dyn Dialogs>,
    /// In-flight tasks keyed by filename
    active: Arc<RwLock<HashMap<String, ActiveDownload>>>,
    /// Finished tasks, newest last
    recent: Arc<RwLock<VecDeque<DownloadTask>>>,
    notification_permission: Arc<OnceCell<bool>>,
}

impl DownloadEngine {
    pub fn new(
        config: DownloadConfig,
        fs: Arc<dyn FileSystem>,
        notifier: Arc<dyn Notifier>,
        dialogs: Arc<dyn Dialogs>,
    ) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(user_agent) = &config.user_agent {
            builder = builder.user_agent(user_agent.clone());
        }
        let client = builder
            .build()
            .map_err(|e| DownloadError::Network(e.to_string()))?;

        Ok(Self {
            client,
            config: Arc::new(config),
            fs,
            notifier,
            dialogs,
            active: Arc::new(RwLock::new(HashMap::new())),
            recent: Arc::new(RwLock::new(VecDeque::new())),
            notification_permission: Arc::new(OnceCell::new()),
        })
    }

    /// Replace the HTTP client (proxy settings, custom TLS roots)
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    pub fn config(&self) -> &DownloadConfig {
        &self.config
    }

    /// Run one download to a terminal state.
    ///
    /// Every outcome except user cancellation ends in exactly one dialog and
    /// one notification; cancellation only replaces the notification.
    pub async fn download_file(
        &self,
        request: DownloadRequest,
        options: DownloadOptions,
        on_progress: Option<ProgressCallback>,
    ) -> ApiResponse<DownloadReport> {
        let initial = filename::initial_filename(request.filename.as_deref(), &request.url);
        let mut task = DownloadTask::new(request.url.clone(), initial.name.clone(), request.method);
        task.directory = options.directory;

        let (control_tx, control_rx) = watch::channel(DownloadControl::Continue);
        let registered = {
            let mut active = self.active.write();
            if active.contains_key(&initial.name) {
                false
            } else {
                active.insert(
                    initial.name.clone(),
                    ActiveDownload {
                        task: task.clone(),
                        control: control_tx,
                    },
                );
                true
            }
        };

        let mut ctx = TaskContext {
            id: task.id.clone(),
            key: initial.name.clone(),
            file_name: initial.name.clone(),
            directory: options.directory,
            notify: options.show_notification && self.config.notifications,
        };

        if !registered {
            tracing::warn!(download_id = %task.id, file_name = %initial.name, "Rejected duplicate download");
            let rejected = Err(DownloadError::AlreadyActive(initial.name.clone()));
            return self.finish(&ctx, task, rejected).await;
        }

        tracing::info!(
            download_id = %task.id,
            url = %request.url,
            method = request.method.as_str(),
            file_name = %initial.name,
            "Starting download"
        );

        let result = self
            .run(&mut ctx, &request, &initial, on_progress, control_rx)
            .await;

        let task = self.unregister(&ctx).unwrap_or_else(|| {
            task.file_name = ctx.file_name.clone();
            task
        });
        self.finish(&ctx, task, result).await
    }

    async fn run(
        &self,
        ctx: &mut TaskContext,
        request: &DownloadRequest,
        initial: &ResolvedName,
        on_progress: Option<ProgressCallback>,
        mut control: watch::Receiver<DownloadControl>,
    ) -> Result<DownloadReport> {
        let url = url::Url::parse(&request.url)
            .map_err(|_| DownloadError::InvalidUrl(request.url.clone()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(DownloadError::InvalidUrl(request.url.clone()));
        }

        let directory = match ctx.directory {
            Some(directory) => directory,
            None => {
                let directory = self.config.default_directory;
                let message = format!(
                    "Save \"{}\" to {}?",
                    ctx.file_name,
                    directory.display_name()
                );
                let confirmed = tokio::select! {
                    answer = self.dialogs.confirm("Download file", &message, "Download", "Cancel") => answer,
                    _ = cancelled(&mut control) => false,
                };
                if !confirmed {
                    return Err(DownloadError::Cancelled);
                }
                ctx.directory = Some(directory);
                self.update_task(ctx, |t| t.directory = Some(directory));
                directory
            }
        };

        let mut builder = match request.method {
            HttpMethod::Get => self.client.get(url.clone()),
            HttpMethod::Post => self.client.post(url.clone()),
        };
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if request.method == HttpMethod::Post {
            if let Some(form) = &request.form_data {
                builder = builder.form(form);
            }
        }

        let sent = tokio::select! {
            sent = builder.send() => sent,
            _ = cancelled(&mut control) => return Err(DownloadError::Cancelled),
        };
        let response = sent.map_err(|e| DownloadError::Network(e.to_string()))?;

        let final_url = response.url().clone();
        if policy::is_invalid_redirect(&final_url, &self.config.invalid_redirect_patterns) {
            return Err(DownloadError::InvalidRedirect(final_url.to_string()));
        }
        if !response.status().is_success() {
            return Err(DownloadError::Http(response.status().as_u16()));
        }

        let disposition = header_string(&response, reqwest::header::CONTENT_DISPOSITION);
        let content_type = header_string(&response, reqwest::header::CONTENT_TYPE);
        let file_name = filename::final_filename(initial, disposition.as_deref(), &final_url);
        self.rekey(ctx, &file_name)?;

        let total = response.content_length().unwrap_or(0);
        self.update_task(ctx, |t| {
            t.state = DownloadState::Downloading;
            t.total_bytes = total;
            t.file_name = file_name.clone();
        });

        let body = self
            .stream_body(ctx, response, total, on_progress.as_ref(), &mut control)
            .await?;

        if policy::looks_like_html_error(
            content_type.as_deref(),
            body.len(),
            &ctx.file_name,
            self.config.html_error_page_max_bytes,
        ) {
            return Err(DownloadError::HtmlErrorPage {
                content_type: content_type.unwrap_or_default(),
                size: body.len(),
            });
        }

        if *control.borrow() == DownloadControl::Cancel {
            return Err(DownloadError::Cancelled);
        }

        let uri = self
            .fs
            .write_file(&ctx.file_name, &body, directory)
            .await
            .map_err(|e| DownloadError::Save(e.to_string()))?;

        Ok(DownloadReport {
            file_name: ctx.file_name.clone(),
            directory,
            uri,
            size: body.len() as u64,
            sha256: sha256_hex(&body),
            final_url: final_url.to_string(),
            content_type,
        })
    }

    async fn stream_body(
        &self,
        ctx: &TaskContext,
        response: reqwest::Response,
        total: u64,
        on_progress: Option<&ProgressCallback>,
        control: &mut watch::Receiver<DownloadControl>,
    ) -> Result<Vec<u8>> {
        let capacity = usize::try_from(total).unwrap_or(0).min(MAX_PREALLOCATION);
        let mut body = Vec::with_capacity(capacity);
        let mut stream = response.bytes_stream();
        let mut loaded: u64 = 0;
        let mut last_percentage: Option<i32> = None;
        let mut last_notified = Instant::now();

        loop {
            let chunk = tokio::select! {
                chunk = stream.next() => chunk,
                _ = cancelled(control) => return Err(DownloadError::Cancelled),
            };
            let bytes = match chunk {
                Some(Ok(bytes)) => bytes,
                Some(Err(e)) => return Err(DownloadError::Network(e.to_string())),
                None => break,
            };

            body.extend_from_slice(&bytes);
            loaded = loaded.saturating_add(bytes.len() as u64);
            self.update_task(ctx, |t| t.loaded_bytes = loaded);

            let progress = DownloadProgress {
                file_name: ctx.file_name.clone(),
                loaded_bytes: loaded,
                total_bytes: total,
                percentage: percentage(loaded, total),
            };
            if let Some(callback) = on_progress {
                callback(&progress);
            }

            if ctx.notify {
                let due = if progress.percentage >= 0 {
                    last_percentage != Some(progress.percentage)
                } else {
                    last_notified.elapsed() >= UNKNOWN_SIZE_NOTIFY_INTERVAL
                };
                if due {
                    last_percentage = Some(progress.percentage);
                    last_notified = Instant::now();
                    self.notify(progress_notification(&progress)).await;
                }
            }
        }

        Ok(body)
    }

    async fn finish(
        &self,
        ctx: &TaskContext,
        mut task: DownloadTask,
        result: Result<DownloadReport>,
    ) -> ApiResponse<DownloadReport> {
        // A rejected duplicate must not overwrite the running task's notification
        let notification_id = match &result {
            Err(DownloadError::AlreadyActive(_)) => filename::notification_id(&task.id),
            _ => filename::notification_id(&ctx.file_name),
        };

        let response = match result {
            Ok(report) => {
                task.loaded_bytes = report.size;
                task.finish(DownloadState::Completed, None);
                tracing::info!(
                    download_id = %task.id,
                    file_name = %report.file_name,
                    size = report.size,
                    sha256 = %report.sha256,
                    "Completed download"
                );

                let message = format!(
                    "\"{}\" was saved to {}.",
                    report.file_name,
                    report.directory.display_name()
                );
                if ctx.notify {
                    self.notify(Notification {
                        id: notification_id,
                        title: "Download complete".to_string(),
                        body: message.clone(),
                        progress: Some(100),
                        ongoing: false,
                    })
                    .await;
                }
                self.dialogs.alert("Download complete", &message).await;

                ApiResponse::ok(report)
            }
            Err(DownloadError::Cancelled) => {
                task.finish(DownloadState::Cancelled, None);
                tracing::info!(download_id = %task.id, file_name = %ctx.file_name, "Cancelled download");

                if ctx.notify {
                    self.notify(Notification {
                        id: notification_id,
                        title: "Download cancelled".to_string(),
                        body: ctx.file_name.clone(),
                        progress: None,
                        ongoing: false,
                    })
                    .await;
                }

                ApiResponse::err(DownloadError::Cancelled.to_string())
            }
            Err(e) => {
                let reason = e.to_string();
                task.finish(DownloadState::Failed, Some(reason.clone()));
                tracing::warn!(
                    download_id = %task.id,
                    file_name = %ctx.file_name,
                    error = %reason,
                    "Download failed"
                );

                if ctx.notify {
                    self.notify(Notification {
                        id: notification_id,
                        title: "Download failed".to_string(),
                        body: format!("{}: {}", ctx.file_name, reason),
                        progress: None,
                        ongoing: false,
                    })
                    .await;
                }
                self.dialogs.alert("Download failed", &reason).await;

                ApiResponse::err(reason)
            }
        };

        let mut recent = self.recent.write();
        recent.push_back(task);
        while recent.len() > RECENT_LIMIT {
            recent.pop_front();
        }

        response
    }

    /// Abort the task registered under `file_name`
    pub fn cancel_download(&self, file_name: &str) -> bool {
        let entry = self.active.write().remove(file_name);

        match entry {
            Some(entry) => {
                let _ = entry.control.send(DownloadControl::Cancel);
                tracing::info!(download_id = %entry.task.id, file_name = %file_name, "Cancel requested");
                true
            }
            None => false,
        }
    }

    pub fn is_download_active(&self, file_name: &str) -> bool {
        self.active.read().contains_key(file_name)
    }

    pub fn active_downloads(&self) -> Vec<DownloadTask> {
        self.active
            .read()
            .values()
            .map(|entry| entry.task.clone())
            .collect()
    }

    /// Finished tasks, newest first
    pub fn recent_downloads(&self) -> Vec<DownloadTask> {
        self.recent.read().iter().rev().cloned().collect()
    }

    pub async fn list_files(&self, directory: Option<Directory>) -> ApiResponse<Vec<FileInfo>> {
        let directory = directory.unwrap_or(self.config.default_directory);
        self.fs
            .read_dir(directory)
            .await
            .map_err(DownloadError::from)
            .into()
    }

    pub async fn delete_file(&self, name: &str, directory: Option<Directory>) -> ApiResponse<()> {
        let directory = directory.unwrap_or(self.config.default_directory);
        let result = self.fs.delete_file(name, directory).await;
        if result.is_ok() {
            tracing::info!(file_name = %name, directory = %directory, "Deleted file");
        }
        result.map_err(DownloadError::from).into()
    }

    pub async fn stat_file(&self, name: &str, directory: Option<Directory>) -> ApiResponse<FileInfo> {
        let directory = directory.unwrap_or(self.config.default_directory);
        match self.fs.stat(name, directory).await {
            Ok(Some(info)) => ApiResponse::ok(info),
            Ok(None) => ApiResponse::err(DownloadError::NotFound(name.to_string()).to_string()),
            Err(e) => ApiResponse::err(DownloadError::from(e).to_string()),
        }
    }

    fn rekey(&self, ctx: &mut TaskContext, file_name: &str) -> Result<()> {
        if file_name == ctx.key {
            ctx.file_name = file_name.to_string();
            return Ok(());
        }

        let mut active = self.active.write();
        if active.contains_key(file_name) {
            return Err(DownloadError::AlreadyActive(file_name.to_string()));
        }

        match active.remove(&ctx.key) {
            Some(entry) if entry.task.id == ctx.id => {
                tracing::debug!(from = %ctx.key, to = %file_name, "Download renamed by response");
                active.insert(file_name.to_string(), entry);
                ctx.key = file_name.to_string();
            }
            // Cancelled and the name was reused by a newer task
            Some(other) => {
                active.insert(ctx.key.clone(), other);
            }
            None => {}
        }
        ctx.file_name = file_name.to_string();

        Ok(())
    }

    fn update_task<F>(&self, ctx: &TaskContext, f: F)
    where
        F: FnOnce(&mut DownloadTask),
    {
        if let Some(entry) = self.active.write().get_mut(&ctx.key) {
            if entry.task.id == ctx.id {
                f(&mut entry.task);
            }
        }
    }

    fn unregister(&self, ctx: &TaskContext) -> Option<DownloadTask> {
        let mut active = self.active.write();
        let ours = active
            .get(&ctx.key)
            .map(|entry| entry.task.id == ctx.id)
            .unwrap_or(false);

        if ours {
            active.remove(&ctx.key).map(|entry| entry.task)
        } else {
            None
        }
    }

    async fn notify(&self, notification: Notification) {
        if !self.notifications_allowed().await {
            return;
        }
        if let Err(e) = self.notifier.schedule(notification).await {
            tracing::warn!(error = %e, "Failed to post notification");
        }
    }

    async fn notifications_allowed(&self) -> bool {
        *self
            .notification_permission
            .get_or_init(|| async {
                let granted = self.notifier.request_permission().await;
                if !granted {
                    tracing::info!("Notification permission denied, download notifications disabled");
                }
                granted
            })
            .await
    }
}

impl Clone for DownloadEngine {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            config: Arc::clone(&self.config),
            fs: Arc::clone(&self.fs),
            notifier: Arc::clone(&self.notifier),
            dialogs: Arc::clone(&self.dialogs),
            active: Arc::clone(&self.active),
            recent: Arc::clone(&self.recent),
            notification_permission: Arc::clone(&self.notification_permission),
        }
    }
}

/// Resolves once the task has been told to cancel
async fn cancelled(control: &mut watch::Receiver<DownloadControl>) {
    loop {
        if *control.borrow_and_update() == DownloadControl::Cancel {
            return;
        }
        if control.changed().await.is_err() {
            if *control.borrow() == DownloadControl::Cancel {
                return;
            }
            std::future::pending::<()>().await;
        }
    }
}

fn progress_notification(progress: &DownloadProgress) -> Notification {
    let body = if progress.percentage >= 0 {
        format!("{}% of {}", progress.percentage, progress.file_name)
    } else {
        format!("{} KB of {}", progress.loaded_bytes / 1024, progress.file_name)
    };

    Notification {
        id: filename::notification_id(&progress.file_name),
        title: "Downloading".to_string(),
        body,
        progress: u8::try_from(progress.percentage.clamp(0, 100))
            .ok()
            .filter(|_| progress.percentage >= 0),
        ongoing: true,
    }
}

fn header_string(response: &reqwest::Response, name: reqwest::header::HeaderName) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}

fn sha256_hex(data: &[u8]) -> String {
    let digest = Sha256::digest(data);
    let mut out = String::with_capacity(digest.len() * 2);
    for b in digest {
        out.push_str(&format!("{:02x}", b));
    }
    out
}

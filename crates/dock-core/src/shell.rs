//! Shell facade
//!
//! Builds every subsystem from a `Config` and the platform's capabilities and
//! exposes the operations the UI layer calls.

use std::sync::Arc;

use dock_download::{
    ApiResponse, Dialogs, Directory, DownloadEngine, DownloadOptions, DownloadReport,
    DownloadRequest, DownloadTask, FileInfo, FileSystem, HeadlessDialogs, LocalFileSystem,
    NoopNotifier, Notifier, ProgressCallback,
};
use dock_inject::InjectionCatalog;
use dock_session::{AppDescriptor, Session, SessionManager};
use dock_storage::{Database, HistoryEntry, HistoryRepository};
use dock_surface::{
    open_native_app, HeadlessSurface, NativeLaunch, OpenResult, Surface, SurfaceController,
    UnsupportedLauncher, UriLauncher,
};

use crate::config::Config;
use crate::Result;

/// Native capabilities supplied by the host
#[derive(Clone)]
pub struct Platform {
    pub surface: Arc<dyn Surface>,
    pub fs: Arc<dyn FileSystem>,
    pub notifier: Arc<dyn Notifier>,
    pub dialogs: Arc<dyn Dialogs>,
    pub launcher: Arc<dyn UriLauncher>,
}

impl Platform {
    /// Fallbacks for hosts with no native UI: in-memory surface, local
    /// directories, no notifications, auto-confirmed dialogs
    pub fn headless(config: &Config) -> Self {
        Self {
            surface: Arc::new(HeadlessSurface::new()),
            fs: Arc::new(LocalFileSystem::new(config.download_dir.clone())),
            notifier: Arc::new(NoopNotifier),
            dialogs: Arc::new(HeadlessDialogs::default()),
            launcher: Arc::new(UnsupportedLauncher),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchOutcome {
    /// Handed off to the installed app or its store listing
    Native(NativeLaunch),
    Web(OpenResult),
}

pub struct Shell {
    config: Config,
    history: HistoryRepository,
    downloads: DownloadEngine,
    sessions: SessionManager,
    dialogs: Arc<dyn Dialogs>,
    launcher: Arc<dyn UriLauncher>,
}

impl Shell {
    pub fn new(config: Config, platform: Platform) -> Result<Self> {
        if let Some(parent) = config.database_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::open(&config.database_path)?;

        Self::with_database(config, platform, db)
    }

    pub fn with_database(config: Config, platform: Platform, db: Database) -> Result<Self> {
        let history = HistoryRepository::new(db);

        let downloads = DownloadEngine::new(
            config.download_config(),
            platform.fs,
            platform.notifier,
            Arc::clone(&platform.dialogs),
        )?;

        let controller = SurfaceController::new(platform.surface, InjectionCatalog::builtin())
            .with_download_sink(Arc::new(downloads.clone()));

        let sessions = SessionManager::new(
            controller,
            Arc::new(history.clone()),
            config.device_class,
        )
        .with_capacity(config.session_capacity())
        .with_session_memory_mb(config.per_session_memory_mb);

        tracing::info!(
            device_class = %config.device_class,
            capacity = sessions.capacity(),
            "Shell initialized"
        );

        Ok(Self {
            config,
            history,
            downloads,
            sessions,
            dialogs: platform.dialogs,
            launcher: platform.launcher,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn session_manager(&self) -> &SessionManager {
        &self.sessions
    }

    pub fn controller(&self) -> &SurfaceController {
        self.sessions.controller()
    }

    pub fn download_engine(&self) -> &DownloadEngine {
        &self.downloads
    }

    /// Open an app, preferring its native client when it has one
    pub async fn launch_app(&self, app: AppDescriptor) -> Result<LaunchOutcome> {
        if let Some(link) = &app.native {
            let outcome = open_native_app(link, self.launcher.as_ref(), self.dialogs.as_ref()).await;
            if outcome.is_handled() {
                return Ok(LaunchOutcome::Native(outcome));
            }
            tracing::info!(app_id = %app.id, outcome = ?outcome, "Falling back to web app");
        }

        Ok(LaunchOutcome::Web(self.open_app(app).await?))
    }

    pub async fn open_app(&self, app: AppDescriptor) -> Result<OpenResult> {
        Ok(self.sessions.open_app(app).await?)
    }

    pub async fn switch_to_app(&self, app_id: &str) -> Option<OpenResult> {
        self.sessions.switch_to_app(app_id).await
    }

    pub async fn close_app(&self, app_id: &str) -> bool {
        self.sessions.close_app(app_id).await
    }

    pub async fn close_all_apps(&self) {
        self.sessions.close_all_apps().await
    }

    pub fn get_memory_usage(&self) -> u32 {
        self.sessions.get_memory_usage()
    }

    pub fn sessions(&self) -> Vec<Session> {
        self.sessions.sessions()
    }

    pub fn active_session(&self) -> Option<Session> {
        self.sessions.active_session()
    }

    pub async fn download_file(
        &self,
        request: DownloadRequest,
        options: DownloadOptions,
        on_progress: Option<ProgressCallback>,
    ) -> ApiResponse<DownloadReport> {
        self.downloads
            .download_file(request, options, on_progress)
            .await
    }

    pub fn cancel_download(&self, file_name: &str) -> bool {
        self.downloads.cancel_download(file_name)
    }

    pub fn is_download_active(&self, file_name: &str) -> bool {
        self.downloads.is_download_active(file_name)
    }

    pub fn active_downloads(&self) -> Vec<DownloadTask> {
        self.downloads.active_downloads()
    }

    pub async fn list_files(&self, directory: Option<Directory>) -> ApiResponse<Vec<FileInfo>> {
        self.downloads.list_files(directory).await
    }

    pub async fn delete_file(&self, name: &str, directory: Option<Directory>) -> ApiResponse<()> {
        self.downloads.delete_file(name, directory).await
    }

    pub fn recent_history(&self, limit: usize) -> Result<Vec<HistoryEntry>> {
        Ok(self.history.recent(limit)?)
    }

    pub fn clear_history(&self) -> Result<usize> {
        Ok(self.history.clear()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use dock_session::DeviceClass;
    use dock_surface::{NativeAppLink, SurfaceError, SurfaceEvent, SurfaceEventKind};
    use serde_json::json;

    struct InstalledLauncher;

    #[async_trait]
    impl UriLauncher for InstalledLauncher {
        async fn launch(&self, uri: &str) -> std::result::Result<(), SurfaceError> {
            if uri.starts_with("ms-outlook://") {
                Ok(())
            } else {
                Err(SurfaceError::Launch(uri.to_string()))
            }
        }
    }

    fn shell(dir: &tempfile::TempDir) -> (Arc<HeadlessSurface>, Shell) {
        let config = Config::new(dir.path().to_path_buf());
        let surface = Arc::new(HeadlessSurface::new());
        let platform = Platform {
            surface: surface.clone(),
            launcher: Arc::new(InstalledLauncher),
            ..Platform::headless(&config)
        };
        let shell =
            Shell::with_database(config, platform, Database::open_in_memory().unwrap()).unwrap();
        (surface, shell)
    }

    fn app(id: &str) -> AppDescriptor {
        AppDescriptor::new(id, format!("https://{}.test", id))
    }

    #[tokio::test]
    async fn test_open_apps_records_history() {
        let dir = tempfile::tempdir().unwrap();
        let (surface, shell) = shell(&dir);

        shell.open_app(app("moodle")).await.unwrap();
        shell.open_app(app("teams")).await.unwrap();
        shell.switch_to_app("moodle").await;

        assert_eq!(shell.active_session().unwrap().app_id, "moodle");
        assert_eq!(shell.get_memory_usage(), 100);
        assert_eq!(surface.opened().len(), 3);
        assert_eq!(shell.recent_history(10).unwrap().len(), 2);
        assert_eq!(shell.clear_history().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_native_launch_skips_web_session() {
        let dir = tempfile::tempdir().unwrap();
        let (surface, shell) = shell(&dir);
        let outlook = app("outlook").with_native(NativeAppLink {
            name: "Outlook".to_string(),
            scheme_uri: "ms-outlook://".to_string(),
            store_url: "https://store.test/outlook".to_string(),
        });

        let outcome = shell.launch_app(outlook).await.unwrap();

        assert_eq!(outcome, LaunchOutcome::Native(NativeLaunch::Launched));
        assert!(shell.sessions().is_empty());
        assert!(surface.opened().is_empty());
    }

    #[tokio::test]
    async fn test_launch_without_native_opens_web() {
        let dir = tempfile::tempdir().unwrap();
        let (_, shell) = shell(&dir);

        let outcome = shell.launch_app(app("moodle")).await.unwrap();

        assert!(matches!(outcome, LaunchOutcome::Web(result) if result.success));
        assert_eq!(shell.sessions().len(), 1);
    }

    #[tokio::test]
    async fn test_page_message_reaches_download_engine() {
        let dir = tempfile::tempdir().unwrap();
        let (surface, shell) = shell(&dir);
        shell.open_app(app("moodle")).await.unwrap();

        assert_eq!(surface.listener_count(SurfaceEventKind::MessageFromPage), 1);
        surface
            .emit(SurfaceEvent::MessageFromPage(json!({
                "type": "download",
                "url": "ftp://files.test/notes.pdf"
            })))
            .await;

        // Rejected at URL validation, so nothing stays registered
        for _ in 0..100 {
            if shell.download_engine().recent_downloads().len() == 1 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert!(!shell.is_download_active("notes.pdf"));
        assert!(shell.active_downloads().is_empty());
    }

    #[tokio::test]
    async fn test_capacity_from_config() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::new(dir.path().to_path_buf());
        config.device_class = DeviceClass::Tablet;
        let shell = Shell::new(config.clone(), Platform::headless(&config)).unwrap();

        assert_eq!(shell.session_manager().capacity(), 5);
        assert!(config.database_path.exists());
        assert!(shell.list_files(None).await.into_result().unwrap().is_empty());
        assert!(!shell.cancel_download("missing.pdf"));
    }
}

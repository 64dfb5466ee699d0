//! Dock Core
//!
//! Mobile shell hosting several web apps in one native browsing surface.
//! `Shell` wires the session manager, surface controller, injection catalog
//! and download engine over the platform's capabilities.

mod config;
mod error;
mod shell;

pub use config::Config;
pub use error::CoreError;
pub use shell::{LaunchOutcome, Platform, Shell};

// Re-export core components
pub use dock_download::{
    ApiResponse, Dialogs, Directory, DownloadEngine, DownloadError, DownloadOptions,
    DownloadProgress, DownloadReport, DownloadRequest, DownloadState, DownloadTask, FileInfo,
    FileSystem, HeadlessDialogs, LocalFileSystem, NoopNotifier, Notifier, ProgressCallback,
};
pub use dock_inject::{DownloadPatterns, InjectionBundle, InjectionCatalog};
pub use dock_session::{AppDescriptor, DeviceClass, Session, SessionError, SessionManager};
pub use dock_storage::{Database, HistoryEntry, StorageError};
pub use dock_surface::{
    ChromeOptions, HeadlessSurface, NativeAppLink, NativeLaunch, OpenResult, Surface,
    SurfaceController, SurfaceEvent, SurfaceState, UnsupportedLauncher, UriLauncher,
};

pub type Result<T> = std::result::Result<T, CoreError>;

/// Initialize logging
pub fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    fmt().with_env_filter(filter).with_target(true).init();
}

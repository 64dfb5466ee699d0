//! Handing an app off to its installed native client

use async_trait::async_trait;
use dock_download::Dialogs;
use serde::{Deserialize, Serialize};

use crate::error::SurfaceError;
use crate::Result;

/// Native client for a web app, tried before opening a surface
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NativeAppLink {
    /// Display name used in the install prompt
    pub name: String,
    /// Platform URI scheme, e.g. `ms-outlook://`
    pub scheme_uri: String,
    pub store_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NativeLaunch {
    Launched,
    StoreOpened,
    /// App missing and the user chose not to install it
    Declined,
    Failed(String),
}

impl NativeLaunch {
    pub fn is_handled(&self) -> bool {
        matches!(self, NativeLaunch::Launched | NativeLaunch::StoreOpened)
    }
}

/// Opens platform URIs (custom schemes, store links)
#[async_trait]
pub trait UriLauncher: Send + Sync {
    async fn launch(&self, uri: &str) -> Result<()>;
}

/// Launcher for hosts that cannot open other apps
#[derive(Debug, Clone, Copy, Default)]
pub struct UnsupportedLauncher;

#[async_trait]
impl UriLauncher for UnsupportedLauncher {
    async fn launch(&self, uri: &str) -> Result<()> {
        Err(SurfaceError::Launch(uri.to_string()))
    }
}

/// Try the native app, then offer the store listing if it is not installed
pub async fn open_native_app(
    link: &NativeAppLink,
    launcher: &dyn UriLauncher,
    dialogs: &dyn Dialogs,
) -> NativeLaunch {
    match launcher.launch(&link.scheme_uri).await {
        Ok(()) => {
            tracing::info!(app = %link.name, "Launched native app");
            return NativeLaunch::Launched;
        }
        Err(e) => {
            tracing::debug!(app = %link.name, error = %e, "Native app not available");
        }
    }

    let message = format!(
        "{} is not installed on this device. Open the store to install it?",
        link.name
    );
    if !dialogs
        .confirm("App not installed", &message, "Install", "Cancel")
        .await
    {
        return NativeLaunch::Declined;
    }

    match launcher.launch(&link.store_url).await {
        Ok(()) => NativeLaunch::StoreOpened,
        Err(e) => {
            tracing::warn!(app = %link.name, error = %e, "Failed to open store");
            dialogs.alert("Could not open store", &e.to_string()).await;
            NativeLaunch::Failed(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dock_download::HeadlessDialogs;
    use parking_lot::Mutex;

    /// Accepts only the listed URIs
    #[derive(Default)]
    struct FakeLauncher {
        installed: Vec<String>,
        launched: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl UriLauncher for FakeLauncher {
        async fn launch(&self, uri: &str) -> Result<()> {
            if self.installed.iter().any(|u| u == uri) {
                self.launched.lock().push(uri.to_string());
                Ok(())
            } else {
                Err(SurfaceError::Launch(uri.to_string()))
            }
        }
    }

    fn outlook() -> NativeAppLink {
        NativeAppLink {
            name: "Outlook".to_string(),
            scheme_uri: "ms-outlook://".to_string(),
            store_url: "https://apps.apple.com/app/id951937596".to_string(),
        }
    }

    #[tokio::test]
    async fn test_installed_app_launches() {
        let launcher = FakeLauncher {
            installed: vec!["ms-outlook://".to_string()],
            ..Default::default()
        };

        let outcome = open_native_app(&outlook(), &launcher, &HeadlessDialogs::new(false)).await;

        assert_eq!(outcome, NativeLaunch::Launched);
        assert!(outcome.is_handled());
    }

    #[tokio::test]
    async fn test_missing_app_opens_store_when_confirmed() {
        let launcher = FakeLauncher {
            installed: vec![outlook().store_url],
            ..Default::default()
        };

        let outcome = open_native_app(&outlook(), &launcher, &HeadlessDialogs::new(true)).await;

        assert_eq!(outcome, NativeLaunch::StoreOpened);
        assert_eq!(*launcher.launched.lock(), vec![outlook().store_url]);
    }

    #[tokio::test]
    async fn test_missing_app_declined() {
        let launcher = FakeLauncher::default();

        let outcome = open_native_app(&outlook(), &launcher, &HeadlessDialogs::new(false)).await;

        assert_eq!(outcome, NativeLaunch::Declined);
        assert!(!outcome.is_handled());
    }

    #[tokio::test]
    async fn test_unsupported_launcher_fails_store_open() {
        let outcome =
            open_native_app(&outlook(), &UnsupportedLauncher, &HeadlessDialogs::new(true)).await;

        assert!(matches!(outcome, NativeLaunch::Failed(_)));
    }
}

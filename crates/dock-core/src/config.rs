//! Shell configuration

use dock_download::{policy, DownloadConfig};
use dock_session::DeviceClass;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::CoreError;
use crate::Result;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Path to the database file
    pub database_path: PathBuf,
    /// Root of the local download directories
    pub download_dir: PathBuf,
    /// Fixes session capacity
    pub device_class: DeviceClass,
    /// Overrides the device-class capacity
    pub max_sessions: Option<usize>,
    pub per_session_memory_mb: u32,
    /// Download notifications
    pub notifications: bool,
    /// Final-URL fragments that mark a sign-in or error page
    pub invalid_redirect_patterns: Vec<String>,
    pub html_error_page_max_bytes: usize,
    pub user_agent: Option<String>,
}

impl Config {
    pub fn new(data_dir: PathBuf) -> Self {
        Self {
            database_path: data_dir.join("dock.db"),
            download_dir: data_dir.join("files"),
            device_class: DeviceClass::Phone,
            max_sessions: None,
            per_session_memory_mb: 50,
            notifications: true,
            invalid_redirect_patterns: policy::default_invalid_redirect_patterns(),
            html_error_page_max_bytes: policy::DEFAULT_HTML_ERROR_PAGE_MAX_BYTES,
            user_agent: None,
        }
    }

    /// Per-user data directory, `.dock` when the platform has none
    pub fn data_dir() -> PathBuf {
        dirs::data_local_dir()
            .map(|d| d.join("Dock"))
            .unwrap_or_else(|| PathBuf::from(".dock"))
    }

    /// Read a TOML config; a missing file yields the defaults
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }

        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| CoreError::Config(e.to_string()))
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| CoreError::Config(e.to_string()))
    }

    /// Resident sessions allowed at once
    pub fn session_capacity(&self) -> usize {
        self.max_sessions
            .unwrap_or_else(|| self.device_class.capacity())
            .max(1)
    }

    pub fn download_config(&self) -> DownloadConfig {
        DownloadConfig {
            invalid_redirect_patterns: self.invalid_redirect_patterns.clone(),
            html_error_page_max_bytes: self.html_error_page_max_bytes,
            notifications: self.notifications,
            user_agent: self.user_agent.clone(),
            ..DownloadConfig::default()
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(Self::data_dir())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_dir_is_app_scoped() {
        let dir = Config::data_dir();
        match dirs::data_local_dir() {
            Some(base) => assert_eq!(dir, base.join("Dock")),
            None => assert_eq!(dir, PathBuf::from(".dock")),
        }
        assert_eq!(Config::default().database_path, dir.join("dock.db"));
    }

    #[test]
    fn test_defaults() {
        let config = Config::new(PathBuf::from("/data"));
        assert_eq!(config.database_path, PathBuf::from("/data/dock.db"));
        assert_eq!(config.session_capacity(), 3);
        assert_eq!(config.per_session_memory_mb, 50);
        assert_eq!(config.html_error_page_max_bytes, 10 * 1024);
        assert!(config.invalid_redirect_patterns.iter().any(|p| p == "/login"));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = Config::from_toml(
            r#"
            device_class = "tablet"
            notifications = false
            "#,
        )
        .unwrap();

        assert_eq!(config.device_class, DeviceClass::Tablet);
        assert_eq!(config.session_capacity(), 5);
        assert!(!config.notifications);
        assert!(!config.download_config().notifications);
        assert_eq!(config.per_session_memory_mb, 50);
    }

    #[test]
    fn test_max_sessions_override() {
        let config = Config::from_toml("max_sessions = 0").unwrap();
        assert_eq!(config.session_capacity(), 1);
    }

    #[test]
    fn test_invalid_toml() {
        assert!(matches!(
            Config::from_toml("device_class = \"watch\""),
            Err(CoreError::Config(_))
        ));
    }

    #[test]
    fn test_load_missing_and_roundtrip_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dock.toml");
        assert_eq!(Config::load(&path).unwrap(), Config::default());

        let mut config = Config::new(dir.path().to_path_buf());
        config.user_agent = Some("Dock/1.0".to_string());
        std::fs::write(&path, config.to_toml().unwrap()).unwrap();

        assert_eq!(Config::load(&path).unwrap(), config);
    }
}

//! Download request types
//!
//! `DownloadRequest` is the payload of the `{type: 'download', ...}` message
//! posted by the injected interceptor, so it deserializes from camelCase.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    #[serde(alias = "get")]
    Get,
    #[serde(alias = "post")]
    Post,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadRequest {
    pub url: String,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub method: HttpMethod,
    #[serde(default)]
    pub form_data: Option<HashMap<String, String>>,
}

impl DownloadRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn post(url: impl Into<String>, form_data: HashMap<String, String>) -> Self {
        Self {
            url: url.into(),
            method: HttpMethod::Post,
            form_data: Some(form_data),
            ..Self::default()
        }
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

/// Destination directory convention owned by the engine
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Directory {
    #[default]
    Documents,
    Downloads,
    Data,
    Cache,
    External,
}

impl Directory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Directory::Documents => "documents",
            Directory::Downloads => "downloads",
            Directory::Data => "data",
            Directory::Cache => "cache",
            Directory::External => "external",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Directory::Documents => "Documents",
            Directory::Downloads => "Downloads",
            Directory::Data => "App data",
            Directory::Cache => "Cache",
            Directory::External => "External storage",
        }
    }
}

impl std::fmt::Display for Directory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Directory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "documents" => Ok(Directory::Documents),
            "downloads" => Ok(Directory::Downloads),
            "data" => Ok(Directory::Data),
            "cache" => Ok(Directory::Cache),
            "external" => Ok(Directory::External),
            _ => Err(format!("Unknown directory: {}", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadOptions {
    /// When `None` the user is asked to confirm saving to the default directory
    pub directory: Option<Directory>,
    pub show_notification: bool,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            directory: None,
            show_notification: true,
        }
    }
}

impl DownloadOptions {
    pub fn with_directory(directory: Directory) -> Self {
        Self {
            directory: Some(directory),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DownloadProgress {
    pub file_name: String,
    pub loaded_bytes: u64,
    /// 0 when the server did not send a length
    pub total_bytes: u64,
    /// -1 when the total is unknown
    pub percentage: i32,
}

pub type ProgressCallback = Arc<dyn Fn(&DownloadProgress) + Send + Sync>;

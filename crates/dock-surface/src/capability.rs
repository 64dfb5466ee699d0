//! Native surface capability

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::Result;

/// Event names a listener can subscribe to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SurfaceEventKind {
    PageLoaded,
    MessageFromPage,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceEvent {
    /// Fired once per navigation, including in-surface ones
    PageLoaded { url: Option<String> },
    /// Arbitrary JSON posted through the page bridge
    MessageFromPage(serde_json::Value),
}

impl SurfaceEvent {
    pub fn kind(&self) -> SurfaceEventKind {
        match self {
            SurfaceEvent::PageLoaded { .. } => SurfaceEventKind::PageLoaded,
            SurfaceEvent::MessageFromPage(_) => SurfaceEventKind::MessageFromPage,
        }
    }
}

pub type Listener = Arc<dyn Fn(SurfaceEvent) -> BoxFuture<'static, ()> + Send + Sync>;

/// Handle returned by `add_listener`, used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

/// Presentation of a managed (in-app browser style) surface
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChromeOptions {
    pub title: Option<String>,
    /// Toolbar color, usually the app's accent
    pub toolbar_color: Option<String>,
    pub show_url: bool,
    pub close_button_text: Option<String>,
}

impl ChromeOptions {
    pub fn titled(title: impl Into<String>, toolbar_color: Option<String>) -> Self {
        Self {
            title: Some(title.into()),
            toolbar_color,
            show_url: false,
            close_button_text: Some("Done".to_string()),
        }
    }
}

/// The platform's single embedded browsing surface
#[async_trait]
pub trait Surface: Send + Sync {
    async fn open(&self, url: &str) -> Result<()>;

    async fn open_managed(&self, url: &str, options: &ChromeOptions) -> Result<()>;

    async fn close(&self) -> Result<()>;

    async fn execute_script(&self, code: &str) -> Result<()>;

    async fn post_message(&self, payload: serde_json::Value) -> Result<()>;

    async fn add_listener(&self, kind: SurfaceEventKind, listener: Listener) -> Result<ListenerId>;

    async fn remove_listener(&self, id: ListenerId) -> Result<()>;

    async fn remove_all_listeners(&self) -> Result<()>;
}

//! Session data structure

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::app::AppDescriptor;

/// One resident web app
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub app_id: String,
    pub url: String,
    pub title: String,
    pub accent_color: Option<String>,
    pub icon_ref: Option<String>,
    /// Whether this session is the one shown in the surface
    pub is_active: bool,
    /// Surface instance that last rendered this session
    pub surface_handle: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
    /// Advisory, for the memory readout only
    pub estimated_memory_mb: u32,
    /// Monotonic access order, breaks `last_accessed_at` ties
    #[serde(skip)]
    pub(crate) access_seq: u64,
}

impl Session {
    pub(crate) fn new(app: &AppDescriptor, estimated_memory_mb: u32, access_seq: u64) -> Self {
        let now = Utc::now();

        Self {
            app_id: app.id.clone(),
            url: app.url.clone(),
            title: app.title.clone(),
            accent_color: app.accent_color.clone(),
            icon_ref: app.icon_ref.clone(),
            is_active: false,
            surface_handle: None,
            created_at: now,
            last_accessed_at: now,
            estimated_memory_mb,
            access_seq,
        }
    }

    /// Record an access (admission or switch-to)
    pub(crate) fn touch(&mut self, access_seq: u64) {
        self.last_accessed_at = Utc::now();
        self.access_seq = access_seq;
    }

    /// Sort key for eviction, oldest first
    pub(crate) fn recency(&self) -> (DateTime<Utc>, u64) {
        (self.last_accessed_at, self.access_seq)
    }

    pub fn display_title(&self) -> &str {
        if self.title.is_empty() {
            &self.app_id
        } else {
            &self.title
        }
    }
}

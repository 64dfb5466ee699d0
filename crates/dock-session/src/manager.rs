//! Session Manager
//!
//! Registry of resident sessions in admission order plus the active pointer.
//! Operations are serialized; the registry lock is never held while the
//! surface controller is awaited.

use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::Mutex;

use dock_surface::{OpenResult, SurfaceController};

use crate::app::{chrome_for, AppDescriptor, DeviceClass};
use crate::history::HistorySink;
use crate::session::Session;
use crate::Result;

pub const DEFAULT_SESSION_MEMORY_MB: u32 = 50;

#[derive(Default)]
struct Registry {
    /// Admission order
    sessions: Vec<Session>,
    access_counter: u64,
}

impl Registry {
    fn next_access(&mut self) -> u64 {
        self.access_counter += 1;
        self.access_counter
    }

    fn position(&self, app_id: &str) -> Option<usize> {
        self.sessions.iter().position(|s| s.app_id == app_id)
    }

    fn active(&self) -> Option<&Session> {
        self.sessions.iter().find(|s| s.is_active)
    }

    /// Make the session at `index` the only active one
    fn activate(&mut self, index: usize) {
        let seq = self.next_access();
        for (i, session) in self.sessions.iter_mut().enumerate() {
            session.is_active = i == index;
        }
        self.sessions[index].touch(seq);
    }

    /// Remove the least recently used inactive session
    fn evict_one(&mut self) -> Option<Session> {
        let index = self
            .sessions
            .iter()
            .enumerate()
            .filter(|(_, s)| !s.is_active)
            .min_by_key(|(_, s)| s.recency())
            .map(|(i, _)| i)?;
        Some(self.sessions.remove(index))
    }
}

pub struct SessionManager {
    registry: Arc<RwLock<Registry>>,
    controller: SurfaceController,
    history: Arc<dyn HistorySink>,
    capacity: usize,
    per_session_memory_mb: u32,
    ops: Arc<Mutex<()>>,
}

impl SessionManager {
    pub fn new(
        controller: SurfaceController,
        history: Arc<dyn HistorySink>,
        device_class: DeviceClass,
    ) -> Self {
        Self {
            registry: Arc::new(RwLock::new(Registry::default())),
            controller,
            history,
            capacity: device_class.capacity(),
            per_session_memory_mb: DEFAULT_SESSION_MEMORY_MB,
            ops: Arc::new(Mutex::new(())),
        }
    }

    /// Override the device-class capacity (minimum 1)
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    pub fn with_session_memory_mb(mut self, mb: u32) -> Self {
        self.per_session_memory_mb = mb;
        self
    }

    pub fn controller(&self) -> &SurfaceController {
        &self.controller
    }

    /// Bring `app` to the foreground, admitting it if it is not resident.
    ///
    /// Returns once the surface has been asked to open. A failed open leaves
    /// the session resident so switching back retries it.
    pub async fn open_app(&self, app: AppDescriptor) -> Result<OpenResult> {
        app.validate()?;
        let _op = self.ops.lock().await;

        if self.registry.read().position(&app.id).is_some() {
            return Ok(self.switch_locked(&app.id).await.unwrap_or_else(|| {
                OpenResult {
                    success: true,
                    error: None,
                    surface_id: self.controller.surface_id(),
                }
            }));
        }

        let (url, chrome) = {
            let mut registry = self.registry.write();

            if registry.sessions.len() >= self.capacity {
                match registry.evict_one() {
                    Some(evicted) => tracing::info!(
                        app_id = %evicted.app_id,
                        capacity = self.capacity,
                        "Evicted least recently used session"
                    ),
                    None => tracing::warn!(
                        capacity = self.capacity,
                        "No inactive session to evict, admitting over capacity"
                    ),
                }
            }

            let seq = registry.next_access();
            registry
                .sessions
                .push(Session::new(&app, self.per_session_memory_mb, seq));
            let index = registry.sessions.len() - 1;
            registry.activate(index);

            (
                app.url.clone(),
                chrome_for(&app.title, app.accent_color.as_deref()),
            )
        };

        tracing::info!(app_id = %app.id, url = %url, "Opened app session");

        let result = self
            .controller
            .open_url(&url, Some(&app.id), Some(&chrome))
            .await;
        self.record_surface(&app.id, &result);
        self.history.add_to_history(&app.id, &url);

        Ok(result)
    }

    /// Foreground a resident session. `None` when `app_id` is already active
    /// or not resident.
    pub async fn switch_to_app(&self, app_id: &str) -> Option<OpenResult> {
        let _op = self.ops.lock().await;
        self.switch_locked(app_id).await
    }

    async fn switch_locked(&self, app_id: &str) -> Option<OpenResult> {
        let (url, chrome) = {
            let mut registry = self.registry.write();
            let index = registry.position(app_id)?;
            if registry.sessions[index].is_active {
                return None;
            }
            registry.activate(index);
            let session = &registry.sessions[index];
            (
                session.url.clone(),
                chrome_for(&session.title, session.accent_color.as_deref()),
            )
        };

        tracing::info!(app_id = %app_id, "Switched to app");

        let result = self
            .controller
            .open_url(&url, Some(app_id), Some(&chrome))
            .await;
        self.record_surface(app_id, &result);

        Some(result)
    }

    /// Remove a session. Closing the active one releases the surface and, if
    /// any sessions remain, activates the last one in admission order.
    /// Returns whether a session was removed.
    pub async fn close_app(&self, app_id: &str) -> bool {
        let _op = self.ops.lock().await;

        let (was_active, successor) = {
            let mut registry = self.registry.write();
            let index = match registry.position(app_id) {
                Some(index) => index,
                None => return false,
            };
            let removed = registry.sessions.remove(index);

            let successor = if removed.is_active && !registry.sessions.is_empty() {
                let last = registry.sessions.len() - 1;
                registry.activate(last);
                let session = &registry.sessions[last];
                Some((
                    session.app_id.clone(),
                    session.url.clone(),
                    chrome_for(&session.title, session.accent_color.as_deref()),
                ))
            } else {
                None
            };

            (removed.is_active, successor)
        };

        tracing::info!(app_id = %app_id, was_active, "Closed app session");

        if was_active {
            let closed = self.controller.close().await;
            if let Some(error) = closed.error {
                tracing::warn!(app_id = %app_id, error = %error, "Surface close failed");
            }

            if let Some((next_id, url, chrome)) = successor {
                let result = self
                    .controller
                    .open_url(&url, Some(&next_id), Some(&chrome))
                    .await;
                self.record_surface(&next_id, &result);
            }
        }

        true
    }

    /// Drop every session and release the surface
    pub async fn close_all_apps(&self) {
        let _op = self.ops.lock().await;

        let count = {
            let mut registry = self.registry.write();
            let count = registry.sessions.len();
            registry.sessions.clear();
            count
        };

        let closed = self.controller.close().await;
        if let Some(error) = closed.error {
            tracing::warn!(error = %error, "Surface close failed");
        }

        tracing::info!(count, "Closed all app sessions");
    }

    /// Advisory estimate: resident sessions times the per-session constant
    pub fn get_memory_usage(&self) -> u32 {
        let count = u32::try_from(self.session_count()).unwrap_or(u32::MAX);
        count.saturating_mul(self.per_session_memory_mb)
    }

    /// Resident sessions in admission order
    pub fn sessions(&self) -> Vec<Session> {
        self.registry.read().sessions.clone()
    }

    pub fn active_session(&self) -> Option<Session> {
        self.registry.read().active().cloned()
    }

    pub fn get_session(&self, app_id: &str) -> Option<Session> {
        let registry = self.registry.read();
        registry
            .position(app_id)
            .map(|index| registry.sessions[index].clone())
    }

    pub fn session_count(&self) -> usize {
        self.registry.read().sessions.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn record_surface(&self, app_id: &str, result: &OpenResult) {
        if !result.success {
            tracing::warn!(
                app_id = %app_id,
                error = result.error.as_deref().unwrap_or("unknown"),
                "Surface did not open"
            );
        }

        let mut registry = self.registry.write();
        if let Some(index) = registry.position(app_id) {
            registry.sessions[index].surface_handle = result.surface_id.clone();
        }
    }
}

impl Clone for SessionManager {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
            controller: self.controller.clone(),
            history: Arc::clone(&self.history),
            capacity: self.capacity,
            per_session_memory_mb: self.per_session_memory_mb,
            ops: Arc::clone(&self.ops),
        }
    }
}

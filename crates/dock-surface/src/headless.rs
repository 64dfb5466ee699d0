//! In-memory surface for hosts without a native browsing surface

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::capability::{ChromeOptions, Listener, ListenerId, Surface, SurfaceEvent, SurfaceEventKind};
use crate::error::SurfaceError;
use crate::Result;

#[derive(Default)]
struct HeadlessState {
    current_url: Option<String>,
    opened: Vec<String>,
    managed: Vec<ChromeOptions>,
    closes: usize,
    scripts: Vec<String>,
    posted: Vec<serde_json::Value>,
    listeners: Vec<(ListenerId, SurfaceEventKind, Listener)>,
    next_listener: u64,
    fail_open: bool,
    failing_script: Option<String>,
}

/// Records every call and lets the host (or a test) drive page events with
/// [`HeadlessSurface::emit`]
#[derive(Default)]
pub struct HeadlessSurface {
    state: Mutex<HeadlessState>,
}

impl HeadlessSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent opens fail until reset
    pub fn set_fail_open(&self, fail: bool) {
        self.state.lock().fail_open = fail;
    }

    /// Fail any script containing `needle`
    pub fn fail_scripts_containing(&self, needle: impl Into<String>) {
        self.state.lock().failing_script = Some(needle.into());
    }

    /// Deliver an event to every matching listener, waiting for each to finish
    pub async fn emit(&self, event: SurfaceEvent) {
        let kind = event.kind();
        let listeners: Vec<Listener> = self
            .state
            .lock()
            .listeners
            .iter()
            .filter(|(_, k, _)| *k == kind)
            .map(|(_, _, listener)| listener.clone())
            .collect();

        for listener in listeners {
            listener(event.clone()).await;
        }
    }

    pub fn current_url(&self) -> Option<String> {
        self.state.lock().current_url.clone()
    }

    pub fn is_open(&self) -> bool {
        self.state.lock().current_url.is_some()
    }

    /// Every URL opened, in order
    pub fn opened(&self) -> Vec<String> {
        self.state.lock().opened.clone()
    }

    pub fn managed_options(&self) -> Vec<ChromeOptions> {
        self.state.lock().managed.clone()
    }

    pub fn close_count(&self) -> usize {
        self.state.lock().closes
    }

    pub fn scripts(&self) -> Vec<String> {
        self.state.lock().scripts.clone()
    }

    pub fn clear_scripts(&self) {
        self.state.lock().scripts.clear();
    }

    pub fn posted(&self) -> Vec<serde_json::Value> {
        self.state.lock().posted.clone()
    }

    pub fn listener_count(&self, kind: SurfaceEventKind) -> usize {
        self.state
            .lock()
            .listeners
            .iter()
            .filter(|(_, k, _)| *k == kind)
            .count()
    }

    fn record_open(&self, url: &str) -> Result<()> {
        let mut state = self.state.lock();
        if state.fail_open {
            return Err(SurfaceError::capability(format!("open refused: {}", url)));
        }
        state.current_url = Some(url.to_string());
        state.opened.push(url.to_string());
        Ok(())
    }
}

#[async_trait]
impl Surface for HeadlessSurface {
    async fn open(&self, url: &str) -> Result<()> {
        self.record_open(url)
    }

    async fn open_managed(&self, url: &str, options: &ChromeOptions) -> Result<()> {
        self.record_open(url)?;
        self.state.lock().managed.push(options.clone());
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        let mut state = self.state.lock();
        state.current_url = None;
        state.closes += 1;
        Ok(())
    }

    async fn execute_script(&self, code: &str) -> Result<()> {
        let mut state = self.state.lock();
        if let Some(needle) = &state.failing_script {
            if code.contains(needle.as_str()) {
                return Err(SurfaceError::capability("script rejected"));
            }
        }
        state.scripts.push(code.to_string());
        Ok(())
    }

    async fn post_message(&self, payload: serde_json::Value) -> Result<()> {
        self.state.lock().posted.push(payload);
        Ok(())
    }

    async fn add_listener(&self, kind: SurfaceEventKind, listener: Listener) -> Result<ListenerId> {
        let mut state = self.state.lock();
        state.next_listener += 1;
        let id = ListenerId(state.next_listener);
        state.listeners.push((id, kind, listener));
        Ok(id)
    }

    async fn remove_listener(&self, id: ListenerId) -> Result<()> {
        let mut state = self.state.lock();
        let before = state.listeners.len();
        state.listeners.retain(|(existing, _, _)| *existing != id);
        if state.listeners.len() == before {
            return Err(SurfaceError::capability(format!("unknown listener {}", id.0)));
        }
        Ok(())
    }

    async fn remove_all_listeners(&self) -> Result<()> {
        self.state.lock().listeners.clear();
        Ok(())
    }
}

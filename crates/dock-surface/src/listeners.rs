//! Subscription handles owned by the controller

use crate::capability::{ListenerId, Surface};

/// Handles for every listener the controller registered on the surface.
///
/// `detach_all` runs before each open and close; nothing else unsubscribes.
#[derive(Debug, Default)]
pub struct ListenerSet {
    handles: Vec<ListenerId>,
}

impl ListenerSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn track(&mut self, id: ListenerId) {
        self.handles.push(id);
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Remove every tracked listener. If the surface refuses a single
    /// removal, fall back to clearing all of its listeners.
    pub async fn detach_all(&mut self, surface: &dyn Surface) {
        let mut failed = false;
        for id in self.handles.drain(..) {
            if let Err(e) = surface.remove_listener(id).await {
                tracing::warn!(listener = id.0, error = %e, "Failed to remove listener");
                failed = true;
            }
        }

        if failed {
            if let Err(e) = surface.remove_all_listeners().await {
                tracing::warn!(error = %e, "Failed to clear surface listeners");
            }
        }
    }
}

//! History collaborator

use dock_storage::HistoryRepository;

/// Receives a visit each time an app is admitted. Fire-and-forget: sinks log
/// their own failures.
pub trait HistorySink: Send + Sync {
    fn add_to_history(&self, app_id: &str, url: &str);
}

impl HistorySink for HistoryRepository {
    fn add_to_history(&self, app_id: &str, url: &str) {
        if let Err(e) = self.record_visit(app_id, url) {
            tracing::warn!(app_id = %app_id, error = %e, "Failed to record history");
        }
    }
}

/// Sink for shells running without persistence
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHistory;

impl HistorySink for NoHistory {
    fn add_to_history(&self, _app_id: &str, _url: &str) {}
}

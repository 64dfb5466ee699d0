//! Surface Lifecycle Controller
//!
//! Sole owner of the native surface and of the listeners registered on it.
//! Every open and close starts by detaching all listeners, so a page load is
//! never handled by a listener from an earlier open.

use dock_download::{ApiResponse, DownloadEngine, DownloadOptions, DownloadRequest};
use dock_inject::{InjectionCatalog, InjectionPlan, InjectionStep};
use futures_util::FutureExt;
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::capability::{ChromeOptions, Listener, Surface, SurfaceEvent, SurfaceEventKind};
use crate::error::SurfaceError;
use crate::listeners::ListenerSet;
use crate::message::PageMessage;
use crate::state::SurfaceState;
use crate::Result;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenResult {
    pub success: bool,
    pub error: Option<String>,
    /// Identifies the native surface instance this open produced
    pub surface_id: Option<String>,
}

impl OpenResult {
    fn opened(surface_id: String) -> Self {
        Self {
            success: true,
            error: None,
            surface_id: Some(surface_id),
        }
    }

    fn failed(error: SurfaceError) -> Self {
        Self {
            success: false,
            error: Some(error.to_string()),
            surface_id: None,
        }
    }
}

/// Receiver for download requests intercepted inside the page
pub trait DownloadSink: Send + Sync {
    /// Must not block; the surface keeps running while the download proceeds
    fn submit(&self, request: DownloadRequest);
}

impl DownloadSink for DownloadEngine {
    fn submit(&self, request: DownloadRequest) {
        let engine = self.clone();
        tokio::spawn(async move {
            let url = request.url.clone();
            let response = engine
                .download_file(request, DownloadOptions::default(), None)
                .await;
            if let Some(error) = response.error {
                tracing::debug!(url = %url, error = %error, "Page download ended without a file");
            }
        });
    }
}

/// What the controller last opened
#[derive(Debug, Default)]
struct Current {
    app_id: Option<String>,
    url: Option<String>,
    surface_id: Option<String>,
    state: SurfaceState,
    /// Bumped on every open and close; pipelines from older opens stop
    generation: u64,
}

impl Current {
    fn transition(&mut self, target: SurfaceState) {
        if self.state.can_transition_to(target) {
            if self.state != target {
                tracing::debug!(from = %self.state, to = %target, "Surface state transition");
            }
            self.state = target;
        } else {
            let error = SurfaceError::InvalidTransition {
                from: self.state.to_string(),
                to: target.to_string(),
            };
            tracing::warn!(error = %error, "Resetting surface state");
            self.state = SurfaceState::Idle;
        }
    }

    fn clear(&mut self) {
        self.app_id = None;
        self.url = None;
        self.surface_id = None;
    }
}

pub struct SurfaceController {
    surface: Arc<dyn Surface>,
    catalog: Arc<InjectionCatalog>,
    downloads: Option<Arc<dyn DownloadSink>>,
    current: Arc<RwLock<Current>>,
    /// Also serializes open and close
    listeners: Arc<Mutex<ListenerSet>>,
}

impl SurfaceController {
    pub fn new(surface: Arc<dyn Surface>, catalog: InjectionCatalog) -> Self {
        Self {
            surface,
            catalog: Arc::new(catalog),
            downloads: None,
            current: Arc::new(RwLock::new(Current::default())),
            listeners: Arc::new(Mutex::new(ListenerSet::new())),
        }
    }

    pub fn with_download_sink(mut self, sink: Arc<dyn DownloadSink>) -> Self {
        self.downloads = Some(sink);
        self
    }

    pub fn catalog(&self) -> &InjectionCatalog {
        &self.catalog
    }

    /// Open `url` in the surface, replacing whatever it showed.
    ///
    /// Injection for `app_id` is resolved now and runs after every page load.
    /// Returns once the native open call has returned, not after page load.
    pub async fn open_url(
        &self,
        url: &str,
        app_id: Option<&str>,
        options: Option<&ChromeOptions>,
    ) -> OpenResult {
        let url = url.trim();
        if url.is_empty() {
            return OpenResult::failed(SurfaceError::InvalidUrl("URL cannot be empty".to_string()));
        }

        let mut listeners = self.listeners.lock().await;
        listeners.detach_all(self.surface.as_ref()).await;
        if let Err(e) = self.release_surface().await {
            tracing::warn!(error = %e, "Failed to close previous surface, reopening anyway");
        }

        let plan = Arc::new(self.catalog.plan_for(app_id));
        let surface_id = Uuid::new_v4().to_string();
        let generation = {
            let mut current = self.current.write();
            current.generation += 1;
            current.app_id = app_id.map(str::to_string);
            current.url = Some(url.to_string());
            current.surface_id = Some(surface_id.clone());
            current.transition(SurfaceState::Opening);
            current.generation
        };

        let opened = match self.register_listeners(&mut listeners, plan, generation).await {
            Ok(()) => match options {
                Some(options) => self.surface.open_managed(url, options).await,
                None => self.surface.open(url).await,
            },
            Err(e) => Err(e),
        };

        if let Err(e) = opened {
            tracing::warn!(url = %url, error = %e, "Failed to open surface");
            listeners.detach_all(self.surface.as_ref()).await;
            let mut current = self.current.write();
            current.generation += 1;
            current.clear();
            current.transition(SurfaceState::Idle);
            return OpenResult::failed(e);
        }

        tracing::info!(
            url = %url,
            app_id = app_id.unwrap_or("-"),
            surface_id = %surface_id,
            "Opened surface"
        );

        OpenResult::opened(surface_id)
    }

    /// Release the surface and every listener. Safe to call repeatedly.
    pub async fn close(&self) -> ApiResponse<()> {
        let mut listeners = self.listeners.lock().await;
        listeners.detach_all(self.surface.as_ref()).await;

        match self.release_surface().await {
            Ok(()) => ApiResponse::ok(()),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to close surface");
                ApiResponse::err(e.to_string())
            }
        }
    }

    /// Send a payload to the page through the bridge
    pub async fn post_message(&self, payload: serde_json::Value) -> ApiResponse<()> {
        if !self.current.read().state.holds_surface() {
            return ApiResponse::err("No surface is open");
        }
        match self.surface.post_message(payload).await {
            Ok(()) => ApiResponse::ok(()),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to post message to page");
                ApiResponse::err(e.to_string())
            }
        }
    }

    pub fn current_app_id(&self) -> Option<String> {
        self.current.read().app_id.clone()
    }

    pub fn current_url(&self) -> Option<String> {
        self.current.read().url.clone()
    }

    /// True while an app id is recorded; says nothing about visibility
    pub fn is_active(&self) -> bool {
        self.current.read().app_id.is_some()
    }

    pub fn state(&self) -> SurfaceState {
        self.current.read().state
    }

    pub fn surface_id(&self) -> Option<String> {
        self.current.read().surface_id.clone()
    }

    /// Close the native surface if one is held. Caller holds the listener lock.
    async fn release_surface(&self) -> Result<()> {
        let holds_surface = {
            let mut current = self.current.write();
            current.generation += 1;
            if current.state.holds_surface() {
                current.transition(SurfaceState::Closing);
                true
            } else {
                current.clear();
                false
            }
        };
        if !holds_surface {
            return Ok(());
        }

        let result = self.surface.close().await;

        let mut current = self.current.write();
        current.clear();
        current.transition(SurfaceState::Idle);
        if result.is_ok() {
            tracing::debug!("Surface released");
        }
        result
    }

    async fn register_listeners(
        &self,
        listeners: &mut ListenerSet,
        plan: Arc<InjectionPlan>,
        generation: u64,
    ) -> Result<()> {
        let pipeline = Pipeline {
            surface: Arc::clone(&self.surface),
            current: Arc::clone(&self.current),
            plan,
            generation,
        };
        let on_load: Listener = Arc::new(move |event: SurfaceEvent| {
            let pipeline = pipeline.clone();
            let handled = async move {
                if let SurfaceEvent::PageLoaded { url } = event {
                    pipeline.run(url).await;
                }
            };
            handled.boxed()
        });
        let id = self
            .surface
            .add_listener(SurfaceEventKind::PageLoaded, on_load)
            .await?;
        listeners.track(id);

        if let Some(sink) = &self.downloads {
            let sink = Arc::clone(sink);
            let on_message: Listener = Arc::new(move |event: SurfaceEvent| {
                let sink = Arc::clone(&sink);
                let handled = async move {
                    if let SurfaceEvent::MessageFromPage(payload) = event {
                        forward_message(sink.as_ref(), payload);
                    }
                };
                handled.boxed()
            });
            let id = self
                .surface
                .add_listener(SurfaceEventKind::MessageFromPage, on_message)
                .await?;
            listeners.track(id);
        }

        Ok(())
    }
}

impl Clone for SurfaceController {
    fn clone(&self) -> Self {
        Self {
            surface: Arc::clone(&self.surface),
            catalog: Arc::clone(&self.catalog),
            downloads: self.downloads.clone(),
            current: Arc::clone(&self.current),
            listeners: Arc::clone(&self.listeners),
        }
    }
}

/// Injection sequence bound to one open
#[derive(Clone)]
struct Pipeline {
    surface: Arc<dyn Surface>,
    current: Arc<RwLock<Current>>,
    plan: Arc<InjectionPlan>,
    generation: u64,
}

impl Pipeline {
    fn is_current(&self) -> bool {
        self.current.read().generation == self.generation
    }

    /// Transition only if this pipeline still belongs to the open surface
    fn advance(&self, target: SurfaceState) -> bool {
        let mut current = self.current.write();
        if current.generation != self.generation {
            return false;
        }
        current.transition(target);
        true
    }

    async fn run(&self, url: Option<String>) {
        if !self.advance(SurfaceState::Injecting) {
            tracing::debug!("Ignoring page load from a previous surface");
            return;
        }

        let steps = self.plan.steps();
        tracing::debug!(url = ?url, steps = steps.len(), "Running injection sequence");

        for step in steps {
            if !self.is_current() {
                tracing::debug!("Injection sequence superseded");
                return;
            }
            match step {
                InjectionStep::Wait(delay) => tokio::time::sleep(delay).await,
                InjectionStep::Script { label, source } => {
                    match self.surface.execute_script(&source).await {
                        Ok(()) => tracing::debug!(step = %label, "Injected"),
                        Err(e) => tracing::warn!(step = %label, error = %e, "Injection step failed"),
                    }
                }
            }
        }

        self.advance(SurfaceState::Rendered);
    }
}

fn forward_message(sink: &dyn DownloadSink, payload: serde_json::Value) {
    match PageMessage::parse(payload) {
        Ok(PageMessage::Download(request)) => {
            tracing::info!(url = %request.url, method = request.method.as_str(), "Forwarding page download");
            sink.submit(request);
        }
        Ok(PageMessage::Other(kind)) => {
            tracing::debug!(kind = %kind, "Ignoring page message");
        }
        Err(e) => {
            tracing::warn!(error = %e, "Dropping page message");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::HeadlessSurface;
    use dock_inject::InjectionBundle;
    use serde_json::json;
    use std::time::Duration;

    #[derive(Default)]
    struct RecordingSink {
        requests: parking_lot::Mutex<Vec<DownloadRequest>>,
    }

    impl DownloadSink for RecordingSink {
        fn submit(&self, request: DownloadRequest) {
            self.requests.lock().push(request);
        }
    }

    fn catalog(global_delay_ms: u64) -> InjectionCatalog {
        let mut catalog = InjectionCatalog::new(
            InjectionBundle::new("viewport")
                .with_css("body { margin: 0; }")
                .with_js("window.__dockGlobal = true;")
                .with_delay_ms(global_delay_ms),
        );
        catalog
            .insert_app(
                "moodle",
                InjectionBundle::new("moodle")
                    .with_css(".navbar { display: none; }")
                    .with_js("window.__dockMoodle = true;"),
            )
            .unwrap();
        catalog
    }

    fn expected_scripts(catalog: &InjectionCatalog, app_id: Option<&str>) -> Vec<String> {
        catalog
            .plan_for(app_id)
            .steps()
            .into_iter()
            .filter_map(|step| match step {
                InjectionStep::Script { source, .. } => Some(source),
                InjectionStep::Wait(_) => None,
            })
            .collect()
    }

    fn setup() -> (Arc<HeadlessSurface>, SurfaceController, Arc<RecordingSink>) {
        let surface = Arc::new(HeadlessSurface::new());
        let sink = Arc::new(RecordingSink::default());
        let controller =
            SurfaceController::new(surface.clone(), catalog(0)).with_download_sink(sink.clone());
        (surface, controller, sink)
    }

    fn page_loaded() -> SurfaceEvent {
        SurfaceEvent::PageLoaded { url: None }
    }

    #[tokio::test]
    async fn test_page_load_runs_injection_in_order() {
        let (surface, controller, _) = setup();

        let result = controller.open_url("https://lms.test", Some("moodle"), None).await;
        assert!(result.success);
        assert_eq!(controller.state(), SurfaceState::Opening);

        surface.emit(page_loaded()).await;

        let expected = expected_scripts(controller.catalog(), Some("moodle"));
        assert_eq!(expected.len(), 5);
        assert_eq!(surface.scripts(), expected);
        assert_eq!(controller.state(), SurfaceState::Rendered);
    }

    #[tokio::test]
    async fn test_unknown_app_gets_global_bundle_only() {
        let (surface, controller, _) = setup();

        controller.open_url("https://mail.test", Some("mail"), None).await;
        surface.emit(page_loaded()).await;

        assert_eq!(surface.scripts(), expected_scripts(controller.catalog(), None));
    }

    #[tokio::test]
    async fn test_reopening_does_not_duplicate_listeners() {
        let (surface, controller, _) = setup();

        controller.open_url("https://lms.test", Some("moodle"), None).await;
        controller.open_url("https://lms.test", Some("moodle"), None).await;

        assert_eq!(surface.listener_count(SurfaceEventKind::PageLoaded), 1);
        assert_eq!(surface.listener_count(SurfaceEventKind::MessageFromPage), 1);
        assert_eq!(surface.close_count(), 1);

        surface.emit(page_loaded()).await;
        assert_eq!(
            surface.scripts(),
            expected_scripts(controller.catalog(), Some("moodle"))
        );
    }

    #[tokio::test]
    async fn test_in_surface_navigation_reinjects() {
        let (surface, controller, _) = setup();

        controller.open_url("https://lms.test", Some("moodle"), None).await;
        surface.emit(page_loaded()).await;
        surface.clear_scripts();
        surface
            .emit(SurfaceEvent::PageLoaded {
                url: Some("https://lms.test/course".to_string()),
            })
            .await;

        assert_eq!(surface.scripts().len(), 5);
        assert_eq!(controller.state(), SurfaceState::Rendered);
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let (surface, controller, _) = setup();
        controller.open_url("https://lms.test", Some("moodle"), None).await;

        assert!(controller.close().await.success);
        assert!(controller.close().await.success);

        assert_eq!(surface.close_count(), 1);
        assert_eq!(surface.listener_count(SurfaceEventKind::PageLoaded), 0);
        assert_eq!(surface.listener_count(SurfaceEventKind::MessageFromPage), 0);
        assert!(!controller.is_active());
        assert_eq!(controller.current_url(), None);
        assert_eq!(controller.state(), SurfaceState::Idle);
    }

    #[tokio::test]
    async fn test_close_without_open_succeeds() {
        let (surface, controller, _) = setup();

        assert!(controller.close().await.success);
        assert_eq!(surface.close_count(), 0);
    }

    #[tokio::test]
    async fn test_failed_step_does_not_abort_sequence() {
        let (surface, controller, _) = setup();
        surface.fail_scripts_containing("__dockGlobal");

        controller.open_url("https://lms.test", Some("moodle"), None).await;
        surface.emit(page_loaded()).await;

        let scripts = surface.scripts();
        assert_eq!(scripts.len(), 4);
        assert!(scripts.iter().any(|s| s.contains("__dockDownloadInterceptor")));
        assert!(scripts.iter().any(|s| s.contains("__dockMoodle")));
        assert_eq!(controller.state(), SurfaceState::Rendered);
    }

    #[tokio::test]
    async fn test_download_messages_are_forwarded() {
        let (surface, controller, sink) = setup();
        controller.open_url("https://lms.test", Some("moodle"), None).await;

        surface
            .emit(SurfaceEvent::MessageFromPage(json!({
                "type": "download",
                "url": "https://lms.test/pluginfile.php/1/notes.pdf",
                "filename": "notes.pdf"
            })))
            .await;
        surface
            .emit(SurfaceEvent::MessageFromPage(json!({"type": "resize"})))
            .await;
        surface
            .emit(SurfaceEvent::MessageFromPage(json!({"type": "download"})))
            .await;

        let requests = sink.requests.lock();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].filename.as_deref(), Some("notes.pdf"));
    }

    #[tokio::test]
    async fn test_open_failure_is_reported() {
        let (surface, controller, _) = setup();
        surface.set_fail_open(true);

        let result = controller.open_url("https://lms.test", Some("moodle"), None).await;

        assert!(!result.success);
        assert!(result.error.is_some());
        assert!(!controller.is_active());
        assert_eq!(controller.state(), SurfaceState::Idle);
        assert_eq!(surface.listener_count(SurfaceEventKind::PageLoaded), 0);
    }

    #[tokio::test]
    async fn test_empty_url_is_rejected() {
        let (surface, controller, _) = setup();

        let result = controller.open_url("  ", None, None).await;

        assert!(!result.success);
        assert!(surface.opened().is_empty());
    }

    #[tokio::test]
    async fn test_managed_open_passes_chrome_options() {
        let (surface, controller, _) = setup();
        let options = ChromeOptions::titled("Moodle", Some("#f98012".to_string()));

        let result = controller
            .open_url("https://lms.test", Some("moodle"), Some(&options))
            .await;

        assert!(result.success);
        assert_eq!(controller.surface_id(), result.surface_id);
        assert_eq!(surface.managed_options(), vec![options]);
        assert_eq!(controller.current_app_id().as_deref(), Some("moodle"));
        assert_eq!(controller.current_url().as_deref(), Some("https://lms.test"));
    }

    #[tokio::test]
    async fn test_close_stops_running_pipeline() {
        let surface = Arc::new(HeadlessSurface::new());
        let controller = SurfaceController::new(surface.clone(), catalog(100));
        controller.open_url("https://lms.test", Some("moodle"), None).await;

        let emitter = surface.clone();
        let handle = tokio::spawn(async move { emitter.emit(page_loaded()).await });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(controller.state(), SurfaceState::Injecting);

        assert!(controller.close().await.success);
        handle.await.unwrap();

        assert!(surface.scripts().is_empty());
        assert_eq!(controller.state(), SurfaceState::Idle);
    }

    #[tokio::test]
    async fn test_post_message_requires_open_surface() {
        let (surface, controller, _) = setup();

        assert!(!controller.post_message(json!({"ping": 1})).await.success);

        controller.open_url("https://lms.test", None, None).await;
        assert!(controller.post_message(json!({"ping": 1})).await.success);
        assert_eq!(surface.posted(), vec![json!({"ping": 1})]);
    }
}

//! Injection catalog and per-load injection plans

use std::collections::HashMap;
use std::time::Duration;

use crate::builtin;
use crate::bundle::InjectionBundle;
use crate::error::InjectError;
use crate::patterns::DownloadPatterns;
use crate::Result;

/// Name of the native message bridge the interceptor posts through
pub const DEFAULT_BRIDGE: &str = "DockBridge";

const INTERCEPTOR_LABEL: &str = "global js: download interceptor";

/// One step of the post-load injection sequence
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InjectionStep {
    Wait(Duration),
    Script { label: String, source: String },
}

/// Bundles resolved for one open, executed after every page-load event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InjectionPlan {
    pub global: InjectionBundle,
    /// Download interceptor, run as its own step after the global JS
    pub interceptor: Option<InjectionBundle>,
    pub app: Option<InjectionBundle>,
}

impl InjectionPlan {
    /// Global wait, global CSS, global JS, interceptor, then the app bundle
    pub fn steps(&self) -> Vec<InjectionStep> {
        let mut steps = Vec::new();
        push_bundle_steps(&mut steps, "global", &self.global);
        if let Some(source) = self.interceptor.as_ref().and_then(InjectionBundle::wrapped_js) {
            steps.push(InjectionStep::Script {
                label: INTERCEPTOR_LABEL.to_string(),
                source,
            });
        }
        if let Some(app) = &self.app {
            push_bundle_steps(&mut steps, "app", app);
        }
        steps
    }

    pub fn has_app_bundle(&self) -> bool {
        self.app.is_some()
    }
}

fn push_bundle_steps(steps: &mut Vec<InjectionStep>, scope: &str, bundle: &InjectionBundle) {
    if bundle.delay_ms > 0 {
        steps.push(InjectionStep::Wait(bundle.delay()));
    }
    if let Some(source) = bundle.wrapped_css() {
        steps.push(InjectionStep::Script {
            label: format!("{} css: {}", scope, bundle.description),
            source,
        });
    }
    if let Some(source) = bundle.wrapped_js() {
        steps.push(InjectionStep::Script {
            label: format!("{} js: {}", scope, bundle.description),
            source,
        });
    }
}

#[derive(Debug, Clone)]
pub struct InjectionCatalog {
    global: InjectionBundle,
    apps: HashMap<String, InjectionBundle>,
    patterns: DownloadPatterns,
    bridge: String,
}

impl InjectionCatalog {
    pub fn new(global: InjectionBundle) -> Self {
        Self {
            global,
            apps: HashMap::new(),
            patterns: DownloadPatterns::default(),
            bridge: DEFAULT_BRIDGE.to_string(),
        }
    }

    /// Catalog with the bundled global patch and the known per-app patches
    pub fn builtin() -> Self {
        let mut catalog = Self::new(builtin::global_bundle());
        for (app_id, bundle) in builtin::app_bundles() {
            catalog.apps.insert(app_id.to_string(), bundle);
        }
        catalog
    }

    pub fn with_patterns(mut self, patterns: DownloadPatterns) -> Self {
        self.patterns = patterns;
        self
    }

    pub fn with_bridge(mut self, bridge: impl Into<String>) -> Self {
        self.bridge = bridge.into();
        self
    }

    pub fn with_app(mut self, app_id: &str, bundle: InjectionBundle) -> Result<Self> {
        self.insert_app(app_id, bundle)?;
        Ok(self)
    }

    /// Register or replace the bundle for `app_id`
    pub fn insert_app(&mut self, app_id: &str, bundle: InjectionBundle) -> Result<()> {
        let app_id = app_id.trim();
        if app_id.is_empty() {
            return Err(InjectError::EmptyAppId);
        }
        if bundle.is_empty() {
            return Err(InjectError::EmptyBundle(app_id.to_string()));
        }

        if self.apps.insert(app_id.to_string(), bundle).is_some() {
            tracing::debug!(app_id = %app_id, "Replaced injection bundle");
        }
        Ok(())
    }

    pub fn global(&self) -> &InjectionBundle {
        &self.global
    }

    pub fn for_app(&self, app_id: &str) -> Option<&InjectionBundle> {
        self.apps.get(app_id.trim())
    }

    pub fn patterns(&self) -> &DownloadPatterns {
        &self.patterns
    }

    pub fn bridge(&self) -> &str {
        &self.bridge
    }

    pub fn app_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.apps.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    /// Resolve the bundles for an open.
    ///
    /// The interceptor is kept out of the global bundle so a throwing global
    /// patch cannot stop it from installing.
    pub fn plan_for(&self, app_id: Option<&str>) -> InjectionPlan {
        let interceptor = match self.patterns.interceptor_script(&self.bridge) {
            Ok(script) => Some(InjectionBundle::new("download interceptor").with_js(script)),
            Err(e) => {
                tracing::warn!(error = %e, "Download interceptor unavailable");
                None
            }
        };

        let app = app_id.and_then(|id| self.for_app(id)).cloned();

        InjectionPlan {
            global: self.global.clone(),
            interceptor,
            app,
        }
    }
}

impl Default for InjectionCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_catalog() -> InjectionCatalog {
        let mut catalog = InjectionCatalog::new(
            InjectionBundle::new("global")
                .with_css("body{}")
                .with_js("window.g = 1;")
                .with_delay_ms(100),
        );
        catalog
            .insert_app(
                "mail",
                InjectionBundle::new("mail fix")
                    .with_css(".banner{display:none}")
                    .with_js("window.m = 1;")
                    .with_delay_ms(250),
            )
            .unwrap();
        catalog
    }

    #[test]
    fn test_plan_step_order() {
        let plan = test_catalog().plan_for(Some("mail"));
        let steps = plan.steps();

        assert_eq!(steps.len(), 7);
        assert_eq!(steps[0], InjectionStep::Wait(Duration::from_millis(100)));
        assert!(matches!(&steps[1], InjectionStep::Script { label, .. } if label == "global css: global"));
        assert!(matches!(&steps[2], InjectionStep::Script { label, source }
            if label == "global js: global" && source.contains("window.g = 1;") && !source.contains("__dockDownloadInterceptor")));
        assert!(matches!(&steps[3], InjectionStep::Script { label, source }
            if label == "global js: download interceptor" && source.contains("__dockDownloadInterceptor")));
        assert_eq!(steps[4], InjectionStep::Wait(Duration::from_millis(250)));
        assert!(matches!(&steps[5], InjectionStep::Script { label, .. } if label == "app css: mail fix"));
        assert!(matches!(&steps[6], InjectionStep::Script { label, .. } if label == "app js: mail fix"));
    }

    #[test]
    fn test_plan_without_app_bundle() {
        let catalog = test_catalog();
        assert!(!catalog.plan_for(Some("unknown")).has_app_bundle());
        assert!(!catalog.plan_for(None).has_app_bundle());
        assert_eq!(catalog.plan_for(None).steps().len(), 4);
    }

    #[test]
    fn test_throwing_global_script_leaves_interceptor_separate() {
        let catalog = InjectionCatalog::new(
            InjectionBundle::new("global").with_js("throw new Error('compat patch broke');"),
        );

        let scripts: Vec<String> = catalog
            .plan_for(None)
            .steps()
            .into_iter()
            .filter_map(|step| match step {
                InjectionStep::Script { source, .. } => Some(source),
                InjectionStep::Wait(_) => None,
            })
            .collect();

        assert_eq!(scripts.len(), 2);
        assert!(scripts[0].contains("compat patch broke"));
        assert!(!scripts[0].contains("__dockDownloadInterceptor"));
        assert!(scripts[1].contains("__dockDownloadInterceptor"));
        assert!(!scripts[1].contains("compat patch broke"));
    }

    #[test]
    fn test_interceptor_uses_configured_bridge() {
        let catalog = test_catalog().with_bridge("ShellBridge");
        let plan = catalog.plan_for(None);
        assert!(plan.interceptor.and_then(|b| b.js).unwrap().contains(r#"const bridgeName = "ShellBridge";"#));
    }

    #[test]
    fn test_insert_app_validation() {
        let mut catalog = test_catalog();
        assert!(matches!(
            catalog.insert_app("  ", InjectionBundle::new("x").with_js("1")),
            Err(InjectError::EmptyAppId)
        ));
        assert!(matches!(
            catalog.insert_app("x", InjectionBundle::new("x")),
            Err(InjectError::EmptyBundle(_))
        ));
    }

    #[test]
    fn test_with_app_replaces_bundle() {
        let catalog = test_catalog()
            .with_app("mail", InjectionBundle::new("mail v2").with_js("window.m = 2;"))
            .unwrap();
        let bundle = catalog.for_app("mail").unwrap();
        assert_eq!(bundle.description, "mail v2");
        assert!(bundle.css.is_none());
    }

    #[test]
    fn test_builtin_catalog() {
        let catalog = InjectionCatalog::builtin();
        assert!(!catalog.global().is_empty());
        assert!(catalog.for_app("moodle").is_some());
        assert!(catalog.for_app("not-an-app").is_none());
        assert_eq!(catalog.app_ids(), vec!["moodle", "outlook", "teams"]);
    }
}

//! Injection bundle data structure

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A CSS/JS payload applied after page load.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InjectionBundle {
    #[serde(default)]
    pub css: Option<String>,
    #[serde(default)]
    pub js: Option<String>,
    /// Wait before this bundle's first step, in milliseconds
    #[serde(default)]
    pub delay_ms: u64,
    #[serde(default)]
    pub description: String,
}

impl InjectionBundle {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            ..Self::default()
        }
    }

    pub fn with_css(mut self, css: impl Into<String>) -> Self {
        self.css = Some(css.into());
        self
    }

    pub fn with_js(mut self, js: impl Into<String>) -> Self {
        self.js = Some(js.into());
        self
    }

    pub fn with_delay_ms(mut self, delay_ms: u64) -> Self {
        self.delay_ms = delay_ms;
        self
    }

    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    pub fn is_empty(&self) -> bool {
        non_blank(&self.css).is_none() && non_blank(&self.js).is_none()
    }

    /// CSS as a script statement that appends a `<style>` element.
    ///
    /// Failures are caught inside the page so later steps still run.
    pub fn wrapped_css(&self) -> Option<String> {
        let css = non_blank(&self.css)?;
        let css_json = json_string(css);
        let label_json = json_string(&self.description);

        Some(format!(
            r#"(() => {{
  try {{
    const style = document.createElement('style');
    style.setAttribute('data-dock-inject', {label_json});
    style.textContent = {css_json};
    (document.head || document.documentElement).appendChild(style);
  }} catch (e) {{
    console.error('[dock] style injection failed:', {label_json}, e);
  }}
}})();"#
        ))
    }

    /// JS wrapped in an isolated, exception-guarded closure
    pub fn wrapped_js(&self) -> Option<String> {
        let js = non_blank(&self.js)?;
        let label_json = json_string(&self.description);

        Some(format!(
            r#"(() => {{
  try {{
{js}
  }} catch (e) {{
    console.error('[dock] script injection failed:', {label_json}, e);
  }}
}})();"#
        ))
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.trim().is_empty())
}

pub(crate) fn json_string(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "\"\"".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrapped_css_escapes_content() {
        let bundle = InjectionBundle::new("quotes").with_css(r#"a::after { content: "'" }"#);
        let script = bundle.wrapped_css().unwrap();

        assert!(script.contains(r#"style.textContent = "a::after { content: \"'\" }";"#));
        assert!(script.contains("catch (e)"));
    }

    #[test]
    fn test_wrapped_js_is_guarded() {
        let bundle = InjectionBundle::new("noop").with_js("window.x = 1;");
        let script = bundle.wrapped_js().unwrap();

        assert!(script.starts_with("(() => {"));
        assert!(script.contains("window.x = 1;"));
        assert!(script.contains("script injection failed"));
    }

    #[test]
    fn test_blank_parts_are_skipped() {
        let bundle = InjectionBundle::new("blank").with_css("   ").with_js("");
        assert!(bundle.is_empty());
        assert!(bundle.wrapped_css().is_none());
        assert!(bundle.wrapped_js().is_none());
    }
}

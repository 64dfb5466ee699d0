//! File-like URL detection shared by the native side and the injected
//! interceptor script

use serde::{Deserialize, Serialize};

use crate::bundle::json_string;
use crate::Result;

const INTERCEPTOR_TEMPLATE: &str = r#"(() => {
  if (window.__dockDownloadInterceptor) return;
  window.__dockDownloadInterceptor = true;

  const patterns = __PATTERNS__;
  const bridgeName = __BRIDGE__;

  const isDownloadUrl = (raw) => {
    try {
      const u = new URL(raw, location.href);
      if (u.protocol !== 'http:' && u.protocol !== 'https:') return false;
      const segment = u.pathname.toLowerCase().split('/').pop() || '';
      const dot = segment.lastIndexOf('.');
      if (dot >= 0 && patterns.extensions.includes(segment.slice(dot + 1))) return true;
      const href = u.href.toLowerCase();
      return patterns.urlSubstrings.some((s) => href.includes(s));
    } catch (e) {
      return false;
    }
  };

  const post = (payload) => {
    const bridge = window[bridgeName];
    if (!bridge || typeof bridge.postMessage !== 'function') return false;
    bridge.postMessage(JSON.stringify(Object.assign({ type: 'download' }, payload)));
    return true;
  };

  document.addEventListener('click', (event) => {
    const target = event.target;
    const anchor = target && target.closest ? target.closest('a[href]') : null;
    if (!anchor) return;
    if (!anchor.hasAttribute('download') && !isDownloadUrl(anchor.href)) return;
    const filename = anchor.getAttribute('download') || undefined;
    if (post({ url: anchor.href, filename })) {
      event.preventDefault();
      event.stopPropagation();
    }
  }, true);

  document.addEventListener('submit', (event) => {
    const form = event.target;
    if (!form || !form.action || !isDownloadUrl(form.action)) return;
    const formData = {};
    new FormData(form).forEach((value, key) => {
      if (typeof value === 'string') formData[key] = value;
    });
    const method = (form.method || 'GET').toUpperCase();
    if (post({ url: form.action, method, formData })) {
      event.preventDefault();
    }
  }, true);

  const originalFetch = window.fetch;
  if (typeof originalFetch === 'function') {
    window.fetch = function (input, init) {
      const raw = typeof input === 'string' ? input : (input && input.url);
      if (raw && isDownloadUrl(raw)) {
        const method = ((init && init.method) || 'GET').toUpperCase();
        if (post({ url: new URL(raw, location.href).href, method })) {
          return Promise.resolve(new Response(null, { status: 204 }));
        }
      }
      return originalFetch.apply(this, arguments);
    };
  }

  const originalOpen = XMLHttpRequest.prototype.open;
  const originalSend = XMLHttpRequest.prototype.send;
  XMLHttpRequest.prototype.open = function (method, url) {
    this.__dockRequest = { method: String(method || 'GET').toUpperCase(), url: String(url) };
    return originalOpen.apply(this, arguments);
  };
  XMLHttpRequest.prototype.send = function () {
    const req = this.__dockRequest;
    if (req && isDownloadUrl(req.url)) {
      if (post({ url: new URL(req.url, location.href).href, method: req.method })) return;
    }
    return originalSend.apply(this, arguments);
  };
})();"#;

/// Extensions and URL fragments that mark a navigation as a file download.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadPatterns {
    pub extensions: Vec<String>,
    pub url_substrings: Vec<String>,
}

impl Default for DownloadPatterns {
    fn default() -> Self {
        Self::new(
            [
                "pdf", "doc", "docx", "xls", "xlsx", "ppt", "pptx", "odt", "ods", "odp", "rtf",
                "csv", "zip", "rar", "7z", "tar", "gz", "apk", "mp3", "mp4",
            ],
            [
                "/download",
                "download=",
                "attachment",
                "forcedownload=1",
                "pluginfile.php",
                "export=",
            ],
        )
    }
}

impl DownloadPatterns {
    /// Builds a pattern set, normalizing extensions to lowercase without dots
    pub fn new<E, S>(extensions: E, url_substrings: S) -> Self
    where
        E: IntoIterator,
        E::Item: AsRef<str>,
        S: IntoIterator,
        S::Item: AsRef<str>,
    {
        let extensions = extensions
            .into_iter()
            .map(|e| e.as_ref().trim().trim_start_matches('.').to_lowercase())
            .filter(|e| !e.is_empty())
            .collect();
        let url_substrings = url_substrings
            .into_iter()
            .map(|s| s.as_ref().trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .collect();

        Self {
            extensions,
            url_substrings,
        }
    }

    /// Same decision the injected script makes for `raw`
    pub fn matches(&self, raw: &str) -> bool {
        let Ok(parsed) = url::Url::parse(raw) else {
            return false;
        };
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return false;
        }

        let segment = parsed
            .path_segments()
            .and_then(|mut s| s.next_back())
            .unwrap_or("")
            .to_lowercase();
        if let Some((_, ext)) = segment.rsplit_once('.') {
            if self.extensions.iter().any(|e| e == ext) {
                return true;
            }
        }

        let href = parsed.as_str().to_lowercase();
        self.url_substrings.iter().any(|s| href.contains(s.as_str()))
    }

    /// Interceptor that forwards file-like navigations through `bridge`
    pub fn interceptor_script(&self, bridge: &str) -> Result<String> {
        let patterns_json = serde_json::to_string(self)?;

        Ok(INTERCEPTOR_TEMPLATE
            .replace("__PATTERNS__", &patterns_json)
            .replace("__BRIDGE__", &json_string(bridge)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matches_extension() {
        let patterns = DownloadPatterns::default();
        assert!(patterns.matches("https://lms.test/files/Report.PDF"));
        assert!(patterns.matches("https://lms.test/a/b.xlsx?version=2"));
        assert!(!patterns.matches("https://lms.test/course/view.php?id=4"));
    }

    #[test]
    fn test_matches_substring() {
        let patterns = DownloadPatterns::default();
        assert!(patterns.matches("https://lms.test/pluginfile.php/12/mod_resource/content"));
        assert!(patterns.matches("https://drive.test/file?export=download"));
        assert!(!patterns.matches("https://lms.test/my/"));
    }

    #[test]
    fn test_non_http_is_ignored() {
        let patterns = DownloadPatterns::default();
        assert!(!patterns.matches("blob:https://lms.test/abc.pdf"));
        assert!(!patterns.matches("not a url.pdf"));
    }

    #[test]
    fn test_custom_patterns_normalized() {
        let patterns = DownloadPatterns::new([".EPUB", " "], ["/Get/"]);
        assert_eq!(patterns.extensions, vec!["epub"]);
        assert!(patterns.matches("https://books.test/x/book.epub"));
        assert!(patterns.matches("https://books.test/get/123"));
        assert!(!patterns.matches("https://books.test/book.pdf"));
    }

    #[test]
    fn test_interceptor_embeds_patterns() {
        let patterns = DownloadPatterns::new(["epub"], ["/get/"]);
        let script = patterns.interceptor_script("DockBridge").unwrap();

        assert!(script.contains(r#"const patterns = {"extensions":["epub"],"urlSubstrings":["/get/"]};"#));
        assert!(script.contains(r#"const bridgeName = "DockBridge";"#));
        assert!(!script.contains("__PATTERNS__"));
    }
}

//! Checks that stop a login or error page from being saved as the requested
//! file

/// Path fragments of pages a download must never end on
pub const DEFAULT_INVALID_REDIRECT_PATTERNS: &[&str] = &[
    "/login", "/signin", "/auth", "/error", "/401", "/403", "/404", "denied",
];

/// Below this size an HTML response is treated as an error page
pub const DEFAULT_HTML_ERROR_PAGE_MAX_BYTES: usize = 10 * 1024;

/// Whether the final (post-redirect) URL points at a sign-in or error page.
/// Only the path and query are inspected, never the host.
pub fn is_invalid_redirect(final_url: &url::Url, patterns: &[String]) -> bool {
    let mut target = final_url.path().to_lowercase();
    if let Some(query) = final_url.query() {
        target.push('?');
        target.push_str(&query.to_lowercase());
    }

    patterns
        .iter()
        .map(|p| p.trim().to_lowercase())
        .filter(|p| !p.is_empty())
        .any(|p| target.contains(&p))
}

/// An HTML body too small to be a real download, unless HTML was asked for
pub fn looks_like_html_error(
    content_type: Option<&str>,
    size: usize,
    file_name: &str,
    max_bytes: usize,
) -> bool {
    let is_html = content_type
        .map(|ct| ct.to_ascii_lowercase().contains("text/html"))
        .unwrap_or(false);
    if !is_html {
        return false;
    }

    let lower = file_name.to_ascii_lowercase();
    if lower.ends_with(".html") || lower.ends_with(".htm") {
        return false;
    }

    size < max_bytes
}

pub fn default_invalid_redirect_patterns() -> Vec<String> {
    DEFAULT_INVALID_REDIRECT_PATTERNS
        .iter()
        .map(|p| p.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> url::Url {
        url::Url::parse(s).unwrap()
    }

    #[test]
    fn test_login_redirect_detected() {
        let patterns = default_invalid_redirect_patterns();
        assert!(is_invalid_redirect(&url("https://lms.test/login?next=/file"), &patterns));
        assert!(is_invalid_redirect(&url("https://lms.test/SignIn"), &patterns));
        assert!(is_invalid_redirect(&url("https://lms.test/x?reason=access_denied"), &patterns));
        assert!(is_invalid_redirect(&url("https://lms.test/errors/403"), &patterns));
    }

    #[test]
    fn test_regular_file_url_allowed() {
        let patterns = default_invalid_redirect_patterns();
        assert!(!is_invalid_redirect(&url("https://cdn.test/files/report.pdf"), &patterns));
        // host names are not inspected
        assert!(!is_invalid_redirect(&url("https://login.cdn.test/report.pdf"), &patterns));
    }

    #[test]
    fn test_html_error_page() {
        let max = DEFAULT_HTML_ERROR_PAGE_MAX_BYTES;
        assert!(looks_like_html_error(Some("text/html; charset=utf-8"), 512, "report.pdf", max));
        assert!(!looks_like_html_error(Some("text/html"), max + 1, "report.pdf", max));
        assert!(!looks_like_html_error(Some("application/pdf"), 512, "report.pdf", max));
        assert!(!looks_like_html_error(Some("text/html"), 512, "page.html", max));
        assert!(!looks_like_html_error(None, 512, "report.pdf", max));
    }
}

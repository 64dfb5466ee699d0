//! Filename resolution
//!
//! Precedence: Content-Disposition, then an explicit request name, then the
//! last segment of the (final) URL path, then a timestamped placeholder.

use chrono::Utc;
use sha2::{Digest, Sha256};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameSource {
    Explicit,
    UrlPath,
    Placeholder,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedName {
    pub name: String,
    pub source: NameSource,
}

/// Name known before any network traffic
pub fn initial_filename(requested: Option<&str>, url: &str) -> ResolvedName {
    if let Some(name) = requested.map(last_component).filter(|n| !n.is_empty()) {
        return ResolvedName {
            name,
            source: NameSource::Explicit,
        };
    }

    if let Some(name) = url::Url::parse(url).ok().and_then(|u| from_url(&u)) {
        return ResolvedName {
            name,
            source: NameSource::UrlPath,
        };
    }

    ResolvedName {
        name: placeholder(),
        source: NameSource::Placeholder,
    }
}

/// Name to persist under once the response is in hand
pub fn final_filename(
    initial: &ResolvedName,
    content_disposition: Option<&str>,
    final_url: &url::Url,
) -> String {
    if let Some(name) = content_disposition.and_then(from_content_disposition) {
        return sanitize(&name);
    }

    let stale = initial.source != NameSource::Explicit || looks_like_page(&initial.name);
    if stale {
        if let Some(name) = from_url(final_url).filter(|n| !looks_like_page(n)) {
            return sanitize(&name);
        }
    }

    if looks_like_page(&initial.name) {
        return placeholder();
    }

    sanitize(&initial.name)
}

/// Filename advertised by a Content-Disposition header; `filename*` wins
pub fn from_content_disposition(header: &str) -> Option<String> {
    let mut plain = None;
    let mut extended = None;

    for part in header.split(';').map(str::trim) {
        let Some((key, value)) = part.split_once('=') else {
            continue;
        };
        let value = value.trim();

        match key.trim().to_ascii_lowercase().as_str() {
            "filename*" => extended = decode_extended(value),
            "filename" => {
                let unquoted = value.trim_matches('"').trim();
                if !unquoted.is_empty() {
                    plain = Some(unquoted.to_string());
                }
            }
            _ => {}
        }
    }

    extended
        .or(plain)
        .map(|n| last_component(&n))
        .filter(|n| !n.is_empty())
}

// RFC 5987: charset'lang'percent-encoded
fn decode_extended(value: &str) -> Option<String> {
    let value = value.trim_matches('"');
    let encoded = match value.split_once('\'') {
        Some((_charset, rest)) => rest.split_once('\'').map(|(_, v)| v).unwrap_or(rest),
        None => value,
    };

    urlencoding::decode(encoded)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Percent-decoded last path segment
pub fn from_url(url: &url::Url) -> Option<String> {
    let segment = url.path_segments().and_then(|mut s| s.next_back())?;
    let decoded = urlencoding::decode(segment)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| segment.to_string());
    let name = last_component(&decoded);

    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}

/// Server-side page names that are not a real filename
pub fn looks_like_page(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    let stem = lower.split('?').next().unwrap_or_default();

    lower.contains('?')
        || [".php", ".asp", ".aspx", ".jsp", ".cgi"]
            .iter()
            .any(|ext| stem.ends_with(ext))
}

/// Single path component safe for every target filesystem
pub fn sanitize(name: &str) -> String {
    let cleaned: String = last_component(name)
        .chars()
        .map(|c| match c {
            '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let cleaned = cleaned.trim().trim_matches('.').to_string();

    if cleaned.is_empty() {
        placeholder()
    } else {
        cleaned
    }
}

pub fn placeholder() -> String {
    format!("download_{}", Utc::now().format("%Y%m%d_%H%M%S_%3f"))
}

/// Stable notification id so progress updates replace each other
pub fn notification_id(file_name: &str) -> i32 {
    let digest = Sha256::digest(file_name.as_bytes());
    let raw = u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]);
    (raw & 0x7fff_ffff) as i32
}

fn last_component(name: &str) -> String {
    let name = name.trim();
    let name = name.rsplit(['/', '\\']).next().unwrap_or(name);
    Path::new(name)
        .file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.trim().to_string())
        .unwrap_or_default()
}

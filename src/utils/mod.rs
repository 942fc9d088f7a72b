//! Utility functions and helpers.

pub mod http;

use url::Url;

/// Normalize a channel URL for deduplication.
///
/// Strips the query string (session tokens vary per source for the same
/// stream) and at most one trailing slash.
pub fn normalize_url(url: &str) -> String {
    let base = url.split(['?', '#']).next().unwrap_or(url);
    let base = base.strip_suffix('/').unwrap_or(base);
    base.to_string()
}

/// Resolve a potentially relative URL against a base URL.
pub fn resolve_url(base: &Url, href: &str) -> String {
    base.join(href)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| href.to_string())
}

/// Extract the host from a URL string, used as a fallback source name.
pub fn get_host(url_str: &str) -> Option<String> {
    Url::parse(url_str)
        .ok()
        .and_then(|u| u.host_str().map(|s| s.to_string()))
}

//! Playlist source registry.

use serde::{Deserialize, Serialize};

use crate::utils::get_host;

/// A configured playlist source.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Source {
    /// Position in the source list, used for deterministic merge order
    pub id: usize,

    /// Playlist URL
    pub url: String,

    /// Display name (URL host unless the list provides better)
    pub name: String,

    /// Whether the region keyword filter applies to entries from this source
    pub apply_region_filter: bool,
}

impl Source {
    /// Parse a line-oriented source list.
    ///
    /// One URL per line. Blank lines and `#` comments are skipped. A leading
    /// `!` disables the region filter for that source. An empty or missing
    /// list yields an empty registry, not an error.
    pub fn parse_list(text: &str) -> Vec<Source> {
        let mut sources = Vec::new();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let (url, apply_region_filter) = match line.strip_prefix('!') {
                Some(rest) => (rest.trim(), false),
                None => (line, true),
            };
            if url.is_empty() {
                continue;
            }

            let name = get_host(url).unwrap_or_else(|| url.to_string());
            sources.push(Source {
                id: sources.len(),
                url: url.to_string(),
                name,
                apply_region_filter,
            });
        }
        sources
    }
}

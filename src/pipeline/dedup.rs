// src/pipeline/dedup.rs

//! Cross-source deduplication by normalized URL.

use std::collections::HashSet;

use crate::models::Channel;
use crate::utils::normalize_url;

/// Collapse entries to one per normalized URL, first seen wins.
///
/// Which source's metadata owns a duplicate key depends on the order the
/// entries arrive in; callers that need deterministic attribution must merge
/// parsed buffers in a fixed source order before calling this.
pub fn dedupe(channels: Vec<Channel>) -> Vec<Channel> {
    let mut seen = HashSet::new();
    let mut unique = Vec::new();
    for channel in channels {
        let key = normalize_url(&channel.url);
        if seen.insert(key) {
            unique.push(channel);
        }
    }
    unique
}

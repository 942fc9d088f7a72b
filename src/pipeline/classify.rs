// src/pipeline/classify.rs

//! Category and resolution enrichment.
//!
//! Pure, no I/O. Every entry receives exactly one category and one
//! resolution; keyword tables come from configuration so the classifier can
//! be tested against fixed tables.

use crate::models::{Channel, ClassifyConfig};

/// Category assigned when no keyword group matches.
pub const CATEGORY_OTHER: &str = "other";

/// Resolution assigned when the name carries no quality token.
pub const RESOLUTION_UNKNOWN: &str = "unknown";

/// Enrich an entry in place with category and resolution.
pub fn classify(channel: &mut Channel, config: &ClassifyConfig) {
    channel.category = categorize(&channel.name, &channel.group, config);
    channel.resolution = detect_resolution(&channel.name);
}

/// Enrich a whole batch.
pub fn classify_all(channels: &mut [Channel], config: &ClassifyConfig) {
    for channel in channels {
        classify(channel, config);
    }
}

/// Test name+group against the ordered keyword groups; first match wins.
fn categorize(name: &str, group: &str, config: &ClassifyConfig) -> String {
    let haystack = format!("{} {}", name, group).to_lowercase();
    for rule in &config.categories {
        if rule
            .keywords
            .iter()
            .any(|keyword| haystack.contains(&keyword.to_lowercase()))
        {
            return rule.name.clone();
        }
    }
    CATEGORY_OTHER.to_string()
}

/// Map quality tokens in the name to a resolution label.
fn detect_resolution(name: &str) -> String {
    let name = name.to_lowercase();
    let token = if ["4k", "uhd", "2160"].iter().any(|t| name.contains(t)) {
        "4K"
    } else if ["1080", "fhd"].iter().any(|t| name.contains(t)) {
        "1080p"
    } else if ["720", "hd"].iter().any(|t| name.contains(t)) {
        "720p"
    } else if ["480", "sd"].iter().any(|t| name.contains(t)) {
        "480p"
    } else {
        RESOLUTION_UNKNOWN
    };
    token.to_string()
}

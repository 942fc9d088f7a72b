//! Channel entry data structure.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A candidate channel parsed from one directive + URL line pair.
///
/// Created by the parser, then enriched in place: the classifier fills
/// `category` and `resolution`, the probe fills `latency_ms`,
/// `throughput_kbps` and `valid`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Channel {
    /// Display name from the directive line
    pub name: String,

    /// Stream URL
    pub url: String,

    /// `group-title` attribute value, empty if absent
    pub group: String,

    /// Name of the source that contributed this entry
    pub source: String,

    /// Remaining directive attributes (tvg-id, tvg-logo, ...)
    pub attributes: BTreeMap<String, String>,

    /// Assigned category; `"other"` when no keyword group matches
    #[serde(default)]
    pub category: String,

    /// Detected resolution token; `"unknown"` when absent from the name
    #[serde(default)]
    pub resolution: String,

    /// First-stage probe latency
    #[serde(default)]
    pub latency_ms: Option<u64>,

    /// Measured download rate in KB/s
    #[serde(default)]
    pub throughput_kbps: Option<f64>,

    /// Whether the probe accepted this entry
    #[serde(default)]
    pub valid: bool,
}

impl Channel {
    /// Create an unenriched channel entry.
    pub fn new(name: impl Into<String>, url: impl Into<String>, group: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            group: group.into(),
            source: String::new(),
            attributes: BTreeMap::new(),
            category: String::new(),
            resolution: String::new(),
            latency_ms: None,
            throughput_kbps: None,
            valid: false,
        }
    }

    /// Whether the detected resolution is HD or better.
    pub fn is_hd(&self) -> bool {
        matches!(self.resolution.as_str(), "720p" | "1080p" | "4K")
    }
}

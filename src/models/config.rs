//! Application configuration structures.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Source fetching behavior
    #[serde(default)]
    pub fetcher: FetcherConfig,

    /// Stream probing behavior
    #[serde(default)]
    pub probe: ProbeConfig,

    /// Region filter keyword table
    #[serde(default)]
    pub filter: FilterConfig,

    /// Category/resolution classification tables
    #[serde(default)]
    pub classify: ClassifyConfig,

    /// Output artifact locations
    #[serde(default)]
    pub output: OutputConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.fetcher.user_agent.trim().is_empty() {
            return Err(AppError::config("fetcher.user_agent is empty"));
        }
        if self.fetcher.timeout_secs == 0 {
            return Err(AppError::config("fetcher.timeout_secs must be > 0"));
        }
        if self.fetcher.max_concurrent == 0 {
            return Err(AppError::config("fetcher.max_concurrent must be > 0"));
        }
        if self.probe.hard_timeout_secs <= self.probe.request_timeout_secs {
            return Err(AppError::config(
                "probe.hard_timeout_secs must exceed probe.request_timeout_secs",
            ));
        }
        if self.probe.max_concurrent == 0 {
            return Err(AppError::config("probe.max_concurrent must be > 0"));
        }
        if self.probe.byte_quota == 0 {
            return Err(AppError::config("probe.byte_quota must be > 0"));
        }
        if self.classify.categories.is_empty() {
            return Err(AppError::config("No categories defined"));
        }
        Ok(())
    }
}

/// HTTP fetching and response cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetcherConfig {
    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::fetch_timeout")]
    pub timeout_secs: u64,

    /// Maximum concurrent source fetches
    #[serde(default = "defaults::fetch_concurrent")]
    pub max_concurrent: usize,

    /// Response cache directory
    #[serde(default = "defaults::cache_dir")]
    pub cache_dir: PathBuf,

    /// Cache entry lifetime in seconds
    #[serde(default = "defaults::cache_ttl")]
    pub cache_ttl_secs: u64,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::fetch_timeout(),
            max_concurrent: defaults::fetch_concurrent(),
            cache_dir: defaults::cache_dir(),
            cache_ttl_secs: defaults::cache_ttl(),
        }
    }
}

/// Stream probe settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeConfig {
    /// Connect/read timeout for individual probe requests, in seconds
    #[serde(default = "defaults::probe_request_timeout")]
    pub request_timeout_secs: u64,

    /// Hard wall-clock bound per probe, in seconds; tasks exceeding it are
    /// aborted and counted as timeout-invalid
    #[serde(default = "defaults::probe_hard_timeout")]
    pub hard_timeout_secs: u64,

    /// Maximum concurrent probes
    #[serde(default = "defaults::probe_concurrent")]
    pub max_concurrent: usize,

    /// Bytes to read from the media sub-resource when measuring throughput
    #[serde(default = "defaults::byte_quota")]
    pub byte_quota: u64,

    /// Minimum acceptable download rate in KB/s
    #[serde(default = "defaults::throughput_floor")]
    pub throughput_floor_kbps: f64,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: defaults::probe_request_timeout(),
            hard_timeout_secs: defaults::probe_hard_timeout(),
            max_concurrent: defaults::probe_concurrent(),
            byte_quota: defaults::byte_quota(),
            throughput_floor_kbps: defaults::throughput_floor(),
        }
    }
}

/// Region filter keyword table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Case-insensitive keywords; an entry passes the region filter when its
    /// name or group-title contains any of them
    #[serde(default = "defaults::region_keywords")]
    pub region_keywords: Vec<String>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            region_keywords: defaults::region_keywords(),
        }
    }
}

/// One category keyword group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryRule {
    /// Category name assigned on match
    pub name: String,

    /// Case-insensitive keywords tested against name + group-title
    pub keywords: Vec<String>,
}

/// Classification tables.
///
/// Kept as configuration data so the classifier stays unit-testable against
/// fixed tables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifyConfig {
    /// Ordered keyword groups; first match wins
    #[serde(default = "defaults::categories")]
    pub categories: Vec<CategoryRule>,

    /// Category ordering for the ranker; categories not listed sort last
    #[serde(default = "defaults::category_priority")]
    pub category_priority: Vec<String>,
}

impl Default for ClassifyConfig {
    fn default() -> Self {
        Self {
            categories: defaults::categories(),
            category_priority: defaults::category_priority(),
        }
    }
}

/// Output artifact locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Ranked M3U playlist
    #[serde(default = "defaults::playlist_path")]
    pub playlist_path: PathBuf,

    /// Human-readable index
    #[serde(default = "defaults::index_path")]
    pub index_path: PathBuf,

    /// Backup playlist, written only after a run with valid entries
    #[serde(default = "defaults::backup_path")]
    pub backup_path: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            playlist_path: defaults::playlist_path(),
            index_path: defaults::index_path(),
            backup_path: defaults::backup_path(),
        }
    }
}

mod defaults {
    use std::path::PathBuf;

    use super::CategoryRule;

    // Fetcher defaults
    pub fn user_agent() -> String {
        format!("streamrank/{}", env!("CARGO_PKG_VERSION"))
    }
    pub fn fetch_timeout() -> u64 {
        10
    }
    pub fn fetch_concurrent() -> usize {
        20
    }
    pub fn cache_dir() -> PathBuf {
        PathBuf::from("cache")
    }
    pub fn cache_ttl() -> u64 {
        3600
    }

    // Probe defaults
    pub fn probe_request_timeout() -> u64 {
        8
    }
    pub fn probe_hard_timeout() -> u64 {
        20
    }
    pub fn probe_concurrent() -> usize {
        20
    }
    pub fn byte_quota() -> u64 {
        128 * 1024
    }
    pub fn throughput_floor() -> f64 {
        100.0
    }

    // Region filter defaults: Hong Kong broadcaster markers
    pub fn region_keywords() -> Vec<String> {
        [
            "hk", "香港", "港台", "tvb", "翡翠", "明珠", "viutv", "rthk", "hoy", "鳳凰", "凤凰",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }

    // Classification defaults
    pub fn categories() -> Vec<CategoryRule> {
        let table: [(&str, &[&str]); 5] = [
            ("news", &["新聞", "新闻", "news", "財經", "资讯"]),
            ("sports", &["體育", "体育", "sport", "足球", "賽馬", "赛马"]),
            ("movies", &["電影", "电影", "movie", "戲劇", "影院"]),
            ("kids", &["兒童", "儿童", "kids", "卡通", "動畫", "动画"]),
            ("general", &["綜合", "综合", "翡翠", "明珠", "viutv", "hoy", "rthk", "general"]),
        ];
        table
            .iter()
            .map(|(name, keywords)| CategoryRule {
                name: name.to_string(),
                keywords: keywords.iter().map(|s| s.to_string()).collect(),
            })
            .collect()
    }

    pub fn category_priority() -> Vec<String> {
        ["general", "news", "sports", "movies", "kids", "other"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    // Output defaults
    pub fn playlist_path() -> PathBuf {
        PathBuf::from("output/playlist.m3u")
    }
    pub fn index_path() -> PathBuf {
        PathBuf::from("output/index.txt")
    }
    pub fn backup_path() -> PathBuf {
        PathBuf::from("output/playlist.backup.m3u")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_concurrency() {
        let mut config = Config::default();
        config.fetcher.max_concurrent = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_inverted_probe_timeouts() {
        let mut config = Config::default();
        config.probe.hard_timeout_secs = config.probe.request_timeout_secs;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
            [fetcher]
            timeout_secs = 5
            "#,
        )
        .unwrap();
        assert_eq!(config.fetcher.timeout_secs, 5);
        assert_eq!(config.fetcher.max_concurrent, 20);
        assert!(!config.classify.categories.is_empty());
    }
}

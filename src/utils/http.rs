// src/utils/http.rs

//! HTTP client utilities.

use std::time::Duration;

use crate::error::Result;
use crate::models::FetcherConfig;

/// Create a configured asynchronous HTTP client.
pub fn create_async_client(config: &FetcherConfig) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(&config.user_agent)
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?;
    Ok(client)
}

/// Create the client used by the probe stage.
///
/// Uses the per-request timeout for connect/read; the hard wall-clock bound
/// is enforced by the probe scheduler, not the client.
pub fn create_probe_client(user_agent: &str, request_timeout_secs: u64) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(user_agent)
        .connect_timeout(Duration::from_secs(request_timeout_secs))
        .timeout(Duration::from_secs(request_timeout_secs))
        .build()?;
    Ok(client)
}

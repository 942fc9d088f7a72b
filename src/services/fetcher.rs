// src/services/fetcher.rs

//! Source fetching service.
//!
//! Retrieves raw playlist text for each configured source through a bounded
//! concurrent pool, backed by the content-addressed response cache.

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use reqwest::Client;

use crate::error::Result;
use crate::models::{FetcherConfig, Source};
use crate::storage::ResponseCache;
use crate::utils::http::create_async_client;

/// Result of fetching all sources.
#[derive(Debug, Default)]
pub struct FetchOutcome {
    /// Raw playlist text per source, in source-list order
    pub bodies: Vec<(Source, String)>,
    pub failures: usize,
}

/// Service for fetching playlist sources.
pub struct SourceFetcher {
    config: Arc<FetcherConfig>,
    client: Client,
    cache: ResponseCache,
}

impl SourceFetcher {
    /// Create a fetcher from configuration.
    pub fn new(config: Arc<FetcherConfig>) -> Result<Self> {
        let client = create_async_client(&config)?;
        let cache = ResponseCache::new(
            config.cache_dir.clone(),
            Duration::from_secs(config.cache_ttl_secs),
        );
        Ok(Self {
            config,
            client,
            cache,
        })
    }

    /// Fetch one source, consulting the cache first.
    ///
    /// Timeout, transport errors and non-2xx responses are all non-fatal:
    /// the source is skipped and the run proceeds with whichever sources
    /// succeeded.
    pub async fn fetch(&self, source: &Source) -> Option<String> {
        if let Some(body) = self.cache.lookup(&source.url).await {
            log::debug!("Cache hit for source {}", source.name);
            return Some(body);
        }

        let body = match self.fetch_remote(source).await {
            Ok(body) => body,
            Err(error) => {
                log::warn!(
                    "Failed to fetch source {} ({}): {}",
                    source.name,
                    source.url,
                    error
                );
                return None;
            }
        };

        if let Err(error) = self.cache.store(&source.url, &body).await {
            // Cache failures degrade to uncached operation.
            log::warn!("Failed to cache response for {}: {}", source.name, error);
        }
        Some(body)
    }

    async fn fetch_remote(&self, source: &Source) -> Result<String> {
        let response = self.client.get(&source.url).send().await?;
        let response = response.error_for_status()?;
        Ok(response.text().await?)
    }

    /// Fetch all sources concurrently through a bounded pool.
    ///
    /// Each task accumulates into its own slot; results are merged at the
    /// fan-in point and restored to source-list order, so downstream stages
    /// see a deterministic sequence regardless of completion order.
    pub async fn fetch_all(&self, sources: &[Source]) -> FetchOutcome {
        let concurrency = self.config.max_concurrent.min(sources.len()).max(1);

        let mut fetched: Vec<(Source, String)> = Vec::new();
        let mut outcome = FetchOutcome::default();

        let mut fetch_stream = stream::iter(sources)
            .map(|source| async move {
                let body = self.fetch(source).await;
                (source, body)
            })
            .buffer_unordered(concurrency);

        while let Some((source, body)) = fetch_stream.next().await {
            match body {
                Some(body) => fetched.push((source.clone(), body)),
                None => outcome.failures += 1,
            }
        }

        fetched.sort_by_key(|(source, _)| source.id);
        outcome.bodies = fetched;
        outcome
    }
}

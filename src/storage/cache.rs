//! Content-addressed response cache.
//!
//! Fetched playlist bodies are stored under `{cache_dir}/{sha256(url)}.m3u`
//! with a fixed lifetime. Content is immutable within the lifetime window, so
//! concurrent writers for the same key race harmlessly and writes to distinct
//! keys never conflict.

use std::path::PathBuf;
use std::time::{Duration, SystemTime};

use sha2::{Digest, Sha256};
use tokio::io::AsyncWriteExt;

use crate::error::Result;

/// On-disk response cache keyed by URL hash.
#[derive(Debug, Clone)]
pub struct ResponseCache {
    dir: PathBuf,
    ttl: Duration,
}

impl ResponseCache {
    /// Create a cache rooted at the given directory.
    pub fn new(dir: impl Into<PathBuf>, ttl: Duration) -> Self {
        Self {
            dir: dir.into(),
            ttl,
        }
    }

    /// Cache file path for a URL.
    fn path(&self, url: &str) -> PathBuf {
        let digest = Sha256::digest(url.as_bytes());
        self.dir.join(format!("{}.m3u", hex::encode(digest)))
    }

    /// Return the cached body for a URL if present and not expired.
    pub async fn lookup(&self, url: &str) -> Option<String> {
        let path = self.path(url);
        let metadata = tokio::fs::metadata(&path).await.ok()?;
        let modified = metadata.modified().ok()?;
        let age = SystemTime::now().duration_since(modified).ok()?;
        if age >= self.ttl {
            return None;
        }
        tokio::fs::read_to_string(&path).await.ok()
    }

    /// Store a response body (write to temp, then rename).
    pub async fn store(&self, url: &str, body: &str) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let path = self.path(url);
        let tmp = path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(body.as_bytes()).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }
}

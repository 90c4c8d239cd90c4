//! Model Cache Manager
//!
//! Guarantees a valid weight blob, downloading only when the durable
//! cache has no trustworthy copy:
//!
//! 1. cache hit above the size threshold -> return it, no network
//! 2. cache hit at or below the threshold -> delete, then fetch
//! 3. miss -> fetch, store a duplicate, return the body
//!
//! There is no retry beyond the single re-fetch that follows a corrupt
//! cache entry.

use std::sync::Arc;
use std::time::Instant;

use super::artifact::{ModelArtifact, ModelSource};
use super::cache::DurableCache;
use super::fetch::Fetcher;
use crate::error::{DemixError, Result};

pub struct ModelCacheManager {
    cache: Arc<dyn DurableCache>,
    fetcher: Arc<dyn Fetcher>,
}

impl ModelCacheManager {
    pub fn new(cache: Arc<dyn DurableCache>, fetcher: Arc<dyn Fetcher>) -> Self {
        Self { cache, fetcher }
    }

    /// Return the weights for `source`, from cache when possible
    ///
    /// # Errors
    /// * `ModelDownload` - transport failure or non-success status
    /// * `TruncatedDownload` - server sent a body at or under the threshold
    /// * `Cache` - the cache could not be read or an entry not deleted
    pub async fn acquire(&self, source: &ModelSource) -> Result<ModelArtifact> {
        tracing::info!(url = %source.url, "Checking model cache");

        if let Some(cached) = self.cache.lookup(&source.url).await? {
            let size = cached.declared_size();
            if source.accepts(size) {
                tracing::info!(
                    size_mb = %format!("{:.0}", size as f64 / (1024.0 * 1024.0)),
                    "Model found in cache"
                );
                let bytes = cached.into_bytes().await?;
                return Ok(ModelArtifact::new(bytes, size));
            }

            let corruption = DemixError::ModelCacheCorruption {
                size,
                min_size: source.min_size,
            };
            tracing::warn!(error = %corruption, "Re-downloading model");
            self.cache.delete(&source.url).await?;
        }

        self.download(source).await
    }

    async fn download(&self, source: &ModelSource) -> Result<ModelArtifact> {
        tracing::info!(url = %source.url, "Downloading model");
        let start = Instant::now();

        let response = self.fetcher.fetch(&source.url).await?;
        if !response.is_success() {
            return Err(DemixError::ModelDownload {
                url: source.url.clone(),
                status: Some(response.status),
                reason: format!("HTTP {}", response.status),
            });
        }

        let received = response.body.len() as u64;
        if !source.accepts(received) {
            return Err(DemixError::TruncatedDownload {
                received,
                min_size: source.min_size,
            });
        }

        tracing::info!(
            elapsed_secs = %format!("{:.1}", start.elapsed().as_secs_f64()),
            "Model downloaded, caching"
        );

        // The weights are already in memory; a cache that cannot store
        // them only costs a download next time.
        if let Err(e) = self.cache.put(&source.url, &response).await {
            tracing::warn!(error = %e, "Failed to cache downloaded model");
        }

        let declared = response.declared_len();
        let artifact = ModelArtifact::new(response.body, declared);
        tracing::info!(
            size_mb = %format!("{:.1}", artifact.size_mb()),
            "Model weights read"
        );
        Ok(artifact)
    }
}

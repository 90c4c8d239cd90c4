//! Durable keyed cache seam
//!
//! Mirrors a response cache: `lookup` returns the stored response (with
//! its declared length) or nothing, `put` stores a duplicate of a fetched
//! response, `delete` drops an entry.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;

use super::fetch::FetchResponse;
use crate::error::{DemixError, Result};

/// Where a cached body lives until it is read
#[derive(Debug, Clone)]
pub enum CachedBody {
    Memory(Bytes),
    File(PathBuf),
}

/// A stored response: its declared length plus a handle to the body
#[derive(Debug, Clone)]
pub struct CachedResponse {
    content_length: Option<u64>,
    body: CachedBody,
}

impl CachedResponse {
    pub fn in_memory(content_length: Option<u64>, body: Bytes) -> Self {
        Self {
            content_length,
            body: CachedBody::Memory(body),
        }
    }

    pub fn on_disk(content_length: Option<u64>, path: PathBuf) -> Self {
        Self {
            content_length,
            body: CachedBody::File(path),
        }
    }

    pub fn content_length(&self) -> Option<u64> {
        self.content_length
    }

    /// Declared size, zero when the entry carries no length
    pub fn declared_size(&self) -> u64 {
        self.content_length.unwrap_or(0)
    }

    /// Read the full body into memory
    pub async fn into_bytes(self) -> Result<Bytes> {
        match self.body {
            CachedBody::Memory(bytes) => Ok(bytes),
            CachedBody::File(path) => tokio::fs::read(&path)
                .await
                .map(Bytes::from)
                .map_err(|e| {
                    DemixError::cache(format!("failed to read {}", path.display()), e)
                }),
        }
    }
}

#[async_trait]
pub trait DurableCache: Send + Sync {
    async fn lookup(&self, key: &str) -> Result<Option<CachedResponse>>;

    async fn put(&self, key: &str, response: &FetchResponse) -> Result<()>;

    /// Returns whether an entry was removed
    async fn delete(&self, key: &str) -> Result<bool>;
}

/// Process-local cache, used in tests and for throwaway runs
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, (Option<u64>, Bytes)>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an entry directly, bypassing `put`
    pub fn with_entry(self, key: &str, content_length: Option<u64>, body: impl Into<Bytes>) -> Self {
        self.lock().insert(key.to_string(), (content_length, body.into()));
        self
    }

    pub fn contains(&self, key: &str) -> bool {
        self.lock().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, (Option<u64>, Bytes)>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl DurableCache for MemoryCache {
    async fn lookup(&self, key: &str) -> Result<Option<CachedResponse>> {
        Ok(self
            .lock()
            .get(key)
            .map(|(len, body)| CachedResponse::in_memory(*len, body.clone())))
    }

    async fn put(&self, key: &str, response: &FetchResponse) -> Result<()> {
        self.lock().insert(
            key.to_string(),
            (Some(response.declared_len()), response.body.clone()),
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        Ok(self.lock().remove(key).is_some())
    }
}

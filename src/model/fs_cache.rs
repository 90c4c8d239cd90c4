//! Directory-backed durable cache
//!
//! Layout under `<root>/<name>/`:
//! - `<sha256(key)>.bin` - response body
//! - `manifest.json` - key -> file, declared length, stored-at, body checksum
//!
//! Bodies are written to a temp file and renamed into place, so a crash
//! mid-write leaves no entry rather than a half-written one.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use walkdir::WalkDir;

use super::cache::{CachedResponse, DurableCache};
use super::fetch::FetchResponse;
use crate::error::{DemixError, Result};

const MANIFEST_FILE: &str = "manifest.json";

/// Manifest record for one cached response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntryInfo {
    /// The key the entry was stored under (the model URL)
    pub key: String,
    /// Body file name relative to the cache directory
    pub file: String,
    /// Declared length at store time
    pub content_length: u64,
    pub stored_at: DateTime<Utc>,
    /// Hex SHA-256 of the body
    pub sha256: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CacheManifest {
    entries: HashMap<String, CacheEntryInfo>,
}

/// Disk usage of the cache directory
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CacheUsage {
    pub file_count: usize,
    pub total_size_bytes: u64,
}

impl CacheUsage {
    pub fn total_size_mb(&self) -> f64 {
        self.total_size_bytes as f64 / (1024.0 * 1024.0)
    }
}

/// Result of re-hashing a cached body
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyOutcome {
    Missing,
    Valid,
    Mismatch { expected: String, actual: String },
}

/// Durable cache stored under a named directory
pub struct FsCache {
    dir: PathBuf,
    // Serializes manifest read-modify-write cycles
    manifest_lock: tokio::sync::Mutex<()>,
}

impl FsCache {
    /// Open (lazily creating) the cache `name` under `root`
    pub fn new(root: &Path, name: &str) -> Self {
        Self {
            dir: root.join(name),
            manifest_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Manifest record for `key`, if present
    pub fn entry_info(&self, key: &str) -> Result<Option<CacheEntryInfo>> {
        Ok(self.load_manifest()?.entries.remove(key))
    }

    /// Sum the sizes of every file under the cache directory
    pub fn usage(&self) -> CacheUsage {
        let mut usage = CacheUsage {
            file_count: 0,
            total_size_bytes: 0,
        };
        for entry in WalkDir::new(&self.dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
        {
            if let Ok(metadata) = entry.metadata() {
                usage.file_count += 1;
                usage.total_size_bytes += metadata.len();
            }
        }
        usage
    }

    /// Re-hash the body stored for `key` and compare with the manifest
    pub fn verify(&self, key: &str) -> Result<VerifyOutcome> {
        let Some(info) = self.entry_info(key)? else {
            return Ok(VerifyOutcome::Missing);
        };
        let path = self.dir.join(&info.file);
        let body = match fs::read(&path) {
            Ok(body) => body,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(VerifyOutcome::Missing),
            Err(e) => {
                return Err(DemixError::cache(
                    format!("failed to read {}", path.display()),
                    e,
                ))
            }
        };
        let actual = hex_digest(&body);
        if actual == info.sha256 {
            Ok(VerifyOutcome::Valid)
        } else {
            Ok(VerifyOutcome::Mismatch {
                expected: info.sha256,
                actual,
            })
        }
    }

    fn manifest_path(&self) -> PathBuf {
        self.dir.join(MANIFEST_FILE)
    }

    /// Blocking manifest read for the inspection helpers
    fn load_manifest(&self) -> Result<CacheManifest> {
        let path = self.manifest_path();
        match fs::read_to_string(&path) {
            Ok(content) => Ok(parse_manifest(&path, &content)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(CacheManifest::default()),
            Err(e) => Err(DemixError::cache(
                format!("failed to read {}", path.display()),
                e,
            )),
        }
    }

    async fn read_manifest(&self) -> Result<CacheManifest> {
        let path = self.manifest_path();
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => Ok(parse_manifest(&path, &content)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(CacheManifest::default()),
            Err(e) => Err(DemixError::cache(
                format!("failed to read {}", path.display()),
                e,
            )),
        }
    }

    async fn write_manifest(&self, manifest: &CacheManifest) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await.map_err(|e| {
            DemixError::cache(format!("failed to create {}", self.dir.display()), e)
        })?;
        let path = self.manifest_path();
        let content = serde_json::to_string_pretty(manifest)?;
        tokio::fs::write(&path, content)
            .await
            .map_err(|e| DemixError::cache(format!("failed to write {}", path.display()), e))
    }
}

fn parse_manifest(path: &Path, content: &str) -> CacheManifest {
    match serde_json::from_str(content) {
        Ok(manifest) => manifest,
        Err(e) => {
            // An unreadable manifest orphans the bodies; they are
            // overwritten on the next put.
            tracing::warn!(path = %path.display(), error = %e, "Discarding unreadable cache manifest");
            CacheManifest::default()
        }
    }
}

#[async_trait]
impl DurableCache for FsCache {
    async fn lookup(&self, key: &str) -> Result<Option<CachedResponse>> {
        let Some(info) = self.read_manifest().await?.entries.remove(key) else {
            return Ok(None);
        };

        let path = self.dir.join(&info.file);
        let on_disk = match tokio::fs::metadata(&path).await {
            Ok(metadata) => metadata.len(),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::warn!(key, file = %info.file, "Cache manifest points at a missing body");
                return Ok(None);
            }
            Err(e) => {
                return Err(DemixError::cache(
                    format!("failed to stat {}", path.display()),
                    e,
                ))
            }
        };

        // A body shorter than declared was cut off; report what is really
        // there so the size check can reject it.
        let declared = if on_disk != info.content_length {
            tracing::warn!(
                key,
                declared = info.content_length,
                on_disk,
                "Cached body length differs from manifest"
            );
            on_disk.min(info.content_length)
        } else {
            info.content_length
        };

        Ok(Some(CachedResponse::on_disk(Some(declared), path)))
    }

    async fn put(&self, key: &str, response: &FetchResponse) -> Result<()> {
        let _guard = self.manifest_lock.lock().await;

        tokio::fs::create_dir_all(&self.dir).await.map_err(|e| {
            DemixError::cache(format!("failed to create {}", self.dir.display()), e)
        })?;

        let file = format!("{}.bin", hex_digest(key.as_bytes()));
        let final_path = self.dir.join(&file);
        let tmp_path = self.dir.join(format!(".{}.tmp", uuid::Uuid::new_v4()));

        tokio::fs::write(&tmp_path, &response.body)
            .await
            .map_err(|e| DemixError::cache(format!("failed to write {}", tmp_path.display()), e))?;
        if let Err(e) = tokio::fs::rename(&tmp_path, &final_path).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(DemixError::cache(
                format!("failed to move body into {}", final_path.display()),
                e,
            ));
        }

        let mut manifest = self.read_manifest().await?;
        manifest.entries.insert(
            key.to_string(),
            CacheEntryInfo {
                key: key.to_string(),
                file,
                content_length: response.declared_len(),
                stored_at: Utc::now(),
                sha256: hex_digest(&response.body),
            },
        );
        self.write_manifest(&manifest).await?;

        tracing::debug!(key, bytes = response.body.len(), "Stored cache entry");
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let _guard = self.manifest_lock.lock().await;

        let mut manifest = self.read_manifest().await?;
        let Some(info) = manifest.entries.remove(key) else {
            return Ok(false);
        };

        let path = self.dir.join(&info.file);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(DemixError::cache(
                    format!("failed to remove {}", path.display()),
                    e,
                ))
            }
        }
        self.write_manifest(&manifest).await?;

        tracing::debug!(key, "Deleted cache entry");
        Ok(true)
    }
}

fn hex_digest(data: &[u8]) -> String {
    format!("{:x}", Sha256::digest(data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use tempfile::TempDir;

    const KEY: &str = "https://example.com/model.onnx";

    fn response(body: &'static [u8]) -> FetchResponse {
        FetchResponse::new(200, Some(body.len() as u64), Bytes::from_static(body))
    }

    #[tokio::test]
    async fn test_lookup_on_empty_cache() {
        let temp = TempDir::new().unwrap();
        let cache = FsCache::new(temp.path(), "demucs-model-v1");

        assert!(cache.lookup(KEY).await.unwrap().is_none());
        assert!(!cache.delete(KEY).await.unwrap());
    }

    #[tokio::test]
    async fn test_put_then_lookup_survives_reopen() {
        let temp = TempDir::new().unwrap();
        FsCache::new(temp.path(), "demucs-model-v1")
            .put(KEY, &response(b"0123456789"))
            .await
            .unwrap();

        let reopened = FsCache::new(temp.path(), "demucs-model-v1");
        let hit = reopened.lookup(KEY).await.unwrap().unwrap();
        assert_eq!(hit.content_length(), Some(10));
        assert_eq!(hit.into_bytes().await.unwrap(), Bytes::from_static(b"0123456789"));
        assert_eq!(reopened.verify(KEY).unwrap(), VerifyOutcome::Valid);
    }

    #[tokio::test]
    async fn test_truncated_body_reports_on_disk_length() {
        let temp = TempDir::new().unwrap();
        let cache = FsCache::new(temp.path(), "c");
        cache.put(KEY, &response(b"0123456789")).await.unwrap();

        let info = cache.entry_info(KEY).unwrap().unwrap();
        fs::write(cache.dir().join(&info.file), b"0123").unwrap();

        let hit = cache.lookup(KEY).await.unwrap().unwrap();
        assert_eq!(hit.declared_size(), 4);
        assert!(matches!(
            cache.verify(KEY).unwrap(),
            VerifyOutcome::Mismatch { .. }
        ));
    }

    #[tokio::test]
    async fn test_delete_removes_body_and_manifest_entry() {
        let temp = TempDir::new().unwrap();
        let cache = FsCache::new(temp.path(), "c");
        cache.put(KEY, &response(b"weights")).await.unwrap();
        let file = cache.dir().join(cache.entry_info(KEY).unwrap().unwrap().file);
        assert!(file.exists());

        assert!(cache.delete(KEY).await.unwrap());
        assert!(!file.exists());
        assert!(cache.lookup(KEY).await.unwrap().is_none());
        assert_eq!(cache.verify(KEY).unwrap(), VerifyOutcome::Missing);
    }

    #[tokio::test]
    async fn test_usage_counts_body_and_manifest() {
        let temp = TempDir::new().unwrap();
        let cache = FsCache::new(temp.path(), "c");
        assert_eq!(cache.usage().file_count, 0);

        cache.put(KEY, &response(&[7u8; 2048])).await.unwrap();
        let usage = cache.usage();
        assert_eq!(usage.file_count, 2);
        assert!(usage.total_size_bytes > 2048);
    }

    #[tokio::test]
    async fn test_corrupt_manifest_is_treated_as_empty() {
        let temp = TempDir::new().unwrap();
        let cache = FsCache::new(temp.path(), "c");
        fs::create_dir_all(cache.dir()).unwrap();
        fs::write(cache.dir().join(MANIFEST_FILE), b"{not json").unwrap();

        assert!(cache.lookup(KEY).await.unwrap().is_none());
        cache.put(KEY, &response(b"fresh")).await.unwrap();
        assert!(cache.lookup(KEY).await.unwrap().is_some());
    }
}

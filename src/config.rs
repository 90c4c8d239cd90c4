//! Runtime configuration
//!
//! Resolved in order: built-in defaults, an optional JSON file, then
//! `DEMIX_*` environment variables.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::audio::WavCodec;
use crate::error::{DemixError, Result};
use crate::model::{FsCache, ModelSource, DEFAULT_MIN_MODEL_SIZE, DEFAULT_MODEL_URL};

pub const ENV_MODEL_URL: &str = "DEMIX_MODEL_URL";
pub const ENV_MIN_MODEL_SIZE: &str = "DEMIX_MIN_MODEL_SIZE";
pub const ENV_CACHE_DIR: &str = "DEMIX_CACHE_DIR";
pub const ENV_STEM_BIT_DEPTH: &str = "DEMIX_STEM_BIT_DEPTH";
pub const ENV_DOWNLOAD_TIMEOUT_SECS: &str = "DEMIX_DOWNLOAD_TIMEOUT_SECS";

/// Name of the durable cache; bump the suffix to invalidate old entries
pub const DEFAULT_CACHE_NAME: &str = "demucs-model-v1";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub url: String,
    /// Bodies at or below this many bytes are treated as corrupt
    pub min_size: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_MODEL_URL.to_string(),
            min_size: DEFAULT_MIN_MODEL_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub dir: PathBuf,
    pub name: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: dirs::cache_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("demix"),
            name: DEFAULT_CACHE_NAME.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StemConfig {
    /// WAV bit depth of encoded stems: 16, 24, or 32 (float)
    pub bit_depth: u16,
}

impl Default for StemConfig {
    fn default() -> Self {
        Self { bit_depth: 32 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DemixConfig {
    pub model: ModelConfig,
    pub cache: CacheConfig,
    pub stems: StemConfig,
    pub download_timeout_secs: u64,
}

impl Default for DemixConfig {
    fn default() -> Self {
        Self {
            model: ModelConfig::default(),
            cache: CacheConfig::default(),
            stems: StemConfig::default(),
            // ~166 MB over a slow link
            download_timeout_secs: 600,
        }
    }
}

impl DemixConfig {
    /// Defaults, then `path` if given, then the process environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Read a JSON file. Missing fields keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| DemixError::Config {
            reason: format!("failed to read {}: {}", path.display(), e),
        })?;
        serde_json::from_str(&content).map_err(|e| DemixError::Config {
            reason: format!("failed to parse {}: {}", path.display(), e),
        })
    }

    /// Override fields from `DEMIX_*` variables found by `lookup`.
    /// Unparseable numbers are ignored with a warning.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_MODEL_URL) {
            self.model.url = url;
        }
        if let Some(size) = parse_var(&lookup, ENV_MIN_MODEL_SIZE) {
            self.model.min_size = size;
        }
        if let Some(dir) = lookup(ENV_CACHE_DIR) {
            self.cache.dir = PathBuf::from(dir);
        }
        if let Some(bits) = parse_var(&lookup, ENV_STEM_BIT_DEPTH) {
            self.stems.bit_depth = bits;
        }
        if let Some(secs) = parse_var(&lookup, ENV_DOWNLOAD_TIMEOUT_SECS) {
            self.download_timeout_secs = secs;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.model.url.trim().is_empty() {
            return Err(DemixError::Config {
                reason: "model.url must not be empty".to_string(),
            });
        }
        if self.model.min_size == 0 {
            return Err(DemixError::Config {
                reason: "model.min_size must be greater than zero".to_string(),
            });
        }
        if self.cache.name.is_empty() {
            return Err(DemixError::Config {
                reason: "cache.name must not be empty".to_string(),
            });
        }
        self.stem_encoder()?;
        Ok(())
    }

    pub fn model_source(&self) -> ModelSource {
        ModelSource::new(self.model.url.clone(), self.model.min_size)
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }

    pub fn open_cache(&self) -> FsCache {
        FsCache::new(&self.cache.dir, &self.cache.name)
    }

    /// Encoder for the configured stem format
    pub fn stem_encoder(&self) -> Result<WavCodec> {
        WavCodec::with_bit_depth(self.stems.bit_depth)
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Option<T>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(key, value = %raw, "Ignoring unparseable environment override");
            None
        }
    }
}

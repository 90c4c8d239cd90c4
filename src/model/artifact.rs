//! Model weight location and the immutable weight blob

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// HTDemucs ONNX export, published as a release asset
pub const DEFAULT_MODEL_URL: &str =
    "https://github.com/mcfredrick/client-side-ml/releases/download/v0.1.0/htdemucs.onnx";

/// The real model is ~166 MiB; anything at or under 100 MiB is truncated
pub const DEFAULT_MIN_MODEL_SIZE: u64 = 100 * 1024 * 1024;

/// Where the weights live and how large a valid copy must be
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSource {
    pub url: String,
    /// A copy of `min_size` bytes or fewer is treated as corrupt
    pub min_size: u64,
}

impl Default for ModelSource {
    fn default() -> Self {
        Self {
            url: DEFAULT_MODEL_URL.to_string(),
            min_size: DEFAULT_MIN_MODEL_SIZE,
        }
    }
}

impl ModelSource {
    pub fn new(url: impl Into<String>, min_size: u64) -> Self {
        Self {
            url: url.into(),
            min_size,
        }
    }

    /// True when a copy of `size` bytes is large enough to trust
    pub fn accepts(&self, size: u64) -> bool {
        size > self.min_size
    }
}

/// Opaque weight blob. Cheap to clone, never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelArtifact {
    bytes: Bytes,
    declared_len: u64,
}

impl ModelArtifact {
    pub fn new(bytes: Bytes, declared_len: u64) -> Self {
        Self {
            bytes,
            declared_len,
        }
    }

    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// The size the cache or server declared for this blob
    pub fn declared_len(&self) -> u64 {
        self.declared_len
    }

    pub fn size_mb(&self) -> f64 {
        self.bytes.len() as f64 / (1024.0 * 1024.0)
    }
}

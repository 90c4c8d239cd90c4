//! Model artifact acquisition
//!
//! This module provides:
//! - `ModelSource` / `ModelArtifact`: where the weights live, the blob itself
//! - `DurableCache` with `FsCache` and `MemoryCache` adapters
//! - `Fetcher` with the `reqwest`-backed `HttpFetcher`
//! - `ModelCacheManager`: cache-first acquisition with corruption self-heal

mod artifact;
mod cache;
mod fetch;
mod fs_cache;
mod manager;

pub use artifact::{ModelArtifact, ModelSource, DEFAULT_MIN_MODEL_SIZE, DEFAULT_MODEL_URL};
pub use cache::{CachedBody, CachedResponse, DurableCache, MemoryCache};
pub use fetch::{FetchResponse, Fetcher, HttpFetcher};
pub use fs_cache::{CacheEntryInfo, CacheUsage, FsCache, VerifyOutcome};
pub use manager::ModelCacheManager;

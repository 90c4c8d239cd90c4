//! Error handling for Demix
//!
//! Every worker-side failure is caught at the job boundary and turned
//! into a single `error` message, so the `Display` text of each variant
//! is what the user eventually reads.

use std::sync::Arc;

use thiserror::Error;

/// Result type alias for Demix operations
pub type Result<T> = std::result::Result<T, DemixError>;

/// Main error type for Demix operations
#[derive(Error, Debug)]
pub enum DemixError {
    // Model acquisition
    #[error("Model download failed: {reason}")]
    ModelDownload {
        url: String,
        status: Option<u16>,
        reason: String,
    },

    #[error("Model download truncated: received {received} bytes, expected more than {min_size}")]
    TruncatedDownload { received: u64, min_size: u64 },

    /// Cached entry below the size threshold. Handled inside the cache
    /// manager by deleting the entry and fetching once more.
    #[error("Cached model is corrupt: {size} bytes (minimum {min_size})")]
    ModelCacheCorruption { size: u64, min_size: u64 },

    #[error("Model cache error: {reason}")]
    Cache {
        reason: String,
        #[source]
        source: Option<std::io::Error>,
    },

    // Inference
    #[error("Model initialization failed: {reason}")]
    Initialization { reason: String },

    #[error("Separation failed: {reason}")]
    Inference { reason: String },

    #[error("Failed to encode stem '{stem}': {reason}")]
    Encoding { stem: String, reason: String },

    // Audio input
    #[error("{reason}")]
    Decode {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Invalid audio: {reason}")]
    InvalidAudio { reason: String },

    // Job protocol
    #[error("A separation job is already running ({state})")]
    JobAlreadyActive { state: String },

    #[error("A separation job is still in flight")]
    JobInFlight,

    #[error("Worker unavailable: {reason}")]
    WorkerUnavailable { reason: String },

    // Configuration
    #[error("Invalid configuration: {reason}")]
    Config { reason: String },

    // I/O Errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization Errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// One failure handed to several waiters, e.g. every caller that was
    /// waiting on the same model initialization
    #[error(transparent)]
    Shared(Arc<DemixError>),
}

impl DemixError {
    /// Get the error code for this error type
    pub fn error_code(&self) -> &'static str {
        match self {
            DemixError::ModelDownload { .. } => "MODEL_DOWNLOAD",
            DemixError::TruncatedDownload { .. } => "TRUNCATED_DOWNLOAD",
            DemixError::ModelCacheCorruption { .. } => "MODEL_CACHE_CORRUPTION",
            DemixError::Cache { .. } => "CACHE_ERROR",
            DemixError::Initialization { .. } => "INITIALIZATION_ERROR",
            DemixError::Inference { .. } => "INFERENCE_ERROR",
            DemixError::Encoding { .. } => "ENCODING_ERROR",
            DemixError::Decode { .. } => "DECODE_ERROR",
            DemixError::InvalidAudio { .. } => "INVALID_AUDIO",
            DemixError::JobAlreadyActive { .. } => "JOB_ALREADY_ACTIVE",
            DemixError::JobInFlight => "JOB_IN_FLIGHT",
            DemixError::WorkerUnavailable { .. } => "WORKER_UNAVAILABLE",
            DemixError::Config { .. } => "CONFIG_ERROR",
            DemixError::Io(_) => "IO_ERROR",
            DemixError::Serialization(_) => "SERIALIZATION_ERROR",
            DemixError::Shared(inner) => inner.error_code(),
        }
    }

    /// Check if a later job can reasonably succeed after this error
    pub fn is_recoverable(&self) -> bool {
        if let DemixError::Shared(inner) = self {
            return inner.is_recoverable();
        }
        matches!(
            self,
            DemixError::ModelDownload { .. }
                | DemixError::TruncatedDownload { .. }
                | DemixError::ModelCacheCorruption { .. }
                | DemixError::Initialization { .. }
                | DemixError::Decode { .. }
                | DemixError::InvalidAudio { .. }
                | DemixError::JobInFlight
        )
    }

    /// Get recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            DemixError::ModelDownload { status: Some(404), .. } => vec![
                "The model URL no longer resolves",
                "Set DEMIX_MODEL_URL to a reachable copy of the weights",
            ],
            DemixError::ModelDownload { .. } | DemixError::TruncatedDownload { .. } => vec![
                "Check your network connection and try again",
                "The model is cached after the first successful download",
            ],
            DemixError::Cache { .. } => vec![
                "Run 'demix-cli cache clear' to drop the cached model",
                "Check that the cache directory is writable",
            ],
            DemixError::Decode { .. } => vec![
                "Convert the file to WAV first",
                "Check if the file plays in another application",
            ],
            DemixError::JobInFlight => vec!["Wait for the current separation to finish"],
            DemixError::Shared(inner) => inner.recovery_suggestions(),
            _ => vec![],
        }
    }

    /// The underlying error, looking through `Shared`
    pub fn root(&self) -> &DemixError {
        match self {
            DemixError::Shared(inner) => inner.root(),
            other => other,
        }
    }

    pub(crate) fn cache(reason: impl Into<String>, source: std::io::Error) -> Self {
        DemixError::Cache {
            reason: reason.into(),
            source: Some(source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_download_error_message_carries_status() {
        let err = DemixError::ModelDownload {
            url: "https://example.com/model.onnx".to_string(),
            status: Some(404),
            reason: "HTTP 404".to_string(),
        };
        assert_eq!(err.to_string(), "Model download failed: HTTP 404");
        assert_eq!(err.error_code(), "MODEL_DOWNLOAD");
        assert!(err.is_recoverable());
        assert!(!err.recovery_suggestions().is_empty());
    }

    #[test]
    fn test_decode_error_displays_reason_verbatim() {
        let err = DemixError::Decode {
            reason: "not a WAV file".to_string(),
            source: None,
        };
        assert_eq!(err.to_string(), "not a WAV file");
    }

    #[test]
    fn test_shared_error_reads_like_its_source() {
        let err = DemixError::Shared(Arc::new(DemixError::ModelDownload {
            url: "https://example.com/model.onnx".to_string(),
            status: Some(404),
            reason: "HTTP 404".to_string(),
        }));
        assert_eq!(err.to_string(), "Model download failed: HTTP 404");
        assert_eq!(err.error_code(), "MODEL_DOWNLOAD");
        assert!(err.is_recoverable());
        assert_eq!(err.recovery_suggestions().len(), 2);
        assert!(matches!(err.root(), DemixError::ModelDownload { status: Some(404), .. }));
    }

    #[test]
    fn test_protocol_errors_are_not_recoverable_by_retry() {
        let err = DemixError::WorkerUnavailable {
            reason: "channel closed".to_string(),
        };
        assert!(!err.is_recoverable());
        assert_eq!(err.error_code(), "WORKER_UNAVAILABLE");
    }
}

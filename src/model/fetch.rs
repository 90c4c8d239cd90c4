//! Network fetch seam and the `reqwest` adapter

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::{DemixError, Result};

/// A fully read HTTP response
#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub status: u16,
    /// `Content-Length` as sent by the server
    pub content_length: Option<u64>,
    pub body: Bytes,
}

impl FetchResponse {
    pub fn new(status: u16, content_length: Option<u64>, body: Bytes) -> Self {
        Self {
            status,
            content_length,
            body,
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Header length when present, otherwise the body length
    pub fn declared_len(&self) -> u64 {
        self.content_length.unwrap_or(self.body.len() as u64)
    }
}

/// Issues GET requests. Non-success statuses are returned, not raised;
/// only transport failures are errors.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchResponse>;
}

/// `reqwest`-backed fetcher
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DemixError::Config {
                reason: format!("failed to build HTTP client: {}", e),
            })?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchResponse> {
        let transport_error = |e: reqwest::Error| DemixError::ModelDownload {
            url: url.to_string(),
            status: None,
            reason: if e.is_timeout() {
                format!("request to {} timed out", url)
            } else {
                e.to_string()
            },
        };

        let response = self.client.get(url).send().await.map_err(transport_error)?;
        let status = response.status().as_u16();
        let content_length = response.content_length();
        let body = response.bytes().await.map_err(transport_error)?;

        tracing::debug!(url, status, bytes = body.len(), "Fetch finished");
        Ok(FetchResponse::new(status, content_length, body))
    }
}

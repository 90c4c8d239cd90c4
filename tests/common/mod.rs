//! Shared fakes for the integration tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use demix::audio::{AudioEncoder, WavCodec};
use demix::control::{ControlView, StemArtifact};
use demix::model::{FetchResponse, Fetcher};
use demix::{DemixError, Result};

pub const MODEL_URL: &str = "https://models.example.com/htdemucs.onnx";
pub const MIN_SIZE: u64 = 1024;

/// Serves one fixed response, or a transport failure, and counts requests
pub struct CountingFetcher {
    reply: Reply,
    calls: AtomicUsize,
}

enum Reply {
    Response { status: u16, body: Bytes },
    Unreachable,
}

impl CountingFetcher {
    pub fn ok(len: usize) -> Arc<Self> {
        Self::with_status(200, vec![0x5a; len])
    }

    pub fn with_status(status: u16, body: Vec<u8>) -> Arc<Self> {
        Self::replying(Reply::Response {
            status,
            body: Bytes::from(body),
        })
    }

    /// Every request fails before any response arrives
    pub fn unreachable() -> Arc<Self> {
        Self::replying(Reply::Unreachable)
    }

    fn replying(reply: Reply) -> Arc<Self> {
        Arc::new(Self {
            reply,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Fetcher for CountingFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        match &self.reply {
            Reply::Response { status, body } => Ok(FetchResponse::new(
                *status,
                Some(body.len() as u64),
                body.clone(),
            )),
            Reply::Unreachable => Err(DemixError::ModelDownload {
                url: url.to_string(),
                status: None,
                reason: "connection refused".to_string(),
            }),
        }
    }
}

/// Records everything the controller renders
#[derive(Debug, Default)]
pub struct RecordingView {
    pub statuses: Vec<String>,
    pub progress: Vec<f64>,
    pub progress_visible: bool,
    pub stems: Vec<StemArtifact>,
}

impl ControlView for RecordingView {
    fn set_status(&mut self, text: &str) {
        self.statuses.push(text.to_string());
    }

    fn show_progress(&mut self, fraction: f64) {
        self.progress_visible = true;
        self.progress.push(fraction);
    }

    fn hide_progress(&mut self) {
        self.progress_visible = false;
    }

    fn clear_stems(&mut self) {
        self.stems.clear();
    }

    fn show_stems(&mut self, stems: Vec<StemArtifact>) {
        self.stems = stems;
    }
}

pub fn wav_bytes(channels: &[Vec<f32>]) -> Vec<u8> {
    WavCodec::new().encode(channels, 44100).unwrap()
}

/// Deterministic test signal
pub fn tone(frames: usize, phase: f32) -> Vec<f32> {
    (0..frames)
        .map(|i| ((i as f32 * 0.05) + phase).sin() * 0.5)
        .collect()
}

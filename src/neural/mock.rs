//! Mock separation backend
//!
//! Does no real AI processing. Each stem is the input scaled by a fixed
//! gain, with gains summing to one, so the stems always mix back to the
//! input. Progress is reported once per segment, like a chunked model.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use super::model::{SeparationModel, StemSet};
use crate::audio::RawAudio;
use crate::error::{DemixError, Result};
use crate::model::ModelArtifact;

/// 4-stem layout of HTDemucs and its mock gains
pub const DEFAULT_STEMS: &[(&str, f32)] = &[
    ("drums", 0.3),
    ("bass", 0.2),
    ("other", 0.1),
    ("vocals", 0.4),
];

/// Initialized mock runtime
#[derive(Debug)]
pub struct MockSession {
    weights_len: usize,
}

impl MockSession {
    pub fn weights_len(&self) -> usize {
        self.weights_len
    }
}

/// Deterministic stand-in for the separation network
pub struct MockSeparator {
    stems: Vec<(String, f32)>,
    /// Frames processed per progress step
    segment_frames: usize,
    initializations: AtomicUsize,
    failing_initializations: AtomicUsize,
}

impl Default for MockSeparator {
    fn default() -> Self {
        Self::new()
    }
}

impl MockSeparator {
    pub fn new() -> Self {
        Self {
            stems: DEFAULT_STEMS
                .iter()
                .map(|(name, gain)| (name.to_string(), *gain))
                .collect(),
            // ~7.8 s at 44.1 kHz, the HTDemucs segment length
            segment_frames: 343_980,
            initializations: AtomicUsize::new(0),
            failing_initializations: AtomicUsize::new(0),
        }
    }

    /// Report progress every `frames` frames
    pub fn with_segment_frames(mut self, frames: usize) -> Self {
        self.segment_frames = frames.max(1);
        self
    }

    /// Make the next `count` initializations fail
    pub fn with_failing_initializations(self, count: usize) -> Self {
        self.failing_initializations.store(count, Ordering::SeqCst);
        self
    }

    /// How many times `initialize` has been entered
    pub fn initialization_count(&self) -> usize {
        self.initializations.load(Ordering::SeqCst)
    }

    /// Number of progress steps a run over `frames` frames reports
    pub fn steps_for(&self, frames: usize) -> u32 {
        frames.div_ceil(self.segment_frames).max(1) as u32
    }
}

#[async_trait]
impl SeparationModel for MockSeparator {
    type Handle = MockSession;

    fn name(&self) -> &str {
        "mock-separator"
    }

    async fn initialize(&self, weights: ModelArtifact) -> Result<MockSession> {
        self.initializations.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;

        let should_fail = self
            .failing_initializations
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if should_fail {
            return Err(DemixError::Initialization {
                reason: "mock runtime refused to start".to_string(),
            });
        }
        if weights.is_empty() {
            return Err(DemixError::Initialization {
                reason: "weight blob is empty".to_string(),
            });
        }

        Ok(MockSession {
            weights_len: weights.len(),
        })
    }

    async fn separate(
        &self,
        _handle: &MockSession,
        audio: RawAudio,
        on_progress: &mut (dyn FnMut(u32, u32) + Send),
    ) -> Result<StemSet> {
        if audio.num_channels() != 2 {
            return Err(DemixError::Inference {
                reason: format!("expected 2 channels, got {}", audio.num_channels()),
            });
        }

        let sample_rate = audio.sample_rate();
        let frames = audio.num_frames();
        let total = self.steps_for(frames);
        let input = audio.into_channels();

        let mut outputs: Vec<Vec<Vec<f32>>> = self
            .stems
            .iter()
            .map(|_| vec![Vec::with_capacity(frames); input.len()])
            .collect();

        for step in 1..=total {
            let start = (step as usize - 1) * self.segment_frames;
            let end = (start + self.segment_frames).min(frames);
            for ((_, gain), stem) in self.stems.iter().zip(outputs.iter_mut()) {
                for (out, channel) in stem.iter_mut().zip(&input) {
                    out.extend(channel[start..end].iter().map(|s| s * gain));
                }
            }
            on_progress(step, total);
            tokio::task::yield_now().await;
        }

        let mut stems = StemSet::new();
        for ((name, _), channels) in self.stems.iter().zip(outputs) {
            stems.insert(name.clone(), RawAudio::new(channels, sample_rate)?);
        }
        Ok(stems)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use bytes::Bytes;

    fn weights() -> ModelArtifact {
        ModelArtifact::new(Bytes::from_static(&[1u8; 64]), 64)
    }

    fn stereo(frames: usize) -> RawAudio {
        let left: Vec<f32> = (0..frames).map(|i| (i as f32 * 0.01).sin()).collect();
        let right: Vec<f32> = left.iter().map(|s| -s).collect();
        RawAudio::new(vec![left, right], 44100).unwrap()
    }

    #[tokio::test]
    async fn test_stems_mix_back_to_input() {
        let model = MockSeparator::new().with_segment_frames(100);
        let session = model.initialize(weights()).await.unwrap();
        let input = stereo(250);
        let expected = input.channels().to_vec();

        let mut progress = Vec::new();
        let stems = model
            .separate(&session, input, &mut |step, total| progress.push((step, total)))
            .await
            .unwrap();

        assert_eq!(stems.names(), vec!["drums", "bass", "other", "vocals"]);
        assert_eq!(progress, vec![(1, 3), (2, 3), (3, 3)]);

        for (ch, original) in expected.iter().enumerate() {
            for (i, sample) in original.iter().enumerate() {
                let mixed: f32 = stems
                    .names()
                    .iter()
                    .map(|name| stems.get(name).unwrap().channel(ch).unwrap()[i])
                    .sum();
                assert_relative_eq!(mixed, *sample, epsilon = 1e-6);
            }
        }
    }

    #[tokio::test]
    async fn test_rejects_mono_input() {
        let model = MockSeparator::new();
        let session = model.initialize(weights()).await.unwrap();
        let mono = RawAudio::new(vec![vec![0.0; 10]], 44100).unwrap();

        let err = model.separate(&session, mono, &mut |_, _| {}).await.unwrap_err();
        assert_eq!(err.error_code(), "INFERENCE_ERROR");
    }

    #[tokio::test]
    async fn test_failing_initializations_are_consumed() {
        let model = MockSeparator::new().with_failing_initializations(1);

        assert!(model.initialize(weights()).await.is_err());
        let session = model.initialize(weights()).await.unwrap();
        assert_eq!(session.weights_len(), 64);
        assert_eq!(model.initialization_count(), 2);
    }

    #[test]
    fn test_steps_for_short_audio_is_one() {
        let model = MockSeparator::new().with_segment_frames(1000);
        assert_eq!(model.steps_for(0), 1);
        assert_eq!(model.steps_for(1000), 1);
        assert_eq!(model.steps_for(1001), 2);
    }
}

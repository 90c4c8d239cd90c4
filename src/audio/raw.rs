//! Raw per-channel audio as exchanged between control and worker

use serde::Serialize;

use crate::error::{DemixError, Result};

/// Decoded audio: one sample buffer per channel plus the sample rate.
///
/// Deliberately not `Clone`. A `RawAudio` is owned by exactly one side of
/// the control/worker boundary at a time; sending it moves the buffers.
#[derive(Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RawAudio {
    channel_data: Vec<Vec<f32>>,
    sample_rate: u32,
}

impl RawAudio {
    /// Create raw audio, validating the channel layout
    ///
    /// # Errors
    /// * `InvalidAudio` - no channels, zero sample rate, or ragged channels
    pub fn new(channel_data: Vec<Vec<f32>>, sample_rate: u32) -> Result<Self> {
        if channel_data.is_empty() {
            return Err(DemixError::InvalidAudio {
                reason: "audio has no channels".to_string(),
            });
        }
        if sample_rate == 0 {
            return Err(DemixError::InvalidAudio {
                reason: "sample rate must be positive".to_string(),
            });
        }
        let frames = channel_data[0].len();
        if let Some(ch) = channel_data.iter().position(|c| c.len() != frames) {
            return Err(DemixError::InvalidAudio {
                reason: format!(
                    "channel {} has {} samples, channel 0 has {}",
                    ch,
                    channel_data[ch].len(),
                    frames
                ),
            });
        }
        Ok(Self {
            channel_data,
            sample_rate,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn num_channels(&self) -> usize {
        self.channel_data.len()
    }

    /// Samples per channel
    pub fn num_frames(&self) -> usize {
        self.channel_data.first().map_or(0, Vec::len)
    }

    pub fn duration_secs(&self) -> f64 {
        self.num_frames() as f64 / self.sample_rate as f64
    }

    pub fn channels(&self) -> &[Vec<f32>] {
        &self.channel_data
    }

    pub fn channel(&self, index: usize) -> Option<&[f32]> {
        self.channel_data.get(index).map(Vec::as_slice)
    }

    /// True once the buffers have been detached
    pub fn is_detached(&self) -> bool {
        self.channel_data.iter().all(Vec::is_empty)
    }

    /// Duplicate a mono channel so the audio is exactly stereo.
    ///
    /// The separation model expects two channels. Audio that already has
    /// two or more channels is returned unchanged.
    pub fn into_stereo(mut self) -> Self {
        if self.channel_data.len() == 1 {
            tracing::debug!("Mono audio, duplicating to stereo");
            let left = self.channel_data[0].clone();
            self.channel_data.push(left);
        }
        self
    }

    /// Move the sample buffers out, leaving zero-length channels behind.
    ///
    /// The channel count and sample rate of `self` are preserved, so a
    /// detached value still describes the layout of what was sent.
    pub fn detach(&mut self) -> RawAudio {
        let channel_data = self
            .channel_data
            .iter_mut()
            .map(std::mem::take)
            .collect();
        RawAudio {
            channel_data,
            sample_rate: self.sample_rate,
        }
    }

    /// Consume the audio, returning the channel buffers
    pub fn into_channels(self) -> Vec<Vec<f32>> {
        self.channel_data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_empty_channel_list() {
        assert!(RawAudio::new(vec![], 44100).is_err());
    }

    #[test]
    fn test_rejects_zero_sample_rate() {
        assert!(RawAudio::new(vec![vec![0.0; 4]], 0).is_err());
    }

    #[test]
    fn test_rejects_ragged_channels() {
        let err = RawAudio::new(vec![vec![0.0; 4], vec![0.0; 3]], 44100).unwrap_err();
        assert!(err.to_string().contains("channel 1"));
    }

    #[test]
    fn test_mono_becomes_two_identical_channels() {
        let audio = RawAudio::new(vec![vec![0.1, -0.2, 0.3]], 44100)
            .unwrap()
            .into_stereo();

        assert_eq!(audio.num_channels(), 2);
        assert_eq!(audio.channel(0), audio.channel(1));
        assert_eq!(audio.channel(1), Some(&[0.1, -0.2, 0.3][..]));
    }

    #[test]
    fn test_stereo_passes_through_unchanged() {
        let left = vec![0.5, 0.25];
        let right = vec![-0.5, -0.25];
        let audio = RawAudio::new(vec![left.clone(), right.clone()], 48000)
            .unwrap()
            .into_stereo();

        assert_eq!(audio.into_channels(), vec![left, right]);
    }

    #[test]
    fn test_detach_leaves_zero_length_channels() {
        let mut audio = RawAudio::new(vec![vec![1.0; 8], vec![2.0; 8]], 44100).unwrap();
        let sent = audio.detach();

        assert!(audio.is_detached());
        assert_eq!(audio.num_channels(), 2);
        assert_eq!(audio.num_frames(), 0);
        assert_eq!(sent.num_frames(), 8);
        assert_eq!(sent.channel(1), Some(&[2.0; 8][..]));
    }

    #[test]
    fn test_duration() {
        let audio = RawAudio::new(vec![vec![0.0; 22050]], 44100).unwrap();
        assert!((audio.duration_secs() - 0.5).abs() < 1e-9);
    }
}

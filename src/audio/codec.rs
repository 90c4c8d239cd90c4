//! Audio codec seams and the WAV adapter
//!
//! Decoding arbitrary containers and encoding stems are external
//! capabilities. `WavCodec` is the adapter the CLI uses; a platform
//! decoder for other containers plugs in behind `AudioDecoder`.

use std::io::Cursor;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};

use super::raw::RawAudio;
use crate::error::{DemixError, Result};

/// Turns container bytes into per-channel samples
pub trait AudioDecoder: Send + Sync {
    fn decode(&self, bytes: &[u8]) -> Result<RawAudio>;
}

/// Turns per-channel samples into container bytes
///
/// Stems travel as WAV, so implementations produce WAV containers.
pub trait AudioEncoder: Send + Sync {
    fn encode(&self, channels: &[Vec<f32>], sample_rate: u32) -> Result<Vec<u8>>;
}

/// WAV decode/encode backed by `hound`
#[derive(Debug, Clone, Copy)]
pub struct WavCodec {
    /// Bit depth used when encoding: 16, 24, or 32 (float)
    bit_depth: u16,
}

impl Default for WavCodec {
    fn default() -> Self {
        Self { bit_depth: 32 }
    }
}

impl WavCodec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Encode with the given bit depth (16, 24, or 32)
    ///
    /// # Errors
    /// * `Config` - any other bit depth
    pub fn with_bit_depth(bit_depth: u16) -> Result<Self> {
        match bit_depth {
            16 | 24 | 32 => Ok(Self { bit_depth }),
            other => Err(DemixError::Config {
                reason: format!("{}-bit WAV output (only 16, 24, 32 supported)", other),
            }),
        }
    }
}

impl AudioDecoder for WavCodec {
    fn decode(&self, bytes: &[u8]) -> Result<RawAudio> {
        let reader = WavReader::new(Cursor::new(bytes)).map_err(|e| DemixError::Decode {
            reason: format!("not a readable WAV file: {}", e),
            source: Some(Box::new(e)),
        })?;

        let spec = reader.spec();
        let channels = spec.channels as usize;
        if channels == 0 {
            return Err(DemixError::Decode {
                reason: "WAV header declares zero channels".to_string(),
                source: None,
            });
        }

        let interleaved = read_samples_as_f32(reader, spec.bits_per_sample, spec.sample_format)?;
        if interleaved.is_empty() {
            return Err(DemixError::Decode {
                reason: "audio contains no samples".to_string(),
                source: None,
            });
        }

        RawAudio::new(deinterleave(&interleaved, channels), spec.sample_rate)
    }
}

impl AudioEncoder for WavCodec {
    fn encode(&self, channels: &[Vec<f32>], sample_rate: u32) -> Result<Vec<u8>> {
        let spec = WavSpec {
            channels: channels.len() as u16,
            sample_rate,
            bits_per_sample: self.bit_depth,
            sample_format: if self.bit_depth == 32 {
                SampleFormat::Float
            } else {
                SampleFormat::Int
            },
        };

        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = WavWriter::new(&mut cursor, spec).map_err(wav_write_error)?;
            for sample in interleave(channels) {
                let written = match self.bit_depth {
                    16 => {
                        let scaled = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
                        writer.write_sample(scaled)
                    }
                    // 24-bit stored as i32 in hound
                    24 => {
                        let scaled = (sample * 8388607.0).clamp(-8388608.0, 8388607.0) as i32;
                        writer.write_sample(scaled)
                    }
                    _ => writer.write_sample(sample),
                };
                written.map_err(wav_write_error)?;
            }
            writer.finalize().map_err(wav_write_error)?;
        }

        Ok(cursor.into_inner())
    }
}

fn wav_write_error(e: hound::Error) -> DemixError {
    DemixError::Encoding {
        stem: String::new(),
        reason: e.to_string(),
    }
}

fn read_samples_as_f32<R: std::io::Read>(
    mut reader: WavReader<R>,
    bits_per_sample: u16,
    sample_format: SampleFormat,
) -> Result<Vec<f32>> {
    let samples: std::result::Result<Vec<f32>, hound::Error> = match (sample_format, bits_per_sample)
    {
        (SampleFormat::Float, _) => reader.samples::<f32>().collect(),
        (SampleFormat::Int, 8) => reader
            .samples::<i8>()
            .map(|s| s.map(|v| v as f32 / 128.0))
            .collect(),
        (SampleFormat::Int, 16) => reader
            .samples::<i16>()
            .map(|s| s.map(|v| v as f32 / 32768.0))
            .collect(),
        (SampleFormat::Int, 24) => reader
            .samples::<i32>()
            .map(|s| s.map(|v| v as f32 / 8388608.0))
            .collect(),
        (SampleFormat::Int, 32) => reader
            .samples::<i32>()
            .map(|s| s.map(|v| v as f32 / 2147483648.0))
            .collect(),
        (SampleFormat::Int, bits) => {
            return Err(DemixError::Decode {
                reason: format!("unsupported {}-bit integer audio", bits),
                source: None,
            })
        }
    };

    samples.map_err(|e| DemixError::Decode {
        reason: format!("failed to read samples: {}", e),
        source: Some(Box::new(e)),
    })
}

/// [L,R,L,R,...] -> [[L,L,...], [R,R,...]]
fn deinterleave(samples: &[f32], channels: usize) -> Vec<Vec<f32>> {
    let frames = samples.len() / channels;
    let mut result = vec![Vec::with_capacity(frames); channels];
    for frame in samples.chunks_exact(channels) {
        for (ch, sample) in frame.iter().enumerate() {
            result[ch].push(*sample);
        }
    }
    result
}

/// [[L,L,...], [R,R,...]] -> [L,R,L,R,...]
fn interleave(channels: &[Vec<f32>]) -> Vec<f32> {
    let frames = channels.first().map_or(0, Vec::len);
    let mut result = Vec::with_capacity(frames * channels.len());
    for frame in 0..frames {
        for channel in channels {
            result.push(channel[frame]);
        }
    }
    result
}

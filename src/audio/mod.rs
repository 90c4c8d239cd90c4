//! Audio data and codec seams
//!
//! - `RawAudio`: per-channel samples that move between control and worker
//! - `AudioDecoder` / `AudioEncoder`: external codec capabilities
//! - `WavCodec`: the `hound`-backed WAV adapter

mod codec;
mod raw;

pub use codec::{AudioDecoder, AudioEncoder, WavCodec};
pub use raw::RawAudio;

//! Separation model trait and core types
//!
//! The network itself is opaque: it is initialized once from a weight
//! blob and then run on stereo audio, reporting progress as it goes.

use async_trait::async_trait;

use crate::audio::RawAudio;
use crate::error::Result;
use crate::model::ModelArtifact;

/// Separated stems in the order the model produced them
#[derive(Debug, Default)]
pub struct StemSet {
    stems: Vec<(String, RawAudio)>,
}

impl StemSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a stem. A repeated name replaces the earlier audio in place.
    pub fn insert(&mut self, name: impl Into<String>, audio: RawAudio) {
        let name = name.into();
        match self.stems.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = audio,
            None => self.stems.push((name, audio)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&RawAudio> {
        self.stems.iter().find(|(n, _)| n == name).map(|(_, a)| a)
    }

    pub fn names(&self) -> Vec<&str> {
        self.stems.iter().map(|(n, _)| n.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.stems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stems.is_empty()
    }
}

impl IntoIterator for StemSet {
    type Item = (String, RawAudio);
    type IntoIter = std::vec::IntoIter<(String, RawAudio)>;

    fn into_iter(self) -> Self::IntoIter {
        self.stems.into_iter()
    }
}

/// Trait that every separation backend implements
#[async_trait]
pub trait SeparationModel: Send + Sync {
    /// Initialized runtime state (sessions, device buffers, ...)
    type Handle: Send + Sync + 'static;

    /// Human-readable backend name for logs
    fn name(&self) -> &str;

    /// Build the runtime from the weight blob. Expensive; called once per
    /// worker lifetime by the inference session.
    async fn initialize(&self, weights: ModelArtifact) -> Result<Self::Handle>;

    /// Split `audio` into stems, calling `on_progress(step, total)` with
    /// `0 < step <= total`, non-decreasing `step` and a fixed `total`.
    async fn separate(
        &self,
        handle: &Self::Handle,
        audio: RawAudio,
        on_progress: &mut (dyn FnMut(u32, u32) + Send),
    ) -> Result<StemSet>;
}

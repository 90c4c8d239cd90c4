//! Move-only buffers for the worker -> control direction

use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;

/// An encoded stem. Not `Clone`: whoever holds it owns the bytes.
#[derive(Debug, PartialEq, Eq)]
pub struct TransferBuffer(Vec<u8>);

impl TransferBuffer {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.0
    }
}

impl From<Vec<u8>> for TransferBuffer {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl Serialize for TransferBuffer {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_bytes(&self.0)
    }
}

/// Encoded stems in the order the model produced them
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Tracks {
    entries: Vec<(String, TransferBuffer)>,
}

impl Tracks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a stem. A repeated name replaces the earlier buffer in place.
    pub fn insert(&mut self, name: impl Into<String>, buffer: TransferBuffer) {
        let name = name.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = buffer,
            None => self.entries.push((name, buffer)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&TransferBuffer> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, buffer)| buffer)
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|(n, _)| n.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total_bytes(&self) -> usize {
        self.entries.iter().map(|(_, b)| b.len()).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &TransferBuffer)> {
        self.entries.iter().map(|(n, b)| (n.as_str(), b))
    }
}

impl IntoIterator for Tracks {
    type Item = (String, TransferBuffer);
    type IntoIter = std::vec::IntoIter<(String, TransferBuffer)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl Serialize for Tracks {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, buffer) in &self.entries {
            map.serialize_entry(name, buffer)?;
        }
        map.end()
    }
}

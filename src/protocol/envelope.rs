//! Message envelope between the control thread and the worker
//!
//! One job is a single request followed by any number of `status` and
//! `progress` events and exactly one terminal `done` or `error`. There
//! is no job id because only one job may be in flight.

use serde::Serialize;

use super::transfer::Tracks;
use crate::audio::RawAudio;

/// Control -> worker
#[derive(Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum WorkerRequest {
    /// Start a separation job. The channel buffers move with the message.
    Separate {
        #[serde(rename = "rawAudio")]
        raw_audio: RawAudio,
    },
}

/// Worker -> control
#[derive(Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum WorkerEvent {
    /// Free-form narration of what the worker is doing
    Status { text: String },

    /// Inference progress, `0 < step <= total`
    Progress { step: u32, total: u32 },

    /// Terminal success carrying every encoded stem
    Done { tracks: Tracks },

    /// Terminal failure
    Error { message: String },
}

impl WorkerEvent {
    pub fn status(text: impl Into<String>) -> Self {
        WorkerEvent::Status { text: text.into() }
    }

    pub fn error(message: impl Into<String>) -> Self {
        WorkerEvent::Error {
            message: message.into(),
        }
    }

    /// `done` and `error` end a job
    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkerEvent::Done { .. } | WorkerEvent::Error { .. })
    }

    /// The wire tag of this event
    pub fn kind(&self) -> &'static str {
        match self {
            WorkerEvent::Status { .. } => "status",
            WorkerEvent::Progress { .. } => "progress",
            WorkerEvent::Done { .. } => "done",
            WorkerEvent::Error { .. } => "error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::TransferBuffer;
    use serde_json::json;

    #[test]
    fn test_event_tags_match_wire_vocabulary() {
        let progress = serde_json::to_value(WorkerEvent::Progress { step: 2, total: 8 }).unwrap();
        assert_eq!(progress, json!({"type": "progress", "step": 2, "total": 8}));

        let status = serde_json::to_value(WorkerEvent::status("Separating stems...")).unwrap();
        assert_eq!(status, json!({"type": "status", "text": "Separating stems..."}));

        let error = serde_json::to_value(WorkerEvent::error("boom")).unwrap();
        assert_eq!(error, json!({"type": "error", "message": "boom"}));
    }

    #[test]
    fn test_done_serializes_tracks_as_ordered_map() {
        let mut tracks = Tracks::new();
        tracks.insert("vocals", TransferBuffer::new(vec![1, 2]));
        tracks.insert("drums", TransferBuffer::new(vec![3]));

        let text = serde_json::to_string(&WorkerEvent::Done { tracks }).unwrap();
        assert_eq!(text, r#"{"type":"done","tracks":{"vocals":[1,2],"drums":[3]}}"#);
    }

    #[test]
    fn test_separate_request_wire_form() {
        let raw_audio = RawAudio::new(vec![vec![0.5], vec![-0.5]], 44100).unwrap();
        let value = serde_json::to_value(WorkerRequest::Separate { raw_audio }).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "separate",
                "rawAudio": {"channelData": [[0.5], [-0.5]], "sampleRate": 44100}
            })
        );
    }

    #[test]
    fn test_only_done_and_error_are_terminal() {
        assert!(!WorkerEvent::status("x").is_terminal());
        assert!(!WorkerEvent::Progress { step: 1, total: 1 }.is_terminal());
        assert!(WorkerEvent::error("x").is_terminal());
        assert!(WorkerEvent::Done {
            tracks: Tracks::new()
        }
        .is_terminal());
    }
}

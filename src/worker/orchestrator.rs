//! Job Orchestrator
//!
//! Runs one separation job at a time on the worker:
//! acquire session -> infer with progress -> encode stems -> `done`.
//! Any failure becomes a single `error` event and the orchestrator goes
//! back to `Idle`, ready for the next request.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;

use super::sink::EventSink;
use super::state::JobState;
use crate::audio::{AudioEncoder, RawAudio};
use crate::error::{DemixError, Result};
use crate::model::{ModelCacheManager, ModelSource};
use crate::neural::{InferenceSession, SeparationModel};
use crate::protocol::{Tracks, TransferBuffer, WorkerEvent, WorkerRequest};

pub const STATUS_DOWNLOADING: &str = "Downloading model (cached after first use)...";
pub const STATUS_INITIALIZING: &str = "Initializing runtime...";
pub const STATUS_SEPARATING: &str = "Separating stems...";

pub struct JobOrchestrator<M: SeparationModel> {
    model: Arc<M>,
    session: InferenceSession<M::Handle>,
    models: ModelCacheManager,
    source: ModelSource,
    encoder: Arc<dyn AudioEncoder>,
    state: JobState,
}

impl<M: SeparationModel> JobOrchestrator<M> {
    pub fn new(
        model: Arc<M>,
        models: ModelCacheManager,
        source: ModelSource,
        encoder: Arc<dyn AudioEncoder>,
    ) -> Self {
        Self {
            model,
            session: InferenceSession::new(),
            models,
            source,
            encoder,
            state: JobState::Idle,
        }
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    pub fn session(&self) -> &InferenceSession<M::Handle> {
        &self.session
    }

    /// Serve requests until the control side closes the channel
    pub async fn run(
        mut self,
        mut requests: mpsc::UnboundedReceiver<WorkerRequest>,
        events: EventSink,
    ) {
        tracing::info!(backend = self.model.name(), "Worker started");
        while let Some(request) = requests.recv().await {
            match request {
                WorkerRequest::Separate { raw_audio } => {
                    if let Err(e) = self.on_job_request(raw_audio, &events).await {
                        tracing::error!(error = %e, "Rejected separation request");
                    }
                }
            }
        }
        tracing::info!("Worker stopped: channel closed");
    }

    /// Run one job to completion, sending exactly one `done` or `error`.
    ///
    /// Returns `Err` only when the request is refused because another job
    /// is active. Job failures are reported on `events` instead.
    pub async fn on_job_request(&mut self, raw_audio: RawAudio, events: &EventSink) -> Result<()> {
        if !self.state.is_idle() {
            return Err(DemixError::JobAlreadyActive {
                state: self.state.to_string(),
            });
        }

        tracing::info!(
            channels = raw_audio.num_channels(),
            sample_rate = raw_audio.sample_rate(),
            samples = raw_audio.num_frames(),
            duration = %format!("{:.1}s", raw_audio.duration_secs()),
            "Received audio for separation"
        );
        let start = Instant::now();

        match self.process(raw_audio, events).await {
            Ok(tracks) => {
                self.transition(JobState::Done);
                tracing::info!(
                    stems = tracks.len(),
                    total_mb = %format!("{:.1}", tracks.total_bytes() as f64 / (1024.0 * 1024.0)),
                    elapsed_secs = %format!("{:.1}", start.elapsed().as_secs_f64()),
                    "Results sent to control thread"
                );
                events.send(WorkerEvent::Done { tracks });
            }
            Err(e) => {
                tracing::error!(state = %self.state, error = %e, "Separation job failed");
                self.transition(JobState::Failed);
                events.send(WorkerEvent::error(e.to_string()));
            }
        }

        self.transition(JobState::Idle);
        Ok(())
    }

    async fn process(&mut self, raw_audio: RawAudio, events: &EventSink) -> Result<Tracks> {
        self.transition(JobState::Acquiring);
        let handle = self.ensure_session(events).await?;

        self.transition(JobState::Inferring);
        events.status(STATUS_SEPARATING);
        let start = Instant::now();

        let mut guard = ProgressGuard::default();
        let progress_events = events.clone();
        let mut on_progress = |step: u32, total: u32| {
            if guard.admit(step, total) {
                tracing::debug!(step, total, "Progress");
                progress_events.send(WorkerEvent::Progress { step, total });
            }
        };
        let stems = self
            .model
            .separate(&*handle, raw_audio, &mut on_progress)
            .await?;
        tracing::info!(
            elapsed_secs = %format!("{:.1}", start.elapsed().as_secs_f64()),
            stems = ?stems.names(),
            "Separation complete"
        );

        self.transition(JobState::Encoding);
        let mut tracks = Tracks::new();
        for (name, audio) in stems {
            let encoded = self
                .encoder
                .encode(audio.channels(), audio.sample_rate())
                .map_err(|e| encoding_error(e, &name))?;
            tracing::info!(
                stem = %name,
                size_mb = %format!("{:.1}", encoded.len() as f64 / (1024.0 * 1024.0)),
                "Encoded stem"
            );
            tracks.insert(name, TransferBuffer::from(encoded));
        }
        Ok(tracks)
    }

    /// Session handle, acquiring weights and initializing on first use
    async fn ensure_session(&self, events: &EventSink) -> Result<Arc<M::Handle>> {
        let model = &self.model;
        let models = &self.models;
        let source = &self.source;

        self.session
            .get_or_init(|| async move {
                events.status(STATUS_DOWNLOADING);
                let weights = models.acquire(source).await?;

                events.status(STATUS_INITIALIZING);
                let start = Instant::now();
                let handle = model.initialize(weights).await?;
                tracing::info!(
                    backend = model.name(),
                    elapsed_secs = %format!("{:.1}", start.elapsed().as_secs_f64()),
                    "Model initialized"
                );
                Ok(handle)
            })
            .await
    }

    fn transition(&mut self, next: JobState) {
        if !self.state.can_transition_to(next) {
            tracing::warn!(from = %self.state, to = %next, "Unexpected job state transition");
        }
        tracing::debug!(from = %self.state, to = %next, "Job state");
        self.state = next;
    }
}

/// Attach the stem name to an encoder failure
fn encoding_error(err: DemixError, stem: &str) -> DemixError {
    let reason = match err {
        DemixError::Encoding { reason, .. } => reason,
        other => other.to_string(),
    };
    DemixError::Encoding {
        stem: stem.to_string(),
        reason,
    }
}

/// Keeps the outbound progress stream within `0 < step <= total`, with a
/// fixed `total` and non-decreasing `step`
#[derive(Debug, Default)]
struct ProgressGuard {
    last_step: u32,
    total: Option<u32>,
}

impl ProgressGuard {
    fn admit(&mut self, step: u32, total: u32) -> bool {
        let in_range = step > 0 && step <= total;
        let ordered = step >= self.last_step;
        let same_total = self.total.map_or(true, |t| t == total);
        if !(in_range && ordered && same_total) {
            tracing::warn!(step, total, last_step = self.last_step, "Dropping invalid progress report");
            return false;
        }
        self.last_step = step;
        self.total = Some(total);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::WavCodec;
    use crate::model::{FetchResponse, Fetcher, MemoryCache};
    use crate::neural::MockSeparator;
    use async_trait::async_trait;
    use bytes::Bytes;
    use pretty_assertions::assert_eq;

    const URL: &str = "https://example.com/htdemucs.onnx";

    struct OkFetcher;

    #[async_trait]
    impl Fetcher for OkFetcher {
        async fn fetch(&self, _url: &str) -> Result<FetchResponse> {
            Ok(FetchResponse::new(200, Some(64), Bytes::from(vec![1u8; 64])))
        }
    }

    struct BrokenEncoder;

    impl AudioEncoder for BrokenEncoder {
        fn encode(&self, _channels: &[Vec<f32>], _sample_rate: u32) -> Result<Vec<u8>> {
            Err(DemixError::Encoding {
                stem: String::new(),
                reason: "disk full".to_string(),
            })
        }
    }

    fn orchestrator(
        model: MockSeparator,
        encoder: Arc<dyn AudioEncoder>,
    ) -> JobOrchestrator<MockSeparator> {
        let models = ModelCacheManager::new(Arc::new(MemoryCache::new()), Arc::new(OkFetcher));
        JobOrchestrator::new(Arc::new(model), models, ModelSource::new(URL, 16), encoder)
    }

    fn stereo(frames: usize) -> RawAudio {
        RawAudio::new(vec![vec![0.25; frames], vec![-0.25; frames]], 44100).unwrap()
    }

    fn drain(receiver: &mut mpsc::UnboundedReceiver<WorkerEvent>) -> Vec<WorkerEvent> {
        let mut events = Vec::new();
        while let Ok(event) = receiver.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_first_job_narrates_initialization() {
        let mut worker = orchestrator(
            MockSeparator::new().with_segment_frames(10),
            Arc::new(WavCodec::new()),
        );
        let (sink, mut receiver) = EventSink::channel();

        worker.on_job_request(stereo(20), &sink).await.unwrap();
        let events = drain(&mut receiver);

        assert_eq!(
            &events[..5],
            &[
                WorkerEvent::status(STATUS_DOWNLOADING),
                WorkerEvent::status(STATUS_INITIALIZING),
                WorkerEvent::status(STATUS_SEPARATING),
                WorkerEvent::Progress { step: 1, total: 2 },
                WorkerEvent::Progress { step: 2, total: 2 },
            ][..]
        );
        match &events[5] {
            WorkerEvent::Done { tracks } => {
                assert_eq!(tracks.names(), vec!["drums", "bass", "other", "vocals"]);
            }
            other => panic!("expected done, got {:?}", other),
        }
        assert_eq!(events.len(), 6);
        assert_eq!(worker.state(), JobState::Idle);
    }

    #[tokio::test]
    async fn test_second_job_reuses_session() {
        let mut worker = orchestrator(MockSeparator::new(), Arc::new(WavCodec::new()));
        let (sink, mut receiver) = EventSink::channel();

        worker.on_job_request(stereo(8), &sink).await.unwrap();
        drain(&mut receiver);
        worker.on_job_request(stereo(8), &sink).await.unwrap();
        let kinds: Vec<_> = drain(&mut receiver).iter().map(WorkerEvent::kind).collect();

        assert_eq!(kinds, vec!["status", "progress", "done"]);
        assert_eq!(worker.model.initialization_count(), 1);
    }

    #[tokio::test]
    async fn test_encoding_failure_names_stem() {
        let mut worker = orchestrator(MockSeparator::new(), Arc::new(BrokenEncoder));
        let (sink, mut receiver) = EventSink::channel();

        worker.on_job_request(stereo(8), &sink).await.unwrap();
        let events = drain(&mut receiver);

        assert_eq!(
            events.last(),
            Some(&WorkerEvent::error("Failed to encode stem 'drums': disk full"))
        );
        assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);
        assert_eq!(worker.state(), JobState::Idle);
    }

    #[tokio::test]
    async fn test_failed_initialization_is_retried_by_next_job() {
        let mut worker = orchestrator(
            MockSeparator::new().with_failing_initializations(1),
            Arc::new(WavCodec::new()),
        );
        let (sink, mut receiver) = EventSink::channel();

        worker.on_job_request(stereo(8), &sink).await.unwrap();
        let first = drain(&mut receiver);
        assert!(matches!(first.last(), Some(WorkerEvent::Error { .. })));
        assert!(!worker.session().is_initialized());

        worker.on_job_request(stereo(8), &sink).await.unwrap();
        let second = drain(&mut receiver);
        assert_eq!(second[0], WorkerEvent::status(STATUS_DOWNLOADING));
        assert!(matches!(second.last(), Some(WorkerEvent::Done { .. })));
        assert_eq!(worker.model.initialization_count(), 2);
    }

    #[tokio::test]
    async fn test_mono_reaching_worker_fails_cleanly() {
        let mut worker = orchestrator(MockSeparator::new(), Arc::new(WavCodec::new()));
        let (sink, mut receiver) = EventSink::channel();
        let mono = RawAudio::new(vec![vec![0.0; 8]], 44100).unwrap();

        worker.on_job_request(mono, &sink).await.unwrap();

        assert_eq!(
            drain(&mut receiver).last(),
            Some(&WorkerEvent::error("Separation failed: expected 2 channels, got 1"))
        );
    }

    #[test]
    fn test_progress_guard_drops_invalid_reports() {
        let mut guard = ProgressGuard::default();

        assert!(!guard.admit(0, 3));
        assert!(guard.admit(1, 3));
        assert!(!guard.admit(4, 3));
        assert!(guard.admit(2, 3));
        assert!(!guard.admit(1, 3));
        assert!(!guard.admit(3, 5));
        assert!(guard.admit(3, 3));
    }
}

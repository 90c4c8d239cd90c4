//! Control Thread Controller
//!
//! Owns the worker, turns a selected file into a `separate` request and
//! renders the events that stream back.

use std::sync::Arc;

use super::view::{ControlView, StemArtifact};
use crate::audio::AudioDecoder;
use crate::error::{DemixError, Result};
use crate::protocol::{WorkerEvent, WorkerRequest};
use crate::worker::WorkerHandle;

pub const STATUS_DONE: &str = "Done! Listen to the separated stems below.";
pub const STATUS_WORKER_STOPPED: &str = "Worker stopped unexpectedly";

/// How a dispatched job ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Completed { stems: usize },
    Failed { message: String },
}

pub struct Controller<V: ControlView> {
    worker: WorkerHandle,
    decoder: Arc<dyn AudioDecoder>,
    view: V,
    in_flight: bool,
    last_outcome: Option<JobOutcome>,
}

impl<V: ControlView> Controller<V> {
    pub fn new(worker: WorkerHandle, decoder: Arc<dyn AudioDecoder>, view: V) -> Self {
        Self {
            worker,
            decoder,
            view,
            in_flight: false,
            last_outcome: None,
        }
    }

    pub fn view(&self) -> &V {
        &self.view
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    /// Decode `bytes` and send them to the worker.
    ///
    /// Returns `Ok(false)` when the file could not be decoded; the view
    /// shows the reason and nothing is sent.
    ///
    /// # Errors
    /// * `JobInFlight` - the previous job has not finished
    /// * `WorkerUnavailable` - the worker is gone
    pub fn select_file(&mut self, name: &str, bytes: &[u8]) -> Result<bool> {
        if self.in_flight {
            return Err(DemixError::JobInFlight);
        }

        tracing::info!(
            file = name,
            size_mb = %format!("{:.1}", bytes.len() as f64 / (1024.0 * 1024.0)),
            "File selected"
        );
        self.view.set_status(&format!("Decoding \"{}\"...", name));
        self.view.clear_stems();
        self.view.hide_progress();

        let audio = match self.decoder.decode(bytes) {
            Ok(audio) => audio,
            Err(e) => {
                tracing::warn!(file = name, error = %e, "Decode failed");
                self.view.set_status(&format!("Error decoding audio: {}", e));
                return Ok(false);
            }
        };
        tracing::info!(
            channels = audio.num_channels(),
            sample_rate = audio.sample_rate(),
            duration = %format!("{:.1}s", audio.duration_secs()),
            samples = audio.num_frames(),
            "Audio decoded"
        );

        let raw_audio = audio.into_stereo();
        if let Err(e) = self.worker.post(WorkerRequest::Separate { raw_audio }) {
            self.view.set_status(STATUS_WORKER_STOPPED);
            return Err(e);
        }
        tracing::debug!("Audio sent to worker");
        self.in_flight = true;
        self.last_outcome = None;
        Ok(true)
    }

    /// Render one worker event. Returns whether it ended the job.
    pub fn handle_event(&mut self, event: WorkerEvent) -> bool {
        tracing::debug!(kind = event.kind(), "Worker message");
        match event {
            WorkerEvent::Status { text } => {
                self.view.set_status(&text);
                false
            }
            WorkerEvent::Progress { step, total } => {
                self.view
                    .set_status(&format!("Separating stems... ({}/{})", step, total));
                self.view.show_progress(f64::from(step) / f64::from(total));
                false
            }
            WorkerEvent::Done { tracks } => {
                self.view.hide_progress();
                self.view.set_status(STATUS_DONE);
                tracing::info!(stems = ?tracks.names(), "Stems received");

                let artifacts: Vec<StemArtifact> = tracks
                    .into_iter()
                    .map(|(name, data)| StemArtifact::new(name, data))
                    .collect();
                self.finish(JobOutcome::Completed {
                    stems: artifacts.len(),
                });
                self.view.show_stems(artifacts);
                true
            }
            WorkerEvent::Error { message } => {
                self.view.hide_progress();
                tracing::error!(message = %message, "Worker error");
                self.view.set_status(&format!("Error: {}", message));
                self.finish(JobOutcome::Failed { message });
                true
            }
        }
    }

    /// Block until the in-flight job ends
    ///
    /// # Errors
    /// * `WorkerUnavailable` - no job is in flight, or the worker exited
    ///   before sending a terminal message
    pub fn run_to_completion(&mut self) -> Result<JobOutcome> {
        if !self.in_flight {
            return self.last_outcome.clone().ok_or_else(|| DemixError::WorkerUnavailable {
                reason: "no job has been dispatched".to_string(),
            });
        }

        while self.in_flight {
            match self.worker.blocking_recv() {
                Some(event) => {
                    self.handle_event(event);
                }
                None => {
                    self.in_flight = false;
                    self.view.hide_progress();
                    self.view.set_status(STATUS_WORKER_STOPPED);
                    return Err(DemixError::WorkerUnavailable {
                        reason: "event channel closed before the job finished".to_string(),
                    });
                }
            }
        }

        self.last_outcome.clone().ok_or_else(|| DemixError::WorkerUnavailable {
            reason: "job ended without an outcome".to_string(),
        })
    }

    /// Stop the worker and hand back the view
    pub fn shutdown(self) -> Result<V> {
        self.worker.shutdown()?;
        Ok(self.view)
    }

    fn finish(&mut self, outcome: JobOutcome) {
        self.in_flight = false;
        self.last_outcome = Some(outcome);
    }
}

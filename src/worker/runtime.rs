//! Worker thread and the control-side handle to it
//!
//! The worker owns a current-thread `tokio` runtime on a dedicated OS
//! thread. Requests and events travel over unbounded channels as owned
//! messages, so sending a buffer gives it up.

use std::thread::JoinHandle;

use tokio::sync::mpsc;

use super::orchestrator::JobOrchestrator;
use super::sink::EventSink;
use crate::error::{DemixError, Result};
use crate::neural::SeparationModel;
use crate::protocol::{WorkerEvent, WorkerRequest};

pub const WORKER_THREAD_NAME: &str = "demix-worker";

/// Control-side end of a running worker
///
/// Dropping the handle closes the request channel and joins the thread.
pub struct WorkerHandle {
    requests: Option<mpsc::UnboundedSender<WorkerRequest>>,
    events: mpsc::UnboundedReceiver<WorkerEvent>,
    thread: Option<JoinHandle<()>>,
}

impl WorkerHandle {
    /// Start `orchestrator` on its own thread
    pub fn spawn<M>(orchestrator: JobOrchestrator<M>) -> Result<Self>
    where
        M: SeparationModel + 'static,
    {
        let (request_tx, request_rx) = mpsc::unbounded_channel();
        let (sink, events) = EventSink::channel();

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        let thread = std::thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || runtime.block_on(orchestrator.run(request_rx, sink)))?;

        tracing::debug!(thread = WORKER_THREAD_NAME, "Spawned worker");
        Ok(Self {
            requests: Some(request_tx),
            events,
            thread: Some(thread),
        })
    }

    /// Queue a request. The message, and the buffers in it, move to the
    /// worker.
    pub fn post(&self, request: WorkerRequest) -> Result<()> {
        let sender = self.requests.as_ref().ok_or_else(|| DemixError::WorkerUnavailable {
            reason: "worker has been shut down".to_string(),
        })?;
        sender.send(request).map_err(|_| DemixError::WorkerUnavailable {
            reason: "worker stopped accepting requests".to_string(),
        })
    }

    /// Next event, or `None` once the worker has exited. Must not be
    /// called from inside an async runtime.
    pub fn blocking_recv(&mut self) -> Option<WorkerEvent> {
        self.events.blocking_recv()
    }

    /// Close the request channel and wait for the worker to finish its
    /// current job and exit
    pub fn shutdown(mut self) -> Result<()> {
        self.stop()
    }

    fn stop(&mut self) -> Result<()> {
        self.requests.take();
        if let Some(thread) = self.thread.take() {
            thread.join().map_err(|_| DemixError::WorkerUnavailable {
                reason: "worker thread panicked".to_string(),
            })?;
            tracing::debug!(thread = WORKER_THREAD_NAME, "Worker joined");
        }
        Ok(())
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            tracing::warn!(error = %e, "Worker did not shut down cleanly");
        }
    }
}

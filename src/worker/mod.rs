//! Worker side of the job pipeline
//!
//! This module provides:
//! - `JobOrchestrator`: one job at a time, acquisition through encoding
//! - `JobState`: the job lifecycle
//! - `WorkerHandle`: the worker thread and its channels
//! - `EventSink`: the worker's outbound channel

mod orchestrator;
mod runtime;
mod sink;
mod state;

pub use orchestrator::{
    JobOrchestrator, STATUS_DOWNLOADING, STATUS_INITIALIZING, STATUS_SEPARATING,
};
pub use runtime::{WorkerHandle, WORKER_THREAD_NAME};
pub use sink::EventSink;
pub use state::JobState;

//! Demix - on-device music source separation
//!
//! Demix splits a song into stems (vocals, drums, bass, other) with a
//! separation model that runs entirely on the local machine.
//!
//! # Architecture
//!
//! Two execution contexts talk over typed channels:
//! - Control thread: the [`control::Controller`] decodes the input, sends a
//!   `separate` request and renders the events that stream back
//! - Worker thread: the [`worker::JobOrchestrator`] acquires the model
//!   weights through the durable cache, initializes the inference session
//!   once, runs separation with progress and encodes each stem
//!
//! Sample and stem buffers move across the boundary; they are never copied.

pub mod audio;
pub mod cli;
pub mod config;
pub mod control;
pub mod error;
pub mod model;
pub mod neural;
pub mod protocol;
pub mod worker;

pub use error::{DemixError, Result};

//! Control side of the job pipeline
//!
//! This module provides:
//! - `Controller`: worker lifecycle, decode and dispatch, event rendering
//! - `ControlView` / `StemArtifact`: the rendering seam

mod controller;
mod view;

pub use controller::{Controller, JobOutcome, STATUS_DONE, STATUS_WORKER_STOPPED};
pub use view::{ControlView, StemArtifact, STEM_MIME_TYPE};

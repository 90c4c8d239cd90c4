//! Separation model interfaces and implementations
//!
//! This module provides:
//! - `SeparationModel` trait for all separation backends
//! - `InferenceSession`: memoized single-flight initialization
//! - Mock backend for testing and offline runs

mod mock;
mod model;
mod session;

pub use mock::{MockSeparator, MockSession, DEFAULT_STEMS};
pub use model::{SeparationModel, StemSet};
pub use session::InferenceSession;

//! Control <-> worker message protocol
//!
//! Messages own their payloads. Sending a request or event moves its
//! buffers to the receiving side, so the sender cannot touch them again.

mod envelope;
mod transfer;

pub use envelope::{WorkerEvent, WorkerRequest};
pub use transfer::{Tracks, TransferBuffer};

//! Single-flight inference session
//!
//! The first caller runs the initializer. Callers arriving while it is
//! pending wait on that same attempt and share its outcome, success or
//! failure. A failed attempt is not stored as a result, so a caller that
//! arrives after it has finished starts a fresh one.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{Mutex, OnceCell};

use crate::error::{DemixError, Result};

pub struct InferenceSession<H> {
    cell: OnceCell<Arc<H>>,
    attempt: Mutex<FailedAttempts>,
    // Mirrors `FailedAttempts::count` for callers not holding the lock
    failures: AtomicU64,
}

#[derive(Default)]
struct FailedAttempts {
    count: u64,
    last: Option<Arc<DemixError>>,
}

impl<H> Default for InferenceSession<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H> InferenceSession<H> {
    pub fn new() -> Self {
        Self {
            cell: OnceCell::new(),
            attempt: Mutex::new(FailedAttempts::default()),
            failures: AtomicU64::new(0),
        }
    }

    /// Return the handle, running `init` only if no handle exists yet and
    /// no attempt is already pending
    ///
    /// # Errors
    /// A failed attempt is returned as `DemixError::Shared` to the caller
    /// that ran it and to every caller that was waiting on it.
    pub async fn get_or_init<F, Fut>(&self, init: F) -> Result<Arc<H>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<H>>,
    {
        if let Some(handle) = self.cell.get() {
            return Ok(Arc::clone(handle));
        }

        let seen = self.failures.load(Ordering::Acquire);
        let mut attempt = self.attempt.lock().await;

        if let Some(handle) = self.cell.get() {
            return Ok(Arc::clone(handle));
        }
        if attempt.count != seen {
            // The attempt we queued behind failed
            if let Some(err) = &attempt.last {
                return Err(DemixError::Shared(Arc::clone(err)));
            }
        }

        match init().await {
            Ok(handle) => {
                let handle = Arc::new(handle);
                // Only the lock holder sets the cell, so it is still empty
                let _ = self.cell.set(Arc::clone(&handle));
                attempt.last = None;
                Ok(handle)
            }
            Err(e) => {
                let err = Arc::new(e);
                attempt.count += 1;
                attempt.last = Some(Arc::clone(&err));
                self.failures.store(attempt.count, Ordering::Release);
                Err(DemixError::Shared(err))
            }
        }
    }

    /// The handle, if initialization has already succeeded
    pub fn get(&self) -> Option<Arc<H>> {
        self.cell.get().cloned()
    }

    pub fn is_initialized(&self) -> bool {
        self.cell.initialized()
    }
}

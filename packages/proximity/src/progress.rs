//! Progress reporting for the chunked distance computation.
//!
//! The engine advances a [`ProgressCallback`] once per subject chunk. The
//! CLI renders it with `indicatif`; library callers and tests pass
//! [`null_progress`].

use std::sync::Arc;

/// Receives progress updates from a long-running proximity computation.
pub trait ProgressCallback: Send + Sync {
    /// Set the total number of subjects to be scored.
    fn set_total(&self, total: u64);

    /// Advance by `delta` subjects.
    fn inc(&self, delta: u64);

    /// Update the label shown next to the indicator.
    fn set_message(&self, msg: String);

    /// Mark the computation complete.
    fn finish(&self, msg: String);
}

/// A [`ProgressCallback`] that discards every update.
pub struct NullProgress;

impl ProgressCallback for NullProgress {
    fn set_total(&self, _total: u64) {}
    fn inc(&self, _delta: u64) {}
    fn set_message(&self, _msg: String) {}
    fn finish(&self, _msg: String) {}
}

/// Returns a shared [`NullProgress`].
#[must_use]
pub fn null_progress() -> Arc<dyn ProgressCallback> {
    Arc::new(NullProgress)
}

//! Shared processed/failed counters and the background progress reporter.

use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::error::PipelineError;
use crate::pipeline::signal::StopSignal;

/// A point-in-time copy of the counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgressSnapshot {
    /// Rows whose embedding the writer has stored.
    pub written: u64,
    /// Rows whose embedding call failed.
    pub failed: u64,
}

/// Counters updated by the writer (written) and the workers (failed).
#[derive(Debug, Default)]
pub struct ProgressCounter {
    counts: Mutex<ProgressSnapshot>,
}

impl ProgressCounter {
    pub fn record_written(&self) {
        self.lock().written += 1;
    }

    pub fn record_failed(&self) {
        self.lock().failed += 1;
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        *self.lock()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ProgressSnapshot> {
        self.counts.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Human-readable progress line.
pub fn format_progress(snapshot: ProgressSnapshot, total: u64) -> String {
    if snapshot.failed == 0 {
        format!("Processed {}/{} sentences.", snapshot.written, total)
    } else {
        format!(
            "Processed {}/{} sentences ({} failed).",
            snapshot.written, total, snapshot.failed
        )
    }
}

/// Start the reporter thread. It logs a progress line every `interval` until
/// `stop` is set.
pub(crate) fn spawn_reporter(
    total: u64,
    counter: Arc<ProgressCounter>,
    stop: Arc<StopSignal>,
    interval: Duration,
) -> Result<JoinHandle<()>, PipelineError> {
    thread::Builder::new()
        .name("embed-progress".into())
        .spawn(move || {
            while !stop.wait_timeout(interval) {
                let snapshot = counter.snapshot();
                tracing::info!(
                    written = snapshot.written,
                    failed = snapshot.failed,
                    total,
                    "{}",
                    format_progress(snapshot, total)
                );
            }
        })
        .map_err(|source| PipelineError::Spawn {
            name: "progress reporter",
            source,
        })
}

//! Concurrent sentence-embedding pipeline.
//!
//! ```text
//!  cursor ──rows──▶ worker pool ──WorkItem──▶ bounded queue ──▶ writer ──▶ SQLite
//!  (coordinator)    (N threads)                                (1 thread)
//!                                    progress reporter reads the counters
//! ```
//!
//! The coordinator is the only thread that advances the read cursor; it hands
//! rows to the workers over a small bounded channel. Only the writer thread
//! issues UPDATE statements. See [`run_pipeline`] for the shutdown order.

pub mod progress;
pub mod queue;
pub mod signal;
pub mod workers;
pub mod writer;

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Context, Result};
use crossbeam_channel::bounded;

use crate::config::BookvecConfig;
use crate::db::{self, migrations};
use crate::embedding::EmbeddingProvider;
use crate::error::{EmbeddingError, PipelineError};
use crate::library::sentences::RowSource;
use crate::pipeline::progress::ProgressCounter;
use crate::pipeline::queue::{work_queue, QueueProducer, DEFAULT_QUEUE_CAPACITY};
use crate::pipeline::signal::StopSignal;
use crate::pipeline::workers::{run_worker, DimensionGuard};

/// Upper bound on worker threads for one run.
pub const MAX_WORKERS: usize = 256;

/// Upper bound on the work queue capacity. Channel buffers are allocated up front.
pub const MAX_QUEUE_CAPACITY: usize = 100_000;

/// Knobs for one pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Neighbouring sentences on each side included in the embedded text.
    pub context_window: usize,
    pub workers: usize,
    pub queue_capacity: usize,
    pub progress_interval: Duration,
    /// Expected vector length; `None` accepts whatever the first vector has.
    pub dimensions: Option<usize>,
    /// Set (e.g. by a SIGINT handler) to stop dispatching new rows.
    pub cancel: Option<Arc<AtomicBool>>,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self::from_config(&BookvecConfig::default())
    }
}

impl PipelineOptions {
    pub fn from_config(config: &BookvecConfig) -> Self {
        Self {
            context_window: config.pipeline.context_window,
            workers: config.pipeline.resolved_workers(),
            queue_capacity: if config.pipeline.queue_capacity == 0 {
                DEFAULT_QUEUE_CAPACITY
            } else {
                config.pipeline.queue_capacity
            },
            progress_interval: config.pipeline.progress_interval(),
            dimensions: config.embedding.dimensions,
            cancel: None,
        }
    }

    /// Worker count and queue capacity, clamped to `1..=MAX_WORKERS` and
    /// `1..=MAX_QUEUE_CAPACITY`.
    fn bounded_sizes(&self) -> (usize, usize) {
        let workers = self.workers.clamp(1, MAX_WORKERS);
        let capacity = self.queue_capacity.clamp(1, MAX_QUEUE_CAPACITY);
        if workers != self.workers || capacity != self.queue_capacity {
            tracing::warn!(
                requested_workers = self.workers,
                requested_queue_capacity = self.queue_capacity,
                workers,
                queue_capacity = capacity,
                "pipeline sizes out of range, clamped"
            );
        }
        (workers, capacity)
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::SeqCst))
    }
}

/// A sentence whose embedding call failed. The row stays NULL and is picked
/// up again by the next run.
#[derive(Debug)]
pub struct RowFailure {
    pub sentence_id: i64,
    pub error: EmbeddingError,
}

/// Outcome of a completed run.
#[derive(Debug, Default)]
pub struct PipelineReport {
    /// Pending rows at start.
    pub total: u64,
    /// Rows the writer stored.
    pub written: u64,
    pub failures: Vec<RowFailure>,
    /// The run was interrupted before every row was dispatched.
    pub cancelled: bool,
}

impl PipelineReport {
    /// Every pending row was embedded and stored.
    pub fn is_success(&self) -> bool {
        self.failures.is_empty() && !self.cancelled
    }

    /// Ids of the failed sentences, ascending.
    pub fn failed_ids(&self) -> Vec<i64> {
        let mut ids: Vec<i64> = self.failures.iter().map(|f| f.sentence_id).collect();
        ids.sort_unstable();
        ids
    }
}

struct DispatchOutcome {
    failures: Vec<RowFailure>,
    cancelled: bool,
}

/// Embed every sentence of the database at `db_path` whose embedding is NULL.
///
/// Startup: open the database and count pending rows, start the writer, start
/// the progress reporter, stream rows through the worker pool. Shutdown: once
/// every worker has returned, set the stop signal and join the writer (which
/// drains the queue first) and the reporter. Connections are closed only
/// after those joins.
///
/// Per-row embedding failures are reported in [`PipelineReport::failures`].
/// Storage failures and thread panics abort the run with [`PipelineError`].
pub fn run_pipeline(
    db_path: &Path,
    provider: &dyn EmbeddingProvider,
    options: &PipelineOptions,
) -> Result<PipelineReport> {
    let read_conn = db::open_database(db_path).context("failed to open database")?;

    let stored_model = migrations::get_embedding_model(&read_conn).map_err(PipelineError::from)?;
    let mut expected_dims = options.dimensions;
    if let Some(stored) = stored_model.as_deref() {
        if stored == provider.model() {
            expected_dims = expected_dims.or(migrations::get_embedding_dimensions(&read_conn)
                .map_err(PipelineError::from)?);
        } else {
            tracing::warn!(
                stored,
                configured = provider.model(),
                "existing embeddings were produced by a different model"
            );
        }
    }

    let source = RowSource::new(&read_conn, options.context_window);
    let total = source.total_pending().map_err(PipelineError::from)?;
    let (workers, queue_capacity) = options.bounded_sizes();
    tracing::info!(
        total,
        workers,
        queue_capacity,
        context_window = options.context_window,
        model = provider.model(),
        "starting embedding pipeline"
    );

    let write_conn = db::open_connection(db_path).context("failed to open writer connection")?;

    let stop = Arc::new(StopSignal::new());
    let counter = Arc::new(ProgressCounter::default());
    let (producer, consumer) = work_queue(queue_capacity);

    let writer = writer::spawn_writer(
        write_conn,
        consumer,
        Arc::clone(&stop),
        Arc::clone(&counter),
        writer::WRITER_POLL,
    )?;
    let reporter = match progress::spawn_reporter(
        total,
        Arc::clone(&counter),
        Arc::clone(&stop),
        options.progress_interval,
    ) {
        Ok(handle) => handle,
        Err(e) => {
            drop(producer);
            stop.set();
            let _ = writer.join();
            return Err(e.into());
        }
    };

    let dims = DimensionGuard::new(expected_dims);
    let dispatched = thread::scope(|scope| {
        dispatch(scope, &source, provider, producer, &counter, &dims, workers, options)
    });

    // Every worker has returned: nothing else can enter the queue.
    stop.set();
    let writer_result = join("writer", writer);
    let reporter_result = join("progress reporter", reporter);

    let write_conn = writer_result??;
    reporter_result?;
    let outcome = dispatched?;

    let written = counter.snapshot().written;
    if written > 0 {
        if let Some(dims) = dims.observed() {
            migrations::set_embedding_model(&write_conn, provider.model(), dims)
                .map_err(PipelineError::from)?;
        }
    }
    db::close_connection(write_conn)?;
    drop(source);
    db::close_connection(read_conn)?;

    let report = PipelineReport {
        total,
        written,
        failures: outcome.failures,
        cancelled: outcome.cancelled,
    };
    log_summary(&report);
    Ok(report)
}

/// Stream rows from the cursor to the worker pool and wait for every worker.
#[allow(clippy::too_many_arguments)]
fn dispatch<'scope, 'env>(
    scope: &'scope thread::Scope<'scope, 'env>,
    source: &'env RowSource<'env>,
    provider: &'env dyn EmbeddingProvider,
    producer: QueueProducer,
    counter: &'env ProgressCounter,
    dims: &'env DimensionGuard,
    workers: usize,
    options: &'env PipelineOptions,
) -> Result<DispatchOutcome, PipelineError> {
    let (row_tx, row_rx) = bounded(workers.saturating_mul(2));

    let mut handles = Vec::with_capacity(workers);
    for worker_id in 0..workers {
        let rows = row_rx.clone();
        let queue = producer.clone();
        let handle = thread::Builder::new()
            .name(format!("embed-worker-{worker_id}"))
            .spawn_scoped(scope, move || {
                run_worker(worker_id, rows, queue, provider, counter, dims)
            })
            .map_err(|source| PipelineError::Spawn {
                name: "embedding worker",
                source,
            })?;
        handles.push(handle);
    }
    // Workers hold the only remaining clones.
    drop(row_rx);
    drop(producer);

    let mut cancelled = false;
    let mut cursor_error = None;
    let mut pending = source.pending_rows()?;
    for row in pending.iter()? {
        if options.is_cancelled() {
            tracing::warn!("interrupted, no new rows will be dispatched");
            cancelled = true;
            break;
        }
        let sentence = match row {
            Ok(sentence) => sentence,
            Err(e) => {
                cursor_error = Some(e);
                break;
            }
        };
        if row_tx.send(sentence).is_err() {
            // All workers exited early, which only happens when the writer is gone.
            break;
        }
    }
    drop(row_tx);

    let mut failures = Vec::new();
    let mut panicked = false;
    for handle in handles {
        match handle.join() {
            Ok(outcome) => failures.extend(outcome.failures),
            Err(_) => panicked = true,
        }
    }

    if let Some(e) = cursor_error {
        return Err(e.into());
    }
    if panicked {
        return Err(PipelineError::ThreadPanicked("embedding worker"));
    }

    Ok(DispatchOutcome { failures, cancelled })
}

fn join<T>(name: &'static str, handle: JoinHandle<T>) -> Result<T, PipelineError> {
    handle.join().map_err(|_| PipelineError::ThreadPanicked(name))
}

fn log_summary(report: &PipelineReport) {
    if report.is_success() {
        tracing::info!(
            written = report.written,
            total = report.total,
            "fully processed"
        );
        return;
    }
    if report.cancelled {
        tracing::warn!(
            written = report.written,
            total = report.total,
            "interrupted; remaining rows will be picked up by the next run"
        );
    }
    if !report.failures.is_empty() {
        tracing::warn!(
            failed = report.failures.len(),
            ids = ?report.failed_ids(),
            "completed with {} failures",
            report.failures.len()
        );
    }
}

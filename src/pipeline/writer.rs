//! The writer thread: sole owner of the write connection.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use rusqlite::Connection;

use crate::error::PipelineError;
use crate::library::sentences::update_embedding;
use crate::pipeline::progress::ProgressCounter;
use crate::pipeline::queue::QueueConsumer;
use crate::pipeline::signal::StopSignal;

/// How long the writer waits on an empty queue before re-checking `stop`.
pub const WRITER_POLL: Duration = Duration::from_millis(200);

/// Start the writer. It drains `queue` until `stop` is set and the queue is
/// empty, then hands the connection back through the join handle.
///
/// A failed UPDATE ends the thread with [`PipelineError::Storage`]; the
/// consumer is dropped with it, so producers see the queue as closed.
pub(crate) fn spawn_writer(
    conn: Connection,
    queue: QueueConsumer,
    stop: Arc<StopSignal>,
    counter: Arc<ProgressCounter>,
    poll: Duration,
) -> Result<JoinHandle<Result<Connection, PipelineError>>, PipelineError> {
    thread::Builder::new()
        .name("embed-writer".into())
        .spawn(move || {
            write_loop(&conn, &queue, &stop, &counter, poll)?;
            Ok(conn)
        })
        .map_err(|source| PipelineError::Spawn {
            name: "writer",
            source,
        })
}

fn write_loop(
    conn: &Connection,
    queue: &QueueConsumer,
    stop: &StopSignal,
    counter: &ProgressCounter,
    poll: Duration,
) -> Result<(), PipelineError> {
    while !stop.is_set() || !queue.is_empty() {
        let Some(item) = queue.get(poll) else {
            continue;
        };
        let updated = update_embedding(conn, item.sentence_id, &item.embedding).map_err(|e| {
            tracing::error!(sentence_id = item.sentence_id, error = %e, "writing embedding failed");
            e
        })?;
        if updated == 0 {
            tracing::warn!(sentence_id = item.sentence_id, "no sentence row to update");
        } else {
            counter.record_written();
        }
    }
    tracing::debug!(written = counter.snapshot().written, "writer drained queue");
    Ok(())
}

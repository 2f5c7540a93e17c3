//! Embedding worker loop.

use std::sync::OnceLock;

use crossbeam_channel::Receiver;

use crate::embedding::EmbeddingProvider;
use crate::error::EmbeddingError;
use crate::library::types::Sentence;
use crate::pipeline::progress::ProgressCounter;
use crate::pipeline::queue::{QueueProducer, WorkItem};
use crate::pipeline::RowFailure;

/// Pins the vector length for a run: the configured value, or else the
/// length of the first vector any worker sees.
#[derive(Debug, Default)]
pub(crate) struct DimensionGuard {
    expected: OnceLock<usize>,
}

impl DimensionGuard {
    pub(crate) fn new(expected: Option<usize>) -> Self {
        let guard = Self::default();
        if let Some(dims) = expected {
            let _ = guard.expected.set(dims);
        }
        guard
    }

    pub(crate) fn check(&self, len: usize) -> Result<(), EmbeddingError> {
        let expected = *self.expected.get_or_init(|| len);
        if len == expected {
            Ok(())
        } else {
            Err(EmbeddingError::Format(format!(
                "expected a {expected}-dim vector, got {len}"
            )))
        }
    }

    pub(crate) fn observed(&self) -> Option<usize> {
        self.expected.get().copied()
    }
}

/// What one worker did before its row channel closed.
#[derive(Debug, Default)]
pub(crate) struct WorkerOutcome {
    pub(crate) enqueued: u64,
    pub(crate) failures: Vec<RowFailure>,
}

/// Embed every sentence received on `rows` and enqueue the result for the
/// writer. Per-row embedding errors are collected, not propagated. Returns
/// early if the writer has gone away.
pub(crate) fn run_worker(
    worker_id: usize,
    rows: Receiver<Sentence>,
    queue: QueueProducer,
    provider: &dyn EmbeddingProvider,
    counter: &ProgressCounter,
    dims: &DimensionGuard,
) -> WorkerOutcome {
    let mut outcome = WorkerOutcome::default();

    for sentence in rows.iter() {
        match embed_sentence(provider, dims, &sentence) {
            Ok(embedding) => {
                let item = WorkItem {
                    sentence_id: sentence.id,
                    embedding,
                };
                if queue.put(item).is_err() {
                    tracing::warn!(worker_id, "writer stopped, worker exiting");
                    break;
                }
                outcome.enqueued += 1;
            }
            Err(error) => {
                tracing::warn!(worker_id, sentence_id = sentence.id, %error, "embedding failed");
                counter.record_failed();
                outcome.failures.push(RowFailure {
                    sentence_id: sentence.id,
                    error,
                });
            }
        }
    }

    tracing::debug!(worker_id, enqueued = outcome.enqueued, failed = outcome.failures.len(), "worker done");
    outcome
}

fn embed_sentence(
    provider: &dyn EmbeddingProvider,
    dims: &DimensionGuard,
    sentence: &Sentence,
) -> Result<Vec<u8>, EmbeddingError> {
    let blob = provider.embed_blob(&sentence.context_text)?;
    dims.check(blob.len() / 4)?;
    Ok(blob)
}

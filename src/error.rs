//! Typed errors for the embedding client and the embedding pipeline.

use thiserror::Error;

/// Failure of a single embedding call. Recorded per row; never aborts a run.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    /// The service answered with a non-2xx status.
    #[error("embedding service returned HTTP {status}: {body}")]
    Service { status: u16, body: String },

    /// The response (or the vector it carried) was not usable.
    #[error("malformed embedding response: {0}")]
    Format(String),

    #[error("embedding request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Failure that aborts the whole pipeline run.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Database unreachable, malformed schema, or a failed write.
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("{0} thread panicked")]
    ThreadPanicked(&'static str),

    #[error("failed to spawn {name} thread: {source}")]
    Spawn {
        name: &'static str,
        #[source]
        source: std::io::Error,
    },
}

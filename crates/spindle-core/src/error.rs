use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::typed::RegistryError;

/// Top-level error for queue construction and typed enqueue.
///
/// Note that `JobQueue::enqueue` itself never fails: persistence errors
/// during normal operation are logged, not returned.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("failed to encode payload for job_type={job_type}: {source}")]
    Encode {
        job_type: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("missing handlers for job types: {0:?}")]
    MissingHandlers(Vec<String>),

    #[error("invalid config {path}: {reason}")]
    Config { path: PathBuf, reason: String },
}

/// Durable store failures.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt job file {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode jobs: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Failure reported by a job handler. Any variant counts as a transient
/// failure and goes through retry/backoff.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("{0}")]
    Failed(String),

    #[error("payload decode failed for job_type={job_type}: {source}")]
    Decode {
        job_type: String,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Generation(#[from] GenerationError),
}

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        HandlerError::Failed(message.into())
    }
}

/// Outcome of waiting on an external generation task.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("generation failed: {0}")]
    Failed(String),

    #[error("generation completed without an output url")]
    MissingOutput,

    #[error("generation timed out after {0:?}")]
    TimedOut(Duration),

    #[error("status source error: {0}")]
    Source(String),
}

//! Job status state machine.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Job status.
///
/// State transitions:
/// - Pending -> Processing -> Completed
/// - Pending -> Processing -> Pending (retry with backoff, while attempts remain)
/// - Pending -> Processing -> Dead (attempt budget exhausted)
/// - Pending -> Failed (no handler registered for the job type)
/// - Pending -> Dead (cancelled)
/// - Failed | Dead -> Pending (manual retry only)
/// - Processing -> Pending (crash recovery at startup)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Waiting for `scheduled_at` and a free dispatch slot.
    Pending,

    /// A handler invocation is in flight.
    Processing,

    /// The handler succeeded.
    Completed,

    /// Could never run (configuration error). Not retried automatically.
    Failed,

    /// Attempt budget exhausted, or cancelled.
    Dead,
}

impl JobStatus {
    /// Will the dispatcher ever touch this job again on its own?
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Dead
        )
    }

    /// Can an operator send this job back to `Pending`?
    pub fn is_retryable(self) -> bool {
        matches!(self, JobStatus::Failed | JobStatus::Dead)
    }

    /// Terminal states that age out of the durable store.
    pub fn is_prunable(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Dead)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Dead => "dead",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

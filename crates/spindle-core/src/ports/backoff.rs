//! Backoff port - delay before the next retry of a failed job.

use std::time::Duration;

/// Given how many attempts a job has used, how long to wait before the next.
///
/// Implementations must be non-decreasing in `attempt`. The queue assumes no
/// upper bound.
pub trait Backoff: Send + Sync {
    fn delay(&self, attempt: u32) -> Duration;
}

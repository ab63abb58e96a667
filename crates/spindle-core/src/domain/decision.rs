//! Retry decision: what happens to a job after its handler failed.

use std::sync::Arc;
use std::time::Duration;

use super::job::Job;
use crate::ports::Backoff;

/// The next action for a job whose attempt just failed.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// Back to `Pending`, eligible again after `delay`.
    Retry { delay: Duration, reason: String },

    /// Give up for good.
    MarkDead { reason: String },
}

/// Decides the next action from the job's attempt counters.
///
/// Deciders are pure: the dispatcher applies the returned decision to the
/// job record and persists it.
pub trait Decider: Send + Sync {
    fn decide(&self, job: &Job) -> Decision;
}

/// Attempt-budget decider backed by a [`Backoff`] oracle.
///
/// - Retry if `attempts < max_attempts`, after `backoff.delay(attempts)`
/// - Mark dead otherwise
#[derive(Clone)]
pub struct RetryDecider {
    backoff: Arc<dyn Backoff>,
}

impl RetryDecider {
    pub fn new(backoff: Arc<dyn Backoff>) -> Self {
        Self { backoff }
    }
}

impl Decider for RetryDecider {
    fn decide(&self, job: &Job) -> Decision {
        if job.attempts >= job.max_attempts {
            Decision::MarkDead {
                reason: format!("Max attempts reached: {}/{}", job.attempts, job.max_attempts),
            }
        } else {
            let delay = self.backoff.delay(job.attempts);
            Decision::Retry {
                delay,
                reason: format!(
                    "Retry attempt {}/{} after {:?}",
                    job.attempts + 1,
                    job.max_attempts,
                    delay
                ),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{EnqueueRequest, JobId};
    use crate::impls::FixedBackoff;
    use chrono::Utc;
    use rstest::rstest;
    use ulid::Ulid;

    fn job_with(attempts: u32, max_attempts: u32) -> Job {
        let request = EnqueueRequest::new("publish", "instagram", serde_json::Value::Null)
            .with_max_attempts(max_attempts);
        let mut job = Job::new(JobId::from_ulid(Ulid::new()), request, 3, Utc::now());
        job.attempts = attempts;
        job
    }

    #[rstest]
    #[case::first_failure(1, 3)]
    #[case::second_failure(2, 3)]
    fn retries_while_budget_remains(#[case] attempts: u32, #[case] max: u32) {
        let decider = RetryDecider::new(Arc::new(FixedBackoff::new(Duration::from_secs(7))));
        let decision = decider.decide(&job_with(attempts, max));
        assert!(matches!(decision, Decision::Retry { delay, .. } if delay == Duration::from_secs(7)));
    }

    #[rstest]
    #[case::exhausted(3, 3)]
    #[case::single_shot(1, 1)]
    fn marks_dead_when_exhausted(#[case] attempts: u32, #[case] max: u32) {
        let decider = RetryDecider::new(Arc::new(FixedBackoff::new(Duration::from_secs(7))));
        let decision = decider.decide(&job_with(attempts, max));
        assert!(matches!(decision, Decision::MarkDead { .. }));
    }
}

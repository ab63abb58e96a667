//! GenerationTracker - waits on a long-running external generation task.
//!
//! Typical use is inside a job handler: submit the generation request,
//! then `wait_for_completion` on the returned external id. Any error it
//! returns converts into a `HandlerError`, so the queue retries the job.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use crate::domain::{GenerationSnapshot, GenerationState, GenerationTask};
use crate::error::GenerationError;
use crate::ports::{Clock, GenerationSource, SystemClock};

/// Progress reported while the provider gives none, never exceeded before
/// the task actually completes.
const ESTIMATE_CEILING: u8 = 95;

#[derive(Clone)]
pub struct GenerationTracker {
    pub poll_interval: Duration,
    pub timeout: Duration,
    /// Expected run time, used to estimate progress.
    pub estimated_duration: Duration,
    /// Consecutive status-source errors tolerated before giving up.
    pub max_poll_errors: u32,
    clock: Arc<dyn Clock>,
}

impl Default for GenerationTracker {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(10),
            timeout: Duration::from_secs(30 * 60),
            estimated_duration: Duration::from_secs(3 * 60),
            max_poll_errors: 3,
            clock: Arc::new(SystemClock),
        }
    }
}

impl GenerationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_estimated_duration(mut self, estimate: Duration) -> Self {
        self.estimated_duration = estimate;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Provider progress when it reports any, otherwise a time-based
    /// estimate capped below completion.
    pub fn progress_for(&self, snapshot: &GenerationSnapshot, elapsed: Duration) -> u8 {
        match snapshot.progress {
            Some(p) if p > 0 => p.min(100),
            _ => {
                let estimate = self.estimated_duration.as_secs_f64().max(f64::EPSILON);
                let pct = (elapsed.as_secs_f64() / estimate * 100.0).floor();
                pct.min(f64::from(ESTIMATE_CEILING)) as u8
            }
        }
    }

    /// Poll until the task settles and return its output URL.
    ///
    /// `on_progress` gets every observed state with its progress, and a
    /// final `(Completed, 100)` on success.
    pub async fn wait_for_completion<S, F>(
        &self,
        source: &S,
        external_id: &str,
        mut on_progress: F,
    ) -> Result<String, GenerationError>
    where
        S: GenerationSource + ?Sized,
        F: FnMut(GenerationState, u8) + Send,
    {
        let started = Instant::now();
        let mut task = GenerationTask::new(external_id, self.clock.now());
        let mut poll_errors = 0;
        tracing::info!(external_id, timeout_secs = self.timeout.as_secs(), "waiting for generation");

        while started.elapsed() < self.timeout {
            match source.poll(external_id).await {
                Ok(snapshot) => {
                    poll_errors = 0;
                    let progress = self.progress_for(&snapshot, started.elapsed());
                    task.advance(&snapshot, progress, self.clock.now());
                    tracing::debug!(
                        external_id,
                        status = %snapshot.status,
                        state = ?task.state,
                        progress = task.progress,
                        "generation status"
                    );

                    match task.state {
                        GenerationState::Completed => {
                            on_progress(GenerationState::Completed, 100);
                            let Some(url) = task.output_url else {
                                tracing::error!(external_id, "generation completed without output");
                                return Err(GenerationError::MissingOutput);
                            };
                            tracing::info!(external_id, output_url = %url, "generation completed");
                            return Ok(url);
                        }
                        GenerationState::Failed => {
                            let message = task.error.unwrap_or_default();
                            tracing::error!(external_id, error = %message, "generation failed");
                            return Err(GenerationError::Failed(message));
                        }
                        state => on_progress(state, task.progress),
                    }
                }
                Err(e) => {
                    poll_errors += 1;
                    tracing::warn!(external_id, error = %e, poll_errors, "generation status poll failed");
                    if poll_errors >= self.max_poll_errors {
                        return Err(e);
                    }
                }
            }

            tokio::time::sleep(self.poll_interval).await;
        }

        tracing::error!(external_id, "generation timed out");
        Err(GenerationError::TimedOut(self.timeout))
    }
}

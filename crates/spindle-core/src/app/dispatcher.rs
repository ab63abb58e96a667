//! Dispatcher - selection cycle, capacity accounting and reconciliation.
//!
//! One cycle runs entirely under the state lock: it claims eligible jobs
//! until capacity is used up and spawns a task per claim. Each spawned task
//! runs the handler without holding the lock, then re-locks to record the
//! outcome and wakes the loop so freed capacity is refilled right away.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, Notify, watch};

use crate::domain::job::after;
use crate::domain::{Decider, Decision, EXHAUSTED_ERROR, JobId};
use crate::ports::Clock;
use crate::queue::JobStore;
use crate::typed::{DynHandler, HandlerRegistry, JobContext};

pub(crate) struct QueueState {
    pub(crate) store: JobStore,
    /// Handlers currently in flight.
    pub(crate) active: usize,
}

/// Everything the loop, the handler tasks and the public API share.
pub(crate) struct Shared {
    pub(crate) state: Mutex<QueueState>,
    pub(crate) registry: HandlerRegistry,
    pub(crate) decider: Arc<dyn Decider>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) wake: Notify,
    pub(crate) max_concurrent: usize,
}

impl Shared {
    pub(crate) fn new(
        store: JobStore,
        registry: HandlerRegistry,
        decider: Arc<dyn Decider>,
        clock: Arc<dyn Clock>,
        max_concurrent: usize,
    ) -> Self {
        Self {
            state: Mutex::new(QueueState { store, active: 0 }),
            registry,
            decider,
            clock,
            wake: Notify::new(),
            max_concurrent: max_concurrent.max(1),
        }
    }

    /// Claim and spawn as many eligible jobs as capacity allows. Returns
    /// how many handlers were started.
    pub(crate) async fn run_cycle(self: &Arc<Self>) -> usize {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        let mut started = 0;

        while state.active < self.max_concurrent {
            let now = self.clock.now();
            let Some(job) = state.store.next_eligible(now) else {
                break;
            };

            let Some(handler) = self.registry.get(job.job_type.as_str()) else {
                tracing::error!(
                    job_id = %job.id,
                    job_type = %job.job_type,
                    "no handler registered; job marked failed"
                );
                job.mark_failed(format!("No handler registered for job type: {}", job.job_type), now);
                state.store.persist().await;
                continue;
            };

            if job.attempts_exhausted() {
                tracing::error!(
                    job_id = %job.id,
                    job_type = %job.job_type,
                    attempts = job.attempts,
                    max_attempts = job.max_attempts,
                    "pending job has no attempts left; job is dead"
                );
                job.mark_dead(EXHAUSTED_ERROR.to_string(), now);
                state.store.persist().await;
                continue;
            }

            job.start_attempt(now);
            let ctx = JobContext::from_job(job);
            let data = job.data.clone();
            tracing::debug!(
                job_id = %ctx.job_id,
                job_type = %ctx.job_type,
                priority = ?job.priority,
                attempt = ctx.attempt,
                max_attempts = job.max_attempts,
                "job claimed"
            );
            state.store.persist().await;
            state.active += 1;
            started += 1;

            tokio::spawn(Arc::clone(self).execute(ctx, data, handler));
        }

        started
    }

    async fn execute(self: Arc<Self>, ctx: JobContext, data: serde_json::Value, handler: Arc<dyn DynHandler>) {
        let job_id = ctx.job_id.clone();
        // A nested task turns a handler panic into an ordinary failure.
        let run = tokio::spawn(async move { handler.handle_dyn(&ctx, data).await });
        let result = match run.await {
            Ok(result) => result.map_err(|e| e.to_string()),
            Err(e) if e.is_panic() => Err("handler panicked".to_string()),
            Err(_) => Err("handler task was cancelled".to_string()),
        };

        self.reconcile(job_id, result).await;
        self.wake.notify_one();
    }

    async fn reconcile(&self, job_id: JobId, result: Result<(), String>) {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        state.active = state.active.saturating_sub(1);

        let now = self.clock.now();
        let Some(job) = state.store.get_mut(&job_id) else {
            tracing::warn!(job_id = %job_id, "finished job is no longer in the store");
            return;
        };

        match result {
            Ok(()) => {
                job.mark_completed(now);
                tracing::info!(
                    job_id = %job.id,
                    job_type = %job.job_type,
                    attempt = job.attempts,
                    "job completed"
                );
            }
            Err(error) => match self.decider.decide(job) {
                Decision::Retry { delay, reason } => {
                    tracing::warn!(
                        job_id = %job.id,
                        job_type = %job.job_type,
                        attempt = job.attempts,
                        error = %error,
                        "{reason}"
                    );
                    job.schedule_retry(after(now, delay), error);
                }
                Decision::MarkDead { reason } => {
                    tracing::error!(
                        job_id = %job.id,
                        job_type = %job.job_type,
                        attempt = job.attempts,
                        error = %error,
                        "{reason}; job is dead"
                    );
                    job.mark_dead(error, now);
                }
            },
        }

        state.store.persist().await;
    }

    /// Dispatcher loop: one cycle per wake, poll tick or start, until the
    /// shutdown flag flips.
    pub(crate) async fn run(self: Arc<Self>, poll_interval: Duration, mut shutdown_rx: watch::Receiver<bool>) {
        tracing::info!(
            max_concurrent = self.max_concurrent,
            poll_interval_ms = poll_interval.as_millis() as u64,
            "dispatcher started"
        );

        loop {
            if *shutdown_rx.borrow() {
                break;
            }

            self.run_cycle().await;

            tokio::select! {
                changed = shutdown_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = self.wake.notified() => {}
                _ = tokio::time::sleep(poll_interval) => {}
            }
        }

        tracing::info!("dispatcher stopped");
    }
}

//! JobQueue - the public face of the queue.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;

use super::dispatcher::Shared;
use crate::domain::{CorrelationKey, EnqueueRequest, Job, JobId, Priority};
use crate::error::QueueError;
use crate::observability::QueueStats;
use crate::ports::IdGenerator;
use crate::queue::JobFilter;
use crate::typed::JobKind;

/// Optional settings for [`JobQueue::enqueue_kind`].
#[derive(Debug, Clone, Default)]
pub struct EnqueueOptions {
    pub priority: Priority,
    pub max_attempts: Option<u32>,
    pub publication_id: Option<String>,
    pub token_id: Option<String>,
    pub run_at: Option<DateTime<Utc>>,
}

impl EnqueueOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    pub fn publication_id(mut self, id: impl Into<String>) -> Self {
        self.publication_id = Some(id.into());
        self
    }

    pub fn token_id(mut self, id: impl Into<String>) -> Self {
        self.token_id = Some(id.into());
        self
    }

    pub fn run_at(mut self, at: DateTime<Utc>) -> Self {
        self.run_at = Some(at);
        self
    }

    fn into_request(self, job_type: &str, provider: String, data: serde_json::Value) -> EnqueueRequest {
        EnqueueRequest {
            priority: self.priority,
            max_attempts: self.max_attempts,
            publication_id: self.publication_id,
            token_id: self.token_id,
            run_at: self.run_at,
            ..EnqueueRequest::new(job_type, provider, data)
        }
    }
}

struct Runner {
    shutdown_tx: watch::Sender<bool>,
    join: JoinHandle<()>,
}

/// Durable job queue. Build with [`JobQueueBuilder`](super::JobQueueBuilder),
/// share as `Arc<JobQueue>`.
pub struct JobQueue {
    shared: Arc<Shared>,
    ids: Arc<dyn IdGenerator>,
    default_max_attempts: u32,
    poll_interval: Duration,
    runner: Mutex<Option<Runner>>,
}

impl JobQueue {
    pub(crate) fn new(
        shared: Arc<Shared>,
        ids: Arc<dyn IdGenerator>,
        default_max_attempts: u32,
        poll_interval: Duration,
    ) -> Self {
        Self {
            shared,
            ids,
            default_max_attempts,
            poll_interval,
            runner: Mutex::new(None),
        }
    }

    /// Append a pending job, persist, and wake the dispatcher.
    ///
    /// Persistence failures are logged, not returned; the job is queued in
    /// memory either way.
    pub async fn enqueue(&self, request: EnqueueRequest) -> JobId {
        let now = self.shared.clock.now();
        let job = Job::new(self.ids.generate_job_id(), request, self.default_max_attempts, now);
        let id = job.id.clone();
        tracing::info!(
            job_id = %id,
            job_type = %job.job_type,
            provider = %job.provider,
            priority = ?job.priority,
            scheduled_at = %job.scheduled_at,
            "job enqueued"
        );

        {
            let mut state = self.shared.state.lock().await;
            state.store.push(job);
            state.store.persist().await;
        }
        self.shared.wake.notify_one();
        id
    }

    /// Typed enqueue: the job type comes from `K::TYPE`.
    pub async fn enqueue_kind<K: JobKind>(
        &self,
        provider: impl Into<String>,
        payload: &K,
        options: EnqueueOptions,
    ) -> Result<JobId, QueueError> {
        let data = serde_json::to_value(payload).map_err(|source| QueueError::Encode {
            job_type: K::TYPE.to_string(),
            source,
        })?;
        Ok(self.enqueue(options.into_request(K::TYPE, provider.into(), data)).await)
    }

    /// Pending jobs only. Returns false for any other status and for
    /// unknown ids.
    pub async fn cancel(&self, id: &JobId) -> bool {
        let now = self.shared.clock.now();
        let mut state = self.shared.state.lock().await;
        let Some(job) = state.store.get_mut(id) else {
            return false;
        };
        if !job.cancel(now) {
            tracing::debug!(job_id = %id, status = %job.status, "cancel refused");
            return false;
        }
        tracing::info!(job_id = %id, job_type = %job.job_type, "job cancelled");
        state.store.persist().await;
        true
    }

    /// Failed and dead jobs only: fresh attempt budget, due now.
    pub async fn retry_job(&self, id: &JobId) -> bool {
        let now = self.shared.clock.now();
        {
            let mut state = self.shared.state.lock().await;
            let Some(job) = state.store.get_mut(id) else {
                return false;
            };
            if !job.reset_for_retry(now) {
                tracing::debug!(job_id = %id, status = %job.status, "manual retry refused");
                return false;
            }
            tracing::info!(job_id = %id, job_type = %job.job_type, "job requeued manually");
            state.store.persist().await;
        }
        self.shared.wake.notify_one();
        true
    }

    pub async fn get_job(&self, id: &JobId) -> Option<Job> {
        self.shared.state.lock().await.store.get(id).cloned()
    }

    pub async fn jobs_by_correlation(&self, key: &CorrelationKey) -> Vec<Job> {
        self.shared.state.lock().await.store.by_correlation(key)
    }

    pub async fn list_jobs(&self, filter: &JobFilter) -> Vec<Job> {
        self.shared.state.lock().await.store.list(filter)
    }

    pub async fn stats(&self) -> QueueStats {
        self.shared.state.lock().await.store.stats()
    }

    /// Handlers currently running.
    pub async fn active(&self) -> usize {
        self.shared.state.lock().await.active
    }

    pub fn registered_types(&self) -> Vec<String> {
        self.shared.registry.registered_types()
    }

    /// Run one dispatch cycle now, without the background loop. Safe to call
    /// while the loop runs; cycles are serialized by the state lock.
    pub async fn tick(&self) -> usize {
        self.shared.run_cycle().await
    }

    /// Spawn the dispatcher loop. Calling it again while running is a
    /// no-op that returns false.
    pub async fn start(&self) -> bool {
        let mut runner = self.runner.lock().await;
        if runner.is_some() {
            return false;
        }
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let join = tokio::spawn(Arc::clone(&self.shared).run(self.poll_interval, shutdown_rx));
        *runner = Some(Runner { shutdown_tx, join });
        true
    }

    /// Stop taking new jobs and wait for the loop to exit. In-flight
    /// handlers keep running and still record their outcome.
    pub async fn stop(&self) {
        let Some(runner) = self.runner.lock().await.take() else {
            return;
        };
        // receiver may already be gone
        let _ = runner.shutdown_tx.send(true);
        if let Err(e) = runner.join.await {
            tracing::error!(error = %e, "dispatcher loop ended abnormally");
        }
    }

    pub async fn is_running(&self) -> bool {
        self.runner.lock().await.is_some()
    }
}

//! JobStore - the authoritative in-memory job set, mirrored to a
//! [`DurableStore`].

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use super::query::{self, JobFilter};
use super::recovery;
use crate::domain::{CorrelationKey, Job, JobId, Priority};
use crate::error::StoreError;
use crate::observability::QueueStats;
use crate::ports::DurableStore;

/// What happened while opening the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OpenReport {
    pub loaded: usize,
    pub pruned: usize,
    /// Interrupted jobs put back in the pool.
    pub recovered: usize,
    /// Interrupted jobs that had no attempts left.
    pub dead_lettered: usize,
}

/// Jobs in insertion order.
///
/// The store itself is not synchronized; the dispatcher keeps it behind a
/// mutex and awaits [`JobStore::persist`] after every mutation, still
/// holding the lock, so snapshots reach the durable store in mutation order.
pub struct JobStore {
    jobs: Vec<Job>,
    durable: Arc<dyn DurableStore>,
}

impl JobStore {
    /// Load, prune expired terminal jobs, recover interrupted ones, and
    /// persist straight away if anything changed.
    ///
    /// A store that cannot be read is logged and treated as empty.
    pub fn open(durable: Arc<dyn DurableStore>, now: DateTime<Utc>, retention: Duration) -> (Self, OpenReport) {
        let mut jobs = match durable.load_all() {
            Ok(jobs) => jobs,
            Err(e) => {
                tracing::error!(error = %e, "failed to load persisted jobs; starting empty");
                Vec::new()
            }
        };

        let loaded = jobs.len();
        let pruned = recovery::prune_expired(&mut jobs, now, retention);
        let recovered = recovery::recover_interrupted(&mut jobs, now);

        let store = Self { jobs, durable };
        if pruned > 0 || recovered.total() > 0 {
            // Nothing else runs yet, so the write can block.
            store.report_save(store.durable.save_all(&store.jobs));
        }
        if recovered.total() > 0 {
            tracing::warn!(
                requeued = recovered.requeued,
                dead_lettered = recovered.dead_lettered,
                "recovered jobs interrupted mid-flight"
            );
        }
        tracing::info!(loaded, pruned, remaining = store.jobs.len(), "job store opened");

        let report = OpenReport {
            loaded,
            pruned,
            recovered: recovered.requeued,
            dead_lettered: recovered.dead_lettered,
        };
        (store, report)
    }

    /// Mirror the full set to the durable store on the blocking pool.
    /// Failures are logged; the in-memory set stays authoritative.
    pub async fn persist(&self) -> bool {
        let durable = Arc::clone(&self.durable);
        let jobs = self.jobs.clone();
        match tokio::task::spawn_blocking(move || durable.save_all(&jobs)).await {
            Ok(result) => self.report_save(result),
            Err(e) => {
                tracing::warn!(error = %e, jobs = self.jobs.len(), "persist task did not finish");
                false
            }
        }
    }

    fn report_save(&self, result: Result<(), StoreError>) -> bool {
        match result {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e, jobs = self.jobs.len(), "failed to persist jobs");
                false
            }
        }
    }

    pub fn push(&mut self, job: Job) {
        self.jobs.push(job);
    }

    pub fn get(&self, id: &JobId) -> Option<&Job> {
        self.jobs.iter().find(|j| &j.id == id)
    }

    pub fn get_mut(&mut self, id: &JobId) -> Option<&mut Job> {
        self.jobs.iter_mut().find(|j| &j.id == id)
    }

    /// Highest tier first; within a tier the first eligible job in store
    /// order.
    pub fn next_eligible(&mut self, now: DateTime<Utc>) -> Option<&mut Job> {
        let index = Priority::TIERS.iter().find_map(|tier| {
            self.jobs
                .iter()
                .position(|j| j.priority == *tier && j.is_eligible(now))
        })?;
        self.jobs.get_mut(index)
    }

    pub fn by_correlation(&self, key: &CorrelationKey) -> Vec<Job> {
        self.jobs.iter().filter(|j| j.correlates_with(key)).cloned().collect()
    }

    pub fn list(&self, filter: &JobFilter) -> Vec<Job> {
        query::select(&self.jobs, filter)
    }

    pub fn stats(&self) -> QueueStats {
        QueueStats::from_jobs(&self.jobs)
    }

    pub fn jobs(&self) -> &[Job] {
        &self.jobs
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

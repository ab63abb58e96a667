//! Listing filters and ordering.

use std::cmp::Ordering;

use crate::domain::{Job, JobStatus};

/// Conjunctive filter over jobs; `None` fields match everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobFilter {
    pub status: Option<JobStatus>,
    pub job_type: Option<String>,
    pub provider: Option<String>,
    pub publication_id: Option<String>,
    pub token_id: Option<String>,
    /// Applied after sorting.
    pub limit: Option<usize>,
}

impl JobFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(mut self, status: JobStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn job_type(mut self, job_type: impl Into<String>) -> Self {
        self.job_type = Some(job_type.into());
        self
    }

    pub fn provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
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

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn matches(&self, job: &Job) -> bool {
        fn eq(want: &Option<String>, have: Option<&str>) -> bool {
            want.as_deref().is_none_or(|w| have == Some(w))
        }

        self.status.is_none_or(|s| job.status == s)
            && eq(&self.job_type, Some(job.job_type.as_str()))
            && eq(&self.provider, Some(job.provider.as_str()))
            && eq(&self.publication_id, job.publication_id.as_deref())
            && eq(&self.token_id, job.token_id.as_deref())
    }
}

/// Pending jobs first (by priority tier, then newest first), then
/// everything else newest first.
pub fn listing_order(a: &Job, b: &Job) -> Ordering {
    let a_pending = a.status == JobStatus::Pending;
    let b_pending = b.status == JobStatus::Pending;
    match (a_pending, b_pending) {
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (true, true) => a
            .priority
            .cmp(&b.priority)
            .then_with(|| b.created_at.cmp(&a.created_at)),
        (false, false) => b.created_at.cmp(&a.created_at),
    }
}

/// Filter, sort, then truncate.
pub fn select(jobs: &[Job], filter: &JobFilter) -> Vec<Job> {
    let mut out: Vec<Job> = jobs.iter().filter(|j| filter.matches(j)).cloned().collect();
    out.sort_by(listing_order);
    if let Some(limit) = filter.limit {
        out.truncate(limit);
    }
    out
}

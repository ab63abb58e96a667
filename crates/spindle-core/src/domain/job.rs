//! Job record and its state transitions.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::JobId;
use super::state::JobStatus;

/// Error recorded on a job cancelled before it was dispatched.
pub const CANCELLED_ERROR: &str = "Cancelled by user";

/// Error recorded on a job whose last allowed attempt was cut short by a crash.
pub const INTERRUPTED_ERROR: &str = "Interrupted during final attempt";

/// Error recorded on a job found pending with no attempts left.
pub const EXHAUSTED_ERROR: &str = "Max attempts reached";

/// Attempt budget used when a request does not set one.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Dispatch priority tier.
///
/// Variants are declared in dispatch order, so the derived `Ord` sorts
/// `High` before `Normal` before `Low`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    #[default]
    Normal,
    Low,
}

impl Priority {
    /// All tiers, highest first.
    pub const TIERS: [Priority; 3] = [Priority::High, Priority::Normal, Priority::Low];
}

/// Handler discriminator ("publish-instagram", "generate-video", ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobType(String);

impl JobType {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Back-reference to a domain entity a job acts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CorrelationKey {
    Publication(String),
    Token(String),
}

/// What a producer hands to `enqueue`.
#[derive(Debug, Clone)]
pub struct EnqueueRequest {
    pub job_type: JobType,
    pub provider: String,
    pub data: serde_json::Value,
    pub priority: Priority,
    pub max_attempts: Option<u32>,
    pub publication_id: Option<String>,
    pub token_id: Option<String>,
    pub run_at: Option<DateTime<Utc>>,
}

impl EnqueueRequest {
    pub fn new(
        job_type: impl Into<String>,
        provider: impl Into<String>,
        data: serde_json::Value,
    ) -> Self {
        Self {
            job_type: JobType::new(job_type),
            provider: provider.into(),
            data,
            priority: Priority::Normal,
            max_attempts: None,
            publication_id: None,
            token_id: None,
            run_at: None,
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    pub fn with_publication_id(mut self, id: impl Into<String>) -> Self {
        self.publication_id = Some(id.into());
        self
    }

    pub fn with_token_id(mut self, id: impl Into<String>) -> Self {
        self.token_id = Some(id.into());
        self
    }

    /// Hold the job back until `at`.
    pub fn run_at(mut self, at: DateTime<Utc>) -> Self {
        self.run_at = Some(at);
        self
    }
}

/// What [`Job::recover`] did with an interrupted claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recovery {
    /// Back to `Pending`, due immediately.
    Requeued,
    /// The interrupted attempt was the last one; the job is now `Dead`.
    DeadLettered,
}

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

/// A unit of deferred, retryable work.
///
/// This is the single source of truth for a job's state. The dispatcher and
/// the public API change it only through the transition methods below;
/// handlers receive a copy of the payload and never see this record.
///
/// The serialized form is the persisted file layout, so optional and
/// defaulted fields tolerate records written by older versions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: JobId,
    #[serde(rename = "type")]
    pub job_type: JobType,
    pub provider: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publication_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_id: Option<String>,
    #[serde(default)]
    pub priority: Priority,
    pub scheduled_at: DateTime<Utc>,
    #[serde(default)]
    pub attempts: u32,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    pub status: JobStatus,
    #[serde(default)]
    pub data: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Job {
    /// Build a fresh pending job. A zero attempt budget is raised to one.
    pub fn new(id: JobId, request: EnqueueRequest, default_max_attempts: u32, now: DateTime<Utc>) -> Self {
        let max_attempts = request.max_attempts.unwrap_or(default_max_attempts).max(1);
        Self {
            id,
            job_type: request.job_type,
            provider: request.provider,
            publication_id: request.publication_id,
            token_id: request.token_id,
            priority: request.priority,
            scheduled_at: request.run_at.unwrap_or(now),
            attempts: 0,
            max_attempts,
            status: JobStatus::Pending,
            data: request.data,
            error: None,
            created_at: now,
            processed_at: None,
            completed_at: None,
        }
    }

    /// Pending and due.
    pub fn is_eligible(&self, now: DateTime<Utc>) -> bool {
        self.status == JobStatus::Pending && self.scheduled_at <= now
    }

    /// Every allowed attempt has been started.
    pub fn attempts_exhausted(&self) -> bool {
        self.attempts >= self.max_attempts
    }

    /// When the job last made progress towards its terminal state.
    pub fn terminal_at(&self) -> DateTime<Utc> {
        self.completed_at
            .or(self.processed_at)
            .unwrap_or(self.created_at)
    }

    pub fn correlates_with(&self, key: &CorrelationKey) -> bool {
        match key {
            CorrelationKey::Publication(id) => self.publication_id.as_deref() == Some(id.as_str()),
            CorrelationKey::Token(id) => self.token_id.as_deref() == Some(id.as_str()),
        }
    }

    /// Claim for dispatch: `Pending -> Processing`, one more attempt.
    pub fn start_attempt(&mut self, now: DateTime<Utc>) {
        self.status = JobStatus::Processing;
        self.attempts += 1;
        self.processed_at = Some(now);
    }

    pub fn mark_completed(&mut self, now: DateTime<Utc>) {
        self.status = JobStatus::Completed;
        self.completed_at = Some(now);
    }

    /// No handler can ever run this job.
    pub fn mark_failed(&mut self, error: String, now: DateTime<Utc>) {
        self.status = JobStatus::Failed;
        self.error = Some(error);
        self.completed_at = Some(now);
    }

    pub fn mark_dead(&mut self, error: String, now: DateTime<Utc>) {
        self.status = JobStatus::Dead;
        self.error = Some(error);
        self.completed_at = Some(now);
    }

    /// Put the job back in the pool after a failed attempt.
    pub fn schedule_retry(&mut self, at: DateTime<Utc>, error: String) {
        self.status = JobStatus::Pending;
        self.scheduled_at = at;
        self.error = Some(error);
    }

    /// `Pending -> Dead` with the cancellation error. Returns false for any
    /// other status.
    pub fn cancel(&mut self, now: DateTime<Utc>) -> bool {
        if self.status != JobStatus::Pending {
            return false;
        }
        self.mark_dead(CANCELLED_ERROR.to_string(), now);
        true
    }

    /// Manual retry of a failed or dead job with a fresh attempt budget.
    pub fn reset_for_retry(&mut self, now: DateTime<Utc>) -> bool {
        if !self.status.is_retryable() {
            return false;
        }
        self.status = JobStatus::Pending;
        self.attempts = 0;
        self.error = None;
        self.completed_at = None;
        self.scheduled_at = now;
        true
    }

    /// Undo a claim interrupted by a crash. The attempt already counted
    /// stays counted, so a job interrupted on its last attempt is
    /// dead-lettered rather than run again.
    pub fn recover(&mut self, now: DateTime<Utc>) -> Option<Recovery> {
        if self.status != JobStatus::Processing {
            return None;
        }
        if self.attempts_exhausted() {
            self.mark_dead(INTERRUPTED_ERROR.to_string(), now);
            return Some(Recovery::DeadLettered);
        }
        self.status = JobStatus::Pending;
        self.scheduled_at = now;
        Some(Recovery::Requeued)
    }
}

/// `now + delay`, saturating instead of overflowing.
pub(crate) fn after(now: DateTime<Utc>, delay: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(delay)
        .ok()
        .and_then(|delta| now.checked_add_signed(delta))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

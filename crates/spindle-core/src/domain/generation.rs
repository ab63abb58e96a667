//! Tracking state for long-running external generation tasks (video, image).
//!
//! An external provider accepts a generation request, hands back its own task
//! id, and is then polled until the task settles. The lifecycle mirrors a
//! queued job: pending -> processing -> completed | failed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationState {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl GenerationState {
    pub fn is_terminal(self) -> bool {
        matches!(self, GenerationState::Completed | GenerationState::Failed)
    }

    /// Map a provider's status string onto our lifecycle.
    ///
    /// Providers disagree on spelling; unknown values are treated as still
    /// running so the tracker keeps polling until its timeout.
    pub fn from_provider(status: &str) -> Self {
        match status.trim().to_ascii_lowercase().as_str() {
            "submitted" | "queued" | "pending" => GenerationState::Pending,
            "succeed" | "succeeded" | "completed" | "complete" => GenerationState::Completed,
            "failed" | "error" => GenerationState::Failed,
            _ => GenerationState::Processing,
        }
    }
}

/// One answer from the provider's status endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationSnapshot {
    pub status: String,
    #[serde(default)]
    pub progress: Option<u8>,
    #[serde(default)]
    pub output_url: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl GenerationSnapshot {
    pub fn new(status: impl Into<String>) -> Self {
        Self {
            status: status.into(),
            progress: None,
            output_url: None,
            message: None,
        }
    }

    pub fn with_progress(mut self, progress: u8) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn with_output_url(mut self, url: impl Into<String>) -> Self {
        self.output_url = Some(url.into());
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn state(&self) -> GenerationState {
        GenerationState::from_provider(&self.status)
    }
}

/// Local view of an external generation task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationTask {
    pub external_id: String,
    pub state: GenerationState,
    /// 0..=100
    pub progress: u8,
    pub output_url: Option<String>,
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl GenerationTask {
    pub fn new(external_id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            external_id: external_id.into(),
            state: GenerationState::Pending,
            progress: 0,
            output_url: None,
            error: None,
            started_at: now,
            updated_at: now,
        }
    }

    /// Fold a snapshot into the task.
    ///
    /// Terminal states are sticky and the state never moves backwards
    /// (a late "queued" after "processing" is ignored). Progress is
    /// monotone and reaches 100 only on completion. Returns whether the
    /// state changed.
    pub fn advance(&mut self, snapshot: &GenerationSnapshot, progress: u8, now: DateTime<Utc>) -> bool {
        if self.state.is_terminal() {
            return false;
        }
        let next = snapshot.state();
        let changed = next > self.state;
        if changed {
            self.state = next;
        }
        self.updated_at = now;

        match self.state {
            GenerationState::Completed => {
                self.progress = 100;
                self.output_url = snapshot.output_url.clone();
            }
            GenerationState::Failed => {
                self.error = Some(
                    snapshot
                        .message
                        .clone()
                        .unwrap_or_else(|| "unknown error".to_string()),
                );
            }
            _ => self.progress = self.progress.max(progress.min(99)),
        }
        changed
    }
}

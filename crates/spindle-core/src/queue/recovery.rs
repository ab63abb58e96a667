//! Startup housekeeping: retention pruning and crash recovery.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::domain::{Job, Recovery};

/// Drop completed and dead jobs whose terminal timestamp is older than
/// `retention`. Pending, processing and failed jobs are always kept.
pub fn prune_expired(jobs: &mut Vec<Job>, now: DateTime<Utc>, retention: Duration) -> usize {
    let Some(cutoff) = chrono::Duration::from_std(retention)
        .ok()
        .and_then(|r| now.checked_sub_signed(r))
    else {
        return 0;
    };

    let before = jobs.len();
    jobs.retain(|job| !(job.status.is_prunable() && job.terminal_at() < cutoff));
    before - jobs.len()
}

/// Outcome of [`recover_interrupted`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Recovered {
    pub requeued: usize,
    pub dead_lettered: usize,
}

impl Recovered {
    pub fn total(&self) -> usize {
        self.requeued + self.dead_lettered
    }
}

/// Every `processing` job was interrupted by a restart. Jobs with attempts
/// left become pending again, due immediately; a job cut short on its last
/// attempt is dead-lettered. Attempt counts are left alone.
pub fn recover_interrupted(jobs: &mut [Job], now: DateTime<Utc>) -> Recovered {
    let mut recovered = Recovered::default();
    for job in jobs.iter_mut() {
        match job.recover(now) {
            Some(Recovery::Requeued) => recovered.requeued += 1,
            Some(Recovery::DeadLettered) => recovered.dead_lettered += 1,
            None => {}
        }
    }
    recovered
}

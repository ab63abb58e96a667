//! MemoryStore - a non-durable `DurableStore` for tests and embedding.

use std::sync::{Mutex, PoisonError};

use crate::domain::Job;
use crate::error::StoreError;
use crate::ports::DurableStore;

/// Keeps the last saved snapshot in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    jobs: Mutex<Vec<Job>>,
    saves: Mutex<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a pre-existing snapshot, as if loaded from disk.
    pub fn seeded(jobs: Vec<Job>) -> Self {
        Self {
            jobs: Mutex::new(jobs),
            saves: Mutex::new(0),
        }
    }

    pub fn snapshot(&self) -> Vec<Job> {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// How many times `save_all` has been called.
    pub fn save_count(&self) -> usize {
        *self.saves.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl DurableStore for MemoryStore {
    fn load_all(&self) -> Result<Vec<Job>, StoreError> {
        Ok(self.snapshot())
    }

    fn save_all(&self, jobs: &[Job]) -> Result<(), StoreError> {
        *self.jobs.lock().unwrap_or_else(PoisonError::into_inner) = jobs.to_vec();
        *self.saves.lock().unwrap_or_else(PoisonError::into_inner) += 1;
        Ok(())
    }
}

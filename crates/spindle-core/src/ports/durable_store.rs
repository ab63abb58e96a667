//! DurableStore port - where the job set survives restarts.
//!
//! The queue rewrites the whole collection after every mutation, so the
//! contract is just "load everything" and "replace everything". A
//! transactional backend can implement the same two calls without touching
//! the dispatcher.

use crate::domain::Job;
use crate::error::StoreError;

pub trait DurableStore: Send + Sync {
    /// All persisted jobs, in stored order. An absent store is empty, not an
    /// error.
    fn load_all(&self) -> Result<Vec<Job>, StoreError>;

    /// Replace the stored set. Readers must never observe a partial write.
    fn save_all(&self, jobs: &[Job]) -> Result<(), StoreError>;
}

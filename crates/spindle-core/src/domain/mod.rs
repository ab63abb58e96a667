//! Domain model: ids, jobs, status machine, retry decisions, generation tasks.

pub mod decision;
pub mod generation;
pub mod ids;
pub mod job;
pub mod state;

pub use decision::{Decider, Decision, RetryDecider};
pub use generation::{GenerationSnapshot, GenerationState, GenerationTask};
pub use ids::JobId;
pub use job::{
    CANCELLED_ERROR, CorrelationKey, DEFAULT_MAX_ATTEMPTS, EXHAUSTED_ERROR, EnqueueRequest,
    INTERRUPTED_ERROR, Job, JobType, Priority, Recovery,
};
pub use state::JobStatus;

//! App - the queue assembled from ports.
//!
//! - **JobQueueBuilder**: wiring and fail-fast handler validation
//! - **JobQueue**: public API and dispatcher lifecycle
//! - **dispatcher**: selection cycle, capacity, outcome reconciliation
//! - **QueueConfig**: file-backed configuration
//! - **GenerationTracker**: polling helper for long-running external tasks

pub mod builder;
pub mod config;
mod dispatcher;
pub mod generation;
pub mod service;

pub use self::builder::JobQueueBuilder;
pub use self::config::{BackoffConfig, QueueConfig};
pub use self::generation::GenerationTracker;
pub use self::service::{EnqueueOptions, JobQueue};

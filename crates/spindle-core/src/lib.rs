//! spindle-core
//!
//! A durable, in-process job queue: jobs are persisted to a single JSON
//! file, dispatched by priority to registered handlers under a concurrency
//! ceiling, retried with backoff and dead-lettered when their attempt budget
//! runs out.
//!
//! # Modules
//! - **domain**: jobs, status machine, retry decisions, generation tasks
//! - **ports**: seams (DurableStore, Backoff, Clock, IdGenerator, GenerationSource)
//! - **impls**: JsonFileStore, MemoryStore, backoff policies
//! - **typed**: JobKind / Handler / HandlerRegistry
//! - **queue**: job set, listing, startup recovery
//! - **app**: JobQueue, builder, dispatcher, config, generation tracker
//!
//! ```ignore
//! let queue = Arc::new(
//!     JobQueueBuilder::new(QueueConfig::default())
//!         .register::<PublishInstagram, _>(PublishHandler)?
//!         .build()?,
//! );
//! queue.start().await;
//! let id = queue
//!     .enqueue_kind("instagram", &PublishInstagram { caption }, EnqueueOptions::new())
//!     .await?;
//! ```

pub mod app;
pub mod domain;
pub mod error;
pub mod impls;
pub mod observability;
pub mod ports;
pub mod queue;
pub mod typed;

pub use app::{EnqueueOptions, GenerationTracker, JobQueue, JobQueueBuilder, QueueConfig};
pub use domain::{CorrelationKey, EnqueueRequest, Job, JobId, JobStatus, Priority};
pub use error::{GenerationError, HandlerError, QueueError, StoreError};
pub use observability::QueueStats;
pub use queue::JobFilter;
pub use typed::{Handler, JobContext, JobKind};

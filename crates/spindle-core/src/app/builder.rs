//! JobQueueBuilder - wiring and fail-fast validation.

use std::future::Future;
use std::sync::Arc;

use super::config::QueueConfig;
use super::dispatcher::Shared;
use super::service::JobQueue;
use crate::domain::{Decider, RetryDecider};
use crate::error::{HandlerError, QueueError};
use crate::impls::{ExponentialBackoff, JsonFileStore};
use crate::ports::{Backoff, Clock, DurableStore, IdGenerator, SystemClock, UlidGenerator};
use crate::queue::JobStore;
use crate::typed::{DynHandler, Handler, HandlerRegistry, JobContext, JobKind, RegistryError};

/// Builds a [`JobQueue`].
///
/// ```ignore
/// let queue = JobQueueBuilder::new(config)
///     .register::<PublishInstagram, _>(PublishHandler::new(client))?
///     .expect_job_types(&["publish-instagram", "refresh-token"])
///     .build()?;
/// ```
///
/// `build()` fails if any job type named in `expect_job_types` has no
/// handler, so a deployment missing a handler does not start at all
/// instead of marking those jobs failed one by one.
///
/// Unless overridden, the store is a `JsonFileStore` at
/// `config.store_path` and the backoff is an `ExponentialBackoff` built
/// from `config.backoff`.
pub struct JobQueueBuilder {
    config: QueueConfig,
    registry: HandlerRegistry,
    expected_types: Option<Vec<String>>,
    store: Option<Arc<dyn DurableStore>>,
    backoff: Option<Arc<dyn Backoff>>,
    decider: Option<Arc<dyn Decider>>,
    clock: Arc<dyn Clock>,
    ids: Option<Arc<dyn IdGenerator>>,
}

impl JobQueueBuilder {
    pub fn new(config: QueueConfig) -> Self {
        Self {
            config,
            registry: HandlerRegistry::new(),
            expected_types: None,
            store: None,
            backoff: None,
            decider: None,
            clock: Arc::new(SystemClock),
            ids: None,
        }
    }

    pub fn register<K: JobKind, H: Handler<K> + 'static>(mut self, handler: H) -> Result<Self, RegistryError> {
        self.registry.register::<K, H>(handler)?;
        Ok(self)
    }

    pub fn register_dyn(
        mut self,
        job_type: impl Into<String>,
        handler: impl DynHandler + 'static,
    ) -> Result<Self, RegistryError> {
        self.registry.register_dyn(job_type, handler)?;
        Ok(self)
    }

    pub fn register_fn<F, Fut>(mut self, job_type: impl Into<String>, f: F) -> Result<Self, RegistryError>
    where
        F: Fn(JobContext, serde_json::Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
    {
        self.registry.register_fn(job_type, f)?;
        Ok(self)
    }

    pub fn expect_job_types(mut self, job_types: &[&str]) -> Self {
        self.expected_types = Some(job_types.iter().map(|t| t.to_string()).collect());
        self
    }

    pub fn store(mut self, store: Arc<dyn DurableStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn backoff(mut self, backoff: impl Backoff + 'static) -> Self {
        self.backoff = Some(Arc::new(backoff));
        self
    }

    /// Replaces the attempt-budget decider entirely; `backoff` is then
    /// unused.
    pub fn decider(mut self, decider: Arc<dyn Decider>) -> Self {
        self.decider = Some(decider);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = Some(ids);
        self
    }

    /// Validate, open the store (prune + recover) and assemble the queue.
    /// The dispatcher is not started.
    pub fn build(self) -> Result<JobQueue, QueueError> {
        if let Some(expected) = &self.expected_types {
            let missing: Vec<String> = expected
                .iter()
                .filter(|t| !self.registry.contains(t))
                .cloned()
                .collect();
            if !missing.is_empty() {
                return Err(QueueError::MissingHandlers(missing));
            }
        }
        self.config.validate().map_err(|reason| QueueError::Config {
            path: self.config.store_path.clone(),
            reason,
        })?;

        let config = self.config;
        let clock = self.clock;
        let durable = self
            .store
            .unwrap_or_else(|| Arc::new(JsonFileStore::new(&config.store_path)));
        let decider = self.decider.unwrap_or_else(|| {
            let backoff = self
                .backoff
                .unwrap_or_else(|| Arc::new(ExponentialBackoff::from(&config.backoff)));
            Arc::new(RetryDecider::new(backoff))
        });
        let ids = self
            .ids
            .unwrap_or_else(|| Arc::new(UlidGenerator::new(Arc::clone(&clock))));

        let (store, _report) = JobStore::open(durable, clock.now(), config.retention);
        tracing::info!(
            handlers = ?self.registry.registered_types(),
            max_concurrent = config.max_concurrent,
            "job queue ready"
        );

        let shared = Shared::new(store, self.registry, decider, clock, config.max_concurrent);
        Ok(JobQueue::new(
            Arc::new(shared),
            ids,
            config.default_max_attempts,
            config.poll_interval,
        ))
    }
}

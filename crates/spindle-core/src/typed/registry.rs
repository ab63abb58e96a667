//! HandlerRegistry - job type to handler lookup.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use super::handler::{DynHandler, FnHandler, Handler, JobContext, TypedHandler};
use super::job_kind::JobKind;
use crate::error::HandlerError;

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("handler for job type '{0}' is already registered")]
    AlreadyRegistered(String),
}

/// At most one handler per job type. Built before the queue starts and
/// read-only afterwards.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn DynHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<K: JobKind, H: Handler<K> + 'static>(&mut self, handler: H) -> Result<(), RegistryError> {
        self.register_dyn(K::TYPE, TypedHandler::<K, H>::new(handler))
    }

    pub fn register_dyn(
        &mut self,
        job_type: impl Into<String>,
        handler: impl DynHandler + 'static,
    ) -> Result<(), RegistryError> {
        let job_type = job_type.into();
        if self.handlers.contains_key(&job_type) {
            return Err(RegistryError::AlreadyRegistered(job_type));
        }
        self.handlers.insert(job_type, Arc::new(handler));
        Ok(())
    }

    /// Register an async closure over the raw JSON payload.
    pub fn register_fn<F, Fut>(&mut self, job_type: impl Into<String>, f: F) -> Result<(), RegistryError>
    where
        F: Fn(JobContext, serde_json::Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
    {
        self.register_dyn(job_type, FnHandler::new(f))
    }

    pub fn get(&self, job_type: &str) -> Option<Arc<dyn DynHandler>> {
        self.handlers.get(job_type).cloned()
    }

    pub fn contains(&self, job_type: &str) -> bool {
        self.handlers.contains_key(job_type)
    }

    /// Sorted, for stable log output.
    pub fn registered_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.handlers.keys().cloned().collect();
        types.sort();
        types
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

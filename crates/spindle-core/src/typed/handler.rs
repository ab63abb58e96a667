//! Handlers: the typed surface (`Handler<K>`) and the erased one the
//! dispatcher calls (`DynHandler`).

use std::future::Future;
use std::marker::PhantomData;

use async_trait::async_trait;

use super::job_kind::JobKind;
use crate::domain::{Job, JobId, JobType};
use crate::error::HandlerError;

/// What a handler gets to know about the job it is running.
///
/// This is a copy; changing it has no effect on the stored job.
#[derive(Debug, Clone, PartialEq)]
pub struct JobContext {
    pub job_id: JobId,
    pub job_type: JobType,
    pub provider: String,
    pub publication_id: Option<String>,
    pub token_id: Option<String>,
    /// 1-based number of the attempt in progress.
    pub attempt: u32,
}

impl JobContext {
    pub fn from_job(job: &Job) -> Self {
        Self {
            job_id: job.id.clone(),
            job_type: job.job_type.clone(),
            provider: job.provider.clone(),
            publication_id: job.publication_id.clone(),
            token_id: job.token_id.clone(),
            attempt: job.attempts,
        }
    }
}

/// Runs one attempt of a typed job. `Err` is always treated as transient.
#[async_trait]
pub trait Handler<K: JobKind>: Send + Sync {
    async fn handle(&self, ctx: &JobContext, payload: K) -> Result<(), HandlerError>;
}

/// Object-safe handler over raw JSON payloads.
#[async_trait]
pub trait DynHandler: Send + Sync {
    async fn handle_dyn(&self, ctx: &JobContext, payload: serde_json::Value) -> Result<(), HandlerError>;
}

/// Adapts a `Handler<K>` to `DynHandler` by decoding the payload first.
pub struct TypedHandler<K: JobKind, H: Handler<K>> {
    handler: H,
    _marker: PhantomData<fn() -> K>,
}

impl<K: JobKind, H: Handler<K>> TypedHandler<K, H> {
    pub fn new(handler: H) -> Self {
        Self {
            handler,
            _marker: PhantomData,
        }
    }
}

#[async_trait]
impl<K: JobKind, H: Handler<K>> DynHandler for TypedHandler<K, H> {
    async fn handle_dyn(&self, ctx: &JobContext, payload: serde_json::Value) -> Result<(), HandlerError> {
        let payload: K = serde_json::from_value(payload).map_err(|source| HandlerError::Decode {
            job_type: K::TYPE.to_string(),
            source,
        })?;
        self.handler.handle(ctx, payload).await
    }
}

/// Closure handler over the raw payload.
pub struct FnHandler<F> {
    f: F,
}

impl<F> FnHandler<F> {
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F, Fut> DynHandler for FnHandler<F>
where
    F: Fn(JobContext, serde_json::Value) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
{
    async fn handle_dyn(&self, ctx: &JobContext, payload: serde_json::Value) -> Result<(), HandlerError> {
        (self.f)(ctx.clone(), payload).await
    }
}

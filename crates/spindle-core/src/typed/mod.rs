//! Typed - handler registration keyed by job type.
//!
//! - **Typed surface**: `JobKind` + `Handler<K>`; the payload type fixes the job type
//! - **Erased surface**: `DynHandler` over raw JSON, what the dispatcher stores and calls
//!
//! Closures can be registered directly with `HandlerRegistry::register_fn`.

pub mod handler;
pub mod job_kind;
pub mod registry;

pub use self::handler::{DynHandler, FnHandler, Handler, JobContext, TypedHandler};
pub use self::job_kind::JobKind;
pub use self::registry::{HandlerRegistry, RegistryError};

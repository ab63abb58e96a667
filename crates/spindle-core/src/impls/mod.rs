//! Impls - concrete implementations of the ports.
//!
//! - **JsonFileStore**: atomic single-file persistence (production default)
//! - **MemoryStore**: in-memory snapshot, for tests and non-durable use
//! - **ExponentialBackoff** / **FixedBackoff**: retry delay policies

pub mod backoff;
pub mod file_store;
pub mod memory_store;

pub use self::backoff::{ExponentialBackoff, FixedBackoff};
pub use self::file_store::JsonFileStore;
pub use self::memory_store::MemoryStore;

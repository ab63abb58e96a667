//! Ports - the seams between the queue and the outside world.
//!
//! Each trait here is implemented either in `impls` (file store, backoff
//! policies) or by the embedding application (generation status sources).

pub mod backoff;
pub mod clock;
pub mod durable_store;
pub mod generation_source;
pub mod id_generator;

pub use self::backoff::Backoff;
pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::durable_store::DurableStore;
pub use self::generation_source::GenerationSource;
pub use self::id_generator::{IdGenerator, UlidGenerator};

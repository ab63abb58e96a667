//! Queue state: the job set, its persistence mirror, listing and startup
//! recovery.

pub mod query;
pub mod recovery;
pub mod store;

pub use self::query::JobFilter;
pub use self::store::{JobStore, OpenReport};

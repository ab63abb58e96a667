//! IdGenerator port - job id generation.
//!
//! New ids are ULIDs stamped from the injected [`Clock`], so a pinned clock gives
//! ids with a known timestamp part (the random part still differs).

use ulid::Ulid;

use crate::domain::JobId;
use crate::ports::Clock;

pub trait IdGenerator: Send + Sync {
    fn generate_job_id(&self) -> JobId;
}

/// ULID generator driven by a [`Clock`].
pub struct UlidGenerator<C> {
    clock: C,
}

impl<C: Clock> UlidGenerator<C> {
    pub fn new(clock: C) -> Self {
        Self { clock }
    }
}

impl<C: Clock> IdGenerator for UlidGenerator<C> {
    fn generate_job_id(&self) -> JobId {
        let timestamp_ms = self.clock.now().timestamp_millis().max(0) as u64;
        JobId::from(Ulid::from_parts(timestamp_ms, rand::random()))
    }
}

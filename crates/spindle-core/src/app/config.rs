//! Queue configuration.
//!
//! Every field has a default, so a config file only needs the keys it
//! overrides:
//!
//! ```json
//! { "store_path": "/var/lib/app/jobs.json", "max_concurrent": 4 }
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::DEFAULT_MAX_ATTEMPTS;
use crate::error::QueueError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    pub store_path: PathBuf,
    /// Upper bound on handlers in flight.
    pub max_concurrent: usize,
    #[serde(rename = "poll_interval_ms", with = "millis")]
    pub poll_interval: Duration,
    /// How long completed and dead jobs are kept.
    #[serde(rename = "retention_secs", with = "secs")]
    pub retention: Duration,
    pub default_max_attempts: u32,
    pub backoff: BackoffConfig,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            store_path: PathBuf::from("data/jobs.json"),
            max_concurrent: 2,
            poll_interval: Duration::from_secs(10),
            retention: Duration::from_secs(7 * 24 * 60 * 60),
            default_max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff: BackoffConfig::default(),
        }
    }
}

impl QueueConfig {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, QueueError> {
        let path = path.as_ref();
        let invalid = |reason: String| QueueError::Config {
            path: path.to_path_buf(),
            reason,
        };

        let raw = std::fs::read_to_string(path).map_err(|e| invalid(e.to_string()))?;
        let config: Self = serde_json::from_str(&raw).map_err(|e| invalid(e.to_string()))?;
        config.validate().map_err(invalid)?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.max_concurrent == 0 {
            return Err("max_concurrent must be at least 1".into());
        }
        if self.poll_interval.is_zero() {
            return Err("poll_interval_ms must be positive".into());
        }
        if !self.backoff.multiplier.is_finite() || self.backoff.multiplier < 1.0 {
            return Err(format!("backoff.multiplier must be >= 1.0, got {}", self.backoff.multiplier));
        }
        Ok(())
    }
}

/// Parameters for `ExponentialBackoff`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffConfig {
    pub base_ms: u64,
    pub multiplier: f64,
    pub max_ms: u64,
    /// Fraction of the delay added as random jitter.
    pub jitter: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base_ms: 5_000,
            multiplier: 2.0,
            max_ms: 15 * 60 * 1_000,
            jitter: 0.1,
        }
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

mod secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_secs)
    }
}

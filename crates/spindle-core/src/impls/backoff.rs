//! Backoff policies.

use std::time::Duration;

use rand::Rng;

use crate::app::config::BackoffConfig;
use crate::ports::Backoff;

/// Exponential backoff with bounded, non-overlapping jitter.
///
/// `delay(n) = min(max, base * multiplier^(n-1))`, then up to
/// `jitter * delay` of random extra time, capped at `max` again.
///
/// With base 5s and multiplier 2.0:
/// - attempt 1: 5s (+ up to 0.5s)
/// - attempt 2: 10s (+ up to 1s)
/// - attempt 3: 20s (+ up to 2s)
///
/// The jitter fraction is clamped to `multiplier - 1`, so the jittered
/// range of attempt `n` never overlaps attempt `n + 1` and the sequence
/// stays non-decreasing.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    pub base: Duration,
    pub multiplier: f64,
    pub max: Duration,
    pub jitter: f64,
}

impl ExponentialBackoff {
    pub fn new(base: Duration, multiplier: f64, max: Duration) -> Self {
        Self {
            base,
            multiplier: multiplier.max(1.0),
            max,
            jitter: 0.0,
        }
    }

    pub fn with_jitter(mut self, fraction: f64) -> Self {
        self.jitter = fraction.max(0.0);
        self
    }

    /// Deterministic delays.
    pub fn without_jitter(self) -> Self {
        self.with_jitter(0.0)
    }

    /// The un-jittered delay for `attempt` (1-indexed; 0 behaves like 1).
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let secs = self.base.as_secs_f64() * self.multiplier.powi(exponent);
        Duration::try_from_secs_f64(secs)
            .unwrap_or(self.max)
            .min(self.max)
    }

    fn effective_jitter(&self) -> f64 {
        self.jitter.min(self.multiplier - 1.0).max(0.0)
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self::from(&BackoffConfig::default())
    }
}

impl From<&BackoffConfig> for ExponentialBackoff {
    fn from(config: &BackoffConfig) -> Self {
        Self::new(
            Duration::from_millis(config.base_ms),
            config.multiplier,
            Duration::from_millis(config.max_ms),
        )
        .with_jitter(config.jitter)
    }
}

impl Backoff for ExponentialBackoff {
    fn delay(&self, attempt: u32) -> Duration {
        let delay = self.base_delay(attempt);
        let jitter = self.effective_jitter();
        if jitter == 0.0 || delay >= self.max {
            return delay;
        }
        let extra = rand::thread_rng().gen_range(0.0..=jitter);
        delay.mul_f64(1.0 + extra).min(self.max)
    }
}

/// The same delay for every attempt.
#[derive(Debug, Clone, Copy)]
pub struct FixedBackoff {
    delay: Duration,
}

impl FixedBackoff {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl Backoff for FixedBackoff {
    fn delay(&self, _attempt: u32) -> Duration {
        self.delay
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain() -> ExponentialBackoff {
        ExponentialBackoff::new(Duration::from_secs(5), 2.0, Duration::from_secs(60))
    }

    #[test]
    fn default_policy_has_reasonable_values() {
        let policy = ExponentialBackoff::default();
        assert_eq!(policy.base, Duration::from_secs(5));
        assert_eq!(policy.multiplier, 2.0);
        assert_eq!(policy.max, Duration::from_secs(15 * 60));
    }

    #[test]
    fn exponential_backoff_increases() {
        let policy = plain();
        assert_eq!(policy.delay(1), Duration::from_secs(5));
        assert_eq!(policy.delay(2), Duration::from_secs(10));
        assert_eq!(policy.delay(3), Duration::from_secs(20));
        assert_eq!(policy.delay(0), policy.delay(1));
    }

    #[test]
    fn delay_is_capped() {
        let policy = plain();
        assert_eq!(policy.delay(5), Duration::from_secs(60));
        assert_eq!(policy.delay(u32::MAX), Duration::from_secs(60));
    }

    #[test]
    fn jittered_delays_stay_in_range_and_non_decreasing() {
        let policy = plain().with_jitter(0.5);
        let mut previous = Duration::ZERO;
        for attempt in 1..=8 {
            let base = policy.base_delay(attempt);
            let d = policy.delay(attempt);
            assert!(d >= base);
            assert!(d <= base.mul_f64(1.5).min(policy.max));
            assert!(d >= previous);
            previous = d;
        }
    }

    #[test]
    fn oversized_jitter_is_clamped() {
        let policy = ExponentialBackoff::new(Duration::from_secs(1), 1.5, Duration::from_secs(600))
            .with_jitter(3.0);
        for _ in 0..50 {
            assert!(policy.delay(1) <= policy.base_delay(2));
        }
    }

    #[test]
    fn fixed_backoff_is_constant() {
        let policy = FixedBackoff::new(Duration::from_millis(250));
        assert_eq!(policy.delay(1), policy.delay(9));
    }
}

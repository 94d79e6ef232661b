//! Exponential backoff for connection and delivery retries.
//!
//! Each worker owns one [`Backoff`] timer. The delay starts at the policy
//! floor, grows by the multiplier on every failed attempt up to the
//! ceiling, and resets to the floor on any successful connect or delivery.
//! Optional jitter spreads reconnect storms across workers; it defaults to
//! off so the documented doubling sequence holds exactly.

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{DriverError, Result};

/// Backoff configuration for a driver's workers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackoffPolicy {
    /// Initial (and post-reset) delay between attempts.
    pub floor: Duration,

    /// Upper bound the delay never exceeds.
    pub ceiling: Duration,

    /// Growth factor applied after each failed attempt.
    pub multiplier: u32,

    /// Jitter percentage (0.0 to 1.0) randomizing each delay. 0.0 keeps
    /// the sequence deterministic.
    pub jitter_factor: f64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            floor: Duration::from_secs(1),
            ceiling: Duration::from_secs(64),
            multiplier: 2,
            jitter_factor: 0.0,
        }
    }
}

impl BackoffPolicy {
    /// Validates the policy bounds.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the floor is zero, the ceiling is
    /// below the floor, the multiplier is below 1, or the jitter factor is
    /// outside `[0.0, 1.0]`.
    pub fn validate(&self) -> Result<()> {
        if self.floor.is_zero() {
            return Err(DriverError::config("backoff floor must be greater than zero"));
        }
        if self.ceiling < self.floor {
            return Err(DriverError::config("backoff ceiling must not be below the floor"));
        }
        if self.multiplier < 1 {
            return Err(DriverError::config("backoff multiplier must be at least 1"));
        }
        if !(0.0..=1.0).contains(&self.jitter_factor) {
            return Err(DriverError::config("backoff jitter factor must be within 0.0..=1.0"));
        }
        Ok(())
    }
}

/// Mutable backoff state for one worker.
#[derive(Debug, Clone)]
pub struct Backoff {
    policy: BackoffPolicy,
    current: Duration,
}

impl Backoff {
    /// Creates backoff state starting at the policy floor.
    pub fn new(policy: BackoffPolicy) -> Self {
        let current = policy.floor;
        Self { policy, current }
    }

    /// Returns the delay to apply now and advances the internal state for
    /// the next failure.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = (delay * self.policy.multiplier).min(self.policy.ceiling);
        apply_jitter(delay, self.policy.jitter_factor)
    }

    /// The delay the next failure would be charged, before jitter.
    pub fn current_delay(&self) -> Duration {
        self.current
    }

    /// Resets the delay to the policy floor. Called on any successful
    /// connect or delivery.
    pub fn reset(&mut self) {
        self.current = self.policy.floor;
    }
}

/// Randomizes a delay by ±`jitter_factor` to avoid thundering-herd
/// reconnects. With `jitter_factor` 0.25, a 10s delay becomes 7.5s-12.5s.
fn apply_jitter(duration: Duration, jitter_factor: f64) -> Duration {
    if jitter_factor <= 0.0 {
        return duration;
    }

    let clamped_jitter = jitter_factor.clamp(0.0, 1.0);

    let mut rng = rand::rng();
    let jitter_range = duration.as_secs_f64() * clamped_jitter;
    let jitter_offset = rng.random_range(-jitter_range..=jitter_range);
    let jittered_secs = duration.as_secs_f64() + jitter_offset;

    Duration::from_secs_f64(jittered_secs.max(0.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(floor_ms: u64, ceiling_ms: u64) -> BackoffPolicy {
        BackoffPolicy {
            floor: Duration::from_millis(floor_ms),
            ceiling: Duration::from_millis(ceiling_ms),
            multiplier: 2,
            jitter_factor: 0.0,
        }
    }

    #[test]
    fn delay_doubles_from_floor() {
        let mut backoff = Backoff::new(policy(100, 10_000));

        assert_eq!(backoff.next_delay(), Duration::from_millis(100));
        assert_eq!(backoff.next_delay(), Duration::from_millis(200));
        assert_eq!(backoff.next_delay(), Duration::from_millis(400));
        assert_eq!(backoff.next_delay(), Duration::from_millis(800));
    }

    #[test]
    fn delay_caps_at_ceiling() {
        let mut backoff = Backoff::new(policy(100, 250));

        assert_eq!(backoff.next_delay(), Duration::from_millis(100));
        assert_eq!(backoff.next_delay(), Duration::from_millis(200));
        assert_eq!(backoff.next_delay(), Duration::from_millis(250));
        assert_eq!(backoff.next_delay(), Duration::from_millis(250));
    }

    #[test]
    fn reset_returns_to_floor() {
        let mut backoff = Backoff::new(policy(100, 10_000));

        backoff.next_delay();
        backoff.next_delay();
        backoff.reset();

        assert_eq!(backoff.next_delay(), Duration::from_millis(100));
    }

    #[test]
    fn jitter_varies_delay_within_bounds() {
        let base = Duration::from_secs(10);
        let mut seen = std::collections::HashSet::new();

        for _ in 0..20 {
            let jittered = apply_jitter(base, 0.5);
            assert!(jittered >= Duration::from_secs(5), "delay too small: {jittered:?}");
            assert!(jittered <= Duration::from_secs(15), "delay too large: {jittered:?}");
            seen.insert(jittered.as_millis());
        }

        assert!(seen.len() > 1, "jitter should create variation");
    }

    #[test]
    fn zero_jitter_is_identity() {
        let base = Duration::from_millis(1234);
        assert_eq!(apply_jitter(base, 0.0), base);
    }

    #[test]
    fn policy_validation_rejects_bad_bounds() {
        assert!(BackoffPolicy::default().validate().is_ok());

        let zero_floor = BackoffPolicy { floor: Duration::ZERO, ..Default::default() };
        assert!(zero_floor.validate().is_err());

        let inverted = BackoffPolicy {
            floor: Duration::from_secs(10),
            ceiling: Duration::from_secs(1),
            ..Default::default()
        };
        assert!(inverted.validate().is_err());

        let bad_jitter = BackoffPolicy { jitter_factor: 1.5, ..Default::default() };
        assert!(bad_jitter.validate().is_err());
    }
}

/// Reconnect policy: the immutable per-profile tuning knobs
use crate::circuit_breaker::CircuitBreakerConfig;
use std::time::Duration;

/// Reconnect tuning for one connection profile.
///
/// Owned by the connection that uses it; profiles for room categories live
/// in [`crate::presets`].
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    /// Ordered base delays between attempts; attempts past the end reuse
    /// the last entry
    pub delay_table: Vec<Duration>,
    /// Jitter factor in `0.0..=1.0` applied symmetrically around each base
    pub jitter_factor: f64,
    /// Give up after this many consecutive failed attempts
    pub max_attempts: u32,
    /// Consecutive failures that open the circuit
    pub failure_threshold: u32,
    /// How long the circuit stays open
    pub cooldown: Duration,
}

impl ReconnectPolicy {
    pub fn breaker_config(&self) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: self.failure_threshold,
            cooldown: self.cooldown,
        }
    }
}

/// Jittered backoff delays from a per-profile delay table
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;

/// Computes the delay before the next reconnect attempt.
///
/// Attempts past the end of the delay table reuse the last entry. Jitter is
/// symmetric: the result always falls within
/// `[base * (1 - jitter), base * (1 + jitter)]`, clamped to zero.
pub struct BackoffScheduler {
    rng: StdRng,
}

impl BackoffScheduler {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Deterministic scheduler for tests.
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn delay_for(
        &mut self,
        attempt: u32,
        delay_table: &[Duration],
        jitter_factor: f64,
    ) -> Duration {
        let index = (attempt as usize).min(delay_table.len().saturating_sub(1));
        let Some(base) = delay_table.get(index) else {
            return Duration::ZERO;
        };

        let base_ms = base.as_millis() as f64;
        let spread: f64 = self.rng.gen_range(-0.5..=0.5) * 2.0 * jitter_factor;
        let ms = (base_ms + base_ms * spread).round().max(0.0);

        Duration::from_millis(ms as u64)
    }
}

impl Default for BackoffScheduler {
    fn default() -> Self {
        Self::new()
    }
}

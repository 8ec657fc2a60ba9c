/// Circuit breaker gating reconnection attempts
///
/// State transitions:
/// - Closed → Open: when consecutive failures reach the threshold
/// - Open → Closed: implicitly, on the first `can_attempt` after the
///   cooldown has elapsed (failure count resets as a side effect)
///
/// One instance per connection, never shared globally. This component is a
/// pure decision function: it never returns errors and owns no retry policy.
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive failure count that opens the circuit
    pub failure_threshold: u32,
    /// How long the circuit stays open after the last recorded failure
    pub cooldown: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            cooldown: Duration::from_secs(60),
        }
    }
}

/// Read-only view of the breaker for observability and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitSnapshot {
    pub failures: u32,
    pub is_open: bool,
    pub cooldown_remaining: Duration,
}

#[derive(Clone)]
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    state: Arc<RwLock<BreakerState>>,
}

struct BreakerState {
    failures: u32,
    last_failure: Option<Instant>,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            state: Arc::new(RwLock::new(BreakerState {
                failures: 0,
                last_failure: None,
            })),
        }
    }

    /// Whether a connection attempt is currently permitted.
    ///
    /// Once the failure count reaches the threshold, attempts are blocked
    /// until the cooldown has elapsed; the first permitted call after that
    /// resets the failure count (cooldown expiry closes the circuit).
    pub fn can_attempt(&self) -> bool {
        self.can_attempt_at(Instant::now())
    }

    /// `can_attempt` against an explicit clock, so tests can simulate
    /// elapsed time without sleeping.
    pub fn can_attempt_at(&self, now: Instant) -> bool {
        let mut state = self.state.write();

        if state.failures < self.config.failure_threshold {
            return true;
        }

        let elapsed = match state.last_failure {
            Some(last) => now.saturating_duration_since(last),
            None => self.config.cooldown,
        };

        if elapsed >= self.config.cooldown {
            debug!(
                failures = state.failures,
                "circuit cooldown elapsed, closing"
            );
            state.failures = 0;
            state.last_failure = None;
            true
        } else {
            false
        }
    }

    /// Record a failed connection attempt.
    pub fn record_failure(&self) {
        self.record_failure_at(Instant::now())
    }

    pub fn record_failure_at(&self, now: Instant) {
        let mut state = self.state.write();
        state.failures += 1;
        state.last_failure = Some(now);

        if state.failures == self.config.failure_threshold {
            warn!(
                failures = state.failures,
                cooldown_ms = self.config.cooldown.as_millis() as u64,
                "circuit opened"
            );
        }
    }

    /// Record a successful connection. Resets the failure count; idempotent.
    pub fn record_success(&self) {
        let mut state = self.state.write();
        if state.failures > 0 {
            debug!(failures = state.failures, "circuit reset after success");
        }
        state.failures = 0;
        state.last_failure = None;
    }

    pub fn snapshot(&self) -> CircuitSnapshot {
        self.snapshot_at(Instant::now())
    }

    pub fn snapshot_at(&self, now: Instant) -> CircuitSnapshot {
        let state = self.state.read();

        let cooldown_remaining = if state.failures >= self.config.failure_threshold {
            match state.last_failure {
                Some(last) => self
                    .config
                    .cooldown
                    .saturating_sub(now.saturating_duration_since(last)),
                None => Duration::ZERO,
            }
        } else {
            Duration::ZERO
        };

        CircuitSnapshot {
            failures: state.failures,
            is_open: state.failures >= self.config.failure_threshold
                && cooldown_remaining > Duration::ZERO,
            cooldown_remaining,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker(threshold: u32, cooldown: Duration) -> CircuitBreaker {
        CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: threshold,
            cooldown,
        })
    }

    #[test]
    fn test_attempts_allowed_below_threshold() {
        let cb = breaker(3, Duration::from_secs(60));

        assert!(cb.can_attempt());
        cb.record_failure();
        cb.record_failure();
        assert!(cb.can_attempt());
        assert!(!cb.snapshot().is_open);
    }

    #[test]
    fn test_circuit_opens_at_threshold() {
        let cb = breaker(3, Duration::from_secs(60));

        for _ in 0..3 {
            cb.record_failure();
        }

        assert!(!cb.can_attempt());
        let snap = cb.snapshot();
        assert!(snap.is_open);
        assert_eq!(snap.failures, 3);
        assert!(snap.cooldown_remaining > Duration::ZERO);
    }

    #[test]
    fn test_cooldown_expiry_closes_and_resets() {
        // Scenario: threshold=5, cooldown=60s, five failures, then +61s.
        let cb = breaker(5, Duration::from_millis(60_000));
        let start = Instant::now();

        for _ in 0..5 {
            cb.record_failure_at(start);
        }
        assert!(!cb.can_attempt_at(start));
        assert!(!cb.can_attempt_at(start + Duration::from_millis(59_000)));

        let later = start + Duration::from_millis(61_000);
        assert!(cb.can_attempt_at(later));
        // Side effect: failures reset to zero.
        assert_eq!(cb.snapshot_at(later).failures, 0);
        assert!(cb.can_attempt_at(later));
    }

    #[test]
    fn test_success_resets_regardless_of_count() {
        let cb = breaker(3, Duration::from_secs(60));

        for _ in 0..7 {
            cb.record_failure();
        }
        assert!(!cb.can_attempt());

        cb.record_success();
        assert!(cb.can_attempt());
        assert_eq!(cb.snapshot().failures, 0);

        // Idempotent.
        cb.record_success();
        assert_eq!(cb.snapshot().failures, 0);
    }

    #[test]
    fn test_count_may_exceed_threshold_while_open() {
        let cb = breaker(2, Duration::from_secs(60));
        let start = Instant::now();

        for _ in 0..4 {
            cb.record_failure_at(start);
        }
        let snap = cb.snapshot_at(start);
        assert_eq!(snap.failures, 4);
        assert!(snap.is_open);
    }

    #[test]
    fn test_snapshot_cooldown_remaining_counts_down() {
        let cb = breaker(2, Duration::from_millis(1000));
        let start = Instant::now();

        cb.record_failure_at(start);
        cb.record_failure_at(start);

        let snap = cb.snapshot_at(start + Duration::from_millis(400));
        assert_eq!(snap.cooldown_remaining, Duration::from_millis(600));
        assert!(snap.is_open);

        let snap = cb.snapshot_at(start + Duration::from_millis(1000));
        assert_eq!(snap.cooldown_remaining, Duration::ZERO);
        assert!(!snap.is_open);
    }
}

/// Resilience primitives for the session layer
///
/// This library provides the failure-recovery building blocks used by
/// connection reconnect loops:
/// - **Circuit Breaker**: failure-count/cooldown gate preventing
///   reconnection storms
/// - **Backoff Scheduler**: jittered delays from a per-profile delay table
/// - **Reconnect Policy**: immutable tuning knobs, with presets per room
///   category
/// - **Timeout**: time limits for connect attempts
///
/// # Example: gating reconnect attempts
///
/// ```rust
/// use resilience::{presets, BackoffScheduler, CircuitBreaker};
///
/// let policy = presets::chat_policy();
/// let breaker = CircuitBreaker::new(policy.breaker_config());
/// let mut backoff = BackoffScheduler::new();
///
/// if breaker.can_attempt() {
///     let delay = backoff.delay_for(0, &policy.delay_table, policy.jitter_factor);
///     // sleep for `delay`, then attempt to connect
/// }
/// ```
pub mod backoff;
pub mod circuit_breaker;
pub mod policy;
pub mod presets;
pub mod timeout;

// Re-export main types for convenience
pub use backoff::BackoffScheduler;
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitSnapshot};
pub use policy::ReconnectPolicy;
pub use presets::{chat_policy, viewer_presence_policy};
pub use timeout::{with_timeout, TimeoutError};

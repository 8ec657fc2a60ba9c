/// Preset reconnect policies per room category
use crate::policy::ReconnectPolicy;
use std::time::Duration;

/// Chat connections
///
/// - Delays: 1s → 2s → 5s → 10s → 30s
/// - Jitter: ±30% (spreads reconnection storms after a hub restart)
/// - Circuit breaker: 5 failures, 60s cooldown
pub fn chat_policy() -> ReconnectPolicy {
    ReconnectPolicy {
        delay_table: vec![
            Duration::from_secs(1),
            Duration::from_secs(2),
            Duration::from_secs(5),
            Duration::from_secs(10),
            Duration::from_secs(30),
        ],
        jitter_factor: 0.3,
        max_attempts: 10,
        failure_threshold: 5,
        cooldown: Duration::from_secs(60),
    }
}

/// Viewer-presence connections
///
/// Losing a presence connection only skews a counter, so this profile gives
/// up sooner and trips the breaker earlier than chat.
///
/// - Delays: 2s → 5s → 15s
/// - Jitter: ±50%
/// - Circuit breaker: 3 failures, 30s cooldown
pub fn viewer_presence_policy() -> ReconnectPolicy {
    ReconnectPolicy {
        delay_table: vec![
            Duration::from_secs(2),
            Duration::from_secs(5),
            Duration::from_secs(15),
        ],
        jitter_factor: 0.5,
        max_attempts: 6,
        failure_threshold: 3,
        cooldown: Duration::from_secs(30),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_policy() {
        let policy = chat_policy();
        assert_eq!(policy.delay_table.first(), Some(&Duration::from_secs(1)));
        assert_eq!(policy.failure_threshold, 5);
        assert_eq!(policy.cooldown, Duration::from_secs(60));
    }

    #[test]
    fn test_viewer_presence_policy_gives_up_sooner() {
        let chat = chat_policy();
        let presence = viewer_presence_policy();
        assert!(presence.max_attempts < chat.max_attempts);
        assert!(presence.failure_threshold < chat.failure_threshold);
        assert!(presence.cooldown < chat.cooldown);
    }

    #[test]
    fn test_jitter_factors_within_range() {
        for policy in [chat_policy(), viewer_presence_policy()] {
            assert!(policy.jitter_factor >= 0.0 && policy.jitter_factor <= 1.0);
        }
    }
}

use crate::error::SessionError;
use dotenvy::dotenv;
use resilience::{presets, ReconnectPolicy};
use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    /// Out-of-band credential refresh endpoint (ambient cookie credential)
    pub refresh_url: String,
    /// A connect attempt that neither succeeds nor fails within this window
    /// is treated as a network failure
    pub connect_timeout: Duration,
    /// Most-recent-N retention window for ephemeral activity events
    pub activity_retention: usize,
    pub chat_policy: ReconnectPolicy,
    pub presence_policy: ReconnectPolicy,
}

impl Config {
    pub fn from_env() -> Result<Self, SessionError> {
        dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from an arbitrary variable lookup, so parsing is
    /// testable without touching the process environment.
    pub fn from_lookup<F>(get: F) -> Result<Self, SessionError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let refresh_url = get("AUTH_REFRESH_URL")
            .ok_or_else(|| SessionError::Config("AUTH_REFRESH_URL missing".into()))?;

        let connect_timeout = Duration::from_millis(
            get("CONNECT_TIMEOUT_MS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(10_000),
        );

        let activity_retention = get("ACTIVITY_RETENTION")
            .and_then(|s| s.parse().ok())
            .unwrap_or(100);

        let chat_policy = apply_overrides(presets::chat_policy(), "CHAT", &get);
        let presence_policy = apply_overrides(presets::viewer_presence_policy(), "PRESENCE", &get);

        Ok(Self {
            refresh_url,
            connect_timeout,
            activity_retention,
            chat_policy,
            presence_policy,
        })
    }
}

fn apply_overrides<F>(mut policy: ReconnectPolicy, prefix: &str, get: &F) -> ReconnectPolicy
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(threshold) = get(&format!("{prefix}_BREAKER_THRESHOLD")).and_then(|s| s.parse().ok())
    {
        policy.failure_threshold = threshold;
    }
    if let Some(cooldown_ms) =
        get(&format!("{prefix}_BREAKER_COOLDOWN_MS")).and_then(|s| s.parse().ok())
    {
        policy.cooldown = Duration::from_millis(cooldown_ms);
    }
    if let Some(max_attempts) = get(&format!("{prefix}_MAX_ATTEMPTS")).and_then(|s| s.parse().ok())
    {
        policy.max_attempts = max_attempts;
    }
    policy
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup<'a>(vars: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        let map: HashMap<&str, &str> = vars.iter().copied().collect();
        move |key| map.get(key).map(|v| v.to_string())
    }

    #[test]
    fn test_refresh_url_required() {
        let result = Config::from_lookup(lookup(&[]));
        assert!(matches!(result, Err(SessionError::Config(_))));
    }

    #[test]
    fn test_defaults_applied() {
        let config =
            Config::from_lookup(lookup(&[("AUTH_REFRESH_URL", "http://auth/refresh")])).unwrap();

        assert_eq!(config.connect_timeout, Duration::from_millis(10_000));
        assert_eq!(config.activity_retention, 100);
        assert_eq!(config.chat_policy.failure_threshold, 5);
    }

    #[test]
    fn test_policy_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("AUTH_REFRESH_URL", "http://auth/refresh"),
            ("CHAT_BREAKER_THRESHOLD", "9"),
            ("CHAT_BREAKER_COOLDOWN_MS", "5000"),
            ("PRESENCE_MAX_ATTEMPTS", "2"),
        ]))
        .unwrap();

        assert_eq!(config.chat_policy.failure_threshold, 9);
        assert_eq!(config.chat_policy.cooldown, Duration::from_millis(5000));
        assert_eq!(config.presence_policy.max_attempts, 2);
        // Untouched knobs keep preset values.
        assert_eq!(config.presence_policy.failure_threshold, 3);
    }

    #[test]
    fn test_invalid_numeric_falls_back_to_default() {
        let config = Config::from_lookup(lookup(&[
            ("AUTH_REFRESH_URL", "http://auth/refresh"),
            ("CONNECT_TIMEOUT_MS", "not-a-number"),
        ]))
        .unwrap();

        assert_eq!(config.connect_timeout, Duration::from_millis(10_000));
    }
}

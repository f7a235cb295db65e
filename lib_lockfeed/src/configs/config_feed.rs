use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;
use url::Url;

use crate::error::FeedError;

pub const ENV_API_URL: &str = "LOCK_API_URL";
pub const ENV_WS_URL: &str = "LOCK_WS_URL";
pub const ENV_POLL_INTERVAL_MS: &str = "LOCK_POLL_INTERVAL_MS";
pub const ENV_RECONNECT_DELAY_MS: &str = "LOCK_RECONNECT_DELAY_MS";

pub const DEFAULT_API_URL: &str = "http://localhost:3001";
pub const DEFAULT_WS_URL: &str = "ws://localhost:3001/ws";

/// Settings for one `LiveFeed`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// Base URL of the REST API used by the poll channel.
    pub api_url: String,
    /// Full URL of the push endpoint.
    pub ws_url: String,
    #[serde(with = "millis")]
    pub poll_interval: Duration,
    /// Fixed delay between automatic reconnect attempts.
    #[serde(with = "millis")]
    pub reconnect_delay: Duration,
    pub hot_accounts_limit: u32,
    /// Aggregation window passed to `/api/hot-accounts` and `/api/stats`.
    pub window_minutes: u32,
    #[serde(with = "millis")]
    pub request_timeout: Duration,
    pub http_retries: u32,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            ws_url: DEFAULT_WS_URL.to_string(),
            poll_interval: Duration::from_secs(5),
            reconnect_delay: Duration::from_secs(5),
            hot_accounts_limit: 20,
            window_minutes: 5,
            request_timeout: Duration::from_secs(10),
            http_retries: 0,
        }
    }
}

impl FeedConfig {
    /// Defaults overridden by `LOCK_API_URL`, `LOCK_WS_URL`,
    /// `LOCK_POLL_INTERVAL_MS` and `LOCK_RECONNECT_DELAY_MS`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(url) = lookup(ENV_API_URL).filter(|v| !v.trim().is_empty()) {
            config.api_url = url.trim().to_string();
        }
        if let Some(url) = lookup(ENV_WS_URL).filter(|v| !v.trim().is_empty()) {
            config.ws_url = url.trim().to_string();
        }
        if let Some(delay) = parse_millis(ENV_POLL_INTERVAL_MS, lookup(ENV_POLL_INTERVAL_MS)) {
            config.poll_interval = delay;
        }
        if let Some(delay) = parse_millis(ENV_RECONNECT_DELAY_MS, lookup(ENV_RECONNECT_DELAY_MS)) {
            config.reconnect_delay = delay;
        }

        config
    }

    /// Checks that both endpoints parse as absolute URLs and that the poll
    /// interval is non-zero.
    pub fn validate(&self) -> Result<(), FeedError> {
        if self.poll_interval.is_zero() {
            return Err(FeedError::ZeroPollInterval);
        }
        for raw in [&self.api_url, &self.ws_url] {
            Url::parse(raw).map_err(|source| FeedError::InvalidUrl {
                url: raw.clone(),
                source,
            })?;
        }
        Ok(())
    }
}

/// Zero and unparsable values keep the default.
fn parse_millis(key: &str, value: Option<String>) -> Option<Duration> {
    let value = value?;
    match value.trim().parse::<u64>() {
        Ok(ms) if ms > 0 => Some(Duration::from_millis(ms)),
        _ => {
            warn!(key, value = %value, "ignoring invalid duration");
            None
        }
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_point_at_local_dev_endpoints() {
        let config = FeedConfig::from_lookup(lookup(&[]));
        assert_eq!(config, FeedConfig::default());
        assert_eq!(config.api_url, "http://localhost:3001");
        assert_eq!(config.ws_url, "ws://localhost:3001/ws");
        assert_eq!(config.poll_interval, Duration::from_secs(5));
        assert_eq!(config.reconnect_delay, Duration::from_secs(5));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let config = FeedConfig::from_lookup(lookup(&[
            (ENV_API_URL, "https://lock.example.com"),
            (ENV_WS_URL, " wss://lock.example.com/ws "),
            (ENV_POLL_INTERVAL_MS, "2500"),
            (ENV_RECONNECT_DELAY_MS, "750"),
        ]));
        assert_eq!(config.api_url, "https://lock.example.com");
        assert_eq!(config.ws_url, "wss://lock.example.com/ws");
        assert_eq!(config.poll_interval, Duration::from_millis(2500));
        assert_eq!(config.reconnect_delay, Duration::from_millis(750));
    }

    #[test]
    fn test_bad_values_keep_defaults() {
        let config = FeedConfig::from_lookup(lookup(&[
            (ENV_API_URL, "   "),
            (ENV_POLL_INTERVAL_MS, "soon"),
            (ENV_RECONNECT_DELAY_MS, "0"),
        ]));
        assert_eq!(config, FeedConfig::default());
    }

    #[test]
    fn test_validate_rejects_relative_url() {
        let config = FeedConfig {
            ws_url: "localhost/ws".to_string(),
            ..FeedConfig::default()
        };
        match config.validate() {
            Err(FeedError::InvalidUrl { url, .. }) => assert_eq!(url, "localhost/ws"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_validate_rejects_zero_poll_interval() {
        let config: FeedConfig = serde_json::from_str(r#"{"poll_interval":0}"#).unwrap();
        assert_eq!(config.poll_interval, Duration::ZERO);
        assert!(matches!(config.validate(), Err(FeedError::ZeroPollInterval)));

        let config = FeedConfig {
            reconnect_delay: Duration::ZERO,
            ..FeedConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config: FeedConfig = serde_json::from_str(r#"{"poll_interval":1000,"hot_accounts_limit":50}"#).unwrap();
        assert_eq!(config.poll_interval, Duration::from_secs(1));
        assert_eq!(config.hot_accounts_limit, 50);
        assert_eq!(config.ws_url, DEFAULT_WS_URL);
    }
}

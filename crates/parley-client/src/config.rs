//! Client configuration loaded from environment variables.
//!
//! Every setting has a default suitable for a backend running locally, so
//! the client starts with zero configuration during development.

use std::time::Duration;

use parley_net::RealtimeConfig;
use parley_shared::constants::{
    DEFAULT_API_URL, DEFAULT_HANDSHAKE_TIMEOUT_SECS, DEFAULT_HISTORY_PAGE_SIZE,
    DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_SOCKET_URL, DEFAULT_TOKEN_BUFFER_MINS,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// REST API base URL.
    /// Env: `PARLEY_API_URL`
    pub api_url: String,

    /// Broker WebSocket endpoint.
    /// Env: `PARLEY_SOCKET_URL`
    pub socket_url: String,

    /// Env: `PARLEY_REQUEST_TIMEOUT_SECS`
    pub request_timeout: Duration,

    /// Access tokens within this window of expiry are refreshed first.
    /// Env: `PARLEY_TOKEN_BUFFER_MINS`
    pub token_buffer: chrono::Duration,

    /// Env: `PARLEY_HANDSHAKE_TIMEOUT_SECS`
    pub handshake_timeout: Duration,

    /// Chat log entries loaded when a room opens.
    /// Env: `PARLEY_HISTORY_PAGE_SIZE`
    pub history_page_size: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            socket_url: DEFAULT_SOCKET_URL.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            token_buffer: chrono::Duration::minutes(DEFAULT_TOKEN_BUFFER_MINS),
            handshake_timeout: Duration::from_secs(DEFAULT_HANDSHAKE_TIMEOUT_SECS),
            history_page_size: DEFAULT_HISTORY_PAGE_SIZE,
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Invalid values are logged and
    /// ignored.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(url) = lookup("PARLEY_API_URL") {
            config.api_url = url;
        }

        if let Some(url) = lookup("PARLEY_SOCKET_URL") {
            config.socket_url = url;
        }

        if let Some(secs) = parse_positive::<u64>(&lookup, "PARLEY_REQUEST_TIMEOUT_SECS") {
            config.request_timeout = Duration::from_secs(secs);
        }

        if let Some(mins) = lookup("PARLEY_TOKEN_BUFFER_MINS") {
            let buffer = mins
                .trim()
                .parse::<i64>()
                .ok()
                .filter(|mins| *mins >= 0)
                .and_then(chrono::Duration::try_minutes);
            match buffer {
                Some(buffer) => config.token_buffer = buffer,
                None => tracing::warn!(
                    value = %mins,
                    "Invalid PARLEY_TOKEN_BUFFER_MINS, using default"
                ),
            }
        }

        if let Some(secs) = parse_positive::<u64>(&lookup, "PARLEY_HANDSHAKE_TIMEOUT_SECS") {
            config.handshake_timeout = Duration::from_secs(secs);
        }

        if let Some(size) = parse_positive::<u32>(&lookup, "PARLEY_HISTORY_PAGE_SIZE") {
            config.history_page_size = size;
        }

        config
    }

    pub fn realtime(&self) -> RealtimeConfig {
        RealtimeConfig {
            endpoint: self.socket_url.clone(),
            handshake_timeout: self.handshake_timeout,
        }
    }
}

fn parse_positive<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T>
where
    T: std::str::FromStr + PartialOrd + Default,
{
    let raw = lookup(key)?;
    match raw.trim().parse::<T>() {
        Ok(value) if value > T::default() => Some(value),
        _ => {
            tracing::warn!(key, value = %raw, "Invalid value, using default");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ClientConfig::from_lookup(lookup(&[]));
        assert_eq!(config, ClientConfig::default());
        assert_eq!(config.api_url, "http://localhost:8080");
        assert_eq!(config.socket_url, "ws://localhost:8080/ws");
        assert_eq!(config.request_timeout, Duration::from_secs(10));
        assert_eq!(config.token_buffer, chrono::Duration::minutes(3));
        assert_eq!(config.handshake_timeout, Duration::from_secs(10));
        assert_eq!(config.history_page_size, 50);
    }

    #[test]
    fn test_overrides() {
        let config = ClientConfig::from_lookup(lookup(&[
            ("PARLEY_API_URL", "https://api.example.com"),
            ("PARLEY_SOCKET_URL", "wss://api.example.com/ws"),
            ("PARLEY_REQUEST_TIMEOUT_SECS", "30"),
            ("PARLEY_TOKEN_BUFFER_MINS", "0"),
            ("PARLEY_HANDSHAKE_TIMEOUT_SECS", "5"),
            ("PARLEY_HISTORY_PAGE_SIZE", "20"),
        ]));
        assert_eq!(config.api_url, "https://api.example.com");
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.token_buffer, chrono::Duration::zero());
        assert_eq!(config.history_page_size, 20);

        let realtime = config.realtime();
        assert_eq!(realtime.endpoint, "wss://api.example.com/ws");
        assert_eq!(realtime.handshake_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_invalid_values_ignored() {
        let config = ClientConfig::from_lookup(lookup(&[
            ("PARLEY_REQUEST_TIMEOUT_SECS", "soon"),
            ("PARLEY_TOKEN_BUFFER_MINS", "-1"),
            ("PARLEY_HANDSHAKE_TIMEOUT_SECS", "0"),
            ("PARLEY_HISTORY_PAGE_SIZE", "many"),
        ]));
        assert_eq!(config, ClientConfig::default());
    }

    #[test]
    fn test_out_of_range_token_buffer_ignored() {
        let config = ClientConfig::from_lookup(lookup(&[(
            "PARLEY_TOKEN_BUFFER_MINS",
            "999999999999999",
        )]));
        assert_eq!(config.token_buffer, chrono::Duration::minutes(3));
    }
}

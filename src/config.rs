use std::env;
use std::time::Duration;

use tracing::warn;

/// Connection settings for the REST and push endpoints.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the REST API, without a trailing slash.
    pub api_base: String,
    /// WebSocket endpoint carrying vote updates.
    pub ws_url: String,
    /// Bounded wait for every fetch and submit request.
    pub request_timeout: Duration,
    pub channel: ChannelConfig,
}

/// Reconnect behavior of the live channel.
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Bounded wait for the transport connect step before it counts as a
    /// failed attempt.
    pub connect_timeout: Duration,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    /// Consecutive failed attempts before the channel reports itself
    /// degraded. The counter resets whenever a subscription is established.
    pub max_attempts: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            api_base: "http://localhost:8080/api".to_string(),
            ws_url: "ws://localhost:8080/api/ws".to_string(),
            request_timeout: Duration::from_secs(10),
            channel: ChannelConfig::default(),
        }
    }
}

impl Default for ChannelConfig {
    fn default() -> Self {
        ChannelConfig {
            connect_timeout: Duration::from_secs(5),
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(30),
            max_attempts: 10,
        }
    }
}

impl ClientConfig {
    /// Build a config from `POLLSYNC_API_URL` and `POLLSYNC_WS_URL`,
    /// falling back to the defaults for anything unset.
    pub fn from_env() -> Self {
        let mut config = ClientConfig::default();
        if let Some(url) = env_url("POLLSYNC_API_URL") {
            config.api_base = url.trim_end_matches('/').to_string();
        }
        if let Some(url) = env_url("POLLSYNC_WS_URL") {
            config.ws_url = url;
        }
        config
    }
}

fn env_url(key: &str) -> Option<String> {
    match env::var(key) {
        Ok(value) if !value.trim().is_empty() => Some(value.trim().to_string()),
        Ok(_) => {
            warn!("{key} is set but empty, using default");
            None
        }
        Err(_) => None,
    }
}

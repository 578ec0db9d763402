// ABOUTME: Serializable client-side settings, loadable via config::load and fed into ClientConfig

use crate::client::{BackoffConfig, ClientConfig, QueuePolicy};
use crate::constants::{
    DEFAULT_AUTH_QUERY_PARAM, DEFAULT_INITIAL_RECONNECT_DELAY_MS, DEFAULT_MAX_PENDING_REQUESTS,
    DEFAULT_MAX_RECONNECT_ATTEMPTS, DEFAULT_MAX_RECONNECT_DELAY_MS, DEFAULT_QUEUE_CAPACITY, DEFAULT_REQUEST_TIMEOUT_MS,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientSettings {
    pub url: String,
    pub auth_query_param: String,
    pub initial_reconnect_delay_ms: u64,
    pub max_reconnect_delay_ms: u64,
    pub max_reconnect_attempts: u32,
    pub queue_capacity: usize,
    pub max_pending_requests: usize,
    pub request_timeout_ms: u64,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            url: String::new(),
            auth_query_param: DEFAULT_AUTH_QUERY_PARAM.to_string(),
            initial_reconnect_delay_ms: DEFAULT_INITIAL_RECONNECT_DELAY_MS,
            max_reconnect_delay_ms: DEFAULT_MAX_RECONNECT_DELAY_MS,
            max_reconnect_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            max_pending_requests: DEFAULT_MAX_PENDING_REQUESTS,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
        }
    }
}

impl ClientSettings {
    pub fn into_client_config(self) -> ClientConfig {
        let mut config = ClientConfig::new(self.url);
        config.backoff = BackoffConfig {
            initial_delay_ms: self.initial_reconnect_delay_ms,
            max_delay_ms: self.max_reconnect_delay_ms,
            max_attempts: self.max_reconnect_attempts,
            jitter: crate::client::state::JitterMode::Full,
        };
        config.queue_policy = QueuePolicy::DropOldest;
        config.queue_capacity = self.queue_capacity;
        config.max_pending_requests = self.max_pending_requests;
        config.request_timeout_ms = self.request_timeout_ms;
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_client_config_carries_url_through() {
        let settings = ClientSettings {
            url: "wss://host/ws".to_string(),
            ..ClientSettings::default()
        };
        let config = settings.into_client_config();
        assert_eq!(config.url, "wss://host/ws");
    }
}

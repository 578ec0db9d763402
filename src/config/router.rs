// ABOUTME: Serializable router-side settings, loadable via config::load and fed into Router/PubSubConfig

use crate::constants::DEFAULT_MAX_TOPICS_PER_CONNECTION;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterSettings {
    pub max_topics_per_connection: usize,
}

impl Default for RouterSettings {
    fn default() -> Self {
        Self {
            max_topics_per_connection: DEFAULT_MAX_TOPICS_PER_CONNECTION,
        }
    }
}

impl RouterSettings {
    pub fn into_pubsub_config(self) -> crate::pubsub::PubSubConfig {
        crate::pubsub::PubSubConfig {
            max_topics_per_connection: self.max_topics_per_connection,
        }
    }
}

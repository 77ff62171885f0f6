use serde::{Deserialize, Serialize};

/// Notification bus configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifierConfig {
    /// Capacity of each stateful topic queue. `publish` waits when full.
    #[serde(default = "default_topic_buffer")]
    pub topic_buffer: usize,
}

fn default_topic_buffer() -> usize { 32 }

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            topic_buffer: default_topic_buffer(),
        }
    }
}

impl From<&dockyard_core::config::NotifierSettings> for NotifierConfig {
    fn from(settings: &dockyard_core::config::NotifierSettings) -> Self {
        Self {
            topic_buffer: settings.topic_buffer,
        }
    }
}

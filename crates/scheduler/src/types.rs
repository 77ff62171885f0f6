use serde::{Deserialize, Serialize};

use crate::error::SchedulerError;

/// Scheduler configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Capacity of the stats, self-unschedule and tick queues.
    #[serde(default = "default_queue_size")]
    pub queue_size: usize,
}

fn default_queue_size() -> usize { 10 }

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            queue_size: default_queue_size(),
        }
    }
}

impl SchedulerConfig {
    pub fn validate(&self) -> Result<(), SchedulerError> {
        if self.queue_size == 0 {
            return Err(SchedulerError::EmptyConfiguration);
        }
        Ok(())
    }
}

impl From<&dockyard_core::config::SchedulerSettings> for SchedulerConfig {
    fn from(settings: &dockyard_core::config::SchedulerSettings) -> Self {
        Self {
            queue_size: settings.queue_size,
        }
    }
}

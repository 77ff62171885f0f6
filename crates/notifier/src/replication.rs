use std::collections::HashMap;
use std::sync::Arc;

use tokio::runtime::Handle;
use tracing::info;

use dockyard_scheduler::{Task, TaskError};

use crate::bus::NotificationBus;
use crate::notification::StartReplicationNotification;
use crate::topics;

/// Scheduled task that asks replication to start a given policy.
pub struct StartReplicationTask {
    policy_id: i64,
    metadata: HashMap<String, serde_json::Value>,
    bus: Arc<NotificationBus>,
    runtime: Handle,
}

impl StartReplicationTask {
    /// Must be called inside a Tokio runtime; publishing happens on it.
    pub fn new(policy_id: i64, bus: Arc<NotificationBus>) -> Self {
        Self {
            policy_id,
            metadata: HashMap::new(),
            bus,
            runtime: Handle::current(),
        }
    }

    pub fn with_metadata(mut self, metadata: HashMap<String, serde_json::Value>) -> Self {
        self.metadata = metadata;
        self
    }
}

impl Task for StartReplicationTask {
    fn name(&self) -> &str {
        "start_replication"
    }

    /// Runs on a blocking worker thread, so blocking on the publish is safe.
    fn run(&self) -> Result<(), TaskError> {
        let notification = StartReplicationNotification {
            policy_id: self.policy_id,
            metadata: self.metadata.clone(),
        };
        self.runtime
            .block_on(self.bus.publish(topics::START_REPLICATION, notification))
            .map_err(TaskError::from_source)?;
        info!(policy_id = self.policy_id, "replication start requested");
        Ok(())
    }
}

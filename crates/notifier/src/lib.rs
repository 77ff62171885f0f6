//! Topic notification bus and the handlers that reprogram the scheduler.

pub mod bus;
pub mod config;
pub mod config_watcher;
pub mod error;
pub mod handler;
pub mod handlers;
pub mod notification;
pub mod replication;
pub mod topics;

use std::sync::Arc;

use dockyard_scheduler::{ImageScanner, Scheduler};

pub use bus::NotificationBus;
pub use config::NotifierConfig;
pub use config_watcher::{load_configuration, watch_config_changes};
pub use error::{HandlerError, NotifierError};
pub use handler::NotificationHandler;
pub use handlers::{ScanPolicyHandler, ALTERNATE_POLICY_NAME};
pub use notification::{
    ImageNotification, Notification, ScanPolicyNotification, ScanPolicyType,
    StartReplicationNotification,
};
pub use replication::StartReplicationTask;

/// Subscribe the built-in handlers. Call once at process start.
pub fn register_default_handlers(
    bus: &NotificationBus,
    scheduler: Scheduler,
    scanner: Arc<dyn ImageScanner>,
) -> Result<(), NotifierError> {
    bus.subscribe(
        topics::SCAN_ALL_POLICY,
        Arc::new(ScanPolicyHandler::new(scheduler, scanner)),
    )
}

use async_trait::async_trait;

use crate::error::HandlerError;
use crate::notification::Notification;

/// Consumer of notifications published on a topic.
#[async_trait]
pub trait NotificationHandler: Send + Sync {
    /// Stable key used to deduplicate subscriptions and to unsubscribe.
    fn identity(&self) -> &str;

    /// Stateful handlers on a topic share one worker and see values in
    /// publish order. Stateless handlers run concurrently.
    fn is_stateful(&self) -> bool;

    /// Process one value. Errors are logged by the bus.
    async fn handle(&self, value: &Notification) -> Result<(), HandlerError>;
}

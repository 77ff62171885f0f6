use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use dockyard_scheduler::{
    AlternatePolicy, AlternatePolicyConfiguration, ImageScanner, Policy, ScanAllImagesTask,
    Scheduler, SchedulerError,
};

use crate::error::HandlerError;
use crate::handler::NotificationHandler;
use crate::notification::{Notification, ScanPolicyNotification, ScanPolicyType};

/// Name under which the daily scan-all policy is scheduled.
pub const ALTERNATE_POLICY_NAME: &str = "Alternate Policy";

/// Reprograms the scheduler when the scan-all policy setting changes.
pub struct ScanPolicyHandler {
    scheduler: Scheduler,
    scanner: Arc<dyn ImageScanner>,
}

impl ScanPolicyHandler {
    pub fn new(scheduler: Scheduler, scanner: Arc<dyn ImageScanner>) -> Self {
        Self { scheduler, scanner }
    }

    fn build_policy(&self, daily_time: i64) -> Result<Arc<AlternatePolicy>, HandlerError> {
        let policy = AlternatePolicy::new(
            ALTERNATE_POLICY_NAME,
            AlternatePolicyConfiguration::daily(daily_time),
        )?;
        policy.attach_tasks(vec![Arc::new(ScanAllImagesTask::new(Arc::clone(&self.scanner)))])?;
        Ok(Arc::new(policy))
    }

    async fn apply(&self, notification: &ScanPolicyNotification) -> Result<(), HandlerError> {
        let scheduled = self.scheduler.has_scheduled(ALTERNATE_POLICY_NAME);

        if notification.kind != ScanPolicyType::Daily {
            if scheduled {
                self.scheduler.unschedule(ALTERNATE_POLICY_NAME).await?;
                info!(kind = ?notification.kind, "daily scan policy removed");
            }
            return Ok(());
        }

        let candidate = self.build_policy(notification.daily_time)?;
        if scheduled {
            let current = self
                .scheduler
                .get_policy(ALTERNATE_POLICY_NAME)
                .ok_or(SchedulerError::NilPolicy)?;
            if current.equal(candidate.as_ref()) {
                return Ok(());
            }
            self.scheduler.unschedule(ALTERNATE_POLICY_NAME).await?;
        }

        self.scheduler.schedule(candidate)?;
        info!(daily_time = notification.daily_time, "daily scan policy scheduled");
        Ok(())
    }
}

#[async_trait]
impl NotificationHandler for ScanPolicyHandler {
    fn identity(&self) -> &str {
        "scan_policy_handler"
    }

    fn is_stateful(&self) -> bool {
        true
    }

    async fn handle(&self, value: &Notification) -> Result<(), HandlerError> {
        match value {
            Notification::ScanPolicy(notification) => self.apply(notification).await,
            other => Err(HandlerError::UnexpectedPayload {
                expected: "scan_policy",
                actual: other.kind(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use dockyard_core::clock::seconds_since_midnight;
    use dockyard_scheduler::{SchedulerConfig, TaskError};

    use super::*;

    struct NoopScanner;

    impl ImageScanner for NoopScanner {
        fn scan_all(&self) -> Result<(), TaskError> {
            Ok(())
        }
    }

    fn handler() -> (ScanPolicyHandler, Scheduler) {
        let scheduler = Scheduler::new(SchedulerConfig::default()).unwrap();
        (ScanPolicyHandler::new(scheduler.clone(), Arc::new(NoopScanner)), scheduler)
    }

    fn in_an_hour() -> i64 {
        seconds_since_midnight(Utc::now()) + 3600
    }

    #[tokio::test]
    async fn daily_schedules_and_none_unschedules() {
        let (handler, scheduler) = handler();
        let daily = Notification::from(ScanPolicyNotification::daily(in_an_hour()));

        handler.handle(&daily).await.unwrap();
        assert!(scheduler.has_scheduled(ALTERNATE_POLICY_NAME));

        // Same setting again leaves the policy alone.
        let before = scheduler.get_policy(ALTERNATE_POLICY_NAME).unwrap();
        handler.handle(&daily).await.unwrap();
        let after = scheduler.get_policy(ALTERNATE_POLICY_NAME).unwrap();
        assert!(Arc::ptr_eq(&before, &after));

        handler
            .handle(&Notification::from(ScanPolicyNotification::none()))
            .await
            .unwrap();
        assert!(!scheduler.has_scheduled(ALTERNATE_POLICY_NAME));
    }

    #[tokio::test]
    async fn changed_daily_time_reschedules() {
        let (handler, scheduler) = handler();
        let first = in_an_hour();
        handler
            .handle(&ScanPolicyNotification::daily(first).into())
            .await
            .unwrap();
        handler
            .handle(&ScanPolicyNotification::daily(first + 60).into())
            .await
            .unwrap();

        let policy = scheduler.get_policy(ALTERNATE_POLICY_NAME).unwrap();
        let policy = policy.as_any().downcast_ref::<AlternatePolicy>().unwrap();
        assert_eq!(policy.configuration().offset_time, first + 60);

        scheduler.unschedule(ALTERNATE_POLICY_NAME).await.unwrap();
    }

    #[tokio::test]
    async fn none_without_policy_is_a_noop() {
        let (handler, scheduler) = handler();
        handler
            .handle(&ScanPolicyNotification::none().into())
            .await
            .unwrap();
        assert!(scheduler.policy_names().is_empty());
    }

    #[tokio::test]
    async fn rejects_other_payloads() {
        let (handler, _) = handler();
        let err = handler
            .handle(&Notification::Custom(serde_json::json!(1)))
            .await
            .unwrap_err();
        assert!(matches!(err, HandlerError::UnexpectedPayload { actual: "custom", .. }));
    }
}

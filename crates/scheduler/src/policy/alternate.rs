//! Recurring policy: ticks every `duration`, aligned to a daily offset.

use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use dockyard_core::clock::{seconds_since_midnight, SECONDS_PER_DAY};
use serde::{Deserialize, Serialize};
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::error::PolicyError;
use crate::task::Task;

use super::engine::{EngineContext, PolicyCore};
use super::{DoneSignal, Policy, TickStream};

/// Temporal rule of an [`AlternatePolicy`].
///
/// Timestamps are UTC epoch seconds; zero or negative means "unbounded".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlternatePolicyConfiguration {
    /// Interval between ticks.
    pub duration: Duration,
    /// Seconds from UTC midnight at which the first tick fires.
    pub offset_time: i64,
    /// Do not start before this instant.
    pub start_timestamp: i64,
    /// Stop and fire `Done` once this instant is reached.
    pub end_timestamp: i64,
}

impl AlternatePolicyConfiguration {
    /// Every 24 hours at `offset_time`, forever.
    pub fn daily(offset_time: i64) -> Self {
        Self {
            duration: Duration::from_secs(SECONDS_PER_DAY as u64),
            offset_time,
            start_timestamp: -1,
            end_timestamp: -1,
        }
    }

    fn end_reached(&self) -> bool {
        self.end_timestamp > 0 && Utc::now().timestamp() >= self.end_timestamp
    }

    /// Delay until the start bound, if one applies and lies in the future.
    fn delay_to_start(&self) -> Duration {
        if self.start_timestamp <= 0 {
            return Duration::ZERO;
        }
        let wait_ms = self
            .start_timestamp
            .saturating_mul(1000)
            .saturating_sub(Utc::now().timestamp_millis());
        Duration::from_millis(wait_ms.max(0) as u64)
    }

    /// Delay until the next occurrence of `offset_time` (today or tomorrow).
    fn delay_to_offset(&self) -> Duration {
        let diff = (self.offset_time - seconds_since_midnight(Utc::now())).rem_euclid(SECONDS_PER_DAY);
        Duration::from_secs(diff as u64)
    }
}

/// Policy that ticks periodically between optional start and end bounds.
pub struct AlternatePolicy {
    core: PolicyCore,
    config: AlternatePolicyConfiguration,
}

impl AlternatePolicy {
    pub fn new(
        name: impl Into<String>,
        config: AlternatePolicyConfiguration,
    ) -> Result<Self, PolicyError> {
        if config.duration.is_zero() {
            return Err(PolicyError::InvalidConfiguration(
                "duration must be greater than zero".into(),
            ));
        }
        Ok(Self {
            core: PolicyCore::new(name),
            config,
        })
    }

    /// Copy of the configuration snapshot.
    pub fn configuration(&self) -> AlternatePolicyConfiguration {
        self.config
    }
}

async fn run(config: AlternatePolicyConfiguration, mut ctx: EngineContext) {
    if !ctx.sleep(config.delay_to_start()).await {
        return;
    }
    if !ctx.sleep(config.delay_to_offset()).await {
        return;
    }

    if config.end_reached() {
        ctx.finish();
        return;
    }
    if !ctx.emit(Utc::now()).await {
        return;
    }

    let mut ticker = interval_at(Instant::now() + config.duration, config.duration);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        if !ctx.next_period(&mut ticker).await {
            return;
        }
        if config.end_reached() {
            ctx.finish();
            return;
        }
        if !ctx.emit(Utc::now()).await {
            return;
        }
    }
}

#[async_trait]
impl Policy for AlternatePolicy {
    fn name(&self) -> &str {
        self.core.name()
    }

    fn tasks(&self) -> Vec<Arc<dyn Task>> {
        self.core.tasks()
    }

    fn attach_tasks(&self, tasks: Vec<Arc<dyn Task>>) -> Result<(), PolicyError> {
        self.core.attach_tasks(tasks)
    }

    fn evaluate(&self) -> Result<TickStream, PolicyError> {
        let config = self.config;
        self.core.evaluate(move |ctx| run(config, ctx))
    }

    async fn disable(&self) -> Result<(), PolicyError> {
        self.core.disable().await
    }

    fn done(&self) -> DoneSignal {
        self.core.done()
    }

    fn is_enabled(&self) -> bool {
        self.core.is_enabled()
    }

    fn equal(&self, other: &dyn Policy) -> bool {
        other
            .as_any()
            .downcast_ref::<AlternatePolicy>()
            .map(|o| o.config == self.config)
            .unwrap_or(false)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TaskError;

    struct Noop;

    impl Task for Noop {
        fn name(&self) -> &str {
            "noop"
        }
        fn run(&self) -> Result<(), TaskError> {
            Ok(())
        }
    }

    fn now_offset(delta: i64) -> i64 {
        seconds_since_midnight(Utc::now()) + delta
    }

    #[test]
    fn zero_duration_is_rejected() {
        let config = AlternatePolicyConfiguration {
            duration: Duration::ZERO,
            ..AlternatePolicyConfiguration::daily(0)
        };
        assert!(AlternatePolicy::new("p", config).is_err());
    }

    #[test]
    fn attach_requires_tasks() {
        let policy = AlternatePolicy::new("p", AlternatePolicyConfiguration::daily(0)).unwrap();
        let err = policy.attach_tasks(Vec::new()).unwrap_err();
        assert_eq!(err.to_string(), "no tasks can be attached");

        policy.attach_tasks(vec![Arc::new(Noop)]).unwrap();
        let mut snapshot = policy.tasks();
        snapshot.clear();
        assert_eq!(policy.tasks().len(), 1);
    }

    #[test]
    fn equality_compares_configuration() {
        let a = AlternatePolicy::new("a", AlternatePolicyConfiguration::daily(60)).unwrap();
        let b = AlternatePolicy::new("b", AlternatePolicyConfiguration::daily(60)).unwrap();
        let c = AlternatePolicy::new("c", AlternatePolicyConfiguration::daily(120)).unwrap();
        assert!(a.equal(&b));
        assert!(!a.equal(&c));
        assert_eq!(a.configuration().duration, Duration::from_secs(86_400));
    }

    #[test]
    fn offset_delay_wraps_to_tomorrow() {
        let config = AlternatePolicyConfiguration::daily(now_offset(-10));
        let delay = config.delay_to_offset().as_secs() as i64;
        // Allow for a second boundary between the two clock reads.
        assert!((SECONDS_PER_DAY - 11..=SECONDS_PER_DAY - 9).contains(&delay), "delay {}", delay);
    }

    #[test]
    fn far_future_start_saturates() {
        let config = AlternatePolicyConfiguration {
            start_timestamp: i64::MAX,
            ..AlternatePolicyConfiguration::daily(0)
        };
        assert!(config.delay_to_start() > Duration::from_secs(3600 * 24 * 365));
    }

    #[tokio::test]
    async fn evaluate_is_idempotent() {
        let policy = AlternatePolicy::new("p", AlternatePolicyConfiguration::daily(now_offset(3600))).unwrap();
        assert!(!policy.is_enabled());

        let first = policy.evaluate().unwrap();
        let second = policy.evaluate().unwrap();
        assert!(first.same_stream(&second));
        assert!(policy.is_enabled());

        policy.disable().await.unwrap();
        assert!(!policy.is_enabled());
        assert_eq!(first.recv().await, None);
    }

    #[tokio::test]
    async fn ticks_twice_before_end() {
        let now = Utc::now();
        let config = AlternatePolicyConfiguration {
            duration: Duration::from_secs(1),
            offset_time: seconds_since_midnight(now) + 1,
            start_timestamp: -1,
            end_timestamp: now.timestamp() + 3,
        };
        let policy = AlternatePolicy::new("ticker", config).unwrap();
        let ticks = policy.evaluate().unwrap();
        let mut done = policy.done();

        let mut count = 0;
        let collected = tokio::time::timeout(Duration::from_secs(8), async {
            while ticks.recv().await.is_some() {
                count += 1;
            }
        })
        .await;

        assert!(collected.is_ok(), "tick stream never closed");
        assert_eq!(count, 2);
        tokio::time::timeout(Duration::from_secs(1), done.wait())
            .await
            .expect("done never fired");
    }

    #[tokio::test]
    async fn start_timestamp_delays_first_tick() {
        let now = Utc::now();
        let config = AlternatePolicyConfiguration {
            duration: Duration::from_secs(60),
            offset_time: seconds_since_midnight(now),
            start_timestamp: now.timestamp() + 3600,
            end_timestamp: -1,
        };
        let policy = AlternatePolicy::new("later", config).unwrap();
        let ticks = policy.evaluate().unwrap();

        let first = tokio::time::timeout(Duration::from_millis(300), ticks.recv()).await;
        assert!(first.is_err(), "no tick expected before the start bound");

        policy.disable().await.unwrap();
    }
}

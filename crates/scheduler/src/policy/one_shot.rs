//! Finite policy that ticks exactly once at a fixed instant.

use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::PolicyError;
use crate::task::Task;

use super::engine::{EngineContext, PolicyCore};
use super::{DoneSignal, Policy, TickStream};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OneShotPolicyConfiguration {
    /// UTC epoch seconds. An instant in the past fires immediately.
    pub fire_at: i64,
}

pub struct OneShotPolicy {
    core: PolicyCore,
    config: OneShotPolicyConfiguration,
}

impl OneShotPolicy {
    pub fn new(name: impl Into<String>, config: OneShotPolicyConfiguration) -> Self {
        Self {
            core: PolicyCore::new(name),
            config,
        }
    }

    pub fn configuration(&self) -> OneShotPolicyConfiguration {
        self.config
    }
}

async fn run(config: OneShotPolicyConfiguration, mut ctx: EngineContext) {
    let wait_ms = config
        .fire_at
        .saturating_mul(1000)
        .saturating_sub(Utc::now().timestamp_millis());
    if !ctx.sleep(Duration::from_millis(wait_ms.max(0) as u64)).await {
        return;
    }
    if !ctx.emit(Utc::now()).await {
        return;
    }
    ctx.finish();
}

#[async_trait]
impl Policy for OneShotPolicy {
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
            .downcast_ref::<OneShotPolicy>()
            .map(|o| o.config == self.config)
            .unwrap_or(false)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

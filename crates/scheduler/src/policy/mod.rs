//! Timed policies: task containers that emit ticks under a temporal rule.
//!
//! A policy owns one engine task (spawned by [`Policy::evaluate`]) that
//! sleeps, ticks and eventually signals completion. The watcher that
//! drives a policy only ever sees three things: the [`TickStream`], the
//! [`DoneSignal`] and the `disable` call used to terminate the engine.

pub mod alternate;
mod engine;
pub mod one_shot;

use std::any::Any;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, watch, Mutex};

use crate::error::PolicyError;
use crate::task::Task;

pub use alternate::{AlternatePolicy, AlternatePolicyConfiguration};
pub use one_shot::{OneShotPolicy, OneShotPolicyConfiguration};

/// A single evaluation signal: the instant the rule fired.
pub type Tick = DateTime<Utc>;

/// Capacity of a policy's tick channel.
pub(crate) const TICK_BUFFER: usize = 10;

/// Capability set the scheduler needs from a timed policy.
#[async_trait]
pub trait Policy: Send + Sync + 'static {
    /// Identity, unique within a scheduler.
    fn name(&self) -> &str;

    /// Snapshot of the attached tasks. Mutating the returned list does not
    /// affect the policy.
    fn tasks(&self) -> Vec<Arc<dyn Task>>;

    /// Append tasks. Fails when `tasks` is empty.
    fn attach_tasks(&self, tasks: Vec<Arc<dyn Task>>) -> Result<(), PolicyError>;

    /// Start the temporal engine once. Calling again while enabled returns
    /// the stream that is already running. Must be called inside a Tokio runtime.
    fn evaluate(&self) -> Result<TickStream, PolicyError>;

    /// Stop the engine and wait until it has exited.
    async fn disable(&self) -> Result<(), PolicyError>;

    /// One-shot completion signal for finite rules.
    fn done(&self) -> DoneSignal;

    fn is_enabled(&self) -> bool;

    /// Configuration equality. Policies that cannot compare return false.
    fn equal(&self, _other: &dyn Policy) -> bool {
        false
    }

    fn as_any(&self) -> &dyn Any;
}

/// Single-consumer stream of ticks produced by a policy engine.
///
/// Clones share the same underlying channel, which is how a repeated
/// `evaluate` hands back the stream already in use.
#[derive(Clone)]
pub struct TickStream {
    rx: Arc<Mutex<mpsc::Receiver<Tick>>>,
    closed: Arc<AtomicBool>,
}

impl TickStream {
    pub(crate) fn new(rx: mpsc::Receiver<Tick>) -> Self {
        Self {
            rx: Arc::new(Mutex::new(rx)),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Receive the next tick. Returns `None` once the engine has exited or
    /// the policy has been disabled.
    pub async fn recv(&self) -> Option<Tick> {
        if self.closed.load(Ordering::Acquire) {
            return None;
        }
        let tick = self.rx.lock().await.recv().await;
        // Ticks buffered before a disable are swallowed.
        if self.closed.load(Ordering::Acquire) {
            return None;
        }
        tick
    }

    /// Whether both handles read from the same engine.
    pub fn same_stream(&self, other: &TickStream) -> bool {
        Arc::ptr_eq(&self.rx, &other.rx)
    }

    pub(crate) fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }
}

/// Observer side of a policy's completion signal.
#[derive(Clone)]
pub struct DoneSignal {
    rx: watch::Receiver<bool>,
}

impl DoneSignal {
    pub(crate) fn new(rx: watch::Receiver<bool>) -> Self {
        Self { rx }
    }

    /// Resolve once the policy has completed its useful life.
    pub async fn wait(&mut self) {
        if self.rx.wait_for(|done| *done).await.is_err() {
            // Sender gone without completing: never resolves.
            std::future::pending::<()>().await;
        }
    }

    pub fn is_done(&self) -> bool {
        *self.rx.borrow()
    }
}

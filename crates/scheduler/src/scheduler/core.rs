use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info, instrument, warn};

use crate::error::SchedulerError;
use crate::policy::Policy;
use crate::stats::{StatEvent, StatKind, StatSummary};
use crate::store::PolicyStore;
use crate::types::SchedulerConfig;
use crate::watcher::Watcher;

use super::daemon::DaemonSlot;

/// Owns the policy store and the stats / self-unschedule queues.
///
/// Cloning is cheap and every clone drives the same daemon.
#[derive(Clone)]
pub struct Scheduler {
    pub(super) inner: Arc<Inner>,
}

pub(super) struct Inner {
    pub(super) config: SchedulerConfig,
    pub(super) store: PolicyStore,
    /// Written only by the daemon.
    pub(super) stats: RwLock<StatSummary>,
    pub(super) stat_tx: mpsc::Sender<StatEvent>,
    pub(super) unschedule_tx: mpsc::Sender<String>,
    pub(super) daemon: Mutex<DaemonSlot>,
    pub(super) running: AtomicBool,
}

impl Scheduler {
    /// Create a scheduler. Nothing runs until [`start`](Scheduler::start).
    pub fn new(config: SchedulerConfig) -> Result<Self, SchedulerError> {
        config.validate()?;
        let (stat_tx, stat_rx) = mpsc::channel(config.queue_size);
        let (unschedule_tx, unschedule_rx) = mpsc::channel(config.queue_size);

        info!(queue_size = config.queue_size, "policy scheduler created");
        Ok(Self {
            inner: Arc::new(Inner {
                config,
                store: PolicyStore::new(),
                stats: RwLock::new(StatSummary::default()),
                stat_tx,
                unschedule_tx,
                daemon: Mutex::new(DaemonSlot::idle(stat_rx, unschedule_rx)),
                running: AtomicBool::new(false),
            }),
        })
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.inner.config
    }

    /// Validate, wrap in a watcher, start it and register it.
    ///
    /// Must be called inside a Tokio runtime.
    #[instrument(skip_all, fields(policy = %policy.name()))]
    pub fn schedule(&self, policy: Arc<dyn Policy>) -> Result<(), SchedulerError> {
        let name = policy.name().to_string();
        if name.trim().is_empty() {
            return Err(SchedulerError::UnnamedPolicy);
        }
        if policy.tasks().is_empty() {
            return Err(SchedulerError::NoTasks);
        }

        let inner = &self.inner;
        let watcher = Arc::new(Watcher::new(
            policy,
            inner.stat_tx.clone(),
            inner.unschedule_tx.clone(),
        ));
        if !inner.store.put_if_absent(&name, Arc::clone(&watcher)) {
            return Err(SchedulerError::Duplicated(name));
        }
        // Counted before the watcher can complete and request its own removal.
        inner.emit(StatEvent::new(StatKind::SchedulePolicy));
        if let Err(e) = watcher.start() {
            inner.store.remove(&name);
            inner.emit(StatEvent::new(StatKind::UnSchedulePolicy));
            return Err(e.into());
        }

        info!(policy = %name, "policy scheduled");
        Ok(())
    }

    /// Remove a policy and stop its watcher.
    #[instrument(skip(self))]
    pub async fn unschedule(&self, name: &str) -> Result<(), SchedulerError> {
        self.inner.unschedule(name).await
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::Acquire)
    }

    pub fn has_scheduled(&self, name: &str) -> bool {
        self.inner.store.exists(name)
    }

    pub fn get_policy(&self, name: &str) -> Option<Arc<dyn Policy>> {
        self.inner.store.get(name).map(|w| w.policy())
    }

    /// Names of all scheduled policies, in no particular order.
    pub fn policy_names(&self) -> Vec<String> {
        self.inner.store.names()
    }

    /// Snapshot of the aggregated stats. Eventually consistent with
    /// schedule/unschedule calls.
    pub fn stats(&self) -> StatSummary {
        self.inner
            .stats
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Inner {
    pub(super) async fn unschedule(&self, name: &str) -> Result<(), SchedulerError> {
        if name.trim().is_empty() {
            return Err(SchedulerError::EmptyName);
        }
        let watcher = self
            .store
            .remove(name)
            .ok_or_else(|| SchedulerError::NotExisting(name.to_string()))?;

        if !watcher.is_running() && !watcher.is_completed() {
            warn!(policy = %name, "unscheduled a policy whose watcher was not running");
        }
        watcher.stop().await;

        self.emit(StatEvent::new(StatKind::UnSchedulePolicy));
        info!(policy = %name, "policy unscheduled");
        Ok(())
    }

    /// Unschedule `name` only if the registered watcher has completed.
    ///
    /// A completion notice can race with an explicit unschedule followed by
    /// a new schedule under the same name; the new policy must survive.
    pub(super) async fn reap(&self, name: &str) -> Result<(), SchedulerError> {
        match self.store.get(name) {
            Some(watcher) if watcher.is_completed() => self.unschedule(name).await,
            Some(_) => {
                debug!(policy = %name, "stale completion notice ignored");
                Ok(())
            }
            None => Err(SchedulerError::NotExisting(name.to_string())),
        }
    }

    /// Queue a stat event without blocking. The daemon may be the caller.
    ///
    /// Policy events only trigger a recount, so a late delivery is harmless.
    pub(super) fn emit(&self, event: StatEvent) {
        match self.stat_tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                let tx = self.stat_tx.clone();
                tokio::spawn(async move {
                    let _ = tx.send(event).await;
                });
            }
            Err(TrySendError::Closed(event)) => {
                warn!(kind = ?event.kind, "stat queue closed, event dropped");
            }
        }
    }

    pub(super) fn record(&self, event: &StatEvent) {
        let mut stats = self.stats.write().unwrap_or_else(PoisonError::into_inner);
        stats.apply(event);
        if matches!(event.kind, StatKind::SchedulePolicy | StatKind::UnSchedulePolicy) {
            stats.policy_count = self.store.size() as u64;
        }
    }
}

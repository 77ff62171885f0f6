use std::sync::atomic::Ordering;
use std::sync::{Arc, PoisonError};

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::stats::{StatEvent, StatKind};

use super::core::{Inner, Scheduler};

/// Receiving ends of the scheduler queues. Owned by the daemon while it
/// runs and handed back on exit so a later `start` can reuse them.
pub(super) struct Queues {
    stats: mpsc::Receiver<StatEvent>,
    unschedule: mpsc::Receiver<String>,
}

pub(super) enum DaemonSlot {
    Idle(Queues),
    Running {
        terminate: oneshot::Sender<()>,
        join: JoinHandle<Queues>,
    },
    Stopping,
    /// The daemon task panicked and took the queues with it.
    Broken,
}

impl DaemonSlot {
    pub(super) fn idle(stats: mpsc::Receiver<StatEvent>, unschedule: mpsc::Receiver<String>) -> Self {
        DaemonSlot::Idle(Queues { stats, unschedule })
    }
}

impl Scheduler {
    /// Launch the daemon. No-op if it is already running.
    pub fn start(&self) {
        let mut slot = self.inner.daemon.lock().unwrap_or_else(PoisonError::into_inner);
        let queues = match std::mem::replace(&mut *slot, DaemonSlot::Stopping) {
            DaemonSlot::Idle(queues) => queues,
            other => {
                if matches!(other, DaemonSlot::Broken) {
                    error!("scheduler daemon is broken and cannot be restarted");
                }
                *slot = other;
                return;
            }
        };

        let (terminate, terminated) = oneshot::channel();
        let join = tokio::spawn(run(Arc::clone(&self.inner), queues, terminated));
        *slot = DaemonSlot::Running { terminate, join };
        self.inner.running.store(true, Ordering::Release);
        info!("policy scheduler started");
    }

    /// Terminate the daemon and wait for its teardown: every watcher is
    /// stopped and the store is emptied. No-op if not running.
    pub async fn stop(&self) {
        let previous = {
            let mut slot = self.inner.daemon.lock().unwrap_or_else(PoisonError::into_inner);
            match &*slot {
                DaemonSlot::Running { .. } => std::mem::replace(&mut *slot, DaemonSlot::Stopping),
                _ => return,
            }
        };
        let DaemonSlot::Running { terminate, join } = previous else {
            return;
        };

        let _ = terminate.send(());
        let next = match join.await {
            Ok(queues) => DaemonSlot::Idle(queues),
            Err(e) => {
                error!(error = %e, "scheduler daemon aborted");
                DaemonSlot::Broken
            }
        };
        *self.inner.daemon.lock().unwrap_or_else(PoisonError::into_inner) = next;
        self.inner.running.store(false, Ordering::Release);
        info!("policy scheduler stopped");
    }
}

async fn run(inner: Arc<Inner>, mut queues: Queues, mut terminated: oneshot::Receiver<()>) -> Queues {
    debug!("scheduler daemon loop entered");
    loop {
        tokio::select! {
            biased;

            _ = &mut terminated => break,

            Some(name) = queues.unschedule.recv() => {
                if let Err(e) = inner.reap(&name).await {
                    warn!(policy = %name, error = %e, "self-unschedule failed");
                }
            }

            Some(event) = queues.stats.recv() => inner.record(&event),
        }
    }

    teardown(&inner, &mut queues).await;
    queues
}

async fn teardown(inner: &Inner, queues: &mut Queues) {
    let watchers = inner.store.drain();
    for watcher in &watchers {
        watcher.stop().await;
    }

    while let Ok(event) = queues.stats.try_recv() {
        // Schedule/unschedule deltas are superseded by the reset below.
        if !matches!(event.kind, StatKind::SchedulePolicy | StatKind::UnSchedulePolicy) {
            inner.record(&event);
        }
    }
    while queues.unschedule.try_recv().is_ok() {}

    inner
        .stats
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .policy_count = inner.store.size() as u64;
    info!(stopped = watchers.len(), "scheduler daemon torn down");
}

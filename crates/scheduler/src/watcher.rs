//! Per-policy runner: consumes ticks, fans tasks out, reports stats.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

use crate::error::PolicyError;
use crate::policy::{DoneSignal, Policy, TickStream};
use crate::stats::{StatEvent, StatKind};
use crate::task::Task;

enum WatcherState {
    Idle,
    Running {
        stop: oneshot::Sender<()>,
        join: JoinHandle<()>,
    },
    Stopped,
}

/// Runtime binding between a policy and the scheduler.
///
/// Lifecycle: idle, running, stopped. A stopped watcher is never restarted.
pub struct Watcher {
    policy: Arc<dyn Policy>,
    stats: mpsc::Sender<StatEvent>,
    unschedule: mpsc::Sender<String>,
    running: Arc<AtomicBool>,
    completed: Arc<AtomicBool>,
    state: Mutex<WatcherState>,
}

impl Watcher {
    pub fn new(
        policy: Arc<dyn Policy>,
        stats: mpsc::Sender<StatEvent>,
        unschedule: mpsc::Sender<String>,
    ) -> Self {
        Self {
            policy,
            stats,
            unschedule,
            running: Arc::new(AtomicBool::new(false)),
            completed: Arc::new(AtomicBool::new(false)),
            state: Mutex::new(WatcherState::Idle),
        }
    }

    pub fn policy(&self) -> Arc<dyn Policy> {
        Arc::clone(&self.policy)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Whether the policy finished on its own (its done signal fired).
    pub fn is_completed(&self) -> bool {
        self.completed.load(Ordering::Acquire)
    }

    /// Evaluate the policy and spawn the watch loop. No-op unless idle.
    pub fn start(&self) -> Result<(), PolicyError> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if !matches!(*state, WatcherState::Idle) {
            return Ok(());
        }

        let ticks = self.policy.evaluate()?;
        let (stop, stopped) = oneshot::channel();
        let ctx = WatchLoop {
            policy: Arc::clone(&self.policy),
            ticks,
            done: self.policy.done(),
            stopped,
            stats: self.stats.clone(),
            unschedule: self.unschedule.clone(),
            running: Arc::clone(&self.running),
            completed: Arc::clone(&self.completed),
        };

        self.running.store(true, Ordering::Release);
        let join = tokio::spawn(ctx.run());
        *state = WatcherState::Running { stop, join };
        info!(policy = %self.policy.name(), "watcher started");
        Ok(())
    }

    /// Disable the policy, stop the loop and wait for it to exit.
    pub async fn stop(&self) {
        let previous = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            std::mem::replace(&mut *state, WatcherState::Stopped)
        };

        if let WatcherState::Running { stop, join } = previous {
            if let Err(e) = self.policy.disable().await {
                warn!(policy = %self.policy.name(), error = %e, "failed to disable policy");
            }
            // The loop may already have exited after completion.
            let _ = stop.send(());
            if let Err(e) = join.await {
                error!(policy = %self.policy.name(), error = %e, "watcher loop aborted");
            }
            info!(policy = %self.policy.name(), "watcher stopped");
        }
        self.running.store(false, Ordering::Release);
    }
}

struct WatchLoop {
    policy: Arc<dyn Policy>,
    ticks: TickStream,
    done: DoneSignal,
    stopped: oneshot::Receiver<()>,
    stats: mpsc::Sender<StatEvent>,
    unschedule: mpsc::Sender<String>,
    running: Arc<AtomicBool>,
    completed: Arc<AtomicBool>,
}

impl WatchLoop {
    async fn run(mut self) {
        let name = self.policy.name().to_string();
        let mut in_flight: JoinSet<()> = JoinSet::new();
        let mut ticks_open = true;
        let mut finishing = false;

        loop {
            if finishing && in_flight.is_empty() {
                self.running.store(false, Ordering::Release);
                self.completed.store(true, Ordering::Release);
                info!(policy = %name, "policy completed, requesting unschedule");
                request_unschedule(&self.unschedule, name);
                break;
            }

            tokio::select! {
                biased;

                _ = &mut self.stopped => {
                    // Abort stat reporting of in-flight tasks.
                    in_flight.shutdown().await;
                    break;
                }

                tick = self.ticks.recv(), if ticks_open && !finishing => match tick {
                    Some(at) => {
                        debug!(policy = %name, tick = %at, "tick received");
                        for task in self.policy.tasks() {
                            in_flight.spawn(execute(task, self.stats.clone()));
                        }
                    }
                    None => ticks_open = false,
                },

                // Tasks of the last tick finish before the policy is reported done.
                _ = self.done.wait(), if !finishing => finishing = true,

                Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                    log_join(&name, joined);
                }
            }
        }
    }
}

/// Run one task on a blocking thread and report its outcome.
async fn execute(task: Arc<dyn Task>, stats: mpsc::Sender<StatEvent>) {
    let _ = stats.send(StatEvent::new(StatKind::TaskRun)).await;

    let task_name = task.name().to_string();
    let outcome = tokio::task::spawn_blocking(move || task.run()).await;

    let event = match outcome {
        Ok(Ok(())) => {
            debug!(task = %task_name, "task completed");
            StatEvent::new(StatKind::TaskComplete)
        }
        Ok(Err(e)) => {
            warn!(task = %task_name, error = %e, "task failed");
            StatEvent::with_attachment(StatKind::TaskFail, e.to_string())
        }
        Err(e) => {
            error!(task = %task_name, error = %e, "task panicked");
            StatEvent::with_attachment(StatKind::TaskFail, format!("task {} panicked", task_name))
        }
    };
    let _ = stats.send(event).await;
}

/// Never blocks: the daemon consuming this queue may itself be waiting on us.
fn request_unschedule(queue: &mpsc::Sender<String>, name: String) {
    match queue.try_send(name) {
        Ok(()) => {}
        Err(TrySendError::Full(name)) => {
            let queue = queue.clone();
            tokio::spawn(async move {
                let _ = queue.send(name).await;
            });
        }
        Err(TrySendError::Closed(name)) => {
            warn!(policy = %name, "unschedule queue closed");
        }
    }
}

fn log_join(policy: &str, joined: Result<(), JoinError>) {
    if let Err(e) = joined {
        if !e.is_cancelled() {
            error!(policy = %policy, error = %e, "task runner aborted");
        }
    }
}

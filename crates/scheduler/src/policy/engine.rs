//! State and plumbing shared by every policy implementation.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Interval;
use tracing::debug;

use crate::error::PolicyError;
use crate::task::Task;

use super::{DoneSignal, Tick, TickStream, TICK_BUFFER};

/// Running engine: the stream it feeds, its terminator and its join handle.
struct EngineHandle {
    ticks: TickStream,
    terminator: oneshot::Sender<()>,
    join: JoinHandle<()>,
}

/// Name, tasks, enabled flag, done signal and the engine slot.
pub(crate) struct PolicyCore {
    name: String,
    tasks: RwLock<Vec<Arc<dyn Task>>>,
    enabled: Arc<AtomicBool>,
    done: Arc<watch::Sender<bool>>,
    engine: Mutex<Option<EngineHandle>>,
}

impl PolicyCore {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        let (done, _) = watch::channel(false);
        Self {
            name: name.into(),
            tasks: RwLock::new(Vec::new()),
            enabled: Arc::new(AtomicBool::new(false)),
            done: Arc::new(done),
            engine: Mutex::new(None),
        }
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn tasks(&self) -> Vec<Arc<dyn Task>> {
        self.tasks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn attach_tasks(&self, tasks: Vec<Arc<dyn Task>>) -> Result<(), PolicyError> {
        if tasks.is_empty() {
            return Err(PolicyError::NoTasksToAttach);
        }
        self.tasks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(tasks);
        Ok(())
    }

    pub(crate) fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    pub(crate) fn done(&self) -> DoneSignal {
        DoneSignal::new(self.done.subscribe())
    }

    /// Start `run` as the engine unless one is already enabled.
    pub(crate) fn evaluate<F, Fut>(&self, run: F) -> Result<TickStream, PolicyError>
    where
        F: FnOnce(EngineContext) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut slot = self.engine.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(engine) = slot.as_ref() {
            if self.is_enabled() {
                return Ok(engine.ticks.clone());
            }
        }

        let (tx, rx) = mpsc::channel(TICK_BUFFER);
        let (terminator, terminated) = oneshot::channel();
        let ticks = TickStream::new(rx);

        self.done.send_replace(false);
        self.enabled.store(true, Ordering::Release);

        let ctx = EngineContext {
            name: self.name.clone(),
            ticks: tx,
            terminated,
            done: Arc::clone(&self.done),
        };
        let engine = run(ctx);
        let enabled = Arc::clone(&self.enabled);
        let name = self.name.clone();
        let join = tokio::spawn(async move {
            engine.await;
            enabled.store(false, Ordering::Release);
            debug!(policy = %name, "policy engine exited");
        });

        *slot = Some(EngineHandle {
            ticks: ticks.clone(),
            terminator,
            join,
        });
        Ok(ticks)
    }

    /// Terminate the engine and wait for it to acknowledge.
    pub(crate) async fn disable(&self) -> Result<(), PolicyError> {
        let engine = self
            .engine
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        self.enabled.store(false, Ordering::Release);

        if let Some(engine) = engine {
            engine.ticks.close();
            // The engine may already have exited on its own.
            let _ = engine.terminator.send(());
            engine
                .join
                .await
                .map_err(|e| PolicyError::Shutdown(e.to_string()))?;
        }
        Ok(())
    }
}

/// Handle given to an engine future: tick sink, terminator and done signal.
///
/// Every wait helper returns `false` once termination was requested; the
/// engine must return immediately in that case.
pub(crate) struct EngineContext {
    pub(crate) name: String,
    ticks: mpsc::Sender<Tick>,
    terminated: oneshot::Receiver<()>,
    done: Arc<watch::Sender<bool>>,
}

impl EngineContext {
    pub(crate) async fn sleep(&mut self, delay: Duration) -> bool {
        if delay.is_zero() {
            return true;
        }
        tokio::select! {
            _ = tokio::time::sleep(delay) => true,
            _ = &mut self.terminated => false,
        }
    }

    pub(crate) async fn next_period(&mut self, ticker: &mut Interval) -> bool {
        tokio::select! {
            _ = ticker.tick() => true,
            _ = &mut self.terminated => false,
        }
    }

    pub(crate) async fn emit(&mut self, tick: Tick) -> bool {
        tokio::select! {
            sent = self.ticks.send(tick) => sent.is_ok(),
            _ = &mut self.terminated => false,
        }
    }

    /// Fire the done signal. Called at most once per engine run.
    pub(crate) fn finish(&self) {
        debug!(policy = %self.name, "policy completed");
        self.done.send_replace(true);
    }
}

//! Process-wide topic bus.
//!
//! Each topic keeps an ordered set of handlers keyed by identity. A topic
//! with at least one stateful handler owns a single worker task fed by a
//! bounded queue, so stateful handlers observe values in publish order.
//! Stateless handlers are spawned per value with no ordering guarantee.
//!
//! The bus is meant to be created once at process start and injected where
//! needed. It offers no isolation between tenants.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::FutureExt;
use indexmap::IndexMap;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use crate::config::NotifierConfig;
use crate::error::NotifierError;
use crate::handler::NotificationHandler;
use crate::notification::Notification;

/// One value plus the stateful handlers registered when it was published.
struct Delivery {
    value: Arc<Notification>,
    handlers: Vec<Arc<dyn NotificationHandler>>,
}

struct TopicWorker {
    queue: mpsc::Sender<Delivery>,
    join: JoinHandle<()>,
}

#[derive(Default)]
struct TopicEntry {
    handlers: IndexMap<String, Arc<dyn NotificationHandler>>,
    worker: Option<TopicWorker>,
}

impl TopicEntry {
    fn has_stateful(&self) -> bool {
        self.handlers.values().any(|h| h.is_stateful())
    }
}

pub struct NotificationBus {
    config: NotifierConfig,
    topics: Mutex<HashMap<String, TopicEntry>>,
}

impl NotificationBus {
    pub fn new(config: NotifierConfig) -> Self {
        Self {
            config,
            topics: Mutex::new(HashMap::new()),
        }
    }

    /// Register `handler` on `topic`. Subscribing the same identity twice
    /// is a no-op. Must be called inside a Tokio runtime.
    pub fn subscribe(
        &self,
        topic: &str,
        handler: Arc<dyn NotificationHandler>,
    ) -> Result<(), NotifierError> {
        if topic.is_empty() {
            return Err(NotifierError::EmptyTopic);
        }
        let identity = handler.identity().to_string();
        if identity.is_empty() {
            return Err(NotifierError::EmptyIdentity);
        }

        let mut topics = self.lock();
        let entry = topics.entry(topic.to_string()).or_default();
        if entry.handlers.contains_key(&identity) {
            debug!(topic, handler = %identity, "handler already subscribed");
            return Ok(());
        }

        let stateful = handler.is_stateful();
        entry.handlers.insert(identity.clone(), handler);
        if stateful && entry.worker.is_none() {
            entry.worker = Some(self.spawn_worker(topic));
            debug!(topic, "topic worker started");
        }
        info!(topic, handler = %identity, stateful, "handler subscribed");
        Ok(())
    }

    /// Remove the handler with `identity` from `topic`, or every handler
    /// on the topic when `identity` is empty.
    pub fn unsubscribe(&self, topic: &str, identity: &str) -> Result<(), NotifierError> {
        if topic.is_empty() {
            return Err(NotifierError::EmptyTopic);
        }

        let mut topics = self.lock();
        if identity.is_empty() {
            let removed = topics
                .remove(topic)
                .ok_or_else(|| NotifierError::NoHandlers(topic.to_string()))?;
            info!(topic, removed = removed.handlers.len(), "all handlers unsubscribed");
            return Ok(());
        }

        let Some(entry) = topics.get_mut(topic) else {
            return Err(NotifierError::NoHandlers(topic.to_string()));
        };

        if entry.handlers.shift_remove(identity).is_none() {
            debug!(topic, handler = identity, "handler was not subscribed");
            return Ok(());
        }
        if !entry.has_stateful() && entry.worker.take().is_some() {
            // Dropping the queue lets the worker drain and exit.
            debug!(topic, "topic worker released");
        }
        if entry.handlers.is_empty() {
            topics.remove(topic);
        }
        info!(topic, handler = identity, "handler unsubscribed");
        Ok(())
    }

    /// Deliver `value` to every handler on `topic`.
    ///
    /// Returns once the value is queued for stateful handlers and stateless
    /// handlers are spawned. Handler outcomes are only logged.
    #[instrument(skip(self, value))]
    pub async fn publish(
        &self,
        topic: &str,
        value: impl Into<Notification>,
    ) -> Result<(), NotifierError> {
        if topic.is_empty() {
            return Err(NotifierError::EmptyTopic);
        }

        let (stateful, stateless, queue) = {
            let topics = self.lock();
            let entry = topics
                .get(topic)
                .filter(|e| !e.handlers.is_empty())
                .ok_or_else(|| NotifierError::NoHandlers(topic.to_string()))?;
            let (stateful, stateless): (Vec<_>, Vec<_>) = entry
                .handlers
                .values()
                .cloned()
                .partition(|h| h.is_stateful());
            (stateful, stateless, entry.worker.as_ref().map(|w| w.queue.clone()))
        };

        let value = Arc::new(value.into());
        debug!(topic, kind = value.kind(), "publishing");

        if !stateful.is_empty() {
            let queue = queue.ok_or_else(|| NotifierError::TopicClosed(topic.to_string()))?;
            let delivery = Delivery {
                value: Arc::clone(&value),
                handlers: stateful,
            };
            queue
                .send(delivery)
                .await
                .map_err(|_| NotifierError::TopicClosed(topic.to_string()))?;
        }

        for handler in stateless {
            let topic = topic.to_string();
            let value = Arc::clone(&value);
            tokio::spawn(async move {
                deliver(&topic, handler.as_ref(), &value).await;
            });
        }
        Ok(())
    }

    /// Topics with at least one handler.
    pub fn topics(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }

    /// Handler identities on `topic`, in subscription order.
    pub fn handlers(&self, topic: &str) -> Vec<String> {
        self.lock()
            .get(topic)
            .map(|e| e.handlers.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Whether `topic` currently owns a stateful worker.
    pub fn has_worker(&self, topic: &str) -> bool {
        self.lock()
            .get(topic)
            .map(|e| e.worker.is_some())
            .unwrap_or(false)
    }

    /// Drop every subscription and wait for the topic workers to drain.
    pub async fn shutdown(&self) {
        let entries: Vec<(String, TopicEntry)> = self.lock().drain().collect();
        for (topic, entry) in entries {
            if let Some(TopicWorker { queue, join }) = entry.worker {
                drop(queue);
                if let Err(e) = join.await {
                    error!(topic = %topic, error = %e, "topic worker aborted");
                }
            }
        }
        info!("notification bus shut down");
    }

    fn spawn_worker(&self, topic: &str) -> TopicWorker {
        let (queue, rx) = mpsc::channel(self.config.topic_buffer.max(1));
        let join = tokio::spawn(run_worker(topic.to_string(), rx));
        TopicWorker { queue, join }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, TopicEntry>> {
        self.topics.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for NotificationBus {
    fn default() -> Self {
        Self::new(NotifierConfig::default())
    }
}

async fn run_worker(topic: String, mut queue: mpsc::Receiver<Delivery>) {
    while let Some(delivery) = queue.recv().await {
        for handler in &delivery.handlers {
            deliver(&topic, handler.as_ref(), &delivery.value).await;
        }
    }
    debug!(topic = %topic, "topic worker exited");
}

/// Run one handler, containing its errors and panics.
async fn deliver(topic: &str, handler: &dyn NotificationHandler, value: &Notification) {
    match AssertUnwindSafe(handler.handle(value)).catch_unwind().await {
        Ok(Ok(())) => {
            debug!(topic, handler = handler.identity(), "notification handled");
        }
        Ok(Err(e)) => {
            warn!(topic, handler = handler.identity(), error = %e, "handler failed");
        }
        Err(_) => {
            error!(topic, handler = handler.identity(), "handler panicked");
        }
    }
}

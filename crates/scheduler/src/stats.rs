use serde::Serialize;
use tracing::warn;

/// Kind of event flowing through the scheduler's stat queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StatKind {
    SchedulePolicy,
    UnSchedulePolicy,
    TaskRun,
    TaskComplete,
    TaskFail,
}

/// A metric delta sent by the scheduler API or a watcher to the daemon.
#[derive(Debug, Clone)]
pub struct StatEvent {
    pub kind: StatKind,
    pub value: u64,
    /// Optional error attached by the producer (logged by the daemon).
    pub attachment: Option<String>,
}

impl StatEvent {
    pub fn new(kind: StatKind) -> Self {
        Self {
            kind,
            value: 1,
            attachment: None,
        }
    }

    pub fn with_attachment(kind: StatKind, attachment: impl Into<String>) -> Self {
        Self {
            kind,
            value: 1,
            attachment: Some(attachment.into()),
        }
    }
}

/// Aggregated scheduler statistics, mutated only by the daemon.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatSummary {
    /// Number of policies currently scheduled.
    pub policy_count: u64,
    /// Task executions started.
    pub tasks: u64,
    /// Task executions that returned success.
    pub completed_tasks: u64,
    /// Task executions that returned an error or panicked.
    pub tasks_with_error: u64,
}

impl StatSummary {
    /// Apply a single delta.
    pub fn apply(&mut self, event: &StatEvent) {
        if let Some(attachment) = &event.attachment {
            warn!(kind = ?event.kind, error = %attachment, "stat event carried an error");
        }

        match event.kind {
            StatKind::SchedulePolicy => self.policy_count += event.value,
            StatKind::UnSchedulePolicy => {
                self.policy_count = self.policy_count.saturating_sub(event.value)
            }
            StatKind::TaskRun => self.tasks += event.value,
            StatKind::TaskComplete => self.completed_tasks += event.value,
            StatKind::TaskFail => self.tasks_with_error += event.value,
        }
    }
}

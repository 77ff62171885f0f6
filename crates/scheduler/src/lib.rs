//! Timed policy scheduler.
//!
//! A [`Policy`] emits ticks under a temporal rule; a [`Watcher`] runs the
//! policy's tasks on every tick; the [`Scheduler`] daemon owns the watchers
//! and aggregates their stat events into a [`StatSummary`].

pub mod error;
pub mod policy;
pub mod scheduler;
pub mod stats;
pub mod store;
pub mod task;
pub mod tasks;
pub mod types;
pub mod watcher;

pub use error::{PolicyError, SchedulerError, TaskError};
pub use policy::{
    AlternatePolicy, AlternatePolicyConfiguration, DoneSignal, OneShotPolicy,
    OneShotPolicyConfiguration, Policy, Tick, TickStream,
};
pub use scheduler::Scheduler;
pub use stats::{StatEvent, StatKind, StatSummary};
pub use store::PolicyStore;
pub use task::Task;
pub use tasks::{ImageScanner, ScanAllImagesTask};
pub use types::SchedulerConfig;
pub use watcher::Watcher;

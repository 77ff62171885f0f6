//! Policy scheduler daemon.
//!
//! Split into focused submodules:
//! - `core`: Scheduler struct, constructor, schedule/unschedule and queries
//! - `daemon`: start/stop and the loop that aggregates stats and reaps
//!   self-completed policies

mod core;
mod daemon;
#[cfg(test)]
mod tests;

pub use self::core::Scheduler;

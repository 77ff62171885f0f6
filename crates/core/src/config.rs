use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::DockyardError;

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

fn profiled_env_usize(profile: &str, key: &str, default: usize) -> usize {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub scheduler: SchedulerSettings,
    pub notifier: NotifierSettings,
    pub policy: PolicySettings,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `DOCKYARD_PROFILE` env var. When set (e.g. `PROD`),
    /// every key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_or("DOCKYARD_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Self {
            profile: p.to_string(),
            scheduler: SchedulerSettings::from_env_profiled(p),
            notifier: NotifierSettings::from_env_profiled(p),
            policy: PolicySettings::from_env_profiled(p),
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Reject settings no component can run with.
    pub fn validate(&self) -> crate::Result<()> {
        if self.scheduler.queue_size == 0 {
            return Err(DockyardError::Config("SCHEDULER_QUEUE_SIZE must be positive".into()));
        }
        if self.notifier.topic_buffer == 0 {
            return Err(DockyardError::Config("NOTIFIER_TOPIC_BUFFER must be positive".into()));
        }
        if self.policy.config_path.as_os_str().is_empty() {
            return Err(DockyardError::Config("POLICY_CONFIG_PATH is empty".into()));
        }
        Ok(())
    }

    /// Print a summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!("  scheduler:   queue_size={}", self.scheduler.queue_size);
        tracing::info!("  notifier:    topic_buffer={}", self.notifier.topic_buffer);
        tracing::info!("  policy:      config_path={}", self.policy.config_path.display());
    }
}

// ── Scheduler ─────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerSettings {
    /// Capacity of the stats, unschedule and tick queues.
    pub queue_size: usize,
}

impl SchedulerSettings {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            queue_size: profiled_env_usize(p, "SCHEDULER_QUEUE_SIZE", 10),
        }
    }
}

// ── Notifier ──────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifierSettings {
    /// Capacity of each stateful topic queue.
    pub topic_buffer: usize,
}

impl NotifierSettings {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            topic_buffer: profiled_env_usize(p, "NOTIFIER_TOPIC_BUFFER", 32),
        }
    }
}

// ── Policy configuration source ───────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicySettings {
    /// JSON configuration map replayed through the config watcher at startup.
    pub config_path: PathBuf,
}

impl PolicySettings {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            config_path: PathBuf::from(profiled_env_or(p, "POLICY_CONFIG_PATH", "config/system.json")),
        }
    }
}

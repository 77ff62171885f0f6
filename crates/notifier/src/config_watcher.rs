//! Translates configuration changes into scan policy notifications.

use std::path::Path;

use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::bus::NotificationBus;
use crate::error::NotifierError;
use crate::notification::{ScanPolicyNotification, ScanPolicyType};
use crate::topics;

/// Configuration key holding the scan-all policy.
pub const SCAN_ALL_POLICY_KEY: &str = "scan_all_policy";

#[derive(Debug, Deserialize)]
struct ScanAllPolicyRecord {
    #[serde(rename = "type")]
    kind: ScanPolicyType,
    #[serde(rename = "Parm", default)]
    parm: Option<ScanAllPolicyParm>,
}

#[derive(Debug, Default, Deserialize)]
struct ScanAllPolicyParm {
    #[serde(default)]
    daily_time: i64,
}

/// Publish the scan-all policy found in `config` on
/// [`SCAN_ALL_POLICY`](crate::topics::SCAN_ALL_POLICY).
///
/// A configuration without the entry is ignored. The publish result is
/// returned as is; callers usually tolerate
/// [`NoHandlers`](NotifierError::NoHandlers).
pub async fn watch_config_changes(
    bus: &NotificationBus,
    config: &Map<String, Value>,
) -> Result<(), NotifierError> {
    let Some(entry) = config.get(SCAN_ALL_POLICY_KEY) else {
        debug!("no scan_all_policy in configuration");
        return Ok(());
    };

    let mut entry = entry
        .as_object()
        .cloned()
        .ok_or_else(|| NotifierError::Config(format!("{} must be an object", SCAN_ALL_POLICY_KEY)))?;
    if let Some(parameter) = entry.remove("parameter") {
        entry.insert("Parm".to_string(), parameter);
    }

    let record: ScanAllPolicyRecord = serde_json::from_value(Value::Object(entry))?;
    let notification = ScanPolicyNotification {
        kind: record.kind,
        daily_time: record.parm.unwrap_or_default().daily_time,
    };

    info!(kind = ?notification.kind, daily_time = notification.daily_time, "scan policy configuration changed");
    bus.publish(topics::SCAN_ALL_POLICY, notification).await
}

/// Read a JSON configuration object from `path` and feed it to
/// [`watch_config_changes`].
pub async fn load_configuration(
    bus: &NotificationBus,
    path: impl AsRef<Path>,
) -> Result<(), NotifierError> {
    let path = path.as_ref();
    let raw = tokio::fs::read_to_string(path).await?;
    let config: Map<String, Value> = serde_json::from_str(&raw)?;
    debug!(path = %path.display(), keys = config.len(), "configuration loaded");
    watch_config_changes(bus, &config).await
}

//! Payloads carried over the bus.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Value published on a topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "snake_case")]
pub enum Notification {
    ScanPolicy(ScanPolicyNotification),
    OnPush(ImageNotification),
    OnDeletion(ImageNotification),
    StartReplication(StartReplicationNotification),
    /// Free-form value for topics without a dedicated payload.
    Custom(serde_json::Value),
}

impl Notification {
    /// Variant name, for logs and payload mismatch errors.
    pub fn kind(&self) -> &'static str {
        match self {
            Notification::ScanPolicy(_) => "scan_policy",
            Notification::OnPush(_) => "on_push",
            Notification::OnDeletion(_) => "on_deletion",
            Notification::StartReplication(_) => "start_replication",
            Notification::Custom(_) => "custom",
        }
    }
}

impl From<ScanPolicyNotification> for Notification {
    fn from(n: ScanPolicyNotification) -> Self {
        Notification::ScanPolicy(n)
    }
}

impl From<StartReplicationNotification> for Notification {
    fn from(n: StartReplicationNotification) -> Self {
        Notification::StartReplication(n)
    }
}

impl From<serde_json::Value> for Notification {
    fn from(v: serde_json::Value) -> Self {
        Notification::Custom(v)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanPolicyType {
    Daily,
    None,
    Refresh,
}

/// Requested scan-all schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanPolicyNotification {
    #[serde(rename = "type")]
    pub kind: ScanPolicyType,
    /// Seconds from UTC midnight. Only meaningful for `daily`.
    #[serde(default)]
    pub daily_time: i64,
}

impl ScanPolicyNotification {
    pub fn daily(daily_time: i64) -> Self {
        Self {
            kind: ScanPolicyType::Daily,
            daily_time,
        }
    }

    pub fn none() -> Self {
        Self {
            kind: ScanPolicyType::None,
            daily_time: 0,
        }
    }
}

/// An image push or deletion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageNotification {
    pub project: String,
    pub repository: String,
    pub tag: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartReplicationNotification {
    pub policy_id: i64,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn scan_policy_wire_shape() {
        let n: ScanPolicyNotification =
            serde_json::from_value(json!({"type": "daily", "daily_time": 3600})).unwrap();
        assert_eq!(n, ScanPolicyNotification::daily(3600));

        let n: ScanPolicyNotification = serde_json::from_value(json!({"type": "none"})).unwrap();
        assert_eq!(n.kind, ScanPolicyType::None);
        assert_eq!(n.daily_time, 0);

        assert!(serde_json::from_value::<ScanPolicyNotification>(json!({"type": "weekly"})).is_err());
    }

    #[test]
    fn notification_is_tagged() {
        let n = Notification::from(StartReplicationNotification {
            policy_id: 7,
            metadata: HashMap::new(),
        });
        let v = serde_json::to_value(&n).unwrap();
        assert_eq!(v["kind"], "start_replication");
        assert_eq!(v["payload"]["policy_id"], 7);
        assert_eq!(n.kind(), "start_replication");
    }
}

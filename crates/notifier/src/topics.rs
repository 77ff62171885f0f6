//! Fixed topic identifiers.

/// Configuration-driven scan policy changes.
pub const SCAN_ALL_POLICY: &str = "ScanAllPolicy";

/// An image was pushed. Consumed by replication.
pub const ON_PUSH: &str = "OnPush";

/// An image was deleted. Consumed by replication.
pub const ON_DELETION: &str = "OnDeletion";

/// Explicit request to start a replication policy.
pub const START_REPLICATION: &str = "StartReplication";

mod scan_policy;

pub use scan_policy::{ScanPolicyHandler, ALTERNATE_POLICY_NAME};

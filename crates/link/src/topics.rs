// ---------------------------------------------------------------------------
// MQTT topic layout
// ---------------------------------------------------------------------------
//
//   <prefix>/<node_id>/state        actuator state (retained)
//   <prefix>/<node_id>/status       periodic link/uptime report
//   <prefix>/<node_id>/command      actuator commands (inbound)
//   <prefix>/<node_id>/telemetry    sensor snapshots
//   <prefix>/device_status/<node_id>  "online"/"offline" (retained, last will)

/// Payload of the retained presence marker published after connect.
pub const ONLINE: &str = "online";
/// Payload of the last will registered at connect.
pub const OFFLINE: &str = "offline";

/// Every topic a node talks on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topics {
    pub state: String,
    pub status: String,
    pub command: String,
    pub telemetry: String,
    pub presence: String,
}

impl Topics {
    pub fn for_node(prefix: &str, node_id: &str) -> Self {
        Self {
            state: format!("{prefix}/{node_id}/state"),
            status: format!("{prefix}/{node_id}/status"),
            command: format!("{prefix}/{node_id}/command"),
            telemetry: format!("{prefix}/{node_id}/telemetry"),
            presence: format!("{prefix}/device_status/{node_id}"),
        }
    }
}

/// A topic segment must be non-empty and free of separators and wildcards so
/// that the derived topics stay exact (subscribing to a wildcard command
/// topic would accept other nodes' commands).
pub fn is_valid_segment(s: &str) -> bool {
    !s.is_empty()
        && s.trim() == s
        && !s.contains(|c: char| matches!(c, '/' | '+' | '#') || c.is_control())
}

/// A prefix may span several levels ("farm/vermilinks") but each level must
/// be a valid segment.
pub fn is_valid_prefix(s: &str) -> bool {
    !s.is_empty() && s.split('/').all(is_valid_segment)
}

// ===========================================================================
// Tests
// ===========================================================================

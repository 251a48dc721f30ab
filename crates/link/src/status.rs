//! Periodic `status` report shared by both nodes.

use serde::Serialize;

use crate::clock::unix_now;
use crate::manager::Publish;

const WIRELESS_PATH: &str = "/proc/net/wireless";

#[derive(Debug, Serialize)]
pub struct StatusMsg {
    pub online: bool,
    pub rssi: i32,
    pub uptime: u64,
    pub ts: i64,
}

impl StatusMsg {
    pub fn sample(online: bool, uptime: u64) -> Self {
        Self {
            online,
            rssi: read_rssi().unwrap_or(0),
            uptime,
            ts: unix_now(),
        }
    }
}

/// Publish a status report (not retained).  Dropped silently while offline.
pub fn publish_status(out: &mut impl Publish, topic: &str, uptime: u64) -> bool {
    if !out.is_online() {
        return false;
    }
    let msg = StatusMsg::sample(true, uptime);
    match serde_json::to_vec(&msg) {
        Ok(payload) => out.publish(topic, payload, false),
        Err(e) => {
            tracing::error!("status serialisation failed: {e}");
            false
        }
    }
}

/// Signal level (dBm) of the first wireless interface, if any.
pub fn read_rssi() -> Option<i32> {
    let contents = std::fs::read_to_string(WIRELESS_PATH).ok()?;
    parse_wireless(&contents)
}

/// Parse `/proc/net/wireless`:
///
/// ```text
/// Inter-| sta-|   Quality        |   Discarded packets               | Missed | WE
///  face | tus | link level noise |  nwid  crypt   frag  retry   misc | beacon | 22
///  wlan0: 0000   54.  -56.  -256        0      0      0      0     12        0
/// ```
fn parse_wireless(contents: &str) -> Option<i32> {
    contents.lines().skip(2).find_map(|line| {
        let (_, rest) = line.split_once(':')?;
        let level = rest.split_whitespace().nth(2)?;
        let level: f32 = level.trim_end_matches('.').parse().ok()?;
        Some(level as i32)
    })
}

// ===========================================================================
// Tests
// ===========================================================================

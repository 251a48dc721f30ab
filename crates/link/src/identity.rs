//! Stable per-device identity for the MQTT client id.
//!
//! The broker keys sessions by client id, so it has to survive reboots and
//! differ between boards running the same image.  Sources, in order:
//! `DEVICE_ID` env, the MAC of the first physical interface, `/etc/machine-id`.
//! Bridges, veths and docker interfaces carry locally administered MACs that
//! can change between boots and are never used.

use anyhow::{bail, Result};
use std::{env, fs, path::Path};

const NET_CLASS_DIR: &str = "/sys/class/net";
const MACHINE_ID_PATH: &str = "/etc/machine-id";

/// Resolve this board's hardware identifier (uppercase hex, no separators).
pub fn hardware_id() -> Result<String> {
    if let Ok(id) = env::var("DEVICE_ID") {
        let id = normalize(&id);
        if !id.is_empty() {
            return Ok(id);
        }
    }

    if let Some(mac) = first_mac(Path::new(NET_CLASS_DIR)) {
        return Ok(mac);
    }

    if let Ok(contents) = fs::read_to_string(MACHINE_ID_PATH) {
        let id = normalize(&contents);
        if !id.is_empty() {
            return Ok(id);
        }
    }

    bail!("no stable hardware identifier found (set DEVICE_ID)")
}

/// `<prefix>-<node_id>-<hwid>`, e.g. `vermilinks-esp32a-B827EB12AB34`.
pub fn client_id(prefix: &str, node_id: &str, hw_id: &str) -> String {
    // Only the first level of a multi-level prefix; client ids carry no '/'.
    let head = prefix.split('/').next().unwrap_or(prefix);
    format!("{head}-{node_id}-{hw_id}")
}

/// Strip separators/whitespace and uppercase: "b8:27:eb:12:ab:34" -> "B827EB12AB34".
fn normalize(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// Lowest-named physical interface with a burned-in MAC.  Sorted so the
/// pick is stable across boots regardless of directory iteration order.
fn first_mac(net_dir: &Path) -> Option<String> {
    let mut ifaces: Vec<_> = fs::read_dir(net_dir)
        .ok()?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .collect();
    ifaces.sort();

    ifaces.iter().find_map(|iface| {
        let name = iface.file_name()?.to_str()?;
        if name == "lo" || !is_physical(iface) {
            return None;
        }
        let raw = fs::read_to_string(iface.join("address")).ok()?;
        let mac = normalize(&raw);
        if mac.len() == 12 && mac != "000000000000" && !locally_administered(&mac) {
            Some(mac)
        } else {
            None
        }
    })
}

/// Backed by a bus device (virtual interfaces have no `device` link) and,
/// where the kernel says, carrying a permanent address (`addr_assign_type` 0).
fn is_physical(iface: &Path) -> bool {
    if !iface.join("device").exists() {
        return false;
    }
    match fs::read_to_string(iface.join("addr_assign_type")) {
        Ok(kind) => kind.trim() == "0",
        Err(_) => true,
    }
}

/// Bit 1 of the first octet marks a software-assigned MAC.
fn locally_administered(mac: &str) -> bool {
    mac.get(..2)
        .and_then(|octet| u8::from_str_radix(octet, 16).ok())
        .is_some_and(|b| b & 0x02 != 0)
}

// ===========================================================================
// Tests
// ===========================================================================

//! Broker connection settings shared by both nodes, plus the TOML loading
//! and error-collecting validation helpers the node configs build on.

use anyhow::{bail, Context, Result};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::{env, path::Path, time::Duration};

use crate::backoff::{Backoff, INITIAL_BACKOFF_MS, MAX_BACKOFF_MS};
use crate::topics::is_valid_prefix;

/// Deadlines compare by signed wrapping difference, so no delay may exceed this.
const MAX_BACKOFF_LIMIT_MS: u32 = i32::MAX as u32;

const DEFAULT_MAX_PACKET_SIZE: usize = 256 * 1024;

// ---------------------------------------------------------------------------
// [mqtt] section
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MqttConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub keep_alive_s: u64,
    /// Upper bound on a single connect attempt; a stalled connect would
    /// otherwise stall safety polling too.
    pub connect_timeout_ms: u64,
    pub backoff_initial_ms: u32,
    pub backoff_max_ms: u32,
    pub topic_prefix: String,
    /// Inbound messages buffered between loop iterations.
    pub inbound_capacity: usize,
    /// Largest packet accepted from the broker.  rumqttc ends the session on
    /// anything bigger, so keep the broker's own limit (mosquitto
    /// `message_size_limit`) at or below this value.
    pub max_packet_size: usize,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 1883,
            username: None,
            password: None,
            keep_alive_s: 15,
            connect_timeout_ms: 5_000,
            backoff_initial_ms: INITIAL_BACKOFF_MS,
            backoff_max_ms: MAX_BACKOFF_MS,
            topic_prefix: "vermilinks".to_string(),
            inbound_capacity: 32,
            max_packet_size: DEFAULT_MAX_PACKET_SIZE,
        }
    }
}

impl MqttConfig {
    /// Env wins over the file for broker access: MQTT_HOST, MQTT_PORT,
    /// MQTT_USER, MQTT_PASS.
    pub fn apply_env(&mut self) {
        if let Ok(host) = env::var("MQTT_HOST") {
            self.host = host;
        }
        if let Some(port) = env::var("MQTT_PORT").ok().and_then(|s| s.parse().ok()) {
            self.port = port;
        }
        if let Ok(user) = env::var("MQTT_USER") {
            self.username = Some(user);
        }
        if let Ok(pass) = env::var("MQTT_PASS") {
            self.password = Some(pass);
        }
    }

    pub fn backoff(&self) -> Backoff {
        Backoff::new(self.backoff_initial_ms, self.backoff_max_ms)
    }

    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_s)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Username and password, only when both are set.
    pub fn credentials(&self) -> Option<(String, String)> {
        match (&self.username, &self.password) {
            (Some(u), Some(p)) => Some((u.clone(), p.clone())),
            _ => None,
        }
    }

    /// Append every violation to `errors`.
    pub fn validate(&self, errors: &mut Vec<String>) {
        if self.host.trim().is_empty() {
            errors.push("mqtt.host is empty".to_string());
        }
        if self.port == 0 {
            errors.push("mqtt.port must be non-zero".to_string());
        }
        // MQTT 3.1.1 allows 0 (disabled) but then a dead link is never noticed.
        if self.keep_alive_s < 5 {
            errors.push(format!(
                "mqtt.keep_alive_s must be at least 5, got {}",
                self.keep_alive_s
            ));
        }
        if self.connect_timeout_ms == 0 {
            errors.push("mqtt.connect_timeout_ms must be positive".to_string());
        }
        if self.backoff_initial_ms == 0 {
            errors.push("mqtt.backoff_initial_ms must be positive".to_string());
        }
        if self.backoff_max_ms < self.backoff_initial_ms {
            errors.push(format!(
                "mqtt.backoff_max_ms ({}) is below backoff_initial_ms ({})",
                self.backoff_max_ms, self.backoff_initial_ms
            ));
        }
        if self.backoff_max_ms > MAX_BACKOFF_LIMIT_MS {
            errors.push(format!(
                "mqtt.backoff_max_ms ({}) exceeds {MAX_BACKOFF_LIMIT_MS}",
                self.backoff_max_ms
            ));
        }
        if !is_valid_prefix(&self.topic_prefix) {
            errors.push(format!(
                "mqtt.topic_prefix '{}' is not a valid topic prefix",
                self.topic_prefix
            ));
        }
        if self.inbound_capacity == 0 {
            errors.push("mqtt.inbound_capacity must be positive".to_string());
        }
        if self.max_packet_size < 1024 {
            errors.push(format!(
                "mqtt.max_packet_size must be at least 1024, got {}",
                self.max_packet_size
            ));
        }
        if self.username.is_some() != self.password.is_some() {
            errors.push("mqtt.username and mqtt.password must be set together".to_string());
        }
    }
}

// ---------------------------------------------------------------------------
// Loading + validation helpers
// ---------------------------------------------------------------------------

/// Parse a TOML config file; a missing file yields `T::default()`.
pub fn load_or_default<T>(path: &str) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    if !Path::new(path).exists() {
        tracing::info!(path, "no config file, using defaults");
        return Ok(T::default());
    }
    let contents =
        std::fs::read_to_string(path).with_context(|| format!("failed to read config: {path}"))?;
    let config =
        toml::from_str(&contents).with_context(|| format!("failed to parse config: {path}"))?;
    Ok(config)
}

/// Turn collected violations into one error listing all of them.
pub fn finish_validation(errors: Vec<String>) -> Result<()> {
    if errors.is_empty() {
        Ok(())
    } else {
        bail!(
            "config validation failed ({} error{}):\n  - {}",
            errors.len(),
            if errors.len() == 1 { "" } else { "s" },
            errors.join("\n  - ")
        );
    }
}

/// Push an error when an interval is zero.
pub fn require_positive(errors: &mut Vec<String>, name: &str, value: u64) {
    if value == 0 {
        errors.push(format!("{name} must be positive, got 0"));
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn errors_of(cfg: &MqttConfig) -> Vec<String> {
        let mut errors = Vec::new();
        cfg.validate(&mut errors);
        errors
    }

    // -- Defaults -----------------------------------------------------------------

    #[test]
    fn defaults_are_valid() {
        assert!(errors_of(&MqttConfig::default()).is_empty());
    }

    #[test]
    fn default_backoff_bounds() {
        let mut b = MqttConfig::default().backoff();
        assert_eq!(b.next_delay(), 1000);
        for _ in 0..10 {
            b.next_delay();
        }
        assert_eq!(b.current_ms(), 30000);
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let cfg: MqttConfig = toml::from_str(r#"host = "10.0.0.5""#).unwrap();
        assert_eq!(cfg.host, "10.0.0.5");
        assert_eq!(cfg.port, 1883);
        assert_eq!(cfg.topic_prefix, "vermilinks");
    }

    // -- Validation -----------------------------------------------------------------

    #[test]
    fn empty_host_rejected() {
        let cfg = MqttConfig {
            host: "  ".into(),
            ..Default::default()
        };
        let errors = errors_of(&cfg);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("host"));
    }

    #[test]
    fn inverted_backoff_rejected() {
        let cfg = MqttConfig {
            backoff_initial_ms: 5000,
            backoff_max_ms: 1000,
            ..Default::default()
        };
        assert!(errors_of(&cfg)
            .iter()
            .any(|e| e.contains("backoff_max_ms")));
    }

    #[test]
    fn backoff_beyond_signed_range_rejected() {
        let cfg = MqttConfig {
            backoff_max_ms: i32::MAX as u32 + 1,
            ..Default::default()
        };
        let errors = errors_of(&cfg);
        assert_eq!(errors.len(), 1, "{errors:?}");
        assert!(errors[0].contains("backoff_max_ms"));

        let at_limit = MqttConfig {
            backoff_max_ms: i32::MAX as u32,
            ..Default::default()
        };
        assert!(errors_of(&at_limit).is_empty());
    }

    #[test]
    fn tiny_packet_limit_rejected() {
        let cfg = MqttConfig {
            max_packet_size: 100,
            ..Default::default()
        };
        assert!(errors_of(&cfg).iter().any(|e| e.contains("max_packet_size")));
    }

    #[test]
    fn packet_limit_from_toml() {
        let cfg: MqttConfig = toml::from_str("max_packet_size = 65536").unwrap();
        assert_eq!(cfg.max_packet_size, 65536);
        assert_eq!(MqttConfig::default().max_packet_size, 256 * 1024);
    }

    #[test]
    fn wildcard_prefix_rejected() {
        let cfg = MqttConfig {
            topic_prefix: "vermilinks/#".into(),
            ..Default::default()
        };
        assert!(errors_of(&cfg).iter().any(|e| e.contains("topic_prefix")));
    }

    #[test]
    fn half_credentials_rejected() {
        let cfg = MqttConfig {
            username: Some("field".into()),
            ..Default::default()
        };
        assert!(errors_of(&cfg).iter().any(|e| e.contains("together")));
        assert_eq!(cfg.credentials(), None);
    }

    #[test]
    fn collects_every_violation() {
        let cfg = MqttConfig {
            host: String::new(),
            port: 0,
            keep_alive_s: 0,
            connect_timeout_ms: 0,
            ..Default::default()
        };
        assert_eq!(errors_of(&cfg).len(), 4);
    }

    // -- finish_validation ------------------------------------------------------------

    #[test]
    fn finish_ok_when_empty() {
        assert!(finish_validation(Vec::new()).is_ok());
    }

    #[test]
    fn finish_lists_errors() {
        let err = finish_validation(vec!["a is bad".into(), "b is bad".into()]).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("2 errors"), "{msg}");
        assert!(msg.contains("a is bad") && msg.contains("b is bad"), "{msg}");
    }

    #[test]
    fn require_positive_flags_zero() {
        let mut errors = Vec::new();
        require_positive(&mut errors, "timing.status_interval_ms", 0);
        require_positive(&mut errors, "timing.loop_tick_ms", 20);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("status_interval_ms"));
    }

    // -- load_or_default ----------------------------------------------------------------

    #[test]
    fn missing_file_gives_defaults() {
        let cfg: MqttConfig = load_or_default("/nonexistent/vermilinks.toml").unwrap();
        assert_eq!(cfg.port, 1883);
    }

    #[test]
    fn bad_toml_is_an_error() {
        let path = std::env::temp_dir().join(format!("vermilinks-bad-{}.toml", std::process::id()));
        std::fs::write(&path, "port = \"not a number\"").unwrap();
        let res: Result<MqttConfig> = load_or_default(path.to_str().unwrap());
        std::fs::remove_file(&path).unwrap();
        assert!(res.is_err());
    }
}

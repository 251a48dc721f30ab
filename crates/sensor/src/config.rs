//! TOML config for the sensor node.  Every key is optional.
//!
//! ```toml
//! node_id = "esp32b"
//!
//! [mqtt]
//! host = "192.168.1.10"
//!
//! [soil]
//! raw_dry = 3000
//! raw_wet = 1200
//!
//! [timing]
//! telemetry_interval_ms = 5000
//! status_interval_ms = 30000
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::env;

use vermilinks_link::config::{finish_validation, load_or_default, require_positive};
use vermilinks_link::topics::is_valid_segment;
use vermilinks_link::MqttConfig;

use crate::sensors::SoilCalibration;

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    pub node_id: String,
    pub mqtt: MqttConfig,
    pub soil: SoilCalibration,
    pub timing: TimingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub loop_tick_ms: u64,
    pub telemetry_interval_ms: u64,
    pub status_interval_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            node_id: "esp32b".to_string(),
            mqtt: MqttConfig::default(),
            soil: SoilCalibration::default(),
            timing: TimingConfig::default(),
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            loop_tick_ms: 20,
            telemetry_interval_ms: 5_000,
            status_interval_ms: 30_000,
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        let mut errors: Vec<String> = Vec::new();

        if !is_valid_segment(&self.node_id) {
            errors.push(format!(
                "node_id '{}' is not usable as a topic segment",
                self.node_id
            ));
        }
        self.mqtt.validate(&mut errors);

        if self.soil.raw_dry == self.soil.raw_wet {
            errors.push(format!(
                "soil.raw_dry and soil.raw_wet are both {}; calibration needs two distinct points",
                self.soil.raw_dry
            ));
        }

        require_positive(&mut errors, "timing.loop_tick_ms", self.timing.loop_tick_ms);
        require_positive(&mut errors, "timing.telemetry_interval_ms", self.timing.telemetry_interval_ms);
        require_positive(&mut errors, "timing.status_interval_ms", self.timing.status_interval_ms);

        finish_validation(errors)
    }
}

pub fn load(path: &str) -> Result<Config> {
    let mut config: Config = load_or_default(path)?;
    config.mqtt.apply_env();
    if let Ok(node_id) = env::var("NODE_ID") {
        config.node_id = node_id;
    }
    config
        .validate()
        .with_context(|| format!("invalid config: {path}"))?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let cfg = Config::default();
        cfg.validate().unwrap();
        assert_eq!(cfg.node_id, "esp32b");
        assert_eq!(cfg.timing.telemetry_interval_ms, 5_000);
        assert_eq!(cfg.soil.raw_dry, 3000);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let cfg: Config = toml::from_str(
            r#"
            [soil]
            raw_wet = 1000

            [timing]
            telemetry_interval_ms = 1000
            "#,
        )
        .unwrap();
        cfg.validate().unwrap();
        assert_eq!(cfg.soil.raw_dry, 3000);
        assert_eq!(cfg.soil.raw_wet, 1000);
        assert_eq!(cfg.timing.telemetry_interval_ms, 1000);
        assert_eq!(cfg.timing.status_interval_ms, 30_000);
    }

    #[test]
    fn flat_calibration_rejected() {
        let mut cfg = Config::default();
        cfg.soil.raw_wet = cfg.soil.raw_dry;
        let msg = cfg.validate().unwrap_err().to_string();
        assert!(msg.contains("soil.raw_dry"), "{msg}");
    }

    #[test]
    fn zero_telemetry_interval_rejected() {
        let mut cfg = Config::default();
        cfg.timing.telemetry_interval_ms = 0;
        let msg = cfg.validate().unwrap_err().to_string();
        assert!(msg.contains("timing.telemetry_interval_ms"), "{msg}");
    }
}

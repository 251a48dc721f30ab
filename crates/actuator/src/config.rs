//! TOML config loading and validation for the actuator node.
//!
//! Every key is optional; a missing file runs on the defaults below.
//!
//! ```toml
//! node_id = "esp32a"
//! sim_float_high = true        # mock float level when built without `gpio`
//!
//! [mqtt]
//! host = "192.168.1.10"
//! topic_prefix = "vermilinks"
//!
//! [pins]                       # BCM numbering
//! float = 21
//! pump = 17
//! valve1 = 27
//! valve2 = 22
//! valve3 = 23
//! status_led = 24
//! active_low = false
//!
//! [timing]
//! loop_tick_ms = 20
//! safety_sample_ms = 300
//! status_interval_ms = 30000
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::env;

use vermilinks_link::config::{finish_validation, load_or_default, require_positive};
use vermilinks_link::topics::is_valid_segment;
use vermilinks_link::MqttConfig;

// ---------------------------------------------------------------------------
// Config file structures
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    pub node_id: String,
    pub sim_float_high: bool,
    pub mqtt: MqttConfig,
    pub pins: PinConfig,
    pub timing: TimingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PinConfig {
    pub float: u8,
    pub pump: u8,
    pub valve1: u8,
    pub valve2: u8,
    pub valve3: u8,
    pub status_led: u8,
    /// Relay boards that switch on a LOW input.
    pub active_low: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub loop_tick_ms: u64,
    pub safety_sample_ms: u64,
    pub status_interval_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            node_id: "esp32a".to_string(),
            sim_float_high: true,
            mqtt: MqttConfig::default(),
            pins: PinConfig::default(),
            timing: TimingConfig::default(),
        }
    }
}

impl Default for PinConfig {
    fn default() -> Self {
        Self {
            float: 21,
            pump: 17,
            valve1: 27,
            valve2: 22,
            valve3: 23,
            status_led: 24,
            active_low: false,
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            loop_tick_ms: 20,
            safety_sample_ms: 300,
            status_interval_ms: 30_000,
        }
    }
}

// ---------------------------------------------------------------------------
// GPIO whitelist
// ---------------------------------------------------------------------------

/// BCM GPIO pins available on the Raspberry Pi 40-pin header for general
/// use. GPIO 0-1 are reserved for the ID EEPROM and must never be used.
/// GPIO 28+ are not exposed on the standard header.
const VALID_GPIO_PINS: &[u8] = &[
    2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 17, 18, 19, 20, 21, 22, 23, 24, 25, 26, 27,
];

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

impl Config {
    /// Validate everything. Returns `Ok(())` or an error describing every
    /// violation found (not just the first one).
    pub fn validate(&self) -> Result<()> {
        let mut errors: Vec<String> = Vec::new();

        if !is_valid_segment(&self.node_id) {
            errors.push(format!(
                "node_id '{}' is not usable as a topic segment",
                self.node_id
            ));
        }
        self.mqtt.validate(&mut errors);
        self.validate_pins(&mut errors);

        require_positive(&mut errors, "timing.loop_tick_ms", self.timing.loop_tick_ms);
        require_positive(&mut errors, "timing.safety_sample_ms", self.timing.safety_sample_ms);
        require_positive(&mut errors, "timing.status_interval_ms", self.timing.status_interval_ms);

        finish_validation(errors)
    }

    fn validate_pins(&self, errors: &mut Vec<String>) {
        let p = &self.pins;
        let named = [
            ("float", p.float),
            ("pump", p.pump),
            ("valve1", p.valve1),
            ("valve2", p.valve2),
            ("valve3", p.valve3),
            ("status_led", p.status_led),
        ];

        let mut seen: HashSet<u8> = HashSet::new();
        for (name, pin) in named {
            if !VALID_GPIO_PINS.contains(&pin) {
                errors.push(format!(
                    "pins.{name}: {pin} is not a valid BCM GPIO pin (allowed: 2-27)"
                ));
            } else if !seen.insert(pin) {
                errors.push(format!("pins.{name}: gpio {pin} is already used by another output"));
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Load
// ---------------------------------------------------------------------------

/// Read the TOML file (if any), apply env overrides, and validate.
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

// ===========================================================================
// Tests
// ===========================================================================

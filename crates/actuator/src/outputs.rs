//! Pump/valve relays and the link status LED.  The `gpio` feature gates the
//! real rppal driver; without it, a mock keeps levels in memory and logs
//! transitions.

use anyhow::Result;

#[cfg(feature = "gpio")]
use anyhow::Context;
#[cfg(feature = "gpio")]
use rppal::gpio::{Gpio, OutputPin};

use crate::config::PinConfig;
use crate::state::ActuatorState;

/// Relay order used throughout: pump, valve1, valve2, valve3.
const RELAY_NAMES: [&str; 4] = ["pump", "valve1", "valve2", "valve3"];

fn relay_levels(st: &ActuatorState) -> [bool; 4] {
    [st.pump, st.valve1, st.valve2, st.valve3]
}

/// Electrical level (`true` = HIGH) that puts a relay in the `on` position.
#[cfg(any(feature = "gpio", test))]
fn pin_level(on: bool, active_low: bool) -> bool {
    on != active_low
}

fn on_off(on: bool) -> &'static str {
    if on {
        "ON"
    } else {
        "OFF"
    }
}

// ---------------------------------------------------------------------------
// Real GPIO outputs (requires rppal + Raspberry Pi hardware)
// ---------------------------------------------------------------------------
#[cfg(feature = "gpio")]
pub(crate) struct OutputBank {
    relays: [OutputPin; 4],
    status_led: OutputPin,
    active_low: bool, // many relay boards are active-low
}

#[cfg(feature = "gpio")]
impl OutputBank {
    /// Claim every output pin already at its OFF level, so no relay can
    /// click on between claiming and the first `apply`.
    pub(crate) fn new(pins: &PinConfig) -> Result<Self> {
        let gpio = Gpio::new().context("gpio unavailable")?;
        let off_high = pin_level(false, pins.active_low);
        let claim = |pin: u8, high: bool| -> Result<OutputPin> {
            let pin = gpio
                .get(pin)
                .with_context(|| format!("gpio {pin} unavailable"))?;
            Ok(if high {
                pin.into_output_high()
            } else {
                pin.into_output_low()
            })
        };

        let mut bank = Self {
            relays: [
                claim(pins.pump, off_high)?,
                claim(pins.valve1, off_high)?,
                claim(pins.valve2, off_high)?,
                claim(pins.valve3, off_high)?,
            ],
            status_led: claim(pins.status_led, false)?,
            active_low: pins.active_low,
        };
        bank.all_off();
        Ok(bank)
    }

    /// Drive every relay from `st`.  Called after each mutation and on every
    /// safety sample, so pins are re-asserted even if something glitched them.
    pub(crate) fn apply(&mut self, st: &ActuatorState) {
        for (i, on) in relay_levels(st).into_iter().enumerate() {
            self.set(i, on);
        }
    }

    pub(crate) fn all_off(&mut self) {
        for i in 0..self.relays.len() {
            self.set(i, false);
        }
    }

    pub(crate) fn set_status_led(&mut self, on: bool) {
        if on {
            self.status_led.set_high();
        } else {
            self.status_led.set_low();
        }
    }

    fn set(&mut self, index: usize, on: bool) {
        let pin = &mut self.relays[index];
        let was_on = pin.is_set_high() != self.active_low;
        // active-low relay: LOW = ON, HIGH = OFF
        if pin_level(on, self.active_low) {
            pin.set_high();
        } else {
            pin.set_low();
        }
        if was_on != on {
            tracing::info!(relay = RELAY_NAMES[index], "set {}", on_off(on));
        }
    }
}

// ---------------------------------------------------------------------------
// Mock outputs (no hardware, logs transitions)
// ---------------------------------------------------------------------------
#[cfg(not(feature = "gpio"))]
pub(crate) struct OutputBank {
    pub(super) relays: [bool; 4],
    pub(super) status_led: bool,
}

#[cfg(not(feature = "gpio"))]
impl OutputBank {
    pub(crate) fn new(pins: &PinConfig) -> Result<Self> {
        tracing::info!(
            pump = pins.pump,
            valve1 = pins.valve1,
            valve2 = pins.valve2,
            valve3 = pins.valve3,
            status_led = pins.status_led,
            "[mock-gpio] output bank initialised (no hardware)"
        );
        Ok(Self {
            relays: [false; 4],
            status_led: false,
        })
    }

    pub(crate) fn apply(&mut self, st: &ActuatorState) {
        for (i, on) in relay_levels(st).into_iter().enumerate() {
            self.set(i, on);
        }
    }

    pub(crate) fn all_off(&mut self) {
        for i in 0..self.relays.len() {
            self.set(i, false);
        }
    }

    pub(crate) fn set_status_led(&mut self, on: bool) {
        self.status_led = on;
    }

    fn set(&mut self, index: usize, on: bool) {
        if self.relays[index] != on {
            self.relays[index] = on;
            tracing::info!(relay = RELAY_NAMES[index], "[mock-gpio] set {}", on_off(on));
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================

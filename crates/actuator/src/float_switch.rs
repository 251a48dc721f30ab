//! Reservoir float switch input.
//!
//! Wiring: switch between the input pin and GND with the internal pull-up,
//! so an open switch (water present) reads HIGH and a closed one reads LOW.
//! Anything that cannot be read as HIGH counts as LOW: failing open on
//! dry-run protection would let the pump run dry.

use anyhow::Result;

#[cfg(feature = "gpio")]
use anyhow::Context;
#[cfg(feature = "gpio")]
use rppal::gpio::{Gpio, InputPin};

#[cfg(feature = "gpio")]
pub(crate) struct FloatSwitch {
    pin: InputPin,
}

#[cfg(feature = "gpio")]
impl FloatSwitch {
    pub(crate) fn new(pin: u8, _sim_high: bool) -> Result<Self> {
        let gpio = Gpio::new().context("gpio unavailable")?;
        let pin = gpio
            .get(pin)
            .with_context(|| format!("float gpio {pin} unavailable"))?
            .into_input_pullup();
        Ok(Self { pin })
    }

    /// `true` when the reservoir level is OK.
    pub(crate) fn is_high(&mut self) -> bool {
        self.pin.is_high()
    }
}

/// Fixed-level stand-in for development; level comes from config.
#[cfg(not(feature = "gpio"))]
pub(crate) struct FloatSwitch {
    pub(super) high: bool,
}

#[cfg(not(feature = "gpio"))]
impl FloatSwitch {
    pub(crate) fn new(pin: u8, sim_high: bool) -> Result<Self> {
        tracing::info!(
            gpio = pin,
            level = if sim_high { "HIGH" } else { "LOW" },
            "[mock-gpio] float switch simulated"
        );
        Ok(Self { high: sim_high })
    }

    pub(crate) fn is_high(&mut self) -> bool {
        self.high
    }
}

#[cfg(all(test, not(feature = "gpio")))]
mod tests {
    use super::*;

    #[test]
    fn mock_reports_configured_level() {
        let mut f = FloatSwitch::new(21, true).unwrap();
        assert!(f.is_high());
        f.high = false;
        assert!(!f.is_high());
    }
}

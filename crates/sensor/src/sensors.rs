//! Probe readings and their reduction to a telemetry snapshot.
//!
//! Air temperature and humidity come from two probes, soil moisture from four
//! capacitive probes on the 12-bit ADC, water temperature from up to four
//! one-wire probes.  An unreadable probe reports NaN and is left out of its
//! average.

use serde::Deserialize;

/// Raw values from one sampling pass.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeReadings {
    pub air_temp_c: [f64; 2],
    pub humidity: [f64; 2],
    pub soil_raw: [u16; 4],
    pub water_temp_c: [f64; 4],
}

/// Aggregated values published as telemetry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorSnapshot {
    pub temp_c: f64,
    pub humidity: f64,
    /// Percent, 0 = dry, 100 = saturated.
    pub soil: f64,
    pub water_temp_c: f64,
}

/// Raw ADC readings of a capacitive probe in dry air and in water.
/// Drier soil reads higher.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct SoilCalibration {
    pub raw_dry: u16,
    pub raw_wet: u16,
}

impl Default for SoilCalibration {
    fn default() -> Self {
        Self {
            raw_dry: 3000,
            raw_wet: 1200,
        }
    }
}

impl SoilCalibration {
    /// Moisture percent for one raw reading, clamped to 0..=100.  A
    /// degenerate calibration (dry == wet) reads as 0.
    pub fn percent(&self, raw: u16) -> f64 {
        let range = f64::from(self.raw_dry) - f64::from(self.raw_wet);
        if range == 0.0 {
            return 0.0;
        }
        let pct = (f64::from(self.raw_dry) - f64::from(raw)) / range * 100.0;
        pct.clamp(0.0, 100.0)
    }
}

/// Mean of the non-NaN values; `0.0` when none are valid.
pub fn average_valid(values: &[f64]) -> f64 {
    let (sum, count) = values
        .iter()
        .filter(|v| !v.is_nan())
        .fold((0.0, 0_u32), |(sum, n), v| (sum + v, n + 1));
    if count == 0 {
        0.0
    } else {
        sum / f64::from(count)
    }
}

impl ProbeReadings {
    pub fn aggregate(&self, cal: &SoilCalibration) -> SensorSnapshot {
        let soil_pct = self.soil_raw.map(|raw| cal.percent(raw));
        SensorSnapshot {
            temp_c: average_valid(&self.air_temp_c),
            humidity: average_valid(&self.humidity),
            soil: average_valid(&soil_pct),
            water_temp_c: average_valid(&self.water_temp_c),
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================

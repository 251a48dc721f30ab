//! Stateful probe simulator for running the sensor node without hardware.
//!
//! Each channel is a mean-reverting random walk, so consecutive samples stay
//! coherent.  Soil drifts toward dry between samples; air and water
//! temperature follow a slow day/night swing.  Scenarios also set how often a
//! probe drops out (reads NaN), which exercises the aggregation fallbacks.

use std::fmt;

use crate::sensors::{ProbeReadings, SoilCalibration};

/// Full-scale value of the 12-bit soil ADC.
const ADC_MAX: f64 = 4095.0;

// ---------------------------------------------------------------------------
// Gaussian approximation (no extra dependency)
// ---------------------------------------------------------------------------

/// Irwin-Hall approximation of N(0,1): sum of 12 uniforms minus 6.
fn approx_std_normal() -> f64 {
    (0..12).map(|_| fastrand::f64()).sum::<f64>() - 6.0
}

fn gaussian(mean: f64, sigma: f64) -> f64 {
    mean + sigma * approx_std_normal()
}

// ---------------------------------------------------------------------------
// Scenario presets
// ---------------------------------------------------------------------------

/// Simulation profiles selectable via `SIM_SCENARIO`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scenario {
    /// Soil starts mid-range and drifts toward dry.  Occasional dropouts.
    Drying,
    /// Everything hovers near its centre with low noise and no dropouts.
    Stable,
    /// Noisy channels and frequent probe dropouts.
    Flaky,
    /// Soil starts near saturation and dries very slowly.
    Wet,
}

impl Scenario {
    pub fn from_str_lossy(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "stable" => Self::Stable,
            "flaky" => Self::Flaky,
            "wet" => Self::Wet,
            _ => Self::Drying,
        }
    }

    fn params(self) -> Params {
        match self {
            Self::Drying => Params {
                soil_drift: 3.0,
                walk_sigma: 1.0,
                noise_sigma: 1.0,
                dropout: 0.02,
                soil_start: 0.5,
            },
            Self::Stable => Params {
                soil_drift: 0.2,
                walk_sigma: 0.4,
                noise_sigma: 0.3,
                dropout: 0.0,
                soil_start: 0.5,
            },
            Self::Flaky => Params {
                soil_drift: 2.0,
                walk_sigma: 2.0,
                noise_sigma: 3.0,
                dropout: 0.15,
                soil_start: 0.5,
            },
            Self::Wet => Params {
                soil_drift: 0.5,
                walk_sigma: 0.8,
                noise_sigma: 0.8,
                dropout: 0.01,
                soil_start: 0.9,
            },
        }
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Drying => write!(f, "drying"),
            Self::Stable => write!(f, "stable"),
            Self::Flaky => write!(f, "flaky"),
            Self::Wet => write!(f, "wet"),
        }
    }
}

/// Scenario knobs.  Sigmas are in "noise units" scaled per channel.
struct Params {
    /// Soil drift per sample, ADC counts toward dry.
    soil_drift: f64,
    walk_sigma: f64,
    noise_sigma: f64,
    /// Per-probe, per-sample chance of reading NaN.
    dropout: f32,
    /// Starting soil moisture, 0.0 = dry, 1.0 = saturated.
    soil_start: f64,
}

// ---------------------------------------------------------------------------
// Channels
// ---------------------------------------------------------------------------

/// One simulated physical quantity shared by a group of probes, each probe
/// with its own permanent offset.
struct Channel {
    value: f64,
    center: f64,
    lo: f64,
    hi: f64,
    reversion: f64,
    walk_sigma: f64,
    noise_sigma: f64,
    offsets: Vec<f64>,
}

impl Channel {
    fn new(start: f64, center: f64, range: (f64, f64), scale: f64, p: &Params, probes: usize) -> Self {
        Self {
            value: start,
            center,
            lo: range.0,
            hi: range.1,
            reversion: 0.02,
            walk_sigma: p.walk_sigma * scale,
            noise_sigma: p.noise_sigma * scale,
            offsets: (0..probes).map(|_| gaussian(0.0, 2.0 * scale)).collect(),
        }
    }

    fn step(&mut self, drift: f64) {
        let pull = self.reversion * (self.center - self.value);
        self.value = (self.value + drift + pull + gaussian(0.0, self.walk_sigma)).clamp(self.lo, self.hi);
    }

    fn probe(&self, index: usize, bias: f64) -> f64 {
        self.value + bias + self.offsets[index] + gaussian(0.0, self.noise_sigma)
    }
}

// ---------------------------------------------------------------------------
// Simulator
// ---------------------------------------------------------------------------

pub struct SimProbes {
    air_temp: Channel,
    humidity: Channel,
    soil: Channel,
    water_temp: Channel,
    soil_drift: f64,
    dropout: f32,
    /// Length of a simulated day in seconds.
    diurnal_period_s: f64,
    elapsed_s: f64,
    sample_period_s: f64,
}

impl SimProbes {
    /// `sample_period_s` is the telemetry interval; `diurnal_period_s` the
    /// simulated day length (600 for fast iteration, 86400 for real time).
    pub fn new(scenario: Scenario, cal: &SoilCalibration, sample_period_s: f64, diurnal_period_s: f64) -> Self {
        let p = scenario.params();

        let dry = f64::from(cal.raw_dry);
        let wet = f64::from(cal.raw_wet);
        let soil_start = dry + p.soil_start * (wet - dry);
        let (soil_lo, soil_hi) = (dry.min(wet) - 100.0, dry.max(wet) + 100.0);
        let soil_scale = (dry - wet).abs() / 200.0;

        let mut soil = Channel::new(soil_start, soil_start, (soil_lo, soil_hi), soil_scale, &p, 4);
        // Weak pull so the drift accumulates over hundreds of samples.
        soil.reversion = 0.005;

        Self {
            air_temp: Channel::new(24.0, 24.0, (5.0, 40.0), 0.05, &p, 2),
            humidity: Channel::new(60.0, 60.0, (20.0, 95.0), 0.2, &p, 2),
            soil,
            water_temp: Channel::new(20.0, 20.0, (10.0, 30.0), 0.03, &p, 4),
            soil_drift: p.soil_drift * (dry - wet).signum(),
            dropout: p.dropout,
            diurnal_period_s,
            elapsed_s: 0.0,
            sample_period_s,
        }
    }

    /// Advance one sampling period and read every probe.
    pub fn read(&mut self) -> ProbeReadings {
        self.elapsed_s += self.sample_period_s;
        let phase = 2.0 * std::f64::consts::PI * self.elapsed_s / self.diurnal_period_s;

        self.air_temp.step(0.0);
        self.humidity.step(0.0);
        self.soil.step(self.soil_drift);
        self.water_temp.step(0.0);

        // Afternoon is warmer and drier.
        let air_bias = 4.0 * phase.sin();
        let water_bias = 1.0 * phase.sin();
        let humidity_bias = -8.0 * phase.sin();

        ProbeReadings {
            air_temp_c: [0, 1].map(|i| self.maybe_drop(self.air_temp.probe(i, air_bias))),
            humidity: [0, 1].map(|i| self.maybe_drop(self.humidity.probe(i, humidity_bias).clamp(0.0, 100.0))),
            soil_raw: [0, 1, 2, 3].map(|i| self.soil.probe(i, 0.0).round().clamp(0.0, ADC_MAX) as u16),
            water_temp_c: [0, 1, 2, 3].map(|i| self.maybe_drop(self.water_temp.probe(i, water_bias))),
        }
    }

    fn maybe_drop(&self, value: f64) -> f64 {
        if self.dropout > 0.0 && fastrand::f32() < self.dropout {
            f64::NAN
        } else {
            value
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================

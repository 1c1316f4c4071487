//! Plausible production/consumption values for when no real telemetry exists.
//!
//! Production follows a half-sine over the daylight window, peaking at its
//! midpoint (local noon with the default 06:00-18:00 window) and exactly zero
//! outside it. Jitter is multiplicative for production so the curve stays
//! strictly positive inside the window, and additive for consumption.

use std::f64::consts::PI;

use rand::Rng;

/// Peak of the synthetic production curve, in kW.
pub const PEAK_PRODUCTION_KW: f64 = 4.0;
/// Household draw the synthetic consumption oscillates around, in kW.
pub const BASELINE_CONSUMPTION_KW: f64 = 2.0;
/// Relative jitter applied to production (+/- 10%).
pub const PRODUCTION_JITTER_RATIO: f64 = 0.1;
/// Absolute jitter applied to consumption, in kW.
pub const CONSUMPTION_JITTER_KW: f64 = 0.3;

/// Local hours during which the synthetic curve produces power: `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DaylightWindow {
    pub start_hour: f64,
    pub end_hour: f64,
}

impl DaylightWindow {
    pub const DEFAULT: Self = Self {
        start_hour: 6.0,
        end_hour: 18.0,
    };

    pub fn new(start_hour: u8, end_hour: u8) -> Option<Self> {
        if start_hour < end_hour && end_hour <= 24 {
            Some(Self {
                start_hour: f64::from(start_hour),
                end_hour: f64::from(end_hour),
            })
        } else {
            None
        }
    }

    pub fn contains(&self, hour: f64) -> bool {
        hour > self.start_hour && hour < self.end_hour
    }
}

impl Default for DaylightWindow {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyntheticSample {
    pub production_kw: f64,
    pub consumption_kw: f64,
}

/// Deterministic part of the production curve for a fractional local hour.
pub fn base_production_kw(hour: f64, window: DaylightWindow) -> f64 {
    if !window.contains(hour) {
        return 0.0;
    }
    let phase = (hour - window.start_hour) / (window.end_hour - window.start_hour);
    PEAK_PRODUCTION_KW * (PI * phase).sin()
}

/// One synthetic sample for a fractional local hour (e.g. 13.5 for 13:30).
pub fn diurnal_sample<R: Rng + ?Sized>(hour: f64, window: DaylightWindow, rng: &mut R) -> SyntheticSample {
    let base = base_production_kw(hour, window);
    let production_kw = if base > 0.0 {
        base * (1.0 + rng.gen_range(-PRODUCTION_JITTER_RATIO..=PRODUCTION_JITTER_RATIO))
    } else {
        0.0
    };
    let consumption_kw =
        BASELINE_CONSUMPTION_KW + rng.gen_range(-CONSUMPTION_JITTER_KW..=CONSUMPTION_JITTER_KW);

    SyntheticSample {
        production_kw,
        consumption_kw,
    }
}

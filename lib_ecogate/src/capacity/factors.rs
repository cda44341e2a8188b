//! Pure factor functions. Each returns a multiplier in (0, 1].

use chrono::{DateTime, Datelike, Utc};

use crate::configs::SensitivityPolicy;
use crate::models::{AlertLevel, CapacityOverride, EcologicalIndicators, WeatherReading};

/// Lower bound applied to every factor so a bad input never zeroes a site.
pub const MIN_FACTOR: f64 = 0.01;

/// Months (1-based, inclusive) treated as peak season.
pub const PEAK_SEASON_MONTHS: std::ops::RangeInclusive<u32> = 5..=10;
pub const PEAK_SEASON_FACTOR: f64 = 0.80;

pub const UTILIZATION_THRESHOLD: f64 = 0.85;
pub const UTILIZATION_FACTOR: f64 = 0.90;

pub const STRAIN_HIGH: f64 = 0.7;
pub const STRAIN_MODERATE: f64 = 0.4;

pub fn clamp_factor(value: f64) -> f64 {
    if value.is_nan() {
        return 1.0;
    }
    value.clamp(MIN_FACTOR, 1.0)
}

pub fn ecological_factor(policy: &SensitivityPolicy) -> f64 {
    clamp_factor(policy.capacity_multiplier)
}

pub fn weather_factor(reading: Option<&WeatherReading>) -> f64 {
    let level = reading.map_or(AlertLevel::None, |r| r.alert_level);
    match level {
        AlertLevel::None => 1.0,
        AlertLevel::Low => 0.90,
        AlertLevel::Medium => 0.85,
        AlertLevel::High => 0.80,
        AlertLevel::Critical => 0.75,
    }
}

pub fn season_factor(now: DateTime<Utc>) -> f64 {
    if PEAK_SEASON_MONTHS.contains(&now.month()) {
        PEAK_SEASON_FACTOR
    } else {
        1.0
    }
}

/// Keyed on the physical maximum, not the adjusted capacity.
pub fn utilization_factor(occupancy: u32, max_capacity: u32) -> f64 {
    if max_capacity == 0 {
        return 1.0;
    }
    if occupancy as f64 / max_capacity as f64 > UTILIZATION_THRESHOLD {
        UTILIZATION_FACTOR
    } else {
        1.0
    }
}

pub fn indicator_factor(indicators: Option<&EcologicalIndicators>) -> f64 {
    match indicators.map(|i| i.strain_ratio()) {
        Some(ratio) if ratio > STRAIN_HIGH => 0.80,
        Some(ratio) if ratio > STRAIN_MODERATE => 0.90,
        _ => 1.0,
    }
}

pub fn override_factor(entry: Option<&CapacityOverride>, now: DateTime<Utc>) -> f64 {
    clamp_factor(entry.map_or(1.0, |o| o.effective_multiplier(now)))
}

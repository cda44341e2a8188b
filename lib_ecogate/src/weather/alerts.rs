//! Maps raw conditions to an `AlertLevel`. The result is the most severe of
//! the wind, visibility, temperature and condition-keyword rules.

use crate::models::{AlertLevel, WeatherReading};

fn wind_level(speed_ms: f64) -> AlertLevel {
    match speed_ms {
        s if s >= 25.0 => AlertLevel::Critical,
        s if s >= 17.0 => AlertLevel::High,
        s if s >= 11.0 => AlertLevel::Medium,
        s if s >= 8.0 => AlertLevel::Low,
        _ => AlertLevel::None,
    }
}

fn visibility_level(km: f64) -> AlertLevel {
    match km {
        v if v < 0.2 => AlertLevel::High,
        v if v < 1.0 => AlertLevel::Medium,
        v if v < 3.0 => AlertLevel::Low,
        _ => AlertLevel::None,
    }
}

fn temperature_level(celsius: f64) -> AlertLevel {
    match celsius {
        t if t >= 40.0 || t <= -20.0 => AlertLevel::High,
        t if t >= 35.0 || t <= -10.0 => AlertLevel::Medium,
        t if t >= 32.0 || t <= -5.0 => AlertLevel::Low,
        _ => AlertLevel::None,
    }
}

fn condition_level(condition: &str) -> AlertLevel {
    let c = condition.to_lowercase();
    if ["tornado", "hurricane", "cyclone", "wildfire"].iter().any(|k| c.contains(k)) {
        AlertLevel::Critical
    } else if ["thunderstorm", "blizzard", "squall", "hail"].iter().any(|k| c.contains(k)) {
        AlertLevel::High
    } else if ["heavy rain", "snow", "sleet", "freezing"].iter().any(|k| c.contains(k)) {
        AlertLevel::Medium
    } else if ["rain", "drizzle", "fog", "mist", "haze", "smoke"].iter().any(|k| c.contains(k)) {
        AlertLevel::Low
    } else {
        AlertLevel::None
    }
}

pub fn derive_alert_level(reading: &WeatherReading) -> AlertLevel {
    let mut level = wind_level(reading.wind_speed_ms);
    if reading.visibility_km.is_finite() {
        level = level.max(visibility_level(reading.visibility_km));
    }
    if reading.temperature_c.is_finite() {
        level = level.max(temperature_level(reading.temperature_c));
    }
    level.max(condition_level(&reading.condition))
}

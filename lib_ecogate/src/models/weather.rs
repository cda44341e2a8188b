use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::site::SiteId;

/// Readings older than this are stale: they trigger a refresh but remain a fallback.
pub const FRESHNESS_WINDOW_HOURS: i64 = 6;

/// Severity derived from raw weather conditions. `None` means no active alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "connections", derive(postgres_types::ToSql, postgres_types::FromSql))]
#[cfg_attr(feature = "connections", postgres(name = "alert_level"))]
pub enum AlertLevel {
    #[default]
    #[cfg_attr(feature = "connections", postgres(name = "none"))]
    None,
    #[cfg_attr(feature = "connections", postgres(name = "low"))]
    Low,
    #[cfg_attr(feature = "connections", postgres(name = "medium"))]
    Medium,
    #[cfg_attr(feature = "connections", postgres(name = "high"))]
    High,
    #[cfg_attr(feature = "connections", postgres(name = "critical"))]
    Critical,
}

impl AlertLevel {
    pub fn is_active(&self) -> bool {
        *self != AlertLevel::None
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AlertLevel::None => "none",
            AlertLevel::Low => "low",
            AlertLevel::Medium => "medium",
            AlertLevel::High => "high",
            AlertLevel::Critical => "critical",
        }
    }
}

impl fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AlertLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(AlertLevel::None),
            "low" => Ok(AlertLevel::Low),
            "medium" => Ok(AlertLevel::Medium),
            "high" => Ok(AlertLevel::High),
            "critical" => Ok(AlertLevel::Critical),
            other => Err(format!("unknown alert level '{}'", other)),
        }
    }
}

/// # Weather Reading
///
/// One observation for a site. Units: Celsius, percent, hPa, m/s, km.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherReading {
    pub site_id: SiteId,
    pub temperature_c: f64,
    pub humidity_pct: f64,
    pub pressure_hpa: f64,
    pub wind_speed_ms: f64,
    pub visibility_km: f64,
    pub condition: String,
    #[serde(default)]
    pub alert_level: AlertLevel,
    pub recorded_at: DateTime<Utc>,
}

impl WeatherReading {
    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        now - self.recorded_at > Duration::hours(FRESHNESS_WINDOW_HOURS)
    }
}

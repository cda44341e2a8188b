use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of a site. Kept as the textual key used by the store and cache.
pub type SiteId = String;

/// Categorical ecological fragility rating of a site.
///
/// Declaration order is fragility order, so `Low < Medium < High < Critical`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "connections", derive(postgres_types::ToSql, postgres_types::FromSql))]
#[cfg_attr(feature = "connections", postgres(name = "sensitivity_level"))]
pub enum SensitivityLevel {
    #[cfg_attr(feature = "connections", postgres(name = "low"))]
    Low,
    #[cfg_attr(feature = "connections", postgres(name = "medium"))]
    Medium,
    #[cfg_attr(feature = "connections", postgres(name = "high"))]
    High,
    #[cfg_attr(feature = "connections", postgres(name = "critical"))]
    Critical,
}

impl SensitivityLevel {
    /// All levels, least fragile first.
    pub const ALL: [SensitivityLevel; 4] = [
        SensitivityLevel::Low,
        SensitivityLevel::Medium,
        SensitivityLevel::High,
        SensitivityLevel::Critical,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SensitivityLevel::Low => "low",
            SensitivityLevel::Medium => "medium",
            SensitivityLevel::High => "high",
            SensitivityLevel::Critical => "critical",
        }
    }
}

impl fmt::Display for SensitivityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SensitivityLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(SensitivityLevel::Low),
            "medium" => Ok(SensitivityLevel::Medium),
            "high" => Ok(SensitivityLevel::High),
            "critical" => Ok(SensitivityLevel::Critical),
            other => Err(format!("unknown sensitivity level '{}'", other)),
        }
    }
}

/// Geographic position in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// Rejects NaN and out-of-range values so a bad row never reaches the provider.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// # Site
///
/// A capacity-limited destination. `current_occupancy` mirrors the ledger's
/// last recount; the authoritative figure is always recomputed from bookings
/// inside the admission critical section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Site {
    pub id: SiteId,
    pub name: String,
    /// Free-form region or location text, used for region cache invalidation.
    #[serde(default)]
    pub location: String,
    pub max_capacity: u32,
    #[serde(default)]
    pub current_occupancy: u32,
    pub sensitivity: SensitivityLevel,
    #[serde(default)]
    pub coordinates: Option<Coordinates>,
}

impl Site {
    pub fn new(id: impl Into<String>, name: impl Into<String>, max_capacity: u32, sensitivity: SensitivityLevel) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            location: String::new(),
            max_capacity,
            current_occupancy: 0,
            sensitivity,
            coordinates: None,
        }
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = location.into();
        self
    }

    pub fn with_coordinates(mut self, latitude: f64, longitude: f64) -> Self {
        self.coordinates = Some(Coordinates::new(latitude, longitude));
        self
    }

    pub fn with_occupancy(mut self, occupancy: u32) -> Self {
        self.current_occupancy = occupancy;
        self
    }

    /// Raw utilization against the physical maximum, not the adjusted capacity.
    pub fn raw_utilization(&self) -> f64 {
        if self.max_capacity == 0 {
            return 0.0;
        }
        self.current_occupancy as f64 / self.max_capacity as f64
    }

    /// Case-insensitive substring match on name or location.
    pub fn matches_region(&self, region: &str) -> bool {
        let needle = region.trim().to_lowercase();
        if needle.is_empty() {
            return false;
        }
        self.name.to_lowercase().contains(&needle) || self.location.to_lowercase().contains(&needle)
    }
}

/// # Capacity Override
///
/// Administrative multiplier for one site. Ignored when inactive or expired.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapacityOverride {
    pub site_id: SiteId,
    pub multiplier: f64,
    pub active: bool,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub author: String,
    pub created_at: DateTime<Utc>,
}

impl CapacityOverride {
    pub fn is_effective(&self, now: DateTime<Utc>) -> bool {
        self.active && self.expires_at.map_or(true, |expiry| expiry > now)
    }

    /// The multiplier this override contributes at `now`; 1.0 when not effective.
    pub fn effective_multiplier(&self, now: DateTime<Utc>) -> f64 {
        if self.is_effective(now) {
            self.multiplier
        } else {
            1.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn override_with(active: bool, expires_at: Option<DateTime<Utc>>) -> CapacityOverride {
        CapacityOverride {
            site_id: "s1".into(),
            multiplier: 0.5,
            active,
            expires_at,
            author: "ranger".into(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn sensitivity_levels_order_by_fragility() {
        assert!(SensitivityLevel::Low < SensitivityLevel::Medium);
        assert!(SensitivityLevel::High < SensitivityLevel::Critical);
        assert_eq!("CRITICAL".parse::<SensitivityLevel>(), Ok(SensitivityLevel::Critical));
        assert!("extreme".parse::<SensitivityLevel>().is_err());
    }

    #[test]
    fn sensitivity_serializes_lowercase() {
        let json = serde_json::to_string(&SensitivityLevel::High).unwrap();
        assert_eq!(json, "\"high\"");
    }

    #[test]
    fn inactive_or_expired_override_contributes_unity() {
        let now = Utc::now();
        assert_eq!(override_with(false, None).effective_multiplier(now), 1.0);
        assert_eq!(override_with(true, Some(now - Duration::minutes(1))).effective_multiplier(now), 1.0);
        assert_eq!(override_with(true, Some(now + Duration::hours(1))).effective_multiplier(now), 0.5);
        assert_eq!(override_with(true, None).effective_multiplier(now), 0.5);
    }

    #[test]
    fn region_match_is_case_insensitive_on_name_or_location() {
        let site = Site::new("s1", "Cedar Falls Trail", 100, SensitivityLevel::Low).with_location("Northern Ridge");
        assert!(site.matches_region("cedar"));
        assert!(site.matches_region("RIDGE"));
        assert!(!site.matches_region("coast"));
        assert!(!site.matches_region("  "));
    }

    #[test]
    fn coordinates_validation_rejects_out_of_range() {
        assert!(Coordinates::new(45.0, -120.0).is_valid());
        assert!(!Coordinates::new(95.0, 0.0).is_valid());
        assert!(!Coordinates::new(f64::NAN, 0.0).is_valid());
    }
}

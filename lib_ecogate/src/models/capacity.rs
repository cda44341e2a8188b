use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::site::SiteId;
use super::weather::AlertLevel;

/// Two factor tuples closer than this in every component count as unchanged.
pub const FACTOR_EPSILON: f64 = 0.001;

/// Names of the six capacity factors, used for reporting which ones are active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactorKind {
    Ecological,
    Weather,
    Season,
    Utilization,
    Indicator,
    Override,
}

impl fmt::Display for FactorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            FactorKind::Ecological => "ecological sensitivity",
            FactorKind::Weather => "weather alert",
            FactorKind::Season => "peak season",
            FactorKind::Utilization => "high utilization",
            FactorKind::Indicator => "ecological strain",
            FactorKind::Override => "manual override",
        };
        f.write_str(label)
    }
}

/// The six multiplicative factors, each in (0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapacityFactors {
    pub ecological: f64,
    pub weather: f64,
    pub season: f64,
    pub utilization: f64,
    pub indicator: f64,
    #[serde(rename = "override")]
    pub override_factor: f64,
}

impl CapacityFactors {
    pub const UNITY: CapacityFactors = CapacityFactors {
        ecological: 1.0,
        weather: 1.0,
        season: 1.0,
        utilization: 1.0,
        indicator: 1.0,
        override_factor: 1.0,
    };

    pub fn entries(&self) -> [(FactorKind, f64); 6] {
        [
            (FactorKind::Ecological, self.ecological),
            (FactorKind::Weather, self.weather),
            (FactorKind::Season, self.season),
            (FactorKind::Utilization, self.utilization),
            (FactorKind::Indicator, self.indicator),
            (FactorKind::Override, self.override_factor),
        ]
    }

    /// Exact product of the six factors.
    pub fn combined(&self) -> f64 {
        self.ecological * self.weather * self.season * self.utilization * self.indicator * self.override_factor
    }

    /// Factors that are not unity, in declaration order.
    pub fn active_factors(&self) -> Vec<FactorKind> {
        self.entries()
            .iter()
            .filter(|(_, value)| (*value - 1.0).abs() > f64::EPSILON)
            .map(|(kind, _)| *kind)
            .collect()
    }

    pub fn differs_from(&self, other: &CapacityFactors) -> bool {
        self.entries()
            .iter()
            .zip(other.entries().iter())
            .any(|((_, a), (_, b))| (a - b).abs() > FACTOR_EPSILON)
    }
}

impl Default for CapacityFactors {
    fn default() -> Self {
        Self::UNITY
    }
}

/// # Dynamic Capacity
///
/// Result of evaluating one site at one instant. `adjusted_capacity` never
/// exceeds `max_capacity`; `available_spots` saturates at zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DynamicCapacity {
    pub site_id: SiteId,
    pub max_capacity: u32,
    pub current_occupancy: u32,
    pub factors: CapacityFactors,
    pub combined_multiplier: f64,
    pub adjusted_capacity: u32,
    pub available_spots: u32,
    pub active_factors: Vec<FactorKind>,
    pub message: String,
    pub evaluated_at: DateTime<Utc>,
}

impl DynamicCapacity {
    /// Fraction of the physical maximum removed by the factors, 0..=1.
    pub fn reduction_ratio(&self) -> f64 {
        if self.max_capacity == 0 {
            return 0.0;
        }
        1.0 - self.adjusted_capacity as f64 / self.max_capacity as f64
    }
}

/// Outcome of an eligibility check. Denials always carry a reason.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingDecision {
    pub allowed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub adjusted_capacity: u32,
    pub available_spots: u32,
    pub requires_permit: bool,
    pub requires_briefing: bool,
}

impl BookingDecision {
    pub fn deny(reason: impl Into<String>, adjusted_capacity: u32, available_spots: u32) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.into()),
            adjusted_capacity,
            available_spots,
            requires_permit: false,
            requires_briefing: false,
        }
    }

    pub fn reason_or_default(&self) -> &str {
        self.reason.as_deref().unwrap_or("booking not allowed")
    }
}

/// Append-only audit record written when a site's factor tuple changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapacityAdjustment {
    pub site_id: SiteId,
    pub recorded_at: DateTime<Utc>,
    pub original_capacity: u32,
    pub adjusted_capacity: u32,
    pub factors: CapacityFactors,
    pub reason: String,
}

/// Raised when an adjustment removes more than the alert threshold of capacity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapacityAlert {
    pub site_id: SiteId,
    pub severity: AlertLevel,
    pub reduction_pct: f64,
    pub original_capacity: u32,
    pub adjusted_capacity: u32,
    pub active_factors: Vec<FactorKind>,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

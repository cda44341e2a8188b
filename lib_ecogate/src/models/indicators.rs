use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::site::SiteId;

/// Latest measured ecological strain at a site. Each score is 0..=100, higher is worse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EcologicalIndicators {
    pub site_id: SiteId,
    pub soil_compaction: f64,
    pub vegetation_disturbance: f64,
    pub wildlife_disturbance: f64,
    pub water_source_impact: f64,
    pub recorded_at: DateTime<Utc>,
}

impl EcologicalIndicators {
    pub const MAX_SCORE: f64 = 100.0;

    /// Mean strain normalized to 0..=1 (sum of the four scores over 400).
    pub fn strain_ratio(&self) -> f64 {
        let sum = self.soil_compaction + self.vegetation_disturbance + self.wildlife_disturbance + self.water_source_impact;
        sum / (4.0 * Self::MAX_SCORE)
    }

    /// Copy with every score clamped into 0..=100; NaN becomes 0.
    pub fn clamped(mut self) -> Self {
        let clamp = |v: f64| if v.is_nan() { 0.0 } else { v.clamp(0.0, Self::MAX_SCORE) };
        self.soil_compaction = clamp(self.soil_compaction);
        self.vegetation_disturbance = clamp(self.vegetation_disturbance);
        self.wildlife_disturbance = clamp(self.wildlife_disturbance);
        self.water_source_impact = clamp(self.water_source_impact);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn indicators(a: f64, b: f64, c: f64, d: f64) -> EcologicalIndicators {
        EcologicalIndicators {
            site_id: "s1".into(),
            soil_compaction: a,
            vegetation_disturbance: b,
            wildlife_disturbance: c,
            water_source_impact: d,
            recorded_at: Utc::now(),
        }
    }

    #[test]
    fn strain_ratio_is_sum_over_four_hundred() {
        assert_eq!(indicators(100.0, 100.0, 100.0, 100.0).strain_ratio(), 1.0);
        assert_eq!(indicators(40.0, 40.0, 40.0, 40.0).strain_ratio(), 0.4);
        assert_eq!(indicators(0.0, 0.0, 0.0, 0.0).strain_ratio(), 0.0);
    }

    #[test]
    fn clamped_bounds_each_score() {
        let c = indicators(-5.0, 150.0, f64::NAN, 50.0).clamped();
        assert_eq!(c.soil_compaction, 0.0);
        assert_eq!(c.vegetation_disturbance, 100.0);
        assert_eq!(c.wildlife_disturbance, 0.0);
        assert_eq!(c.water_source_impact, 50.0);
    }
}

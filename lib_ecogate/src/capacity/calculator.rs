//! # Capacity Calculator
//!
//! Synchronous, side-effect free evaluation of the six capacity factors. The
//! calculator only reads the policy service; weather and indicators are passed
//! in, which is what lets the admission gate re-evaluate a site inside the
//! store's critical section without any I/O.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::factors;
use crate::configs::PolicyService;
use crate::models::{
    BookingDecision, CapacityFactors, DynamicCapacity, EcologicalIndicators, SensitivityLevel, Site, SiteId,
    WeatherReading,
};

#[derive(Clone)]
pub struct CapacityCalculator {
    policies: Arc<PolicyService>,
}

impl CapacityCalculator {
    pub fn new(policies: Arc<PolicyService>) -> Self {
        Self { policies }
    }

    pub fn policies(&self) -> &Arc<PolicyService> {
        &self.policies
    }

    pub fn factors(
        &self,
        site: &Site,
        weather: Option<&WeatherReading>,
        indicators: Option<&EcologicalIndicators>,
        now: DateTime<Utc>,
    ) -> CapacityFactors {
        let policy = self.policies.policy(site.sensitivity);
        let override_entry = self.policies.override_for(&site.id);
        CapacityFactors {
            ecological: factors::ecological_factor(&policy),
            weather: factors::weather_factor(weather),
            season: factors::season_factor(now),
            utilization: factors::utilization_factor(site.current_occupancy, site.max_capacity),
            indicator: factors::indicator_factor(indicators),
            override_factor: factors::override_factor(override_entry.as_ref(), now),
        }
    }

    /// Evaluates `site` using its `current_occupancy`.
    pub fn evaluate(
        &self,
        site: &Site,
        weather: Option<&WeatherReading>,
        indicators: Option<&EcologicalIndicators>,
        now: DateTime<Utc>,
    ) -> DynamicCapacity {
        let factors = self.factors(site, weather, indicators, now);
        let combined = factors.combined();
        let adjusted = ((site.max_capacity as f64) * combined).floor().max(0.0) as u32;
        let adjusted = adjusted.min(site.max_capacity);
        let available = adjusted.saturating_sub(site.current_occupancy);
        let active = factors.active_factors();

        let message = if active.is_empty() {
            format!("Full capacity of {} available", site.max_capacity)
        } else {
            let names: Vec<String> = active.iter().map(|k| k.to_string()).collect();
            format!(
                "Capacity reduced from {} to {} due to {}",
                site.max_capacity,
                adjusted,
                names.join(", ")
            )
        };

        DynamicCapacity {
            site_id: site.id.clone(),
            max_capacity: site.max_capacity,
            current_occupancy: site.current_occupancy,
            factors,
            combined_multiplier: combined,
            adjusted_capacity: adjusted,
            available_spots: available,
            active_factors: active,
            message,
            evaluated_at: now,
        }
    }

    /// Applies the admission rules to an already evaluated capacity.
    pub fn decide(&self, sensitivity: SensitivityLevel, capacity: &DynamicCapacity, group_size: u32) -> BookingDecision {
        let policy = self.policies.policy(sensitivity);
        let adjusted = capacity.adjusted_capacity;
        let available = capacity.available_spots;

        if sensitivity == SensitivityLevel::Critical {
            return BookingDecision::deny(policy.restriction_message, adjusted, available);
        }
        if group_size == 0 {
            return BookingDecision::deny("Group size must be at least 1", adjusted, available);
        }
        if group_size > available {
            return BookingDecision::deny(
                format!(
                    "Only {} spots available at this {}-sensitivity site; requested {} (short by {})",
                    available,
                    sensitivity,
                    group_size,
                    group_size - available
                ),
                adjusted,
                available,
            );
        }
        BookingDecision {
            allowed: true,
            reason: None,
            adjusted_capacity: adjusted,
            available_spots: available,
            requires_permit: policy.requires_permit,
            requires_briefing: policy.requires_briefing,
        }
    }

    /// Evaluates and decides in one step, from the occupancy carried by `site`.
    pub fn check_eligibility(
        &self,
        site: &Site,
        group_size: u32,
        weather: Option<&WeatherReading>,
        indicators: Option<&EcologicalIndicators>,
        now: DateTime<Utc>,
    ) -> BookingDecision {
        let capacity = self.evaluate(site, weather, indicators, now);
        self.decide(site.sensitivity, &capacity, group_size)
    }

    /// Batch evaluation from pre-fetched inputs. No logging, no I/O.
    pub fn evaluate_batch(
        &self,
        sites: &[Site],
        weather: &HashMap<SiteId, WeatherReading>,
        indicators: &HashMap<SiteId, EcologicalIndicators>,
        now: DateTime<Utc>,
    ) -> BTreeMap<SiteId, DynamicCapacity> {
        sites
            .iter()
            .map(|site| {
                let capacity = self.evaluate(site, weather.get(&site.id), indicators.get(&site.id), now);
                (site.id.clone(), capacity)
            })
            .collect()
    }

    pub fn batch_adjusted_capacities(
        &self,
        sites: &[Site],
        weather: &HashMap<SiteId, WeatherReading>,
        indicators: &HashMap<SiteId, EcologicalIndicators>,
        now: DateTime<Utc>,
    ) -> BTreeMap<SiteId, u32> {
        self.evaluate_batch(sites, weather, indicators, now)
            .into_iter()
            .map(|(id, capacity)| (id, capacity.adjusted_capacity))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AlertLevel, FactorKind};
    use chrono::{Duration, TimeZone};

    fn off_season() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 20, 9, 0, 0).unwrap()
    }

    fn calculator() -> CapacityCalculator {
        CapacityCalculator::new(Arc::new(PolicyService::in_memory()))
    }

    fn windy(site: &str, level: AlertLevel) -> WeatherReading {
        WeatherReading {
            site_id: site.into(),
            temperature_c: 12.0,
            humidity_pct: 70.0,
            pressure_hpa: 990.0,
            wind_speed_ms: 20.0,
            visibility_km: 8.0,
            condition: "storm".into(),
            alert_level: level,
            recorded_at: off_season(),
        }
    }

    #[test]
    fn high_sensitivity_halves_capacity() {
        let site = Site::new("s1", "Kelp Bay", 100, SensitivityLevel::High);
        let capacity = calculator().evaluate(&site, None, None, off_season());
        assert_eq!(capacity.adjusted_capacity, 50);
        assert_eq!(capacity.available_spots, 50);
        assert_eq!(capacity.active_factors, vec![FactorKind::Ecological]);
    }

    #[test]
    fn group_larger_than_available_is_denied_with_count() {
        let site = Site::new("s1", "Kelp Bay", 100, SensitivityLevel::High).with_occupancy(48);
        let decision = calculator().check_eligibility(&site, 5, None, None, off_season());
        assert!(!decision.allowed);
        let reason = decision.reason.unwrap();
        assert!(reason.contains("Only 2 spots"), "{}", reason);
        assert!(reason.contains("high"), "{}", reason);
    }

    #[test]
    fn critical_site_is_always_denied() {
        let site = Site::new("s1", "Nesting Dunes", 250, SensitivityLevel::Critical);
        let calc = calculator();
        let capacity = calc.evaluate(&site, None, None, off_season());
        assert_eq!(capacity.available_spots, 50);
        let decision = calc.decide(site.sensitivity, &capacity, 1);
        assert!(!decision.allowed);
        assert!(decision.reason.unwrap().contains("closed to the general public"));
    }

    #[test]
    fn allowed_decision_carries_policy_flags() {
        let site = Site::new("s1", "Kelp Bay", 100, SensitivityLevel::High);
        let decision = calculator().check_eligibility(&site, 10, None, None, off_season());
        assert!(decision.allowed);
        assert!(decision.requires_permit);
        assert!(decision.requires_briefing);
        assert!(decision.reason.is_none());
    }

    #[test]
    fn zero_group_is_denied() {
        let site = Site::new("s1", "Meadow", 100, SensitivityLevel::Low);
        assert!(!calculator().check_eligibility(&site, 0, None, None, off_season()).allowed);
    }

    #[test]
    fn adjusted_is_floor_of_product_and_bounded() {
        let calc = calculator();
        let peak = Utc.with_ymd_and_hms(2026, 7, 1, 12, 0, 0).unwrap();
        let site = Site::new("s1", "Canyon", 97, SensitivityLevel::Medium).with_occupancy(90);
        let weather = windy("s1", AlertLevel::Medium);
        let capacity = calc.evaluate(&site, Some(&weather), None, peak);
        let expected = (97.0 * 0.8 * 0.85 * 0.8 * 0.9_f64).floor() as u32;
        assert_eq!(capacity.adjusted_capacity, expected);
        assert!(capacity.adjusted_capacity <= site.max_capacity);
        assert_eq!(capacity.available_spots, 0);
    }

    fn strained(site: &str, score: f64) -> EcologicalIndicators {
        EcologicalIndicators {
            site_id: site.into(),
            soil_compaction: score,
            vegetation_disturbance: score,
            wildlife_disturbance: score,
            water_source_impact: score,
            recorded_at: off_season(),
        }
    }

    #[test]
    fn all_six_factors_multiply_exactly() {
        let policies = Arc::new(PolicyService::in_memory());
        let calc = CapacityCalculator::new(Arc::clone(&policies));
        policies.set_capacity_override("s1", 0.7, true, None, "ops").unwrap();
        let peak = Utc.with_ymd_and_hms(2026, 8, 15, 10, 0, 0).unwrap();
        let site = Site::new("s1", "Glacier Rim", 100, SensitivityLevel::High).with_occupancy(90);
        let weather = windy("s1", AlertLevel::Medium);
        let indicators = strained("s1", 80.0);

        let capacity = calc.evaluate(&site, Some(&weather), Some(&indicators), peak);
        let f = capacity.factors;
        assert_eq!(
            (f.ecological, f.weather, f.season, f.utilization, f.indicator, f.override_factor),
            (0.5, 0.85, 0.8, 0.9, 0.8, 0.7)
        );
        let product = f.ecological * f.weather * f.season * f.utilization * f.indicator * f.override_factor;
        assert_eq!(capacity.combined_multiplier, product);
        assert_eq!(capacity.adjusted_capacity, (100.0 * product).floor() as u32);
        assert_eq!(capacity.active_factors.len(), 6);
        assert_eq!(capacity.available_spots, 0);
    }

    #[test]
    fn capacity_stays_within_bounds_across_inputs() {
        struct Case {
            sensitivity: SensitivityLevel,
            max: u32,
            occupancy: u32,
            alert: Option<AlertLevel>,
            strain: Option<f64>,
            override_multiplier: Option<f64>,
        }
        let cases = [
            Case { sensitivity: SensitivityLevel::Low, max: 100, occupancy: 0, alert: None, strain: None, override_multiplier: None },
            Case { sensitivity: SensitivityLevel::Low, max: 100, occupancy: 150, alert: None, strain: None, override_multiplier: None },
            Case { sensitivity: SensitivityLevel::Medium, max: 1, occupancy: 5, alert: Some(AlertLevel::Low), strain: Some(45.0), override_multiplier: None },
            Case { sensitivity: SensitivityLevel::High, max: 40, occupancy: 39, alert: Some(AlertLevel::High), strain: Some(100.0), override_multiplier: Some(factors::MIN_FACTOR) },
            Case { sensitivity: SensitivityLevel::Critical, max: 250, occupancy: 10, alert: Some(AlertLevel::Critical), strain: Some(90.0), override_multiplier: Some(0.3) },
            Case { sensitivity: SensitivityLevel::Critical, max: 7, occupancy: u32::MAX, alert: Some(AlertLevel::Critical), strain: None, override_multiplier: Some(1.0) },
            Case { sensitivity: SensitivityLevel::Medium, max: u32::MAX, occupancy: 0, alert: None, strain: Some(0.0), override_multiplier: Some(0.99) },
        ];
        let peak = Utc.with_ymd_and_hms(2026, 6, 1, 8, 0, 0).unwrap();

        for (i, case) in cases.iter().enumerate() {
            let policies = Arc::new(PolicyService::in_memory());
            let calc = CapacityCalculator::new(Arc::clone(&policies));
            let id = format!("case-{}", i);
            if let Some(m) = case.override_multiplier {
                policies.set_capacity_override(&id, m, true, None, "ops").unwrap();
            }
            let site = Site::new(id.clone(), "Case", case.max, case.sensitivity).with_occupancy(case.occupancy);
            let weather = case.alert.map(|level| windy(&id, level));
            let indicators = case.strain.map(|score| strained(&id, score));

            for now in [off_season(), peak] {
                let capacity = calc.evaluate(&site, weather.as_ref(), indicators.as_ref(), now);
                assert!(capacity.adjusted_capacity <= case.max, "case {}: {:?}", i, capacity);
                assert_eq!(
                    capacity.available_spots,
                    capacity.adjusted_capacity.saturating_sub(case.occupancy),
                    "case {}",
                    i
                );
                assert_eq!(capacity.combined_multiplier, capacity.factors.combined(), "case {}", i);
                assert!(capacity.combined_multiplier > 0.0 && capacity.combined_multiplier <= 1.0, "case {}", i);
                if case.sensitivity == SensitivityLevel::Critical {
                    assert!(!calc.decide(case.sensitivity, &capacity, 1).allowed, "case {}", i);
                }
            }
        }
    }

    #[test]
    fn expired_override_is_ignored() {
        let policies = Arc::new(PolicyService::in_memory());
        let calc = CapacityCalculator::new(Arc::clone(&policies));
        let now = off_season();
        policies
            .set_capacity_override("s1", 0.5, true, Some(now - Duration::hours(1)), "ops")
            .unwrap();
        let site = Site::new("s1", "Meadow", 100, SensitivityLevel::Low);
        assert_eq!(calc.evaluate(&site, None, None, now).adjusted_capacity, 100);
        policies.set_capacity_override("s1", 0.5, true, None, "ops").unwrap();
        assert_eq!(calc.evaluate(&site, None, None, now).adjusted_capacity, 50);
    }

    #[test]
    fn inactive_override_is_stored_but_not_applied() {
        let policies = Arc::new(PolicyService::in_memory());
        let calc = CapacityCalculator::new(Arc::clone(&policies));
        let now = off_season();
        let entry = policies.set_capacity_override("s1", 0.5, false, None, "ops").unwrap();
        assert!(!entry.active);
        assert!(policies.override_for("s1").is_some());
        let site = Site::new("s1", "Meadow", 100, SensitivityLevel::Low);
        assert_eq!(calc.evaluate(&site, None, None, now).adjusted_capacity, 100);
    }

    #[test]
    fn batch_uses_prefetched_maps() {
        let calc = calculator();
        let sites = vec![
            Site::new("a", "A", 100, SensitivityLevel::Low),
            Site::new("b", "B", 100, SensitivityLevel::Low),
        ];
        let mut weather = HashMap::new();
        weather.insert("b".to_string(), windy("b", AlertLevel::Critical));
        let result = calc.batch_adjusted_capacities(&sites, &weather, &HashMap::new(), off_season());
        assert_eq!(result.get("a"), Some(&100));
        assert_eq!(result.get("b"), Some(&75));
    }
}

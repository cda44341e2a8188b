//! # Capacity Engine
//!
//! Wires the calculator to its live inputs. Single-site evaluation compares
//! the fresh factor tuple with the last one logged for that site; a change
//! beyond `FACTOR_EPSILON` appends an adjustment entry, publishes a
//! `capacity_adjustment` event and, past the alert threshold, records and
//! publishes a `CapacityAlert`. Audit writes are best effort: failures are
//! logged and never surface to the caller.
//!
//! The last-logged map starts empty. The first evaluation of a site seeds it
//! from the newest persisted adjustment, or from unity when the log is empty.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use super::{CapacityCalculator, CapacityError};
use crate::core::{CapacityEvent, Dispatcher};
use crate::ecology::IndicatorService;
use crate::models::{
    AlertLevel, BookingDecision, CapacityAdjustment, CapacityAlert, CapacityFactors, CapacityOverride,
    DynamicCapacity, EcologicalIndicators, Site, SiteId, WeatherReading,
};
use crate::store::{AuditStore, BookingStore};
use crate::weather::WeatherAggregator;

/// Reductions above this fraction of max capacity raise an alert.
pub const ALERT_REDUCTION: f64 = 0.15;
/// Reductions above this fraction raise a `high` alert instead of `medium`.
pub const HIGH_ALERT_REDUCTION: f64 = 0.30;

pub struct CapacityEngine {
    calculator: CapacityCalculator,
    aggregator: Arc<WeatherAggregator>,
    indicators: Arc<IndicatorService>,
    sites: Arc<dyn BookingStore>,
    audit: Arc<dyn AuditStore>,
    dispatcher: Arc<Dispatcher>,
    last_logged: Mutex<HashMap<SiteId, CapacityFactors>>,
}

impl CapacityEngine {
    pub fn new(
        calculator: CapacityCalculator,
        aggregator: Arc<WeatherAggregator>,
        indicators: Arc<IndicatorService>,
        sites: Arc<dyn BookingStore>,
        audit: Arc<dyn AuditStore>,
        dispatcher: Arc<Dispatcher>,
    ) -> Self {
        Self {
            calculator,
            aggregator,
            indicators,
            sites,
            audit,
            dispatcher,
            last_logged: Mutex::new(HashMap::new()),
        }
    }

    pub fn calculator(&self) -> &CapacityCalculator {
        &self.calculator
    }

    pub fn aggregator(&self) -> &Arc<WeatherAggregator> {
        &self.aggregator
    }

    pub fn indicators(&self) -> &Arc<IndicatorService> {
        &self.indicators
    }

    async fn load_site(&self, site_id: &str) -> Result<Site, CapacityError> {
        self.sites
            .site(site_id)
            .await?
            .ok_or_else(|| CapacityError::UnknownSite(site_id.to_string()))
    }

    /// Weather and indicators for one site, fetched concurrently.
    pub async fn inputs_for(&self, site: &Site) -> (Option<WeatherReading>, Option<EcologicalIndicators>) {
        tokio::join!(self.aggregator.weather_for(site), self.indicators.latest(&site.id))
    }

    /// Dynamic capacity for a site by id, logging any change.
    pub async fn dynamic_capacity(&self, site_id: &str) -> Result<DynamicCapacity, CapacityError> {
        let site = self.load_site(site_id).await?;
        Ok(self.evaluate_site(&site, None, None).await)
    }

    /// Evaluates `site`, fetching whichever input the caller did not supply,
    /// then records the result if the factor tuple moved.
    pub async fn evaluate_site(
        &self,
        site: &Site,
        weather: Option<WeatherReading>,
        indicators: Option<EcologicalIndicators>,
    ) -> DynamicCapacity {
        let weather = match weather {
            Some(w) => Some(w),
            None => self.aggregator.weather_for(site).await,
        };
        let indicators = match indicators {
            Some(i) => Some(i),
            None => self.indicators.latest(&site.id).await,
        };
        let capacity = self
            .calculator
            .evaluate(site, weather.as_ref(), indicators.as_ref(), Utc::now());
        self.record_if_changed(&capacity).await;
        capacity
    }

    async fn baseline(&self, site_id: &str) -> CapacityFactors {
        let cached = self.last_logged.lock().ok().and_then(|m| m.get(site_id).copied());
        if let Some(factors) = cached {
            return factors;
        }
        match self.audit.latest_adjustment(site_id).await {
            Ok(Some(entry)) => entry.factors,
            Ok(None) => CapacityFactors::UNITY,
            Err(e) => {
                warn!(site_id, error = %e, "Could not read last capacity adjustment; assuming unity");
                CapacityFactors::UNITY
            }
        }
    }

    /// Returns the logged entry when the tuple changed.
    async fn record_if_changed(&self, capacity: &DynamicCapacity) -> Option<CapacityAdjustment> {
        let baseline = self.baseline(&capacity.site_id).await;
        let changed = match self.last_logged.lock() {
            Ok(mut map) => {
                let previous = *map.entry(capacity.site_id.clone()).or_insert(baseline);
                if capacity.factors.differs_from(&previous) {
                    map.insert(capacity.site_id.clone(), capacity.factors);
                    true
                } else {
                    false
                }
            }
            Err(_) => capacity.factors.differs_from(&baseline),
        };
        if !changed {
            return None;
        }

        let entry = CapacityAdjustment {
            site_id: capacity.site_id.clone(),
            recorded_at: capacity.evaluated_at,
            original_capacity: capacity.max_capacity,
            adjusted_capacity: capacity.adjusted_capacity,
            factors: capacity.factors,
            reason: capacity.message.clone(),
        };
        info!(
            site_id = %entry.site_id,
            original = entry.original_capacity,
            adjusted = entry.adjusted_capacity,
            combined = capacity.combined_multiplier,
            "Capacity adjusted"
        );
        if let Err(e) = self.audit.append_adjustment(&entry).await {
            warn!(site_id = %entry.site_id, error = %e, "Failed to persist capacity adjustment");
        }
        self.dispatcher.publish(CapacityEvent::capacity_adjustment(entry.clone()));

        if let Some(alert) = build_alert(capacity, capacity.evaluated_at) {
            warn!(
                site_id = %alert.site_id,
                severity = %alert.severity,
                reduction_pct = alert.reduction_pct,
                "Capacity alert"
            );
            if let Err(e) = self.audit.record_alert(&alert).await {
                warn!(site_id = %alert.site_id, error = %e, "Failed to persist capacity alert");
            }
            self.dispatcher.publish(CapacityEvent::capacity_alert(alert));
        }
        Some(entry)
    }

    /// Adjusted capacities for the given sites (all sites when `None`) from
    /// one batched weather fetch. Nothing is logged.
    pub async fn batch_evaluate(&self, sites: Option<Vec<Site>>) -> Result<BTreeMap<SiteId, DynamicCapacity>, CapacityError> {
        let sites = match sites {
            Some(sites) => sites,
            None => self.sites.sites().await?,
        };
        let (weather, indicators) = tokio::join!(
            self.aggregator.weather_for_sites(&sites),
            self.indicators.latest_for_sites(&sites)
        );
        Ok(self.calculator.evaluate_batch(&sites, &weather, &indicators, Utc::now()))
    }

    pub async fn batch_adjusted_capacities(&self, sites: Option<Vec<Site>>) -> Result<BTreeMap<SiteId, u32>, CapacityError> {
        Ok(self
            .batch_evaluate(sites)
            .await?
            .into_iter()
            .map(|(id, c)| (id, c.adjusted_capacity))
            .collect())
    }

    /// Advisory eligibility check against the current occupancy. The binding
    /// check happens again inside the store when the booking is admitted.
    pub async fn is_booking_allowed(&self, site_id: &str, group_size: u32) -> Result<BookingDecision, CapacityError> {
        let mut site = self.load_site(site_id).await?;
        site.current_occupancy = self.sites.occupancy(site_id).await?;
        let (weather, indicators) = self.inputs_for(&site).await;
        Ok(self
            .calculator
            .check_eligibility(&site, group_size, weather.as_ref(), indicators.as_ref(), Utc::now()))
    }

    /// Installs an override and re-evaluates the site so the change is logged
    /// and broadcast immediately.
    pub async fn set_capacity_override(
        &self,
        site_id: &str,
        multiplier: f64,
        active: bool,
        expires_at: Option<DateTime<Utc>>,
        author: &str,
    ) -> Result<(CapacityOverride, DynamicCapacity), CapacityError> {
        let site = self.load_site(site_id).await?;
        let entry = self
            .calculator
            .policies()
            .set_capacity_override(site_id, multiplier, active, expires_at, author)?;
        let capacity = self.evaluate_site(&site, None, None).await;
        Ok((entry, capacity))
    }

    pub async fn clear_capacity_override(&self, site_id: &str) -> Result<(bool, DynamicCapacity), CapacityError> {
        let site = self.load_site(site_id).await?;
        let existed = self.calculator.policies().clear_capacity_override(site_id)?;
        let capacity = self.evaluate_site(&site, None, None).await;
        Ok((existed, capacity))
    }
}

fn build_alert(capacity: &DynamicCapacity, now: DateTime<Utc>) -> Option<CapacityAlert> {
    let reduction = capacity.reduction_ratio();
    if reduction <= ALERT_REDUCTION {
        return None;
    }
    let severity = if reduction > HIGH_ALERT_REDUCTION {
        AlertLevel::High
    } else {
        AlertLevel::Medium
    };
    let names: Vec<String> = capacity.active_factors.iter().map(|k| k.to_string()).collect();
    let reduction_pct = (reduction * 1000.0).round() / 10.0;
    Some(CapacityAlert {
        site_id: capacity.site_id.clone(),
        severity,
        reduction_pct,
        original_capacity: capacity.max_capacity,
        adjusted_capacity: capacity.adjusted_capacity,
        active_factors: capacity.active_factors.clone(),
        message: format!(
            "Capacity reduced by {}% ({} -> {}) due to {}",
            reduction_pct,
            capacity.max_capacity,
            capacity.adjusted_capacity,
            names.join(", ")
        ),
        created_at: now,
    })
}

use std::collections::HashMap;
use std::sync::{Mutex, RwLock};

use async_trait::async_trait;

use super::{AdmissionGate, AuditStore, BookingStore, ObservationStore, StoreError, TransitionOutcome};
use crate::admission::OccupancyLedger;
use crate::models::{
    Booking, BookingStatus, CapacityAdjustment, CapacityAlert, CleanupEvent, EcoPointsOutcome, EcologicalIndicators,
    RegistrationOutcome, Site, SiteId, WeatherReading,
};

/// # In-memory store
///
/// Counters go through the `OccupancyLedger`; observations are latest-wins
/// maps and the audit log is a plain append-only vector.
#[derive(Default)]
pub struct MemoryStore {
    ledger: OccupancyLedger,
    weather: RwLock<HashMap<String, WeatherReading>>,
    indicators: RwLock<HashMap<String, EcologicalIndicators>>,
    adjustments: Mutex<Vec<CapacityAdjustment>>,
    alerts: Mutex<Vec<CapacityAlert>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sites(sites: impl IntoIterator<Item = Site>) -> Result<Self, StoreError> {
        let store = Self::new();
        for site in sites {
            store.ledger.upsert_site(site)?;
        }
        Ok(store)
    }

    pub fn ledger(&self) -> &OccupancyLedger {
        &self.ledger
    }
}

#[async_trait]
impl BookingStore for MemoryStore {
    async fn site(&self, site_id: &str) -> Result<Option<Site>, StoreError> {
        self.ledger.site(site_id)
    }

    async fn sites(&self) -> Result<Vec<Site>, StoreError> {
        self.ledger.sites()
    }

    async fn upsert_site(&self, site: Site) -> Result<(), StoreError> {
        self.ledger.upsert_site(site)
    }

    async fn booking(&self, booking_id: &str) -> Result<Option<Booking>, StoreError> {
        self.ledger.booking(booking_id)
    }

    async fn insert_booking(&self, booking: Booking) -> Result<(), StoreError> {
        self.ledger.insert_booking(booking)
    }

    async fn transition_booking(
        &self,
        booking_id: &str,
        next: BookingStatus,
        gate: Option<AdmissionGate<'_>>,
    ) -> Result<TransitionOutcome, StoreError> {
        self.ledger.transition(booking_id, next, gate)
    }

    async fn occupancy(&self, site_id: &str) -> Result<u32, StoreError> {
        self.ledger.occupancy(site_id)
    }

    async fn upsert_cleanup_event(&self, event: CleanupEvent) -> Result<(), StoreError> {
        self.ledger.upsert_event(event)
    }

    async fn cleanup_event(&self, event_id: &str) -> Result<Option<CleanupEvent>, StoreError> {
        self.ledger.event(event_id)
    }

    async fn register_participant(&self, event_id: &str, user_id: &str) -> Result<RegistrationOutcome, StoreError> {
        self.ledger.register(event_id, user_id)
    }

    async fn cancel_registration(&self, event_id: &str, user_id: &str) -> Result<bool, StoreError> {
        self.ledger.cancel_registration(event_id, user_id)
    }

    async fn adjust_eco_points(&self, user_id: &str, delta: i64) -> Result<EcoPointsOutcome, StoreError> {
        self.ledger.adjust_points(user_id, delta)
    }

    async fn eco_points(&self, user_id: &str) -> Result<i64, StoreError> {
        self.ledger.points(user_id)
    }
}

#[async_trait]
impl ObservationStore for MemoryStore {
    async fn latest_weather(&self, site_id: &str) -> Result<Option<WeatherReading>, StoreError> {
        let map = self.weather.read().map_err(|_| StoreError::Poisoned)?;
        Ok(map.get(site_id).cloned())
    }

    async fn record_weather(&self, reading: &WeatherReading) -> Result<(), StoreError> {
        let mut map = self.weather.write().map_err(|_| StoreError::Poisoned)?;
        let newer = map
            .get(&reading.site_id)
            .map_or(true, |existing| reading.recorded_at >= existing.recorded_at);
        if newer {
            map.insert(reading.site_id.clone(), reading.clone());
        }
        Ok(())
    }

    async fn latest_indicators(&self, site_id: &str) -> Result<Option<EcologicalIndicators>, StoreError> {
        let map = self.indicators.read().map_err(|_| StoreError::Poisoned)?;
        Ok(map.get(site_id).cloned())
    }

    async fn latest_indicators_for(
        &self,
        site_ids: &[SiteId],
    ) -> Result<HashMap<SiteId, EcologicalIndicators>, StoreError> {
        let map = self.indicators.read().map_err(|_| StoreError::Poisoned)?;
        Ok(site_ids
            .iter()
            .filter_map(|id| map.get(id).map(|found| (id.clone(), found.clone())))
            .collect())
    }

    async fn record_indicators(&self, indicators: &EcologicalIndicators) -> Result<(), StoreError> {
        let mut map = self.indicators.write().map_err(|_| StoreError::Poisoned)?;
        let newer = map
            .get(&indicators.site_id)
            .map_or(true, |existing| indicators.recorded_at >= existing.recorded_at);
        if newer {
            map.insert(indicators.site_id.clone(), indicators.clone());
        }
        Ok(())
    }
}

#[async_trait]
impl AuditStore for MemoryStore {
    async fn append_adjustment(&self, entry: &CapacityAdjustment) -> Result<(), StoreError> {
        self.adjustments.lock().map_err(|_| StoreError::Poisoned)?.push(entry.clone());
        Ok(())
    }

    async fn latest_adjustment(&self, site_id: &str) -> Result<Option<CapacityAdjustment>, StoreError> {
        let log = self.adjustments.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(log.iter().rev().find(|e| e.site_id == site_id).cloned())
    }

    async fn adjustments(&self, site_id: &str, limit: usize) -> Result<Vec<CapacityAdjustment>, StoreError> {
        let log = self.adjustments.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(log.iter().rev().filter(|e| e.site_id == site_id).take(limit).cloned().collect())
    }

    async fn record_alert(&self, alert: &CapacityAlert) -> Result<(), StoreError> {
        self.alerts.lock().map_err(|_| StoreError::Poisoned)?.push(alert.clone());
        Ok(())
    }

    async fn alerts(&self, site_id: &str, limit: usize) -> Result<Vec<CapacityAlert>, StoreError> {
        let alerts = self.alerts.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(alerts.iter().rev().filter(|a| a.site_id == site_id).take(limit).cloned().collect())
    }
}

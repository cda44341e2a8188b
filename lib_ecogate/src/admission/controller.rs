//! # Admission Controller
//!
//! Booking lifecycle on top of a `BookingStore`. The controller prefetches
//! weather and indicators outside any lock, then hands the store a gate
//! closure that re-evaluates capacity against the occupancy the store
//! recounts inside its critical section. The same gate runs unchanged inside
//! the PostgreSQL transaction, so both backends share one admission rule.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

use super::AdmissionError;
use crate::capacity::CapacityEngine;
use crate::models::{Booking, BookingDecision, BookingStatus, Site};
use crate::store::{AdmissionGate, BookingStore, TransitionOutcome};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RequestOutcome {
    Created { booking: Booking, decision: BookingDecision },
    Rejected { decision: BookingDecision },
}

pub struct AdmissionController {
    engine: Arc<CapacityEngine>,
    store: Arc<dyn BookingStore>,
    seq: AtomicU64,
}

impl AdmissionController {
    pub fn new(engine: Arc<CapacityEngine>, store: Arc<dyn BookingStore>) -> Self {
        Self {
            engine,
            store,
            seq: AtomicU64::new(1),
        }
    }

    fn next_booking_id(&self) -> String {
        let n = self.seq.fetch_add(1, Ordering::Relaxed);
        format!("bk-{}-{:04}", Utc::now().timestamp_millis(), n)
    }

    /// Creates a `pending` booking after an advisory eligibility check. The
    /// binding check happens when the booking is approved or checked in.
    pub async fn request_booking(
        &self,
        site_id: &str,
        user_id: &str,
        group_size: u32,
    ) -> Result<RequestOutcome, AdmissionError> {
        let decision = self.engine.is_booking_allowed(site_id, group_size).await?;
        if !decision.allowed {
            info!(site_id, user_id, group_size, reason = decision.reason_or_default(), "Booking request rejected");
            return Ok(RequestOutcome::Rejected { decision });
        }
        let now = Utc::now();
        let booking = Booking {
            id: self.next_booking_id(),
            site_id: site_id.to_string(),
            user_id: user_id.to_string(),
            group_size,
            status: BookingStatus::Pending,
            created_at: now,
            updated_at: now,
        };
        self.store.insert_booking(booking.clone()).await?;
        info!(booking_id = %booking.id, site_id, user_id, group_size, "Booking created");
        Ok(RequestOutcome::Created { booking, decision })
    }

    /// Drives a booking to `next`. Entering an occupying state runs the
    /// capacity gate atomically with the commit; leaving one always succeeds.
    pub async fn transition(&self, booking_id: &str, next: BookingStatus) -> Result<TransitionOutcome, AdmissionError> {
        let booking = self
            .store
            .booking(booking_id)
            .await?
            .ok_or_else(|| AdmissionError::UnknownBooking(booking_id.to_string()))?;
        if !booking.status.can_transition_to(next) {
            return Err(AdmissionError::InvalidTransition { from: booking.status, to: next });
        }

        let outcome = if booking.status.requires_admission(next) {
            let site = self
                .store
                .site(&booking.site_id)
                .await?
                .ok_or_else(|| AdmissionError::UnknownSite(booking.site_id.clone()))?;
            let (weather, indicators) = self.engine.inputs_for(&site).await;
            let calculator = self.engine.calculator().clone();
            let group_size = booking.group_size;
            let now = Utc::now();
            let gate = move |site: &Site, _occupancy: u32| {
                calculator.check_eligibility(site, group_size, weather.as_ref(), indicators.as_ref(), now)
            };
            let gate: AdmissionGate<'_> = &gate;
            self.store.transition_booking(booking_id, next, Some(gate)).await?
        } else {
            self.store.transition_booking(booking_id, next, None).await?
        };

        match &outcome {
            TransitionOutcome::Committed { booking, occupancy } => {
                info!(
                    booking_id,
                    site_id = %booking.site_id,
                    status = %booking.status,
                    occupancy,
                    "Booking transitioned"
                );
                if let Err(e) = self.engine.dynamic_capacity(&booking.site_id).await {
                    warn!(site_id = %booking.site_id, error = %e, "Capacity refresh after transition failed");
                }
            }
            TransitionOutcome::Denied { booking, decision } => {
                info!(
                    booking_id,
                    site_id = %booking.site_id,
                    target = %next,
                    reason = decision.reason_or_default(),
                    "Booking admission denied"
                );
            }
        }
        Ok(outcome)
    }

    pub async fn approve(&self, booking_id: &str) -> Result<TransitionOutcome, AdmissionError> {
        self.transition(booking_id, BookingStatus::Approved).await
    }

    pub async fn check_in(&self, booking_id: &str) -> Result<TransitionOutcome, AdmissionError> {
        self.transition(booking_id, BookingStatus::CheckedIn).await
    }

    pub async fn check_out(&self, booking_id: &str) -> Result<TransitionOutcome, AdmissionError> {
        self.transition(booking_id, BookingStatus::CheckedOut).await
    }

    pub async fn cancel(&self, booking_id: &str) -> Result<TransitionOutcome, AdmissionError> {
        self.transition(booking_id, BookingStatus::Cancelled).await
    }

    pub async fn booking(&self, booking_id: &str) -> Result<Option<Booking>, AdmissionError> {
        Ok(self.store.booking(booking_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::capacity::CapacityCalculator;
    use crate::configs::PolicyService;
    use crate::core::Dispatcher;
    use crate::ecology::IndicatorService;
    use crate::models::{Coordinates, SensitivityLevel, WeatherReading};
    use crate::store::MemoryStore;
    use crate::weather::{AggregatorSettings, ProviderError, WeatherAggregator, WeatherProvider};
    use async_trait::async_trait;

    struct Offline;

    #[async_trait]
    impl WeatherProvider for Offline {
        async fn current(&self, _s: &str, _c: Coordinates, _n: &str) -> Result<WeatherReading, ProviderError> {
            Err(ProviderError::RateLimited)
        }
    }

    fn controller(sites: Vec<Site>) -> (Arc<AdmissionController>, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::with_sites(sites).unwrap());
        let cache = Arc::new(MemoryCache::new());
        let aggregator = Arc::new(WeatherAggregator::new(
            cache.clone(),
            Arc::new(Offline),
            store.clone(),
            store.clone(),
            AggregatorSettings::default(),
        ));
        let indicators = Arc::new(IndicatorService::new(cache, store.clone()));
        let calculator = CapacityCalculator::new(Arc::new(PolicyService::in_memory()));
        let engine = Arc::new(CapacityEngine::new(
            calculator,
            aggregator,
            indicators,
            store.clone(),
            store.clone(),
            Arc::new(Dispatcher::default()),
        ));
        (Arc::new(AdmissionController::new(engine, store.clone())), store)
    }

    fn created(outcome: RequestOutcome) -> Booking {
        match outcome {
            RequestOutcome::Created { booking, .. } => booking,
            RequestOutcome::Rejected { decision } => panic!("rejected: {:?}", decision.reason),
        }
    }

    #[tokio::test]
    async fn full_lifecycle_updates_occupancy() {
        let (ctl, store) = controller(vec![Site::new("s1", "Glade", 1000, SensitivityLevel::Low)]);
        let booking = created(ctl.request_booking("s1", "u1", 6).await.unwrap());
        assert_eq!(store.occupancy("s1").await.unwrap(), 0);

        assert!(matches!(ctl.approve(&booking.id).await.unwrap(), TransitionOutcome::Committed { occupancy: 6, .. }));
        assert!(matches!(ctl.check_in(&booking.id).await.unwrap(), TransitionOutcome::Committed { occupancy: 6, .. }));
        assert!(matches!(ctl.check_out(&booking.id).await.unwrap(), TransitionOutcome::Committed { occupancy: 0, .. }));
        assert!(matches!(
            ctl.cancel(&booking.id).await,
            Err(AdmissionError::InvalidTransition { from: BookingStatus::CheckedOut, .. })
        ));
    }

    #[tokio::test]
    async fn critical_site_rejects_requests() {
        let (ctl, _) = controller(vec![Site::new("s1", "Nest", 250, SensitivityLevel::Critical)]);
        match ctl.request_booking("s1", "u1", 1).await.unwrap() {
            RequestOutcome::Rejected { decision } => assert!(!decision.allowed),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn unknown_site_and_booking_are_errors() {
        let (ctl, _) = controller(vec![]);
        assert!(matches!(ctl.request_booking("x", "u", 1).await, Err(AdmissionError::UnknownSite(_))));
        assert!(matches!(ctl.approve("missing").await, Err(AdmissionError::UnknownBooking(_))));
    }

    #[tokio::test]
    async fn concurrent_approvals_for_remaining_spots_admit_exactly_one() {
        let (ctl, store) = controller(vec![Site::new("s1", "Ridge", 100, SensitivityLevel::High)]);
        let available = ctl.engine.is_booking_allowed("s1", 1).await.unwrap().available_spots;
        let first = created(ctl.request_booking("s1", "a", available).await.unwrap());
        let second = created(ctl.request_booking("s1", "b", available).await.unwrap());

        let (ra, rb) = tokio::join!(ctl.approve(&first.id), ctl.approve(&second.id));
        let committed = [ra.unwrap(), rb.unwrap()]
            .iter()
            .filter(|o| matches!(o, TransitionOutcome::Committed { .. }))
            .count();
        assert_eq!(committed, 1);
        assert_eq!(store.occupancy("s1").await.unwrap(), available);
    }
}

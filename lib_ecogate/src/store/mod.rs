//! # Persistence Seams
//!
//! Three object-safe traits split persistence by concern:
//!
//! - **`BookingStore`**: sites, bookings and the counters that need strict
//!   mutual exclusion (occupancy, cleanup-event participants, eco-points).
//! - **`ObservationStore`**: latest-wins weather readings and ecological
//!   indicators.
//! - **`AuditStore`**: the append-only capacity adjustment log and alerts.
//!
//! `MemoryStore` implements all three in-process; `PgStore` (feature
//! `connections`) implements them on PostgreSQL.
//!
//! Every counter mutation is a single atomic primitive on the store. In
//! particular `transition_booking` runs the admission gate inside the same
//! critical section (or transaction) that recounts occupancy and commits the
//! new status, so two racing admissions can never both observe free spots.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::models::{
    Booking, BookingDecision, BookingStatus, CapacityAdjustment, CapacityAlert, CleanupEvent, EcoPointsOutcome,
    EcologicalIndicators, RegistrationOutcome, Site, SiteId, WeatherReading,
};

/// In-process implementation backed by the occupancy ledger.
pub mod memory;

pub use memory::MemoryStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{kind} '{id}' not found")]
    NotFound { kind: &'static str, id: String },

    #[error("Invalid booking transition from {from} to {to}")]
    InvalidTransition { from: BookingStatus, to: BookingStatus },

    #[error("Admission gate required to move booking into {0}")]
    GateRequired(BookingStatus),

    #[error("Invalid site '{id}': {reason}")]
    InvalidSite { id: String, reason: &'static str },

    #[error("Store backend error: {0}")]
    Backend(String),

    #[error("Store lock poisoned")]
    Poisoned,

    #[cfg(feature = "connections")]
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    #[cfg(feature = "connections")]
    #[error("PostgreSQL pool error: {0}")]
    Pool(#[from] deadpool_postgres::PoolError),
}

impl StoreError {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        StoreError::NotFound { kind, id: id.into() }
    }
}

/// Shared pre-write checks so both backends refuse the same inputs.
pub(crate) fn validate_site(site: &Site) -> Result<(), StoreError> {
    if site.max_capacity == 0 {
        return Err(StoreError::InvalidSite {
            id: site.id.clone(),
            reason: "max capacity must be positive",
        });
    }
    Ok(())
}

pub(crate) fn validate_new_booking(booking: &Booking) -> Result<(), StoreError> {
    if booking.status.is_occupying() {
        return Err(StoreError::GateRequired(booking.status));
    }
    Ok(())
}

/// Decides admission for a site given the authoritative occupancy. Called
/// while the store holds its lock or row lock, so it must not block.
pub type AdmissionGate<'a> = &'a (dyn Fn(&Site, u32) -> BookingDecision + Send + Sync);

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TransitionOutcome {
    /// The new status is stored; `occupancy` is the recount after commit.
    Committed { booking: Booking, occupancy: u32 },
    /// The gate refused; the booking is unchanged.
    Denied { booking: Booking, decision: BookingDecision },
}

#[async_trait]
pub trait BookingStore: Send + Sync {
    async fn site(&self, site_id: &str) -> Result<Option<Site>, StoreError>;

    async fn sites(&self) -> Result<Vec<Site>, StoreError>;

    /// Rejects a site whose `max_capacity` is zero.
    async fn upsert_site(&self, site: Site) -> Result<(), StoreError>;

    async fn booking(&self, booking_id: &str) -> Result<Option<Booking>, StoreError>;

    /// Stores a new booking. Only non-occupying statuses are accepted; a
    /// booking reaches `approved` or `checked-in` through `transition_booking`
    /// and its gate, never by insertion.
    async fn insert_booking(&self, booking: Booking) -> Result<(), StoreError>;

    /// Moves a booking to `next`. When the move enters an occupying state from
    /// a non-occupying one, `gate` is evaluated against the recounted occupancy
    /// before anything is written.
    async fn transition_booking(
        &self,
        booking_id: &str,
        next: BookingStatus,
        gate: Option<AdmissionGate<'_>>,
    ) -> Result<TransitionOutcome, StoreError>;

    /// Sum of group sizes in occupying states.
    async fn occupancy(&self, site_id: &str) -> Result<u32, StoreError>;

    async fn upsert_cleanup_event(&self, event: CleanupEvent) -> Result<(), StoreError>;

    async fn cleanup_event(&self, event_id: &str) -> Result<Option<CleanupEvent>, StoreError>;

    async fn register_participant(&self, event_id: &str, user_id: &str) -> Result<RegistrationOutcome, StoreError>;

    /// Returns whether a registration was removed. The counter never drops below zero.
    async fn cancel_registration(&self, event_id: &str, user_id: &str) -> Result<bool, StoreError>;

    /// Adds `delta` to the user's balance; a negative delta larger than the
    /// balance is refused.
    async fn adjust_eco_points(&self, user_id: &str, delta: i64) -> Result<EcoPointsOutcome, StoreError>;

    async fn eco_points(&self, user_id: &str) -> Result<i64, StoreError>;
}

#[async_trait]
pub trait ObservationStore: Send + Sync {
    async fn latest_weather(&self, site_id: &str) -> Result<Option<WeatherReading>, StoreError>;

    async fn record_weather(&self, reading: &WeatherReading) -> Result<(), StoreError>;

    async fn latest_indicators(&self, site_id: &str) -> Result<Option<EcologicalIndicators>, StoreError>;

    /// Latest indicators for each of `site_ids` in one round trip. Sites with
    /// no measurement are absent from the map.
    async fn latest_indicators_for(
        &self,
        site_ids: &[SiteId],
    ) -> Result<HashMap<SiteId, EcologicalIndicators>, StoreError>;

    async fn record_indicators(&self, indicators: &EcologicalIndicators) -> Result<(), StoreError>;
}

#[async_trait]
pub trait AuditStore: Send + Sync {
    async fn append_adjustment(&self, entry: &CapacityAdjustment) -> Result<(), StoreError>;

    async fn latest_adjustment(&self, site_id: &str) -> Result<Option<CapacityAdjustment>, StoreError>;

    /// Newest first.
    async fn adjustments(&self, site_id: &str, limit: usize) -> Result<Vec<CapacityAdjustment>, StoreError>;

    async fn record_alert(&self, alert: &CapacityAlert) -> Result<(), StoreError>;

    /// Newest first.
    async fn alerts(&self, site_id: &str, limit: usize) -> Result<Vec<CapacityAlert>, StoreError>;
}

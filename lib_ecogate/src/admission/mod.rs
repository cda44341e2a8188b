//! # Admission Control
//!
//! - **`ledger`**: the mutex-guarded occupancy and counter state used by the
//!   in-process store.
//! - **`controller`**: the booking flow. Entry into an occupying state is
//!   gated by a capacity re-check that runs inside the store's atomic unit.
//! - **`community`**: cleanup-event registrations and eco-points.

use thiserror::Error;

use crate::capacity::CapacityError;
use crate::models::BookingStatus;
use crate::store::StoreError;

pub mod community;
pub mod controller;
pub mod ledger;

pub use community::CommunityService;
pub use controller::{AdmissionController, RequestOutcome};
pub use ledger::OccupancyLedger;

/// Failures that are not capacity denials. Denials are returned as values.
#[derive(Debug, Error)]
pub enum AdmissionError {
    #[error("Site '{0}' not found")]
    UnknownSite(String),

    #[error("Booking '{0}' not found")]
    UnknownBooking(String),

    #[error("Cleanup event '{0}' not found")]
    UnknownEvent(String),

    #[error("Booking cannot move from {from} to {to}")]
    InvalidTransition { from: BookingStatus, to: BookingStatus },

    #[error("Amount must be positive, got {0}")]
    InvalidAmount(i64),

    #[error(transparent)]
    Capacity(CapacityError),

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for AdmissionError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::InvalidTransition { from, to } => AdmissionError::InvalidTransition { from, to },
            StoreError::NotFound { kind: "booking", id } => AdmissionError::UnknownBooking(id),
            StoreError::NotFound { kind: "site", id } => AdmissionError::UnknownSite(id),
            StoreError::NotFound { kind: "cleanup event", id } => AdmissionError::UnknownEvent(id),
            other => AdmissionError::Store(other),
        }
    }
}

impl From<CapacityError> for AdmissionError {
    fn from(e: CapacityError) -> Self {
        match e {
            CapacityError::UnknownSite(id) => AdmissionError::UnknownSite(id),
            CapacityError::Store(inner) => inner.into(),
            other => AdmissionError::Capacity(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_level_transition_conflict_surfaces_as_invalid_transition() {
        let err = AdmissionError::from(StoreError::InvalidTransition {
            from: BookingStatus::Cancelled,
            to: BookingStatus::Approved,
        });
        assert!(matches!(
            err,
            AdmissionError::InvalidTransition { from: BookingStatus::Cancelled, to: BookingStatus::Approved }
        ));
        assert!(matches!(
            AdmissionError::from(StoreError::not_found("booking", "bk-9")),
            AdmissionError::UnknownBooking(id) if id == "bk-9"
        ));
    }
}

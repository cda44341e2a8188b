//! # Domain Models
//!
//! Plain data types shared by every layer of the engine: sites and their
//! sensitivity rating, weather readings and alert levels, ecological strain
//! indicators, capacity overrides, bookings and the community counters
//! (cleanup events and eco-points).
//!
//! The types here carry no I/O. Persistence lives in `store`, caching in
//! `cache`, and every policy decision in `capacity`.

/// Booking lifecycle and the occupancy-counting states.
pub mod booking;
/// Capacity factors, evaluation results, decisions and audit records.
pub mod capacity;
/// Cleanup events and eco-points balances.
pub mod community;
/// Measured ecological strain per site.
pub mod indicators;
/// Sites, coordinates, sensitivity levels and capacity overrides.
pub mod site;
/// Weather readings and alert severities.
pub mod weather;

pub use booking::{Booking, BookingStatus};
pub use capacity::{
    BookingDecision, CapacityAdjustment, CapacityAlert, CapacityFactors, DynamicCapacity, FactorKind, FACTOR_EPSILON,
};
pub use community::{CleanupEvent, EcoPointsOutcome, RegistrationOutcome};
pub use indicators::EcologicalIndicators;
pub use site::{CapacityOverride, Coordinates, SensitivityLevel, Site, SiteId};
pub use weather::{AlertLevel, WeatherReading};

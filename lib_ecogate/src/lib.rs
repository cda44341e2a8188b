//! # lib_ecogate
//!
//! Dynamic capacity and admission control for capacity-limited eco-tourism
//! sites. The always-on modules hold the domain: capacity factors and the
//! engine, booking admission, weather aggregation, ecological indicators and
//! the event dispatcher. Backends and ambient plumbing sit behind features:
//!
//! - `connections`: Redis cache and PostgreSQL store
//! - `loggers`: tracing subscriber with rolling JSON files
//! - `retrieve`: retrying HTTP client and the HTTP weather provider

pub mod admission;
pub mod cache;
pub mod capacity;
pub mod configs;
pub mod core;
pub mod ecology;
pub mod models;
pub mod monitor;
pub mod store;
pub mod weather;

#[cfg(feature = "connections")]
pub mod connections;

#[cfg(feature = "loggers")]
pub mod loggers;

#[cfg(feature = "retrieve")]
pub mod retrieve;

pub use admission::{AdmissionController, AdmissionError, CommunityService, RequestOutcome};
pub use cache::{CacheError, KvCache, MemoryCache};
pub use capacity::{CapacityCalculator, CapacityEngine, CapacityError};
pub use configs::{PolicyConfig, PolicyService};
pub use core::{CapacityEvent, Dispatcher};
pub use ecology::IndicatorService;
pub use monitor::WeatherMonitor;
pub use store::{AuditStore, BookingStore, MemoryStore, ObservationStore, StoreError};
pub use weather::{WeatherAggregator, WeatherProvider};

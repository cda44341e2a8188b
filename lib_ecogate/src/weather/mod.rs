//! # Weather
//!
//! Provider abstraction, alert derivation and the cache-first aggregator.
//! The HTTP provider is compiled with the `retrieve` feature.

pub mod aggregator;
pub mod alerts;
#[cfg(feature = "retrieve")]
pub mod http_provider;
pub mod provider;

pub use aggregator::{AggregatorSettings, CacheStats, WeatherAggregator};
pub use alerts::derive_alert_level;
#[cfg(feature = "retrieve")]
pub use http_provider::HttpWeatherProvider;
pub use provider::{OfflineProvider, ProviderError, WeatherProvider};

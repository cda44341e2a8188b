//! # Background Monitoring
//!
//! The weather monitor refreshes every site on a fixed interval and on demand,
//! feeding fresh readings into the cache, the observation store, the event
//! dispatcher and finally the capacity engine.

pub mod weather_monitor;

pub use weather_monitor::{SweepReport, WeatherMonitor};

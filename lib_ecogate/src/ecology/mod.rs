//! # Ecological Indicators
//!
//! Latest-wins strain scores per site, read through the cache.

pub mod indicators;

pub use indicators::IndicatorService;

//! # Weather Aggregator
//!
//! Resolves the current reading for a site through three tiers:
//!
//! 1. the key-value cache (10 minute TTL by default),
//! 2. the weather provider, bounded by a timeout, whose result is cached,
//! 3. the last persisted reading, which may be stale.
//!
//! When all three come up empty the caller gets `None`, which the capacity
//! calculator treats as a weather factor of 1.0. Nothing here ever returns a
//! hard error to the admission path.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures_util::future::join_all;
use serde::Serialize;
use tracing::{debug, warn};

use super::provider::{ProviderError, WeatherProvider};
use crate::cache::{self, KvCache};
use crate::models::{Site, SiteId, WeatherReading};
use crate::store::{BookingStore, ObservationStore};

pub const CACHE_PREFIX: &str = "weather:";

pub fn cache_key(site_id: &str) -> String {
    format!("{}{}", CACHE_PREFIX, site_id)
}

#[derive(Debug, Clone)]
pub struct AggregatorSettings {
    pub cache_ttl: Duration,
    pub provider_timeout: Duration,
    pub batch_size: usize,
    pub batch_delay: Duration,
}

impl Default for AggregatorSettings {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(600),
            provider_timeout: Duration::from_secs(10),
            batch_size: 5,
            batch_delay: Duration::from_millis(250),
        }
    }
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    errors: AtomicU64,
    total: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub errors: u64,
    pub total_requests: u64,
    pub hit_rate: f64,
}

pub struct WeatherAggregator {
    cache: Arc<dyn KvCache>,
    provider: Arc<dyn WeatherProvider>,
    sites: Arc<dyn BookingStore>,
    observations: Arc<dyn ObservationStore>,
    settings: AggregatorSettings,
    counters: Counters,
}

impl WeatherAggregator {
    pub fn new(
        cache: Arc<dyn KvCache>,
        provider: Arc<dyn WeatherProvider>,
        sites: Arc<dyn BookingStore>,
        observations: Arc<dyn ObservationStore>,
        settings: AggregatorSettings,
    ) -> Self {
        Self {
            cache,
            provider,
            sites,
            observations,
            settings,
            counters: Counters::default(),
        }
    }

    pub fn settings(&self) -> &AggregatorSettings {
        &self.settings
    }

    /// Current weather for a site id. Unknown sites still get the persisted fallback.
    pub async fn weather(&self, site_id: &str) -> Option<WeatherReading> {
        self.counters.total.fetch_add(1, Ordering::Relaxed);
        if let Some(hit) = self.cached(site_id).await {
            return Some(hit);
        }
        let site = match self.sites.site(site_id).await {
            Ok(site) => site,
            Err(e) => {
                warn!(site_id, error = %e, "Site lookup failed during weather resolution");
                None
            }
        };
        match site {
            Some(site) => self.resolve_miss(&site).await,
            None => self.persisted(site_id).await,
        }
    }

    /// Current weather for a site the caller already holds.
    pub async fn weather_for(&self, site: &Site) -> Option<WeatherReading> {
        self.counters.total.fetch_add(1, Ordering::Relaxed);
        if let Some(hit) = self.cached(&site.id).await {
            return Some(hit);
        }
        self.resolve_miss(site).await
    }

    async fn cached(&self, site_id: &str) -> Option<WeatherReading> {
        match cache::get_json::<WeatherReading>(self.cache.as_ref(), &cache_key(site_id)).await {
            Ok(Some(reading)) => {
                self.counters.hits.fetch_add(1, Ordering::Relaxed);
                Some(reading)
            }
            Ok(None) => {
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
            Err(e) => {
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                self.counters.errors.fetch_add(1, Ordering::Relaxed);
                warn!(site_id, error = %e, "Weather cache read failed");
                None
            }
        }
    }

    async fn resolve_miss(&self, site: &Site) -> Option<WeatherReading> {
        match self.fetch_fresh(site).await {
            Ok(reading) => {
                self.store_in_cache(&reading).await;
                Some(reading)
            }
            Err(e) => {
                debug!(site_id = %site.id, error = %e, "Falling back to persisted weather");
                self.persisted(&site.id).await
            }
        }
    }

    /// Calls the provider directly, bounded by the configured timeout. Does
    /// not touch the cache. Sites without valid coordinates fail as malformed.
    pub async fn fetch_fresh(&self, site: &Site) -> Result<WeatherReading, ProviderError> {
        let coordinates = match site.coordinates.filter(|c| c.is_valid()) {
            Some(c) => c,
            None => return Err(ProviderError::Malformed(format!("site {} has no usable coordinates", site.id))),
        };
        let call = self.provider.current(&site.id, coordinates, &site.name);
        let result = match tokio::time::timeout(self.settings.provider_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout(self.settings.provider_timeout)),
        };
        if let Err(e) = &result {
            self.counters.errors.fetch_add(1, Ordering::Relaxed);
            warn!(site_id = %site.id, error = %e, "Weather provider call failed");
        }
        result
    }

    pub async fn store_in_cache(&self, reading: &WeatherReading) {
        let key = cache_key(&reading.site_id);
        if let Err(e) = cache::set_json(self.cache.as_ref(), &key, reading, self.settings.cache_ttl).await {
            self.counters.errors.fetch_add(1, Ordering::Relaxed);
            warn!(site_id = %reading.site_id, error = %e, "Weather cache write failed");
        }
    }

    async fn persisted(&self, site_id: &str) -> Option<WeatherReading> {
        match self.observations.latest_weather(site_id).await {
            Ok(Some(reading)) => {
                if reading.is_stale(Utc::now()) {
                    debug!(site_id, recorded_at = %reading.recorded_at, "Using stale persisted weather");
                }
                Some(reading)
            }
            Ok(None) => None,
            Err(e) => {
                self.counters.errors.fetch_add(1, Ordering::Relaxed);
                warn!(site_id, error = %e, "Persisted weather lookup failed");
                None
            }
        }
    }

    /// Resolves weather for many sites in concurrent batches with a pause
    /// between batches. Sites with no weather are absent from the map.
    pub async fn weather_for_sites(&self, sites: &[Site]) -> HashMap<SiteId, WeatherReading> {
        let mut out = HashMap::with_capacity(sites.len());
        let batch_size = self.settings.batch_size.max(1);
        let mut chunks = sites.chunks(batch_size).peekable();
        while let Some(chunk) = chunks.next() {
            let readings = join_all(chunk.iter().map(|site| self.weather_for(site))).await;
            for (site, reading) in chunk.iter().zip(readings) {
                if let Some(reading) = reading {
                    out.insert(site.id.clone(), reading);
                }
            }
            if chunks.peek().is_some() && !self.settings.batch_delay.is_zero() {
                tokio::time::sleep(self.settings.batch_delay).await;
            }
        }
        out
    }

    pub async fn invalidate_site(&self, site_id: &str) -> bool {
        match self.cache.delete(&cache_key(site_id)).await {
            Ok(existed) => existed,
            Err(e) => {
                warn!(site_id, error = %e, "Weather cache invalidation failed");
                false
            }
        }
    }

    /// Drops cached weather for every site whose name or location contains `region`.
    pub async fn invalidate_region(&self, region: &str) -> usize {
        let sites = match self.sites.sites().await {
            Ok(sites) => sites,
            Err(e) => {
                warn!(region, error = %e, "Could not list sites for region invalidation");
                return 0;
            }
        };
        let mut removed = 0;
        for site in sites.iter().filter(|s| s.matches_region(region)) {
            if self.invalidate_site(&site.id).await {
                removed += 1;
            }
        }
        removed
    }

    pub async fn invalidate_all(&self) -> usize {
        match self.cache.delete_prefix(CACHE_PREFIX).await {
            Ok(n) => n,
            Err(e) => {
                warn!(error = %e, "Weather cache flush failed");
                0
            }
        }
    }

    pub fn stats(&self) -> CacheStats {
        let hits = self.counters.hits.load(Ordering::Relaxed);
        let misses = self.counters.misses.load(Ordering::Relaxed);
        let lookups = hits + misses;
        CacheStats {
            hits,
            misses,
            errors: self.counters.errors.load(Ordering::Relaxed),
            total_requests: self.counters.total.load(Ordering::Relaxed),
            hit_rate: if lookups == 0 { 0.0 } else { hits as f64 / lookups as f64 },
        }
    }

    pub fn reset_stats(&self) {
        self.counters.hits.store(0, Ordering::Relaxed);
        self.counters.misses.store(0, Ordering::Relaxed);
        self.counters.errors.store(0, Ordering::Relaxed);
        self.counters.total.store(0, Ordering::Relaxed);
    }
}

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use tracing::{info, warn};

use crate::cache::{self, KvCache};
use crate::models::{EcologicalIndicators, Site, SiteId};
use crate::store::{ObservationStore, StoreError};

pub const CACHE_PREFIX: &str = "indicators:";
pub const DEFAULT_TTL: Duration = Duration::from_secs(30 * 60);

fn cache_key(site_id: &str) -> String {
    format!("{}{}", CACHE_PREFIX, site_id)
}

pub struct IndicatorService {
    cache: Arc<dyn KvCache>,
    store: Arc<dyn ObservationStore>,
    ttl: Duration,
}

impl IndicatorService {
    pub fn new(cache: Arc<dyn KvCache>, store: Arc<dyn ObservationStore>) -> Self {
        Self { cache, store, ttl: DEFAULT_TTL }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Latest indicators for a site, or `None` when nothing was ever recorded
    /// or the store is unreachable.
    pub async fn latest(&self, site_id: &str) -> Option<EcologicalIndicators> {
        match cache::get_json::<EcologicalIndicators>(self.cache.as_ref(), &cache_key(site_id)).await {
            Ok(Some(hit)) => return Some(hit),
            Ok(None) => {}
            Err(e) => warn!(site_id, error = %e, "Indicator cache read failed"),
        }
        match self.store.latest_indicators(site_id).await {
            Ok(Some(found)) => {
                if let Err(e) = cache::set_json(self.cache.as_ref(), &cache_key(site_id), &found, self.ttl).await {
                    warn!(site_id, error = %e, "Indicator cache write failed");
                }
                Some(found)
            }
            Ok(None) => None,
            Err(e) => {
                warn!(site_id, error = %e, "Indicator lookup failed");
                None
            }
        }
    }

    /// Batch pre-fetch: cache reads per site, then a single store query for
    /// every miss. A store failure leaves the misses out of the map.
    pub async fn latest_for_sites(&self, sites: &[Site]) -> HashMap<SiteId, EcologicalIndicators> {
        let cached = join_all(sites.iter().map(|s| {
            let key = cache_key(&s.id);
            async move { cache::get_json::<EcologicalIndicators>(self.cache.as_ref(), &key).await }
        }))
        .await;

        let mut found = HashMap::with_capacity(sites.len());
        let mut misses: Vec<SiteId> = Vec::new();
        for (site, hit) in sites.iter().zip(cached) {
            match hit {
                Ok(Some(hit)) => {
                    found.insert(site.id.clone(), hit);
                }
                Ok(None) => misses.push(site.id.clone()),
                Err(e) => {
                    warn!(site_id = %site.id, error = %e, "Indicator cache read failed");
                    misses.push(site.id.clone());
                }
            }
        }
        if misses.is_empty() {
            return found;
        }

        match self.store.latest_indicators_for(&misses).await {
            Ok(loaded) => {
                for (site_id, indicators) in loaded {
                    if let Err(e) = cache::set_json(self.cache.as_ref(), &cache_key(&site_id), &indicators, self.ttl).await {
                        warn!(site_id = %site_id, error = %e, "Indicator cache write failed");
                    }
                    found.insert(site_id, indicators);
                }
            }
            Err(e) => warn!(sites = misses.len(), error = %e, "Batch indicator lookup failed"),
        }
        found
    }

    /// Persists a new measurement (scores clamped to 0..=100) and drops the cached copy.
    pub async fn record(&self, indicators: EcologicalIndicators) -> Result<EcologicalIndicators, StoreError> {
        let indicators = indicators.clamped();
        self.store.record_indicators(&indicators).await?;
        if let Err(e) = self.cache.delete(&cache_key(&indicators.site_id)).await {
            warn!(site_id = %indicators.site_id, error = %e, "Indicator cache invalidation failed");
        }
        info!(
            site_id = %indicators.site_id,
            strain = indicators.strain_ratio(),
            "Recorded ecological indicators"
        );
        Ok(indicators)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::models::{SensitivityLevel, WeatherReading};
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn sample(site: &str, score: f64) -> EcologicalIndicators {
        EcologicalIndicators {
            site_id: site.into(),
            soil_compaction: score,
            vegetation_disturbance: score,
            wildlife_disturbance: score,
            water_source_impact: score,
            recorded_at: Utc::now(),
        }
    }

    /// Counts store round trips on top of a `MemoryStore`.
    #[derive(Default)]
    struct CountingStore {
        inner: MemoryStore,
        single: AtomicUsize,
        bulk: AtomicUsize,
    }

    #[async_trait]
    impl ObservationStore for CountingStore {
        async fn latest_weather(&self, site_id: &str) -> Result<Option<WeatherReading>, StoreError> {
            self.inner.latest_weather(site_id).await
        }

        async fn record_weather(&self, reading: &WeatherReading) -> Result<(), StoreError> {
            self.inner.record_weather(reading).await
        }

        async fn latest_indicators(&self, site_id: &str) -> Result<Option<EcologicalIndicators>, StoreError> {
            self.single.fetch_add(1, Ordering::SeqCst);
            self.inner.latest_indicators(site_id).await
        }

        async fn latest_indicators_for(
            &self,
            site_ids: &[SiteId],
        ) -> Result<HashMap<SiteId, EcologicalIndicators>, StoreError> {
            self.bulk.fetch_add(1, Ordering::SeqCst);
            self.inner.latest_indicators_for(site_ids).await
        }

        async fn record_indicators(&self, indicators: &EcologicalIndicators) -> Result<(), StoreError> {
            self.inner.record_indicators(indicators).await
        }
    }

    #[tokio::test]
    async fn batch_fetch_uses_one_store_query_for_misses() {
        let store = Arc::new(CountingStore::default());
        for i in 0..6 {
            store.inner.record_indicators(&sample(&format!("s{}", i), 50.0)).await.unwrap();
        }
        let svc = IndicatorService::new(Arc::new(MemoryCache::new()), store.clone());
        let sites: Vec<Site> = (0..8)
            .map(|i| Site::new(format!("s{}", i), "Trail", 40, SensitivityLevel::Low))
            .collect();

        let first = svc.latest_for_sites(&sites).await;
        assert_eq!(first.len(), 6);
        assert_eq!(store.bulk.load(Ordering::SeqCst), 1);
        assert_eq!(store.single.load(Ordering::SeqCst), 0);

        let second = svc.latest_for_sites(&sites[..6]).await;
        assert_eq!(second.len(), 6);
        assert_eq!(store.bulk.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn record_replaces_cached_value() {
        let store = Arc::new(MemoryStore::new());
        let svc = IndicatorService::new(Arc::new(MemoryCache::new()), store);
        assert!(svc.latest("s1").await.is_none());

        svc.record(sample("s1", 20.0)).await.unwrap();
        assert_eq!(svc.latest("s1").await.unwrap().soil_compaction, 20.0);

        svc.record(sample("s1", 120.0)).await.unwrap();
        assert_eq!(svc.latest("s1").await.unwrap().soil_compaction, 100.0);
    }
}

//! Shared fixtures for the cross-crate integration tests: a scripted weather
//! provider and a fully wired in-memory deployment.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lib_ecogate::admission::{AdmissionController, CommunityService};
use lib_ecogate::cache::MemoryCache;
use lib_ecogate::capacity::{CapacityCalculator, CapacityEngine};
use lib_ecogate::configs::PolicyService;
use lib_ecogate::core::Dispatcher;
use lib_ecogate::ecology::IndicatorService;
use lib_ecogate::models::{AlertLevel, Coordinates, SensitivityLevel, Site, WeatherReading};
use lib_ecogate::monitor::WeatherMonitor;
use lib_ecogate::store::{MemoryStore, StoreError};
use lib_ecogate::weather::{AggregatorSettings, ProviderError, WeatherAggregator, WeatherProvider};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Provider whose answer per site is set by the test. Sites without a script
/// fail with a transport error.
#[derive(Default)]
pub struct ScriptedProvider {
    script: Mutex<HashMap<String, Result<WeatherReading, String>>>,
    calls: AtomicUsize,
}

impl ScriptedProvider {
    pub fn succeed(&self, reading: WeatherReading) {
        self.script.lock().unwrap().insert(reading.site_id.clone(), Ok(reading));
    }

    pub fn fail(&self, site_id: &str) {
        self.script
            .lock()
            .unwrap()
            .insert(site_id.to_string(), Err("scripted outage".to_string()));
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WeatherProvider for ScriptedProvider {
    async fn current(
        &self,
        site_id: &str,
        _coordinates: Coordinates,
        _display_name: &str,
    ) -> Result<WeatherReading, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let scripted = self.script.lock().unwrap().get(site_id).cloned();
        match scripted {
            Some(Ok(reading)) => Ok(reading),
            Some(Err(message)) => Err(ProviderError::Transport(message)),
            None => Err(ProviderError::Transport(format!("no script for {}", site_id))),
        }
    }
}

pub fn reading(site_id: &str, alert_level: AlertLevel, recorded_at: DateTime<Utc>) -> WeatherReading {
    WeatherReading {
        site_id: site_id.to_string(),
        temperature_c: 18.0,
        humidity_pct: 55.0,
        pressure_hpa: 1012.0,
        wind_speed_ms: 3.0,
        visibility_km: 10.0,
        condition: "clear".to_string(),
        alert_level,
        recorded_at,
    }
}

pub fn site(id: &str, max_capacity: u32, sensitivity: SensitivityLevel) -> Site {
    Site::new(id, format!("Site {}", id), max_capacity, sensitivity)
        .with_location("Alpine North")
        .with_coordinates(46.55, 8.02)
}

/// Everything the server wires together, on in-process backends.
pub struct Deployment {
    pub store: Arc<MemoryStore>,
    pub cache: Arc<MemoryCache>,
    pub provider: Arc<ScriptedProvider>,
    pub policies: Arc<PolicyService>,
    pub dispatcher: Arc<Dispatcher>,
    pub aggregator: Arc<WeatherAggregator>,
    pub indicators: Arc<IndicatorService>,
    pub engine: Arc<CapacityEngine>,
    pub controller: Arc<AdmissionController>,
    pub community: Arc<CommunityService>,
    pub monitor: Arc<WeatherMonitor>,
}

impl Deployment {
    pub fn new(sites: Vec<Site>) -> Result<Self, StoreError> {
        Self::with_policies(sites, PolicyService::in_memory())
    }

    pub fn with_policies(sites: Vec<Site>, policies: PolicyService) -> Result<Self, StoreError> {
        let store = Arc::new(MemoryStore::with_sites(sites)?);
        let cache = Arc::new(MemoryCache::new());
        let provider = Arc::new(ScriptedProvider::default());
        let policies = Arc::new(policies);
        let dispatcher = Arc::new(Dispatcher::default());

        let aggregator = Arc::new(WeatherAggregator::new(
            cache.clone(),
            provider.clone(),
            store.clone(),
            store.clone(),
            AggregatorSettings {
                provider_timeout: Duration::from_secs(2),
                batch_delay: Duration::ZERO,
                ..AggregatorSettings::default()
            },
        ));
        let indicators = Arc::new(IndicatorService::new(cache.clone(), store.clone()));
        let engine = Arc::new(CapacityEngine::new(
            CapacityCalculator::new(policies.clone()),
            aggregator.clone(),
            indicators.clone(),
            store.clone(),
            store.clone(),
            dispatcher.clone(),
        ));
        let controller = Arc::new(AdmissionController::new(engine.clone(), store.clone()));
        let community = Arc::new(CommunityService::new(store.clone()));
        let monitor = Arc::new(WeatherMonitor::new(
            aggregator.clone(),
            store.clone(),
            store.clone(),
            engine.clone(),
            dispatcher.clone(),
        ));

        Ok(Self {
            store,
            cache,
            provider,
            policies,
            dispatcher,
            aggregator,
            indicators,
            engine,
            controller,
            community,
            monitor,
        })
    }
}

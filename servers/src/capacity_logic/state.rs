use anyhow::{bail, Context, Result};
use lib_ecogate::admission::{AdmissionController, CommunityService};
use lib_ecogate::cache::{KvCache, MemoryCache};
use lib_ecogate::capacity::{CapacityCalculator, CapacityEngine};
use lib_ecogate::configs::PolicyService;
use lib_ecogate::connections::{PgStore, RedisCache};
use lib_ecogate::core::Dispatcher;
use lib_ecogate::ecology::IndicatorService;
use lib_ecogate::models::Site;
use lib_ecogate::monitor::WeatherMonitor;
use lib_ecogate::retrieve::ClientSettings;
use lib_ecogate::store::{AuditStore, BookingStore, MemoryStore, ObservationStore};
use lib_ecogate::weather::{AggregatorSettings, HttpWeatherProvider, OfflineProvider, WeatherAggregator, WeatherProvider};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use crate::capacity_logic::config::Settings;

const CACHE_NAMESPACE: &str = "ecogate";

/// Shared handles for every request handler and background task.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn BookingStore>,
    pub policies: Arc<PolicyService>,
    pub dispatcher: Arc<Dispatcher>,
    pub aggregator: Arc<WeatherAggregator>,
    pub indicators: Arc<IndicatorService>,
    pub engine: Arc<CapacityEngine>,
    pub controller: Arc<AdmissionController>,
    pub community: Arc<CommunityService>,
    pub monitor: Arc<WeatherMonitor>,
}

struct Stores {
    bookings: Arc<dyn BookingStore>,
    observations: Arc<dyn ObservationStore>,
    audit: Arc<dyn AuditStore>,
}

fn load_sites(path: &Path) -> Result<Vec<Site>> {
    let contents = fs::read_to_string(path).with_context(|| format!("reading sites file {}", path.display()))?;
    let sites: Vec<Site> =
        serde_json::from_str(&contents).with_context(|| format!("parsing sites file {}", path.display()))?;
    if let Some(bad) = sites.iter().find(|site| site.max_capacity == 0) {
        bail!("site '{}' in {} has a max capacity of 0", bad.id, path.display());
    }
    Ok(sites)
}

fn seed_sites(settings: &Settings) -> Result<Vec<Site>> {
    match &settings.sites_file {
        Some(path) if path.exists() => load_sites(path),
        Some(path) => {
            warn!("Sites file {} not found; starting without seeded sites.", path.display());
            Ok(Vec::new())
        }
        None => Ok(Vec::new()),
    }
}

async fn build_stores(settings: &Settings, sites: Vec<Site>) -> Result<Stores> {
    match &settings.database_url {
        Some(url) => {
            let store = Arc::new(PgStore::connect(url, settings.database_pool_size)?);
            store.migrate().await?;
            for site in sites {
                store.upsert_site(site).await?;
            }
            info!("Using PostgreSQL store");
            Ok(Stores {
                bookings: store.clone(),
                observations: store.clone(),
                audit: store,
            })
        }
        None => {
            let store = Arc::new(MemoryStore::with_sites(sites)?);
            info!("Using in-memory store");
            Ok(Stores {
                bookings: store.clone(),
                observations: store.clone(),
                audit: store,
            })
        }
    }
}

async fn build_cache(settings: &Settings) -> Result<Arc<dyn KvCache>> {
    match &settings.redis_url {
        Some(url) => {
            let cache = RedisCache::connect(url, CACHE_NAMESPACE).await?;
            info!("Using Redis cache");
            Ok(Arc::new(cache))
        }
        None => {
            info!("Using in-process cache");
            Ok(Arc::new(MemoryCache::new()))
        }
    }
}

fn build_provider(settings: &Settings) -> Result<Arc<dyn WeatherProvider>> {
    match &settings.weather_api_key {
        Some(api_key) => {
            let client_settings = ClientSettings {
                timeout: settings.provider_timeout,
                ..ClientSettings::default()
            };
            let provider = HttpWeatherProvider::new(&settings.weather_base_url, api_key.clone(), &client_settings)?;
            Ok(Arc::new(provider))
        }
        None => {
            warn!("No weather API key configured; capacity uses persisted readings only.");
            Ok(Arc::new(OfflineProvider))
        }
    }
}

impl AppState {
    pub async fn build(settings: &Settings) -> Result<Self> {
        let sites = seed_sites(settings)?;
        info!(sites = sites.len(), "Seed sites loaded");

        let stores = build_stores(settings, sites).await?;
        let cache = build_cache(settings).await?;
        let provider = build_provider(settings)?;
        let policies = Arc::new(PolicyService::load(&settings.policy_path));
        let dispatcher = Arc::new(Dispatcher::new(settings.event_backlog));

        let aggregator = Arc::new(WeatherAggregator::new(
            cache.clone(),
            provider,
            stores.bookings.clone(),
            stores.observations.clone(),
            AggregatorSettings {
                cache_ttl: settings.weather_cache_ttl,
                provider_timeout: settings.provider_timeout,
                batch_size: settings.batch_size,
                batch_delay: settings.batch_delay,
            },
        ));
        let indicators = Arc::new(IndicatorService::new(cache, stores.observations.clone()));
        let engine = Arc::new(CapacityEngine::new(
            CapacityCalculator::new(policies.clone()),
            aggregator.clone(),
            indicators.clone(),
            stores.bookings.clone(),
            stores.audit,
            dispatcher.clone(),
        ));
        let controller = Arc::new(AdmissionController::new(engine.clone(), stores.bookings.clone()));
        let community = Arc::new(CommunityService::new(stores.bookings.clone()));
        let monitor = Arc::new(WeatherMonitor::new(
            aggregator.clone(),
            stores.bookings.clone(),
            stores.observations,
            engine.clone(),
            dispatcher.clone(),
        ));

        Ok(Self {
            store: stores.bookings,
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

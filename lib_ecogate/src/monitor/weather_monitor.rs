use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::capacity::CapacityEngine;
use crate::core::{CapacityEvent, Dispatcher};
use crate::models::{Site, WeatherReading};
use crate::store::{BookingStore, ObservationStore};
use crate::weather::WeatherAggregator;

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(6 * 60 * 60);

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepReport {
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub sites: usize,
    pub refreshed: usize,
    pub failed: usize,
    pub skipped_no_coordinates: usize,
    pub weather_alerts: usize,
    pub capacity_evaluations: usize,
}

/// Clears the busy flag when a sweep ends, including on early return.
struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

enum SiteResult {
    Refreshed(WeatherReading),
    Failed,
    NoCoordinates,
}

pub struct WeatherMonitor {
    aggregator: Arc<WeatherAggregator>,
    sites: Arc<dyn BookingStore>,
    observations: Arc<dyn ObservationStore>,
    engine: Arc<CapacityEngine>,
    dispatcher: Arc<Dispatcher>,
    busy: AtomicBool,
}

impl WeatherMonitor {
    pub fn new(
        aggregator: Arc<WeatherAggregator>,
        sites: Arc<dyn BookingStore>,
        observations: Arc<dyn ObservationStore>,
        engine: Arc<CapacityEngine>,
        dispatcher: Arc<Dispatcher>,
    ) -> Self {
        Self {
            aggregator,
            sites,
            observations,
            engine,
            dispatcher,
            busy: AtomicBool::new(false),
        }
    }

    pub fn is_running(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// On-demand sweep. Returns `None` when a sweep is already in progress.
    pub async fn check_weather_now(&self) -> Option<SweepReport> {
        self.sweep().await
    }

    /// Refreshes every site in batches. Per-site failures are counted, never
    /// propagated; a sweep that cannot list sites ends with an empty report.
    pub async fn sweep(&self) -> Option<SweepReport> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            info!("Weather sweep already in progress; skipping");
            return None;
        }
        let _guard = BusyGuard(&self.busy);

        let mut report = SweepReport {
            started_at: Some(Utc::now()),
            ..Default::default()
        };
        let sites = match self.sites.sites().await {
            Ok(sites) => sites,
            Err(e) => {
                warn!(error = %e, "Weather sweep could not list sites");
                report.finished_at = Some(Utc::now());
                return Some(report);
            }
        };
        report.sites = sites.len();

        let settings = self.aggregator.settings().clone();
        let mut refreshed: Vec<(Site, WeatherReading)> = Vec::new();
        let mut chunks = sites.chunks(settings.batch_size.max(1)).peekable();
        while let Some(chunk) = chunks.next() {
            let results = join_all(chunk.iter().map(|site| self.refresh_site(site))).await;
            for (site, result) in chunk.iter().zip(results) {
                match result {
                    SiteResult::Refreshed(reading) => {
                        report.refreshed += 1;
                        if reading.alert_level.is_active() {
                            report.weather_alerts += 1;
                        }
                        refreshed.push((site.clone(), reading));
                    }
                    SiteResult::Failed => report.failed += 1,
                    SiteResult::NoCoordinates => report.skipped_no_coordinates += 1,
                }
            }
            if chunks.peek().is_some() && !settings.batch_delay.is_zero() {
                tokio::time::sleep(settings.batch_delay).await;
            }
        }

        for (site, reading) in refreshed {
            self.engine.evaluate_site(&site, Some(reading), None).await;
            report.capacity_evaluations += 1;
        }

        report.finished_at = Some(Utc::now());
        info!(
            sites = report.sites,
            refreshed = report.refreshed,
            failed = report.failed,
            alerts = report.weather_alerts,
            "Weather sweep finished"
        );
        Some(report)
    }

    /// Fetch, persist, replace the cached copy, then broadcast.
    async fn refresh_site(&self, site: &Site) -> SiteResult {
        if !site.coordinates.map_or(false, |c| c.is_valid()) {
            debug!(site_id = %site.id, "Skipping weather refresh for site without coordinates");
            return SiteResult::NoCoordinates;
        }
        let reading = match self.aggregator.fetch_fresh(site).await {
            Ok(reading) => reading,
            Err(_) => return SiteResult::Failed,
        };
        if let Err(e) = self.observations.record_weather(&reading).await {
            warn!(site_id = %site.id, error = %e, "Failed to persist weather reading");
        }
        self.aggregator.invalidate_site(&site.id).await;
        self.aggregator.store_in_cache(&reading).await;

        self.dispatcher.publish(CapacityEvent::weather_update(reading.clone()));
        if reading.alert_level.is_active() {
            warn!(site_id = %site.id, level = %reading.alert_level, condition = %reading.condition, "Weather alert");
            self.dispatcher.publish(CapacityEvent::weather_alert(reading.clone()));
        }
        SiteResult::Refreshed(reading)
    }

    /// Sweeps immediately, then every `interval` until `shutdown` fires.
    pub async fn run(self: Arc<Self>, interval: Duration, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        info!(interval_secs = interval.as_secs(), "Weather monitor started");
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Weather monitor received shutdown signal.");
                    break;
                }
                _ = ticker.tick() => {
                    self.sweep().await;
                }
            }
        }
    }
}

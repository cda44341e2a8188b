use chrono::{Duration as ChronoDuration, Utc};
use lib_ecogate::core::EventKind;
use lib_ecogate::models::{AlertLevel, SensitivityLevel, Site};
use lib_ecogate::store::ObservationStore;
use project_tests::{Deployment, reading, site};

#[tokio::test]
async fn provider_failure_serves_persisted_reading() {
    let deployment = Deployment::new(vec![site("lake", 100, SensitivityLevel::Low)]).unwrap();
    let persisted = reading("lake", AlertLevel::Medium, Utc::now() - ChronoDuration::hours(2));
    deployment.store.record_weather(&persisted).await.unwrap();
    deployment.provider.fail("lake");

    let resolved = deployment.aggregator.weather("lake").await;

    assert_eq!(resolved, Some(persisted));
    assert_eq!(deployment.provider.calls(), 1);
}

#[tokio::test]
async fn cached_reading_is_served_until_a_sweep_replaces_it() {
    let deployment = Deployment::new(vec![site("lake", 100, SensitivityLevel::Low)]).unwrap();
    let first = reading("lake", AlertLevel::None, Utc::now() - ChronoDuration::minutes(30));
    deployment.provider.succeed(first.clone());

    assert_eq!(deployment.aggregator.weather("lake").await, Some(first.clone()));

    let second = reading("lake", AlertLevel::High, Utc::now());
    deployment.provider.succeed(second.clone());
    assert_eq!(deployment.aggregator.weather("lake").await, Some(first));

    let report = deployment.monitor.check_weather_now().await.unwrap();
    assert_eq!(report.refreshed, 1);

    assert_eq!(deployment.aggregator.weather("lake").await, Some(second.clone()));
    assert_eq!(deployment.store.latest_weather("lake").await.unwrap(), Some(second));

    let stats = deployment.aggregator.stats();
    assert_eq!(stats.hits, 2);
    assert_eq!(stats.total_requests, 3);
}

#[tokio::test]
async fn sweep_broadcasts_alerts_and_reduces_capacity() {
    let deployment = Deployment::new(vec![
        site("lake", 100, SensitivityLevel::Low),
        Site::new("cave", "Cave", 40, SensitivityLevel::Medium),
    ])
    .unwrap();
    let mut events = deployment.dispatcher.subscribe("test");
    deployment.provider.succeed(reading("lake", AlertLevel::High, Utc::now()));

    let report = deployment.monitor.sweep().await.unwrap();

    assert_eq!(report.sites, 2);
    assert_eq!(report.refreshed, 1);
    assert_eq!(report.skipped_no_coordinates, 1);
    assert_eq!(report.weather_alerts, 1);
    assert_eq!(report.capacity_evaluations, 1);

    let mut kinds = Vec::new();
    while let Some(event) = events.try_recv() {
        kinds.push(event.kind);
    }
    assert!(kinds.contains(&EventKind::WeatherUpdate));
    assert!(kinds.contains(&EventKind::WeatherAlert));
    assert!(kinds.contains(&EventKind::CapacityAdjustment));

    let capacity = deployment.engine.dynamic_capacity("lake").await.unwrap();
    assert!((capacity.factors.weather - 0.8).abs() < 1e-9);
}

#[tokio::test]
async fn provider_outage_fails_sites_without_aborting_the_sweep() {
    let deployment = Deployment::new(vec![
        site("lake", 100, SensitivityLevel::Low),
        site("ridge", 100, SensitivityLevel::High),
    ])
    .unwrap();
    deployment.provider.succeed(reading("ridge", AlertLevel::None, Utc::now()));
    deployment.provider.fail("lake");

    let report = deployment.monitor.check_weather_now().await.unwrap();

    assert_eq!(report.refreshed, 1);
    assert_eq!(report.failed, 1);
    assert!(!deployment.monitor.is_running());
}

#[tokio::test]
async fn region_invalidation_drops_only_matching_sites() {
    let deployment = Deployment::new(vec![
        site("lake", 100, SensitivityLevel::Low),
        site("ridge", 100, SensitivityLevel::High).with_location("Coastal South"),
    ])
    .unwrap();
    deployment.provider.succeed(reading("lake", AlertLevel::None, Utc::now()));
    deployment.provider.succeed(reading("ridge", AlertLevel::None, Utc::now()));
    deployment.aggregator.weather("lake").await;
    deployment.aggregator.weather("ridge").await;
    assert_eq!(deployment.cache.len(), 2);

    let removed = deployment.aggregator.invalidate_region("alpine").await;

    assert_eq!(removed, 1);
    assert_eq!(deployment.cache.len(), 1);
    assert_eq!(deployment.aggregator.invalidate_all().await, 1);
}

use chrono::Utc;
use lib_ecogate::admission::RequestOutcome;
use lib_ecogate::capacity::factors::season_factor;
use lib_ecogate::core::EventKind;
use lib_ecogate::models::{BookingStatus, SensitivityLevel};
use lib_ecogate::store::{AuditStore, BookingStore, TransitionOutcome};
use project_tests::{Deployment, site};

fn expected_capacity(max: u32, sensitivity_multiplier: f64) -> u32 {
    (max as f64 * sensitivity_multiplier * season_factor(Utc::now())).floor() as u32
}

#[tokio::test]
async fn high_sensitivity_halves_capacity() {
    let deployment = Deployment::new(vec![site("ridge", 100, SensitivityLevel::High)]).unwrap();

    let capacity = deployment.engine.dynamic_capacity("ridge").await.unwrap();

    assert_eq!(capacity.adjusted_capacity, expected_capacity(100, 0.5));
    assert!(capacity.adjusted_capacity <= capacity.max_capacity);
    assert_eq!(capacity.available_spots, capacity.adjusted_capacity);
    assert!(capacity.message.contains("ecological sensitivity"));
}

#[tokio::test]
async fn group_larger_than_remaining_spots_is_denied_with_count() {
    let deployment = Deployment::new(vec![site("ridge", 100, SensitivityLevel::High)]).unwrap();
    let adjusted = expected_capacity(100, 0.5);

    let first = match deployment
        .controller
        .request_booking("ridge", "alice", adjusted - 2)
        .await
        .unwrap()
    {
        RequestOutcome::Created { booking, .. } => booking,
        other => panic!("expected a pending booking, got {:?}", other),
    };
    let approved = deployment.controller.approve(&first.id).await.unwrap();
    assert!(matches!(approved, TransitionOutcome::Committed { occupancy, .. } if occupancy == adjusted - 2));

    match deployment.controller.request_booking("ridge", "bob", 5).await.unwrap() {
        RequestOutcome::Rejected { decision } => {
            assert!(!decision.allowed);
            assert_eq!(decision.available_spots, 2);
            assert!(decision.reason_or_default().contains("Only 2 spots available"));
        }
        other => panic!("expected a rejection, got {:?}", other),
    }
}

#[tokio::test]
async fn critical_site_rejects_any_group() {
    let deployment = Deployment::new(vec![site("nest", 250, SensitivityLevel::Critical)]).unwrap();

    let decision = deployment.engine.is_booking_allowed("nest", 1).await.unwrap();

    assert!(!decision.allowed);
    assert!(decision.reason_or_default().contains("critical ecological sensitivity"));
}

#[tokio::test]
async fn permit_and_briefing_flags_follow_policy() {
    let deployment = Deployment::new(vec![
        site("ridge", 100, SensitivityLevel::High),
        site("meadow", 100, SensitivityLevel::Medium),
        site("lake", 100, SensitivityLevel::Low),
    ])
    .unwrap();

    let high = deployment.engine.is_booking_allowed("ridge", 2).await.unwrap();
    let medium = deployment.engine.is_booking_allowed("meadow", 2).await.unwrap();
    let low = deployment.engine.is_booking_allowed("lake", 2).await.unwrap();

    assert!(high.allowed && high.requires_permit && high.requires_briefing);
    assert!(medium.allowed && !medium.requires_permit && medium.requires_briefing);
    assert!(low.allowed && !low.requires_permit && !low.requires_briefing);
}

#[tokio::test]
async fn override_is_applied_logged_and_broadcast() {
    let deployment = Deployment::new(vec![site("lake", 200, SensitivityLevel::Low)]).unwrap();
    let mut events = deployment.dispatcher.subscribe("test");
    let before = deployment.engine.dynamic_capacity("lake").await.unwrap();

    let (entry, during) = deployment
        .engine
        .set_capacity_override("lake", 0.5, true, None, "ranger")
        .await
        .unwrap();
    assert_eq!(entry.author, "ranger");
    assert_eq!(during.adjusted_capacity, before.adjusted_capacity / 2);

    let mut kinds = Vec::new();
    while let Some(event) = events.try_recv() {
        kinds.push(event.kind);
    }
    assert!(kinds.contains(&EventKind::CapacityAdjustment));
    assert!(kinds.contains(&EventKind::CapacityAlert));

    let (removed, after) = deployment.engine.clear_capacity_override("lake").await.unwrap();
    assert!(removed);
    assert_eq!(after.adjusted_capacity, before.adjusted_capacity);

    let alerts = deployment.store.alerts("lake", 10).await.unwrap();
    assert!(!alerts.is_empty());
}

#[tokio::test]
async fn repeated_unchanged_evaluation_appends_nothing() {
    let deployment = Deployment::new(vec![site("ridge", 100, SensitivityLevel::High)]).unwrap();

    deployment.engine.dynamic_capacity("ridge").await.unwrap();
    deployment.engine.dynamic_capacity("ridge").await.unwrap();
    deployment.engine.dynamic_capacity("ridge").await.unwrap();

    let log = deployment.store.adjustments("ridge", 10).await.unwrap();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].original_capacity, 100);
}

#[tokio::test]
async fn batch_evaluation_matches_single_site_results() {
    let deployment = Deployment::new(vec![
        site("ridge", 100, SensitivityLevel::High),
        site("lake", 80, SensitivityLevel::Low),
    ])
    .unwrap();

    let batch = deployment.engine.batch_adjusted_capacities(None).await.unwrap();

    assert_eq!(batch.len(), 2);
    assert_eq!(batch["ridge"], expected_capacity(100, 0.5));
    assert_eq!(batch["lake"], expected_capacity(80, 1.0));
}

#[tokio::test]
async fn checkout_and_cancel_release_occupancy() {
    let deployment = Deployment::new(vec![site("lake", 100, SensitivityLevel::Low)]).unwrap();

    let mut ids = Vec::new();
    for (user, group) in [("a", 4), ("b", 6)] {
        match deployment.controller.request_booking("lake", user, group).await.unwrap() {
            RequestOutcome::Created { booking, .. } => ids.push(booking.id),
            other => panic!("unexpected {:?}", other),
        }
    }
    deployment.controller.approve(&ids[0]).await.unwrap();
    deployment.controller.check_in(&ids[1]).await.unwrap();
    assert_eq!(deployment.store.occupancy("lake").await.unwrap(), 10);

    deployment.controller.check_in(&ids[0]).await.unwrap();
    assert_eq!(deployment.store.occupancy("lake").await.unwrap(), 10);

    deployment.controller.check_out(&ids[0]).await.unwrap();
    deployment.controller.cancel(&ids[1]).await.unwrap();
    assert_eq!(deployment.store.occupancy("lake").await.unwrap(), 0);

    let booking = deployment.controller.booking(&ids[0]).await.unwrap().unwrap();
    assert_eq!(booking.status, BookingStatus::CheckedOut);
    assert!(deployment.controller.approve(&ids[0]).await.is_err());
}

#[tokio::test]
async fn broadcast_events_use_the_tagged_wire_shape() {
    let deployment = Deployment::new(vec![site("lake", 200, SensitivityLevel::Low)]).unwrap();
    let mut events = deployment.dispatcher.subscribe("wire");

    deployment
        .engine
        .set_capacity_override("lake", 0.5, true, None, "ranger")
        .await
        .unwrap();

    let mut frames = Vec::new();
    while let Some(event) = events.try_recv() {
        frames.push(serde_json::to_value(event.as_ref()).unwrap());
    }

    let adjustment = frames
        .iter()
        .find(|f| f["type"] == "capacity_adjustment")
        .expect("adjustment frame");
    assert_eq!(adjustment["destinationId"], "lake");
    assert_eq!(adjustment["adjustment"]["factors"]["override"], 0.5);
    assert_eq!(adjustment["adjustment"]["originalCapacity"], 200);
    assert!(adjustment["timestamp"].is_string());
    assert!(adjustment.get("weather").is_none());
    assert!(adjustment.get("alert").is_none());

    let alert = frames.iter().find(|f| f["type"] == "capacity_alert").expect("alert frame");
    assert_eq!(alert["destinationId"], "lake");
    assert_eq!(alert["alert"]["severity"], "high");
    assert!(alert["alert"]["activeFactors"]
        .as_array()
        .unwrap()
        .contains(&serde_json::json!("override")));
}

use chrono::Utc;
use futures_util::future::join_all;
use lib_ecogate::admission::AdmissionError;
use lib_ecogate::models::{CleanupEvent, EcoPointsOutcome, RegistrationOutcome, SensitivityLevel};
use project_tests::{Deployment, site};
use std::sync::Arc;

fn event(id: &str, max_participants: u32) -> CleanupEvent {
    CleanupEvent {
        id: id.to_string(),
        site_id: "lake".to_string(),
        title: "Shoreline cleanup".to_string(),
        max_participants,
        current_participants: 0,
        starts_at: Utc::now(),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_registrations_stop_at_the_cap() {
    let deployment = Arc::new(Deployment::new(vec![site("lake", 100, SensitivityLevel::Low)]).unwrap());
    deployment.community.create_event(event("ev-1", 8)).await.unwrap();

    let handles: Vec<_> = (0..25)
        .map(|n| {
            let deployment = deployment.clone();
            tokio::spawn(async move {
                deployment
                    .community
                    .register_participant("ev-1", &format!("volunteer-{}", n))
                    .await
                    .unwrap()
            })
        })
        .collect();
    let outcomes: Vec<_> = join_all(handles).await.into_iter().map(|r| r.unwrap()).collect();

    let registered = outcomes
        .iter()
        .filter(|o| matches!(o, RegistrationOutcome::Registered { .. }))
        .count();
    assert_eq!(registered, 8);
    assert_eq!(deployment.community.event("ev-1").await.unwrap().current_participants, 8);
}

#[tokio::test]
async fn duplicate_registration_and_cancellation() {
    let deployment = Deployment::new(vec![site("lake", 100, SensitivityLevel::Low)]).unwrap();
    deployment.community.create_event(event("ev-2", 3)).await.unwrap();

    let first = deployment.community.register_participant("ev-2", "ana").await.unwrap();
    assert_eq!(first, RegistrationOutcome::Registered { participants: 1 });
    let again = deployment.community.register_participant("ev-2", "ana").await.unwrap();
    assert_eq!(again, RegistrationOutcome::AlreadyRegistered);

    assert!(deployment.community.cancel_registration("ev-2", "ana").await.unwrap());
    assert!(!deployment.community.cancel_registration("ev-2", "ana").await.unwrap());
    assert_eq!(deployment.community.event("ev-2").await.unwrap().current_participants, 0);

    let missing = deployment.community.register_participant("nope", "ana").await;
    assert!(matches!(missing, Err(AdmissionError::UnknownEvent(_))));
}

#[tokio::test]
async fn eco_points_cannot_go_negative() {
    let deployment = Deployment::new(vec![site("lake", 100, SensitivityLevel::Low)]).unwrap();

    let awarded = deployment.community.award_points("ana", 40).await.unwrap();
    assert_eq!(awarded, EcoPointsOutcome::Applied { balance: 40 });

    let refused = deployment.community.redeem_points("ana", 55).await.unwrap();
    assert_eq!(refused, EcoPointsOutcome::InsufficientBalance { balance: 40, requested: 55 });

    let redeemed = deployment.community.redeem_points("ana", 15).await.unwrap();
    assert_eq!(redeemed, EcoPointsOutcome::Applied { balance: 25 });
    assert_eq!(deployment.community.balance("ana").await.unwrap(), 25);

    assert!(matches!(
        deployment.community.award_points("ana", 0).await,
        Err(AdmissionError::InvalidAmount(0))
    ));
}

//! Cleanup-event registrations and eco-points. Every mutation is one atomic
//! store primitive; this layer only validates input and logs.

use std::sync::Arc;

use tracing::info;

use super::AdmissionError;
use crate::models::{CleanupEvent, EcoPointsOutcome, RegistrationOutcome};
use crate::store::BookingStore;

pub struct CommunityService {
    store: Arc<dyn BookingStore>,
}

impl CommunityService {
    pub fn new(store: Arc<dyn BookingStore>) -> Self {
        Self { store }
    }

    pub async fn create_event(&self, event: CleanupEvent) -> Result<(), AdmissionError> {
        info!(event_id = %event.id, site_id = %event.site_id, max = event.max_participants, "Cleanup event saved");
        Ok(self.store.upsert_cleanup_event(event).await?)
    }

    pub async fn event(&self, event_id: &str) -> Result<CleanupEvent, AdmissionError> {
        self.store
            .cleanup_event(event_id)
            .await?
            .ok_or_else(|| AdmissionError::UnknownEvent(event_id.to_string()))
    }

    pub async fn register_participant(&self, event_id: &str, user_id: &str) -> Result<RegistrationOutcome, AdmissionError> {
        let outcome = self.store.register_participant(event_id, user_id).await?;
        info!(event_id, user_id, ?outcome, "Cleanup registration");
        Ok(outcome)
    }

    pub async fn cancel_registration(&self, event_id: &str, user_id: &str) -> Result<bool, AdmissionError> {
        let removed = self.store.cancel_registration(event_id, user_id).await?;
        if removed {
            info!(event_id, user_id, "Cleanup registration cancelled");
        }
        Ok(removed)
    }

    pub async fn award_points(&self, user_id: &str, points: i64) -> Result<EcoPointsOutcome, AdmissionError> {
        if points <= 0 {
            return Err(AdmissionError::InvalidAmount(points));
        }
        let outcome = self.store.adjust_eco_points(user_id, points).await?;
        info!(user_id, points, ?outcome, "Eco-points awarded");
        Ok(outcome)
    }

    pub async fn redeem_points(&self, user_id: &str, points: i64) -> Result<EcoPointsOutcome, AdmissionError> {
        if points <= 0 {
            return Err(AdmissionError::InvalidAmount(points));
        }
        let outcome = self.store.adjust_eco_points(user_id, -points).await?;
        info!(user_id, points, ?outcome, "Eco-points redemption");
        Ok(outcome)
    }

    pub async fn balance(&self, user_id: &str) -> Result<i64, AdmissionError> {
        Ok(self.store.eco_points(user_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use chrono::Utc;

    #[tokio::test]
    async fn concurrent_registrations_never_overfill() {
        let svc = Arc::new(CommunityService::new(Arc::new(MemoryStore::new())));
        svc.create_event(CleanupEvent {
            id: "e1".into(),
            site_id: "s1".into(),
            title: "Trail litter pick".into(),
            max_participants: 5,
            current_participants: 0,
            starts_at: Utc::now(),
        })
        .await
        .unwrap();

        let tasks: Vec<_> = (0..20)
            .map(|i| {
                let svc = Arc::clone(&svc);
                tokio::spawn(async move { svc.register_participant("e1", &format!("u{}", i)).await })
            })
            .collect();
        let mut registered = 0;
        for t in tasks {
            if let RegistrationOutcome::Registered { .. } = t.await.unwrap().unwrap() {
                registered += 1;
            }
        }
        assert_eq!(registered, 5);
        assert_eq!(svc.event("e1").await.unwrap().current_participants, 5);
    }

    #[tokio::test]
    async fn points_reject_non_positive_amounts() {
        let svc = CommunityService::new(Arc::new(MemoryStore::new()));
        assert!(matches!(svc.award_points("u1", 0).await, Err(AdmissionError::InvalidAmount(0))));
        svc.award_points("u1", 40).await.unwrap();
        assert_eq!(
            svc.redeem_points("u1", 50).await.unwrap(),
            EcoPointsOutcome::InsufficientBalance { balance: 40, requested: 50 }
        );
        assert_eq!(svc.balance("u1").await.unwrap(), 40);
    }

    #[tokio::test]
    async fn registering_for_unknown_event_is_an_error() {
        let svc = CommunityService::new(Arc::new(MemoryStore::new()));
        assert!(matches!(svc.register_participant("nope", "u1").await, Err(AdmissionError::UnknownEvent(_))));
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A cleanup event with a hard participant cap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupEvent {
    pub id: String,
    pub site_id: String,
    pub title: String,
    pub max_participants: u32,
    #[serde(default)]
    pub current_participants: u32,
    pub starts_at: DateTime<Utc>,
}

/// Result of a participant registration attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RegistrationOutcome {
    Registered { participants: u32 },
    AlreadyRegistered,
    Full { max_participants: u32 },
}

/// Result of an eco-points award or redemption.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum EcoPointsOutcome {
    Applied { balance: i64 },
    InsufficientBalance { balance: i64, requested: i64 },
}

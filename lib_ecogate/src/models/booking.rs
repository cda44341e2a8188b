use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::site::SiteId;

/// Booking lifecycle.
///
/// ```text
/// pending ─┬─> approved ──┬─> checked-in ─> checked-out
///          │              ├─> checked-out
///          ├─> checked-in │
///          └─> cancelled <┘ (approved and checked-in may also cancel)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[cfg_attr(feature = "connections", derive(postgres_types::ToSql, postgres_types::FromSql))]
#[cfg_attr(feature = "connections", postgres(name = "booking_status"))]
pub enum BookingStatus {
    #[cfg_attr(feature = "connections", postgres(name = "pending"))]
    Pending,
    #[cfg_attr(feature = "connections", postgres(name = "approved"))]
    Approved,
    #[cfg_attr(feature = "connections", postgres(name = "checked-in"))]
    CheckedIn,
    #[cfg_attr(feature = "connections", postgres(name = "checked-out"))]
    CheckedOut,
    #[cfg_attr(feature = "connections", postgres(name = "cancelled"))]
    Cancelled,
}

impl BookingStatus {
    /// Whether a booking in this state counts toward site occupancy.
    pub fn is_occupying(&self) -> bool {
        matches!(self, BookingStatus::Approved | BookingStatus::CheckedIn)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, BookingStatus::CheckedOut | BookingStatus::Cancelled)
    }

    pub fn can_transition_to(&self, next: BookingStatus) -> bool {
        use BookingStatus::*;
        matches!(
            (self, next),
            (Pending, Approved)
                | (Pending, CheckedIn)
                | (Pending, Cancelled)
                | (Approved, CheckedIn)
                | (Approved, CheckedOut)
                | (Approved, Cancelled)
                | (CheckedIn, CheckedOut)
                | (CheckedIn, Cancelled)
        )
    }

    /// True when moving to `next` adds the group to occupancy and so needs admission.
    pub fn requires_admission(&self, next: BookingStatus) -> bool {
        !self.is_occupying() && next.is_occupying()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Approved => "approved",
            BookingStatus::CheckedIn => "checked-in",
            BookingStatus::CheckedOut => "checked-out",
            BookingStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "pending" => Ok(BookingStatus::Pending),
            "approved" => Ok(BookingStatus::Approved),
            "checked-in" => Ok(BookingStatus::CheckedIn),
            "checked-out" => Ok(BookingStatus::CheckedOut),
            "cancelled" => Ok(BookingStatus::Cancelled),
            other => Err(format!("unknown booking status '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: String,
    pub site_id: SiteId,
    pub user_id: String,
    pub group_size: u32,
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//! Saved trips and bookings, owned per user

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use crate::{
    error::{Result, TripError},
    services::planning::format_amount,
    types::{
        result::{CheckedPlan, PlanStatus},
        trip_types::TripPlan,
    },
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_id!(
    /// Identity supplied by the authentication collaborator
    UserId
);
string_id!(TripId);
string_id!(BookingId);

impl TripId {
    pub(crate) fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl BookingId {
    pub(crate) fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Booked,
    Pending,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Booked => "booked",
            BookingStatus::Pending => "pending",
            BookingStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "booked" => Some(BookingStatus::Booked),
            "pending" => Some(BookingStatus::Pending),
            "cancelled" => Some(BookingStatus::Cancelled),
            _ => None,
        }
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Row of the saved-trips list
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TripSummary {
    pub id: TripId,
    pub title: String,
    pub destination: String,
    pub mood: String,
    /// Mood slug from the generation request, e.g. "culture-explorer".
    pub mood_slug: Option<String>,
    /// "start - end" as generated.
    pub timeframe: String,
    /// Currency symbol followed by the total, e.g. "$3,970".
    pub budget: String,
    pub status: PlanStatus,
    pub created_at: DateTime<Utc>,
}

/// Row of the bookings list
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BookingSummary {
    pub id: BookingId,
    /// Saved trip the booking was made from; cleared when that trip is deleted.
    pub trip_id: Option<TripId>,
    pub title: String,
    pub destination: String,
    pub budget: String,
    pub status: BookingStatus,
    pub plan_status: PlanStatus,
    pub created_at: DateTime<Utc>,
}

/// A saved trip with its full plan
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredTrip {
    pub summary: TripSummary,
    pub plan: TripPlan,
}

/// Persistence collaborator.
///
/// Every record belongs to one user; another user's id behaves as missing.
/// Each save or booking is an independent insert, so duplicate protection is
/// up to the caller.
#[async_trait]
pub trait TripStore: Send + Sync {
    async fn save_trip(&self, user: &UserId, plan: &CheckedPlan) -> Result<TripId>;

    /// Record a booking with status `booked`.
    async fn create_booking(&self, user: &UserId, plan: &CheckedPlan) -> Result<BookingId>;

    /// Book a previously saved trip, keeping its stored plan status.
    ///
    /// Fails with `Precondition` while the trip already has a `booked` booking,
    /// and with `Persistence` when the trip is missing.
    async fn book_saved_trip(&self, user: &UserId, trip: &TripId) -> Result<BookingId>;

    /// Saved trips, newest first.
    async fn list_trips(&self, user: &UserId) -> Result<Vec<TripSummary>>;

    /// Bookings, newest first.
    async fn list_bookings(&self, user: &UserId) -> Result<Vec<BookingSummary>>;

    async fn get_trip(&self, user: &UserId, trip: &TripId) -> Result<StoredTrip>;

    async fn delete_trip(&self, user: &UserId, trip: &TripId) -> Result<()>;
}

pub(crate) fn timeframe_label(plan: &TripPlan) -> String {
    format!(
        "{} - {}",
        plan.timeframe.start_date.to_rfc3339(),
        plan.timeframe.end_date.to_rfc3339()
    )
}

pub(crate) fn budget_label(plan: &TripPlan) -> String {
    format!("{}{}", plan.budget.currency, format_amount(plan.budget.total))
}

pub(crate) fn already_booked(trip: &TripId) -> TripError {
    TripError::Precondition(format!("trip `{trip}` is already booked"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_booking_status_parse() {
        assert_eq!(BookingStatus::parse("booked"), Some(BookingStatus::Booked));
        assert_eq!(BookingStatus::parse("complete"), None);
        assert_eq!(BookingStatus::Cancelled.to_string(), "cancelled");
    }

    #[test]
    fn test_ids_serialize_as_strings() {
        let id = UserId::new("user_42");
        assert_eq!(serde_json::to_value(&id).unwrap(), "user_42");
        assert_ne!(TripId::generate(), TripId::generate());
    }
}

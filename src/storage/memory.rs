use super::{
    already_booked, budget_label, timeframe_label, BookingId, BookingStatus, BookingSummary, StoredTrip, TripId,
    TripStore, TripSummary, UserId,
};
use crate::{
    error::{Result, TripError},
    types::result::CheckedPlan,
};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Mutex, MutexGuard, PoisonError,
};

#[derive(Debug, Clone)]
struct TripRecord {
    user: UserId,
    stored: StoredTrip,
}

#[derive(Debug, Clone)]
struct BookingRecord {
    user: UserId,
    summary: BookingSummary,
}

#[derive(Debug, Default)]
struct Tables {
    trips: Vec<TripRecord>,
    bookings: Vec<BookingRecord>,
}

/// Process-local store for tests and offline runs
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    unavailable: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call fail with a persistence error until switched back.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn tables(&self) -> Result<MutexGuard<'_, Tables>> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(TripError::Persistence("store is unavailable".to_string()));
        }
        Ok(self.tables.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

fn not_found(trip: &TripId) -> TripError {
    TripError::Persistence(format!("trip `{trip}` not found"))
}

#[async_trait]
impl TripStore for MemoryStore {
    async fn save_trip(&self, user: &UserId, checked: &CheckedPlan) -> Result<TripId> {
        let plan = checked.plan();
        let id = TripId::generate();
        let summary = TripSummary {
            id: id.clone(),
            title: plan.title.clone(),
            destination: plan.destination.city.clone(),
            mood: plan.mood.clone(),
            mood_slug: checked.mood_slug().map(str::to_string),
            timeframe: timeframe_label(plan),
            budget: budget_label(plan),
            status: checked.status(),
            created_at: Utc::now(),
        };
        self.tables()?.trips.push(TripRecord {
            user: user.clone(),
            stored: StoredTrip {
                summary,
                plan: plan.clone(),
            },
        });
        Ok(id)
    }

    async fn create_booking(&self, user: &UserId, checked: &CheckedPlan) -> Result<BookingId> {
        let plan = checked.plan();
        let id = BookingId::generate();
        self.tables()?.bookings.push(BookingRecord {
            user: user.clone(),
            summary: BookingSummary {
                id: id.clone(),
                trip_id: None,
                title: plan.title.clone(),
                destination: plan.destination.city.clone(),
                budget: budget_label(plan),
                status: BookingStatus::Booked,
                plan_status: checked.status(),
                created_at: Utc::now(),
            },
        });
        Ok(id)
    }

    async fn book_saved_trip(&self, user: &UserId, trip: &TripId) -> Result<BookingId> {
        let mut tables = self.tables()?;
        let stored = tables
            .trips
            .iter()
            .find(|record| &record.user == user && &record.stored.summary.id == trip)
            .map(|record| record.stored.clone())
            .ok_or_else(|| not_found(trip))?;
        if tables.bookings.iter().any(|record| {
            record.summary.trip_id.as_ref() == Some(trip)
                && record.summary.status == BookingStatus::Booked
        }) {
            return Err(already_booked(trip));
        }

        let id = BookingId::generate();
        tables.bookings.push(BookingRecord {
            user: user.clone(),
            summary: BookingSummary {
                id: id.clone(),
                trip_id: Some(trip.clone()),
                title: stored.plan.title.clone(),
                destination: stored.plan.destination.city.clone(),
                budget: budget_label(&stored.plan),
                status: BookingStatus::Booked,
                plan_status: stored.summary.status,
                created_at: Utc::now(),
            },
        });
        Ok(id)
    }

    async fn list_trips(&self, user: &UserId) -> Result<Vec<TripSummary>> {
        Ok(self
            .tables()?
            .trips
            .iter()
            .rev()
            .filter(|record| &record.user == user)
            .map(|record| record.stored.summary.clone())
            .collect())
    }

    async fn list_bookings(&self, user: &UserId) -> Result<Vec<BookingSummary>> {
        Ok(self
            .tables()?
            .bookings
            .iter()
            .rev()
            .filter(|record| &record.user == user)
            .map(|record| record.summary.clone())
            .collect())
    }

    async fn get_trip(&self, user: &UserId, trip: &TripId) -> Result<StoredTrip> {
        self.tables()?
            .trips
            .iter()
            .find(|record| &record.user == user && &record.stored.summary.id == trip)
            .map(|record| record.stored.clone())
            .ok_or_else(|| not_found(trip))
    }

    async fn delete_trip(&self, user: &UserId, trip: &TripId) -> Result<()> {
        let mut tables = self.tables()?;
        let before = tables.trips.len();
        tables
            .trips
            .retain(|record| !(&record.user == user && &record.stored.summary.id == trip));
        if tables.trips.len() == before {
            return Err(not_found(trip));
        }
        for record in &mut tables.bookings {
            if record.summary.trip_id.as_ref() == Some(trip) {
                record.summary.trip_id = None;
            }
        }
        Ok(())
    }
}

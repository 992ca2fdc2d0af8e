use super::{
    already_booked, budget_label, timeframe_label, BookingId, BookingStatus, BookingSummary, StoredTrip, TripId,
    TripStore, TripSummary, UserId,
};
use crate::{
    error::{Result, TripError},
    types::{
        result::{CheckedPlan, PlanStatus},
        trip_types::TripPlan,
    },
};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::{
    path::Path,
    sync::{Mutex, MutexGuard, PoisonError},
};
use tracing::{debug, info};

trait SqlResultExt<T> {
    fn db_context(self, message: &str) -> Result<T>;
}

impl<T> SqlResultExt<T> for std::result::Result<T, rusqlite::Error> {
    fn db_context(self, message: &str) -> Result<T> {
        self.map_err(|err| TripError::Persistence(format!("{message}: {err}")))
    }
}

/// SQLite-backed store, one file per installation
#[derive(Debug)]
pub struct SqliteStore {
    connection: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let connection =
            Connection::open(path.as_ref()).db_context("Failed to open database connection")?;
        info!(target: "moodtrip::store", path = %path.as_ref().display(), "opened trip store");
        Self::with_connection(connection)
    }

    pub fn open_in_memory() -> Result<Self> {
        let connection =
            Connection::open_in_memory().db_context("Failed to open in-memory database")?;
        Self::with_connection(connection)
    }

    fn with_connection(connection: Connection) -> Result<Self> {
        connection
            .execute("PRAGMA foreign_keys = ON", [])
            .db_context("Failed to enable foreign keys")?;
        connection
            .execute_batch(include_str!("../../assets/schema.sql"))
            .db_context("Failed to initialize database schema")?;
        Ok(Self {
            connection: Mutex::new(connection),
        })
    }

    fn connection(&self) -> MutexGuard<'_, Connection> {
        self.connection
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|err| TripError::Persistence(format!("Invalid timestamp `{raw}`: {err}")))
}

fn parse_plan_status(raw: &str) -> Result<PlanStatus> {
    PlanStatus::parse(raw)
        .ok_or_else(|| TripError::Persistence(format!("Unknown plan status `{raw}`")))
}

struct TripRow {
    id: String,
    title: String,
    destination: String,
    mood: String,
    mood_slug: Option<String>,
    timeframe: String,
    budget: String,
    plan_status: String,
    created_at: String,
    full_details: String,
}

impl TripRow {
    const COLUMNS: &'static str = "id, title, destination, mood, mood_slug, timeframe, budget, \
                                   plan_status, created_at, full_details";

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            title: row.get(1)?,
            destination: row.get(2)?,
            mood: row.get(3)?,
            mood_slug: row.get(4)?,
            timeframe: row.get(5)?,
            budget: row.get(6)?,
            plan_status: row.get(7)?,
            created_at: row.get(8)?,
            full_details: row.get(9)?,
        })
    }

    fn summary(&self) -> Result<TripSummary> {
        Ok(TripSummary {
            id: TripId::new(self.id.clone()),
            title: self.title.clone(),
            destination: self.destination.clone(),
            mood: self.mood.clone(),
            mood_slug: self.mood_slug.clone(),
            timeframe: self.timeframe.clone(),
            budget: self.budget.clone(),
            status: parse_plan_status(&self.plan_status)?,
            created_at: parse_timestamp(&self.created_at)?,
        })
    }
}

#[async_trait]
impl TripStore for SqliteStore {
    async fn save_trip(&self, user: &UserId, checked: &CheckedPlan) -> Result<TripId> {
        let plan = checked.plan();
        let id = TripId::generate();
        let details = serde_json::to_string(plan)?;

        self.connection()
            .execute(
                "INSERT INTO trips (id, user_id, mood, mood_slug, title, destination, timeframe, \
                 budget, plan_status, full_details, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    id.as_str(),
                    user.as_str(),
                    plan.mood,
                    checked.mood_slug(),
                    plan.title,
                    plan.destination.city,
                    timeframe_label(plan),
                    budget_label(plan),
                    checked.status().as_str(),
                    details,
                    timestamp(Utc::now()),
                ],
            )
            .db_context("Failed to save trip")?;

        debug!(target: "moodtrip::store", trip_id = %id, user = %user, status = %checked.status(), "trip saved");
        Ok(id)
    }

    async fn create_booking(&self, user: &UserId, checked: &CheckedPlan) -> Result<BookingId> {
        let plan = checked.plan();
        let id = BookingId::generate();
        let details = serde_json::to_string(plan)?;

        self.connection()
            .execute(
                "INSERT INTO bookings (id, user_id, title, destination, budget, status, \
                 plan_status, booking_data, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    id.as_str(),
                    user.as_str(),
                    plan.title,
                    plan.destination.city,
                    budget_label(plan),
                    BookingStatus::Booked.as_str(),
                    checked.status().as_str(),
                    details,
                    timestamp(Utc::now()),
                ],
            )
            .db_context("Failed to create booking")?;

        debug!(target: "moodtrip::store", booking_id = %id, user = %user, "booking created");
        Ok(id)
    }

    async fn book_saved_trip(&self, user: &UserId, trip: &TripId) -> Result<BookingId> {
        let mut connection = self.connection();
        let tx = connection
            .transaction()
            .db_context("Failed to start booking transaction")?;

        let row = tx
            .query_row(
                &format!(
                    "SELECT {} FROM trips WHERE user_id = ?1 AND id = ?2",
                    TripRow::COLUMNS
                ),
                params![user.as_str(), trip.as_str()],
                TripRow::from_row,
            )
            .optional()
            .db_context("Failed to load trip")?
            .ok_or_else(|| TripError::Persistence(format!("trip `{trip}` not found")))?;

        let booked: bool = tx
            .query_row(
                "SELECT EXISTS (SELECT 1 FROM bookings WHERE trip_id = ?1 AND status = ?2)",
                params![trip.as_str(), BookingStatus::Booked.as_str()],
                |row| row.get(0),
            )
            .db_context("Failed to check existing bookings")?;
        if booked {
            return Err(already_booked(trip));
        }

        let plan: TripPlan = serde_json::from_str(&row.full_details)?;
        let id = BookingId::generate();
        tx.execute(
            "INSERT INTO bookings (id, user_id, trip_id, title, destination, budget, status, \
             plan_status, booking_data, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                id.as_str(),
                user.as_str(),
                trip.as_str(),
                plan.title,
                plan.destination.city,
                budget_label(&plan),
                BookingStatus::Booked.as_str(),
                row.plan_status,
                row.full_details,
                timestamp(Utc::now()),
            ],
        )
        .db_context("Failed to create booking")?;
        tx.commit().db_context("Failed to commit booking")?;

        debug!(target: "moodtrip::store", booking_id = %id, trip_id = %trip, user = %user, "saved trip booked");
        Ok(id)
    }

    async fn list_trips(&self, user: &UserId) -> Result<Vec<TripSummary>> {
        let connection = self.connection();
        let mut statement = connection
            .prepare(&format!(
                "SELECT {} FROM trips WHERE user_id = ?1 ORDER BY created_at DESC, rowid DESC",
                TripRow::COLUMNS
            ))
            .db_context("Failed to prepare trip query")?;
        let rows = statement
            .query_map(params![user.as_str()], TripRow::from_row)
            .db_context("Failed to list trips")?
            .collect::<rusqlite::Result<Vec<_>>>()
            .db_context("Failed to read trip row")?;

        rows.iter().map(TripRow::summary).collect()
    }

    async fn list_bookings(&self, user: &UserId) -> Result<Vec<BookingSummary>> {
        let connection = self.connection();
        let mut statement = connection
            .prepare(
                "SELECT id, trip_id, title, destination, budget, status, plan_status, created_at \
                 FROM bookings WHERE user_id = ?1 ORDER BY created_at DESC, rowid DESC",
            )
            .db_context("Failed to prepare booking query")?;
        let rows = statement
            .query_map(params![user.as_str()], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, Option<String>>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                    row.get::<_, String>(6)?,
                    row.get::<_, String>(7)?,
                ))
            })
            .db_context("Failed to list bookings")?
            .collect::<rusqlite::Result<Vec<_>>>()
            .db_context("Failed to read booking row")?;

        rows.into_iter()
            .map(
                |(id, trip_id, title, destination, budget, status, plan_status, created_at)| {
                    Ok(BookingSummary {
                        id: BookingId::new(id),
                        trip_id: trip_id.map(TripId::new),
                        title,
                        destination,
                        budget,
                        status: BookingStatus::parse(&status).ok_or_else(|| {
                            TripError::Persistence(format!("Unknown booking status `{status}`"))
                        })?,
                        plan_status: parse_plan_status(&plan_status)?,
                        created_at: parse_timestamp(&created_at)?,
                    })
                },
            )
            .collect()
    }

    async fn get_trip(&self, user: &UserId, trip: &TripId) -> Result<StoredTrip> {
        let row = self
            .connection()
            .query_row(
                &format!(
                    "SELECT {} FROM trips WHERE user_id = ?1 AND id = ?2",
                    TripRow::COLUMNS
                ),
                params![user.as_str(), trip.as_str()],
                TripRow::from_row,
            )
            .optional()
            .db_context("Failed to load trip")?
            .ok_or_else(|| TripError::Persistence(format!("trip `{trip}` not found")))?;

        let plan: TripPlan = serde_json::from_str(&row.full_details)?;
        Ok(StoredTrip {
            summary: row.summary()?,
            plan,
        })
    }

    async fn delete_trip(&self, user: &UserId, trip: &TripId) -> Result<()> {
        let deleted = self
            .connection()
            .execute(
                "DELETE FROM trips WHERE user_id = ?1 AND id = ?2",
                params![user.as_str(), trip.as_str()],
            )
            .db_context("Failed to delete trip")?;
        if deleted == 0 {
            return Err(TripError::Persistence(format!("trip `{trip}` not found")));
        }
        debug!(target: "moodtrip::store", trip_id = %trip, user = %user, "trip deleted");
        Ok(())
    }
}

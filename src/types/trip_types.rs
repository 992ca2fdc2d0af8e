use crate::schemas::{CompletionSchema, SchemaHandle};
use chrono::{DateTime, FixedOffset};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::{fmt, sync::OnceLock};

/// A single curated trip generated for a traveller's mood and preferences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TripPlan {
    /// Unique identifier for the trip.
    pub id: String,
    /// A short, catchy title for the trip (e.g., 'Romantic Escape in Paris').
    pub title: String,
    /// The mood of the trip as normal text, first word capitalized (e.g., 'Relax and recharge').
    pub mood: String,
    /// Where the trip takes place.
    pub destination: Destination,
    /// When the trip takes place.
    pub timeframe: Timeframe,
    /// Estimated cost of the whole trip.
    pub budget: Budget,
    /// Day-by-day plan, one entry per day, numbered from 1.
    pub itinerary: Vec<ItineraryDay>,
    /// Suggested places to stay with nightly prices.
    pub accommodations: Vec<Accommodation>,
    /// Transport segments to, from and around the destination.
    pub transport: Vec<TransportSegment>,
    /// Curated reading, listening and cultural tips.
    pub extras: Extras,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Destination {
    /// Country where the trip takes place.
    pub country: String,
    /// City or region of the destination.
    pub city: String,
    /// Geographic position of the destination, at least 2 decimal places.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<Coordinates>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Coordinates {
    /// Latitude of the destination.
    pub lat: f64,
    /// Longitude of the destination.
    pub lng: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Timeframe {
    /// Start date of the trip (ISO 8601 with timezone).
    pub start_date: DateTime<FixedOffset>,
    /// End date of the trip (ISO 8601 with timezone), after the start date.
    pub end_date: DateTime<FixedOffset>,
    /// Number of days between startDate and endDate.
    pub duration_days: u32,
}

impl Timeframe {
    /// Calendar-day span between start and end, each read in its own offset.
    pub fn span_days(&self) -> i64 {
        whole_day_span(&self.start_date, &self.end_date)
    }
}

pub(crate) fn whole_day_span(start: &DateTime<FixedOffset>, end: &DateTime<FixedOffset>) -> i64 {
    end.date_naive()
        .signed_duration_since(start.date_naive())
        .num_days()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Budget {
    /// Currency symbol used for every amount in the plan (e.g., $, €, £).
    pub currency: String,
    /// Estimated total cost; exactly the sum of the breakdown.
    pub total: f64,
    /// Per-category split of the total.
    pub breakdown: BudgetBreakdown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BudgetBreakdown {
    /// Estimated cost of flights.
    pub flights: f64,
    /// Estimated cost of hotels or stays.
    pub housing: f64,
    /// Estimated cost of activities.
    pub activities: f64,
    /// Estimated cost of meals.
    pub food: f64,
    /// Estimated cost of local transportation.
    pub transport: f64,
}

impl BudgetBreakdown {
    /// Category label/amount pairs in display order.
    pub fn entries(&self) -> [(&'static str, f64); 5] {
        [
            ("flights", self.flights),
            ("housing", self.housing),
            ("activities", self.activities),
            ("food", self.food),
            ("transport", self.transport),
        ]
    }

    pub fn sum(&self) -> f64 {
        self.entries().iter().map(|(_, amount)| amount).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ItineraryDay {
    /// Day number in the itinerary, starting at 1.
    pub day: u32,
    /// Short title for the day's plan.
    pub title: String,
    /// Detailed description of the day's activities.
    pub description: String,
    /// Activities for the day in chronological order.
    pub activities: Vec<Activity>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    /// Activity name.
    pub name: String,
    /// Type of activity.
    pub category: ActivityCategory,
    /// Location of the activity.
    pub location: String,
    /// Estimated price of the activity, zero when free.
    pub price: f64,
    /// Expected duration in hours.
    pub duration_hours: f64,
}

/// Closed set of activity kinds a plan may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ActivityCategory {
    Sightseeing,
    Adventure,
    Culture,
    Relaxation,
    Dining,
    Entertainment,
    Shopping,
    Nature,
    Sports,
    Nightlife,
}

impl ActivityCategory {
    pub const ALL: [ActivityCategory; 10] = [
        ActivityCategory::Sightseeing,
        ActivityCategory::Adventure,
        ActivityCategory::Culture,
        ActivityCategory::Relaxation,
        ActivityCategory::Dining,
        ActivityCategory::Entertainment,
        ActivityCategory::Shopping,
        ActivityCategory::Nature,
        ActivityCategory::Sports,
        ActivityCategory::Nightlife,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityCategory::Sightseeing => "sightseeing",
            ActivityCategory::Adventure => "adventure",
            ActivityCategory::Culture => "culture",
            ActivityCategory::Relaxation => "relaxation",
            ActivityCategory::Dining => "dining",
            ActivityCategory::Entertainment => "entertainment",
            ActivityCategory::Shopping => "shopping",
            ActivityCategory::Nature => "nature",
            ActivityCategory::Sports => "sports",
            ActivityCategory::Nightlife => "nightlife",
        }
    }
}

impl fmt::Display for ActivityCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Accommodation {
    /// Hotel or stay name.
    pub name: String,
    /// Type of accommodation (e.g., hotel, hostel, ryokan).
    #[serde(rename = "type")]
    pub kind: String,
    /// Location of the accommodation.
    pub location: String,
    /// Cost per night.
    pub price_per_night: f64,
    /// User rating from 0 to 5.
    pub rating: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TransportSegment {
    /// Type of transport (e.g., flight, train, taxi, rental car).
    #[serde(rename = "type")]
    pub kind: String,
    /// Transport provider or company.
    pub provider: String,
    /// Departure time (ISO 8601 with timezone).
    pub departure: DateTime<FixedOffset>,
    /// Arrival time (ISO 8601 with timezone), after the departure.
    pub arrival: DateTime<FixedOffset>,
    /// Cost of this transport segment.
    pub price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Extras {
    /// Links to curated blog posts for this trip.
    pub blogs: Vec<String>,
    /// Links to playlists that match the trip's vibe.
    pub playlists: Vec<String>,
    /// Key cultural tips and insights about the destination.
    pub cultural_insights: Vec<String>,
}

impl CompletionSchema for TripPlan {
    fn schema() -> &'static SchemaHandle {
        static HANDLE: OnceLock<SchemaHandle> = OnceLock::new();
        HANDLE.get_or_init(|| SchemaHandle::for_type::<TripPlan>("trip_plan"))
    }
}

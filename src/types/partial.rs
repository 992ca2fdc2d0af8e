//! Deep-partial view of a [`TripPlan`](super::trip_types::TripPlan).
//!
//! Every field is optional and deserialization never fails: a field whose
//! JSON type does not match is read as absent, and list entries that are not
//! records are skipped. The strict shape is only enforced once the stream
//! has ended, by the consistency guard.

use chrono::{DateTime, FixedOffset};
use serde::{de::DeserializeOwned, Deserialize, Deserializer, Serialize};
use serde_json::Value;

fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(T::deserialize(value).ok())
}

fn lenient_list<'de, D, T>(deserializer: D) -> Result<Option<Vec<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    match Value::deserialize(deserializer)? {
        Value::Array(items) => Ok(Some(
            items
                .into_iter()
                .filter_map(|item| T::deserialize(item).ok())
                .collect(),
        )),
        _ => Ok(None),
    }
}

fn parse_datetime(raw: Option<&str>) -> Option<DateTime<FixedOffset>> {
    raw.and_then(|value| DateTime::parse_from_rfc3339(value).ok())
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartialTripPlan {
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub mood: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub destination: Option<PartialDestination>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub timeframe: Option<PartialTimeframe>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub budget: Option<PartialBudget>,
    #[serde(default, deserialize_with = "lenient_list", skip_serializing_if = "Option::is_none")]
    pub itinerary: Option<Vec<PartialDay>>,
    #[serde(default, deserialize_with = "lenient_list", skip_serializing_if = "Option::is_none")]
    pub accommodations: Option<Vec<PartialAccommodation>>,
    #[serde(default, deserialize_with = "lenient_list", skip_serializing_if = "Option::is_none")]
    pub transport: Option<Vec<PartialTransport>>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub extras: Option<PartialExtras>,
}

impl PartialTripPlan {
    /// Project a raw snapshot; anything that is not an object yields an empty plan.
    pub fn from_value(value: &Value) -> Self {
        serde_json::from_value(value.clone()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn currency(&self) -> Option<&str> {
        self.budget.as_ref()?.currency.as_deref()
    }

    pub fn day_count(&self) -> usize {
        self.itinerary.as_ref().map_or(0, Vec::len)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PartialDestination {
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<PartialCoordinates>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PartialCoordinates {
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub lng: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartialTimeframe {
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub duration_days: Option<u32>,
}

impl PartialTimeframe {
    pub fn start(&self) -> Option<DateTime<FixedOffset>> {
        parse_datetime(self.start_date.as_deref())
    }

    pub fn end(&self) -> Option<DateTime<FixedOffset>> {
        parse_datetime(self.end_date.as_deref())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PartialBudget {
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub total: Option<f64>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub breakdown: Option<PartialBreakdown>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PartialBreakdown {
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub flights: Option<f64>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub housing: Option<f64>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub activities: Option<f64>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub food: Option<f64>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub transport: Option<f64>,
}

impl PartialBreakdown {
    /// Populated categories in display order.
    pub fn entries(&self) -> Vec<(&'static str, f64)> {
        [
            ("flights", self.flights),
            ("housing", self.housing),
            ("activities", self.activities),
            ("food", self.food),
            ("transport", self.transport),
        ]
        .into_iter()
        .filter_map(|(label, amount)| amount.map(|amount| (label, amount)))
        .collect()
    }

    /// All five categories, or `None` while any is still missing.
    pub fn complete_entries(&self) -> Option<[f64; 5]> {
        Some([
            self.flights?,
            self.housing?,
            self.activities?,
            self.food?,
            self.transport?,
        ])
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PartialDay {
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub day: Option<u32>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "lenient_list", skip_serializing_if = "Option::is_none")]
    pub activities: Option<Vec<PartialActivity>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartialActivity {
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub duration_hours: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartialAccommodation {
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(
        rename = "type",
        default,
        deserialize_with = "lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub kind: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub price_per_night: Option<f64>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PartialTransport {
    #[serde(
        rename = "type",
        default,
        deserialize_with = "lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub kind: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub departure: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub arrival: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
}

impl PartialTransport {
    pub fn departure_at(&self) -> Option<DateTime<FixedOffset>> {
        parse_datetime(self.departure.as_deref())
    }

    pub fn arrival_at(&self) -> Option<DateTime<FixedOffset>> {
        parse_datetime(self.arrival.as_deref())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartialExtras {
    #[serde(default, deserialize_with = "lenient_list", skip_serializing_if = "Option::is_none")]
    pub blogs: Option<Vec<String>>,
    #[serde(default, deserialize_with = "lenient_list", skip_serializing_if = "Option::is_none")]
    pub playlists: Option<Vec<String>>,
    #[serde(default, deserialize_with = "lenient_list", skip_serializing_if = "Option::is_none")]
    pub cultural_insights: Option<Vec<String>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_and_non_object_inputs() {
        assert!(PartialTripPlan::from_value(&json!({})).is_empty());
        assert!(PartialTripPlan::from_value(&json!("text")).is_empty());
        assert!(PartialTripPlan::from_value(&Value::Null).is_empty());
    }

    #[test]
    fn test_mistyped_fields_read_as_absent() {
        let plan = PartialTripPlan::from_value(&json!({
            "title": 12,
            "mood": "Flexible",
            "budget": { "total": "3970", "currency": "$" },
            "itinerary": "soon"
        }));
        assert_eq!(plan.title, None);
        assert_eq!(plan.mood.as_deref(), Some("Flexible"));
        assert_eq!(plan.budget.as_ref().unwrap().total, None);
        assert_eq!(plan.currency(), Some("$"));
        assert_eq!(plan.itinerary, None);
    }

    #[test]
    fn test_half_written_day_is_kept() {
        let plan = PartialTripPlan::from_value(&json!({
            "itinerary": [
                { "day": 1, "title": "Arrival", "activities": [{ "name": "Gion" }] },
                { "day": 2 },
                "garbage"
            ]
        }));
        assert_eq!(plan.day_count(), 2);
        let first = &plan.itinerary.as_ref().unwrap()[0];
        assert_eq!(
            first.activities.as_ref().unwrap()[0].name.as_deref(),
            Some("Gion")
        );
    }

    #[test]
    fn test_serialization_skips_missing_fields() {
        let plan = PartialTripPlan {
            title: Some("Kyoto".into()),
            ..Default::default()
        };
        assert_eq!(serde_json::to_value(&plan).unwrap(), json!({ "title": "Kyoto" }));
    }

    #[test]
    fn test_breakdown_complete_entries() {
        let mut breakdown = PartialBreakdown {
            flights: Some(1.0),
            housing: Some(2.0),
            activities: Some(3.0),
            food: Some(4.0),
            transport: None,
        };
        assert!(breakdown.complete_entries().is_none());
        assert_eq!(breakdown.entries().len(), 4);
        breakdown.transport = Some(5.0);
        assert_eq!(breakdown.complete_entries(), Some([1.0, 2.0, 3.0, 4.0, 5.0]));
    }
}

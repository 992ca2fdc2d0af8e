use serde::{Deserialize, Serialize};

/// Loosely typed trip request as it arrives from a client.
///
/// Every field is optional; the context compiler decides the fallbacks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TripContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mood: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeframe: Option<TimeframeInput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub departure_date: Option<String>,
}

/// A timeframe given either as a day count or as free text ("a weekend").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TimeframeInput {
    Days(f64),
    Text(String),
}

impl TripContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mood(mut self, mood: impl Into<String>) -> Self {
        self.mood = Some(mood.into());
        self
    }

    pub fn with_budget(mut self, budget: f64) -> Self {
        self.budget = Some(budget);
        self
    }

    pub fn with_timeframe_days(mut self, days: f64) -> Self {
        self.timeframe = Some(TimeframeInput::Days(days));
        self
    }

    pub fn with_timeframe_text(mut self, text: impl Into<String>) -> Self {
        self.timeframe = Some(TimeframeInput::Text(text.into()));
        self
    }

    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = Some(currency.into());
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn with_departure_date(mut self, date: impl Into<String>) -> Self {
        self.departure_date = Some(date.into());
        self
    }

    /// Overlay `adjust` on this context; fields it leaves unset are kept.
    pub fn merged(&self, adjust: &TripContext) -> TripContext {
        TripContext {
            mood: adjust.mood.clone().or_else(|| self.mood.clone()),
            budget: adjust.budget.or(self.budget),
            timeframe: adjust.timeframe.clone().or_else(|| self.timeframe.clone()),
            currency: adjust.currency.clone().or_else(|| self.currency.clone()),
            location: adjust.location.clone().or_else(|| self.location.clone()),
            departure_date: adjust
                .departure_date
                .clone()
                .or_else(|| self.departure_date.clone()),
        }
    }
}

use super::{
    planner::TripPlanner,
    session::{GenerationStream, PlannerSession},
};
use crate::{
    error::{Result, TripError},
    services::planning::format_amount,
    storage::{BookingId, TripId, TripStore, UserId},
    types::{
        context::TripContext,
        partial::PartialTripPlan,
        result::{CheckedPlan, GenerationEvent},
    },
};
use chrono::{DateTime, FixedOffset};
use serde::Serialize;
use std::{fmt, sync::Arc};
use tracing::debug;

pub const LOADING_TEXT: &str = "Generating your trip";
pub const FAILED_TEXT: &str = "Failed to generate trip. Try again?";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Success,
    Warning,
    Error,
}

/// User-visible outcome of an action
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl Notice {
    fn new(level: NoticeLevel, message: impl Into<String>, detail: Option<String>) -> Self {
        Self {
            level,
            message: message.into(),
            detail,
        }
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.level {
            NoticeLevel::Success => "ok",
            NoticeLevel::Warning => "warning",
            NoticeLevel::Error => "error",
        };
        write!(f, "[{level}] {}", self.message)?;
        if let Some(detail) = &self.detail {
            write!(f, " ({detail})")?;
        }
        Ok(())
    }
}

/// What a call to [`TripRenderer::next_tick`] applied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    Partial,
    Complete,
    Failed,
    /// Nothing is in flight.
    Idle,
}

/// Client-side state for one mood page.
///
/// Projects the generation stream into a [`TripView`] on every tick and
/// guards save/book so a plan is stored at most once per view.
#[derive(Debug)]
pub struct TripRenderer {
    session: PlannerSession,
    context: TripContext,
    stream: Option<GenerationStream>,
    partial: PartialTripPlan,
    checked: Option<CheckedPlan>,
    failure: Option<TripError>,
    loading: bool,
    saved: Option<TripId>,
    booked: Option<BookingId>,
    notices: Vec<Notice>,
}

impl TripRenderer {
    pub fn new(planner: Arc<TripPlanner>, context: TripContext) -> Self {
        Self {
            session: PlannerSession::new(planner),
            context,
            stream: None,
            partial: PartialTripPlan::default(),
            checked: None,
            failure: None,
            loading: false,
            saved: None,
            booked: None,
            notices: Vec::new(),
        }
    }

    /// Request a plan for the current context, replacing anything in flight.
    pub fn start(&mut self) {
        self.stream = Some(self.session.generate(&self.context));
        self.partial = PartialTripPlan::default();
        self.checked = None;
        self.failure = None;
        self.loading = true;
    }

    /// Generate again, optionally with adjusted preferences.
    ///
    /// Adjusted preferences are layered over the current context and the
    /// saved/booked flags are reset, since the result is a different trip.
    pub fn retry(&mut self, adjust: Option<TripContext>) {
        if let Some(adjust) = adjust {
            self.context = self.context.merged(&adjust);
        }
        self.saved = None;
        self.booked = None;
        self.start();
    }

    /// Wait for the next event and apply it.
    pub async fn next_tick(&mut self) -> Tick {
        let Some(stream) = self.stream.as_mut() else {
            return Tick::Idle;
        };
        match stream.recv().await {
            Some(event) => self.apply(event),
            None => {
                self.stream = None;
                if self.loading {
                    self.apply(GenerationEvent::Failed(TripError::Stream(
                        "generation ended without a result".to_string(),
                    )))
                } else {
                    Tick::Idle
                }
            }
        }
    }

    /// Consume events until the generation completes or fails.
    pub async fn run_to_end(&mut self) -> Tick {
        loop {
            match self.next_tick().await {
                Tick::Partial => continue,
                terminal => return terminal,
            }
        }
    }

    pub fn apply(&mut self, event: GenerationEvent) -> Tick {
        match event {
            GenerationEvent::Partial(partial) => {
                self.partial = partial;
                Tick::Partial
            }
            GenerationEvent::Complete(checked) => {
                if let Ok(value) = serde_json::to_value(checked.plan()) {
                    self.partial = PartialTripPlan::from_value(&value);
                }
                if checked.is_degraded() {
                    self.notices.push(Notice::new(
                        NoticeLevel::Warning,
                        "Some details of this trip may be inconsistent.",
                        Some(
                            checked
                                .warnings()
                                .iter()
                                .map(|w| w.message.as_str())
                                .collect::<Vec<_>>()
                                .join("; "),
                        ),
                    ));
                }
                self.checked = Some(checked);
                self.finish();
                Tick::Complete
            }
            GenerationEvent::Failed(err) => {
                self.notices.push(Notice::new(
                    NoticeLevel::Error,
                    err.user_message(),
                    Some(err.to_string()),
                ));
                self.failure = Some(err);
                self.finish();
                Tick::Failed
            }
        }
    }

    fn finish(&mut self) {
        self.loading = false;
        self.stream = None;
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn context(&self) -> &TripContext {
        &self.context
    }

    pub fn partial(&self) -> &PartialTripPlan {
        &self.partial
    }

    pub fn plan(&self) -> Option<&CheckedPlan> {
        self.checked.as_ref()
    }

    pub fn failure(&self) -> Option<&TripError> {
        self.failure.as_ref()
    }

    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    pub fn saved_trip(&self) -> Option<&TripId> {
        self.saved.as_ref()
    }

    pub fn booking(&self) -> Option<&BookingId> {
        self.booked.as_ref()
    }

    fn reject(&mut self, level: NoticeLevel, message: &str) -> TripError {
        self.notices.push(Notice::new(level, message, None));
        TripError::Precondition(message.to_string())
    }

    fn ready_plan(
        &mut self,
        user: Option<&UserId>,
        signed_out: &str,
    ) -> Result<(UserId, CheckedPlan)> {
        let Some(user) = user else {
            return Err(self.reject(NoticeLevel::Error, signed_out));
        };
        let checked = if self.loading { None } else { self.checked.clone() };
        let Some(checked) = checked else {
            return Err(self.reject(NoticeLevel::Error, "The trip is not ready yet."));
        };
        Ok((user.clone(), checked))
    }

    /// Save the finished plan for `user`; a second save in this view is rejected locally.
    pub async fn save(&mut self, store: &dyn TripStore, user: Option<&UserId>) -> Result<TripId> {
        let (user, checked) = self.ready_plan(user, "You must be logged in to save your trip.")?;
        if self.saved.is_some() {
            return Err(self.reject(NoticeLevel::Warning, "You have already saved this trip."));
        }

        match store.save_trip(&user, &checked).await {
            Ok(id) => {
                debug!(target: "moodtrip::store", trip_id = %id, "trip saved from view");
                self.saved = Some(id.clone());
                self.notices.push(Notice::new(
                    NoticeLevel::Success,
                    "Trip saved to your account!",
                    None,
                ));
                Ok(id)
            }
            Err(err) => {
                self.notices.push(Notice::new(
                    NoticeLevel::Error,
                    "There was an error saving your trip. Please try again.",
                    Some(err.to_string()),
                ));
                Err(err)
            }
        }
    }

    /// Book the finished plan for `user`; a second booking in this view is rejected locally.
    pub async fn book(&mut self, store: &dyn TripStore, user: Option<&UserId>) -> Result<BookingId> {
        let (user, checked) = self.ready_plan(user, "You must be logged in to book your trip.")?;
        if self.booked.is_some() {
            return Err(self.reject(NoticeLevel::Warning, "You recently booked this trip."));
        }

        match store.create_booking(&user, &checked).await {
            Ok(id) => {
                self.booked = Some(id.clone());
                self.notices.push(Notice::new(
                    NoticeLevel::Success,
                    "Trip booked successfully!",
                    None,
                ));
                Ok(id)
            }
            Err(err) => {
                self.notices.push(Notice::new(
                    NoticeLevel::Error,
                    "There was an error booking your trip. Please try again.",
                    Some(err.to_string()),
                ));
                Err(err)
            }
        }
    }

    pub fn view(&self) -> TripView {
        let banner = if self.loading {
            Some(LOADING_TEXT.to_string())
        } else if self.failure.is_some() {
            Some(FAILED_TEXT.to_string())
        } else {
            None
        };
        let warnings = self
            .checked
            .as_ref()
            .map(|checked| checked.warnings().iter().map(ToString::to_string).collect())
            .unwrap_or_default();

        let mut view = TripView::from_partial(&self.partial);
        view.banner = banner;
        view.warnings = warnings;
        view
    }
}

/// Renderable projection of a plan at any stage of completion
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TripView {
    pub title: String,
    pub subtitle: String,
    pub start: String,
    pub end: String,
    pub duration: Option<String>,
    pub budget_total: Option<String>,
    pub breakdown: Vec<(String, String)>,
    pub days: Vec<DayView>,
    pub cultural_insights: Vec<String>,
    pub accommodations: Vec<String>,
    pub transport: Vec<String>,
    pub banner: Option<String>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DayView {
    pub heading: String,
    pub description: String,
    pub activities: Vec<String>,
}

fn display_date(raw: Option<&str>) -> String {
    raw.and_then(|raw| DateTime::<FixedOffset>::parse_from_rfc3339(raw).ok())
        .map(|at| at.format("%a %b %d %Y").to_string())
        .unwrap_or_else(|| "N/A".to_string())
}

impl TripView {
    pub fn from_partial(plan: &PartialTripPlan) -> Self {
        let symbol = plan.currency().unwrap_or_default();
        let money = |amount: f64| format!("{symbol}{}", format_amount(amount));

        let subtitle = {
            let destination = plan.destination.as_ref();
            let place = [
                destination.and_then(|d| d.city.as_deref()),
                destination.and_then(|d| d.country.as_deref()),
            ]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(", ");
            match plan.mood.as_deref() {
                Some(mood) if !place.is_empty() => format!("{place} • {mood}"),
                Some(mood) => mood.to_string(),
                None => place,
            }
        };

        let timeframe = plan.timeframe.as_ref();
        let days = plan
            .itinerary
            .iter()
            .flatten()
            .map(|day| DayView {
                heading: match (day.day, day.title.as_deref()) {
                    (Some(number), Some(title)) => format!("Day {number}: {title}"),
                    (Some(number), None) => format!("Day {number}"),
                    (None, Some(title)) => title.to_string(),
                    (None, None) => String::new(),
                },
                description: day.description.clone().unwrap_or_default(),
                activities: day
                    .activities
                    .iter()
                    .flatten()
                    .filter_map(|activity| {
                        let name = activity.name.as_deref()?;
                        let mut line = match activity.category.as_deref() {
                            Some(category) => format!("{name} • {category}"),
                            None => name.to_string(),
                        };
                        if let Some(price) = activity.price {
                            line.push_str(&format!(" ({})", money(price)));
                        }
                        Some(line)
                    })
                    .collect(),
            })
            .collect();

        let breakdown = plan
            .budget
            .as_ref()
            .and_then(|budget| budget.breakdown.as_ref())
            .map(|breakdown| {
                breakdown
                    .entries()
                    .into_iter()
                    .map(|(label, amount)| (label.to_string(), money(amount)))
                    .collect()
            })
            .unwrap_or_default();

        let accommodations = plan
            .accommodations
            .iter()
            .flatten()
            .filter_map(|stay| {
                let name = stay.name.as_deref()?;
                let mut line = name.to_string();
                if let Some(kind) = stay.kind.as_deref() {
                    line.push_str(&format!(" ({kind})"));
                }
                if let Some(price) = stay.price_per_night {
                    line.push_str(&format!(" {}/night", money(price)));
                }
                if let Some(rating) = stay.rating {
                    line.push_str(&format!(" ★{rating:.1}"));
                }
                Some(line)
            })
            .collect();

        let transport = plan
            .transport
            .iter()
            .flatten()
            .filter_map(|segment| {
                let kind = segment.kind.as_deref()?;
                let mut line = kind.to_string();
                if let Some(provider) = segment.provider.as_deref() {
                    line.push_str(&format!(" with {provider}"));
                }
                if let Some(price) = segment.price {
                    line.push_str(&format!(" {}", money(price)));
                }
                Some(line)
            })
            .collect();

        Self {
            title: plan.title.clone().unwrap_or_default(),
            subtitle,
            start: display_date(timeframe.and_then(|t| t.start_date.as_deref())),
            end: display_date(timeframe.and_then(|t| t.end_date.as_deref())),
            duration: timeframe
                .and_then(|t| t.duration_days)
                .map(|days| format!("{days} days")),
            budget_total: plan.budget.as_ref().and_then(|b| b.total).map(money),
            breakdown,
            days,
            cultural_insights: plan
                .extras
                .as_ref()
                .and_then(|extras| extras.cultural_insights.clone())
                .unwrap_or_default(),
            accommodations,
            transport,
            banner: None,
            warnings: Vec::new(),
        }
    }
}

impl fmt::Display for TripView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(banner) = &self.banner {
            writeln!(f, "{banner}")?;
        }
        if !self.title.is_empty() {
            writeln!(f, "{}", self.title)?;
        }
        if !self.subtitle.is_empty() {
            writeln!(f, "{}", self.subtitle)?;
        }
        writeln!(f, "Start: {}  End: {}", self.start, self.end)?;
        if let Some(total) = &self.budget_total {
            writeln!(f, "Budget: {total}")?;
        }
        for (label, amount) in &self.breakdown {
            writeln!(f, "  {label}: {amount}")?;
        }
        for day in &self.days {
            writeln!(f)?;
            writeln!(f, "{}", day.heading)?;
            if !day.description.is_empty() {
                writeln!(f, "  {}", day.description)?;
            }
            for activity in &day.activities {
                writeln!(f, "  - {activity}")?;
            }
        }
        if !self.accommodations.is_empty() {
            writeln!(f, "\nWhere to stay")?;
            for stay in &self.accommodations {
                writeln!(f, "  - {stay}")?;
            }
        }
        if !self.transport.is_empty() {
            writeln!(f, "\nGetting around")?;
            for segment in &self.transport {
                writeln!(f, "  - {segment}")?;
            }
        }
        if !self.cultural_insights.is_empty() {
            writeln!(f, "\nCultural insights")?;
            for insight in &self.cultural_insights {
                writeln!(f, "  - {insight}")?;
            }
        }
        for warning in &self.warnings {
            writeln!(f, "! {warning}")?;
        }
        Ok(())
    }
}

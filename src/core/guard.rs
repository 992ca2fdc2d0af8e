use crate::{
    error::{Result, TripError},
    schemas::{deserialize_structured, CompletionSchema, SchemaValidator},
    types::{
        partial::PartialTripPlan,
        result::{CheckKind, CheckedPlan, Violation},
        trip_types::{whole_day_span, TripPlan},
    },
};
use serde_json::Value;
use tracing::{debug, warn};

/// Largest amount compared exactly; anything beyond is a range violation.
const MAX_AMOUNT: f64 = 1e15;

/// Money compared in hundredths so float noise cannot break exact sums.
fn cents(amount: f64) -> Option<i128> {
    (amount.is_finite() && amount.abs() <= MAX_AMOUNT).then(|| (amount * 100.0).round() as i128)
}

/// Final gate between a generated object and a [`CheckedPlan`].
///
/// Schema conformance is fatal. Every other check only marks the plan as
/// degraded, and the only repair ever applied is sorting days by number.
#[derive(Debug)]
pub struct ConsistencyGuard {
    validator: SchemaValidator,
}

impl ConsistencyGuard {
    pub fn new() -> Result<Self> {
        Ok(Self {
            validator: SchemaValidator::new(TripPlan::schema())?,
        })
    }

    pub fn check(&self, value: Value) -> Result<CheckedPlan> {
        let mut schema_violations = self.validator.violations(&value);
        let warnings = consistency_violations(&PartialTripPlan::from_value(&value));

        let plan = if schema_violations.is_empty() {
            match deserialize_structured::<TripPlan>(&value) {
                Ok(plan) => Some(plan),
                Err(err) => {
                    schema_violations.push(Violation::new(
                        CheckKind::Schema,
                        "<root>",
                        err.to_string(),
                    ));
                    None
                }
            }
        } else {
            None
        };

        let Some(mut plan) = plan else {
            for violation in &schema_violations {
                debug!(
                    target: "moodtrip::guard",
                    path = %violation.path,
                    error = %violation.message
                );
            }
            warn!(
                target: "moodtrip::guard",
                schema_errors = schema_violations.len(),
                other_errors = warnings.len(),
                "generated trip rejected"
            );
            let message = format!(
                "{} schema violation(s) in generated `{}`",
                schema_violations.len(),
                self.validator.schema_name()
            );
            schema_violations.extend(warnings);
            return Err(TripError::SchemaViolation {
                message,
                violations: schema_violations,
            });
        };

        if !plan.itinerary.windows(2).all(|pair| pair[0].day <= pair[1].day) {
            debug!(target: "moodtrip::guard", plan_id = %plan.id, "sorting itinerary by day");
            plan.itinerary.sort_by_key(|day| day.day);
        }

        for warning in &warnings {
            warn!(
                target: "moodtrip::guard",
                plan_id = %plan.id,
                check = warning.kind.as_str(),
                path = %warning.path,
                "{}",
                warning.message
            );
        }

        Ok(CheckedPlan::new(plan, warnings))
    }
}

/// Date, day-count, budget and range checks over a possibly incomplete plan.
///
/// Fields that are missing are skipped, never reported here.
pub fn consistency_violations(plan: &PartialTripPlan) -> Vec<Violation> {
    let mut violations = Vec::new();
    check_dates(plan, &mut violations);
    check_days(plan, &mut violations);
    check_budget(plan, &mut violations);
    check_ranges(plan, &mut violations);
    violations
}

fn check_dates(plan: &PartialTripPlan, out: &mut Vec<Violation>) {
    if let Some(timeframe) = &plan.timeframe {
        if let (Some(start), Some(end)) = (timeframe.start(), timeframe.end()) {
            if end <= start {
                out.push(Violation::new(
                    CheckKind::DateOrder,
                    "/timeframe/endDate",
                    format!("endDate {end} is not after startDate {start}"),
                ));
            }
            if let Some(duration) = timeframe.duration_days {
                let span = whole_day_span(&start, &end);
                if span != i64::from(duration) {
                    out.push(Violation::new(
                        CheckKind::DayCount,
                        "/timeframe/durationDays",
                        format!("durationDays is {duration} but the dates span {span} days"),
                    ));
                }
            }
        }
    }

    for (idx, segment) in plan.transport.iter().flatten().enumerate() {
        if let (Some(departure), Some(arrival)) = (segment.departure_at(), segment.arrival_at()) {
            if arrival <= departure {
                out.push(Violation::new(
                    CheckKind::DateOrder,
                    format!("/transport/{idx}/arrival"),
                    format!("arrival {arrival} is not after departure {departure}"),
                ));
            }
        }
    }
}

fn check_days(plan: &PartialTripPlan, out: &mut Vec<Violation>) {
    let Some(itinerary) = &plan.itinerary else {
        return;
    };

    if let Some(duration) = plan.timeframe.as_ref().and_then(|t| t.duration_days) {
        if itinerary.len() != duration as usize {
            out.push(Violation::new(
                CheckKind::DayCount,
                "/itinerary",
                format!(
                    "itinerary has {} days but durationDays is {}",
                    itinerary.len(),
                    duration
                ),
            ));
        }
    }

    let numbers: Option<Vec<u32>> = itinerary.iter().map(|day| day.day).collect();
    if let Some(mut numbers) = numbers {
        numbers.sort_unstable();
        let contiguous = numbers
            .iter()
            .enumerate()
            .all(|(idx, day)| *day as usize == idx + 1);
        if !contiguous {
            out.push(Violation::new(
                CheckKind::DayCount,
                "/itinerary",
                format!(
                    "day numbers {:?} are not the contiguous range 1..={}",
                    numbers,
                    numbers.len()
                ),
            ));
        }
    }
}

fn check_budget(plan: &PartialTripPlan, out: &mut Vec<Violation>) {
    let Some(budget) = &plan.budget else {
        return;
    };
    let (Some(total), Some(parts)) = (
        budget.total,
        budget.breakdown.as_ref().and_then(|b| b.complete_entries()),
    ) else {
        return;
    };

    let sum = parts
        .iter()
        .try_fold(0i128, |acc, amount| acc.checked_add(cents(*amount)?));
    let (Some(total_cents), Some(sum)) = (cents(total), sum) else {
        out.push(Violation::new(
            CheckKind::Range,
            "/budget",
            format!("amounts beyond {MAX_AMOUNT:e} cannot be compared"),
        ));
        return;
    };
    if total_cents != sum {
        out.push(Violation::new(
            CheckKind::BudgetSum,
            "/budget/total",
            format!(
                "total {:.2} does not equal the breakdown sum {:.2}",
                total,
                sum as f64 / 100.0
            ),
        ));
    }
}

fn check_ranges(plan: &PartialTripPlan, out: &mut Vec<Violation>) {
    let mut negative = |path: String, label: &str, amount: Option<f64>| {
        if let Some(amount) = amount.filter(|amount| *amount < 0.0) {
            out.push(Violation::new(
                CheckKind::Range,
                path,
                format!("{label} {amount} is negative"),
            ));
        }
    };

    if let Some(breakdown) = plan.budget.as_ref().and_then(|b| b.breakdown.as_ref()) {
        for (label, amount) in breakdown.entries() {
            negative(format!("/budget/breakdown/{label}"), label, Some(amount));
        }
    }
    for (day_idx, day) in plan.itinerary.iter().flatten().enumerate() {
        for (idx, activity) in day.activities.iter().flatten().enumerate() {
            negative(
                format!("/itinerary/{day_idx}/activities/{idx}/price"),
                "price",
                activity.price,
            );
        }
    }
    for (idx, stay) in plan.accommodations.iter().flatten().enumerate() {
        negative(
            format!("/accommodations/{idx}/pricePerNight"),
            "pricePerNight",
            stay.price_per_night,
        );
    }
    for (idx, segment) in plan.transport.iter().flatten().enumerate() {
        negative(format!("/transport/{idx}/price"), "price", segment.price);
    }

    for (day_idx, day) in plan.itinerary.iter().flatten().enumerate() {
        for (idx, activity) in day.activities.iter().flatten().enumerate() {
            if let Some(hours) = activity.duration_hours.filter(|hours| *hours <= 0.0) {
                out.push(Violation::new(
                    CheckKind::Range,
                    format!("/itinerary/{day_idx}/activities/{idx}/durationHours"),
                    format!("durationHours {hours} must be greater than zero"),
                ));
            }
        }
    }

    for (idx, stay) in plan.accommodations.iter().flatten().enumerate() {
        if let Some(rating) = stay.rating.filter(|rating| !(0.0..=5.0).contains(rating)) {
            out.push(Violation::new(
                CheckKind::Range,
                format!("/accommodations/{idx}/rating"),
                format!("rating {rating} is outside 0..=5"),
            ));
        }
    }

    if let Some(coordinates) = plan
        .destination
        .as_ref()
        .and_then(|d| d.coordinates.as_ref())
    {
        if let Some(lat) = coordinates.lat.filter(|lat| !(-90.0..=90.0).contains(lat)) {
            out.push(Violation::new(
                CheckKind::Range,
                "/destination/coordinates/lat",
                format!("latitude {lat} is outside -90..=90"),
            ));
        }
        if let Some(lng) = coordinates.lng.filter(|lng| !(-180.0..=180.0).contains(lng)) {
            out.push(Violation::new(
                CheckKind::Range,
                "/destination/coordinates/lng",
                format!("longitude {lng} is outside -180..=180"),
            ));
        }
    }

    if let Some(extras) = &plan.extras {
        let lists = [
            ("blogs", &extras.blogs),
            ("playlists", &extras.playlists),
            ("culturalInsights", &extras.cultural_insights),
        ];
        for (name, entries) in lists {
            for (idx, entry) in entries.iter().flatten().enumerate() {
                if entry.trim().is_empty() {
                    out.push(Violation::new(
                        CheckKind::Range,
                        format!("/extras/{name}/{idx}"),
                        "entry is empty",
                    ));
                }
            }
        }
    }
}

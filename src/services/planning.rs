use crate::core::compiler::{BudgetTier, DaySpan, Origin, TripParameters};
use crate::types::trip_types::ActivityCategory;

/// Minimum number of activities asked for on each itinerary day
pub const MIN_ACTIVITIES_PER_DAY: usize = 2;

/// System instruction sent with every generation request
pub fn system_instruction() -> &'static str {
    "You are a travel planner that answers with exactly one JSON object matching the \
     provided schema. Do not add prose, Markdown or code fences before or after the object."
}

/// Render an amount with thousands separators, dropping a zero fraction.
pub fn format_amount(amount: f64) -> String {
    let cents = (amount.abs() * 100.0).round() as u64;
    let whole = cents / 100;
    let fraction = cents % 100;

    let digits = whole.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (idx, digit) in digits.chars().enumerate() {
        if idx > 0 && (digits.len() - idx) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let sign = if amount < 0.0 && cents > 0 { "-" } else { "" };
    if fraction == 0 {
        format!("{sign}{grouped}")
    } else {
        format!("{sign}{grouped}.{fraction:02}")
    }
}

fn describe_timeframe(span: &DaySpan) -> String {
    match span {
        DaySpan::Exact(days) => format!("exactly {span} (durationDays = {days})"),
        DaySpan::Range {
            label: Some(label),
            recognized: true,
            ..
        } => format!("\"{label}\", which means {span}"),
        DaySpan::Range {
            label: Some(label),
            recognized: false,
            ..
        } => format!("\"{label}\" (if this is unclear, plan {span})"),
        DaySpan::Range { label: None, .. } => format!("{span}, your choice"),
    }
}

/// Generation brief with the plan's acceptance criteria spelled out
pub fn generate_trip_brief(params: &TripParameters) -> String {
    let symbol = params.currency.symbol;

    let budget = match params.budget {
        BudgetTier::Amount(amount) => format!(
            "about {}{} in total for the whole trip",
            symbol,
            format_amount(amount)
        ),
        BudgetTier::Moderate => {
            "moderate: mid-range stays and a mix of paid and free activities".to_string()
        }
    };

    let origin = match &params.origin {
        Origin::Named(location) => format!(
            "The traveller starts from {location}; suggest a destination reachable from there, \
             nearby if possible."
        ),
        Origin::Anywhere => "The traveller may start from anywhere; pick any origin.".to_string(),
    };

    let start = match params.departure_date {
        Some(date) => format!("The trip starts on {date}; use it as startDate."),
        None => format!("The trip starts after {}.", params.anchor),
    };

    let categories = ActivityCategory::ALL
        .iter()
        .map(ActivityCategory::as_str)
        .collect::<Vec<_>>()
        .join(", ");

    let lines = [
        "Generate a single detailed trip plan that feels curated, exciting and practical."
            .to_string(),
        String::new(),
        format!("Mood: {} (use exactly this text for the mood field)", params.mood),
        format!("Budget: {budget}"),
        format!("Timeframe: {}", describe_timeframe(&params.timeframe)),
        format!("Currency symbol: {symbol}"),
        origin,
        format!("Today's date is {}. {start}", params.anchor),
        String::new(),
        "Include a destination (city, country, coordinates), accommodations with nightly \
         prices, activities aligned with the mood, transport to and around the destination, \
         and cultural insights, tips or hidden gems."
            .to_string(),
        String::new(),
        "Acceptance criteria:".to_string(),
        "- budget.total must equal flights + housing + activities + food + transport exactly."
            .to_string(),
        "- timeframe.durationDays must equal the number of days between startDate and endDate, \
         and endDate must be after startDate."
            .to_string(),
        "- The itinerary must contain exactly durationDays entries, numbered 1, 2, 3 ... \
         without gaps or repeats."
            .to_string(),
        format!("- Every itinerary day must have at least {MIN_ACTIVITIES_PER_DAY} activities."),
        format!("- Activity categories must be one of: {categories}."),
        format!("- Use the currency symbol {symbol} for every amount and for budget.currency."),
        "- Prices are never negative, durationHours is greater than zero, ratings are between \
         0 and 5."
            .to_string(),
        "- Every transport arrival is after its departure.".to_string(),
        "- All dates and times are ISO 8601 with a timezone offset.".to_string(),
        "- Places, prices and dates must be realistic and achievable within the budget and \
         timeframe."
            .to_string(),
    ];
    lines.join("\n")
}

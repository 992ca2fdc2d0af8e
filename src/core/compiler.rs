use crate::{
    error::{Result, TripError},
    services::planning::{generate_trip_brief, system_instruction},
    types::context::{TimeframeInput, TripContext},
};
use chrono::{DateTime, NaiveDate, Utc};
use std::fmt;

/// Code and display symbol of a supported currency
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Currency {
    pub code: &'static str,
    pub symbol: &'static str,
}

const CURRENCIES: [Currency; 15] = [
    Currency { code: "USD", symbol: "$" },
    Currency { code: "EUR", symbol: "€" },
    Currency { code: "GBP", symbol: "£" },
    Currency { code: "JPY", symbol: "¥" },
    Currency { code: "NGN", symbol: "₦" },
    Currency { code: "CAD", symbol: "CA$" },
    Currency { code: "AUD", symbol: "A$" },
    Currency { code: "INR", symbol: "₹" },
    Currency { code: "CNY", symbol: "CN¥" },
    Currency { code: "CHF", symbol: "CHF" },
    Currency { code: "ZAR", symbol: "R" },
    Currency { code: "KES", symbol: "KSh" },
    Currency { code: "GHS", symbol: "₵" },
    Currency { code: "BRL", symbol: "R$" },
    Currency { code: "MXN", symbol: "MX$" },
];

impl Currency {
    pub const FALLBACK: Currency = CURRENCIES[0];

    /// Resolve a currency code (any case) or a bare symbol.
    pub fn lookup(raw: &str) -> Option<Currency> {
        let raw = raw.trim();
        let code = raw.to_ascii_uppercase();
        CURRENCIES
            .iter()
            .find(|currency| currency.code == code)
            .or_else(|| CURRENCIES.iter().find(|currency| currency.symbol == raw))
            .copied()
    }

    pub fn all() -> &'static [Currency] {
        &CURRENCIES
    }
}

/// Spending level the generator is asked to respect
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BudgetTier {
    Amount(f64),
    /// No figure given: mid-range stays and a mix of paid and free activities.
    Moderate,
}

/// Trip length the generator is asked to plan for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DaySpan {
    Exact(u32),
    Range {
        min: u32,
        max: u32,
        /// Free text the range was read from, if any.
        label: Option<String>,
        /// False when the text was not understood and the default was used.
        recognized: bool,
    },
}

impl DaySpan {
    pub const DEFAULT: (u32, u32) = (5, 7);

    fn default_range() -> Self {
        DaySpan::Range {
            min: Self::DEFAULT.0,
            max: Self::DEFAULT.1,
            label: None,
            recognized: true,
        }
    }

    pub fn bounds(&self) -> (u32, u32) {
        match self {
            DaySpan::Exact(days) => (*days, *days),
            DaySpan::Range { min, max, .. } => (*min, *max),
        }
    }
}

impl fmt::Display for DaySpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DaySpan::Exact(1) => write!(f, "1 day"),
            DaySpan::Exact(days) => write!(f, "{days} days"),
            DaySpan::Range { min, max, .. } => write!(f, "{min}-{max} days"),
        }
    }
}

/// Where the traveller is starting from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Origin {
    /// The generator may pick any origin.
    Anywhere,
    Named(String),
}

/// Canonical parameters derived from a [`TripContext`]
#[derive(Debug, Clone, PartialEq)]
pub struct TripParameters {
    pub mood: String,
    pub mood_slug: Option<String>,
    pub currency: Currency,
    pub budget: BudgetTier,
    pub timeframe: DaySpan,
    pub origin: Origin,
    pub departure_date: Option<NaiveDate>,
    pub anchor: NaiveDate,
}

/// Everything needed to issue one generation request
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledRequest {
    pub params: TripParameters,
    pub system: String,
    pub brief: String,
}

/// Turns sparse client context into parameters and a generation brief.
///
/// The anchor date is fixed when the compiler is built, so the same context
/// always compiles to the same request.
#[derive(Debug, Clone)]
pub struct ContextCompiler {
    anchor: NaiveDate,
}

impl Default for ContextCompiler {
    fn default() -> Self {
        Self::new()
    }
}

impl ContextCompiler {
    pub fn new() -> Self {
        Self {
            anchor: Utc::now().date_naive(),
        }
    }

    pub fn with_anchor(anchor: NaiveDate) -> Self {
        Self { anchor }
    }

    pub fn anchor(&self) -> NaiveDate {
        self.anchor
    }

    pub fn compile(&self, context: &TripContext) -> Result<CompiledRequest> {
        let params = self.normalize(context)?;
        let brief = generate_trip_brief(&params);
        Ok(CompiledRequest {
            params,
            system: system_instruction().to_string(),
            brief,
        })
    }

    pub fn normalize(&self, context: &TripContext) -> Result<TripParameters> {
        let mood_slug = non_blank(context.mood.as_deref()).map(str::to_string);
        let mood = mood_slug
            .as_deref()
            .map(humanize_mood)
            .filter(|mood| !mood.is_empty())
            .unwrap_or_else(|| "Flexible".to_string());

        let currency = non_blank(context.currency.as_deref())
            .and_then(Currency::lookup)
            .unwrap_or(Currency::FALLBACK);

        let origin = match non_blank(context.location.as_deref()) {
            Some(location) => Origin::Named(location.to_string()),
            None => Origin::Anywhere,
        };

        Ok(TripParameters {
            mood,
            mood_slug,
            currency,
            budget: normalize_budget(context.budget)?,
            timeframe: normalize_timeframe(context.timeframe.as_ref())?,
            origin,
            departure_date: parse_departure(context.departure_date.as_deref())?,
            anchor: self.anchor,
        })
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

/// "relax-and-recharge" -> "Relax and recharge"
pub fn humanize_mood(slug: &str) -> String {
    let words: Vec<String> = slug
        .split(|c: char| c == '-' || c == '_' || c.is_whitespace())
        .filter(|word| !word.is_empty())
        .map(str::to_lowercase)
        .collect();

    let mut mood = words.join(" ");
    if let Some(first) = mood.chars().next() {
        let upper: String = first.to_uppercase().collect();
        mood.replace_range(..first.len_utf8(), &upper);
    }
    mood
}

fn normalize_budget(budget: Option<f64>) -> Result<BudgetTier> {
    match budget {
        None => Ok(BudgetTier::Moderate),
        Some(amount) if !amount.is_finite() => {
            Err(TripError::Config("budget must be a finite number".into()))
        }
        Some(amount) if amount < 0.0 => {
            Err(TripError::Config("budget must be non-negative".into()))
        }
        Some(amount) if amount == 0.0 => Ok(BudgetTier::Moderate),
        Some(amount) => Ok(BudgetTier::Amount(amount)),
    }
}

fn days_from_number(days: f64) -> Result<Option<DaySpan>> {
    if !days.is_finite() {
        return Err(TripError::Config("timeframe must be a finite number".into()));
    }
    if days < 0.0 {
        return Err(TripError::Config("timeframe must be non-negative".into()));
    }
    if days == 0.0 {
        return Ok(None);
    }
    Ok(Some(DaySpan::Exact(days.ceil().min(u32::MAX as f64) as u32)))
}

fn normalize_timeframe(timeframe: Option<&TimeframeInput>) -> Result<DaySpan> {
    let span = match timeframe {
        None => None,
        Some(TimeframeInput::Days(days)) => days_from_number(*days)?,
        Some(TimeframeInput::Text(text)) => parse_timeframe_text(text)?,
    };
    Ok(span.unwrap_or_else(DaySpan::default_range))
}

fn parse_timeframe_text(text: &str) -> Result<Option<DaySpan>> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    if let Ok(days) = trimmed.parse::<f64>() {
        return days_from_number(days);
    }

    let lower = trimmed.to_lowercase();
    if let Some(span) = leading_count(&lower) {
        return Ok(Some(span));
    }

    let range = |min, max| DaySpan::Range {
        min,
        max,
        label: Some(trimmed.to_string()),
        recognized: true,
    };
    let span = if lower.contains("long weekend") {
        range(3, 4)
    } else if lower.contains("weekend") {
        range(2, 3)
    } else if lower.contains("fortnight") || lower.contains("two weeks") {
        range(12, 16)
    } else if lower.contains("week") {
        range(5, 7)
    } else if lower.contains("month") {
        range(25, 30)
    } else {
        DaySpan::Range {
            min: DaySpan::DEFAULT.0,
            max: DaySpan::DEFAULT.1,
            label: Some(trimmed.to_string()),
            recognized: false,
        }
    };
    Ok(Some(span))
}

/// "10 days", "10-day", "3 weeks"
fn leading_count(lower: &str) -> Option<DaySpan> {
    let digits: String = lower.chars().take_while(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return None;
    }
    let count: u32 = digits.parse().ok()?;
    let unit = lower[digits.len()..].trim_start_matches([' ', '-']);
    if count == 0 {
        return None;
    }
    if unit.starts_with("day") || unit.starts_with("night") {
        Some(DaySpan::Exact(count))
    } else if unit.starts_with("week") {
        Some(DaySpan::Exact(count.saturating_mul(7)))
    } else {
        None
    }
}

fn parse_departure(raw: Option<&str>) -> Result<Option<NaiveDate>> {
    let Some(raw) = non_blank(raw) else {
        return Ok(None);
    };
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Ok(Some(date));
    }
    DateTime::parse_from_rfc3339(raw)
        .map(|datetime| Some(datetime.date_naive()))
        .map_err(|_| {
            TripError::Config(format!(
                "departureDate `{raw}` is not a YYYY-MM-DD date or ISO 8601 datetime"
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compiler() -> ContextCompiler {
        ContextCompiler::with_anchor(NaiveDate::from_ymd_opt(2025, 3, 1).unwrap())
    }

    #[test]
    fn test_empty_context_uses_every_fallback() {
        let params = compiler().normalize(&TripContext::default()).unwrap();
        assert_eq!(params.mood, "Flexible");
        assert_eq!(params.mood_slug, None);
        assert_eq!(params.currency, Currency::FALLBACK);
        assert_eq!(params.currency.symbol, "$");
        assert_eq!(params.budget, BudgetTier::Moderate);
        assert_eq!(params.timeframe.bounds(), (5, 7));
        assert_eq!(params.origin, Origin::Anywhere);
        assert_eq!(params.departure_date, None);
    }

    #[test]
    fn test_mood_slug_is_humanized() {
        assert_eq!(humanize_mood("relax-and-recharge"), "Relax and recharge");
        assert_eq!(humanize_mood("FOODIE-Adventure"), "Foodie adventure");
        assert_eq!(humanize_mood("thrill_seeker"), "Thrill seeker");
        assert_eq!(humanize_mood("---"), "");

        let params = compiler()
            .normalize(&TripContext::new().with_mood("---"))
            .unwrap();
        assert_eq!(params.mood, "Flexible");
    }

    #[test]
    fn test_currency_code_symbol_and_unknown() {
        assert_eq!(Currency::lookup("eur").unwrap().symbol, "€");
        assert_eq!(Currency::lookup("₦").unwrap().code, "NGN");
        assert!(Currency::lookup("XYZ").is_none());

        let params = compiler()
            .normalize(&TripContext::new().with_currency("XYZ"))
            .unwrap();
        assert_eq!(params.currency, Currency::FALLBACK);
    }

    #[test]
    fn test_zero_means_unset_and_negative_is_rejected() {
        let params = compiler()
            .normalize(&TripContext::new().with_budget(0.0).with_timeframe_days(0.0))
            .unwrap();
        assert_eq!(params.budget, BudgetTier::Moderate);
        assert_eq!(params.timeframe.bounds(), (5, 7));

        let err = compiler()
            .compile(&TripContext::new().with_budget(-10.0))
            .unwrap_err();
        assert_eq!(err.error_code(), "CONFIG_ERROR");

        let err = compiler()
            .compile(&TripContext::new().with_timeframe_days(-3.0))
            .unwrap_err();
        assert!(err.to_string().contains("non-negative"));
    }

    #[test]
    fn test_timeframe_text() {
        let span = |text: &str| normalize_timeframe(Some(&TimeframeInput::Text(text.into()))).unwrap();
        assert_eq!(span("weekend").bounds(), (2, 3));
        assert_eq!(span("a long weekend").bounds(), (3, 4));
        assert_eq!(span("One week").bounds(), (5, 7));
        assert_eq!(span("two weeks").bounds(), (12, 16));
        assert_eq!(span("a fortnight").bounds(), (12, 16));
        assert_eq!(span("a month").bounds(), (25, 30));
        assert_eq!(span("10 days"), DaySpan::Exact(10));
        assert_eq!(span("10-day"), DaySpan::Exact(10));
        assert_eq!(span("3 weeks"), DaySpan::Exact(21));
        assert_eq!(span("4"), DaySpan::Exact(4));
        assert!(matches!(
            span("whenever"),
            DaySpan::Range { min: 5, max: 7, recognized: false, .. }
        ));
    }

    #[test]
    fn test_departure_date_parsing() {
        let params = compiler()
            .normalize(&TripContext::new().with_departure_date("2025-04-10T09:00:00+01:00"))
            .unwrap();
        assert_eq!(
            params.departure_date,
            NaiveDate::from_ymd_opt(2025, 4, 10)
        );

        let err = compiler()
            .compile(&TripContext::new().with_departure_date("next friday"))
            .unwrap_err();
        assert_eq!(err.error_code(), "CONFIG_ERROR");
    }

    #[test]
    fn test_compilation_is_idempotent() {
        let context = TripContext::new()
            .with_mood("culture-explorer")
            .with_timeframe_text("weekend")
            .with_currency("GBP");
        let compiler = compiler();
        assert_eq!(
            compiler.compile(&context).unwrap(),
            compiler.compile(&context).unwrap()
        );
    }
}

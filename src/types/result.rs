use super::{partial::PartialTripPlan, trip_types::TripPlan};
use crate::error::TripError;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;

/// Which consistency check produced a violation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckKind {
    Schema,
    DateOrder,
    DayCount,
    BudgetSum,
    Range,
}

impl CheckKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckKind::Schema => "schema",
            CheckKind::DateOrder => "date_order",
            CheckKind::DayCount => "day_count",
            CheckKind::BudgetSum => "budget_sum",
            CheckKind::Range => "range",
        }
    }
}

/// A single failed check, located by JSON pointer into the plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    pub kind: CheckKind,
    pub path: String,
    pub message: String,
}

impl Violation {
    pub fn new(kind: CheckKind, path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.kind.as_str(), self.path, self.message)
    }
}

/// Verdict attached to a plan that passed the schema check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanStatus {
    /// Every invariant holds.
    Complete,
    /// Shape is valid but some invariant does not hold; shown with a warning.
    Degraded,
}

impl PlanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanStatus::Complete => "complete",
            PlanStatus::Degraded => "degraded",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "complete" => Some(PlanStatus::Complete),
            "degraded" => Some(PlanStatus::Degraded),
            _ => None,
        }
    }
}

impl fmt::Display for PlanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A complete plan together with the guard's verdict.
///
/// Only the consistency guard constructs this, so a degraded plan can never
/// be handed to persistence labelled as complete.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckedPlan {
    plan: TripPlan,
    status: PlanStatus,
    warnings: Vec<Violation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    mood_slug: Option<String>,
}

impl CheckedPlan {
    pub(crate) fn new(plan: TripPlan, warnings: Vec<Violation>) -> Self {
        let status = if warnings.is_empty() {
            PlanStatus::Complete
        } else {
            PlanStatus::Degraded
        };
        Self {
            plan,
            status,
            warnings,
            mood_slug: None,
        }
    }

    /// Attach the slug of the mood the plan was generated for.
    pub(crate) fn with_mood_slug(mut self, mood_slug: Option<String>) -> Self {
        self.mood_slug = mood_slug;
        self
    }

    /// Mood slug from the request (`culture-explorer`), when one was given.
    pub fn mood_slug(&self) -> Option<&str> {
        self.mood_slug.as_deref()
    }

    pub fn plan(&self) -> &TripPlan {
        &self.plan
    }

    pub fn status(&self) -> PlanStatus {
        self.status
    }

    pub fn warnings(&self) -> &[Violation] {
        &self.warnings
    }

    pub fn is_degraded(&self) -> bool {
        self.status == PlanStatus::Degraded
    }

    pub fn into_plan(self) -> TripPlan {
        self.plan
    }

    /// Human-readable verdict, one line per warning
    pub fn summary(&self) -> String {
        let mut lines = vec![format!(
            "{} ({}): {}",
            self.plan.title, self.plan.id, self.status
        )];
        for warning in &self.warnings {
            lines.push(format!("  - {warning}"));
        }
        lines.join("\n")
    }
}

/// One emission of a generation stream.
///
/// A stream carries zero or more `Partial` events followed by exactly one
/// terminal `Complete` or `Failed`.
#[derive(Debug)]
pub enum GenerationEvent {
    Partial(PartialTripPlan),
    Complete(CheckedPlan),
    Failed(TripError),
}

impl GenerationEvent {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, GenerationEvent::Partial(_))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            GenerationEvent::Partial(_) => "partial",
            GenerationEvent::Complete(_) => "complete",
            GenerationEvent::Failed(_) => "failed",
        }
    }

    /// JSON document for the line-delimited response stream
    pub fn to_wire(&self) -> Value {
        match self {
            GenerationEvent::Partial(plan) => json!({
                "type": "partial",
                "plan": plan,
            }),
            GenerationEvent::Complete(checked) => json!({
                "type": "complete",
                "status": checked.status(),
                "plan": checked.plan(),
                "warnings": checked.warnings(),
            }),
            GenerationEvent::Failed(error) => {
                let mut payload = error.to_error_payload();
                payload["type"] = json!("failed");
                payload
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::partial::PartialTripPlan;

    #[test]
    fn test_violation_display() {
        let violation = Violation::new(CheckKind::BudgetSum, "/budget/total", "3960 != 3970");
        assert_eq!(
            violation.to_string(),
            "[budget_sum] /budget/total: 3960 != 3970"
        );
    }

    #[test]
    fn test_partial_wire_form() {
        let event = GenerationEvent::Partial(PartialTripPlan {
            title: Some("Kyoto".into()),
            ..Default::default()
        });
        let wire = event.to_wire();
        assert_eq!(wire["type"], "partial");
        assert_eq!(wire["plan"]["title"], "Kyoto");
        assert!(!event.is_terminal());
    }

    #[test]
    fn test_failed_wire_form() {
        let event = GenerationEvent::Failed(TripError::Timeout(30));
        let wire = event.to_wire();
        assert_eq!(wire["type"], "failed");
        assert_eq!(wire["error"]["code"], "GENERATION_TIMEOUT");
        assert_eq!(wire["error"]["retryable"], true);
        assert!(event.is_terminal());
    }

    #[test]
    fn test_plan_status_parse() {
        assert_eq!(PlanStatus::parse("degraded"), Some(PlanStatus::Degraded));
        assert_eq!(PlanStatus::parse("booked"), None);
        assert_eq!(
            serde_json::to_value(PlanStatus::Complete).unwrap(),
            "complete"
        );
    }
}

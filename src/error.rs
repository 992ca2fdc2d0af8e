use crate::types::result::Violation;
use thiserror::Error;

/// Main error type for trip generation, validation and persistence
#[derive(Error, Debug)]
pub enum TripError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Generation timed out after {0}s")]
    Timeout(u64),

    #[error("Generation stream error: {0}")]
    Stream(String),

    #[error("Schema violation: {message}")]
    SchemaViolation {
        message: String,
        violations: Vec<Violation>,
    },

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Precondition failed: {0}")]
    Precondition(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Rate limit exceeded: retry after {retry_after}s")]
    RateLimit { retry_after: u64 },

    #[error("Generation was superseded or cancelled")]
    Cancelled,
}

/// Result type alias
pub type Result<T> = std::result::Result<T, TripError>;

impl TripError {
    /// Whether the user should be offered a manual "try again".
    ///
    /// Nothing in the crate retries on its own; this only drives the UI.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TripError::Timeout(_)
                | TripError::Stream(_)
                | TripError::SchemaViolation { .. }
                | TripError::RateLimit { .. }
                | TripError::Persistence(_)
        )
    }

    /// Get the error code for structured responses
    pub fn error_code(&self) -> &'static str {
        match self {
            TripError::Config(_) => "CONFIG_ERROR",
            TripError::Timeout(_) => "GENERATION_TIMEOUT",
            TripError::Stream(_) => "STREAM_ERROR",
            TripError::SchemaViolation { .. } => "SCHEMA_VIOLATION",
            TripError::Persistence(_) => "PERSISTENCE_ERROR",
            TripError::Precondition(_) => "PRECONDITION_FAILED",
            TripError::Serialization(_) => "SERIALIZATION_ERROR",
            TripError::RateLimit { .. } => "RATE_LIMIT_ERROR",
            TripError::Cancelled => "CANCELLED",
        }
    }

    /// Short text shown to the traveller
    pub fn user_message(&self) -> String {
        match self {
            TripError::Timeout(_) | TripError::Stream(_) | TripError::RateLimit { .. } => {
                "Failed to generate trip. Try again?".to_string()
            }
            TripError::SchemaViolation { .. } => {
                "The generated trip was incomplete. Try again?".to_string()
            }
            TripError::Persistence(message) | TripError::Precondition(message) => message.clone(),
            TripError::Config(message) => format!("Invalid trip preferences: {message}"),
            TripError::Serialization(_) => "Something went wrong reading the trip.".to_string(),
            TripError::Cancelled => "Generation cancelled.".to_string(),
        }
    }

    /// Violations attached to a schema failure, empty for every other error
    pub fn violations(&self) -> &[Violation] {
        match self {
            TripError::SchemaViolation { violations, .. } => violations,
            _ => &[],
        }
    }

    /// Convert to a structured error payload
    pub fn to_error_payload(&self) -> serde_json::Value {
        let mut payload = serde_json::json!({
            "error": {
                "code": self.error_code(),
                "message": self.to_string(),
                "retryable": self.is_retryable()
            }
        });

        if let TripError::SchemaViolation { violations, .. } = self {
            payload["error"]["violations"] =
                serde_json::to_value(violations).unwrap_or(serde_json::Value::Null);
        }

        payload
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::result::CheckKind;

    #[test]
    fn test_error_codes_are_stable() {
        assert_eq!(TripError::Timeout(30).error_code(), "GENERATION_TIMEOUT");
        assert_eq!(
            TripError::Stream("closed".into()).error_code(),
            "STREAM_ERROR"
        );
        assert_eq!(
            TripError::Precondition("x".into()).error_code(),
            "PRECONDITION_FAILED"
        );
    }

    #[test]
    fn test_retry_offered_for_generation_failures_only() {
        assert!(TripError::Timeout(30).is_retryable());
        assert!(TripError::Stream("eof".into()).is_retryable());
        assert!(!TripError::Config("bad".into()).is_retryable());
        assert!(!TripError::Precondition("dup".into()).is_retryable());
        assert!(!TripError::Cancelled.is_retryable());
    }

    #[test]
    fn test_schema_violation_payload_lists_violations() {
        let error = TripError::SchemaViolation {
            message: "1 schema error".into(),
            violations: vec![Violation::new(
                CheckKind::Schema,
                "/budget/total",
                "\"12\" is not of type \"number\"",
            )],
        };

        let payload = error.to_error_payload();
        assert_eq!(payload["error"]["code"], "SCHEMA_VIOLATION");
        assert_eq!(payload["error"]["retryable"], true);
        assert_eq!(payload["error"]["violations"][0]["path"], "/budget/total");
    }
}

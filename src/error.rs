use thiserror::Error;

/// Main error type for the monitoring service
#[derive(Error, Debug)]
pub enum CareError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    // Serialization errors
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Message/payload errors
    #[error("Missing required field: {field} in {context}")]
    MissingField { field: String, context: String },

    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("Invalid time of day: {0}")]
    InvalidTimeOfDay(String),

    // Data availability errors
    #[error("No data available for user: {user_id}")]
    NoData { user_id: String },

    #[error("User not found: {0}")]
    UserNotFound(String),

    // Collaborator errors
    #[error("Agent unavailable: {0}")]
    AgentUnavailable(&'static str),

    // Alert errors
    #[error("Alert not found: {alert_id} for user {user_id}")]
    AlertNotFound { user_id: String, alert_id: String },

    // Emergency errors
    #[error("No active emergency for user: {0}")]
    NoActiveEmergency(String),

    #[error("Emergency id {given} does not match active emergency {active}")]
    EmergencyMismatch { given: String, active: String },

    // Validation errors
    #[error("Validation failed: {0}")]
    Validation(String),

    // Store errors
    #[error("Unknown table: {0}")]
    UnknownTable(String),

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

/// Result type alias for CareError
pub type Result<T> = std::result::Result<T, CareError>;

impl CareError {
    /// Soft-error helper for a missing payload field.
    pub fn missing(field: &str, context: &str) -> Self {
        CareError::MissingField {
            field: field.to_string(),
            context: context.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CareError::missing("user_id", "incoming data");
        assert_eq!(
            err.to_string(),
            "Missing required field: user_id in incoming data"
        );

        let err = CareError::NoActiveEmergency("U1000".to_string());
        assert_eq!(err.to_string(), "No active emergency for user: U1000");
    }
}

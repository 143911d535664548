//! Alerts raised by domain agents
//!
//! Alerts flow agent -> coordinator and are merged into the per-user context
//! deduplicated by value equality. Resolution is by id.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Alert severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    /// Informational - log only
    Info,
    /// Warning - surfaced to caregivers
    Warning,
    /// Urgent - candidate for emergency escalation
    Urgent,
}

impl AlertLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertLevel::Info => "info",
            AlertLevel::Warning => "warning",
            AlertLevel::Urgent => "urgent",
        }
    }
}

impl std::fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What an alert is about. Closed set; every producer names its kind here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    HeartRateLow,
    HeartRateHigh,
    SystolicLow,
    SystolicHigh,
    DiastolicLow,
    DiastolicHigh,
    GlucoseLow,
    GlucoseHigh,
    OxygenLow,
    FallDetected,
    UnusualActivity,
    ExcessiveInactivity,
    InactivityPattern,
    LimitedWalking,
    LimitedMobility,
    ReminderOverdue,
    SocialIsolation,
    LowInteractionFrequency,
}

impl AlertKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertKind::HeartRateLow => "heart_rate_low",
            AlertKind::HeartRateHigh => "heart_rate_high",
            AlertKind::SystolicLow => "blood_pressure_systolic_low",
            AlertKind::SystolicHigh => "blood_pressure_systolic_high",
            AlertKind::DiastolicLow => "blood_pressure_diastolic_low",
            AlertKind::DiastolicHigh => "blood_pressure_diastolic_high",
            AlertKind::GlucoseLow => "glucose_low",
            AlertKind::GlucoseHigh => "glucose_high",
            AlertKind::OxygenLow => "oxygen_low",
            AlertKind::FallDetected => "fall_detected",
            AlertKind::UnusualActivity => "unusual_activity",
            AlertKind::ExcessiveInactivity => "excessive_inactivity",
            AlertKind::InactivityPattern => "excessive_inactivity_pattern",
            AlertKind::LimitedWalking => "limited_walking",
            AlertKind::LimitedMobility => "limited_mobility",
            AlertKind::ReminderOverdue => "reminder_overdue",
            AlertKind::SocialIsolation => "social_isolation",
            AlertKind::LowInteractionFrequency => "low_interaction_frequency",
        }
    }

    /// Whether this alert kind names a health metric. Used when mapping an
    /// urgent alert to an emergency kind.
    pub fn is_health_metric(&self) -> bool {
        matches!(
            self,
            AlertKind::HeartRateLow
                | AlertKind::HeartRateHigh
                | AlertKind::SystolicLow
                | AlertKind::SystolicHigh
                | AlertKind::DiastolicLow
                | AlertKind::DiastolicHigh
                | AlertKind::GlucoseLow
                | AlertKind::GlucoseHigh
                | AlertKind::OxygenLow
        )
    }
}

impl std::fmt::Display for AlertKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Alert payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub level: AlertLevel,
    pub kind: AlertKind,
    pub message: String,
    /// Domain-specific fields (value/threshold, location, delay, ...)
    #[serde(default)]
    pub details: serde_json::Value,
}

impl Alert {
    /// Create a new alert stamped now
    pub fn new(level: AlertLevel, kind: AlertKind, message: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            level,
            kind,
            message: message.into(),
            details: serde_json::Value::Null,
        }
    }

    /// Attach domain-specific detail fields
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }
}

/// Two-tier severity rule shared by the health metrics: a breach of the
/// normal band is a warning, a breach past the urgent bound is urgent.
/// Returns None while the value stays inside [min, max].
pub fn threshold_severity(
    value: f64,
    min: f64,
    max: f64,
    urgent_min: Option<f64>,
    urgent_max: Option<f64>,
) -> Option<AlertLevel> {
    if value < min {
        if let Some(umin) = urgent_min {
            if value <= umin {
                return Some(AlertLevel::Urgent);
            }
        }
        return Some(AlertLevel::Warning);
    }
    if value > max {
        if let Some(umax) = urgent_max {
            if value >= umax {
                return Some(AlertLevel::Urgent);
            }
        }
        return Some(AlertLevel::Warning);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_ordering() {
        assert!(AlertLevel::Urgent > AlertLevel::Warning);
        assert!(AlertLevel::Warning > AlertLevel::Info);
    }

    #[test]
    fn test_threshold_severity_table() {
        // In range
        assert_eq!(threshold_severity(80.0, 60.0, 100.0, None, None), None);
        // Plain breach
        assert_eq!(
            threshold_severity(110.0, 60.0, 100.0, None, None),
            Some(AlertLevel::Warning)
        );
        // Systolic at the urgent bound
        assert_eq!(
            threshold_severity(160.0, 90.0, 140.0, None, Some(160.0)),
            Some(AlertLevel::Urgent)
        );
        // Just below the urgent bound stays a warning
        assert_eq!(
            threshold_severity(159.0, 90.0, 140.0, None, Some(160.0)),
            Some(AlertLevel::Warning)
        );
        // Oxygen below 92 is urgent
        assert_eq!(
            threshold_severity(91.0, 95.0, 100.0, Some(92.0), None),
            Some(AlertLevel::Urgent)
        );
        assert_eq!(
            threshold_severity(93.0, 95.0, 100.0, Some(92.0), None),
            Some(AlertLevel::Warning)
        );
    }

    #[test]
    fn test_same_alert_value_compares_equal() {
        let alert = Alert::new(AlertLevel::Warning, AlertKind::GlucoseHigh, "too high");
        let copy = alert.clone();
        assert_eq!(alert, copy);
    }
}

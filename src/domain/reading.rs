//! Inbound readings and the routing envelope
//!
//! External callers send `{ "type": ..., "user_id": ..., "data": {...} }`.
//! The payload is a closed tagged union, so routing is an exhaustive match
//! and there is no "unknown message type" path past deserialization.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::reminder::{NewReminder, ReminderId};

/// One vitals sample from a wearable or bedside device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReading {
    pub timestamp: DateTime<Utc>,
    pub heart_rate: f64,
    pub systolic: f64,
    pub diastolic: f64,
    pub glucose: f64,
    pub oxygen: f64,
}

/// Impact force reported with a fall
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ImpactForce {
    Low,
    #[default]
    Medium,
    High,
}

impl ImpactForce {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImpactForce::Low => "low",
            ImpactForce::Medium => "medium",
            ImpactForce::High => "high",
        }
    }
}

impl std::fmt::Display for ImpactForce {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One movement/location sample from the in-home sensors
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SafetyReading {
    pub timestamp: DateTime<Utc>,
    pub location: String,
    /// e.g. "Walking", "Sitting", "No Movement"
    pub activity: String,
    #[serde(default)]
    pub fall_detected: bool,
    #[serde(default)]
    pub impact_force: ImpactForce,
    #[serde(default)]
    pub post_fall_inactivity_secs: u64,
}

/// Reminder interaction from the companion device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReminderEvent {
    pub timestamp: DateTime<Utc>,
    /// Reminder being acknowledged, if any
    #[serde(default)]
    pub acknowledge: Option<ReminderId>,
    /// New reminder to schedule, if any
    #[serde(default)]
    pub new_reminder: Option<NewReminder>,
}

/// Kinds of social interaction, weighted by how engaging they are
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionKind {
    InPersonVisit,
    VideoCall,
    PhoneCall,
    TextMessage,
    Email,
    GroupActivity,
    CommunityEvent,
}

impl InteractionKind {
    /// Engagement weight applied to the interaction's duration
    pub fn weight(&self) -> f64 {
        match self {
            InteractionKind::InPersonVisit => 1.0,
            InteractionKind::VideoCall => 0.8,
            InteractionKind::PhoneCall => 0.6,
            InteractionKind::TextMessage => 0.3,
            InteractionKind::Email => 0.3,
            InteractionKind::GroupActivity => 0.9,
            InteractionKind::CommunityEvent => 0.7,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            InteractionKind::InPersonVisit => "in_person_visit",
            InteractionKind::VideoCall => "video_call",
            InteractionKind::PhoneCall => "phone_call",
            InteractionKind::TextMessage => "text_message",
            InteractionKind::Email => "email",
            InteractionKind::GroupActivity => "group_activity",
            InteractionKind::CommunityEvent => "community_event",
        }
    }
}

/// One recorded social interaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SocialEvent {
    pub timestamp: DateTime<Utc>,
    pub kind: InteractionKind,
    pub duration_minutes: u32,
    /// e.g. "family", "friend", "caregiver", "neighbor"
    pub contact_kind: String,
    #[serde(default)]
    pub initiated_by_user: bool,
}

/// The closed union of everything the coordinator can route
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum Reading {
    Health(HealthReading),
    Safety(SafetyReading),
    Reminder(ReminderEvent),
    Social(SocialEvent),
}

impl Reading {
    /// Name of the domain this reading belongs to
    pub fn domain(&self) -> &'static str {
        match self {
            Reading::Health(_) => "health",
            Reading::Safety(_) => "safety",
            Reading::Reminder(_) => "reminder",
            Reading::Social(_) => "social",
        }
    }
}

/// Inbound message shape: `{ type, user_id, data }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub user_id: String,
    #[serde(flatten)]
    pub reading: Reading,
}

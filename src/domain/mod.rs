//! Core domain types shared by the agents and the coordinator

pub mod alert;
pub mod emergency;
pub mod history;
pub mod reading;
pub mod reminder;
pub mod status;

pub use alert::{threshold_severity, Alert, AlertKind, AlertLevel};
pub use emergency::{
    Emergency, EmergencyContact, EmergencyKind, EscalationLevel, NotifyScope, Resolution,
};
pub use history::BoundedHistory;
pub use reading::{
    Envelope, HealthReading, ImpactForce, InteractionKind, Reading, ReminderEvent, SafetyReading,
    SocialEvent,
};
pub use reminder::{
    NewReminder, Recommendation, RecommendationKind, RecommendationPriority, Reminder, ReminderId,
};
pub use status::{DomainStatus, OverallStatus};

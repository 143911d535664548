//! Emergency records, escalation levels, and contacts

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What kind of emergency is active
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmergencyKind {
    Fall,
    Health,
    Safety,
}

impl EmergencyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmergencyKind::Fall => "fall",
            EmergencyKind::Health => "health",
            EmergencyKind::Safety => "safety",
        }
    }
}

impl std::fmt::Display for EmergencyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How far an unresolved emergency has progressed through the notification
/// chain. Level 1 notifies the companion app, level 2 the caregivers, level 3
/// the (simulated) emergency services.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum EscalationLevel {
    NotifyApp,
    NotifyCaregivers,
    NotifyServices,
}

impl EscalationLevel {
    pub fn as_number(&self) -> u8 {
        match self {
            EscalationLevel::NotifyApp => 1,
            EscalationLevel::NotifyCaregivers => 2,
            EscalationLevel::NotifyServices => 3,
        }
    }

    /// Next level up, or None at the top
    pub fn next(&self) -> Option<EscalationLevel> {
        match self {
            EscalationLevel::NotifyApp => Some(EscalationLevel::NotifyCaregivers),
            EscalationLevel::NotifyCaregivers => Some(EscalationLevel::NotifyServices),
            EscalationLevel::NotifyServices => None,
        }
    }
}

impl std::fmt::Display for EscalationLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "level {}", self.as_number())
    }
}

/// How an emergency ended
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    pub details: String,
    pub time: DateTime<Utc>,
}

/// An emergency for a user. At most one is active per user at a time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Emergency {
    pub id: Uuid,
    pub user_id: String,
    pub kind: EmergencyKind,
    pub details: serde_json::Value,
    pub location: String,
    pub created_at: DateTime<Utc>,
    pub last_escalation: DateTime<Utc>,
    pub level: EscalationLevel,
    pub resolved: bool,
    #[serde(default)]
    pub resolution: Option<Resolution>,
}

impl Emergency {
    /// Create a fresh emergency at level 1
    pub fn new(
        user_id: impl Into<String>,
        kind: EmergencyKind,
        details: serde_json::Value,
        location: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            kind,
            details,
            location: location.into(),
            created_at: now,
            last_escalation: now,
            level: EscalationLevel::NotifyApp,
            resolved: false,
            resolution: None,
        }
    }

    /// Mark resolved with the given reason
    pub fn resolve(&mut self, details: impl Into<String>) {
        self.resolved = true;
        self.resolution = Some(Resolution {
            details: details.into(),
            time: Utc::now(),
        });
    }
}

/// Which emergencies a contact wants to hear about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotifyScope {
    All,
    Fall,
    Health,
    Safety,
}

impl NotifyScope {
    pub fn matches(&self, kind: EmergencyKind) -> bool {
        match self {
            NotifyScope::All => true,
            NotifyScope::Fall => kind == EmergencyKind::Fall,
            NotifyScope::Health => kind == EmergencyKind::Health,
            NotifyScope::Safety => kind == EmergencyKind::Safety,
        }
    }
}

/// Static per-user emergency contact. Lower priority is contacted first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmergencyContact {
    pub name: String,
    pub relationship: String,
    pub phone: String,
    #[serde(default)]
    pub email: String,
    #[serde(default = "default_contact_priority")]
    pub priority: u32,
    #[serde(default = "default_notify_for")]
    pub notify_for: Vec<NotifyScope>,
}

fn default_contact_priority() -> u32 {
    999
}

fn default_notify_for() -> Vec<NotifyScope> {
    vec![NotifyScope::All]
}

impl EmergencyContact {
    /// Whether this contact should be notified for the given emergency kind
    pub fn wants(&self, kind: EmergencyKind) -> bool {
        self.notify_for.iter().any(|scope| scope.matches(kind))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_progression() {
        assert_eq!(
            EscalationLevel::NotifyApp.next(),
            Some(EscalationLevel::NotifyCaregivers)
        );
        assert_eq!(
            EscalationLevel::NotifyCaregivers.next(),
            Some(EscalationLevel::NotifyServices)
        );
        assert_eq!(EscalationLevel::NotifyServices.next(), None);
        assert_eq!(EscalationLevel::NotifyServices.as_number(), 3);
    }

    #[test]
    fn test_notify_scope_matching() {
        let contact = EmergencyContact {
            name: "Jane Smith".to_string(),
            relationship: "Daughter".to_string(),
            phone: "555-1234".to_string(),
            email: String::new(),
            priority: 1,
            notify_for: vec![NotifyScope::Health, NotifyScope::Fall],
        };
        assert!(contact.wants(EmergencyKind::Fall));
        assert!(contact.wants(EmergencyKind::Health));
        assert!(!contact.wants(EmergencyKind::Safety));
    }

    #[test]
    fn test_resolution() {
        let mut emergency = Emergency::new(
            "U1000",
            EmergencyKind::Fall,
            serde_json::json!({"impact_force": "high"}),
            "Bathroom",
        );
        assert!(!emergency.resolved);
        emergency.resolve("Caregiver confirmed user is safe");
        assert!(emergency.resolved);
        assert!(emergency.resolution.is_some());
    }
}

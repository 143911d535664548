//! Reminders managed by the daily assistant

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable opaque reminder id, assigned at creation. Acknowledgments refer to
/// this id, so reordering or eviction of history never invalidates them.
pub type ReminderId = Uuid;

/// A scheduled reminder for a user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reminder {
    pub id: ReminderId,
    pub user_id: String,
    /// e.g. "Medication", "Hydration", "Exercise", "Appointment"
    pub kind: String,
    pub content: String,
    pub scheduled_time: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub sent: bool,
    #[serde(default)]
    pub sent_at: Option<DateTime<Utc>>,
    pub acknowledged: bool,
}

impl Reminder {
    pub fn new(
        user_id: impl Into<String>,
        kind: impl Into<String>,
        content: impl Into<String>,
        scheduled_time: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            kind: kind.into(),
            content: content.into(),
            scheduled_time,
            created_at: Utc::now(),
            sent: false,
            sent_at: None,
            acknowledged: false,
        }
    }

    /// Whether this reminder is due at `now`
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        !self.sent && self.scheduled_time <= now
    }
}

/// Request to schedule a new reminder, as sent by external callers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewReminder {
    pub kind: String,
    pub content: String,
    pub scheduled_time: DateTime<Utc>,
}

/// A recommendation surfaced by the daily assistant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub kind: RecommendationKind,
    pub message: String,
    pub priority: RecommendationPriority,
    #[serde(default)]
    pub reminder_kind: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationKind {
    /// Change how reminders are delivered
    AdjustDelivery,
    /// Move reminders of a kind to a better time
    AdjustTiming,
    /// Schedule more reminders of a kind
    AddReminders,
    /// Suggest a social activity
    SuggestActivity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecommendationPriority {
    Low,
    Medium,
    High,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_due_check() {
        let now = Utc::now();
        let mut reminder = Reminder::new("U1000", "Medication", "Take your vitamin", now);
        assert!(reminder.is_due(now + Duration::seconds(1)));
        assert!(!reminder.is_due(now - Duration::seconds(1)));

        reminder.sent = true;
        assert!(!reminder.is_due(now + Duration::seconds(1)));
    }

    #[test]
    fn test_ids_are_stable_and_distinct() {
        let now = Utc::now();
        let a = Reminder::new("U1000", "Hydration", "Drink water", now);
        let b = Reminder::new("U1000", "Hydration", "Drink water", now);
        assert_ne!(a.id, b.id);
    }
}

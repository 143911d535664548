//! Per-user aggregate context owned by the coordinator

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{Alert, DomainStatus, EmergencyKind, OverallStatus, Recommendation};

/// Aggregate view of one user across every monitoring domain. Created on
/// first sighting of a user id and mutated on every routed message; never
/// explicitly destroyed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserContext {
    pub user_id: String,
    pub last_update: DateTime<Utc>,
    pub health_status: DomainStatus,
    pub safety_status: DomainStatus,
    pub reminder_status: DomainStatus,
    pub social_status: DomainStatus,
    /// Kind of the active emergency, if any ("none" when absent)
    pub emergency: Option<EmergencyKind>,
    pub current_location: String,
    pub current_activity: String,
    /// Deduplicated by value equality; resolution removes by id
    pub alerts: Vec<Alert>,
    pub recommendations: Vec<Recommendation>,
    pub overall: OverallStatus,
}

impl UserContext {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            last_update: Utc::now(),
            health_status: DomainStatus::Unknown,
            safety_status: DomainStatus::Unknown,
            reminder_status: DomainStatus::Unknown,
            social_status: DomainStatus::Unknown,
            emergency: None,
            current_location: "unknown".to_string(),
            current_activity: "unknown".to_string(),
            alerts: Vec::new(),
            recommendations: Vec::new(),
            overall: OverallStatus::Unknown,
        }
    }

    pub fn domain_statuses(&self) -> [DomainStatus; 4] {
        [
            self.health_status,
            self.safety_status,
            self.reminder_status,
            self.social_status,
        ]
    }

    /// Recompute the derived overall status from the current fields
    pub fn recompute_overall(&mut self) {
        self.overall = OverallStatus::derive(self.emergency.is_some(), &self.domain_statuses());
    }

    /// Merge alerts, skipping any already present by value equality.
    /// Returns how many were actually added.
    pub fn merge_alerts(&mut self, alerts: &[Alert]) -> usize {
        let mut added = 0;
        for alert in alerts {
            if !self.alerts.contains(alert) {
                self.alerts.push(alert.clone());
                added += 1;
            }
        }
        added
    }

    /// Merge recommendations, skipping duplicates by value equality
    pub fn merge_recommendations(&mut self, recommendations: &[Recommendation]) -> usize {
        let mut added = 0;
        for rec in recommendations {
            if !self.recommendations.contains(rec) {
                self.recommendations.push(rec.clone());
                added += 1;
            }
        }
        added
    }

    /// Stamp the context as freshly updated
    pub fn touch(&mut self) {
        self.last_update = Utc::now();
    }

    /// Whether the context has gone stale
    pub fn is_stale(&self, max_age_secs: u64) -> bool {
        (Utc::now() - self.last_update).num_seconds() as u64 > max_age_secs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AlertKind, AlertLevel};

    #[test]
    fn test_new_context_is_unknown() {
        let context = UserContext::new("U1000");
        assert_eq!(context.overall, OverallStatus::Unknown);
        assert_eq!(context.health_status, DomainStatus::Unknown);
        assert!(context.alerts.is_empty());
    }

    #[test]
    fn test_merge_alerts_is_idempotent() {
        let mut context = UserContext::new("U1000");
        let alert = Alert::new(AlertLevel::Warning, AlertKind::GlucoseHigh, "high");

        assert_eq!(context.merge_alerts(&[alert.clone()]), 1);
        assert_eq!(context.merge_alerts(&[alert.clone()]), 0);
        assert_eq!(context.alerts.len(), 1);
    }

    #[test]
    fn test_identical_content_different_stamp_does_not_dedupe() {
        let mut context = UserContext::new("U1000");
        let first = Alert::new(AlertLevel::Warning, AlertKind::GlucoseHigh, "high");
        // Same content, produced separately: distinct id and timestamp
        let second = Alert::new(AlertLevel::Warning, AlertKind::GlucoseHigh, "high");

        context.merge_alerts(&[first]);
        context.merge_alerts(&[second]);
        assert_eq!(context.alerts.len(), 2);
    }

    #[test]
    fn test_overall_tracks_emergency() {
        let mut context = UserContext::new("U1000");
        context.health_status = DomainStatus::Normal;
        context.safety_status = DomainStatus::Normal;
        context.reminder_status = DomainStatus::Normal;
        context.social_status = DomainStatus::Normal;
        context.recompute_overall();
        assert_eq!(context.overall, OverallStatus::Normal);

        context.emergency = Some(EmergencyKind::Fall);
        context.recompute_overall();
        assert_eq!(context.overall, OverallStatus::Emergency);
    }
}

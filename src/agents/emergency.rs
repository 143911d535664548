//! Emergency response agent
//!
//! Holds at most one active emergency per user and escalates it through
//! time-based levels: app notification, then caregivers, then simulated
//! emergency services. Nothing here dispatches real services.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::config::EmergencyAgentConfig;
use crate::domain::{
    BoundedHistory, Emergency, EmergencyContact, EmergencyKind, EscalationLevel, ImpactForce,
    NotifyScope,
};
use crate::error::{CareError, Result};
use crate::narrative::{NarrativeClient, NarrativeKind};
use crate::persistence::MemoryStore;

use super::PollingAgent;

const EMERGENCY_HISTORY_CAP: usize = 20;
const NOTIFICATION_HISTORY_CAP: usize = 20;

/// Record of one notification batch sent for an emergency
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub emergency_id: uuid::Uuid,
    pub timestamp: DateTime<Utc>,
    /// Contact names in the order they were notified
    pub contacts: Vec<String>,
    pub urgent: bool,
    pub message: String,
}

struct EmergencyUserState {
    active: Option<Emergency>,
    history: BoundedHistory<Emergency>,
    contacts: Vec<EmergencyContact>,
    notifications: BoundedHistory<Notification>,
}

impl EmergencyUserState {
    fn new() -> Self {
        Self {
            active: None,
            history: BoundedHistory::new(EMERGENCY_HISTORY_CAP),
            contacts: default_contacts(),
            notifications: BoundedHistory::new(NOTIFICATION_HISTORY_CAP),
        }
    }
}

/// Simulated contact list used until real contacts are configured
fn default_contacts() -> Vec<EmergencyContact> {
    vec![
        EmergencyContact {
            name: "Jane Smith".to_string(),
            relationship: "Daughter".to_string(),
            phone: "555-1234".to_string(),
            email: "jane.smith@example.com".to_string(),
            priority: 1,
            notify_for: vec![NotifyScope::All],
        },
        EmergencyContact {
            name: "Michael Johnson".to_string(),
            relationship: "Son".to_string(),
            phone: "555-5678".to_string(),
            email: "michael.johnson@example.com".to_string(),
            priority: 2,
            notify_for: vec![NotifyScope::Health, NotifyScope::Fall],
        },
        EmergencyContact {
            name: "Dr. Robert Williams".to_string(),
            relationship: "Physician".to_string(),
            phone: "555-9101".to_string(),
            email: "dr.williams@example.com".to_string(),
            priority: 3,
            notify_for: vec![NotifyScope::Health],
        },
    ]
}

/// Snapshot returned by status queries
#[derive(Debug, Clone)]
pub struct EmergencyStatusReport {
    pub active: Option<Emergency>,
    pub recent_history: Vec<Emergency>,
    pub recent_notifications: Vec<Notification>,
    pub contacts: Vec<EmergencyContact>,
}

/// Result of handling an emergency report
#[derive(Debug, Clone)]
pub struct EmergencyOutcome {
    pub emergency: Emergency,
    pub narrative: String,
}

/// Agent responsible for handling emergencies and coordinating responses
pub struct EmergencyResponder {
    config: EmergencyAgentConfig,
    store: Arc<MemoryStore>,
    narrative: Arc<dyn NarrativeClient>,
    users: RwLock<HashMap<String, EmergencyUserState>>,
}

impl EmergencyResponder {
    pub fn new(
        config: EmergencyAgentConfig,
        store: Arc<MemoryStore>,
        narrative: Arc<dyn NarrativeClient>,
    ) -> Self {
        Self {
            config,
            store,
            narrative,
            users: RwLock::new(HashMap::new()),
        }
    }

    async fn ensure_user(&self, user_id: &str) {
        let mut users = self.users.write().await;
        users
            .entry(user_id.to_string())
            .or_insert_with(EmergencyUserState::new);
    }

    /// Handle an incoming emergency.
    ///
    /// A re-report of the same kind updates the active record in place and
    /// keeps the escalation clock. A different kind supersedes: the old
    /// emergency is force-resolved into history and the new one starts at
    /// level 1. Severe conditions (high-impact fall, "critical" health
    /// details) escalate to caregivers within the same call.
    pub async fn handle_emergency(
        &self,
        user_id: &str,
        kind: EmergencyKind,
        details: serde_json::Value,
        location: &str,
    ) -> Result<EmergencyOutcome> {
        self.ensure_user(user_id).await;

        let emergency = {
            let mut users = self.users.write().await;
            let state = users
                .get_mut(user_id)
                .ok_or_else(|| CareError::UserNotFound(user_id.to_string()))?;

            match state.active.take() {
                Some(mut active) if active.kind == kind => {
                    // Same kind: refresh details, keep the escalation clock
                    active.details = details;
                    active.location = location.to_string();
                    info!("Updated emergency for user {}: {}", user_id, kind);
                    state.active = Some(active);
                }
                Some(mut old) => {
                    old.resolve("Superseded by new emergency");
                    info!(
                        "Superseded emergency for user {}: {} -> {}",
                        user_id, old.kind, kind
                    );
                    state.history.push(old);
                    state.active = Some(Emergency::new(user_id, kind, details, location));
                }
                None => {
                    info!("Created new emergency for user {}: {}", user_id, kind);
                    state.active = Some(Emergency::new(user_id, kind, details, location));
                }
            }

            state
                .active
                .clone()
                .ok_or_else(|| CareError::Internal("active emergency just installed".to_string()))?
        };

        self.store
            .record_event(
                user_id,
                "emergency_created",
                serde_json::to_value(&emergency)?,
            )
            .await;

        // Initial response: caregivers are told right away
        self.notify_caregivers(user_id, &emergency, false).await;

        if Self::is_severe(&emergency) {
            self.escalate(user_id, EscalationLevel::NotifyCaregivers)
                .await?;
        }

        let emergency = self
            .active_emergency(user_id)
            .await
            .ok_or_else(|| CareError::NoActiveEmergency(user_id.to_string()))?;

        let prompt = format!(
            "Emergency for user {user_id}: type {}, location {}, details {}",
            emergency.kind, emergency.location, emergency.details
        );
        let narrative = self
            .narrative
            .generate(&prompt, NarrativeKind::EmergencyAnalysis)
            .await;

        Ok(EmergencyOutcome {
            emergency,
            narrative,
        })
    }

    /// Conditions that skip the level-1 wait
    fn is_severe(emergency: &Emergency) -> bool {
        match emergency.kind {
            EmergencyKind::Fall => {
                emergency.details.get("impact_force").and_then(|v| v.as_str())
                    == Some(ImpactForce::High.as_str())
            }
            EmergencyKind::Health => emergency
                .details
                .to_string()
                .to_lowercase()
                .contains("critical"),
            EmergencyKind::Safety => false,
        }
    }

    /// Raise the active emergency to the given level and run its action
    async fn escalate(&self, user_id: &str, new_level: EscalationLevel) -> Result<()> {
        let emergency = {
            let mut users = self.users.write().await;
            let state = users
                .get_mut(user_id)
                .ok_or_else(|| CareError::UserNotFound(user_id.to_string()))?;
            let active = state
                .active
                .as_mut()
                .ok_or_else(|| CareError::NoActiveEmergency(user_id.to_string()))?;
            active.level = new_level;
            active.last_escalation = Utc::now();
            active.clone()
        };

        info!(
            "Escalated emergency for user {} to {}: {}",
            user_id, new_level, emergency.kind
        );

        match new_level {
            EscalationLevel::NotifyApp => {
                // Level 1 is the app notification already sent on creation
            }
            EscalationLevel::NotifyCaregivers => {
                self.notify_caregivers(user_id, &emergency, true).await;
            }
            EscalationLevel::NotifyServices => {
                self.notify_services(user_id, &emergency).await;
            }
        }

        Ok(())
    }

    /// Notify the matching contacts in one batch, lowest priority number
    /// first. The ordering is recorded, not used to gate delivery.
    async fn notify_caregivers(&self, user_id: &str, emergency: &Emergency, urgent: bool) {
        let contacts: Vec<EmergencyContact> = {
            let users = self.users.read().await;
            let Some(state) = users.get(user_id) else {
                return;
            };
            let mut matching: Vec<EmergencyContact> = state
                .contacts
                .iter()
                .filter(|c| c.wants(emergency.kind))
                .cloned()
                .collect();
            matching.sort_by_key(|c| c.priority);
            matching
        };

        let message = Self::caregiver_message(emergency, urgent);
        let notification = Notification {
            emergency_id: emergency.id,
            timestamp: Utc::now(),
            contacts: contacts.iter().map(|c| c.name.clone()).collect(),
            urgent,
            message,
        };

        {
            let mut users = self.users.write().await;
            if let Some(state) = users.get_mut(user_id) {
                state.notifications.push(notification.clone());
            }
        }

        self.store
            .record_event(
                user_id,
                "caregiver_notification",
                serde_json::to_value(&notification).unwrap_or(serde_json::Value::Null),
            )
            .await;

        info!(
            "Notified {} caregivers for user {}: {}",
            notification.contacts.len(),
            user_id,
            notification.contacts.join(", ")
        );
    }

    /// Simulated emergency-services dispatch: logged and persisted only
    async fn notify_services(&self, user_id: &str, emergency: &Emergency) {
        let notification = Notification {
            emergency_id: emergency.id,
            timestamp: Utc::now(),
            contacts: vec!["emergency_medical_services".to_string()],
            urgent: true,
            message: Self::services_message(emergency),
        };

        {
            let mut users = self.users.write().await;
            if let Some(state) = users.get_mut(user_id) {
                state.notifications.push(notification.clone());
            }
        }

        self.store
            .record_event(
                user_id,
                "emergency_services_notification",
                serde_json::to_value(&notification).unwrap_or(serde_json::Value::Null),
            )
            .await;

        info!(
            "Notified emergency services for user {}: {}",
            user_id, emergency.kind
        );
    }

    fn caregiver_message(emergency: &Emergency, urgent: bool) -> String {
        let prefix = if urgent { "URGENT: " } else { "" };
        match emergency.kind {
            EmergencyKind::Fall => format!(
                "{prefix}Fall detected for {} at {} in {}. Please respond immediately.",
                emergency.user_id,
                emergency.created_at.format("%H:%M"),
                emergency.location
            ),
            EmergencyKind::Health => format!(
                "{prefix}Health emergency for {}: {}. Please respond immediately.",
                emergency.user_id, emergency.details
            ),
            EmergencyKind::Safety => format!(
                "{prefix}Safety emergency for {}: {}. Please respond immediately.",
                emergency.user_id, emergency.details
            ),
        }
    }

    fn services_message(emergency: &Emergency) -> String {
        match emergency.kind {
            EmergencyKind::Fall => format!(
                "Fall emergency for elderly patient ID {}. Location: {}. No response to caregiver notifications.",
                emergency.user_id, emergency.location
            ),
            _ => format!(
                "Emergency situation for elderly patient ID {}. Issue: {}. No response to caregiver notifications.",
                emergency.user_id, emergency.details
            ),
        }
    }

    /// Resolve the active emergency. When an id is given it must match.
    pub async fn resolve_emergency(
        &self,
        user_id: &str,
        emergency_id: Option<uuid::Uuid>,
        details: Option<String>,
    ) -> Result<Emergency> {
        let resolved = {
            let mut users = self.users.write().await;
            let state = users
                .get_mut(user_id)
                .ok_or_else(|| CareError::NoActiveEmergency(user_id.to_string()))?;

            let active = state
                .active
                .as_ref()
                .ok_or_else(|| CareError::NoActiveEmergency(user_id.to_string()))?;

            if let Some(given) = emergency_id {
                if active.id != given {
                    return Err(CareError::EmergencyMismatch {
                        given: given.to_string(),
                        active: active.id.to_string(),
                    });
                }
            }

            let mut emergency = state
                .active
                .take()
                .ok_or_else(|| CareError::NoActiveEmergency(user_id.to_string()))?;
            emergency.resolve(details.unwrap_or_else(|| "Manually resolved".to_string()));
            state.history.push(emergency.clone());
            emergency
        };

        self.store
            .record_event(
                user_id,
                "emergency_resolved",
                serde_json::json!({
                    "emergency_id": resolved.id,
                    "resolution": &resolved.resolution,
                }),
            )
            .await;

        info!("Resolved emergency for user {}: {}", user_id, resolved.id);
        Ok(resolved)
    }

    /// The active emergency for a user, if any
    pub async fn active_emergency(&self, user_id: &str) -> Option<Emergency> {
        let users = self.users.read().await;
        users.get(user_id).and_then(|s| s.active.clone())
    }

    /// Current emergency status for a user
    pub async fn status(&self, user_id: &str) -> EmergencyStatusReport {
        self.ensure_user(user_id).await;
        let users = self.users.read().await;
        let state = &users[user_id];
        EmergencyStatusReport {
            active: state.active.clone(),
            recent_history: state.history.recent_cloned(5),
            recent_notifications: state.notifications.recent_cloned(5),
            contacts: state.contacts.clone(),
        }
    }

    /// Replace a user's emergency contacts. Entries without a name or phone
    /// are dropped; the rest are sorted by priority.
    pub async fn update_contacts(
        &self,
        user_id: &str,
        contacts: Vec<EmergencyContact>,
    ) -> Result<Vec<EmergencyContact>> {
        self.ensure_user(user_id).await;

        let mut valid: Vec<EmergencyContact> = contacts
            .into_iter()
            .filter(|c| !c.name.is_empty() && !c.phone.is_empty())
            .collect();
        valid.sort_by_key(|c| c.priority);

        let mut users = self.users.write().await;
        let state = users
            .get_mut(user_id)
            .ok_or_else(|| CareError::UserNotFound(user_id.to_string()))?;
        state.contacts = valid.clone();
        info!(
            "Updated emergency contacts for user {}: {} contacts",
            user_id,
            valid.len()
        );
        Ok(valid)
    }

    /// Escalation pass over all active emergencies
    async fn check_escalations(&self) -> Result<()> {
        let interval = self.config.escalation_interval_secs as i64;
        let now = Utc::now();

        let due: Vec<(String, EscalationLevel)> = {
            let users = self.users.read().await;
            users
                .iter()
                .filter_map(|(user_id, state)| {
                    let active = state.active.as_ref()?;
                    if active.resolved {
                        return None;
                    }
                    let elapsed = (now - active.last_escalation).num_seconds();
                    if elapsed < interval {
                        return None;
                    }
                    let next = active.level.next()?;
                    Some((user_id.clone(), next))
                })
                .collect()
        };

        for (user_id, next_level) in due {
            if let Err(e) = self.escalate(&user_id, next_level).await {
                warn!("Escalation failed for user {}: {}", user_id, e);
            }
        }

        Ok(())
    }
}

#[async_trait]
impl PollingAgent for EmergencyResponder {
    fn name(&self) -> &'static str {
        "emergency_responder"
    }

    fn update_interval(&self) -> Duration {
        Duration::from_secs(self.config.update_interval_secs)
    }

    async fn tick(&self) -> Result<()> {
        self.check_escalations().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::narrative::TemplateClient;
    use chrono::Duration as ChronoDuration;

    fn responder() -> EmergencyResponder {
        EmergencyResponder::new(
            EmergencyAgentConfig::default(),
            Arc::new(MemoryStore::new()),
            Arc::new(TemplateClient::new()),
        )
    }

    #[tokio::test]
    async fn test_new_emergency_starts_at_level_one() {
        let responder = responder();
        let outcome = responder
            .handle_emergency(
                "U1000",
                EmergencyKind::Health,
                serde_json::json!({"metric": "glucose_low"}),
                "Kitchen",
            )
            .await
            .unwrap();
        assert_eq!(outcome.emergency.level, EscalationLevel::NotifyApp);
        assert!(!outcome.emergency.resolved);
    }

    #[tokio::test]
    async fn test_high_impact_fall_escalates_immediately() {
        let responder = responder();
        let outcome = responder
            .handle_emergency(
                "U1000",
                EmergencyKind::Fall,
                serde_json::json!({"impact_force": "high"}),
                "Bathroom",
            )
            .await
            .unwrap();
        assert_eq!(outcome.emergency.level, EscalationLevel::NotifyCaregivers);
    }

    #[tokio::test]
    async fn test_critical_health_details_escalate_immediately() {
        let responder = responder();
        let outcome = responder
            .handle_emergency(
                "U1000",
                EmergencyKind::Health,
                serde_json::json!({"note": "critical oxygen reading"}),
                "Bedroom",
            )
            .await
            .unwrap();
        assert_eq!(outcome.emergency.level, EscalationLevel::NotifyCaregivers);
    }

    #[tokio::test]
    async fn test_same_kind_keeps_escalation_state() {
        let responder = responder();
        responder
            .handle_emergency(
                "U1000",
                EmergencyKind::Fall,
                serde_json::json!({"impact_force": "high"}),
                "Bathroom",
            )
            .await
            .unwrap();

        let before = responder.active_emergency("U1000").await.unwrap();
        assert_eq!(before.level, EscalationLevel::NotifyCaregivers);

        // Re-report of the same kind, lower severity
        responder
            .handle_emergency(
                "U1000",
                EmergencyKind::Fall,
                serde_json::json!({"impact_force": "low"}),
                "Hallway",
            )
            .await
            .unwrap();

        let after = responder.active_emergency("U1000").await.unwrap();
        assert_eq!(after.level, EscalationLevel::NotifyCaregivers);
        assert_eq!(after.id, before.id);
        assert_eq!(after.location, "Hallway");
    }

    #[tokio::test]
    async fn test_different_kind_supersedes() {
        let responder = responder();
        responder
            .handle_emergency(
                "U1000",
                EmergencyKind::Fall,
                serde_json::json!({}),
                "Bathroom",
            )
            .await
            .unwrap();
        responder
            .handle_emergency(
                "U1000",
                EmergencyKind::Health,
                serde_json::json!({"metric": "oxygen_low"}),
                "Bathroom",
            )
            .await
            .unwrap();

        let active = responder.active_emergency("U1000").await.unwrap();
        assert_eq!(active.kind, EmergencyKind::Health);
        assert_eq!(active.level, EscalationLevel::NotifyApp);

        let status = responder.status("U1000").await;
        assert_eq!(status.recent_history.len(), 1);
        let old = &status.recent_history[0];
        assert_eq!(old.kind, EmergencyKind::Fall);
        assert!(old.resolved);
        assert_eq!(
            old.resolution.as_ref().unwrap().details,
            "Superseded by new emergency"
        );
    }

    #[tokio::test]
    async fn test_escalation_timer() {
        let responder = responder();
        responder
            .handle_emergency(
                "U1000",
                EmergencyKind::Safety,
                serde_json::json!({}),
                "Kitchen",
            )
            .await
            .unwrap();

        // 4 minutes: not yet
        {
            let mut users = responder.users.write().await;
            let active = users.get_mut("U1000").unwrap().active.as_mut().unwrap();
            active.last_escalation = Utc::now() - ChronoDuration::minutes(4);
        }
        responder.check_escalations().await.unwrap();
        assert_eq!(
            responder.active_emergency("U1000").await.unwrap().level,
            EscalationLevel::NotifyApp
        );

        // 6 minutes: escalate to level 2
        {
            let mut users = responder.users.write().await;
            let active = users.get_mut("U1000").unwrap().active.as_mut().unwrap();
            active.last_escalation = Utc::now() - ChronoDuration::minutes(6);
        }
        responder.check_escalations().await.unwrap();
        assert_eq!(
            responder.active_emergency("U1000").await.unwrap().level,
            EscalationLevel::NotifyCaregivers
        );

        // Another 6 minutes: level 3, then stays there
        {
            let mut users = responder.users.write().await;
            let active = users.get_mut("U1000").unwrap().active.as_mut().unwrap();
            active.last_escalation = Utc::now() - ChronoDuration::minutes(6);
        }
        responder.check_escalations().await.unwrap();
        let active = responder.active_emergency("U1000").await.unwrap();
        assert_eq!(active.level, EscalationLevel::NotifyServices);

        {
            let mut users = responder.users.write().await;
            let active = users.get_mut("U1000").unwrap().active.as_mut().unwrap();
            active.last_escalation = Utc::now() - ChronoDuration::minutes(6);
        }
        responder.check_escalations().await.unwrap();
        assert_eq!(
            responder.active_emergency("U1000").await.unwrap().level,
            EscalationLevel::NotifyServices
        );
    }

    #[tokio::test]
    async fn test_resolve_with_wrong_id_errors() {
        let responder = responder();
        responder
            .handle_emergency(
                "U1000",
                EmergencyKind::Fall,
                serde_json::json!({}),
                "Bathroom",
            )
            .await
            .unwrap();

        let err = responder
            .resolve_emergency("U1000", Some(uuid::Uuid::new_v4()), None)
            .await
            .unwrap_err();
        assert!(matches!(err, CareError::EmergencyMismatch { .. }));

        // Correct id resolves
        let active = responder.active_emergency("U1000").await.unwrap();
        let resolved = responder
            .resolve_emergency("U1000", Some(active.id), None)
            .await
            .unwrap();
        assert!(resolved.resolved);
        assert!(responder.active_emergency("U1000").await.is_none());

        // Second resolve is a soft error
        let err = responder
            .resolve_emergency("U1000", None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, CareError::NoActiveEmergency(_)));
    }

    #[tokio::test]
    async fn test_contact_filtering_and_order() {
        let responder = responder();
        responder
            .handle_emergency(
                "U1000",
                EmergencyKind::Health,
                serde_json::json!({"metric": "glucose_low"}),
                "Kitchen",
            )
            .await
            .unwrap();

        let status = responder.status("U1000").await;
        let notification = status.recent_notifications.last().unwrap();
        // All three default contacts accept health, ordered by priority
        assert_eq!(
            notification.contacts,
            vec!["Jane Smith", "Michael Johnson", "Dr. Robert Williams"]
        );
    }

    #[tokio::test]
    async fn test_contact_validation_on_update() {
        let responder = responder();
        let contacts = vec![
            EmergencyContact {
                name: "B".to_string(),
                relationship: "Friend".to_string(),
                phone: "555-2222".to_string(),
                email: String::new(),
                priority: 5,
                notify_for: vec![NotifyScope::All],
            },
            EmergencyContact {
                name: String::new(),
                relationship: "Nobody".to_string(),
                phone: "555-0000".to_string(),
                email: String::new(),
                priority: 1,
                notify_for: vec![NotifyScope::All],
            },
            EmergencyContact {
                name: "A".to_string(),
                relationship: "Neighbor".to_string(),
                phone: "555-1111".to_string(),
                email: String::new(),
                priority: 2,
                notify_for: vec![NotifyScope::All],
            },
        ];

        let updated = responder.update_contacts("U1000", contacts).await.unwrap();
        assert_eq!(updated.len(), 2);
        assert_eq!(updated[0].name, "A");
        assert_eq!(updated[1].name, "B");
    }
}

//! Coordinator — central orchestrator for the monitoring agents
//!
//! Single source of truth for per-user aggregate context. Routes inbound
//! readings to exactly one domain agent, merges the returned analyses and
//! alerts back into the context, forwards emergencies to the responder, and
//! derives the overall status.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::agents::{
    DailyAssistant, EmergencyResponder, EmergencyStatusReport, HealthMonitor, HealthStatusReport,
    PollingAgent, ReminderStatusReport, SafetyGuardian, SafetyStatusReport, SocialCompanion,
    SocialStatusReport,
};
use crate::analyzer::HistoryAnalyzer;
use crate::config::CoordinationAgentConfig;
use crate::domain::{
    Alert, AlertKind, AlertLevel, DomainStatus, EmergencyKind, Envelope, OverallStatus, Reading,
};
use crate::error::{CareError, Result};
use crate::narrative::{NarrativeClient, NarrativeKind};
use crate::persistence::MemoryStore;

use super::context::UserContext;

/// Result of routing one inbound reading
#[derive(Debug, Clone)]
pub struct ProcessedReading {
    pub user_id: String,
    pub domain: &'static str,
    pub status: DomainStatus,
    pub alerts: Vec<Alert>,
    /// Emergency kind forwarded to the responder, if any
    pub emergency: Option<EmergencyKind>,
    pub overall: OverallStatus,
}

/// Comprehensive status for one user, the outbound shape
#[derive(Debug, Clone)]
pub struct UserStatusReport {
    pub user_id: String,
    pub timestamp: DateTime<Utc>,
    pub context: UserContext,
    pub health: Option<HealthStatusReport>,
    pub safety: Option<SafetyStatusReport>,
    pub reminders: Option<ReminderStatusReport>,
    pub social: Option<SocialStatusReport>,
    pub emergency: Option<EmergencyStatusReport>,
    pub summary: String,
}

/// System-wide snapshot
#[derive(Debug, Clone)]
pub struct SystemStatus {
    pub timestamp: DateTime<Utc>,
    pub active_users: usize,
    pub active_alerts: usize,
    pub active_emergencies: usize,
    pub user_status_counts: HashMap<OverallStatus, usize>,
    pub agents_wired: bool,
    pub started_at: DateTime<Utc>,
    pub uptime_secs: u64,
}

/// Agent responsible for coordinating all other agents and managing
/// per-user aggregate state
pub struct Coordinator {
    config: CoordinationAgentConfig,
    context_stale_secs: u64,
    analyzer: Arc<dyn HistoryAnalyzer>,
    store: Arc<MemoryStore>,
    narrative: Arc<dyn NarrativeClient>,
    contexts: RwLock<HashMap<String, UserContext>>,
    started_at: DateTime<Utc>,

    health: Option<Arc<HealthMonitor>>,
    safety: Option<Arc<SafetyGuardian>>,
    reminder: Option<Arc<DailyAssistant>>,
    social: Option<Arc<SocialCompanion>>,
    emergency: Option<Arc<EmergencyResponder>>,
}

impl Coordinator {
    pub fn new(
        config: CoordinationAgentConfig,
        context_stale_secs: u64,
        analyzer: Arc<dyn HistoryAnalyzer>,
        store: Arc<MemoryStore>,
        narrative: Arc<dyn NarrativeClient>,
    ) -> Self {
        Self {
            config,
            context_stale_secs,
            analyzer,
            store,
            narrative,
            contexts: RwLock::new(HashMap::new()),
            started_at: Utc::now(),
            health: None,
            safety: None,
            reminder: None,
            social: None,
            emergency: None,
        }
    }

    /// Wire the domain agents. Call before sharing the coordinator.
    pub fn set_agents(
        &mut self,
        health: Arc<HealthMonitor>,
        safety: Arc<SafetyGuardian>,
        reminder: Arc<DailyAssistant>,
        social: Arc<SocialCompanion>,
        emergency: Arc<EmergencyResponder>,
    ) {
        self.health = Some(health);
        self.safety = Some(safety);
        self.reminder = Some(reminder);
        self.social = Some(social);
        self.emergency = Some(emergency);
        info!("All agent references set");
    }

    /// Create contexts for every user the analyzer knows about
    pub async fn initialize(&self) {
        let user_ids = self.analyzer.user_ids();
        for user_id in &user_ids {
            self.ensure_context(user_id).await;
        }
        info!("Initialized context for {} users", user_ids.len());
    }

    async fn ensure_context(&self, user_id: &str) {
        {
            let contexts = self.contexts.read().await;
            if contexts.contains_key(user_id) {
                return;
            }
        }

        let mut context = UserContext::new(user_id);

        // Seed domain statuses from the analyzer where history exists
        if let Some(analysis) = self.analyzer.analyze_health(user_id) {
            context.health_status = analysis.status;
        }
        if let Some(analysis) = self.analyzer.analyze_safety(user_id) {
            context.safety_status = analysis.status;
            context.current_location = analysis.current_location;
            context.current_activity = analysis.current_activity;
        }
        if let Some(analysis) = self.analyzer.analyze_reminders(user_id) {
            context.reminder_status = analysis.status;
        }
        context.recompute_overall();

        let mut contexts = self.contexts.write().await;
        contexts.entry(user_id.to_string()).or_insert(context);
    }

    /// Map an urgent alert to the emergency kind it should open
    fn emergency_kind_for(alert: &Alert) -> EmergencyKind {
        if alert.kind == AlertKind::FallDetected {
            EmergencyKind::Fall
        } else if alert.kind.is_health_metric() {
            EmergencyKind::Health
        } else {
            EmergencyKind::Safety
        }
    }

    /// Route one inbound reading to its domain agent and fold the result
    /// into the user's context.
    pub async fn handle_incoming(&self, envelope: Envelope) -> Result<ProcessedReading> {
        let user_id = envelope.user_id;
        if user_id.is_empty() {
            return Err(CareError::missing("user_id", "incoming data"));
        }
        self.ensure_context(&user_id).await;

        let domain = envelope.reading.domain();
        let (status, alerts, recommendations, forwarded, location_activity) =
            match envelope.reading {
                Reading::Health(reading) => {
                    let agent = self
                        .health
                        .as_ref()
                        .ok_or(CareError::AgentUnavailable("health_monitor"))?;
                    let outcome = agent.process_reading(&user_id, reading).await?;

                    // Urgent health alerts open (or refresh) an emergency
                    let mut forwarded = None;
                    let urgent: Vec<&Alert> = outcome
                        .alerts
                        .iter()
                        .filter(|a| a.level == AlertLevel::Urgent)
                        .collect();
                    if !urgent.is_empty() {
                        if let Some(responder) = &self.emergency {
                            for alert in urgent {
                                let kind = Self::emergency_kind_for(alert);
                                let location = {
                                    let contexts = self.contexts.read().await;
                                    contexts
                                        .get(&user_id)
                                        .map(|c| c.current_location.clone())
                                        .unwrap_or_else(|| "unknown".to_string())
                                };
                                responder
                                    .handle_emergency(
                                        &user_id,
                                        kind,
                                        serde_json::json!({
                                            "metric": alert.kind.as_str(),
                                            "message": &alert.message,
                                            "details": &alert.details,
                                        }),
                                        &location,
                                    )
                                    .await?;
                                forwarded = Some(kind);
                            }
                        }
                    }

                    (
                        outcome.analysis.status,
                        outcome.alerts,
                        Vec::new(),
                        forwarded,
                        None,
                    )
                }
                Reading::Safety(reading) => {
                    let agent = self
                        .safety
                        .as_ref()
                        .ok_or(CareError::AgentUnavailable("safety_guardian"))?;
                    let fall_detected = reading.fall_detected;
                    let details = serde_json::json!({
                        "location": &reading.location,
                        "activity": &reading.activity,
                        "impact_force": reading.impact_force.as_str(),
                        "post_fall_inactivity_secs": reading.post_fall_inactivity_secs,
                    });
                    let location = reading.location.clone();
                    let outcome = agent.process_reading(&user_id, reading).await?;

                    let mut forwarded = None;
                    if outcome.emergency {
                        if let Some(responder) = &self.emergency {
                            let kind = if fall_detected {
                                EmergencyKind::Fall
                            } else {
                                EmergencyKind::Safety
                            };
                            responder
                                .handle_emergency(&user_id, kind, details, &location)
                                .await?;
                            forwarded = Some(kind);
                        }
                    }

                    let location_activity = Some((
                        outcome.analysis.current_location.clone(),
                        outcome.analysis.current_activity.clone(),
                    ));
                    (
                        outcome.analysis.status,
                        outcome.alerts,
                        Vec::new(),
                        forwarded,
                        location_activity,
                    )
                }
                Reading::Reminder(event) => {
                    let agent = self
                        .reminder
                        .as_ref()
                        .ok_or(CareError::AgentUnavailable("daily_assistant"))?;
                    let outcome = agent.process_event(&user_id, event).await?;
                    let status = outcome
                        .analysis
                        .as_ref()
                        .map(|a| a.status)
                        .unwrap_or(DomainStatus::Unknown);
                    (status, Vec::new(), outcome.recommendations, None, None)
                }
                Reading::Social(event) => {
                    let agent = self
                        .social
                        .as_ref()
                        .ok_or(CareError::AgentUnavailable("social_companion"))?;
                    let outcome = agent.process_event(&user_id, event).await?;
                    (
                        outcome.analysis.status,
                        outcome.alerts,
                        outcome.suggestions,
                        None,
                        None,
                    )
                }
            };

        let overall = {
            let mut contexts = self.contexts.write().await;
            let context = contexts
                .get_mut(&user_id)
                .ok_or_else(|| CareError::UserNotFound(user_id.clone()))?;

            match domain {
                "health" => context.health_status = status,
                "safety" => context.safety_status = status,
                "reminder" => context.reminder_status = status,
                _ => context.social_status = status,
            }
            if let Some((location, activity)) = location_activity {
                context.current_location = location;
                context.current_activity = activity;
            }
            context.merge_alerts(&alerts);
            context.merge_recommendations(&recommendations);
            if let Some(kind) = forwarded {
                context.emergency = Some(kind);
            }
            context.recompute_overall();
            context.touch();
            context.overall
        };

        debug!(
            "Processed {} reading for user {}: status {}, overall {}",
            domain, user_id, status, overall
        );

        Ok(ProcessedReading {
            user_id,
            domain,
            status,
            alerts,
            emergency: forwarded,
            overall,
        })
    }

    /// Re-pull every domain agent for a user, swallowing per-agent failures
    /// so one failing domain never blocks the others.
    async fn refresh_context(&self, user_id: &str) {
        let health = match &self.health {
            Some(agent) => match agent.status(user_id).await {
                Ok(report) => Some(report),
                Err(e) => {
                    error!("Error updating health status for user {}: {}", user_id, e);
                    None
                }
            },
            None => None,
        };
        let safety = match &self.safety {
            Some(agent) => match agent.status(user_id).await {
                Ok(report) => Some(report),
                Err(e) => {
                    error!("Error updating safety status for user {}: {}", user_id, e);
                    None
                }
            },
            None => None,
        };
        let reminders = match &self.reminder {
            Some(agent) => match agent.status(user_id).await {
                Ok(report) => Some(report),
                Err(e) => {
                    error!("Error updating reminder status for user {}: {}", user_id, e);
                    None
                }
            },
            None => None,
        };
        let social = match &self.social {
            Some(agent) => match agent.status(user_id).await {
                Ok(report) => Some(report),
                Err(e) => {
                    error!("Error updating social status for user {}: {}", user_id, e);
                    None
                }
            },
            None => None,
        };
        let active_emergency = match &self.emergency {
            Some(agent) => agent.active_emergency(user_id).await,
            None => None,
        };

        let mut contexts = self.contexts.write().await;
        let Some(context) = contexts.get_mut(user_id) else {
            return;
        };

        if let Some(report) = health {
            context.health_status = report.analysis.status;
            context.merge_alerts(&report.alerts);
        }
        if let Some(report) = safety {
            context.safety_status = report.analysis.status;
            context.current_location = report.analysis.current_location.clone();
            context.current_activity = report.analysis.current_activity.clone();
            context.merge_alerts(&report.alerts);
        }
        if let Some(report) = reminders {
            context.reminder_status = report.analysis.status;
            context.merge_recommendations(&report.recommendations);
        }
        if let Some(report) = social {
            context.social_status = report.analysis.status;
            context.merge_alerts(&report.alerts);
        }
        context.emergency = active_emergency.map(|e| e.kind);
        context.recompute_overall();
        context.touch();
    }

    /// Force a context refresh for one user, regardless of staleness
    pub async fn refresh_user(&self, user_id: &str) {
        self.ensure_context(user_id).await;
        self.refresh_context(user_id).await;
    }

    /// Comprehensive status for one user, refreshing the context when stale
    pub async fn user_status(&self, user_id: &str) -> Result<UserStatusReport> {
        self.ensure_context(user_id).await;

        let stale = {
            let contexts = self.contexts.read().await;
            contexts
                .get(user_id)
                .map(|c| c.is_stale(self.context_stale_secs))
                .unwrap_or(true)
        };
        if stale {
            self.refresh_context(user_id).await;
        }

        let context = {
            let contexts = self.contexts.read().await;
            contexts
                .get(user_id)
                .cloned()
                .ok_or_else(|| CareError::UserNotFound(user_id.to_string()))?
        };

        // Detailed per-domain reports; failures degrade to None
        let health = match &self.health {
            Some(agent) => agent.status(user_id).await.ok(),
            None => None,
        };
        let safety = match &self.safety {
            Some(agent) => agent.status(user_id).await.ok(),
            None => None,
        };
        let reminders = match &self.reminder {
            Some(agent) => agent.status(user_id).await.ok(),
            None => None,
        };
        let social = match &self.social {
            Some(agent) => agent.status(user_id).await.ok(),
            None => None,
        };
        let emergency = match &self.emergency {
            Some(agent) => Some(agent.status(user_id).await),
            None => None,
        };

        let summary = self
            .summarize(&context, &health, &safety, &reminders, &social)
            .await;

        Ok(UserStatusReport {
            user_id: user_id.to_string(),
            timestamp: Utc::now(),
            context,
            health,
            safety,
            reminders,
            social,
            emergency,
            summary,
        })
    }

    /// Narrative status summary; advisory only
    async fn summarize(
        &self,
        context: &UserContext,
        health: &Option<HealthStatusReport>,
        safety: &Option<SafetyStatusReport>,
        reminders: &Option<ReminderStatusReport>,
        social: &Option<SocialStatusReport>,
    ) -> String {
        let part = |s: Option<&str>| s.unwrap_or("No data available").to_string();
        let recent_alerts: Vec<String> = context
            .alerts
            .iter()
            .rev()
            .take(3)
            .map(|a| format!("- {}", a.message))
            .collect();

        let prompt = format!(
            "Status summary for user {}.\nLocation: {}\nActivity: {}\nOverall status: {}\nHealth: {}\nSafety: {}\nReminders: {}\nSocial: {}\nRecent alerts:\n{}",
            context.user_id,
            context.current_location,
            context.current_activity,
            context.overall,
            part(health.as_ref().map(|r| r.summary.as_str())),
            part(safety.as_ref().map(|r| r.summary.as_str())),
            part(reminders.as_ref().map(|r| r.summary.as_str())),
            part(social.as_ref().map(|r| r.summary.as_str())),
            if recent_alerts.is_empty() {
                "No recent alerts".to_string()
            } else {
                recent_alerts.join("\n")
            },
        );

        self.narrative
            .generate(&prompt, NarrativeKind::StatusSummary)
            .await
    }

    /// Remove one alert by id, persist the resolution, and recompute the
    /// overall status. A second call with the same id is an error, not a
    /// crash.
    pub async fn resolve_alert(&self, user_id: &str, alert_id: Uuid) -> Result<()> {
        {
            let mut contexts = self.contexts.write().await;
            let context = contexts
                .get_mut(user_id)
                .ok_or_else(|| CareError::UserNotFound(user_id.to_string()))?;

            let index = context
                .alerts
                .iter()
                .position(|a| a.id == alert_id)
                .ok_or_else(|| CareError::AlertNotFound {
                    user_id: user_id.to_string(),
                    alert_id: alert_id.to_string(),
                })?;
            context.alerts.remove(index);
            context.recompute_overall();
            context.touch();
        }

        self.store
            .record_event(
                user_id,
                "alert_resolved",
                serde_json::json!({
                    "alert_id": alert_id,
                    "resolution_time": Utc::now(),
                }),
            )
            .await;

        info!("Resolved alert {} for user {}", alert_id, user_id);
        Ok(())
    }

    /// System-wide counters and agent wiring
    pub async fn system_status(&self) -> SystemStatus {
        let contexts = self.contexts.read().await;

        let mut user_status_counts: HashMap<OverallStatus, usize> = HashMap::new();
        let mut active_alerts = 0;
        let mut active_emergencies = 0;
        for context in contexts.values() {
            *user_status_counts.entry(context.overall).or_default() += 1;
            active_alerts += context.alerts.len();
            if context.emergency.is_some() {
                active_emergencies += 1;
            }
        }

        let agents_wired = self.health.is_some()
            && self.safety.is_some()
            && self.reminder.is_some()
            && self.social.is_some()
            && self.emergency.is_some();

        SystemStatus {
            timestamp: Utc::now(),
            active_users: contexts.len(),
            active_alerts,
            active_emergencies,
            user_status_counts,
            agents_wired,
            started_at: self.started_at,
            uptime_secs: (Utc::now() - self.started_at).num_seconds().max(0) as u64,
        }
    }

    /// A user's current context, for tests and the simulator
    pub async fn context(&self, user_id: &str) -> Option<UserContext> {
        let contexts = self.contexts.read().await;
        contexts.get(user_id).cloned()
    }
}

#[async_trait]
impl PollingAgent for Coordinator {
    fn name(&self) -> &'static str {
        "coordination"
    }

    fn update_interval(&self) -> Duration {
        Duration::from_secs(self.config.update_interval_secs)
    }

    /// Refresh stale user contexts
    async fn tick(&self) -> Result<()> {
        let stale_users: Vec<String> = {
            let contexts = self.contexts.read().await;
            contexts
                .values()
                .filter(|c| c.is_stale(self.context_stale_secs))
                .map(|c| c.user_id.clone())
                .collect()
        };

        for user_id in stale_users {
            self.refresh_context(&user_id).await;
        }

        let status = self.system_status().await;
        debug!(
            "System: {} users, {} alerts, {} emergencies",
            status.active_users, status.active_alerts, status.active_emergencies
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::MemoryAnalyzer;
    use crate::config::AgentsConfig;
    use crate::domain::{HealthReading, ImpactForce, SafetyReading};
    use crate::narrative::TemplateClient;

    fn system() -> (Arc<Coordinator>, Arc<EmergencyResponder>) {
        let agents_config = AgentsConfig::default();
        let analyzer: Arc<MemoryAnalyzer> = Arc::new(MemoryAnalyzer::new());
        let store = Arc::new(MemoryStore::new());
        let narrative = Arc::new(TemplateClient::new());

        let health = Arc::new(HealthMonitor::new(
            agents_config.health.clone(),
            analyzer.clone(),
            store.clone(),
            narrative.clone(),
        ));
        let safety = Arc::new(SafetyGuardian::new(
            agents_config.safety.clone(),
            analyzer.clone(),
            store.clone(),
            narrative.clone(),
        ));
        let reminder = Arc::new(DailyAssistant::new(
            agents_config.reminder.clone(),
            analyzer.clone(),
            store.clone(),
            narrative.clone(),
        ));
        let social = Arc::new(SocialCompanion::new(
            agents_config.social.clone(),
            analyzer.clone(),
            store.clone(),
            narrative.clone(),
        ));
        let emergency = Arc::new(EmergencyResponder::new(
            agents_config.emergency.clone(),
            store.clone(),
            narrative.clone(),
        ));

        let mut coordinator = Coordinator::new(
            agents_config.coordination.clone(),
            60,
            analyzer,
            store,
            narrative,
        );
        coordinator.set_agents(health, safety, reminder, social, emergency.clone());
        (Arc::new(coordinator), emergency)
    }

    fn fall_reading() -> Envelope {
        Envelope {
            user_id: "U1000".to_string(),
            reading: Reading::Safety(SafetyReading {
                timestamp: Utc::now(),
                location: "Bathroom".to_string(),
                activity: "No Movement".to_string(),
                fall_detected: true,
                impact_force: ImpactForce::High,
                post_fall_inactivity_secs: 120,
            }),
        }
    }

    #[tokio::test]
    async fn test_empty_user_id_is_soft_error() {
        let (coordinator, _) = system();
        let envelope = Envelope {
            user_id: String::new(),
            reading: Reading::Health(HealthReading {
                timestamp: Utc::now(),
                heart_rate: 72.0,
                systolic: 120.0,
                diastolic: 80.0,
                glucose: 100.0,
                oxygen: 98.0,
            }),
        };
        let err = coordinator.handle_incoming(envelope).await.unwrap_err();
        assert!(matches!(err, CareError::MissingField { .. }));
    }

    #[tokio::test]
    async fn test_fall_reading_opens_fall_emergency() {
        let (coordinator, emergency) = system();
        let processed = coordinator.handle_incoming(fall_reading()).await.unwrap();

        assert_eq!(processed.emergency, Some(EmergencyKind::Fall));
        assert_eq!(processed.overall, OverallStatus::Emergency);

        let active = emergency.active_emergency("U1000").await.unwrap();
        assert_eq!(active.kind, EmergencyKind::Fall);
        // High impact force escalated within the same call
        assert_eq!(
            active.level,
            crate::domain::EscalationLevel::NotifyCaregivers
        );
    }

    #[tokio::test]
    async fn test_urgent_health_alert_opens_health_emergency() {
        let (coordinator, emergency) = system();
        let envelope = Envelope {
            user_id: "U1000".to_string(),
            reading: Reading::Health(HealthReading {
                timestamp: Utc::now(),
                heart_rate: 72.0,
                systolic: 120.0,
                diastolic: 80.0,
                glucose: 100.0,
                oxygen: 90.0, // below the urgent bound
            }),
        };
        let processed = coordinator.handle_incoming(envelope).await.unwrap();

        assert_eq!(processed.emergency, Some(EmergencyKind::Health));
        let active = emergency.active_emergency("U1000").await.unwrap();
        assert_eq!(active.kind, EmergencyKind::Health);
    }

    #[tokio::test]
    async fn test_normal_health_reading_keeps_normal_overall() {
        let (coordinator, _) = system();
        let envelope = Envelope {
            user_id: "U1000".to_string(),
            reading: Reading::Health(HealthReading {
                timestamp: Utc::now(),
                heart_rate: 72.0,
                systolic: 120.0,
                diastolic: 80.0,
                glucose: 100.0,
                oxygen: 98.0,
            }),
        };
        let processed = coordinator.handle_incoming(envelope).await.unwrap();
        assert_eq!(processed.status, DomainStatus::Normal);
        // Other domains unknown, health normal
        assert_eq!(processed.overall, OverallStatus::Normal);
    }

    #[tokio::test]
    async fn test_resolve_alert_round_trip() {
        let (coordinator, _) = system();
        let envelope = Envelope {
            user_id: "U1000".to_string(),
            reading: Reading::Health(HealthReading {
                timestamp: Utc::now(),
                heart_rate: 110.0, // warning, no emergency
                systolic: 120.0,
                diastolic: 80.0,
                glucose: 100.0,
                oxygen: 98.0,
            }),
        };
        let processed = coordinator.handle_incoming(envelope).await.unwrap();
        assert_eq!(processed.alerts.len(), 1);
        let alert_id = processed.alerts[0].id;

        coordinator.resolve_alert("U1000", alert_id).await.unwrap();
        let context = coordinator.context("U1000").await.unwrap();
        assert!(context.alerts.is_empty());

        // Second resolution of the same id errors without crashing
        let err = coordinator
            .resolve_alert("U1000", alert_id)
            .await
            .unwrap_err();
        assert!(matches!(err, CareError::AlertNotFound { .. }));
    }

    #[tokio::test]
    async fn test_system_status_counts() {
        let (coordinator, _) = system();
        coordinator.handle_incoming(fall_reading()).await.unwrap();

        let status = coordinator.system_status().await;
        assert_eq!(status.active_users, 1);
        assert_eq!(status.active_emergencies, 1);
        assert!(status.agents_wired);
        assert_eq!(
            status.user_status_counts.get(&OverallStatus::Emergency),
            Some(&1)
        );
    }
}

//! Daily assistant agent
//!
//! Schedules and delivers reminders, tracks acknowledgments, flags overdue
//! reminders, and surfaces adherence recommendations.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, NaiveTime, Utc};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::analyzer::{HistoryAnalyzer, ReminderAnalysis};
use crate::config::{ReminderAgentConfig, ReminderKindConfig};
use crate::domain::{
    Alert, AlertKind, AlertLevel, BoundedHistory, DomainStatus, NewReminder, Recommendation,
    RecommendationKind, RecommendationPriority, Reminder, ReminderEvent, ReminderId,
};
use crate::error::{CareError, Result};
use crate::narrative::{NarrativeClient, NarrativeKind};
use crate::persistence::{tables, MemoryStore};

use super::PollingAgent;

const SENT_HISTORY_CAP: usize = 100;
const ALERT_HISTORY_CAP: usize = 20;
/// Top up the schedule when fewer than this many reminders remain
const MIN_UPCOMING: usize = 5;

struct ReminderUserState {
    /// Pending reminders, kept sorted by scheduled time
    upcoming: Vec<Reminder>,
    /// Delivered reminders, oldest evicted first
    sent: BoundedHistory<Reminder>,
    alerts: BoundedHistory<Alert>,
    /// Per-user overrides of the configured kind settings
    preferences: HashMap<String, ReminderKindConfig>,
}

impl ReminderUserState {
    fn new() -> Self {
        Self {
            upcoming: Vec::new(),
            sent: BoundedHistory::new(SENT_HISTORY_CAP),
            alerts: BoundedHistory::new(ALERT_HISTORY_CAP),
            preferences: HashMap::new(),
        }
    }

    fn sort_upcoming(&mut self) {
        self.upcoming.sort_by_key(|r| r.scheduled_time);
    }
}

/// Result of processing one reminder event
#[derive(Debug, Clone)]
pub struct ReminderOutcome {
    pub analysis: Option<ReminderAnalysis>,
    pub upcoming: Vec<Reminder>,
    pub recommendations: Vec<Recommendation>,
    pub narrative: Option<String>,
}

/// Snapshot returned by status queries
#[derive(Debug, Clone)]
pub struct ReminderStatusReport {
    pub timestamp: DateTime<Utc>,
    pub analysis: ReminderAnalysis,
    pub upcoming: Vec<Reminder>,
    pub alerts: Vec<Alert>,
    pub recommendations: Vec<Recommendation>,
    pub summary: String,
}

/// Agent responsible for managing reminders and daily activities
pub struct DailyAssistant {
    config: ReminderAgentConfig,
    analyzer: Arc<dyn HistoryAnalyzer>,
    store: Arc<MemoryStore>,
    narrative: Arc<dyn NarrativeClient>,
    users: RwLock<HashMap<String, ReminderUserState>>,
    analyses: RwLock<HashMap<String, (ReminderAnalysis, DateTime<Utc>)>>,
}

impl DailyAssistant {
    pub fn new(
        config: ReminderAgentConfig,
        analyzer: Arc<dyn HistoryAnalyzer>,
        store: Arc<MemoryStore>,
        narrative: Arc<dyn NarrativeClient>,
    ) -> Self {
        Self {
            config,
            analyzer,
            store,
            narrative,
            users: RwLock::new(HashMap::new()),
            analyses: RwLock::new(HashMap::new()),
        }
    }

    /// Seed state for every user the analyzer knows about
    pub async fn initialize(&self) {
        let user_ids = self.analyzer.user_ids();
        for user_id in &user_ids {
            self.ensure_user(user_id).await;
        }
        info!("Initialized reminder data for {} users", user_ids.len());
    }

    async fn ensure_user(&self, user_id: &str) {
        {
            let users = self.users.read().await;
            if users.contains_key(user_id) {
                return;
            }
        }

        let mut state = ReminderUserState::new();

        // Rebuild the upcoming schedule from the kinds seen in history
        let mut kinds: HashSet<String> = HashSet::new();
        if let Some(records) = self.analyzer.reminder_records(user_id) {
            for record in &records {
                kinds.insert(record.kind.clone());
            }
        }
        if kinds.is_empty() {
            kinds = self.config.kinds.keys().cloned().collect();
        }
        for kind in kinds {
            let scheduled =
                self.schedule_for_kind(user_id, &kind, &state.preferences, &HashSet::new());
            state.upcoming.extend(scheduled);
        }
        state.sort_upcoming();

        if let Some(analysis) = self.analyzer.analyze_reminders(user_id) {
            let mut analyses = self.analyses.write().await;
            analyses.insert(user_id.to_string(), (analysis, Utc::now()));
        }

        let mut users = self.users.write().await;
        users.entry(user_id.to_string()).or_insert(state);
    }

    /// Settings for a kind, preferring the user's overrides
    fn kind_config_for(
        &self,
        preferences: &HashMap<String, ReminderKindConfig>,
        kind: &str,
    ) -> ReminderKindConfig {
        preferences
            .get(&kind.to_lowercase())
            .cloned()
            .unwrap_or_else(|| self.config.kind_config(kind))
    }

    /// Preferred times for a kind, preferring the user's overrides
    fn preferred_times_for(
        &self,
        preferences: &HashMap<String, ReminderKindConfig>,
        kind: &str,
    ) -> Vec<String> {
        if let Some(cfg) = preferences.get(&kind.to_lowercase()) {
            if !cfg.preferred_times.is_empty() {
                return cfg.preferred_times.clone();
            }
        }
        self.config.preferred_times(kind)
    }

    /// Build today's/tomorrow's reminders for one kind from its preferred
    /// times. Unparsable times are logged and skipped.
    fn schedule_for_kind(
        &self,
        user_id: &str,
        kind: &str,
        preferences: &HashMap<String, ReminderKindConfig>,
        taken: &HashSet<DateTime<Utc>>,
    ) -> Vec<Reminder> {
        let now = Utc::now();
        let mut reminders = Vec::new();

        for time_str in self.preferred_times_for(preferences, kind) {
            let parsed = NaiveTime::parse_from_str(&time_str, "%H:%M")
                .or_else(|_| NaiveTime::parse_from_str(&time_str, "%H:%M:%S"));
            let time = match parsed {
                Ok(time) => time,
                Err(_) => {
                    warn!("Could not parse preferred time: {}", time_str);
                    continue;
                }
            };

            let today = now.date_naive().and_time(time).and_utc();
            let scheduled = if today < now {
                today + ChronoDuration::days(1)
            } else {
                today
            };
            if taken.contains(&scheduled) {
                continue;
            }

            reminders.push(Reminder::new(
                user_id,
                kind,
                Self::content_for(kind),
                scheduled,
            ));
        }

        reminders
    }

    /// Canned reminder content per kind
    fn content_for(kind: &str) -> String {
        match kind.to_lowercase().as_str() {
            "medication" => "Time to take your scheduled medication".to_string(),
            "hydration" => "Remember to drink a glass of water".to_string(),
            "exercise" => "Time for your gentle movement routine".to_string(),
            "appointment" => "You have an appointment coming up".to_string(),
            other => format!("Reminder for your {other}"),
        }
    }

    /// Top up the upcoming schedule from preferred times
    fn top_up(&self, user_id: &str, state: &mut ReminderUserState) {
        let taken: HashSet<DateTime<Utc>> =
            state.upcoming.iter().map(|r| r.scheduled_time).collect();
        let mut added = 0;
        let mut kinds: HashSet<String> = self.config.kinds.keys().cloned().collect();
        kinds.extend(state.preferences.keys().cloned());
        for kind in kinds {
            let new_reminders = self.schedule_for_kind(user_id, &kind, &state.preferences, &taken);
            added += new_reminders.len();
            state.upcoming.extend(new_reminders);
        }
        state.sort_upcoming();
        if added > 0 {
            info!("Generated {} new reminders for user {}", added, user_id);
        }
    }

    /// Alerts for delivered reminders that have gone unacknowledged past
    /// their kind's max delay
    fn check_overdue(&self, state: &ReminderUserState, now: DateTime<Utc>) -> Vec<Alert> {
        let mut alerts = Vec::new();

        for reminder in state.sent.iter() {
            if reminder.acknowledged {
                continue;
            }
            let Some(sent_at) = reminder.sent_at else {
                continue;
            };
            let kind_cfg = self.kind_config_for(&state.preferences, &reminder.kind);
            let delay_mins = (now - sent_at).num_minutes().max(0) as u64;
            if delay_mins <= kind_cfg.max_delay_mins {
                continue;
            }

            let level = if kind_cfg.priority == "high" {
                AlertLevel::Warning
            } else {
                AlertLevel::Info
            };
            alerts.push(
                Alert::new(
                    level,
                    AlertKind::ReminderOverdue,
                    format!("Overdue {} reminder: {}", reminder.kind, reminder.content),
                )
                .with_details(serde_json::json!({
                    "reminder_id": reminder.id,
                    "reminder_kind": &reminder.kind,
                    "delay_minutes": delay_mins,
                })),
            );
        }

        alerts
    }

    /// Recommendations derived from acknowledgment patterns
    fn recommendations(analysis: &ReminderAnalysis) -> Vec<Recommendation> {
        let mut recs = Vec::new();

        if analysis.acknowledgment_rate < 50.0 {
            recs.push(Recommendation {
                kind: RecommendationKind::AdjustDelivery,
                message:
                    "Consider changing reminder delivery method to improve acknowledgment rate"
                        .to_string(),
                priority: RecommendationPriority::High,
                reminder_kind: None,
            });
        }

        for (kind, stats) in &analysis.by_kind {
            if stats.rate < 50.0 && stats.sent > 3 {
                recs.push(Recommendation {
                    kind: RecommendationKind::AdjustTiming,
                    message: format!(
                        "Adjust timing for {kind} reminders to improve acknowledgment rate"
                    ),
                    priority: RecommendationPriority::Medium,
                    reminder_kind: Some(kind.clone()),
                });
            }
        }

        if analysis
            .reminder_counts
            .get("Hydration")
            .copied()
            .unwrap_or(0)
            < 3
        {
            recs.push(Recommendation {
                kind: RecommendationKind::AddReminders,
                message: "Consider adding more hydration reminders throughout the day".to_string(),
                priority: RecommendationPriority::Medium,
                reminder_kind: Some("Hydration".to_string()),
            });
        }

        if analysis
            .reminder_counts
            .get("Exercise")
            .copied()
            .unwrap_or(0)
            < 1
        {
            recs.push(Recommendation {
                kind: RecommendationKind::AddReminders,
                message: "Add exercise reminders to promote physical activity".to_string(),
                priority: RecommendationPriority::Medium,
                reminder_kind: Some("Exercise".to_string()),
            });
        }

        recs
    }

    /// Process one reminder event (acknowledgment and/or new reminder)
    pub async fn process_event(
        &self,
        user_id: &str,
        event: ReminderEvent,
    ) -> Result<ReminderOutcome> {
        self.ensure_user(user_id).await;

        if let Some(reminder_id) = event.acknowledge {
            self.acknowledge(user_id, reminder_id).await?;
        }

        if let Some(new_reminder) = event.new_reminder {
            self.add_reminder(user_id, new_reminder).await?;
        }

        let analysis = self.analyzer.analyze_reminders(user_id);
        if let Some(ref analysis) = analysis {
            let mut analyses = self.analyses.write().await;
            analyses.insert(user_id.to_string(), (analysis.clone(), Utc::now()));
        }

        let upcoming = {
            let users = self.users.read().await;
            users
                .get(user_id)
                .map(|s| s.upcoming.iter().take(MIN_UPCOMING).cloned().collect())
                .unwrap_or_default()
        };

        let recommendations = analysis
            .as_ref()
            .map(Self::recommendations)
            .unwrap_or_default();

        let narrative = match analysis {
            Some(ref analysis) if !recommendations.is_empty() => {
                let rec_text: Vec<String> = recommendations
                    .iter()
                    .map(|r| format!("- {}", r.message))
                    .collect();
                let prompt = format!(
                    "Reminder data for user {user_id}: acknowledgment rate {:.1}%. Recommendations:\n{}",
                    analysis.acknowledgment_rate,
                    rec_text.join("\n"),
                );
                Some(
                    self.narrative
                        .generate(&prompt, NarrativeKind::ReminderAnalysis)
                        .await,
                )
            }
            _ => None,
        };

        Ok(ReminderOutcome {
            analysis,
            upcoming,
            recommendations,
            narrative,
        })
    }

    /// Mark a delivered reminder acknowledged, by stable id
    pub async fn acknowledge(&self, user_id: &str, reminder_id: ReminderId) -> Result<()> {
        let mut users = self.users.write().await;
        let state = users
            .get_mut(user_id)
            .ok_or_else(|| CareError::UserNotFound(user_id.to_string()))?;

        // Sent history holds delivered reminders; upcoming may hold one
        // acknowledged ahead of time.
        let mut found = false;
        for reminder in state.sent.iter_mut() {
            if reminder.id == reminder_id {
                reminder.acknowledged = true;
                found = true;
                break;
            }
        }
        if !found {
            if let Some(reminder) = state.upcoming.iter_mut().find(|r| r.id == reminder_id) {
                reminder.acknowledged = true;
                found = true;
            }
        }
        drop(users);

        if !found {
            return Err(CareError::Validation(format!(
                "Reminder {reminder_id} not found for user {user_id}"
            )));
        }

        self.store
            .record_event(
                user_id,
                "reminder_acknowledged",
                serde_json::json!({ "reminder_id": reminder_id }),
            )
            .await;
        info!("User {} acknowledged reminder {}", user_id, reminder_id);
        Ok(())
    }

    /// Schedule a new reminder
    pub async fn add_reminder(&self, user_id: &str, new_reminder: NewReminder) -> Result<Reminder> {
        self.ensure_user(user_id).await;

        let reminder = Reminder::new(
            user_id,
            new_reminder.kind,
            new_reminder.content,
            new_reminder.scheduled_time,
        );

        let mut users = self.users.write().await;
        let state = users
            .get_mut(user_id)
            .ok_or_else(|| CareError::UserNotFound(user_id.to_string()))?;
        state.upcoming.push(reminder.clone());
        state.sort_upcoming();
        info!("Added new {} reminder for user {}", reminder.kind, user_id);
        Ok(reminder)
    }

    /// Merge per-user overrides of the configured kind settings
    pub async fn update_preferences(
        &self,
        user_id: &str,
        preferences: HashMap<String, ReminderKindConfig>,
    ) -> Result<()> {
        self.ensure_user(user_id).await;
        let mut users = self.users.write().await;
        let state = users
            .get_mut(user_id)
            .ok_or_else(|| CareError::UserNotFound(user_id.to_string()))?;
        for (kind, cfg) in preferences {
            state.preferences.insert(kind.to_lowercase(), cfg);
        }
        info!("Updated reminder preferences for user {}", user_id);
        Ok(())
    }

    /// Current reminder status for a user
    pub async fn status(&self, user_id: &str) -> Result<ReminderStatusReport> {
        let cached = {
            let analyses = self.analyses.read().await;
            analyses.get(user_id).cloned()
        };

        let (analysis, timestamp) = match cached {
            Some(entry) => entry,
            None => {
                let analysis =
                    self.analyzer
                        .analyze_reminders(user_id)
                        .ok_or_else(|| CareError::NoData {
                            user_id: user_id.to_string(),
                        })?;
                let mut analyses = self.analyses.write().await;
                analyses.insert(user_id.to_string(), (analysis.clone(), Utc::now()));
                (analysis, Utc::now())
            }
        };

        self.ensure_user(user_id).await;
        let (upcoming, alerts) = {
            let users = self.users.read().await;
            let state = users
                .get(user_id)
                .ok_or_else(|| CareError::UserNotFound(user_id.to_string()))?;
            (
                state
                    .upcoming
                    .iter()
                    .take(MIN_UPCOMING)
                    .cloned()
                    .collect::<Vec<_>>(),
                state.alerts.recent_cloned(5),
            )
        };

        let recommendations = Self::recommendations(&analysis);
        let summary = Self::summarize(&analysis, &upcoming);

        Ok(ReminderStatusReport {
            timestamp,
            analysis,
            upcoming,
            alerts,
            recommendations,
            summary,
        })
    }

    fn summarize(analysis: &ReminderAnalysis, upcoming: &[Reminder]) -> String {
        let mut summary = format!(
            "Reminder acknowledgment rate: {:.1}%. ",
            analysis.acknowledgment_rate
        );

        if let Some(next) = upcoming.first() {
            summary.push_str(&format!(
                "Next reminder: {} at {}. ",
                next.kind,
                next.scheduled_time.format("%H:%M")
            ));
        }

        match analysis.status {
            DomainStatus::Normal => summary.push_str("Reminder adherence is good."),
            DomainStatus::Attention => {
                summary.push_str("Reminder adherence needs some attention.")
            }
            DomainStatus::Alert => {
                summary.push_str("Reminder adherence requires immediate intervention.")
            }
            DomainStatus::Unknown => summary.push_str("No reminder data available."),
        }

        summary
    }
}

#[async_trait]
impl PollingAgent for DailyAssistant {
    fn name(&self) -> &'static str {
        "daily_assistant"
    }

    fn update_interval(&self) -> Duration {
        Duration::from_secs(self.config.update_interval_secs)
    }

    /// Deliver due reminders, top up the schedule, and flag overdue ones
    async fn tick(&self) -> Result<()> {
        let now = Utc::now();
        let user_ids: Vec<String> = {
            let users = self.users.read().await;
            users.keys().cloned().collect()
        };

        for user_id in user_ids {
            let (delivered, overdue_alerts) = {
                let mut users = self.users.write().await;
                let Some(state) = users.get_mut(&user_id) else {
                    continue;
                };

                let mut delivered = Vec::new();
                let mut remaining = Vec::new();
                for mut reminder in state.upcoming.drain(..) {
                    if reminder.is_due(now) {
                        reminder.sent = true;
                        reminder.sent_at = Some(now);
                        delivered.push(reminder.clone());
                        state.sent.push(reminder);
                    } else {
                        remaining.push(reminder);
                    }
                }
                state.upcoming = remaining;

                if state.upcoming.len() < MIN_UPCOMING {
                    self.top_up(&user_id, state);
                }

                let overdue = self.check_overdue(state, now);
                state.alerts.extend(overdue.iter().cloned());
                (delivered, overdue)
            };

            for reminder in &delivered {
                // Delivery is simulated; the log line is the notification
                info!(
                    "Sending reminder to user {}: {} - {}",
                    user_id, reminder.kind, reminder.content
                );
                self.store
                    .insert(
                        tables::REMINDERS,
                        serde_json::json!({
                            "user_id": user_id,
                            "timestamp": now,
                            "reminder_id": reminder.id,
                            "type": &reminder.kind,
                            "content": &reminder.content,
                            "scheduled_time": reminder.scheduled_time,
                            "sent": true,
                            "acknowledged": false,
                        }),
                    )
                    .await;
            }

            for alert in &overdue_alerts {
                self.store
                    .insert(
                        tables::ALERTS,
                        serde_json::json!({
                            "user_id": user_id,
                            "source": "daily_assistant",
                            "level": alert.level.as_str(),
                            "message": &alert.message,
                            "resolved": false,
                        }),
                    )
                    .await;
            }
            if !overdue_alerts.is_empty() {
                info!(
                    "Generated {} overdue reminder alerts for user {}",
                    overdue_alerts.len(),
                    user_id
                );
            }

            if !delivered.is_empty() {
                debug!(
                    "Delivered {} reminders to user {}",
                    delivered.len(),
                    user_id
                );
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::MemoryAnalyzer;
    use crate::narrative::TemplateClient;

    fn assistant() -> DailyAssistant {
        DailyAssistant::new(
            ReminderAgentConfig::default(),
            Arc::new(MemoryAnalyzer::new()),
            Arc::new(MemoryStore::new()),
            Arc::new(TemplateClient::new()),
        )
    }

    #[tokio::test]
    async fn test_schedule_is_seeded_and_sorted() {
        let assistant = assistant();
        assistant.ensure_user("U1000").await;

        let users = assistant.users.read().await;
        let upcoming = &users["U1000"].upcoming;
        assert!(!upcoming.is_empty());
        assert!(upcoming
            .windows(2)
            .all(|w| w[0].scheduled_time <= w[1].scheduled_time));
    }

    #[tokio::test]
    async fn test_add_and_acknowledge_by_stable_id() {
        let assistant = assistant();
        let reminder = assistant
            .add_reminder(
                "U1000",
                NewReminder {
                    kind: "Medication".to_string(),
                    content: "Evening dose".to_string(),
                    scheduled_time: Utc::now() + ChronoDuration::hours(1),
                },
            )
            .await
            .unwrap();

        assistant.acknowledge("U1000", reminder.id).await.unwrap();

        let users = assistant.users.read().await;
        let acked = users["U1000"]
            .upcoming
            .iter()
            .find(|r| r.id == reminder.id)
            .unwrap();
        assert!(acked.acknowledged);
    }

    #[tokio::test]
    async fn test_acknowledge_unknown_id_is_soft_error() {
        let assistant = assistant();
        assistant.ensure_user("U1000").await;
        let err = assistant
            .acknowledge("U1000", ReminderId::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, CareError::Validation(_)));
    }

    #[tokio::test]
    async fn test_due_reminders_are_delivered_on_tick() {
        let assistant = assistant();
        assistant
            .add_reminder(
                "U1000",
                NewReminder {
                    kind: "Hydration".to_string(),
                    content: "Water".to_string(),
                    scheduled_time: Utc::now() - ChronoDuration::minutes(1),
                },
            )
            .await
            .unwrap();

        assistant.tick().await.unwrap();

        let users = assistant.users.read().await;
        let state = &users["U1000"];
        assert!(state.sent.iter().any(|r| r.sent && r.content == "Water"));
        assert!(!state.upcoming.iter().any(|r| r.content == "Water"));
    }

    #[tokio::test]
    async fn test_overdue_reminder_raises_alert() {
        let assistant = assistant();
        assistant.ensure_user("U1000").await;

        {
            let mut users = assistant.users.write().await;
            let state = users.get_mut("U1000").unwrap();
            let mut reminder = Reminder::new(
                "U1000",
                "Medication",
                "Morning dose",
                Utc::now() - ChronoDuration::hours(3),
            );
            reminder.sent = true;
            reminder.sent_at = Some(Utc::now() - ChronoDuration::hours(2));
            state.sent.push(reminder);
        }

        let alerts = {
            let users = assistant.users.read().await;
            assistant.check_overdue(&users["U1000"], Utc::now())
        };
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].kind, AlertKind::ReminderOverdue);
    }

    #[tokio::test]
    async fn test_preference_override_changes_overdue_level() {
        let assistant = assistant();
        let mut prefs = HashMap::new();
        prefs.insert(
            "medication".to_string(),
            ReminderKindConfig {
                priority: "high".to_string(),
                max_delay_mins: 30,
                preferred_times: vec![],
            },
        );
        assistant
            .update_preferences("U1000", prefs)
            .await
            .unwrap();

        {
            let mut users = assistant.users.write().await;
            let state = users.get_mut("U1000").unwrap();
            let mut reminder = Reminder::new(
                "U1000",
                "Medication",
                "Morning dose",
                Utc::now() - ChronoDuration::hours(2),
            );
            reminder.sent = true;
            reminder.sent_at = Some(Utc::now() - ChronoDuration::hours(1));
            state.sent.push(reminder);
        }

        let alerts = {
            let users = assistant.users.read().await;
            assistant.check_overdue(&users["U1000"], Utc::now())
        };
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].level, AlertLevel::Warning);
    }

    #[test]
    fn test_low_ack_rate_drives_recommendations() {
        use crate::analyzer::AckStats;

        let analysis = ReminderAnalysis {
            timestamp: Utc::now(),
            reminder_counts: HashMap::from([("Medication".to_string(), 10)]),
            sent_count: 10,
            acknowledged_count: 2,
            acknowledgment_rate: 20.0,
            by_kind: HashMap::from([(
                "Medication".to_string(),
                AckStats {
                    sent: 10,
                    acknowledged: 2,
                    rate: 20.0,
                },
            )]),
            status: DomainStatus::Alert,
            concerns: vec![],
        };

        let recs = DailyAssistant::recommendations(&analysis);
        assert!(recs
            .iter()
            .any(|r| r.kind == RecommendationKind::AdjustDelivery));
        assert!(recs
            .iter()
            .any(|r| r.kind == RecommendationKind::AdjustTiming));
        // No hydration or exercise history either
        assert!(recs
            .iter()
            .filter(|r| r.kind == RecommendationKind::AddReminders)
            .count()
            >= 2);
    }
}

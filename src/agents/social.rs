//! Social engagement agent
//!
//! Tracks social interactions weighted by how engaging they are, flags
//! isolation, and suggests activities.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use tokio::sync::RwLock;
use tracing::info;

use crate::analyzer::HistoryAnalyzer;
use crate::config::SocialAgentConfig;
use crate::domain::{
    Alert, AlertKind, AlertLevel, BoundedHistory, DomainStatus, InteractionKind, Recommendation,
    RecommendationKind, RecommendationPriority, SocialEvent,
};
use crate::error::{CareError, Result};
use crate::narrative::NarrativeClient;
use crate::persistence::{tables, MemoryStore};

use super::PollingAgent;

const INTERACTION_HISTORY_CAP: usize = 100;
/// Social alerts keep a shorter history than the other domains
const ALERT_HISTORY_CAP: usize = 10;
/// Weekly interactions below this need attention
const MIN_WEEKLY_INTERACTIONS: usize = 3;
/// Expected interactions per week for the default daily preference
const EXPECTED_WEEKLY: usize = 7;

/// Social analysis for one user
#[derive(Debug, Clone, PartialEq)]
pub struct SocialAnalysis {
    pub timestamp: DateTime<Utc>,
    pub weekly_interaction_count: usize,
    pub monthly_interaction_count: usize,
    pub weekly_interaction_minutes: f64,
    pub monthly_interaction_minutes: f64,
    pub interaction_kind_counts: HashMap<InteractionKind, usize>,
    pub contact_kind_counts: HashMap<String, usize>,
    pub average_duration_minutes: f64,
    pub hours_since_last_interaction: Option<f64>,
    pub status: DomainStatus,
    pub concerns: Vec<String>,
}

struct SocialUserState {
    interactions: BoundedHistory<SocialEvent>,
    alerts: BoundedHistory<Alert>,
    last_interaction_time: Option<DateTime<Utc>>,
}

impl SocialUserState {
    fn new() -> Self {
        Self {
            interactions: BoundedHistory::new(INTERACTION_HISTORY_CAP),
            alerts: BoundedHistory::new(ALERT_HISTORY_CAP),
            last_interaction_time: None,
        }
    }
}

/// Result of processing one social event
#[derive(Debug, Clone)]
pub struct SocialOutcome {
    pub analysis: SocialAnalysis,
    pub alerts: Vec<Alert>,
    pub suggestions: Vec<Recommendation>,
}

/// Snapshot returned by status queries
#[derive(Debug, Clone)]
pub struct SocialStatusReport {
    pub timestamp: DateTime<Utc>,
    pub analysis: SocialAnalysis,
    pub alerts: Vec<Alert>,
    pub suggestions: Vec<Recommendation>,
    pub summary: String,
}

/// Agent responsible for monitoring and promoting social engagement
pub struct SocialCompanion {
    config: SocialAgentConfig,
    analyzer: Arc<dyn HistoryAnalyzer>,
    store: Arc<MemoryStore>,
    #[allow(dead_code)]
    narrative: Arc<dyn NarrativeClient>,
    users: RwLock<HashMap<String, SocialUserState>>,
    analyses: RwLock<HashMap<String, (SocialAnalysis, DateTime<Utc>)>>,
}

impl SocialCompanion {
    pub fn new(
        config: SocialAgentConfig,
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
        info!("Initialized social data for {} users", user_ids.len());
    }

    async fn ensure_user(&self, user_id: &str) {
        let mut users = self.users.write().await;
        users
            .entry(user_id.to_string())
            .or_insert_with(SocialUserState::new);
    }

    fn compute_analysis(&self, state: &SocialUserState) -> SocialAnalysis {
        let now = Utc::now();
        let one_week_ago = now - ChronoDuration::days(7);
        let one_month_ago = now - ChronoDuration::days(30);

        let weekly: Vec<&SocialEvent> = state
            .interactions
            .iter()
            .filter(|i| i.timestamp > one_week_ago)
            .collect();
        let monthly: Vec<&SocialEvent> = state
            .interactions
            .iter()
            .filter(|i| i.timestamp > one_month_ago)
            .collect();

        let weighted_minutes = |events: &[&SocialEvent]| -> f64 {
            events
                .iter()
                .map(|e| e.duration_minutes as f64 * e.kind.weight())
                .sum()
        };

        let mut interaction_kind_counts: HashMap<InteractionKind, usize> = HashMap::new();
        let mut contact_kind_counts: HashMap<String, usize> = HashMap::new();
        for event in &monthly {
            *interaction_kind_counts.entry(event.kind).or_default() += 1;
            *contact_kind_counts
                .entry(event.contact_kind.clone())
                .or_default() += 1;
        }

        let average_duration_minutes = if monthly.is_empty() {
            0.0
        } else {
            monthly.iter().map(|e| e.duration_minutes as f64).sum::<f64>() / monthly.len() as f64
        };

        let hours_since_last_interaction = state
            .last_interaction_time
            .map(|t| (now - t).num_seconds() as f64 / 3600.0);

        let isolation_threshold = self.config.isolation_threshold_hours as f64;
        let isolated = match hours_since_last_interaction {
            Some(hours) => hours > isolation_threshold,
            None => true,
        };

        let status = if isolated {
            DomainStatus::Alert
        } else if weekly.len() < MIN_WEEKLY_INTERACTIONS {
            DomainStatus::Attention
        } else {
            DomainStatus::Normal
        };

        let mut concerns = Vec::new();
        if isolated {
            concerns.push("Extended period without social interaction".to_string());
        }
        if weekly.len() < MIN_WEEKLY_INTERACTIONS {
            concerns.push("Low weekly interaction count".to_string());
        }
        if interaction_kind_counts.len() < 2 {
            concerns.push("Limited variety of interaction types".to_string());
        }
        if average_duration_minutes < 15.0 && !monthly.is_empty() {
            concerns.push("Short average interaction duration".to_string());
        }

        SocialAnalysis {
            timestamp: now,
            weekly_interaction_count: weekly.len(),
            monthly_interaction_count: monthly.len(),
            weekly_interaction_minutes: weighted_minutes(&weekly),
            monthly_interaction_minutes: weighted_minutes(&monthly),
            interaction_kind_counts,
            contact_kind_counts,
            average_duration_minutes,
            hours_since_last_interaction,
            status,
            concerns,
        }
    }

    /// Isolation and frequency alerts from the analysis
    fn generate_alerts(&self, analysis: &SocialAnalysis) -> Vec<Alert> {
        let mut alerts = Vec::new();
        let threshold = self.config.isolation_threshold_hours as f64;

        if let Some(hours) = analysis.hours_since_last_interaction {
            if hours > threshold {
                let level = if hours > threshold * 2.0 {
                    AlertLevel::Urgent
                } else {
                    AlertLevel::Warning
                };
                alerts.push(
                    Alert::new(
                        level,
                        AlertKind::SocialIsolation,
                        format!(
                            "Social isolation detected: {} hours since last social interaction",
                            hours as u64
                        ),
                    )
                    .with_details(serde_json::json!({
                        "hours_since_interaction": hours as u64,
                        "threshold_hours": self.config.isolation_threshold_hours,
                    })),
                );
            }
        }

        if analysis.weekly_interaction_count < EXPECTED_WEEKLY / 2 {
            alerts.push(
                Alert::new(
                    AlertLevel::Info,
                    AlertKind::LowInteractionFrequency,
                    format!(
                        "Low social interaction frequency: {} interactions in the past week (expected: {})",
                        analysis.weekly_interaction_count, EXPECTED_WEEKLY
                    ),
                )
                .with_details(serde_json::json!({
                    "weekly_interactions": analysis.weekly_interaction_count,
                    "expected_weekly": EXPECTED_WEEKLY,
                })),
            );
        }

        alerts
    }

    /// Suggested activities based on what has been missing lately
    fn suggestions(analysis: &SocialAnalysis) -> Vec<Recommendation> {
        let mut suggestions = Vec::new();

        if analysis
            .interaction_kind_counts
            .get(&InteractionKind::InPersonVisit)
            .copied()
            .unwrap_or(0)
            == 0
        {
            suggestions.push(Recommendation {
                kind: RecommendationKind::SuggestActivity,
                message: "Arrange an in-person visit from family or friends this week".to_string(),
                priority: RecommendationPriority::High,
                reminder_kind: None,
            });
        }

        if analysis.weekly_interaction_count < MIN_WEEKLY_INTERACTIONS {
            suggestions.push(Recommendation {
                kind: RecommendationKind::SuggestActivity,
                message: "Schedule a video call with a family member".to_string(),
                priority: RecommendationPriority::Medium,
                reminder_kind: None,
            });
        }

        if analysis
            .interaction_kind_counts
            .get(&InteractionKind::GroupActivity)
            .copied()
            .unwrap_or(0)
            == 0
        {
            suggestions.push(Recommendation {
                kind: RecommendationKind::SuggestActivity,
                message: "Look into a local group activity or community event".to_string(),
                priority: RecommendationPriority::Low,
                reminder_kind: None,
            });
        }

        suggestions
    }

    async fn persist_alerts(&self, user_id: &str, alerts: &[Alert]) {
        for alert in alerts {
            self.store
                .insert(
                    tables::ALERTS,
                    serde_json::json!({
                        "user_id": user_id,
                        "source": "social_companion",
                        "level": alert.level.as_str(),
                        "message": &alert.message,
                        "resolved": false,
                    }),
                )
                .await;
        }
        if !alerts.is_empty() {
            info!(
                "Generated {} social alerts for user {}",
                alerts.len(),
                user_id
            );
        }
    }

    /// Process one recorded interaction
    pub async fn process_event(&self, user_id: &str, event: SocialEvent) -> Result<SocialOutcome> {
        self.ensure_user(user_id).await;

        let analysis = {
            let mut users = self.users.write().await;
            let state = users
                .get_mut(user_id)
                .ok_or_else(|| CareError::UserNotFound(user_id.to_string()))?;
            state.last_interaction_time = Some(event.timestamp);
            state.interactions.push(event);
            self.compute_analysis(state)
        };

        // A fresh interaction clears isolation, so only the frequency alert
        // can fire here; the isolation check belongs to the periodic tick.
        let alerts = self.generate_alerts(&analysis);
        {
            let mut users = self.users.write().await;
            if let Some(state) = users.get_mut(user_id) {
                state.alerts.extend(alerts.iter().cloned());
            }
        }

        {
            let mut analyses = self.analyses.write().await;
            analyses.insert(user_id.to_string(), (analysis.clone(), Utc::now()));
        }

        self.persist_alerts(user_id, &alerts).await;

        let suggestions = Self::suggestions(&analysis);
        Ok(SocialOutcome {
            analysis,
            alerts,
            suggestions,
        })
    }

    /// Current social status for a user
    pub async fn status(&self, user_id: &str) -> Result<SocialStatusReport> {
        self.ensure_user(user_id).await;

        let analysis = {
            let users = self.users.read().await;
            let state = users
                .get(user_id)
                .ok_or_else(|| CareError::UserNotFound(user_id.to_string()))?;
            if state.interactions.is_empty() {
                return Err(CareError::NoData {
                    user_id: user_id.to_string(),
                });
            }
            self.compute_analysis(state)
        };

        {
            let mut analyses = self.analyses.write().await;
            analyses.insert(user_id.to_string(), (analysis.clone(), Utc::now()));
        }

        let alerts = {
            let users = self.users.read().await;
            users
                .get(user_id)
                .map(|s| s.alerts.recent_cloned(5))
                .unwrap_or_default()
        };

        let suggestions = Self::suggestions(&analysis);
        let summary = Self::summarize(&analysis);

        Ok(SocialStatusReport {
            timestamp: analysis.timestamp,
            analysis,
            alerts,
            suggestions,
            summary,
        })
    }

    fn summarize(analysis: &SocialAnalysis) -> String {
        let mut summary = format!(
            "{} social interactions in the past week. ",
            analysis.weekly_interaction_count
        );
        match analysis.status {
            DomainStatus::Normal => summary.push_str("Social engagement looks healthy."),
            DomainStatus::Attention => summary.push_str(&format!(
                "Social engagement needs attention: {}",
                analysis.concerns.join("; ")
            )),
            DomainStatus::Alert => summary.push_str(&format!(
                "ALERT: Social isolation risk: {}",
                analysis.concerns.join("; ")
            )),
            DomainStatus::Unknown => summary.push_str("No social data available."),
        }
        summary
    }
}

#[async_trait]
impl PollingAgent for SocialCompanion {
    fn name(&self) -> &'static str {
        "social_companion"
    }

    fn update_interval(&self) -> Duration {
        Duration::from_secs(self.config.update_interval_secs)
    }

    /// Re-analyze stale users and run the isolation check
    async fn tick(&self) -> Result<()> {
        let user_ids: Vec<String> = {
            let users = self.users.read().await;
            users.keys().cloned().collect()
        };

        for user_id in user_ids {
            let stale = {
                let analyses = self.analyses.read().await;
                match analyses.get(&user_id) {
                    Some((_, at)) => {
                        (Utc::now() - *at).num_seconds() as u64 >= self.config.update_interval_secs
                    }
                    None => true,
                }
            };
            if !stale {
                continue;
            }

            let (analysis, alerts) = {
                let mut users = self.users.write().await;
                let Some(state) = users.get_mut(&user_id) else {
                    continue;
                };
                if state.interactions.is_empty() {
                    continue;
                }
                let analysis = self.compute_analysis(state);
                let alerts = self.generate_alerts(&analysis);
                state.alerts.extend(alerts.iter().cloned());
                (analysis, alerts)
            };

            {
                let mut analyses = self.analyses.write().await;
                analyses.insert(user_id.clone(), (analysis, Utc::now()));
            }
            self.persist_alerts(&user_id, &alerts).await;
        }

        Ok(())
    }
}

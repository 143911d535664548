//! Safety monitoring agent
//!
//! Tracks movement and location, detects falls and unusual activity, and
//! flags extended inactivity against per-room thresholds.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::analyzer::{HistoryAnalyzer, SafetyAnalysis};
use crate::config::SafetyAgentConfig;
use crate::domain::{
    Alert, AlertKind, AlertLevel, BoundedHistory, DomainStatus, SafetyReading,
};
use crate::error::{CareError, Result};
use crate::narrative::{NarrativeClient, NarrativeKind};
use crate::persistence::{tables, MemoryStore};

use super::PollingAgent;

const MOVEMENT_HISTORY_CAP: usize = 100;
const LOCATION_HISTORY_CAP: usize = 100;
const ALERT_HISTORY_CAP: usize = 20;

#[derive(Debug, Clone)]
struct LocationEntry {
    #[allow(dead_code)]
    timestamp: DateTime<Utc>,
    location: String,
}

struct SafetyUserState {
    movements: BoundedHistory<SafetyReading>,
    locations: BoundedHistory<LocationEntry>,
    falls: BoundedHistory<SafetyReading>,
    alerts: BoundedHistory<Alert>,
    last_activity: Option<String>,
    last_location: Option<String>,
    last_movement_time: Option<DateTime<Utc>>,
    /// Room (lowercased) -> inactivity threshold override, minutes
    inactivity_overrides: HashMap<String, u64>,
}

impl SafetyUserState {
    fn new() -> Self {
        Self {
            movements: BoundedHistory::new(MOVEMENT_HISTORY_CAP),
            locations: BoundedHistory::new(LOCATION_HISTORY_CAP),
            falls: BoundedHistory::new(ALERT_HISTORY_CAP),
            alerts: BoundedHistory::new(ALERT_HISTORY_CAP),
            last_activity: None,
            last_location: None,
            last_movement_time: None,
            inactivity_overrides: HashMap::new(),
        }
    }
}

/// Result of processing one safety reading
#[derive(Debug, Clone)]
pub struct SafetyOutcome {
    pub analysis: SafetyAnalysis,
    pub alerts: Vec<Alert>,
    /// Fall detected or any urgent alert; the coordinator forwards these to
    /// the emergency responder
    pub emergency: bool,
    pub narrative: Option<String>,
}

/// Snapshot returned by status queries
#[derive(Debug, Clone)]
pub struct SafetyStatusReport {
    pub timestamp: DateTime<Utc>,
    pub analysis: SafetyAnalysis,
    pub alerts: Vec<Alert>,
    pub summary: String,
}

/// Agent responsible for monitoring safety and detecting falls or unusual
/// movement patterns
pub struct SafetyGuardian {
    config: SafetyAgentConfig,
    analyzer: Arc<dyn HistoryAnalyzer>,
    store: Arc<MemoryStore>,
    narrative: Arc<dyn NarrativeClient>,
    users: RwLock<HashMap<String, SafetyUserState>>,
    analyses: RwLock<HashMap<String, (SafetyAnalysis, DateTime<Utc>)>>,
}

impl SafetyGuardian {
    pub fn new(
        config: SafetyAgentConfig,
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
        info!("Initialized safety data for {} users", user_ids.len());
    }

    async fn ensure_user(&self, user_id: &str) {
        {
            let users = self.users.read().await;
            if users.contains_key(user_id) {
                return;
            }
        }

        let mut state = SafetyUserState::new();
        if let Some(records) = self.analyzer.safety_records(user_id) {
            for record in records {
                let reading = SafetyReading {
                    timestamp: record.timestamp,
                    location: record.location,
                    activity: record.activity,
                    fall_detected: record.fall_detected,
                    impact_force: record.impact_force,
                    post_fall_inactivity_secs: record.post_fall_inactivity_secs,
                };
                state.locations.push(LocationEntry {
                    timestamp: reading.timestamp,
                    location: reading.location.clone(),
                });
                if reading.fall_detected {
                    state.falls.push(reading.clone());
                }
                state.movements.push(reading);
            }
        }
        if let Some(latest) = state.movements.latest() {
            state.last_activity = Some(latest.activity.clone());
            state.last_location = Some(latest.location.clone());
            state.last_movement_time = Some(Utc::now());
        }

        if let Some(analysis) = self.analyzer.analyze_safety(user_id) {
            let mut analyses = self.analyses.write().await;
            analyses.insert(user_id.to_string(), (analysis, Utc::now()));
        }

        let mut users = self.users.write().await;
        users.entry(user_id.to_string()).or_insert(state);
    }

    /// Whether an activity is unexpected for the room
    fn is_unusual_activity(&self, activity: &str, location: &str) -> bool {
        let expected = self.config.expected_activities(location);
        if expected.is_empty() {
            return false;
        }
        !expected.iter().any(|a| a == activity)
    }

    /// Recompute the analysis over the user's movement history
    fn compute_analysis(state: &SafetyUserState) -> Option<SafetyAnalysis> {
        let latest = state.movements.latest()?;

        let mut movement_counts: HashMap<String, usize> = HashMap::new();
        for reading in state.movements.iter() {
            *movement_counts.entry(reading.activity.clone()).or_default() += 1;
        }

        let fall_count = state.movements.iter().filter(|r| r.fall_detected).count();
        let inactivity_count = movement_counts.get("No Movement").copied().unwrap_or(0);
        let inactivity_percentage =
            inactivity_count as f64 / state.movements.len() as f64 * 100.0;

        let mut concerns = Vec::new();
        if latest.fall_detected {
            concerns.push("Recent fall detected".to_string());
        }
        if fall_count > 0 {
            concerns.push("History of falls".to_string());
        }
        if inactivity_percentage > 50.0 {
            concerns.push("High levels of inactivity".to_string());
        }
        if latest.activity == "No Movement" && latest.post_fall_inactivity_secs > 300 {
            concerns.push("Extended period of no movement".to_string());
        }

        Some(SafetyAnalysis {
            timestamp: latest.timestamp,
            current_location: latest.location.clone(),
            current_activity: latest.activity.clone(),
            movement_counts,
            fall_count,
            latest_fall: latest.fall_detected,
            inactivity_percentage,
            status: DomainStatus::from_concern_count(concerns.len()),
            concerns,
        })
    }

    /// Derive alerts from the reading and the recomputed analysis
    fn generate_alerts(
        &self,
        state: &SafetyUserState,
        reading: &SafetyReading,
        analysis: &SafetyAnalysis,
    ) -> Vec<Alert> {
        let mut alerts = Vec::new();

        if reading.fall_detected {
            alerts.push(
                Alert::new(
                    AlertLevel::Urgent,
                    AlertKind::FallDetected,
                    format!("Fall detected in {}", reading.location),
                )
                .with_details(serde_json::json!({
                    "location": &reading.location,
                    "impact_force": reading.impact_force.as_str(),
                    "post_fall_inactivity_secs": reading.post_fall_inactivity_secs,
                })),
            );
        }

        if self.is_unusual_activity(&reading.activity, &reading.location) {
            alerts.push(
                Alert::new(
                    AlertLevel::Info,
                    AlertKind::UnusualActivity,
                    format!(
                        "Unusual activity detected: {} in {}",
                        reading.activity, reading.location
                    ),
                )
                .with_details(serde_json::json!({
                    "activity": &reading.activity,
                    "location": &reading.location,
                })),
            );
        }

        let total: usize = analysis.movement_counts.values().sum();
        if total > 0 {
            let no_movement = analysis
                .movement_counts
                .get("No Movement")
                .copied()
                .unwrap_or(0);
            if no_movement as f64 / total as f64 > 0.7 {
                alerts.push(
                    Alert::new(
                        AlertLevel::Warning,
                        AlertKind::InactivityPattern,
                        "Excessive 'No Movement' activity detected in movement patterns",
                    )
                    .with_details(serde_json::json!({
                        "percentage": no_movement as f64 / total as f64 * 100.0,
                    })),
                );
            }

            let walking = analysis.movement_counts.get("Walking").copied().unwrap_or(0);
            if (walking as f64 / total as f64) < 0.1 {
                alerts.push(
                    Alert::new(
                        AlertLevel::Info,
                        AlertKind::LimitedWalking,
                        "Limited walking activity detected in movement patterns",
                    )
                    .with_details(serde_json::json!({
                        "percentage": walking as f64 / total as f64 * 100.0,
                    })),
                );
            }
        }

        if state.locations.len() > 10 {
            let mut unique: Vec<&str> = state
                .locations
                .iter()
                .map(|e| e.location.as_str())
                .collect();
            unique.sort_unstable();
            unique.dedup();
            if unique.len() == 1 {
                alerts.push(
                    Alert::new(
                        AlertLevel::Info,
                        AlertKind::LimitedMobility,
                        format!(
                            "User has remained only in {} for extended period",
                            unique[0]
                        ),
                    )
                    .with_details(serde_json::json!({ "location": unique[0] })),
                );
            }
        }

        alerts
    }

    /// Inactivity check run on the periodic tick
    fn check_inactivity(&self, user_id: &str, state: &SafetyUserState) -> Vec<Alert> {
        let mut alerts = Vec::new();

        let (Some(last_activity), Some(last_location), Some(last_movement_time)) = (
            state.last_activity.as_deref(),
            state.last_location.as_deref(),
            state.last_movement_time,
        ) else {
            return alerts;
        };

        if last_activity != "No Movement" {
            return alerts;
        }

        let room = last_location.to_lowercase();
        let threshold_mins = state
            .inactivity_overrides
            .get(&room)
            .copied()
            .unwrap_or_else(|| self.config.inactivity_threshold_mins(&room));

        let inactive_mins = (Utc::now() - last_movement_time).num_minutes().max(0) as u64;
        if inactive_mins > threshold_mins {
            let level = if inactive_mins > threshold_mins * 2 {
                AlertLevel::Urgent
            } else {
                AlertLevel::Warning
            };
            alerts.push(
                Alert::new(
                    level,
                    AlertKind::ExcessiveInactivity,
                    format!(
                        "User has been inactive in {room} for {inactive_mins} minutes (threshold: {threshold_mins} minutes)"
                    ),
                )
                .with_details(serde_json::json!({
                    "location": room,
                    "inactive_minutes": inactive_mins,
                    "threshold_minutes": threshold_mins,
                })),
            );
            info!(
                "Inactivity alert for user {}: {} minutes in {}",
                user_id, inactive_mins, room
            );
        }

        alerts
    }

    async fn persist_alerts(&self, user_id: &str, alerts: &[Alert]) {
        for alert in alerts {
            self.store
                .insert(
                    tables::ALERTS,
                    serde_json::json!({
                        "user_id": user_id,
                        "source": "safety_guardian",
                        "level": alert.level.as_str(),
                        "message": &alert.message,
                        "resolved": false,
                    }),
                )
                .await;
        }
        if !alerts.is_empty() {
            info!(
                "Generated {} safety alerts for user {}",
                alerts.len(),
                user_id
            );
        }
    }

    /// Process one incoming movement/location reading
    pub async fn process_reading(
        &self,
        user_id: &str,
        reading: SafetyReading,
    ) -> Result<SafetyOutcome> {
        self.ensure_user(user_id).await;

        self.store
            .insert(
                tables::SAFETY_DATA,
                serde_json::json!({
                    "user_id": user_id,
                    "timestamp": reading.timestamp,
                    "location": &reading.location,
                    "activity": &reading.activity,
                    "fall_detected": reading.fall_detected,
                    "unusual_activity":
                        self.is_unusual_activity(&reading.activity, &reading.location),
                }),
            )
            .await;

        let (analysis, alerts) = {
            let mut users = self.users.write().await;
            let state = users
                .get_mut(user_id)
                .ok_or_else(|| CareError::UserNotFound(user_id.to_string()))?;

            state.locations.push(LocationEntry {
                timestamp: reading.timestamp,
                location: reading.location.clone(),
            });
            if reading.fall_detected {
                state.falls.push(reading.clone());
            }
            state.last_activity = Some(reading.activity.clone());
            state.last_location = Some(reading.location.clone());
            state.last_movement_time = Some(Utc::now());
            state.movements.push(reading.clone());

            let analysis = Self::compute_analysis(state).ok_or_else(|| CareError::NoData {
                user_id: user_id.to_string(),
            })?;
            let alerts = self.generate_alerts(state, &reading, &analysis);
            state.alerts.extend(alerts.iter().cloned());
            (analysis, alerts)
        };

        {
            let mut analyses = self.analyses.write().await;
            analyses.insert(user_id.to_string(), (analysis.clone(), Utc::now()));
        }

        self.persist_alerts(user_id, &alerts).await;

        let emergency =
            analysis.latest_fall || alerts.iter().any(|a| a.level == AlertLevel::Urgent);

        let narrative = if alerts.is_empty() && !analysis.latest_fall {
            None
        } else {
            let alert_text: Vec<String> =
                alerts.iter().map(|a| format!("- {}", a.message)).collect();
            let prompt = format!(
                "Safety data for user {user_id}: location {}, activity {}, fall detected {}. Alerts:\n{}",
                analysis.current_location,
                analysis.current_activity,
                analysis.latest_fall,
                alert_text.join("\n"),
            );
            Some(
                self.narrative
                    .generate(&prompt, NarrativeKind::SafetyAnalysis)
                    .await,
            )
        };

        Ok(SafetyOutcome {
            analysis,
            alerts,
            emergency,
            narrative,
        })
    }

    /// Current safety status for a user
    pub async fn status(&self, user_id: &str) -> Result<SafetyStatusReport> {
        let cached = {
            let analyses = self.analyses.read().await;
            analyses.get(user_id).cloned()
        };

        let (analysis, timestamp) = match cached {
            Some(entry) => entry,
            None => {
                self.ensure_user(user_id).await;
                let users = self.users.read().await;
                let state = users
                    .get(user_id)
                    .ok_or_else(|| CareError::UserNotFound(user_id.to_string()))?;
                let analysis =
                    Self::compute_analysis(state).ok_or_else(|| CareError::NoData {
                        user_id: user_id.to_string(),
                    })?;
                drop(users);
                let mut analyses = self.analyses.write().await;
                analyses.insert(user_id.to_string(), (analysis.clone(), Utc::now()));
                (analysis, Utc::now())
            }
        };

        let alerts = {
            let users = self.users.read().await;
            users
                .get(user_id)
                .map(|s| s.alerts.recent_cloned(5))
                .unwrap_or_default()
        };

        let summary = Self::summarize(&analysis);
        Ok(SafetyStatusReport {
            timestamp,
            analysis,
            alerts,
            summary,
        })
    }

    fn summarize(analysis: &SafetyAnalysis) -> String {
        let mut summary = format!(
            "Currently {} in {}. ",
            analysis.current_activity, analysis.current_location
        );
        match analysis.status {
            DomainStatus::Normal => summary.push_str("No safety concerns detected."),
            DomainStatus::Attention => summary.push_str(&format!(
                "Safety requires attention: {}",
                analysis.concerns.join("; ")
            )),
            DomainStatus::Alert => summary.push_str(&format!(
                "ALERT: Safety requires immediate action: {}",
                analysis.concerns.join("; ")
            )),
            DomainStatus::Unknown => summary.push_str("No safety data available."),
        }
        summary
    }

    /// Override the inactivity threshold for a user and room
    pub async fn update_inactivity_threshold(
        &self,
        user_id: &str,
        room: &str,
        threshold_mins: u64,
    ) -> Result<()> {
        if threshold_mins < 5 {
            return Err(CareError::Validation(
                "Threshold too low. Minimum is 5 minutes.".to_string(),
            ));
        }
        if threshold_mins > 720 {
            return Err(CareError::Validation(
                "Threshold too high. Maximum is 720 minutes (12 hours).".to_string(),
            ));
        }

        self.ensure_user(user_id).await;
        let mut users = self.users.write().await;
        let state = users
            .get_mut(user_id)
            .ok_or_else(|| CareError::UserNotFound(user_id.to_string()))?;
        state
            .inactivity_overrides
            .insert(room.to_lowercase(), threshold_mins);
        info!(
            "Updated inactivity threshold for user {}, room {}: {} minutes",
            user_id, room, threshold_mins
        );
        Ok(())
    }
}

#[async_trait]
impl PollingAgent for SafetyGuardian {
    fn name(&self) -> &'static str {
        "safety_guardian"
    }

    fn update_interval(&self) -> Duration {
        Duration::from_secs(self.config.update_interval_secs)
    }

    /// Re-analyze stale users and run the inactivity check
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

            let result = {
                let mut users = self.users.write().await;
                users.get_mut(&user_id).map(|state| {
                    let analysis = Self::compute_analysis(state);
                    let alerts = self.check_inactivity(&user_id, state);
                    state.alerts.extend(alerts.iter().cloned());
                    (analysis, alerts)
                })
            };

            let Some((analysis, alerts)) = result else {
                warn!("No safety state for user {}", user_id);
                continue;
            };

            if let Some(analysis) = analysis {
                let mut analyses = self.analyses.write().await;
                analyses.insert(user_id.clone(), (analysis, Utc::now()));
            }
            self.persist_alerts(&user_id, &alerts).await;
        }

        Ok(())
    }
}

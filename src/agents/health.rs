//! Health monitoring agent
//!
//! Ingests vitals readings, keeps a bounded per-user history, compares the
//! latest values against per-user thresholds (personalized from historical
//! means once enough samples exist), and raises two-tier alerts.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::analyzer::{BloodPressureStats, HealthAnalysis, HistoryAnalyzer, MetricStats};
use crate::config::{HealthAgentConfig, MetricBand};
use crate::domain::{
    threshold_severity, Alert, AlertKind, AlertLevel, BoundedHistory, DomainStatus, HealthReading,
};
use crate::error::{CareError, Result};
use crate::narrative::{NarrativeClient, NarrativeKind};
use crate::persistence::{tables, MemoryStore};

use super::PollingAgent;

const READING_HISTORY_CAP: usize = 100;
const ALERT_HISTORY_CAP: usize = 20;
/// Samples required before thresholds personalize
const PERSONALIZATION_MIN_SAMPLES: usize = 5;

/// Per-user alerting bands for each metric
#[derive(Debug, Clone, PartialEq)]
pub struct HealthThresholds {
    pub heart_rate: MetricBand,
    pub systolic: MetricBand,
    pub diastolic: MetricBand,
    pub glucose: MetricBand,
    pub oxygen: MetricBand,
}

impl HealthThresholds {
    fn from_config(config: &HealthAgentConfig) -> Self {
        Self {
            heart_rate: config.heart_rate,
            systolic: config.systolic,
            diastolic: config.diastolic,
            glucose: config.glucose,
            oxygen: config.oxygen,
        }
    }
}

struct HealthUserState {
    history: BoundedHistory<HealthReading>,
    alerts: BoundedHistory<Alert>,
    thresholds: HealthThresholds,
}

impl HealthUserState {
    fn new(defaults: HealthThresholds) -> Self {
        Self {
            history: BoundedHistory::new(READING_HISTORY_CAP),
            alerts: BoundedHistory::new(ALERT_HISTORY_CAP),
            thresholds: defaults,
        }
    }
}

/// Result of processing one vitals reading
#[derive(Debug, Clone)]
pub struct HealthOutcome {
    pub analysis: HealthAnalysis,
    pub alerts: Vec<Alert>,
    pub narrative: Option<String>,
}

/// Snapshot returned by status queries
#[derive(Debug, Clone)]
pub struct HealthStatusReport {
    pub timestamp: DateTime<Utc>,
    pub analysis: HealthAnalysis,
    pub alerts: Vec<Alert>,
    pub summary: String,
}

/// Agent responsible for monitoring health metrics and detecting anomalies
pub struct HealthMonitor {
    config: HealthAgentConfig,
    analyzer: Arc<dyn HistoryAnalyzer>,
    store: Arc<MemoryStore>,
    narrative: Arc<dyn NarrativeClient>,
    users: RwLock<HashMap<String, HealthUserState>>,
    analyses: RwLock<HashMap<String, (HealthAnalysis, DateTime<Utc>)>>,
}

impl HealthMonitor {
    pub fn new(
        config: HealthAgentConfig,
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
        info!("Initialized health data for {} users", user_ids.len());
    }

    /// Lazily create per-user state, seeding history from the analyzer and
    /// personalizing thresholds when enough samples exist.
    async fn ensure_user(&self, user_id: &str) {
        {
            let users = self.users.read().await;
            if users.contains_key(user_id) {
                return;
            }
        }

        let mut state = HealthUserState::new(HealthThresholds::from_config(&self.config));
        if let Some(records) = self.analyzer.health_records(user_id) {
            state.history.extend(records.into_iter().map(|r| HealthReading {
                timestamp: r.timestamp,
                heart_rate: r.heart_rate,
                systolic: r.systolic,
                diastolic: r.diastolic,
                glucose: r.glucose,
                oxygen: r.oxygen,
            }));
        }

        if let Some(analysis) = self.compute_analysis(&state) {
            if state.history.len() >= PERSONALIZATION_MIN_SAMPLES {
                state.thresholds = Self::personalize(&state.thresholds, &analysis);
                debug!("Personalized health thresholds for user {}", user_id);
            }
            let mut analyses = self.analyses.write().await;
            analyses.insert(user_id.to_string(), (analysis, Utc::now()));
        }

        let mut users = self.users.write().await;
        users.entry(user_id.to_string()).or_insert(state);
    }

    /// Personalize thresholds around historical means, clamped to safety
    /// floors and ceilings. Oxygen never personalizes above 100.
    fn personalize(defaults: &HealthThresholds, analysis: &HealthAnalysis) -> HealthThresholds {
        let mut thresholds = defaults.clone();

        thresholds.heart_rate.min = (analysis.heart_rate.mean - 15.0).max(50.0);
        thresholds.heart_rate.max = (analysis.heart_rate.mean + 15.0).min(150.0);

        thresholds.systolic.min = (analysis.blood_pressure.mean_systolic - 15.0).max(85.0);
        thresholds.systolic.max = (analysis.blood_pressure.mean_systolic + 15.0).min(160.0);

        thresholds.diastolic.min = (analysis.blood_pressure.mean_diastolic - 10.0).max(50.0);
        thresholds.diastolic.max = (analysis.blood_pressure.mean_diastolic + 10.0).min(100.0);

        thresholds.glucose.min = (analysis.glucose.mean - 20.0).max(65.0);
        thresholds.glucose.max = (analysis.glucose.mean + 20.0).min(180.0);

        thresholds.oxygen.min = (analysis.oxygen.mean - 3.0).max(90.0);
        thresholds.oxygen.max = 100.0;

        thresholds
    }

    /// Recompute the analysis over the user's reading history. Concerns are
    /// judged against the user's current thresholds.
    fn compute_analysis(&self, state: &HealthUserState) -> Option<HealthAnalysis> {
        let latest = state.history.latest()?;

        let series = |f: fn(&HealthReading) -> f64| -> Vec<f64> {
            state.history.iter().map(f).collect()
        };
        let stats = |values: &[f64]| -> MetricStats {
            let mut min = f64::INFINITY;
            let mut max = f64::NEG_INFINITY;
            let mut sum = 0.0;
            for v in values {
                min = min.min(*v);
                max = max.max(*v);
                sum += v;
            }
            MetricStats {
                current: *values.last().unwrap_or(&0.0),
                mean: sum / values.len() as f64,
                min,
                max,
            }
        };

        let heart_rate = stats(&series(|r| r.heart_rate));
        let glucose = stats(&series(|r| r.glucose));
        let oxygen = stats(&series(|r| r.oxygen));
        let systolic = series(|r| r.systolic);
        let diastolic = series(|r| r.diastolic);
        let blood_pressure = BloodPressureStats {
            current_systolic: latest.systolic,
            current_diastolic: latest.diastolic,
            mean_systolic: systolic.iter().sum::<f64>() / systolic.len() as f64,
            mean_diastolic: diastolic.iter().sum::<f64>() / diastolic.len() as f64,
        };

        let t = &state.thresholds;
        let mut concerns = Vec::new();
        if latest.heart_rate < t.heart_rate.min || latest.heart_rate > t.heart_rate.max {
            concerns.push("Heart rate outside normal range".to_string());
        }
        if latest.systolic < t.systolic.min
            || latest.systolic > t.systolic.max
            || latest.diastolic < t.diastolic.min
            || latest.diastolic > t.diastolic.max
        {
            concerns.push("Blood pressure outside normal range".to_string());
        }
        if latest.glucose < t.glucose.min || latest.glucose > t.glucose.max {
            concerns.push("Glucose levels outside normal range".to_string());
        }
        if latest.oxygen < t.oxygen.min {
            concerns.push("Oxygen saturation below threshold".to_string());
        }

        Some(HealthAnalysis {
            timestamp: latest.timestamp,
            heart_rate,
            blood_pressure,
            glucose,
            oxygen,
            sample_count: state.history.len(),
            status: DomainStatus::from_concern_count(concerns.len()),
            concerns,
        })
    }

    /// Derive alerts from the latest values against the user's thresholds
    fn generate_alerts(state: &HealthUserState, analysis: &HealthAnalysis) -> Vec<Alert> {
        let t = &state.thresholds;
        let mut alerts = Vec::new();

        let mut check = |value: f64,
                         band: &MetricBand,
                         low_kind: AlertKind,
                         high_kind: AlertKind,
                         label: &str,
                         unit: &str| {
            if let Some(level) =
                threshold_severity(value, band.min, band.max, band.urgent_min, band.urgent_max)
            {
                let (kind, bound, comparison, bound_name) = if value < band.min {
                    (low_kind, band.min, "below", "min")
                } else {
                    (high_kind, band.max, "above", "max")
                };
                alerts.push(
                    Alert::new(
                        level,
                        kind,
                        format!(
                            "{label} {comparison} threshold: {value}{unit} ({bound_name}: {bound}{unit})"
                        ),
                    )
                    .with_details(serde_json::json!({
                        "value": value,
                        "threshold": bound,
                        "comparison": comparison,
                    })),
                );
            }
        };

        check(
            analysis.heart_rate.current,
            &t.heart_rate,
            AlertKind::HeartRateLow,
            AlertKind::HeartRateHigh,
            "Heart rate",
            " bpm",
        );
        check(
            analysis.blood_pressure.current_systolic,
            &t.systolic,
            AlertKind::SystolicLow,
            AlertKind::SystolicHigh,
            "Systolic blood pressure",
            " mmHg",
        );
        check(
            analysis.blood_pressure.current_diastolic,
            &t.diastolic,
            AlertKind::DiastolicLow,
            AlertKind::DiastolicHigh,
            "Diastolic blood pressure",
            " mmHg",
        );
        check(
            analysis.glucose.current,
            &t.glucose,
            AlertKind::GlucoseLow,
            AlertKind::GlucoseHigh,
            "Glucose level",
            " mg/dL",
        );
        // Oxygen only alerts on the low side
        if let Some(level) = threshold_severity(
            analysis.oxygen.current,
            t.oxygen.min,
            f64::INFINITY,
            t.oxygen.urgent_min,
            None,
        ) {
            alerts.push(
                Alert::new(
                    level,
                    AlertKind::OxygenLow,
                    format!(
                        "Oxygen saturation below threshold: {}% (min: {}%)",
                        analysis.oxygen.current, t.oxygen.min
                    ),
                )
                .with_details(serde_json::json!({
                    "value": analysis.oxygen.current,
                    "threshold": t.oxygen.min,
                    "comparison": "below",
                })),
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
                        "source": "health_monitor",
                        "level": alert.level.as_str(),
                        "message": &alert.message,
                        "resolved": false,
                    }),
                )
                .await;
        }
        if !alerts.is_empty() {
            info!(
                "Generated {} health alerts for user {}",
                alerts.len(),
                user_id
            );
        }
    }

    /// Process one incoming vitals reading
    pub async fn process_reading(
        &self,
        user_id: &str,
        reading: HealthReading,
    ) -> Result<HealthOutcome> {
        self.ensure_user(user_id).await;

        self.store
            .insert(
                tables::HEALTH_DATA,
                serde_json::json!({
                    "user_id": user_id,
                    "timestamp": reading.timestamp,
                    "heart_rate": reading.heart_rate,
                    "blood_pressure": format!("{}/{} mmHg", reading.systolic, reading.diastolic),
                    "glucose": reading.glucose,
                    "oxygen": reading.oxygen,
                }),
            )
            .await;

        let (analysis, alerts) = {
            let mut users = self.users.write().await;
            let state = users
                .get_mut(user_id)
                .ok_or_else(|| CareError::UserNotFound(user_id.to_string()))?;
            state.history.push(reading);

            let analysis = self
                .compute_analysis(state)
                .ok_or_else(|| CareError::NoData {
                    user_id: user_id.to_string(),
                })?;
            let alerts = Self::generate_alerts(state, &analysis);
            state.alerts.extend(alerts.iter().cloned());
            (analysis, alerts)
        };

        {
            let mut analyses = self.analyses.write().await;
            analyses.insert(user_id.to_string(), (analysis.clone(), Utc::now()));
        }

        self.persist_alerts(user_id, &alerts).await;

        let narrative = if alerts.is_empty() {
            None
        } else {
            let alert_text: Vec<String> =
                alerts.iter().map(|a| format!("- {}", a.message)).collect();
            let prompt = format!(
                "Health data for user {user_id}: heart rate {} bpm, blood pressure {}/{}, glucose {} mg/dL, oxygen {}%. Alerts:\n{}",
                analysis.heart_rate.current,
                analysis.blood_pressure.current_systolic,
                analysis.blood_pressure.current_diastolic,
                analysis.glucose.current,
                analysis.oxygen.current,
                alert_text.join("\n"),
            );
            Some(
                self.narrative
                    .generate(&prompt, NarrativeKind::HealthAnalysis)
                    .await,
            )
        };

        Ok(HealthOutcome {
            analysis,
            alerts,
            narrative,
        })
    }

    /// Current health status for a user
    pub async fn status(&self, user_id: &str) -> Result<HealthStatusReport> {
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
                let analysis = self
                    .compute_analysis(state)
                    .ok_or_else(|| CareError::NoData {
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
        Ok(HealthStatusReport {
            timestamp,
            analysis,
            alerts,
            summary,
        })
    }

    /// Human-readable summary from the analysis status and concerns alone
    fn summarize(analysis: &HealthAnalysis) -> String {
        match analysis.status {
            DomainStatus::Normal => {
                "Vital signs are within normal ranges. No immediate health concerns.".to_string()
            }
            DomainStatus::Attention => {
                format!("Health requires attention: {}", analysis.concerns.join("; "))
            }
            DomainStatus::Alert => format!(
                "ALERT: Health requires immediate attention: {}",
                analysis.concerns.join("; ")
            ),
            DomainStatus::Unknown => "No health data available.".to_string(),
        }
    }

    /// Replace personalized thresholds for a user
    pub async fn update_thresholds(
        &self,
        user_id: &str,
        thresholds: HealthThresholds,
    ) -> Result<()> {
        self.ensure_user(user_id).await;
        let mut users = self.users.write().await;
        let state = users
            .get_mut(user_id)
            .ok_or_else(|| CareError::UserNotFound(user_id.to_string()))?;
        state.thresholds = thresholds;
        info!("Updated health thresholds for user {}", user_id);
        Ok(())
    }

    /// Current thresholds for a user, if known
    pub async fn thresholds(&self, user_id: &str) -> Option<HealthThresholds> {
        let users = self.users.read().await;
        users.get(user_id).map(|s| s.thresholds.clone())
    }
}

#[async_trait]
impl PollingAgent for HealthMonitor {
    fn name(&self) -> &'static str {
        "health_monitor"
    }

    fn update_interval(&self) -> Duration {
        Duration::from_secs(self.config.update_interval_secs)
    }

    /// Re-analyze users whose cached analysis has gone stale
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
                users.get_mut(&user_id).and_then(|state| {
                    let analysis = self.compute_analysis(state)?;
                    let alerts = Self::generate_alerts(state, &analysis);
                    state.alerts.extend(alerts.iter().cloned());
                    Some((analysis, alerts))
                })
            };

            let Some((analysis, alerts)) = result else {
                warn!("No health history to analyze for user {}", user_id);
                continue;
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::MemoryAnalyzer;
    use crate::narrative::TemplateClient;

    fn monitor_with(analyzer: Arc<MemoryAnalyzer>) -> HealthMonitor {
        HealthMonitor::new(
            HealthAgentConfig::default(),
            analyzer,
            Arc::new(MemoryStore::new()),
            Arc::new(TemplateClient::new()),
        )
    }

    fn reading(heart: f64, sys: f64, dia: f64, glucose: f64, oxygen: f64) -> HealthReading {
        HealthReading {
            timestamp: Utc::now(),
            heart_rate: heart,
            systolic: sys,
            diastolic: dia,
            glucose,
            oxygen,
        }
    }

    #[tokio::test]
    async fn test_normal_reading_produces_no_alerts() {
        let monitor = monitor_with(Arc::new(MemoryAnalyzer::new()));
        let outcome = monitor
            .process_reading("U1000", reading(72.0, 120.0, 80.0, 100.0, 98.0))
            .await
            .unwrap();
        assert!(outcome.alerts.is_empty());
        assert_eq!(outcome.analysis.status, DomainStatus::Normal);
        assert!(outcome.narrative.is_none());
    }

    #[tokio::test]
    async fn test_urgent_systolic_alert() {
        let monitor = monitor_with(Arc::new(MemoryAnalyzer::new()));
        let outcome = monitor
            .process_reading("U1000", reading(72.0, 165.0, 80.0, 100.0, 98.0))
            .await
            .unwrap();
        let alert = outcome
            .alerts
            .iter()
            .find(|a| a.kind == AlertKind::SystolicHigh)
            .expect("systolic alert");
        assert_eq!(alert.level, AlertLevel::Urgent);
        assert!(outcome.narrative.is_some());
    }

    #[tokio::test]
    async fn test_personalized_max_is_clamped() {
        use crate::analyzer::HealthRecord;

        let analyzer = Arc::new(MemoryAnalyzer::new());
        // Mean heart rate of 200 across enough samples to personalize
        let rows: Vec<HealthRecord> = (0..6)
            .map(|_| HealthRecord {
                timestamp: Utc::now(),
                heart_rate: 200.0,
                systolic: 120.0,
                diastolic: 80.0,
                glucose: 100.0,
                oxygen: 98.0,
            })
            .collect();
        analyzer.record_health("U1000", rows);

        let monitor = monitor_with(analyzer);
        monitor.ensure_user("U1000").await;

        let thresholds = monitor.thresholds("U1000").await.unwrap();
        // Safety ceiling applies regardless of the historical mean
        assert_eq!(thresholds.heart_rate.max, 150.0);
        assert_eq!(thresholds.oxygen.max, 100.0);
    }

    #[tokio::test]
    async fn test_status_for_unknown_user_is_soft_error() {
        let monitor = monitor_with(Arc::new(MemoryAnalyzer::new()));
        let err = monitor.status("nobody").await.unwrap_err();
        assert!(matches!(err, CareError::NoData { .. }));
    }

    #[tokio::test]
    async fn test_alert_history_is_bounded() {
        let monitor = monitor_with(Arc::new(MemoryAnalyzer::new()));
        for _ in 0..30 {
            monitor
                .process_reading("U1000", reading(72.0, 170.0, 80.0, 100.0, 98.0))
                .await
                .unwrap();
        }
        let report = monitor.status("U1000").await.unwrap();
        assert_eq!(report.alerts.len(), 5);

        let users = monitor.users.read().await;
        assert_eq!(users["U1000"].alerts.len(), ALERT_HISTORY_CAP);
    }
}

//! In-memory analyzer backed by recorded rows
//!
//! Holds per-user record vectors and computes the domain analyses over them.
//! The simulator and the agents' initialization path both read through this;
//! records are fed in once at startup.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::Utc;
use tracing::warn;

use super::{
    AckStats, BloodPressureStats, HealthAnalysis, HealthRecord, HistoryAnalyzer, MetricStats,
    ReminderAnalysis, ReminderRecord, SafetyAnalysis, SafetyRecord,
};
use crate::domain::DomainStatus;

#[derive(Default)]
struct UserRecords {
    health: Vec<HealthRecord>,
    safety: Vec<SafetyRecord>,
    reminders: Vec<ReminderRecord>,
}

/// Analyzer over in-memory record sets
#[derive(Default)]
pub struct MemoryAnalyzer {
    users: RwLock<HashMap<String, UserRecords>>,
}

impl MemoryAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed health rows for a user. Rows are kept in insertion order; feed
    /// them oldest first.
    pub fn record_health(&self, user_id: &str, records: impl IntoIterator<Item = HealthRecord>) {
        let mut users = self.users.write().unwrap_or_else(|e| e.into_inner());
        users
            .entry(user_id.to_string())
            .or_default()
            .health
            .extend(records);
    }

    pub fn record_safety(&self, user_id: &str, records: impl IntoIterator<Item = SafetyRecord>) {
        let mut users = self.users.write().unwrap_or_else(|e| e.into_inner());
        users
            .entry(user_id.to_string())
            .or_default()
            .safety
            .extend(records);
    }

    pub fn record_reminders(
        &self,
        user_id: &str,
        records: impl IntoIterator<Item = ReminderRecord>,
    ) {
        let mut users = self.users.write().unwrap_or_else(|e| e.into_inner());
        users
            .entry(user_id.to_string())
            .or_default()
            .reminders
            .extend(records);
    }
}

impl HistoryAnalyzer for MemoryAnalyzer {
    fn user_ids(&self) -> Vec<String> {
        let users = self.users.read().unwrap_or_else(|e| e.into_inner());
        let mut ids: Vec<String> = users.keys().cloned().collect();
        ids.sort();
        ids
    }

    fn analyze_health(&self, user_id: &str) -> Option<HealthAnalysis> {
        let users = self.users.read().unwrap_or_else(|e| e.into_inner());
        let records = &users.get(user_id)?.health;
        if records.is_empty() {
            warn!("No health records for user {}", user_id);
            return None;
        }

        let heart: Vec<f64> = records.iter().map(|r| r.heart_rate).collect();
        let systolic: Vec<f64> = records.iter().map(|r| r.systolic).collect();
        let diastolic: Vec<f64> = records.iter().map(|r| r.diastolic).collect();
        let glucose: Vec<f64> = records.iter().map(|r| r.glucose).collect();
        let oxygen: Vec<f64> = records.iter().map(|r| r.oxygen).collect();

        let heart_rate = MetricStats::from_series(&heart)?;
        let glucose = MetricStats::from_series(&glucose)?;
        let oxygen = MetricStats::from_series(&oxygen)?;
        let blood_pressure = BloodPressureStats {
            current_systolic: *systolic.last()?,
            current_diastolic: *diastolic.last()?,
            mean_systolic: systolic.iter().sum::<f64>() / systolic.len() as f64,
            mean_diastolic: diastolic.iter().sum::<f64>() / diastolic.len() as f64,
        };

        let mut concerns = Vec::new();
        if heart_rate.current < 60.0 || heart_rate.current > 100.0 {
            concerns.push("Heart rate outside normal range".to_string());
        }
        if blood_pressure.current_systolic < 90.0
            || blood_pressure.current_systolic > 140.0
            || blood_pressure.current_diastolic < 60.0
            || blood_pressure.current_diastolic > 90.0
        {
            concerns.push("Blood pressure outside normal range".to_string());
        }
        if glucose.current < 70.0 || glucose.current > 140.0 {
            concerns.push("Glucose levels outside normal range".to_string());
        }
        if oxygen.current < 95.0 {
            concerns.push("Oxygen saturation below threshold".to_string());
        }

        Some(HealthAnalysis {
            timestamp: records.last().map(|r| r.timestamp).unwrap_or_else(Utc::now),
            heart_rate,
            blood_pressure,
            glucose,
            oxygen,
            sample_count: records.len(),
            status: DomainStatus::from_concern_count(concerns.len()),
            concerns,
        })
    }

    fn analyze_safety(&self, user_id: &str) -> Option<SafetyAnalysis> {
        let users = self.users.read().unwrap_or_else(|e| e.into_inner());
        let records = &users.get(user_id)?.safety;
        if records.is_empty() {
            warn!("No safety records for user {}", user_id);
            return None;
        }

        let latest = records.last()?;

        let mut movement_counts: HashMap<String, usize> = HashMap::new();
        for record in records {
            *movement_counts.entry(record.activity.clone()).or_default() += 1;
        }

        let fall_count = records.iter().filter(|r| r.fall_detected).count();
        let inactivity_count = movement_counts.get("No Movement").copied().unwrap_or(0);
        let inactivity_percentage = inactivity_count as f64 / records.len() as f64 * 100.0;

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

    fn analyze_reminders(&self, user_id: &str) -> Option<ReminderAnalysis> {
        let users = self.users.read().unwrap_or_else(|e| e.into_inner());
        let records = &users.get(user_id)?.reminders;
        if records.is_empty() {
            warn!("No reminder records for user {}", user_id);
            return None;
        }

        let mut reminder_counts: HashMap<String, usize> = HashMap::new();
        for record in records {
            *reminder_counts.entry(record.kind.clone()).or_default() += 1;
        }

        let sent: Vec<&ReminderRecord> = records.iter().filter(|r| r.sent).collect();
        let sent_count = sent.len();
        let acknowledged_count = sent.iter().filter(|r| r.acknowledged).count();
        let acknowledgment_rate = if sent_count > 0 {
            acknowledged_count as f64 / sent_count as f64 * 100.0
        } else {
            0.0
        };

        let mut by_kind = HashMap::new();
        for kind in reminder_counts.keys() {
            let kind_sent: Vec<&&ReminderRecord> =
                sent.iter().filter(|r| &r.kind == kind).collect();
            let kind_acked = kind_sent.iter().filter(|r| r.acknowledged).count();
            let rate = if kind_sent.is_empty() {
                0.0
            } else {
                kind_acked as f64 / kind_sent.len() as f64 * 100.0
            };
            by_kind.insert(
                kind.clone(),
                AckStats {
                    sent: kind_sent.len(),
                    acknowledged: kind_acked,
                    rate,
                },
            );
        }

        let mut concerns = Vec::new();
        if acknowledgment_rate < 50.0 {
            concerns.push("Low overall reminder acknowledgment rate".to_string());
        }
        for (kind, stats) in &by_kind {
            if stats.rate < 50.0 && stats.sent > 3 {
                concerns.push(format!("Low acknowledgment rate for {kind} reminders"));
            }
        }

        Some(ReminderAnalysis {
            timestamp: records.last().map(|r| r.timestamp).unwrap_or_else(Utc::now),
            reminder_counts,
            sent_count,
            acknowledged_count,
            acknowledgment_rate,
            by_kind,
            status: DomainStatus::from_concern_count(concerns.len()),
            concerns,
        })
    }

    fn health_records(&self, user_id: &str) -> Option<Vec<HealthRecord>> {
        let users = self.users.read().unwrap_or_else(|e| e.into_inner());
        users.get(user_id).map(|u| u.health.clone())
    }

    fn safety_records(&self, user_id: &str) -> Option<Vec<SafetyRecord>> {
        let users = self.users.read().unwrap_or_else(|e| e.into_inner());
        users.get(user_id).map(|u| u.safety.clone())
    }

    fn reminder_records(&self, user_id: &str) -> Option<Vec<ReminderRecord>> {
        let users = self.users.read().unwrap_or_else(|e| e.into_inner());
        users.get(user_id).map(|u| u.reminders.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ImpactForce;

    fn health_row(heart: f64, sys: f64, dia: f64, glucose: f64, oxygen: f64) -> HealthRecord {
        HealthRecord {
            timestamp: Utc::now(),
            heart_rate: heart,
            systolic: sys,
            diastolic: dia,
            glucose,
            oxygen,
        }
    }

    #[test]
    fn test_health_stats_and_status() {
        let analyzer = MemoryAnalyzer::new();
        analyzer.record_health(
            "U1000",
            vec![
                health_row(70.0, 120.0, 80.0, 100.0, 98.0),
                health_row(80.0, 130.0, 82.0, 110.0, 97.0),
            ],
        );

        let analysis = analyzer.analyze_health("U1000").unwrap();
        assert_eq!(analysis.heart_rate.current, 80.0);
        assert_eq!(analysis.heart_rate.mean, 75.0);
        assert_eq!(analysis.blood_pressure.mean_systolic, 125.0);
        assert_eq!(analysis.status, DomainStatus::Normal);
        assert!(analysis.concerns.is_empty());
    }

    #[test]
    fn test_multiple_concerns_alert() {
        let analyzer = MemoryAnalyzer::new();
        analyzer.record_health("U1000", vec![health_row(120.0, 170.0, 95.0, 100.0, 98.0)]);

        let analysis = analyzer.analyze_health("U1000").unwrap();
        // Heart rate and blood pressure both out of range
        assert_eq!(analysis.status, DomainStatus::Alert);
        assert_eq!(analysis.concerns.len(), 2);
    }

    #[test]
    fn test_unknown_user_is_none() {
        let analyzer = MemoryAnalyzer::new();
        assert!(analyzer.analyze_health("nobody").is_none());
        assert!(analyzer.analyze_safety("nobody").is_none());
        assert!(analyzer.analyze_reminders("nobody").is_none());
    }

    #[test]
    fn test_ack_rates_by_kind() {
        let analyzer = MemoryAnalyzer::new();
        let row = |kind: &str, sent: bool, acked: bool| ReminderRecord {
            timestamp: Utc::now(),
            kind: kind.to_string(),
            scheduled_time: "08:00".to_string(),
            sent,
            acknowledged: acked,
        };
        analyzer.record_reminders(
            "U1000",
            vec![
                row("Medication", true, true),
                row("Medication", true, false),
                row("Hydration", true, true),
                row("Hydration", false, false),
            ],
        );

        let analysis = analyzer.analyze_reminders("U1000").unwrap();
        assert_eq!(analysis.sent_count, 3);
        assert_eq!(analysis.acknowledged_count, 2);
        assert_eq!(analysis.by_kind["Medication"].rate, 50.0);
        assert_eq!(analysis.by_kind["Hydration"].sent, 1);
    }

    #[test]
    fn test_safety_inactivity_percentage() {
        let analyzer = MemoryAnalyzer::new();
        let row = |activity: &str, fall: bool| SafetyRecord {
            timestamp: Utc::now(),
            location: "Living Room".to_string(),
            activity: activity.to_string(),
            fall_detected: fall,
            impact_force: ImpactForce::Medium,
            post_fall_inactivity_secs: 0,
        };
        analyzer.record_safety(
            "U1000",
            vec![
                row("No Movement", false),
                row("No Movement", false),
                row("Walking", false),
                row("Sitting", false),
            ],
        );

        let analysis = analyzer.analyze_safety("U1000").unwrap();
        assert_eq!(analysis.inactivity_percentage, 50.0);
        assert_eq!(analysis.fall_count, 0);
        assert!(!analysis.latest_fall);
    }
}

//! Historical statistics provider
//!
//! Read-only collaborator the agents consult for per-user history: summary
//! statistics per domain plus the raw records they were computed from. The
//! agents never mutate the provider's source data through this interface.
//! Injected as `Arc<dyn HistoryAnalyzer>` so tests can substitute their own.

mod memory;

pub use memory::MemoryAnalyzer;

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{DomainStatus, ImpactForce};

/// One historical vitals row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthRecord {
    pub timestamp: DateTime<Utc>,
    pub heart_rate: f64,
    pub systolic: f64,
    pub diastolic: f64,
    pub glucose: f64,
    pub oxygen: f64,
}

/// One historical movement/location row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SafetyRecord {
    pub timestamp: DateTime<Utc>,
    pub location: String,
    pub activity: String,
    pub fall_detected: bool,
    pub impact_force: ImpactForce,
    pub post_fall_inactivity_secs: u64,
}

/// One historical reminder row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReminderRecord {
    pub timestamp: DateTime<Utc>,
    pub kind: String,
    /// Time of day, "HH:MM" or "HH:MM:SS"
    pub scheduled_time: String,
    pub sent: bool,
    pub acknowledged: bool,
}

/// Summary statistics for a single metric
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricStats {
    pub current: f64,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
}

impl MetricStats {
    fn from_series(series: &[f64]) -> Option<Self> {
        let last = *series.last()?;
        let sum: f64 = series.iter().sum();
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        for value in series {
            min = min.min(*value);
            max = max.max(*value);
        }
        Some(Self {
            current: last,
            mean: sum / series.len() as f64,
            min,
            max,
        })
    }
}

/// Blood pressure summary, systolic/diastolic split
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BloodPressureStats {
    pub current_systolic: f64,
    pub current_diastolic: f64,
    pub mean_systolic: f64,
    pub mean_diastolic: f64,
}

/// Health analysis for one user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthAnalysis {
    pub timestamp: DateTime<Utc>,
    pub heart_rate: MetricStats,
    pub blood_pressure: BloodPressureStats,
    pub glucose: MetricStats,
    pub oxygen: MetricStats,
    pub sample_count: usize,
    pub status: DomainStatus,
    pub concerns: Vec<String>,
}

/// Safety analysis for one user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SafetyAnalysis {
    pub timestamp: DateTime<Utc>,
    pub current_location: String,
    pub current_activity: String,
    pub movement_counts: HashMap<String, usize>,
    pub fall_count: usize,
    pub latest_fall: bool,
    pub inactivity_percentage: f64,
    pub status: DomainStatus,
    pub concerns: Vec<String>,
}

/// Acknowledgment statistics for one reminder kind
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AckStats {
    pub sent: usize,
    pub acknowledged: usize,
    pub rate: f64,
}

/// Reminder analysis for one user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReminderAnalysis {
    pub timestamp: DateTime<Utc>,
    pub reminder_counts: HashMap<String, usize>,
    pub sent_count: usize,
    pub acknowledged_count: usize,
    /// Percentage of sent reminders acknowledged
    pub acknowledgment_rate: f64,
    pub by_kind: HashMap<String, AckStats>,
    pub status: DomainStatus,
    pub concerns: Vec<String>,
}

/// Read-only per-user history access. `None` means no data for the user;
/// callers degrade gracefully rather than erroring.
pub trait HistoryAnalyzer: Send + Sync {
    fn user_ids(&self) -> Vec<String>;

    fn analyze_health(&self, user_id: &str) -> Option<HealthAnalysis>;
    fn analyze_safety(&self, user_id: &str) -> Option<SafetyAnalysis>;
    fn analyze_reminders(&self, user_id: &str) -> Option<ReminderAnalysis>;

    fn health_records(&self, user_id: &str) -> Option<Vec<HealthRecord>>;
    fn safety_records(&self, user_id: &str) -> Option<Vec<SafetyRecord>>;
    fn reminder_records(&self, user_id: &str) -> Option<Vec<ReminderRecord>>;
}

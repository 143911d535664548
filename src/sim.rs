//! Data simulation feed
//!
//! Replays recorded per-user readings through the coordinator at randomized
//! intervals, standing in for live sensors during development and demos.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{error, info, warn};

use crate::analyzer::HistoryAnalyzer;
use crate::coordination::Coordinator;
use crate::domain::{Envelope, HealthReading, Reading, ReminderEvent, SafetyReading};
use crate::runtime::ShutdownToken;

/// Seconds between injected readings
const MIN_DELAY_SECS: f64 = 2.0;
const MAX_DELAY_SECS: f64 = 5.0;

/// Populate the analyzer with synthetic history so the demo runs without an
/// external data feed.
pub fn seed_demo_history(analyzer: &crate::analyzer::MemoryAnalyzer, user_ids: &[&str]) {
    use crate::analyzer::{HealthRecord, ReminderRecord, SafetyRecord};
    use crate::domain::ImpactForce;
    use chrono::Duration as ChronoDuration;

    let mut rng = rand::thread_rng();
    let now = Utc::now();

    for user_id in user_ids {
        let mut health = Vec::new();
        let mut safety = Vec::new();
        let mut reminders = Vec::new();

        for days_ago in (1..=14).rev() {
            let stamp = now - ChronoDuration::days(days_ago);

            health.push(HealthRecord {
                timestamp: stamp,
                heart_rate: rng.gen_range(58.0..105.0),
                systolic: rng.gen_range(100.0..150.0),
                diastolic: rng.gen_range(62.0..95.0),
                glucose: rng.gen_range(75.0..150.0),
                oxygen: rng.gen_range(93.0..100.0),
            });

            let location = ["Bedroom", "Kitchen", "Living Room", "Bathroom"]
                .choose(&mut rng)
                .copied()
                .unwrap_or("Living Room");
            let activity = ["Walking", "Sitting", "Lying", "No Movement"]
                .choose(&mut rng)
                .copied()
                .unwrap_or("Sitting");
            safety.push(SafetyRecord {
                timestamp: stamp,
                location: location.to_string(),
                activity: activity.to_string(),
                fall_detected: rng.gen_bool(0.05),
                impact_force: ImpactForce::Low,
                post_fall_inactivity_secs: 0,
            });

            let kind = ["Medication", "Hydration", "Exercise", "Appointment"]
                .choose(&mut rng)
                .copied()
                .unwrap_or("Medication");
            let sent = rng.gen_bool(0.8);
            reminders.push(ReminderRecord {
                timestamp: stamp,
                kind: kind.to_string(),
                scheduled_time: format!("{:02}:00", rng.gen_range(8..20)),
                sent,
                acknowledged: sent && rng.gen_bool(0.6),
            });
        }

        analyzer.record_health(user_id, health);
        analyzer.record_safety(user_id, safety);
        analyzer.record_reminders(user_id, reminders);
    }

    info!("Seeded demo history for {} users", user_ids.len());
}

/// Replays analyzer history as live readings until shutdown
pub struct Simulator {
    analyzer: Arc<dyn HistoryAnalyzer>,
    coordinator: Arc<Coordinator>,
    shutdown: ShutdownToken,
}

impl Simulator {
    pub fn new(
        analyzer: Arc<dyn HistoryAnalyzer>,
        coordinator: Arc<Coordinator>,
        shutdown: ShutdownToken,
    ) -> Self {
        Self {
            analyzer,
            coordinator,
            shutdown,
        }
    }

    /// Pick one recorded reading for the user, re-stamped to now
    fn sample_reading(&self, user_id: &str) -> Option<Reading> {
        let mut rng = rand::thread_rng();
        let domain = ["health", "safety", "reminder"]
            .choose(&mut rng)
            .copied()
            .unwrap_or("health");

        match domain {
            "health" => {
                let records = self.analyzer.health_records(user_id)?;
                let record = records.choose(&mut rng)?.clone();
                Some(Reading::Health(HealthReading {
                    timestamp: Utc::now(),
                    heart_rate: record.heart_rate,
                    systolic: record.systolic,
                    diastolic: record.diastolic,
                    glucose: record.glucose,
                    oxygen: record.oxygen,
                }))
            }
            "safety" => {
                let records = self.analyzer.safety_records(user_id)?;
                let record = records.choose(&mut rng)?.clone();
                Some(Reading::Safety(SafetyReading {
                    timestamp: Utc::now(),
                    location: record.location,
                    activity: record.activity,
                    fall_detected: record.fall_detected,
                    impact_force: record.impact_force,
                    post_fall_inactivity_secs: record.post_fall_inactivity_secs,
                }))
            }
            _ => {
                // Reminder events in the feed are bare check-ins; real
                // acknowledgments come from the companion device
                self.analyzer.reminder_records(user_id)?;
                Some(Reading::Reminder(ReminderEvent {
                    timestamp: Utc::now(),
                    acknowledge: None,
                    new_reminder: None,
                }))
            }
        }
    }

    /// Run the feed until shutdown
    pub async fn run(self) {
        let user_ids = self.analyzer.user_ids();
        if user_ids.is_empty() {
            warn!("No users in analyzer history; simulation feed idle");
            return;
        }
        info!("Starting data simulation for {} users", user_ids.len());

        while !self.shutdown.is_triggered() {
            let (user_id, reading) = {
                let mut rng = rand::thread_rng();
                let user_id = match user_ids.choose(&mut rng) {
                    Some(id) => id.clone(),
                    None => break,
                };
                let reading = self.sample_reading(&user_id);
                (user_id, reading)
            };

            if let Some(reading) = reading {
                let domain = reading.domain();
                let envelope = Envelope {
                    user_id: user_id.clone(),
                    reading,
                };
                match self.coordinator.handle_incoming(envelope).await {
                    Ok(processed) => {
                        info!(
                            "Sent {} data for user {} (overall: {})",
                            domain, user_id, processed.overall
                        );
                    }
                    Err(e) => {
                        error!("Error in simulation feed: {}", e);
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                }
            }

            let delay = {
                let mut rng = rand::thread_rng();
                rng.gen_range(MIN_DELAY_SECS..MAX_DELAY_SECS)
            };
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs_f64(delay)) => {}
                _ = self.shutdown.wait() => break,
            }
        }

        info!("Data simulation stopped");
    }
}

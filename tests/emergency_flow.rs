//! End-to-end flow: reading -> coordinator -> domain agent -> emergency

use std::sync::Arc;

use chrono::Utc;

use carelink::agents::{
    DailyAssistant, EmergencyResponder, HealthMonitor, SafetyGuardian, SocialCompanion,
};
use carelink::analyzer::MemoryAnalyzer;
use carelink::config::AgentsConfig;
use carelink::coordination::Coordinator;
use carelink::domain::{
    EmergencyKind, Envelope, EscalationLevel, HealthReading, ImpactForce, OverallStatus, Reading,
    SafetyReading,
};
use carelink::narrative::TemplateClient;
use carelink::persistence::MemoryStore;

fn build_system() -> (Arc<Coordinator>, Arc<EmergencyResponder>, Arc<MemoryStore>) {
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
        store.clone(),
        narrative,
    );
    coordinator.set_agents(health, safety, reminder, social, emergency.clone());
    (Arc::new(coordinator), emergency, store)
}

fn bathroom_fall(user_id: &str) -> Envelope {
    Envelope {
        user_id: user_id.to_string(),
        reading: Reading::Safety(SafetyReading {
            timestamp: Utc::now(),
            location: "Bathroom".to_string(),
            activity: "No Movement".to_string(),
            fall_detected: true,
            impact_force: ImpactForce::High,
            post_fall_inactivity_secs: 45,
        }),
    }
}

#[tokio::test]
async fn fall_reading_escalates_to_caregivers_and_flags_emergency() {
    let (coordinator, emergency, store) = build_system();

    let processed = coordinator
        .handle_incoming(bathroom_fall("U2001"))
        .await
        .unwrap();

    // Coordinator forwarded a fall emergency
    assert_eq!(processed.emergency, Some(EmergencyKind::Fall));

    // High impact force: active emergency already at level 2
    let active = emergency.active_emergency("U2001").await.unwrap();
    assert_eq!(active.kind, EmergencyKind::Fall);
    assert_eq!(active.level, EscalationLevel::NotifyCaregivers);
    assert_eq!(active.location, "Bathroom");

    // User's overall status reflects the emergency
    let context = coordinator.context("U2001").await.unwrap();
    assert_eq!(context.overall, OverallStatus::Emergency);

    // Audit trail recorded the creation and both notification batches
    let events = store
        .query(
            "events",
            &[("event_type", serde_json::json!("caregiver_notification"))],
            false,
            None,
        )
        .await
        .unwrap();
    assert!(events.len() >= 2);
}

#[tokio::test]
async fn same_kind_re_report_preserves_escalation() {
    let (coordinator, emergency, _) = build_system();

    coordinator
        .handle_incoming(bathroom_fall("U2001"))
        .await
        .unwrap();
    let first = emergency.active_emergency("U2001").await.unwrap();

    // Second fall reading for the same user, lower severity
    let envelope = Envelope {
        user_id: "U2001".to_string(),
        reading: Reading::Safety(SafetyReading {
            timestamp: Utc::now(),
            location: "Hallway".to_string(),
            activity: "No Movement".to_string(),
            fall_detected: true,
            impact_force: ImpactForce::Low,
            post_fall_inactivity_secs: 5,
        }),
    };
    coordinator.handle_incoming(envelope).await.unwrap();

    let second = emergency.active_emergency("U2001").await.unwrap();
    assert_eq!(second.id, first.id);
    assert_eq!(second.level, first.level);
}

#[tokio::test]
async fn different_kind_supersedes_into_history() {
    let (coordinator, emergency, _) = build_system();

    coordinator
        .handle_incoming(bathroom_fall("U2001"))
        .await
        .unwrap();

    // An urgent health reading supersedes the fall
    let envelope = Envelope {
        user_id: "U2001".to_string(),
        reading: Reading::Health(HealthReading {
            timestamp: Utc::now(),
            heart_rate: 74.0,
            systolic: 118.0,
            diastolic: 78.0,
            glucose: 55.0, // urgent low
            oxygen: 97.0,
        }),
    };
    coordinator.handle_incoming(envelope).await.unwrap();

    let active = emergency.active_emergency("U2001").await.unwrap();
    assert_eq!(active.kind, EmergencyKind::Health);
    assert_eq!(active.level, EscalationLevel::NotifyApp);

    let status = emergency.status("U2001").await;
    let superseded = status
        .recent_history
        .iter()
        .find(|e| e.kind == EmergencyKind::Fall)
        .expect("fall in history");
    assert!(superseded.resolved);
}

#[tokio::test]
async fn resolving_the_emergency_clears_the_overall_status() {
    let (coordinator, emergency, _) = build_system();

    coordinator
        .handle_incoming(bathroom_fall("U2001"))
        .await
        .unwrap();

    let active = emergency.active_emergency("U2001").await.unwrap();
    emergency
        .resolve_emergency("U2001", Some(active.id), Some("Caregiver on site".to_string()))
        .await
        .unwrap();
    assert!(emergency.active_emergency("U2001").await.is_none());

    // Re-pull the agents; the context notices the emergency is gone
    coordinator.refresh_user("U2001").await;
    let report = coordinator.user_status("U2001").await.unwrap();
    assert_ne!(report.context.overall, OverallStatus::Emergency);
    assert!(report.context.emergency.is_none());
    assert!(!report.summary.is_empty());
}

#[tokio::test]
async fn reminder_and_social_readings_flow_through() {
    let (coordinator, _, _) = build_system();

    let social = Envelope {
        user_id: "U2002".to_string(),
        reading: Reading::Social(carelink::domain::SocialEvent {
            timestamp: Utc::now(),
            kind: carelink::domain::InteractionKind::VideoCall,
            duration_minutes: 25,
            contact_kind: "family".to_string(),
            initiated_by_user: true,
        }),
    };
    let processed = coordinator.handle_incoming(social).await.unwrap();
    assert_eq!(processed.domain, "social");
    assert!(processed.emergency.is_none());

    let reminder = Envelope {
        user_id: "U2002".to_string(),
        reading: Reading::Reminder(carelink::domain::ReminderEvent {
            timestamp: Utc::now(),
            acknowledge: None,
            new_reminder: Some(carelink::domain::NewReminder {
                kind: "Medication".to_string(),
                content: "Evening dose".to_string(),
                scheduled_time: Utc::now() + chrono::Duration::hours(2),
            }),
        }),
    };
    let processed = coordinator.handle_incoming(reminder).await.unwrap();
    assert_eq!(processed.domain, "reminder");

    let context = coordinator.context("U2002").await.unwrap();
    // No emergency anywhere in this flow
    assert!(context.emergency.is_none());
    assert_ne!(context.overall, OverallStatus::Emergency);
}

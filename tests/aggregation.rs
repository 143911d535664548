//! Aggregation properties of the coordinator's overall status

use carelink::domain::{
    Alert, AlertKind, AlertLevel, DomainStatus, EmergencyKind, OverallStatus,
};
use carelink::coordination::UserContext;

const DOMAIN_STATUSES: [DomainStatus; 4] = [
    DomainStatus::Normal,
    DomainStatus::Attention,
    DomainStatus::Alert,
    DomainStatus::Unknown,
];

/// Reference implementation of the strict priority order, written
/// independently of the production code path.
fn expected(emergency: bool, domains: &[DomainStatus; 4]) -> OverallStatus {
    if emergency {
        OverallStatus::Emergency
    } else if domains.iter().any(|s| *s == DomainStatus::Alert) {
        OverallStatus::Alert
    } else if domains.iter().any(|s| *s == DomainStatus::Attention) {
        OverallStatus::Attention
    } else if domains.iter().any(|s| *s == DomainStatus::Normal)
        && domains
            .iter()
            .all(|s| *s == DomainStatus::Normal || *s == DomainStatus::Unknown)
    {
        OverallStatus::Normal
    } else {
        OverallStatus::Unknown
    }
}

#[test]
fn overall_status_matches_priority_order_for_all_combinations() {
    for emergency in [false, true] {
        for health in DOMAIN_STATUSES {
            for safety in DOMAIN_STATUSES {
                for reminder in DOMAIN_STATUSES {
                    for social in DOMAIN_STATUSES {
                        let domains = [health, safety, reminder, social];
                        assert_eq!(
                            OverallStatus::derive(emergency, &domains),
                            expected(emergency, &domains),
                            "combination {:?} emergency={}",
                            domains,
                            emergency
                        );
                    }
                }
            }
        }
    }
}

#[test]
fn emergency_dominates_every_combination() {
    for health in DOMAIN_STATUSES {
        for safety in DOMAIN_STATUSES {
            assert_eq!(
                OverallStatus::derive(
                    true,
                    &[health, safety, DomainStatus::Normal, DomainStatus::Unknown]
                ),
                OverallStatus::Emergency
            );
        }
    }
}

#[test]
fn context_merge_is_idempotent_for_identical_alerts() {
    let mut context = UserContext::new("U1000");
    let alert = Alert::new(AlertLevel::Warning, AlertKind::HeartRateHigh, "hr high");

    context.merge_alerts(&[alert.clone()]);
    let len_after_first = context.alerts.len();
    context.merge_alerts(&[alert]);
    assert_eq!(context.alerts.len(), len_after_first);
}

#[test]
fn context_overall_follows_domain_updates() {
    let mut context = UserContext::new("U1000");
    context.health_status = DomainStatus::Normal;
    context.safety_status = DomainStatus::Normal;
    context.reminder_status = DomainStatus::Normal;
    context.social_status = DomainStatus::Normal;
    context.recompute_overall();
    assert_eq!(context.overall, OverallStatus::Normal);

    context.social_status = DomainStatus::Attention;
    context.recompute_overall();
    assert_eq!(context.overall, OverallStatus::Attention);

    context.health_status = DomainStatus::Alert;
    context.recompute_overall();
    assert_eq!(context.overall, OverallStatus::Alert);

    context.emergency = Some(EmergencyKind::Health);
    context.recompute_overall();
    assert_eq!(context.overall, OverallStatus::Emergency);
}

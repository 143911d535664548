//! Domain and overall status levels

use serde::{Deserialize, Serialize};

/// Status of a single monitoring domain for a user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DomainStatus {
    /// Everything within expected ranges
    Normal,
    /// One concern present, worth watching
    Attention,
    /// Multiple or serious concerns
    Alert,
    /// No data yet
    Unknown,
}

impl DomainStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DomainStatus::Normal => "normal",
            DomainStatus::Attention => "attention",
            DomainStatus::Alert => "alert",
            DomainStatus::Unknown => "unknown",
        }
    }

    /// Status ladder used by the analyzers: no concerns is normal, a single
    /// concern needs attention, anything more is an alert.
    pub fn from_concern_count(count: usize) -> Self {
        match count {
            0 => DomainStatus::Normal,
            1 => DomainStatus::Attention,
            _ => DomainStatus::Alert,
        }
    }
}

impl std::fmt::Display for DomainStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Aggregate status for a user across all domains
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverallStatus {
    Emergency,
    Alert,
    Attention,
    Normal,
    Unknown,
}

impl OverallStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OverallStatus::Emergency => "emergency",
            OverallStatus::Alert => "alert",
            OverallStatus::Attention => "attention",
            OverallStatus::Normal => "normal",
            OverallStatus::Unknown => "unknown",
        }
    }

    /// Derive the overall status from the per-domain statuses.
    ///
    /// Strict priority order: emergency > alert > attention > normal >
    /// unknown. Normal requires every non-unknown domain to be normal with at
    /// least one domain known; mixed/absent data is unknown.
    pub fn derive(emergency_active: bool, domains: &[DomainStatus]) -> Self {
        if emergency_active {
            return OverallStatus::Emergency;
        }
        if domains.contains(&DomainStatus::Alert) {
            return OverallStatus::Alert;
        }
        if domains.contains(&DomainStatus::Attention) {
            return OverallStatus::Attention;
        }
        let known = domains.iter().filter(|s| **s != DomainStatus::Unknown);
        let mut any_known = false;
        for status in known {
            any_known = true;
            if *status != DomainStatus::Normal {
                return OverallStatus::Unknown;
            }
        }
        if any_known {
            OverallStatus::Normal
        } else {
            OverallStatus::Unknown
        }
    }
}

impl std::fmt::Display for OverallStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_concern_ladder() {
        assert_eq!(DomainStatus::from_concern_count(0), DomainStatus::Normal);
        assert_eq!(DomainStatus::from_concern_count(1), DomainStatus::Attention);
        assert_eq!(DomainStatus::from_concern_count(4), DomainStatus::Alert);
    }

    #[test]
    fn test_emergency_wins() {
        let all_normal = [DomainStatus::Normal; 4];
        assert_eq!(
            OverallStatus::derive(true, &all_normal),
            OverallStatus::Emergency
        );
    }

    #[test]
    fn test_alert_beats_attention() {
        let domains = [
            DomainStatus::Alert,
            DomainStatus::Attention,
            DomainStatus::Normal,
            DomainStatus::Unknown,
        ];
        assert_eq!(OverallStatus::derive(false, &domains), OverallStatus::Alert);
    }

    #[test]
    fn test_normal_requires_all_known_normal() {
        let domains = [
            DomainStatus::Normal,
            DomainStatus::Normal,
            DomainStatus::Unknown,
            DomainStatus::Normal,
        ];
        assert_eq!(
            OverallStatus::derive(false, &domains),
            OverallStatus::Normal
        );

        let all_unknown = [DomainStatus::Unknown; 4];
        assert_eq!(
            OverallStatus::derive(false, &all_unknown),
            OverallStatus::Unknown
        );
    }
}

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub system: SystemConfig,
    #[serde(default)]
    pub agents: AgentsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SystemConfig {
    /// Where the store dump is written on shutdown
    #[serde(default = "default_store_path")]
    pub store_path: String,
    /// Seconds after which a user context is considered stale
    #[serde(default = "default_context_stale_secs")]
    pub context_stale_secs: u64,
}

fn default_store_path() -> String {
    "data/carelink-store.json".to_string()
}

fn default_context_stale_secs() -> u64 {
    60
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            store_path: default_store_path(),
            context_stale_secs: default_context_stale_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AgentsConfig {
    #[serde(default)]
    pub health: HealthAgentConfig,
    #[serde(default)]
    pub safety: SafetyAgentConfig,
    #[serde(default)]
    pub reminder: ReminderAgentConfig,
    #[serde(default)]
    pub social: SocialAgentConfig,
    #[serde(default)]
    pub emergency: EmergencyAgentConfig,
    #[serde(default)]
    pub coordination: CoordinationAgentConfig,
}

/// Normal band plus optional urgent bounds for one health metric
#[derive(Debug, Clone, Copy, Deserialize, PartialEq)]
pub struct MetricBand {
    pub min: f64,
    pub max: f64,
    #[serde(default)]
    pub urgent_min: Option<f64>,
    #[serde(default)]
    pub urgent_max: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HealthAgentConfig {
    #[serde(default = "default_update_interval")]
    pub update_interval_secs: u64,
    #[serde(default = "default_heart_rate_band")]
    pub heart_rate: MetricBand,
    #[serde(default = "default_systolic_band")]
    pub systolic: MetricBand,
    #[serde(default = "default_diastolic_band")]
    pub diastolic: MetricBand,
    #[serde(default = "default_glucose_band")]
    pub glucose: MetricBand,
    #[serde(default = "default_oxygen_band")]
    pub oxygen: MetricBand,
}

fn default_update_interval() -> u64 {
    60
}

fn default_heart_rate_band() -> MetricBand {
    MetricBand {
        min: 60.0,
        max: 100.0,
        urgent_min: None,
        urgent_max: None,
    }
}

fn default_systolic_band() -> MetricBand {
    MetricBand {
        min: 90.0,
        max: 140.0,
        urgent_min: None,
        urgent_max: Some(160.0),
    }
}

fn default_diastolic_band() -> MetricBand {
    MetricBand {
        min: 60.0,
        max: 90.0,
        urgent_min: None,
        urgent_max: Some(100.0),
    }
}

fn default_glucose_band() -> MetricBand {
    MetricBand {
        min: 70.0,
        max: 140.0,
        urgent_min: Some(60.0),
        urgent_max: Some(180.0),
    }
}

fn default_oxygen_band() -> MetricBand {
    MetricBand {
        min: 95.0,
        max: 100.0,
        urgent_min: Some(92.0),
        urgent_max: None,
    }
}

impl Default for HealthAgentConfig {
    fn default() -> Self {
        Self {
            update_interval_secs: default_update_interval(),
            heart_rate: default_heart_rate_band(),
            systolic: default_systolic_band(),
            diastolic: default_diastolic_band(),
            glucose: default_glucose_band(),
            oxygen: default_oxygen_band(),
        }
    }
}

/// Per-room safety settings
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RoomConfig {
    /// Minutes of "No Movement" before an inactivity alert
    #[serde(default = "default_room_inactivity")]
    pub inactivity_threshold_mins: u64,
    /// Activities considered normal for this room (empty = anything)
    #[serde(default)]
    pub expected_activities: Vec<String>,
}

fn default_room_inactivity() -> u64 {
    120
}

#[derive(Debug, Clone, Deserialize)]
pub struct SafetyAgentConfig {
    #[serde(default = "default_update_interval")]
    pub update_interval_secs: u64,
    /// Room name (lowercased) -> settings
    #[serde(default)]
    pub rooms: HashMap<String, RoomConfig>,
}

impl SafetyAgentConfig {
    /// Inactivity threshold for a room, with the stock defaults for common
    /// rooms when not configured.
    pub fn inactivity_threshold_mins(&self, room: &str) -> u64 {
        let room = room.to_lowercase();
        if let Some(cfg) = self.rooms.get(&room) {
            return cfg.inactivity_threshold_mins;
        }
        match room.as_str() {
            "bedroom" => 480,
            "bathroom" => 60,
            "living room" => 240,
            "kitchen" => 120,
            _ => 120,
        }
    }

    /// Expected activities for a room, if configured
    pub fn expected_activities(&self, room: &str) -> &[String] {
        self.rooms
            .get(&room.to_lowercase())
            .map(|cfg| cfg.expected_activities.as_slice())
            .unwrap_or(&[])
    }
}

impl Default for SafetyAgentConfig {
    fn default() -> Self {
        Self {
            update_interval_secs: default_update_interval(),
            rooms: HashMap::new(),
        }
    }
}

/// Per-kind reminder settings
#[derive(Debug, Clone, Deserialize)]
pub struct ReminderKindConfig {
    #[serde(default = "default_reminder_priority")]
    pub priority: String,
    /// Minutes before an unacknowledged reminder is overdue
    #[serde(default = "default_max_delay")]
    pub max_delay_mins: u64,
    /// Preferred times of day, "HH:MM"
    #[serde(default)]
    pub preferred_times: Vec<String>,
}

fn default_reminder_priority() -> String {
    "medium".to_string()
}

fn default_max_delay() -> u64 {
    60
}

impl Default for ReminderKindConfig {
    fn default() -> Self {
        Self {
            priority: default_reminder_priority(),
            max_delay_mins: default_max_delay(),
            preferred_times: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReminderAgentConfig {
    #[serde(default = "default_update_interval")]
    pub update_interval_secs: u64,
    /// Reminder kind (lowercased) -> settings
    #[serde(default)]
    pub kinds: HashMap<String, ReminderKindConfig>,
}

impl ReminderAgentConfig {
    /// Preferred times for a reminder kind, with stock defaults
    pub fn preferred_times(&self, kind: &str) -> Vec<String> {
        let kind = kind.to_lowercase();
        if let Some(cfg) = self.kinds.get(&kind) {
            if !cfg.preferred_times.is_empty() {
                return cfg.preferred_times.clone();
            }
        }
        let defaults: &[&str] = match kind.as_str() {
            "medication" => &["08:00", "12:00", "18:00"],
            "hydration" => &["09:00", "12:00", "15:00", "18:00"],
            "exercise" => &["10:00", "16:00"],
            "appointment" => &["09:00"],
            _ => &[],
        };
        defaults.iter().map(|t| t.to_string()).collect()
    }

    pub fn kind_config(&self, kind: &str) -> ReminderKindConfig {
        self.kinds
            .get(&kind.to_lowercase())
            .cloned()
            .unwrap_or_default()
    }
}

impl Default for ReminderAgentConfig {
    fn default() -> Self {
        let mut kinds = HashMap::new();
        for kind in ["medication", "hydration", "exercise", "appointment"] {
            kinds.insert(kind.to_string(), ReminderKindConfig::default());
        }
        Self {
            update_interval_secs: default_update_interval(),
            kinds,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SocialAgentConfig {
    #[serde(default = "default_update_interval")]
    pub update_interval_secs: u64,
    /// Hours without interaction before isolation is flagged
    #[serde(default = "default_isolation_threshold")]
    pub isolation_threshold_hours: u64,
}

fn default_isolation_threshold() -> u64 {
    72
}

impl Default for SocialAgentConfig {
    fn default() -> Self {
        Self {
            update_interval_secs: default_update_interval(),
            isolation_threshold_hours: default_isolation_threshold(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmergencyAgentConfig {
    #[serde(default = "default_emergency_interval")]
    pub update_interval_secs: u64,
    /// Seconds with no response before escalating one level
    #[serde(default = "default_escalation_interval")]
    pub escalation_interval_secs: u64,
}

fn default_emergency_interval() -> u64 {
    10
}

fn default_escalation_interval() -> u64 {
    300
}

impl Default for EmergencyAgentConfig {
    fn default() -> Self {
        Self {
            update_interval_secs: default_emergency_interval(),
            escalation_interval_secs: default_escalation_interval(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CoordinationAgentConfig {
    #[serde(default = "default_update_interval")]
    pub update_interval_secs: u64,
}

impl Default for CoordinationAgentConfig {
    fn default() -> Self {
        Self {
            update_interval_secs: default_update_interval(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Enable JSON formatted logs
    #[serde(default)]
    pub json: bool,
    /// Directory for the rolling log file (console only when unset)
    #[serde(default)]
    pub dir: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl AppConfig {
    /// Load configuration from files and environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("config")
    }

    /// Load configuration from a specific directory
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();

        let builder = Config::builder()
            .set_default("logging.level", "info")?
            .set_default("logging.json", false)?
            // Load default config file
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Load environment-specific config (e.g., config/production.toml)
            .add_source(
                File::from(config_dir.join(
                    std::env::var("CARELINK_ENV").unwrap_or_else(|_| "development".to_string()),
                ))
                .required(false),
            )
            // Override with environment variables (CARELINK_SYSTEM__STORE_PATH, etc.)
            .add_source(
                Environment::with_prefix("CARELINK")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        let bands = [
            ("heart_rate", &self.agents.health.heart_rate),
            ("systolic", &self.agents.health.systolic),
            ("diastolic", &self.agents.health.diastolic),
            ("glucose", &self.agents.health.glucose),
            ("oxygen", &self.agents.health.oxygen),
        ];
        for (name, band) in bands {
            if band.min >= band.max {
                errors.push(format!("{name}: min must be below max"));
            }
            if let Some(umax) = band.urgent_max {
                if umax < band.max {
                    errors.push(format!("{name}: urgent_max must be at or above max"));
                }
            }
            if let Some(umin) = band.urgent_min {
                if umin > band.min {
                    errors.push(format!("{name}: urgent_min must be at or below min"));
                }
            }
        }

        for (room, cfg) in &self.agents.safety.rooms {
            if cfg.inactivity_threshold_mins < 5 || cfg.inactivity_threshold_mins > 720 {
                errors.push(format!(
                    "room {room}: inactivity threshold must be within 5..=720 minutes"
                ));
            }
        }

        if self.agents.emergency.escalation_interval_secs == 0 {
            errors.push("emergency escalation interval must be positive".to_string());
        }

        if self.system.context_stale_secs == 0 {
            errors.push("context_stale_secs must be positive".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            system: SystemConfig::default(),
            agents: AgentsConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_validates() {
        let cfg = AppConfig::default();
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_default_thresholds() {
        let cfg = HealthAgentConfig::default();
        assert_eq!(cfg.heart_rate.min, 60.0);
        assert_eq!(cfg.heart_rate.max, 100.0);
        assert_eq!(cfg.oxygen.urgent_min, Some(92.0));
        assert_eq!(cfg.systolic.urgent_max, Some(160.0));
    }

    #[test]
    fn test_room_defaults() {
        let cfg = SafetyAgentConfig::default();
        assert_eq!(cfg.inactivity_threshold_mins("Bedroom"), 480);
        assert_eq!(cfg.inactivity_threshold_mins("bathroom"), 60);
        assert_eq!(cfg.inactivity_threshold_mins("garage"), 120);
    }

    #[test]
    fn test_preferred_time_defaults() {
        let cfg = ReminderAgentConfig::default();
        assert_eq!(
            cfg.preferred_times("Medication"),
            vec!["08:00", "12:00", "18:00"]
        );
        assert!(cfg.preferred_times("custom").is_empty());
    }

    #[test]
    fn test_invalid_band_rejected() {
        let mut cfg = AppConfig::default();
        cfg.agents.health.glucose.min = 200.0;
        let errors = cfg.validate().unwrap_err();
        assert!(errors.iter().any(|e| e.contains("glucose")));
    }
}

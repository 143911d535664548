pub mod agents;
pub mod analyzer;
pub mod config;
pub mod coordination;
pub mod domain;
pub mod error;
pub mod narrative;
pub mod persistence;
pub mod runtime;
pub mod sim;

pub use agents::{
    DailyAssistant, EmergencyResponder, HealthMonitor, PollingAgent, SafetyGuardian,
    SocialCompanion,
};
pub use analyzer::{HistoryAnalyzer, MemoryAnalyzer};
pub use config::AppConfig;
pub use coordination::{Coordinator, SystemStatus, UserContext, UserStatusReport};
pub use domain::{
    Alert, AlertKind, AlertLevel, DomainStatus, Emergency, EmergencyContact, EmergencyKind,
    Envelope, EscalationLevel, OverallStatus, Reading,
};
pub use error::{CareError, Result};
pub use narrative::{NarrativeClient, TemplateClient};
pub use persistence::MemoryStore;
pub use runtime::{AgentRuntime, ShutdownToken};

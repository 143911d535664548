//! Monitoring agents
//!
//! Each agent owns one vertical slice of a user's state: health vitals,
//! in-home safety, daily reminders, social engagement, and emergencies. The
//! coordinator routes readings to them and merges their results.

pub mod emergency;
pub mod health;
pub mod reminder;
pub mod safety;
pub mod social;

use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;

pub use emergency::{EmergencyResponder, EmergencyStatusReport};
pub use health::{HealthMonitor, HealthOutcome, HealthStatusReport};
pub use reminder::{DailyAssistant, ReminderOutcome, ReminderStatusReport};
pub use safety::{SafetyGuardian, SafetyOutcome, SafetyStatusReport};
pub use social::{SocialCompanion, SocialOutcome, SocialStatusReport};

/// Contract shared by all agents driven by the polling runtime.
///
/// `tick` performs one periodic update pass. It is called when the agent's
/// update interval has elapsed; errors are logged by the runtime and never
/// stop the loop.
#[async_trait]
pub trait PollingAgent: Send + Sync {
    /// Agent name, used for logging and audit records
    fn name(&self) -> &'static str;

    /// How often `tick` should run
    fn update_interval(&self) -> Duration;

    /// One periodic update pass
    async fn tick(&self) -> Result<()>;
}

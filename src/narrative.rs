//! Narrative text generation stand-in
//!
//! Agents attach short advisory text to their responses. The shipped client
//! is keyword-matched canned text; a real model can be swapped in behind the
//! trait. Core logic never branches on the generated output, and generation
//! failure degrades to a fixed string.

use async_trait::async_trait;
use rand::seq::SliceRandom;
use tracing::debug;

/// What kind of narrative is being requested. Used to pick a template and
/// for logging only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NarrativeKind {
    StatusSummary,
    HealthAnalysis,
    SafetyAnalysis,
    ReminderAnalysis,
    EmergencyAnalysis,
}

impl NarrativeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NarrativeKind::StatusSummary => "status_summary",
            NarrativeKind::HealthAnalysis => "health_analysis",
            NarrativeKind::SafetyAnalysis => "safety_analysis",
            NarrativeKind::ReminderAnalysis => "reminder_analysis",
            NarrativeKind::EmergencyAnalysis => "emergency_analysis",
        }
    }
}

/// Advisory text generator
#[async_trait]
pub trait NarrativeClient: Send + Sync {
    async fn generate(&self, prompt: &str, kind: NarrativeKind) -> String;
}

/// Keyword-matched canned responses
pub struct TemplateClient;

impl TemplateClient {
    pub fn new() -> Self {
        Self
    }

    fn pick(options: &[&str]) -> String {
        let mut rng = rand::thread_rng();
        options
            .choose(&mut rng)
            .copied()
            .unwrap_or("Situation reviewed; no further detail available.")
            .to_string()
    }
}

impl Default for TemplateClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NarrativeClient for TemplateClient {
    async fn generate(&self, prompt: &str, kind: NarrativeKind) -> String {
        debug!("Generating {} narrative", kind.as_str());
        let prompt = prompt.to_lowercase();

        match kind {
            NarrativeKind::EmergencyAnalysis => {
                if prompt.contains("fall") {
                    Self::pick(&[
                        "A fall has been detected. Check on the user immediately and assess for injury before moving them.",
                        "Fall event in progress. Caregivers should respond in person and confirm the user is conscious and responsive.",
                    ])
                } else {
                    Self::pick(&[
                        "A health emergency is in progress. Verify the latest vital readings and contact the physician if values remain abnormal.",
                        "Emergency under way. Follow the escalation chain and confirm someone reaches the user promptly.",
                    ])
                }
            }
            NarrativeKind::HealthAnalysis => {
                if prompt.contains("oxygen") {
                    Self::pick(&[
                        "Oxygen saturation is below the expected range. Encourage rest and verify the sensor placement; seek medical advice if it persists.",
                        "Low oxygen readings detected. Re-check with the pulse oximeter and keep the user seated until levels recover.",
                    ])
                } else if prompt.contains("blood pressure") || prompt.contains("heart") {
                    Self::pick(&[
                        "Cardiovascular readings are outside the personal range. Have the user rest and re-measure in 15 minutes.",
                        "Heart readings need attention. Avoid exertion and confirm medication was taken as scheduled.",
                    ])
                } else if prompt.contains("glucose") {
                    Self::pick(&[
                        "Glucose is out of range. Review recent meals and medication timing with the caregiver.",
                    ])
                } else {
                    Self::pick(&[
                        "Vital signs reviewed. Continue routine monitoring.",
                        "No acute pattern in the current vitals; keep the regular check-in schedule.",
                    ])
                }
            }
            NarrativeKind::SafetyAnalysis => {
                if prompt.contains("fall") {
                    Self::pick(&[
                        "Movement data shows a fall. Review the room for trip hazards once the user is safe.",
                    ])
                } else if prompt.contains("inactiv") {
                    Self::pick(&[
                        "An unusually long period without movement was observed. A wellness check is recommended.",
                        "Extended inactivity detected. Confirm the user is resting by choice and not in difficulty.",
                    ])
                } else {
                    Self::pick(&[
                        "Movement patterns look routine for this time of day.",
                    ])
                }
            }
            NarrativeKind::ReminderAnalysis => Self::pick(&[
                "Reminder adherence could improve. Consider louder prompts or moving reminders closer to meal times.",
                "Acknowledgment patterns suggest timing adjustments would help; align reminders with the user's active hours.",
            ]),
            NarrativeKind::StatusSummary => Self::pick(&[
                "Overall condition is being monitored across health, safety, reminders and social engagement; see component summaries for specifics.",
                "Current status compiled from all monitoring domains. Attend first to any urgent alerts listed above.",
            ]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_keyword_routing() {
        let client = TemplateClient::new();
        let text = client
            .generate("Fall detected in Bathroom", NarrativeKind::EmergencyAnalysis)
            .await;
        assert!(text.to_lowercase().contains("fall"));
    }

    #[tokio::test]
    async fn test_always_returns_text() {
        let client = TemplateClient::new();
        let text = client.generate("", NarrativeKind::StatusSummary).await;
        assert!(!text.is_empty());
    }
}

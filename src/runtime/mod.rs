//! Agent polling runtime
//!
//! One loop per agent: run the agent's tick when its interval has elapsed,
//! sleep briefly between iterations, back off after errors, exit
//! cooperatively on shutdown.

mod shutdown;

pub use shutdown::ShutdownToken;

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::agents::PollingAgent;

/// Sleep between loop iterations
const POLL_SLEEP: Duration = Duration::from_millis(100);
/// Longer sleep after an iteration error
const ERROR_BACKOFF: Duration = Duration::from_secs(1);

/// Spawns and tracks the agent polling loops
pub struct AgentRuntime {
    shutdown: ShutdownToken,
    handles: Vec<JoinHandle<()>>,
}

impl AgentRuntime {
    pub fn new(shutdown: ShutdownToken) -> Self {
        Self {
            shutdown,
            handles: Vec::new(),
        }
    }

    pub fn shutdown_token(&self) -> ShutdownToken {
        self.shutdown.clone()
    }

    /// Spawn the polling loop for one agent
    pub fn spawn(&mut self, agent: Arc<dyn PollingAgent>) {
        let shutdown = self.shutdown.clone();
        let name = agent.name();

        let handle = tokio::spawn(async move {
            info!("Started processing loop for {} agent", name);
            let mut last_update: Option<DateTime<Utc>> = None;

            while !shutdown.is_triggered() {
                let interval = agent.update_interval();
                let due = match last_update {
                    Some(at) => {
                        (Utc::now() - at).num_seconds().max(0) as u64 >= interval.as_secs()
                    }
                    None => true,
                };

                if due {
                    match agent.tick().await {
                        Ok(()) => {
                            last_update = Some(Utc::now());
                            debug!("Update completed for {} agent", name);
                        }
                        Err(e) => {
                            // Nothing in a tick is allowed to kill the loop
                            error!("Error in {} processing loop: {}", name, e);
                            tokio::time::sleep(ERROR_BACKOFF).await;
                        }
                    }
                }

                tokio::time::sleep(POLL_SLEEP).await;
            }

            info!("Processing loop for {} agent stopped", name);
        });

        self.handles.push(handle);
    }

    /// Trigger shutdown and wait for every loop to finish its iteration
    pub async fn stop(self) {
        self.shutdown.trigger();
        for handle in self.handles {
            let _ = handle.await;
        }
        info!("All agent loops stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingAgent {
        ticks: AtomicUsize,
    }

    #[async_trait]
    impl PollingAgent for CountingAgent {
        fn name(&self) -> &'static str {
            "counting"
        }

        fn update_interval(&self) -> Duration {
            Duration::from_secs(0)
        }

        async fn tick(&self) -> Result<()> {
            self.ticks.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_loop_ticks_and_stops() {
        let agent = Arc::new(CountingAgent {
            ticks: AtomicUsize::new(0),
        });
        let mut runtime = AgentRuntime::new(ShutdownToken::new());
        runtime.spawn(agent.clone());

        tokio::time::sleep(Duration::from_millis(350)).await;
        runtime.stop().await;

        assert!(agent.ticks.load(Ordering::SeqCst) >= 2);
    }

    struct FailingAgent;

    #[async_trait]
    impl PollingAgent for FailingAgent {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn update_interval(&self) -> Duration {
            Duration::from_secs(0)
        }

        async fn tick(&self) -> Result<()> {
            Err(crate::error::CareError::Internal("boom".to_string()))
        }
    }

    #[tokio::test]
    async fn test_errors_do_not_kill_the_loop() {
        let mut runtime = AgentRuntime::new(ShutdownToken::new());
        runtime.spawn(Arc::new(FailingAgent));

        tokio::time::sleep(Duration::from_millis(200)).await;
        // Reaching stop() without a panic is the assertion
        runtime.stop().await;
    }
}

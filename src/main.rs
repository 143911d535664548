use std::sync::Arc;

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use carelink::agents::{
    DailyAssistant, EmergencyResponder, HealthMonitor, SafetyGuardian, SocialCompanion,
};
use carelink::analyzer::MemoryAnalyzer;
use carelink::config::AppConfig;
use carelink::coordination::Coordinator;
use carelink::narrative::TemplateClient;
use carelink::persistence::MemoryStore;
use carelink::runtime::{AgentRuntime, ShutdownToken};
use carelink::sim::{seed_demo_history, Simulator};

mod cli;
use cli::{Cli, Commands};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load_from(&cli.config)?;
    if let Err(errors) = config.validate() {
        for error in &errors {
            eprintln!("config error: {error}");
        }
        anyhow::bail!("invalid configuration ({} errors)", errors.len());
    }

    // The file appender guard must outlive the runtime
    let _guard = init_logging(&config);

    match cli.command {
        Some(Commands::CheckConfig) => {
            println!("Configuration OK");
            Ok(())
        }
        Some(Commands::Run { simulate }) => run(config, simulate),
        None => run(config, false),
    }
}

fn init_logging(config: &AppConfig) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.level.clone()));

    match &config.logging.dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "carelink.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            if config.logging.json {
                tracing_subscriber::fmt()
                    .with_env_filter(filter)
                    .with_writer(writer)
                    .json()
                    .init();
            } else {
                tracing_subscriber::fmt()
                    .with_env_filter(filter)
                    .with_writer(writer)
                    .with_ansi(false)
                    .init();
            }
            Some(guard)
        }
        None => {
            if config.logging.json {
                tracing_subscriber::fmt().with_env_filter(filter).json().init();
            } else {
                tracing_subscriber::fmt().with_env_filter(filter).init();
            }
            None
        }
    }
}

#[tokio::main]
async fn run(config: AppConfig, simulate: bool) -> anyhow::Result<()> {
    info!("Initializing carelink...");

    // Collaborators, injected into every agent
    let analyzer = Arc::new(MemoryAnalyzer::new());
    let store = Arc::new(MemoryStore::new());
    let narrative = Arc::new(TemplateClient::new());

    if simulate {
        seed_demo_history(&analyzer, &["U1000", "U1001", "U1002"]);
    }

    let health = Arc::new(HealthMonitor::new(
        config.agents.health.clone(),
        analyzer.clone(),
        store.clone(),
        narrative.clone(),
    ));
    let safety = Arc::new(SafetyGuardian::new(
        config.agents.safety.clone(),
        analyzer.clone(),
        store.clone(),
        narrative.clone(),
    ));
    let reminder = Arc::new(DailyAssistant::new(
        config.agents.reminder.clone(),
        analyzer.clone(),
        store.clone(),
        narrative.clone(),
    ));
    let social = Arc::new(SocialCompanion::new(
        config.agents.social.clone(),
        analyzer.clone(),
        store.clone(),
        narrative.clone(),
    ));
    let emergency = Arc::new(EmergencyResponder::new(
        config.agents.emergency.clone(),
        store.clone(),
        narrative.clone(),
    ));

    let mut coordinator = Coordinator::new(
        config.agents.coordination.clone(),
        config.system.context_stale_secs,
        analyzer.clone(),
        store.clone(),
        narrative.clone(),
    );
    coordinator.set_agents(
        health.clone(),
        safety.clone(),
        reminder.clone(),
        social.clone(),
        emergency.clone(),
    );
    let coordinator = Arc::new(coordinator);

    // Seed per-agent state from history before the loops start
    health.initialize().await;
    safety.initialize().await;
    reminder.initialize().await;
    social.initialize().await;
    coordinator.initialize().await;

    let shutdown = ShutdownToken::new();
    let mut runtime = AgentRuntime::new(shutdown.clone());
    runtime.spawn(health);
    runtime.spawn(safety);
    runtime.spawn(reminder);
    runtime.spawn(social);
    runtime.spawn(emergency);
    runtime.spawn(coordinator.clone());

    info!("All agents started successfully");

    let sim_handle = if simulate {
        let simulator = Simulator::new(analyzer.clone(), coordinator.clone(), shutdown.clone());
        Some(tokio::spawn(simulator.run()))
    } else {
        None
    };

    wait_for_signal().await;
    shutdown.trigger();

    if let Some(handle) = sim_handle {
        let _ = handle.await;
    }
    runtime.stop().await;

    // Dump the audit trail on the way out
    if let Err(e) = store.save_to(&config.system.store_path).await {
        error!("Failed to save store: {}", e);
    }

    info!("Shutdown complete");
    Ok(())
}

async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(sigterm) => sigterm,
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                let _ = tokio::signal::ctrl_c().await;
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => info!("Received interrupt, shutting down..."),
            _ = sigterm.recv() => info!("Received terminate, shutting down..."),
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        info!("Received interrupt, shutting down...");
    }
}

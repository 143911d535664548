//! Command-line interface definitions

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "carelink",
    about = "Multi-agent elder-care monitoring service",
    version
)]
pub struct Cli {
    /// Path to the configuration directory
    #[arg(long, default_value = "config", env = "CARELINK_CONFIG")]
    pub config: String,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the monitoring service
    Run {
        /// Feed synthetic readings through the coordinator
        #[arg(long)]
        simulate: bool,
    },
    /// Load and validate the configuration, then exit
    CheckConfig,
}

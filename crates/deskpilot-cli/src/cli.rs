use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "deskpilot",
    version,
    about = "AI computer-control agent for Windows desktops"
)]
pub struct Cli {
    /// Exit immediately on failure instead of waiting for Enter
    #[arg(long, global = true)]
    pub no_pause: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Provision the agent environment and install runtime assets
    Install,
    /// Start the web UI (requires a provisioned environment)
    Run {
        /// Port for the local web UI
        #[arg(long, default_value_t = deskpilot_server::DEFAULT_PORT, env = "DESKPILOT_PORT")]
        port: u16,
    },
    /// Show runtime, environment, and credential status
    Status,
}

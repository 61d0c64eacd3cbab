use clap::{Parser, Subcommand};

/// CLI for overture
#[derive(Parser, Debug)]
#[command(
    name = "overture",
    version,
    about = "Brings up a local development environment in dependency order"
)]
pub struct Cli {
    /// Diagnostic log filter, overridden by `RUST_LOG`
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start every service, primary last, and keep them up until interrupted
    Run {
        /// File path to the configuration file (TOML)
        #[arg(short, long)]
        file: Option<String>,

        /// Milliseconds to wait after SIGTERM before killing a service
        #[arg(long)]
        grace_ms: Option<u64>,
    },
    /// Validate the configuration and print the launch order
    Check {
        /// File path to the configuration file (TOML)
        #[arg(short, long)]
        file: Option<String>,
    },
}

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

mod commands;
mod config;
mod logger;

/// Exit status for configuration and setup errors.
const EXIT_USAGE: u8 = 2;

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = config::Cli::parse();
    init_tracing(&cli.log_level);

    let result = match cli.command {
        config::Commands::Run { file, grace_ms } => commands::run(file, grace_ms).await,
        config::Commands::Check { file } => commands::check(file),
    };

    match result {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::from(EXIT_USAGE)
        }
    }
}

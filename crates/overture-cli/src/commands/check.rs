use std::process::ExitCode;

use anyhow::{Context, Result};
use overture_config::load_from_path;

use super::config_path;

pub fn check(file: Option<String>) -> Result<ExitCode> {
    let path = config_path(file)?;
    let config = load_from_path(&path)
        .with_context(|| format!("loading config from {}", path.display()))?;

    println!("{} is valid, launch order:", path.display());
    for (index, service) in config.services.launch_order().enumerate() {
        let role = if service.is_primary {
            "primary".to_owned()
        } else {
            format!("priority {}", service.priority)
        };
        println!(
            "  {}. {} ({role}, port {}, ready at {}, timeout {}ms)",
            index + 1,
            service.name,
            service.port,
            service.readiness_url,
            service.readiness.timeout.as_millis()
        );
    }

    Ok(ExitCode::SUCCESS)
}

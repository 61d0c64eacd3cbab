use std::time::Duration;

use overture_types::DescriptorSet;

/// Default best-effort wait between SIGTERM and SIGKILL on shutdown.
pub const DEFAULT_GRACE: Duration = Duration::from_millis(2000);

/// A loaded and validated launcher configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub version: u32,
    pub services: DescriptorSet,
    pub shutdown: ShutdownSettings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShutdownSettings {
    pub grace: Duration,
}

impl Default for ShutdownSettings {
    fn default() -> Self {
        Self {
            grace: DEFAULT_GRACE,
        }
    }
}

use std::{path::Path, time::Duration};

use overture_types::{DescriptorSet, ReadinessPolicy, ServiceDescriptor};

use crate::{
    model::{Config, ShutdownSettings},
    raw::{RawProject, RawReadiness, RawService},
    ConfigError,
};

const SUPPORTED_VERSION: u32 = 1;

impl RawReadiness {
    fn apply(self, base: ReadinessPolicy) -> ReadinessPolicy {
        ReadinessPolicy {
            initial_delay: self
                .initial_delay_ms
                .map_or(base.initial_delay, Duration::from_millis),
            interval: self.interval_ms.map_or(base.interval, Duration::from_millis),
            timeout: self.timeout_ms.map_or(base.timeout, Duration::from_millis),
        }
    }
}

impl RawService {
    fn to_descriptor(
        &self,
        name: &str,
        defaults: ReadinessPolicy,
        base_dir: &Path,
    ) -> ServiceDescriptor {
        let mut descriptor = ServiceDescriptor::new(name, self.cmd.clone(), self.port);

        // Relative working directories resolve against the config file.
        descriptor.cwd = Some(match &self.cwd {
            Some(cwd) => base_dir.join(cwd),
            None => base_dir.to_path_buf(),
        });
        descriptor.env = self.env.clone().unwrap_or_default();
        if let Some(url) = &self.readiness_url {
            descriptor.readiness_url.clone_from(url);
        }
        if let Some(url) = &self.url {
            descriptor.url.clone_from(url);
        }
        descriptor.priority = self.priority;
        descriptor.is_primary = self.primary;
        descriptor.readiness = self.readiness.apply(defaults);
        descriptor.benign_stderr.clone_from(&self.benign_stderr);

        descriptor
    }
}

impl RawProject {
    pub fn to_config(&self, base_dir: &Path) -> Result<Config, ConfigError> {
        if self.version != SUPPORTED_VERSION {
            return Err(ConfigError::Validation(format!(
                "unsupported config version {}",
                self.version
            )));
        }

        let defaults = self.defaults.readiness.apply(ReadinessPolicy::default());

        let descriptors = self
            .services
            .iter()
            .map(|(name, raw_service)| raw_service.to_descriptor(name, defaults, base_dir))
            .collect();

        let services = DescriptorSet::new(descriptors)
            .map_err(|err| ConfigError::Validation(err.to_string()))?;

        let shutdown = self
            .shutdown
            .grace_ms
            .map_or_else(ShutdownSettings::default, |ms| ShutdownSettings {
                grace: Duration::from_millis(ms),
            });

        Ok(Config {
            version: self.version,
            services,
            shutdown,
        })
    }
}

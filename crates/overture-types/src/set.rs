use std::collections::{HashMap, HashSet};

use crate::ServiceDescriptor;

/// Invariant violations found while building a [`DescriptorSet`].
#[derive(Debug, thiserror::Error)]
pub enum DescriptorError {
    #[error("service name must not be empty")]
    EmptyName,

    #[error("service `{0}` is declared more than once")]
    DuplicateName(String),

    #[error("service `{0}`: cmd is empty")]
    EmptyCommand(String),

    #[error("service `{0}`: cmd contains empty element")]
    BlankCommandElement(String),

    #[error("service `{0}`: port must be non-zero")]
    ZeroPort(String),

    #[error("services `{first}` and `{second}` both listen on port {port}")]
    DuplicatePort {
        port: u16,
        first: String,
        second: String,
    },

    #[error("no service is marked as primary")]
    NoPrimary,

    #[error("more than one service is marked as primary: {}", .0.join(", "))]
    MultiplePrimaries(Vec<String>),

    #[error("service `{service}`: readiness url `{url}` is not an http(s) url")]
    InvalidReadinessUrl { service: String, url: String },

    #[error("service `{service}`: {reason}")]
    InvalidPolicy { service: String, reason: String },

    #[error("service `{service}`: invalid benign stderr pattern `{pattern}`: {source}")]
    InvalidPattern {
        service: String,
        pattern: String,
        source: regex::Error,
    },
}

/// Validated, immutable set of service descriptors.
///
/// Holds exactly one primary service and unique names and ports.
#[derive(Debug, Clone)]
pub struct DescriptorSet {
    support: Vec<ServiceDescriptor>,
    primary: ServiceDescriptor,
}

impl DescriptorSet {
    /// Validates `descriptors` and fixes their launch order.
    ///
    /// Non-primary services are ordered by ascending priority; ties keep
    /// name order so the sequence is deterministic.
    ///
    /// # Errors
    ///
    /// Returns the first [`DescriptorError`] found.
    pub fn new(descriptors: Vec<ServiceDescriptor>) -> Result<Self, DescriptorError> {
        let mut names = HashSet::with_capacity(descriptors.len());
        let mut ports: HashMap<u16, &str> = HashMap::with_capacity(descriptors.len());

        for descriptor in &descriptors {
            validate(descriptor)?;

            if !names.insert(descriptor.name.as_str()) {
                return Err(DescriptorError::DuplicateName(descriptor.name.clone()));
            }
            if let Some(first) = ports.insert(descriptor.port, &descriptor.name) {
                return Err(DescriptorError::DuplicatePort {
                    port: descriptor.port,
                    first: first.to_owned(),
                    second: descriptor.name.clone(),
                });
            }
        }

        let (mut primaries, mut support): (Vec<_>, Vec<_>) =
            descriptors.into_iter().partition(|d| d.is_primary);

        let primary = match primaries.len() {
            0 => return Err(DescriptorError::NoPrimary),
            1 => primaries.remove(0),
            _ => {
                return Err(DescriptorError::MultiplePrimaries(
                    primaries.into_iter().map(|d| d.name).collect(),
                ))
            }
        };

        support.sort_by(|a, b| a.priority.cmp(&b.priority).then_with(|| a.name.cmp(&b.name)));

        Ok(Self { support, primary })
    }

    /// Non-primary services in launch order.
    #[must_use]
    pub fn support(&self) -> &[ServiceDescriptor] {
        &self.support
    }

    #[must_use]
    pub fn primary(&self) -> &ServiceDescriptor {
        &self.primary
    }

    /// Every service in launch order, primary last.
    pub fn launch_order(&self) -> impl Iterator<Item = &ServiceDescriptor> {
        self.support.iter().chain(std::iter::once(&self.primary))
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ServiceDescriptor> {
        self.launch_order().find(|d| d.name == name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.support.len() + 1
    }

    /// Always false: a valid set holds at least the primary.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        false
    }
}

fn validate(descriptor: &ServiceDescriptor) -> Result<(), DescriptorError> {
    let name = &descriptor.name;

    if name.trim().is_empty() {
        return Err(DescriptorError::EmptyName);
    }
    if descriptor.cmd.is_empty() {
        return Err(DescriptorError::EmptyCommand(name.clone()));
    }
    if descriptor.cmd.iter().any(|c| c.trim().is_empty()) {
        return Err(DescriptorError::BlankCommandElement(name.clone()));
    }
    if descriptor.port == 0 {
        return Err(DescriptorError::ZeroPort(name.clone()));
    }

    let url = descriptor.readiness_url.as_str();
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(DescriptorError::InvalidReadinessUrl {
            service: name.clone(),
            url: url.to_owned(),
        });
    }

    if descriptor.readiness.interval.is_zero() {
        return Err(DescriptorError::InvalidPolicy {
            service: name.clone(),
            reason: "readiness interval must be greater than zero".to_owned(),
        });
    }
    if descriptor.readiness.timeout.is_zero() {
        return Err(DescriptorError::InvalidPolicy {
            service: name.clone(),
            reason: "readiness timeout must be greater than zero".to_owned(),
        });
    }

    for pattern in &descriptor.benign_stderr {
        regex::Regex::new(pattern).map_err(|source| DescriptorError::InvalidPattern {
            service: name.clone(),
            pattern: pattern.clone(),
            source,
        })?;
    }

    Ok(())
}

use std::{collections::BTreeMap, path::PathBuf, time::Duration};

/// Placeholder replaced with the service port in every command element.
pub const PORT_PLACEHOLDER: &str = "{port}";
/// Environment variable carrying the service port.
pub const PORT_ENV: &str = "PORT";

/// Timing knobs for the readiness wait of a single service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadinessPolicy {
    pub initial_delay: Duration,
    pub interval: Duration,
    pub timeout: Duration,
}

impl Default for ReadinessPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(1000),
            interval: Duration::from_millis(2000),
            timeout: Duration::from_millis(60000),
        }
    }
}

/// Static description of one launchable service.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceDescriptor {
    pub name: String,
    pub cmd: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub env: BTreeMap<String, String>,
    pub port: u16,
    pub readiness_url: String,
    pub url: String,
    pub priority: i32,
    pub is_primary: bool,
    pub readiness: ReadinessPolicy,
    pub benign_stderr: Vec<String>,
}

impl ServiceDescriptor {
    /// Creates a descriptor with the conventional local URLs for `port`.
    #[must_use]
    pub fn new(name: impl Into<String>, cmd: Vec<String>, port: u16) -> Self {
        Self {
            name: name.into(),
            cmd,
            cwd: None,
            env: BTreeMap::new(),
            port,
            readiness_url: format!("http://127.0.0.1:{port}/"),
            url: format!("http://localhost:{port}"),
            priority: 0,
            is_primary: false,
            readiness: ReadinessPolicy::default(),
            benign_stderr: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    #[must_use]
    pub fn primary(mut self) -> Self {
        self.is_primary = true;
        self
    }

    #[must_use]
    pub fn with_readiness(mut self, readiness: ReadinessPolicy) -> Self {
        self.readiness = readiness;
        self
    }

    #[must_use]
    pub fn with_readiness_url(mut self, url: impl Into<String>) -> Self {
        self.readiness_url = url.into();
        self
    }

    #[must_use]
    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    /// Command line with the port placeholder substituted.
    #[must_use]
    pub fn command(&self) -> Vec<String> {
        let port = self.port.to_string();
        self.cmd
            .iter()
            .map(|arg| arg.replace(PORT_PLACEHOLDER, &port))
            .collect()
    }

    /// Environment for the child process, `PORT` included.
    ///
    /// An explicit `PORT` entry in the configured environment wins.
    #[must_use]
    pub fn environment(&self) -> Vec<(String, String)> {
        let mut env = Vec::with_capacity(self.env.len() + 1);
        if !self.env.contains_key(PORT_ENV) {
            env.push((PORT_ENV.to_owned(), self.port.to_string()));
        }
        env.extend(self.env.iter().map(|(k, v)| (k.clone(), v.clone())));
        env
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_substitution() {
        let descriptor = ServiceDescriptor::new(
            "api",
            vec!["serve".to_owned(), "--port={port}".to_owned(), "{port}".to_owned()],
            5001,
        );

        assert_eq!(descriptor.command(), vec!["serve", "--port=5001", "5001"]);
    }

    #[test]
    fn test_environment_injects_port() {
        let mut descriptor = ServiceDescriptor::new("api", vec!["serve".to_owned()], 5001);
        descriptor.env.insert("MODE".to_owned(), "dev".to_owned());

        let env = descriptor.environment();
        assert!(env.contains(&("PORT".to_owned(), "5001".to_owned())));
        assert!(env.contains(&("MODE".to_owned(), "dev".to_owned())));
    }

    #[test]
    fn test_explicit_port_env_wins() {
        let mut descriptor = ServiceDescriptor::new("api", vec!["serve".to_owned()], 5001);
        descriptor.env.insert("PORT".to_owned(), "9999".to_owned());

        let env = descriptor.environment();
        assert_eq!(env, vec![("PORT".to_owned(), "9999".to_owned())]);
    }

    #[test]
    fn test_default_urls() {
        let descriptor = ServiceDescriptor::new("api", vec!["serve".to_owned()], 8080);
        assert_eq!(descriptor.readiness_url, "http://127.0.0.1:8080/");
        assert_eq!(descriptor.url, "http://localhost:8080");
        assert_eq!(descriptor.readiness, ReadinessPolicy::default());
    }
}

use std::collections::BTreeMap;

use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct RawProject {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub defaults: RawDefaults,
    #[serde(default)]
    pub shutdown: RawShutdown,
    pub services: BTreeMap<String, RawService>,
}

fn default_version() -> u32 {
    1
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct RawDefaults {
    #[serde(default)]
    pub readiness: RawReadiness,
}

#[derive(Debug, Default, Clone, Copy, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct RawReadiness {
    pub initial_delay_ms: Option<u64>,
    pub interval_ms: Option<u64>,
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct RawShutdown {
    pub grace_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct RawService {
    pub cmd: Vec<String>,
    pub cwd: Option<String>,
    pub env: Option<BTreeMap<String, String>>,
    pub port: u16,
    pub readiness_url: Option<String>,
    pub url: Option<String>,
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub primary: bool,
    #[serde(default)]
    pub readiness: RawReadiness,
    #[serde(default)]
    pub benign_stderr: Vec<String>,
}

//! scalegate.toml configuration parser.
//!
//! Every section and field is optional; command line flags are applied on
//! top of the parsed file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use scalegate_coordinator::CoordinatorConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScalegateConfig {
    pub server: ServerConfig,
    pub coordinator: CoordinatorSection,
    pub orchestrator: OrchestratorConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
    pub data_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            data_dir: PathBuf::from("/var/lib/scalegate"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorSection {
    pub lock_timeout_ms: u64,
    pub apply_timeout_ms: u64,
    pub page_size: usize,
}

impl Default for CoordinatorSection {
    fn default() -> Self {
        let defaults = CoordinatorConfig::default();
        Self {
            lock_timeout_ms: defaults.lock_timeout.as_millis() as u64,
            apply_timeout_ms: defaults.apply_timeout.as_millis() as u64,
            page_size: defaults.page_size,
        }
    }
}

/// Where approved replica counts are pushed. No URL means log only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    pub url: Option<String>,
    pub timeout_ms: Option<u64>,
}

/// Command line values that take precedence over the file.
#[derive(Debug, Default)]
pub struct Overrides {
    pub port: Option<u16>,
    pub data_dir: Option<PathBuf>,
    pub orchestrator_url: Option<String>,
}

impl ScalegateConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: ScalegateConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load the file if given, otherwise defaults, then apply overrides.
    pub fn load(path: Option<&Path>, overrides: Overrides) -> anyhow::Result<Self> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None => Self::default(),
        };
        config.apply(overrides);
        Ok(config)
    }

    pub fn apply(&mut self, overrides: Overrides) {
        if let Some(port) = overrides.port {
            self.server.port = port;
        }
        if let Some(dir) = overrides.data_dir {
            self.server.data_dir = dir;
        }
        if let Some(url) = overrides.orchestrator_url {
            self.orchestrator.url = Some(url);
        }
    }

    pub fn coordinator_config(&self) -> CoordinatorConfig {
        CoordinatorConfig {
            lock_timeout: Duration::from_millis(self.coordinator.lock_timeout_ms),
            apply_timeout: Duration::from_millis(self.coordinator.apply_timeout_ms),
            page_size: self.coordinator.page_size.max(1),
        }
    }
}

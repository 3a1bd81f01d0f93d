//! Runtime Configuration Module
//!
//! Node-level settings for a Tessera runtime. Loaded from an optional TOML
//! file with `TESSERA_`-prefixed environment variable overrides, e.g.
//! `TESSERA_LOGGING__LEVEL=debug` or `TESSERA_NODE__NODE_ID=4`.

use crate::capability::{CapabilityError, ProcessConfig};
use crate::protocol::{memory, message};
use anyhow::{Context, Result};
use config_crate::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};
use types::NodeId;

/// Main runtime configuration structure
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct RuntimeConfig {
    pub node: NodeSettings,
    pub limits: LimitSettings,
    pub mailbox: MailboxSettings,
    pub logging: LoggingSettings,
}

/// Identity of this node
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct NodeSettings {
    pub node_id: NodeId,
    pub name: String,
}

/// Capabilities granted to root processes spawned directly by the host
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct LimitSettings {
    pub max_memory: u64,
    pub max_fuel: u64,
    pub can_compile_modules: bool,
    pub can_create_configs: bool,
    pub can_spawn_processes: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct MailboxSettings {
    /// Buffer capacity used when `create` gets a zero hint
    pub default_message_capacity: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
    pub json: bool,
}

impl Default for NodeSettings {
    fn default() -> Self {
        Self {
            node_id: NodeId::new(1),
            name: "tessera-node".to_string(),
        }
    }
}

impl Default for LimitSettings {
    fn default() -> Self {
        Self {
            max_memory: memory::PLATFORM_MAX_MEMORY,
            max_fuel: 0,
            can_compile_modules: true,
            can_create_configs: true,
            can_spawn_processes: true,
        }
    }
}

impl Default for MailboxSettings {
    fn default() -> Self {
        Self {
            default_message_capacity: message::DEFAULT_CAPACITY,
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from an optional file with environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();

        if let Some(path) = path {
            info!("Loading runtime config: {:?}", path);
            builder = builder.add_source(File::from(path).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix("TESSERA")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder
            .build()
            .context("Failed to build runtime configuration")?;

        let runtime: RuntimeConfig = config
            .try_deserialize()
            .context("Failed to deserialize runtime configuration")?;

        debug!(node_id = %runtime.node.node_id, name = %runtime.node.name, "Runtime configuration loaded");
        Ok(runtime)
    }

    /// Parse configuration from TOML text, without environment overrides
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Config::builder()
            .add_source(File::from_str(content, FileFormat::Toml))
            .build()
            .context("Failed to build runtime configuration")?
            .try_deserialize()
            .context("Failed to deserialize runtime configuration")
    }

    /// Render the effective configuration as TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize runtime configuration")
    }

    /// Capability configuration for processes the host spawns directly
    pub fn root_process_config(&self) -> Result<ProcessConfig, CapabilityError> {
        let mut config = ProcessConfig::new();
        config.set_max_memory(self.limits.max_memory)?;
        config.set_max_fuel(self.limits.max_fuel);
        config.set_can_compile_modules(self.limits.can_compile_modules);
        config.set_can_create_configs(self.limits.can_create_configs);
        config.set_can_spawn_processes(self.limits.can_spawn_processes);
        Ok(config)
    }
}

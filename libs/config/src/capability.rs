//! Capability Configuration
//!
//! A `ProcessConfig` bounds what a spawned process may do and consume. A new
//! configuration denies every capability and sets no ceiling; callers grant
//! what the child needs. The runtime snapshots the value at spawn, so
//! mutating a configuration afterwards never affects processes already
//! running under it.

use crate::protocol::memory::PLATFORM_MAX_MEMORY;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised by capability setters
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CapabilityError {
    #[error("max memory {requested} exceeds platform maximum {max}")]
    MemoryAbovePlatformMax { requested: u64, max: u64 },

    #[error("invalid environment variable name '{key}'")]
    InvalidEnvironmentKey { key: String },
}

/// Capabilities and limits for processes spawned from this configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessConfig {
    max_memory: u64,
    max_fuel: u64,
    can_compile_modules: bool,
    can_create_configs: bool,
    can_spawn_processes: bool,
    environment: Vec<(String, String)>,
    arguments: Vec<String>,
    preopened_dirs: Vec<PathBuf>,
}

impl Default for ProcessConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessConfig {
    /// Every capability denied, no memory or fuel ceiling
    pub fn new() -> Self {
        Self {
            max_memory: PLATFORM_MAX_MEMORY,
            max_fuel: 0,
            can_compile_modules: false,
            can_create_configs: false,
            can_spawn_processes: false,
            environment: Vec::new(),
            arguments: Vec::new(),
            preopened_dirs: Vec::new(),
        }
    }

    /// Every capability granted; used for a node's root processes
    pub fn privileged() -> Self {
        Self {
            can_compile_modules: true,
            can_create_configs: true,
            can_spawn_processes: true,
            ..Self::new()
        }
    }

    pub fn set_max_memory(&mut self, max_memory: u64) -> Result<(), CapabilityError> {
        if max_memory > PLATFORM_MAX_MEMORY {
            return Err(CapabilityError::MemoryAbovePlatformMax {
                requested: max_memory,
                max: PLATFORM_MAX_MEMORY,
            });
        }
        self.max_memory = max_memory;
        Ok(())
    }

    pub fn max_memory(&self) -> u64 {
        self.max_memory
    }

    /// Set the fuel budget; `0` removes the limit
    pub fn set_max_fuel(&mut self, max_fuel: u64) {
        self.max_fuel = max_fuel;
    }

    pub fn max_fuel(&self) -> u64 {
        self.max_fuel
    }

    /// Fuel budget, `None` when unlimited
    pub fn fuel_limit(&self) -> Option<u64> {
        (self.max_fuel != 0).then_some(self.max_fuel)
    }

    pub fn set_can_compile_modules(&mut self, can: bool) {
        self.can_compile_modules = can;
    }

    pub fn can_compile_modules(&self) -> bool {
        self.can_compile_modules
    }

    pub fn set_can_create_configs(&mut self, can: bool) {
        self.can_create_configs = can;
    }

    pub fn can_create_configs(&self) -> bool {
        self.can_create_configs
    }

    pub fn set_can_spawn_processes(&mut self, can: bool) {
        self.can_spawn_processes = can;
    }

    pub fn can_spawn_processes(&self) -> bool {
        self.can_spawn_processes
    }

    pub fn add_environment_variable(
        &mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<(), CapabilityError> {
        let key = key.into();
        if key.is_empty() || key.contains('=') || key.contains('\0') {
            return Err(CapabilityError::InvalidEnvironmentKey { key });
        }
        self.environment.push((key, value.into()));
        Ok(())
    }

    pub fn add_command_line_argument(&mut self, argument: impl Into<String>) {
        self.arguments.push(argument.into());
    }

    pub fn preopen_dir(&mut self, dir: impl AsRef<Path>) {
        self.preopened_dirs.push(dir.as_ref().to_path_buf());
    }

    pub fn environment(&self) -> &[(String, String)] {
        &self.environment
    }

    /// Last value set for `key`
    pub fn environment_variable(&self, key: &str) -> Option<&str> {
        self.environment
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn arguments(&self) -> &[String] {
        &self.arguments
    }

    pub fn preopened_dirs(&self) -> &[PathBuf] {
        &self.preopened_dirs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_config_denies_everything() {
        let config = ProcessConfig::new();
        assert!(!config.can_compile_modules());
        assert!(!config.can_create_configs());
        assert!(!config.can_spawn_processes());
        assert_eq!(config.max_fuel(), 0);
        assert_eq!(config.fuel_limit(), None);
        assert_eq!(config.max_memory(), PLATFORM_MAX_MEMORY);
    }

    #[test]
    fn test_zero_fuel_means_unlimited() {
        let mut config = ProcessConfig::new();
        config.set_max_fuel(500);
        assert_eq!(config.fuel_limit(), Some(500));
        config.set_max_fuel(0);
        assert_eq!(config.max_fuel(), 0);
        assert_eq!(config.fuel_limit(), None);
    }

    #[test]
    fn test_memory_above_platform_max_rejected() {
        let mut config = ProcessConfig::new();
        config.set_max_memory(1 << 20).unwrap();
        assert_eq!(config.max_memory(), 1 << 20);

        let err = config.set_max_memory(PLATFORM_MAX_MEMORY + 1).unwrap_err();
        assert!(matches!(err, CapabilityError::MemoryAbovePlatformMax { .. }));
        assert_eq!(config.max_memory(), 1 << 20);
    }

    #[test]
    fn test_environment_and_arguments() {
        let mut config = ProcessConfig::new();
        config.add_environment_variable("MODE", "a").unwrap();
        config.add_environment_variable("MODE", "b").unwrap();
        assert_eq!(config.environment_variable("MODE"), Some("b"));
        assert!(config.add_environment_variable("A=B", "x").is_err());
        assert!(config.add_environment_variable("", "x").is_err());

        config.add_command_line_argument("--verbose");
        config.preopen_dir("/tmp");
        assert_eq!(config.arguments(), ["--verbose".to_string()]);
        assert_eq!(config.preopened_dirs(), [PathBuf::from("/tmp")]);
    }

    #[test]
    fn test_snapshot_is_independent() {
        let mut config = ProcessConfig::privileged();
        let snapshot = config.clone();
        config.set_can_spawn_processes(false);
        assert!(snapshot.can_spawn_processes());
    }
}

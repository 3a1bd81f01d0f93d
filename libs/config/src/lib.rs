//! # Tessera Configuration
//!
//! Configuration for the Tessera runtime:
//!
//! - **Capability configuration**: [`ProcessConfig`], the per-spawn bound on
//!   what a process may do (compile modules, create configurations, spawn)
//!   and consume (memory, fuel)
//! - **Runtime configuration**: [`RuntimeConfig`], node identity, root
//!   process limits, mailbox defaults and logging, loaded from TOML with
//!   environment overrides
//! - **Protocol constants**: guest memory geometry and message defaults
//!
//! ## Usage
//!
//! ```rust
//! use runtime_config::{ProcessConfig, RuntimeConfig};
//!
//! let runtime = RuntimeConfig::default();
//! let root = runtime.root_process_config().unwrap();
//! assert!(root.can_spawn_processes());
//!
//! let mut sandbox = ProcessConfig::new();
//! sandbox.set_max_fuel(10_000);
//! assert!(!sandbox.can_spawn_processes());
//! ```

pub mod capability;
pub mod protocol;
pub mod runtime_config;

pub use capability::{CapabilityError, ProcessConfig};
pub use runtime_config::{
    LimitSettings, LoggingSettings, MailboxSettings, NodeSettings, RuntimeConfig,
};

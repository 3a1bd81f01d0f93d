//! Process Runtime
//!
//! Lightweight isolated processes that share nothing and talk only through
//! messages. Each process owns a mailbox, a resource table, a scratch area
//! for building and reading one message at a time, and a bounded guest
//! memory the host call boundary reads and writes.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────── Environment (node) ──────────────────────────┐
//! │                                                                        │
//! │  ┌─────────────┐   send    ┌─────────────┐   ┌──────────────────────┐  │
//! │  │ Process A   │──────────▶│ Mailbox B   │   │ ModuleCatalog        │  │
//! │  │  scratch    │           │  FIFO + tag │   │ ProcessRegistry      │  │
//! │  │  resources  │◀─ link ──▶│  selective  │   │ TimerService         │  │
//! │  └─────────────┘           └─────────────┘   │ RuntimeMetrics       │  │
//! │                                              └──────────────────────┘  │
//! └───────────────────────────────┬────────────────────────────────────────┘
//!                                 │ Cluster: route by NodeId
//!                          other Environments
//! ```
//!
//! # Examples
//!
//! ```rust,no_run
//! use actor_runtime::{Environment, Module, Tag};
//! use runtime_config::RuntimeConfig;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let env = Environment::new(RuntimeConfig::default());
//! let module = Module::builder("greeter")
//!     .entry("main", |mut ctx, _args| async move {
//!         ctx.receive(&[], None).await?;
//!         Ok(())
//!     })
//!     .build();
//! env.register_module(module);
//!
//! let handle = env.spawn("greeter", "main", &[])?;
//! env.send(handle.id(), Tag::new(1), b"hello")?;
//! handle.join().await;
//! # Ok(())
//! # }
//! ```

pub mod distributed;
pub mod environment;
pub mod error;
pub mod host;
pub mod mailbox;
pub mod memory;
pub mod message;
pub mod metrics;
pub mod module;
pub mod process;
pub mod registry;
pub mod resources;
pub mod signal;
pub mod telemetry;
pub mod timer;

pub use distributed::Cluster;
pub use environment::Environment;
pub use error::{CallResult, Capability, Result, RuntimeError, Trap};
pub use mailbox::Mailbox;
pub use memory::{FuelMeter, GuestMemory};
pub use message::{DataMessage, Message, MessageKind};
pub use crate::metrics::{GuestMetrics, HistogramSummary, MetricsSnapshot, RuntimeMetrics};
pub use module::{EntryFn, Module, ModuleBuilder, ModuleCatalog, ModuleDirectory};
pub use process::{ProcessContext, ProcessHandle};
pub use registry::{ProcessLocation, ProcessRegistry};
pub use resources::{Resource, ResourceError, ResourceKind, ResourceTable};
pub use signal::ExitReason;
pub use timer::TimerService;

pub use types::{NodeId, Param, ProcessId, ResourceId, Tag, TimerId, Value};

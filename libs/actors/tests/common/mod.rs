//! Shared helpers for runtime integration tests
#![allow(dead_code)]

use actor_runtime::{Environment, Module};
use runtime_config::RuntimeConfig;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use types::NodeId;

/// How long a test waits for a process to report before failing
pub const REPORT_TIMEOUT: Duration = Duration::from_secs(5);

pub fn environment() -> Environment {
    Environment::new(RuntimeConfig::default())
}

pub fn node(id: u64) -> Environment {
    let mut settings = RuntimeConfig::default();
    settings.node.node_id = NodeId::new(id);
    settings.node.name = format!("node-{id}");
    Environment::new(settings)
}

pub fn with_module(module: Arc<Module>) -> Environment {
    let environment = environment();
    environment.register_module(module);
    environment
}

/// Channel processes use to report observations back to the test
pub fn reports<T>() -> (mpsc::UnboundedSender<T>, mpsc::UnboundedReceiver<T>) {
    mpsc::unbounded_channel()
}

pub async fn next_report<T>(rx: &mut mpsc::UnboundedReceiver<T>) -> T {
    tokio::time::timeout(REPORT_TIMEOUT, rx.recv())
        .await
        .expect("process did not report in time")
        .expect("report channel closed")
}

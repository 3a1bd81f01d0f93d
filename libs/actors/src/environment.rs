//! Node Environment
//!
//! One environment per node: the process table, module catalog, name
//! registry, timers and metrics every process on the node shares. Process
//! ids are allocated here and are unique per node.
//!
//! # Lock Ordering
//!
//! The process table lock is never held while taking a process's link set
//! lock, and vice versa. Lookups clone the `Arc<ProcessShared>` out first.

use crate::distributed::{Cluster, ClusterShared};
use crate::error::Result;
use crate::error::RuntimeError;
use crate::message::{DataMessage, Message};
use crate::metrics::{GuestMetrics, MetricsSnapshot, RuntimeMetrics};
use crate::module::{Module, ModuleCatalog, ModuleDirectory};
use crate::process::{ProcessContext, ProcessHandle, ProcessShared, ProcessTask};
use crate::registry::ProcessRegistry;
use crate::signal::{ExitReason, Signal};
use crate::timer::TimerService;
use parking_lot::RwLock;
use runtime_config::{ProcessConfig, RuntimeConfig};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::{debug, info, warn};
use types::{NodeId, Param, ProcessId, Tag, TimerId, Value};
use uuid::Uuid;

/// Everything needed to start a process
pub(crate) struct SpawnRequest {
    pub(crate) config: ProcessConfig,
    pub(crate) module: Arc<Module>,
    pub(crate) entry: String,
    pub(crate) args: Vec<Value>,
    /// Parent and tag to link with before the child runs
    pub(crate) link: Option<(Arc<ProcessShared>, Tag)>,
}

/// Shared state of one node
#[derive(Clone)]
pub struct Environment {
    inner: Arc<EnvironmentInner>,
}

struct EnvironmentInner {
    environment_id: String,
    settings: RuntimeConfig,
    processes: RwLock<HashMap<ProcessId, Arc<ProcessShared>>>,
    next_process_id: AtomicU64,
    modules: ModuleCatalog,
    registry: ProcessRegistry,
    timers: TimerService,
    metrics: Arc<RuntimeMetrics>,
    guest_metrics: GuestMetrics,
    /// Module ids used while the node is outside any cluster
    module_ids: ModuleDirectory,
    cluster: RwLock<Weak<ClusterShared>>,
}

impl Default for Environment {
    fn default() -> Self {
        Self::new(RuntimeConfig::default())
    }
}

impl Environment {
    pub fn new(settings: RuntimeConfig) -> Self {
        let environment_id = format!("env-{}", Uuid::new_v4().simple());
        let metrics = Arc::new(RuntimeMetrics::default());
        info!(
            environment_id = %environment_id,
            node_id = %settings.node.node_id,
            name = %settings.node.name,
            "Creating node environment"
        );

        Self {
            inner: Arc::new(EnvironmentInner {
                environment_id,
                registry: ProcessRegistry::new(settings.node.node_id),
                timers: TimerService::new(Arc::clone(&metrics)),
                guest_metrics: GuestMetrics::new(settings.node.node_id),
                module_ids: ModuleDirectory::new(),
                settings,
                processes: RwLock::new(HashMap::new()),
                next_process_id: AtomicU64::new(1),
                modules: ModuleCatalog::new(),
                metrics,
                cluster: RwLock::new(Weak::new()),
            }),
        }
    }

    pub fn node_id(&self) -> NodeId {
        self.inner.settings.node.node_id
    }

    pub fn name(&self) -> &str {
        &self.inner.settings.node.name
    }

    pub fn environment_id(&self) -> &str {
        &self.inner.environment_id
    }

    pub fn settings(&self) -> &RuntimeConfig {
        &self.inner.settings
    }

    pub fn modules(&self) -> &ModuleCatalog {
        &self.inner.modules
    }

    pub fn register_module(&self, module: Arc<Module>) {
        self.inner.modules.register(module);
    }

    pub fn registry(&self) -> &ProcessRegistry {
        &self.inner.registry
    }

    pub fn metrics(&self) -> &RuntimeMetrics {
        &self.inner.metrics
    }

    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.inner.metrics.snapshot()
    }

    /// Metrics recorded by this node's processes
    pub fn guest_metrics(&self) -> &GuestMetrics {
        &self.inner.guest_metrics
    }

    /// Module id for `name`, from the cluster's directory when joined
    pub fn module_id(&self, name: &str) -> u64 {
        match self.cluster() {
            Some(cluster) => cluster.modules().id(name),
            None => self.inner.module_ids.id(name),
        }
    }

    pub fn module_name(&self, id: u64) -> Option<String> {
        match self.cluster() {
            Some(cluster) => cluster.modules().name(id),
            None => self.inner.module_ids.name(id),
        }
    }

    /// Cluster this node has joined, if any
    pub fn cluster(&self) -> Option<Cluster> {
        self.inner.cluster.read().upgrade().map(Cluster::from_shared)
    }

    pub(crate) fn attach_cluster(&self, cluster: Weak<ClusterShared>) {
        *self.inner.cluster.write() = cluster;
    }

    /// Spawn a root process with the node's configured root capabilities
    pub fn spawn(&self, module: &str, entry: &str, params: &[Param]) -> Result<ProcessHandle> {
        let config = self.inner.settings.root_process_config()?;
        let module = self.inner.modules.get(module)?;
        self.spawn_with_config(config, module, entry, params)
    }

    pub fn spawn_with_config(
        &self,
        config: ProcessConfig,
        module: Arc<Module>,
        entry: &str,
        params: &[Param],
    ) -> Result<ProcessHandle> {
        self.spawn_process(SpawnRequest {
            config,
            module,
            entry: entry.to_string(),
            args: params.iter().map(|param| param.to_value()).collect(),
            link: None,
        })
    }

    pub(crate) fn spawn_process(&self, request: SpawnRequest) -> Result<ProcessHandle> {
        let SpawnRequest {
            config,
            module,
            entry,
            args,
            link,
        } = request;

        let entry_fn = module.entry(&entry)?;
        let id = ProcessId::new(self.inner.next_process_id.fetch_add(1, Ordering::Relaxed));
        let (shared, signals) = ProcessShared::new(id, self.node_id());

        // The child is linked before it can run, so even an immediate death
        // reaches the parent.
        if let Some((parent, tag)) = &link {
            shared.add_link(parent.id, *tag);
            if !parent.add_link(id, *tag) {
                shared.remove_link(parent.id);
            }
        }

        self.inner.processes.write().insert(id, Arc::clone(&shared));
        self.inner.metrics.record_spawn();

        let context = ProcessContext::new(Arc::clone(&shared), self.clone(), config, Arc::clone(&module));
        let task = ProcessTask {
            shared: Arc::clone(&shared),
            environment: self.clone(),
            signals,
            entry: entry_fn(context, args),
            entry_name: entry.clone(),
        };
        tokio::spawn(task.run());

        info!(
            process_id = %id,
            node_id = %self.node_id(),
            module = %module.name(),
            entry = %entry,
            linked_to = ?link.as_ref().map(|(parent, _)| parent.id),
            "Process spawned"
        );
        Ok(ProcessHandle::new(shared, self.clone()))
    }

    pub(crate) fn lookup(&self, id: ProcessId) -> Option<Arc<ProcessShared>> {
        self.inner.processes.read().get(&id).cloned()
    }

    pub fn process(&self, id: ProcessId) -> Option<ProcessHandle> {
        self.lookup(id)
            .map(|shared| ProcessHandle::new(shared, self.clone()))
    }

    pub fn exists(&self, id: ProcessId) -> bool {
        self.inner.processes.read().contains_key(&id)
    }

    pub fn processes(&self) -> Vec<ProcessId> {
        let mut ids: Vec<ProcessId> = self.inner.processes.read().keys().copied().collect();
        ids.sort();
        ids
    }

    /// Queue a message on `target`.
    ///
    /// Fails only when `target` is not in the process table right now;
    /// acceptance says nothing about whether it will ever be received.
    pub(crate) fn deliver(&self, target: ProcessId, message: Message) -> Result<()> {
        match self.lookup(target) {
            Some(shared) => {
                shared.mailbox.push(message);
                self.inner.metrics.record_send(true);
                Ok(())
            }
            None => {
                self.inner.metrics.record_send(false);
                Err(RuntimeError::ProcessNotFound { process: target })
            }
        }
    }

    /// Host-originated data message without resources
    pub fn send(&self, target: ProcessId, tag: Tag, payload: &[u8]) -> Result<()> {
        self.deliver(target, Message::Data(DataMessage::from_bytes(tag, payload)))
    }

    pub(crate) fn send_after(&self, target: ProcessId, message: Message, delay: Duration) -> TimerId {
        let environment = self.clone();
        self.inner.timers.schedule(delay, move || {
            if environment.deliver(target, message).is_err() {
                debug!(process_id = %target, "Timer target gone, message dropped");
            }
        })
    }

    pub(crate) fn cancel_timer(&self, timer: TimerId) -> bool {
        self.inner.timers.cancel(timer)
    }

    /// Fire-and-forget termination request
    pub fn kill(&self, id: ProcessId) -> bool {
        match self.lookup(id) {
            Some(shared) => {
                debug!(process_id = %id, "Kill requested");
                shared.signal(Signal::Kill)
            }
            None => false,
        }
    }

    /// Tell `target` that `peer` died on a link tagged `tag`
    pub(crate) fn notify_link_died(&self, target: &ProcessShared, peer: ProcessId, tag: Tag) {
        target.signal(Signal::LinkDied { process: peer, tag });
    }

    /// Tear down a terminated process and notify its links and monitors
    pub(crate) async fn retire(&self, shared: &Arc<ProcessShared>, reason: ExitReason) {
        let id = shared.id;
        self.inner.processes.write().remove(&id);

        let dropped = shared.mailbox.clear();
        if dropped > 0 {
            debug!(process_id = %id, dropped, "Discarded undelivered messages");
        }

        let (peers, monitors) = shared.close_links();
        let abnormal = reason.is_abnormal();
        for (peer, tag) in peers {
            let Some(peer_shared) = self.lookup(peer) else {
                continue;
            };
            peer_shared.remove_link(id);
            if abnormal {
                debug!(process_id = %id, peer = %peer, tag = %tag, "Propagating death over link");
                self.notify_link_died(&peer_shared, id, tag);
            }
        }
        for watcher in monitors {
            if let Some(watcher_shared) = self.lookup(watcher) {
                watcher_shared.mailbox.push(Message::ProcessDied {
                    tag: Tag::NONE,
                    process: id,
                });
            }
        }

        let names = self.inner.registry.remove_process(id).await;
        if names > 0 {
            debug!(process_id = %id, names, "Removed registry entries");
        }

        self.inner.metrics.record_exit(abnormal);
        shared.finish(reason);
    }

    /// Kill every process and wait for all of them to exit
    pub async fn shutdown(&self) {
        let handles: Vec<ProcessHandle> = self
            .processes()
            .into_iter()
            .filter_map(|id| self.process(id))
            .collect();
        info!(
            environment_id = %self.inner.environment_id,
            processes = handles.len(),
            "Shutting down node environment"
        );

        for handle in &handles {
            handle.kill();
        }
        for (handle, reason) in handles
            .iter()
            .zip(futures::future::join_all(handles.iter().map(|h| h.join())).await)
        {
            if !matches!(reason, ExitReason::Killed | ExitReason::Normal) {
                warn!(process_id = %handle.id(), reason = %reason, "Process exited during shutdown");
            }
        }
    }
}

impl std::fmt::Debug for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Environment")
            .field("environment_id", &self.inner.environment_id)
            .field("node_id", &self.node_id())
            .field("processes", &self.inner.processes.read().len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Trap;

    fn environment() -> Environment {
        let environment = Environment::default();
        environment.register_module(
            Module::builder("basic")
                .entry("idle", |mut ctx, _args| async move {
                    ctx.receive(&[], None).await?;
                    Ok(())
                })
                .entry("crash", |_ctx, _args| async { Err(Trap::abort("crash")) })
                .build(),
        );
        environment
    }

    #[tokio::test]
    async fn test_spawn_and_kill() {
        let environment = environment();
        let handle = environment.spawn("basic", "idle", &[]).unwrap();
        assert!(environment.exists(handle.id()));
        assert_eq!(environment.processes(), vec![handle.id()]);

        assert!(environment.kill(handle.id()));
        assert_eq!(handle.join().await, ExitReason::Killed);
        assert!(!environment.exists(handle.id()));
        assert!(!environment.kill(handle.id()));
    }

    #[tokio::test]
    async fn test_unknown_module_and_entry() {
        let environment = environment();
        assert!(matches!(
            environment.spawn("missing", "idle", &[]),
            Err(RuntimeError::ModuleNotFound { .. })
        ));
        assert!(matches!(
            environment.spawn("basic", "missing", &[]),
            Err(RuntimeError::EntryPointNotFound { .. })
        ));
        assert_eq!(environment.metrics_snapshot().processes_spawned, 0);
    }

    #[tokio::test]
    async fn test_send_to_missing_process() {
        let environment = environment();
        let err = environment
            .send(ProcessId::new(99), Tag::new(1), b"x")
            .unwrap_err();
        assert_eq!(err, RuntimeError::ProcessNotFound { process: ProcessId::new(99) });
        assert_eq!(environment.metrics_snapshot().messages_dropped, 1);
    }

    #[tokio::test]
    async fn test_trap_is_recorded() {
        let environment = environment();
        let handle = environment.spawn("basic", "crash", &[]).unwrap();
        assert_eq!(handle.join().await, ExitReason::Trap(Trap::abort("crash")));
        let snapshot = environment.metrics_snapshot();
        assert_eq!(snapshot.abnormal_exits, 1);
        assert_eq!(snapshot.processes_alive, 0);
    }

    #[tokio::test]
    async fn test_shutdown_stops_everything() {
        let environment = environment();
        let a = environment.spawn("basic", "idle", &[]).unwrap();
        let b = environment.spawn("basic", "idle", &[]).unwrap();
        environment.shutdown().await;
        assert!(!a.is_alive());
        assert!(!b.is_alive());
        assert!(environment.processes().is_empty());
    }
}

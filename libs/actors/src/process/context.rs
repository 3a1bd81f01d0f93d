//! The process-side API
//!
//! A [`ProcessContext`] is handed to an entry point by value and owns all
//! process-local state. Operations that only a broken caller can get wrong
//! (no active message, reused handle, out-of-bounds memory) return
//! [`Trap`]; operations that can legitimately fail return [`RuntimeError`];
//! operations that can do both return [`CallResult`].

use super::ProcessShared;
use crate::distributed::Cluster;
use crate::environment::{Environment, SpawnRequest};
use crate::error::{CallResult, Capability, Result, RuntimeError, Trap};
use crate::memory::{FuelMeter, GuestMemory};
use crate::metrics::GuestMetrics;
use crate::message::{Message, MessageKind, Scratch};
use crate::module::Module;
use crate::resources::{AddressIterator, Resource, ResourceKind, ResourceTable};
use runtime_config::ProcessConfig;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use types::{NodeId, Param, ProcessId, ResourceId, Tag, TimerId, Value};

pub struct ProcessContext {
    shared: Arc<ProcessShared>,
    environment: Environment,
    config: ProcessConfig,
    module: Arc<Module>,
    scratch: Scratch,
    resources: ResourceTable,
    memory: GuestMemory,
    fuel: FuelMeter,
}

impl ProcessContext {
    pub(crate) fn new(
        shared: Arc<ProcessShared>,
        environment: Environment,
        config: ProcessConfig,
        module: Arc<Module>,
    ) -> Self {
        let scratch = Scratch::new(environment.settings().mailbox.default_message_capacity);
        let memory = GuestMemory::new(config.max_memory());
        let fuel = FuelMeter::new(config.fuel_limit());
        Self {
            shared,
            environment,
            config,
            module,
            scratch,
            resources: ResourceTable::new(),
            memory,
            fuel,
        }
    }

    // ---- identity and limits ----

    pub fn process_id(&self) -> ProcessId {
        self.shared.id
    }

    pub fn node_id(&self) -> NodeId {
        self.shared.node_id
    }

    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    /// Capability snapshot this process was spawned with
    pub fn config(&self) -> &ProcessConfig {
        &self.config
    }

    pub fn module(&self) -> &Arc<Module> {
        &self.module
    }

    /// Id of the module this process runs, valid on every node of its cluster
    pub fn module_id(&self) -> u64 {
        self.environment.module_id(self.module.name())
    }

    pub fn guest_metrics(&self) -> &GuestMetrics {
        self.environment.guest_metrics()
    }

    pub fn resources(&self) -> &ResourceTable {
        &self.resources
    }

    pub fn resources_mut(&mut self) -> &mut ResourceTable {
        &mut self.resources
    }

    pub fn memory(&self) -> &GuestMemory {
        &self.memory
    }

    pub fn memory_mut(&mut self) -> &mut GuestMemory {
        &mut self.memory
    }

    /// Scratch area and guest memory borrowed together, for copying between them
    pub(crate) fn scratch_and_memory(&mut self) -> (&mut Scratch, &mut GuestMemory) {
        (&mut self.scratch, &mut self.memory)
    }

    pub fn fuel(&self) -> &FuelMeter {
        &self.fuel
    }

    /// Charge execution fuel; traps once the budget is spent
    pub fn consume_fuel(&mut self, units: u64) -> std::result::Result<(), Trap> {
        self.fuel.consume(units)
    }

    pub async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    // ---- scratch message ----

    /// Start a new message, discarding the current one and its resources
    pub fn create_message(&mut self, tag: Tag, capacity_hint: usize) {
        self.scratch.create(tag, capacity_hint);
    }

    pub fn write(&mut self, bytes: &[u8]) -> std::result::Result<usize, Trap> {
        self.scratch.write(bytes)
    }

    pub fn read(&mut self, out: &mut [u8]) -> std::result::Result<usize, Trap> {
        self.scratch.read(out)
    }

    pub fn seek(&mut self, index: u64) -> std::result::Result<(), Trap> {
        self.scratch.seek(index)
    }

    pub fn tag(&self) -> std::result::Result<Tag, Trap> {
        self.scratch.tag()
    }

    pub fn size(&self) -> std::result::Result<u64, Trap> {
        self.scratch.size()
    }

    /// Process named by the `LinkDied`/`ProcessDied` notice in the scratch area
    pub fn signal_source(&self) -> std::result::Result<ProcessId, Trap> {
        self.scratch.signal_source()
    }

    /// Move a resource into the current message, returning its slot index.
    ///
    /// The handle is dead from this point on, whether or not the message is
    /// ever sent.
    pub fn embed(&mut self, handle: ResourceId) -> std::result::Result<u64, Trap> {
        let message = self.scratch.data_mut()?;
        let resource = self.resources.take(handle)?;
        Ok(message.embed(resource))
    }

    /// Move the resource in slot `index` into this process's table
    pub fn extract(&mut self, index: u64) -> std::result::Result<ResourceId, Trap> {
        let resource = self.scratch.data_mut()?.extract(index)?;
        Ok(self.resources.insert(resource))
    }

    pub fn extract_as(
        &mut self,
        index: u64,
        kind: ResourceKind,
    ) -> std::result::Result<ResourceId, Trap> {
        let resource = self.scratch.data_mut()?.extract_as(index, kind)?;
        Ok(self.resources.insert(resource))
    }

    /// Queue the current message on `target`, leaving the scratch area idle.
    ///
    /// The message is consumed even when the target does not exist.
    pub fn send(&mut self, target: ProcessId) -> CallResult<()> {
        let message = self.scratch.take_for_send()?;
        Ok(self.environment.deliver(target, Message::Data(message)))
    }

    /// Wait for a message whose tag is in `filter` (empty matches all).
    ///
    /// `None` waits forever. On success the message occupies the scratch
    /// area, replacing whatever was there.
    pub async fn receive(&mut self, filter: &[Tag], timeout: Option<Duration>) -> Result<MessageKind> {
        let message = self.shared.mailbox.receive(filter, timeout).await?;
        Ok(self.accept(message))
    }

    /// Send the current message, then wait for a reply tagged `tag` that
    /// arrives after the send. Messages already queued are not considered.
    pub async fn send_receive_skip_search(
        &mut self,
        target: ProcessId,
        tag: Tag,
        timeout: Option<Duration>,
    ) -> CallResult<MessageKind> {
        let message = self.scratch.take_for_send()?;
        let watermark = self.shared.mailbox.watermark();
        if let Err(err) = self.environment.deliver(target, Message::Data(message)) {
            return Ok(Err(err));
        }
        Ok(self.await_reply(watermark, tag, timeout).await)
    }

    async fn await_reply(&mut self, watermark: u64, tag: Tag, timeout: Option<Duration>) -> Result<MessageKind> {
        let message = self
            .shared
            .mailbox
            .receive_since(watermark, &[tag], timeout)
            .await?;
        Ok(self.accept(message))
    }

    fn accept(&mut self, message: Message) -> MessageKind {
        let kind = message.kind();
        self.environment.metrics().record_receive();
        self.scratch.set_received(message);
        kind
    }

    /// Deliver the current message to `target` after `delay`
    pub fn send_after(&mut self, target: ProcessId, delay: Duration) -> std::result::Result<TimerId, Trap> {
        let message = self.scratch.take_for_send()?;
        Ok(self.environment.send_after(target, Message::Data(message), delay))
    }

    pub fn cancel_timer(&self, timer: TimerId) -> bool {
        self.environment.cancel_timer(timer)
    }

    // ---- process control ----

    /// Spawn a process.
    ///
    /// `link` links the child to this process before it runs. `None` for
    /// `config` or `module` inherits this process's own.
    pub fn spawn(
        &mut self,
        link: Option<Tag>,
        config: Option<ResourceId>,
        module: Option<ResourceId>,
        entry: &str,
        params: &[Param],
    ) -> CallResult<ProcessId> {
        let args = params.iter().map(|param| param.to_value()).collect();
        self.spawn_values(link, config, module, entry, args)
    }

    pub(crate) fn spawn_values(
        &mut self,
        link: Option<Tag>,
        config: Option<ResourceId>,
        module: Option<ResourceId>,
        entry: &str,
        args: Vec<Value>,
    ) -> CallResult<ProcessId> {
        if !self.config.can_spawn_processes() {
            return Ok(Err(RuntimeError::permission_denied(Capability::SpawnProcesses)));
        }
        let config = self.child_config(config)?;
        let module = match module {
            Some(handle) => self.resources.module(handle)?,
            None => Arc::clone(&self.module),
        };
        let request = SpawnRequest {
            config,
            module,
            entry: entry.to_string(),
            args,
            link: link.map(|tag| (Arc::clone(&self.shared), tag)),
        };
        Ok(self.environment.spawn_process(request).map(|handle| handle.id()))
    }

    fn child_config(&self, handle: Option<ResourceId>) -> std::result::Result<ProcessConfig, Trap> {
        match handle {
            Some(handle) => Ok(self.resources.config(handle)?.clone()),
            None => Ok(self.config.clone()),
        }
    }

    /// Link with `peer`. Linking to a process that is already gone behaves
    /// as if it died right after the link was made.
    ///
    /// The local side goes in first, so a peer retiring in between finds
    /// nothing of ours to clean up and the entry is withdrawn here instead.
    pub fn link(&self, tag: Tag, peer: ProcessId) {
        let me = self.process_id();
        self.shared.add_link(peer, tag);
        let linked = self
            .environment
            .lookup(peer)
            .map(|shared| shared.add_link(me, tag))
            .unwrap_or(false);

        if linked {
            debug!(process_id = %me, peer = %peer, tag = %tag, "Linked");
        } else {
            self.shared.remove_link(peer);
            debug!(process_id = %me, peer = %peer, "Link target already gone");
            self.environment
                .notify_link_died(&self.shared, peer, tag);
        }
    }

    pub fn unlink(&self, peer: ProcessId) {
        let me = self.process_id();
        self.shared.remove_link(peer);
        if let Some(shared) = self.environment.lookup(peer) {
            shared.remove_link(me);
        }
        debug!(process_id = %me, peer = %peer, "Unlinked");
    }

    /// Whether a linked peer's abnormal death kills this process (default
    /// `true`) or arrives as a `LinkDied` message
    pub fn die_when_link_dies(&self, die: bool) {
        self.shared.set_die_when_link_dies(die);
    }

    /// Ask `peer` to terminate; unconfirmed
    pub fn kill(&self, peer: ProcessId) -> bool {
        self.environment.kill(peer)
    }

    /// Point-in-time existence check
    pub fn exists(&self, peer: ProcessId) -> bool {
        self.environment.exists(peer)
    }

    /// Get a `ProcessDied` message whenever `peer` terminates, for any reason
    pub fn monitor(&self, peer: ProcessId) {
        let me = self.process_id();
        let watching = self
            .environment
            .lookup(peer)
            .map(|shared| shared.add_monitor(me))
            .unwrap_or(false);
        if !watching {
            self.shared.mailbox.push(Message::ProcessDied {
                tag: Tag::NONE,
                process: peer,
            });
        }
    }

    pub fn stop_monitoring(&self, peer: ProcessId) {
        if let Some(shared) = self.environment.lookup(peer) {
            shared.remove_monitor(self.process_id());
        }
    }

    // ---- modules ----

    /// Compile a module from bytes known to the node's catalog
    pub fn compile_module(&mut self, bytes: &[u8]) -> Result<ResourceId> {
        if !self.config.can_compile_modules() {
            return Err(RuntimeError::permission_denied(Capability::CompileModules));
        }
        let module = self.environment.modules().compile(bytes)?;
        Ok(self.resources.insert(Resource::Module(module)))
    }

    pub fn drop_module(&mut self, handle: ResourceId) -> std::result::Result<(), Trap> {
        self.resources.module(handle)?;
        self.resources.remove(handle)?;
        Ok(())
    }

    // ---- capability configurations ----

    /// New configuration with every capability denied
    pub fn create_config(&mut self) -> Result<ResourceId> {
        if !self.config.can_create_configs() {
            return Err(RuntimeError::permission_denied(Capability::CreateConfigs));
        }
        Ok(self.resources.insert(Resource::Config(ProcessConfig::new())))
    }

    pub fn drop_config(&mut self, handle: ResourceId) -> Result<()> {
        self.resources.config(handle)?;
        self.resources.remove(handle)?;
        Ok(())
    }

    pub fn configuration(&self, handle: ResourceId) -> Result<&ProcessConfig> {
        Ok(self.resources.config(handle)?)
    }

    pub fn configuration_mut(&mut self, handle: ResourceId) -> Result<&mut ProcessConfig> {
        Ok(self.resources.config_mut(handle)?)
    }

    // ---- registry ----

    pub async fn register(&self, name: &str) {
        self.environment
            .registry()
            .put(name, self.node_id(), self.process_id())
            .await;
    }

    pub async fn registry_put(&self, name: &str, node: NodeId, process: ProcessId) {
        self.environment.registry().put(name, node, process).await;
    }

    pub async fn registry_get(&self, name: &str) -> Option<(NodeId, ProcessId)> {
        self.environment.registry().resolve(name).await
    }

    pub async fn registry_remove(&self, name: &str) -> bool {
        self.environment.registry().remove(name).await
    }

    // ---- name resolution ----

    /// Resolve `host:port` into a one-shot address iterator resource
    pub async fn resolve(&mut self, name: &str, timeout: Option<Duration>) -> Result<ResourceId> {
        let lookup = tokio::net::lookup_host(name.to_string());
        let addresses: Vec<SocketAddr> = match timeout {
            Some(limit) => tokio::time::timeout(limit, lookup)
                .await
                .map_err(|_| RuntimeError::timeout("resolve", limit.as_millis() as u64))?,
            None => lookup.await,
        }
        .map_err(|err| RuntimeError::Resolve {
            host: name.to_string(),
            message: err.to_string(),
        })?
        .collect();

        debug!(process_id = %self.process_id(), host = %name, count = addresses.len(), "Resolved host");
        Ok(self
            .resources
            .insert(Resource::AddressIterator(AddressIterator::new(addresses))))
    }

    pub fn resolve_next(&mut self, handle: ResourceId) -> Result<Option<SocketAddr>> {
        Ok(self.resources.address_iterator_mut(handle)?.next())
    }

    /// Release any resource this process holds
    pub fn drop_resource(&mut self, handle: ResourceId) -> Result<()> {
        self.resources.remove(handle)?;
        Ok(())
    }

    // ---- other nodes ----

    fn cluster(&self) -> Result<Cluster> {
        self.environment.cluster().ok_or(RuntimeError::NodeNotFound {
            node: self.node_id(),
        })
    }

    fn route(&self, node: NodeId) -> Result<Environment> {
        if node == self.node_id() {
            return Ok(self.environment.clone());
        }
        match self.environment.cluster() {
            Some(cluster) => cluster.route(node),
            None => Err(RuntimeError::NodeNotFound { node }),
        }
    }

    /// Connected nodes of the cluster this node belongs to
    pub fn nodes(&self) -> Vec<NodeId> {
        self.cluster()
            .map(|cluster| cluster.nodes())
            .unwrap_or_else(|_| vec![self.node_id()])
    }

    /// Spawn on `node` from a module name known to that node's catalog
    pub fn spawn_on(
        &mut self,
        node: NodeId,
        config: Option<ResourceId>,
        module_name: &str,
        entry: &str,
        params: &[Param],
    ) -> CallResult<ProcessId> {
        let args = params.iter().map(|param| param.to_value()).collect();
        self.spawn_on_values(node, config, module_name, entry, args)
    }

    /// Spawn on `node` from a module named by its [`module_id`](Self::module_id)
    pub(crate) fn spawn_on_module_id(
        &mut self,
        node: NodeId,
        config: Option<ResourceId>,
        module_id: u64,
        entry: &str,
        args: Vec<Value>,
    ) -> CallResult<ProcessId> {
        match self.environment.module_name(module_id) {
            Some(name) => self.spawn_on_values(node, config, &name, entry, args),
            None => Ok(Err(RuntimeError::ModuleNotFound {
                module: format!("#{module_id}"),
            })),
        }
    }

    fn spawn_on_values(
        &mut self,
        node: NodeId,
        config: Option<ResourceId>,
        module_name: &str,
        entry: &str,
        args: Vec<Value>,
    ) -> CallResult<ProcessId> {
        if !self.config.can_spawn_processes() {
            return Ok(Err(RuntimeError::permission_denied(Capability::SpawnProcesses)));
        }
        let config = self.child_config(config)?;
        let spawned = self.route(node).and_then(|target| {
            let module = target.modules().get(module_name)?;
            let request = SpawnRequest {
                config,
                module,
                entry: entry.to_string(),
                args,
                link: None,
            };
            target.spawn_process(request).map(|handle| handle.id())
        });
        Ok(spawned)
    }

    /// Send the current message to a process on `node`.
    ///
    /// Messages leaving the node must not carry resources.
    pub fn send_to_node(&mut self, node: NodeId, target: ProcessId) -> CallResult<()> {
        let message = self.scratch.take_for_send()?;
        if node != self.node_id() && message.resource_count() > 0 {
            return Err(Trap::ResourcesAcrossNodes);
        }
        Ok(self
            .route(node)
            .and_then(|environment| environment.deliver(target, Message::Data(message))))
    }

    pub async fn send_receive_skip_search_on(
        &mut self,
        node: NodeId,
        target: ProcessId,
        tag: Tag,
        timeout: Option<Duration>,
    ) -> CallResult<MessageKind> {
        let watermark = self.shared.mailbox.watermark();
        if let Err(err) = self.send_to_node(node, target)? {
            return Ok(Err(err));
        }
        Ok(self.await_reply(watermark, tag, timeout).await)
    }
}

impl std::fmt::Debug for ProcessContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessContext")
            .field("process_id", &self.shared.id)
            .field("node_id", &self.shared.node_id)
            .field("module", &self.module.name())
            .field("resources", &self.resources.len())
            .finish_non_exhaustive()
    }
}

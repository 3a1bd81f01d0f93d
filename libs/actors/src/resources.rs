//! Resource Transfer Table
//!
//! Each process owns one table mapping process-local handles to host
//! objects. Handles are move-only capabilities: moving a resource out (to
//! embed it in a message) leaves a tombstone behind, so any later use of the
//! old handle is reported as `MovedOut` instead of silently resolving to
//! something else. Handles are never reused within a table.

use crate::module::Module;
use runtime_config::ProcessConfig;
use std::any::Any;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use types::ResourceId;

/// Kind of host object behind a handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Module,
    Config,
    TcpStream,
    TcpListener,
    UdpSocket,
    AddressIterator,
    Object,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResourceKind::Module => "module",
            ResourceKind::Config => "config",
            ResourceKind::TcpStream => "tcp stream",
            ResourceKind::TcpListener => "tcp listener",
            ResourceKind::UdpSocket => "udp socket",
            ResourceKind::AddressIterator => "address iterator",
            ResourceKind::Object => "object",
        };
        f.write_str(name)
    }
}

/// Errors from handle lookups
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ResourceError {
    #[error("{0} does not exist")]
    Unknown(ResourceId),

    #[error("{0} was moved out of this process")]
    MovedOut(ResourceId),

    #[error("{id} is a {actual}, expected {expected}")]
    WrongKind {
        id: ResourceId,
        expected: ResourceKind,
        actual: ResourceKind,
    },
}

/// Opaque host-managed object (sockets and similar)
pub struct HostObject {
    kind: ResourceKind,
    value: Box<dyn Any + Send + Sync>,
}

impl HostObject {
    pub fn new<T: Any + Send + Sync>(kind: ResourceKind, value: T) -> Self {
        Self {
            kind,
            value: Box::new(value),
        }
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }
}

impl fmt::Debug for HostObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostObject").field("kind", &self.kind).finish_non_exhaustive()
    }
}

/// One-shot iterator over resolved addresses
#[derive(Debug, Clone, Default)]
pub struct AddressIterator {
    addresses: VecDeque<SocketAddr>,
}

impl AddressIterator {
    pub fn new(addresses: impl IntoIterator<Item = SocketAddr>) -> Self {
        Self {
            addresses: addresses.into_iter().collect(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.addresses.len()
    }
}

impl Iterator for AddressIterator {
    type Item = SocketAddr;

    fn next(&mut self) -> Option<SocketAddr> {
        self.addresses.pop_front()
    }
}

/// Host object owned by exactly one process at a time
#[derive(Debug)]
pub enum Resource {
    Module(Arc<Module>),
    Config(ProcessConfig),
    AddressIterator(AddressIterator),
    Object(HostObject),
}

impl Resource {
    pub fn kind(&self) -> ResourceKind {
        match self {
            Resource::Module(_) => ResourceKind::Module,
            Resource::Config(_) => ResourceKind::Config,
            Resource::AddressIterator(_) => ResourceKind::AddressIterator,
            Resource::Object(object) => object.kind(),
        }
    }
}

#[derive(Debug)]
enum Slot {
    Live(Resource),
    MovedOut,
}

/// Per-process handle table
#[derive(Debug)]
pub struct ResourceTable {
    slots: HashMap<ResourceId, Slot>,
    next_id: ResourceId,
}

impl Default for ResourceTable {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceTable {
    pub fn new() -> Self {
        Self {
            slots: HashMap::new(),
            next_id: ResourceId::new(1),
        }
    }

    /// Install a resource under a fresh handle
    pub fn insert(&mut self, resource: Resource) -> ResourceId {
        let id = self.next_id;
        self.next_id = id.next();
        self.slots.insert(id, Slot::Live(resource));
        id
    }

    pub fn get(&self, id: ResourceId) -> Result<&Resource, ResourceError> {
        match self.slots.get(&id) {
            Some(Slot::Live(resource)) => Ok(resource),
            Some(Slot::MovedOut) => Err(ResourceError::MovedOut(id)),
            None => Err(ResourceError::Unknown(id)),
        }
    }

    pub fn get_mut(&mut self, id: ResourceId) -> Result<&mut Resource, ResourceError> {
        match self.slots.get_mut(&id) {
            Some(Slot::Live(resource)) => Ok(resource),
            Some(Slot::MovedOut) => Err(ResourceError::MovedOut(id)),
            None => Err(ResourceError::Unknown(id)),
        }
    }

    /// Move a resource out, leaving a tombstone under its handle
    pub fn take(&mut self, id: ResourceId) -> Result<Resource, ResourceError> {
        match self.slots.get_mut(&id) {
            Some(slot @ Slot::Live(_)) => match std::mem::replace(slot, Slot::MovedOut) {
                Slot::Live(resource) => Ok(resource),
                Slot::MovedOut => Err(ResourceError::MovedOut(id)),
            },
            Some(Slot::MovedOut) => Err(ResourceError::MovedOut(id)),
            None => Err(ResourceError::Unknown(id)),
        }
    }

    /// Release a resource for good
    pub fn remove(&mut self, id: ResourceId) -> Result<Resource, ResourceError> {
        match self.slots.remove(&id) {
            Some(Slot::Live(resource)) => Ok(resource),
            Some(Slot::MovedOut) => {
                self.slots.insert(id, Slot::MovedOut);
                Err(ResourceError::MovedOut(id))
            }
            None => Err(ResourceError::Unknown(id)),
        }
    }

    pub fn contains(&self, id: ResourceId) -> bool {
        matches!(self.slots.get(&id), Some(Slot::Live(_)))
    }

    /// Number of live handles
    pub fn len(&self) -> usize {
        self.slots
            .values()
            .filter(|slot| matches!(slot, Slot::Live(_)))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn module(&self, id: ResourceId) -> Result<Arc<Module>, ResourceError> {
        match self.get(id)? {
            Resource::Module(module) => Ok(Arc::clone(module)),
            other => Err(wrong_kind(id, ResourceKind::Module, other)),
        }
    }

    pub fn config(&self, id: ResourceId) -> Result<&ProcessConfig, ResourceError> {
        match self.get(id)? {
            Resource::Config(config) => Ok(config),
            other => Err(wrong_kind(id, ResourceKind::Config, other)),
        }
    }

    pub fn config_mut(&mut self, id: ResourceId) -> Result<&mut ProcessConfig, ResourceError> {
        match self.get_mut(id)? {
            Resource::Config(config) => Ok(config),
            other => Err(wrong_kind(id, ResourceKind::Config, other)),
        }
    }

    pub fn address_iterator_mut(
        &mut self,
        id: ResourceId,
    ) -> Result<&mut AddressIterator, ResourceError> {
        match self.get_mut(id)? {
            Resource::AddressIterator(iter) => Ok(iter),
            other => Err(wrong_kind(id, ResourceKind::AddressIterator, other)),
        }
    }
}

fn wrong_kind(id: ResourceId, expected: ResourceKind, actual: &Resource) -> ResourceError {
    ResourceError::WrongKind {
        id,
        expected,
        actual: actual.kind(),
    }
}

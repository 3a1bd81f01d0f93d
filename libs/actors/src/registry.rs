//! Process Registry
//!
//! Node-scoped name directory. Names map to a process either on this node
//! or on another node of the cluster; local entries are dropped when their
//! process exits.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::SystemTime;
use tokio::sync::RwLock;
use tracing::debug;
use types::{NodeId, ProcessId};

/// Name directory for one node
#[derive(Debug)]
pub struct ProcessRegistry {
    node_id: NodeId,

    /// Processes on this node
    local: Arc<RwLock<HashMap<String, ProcessId>>>,

    /// Processes on other nodes
    remote: Arc<RwLock<HashMap<String, RemoteProcessInfo>>>,
}

/// Where a registered remote process lives
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteProcessInfo {
    pub node_id: NodeId,
    pub process_id: ProcessId,
    pub registered_at: SystemTime,
}

/// Lookup result
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessLocation {
    Local(ProcessId),
    Remote(RemoteProcessInfo),
}

impl ProcessLocation {
    pub fn is_local(&self) -> bool {
        matches!(self, ProcessLocation::Local(_))
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, ProcessLocation::Remote(_))
    }

    pub fn process_id(&self) -> ProcessId {
        match self {
            ProcessLocation::Local(id) => *id,
            ProcessLocation::Remote(info) => info.process_id,
        }
    }
}

impl ProcessRegistry {
    pub fn new(node_id: NodeId) -> Self {
        Self {
            node_id,
            local: Arc::new(RwLock::new(HashMap::new())),
            remote: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Register `name`, replacing any previous entry under it
    pub async fn put(&self, name: impl Into<String>, node_id: NodeId, process_id: ProcessId) {
        let name = name.into();
        debug!(name = %name, node_id = %node_id, process_id = %process_id, "Registering process name");

        if node_id == self.node_id {
            self.remote.write().await.remove(&name);
            self.local.write().await.insert(name, process_id);
        } else {
            self.local.write().await.remove(&name);
            let info = RemoteProcessInfo {
                node_id,
                process_id,
                registered_at: SystemTime::now(),
            };
            self.remote.write().await.insert(name, info);
        }
    }

    pub async fn get(&self, name: &str) -> Option<ProcessLocation> {
        if let Some(id) = self.local.read().await.get(name).copied() {
            return Some(ProcessLocation::Local(id));
        }
        self.remote
            .read()
            .await
            .get(name)
            .cloned()
            .map(ProcessLocation::Remote)
    }

    /// `(node, process)` pair for `name`
    pub async fn resolve(&self, name: &str) -> Option<(NodeId, ProcessId)> {
        self.get(name).await.map(|location| match location {
            ProcessLocation::Local(id) => (self.node_id, id),
            ProcessLocation::Remote(info) => (info.node_id, info.process_id),
        })
    }

    /// Returns whether an entry was removed
    pub async fn remove(&self, name: &str) -> bool {
        debug!(name = %name, "Unregistering process name");
        if self.local.write().await.remove(name).is_some() {
            return true;
        }
        self.remote.write().await.remove(name).is_some()
    }

    /// Drop every local name bound to `process_id`
    pub async fn remove_process(&self, process_id: ProcessId) -> usize {
        let mut local = self.local.write().await;
        let before = local.len();
        local.retain(|_, id| *id != process_id);
        before - local.len()
    }

    pub async fn list_local(&self) -> Vec<(String, ProcessId)> {
        let mut entries: Vec<_> = self
            .local
            .read()
            .await
            .iter()
            .map(|(name, id)| (name.clone(), *id))
            .collect();
        entries.sort();
        entries
    }

    pub async fn len(&self) -> usize {
        self.local.read().await.len() + self.remote.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

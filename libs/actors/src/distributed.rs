//! Multi-node delivery
//!
//! A [`Cluster`] joins node environments running in the same host process.
//! Each member has a connection flag; routing to a known node whose
//! connection is down fails with a connectivity error rather than
//! `NodeNotFound`, so callers can tell "retry later" from "wrong target".

use crate::environment::Environment;
use crate::error::{Result, RuntimeError};
use crate::module::ModuleDirectory;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};
use types::NodeId;

#[derive(Debug)]
struct Member {
    environment: Environment,
    connected: bool,
}

#[derive(Debug, Default)]
pub(crate) struct ClusterShared {
    members: RwLock<BTreeMap<NodeId, Member>>,
    modules: ModuleDirectory,
}

#[derive(Debug, Clone, Default)]
pub struct Cluster {
    shared: Arc<ClusterShared>,
}

impl Cluster {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_shared(shared: Arc<ClusterShared>) -> Self {
        Self { shared }
    }

    /// Add a node; it starts connected. Replaces a node with the same id.
    pub fn join(&self, environment: Environment) {
        let node_id = environment.node_id();
        environment.attach_cluster(Arc::downgrade(&self.shared));
        let previous = self.shared.members.write().insert(
            node_id,
            Member {
                environment,
                connected: true,
            },
        );
        if previous.is_some() {
            warn!(node_id = %node_id, "Replaced existing cluster member");
        }
        info!(node_id = %node_id, "Node joined cluster");
    }

    pub fn leave(&self, node_id: NodeId) -> Option<Environment> {
        let member = self.shared.members.write().remove(&node_id)?;
        member.environment.attach_cluster(std::sync::Weak::new());
        info!(node_id = %node_id, "Node left cluster");
        Some(member.environment)
    }

    /// Mark the connection to `node_id` down (`false`) or up (`true`)
    pub fn set_connected(&self, node_id: NodeId, connected: bool) -> bool {
        match self.shared.members.write().get_mut(&node_id) {
            Some(member) => {
                member.connected = connected;
                if connected {
                    info!(node_id = %node_id, "Node connected");
                } else {
                    warn!(node_id = %node_id, "Node disconnected");
                }
                true
            }
            None => false,
        }
    }

    /// Connected nodes, in id order
    pub fn nodes(&self) -> Vec<NodeId> {
        self.shared
            .members
            .read()
            .iter()
            .filter(|(_, member)| member.connected)
            .map(|(id, _)| *id)
            .collect()
    }

    pub fn environment(&self, node_id: NodeId) -> Option<Environment> {
        self.shared
            .members
            .read()
            .get(&node_id)
            .map(|member| member.environment.clone())
    }

    /// Module ids shared by every member node
    pub fn modules(&self) -> &ModuleDirectory {
        &self.shared.modules
    }

    /// Environment for `node_id`, if it is a member and reachable
    pub fn route(&self, node_id: NodeId) -> Result<Environment> {
        match self.shared.members.read().get(&node_id) {
            None => Err(RuntimeError::NodeNotFound { node: node_id }),
            Some(member) if !member.connected => Err(RuntimeError::node_connection(
                node_id,
                "connection to node is down",
            )),
            Some(member) => Ok(member.environment.clone()),
        }
    }
}

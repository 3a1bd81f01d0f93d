//! `distributed.*` host calls
//!
//! Node-addressed variants of spawn and send. Messages sent to another node
//! must not carry resources; doing so traps.

use super::{encode, optional_handle, spawn_args, spawned, timeout};
use crate::error::{RuntimeError, Trap};
use crate::process::ProcessContext;
use types::{HostCall, NodeId, ProcessId, Tag, SUCCESS, TIMEOUT};

pub fn nodes_count(ctx: &ProcessContext) -> u32 {
    ctx.nodes().len() as u32
}

/// Write up to `capacity` node ids as u64s at `ptr`.
///
/// Returns the total number of nodes, which may exceed `capacity`.
pub fn get_nodes(ctx: &mut ProcessContext, ptr: u32, capacity: u32) -> Result<u32, Trap> {
    let nodes = ctx.nodes();
    for (i, node) in nodes.iter().take(capacity as usize).enumerate() {
        ctx.memory_mut()
            .write_u64(u64::from(ptr) + i as u64 * 8, node.inner())?;
    }
    Ok(nodes.len() as u32)
}

pub fn node_id(ctx: &ProcessContext) -> u64 {
    ctx.node_id().inner()
}

pub fn module_id(ctx: &ProcessContext) -> u64 {
    ctx.module_id()
}

/// Spawn on `node_id` from the module with id `module_id` and write the new
/// process id to `id_ptr`. `config_id` of [`INHERIT`](super::INHERIT) reuses
/// the caller's configuration.
#[allow(clippy::too_many_arguments)]
pub fn spawn(
    ctx: &mut ProcessContext,
    node_id: u64,
    config_id: i64,
    module_id: u64,
    entry_ptr: u32,
    entry_len: u32,
    params_ptr: u32,
    params_len: u32,
    id_ptr: u32,
) -> Result<u32, Trap> {
    let (entry, params) = spawn_args(ctx, entry_ptr, entry_len, params_ptr, params_len)?;
    let args = match params {
        Ok(args) => args,
        Err(err) => return encode(HostCall::Spawn, &RuntimeError::from(err)),
    };
    let result = ctx.spawn_on_module_id(
        NodeId::new(node_id),
        optional_handle(config_id),
        module_id,
        &entry,
        args,
    )?;
    spawned(ctx, result, id_ptr)
}

pub fn send(ctx: &mut ProcessContext, node_id: u64, process_id: u64) -> Result<u32, Trap> {
    match ctx.send_to_node(NodeId::new(node_id), ProcessId::new(process_id))? {
        Ok(()) => Ok(SUCCESS),
        Err(err) => encode(HostCall::Send, &err),
    }
}

/// Cross-node request and reply. A lost node connection reports the same
/// status as a timeout.
pub async fn send_receive_skip_search(
    ctx: &mut ProcessContext,
    node_id: u64,
    process_id: u64,
    tag: i64,
    timeout_ms: u64,
) -> Result<u32, Trap> {
    let result = ctx
        .send_receive_skip_search_on(
            NodeId::new(node_id),
            ProcessId::new(process_id),
            Tag::new(tag),
            timeout(timeout_ms),
        )
        .await?;
    match result {
        Ok(_) => Ok(SUCCESS),
        Err(RuntimeError::NodeConnection { .. }) => Ok(TIMEOUT),
        Err(err) => encode(HostCall::SendReceiveSkipSearch, &err),
    }
}

//! `registry.*` host calls

use crate::error::Trap;
use crate::process::ProcessContext;
use types::{NodeId, ProcessId};

/// Register the name at `name_ptr` for `(node_id, process_id)`
pub async fn put(
    ctx: &mut ProcessContext,
    name_ptr: u32,
    name_len: u32,
    node_id: u64,
    process_id: u64,
) -> Result<(), Trap> {
    let name = read_name(ctx, name_ptr, name_len)?;
    ctx.registry_put(&name, NodeId::new(node_id), ProcessId::new(process_id))
        .await;
    Ok(())
}

/// `0` and the pair written to the out-pointers if found, else `1`
pub async fn get(
    ctx: &mut ProcessContext,
    name_ptr: u32,
    name_len: u32,
    node_id_ptr: u32,
    process_id_ptr: u32,
) -> Result<u32, Trap> {
    let name = read_name(ctx, name_ptr, name_len)?;
    match ctx.registry_get(&name).await {
        Some((node, process)) => {
            let memory = ctx.memory_mut();
            memory.write_u64(u64::from(node_id_ptr), node.inner())?;
            memory.write_u64(u64::from(process_id_ptr), process.inner())?;
            Ok(0)
        }
        None => Ok(1),
    }
}

/// `0` if an entry was removed, else `1`
pub async fn remove(ctx: &mut ProcessContext, name_ptr: u32, name_len: u32) -> Result<u32, Trap> {
    let name = read_name(ctx, name_ptr, name_len)?;
    Ok(if ctx.registry_remove(&name).await { 0 } else { 1 })
}

fn read_name(ctx: &ProcessContext, ptr: u32, len: u32) -> Result<String, Trap> {
    Ok(ctx
        .memory()
        .read_str(u64::from(ptr), u64::from(len))?
        .to_string())
}

//! `process.*` host calls

use super::{encode, optional_handle, spawn_args, spawned};
use crate::error::{RuntimeError, Trap};
use crate::process::ProcessContext;
use std::time::Duration;
use types::{HostCall, ProcessId, ResourceId, Tag, SUCCESS};

/// Spawn a process and write its id to `id_ptr`.
///
/// `link` of `0` spawns unlinked; `config_id`/`module_id` of
/// [`INHERIT`](super::INHERIT) reuse the caller's own. Parameters are
/// 17-byte records as produced by [`types::encode_params`].
#[allow(clippy::too_many_arguments)]
pub fn spawn(
    ctx: &mut ProcessContext,
    link: i64,
    config_id: i64,
    module_id: i64,
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

    let link = (link != 0).then_some(Tag::new(link));
    let result = ctx.spawn_values(
        link,
        optional_handle(config_id),
        optional_handle(module_id),
        &entry,
        args,
    )?;
    spawned(ctx, result, id_ptr)
}

/// Compile the module named by the bytes at `ptr` and write its handle to `id_ptr`
pub fn compile_module(ctx: &mut ProcessContext, ptr: u32, len: u32, id_ptr: u32) -> Result<u32, Trap> {
    let bytes = ctx.memory().read(u64::from(ptr), u64::from(len))?.to_vec();
    match ctx.compile_module(&bytes) {
        Ok(handle) => {
            ctx.memory_mut().write_u64(u64::from(id_ptr), handle.inner())?;
            Ok(SUCCESS)
        }
        Err(err) => encode(HostCall::CompileModule, &err),
    }
}

pub fn drop_module(ctx: &mut ProcessContext, module_id: u64) -> Result<(), Trap> {
    ctx.drop_module(ResourceId::new(module_id))
}

pub fn link(ctx: &mut ProcessContext, tag: i64, process_id: u64) {
    ctx.link(Tag::new(tag), ProcessId::new(process_id));
}

pub fn unlink(ctx: &mut ProcessContext, process_id: u64) {
    ctx.unlink(ProcessId::new(process_id));
}

pub fn kill(ctx: &mut ProcessContext, process_id: u64) {
    ctx.kill(ProcessId::new(process_id));
}

/// `1` if the process exists right now, else `0`
pub fn exists(ctx: &ProcessContext, process_id: u64) -> i32 {
    i32::from(ctx.exists(ProcessId::new(process_id)))
}

pub fn process_id(ctx: &ProcessContext) -> u64 {
    ctx.process_id().inner()
}

pub fn node_id(ctx: &ProcessContext) -> u64 {
    ctx.node_id().inner()
}

/// Non-zero `die` terminates the caller when a linked process dies
pub fn die_when_link_dies(ctx: &mut ProcessContext, die: u32) {
    ctx.die_when_link_dies(die != 0);
}

pub async fn sleep_ms(ctx: &mut ProcessContext, millis: u64) {
    ctx.sleep(Duration::from_millis(millis)).await;
}

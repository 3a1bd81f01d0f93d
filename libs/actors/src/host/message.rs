//! `message.*` host calls

use super::{encode, status, timeout};
use crate::error::Trap;
use crate::message::MessageKind;
use crate::process::ProcessContext;
use types::{CallError, HostCall, ProcessId, ResourceId, Tag, SUCCESS};

pub fn create_data(ctx: &mut ProcessContext, tag: i64, capacity: u64) {
    ctx.create_message(Tag::new(tag), usize::try_from(capacity).unwrap_or(usize::MAX));
}

/// Append `len` bytes at `ptr` to the current message
pub fn write_data(ctx: &mut ProcessContext, ptr: u32, len: u32) -> Result<u32, Trap> {
    let (scratch, memory) = ctx.scratch_and_memory();
    let bytes = memory.read(u64::from(ptr), u64::from(len))?;
    let written = scratch.write(bytes)?;
    Ok(written as u32)
}

/// Copy up to `len` bytes from the message cursor into guest memory
pub fn read_data(ctx: &mut ProcessContext, ptr: u32, len: u32) -> Result<u32, Trap> {
    let (scratch, memory) = ctx.scratch_and_memory();
    let out = memory.slice_mut(u64::from(ptr), u64::from(len))?;
    let read = scratch.read(out)?;
    Ok(read as u32)
}

pub fn seek_data(ctx: &mut ProcessContext, index: u64) -> Result<(), Trap> {
    ctx.seek(index)
}

pub fn get_tag(ctx: &ProcessContext) -> Result<i64, Trap> {
    ctx.tag().map(i64::from)
}

pub fn data_size(ctx: &ProcessContext) -> Result<u64, Trap> {
    ctx.size()
}

pub fn embed_resource(ctx: &mut ProcessContext, handle: u64) -> Result<u64, Trap> {
    ctx.embed(ResourceId::new(handle))
}

pub fn extract_resource(ctx: &mut ProcessContext, index: u64) -> Result<u64, Trap> {
    ctx.extract(index).map(u64::from)
}

pub fn send(ctx: &mut ProcessContext, process_id: u64) -> Result<u32, Trap> {
    let result = ctx.send(ProcessId::new(process_id))?;
    status(HostCall::Send, result)
}

/// Send, then wait for a reply tagged `tag` that arrives afterwards.
///
/// Returns success for any message placed in the scratch area.
pub async fn send_receive_skip_search(
    ctx: &mut ProcessContext,
    process_id: u64,
    tag: i64,
    timeout_ms: u64,
) -> Result<u32, Trap> {
    let result = ctx
        .send_receive_skip_search(ProcessId::new(process_id), Tag::new(tag), timeout(timeout_ms))
        .await?;
    match result {
        Ok(_) => Ok(SUCCESS),
        Err(err) => encode(HostCall::SendReceiveSkipSearch, &err),
    }
}

/// Wait for a message whose tag is one of the i64 values in the
/// `tags_len`-byte buffer at `tags_ptr`; an empty buffer matches anything.
///
/// Status `0` means a data message, otherwise the kind of signal notice.
pub async fn receive(
    ctx: &mut ProcessContext,
    tags_ptr: u32,
    tags_len: u32,
    timeout_ms: u64,
) -> Result<u32, Trap> {
    let filter = read_tags(ctx, tags_ptr, tags_len)?;
    match ctx.receive(&filter, timeout(timeout_ms)).await {
        Ok(MessageKind::Data) => Ok(SUCCESS),
        Ok(MessageKind::LinkDied) => notice(CallError::LinkDied),
        Ok(MessageKind::ProcessDied) => notice(CallError::ProcessDied),
        Err(err) => encode(HostCall::Receive, &err),
    }
}

fn notice(kind: CallError) -> Result<u32, Trap> {
    HostCall::Receive
        .encode(kind)
        .ok_or(Trap::UnexpectedStatus {
            call: HostCall::Receive,
            error: kind,
        })
}

fn read_tags(ctx: &ProcessContext, ptr: u32, len: u32) -> Result<Vec<Tag>, Trap> {
    const WIDTH: u64 = std::mem::size_of::<i64>() as u64;
    let len = u64::from(len);
    if len % WIDTH != 0 {
        return Err(Trap::MisalignedBuffer { len, width: WIDTH });
    }
    (0..len / WIDTH)
        .map(|i| {
            ctx.memory()
                .read_i64(u64::from(ptr) + i * WIDTH)
                .map(Tag::new)
        })
        .collect()
}

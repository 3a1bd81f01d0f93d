//! Host Call Boundary
//!
//! The raw call surface a guest sees: handles, tags and timeouts travel as
//! 64-bit integers, buffers as pointer+length pairs into the calling
//! process's [`GuestMemory`](crate::memory::GuestMemory), and results as
//! integer statuses from [`types::status`]. Values a call produces besides
//! its status are written through out-pointers.
//!
//! A bad pointer is never a status: it returns `Err(Trap)` and the process
//! dies. The same holds for scratch-message misuse and stale handles where
//! the call's status table has no code for them.

pub mod config;
pub mod distributed;
pub mod message;
pub mod metrics;
pub mod process;
pub mod registry;
pub mod timer;
pub mod version;
pub mod wasi;

use crate::error::{RuntimeError, Trap};
use crate::process::ProcessContext;
use std::time::Duration;
use types::{decode_params, HostCall, ParamError, ResourceId, Value, SUCCESS};

/// Handle argument meaning "use the caller's own"
pub const INHERIT: i64 = -1;

pub use runtime_config::protocol::timeouts::WAIT_FOREVER;

pub(crate) fn status(call: HostCall, result: Result<(), RuntimeError>) -> Result<u32, Trap> {
    match result {
        Ok(()) => Ok(SUCCESS),
        Err(err) => encode(call, &err),
    }
}

/// Status code for `err`, trapping when `call` has no code for it
pub(crate) fn encode(call: HostCall, err: &RuntimeError) -> Result<u32, Trap> {
    let error = err.call_error();
    call.encode(error)
        .ok_or(Trap::UnexpectedStatus { call, error })
}

pub(crate) fn timeout(raw_ms: u64) -> Option<Duration> {
    (raw_ms != WAIT_FOREVER).then(|| Duration::from_millis(raw_ms))
}

pub(crate) fn optional_handle(raw: i64) -> Option<ResourceId> {
    (raw != INHERIT).then(|| ResourceId::new(raw as u64))
}

/// Entry name and decoded parameters of a spawn call.
///
/// A non-UTF-8 entry name traps; malformed parameters are left for the
/// caller to report as a status.
pub(crate) fn spawn_args(
    ctx: &ProcessContext,
    entry_ptr: u32,
    entry_len: u32,
    params_ptr: u32,
    params_len: u32,
) -> Result<(String, std::result::Result<Vec<Value>, ParamError>), Trap> {
    let entry = ctx
        .memory()
        .read_str(u64::from(entry_ptr), u64::from(entry_len))?
        .to_string();
    let params = decode_params(ctx.memory().read(u64::from(params_ptr), u64::from(params_len))?);
    Ok((entry, params))
}

/// Write a spawned process id to `id_ptr`, or encode the spawn failure
pub(crate) fn spawned(
    ctx: &mut ProcessContext,
    result: crate::error::Result<types::ProcessId>,
    id_ptr: u32,
) -> Result<u32, Trap> {
    match result {
        Ok(id) => {
            ctx.memory_mut().write_u64(u64::from(id_ptr), id.inner())?;
            Ok(SUCCESS)
        }
        Err(err) => encode(HostCall::Spawn, &err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::{CallError, ProcessId, TIMEOUT};

    #[test]
    fn test_encoding_follows_call_tables() {
        let missing = RuntimeError::ProcessNotFound { process: ProcessId::new(1) };
        assert_eq!(encode(HostCall::Send, &missing), Ok(1));
        assert_eq!(
            encode(HostCall::Receive, &RuntimeError::timeout("receive", 0)),
            Ok(TIMEOUT)
        );
        assert_eq!(
            encode(HostCall::CreateConfig, &missing),
            Err(Trap::UnexpectedStatus {
                call: HostCall::CreateConfig,
                error: CallError::ProcessDoesNotExist,
            })
        );
        assert_eq!(status(HostCall::Send, Ok(())), Ok(SUCCESS));
    }

    #[test]
    fn test_sentinels() {
        assert_eq!(timeout(WAIT_FOREVER), None);
        assert_eq!(timeout(0), Some(Duration::ZERO));
        assert_eq!(optional_handle(INHERIT), None);
        assert_eq!(optional_handle(3), Some(ResourceId::new(3)));
    }
}

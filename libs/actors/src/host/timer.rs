//! `timer.*` host calls

use crate::error::Trap;
use crate::process::ProcessContext;
use std::time::Duration;
use types::{ProcessId, TimerId};

/// Consume the current message and deliver it to `process_id` after `delay_ms`
pub fn send_after(ctx: &mut ProcessContext, process_id: u64, delay_ms: u64) -> Result<u64, Trap> {
    ctx.send_after(ProcessId::new(process_id), Duration::from_millis(delay_ms))
        .map(u64::from)
}

/// `1` if the timer was still pending, else `0`
pub fn cancel_timer(ctx: &mut ProcessContext, timer_id: u64) -> u32 {
    u32::from(ctx.cancel_timer(TimerId::new(timer_id)))
}

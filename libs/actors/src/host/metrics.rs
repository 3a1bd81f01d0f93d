//! `metrics.*` host calls
//!
//! Metric names are UTF-8 strings in guest memory; a bad name traps.

use crate::error::Trap;
use crate::process::ProcessContext;

fn name(ctx: &ProcessContext, ptr: u32, len: u32) -> Result<&str, Trap> {
    ctx.memory().read_str(u64::from(ptr), u64::from(len))
}

pub fn counter(ctx: &ProcessContext, name_ptr: u32, name_len: u32, value: u64) -> Result<(), Trap> {
    ctx.guest_metrics().set_counter(name(ctx, name_ptr, name_len)?, value);
    Ok(())
}

pub fn increment_counter(ctx: &ProcessContext, name_ptr: u32, name_len: u32) -> Result<(), Trap> {
    ctx.guest_metrics().increment_counter(name(ctx, name_ptr, name_len)?);
    Ok(())
}

pub fn gauge(ctx: &ProcessContext, name_ptr: u32, name_len: u32, value: f64) -> Result<(), Trap> {
    ctx.guest_metrics().set_gauge(name(ctx, name_ptr, name_len)?, value);
    Ok(())
}

pub fn increment_gauge(ctx: &ProcessContext, name_ptr: u32, name_len: u32, value: f64) -> Result<(), Trap> {
    ctx.guest_metrics().increment_gauge(name(ctx, name_ptr, name_len)?, value);
    Ok(())
}

pub fn decrement_gauge(ctx: &ProcessContext, name_ptr: u32, name_len: u32, value: f64) -> Result<(), Trap> {
    ctx.guest_metrics().decrement_gauge(name(ctx, name_ptr, name_len)?, value);
    Ok(())
}

pub fn histogram(ctx: &ProcessContext, name_ptr: u32, name_len: u32, value: f64) -> Result<(), Trap> {
    ctx.guest_metrics().record_histogram(name(ctx, name_ptr, name_len)?, value);
    Ok(())
}

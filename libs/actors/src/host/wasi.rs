//! `wasi.*` host calls
//!
//! Additions to a capability configuration for processes spawned from it.
//! An unknown configuration, a non-UTF-8 string or an invalid variable name
//! all trap.

use crate::error::{RuntimeError, Trap};
use crate::process::ProcessContext;
use types::ResourceId;

fn read_string(ctx: &ProcessContext, ptr: u32, len: u32) -> Result<String, Trap> {
    Ok(ctx
        .memory()
        .read_str(u64::from(ptr), u64::from(len))?
        .to_string())
}

pub fn config_add_environment_variable(
    ctx: &mut ProcessContext,
    config_id: u64,
    key_ptr: u32,
    key_len: u32,
    value_ptr: u32,
    value_len: u32,
) -> Result<(), Trap> {
    let key = read_string(ctx, key_ptr, key_len)?;
    let value = read_string(ctx, value_ptr, value_len)?;
    ctx.configuration_mut(ResourceId::new(config_id))?
        .add_environment_variable(key, value)
        .map_err(RuntimeError::from)?;
    Ok(())
}

pub fn config_add_command_line_argument(
    ctx: &mut ProcessContext,
    config_id: u64,
    argument_ptr: u32,
    argument_len: u32,
) -> Result<(), Trap> {
    let argument = read_string(ctx, argument_ptr, argument_len)?;
    ctx.configuration_mut(ResourceId::new(config_id))?
        .add_command_line_argument(argument);
    Ok(())
}

pub fn config_preopen_dir(
    ctx: &mut ProcessContext,
    config_id: u64,
    dir_ptr: u32,
    dir_len: u32,
) -> Result<(), Trap> {
    let dir = read_string(ctx, dir_ptr, dir_len)?;
    ctx.configuration_mut(ResourceId::new(config_id))?
        .preopen_dir(dir);
    Ok(())
}

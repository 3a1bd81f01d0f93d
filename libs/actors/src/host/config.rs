//! `config.*` host calls
//!
//! Getters write their value as a little-endian u64 to `out_ptr`; booleans
//! are `0` or `1`.

use super::{encode, status};
use crate::error::{RuntimeError, Trap};
use crate::process::ProcessContext;
use runtime_config::ProcessConfig;
use types::{HostCall, ResourceId, SUCCESS};

/// Create a configuration with every capability denied; handle goes to `id_ptr`
pub fn create(ctx: &mut ProcessContext, id_ptr: u32) -> Result<u32, Trap> {
    match ctx.create_config() {
        Ok(handle) => {
            ctx.memory_mut().write_u64(u64::from(id_ptr), handle.inner())?;
            Ok(SUCCESS)
        }
        Err(err) => encode(HostCall::CreateConfig, &err),
    }
}

pub fn drop(ctx: &mut ProcessContext, config_id: u64) -> Result<u32, Trap> {
    let result = ctx.drop_config(ResourceId::new(config_id));
    status(HostCall::ConfigAccess, result)
}

fn update(
    ctx: &mut ProcessContext,
    config_id: u64,
    apply: impl FnOnce(&mut ProcessConfig) -> Result<(), RuntimeError>,
) -> Result<u32, Trap> {
    let result = ctx
        .configuration_mut(ResourceId::new(config_id))
        .and_then(apply);
    status(HostCall::ConfigAccess, result)
}

fn query(
    ctx: &mut ProcessContext,
    config_id: u64,
    out_ptr: u32,
    get: impl FnOnce(&ProcessConfig) -> u64,
) -> Result<u32, Trap> {
    match ctx.configuration(ResourceId::new(config_id)).map(get) {
        Ok(value) => {
            ctx.memory_mut().write_u64(u64::from(out_ptr), value)?;
            Ok(SUCCESS)
        }
        Err(err) => encode(HostCall::ConfigAccess, &err),
    }
}

/// Fails with `InvalidArgument` above the platform maximum
pub fn set_max_memory(ctx: &mut ProcessContext, config_id: u64, max_memory: u64) -> Result<u32, Trap> {
    update(ctx, config_id, |config| Ok(config.set_max_memory(max_memory)?))
}

pub fn get_max_memory(ctx: &mut ProcessContext, config_id: u64, out_ptr: u32) -> Result<u32, Trap> {
    query(ctx, config_id, out_ptr, ProcessConfig::max_memory)
}

/// `0` removes the fuel limit
pub fn set_max_fuel(ctx: &mut ProcessContext, config_id: u64, max_fuel: u64) -> Result<u32, Trap> {
    update(ctx, config_id, |config| {
        config.set_max_fuel(max_fuel);
        Ok(())
    })
}

pub fn get_max_fuel(ctx: &mut ProcessContext, config_id: u64, out_ptr: u32) -> Result<u32, Trap> {
    query(ctx, config_id, out_ptr, ProcessConfig::max_fuel)
}

pub fn set_can_compile_modules(ctx: &mut ProcessContext, config_id: u64, can: u32) -> Result<u32, Trap> {
    update(ctx, config_id, |config| {
        config.set_can_compile_modules(can != 0);
        Ok(())
    })
}

pub fn get_can_compile_modules(ctx: &mut ProcessContext, config_id: u64, out_ptr: u32) -> Result<u32, Trap> {
    query(ctx, config_id, out_ptr, |config| u64::from(config.can_compile_modules()))
}

pub fn set_can_create_configs(ctx: &mut ProcessContext, config_id: u64, can: u32) -> Result<u32, Trap> {
    update(ctx, config_id, |config| {
        config.set_can_create_configs(can != 0);
        Ok(())
    })
}

pub fn get_can_create_configs(ctx: &mut ProcessContext, config_id: u64, out_ptr: u32) -> Result<u32, Trap> {
    query(ctx, config_id, out_ptr, |config| u64::from(config.can_create_configs()))
}

pub fn set_can_spawn_processes(ctx: &mut ProcessContext, config_id: u64, can: u32) -> Result<u32, Trap> {
    update(ctx, config_id, |config| {
        config.set_can_spawn_processes(can != 0);
        Ok(())
    })
}

pub fn get_can_spawn_processes(ctx: &mut ProcessContext, config_id: u64, out_ptr: u32) -> Result<u32, Trap> {
    query(ctx, config_id, out_ptr, |config| u64::from(config.can_spawn_processes()))
}

//! Raw host call surface: statuses, out-pointers and traps on bad memory

mod common;

use actor_runtime::host::{
    self, config, message, metrics as guest_metrics, process, registry, timer, wasi, INHERIT,
    WAIT_FOREVER,
};
use actor_runtime::{ExitReason, Module, ProcessContext, RuntimeError, Trap};
use std::path::PathBuf;
use common::{next_report, reports, with_module};
use types::{encode_params, HostCall, Param, TIMEOUT};

const BUF: u32 = 0;
const OUT: u32 = 1024;
const TAGS: u32 = 2048;

/// Run `body` as the entry point of a root process and hand back what it reports
async fn run_in_process<T, F>(body: F) -> T
where
    T: Send + 'static,
    F: Fn(&mut ProcessContext) -> Result<T, Trap> + Send + Sync + 'static,
{
    let (tx, mut rx) = reports::<T>();
    let body = std::sync::Arc::new(body);
    let environment = with_module(
        Module::builder("abi")
            .entry("main", move |mut ctx, _args| {
                let tx = tx.clone();
                let body = std::sync::Arc::clone(&body);
                async move {
                    let _ = tx.send((*body)(&mut ctx)?);
                    Ok(())
                }
            })
            .entry("noop", |_ctx, _args| async { Ok(()) })
            .build(),
    );
    environment.spawn("abi", "main", &[]).unwrap();
    next_report(&mut rx).await
}

#[tokio::test]
async fn test_message_round_trip_through_guest_memory() {
    let (tx, mut rx) = reports::<(u32, u32, u64, Vec<u8>)>();
    let environment = with_module(
        Module::builder("abi")
            .entry("main", move |mut ctx, _args| {
                let tx = tx.clone();
                async move {
                    let me = process::process_id(&ctx);
                    ctx.memory_mut().write(u64::from(BUF), b"ping")?;
                    message::create_data(&mut ctx, 3, 0);
                    let written = message::write_data(&mut ctx, BUF, 4)?;
                    let sent = message::send(&mut ctx, me)?;

                    ctx.memory_mut().write_u64(u64::from(TAGS), 3)?;
                    let received = message::receive(&mut ctx, TAGS, 8, 0).await?;
                    let size = message::data_size(&ctx)?;
                    message::read_data(&mut ctx, OUT, 4)?;
                    let body = ctx.memory().read(u64::from(OUT), 4)?.to_vec();
                    assert_eq!(message::get_tag(&ctx)?, 3);

                    let _ = tx.send((written, sent | received, size, body));
                    Ok(())
                }
            })
            .build(),
    );

    environment.spawn("abi", "main", &[]).unwrap();
    let (written, status, size, body) = next_report(&mut rx).await;
    assert_eq!(written, 4);
    assert_eq!(status, 0);
    assert_eq!(size, 4);
    assert_eq!(body, b"ping");
}

#[tokio::test]
async fn test_receive_statuses() {
    let (tx, mut rx) = reports::<(u32, u32)>();
    let environment = with_module(
        Module::builder("abi")
            .entry("crash", |_ctx, _args| async { Err(Trap::abort("boom")) })
            .entry("main", move |mut ctx, _args| {
                let tx = tx.clone();
                async move {
                    let empty = message::receive(&mut ctx, TAGS, 0, 0).await?;

                    process::die_when_link_dies(&mut ctx, 0);
                    ctx.memory_mut().write(u64::from(BUF), b"crash")?;
                    let status = process::spawn(&mut ctx, 5, INHERIT, INHERIT, BUF, 5, 0, 0, OUT)?;
                    assert_eq!(status, 0);
                    let notice = message::receive(&mut ctx, TAGS, 0, WAIT_FOREVER).await?;

                    let _ = tx.send((empty, notice));
                    Ok(())
                }
            })
            .build(),
    );

    environment.spawn("abi", "main", &[]).unwrap();
    let (empty, notice) = next_report(&mut rx).await;
    assert_eq!(empty, TIMEOUT);
    assert_eq!(HostCall::Receive.decode(notice), Err(types::CallError::LinkDied));
}

#[tokio::test]
async fn test_receive_filter_length_is_in_bytes() {
    let (tx, mut rx) = reports::<(u32, i64)>();
    let environment = with_module(
        Module::builder("abi")
            .entry("main", move |mut ctx, _args| {
                let tx = tx.clone();
                async move {
                    let last_slot = u32::try_from(ctx.memory().size() - 8).unwrap();
                    ctx.memory_mut().write_u64(u64::from(last_slot), 5)?;
                    let status = message::receive(&mut ctx, last_slot, 8, WAIT_FOREVER).await?;
                    let _ = tx.send((status, message::get_tag(&ctx)?));
                    Ok(())
                }
            })
            .build(),
    );

    let handle = environment.spawn("abi", "main", &[]).unwrap();
    handle.send(types::Tag::new(1), b"skipped").unwrap();
    handle.send(types::Tag::new(5), b"wanted").unwrap();
    assert_eq!(next_report(&mut rx).await, (0, 5));
}

#[tokio::test]
async fn test_receive_filter_must_hold_whole_tags() {
    let environment = with_module(
        Module::builder("abi")
            .entry("main", |mut ctx, _args| async move {
                message::receive(&mut ctx, TAGS, 12, 0).await?;
                Ok(())
            })
            .build(),
    );

    let handle = environment.spawn("abi", "main", &[]).unwrap();
    assert_eq!(
        handle.join().await,
        ExitReason::Trap(Trap::MisalignedBuffer { len: 12, width: 8 })
    );
}

#[tokio::test]
async fn test_send_to_missing_process_status() {
    let status = run_in_process(|ctx| {
        message::create_data(ctx, 1, 0);
        message::send(ctx, 999)
    })
    .await;
    assert_eq!(status, 1);
}

#[tokio::test]
async fn test_spawn_statuses() {
    let statuses = run_in_process(|ctx| {
        ctx.memory_mut().write(u64::from(BUF), b"noop")?;

        let mut bad = encode_params(&[Param::I32(1)]);
        bad[0] = 0x01;
        ctx.memory_mut().write(u64::from(TAGS), &bad)?;
        let bad_params = process::spawn(ctx, 0, INHERIT, INHERIT, BUF, 4, TAGS, bad.len() as u32, OUT)?;

        let unknown_module = process::spawn(ctx, 0, INHERIT, 4242, BUF, 4, 0, 0, OUT);

        let mut config_id = 0;
        if config::create(ctx, OUT)? == 0 {
            config_id = ctx.memory().read_u64(u64::from(OUT))?;
        }
        let denied = process::spawn(ctx, 0, config_id as i64, INHERIT, BUF, 4, 0, 0, OUT)?;
        Ok((bad_params, unknown_module, denied))
    })
    .await;

    assert_eq!(statuses.0, 3);
    assert!(matches!(statuses.1, Err(Trap::InvalidResource(_))));
    assert_eq!(statuses.2, 0);
}

#[tokio::test]
async fn test_config_setters_and_getters() {
    let values = run_in_process(|ctx| {
        assert_eq!(config::create(ctx, OUT)?, 0);
        let id = ctx.memory().read_u64(u64::from(OUT))?;

        assert_eq!(config::set_max_fuel(ctx, id, 0)?, 0);
        config::get_max_fuel(ctx, id, OUT)?;
        let fuel = ctx.memory().read_u64(u64::from(OUT))?;

        config::set_can_spawn_processes(ctx, id, 1)?;
        config::get_can_spawn_processes(ctx, id, OUT)?;
        let can_spawn = ctx.memory().read_u64(u64::from(OUT))?;

        config::get_can_compile_modules(ctx, id, OUT)?;
        let can_compile = ctx.memory().read_u64(u64::from(OUT))?;

        let too_big = config::set_max_memory(ctx, id, u64::MAX)?;
        let missing = config::get_max_memory(ctx, id + 100, OUT)?;
        let dropped = config::drop(ctx, id)?;
        Ok((fuel, can_spawn, can_compile, too_big, missing, dropped))
    })
    .await;

    assert_eq!(values, (0, 1, 0, 2, 1, 0));
}

#[tokio::test]
async fn test_out_of_bounds_pointer_traps() {
    let environment = with_module(
        Module::builder("abi")
            .entry("main", |mut ctx, _args| async move {
                message::create_data(&mut ctx, 1, 0);
                message::write_data(&mut ctx, u32::MAX - 2, 16)?;
                Ok(())
            })
            .build(),
    );

    let handle = environment.spawn("abi", "main", &[]).unwrap();
    assert!(matches!(
        handle.join().await,
        ExitReason::Trap(Trap::MemoryOutOfBounds { .. })
    ));
}

#[tokio::test]
async fn test_reading_tag_without_message_traps() {
    let result = run_in_process(|ctx| Ok(message::get_tag(ctx))).await;
    assert_eq!(result, Err(Trap::NoActiveMessage));
}

#[derive(Debug, PartialEq)]
struct ChildSetup {
    mode: Option<String>,
    arguments: Vec<String>,
    dirs: Vec<PathBuf>,
}

#[tokio::test]
async fn test_wasi_calls_reach_the_spawned_process() {
    let (tx, mut rx) = reports::<ChildSetup>();
    let environment = with_module(
        Module::builder("abi")
            .entry("child", move |ctx, _args| {
                let tx = tx.clone();
                async move {
                    let config = ctx.config();
                    let _ = tx.send(ChildSetup {
                        mode: config.environment_variable("MODE").map(str::to_string),
                        arguments: config.arguments().to_vec(),
                        dirs: config.preopened_dirs().to_vec(),
                    });
                    Ok(())
                }
            })
            .entry("main", |mut ctx, _args| async move {
                assert_eq!(config::create(&mut ctx, OUT)?, 0);
                let id = ctx.memory().read_u64(u64::from(OUT))?;

                ctx.memory_mut().write(u64::from(BUF), b"MODEfast--verbose/data")?;
                wasi::config_add_environment_variable(&mut ctx, id, BUF, 4, BUF + 4, 4)?;
                wasi::config_add_command_line_argument(&mut ctx, id, BUF + 8, 9)?;
                wasi::config_preopen_dir(&mut ctx, id, BUF + 17, 5)?;

                ctx.memory_mut().write(u64::from(TAGS), b"child")?;
                let status = process::spawn(&mut ctx, 0, id as i64, INHERIT, TAGS, 5, 0, 0, OUT)?;
                assert_eq!(status, 0);
                Ok(())
            })
            .build(),
    );

    environment.spawn("abi", "main", &[]).unwrap();
    assert_eq!(
        next_report(&mut rx).await,
        ChildSetup {
            mode: Some("fast".to_string()),
            arguments: vec!["--verbose".to_string()],
            dirs: vec![PathBuf::from("/data")],
        }
    );
}

#[tokio::test]
async fn test_invalid_environment_variable_traps() {
    let environment = with_module(
        Module::builder("abi")
            .entry("main", |mut ctx, _args| async move {
                config::create(&mut ctx, OUT)?;
                let id = ctx.memory().read_u64(u64::from(OUT))?;
                ctx.memory_mut().write(u64::from(BUF), b"A=Bvalue")?;
                wasi::config_add_environment_variable(&mut ctx, id, BUF, 3, BUF + 3, 5)?;
                Ok(())
            })
            .build(),
    );

    let handle = environment.spawn("abi", "main", &[]).unwrap();
    assert!(matches!(
        handle.join().await,
        ExitReason::Trap(Trap::Unhandled(RuntimeError::Configuration(_)))
    ));
}

#[tokio::test]
async fn test_metric_calls_record_on_the_node() {
    let (counter, gauge, histogram) = run_in_process(|ctx| {
        ctx.memory_mut().write(u64::from(BUF), b"jobsqueuelatency")?;
        guest_metrics::counter(ctx, BUF, 4, 10)?;
        guest_metrics::increment_counter(ctx, BUF, 4)?;
        guest_metrics::gauge(ctx, BUF + 4, 5, 2.0)?;
        guest_metrics::increment_gauge(ctx, BUF + 4, 5, 3.0)?;
        guest_metrics::decrement_gauge(ctx, BUF + 4, 5, 1.0)?;
        guest_metrics::histogram(ctx, BUF + 9, 7, 0.25)?;
        guest_metrics::histogram(ctx, BUF + 9, 7, 0.75)?;

        let metrics = ctx.guest_metrics();
        Ok((
            metrics.counter("jobs"),
            metrics.gauge("queue"),
            metrics.histogram("latency").map(|summary| (summary.count, summary.sum)),
        ))
    })
    .await;

    assert_eq!(counter, Some(11));
    assert_eq!(gauge, Some(4.0));
    assert_eq!(histogram, Some((2, 1.0)));
}

#[tokio::test]
async fn test_metric_name_must_be_utf8() {
    let result = run_in_process(|ctx| {
        ctx.memory_mut().write(u64::from(BUF), &[0xff, 0xfe])?;
        Ok(guest_metrics::increment_counter(ctx, BUF, 2))
    })
    .await;
    assert_eq!(result, Err(Trap::InvalidUtf8));
}

#[tokio::test]
async fn test_registry_calls() {
    let (tx, mut rx) = reports::<(u32, u64, u64, u32, u32)>();
    let environment = with_module(
        Module::builder("abi")
            .entry("main", move |mut ctx, _args| {
                let tx = tx.clone();
                async move {
                    ctx.memory_mut().write(u64::from(BUF), b"svc")?;
                    let node = process::node_id(&ctx);
                    let me = process::process_id(&ctx);
                    registry::put(&mut ctx, BUF, 3, node, me).await?;

                    let found = registry::get(&mut ctx, BUF, 3, OUT, OUT + 8).await?;
                    let node_out = ctx.memory().read_u64(u64::from(OUT))?;
                    let process_out = ctx.memory().read_u64(u64::from(OUT + 8))?;
                    let removed = registry::remove(&mut ctx, BUF, 3).await?;
                    let missing = registry::get(&mut ctx, BUF, 3, OUT, OUT + 8).await?;

                    assert_eq!(node_out, node);
                    let _ = tx.send((found, process_out, me, removed, missing));
                    Ok(())
                }
            })
            .build(),
    );

    environment.spawn("abi", "main", &[]).unwrap();
    let (found, process_out, me, removed, missing) = next_report(&mut rx).await;
    assert_eq!(found, 0);
    assert_eq!(process_out, me);
    assert_eq!(removed, 0);
    assert_eq!(missing, 1);
}

#[tokio::test]
async fn test_timer_calls() {
    let (tx, mut rx) = reports::<(u32, u32, u32)>();
    let environment = with_module(
        Module::builder("abi")
            .entry("main", move |mut ctx, _args| {
                let tx = tx.clone();
                async move {
                    let me = process::process_id(&ctx);
                    message::create_data(&mut ctx, 8, 0);
                    let timer_id = timer::send_after(&mut ctx, me, 5)?;
                    let status = message::receive(&mut ctx, TAGS, 0, 5_000).await?;

                    message::create_data(&mut ctx, 9, 0);
                    let pending = timer::send_after(&mut ctx, me, 60_000)?;
                    let cancelled = timer::cancel_timer(&mut ctx, pending);
                    let late = timer::cancel_timer(&mut ctx, timer_id);
                    let _ = tx.send((status, cancelled, late));
                    Ok(())
                }
            })
            .build(),
    );

    environment.spawn("abi", "main", &[]).unwrap();
    assert_eq!(next_report(&mut rx).await, (0, 1, 0));
}

#[test]
fn test_wait_forever_sentinel() {
    assert_eq!(WAIT_FOREVER, u64::MAX);
    assert_eq!(host::INHERIT, -1);
    assert_eq!(
        env!("CARGO_PKG_VERSION"),
        format!(
            "{}.{}.{}",
            host::version::major(),
            host::version::minor(),
            host::version::patch()
        )
    );
}

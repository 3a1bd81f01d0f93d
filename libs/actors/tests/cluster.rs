//! Delivery and spawning across nodes joined in one cluster

mod common;

use actor_runtime::{Cluster, Module, ProcessContext, RuntimeError, Trap};
use common::{next_report, node, reports, REPORT_TIMEOUT};
use std::sync::Arc;
use types::{NodeId, Param, ProcessId, Tag};

fn payload(ctx: &mut ProcessContext) -> Result<Vec<u8>, Trap> {
    let mut buffer = vec![0; ctx.size()? as usize];
    ctx.read(&mut buffer)?;
    Ok(buffer)
}

fn echo_module() -> Arc<Module> {
    Module::builder("echo")
        .entry("serve", |mut ctx, args| async move {
            let home = NodeId::new(args[0].as_i64() as u64);
            let reply_to = ProcessId::new(args[1].as_i64() as u64);
            ctx.receive(&[], None).await?;
            let body = payload(&mut ctx)?;
            ctx.create_message(Tag::new(2), 0);
            ctx.write(&body)?;
            ctx.send_to_node(home, reply_to)??;
            Ok(())
        })
        .build()
}

#[tokio::test]
async fn test_spawn_and_reply_across_nodes() {
    let (tx, mut rx) = reports::<(NodeId, Vec<NodeId>, Vec<u8>)>();
    let cluster = Cluster::new();
    let home = node(1);
    let remote = node(2);
    remote.register_module(echo_module());
    home.register_module(
        Module::builder("client")
            .entry("main", move |mut ctx, _args| {
                let tx = tx.clone();
                async move {
                    let nodes = ctx.nodes();
                    let home = ctx.node_id();
                    let me = ctx.process_id();
                    let server = ctx.spawn_on(
                        NodeId::new(2),
                        None,
                        "echo",
                        "serve",
                        &[Param::U64(home.inner()), Param::U64(me.inner())],
                    )??;

                    ctx.create_message(Tag::new(1), 0);
                    ctx.write(b"across")?;
                    ctx.send_receive_skip_search_on(NodeId::new(2), server, Tag::new(2), Some(REPORT_TIMEOUT))
                        .await??;
                    let _ = tx.send((ctx.node_id(), nodes, payload(&mut ctx)?));
                    Ok(())
                }
            })
            .build(),
    );
    cluster.join(home.clone());
    cluster.join(remote.clone());

    home.spawn("client", "main", &[]).unwrap();
    let (node_id, nodes, reply) = next_report(&mut rx).await;
    assert_eq!(node_id, NodeId::new(1));
    assert_eq!(nodes, vec![NodeId::new(1), NodeId::new(2)]);
    assert_eq!(reply, b"across");
}

#[tokio::test]
async fn test_routing_errors() {
    let (tx, mut rx) = reports::<(RuntimeError, RuntimeError)>();
    let cluster = Cluster::new();
    let home = node(1);
    home.register_module(
        Module::builder("client")
            .entry("main", move |mut ctx, _args| {
                let tx = tx.clone();
                async move {
                    ctx.create_message(Tag::new(1), 0);
                    let unknown = ctx.send_to_node(NodeId::new(9), ProcessId::new(1))?;
                    ctx.create_message(Tag::new(1), 0);
                    let down = ctx.send_to_node(NodeId::new(2), ProcessId::new(1))?;
                    let _ = tx.send((
                        unknown.expect_err("unknown node accepted"),
                        down.expect_err("disconnected node accepted"),
                    ));
                    Ok(())
                }
            })
            .build(),
    );
    cluster.join(home.clone());
    cluster.join(node(2));
    cluster.set_connected(NodeId::new(2), false);

    home.spawn("client", "main", &[]).unwrap();
    let (unknown, down) = next_report(&mut rx).await;
    assert_eq!(unknown, RuntimeError::NodeNotFound { node: NodeId::new(9) });
    assert!(matches!(down, RuntimeError::NodeConnection { .. }));
    assert!(down.is_retryable());
}

#[tokio::test]
async fn test_resources_cannot_leave_the_node() {
    let cluster = Cluster::new();
    let home = node(1);
    home.register_module(
        Module::builder("client")
            .entry("main", |mut ctx, _args| async move {
                let config = ctx.create_config()?;
                ctx.create_message(Tag::new(1), 0);
                ctx.embed(config)?;
                ctx.send_to_node(NodeId::new(2), ProcessId::new(1))??;
                Ok(())
            })
            .build(),
    );
    cluster.join(home.clone());
    cluster.join(node(2));

    let handle = home.spawn("client", "main", &[]).unwrap();
    assert_eq!(
        handle.join().await,
        actor_runtime::ExitReason::Trap(Trap::ResourcesAcrossNodes)
    );
}

#[derive(Debug, PartialEq)]
struct RemoteCalls {
    count: u32,
    listed: u32,
    first_node: u64,
    unknown_module: u32,
    unknown_node: u32,
    spawned: u32,
    reply_status: u32,
    reply: Vec<u8>,
}

#[tokio::test]
async fn test_distributed_host_calls() {
    use actor_runtime::host::{distributed, message, INHERIT};
    use types::encode_params;

    const BUF: u32 = 0;
    const PARAMS: u32 = 256;
    const OUT: u32 = 1024;

    let (tx, mut rx) = reports::<RemoteCalls>();
    let module = Module::builder("shared")
        .entry("serve", |mut ctx, args| async move {
            let home = NodeId::new(args[0].as_i64() as u64);
            let reply_to = ProcessId::new(args[1].as_i64() as u64);
            ctx.receive(&[], None).await?;
            let body = payload(&mut ctx)?;
            ctx.create_message(Tag::new(2), 0);
            ctx.write(&body)?;
            ctx.send_to_node(home, reply_to)??;
            Ok(())
        })
        .entry("main", move |mut ctx, _args| {
            let tx = tx.clone();
            async move {
                let count = distributed::nodes_count(&ctx);
                let listed = distributed::get_nodes(&mut ctx, OUT, 1)?;
                let first_node = ctx.memory().read_u64(u64::from(OUT))?;
                let module_id = distributed::module_id(&ctx);

                let params = encode_params(&[
                    Param::U64(distributed::node_id(&ctx)),
                    Param::U64(ctx.process_id().inner()),
                ]);
                ctx.memory_mut().write(u64::from(BUF), b"serve")?;
                ctx.memory_mut().write(u64::from(PARAMS), &params)?;
                let params_len = params.len() as u32;

                let unknown_module =
                    distributed::spawn(&mut ctx, 2, INHERIT, 999, BUF, 5, PARAMS, params_len, OUT)?;
                let unknown_node =
                    distributed::spawn(&mut ctx, 9, INHERIT, module_id, BUF, 5, PARAMS, params_len, OUT)?;
                let spawned =
                    distributed::spawn(&mut ctx, 2, INHERIT, module_id, BUF, 5, PARAMS, params_len, OUT)?;
                let server = ctx.memory().read_u64(u64::from(OUT))?;

                message::create_data(&mut ctx, 1, 0);
                ctx.write(b"remote")?;
                let reply_status =
                    distributed::send_receive_skip_search(&mut ctx, 2, server, 2, 5_000).await?;
                let reply = payload(&mut ctx)?;

                let _ = tx.send(RemoteCalls {
                    count,
                    listed,
                    first_node,
                    unknown_module,
                    unknown_node,
                    spawned,
                    reply_status,
                    reply,
                });
                Ok(())
            }
        })
        .build();

    let cluster = Cluster::new();
    let home = node(1);
    let remote = node(2);
    home.register_module(Arc::clone(&module));
    remote.register_module(module);
    cluster.join(home.clone());
    cluster.join(remote);

    home.spawn("shared", "main", &[]).unwrap();
    assert_eq!(
        next_report(&mut rx).await,
        RemoteCalls {
            count: 2,
            listed: 2,
            first_node: 1,
            unknown_module: 2,
            unknown_node: 1,
            spawned: 0,
            reply_status: 0,
            reply: b"remote".to_vec(),
        }
    );
}

#[tokio::test]
async fn test_distributed_send_statuses() {
    use actor_runtime::host::distributed;

    let (tx, mut rx) = reports::<(u32, u32, u32)>();
    let cluster = Cluster::new();
    let home = node(1);
    home.register_module(
        Module::builder("client")
            .entry("main", move |mut ctx, _args| {
                let tx = tx.clone();
                async move {
                    ctx.create_message(Tag::new(1), 0);
                    let missing_process = distributed::send(&mut ctx, 2, 404)?;
                    ctx.create_message(Tag::new(1), 0);
                    let missing_node = distributed::send(&mut ctx, 9, 1)?;
                    ctx.create_message(Tag::new(1), 0);
                    let down = distributed::send(&mut ctx, 3, 1)?;
                    let _ = tx.send((missing_process, missing_node, down));
                    Ok(())
                }
            })
            .build(),
    );
    cluster.join(home.clone());
    cluster.join(node(2));
    cluster.join(node(3));
    cluster.set_connected(NodeId::new(3), false);

    home.spawn("client", "main", &[]).unwrap();
    assert_eq!(next_report(&mut rx).await, (1, 2, types::TIMEOUT));
}

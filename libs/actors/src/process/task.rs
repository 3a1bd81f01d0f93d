//! Process task runner

use super::ProcessShared;
use crate::environment::Environment;
use crate::error::Trap;
use crate::message::Message;
use crate::signal::{ExitReason, Signal};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Drives one entry point until it returns, traps, panics or is killed
pub(crate) struct ProcessTask {
    pub(crate) shared: Arc<ProcessShared>,
    pub(crate) environment: Environment,
    pub(crate) signals: mpsc::UnboundedReceiver<Signal>,
    pub(crate) entry: BoxFuture<'static, Result<(), Trap>>,
    pub(crate) entry_name: String,
}

impl ProcessTask {
    pub(crate) async fn run(self) {
        let ProcessTask {
            shared,
            environment,
            mut signals,
            entry,
            entry_name,
        } = self;

        let task_start = Instant::now();
        debug!(
            process_id = %shared.id,
            node_id = %shared.node_id,
            entry = %entry_name,
            "Process task started"
        );

        let mut entry = AssertUnwindSafe(entry).catch_unwind();
        let reason = loop {
            tokio::select! {
                biased;

                Some(signal) = signals.recv() => match signal {
                    Signal::Kill => break ExitReason::Killed,
                    Signal::LinkDied { process, tag } => {
                        if shared.die_when_link_dies() {
                            warn!(
                                process_id = %shared.id,
                                peer = %process,
                                tag = %tag,
                                "Linked process died, terminating"
                            );
                            break ExitReason::LinkDied { process, tag };
                        }
                        debug!(
                            process_id = %shared.id,
                            peer = %process,
                            tag = %tag,
                            "Linked process died, queued as message"
                        );
                        shared.mailbox.push(Message::LinkDied { tag, process });
                        environment.metrics().record_link_death_message();
                    }
                },

                outcome = &mut entry => break match outcome {
                    Ok(Ok(())) => ExitReason::Normal,
                    Ok(Err(trap)) => ExitReason::Trap(trap),
                    Err(panic) => ExitReason::Panicked(panic_message(panic.as_ref())),
                },
            }
        };

        // Release the context (and every resource it owns) before peers hear
        // about the exit.
        drop(entry);
        signals.close();

        if reason.is_abnormal() {
            warn!(
                process_id = %shared.id,
                reason = %reason,
                runtime_ms = task_start.elapsed().as_millis(),
                "Process terminated abnormally"
            );
        } else {
            info!(
                process_id = %shared.id,
                runtime_ms = task_start.elapsed().as_millis(),
                "Process finished"
            );
        }

        environment.retire(&shared, reason).await;
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

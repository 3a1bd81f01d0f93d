//! Process Control
//!
//! A process is one tokio task running a module entry point. Its mailbox,
//! link set and exit state live in [`ProcessShared`] so other processes and
//! the host can reach it; everything else (scratch message, resource table,
//! guest memory, fuel) is owned by its [`ProcessContext`] and never shared.
//!
//! # Links
//!
//! Links are symmetric and stored on both sides. A dying process closes its
//! link set under the lock before draining it, so a concurrent `link` either
//! lands before the drain (and is notified) or sees the set closed (and
//! treats the peer as already dead). Each death is reported to each peer at
//! most once.

mod context;
mod task;

pub use context::ProcessContext;
pub(crate) use task::ProcessTask;

use crate::environment::Environment;
use crate::error::Result;
use crate::mailbox::Mailbox;
use crate::message::{DataMessage, Message};
use crate::signal::{ExitReason, Signal};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use types::{NodeId, ProcessId, Tag};

#[derive(Debug, Default)]
struct LinkSet {
    closed: bool,
    peers: HashMap<ProcessId, Tag>,
    /// Processes monitoring this one
    monitors: HashSet<ProcessId>,
}

/// State of a process reachable from outside its task
pub(crate) struct ProcessShared {
    pub(crate) id: ProcessId,
    pub(crate) node_id: NodeId,
    pub(crate) mailbox: Mailbox,
    signals: mpsc::UnboundedSender<Signal>,
    die_when_link_dies: AtomicBool,
    links: Mutex<LinkSet>,
    exit: watch::Sender<Option<ExitReason>>,
}

impl ProcessShared {
    pub(crate) fn new(id: ProcessId, node_id: NodeId) -> (Arc<Self>, mpsc::UnboundedReceiver<Signal>) {
        let (signals, signal_rx) = mpsc::unbounded_channel();
        let (exit, _) = watch::channel(None);
        let shared = Arc::new(Self {
            id,
            node_id,
            mailbox: Mailbox::new(),
            signals,
            die_when_link_dies: AtomicBool::new(true),
            links: Mutex::new(LinkSet::default()),
            exit,
        });
        (shared, signal_rx)
    }

    /// Returns `false` once the process task has stopped listening
    pub(crate) fn signal(&self, signal: Signal) -> bool {
        self.signals.send(signal).is_ok()
    }

    pub(crate) fn die_when_link_dies(&self) -> bool {
        self.die_when_link_dies.load(Ordering::Acquire)
    }

    pub(crate) fn set_die_when_link_dies(&self, die: bool) {
        self.die_when_link_dies.store(die, Ordering::Release);
    }

    /// Returns `false` when the link set is already closed
    pub(crate) fn add_link(&self, peer: ProcessId, tag: Tag) -> bool {
        let mut links = self.links.lock();
        if links.closed {
            return false;
        }
        links.peers.insert(peer, tag);
        true
    }

    pub(crate) fn remove_link(&self, peer: ProcessId) -> Option<Tag> {
        self.links.lock().peers.remove(&peer)
    }

    pub(crate) fn linked_peers(&self) -> Vec<(ProcessId, Tag)> {
        let mut peers: Vec<_> = self.links.lock().peers.iter().map(|(p, t)| (*p, *t)).collect();
        peers.sort();
        peers
    }

    pub(crate) fn add_monitor(&self, watcher: ProcessId) -> bool {
        let mut links = self.links.lock();
        if links.closed {
            return false;
        }
        links.monitors.insert(watcher);
        true
    }

    pub(crate) fn remove_monitor(&self, watcher: ProcessId) -> bool {
        self.links.lock().monitors.remove(&watcher)
    }

    /// Close the link set and take its contents; later additions are refused
    pub(crate) fn close_links(&self) -> (HashMap<ProcessId, Tag>, HashSet<ProcessId>) {
        let mut links = self.links.lock();
        links.closed = true;
        (
            std::mem::take(&mut links.peers),
            std::mem::take(&mut links.monitors),
        )
    }

    pub(crate) fn finish(&self, reason: ExitReason) {
        self.exit.send_replace(Some(reason));
    }

    pub(crate) fn exit_reason(&self) -> Option<ExitReason> {
        self.exit.borrow().clone()
    }

    #[allow(clippy::let_and_return)]
    pub(crate) async fn join(&self) -> ExitReason {
        let mut exit = self.exit.subscribe();
        // The borrowed guard has to be released before `exit` goes out of scope
        let reason = match exit.wait_for(Option::is_some).await {
            Ok(reason) => reason.clone().unwrap_or(ExitReason::Killed),
            Err(_) => ExitReason::Killed,
        };
        reason
    }
}

impl fmt::Debug for ProcessShared {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessShared")
            .field("id", &self.id)
            .field("node_id", &self.node_id)
            .field("queued", &self.mailbox.len())
            .field("die_when_link_dies", &self.die_when_link_dies())
            .finish_non_exhaustive()
    }
}

/// Host-side handle to a spawned process
#[derive(Debug, Clone)]
pub struct ProcessHandle {
    shared: Arc<ProcessShared>,
    environment: Environment,
}

impl ProcessHandle {
    pub(crate) fn new(shared: Arc<ProcessShared>, environment: Environment) -> Self {
        Self {
            shared,
            environment,
        }
    }

    pub fn id(&self) -> ProcessId {
        self.shared.id
    }

    pub fn node_id(&self) -> NodeId {
        self.shared.node_id
    }

    pub fn is_alive(&self) -> bool {
        self.shared.exit_reason().is_none()
    }

    /// Queue a data message with no resources
    pub fn send(&self, tag: Tag, payload: &[u8]) -> Result<()> {
        self.environment
            .deliver(self.id(), Message::Data(DataMessage::from_bytes(tag, payload)))
    }

    pub fn kill(&self) -> bool {
        self.environment.kill(self.id())
    }

    /// Wait for the process to terminate
    pub async fn join(&self) -> ExitReason {
        self.shared.join().await
    }

    pub fn exit_reason(&self) -> Option<ExitReason> {
        self.shared.exit_reason()
    }

    pub fn queued_messages(&self) -> usize {
        self.shared.mailbox.len()
    }

    pub fn die_when_link_dies(&self) -> bool {
        self.shared.die_when_link_dies()
    }

    /// Peers this process is currently linked to
    pub fn links(&self) -> Vec<(ProcessId, Tag)> {
        self.shared.linked_peers()
    }
}

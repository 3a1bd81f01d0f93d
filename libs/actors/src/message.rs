//! Scratch Message Builder
//!
//! Every process owns exactly one scratch area. It is either idle, holds the
//! data message being constructed, or holds the message most recently taken
//! from the mailbox. Operating on the wrong state is a caller bug and traps.
//!
//! ```text
//!          create                 send / send_after
//!   Idle ──────────▶ Constructing ──────────────────▶ Idle
//!    ▲                    ▲
//!    │ send (forward)     │ create (discards)
//!    │                    │
//!    └──────────── Received ◀──── receive (from any state)
//! ```
//!
//! Resources embedded in a message belong to the message. Discarding the
//! message (a second `create`, a `receive`, or the process exiting) destroys
//! them; they never return to the process that embedded them.

use crate::error::Trap;
use crate::resources::{Resource, ResourceKind};
use bytes::BytesMut;
use runtime_config::protocol::message::MAX_RESERVED_CAPACITY;
use std::fmt;
use tracing::debug;
use types::{ProcessId, Tag};

/// Byte buffer plus transferred resources, addressed by tag
pub struct DataMessage {
    tag: Tag,
    buffer: BytesMut,
    cursor: u64,
    resources: Vec<Option<Resource>>,
}

impl DataMessage {
    pub fn new(tag: Tag, capacity: usize) -> Self {
        Self {
            tag,
            buffer: BytesMut::with_capacity(capacity.min(MAX_RESERVED_CAPACITY)),
            cursor: 0,
            resources: Vec::new(),
        }
    }

    /// Message with a payload and no resources, as sent by the host
    pub fn from_bytes(tag: Tag, payload: &[u8]) -> Self {
        let mut message = Self::new(tag, payload.len());
        message.write(payload);
        message
    }

    pub fn tag(&self) -> Tag {
        self.tag
    }

    pub fn size(&self) -> u64 {
        self.buffer.len() as u64
    }

    pub fn cursor(&self) -> u64 {
        self.cursor
    }

    pub fn payload(&self) -> &[u8] {
        &self.buffer
    }

    /// Append at the tail; the read cursor is unaffected
    pub fn write(&mut self, bytes: &[u8]) -> usize {
        self.buffer.extend_from_slice(bytes);
        bytes.len()
    }

    /// Copy forward from the cursor
    pub fn read(&mut self, out: &mut [u8]) -> usize {
        let start = self.cursor.min(self.size()) as usize;
        let available = &self.buffer[start..];
        let count = available.len().min(out.len());
        out[..count].copy_from_slice(&available[..count]);
        self.cursor += count as u64;
        count
    }

    /// Move the cursor to an absolute offset; reads past the end yield nothing
    pub fn seek(&mut self, index: u64) {
        self.cursor = index;
    }

    /// Append a resource and return its slot index
    pub fn embed(&mut self, resource: Resource) -> u64 {
        self.resources.push(Some(resource));
        (self.resources.len() - 1) as u64
    }

    pub fn extract(&mut self, index: u64) -> Result<Resource, Trap> {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.resources.get_mut(i))
            .and_then(Option::take)
            .ok_or(Trap::MessageSlotEmpty { index })
    }

    /// Extract a resource, trapping unless it has the expected kind.
    ///
    /// A mismatched resource stays in its slot.
    pub fn extract_as(&mut self, index: u64, expected: ResourceKind) -> Result<Resource, Trap> {
        let slot = usize::try_from(index)
            .ok()
            .and_then(|i| self.resources.get_mut(i))
            .ok_or(Trap::MessageSlotEmpty { index })?;
        let actual = slot
            .as_ref()
            .map(Resource::kind)
            .ok_or(Trap::MessageSlotEmpty { index })?;
        if actual != expected {
            return Err(Trap::SlotKindMismatch {
                index,
                expected,
                actual,
            });
        }
        slot.take().ok_or(Trap::MessageSlotEmpty { index })
    }

    /// Resources still held by the message
    pub fn resource_count(&self) -> usize {
        self.resources.iter().filter(|slot| slot.is_some()).count()
    }
}

impl fmt::Debug for DataMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataMessage")
            .field("tag", &self.tag)
            .field("size", &self.buffer.len())
            .field("cursor", &self.cursor)
            .field("resources", &self.resource_count())
            .finish()
    }
}

/// Mailbox entry: data, or a notice converted from a signal
#[derive(Debug)]
pub enum Message {
    Data(DataMessage),
    /// A linked process terminated abnormally
    LinkDied { tag: Tag, process: ProcessId },
    /// A monitored process terminated
    ProcessDied { tag: Tag, process: ProcessId },
}

impl Message {
    pub fn tag(&self) -> Tag {
        match self {
            Message::Data(data) => data.tag(),
            Message::LinkDied { tag, .. } | Message::ProcessDied { tag, .. } => *tag,
        }
    }

    pub fn kind(&self) -> MessageKind {
        match self {
            Message::Data(_) => MessageKind::Data,
            Message::LinkDied { .. } => MessageKind::LinkDied,
            Message::ProcessDied { .. } => MessageKind::ProcessDied,
        }
    }

    /// Whether a filter of tags selects this message; empty or wildcard matches all
    pub fn matches(&self, filter: &[Tag]) -> bool {
        filter.is_empty() || filter.iter().any(|t| t.is_wildcard() || *t == self.tag())
    }
}

/// What `receive` placed into the scratch area
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Data,
    LinkDied,
    ProcessDied,
}

#[derive(Debug, Default)]
enum ScratchState {
    #[default]
    Idle,
    Constructing(DataMessage),
    Received(Message),
}

/// Per-process single-slot staging area
#[derive(Debug)]
pub struct Scratch {
    state: ScratchState,
    default_capacity: usize,
}

impl Scratch {
    pub fn new(default_capacity: usize) -> Self {
        Self {
            state: ScratchState::Idle,
            default_capacity,
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.state, ScratchState::Idle)
    }

    pub fn is_constructing(&self) -> bool {
        matches!(self.state, ScratchState::Constructing(_))
    }

    /// Open a fresh data message, discarding whatever was here
    pub fn create(&mut self, tag: Tag, capacity_hint: usize) {
        let capacity = if capacity_hint == 0 {
            self.default_capacity
        } else {
            capacity_hint
        };
        self.replace(ScratchState::Constructing(DataMessage::new(tag, capacity)));
    }

    /// Install a message taken from the mailbox
    pub fn set_received(&mut self, message: Message) {
        self.replace(ScratchState::Received(message));
    }

    fn replace(&mut self, next: ScratchState) {
        let previous = std::mem::replace(&mut self.state, next);
        let orphaned = match &previous {
            ScratchState::Constructing(data) | ScratchState::Received(Message::Data(data)) => {
                data.resource_count()
            }
            _ => 0,
        };
        if orphaned > 0 {
            debug!(resources = orphaned, "Discarding scratch message with embedded resources");
        }
    }

    pub fn data(&self) -> Result<&DataMessage, Trap> {
        match &self.state {
            ScratchState::Idle => Err(Trap::NoActiveMessage),
            ScratchState::Constructing(data) | ScratchState::Received(Message::Data(data)) => {
                Ok(data)
            }
            ScratchState::Received(_) => Err(Trap::NotDataMessage),
        }
    }

    pub fn data_mut(&mut self) -> Result<&mut DataMessage, Trap> {
        match &mut self.state {
            ScratchState::Idle => Err(Trap::NoActiveMessage),
            ScratchState::Constructing(data) | ScratchState::Received(Message::Data(data)) => {
                Ok(data)
            }
            ScratchState::Received(_) => Err(Trap::NotDataMessage),
        }
    }

    pub fn write(&mut self, bytes: &[u8]) -> Result<usize, Trap> {
        Ok(self.data_mut()?.write(bytes))
    }

    pub fn read(&mut self, out: &mut [u8]) -> Result<usize, Trap> {
        Ok(self.data_mut()?.read(out))
    }

    pub fn seek(&mut self, index: u64) -> Result<(), Trap> {
        self.data_mut()?.seek(index);
        Ok(())
    }

    /// Tag of the current message, including signal notices
    pub fn tag(&self) -> Result<Tag, Trap> {
        match &self.state {
            ScratchState::Idle => Err(Trap::NoActiveMessage),
            ScratchState::Constructing(data) => Ok(data.tag()),
            ScratchState::Received(message) => Ok(message.tag()),
        }
    }

    pub fn size(&self) -> Result<u64, Trap> {
        Ok(self.data()?.size())
    }

    /// Peer named by a received `LinkDied` or `ProcessDied` notice
    pub fn signal_source(&self) -> Result<ProcessId, Trap> {
        match &self.state {
            ScratchState::Idle => Err(Trap::NoActiveMessage),
            ScratchState::Received(Message::LinkDied { process, .. })
            | ScratchState::Received(Message::ProcessDied { process, .. }) => Ok(*process),
            _ => Err(Trap::abort("scratch message is not a signal notice")),
        }
    }

    /// Hand the current data message over for sending, leaving the area idle
    pub fn take_for_send(&mut self) -> Result<DataMessage, Trap> {
        match std::mem::take(&mut self.state) {
            ScratchState::Constructing(data) | ScratchState::Received(Message::Data(data)) => {
                Ok(data)
            }
            ScratchState::Idle => Err(Trap::NoActiveMessage),
            other @ ScratchState::Received(_) => {
                self.state = other;
                Err(Trap::NotDataMessage)
            }
        }
    }
}

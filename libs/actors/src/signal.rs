//! Out-of-band signals and termination causes

use crate::error::Trap;
use std::fmt;
use types::{ProcessId, Tag};

/// Delivered to a process task ahead of its mailbox
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Signal {
    Kill,
    LinkDied { process: ProcessId, tag: Tag },
}

/// Why a process terminated
#[derive(Debug, Clone, PartialEq)]
pub enum ExitReason {
    /// The entry point returned `Ok`
    Normal,
    Trap(Trap),
    Panicked(String),
    Killed,
    /// A linked process died while this one had `die_when_link_dies` set
    LinkDied { process: ProcessId, tag: Tag },
}

impl ExitReason {
    /// Abnormal exits propagate over links
    pub fn is_abnormal(&self) -> bool {
        !matches!(self, ExitReason::Normal)
    }
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitReason::Normal => f.write_str("normal"),
            ExitReason::Trap(trap) => write!(f, "trap: {trap}"),
            ExitReason::Panicked(message) => write!(f, "panicked: {message}"),
            ExitReason::Killed => f.write_str("killed"),
            ExitReason::LinkDied { process, tag } => write!(f, "link died: {process} ({tag})"),
        }
    }
}

impl From<Trap> for ExitReason {
    fn from(trap: Trap) -> Self {
        ExitReason::Trap(trap)
    }
}

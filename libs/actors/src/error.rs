//! Runtime Error Types
//!
//! Two families, kept apart in the type system:
//!
//! - [`RuntimeError`]: recoverable, per-call domain errors. Each maps onto
//!   one [`ErrorKind`] and one status code at the host boundary.
//! - [`Trap`]: fatal faults that terminate the calling process. Protocol
//!   misuse of the scratch message, out-of-bounds guest memory and exhausted
//!   resource limits all land here and are never reported as a status.

use crate::resources::{ResourceError, ResourceKind};
use runtime_config::CapabilityError;
use std::fmt;
use thiserror::Error;
use types::{CallError, ErrorKind, HostCall, NodeId, ParamError, ProcessId};

/// Capability checked before a privileged operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    CompileModules,
    CreateConfigs,
    SpawnProcesses,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Capability::CompileModules => "compile modules",
            Capability::CreateConfigs => "create configurations",
            Capability::SpawnProcesses => "spawn processes",
        };
        f.write_str(name)
    }
}

/// Recoverable runtime errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RuntimeError {
    #[error("Process {process} does not exist")]
    ProcessNotFound { process: ProcessId },

    #[error("Node {node} does not exist")]
    NodeNotFound { node: NodeId },

    #[error("Module '{module}' does not exist")]
    ModuleNotFound { module: String },

    #[error("Entry point '{entry}' not found in module '{module}'")]
    EntryPointNotFound { module: String, entry: String },

    #[error("Resource error: {0}")]
    Resource(#[from] ResourceError),

    #[error("Timeout: {operation} exceeded {timeout_ms}ms")]
    Timeout {
        operation: &'static str,
        timeout_ms: u64,
    },

    #[error("Permission denied: process may not {capability}")]
    PermissionDenied { capability: Capability },

    #[error("Node connection error: {node}: {message}")]
    NodeConnection { node: NodeId, message: String },

    #[error("Invalid argument: {0}")]
    InvalidArgument(#[from] ParamError),

    #[error("Configuration error: {0}")]
    Configuration(#[from] CapabilityError),

    #[error("Name resolution failed for '{host}': {message}")]
    Resolve { host: String, message: String },
}

/// Result type alias for runtime operations
pub type Result<T> = std::result::Result<T, RuntimeError>;

/// Outcome of a call that can fail recoverably or fault the caller.
///
/// Inside an entry point `ctx.send(peer)??` propagates both: the outer `?`
/// forwards the trap, the inner one turns the error into
/// [`Trap::Unhandled`].
pub type CallResult<T> = std::result::Result<Result<T>, Trap>;

impl RuntimeError {
    pub fn timeout(operation: &'static str, timeout_ms: u64) -> Self {
        Self::Timeout {
            operation,
            timeout_ms,
        }
    }

    pub fn permission_denied(capability: Capability) -> Self {
        Self::PermissionDenied { capability }
    }

    pub fn node_connection(node: NodeId, message: impl Into<String>) -> Self {
        Self::NodeConnection {
            node,
            message: message.into(),
        }
    }

    /// Boundary status this error travels as
    pub fn call_error(&self) -> CallError {
        match self {
            RuntimeError::ProcessNotFound { .. } => CallError::ProcessDoesNotExist,
            RuntimeError::NodeNotFound { .. } => CallError::NodeDoesNotExist,
            RuntimeError::ModuleNotFound { .. } | RuntimeError::EntryPointNotFound { .. } => {
                CallError::ModuleDoesNotExist
            }
            RuntimeError::Resource(_) | RuntimeError::Resolve { .. } => {
                CallError::ResourceDoesNotExist
            }
            RuntimeError::Timeout { .. } => CallError::CallTimedOut,
            RuntimeError::PermissionDenied { .. } => CallError::PermissionDenied,
            RuntimeError::NodeConnection { .. } => CallError::NodeConnectionError,
            RuntimeError::InvalidArgument(_) => CallError::InvalidArgumentType,
            RuntimeError::Configuration(_) => CallError::InvalidArgument,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.call_error().kind()
    }

    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }
}

/// Fatal fault; the process that raised it terminates abnormally
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Trap {
    #[error("no message in the scratch area")]
    NoActiveMessage,

    #[error("scratch message is not a data message")]
    NotDataMessage,

    #[error("message slot {index} is empty or out of range")]
    MessageSlotEmpty { index: u64 },

    #[error("message slot {index} holds a {actual} resource, expected {expected}")]
    SlotKindMismatch {
        index: u64,
        expected: ResourceKind,
        actual: ResourceKind,
    },

    #[error("invalid resource use: {0}")]
    InvalidResource(#[from] ResourceError),

    #[error("messages carrying resources cannot cross node boundaries")]
    ResourcesAcrossNodes,

    #[error("memory access out of bounds: offset {offset}, length {len}, memory size {size}")]
    MemoryOutOfBounds { offset: u64, len: u64, size: u64 },

    #[error("buffer of {len} bytes is not a whole number of {width}-byte values")]
    MisalignedBuffer { len: u64, width: u64 },

    #[error("memory limit of {limit} bytes exceeded")]
    MemoryLimitExceeded { limit: u64 },

    #[error("fuel limit of {limit} units exhausted")]
    OutOfFuel { limit: u64 },

    #[error("guest string is not valid UTF-8")]
    InvalidUtf8,

    #[error("{call:?} cannot report '{error}'")]
    UnexpectedStatus { call: HostCall, error: CallError },

    #[error("unhandled error: {0}")]
    Unhandled(RuntimeError),

    #[error("process aborted: {0}")]
    Abort(String),
}

impl Trap {
    pub fn abort(message: impl Into<String>) -> Self {
        Trap::Abort(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Trap::Unhandled(err) => err.kind(),
            _ => ErrorKind::ProtocolMisuse,
        }
    }
}

impl From<RuntimeError> for Trap {
    fn from(err: RuntimeError) -> Self {
        Trap::Unhandled(err)
    }
}

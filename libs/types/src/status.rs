//! Host Call Status Codes
//!
//! Every host call returns a small integer: `0` for success, positive
//! per-call codes for domain errors, and the shared sentinel [`TIMEOUT`]
//! wherever a wait or a node connection expired. The same table drives both
//! directions, so the host and the caller can never disagree on a mapping.
//!
//! | call                          | 1                   | 2                  | 3                   | 4                 | 9027                |
//! |-------------------------------|---------------------|--------------------|---------------------|-------------------|---------------------|
//! | `receive`                     | LinkDied            | ProcessDied        |                     |                   | CallTimedOut        |
//! | `send`                        | ProcessDoesNotExist | NodeDoesNotExist   |                     |                   | NodeConnectionError |
//! | `send_receive_skip_search`    | ProcessDoesNotExist | NodeDoesNotExist   |                     |                   | CallTimedOut        |
//! | `spawn`                       | NodeDoesNotExist    | ModuleDoesNotExist | InvalidArgumentType | PermissionDenied  | NodeConnectionError |
//! | `compile_module`              | ModuleDoesNotExist  | PermissionDenied   |                     |                   |                     |
//! | `create_config`               | PermissionDenied    |                    |                     |                   |                     |
//! | `config_*`                    | ResourceDoesNotExist| InvalidArgument    |                     |                   |                     |

use thiserror::Error;

/// Success status
pub const SUCCESS: u32 = 0;

/// Universal timeout sentinel
pub const TIMEOUT: u32 = 9027;

/// Coarse error taxonomy shared by every call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Node, module, process or resource does not exist
    NotFound,
    /// A wait or a remote call ran out of time
    Timeout,
    /// Capability violation
    PermissionDenied,
    /// Broken scratch-message state machine; always fatal
    ProtocolMisuse,
    /// Distributed node link failure
    Connectivity,
    /// Argument of the wrong shape
    InvalidArgument,
    /// A linked or monitored peer terminated
    PeerDied,
    /// Code outside the known table
    Unknown,
}

impl ErrorKind {
    /// Whether repeating the same call can succeed
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            ErrorKind::NotFound | ErrorKind::Timeout | ErrorKind::Connectivity
        )
    }
}

/// Typed view of a non-zero status
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum CallError {
    #[error("link died")]
    LinkDied,
    #[error("process died")]
    ProcessDied,
    #[error("call timed out")]
    CallTimedOut,
    #[error("process does not exist")]
    ProcessDoesNotExist,
    #[error("node does not exist")]
    NodeDoesNotExist,
    #[error("module does not exist")]
    ModuleDoesNotExist,
    #[error("resource does not exist")]
    ResourceDoesNotExist,
    #[error("node connection error")]
    NodeConnectionError,
    #[error("permission denied")]
    PermissionDenied,
    #[error("invalid argument type")]
    InvalidArgumentType,
    #[error("invalid argument")]
    InvalidArgument,
    #[error("unknown error {0}")]
    Unknown(u32),
}

impl CallError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CallError::LinkDied | CallError::ProcessDied => ErrorKind::PeerDied,
            CallError::CallTimedOut => ErrorKind::Timeout,
            CallError::ProcessDoesNotExist
            | CallError::NodeDoesNotExist
            | CallError::ModuleDoesNotExist
            | CallError::ResourceDoesNotExist => ErrorKind::NotFound,
            CallError::NodeConnectionError => ErrorKind::Connectivity,
            CallError::PermissionDenied => ErrorKind::PermissionDenied,
            CallError::InvalidArgumentType | CallError::InvalidArgument => {
                ErrorKind::InvalidArgument
            }
            CallError::Unknown(_) => ErrorKind::Unknown,
        }
    }
}

/// Host calls that report a status code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostCall {
    Receive,
    Send,
    SendReceiveSkipSearch,
    Spawn,
    CompileModule,
    CreateConfig,
    ConfigAccess,
}

impl HostCall {
    fn table(self) -> &'static [(u32, CallError)] {
        match self {
            HostCall::Receive => &[
                (1, CallError::LinkDied),
                (2, CallError::ProcessDied),
                (TIMEOUT, CallError::CallTimedOut),
            ],
            HostCall::Send => &[
                (1, CallError::ProcessDoesNotExist),
                (2, CallError::NodeDoesNotExist),
                (TIMEOUT, CallError::NodeConnectionError),
            ],
            HostCall::SendReceiveSkipSearch => &[
                (1, CallError::ProcessDoesNotExist),
                (2, CallError::NodeDoesNotExist),
                (TIMEOUT, CallError::CallTimedOut),
            ],
            HostCall::Spawn => &[
                (1, CallError::NodeDoesNotExist),
                (2, CallError::ModuleDoesNotExist),
                (3, CallError::InvalidArgumentType),
                (4, CallError::PermissionDenied),
                (TIMEOUT, CallError::NodeConnectionError),
            ],
            HostCall::CompileModule => &[
                (1, CallError::ModuleDoesNotExist),
                (2, CallError::PermissionDenied),
            ],
            HostCall::CreateConfig => &[(1, CallError::PermissionDenied)],
            HostCall::ConfigAccess => &[
                (1, CallError::ResourceDoesNotExist),
                (2, CallError::InvalidArgument),
            ],
        }
    }

    /// Decode a status returned by this call
    pub fn decode(self, code: u32) -> Result<(), CallError> {
        if code == SUCCESS {
            return Ok(());
        }
        let error = self
            .table()
            .iter()
            .find(|(c, _)| *c == code)
            .map(|(_, e)| *e)
            .unwrap_or(CallError::Unknown(code));
        Err(error)
    }

    /// Encode an error for this call.
    ///
    /// Returns `None` when the error is not part of this call's contract.
    pub fn encode(self, error: CallError) -> Option<u32> {
        if let CallError::Unknown(code) = error {
            return Some(code);
        }
        self.table()
            .iter()
            .find(|(_, e)| *e == error)
            .map(|(c, _)| *c)
    }
}

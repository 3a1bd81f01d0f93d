//! # Tessera Shared Types
//!
//! Types shared by every crate in the workspace and by callers on the far
//! side of the host boundary.
//!
//! - **Typed identifiers**: `ProcessId`, `NodeId`, `ResourceId`, `TimerId`, `Tag`
//! - **Status codes**: per-call code tables and the error-kind taxonomy
//! - **Spawn arguments**: fixed-width integer parameters and their wire records

pub mod common;
pub mod params;
pub mod status;

pub use common::errors::{ParamError, ValidationError};
pub use common::identifiers::{NodeId, ProcessId, ResourceId, Tag, TimerId};
pub use params::{decode_params, encode_params, Param, Value, ValueType, PARAM_RECORD_LEN};
pub use status::{CallError, ErrorKind, HostCall, SUCCESS, TIMEOUT};

//! Error types for identifier validation and spawn-argument decoding

use thiserror::Error;

/// Errors that can occur during typed ID validation
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    /// ID value is null/zero when non-null required
    #[error("ID cannot be null/zero")]
    NullId,
}

/// Errors raised while building or decoding spawn arguments
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParamError {
    /// Argument is not a fixed-width integer
    #[error("params[{index}] = {type_name}, expected integer")]
    InvalidArgumentType {
        index: usize,
        type_name: &'static str,
    },

    /// Encoded block is not a whole number of records
    #[error("parameter block of {len} bytes is not a multiple of {record_len}")]
    Misaligned { len: usize, record_len: usize },

    /// Record carries a value type byte we do not know
    #[error("params[{index}] has unsupported value type 0x{type_byte:02x}")]
    UnsupportedValueType { index: usize, type_byte: u8 },
}

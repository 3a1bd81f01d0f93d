//! Spawn Arguments
//!
//! Entry points receive a sequence of integer arguments. Callers may pass any
//! fixed-width signed or unsigned integer (8/16/32/64-bit); on the wire the
//! 8/16/32-bit widths collapse into a 32-bit value and the 64-bit widths
//! into a 64-bit value, matching the two integer value types of the guest
//! machine.
//!
//! ## Record Format
//!
//! ```text
//! ┌──────────┬──────────────────────────────────────┐
//! │ type (1) │ value, little endian, zero padded (16)│
//! └──────────┴──────────────────────────────────────┘
//!   0x7F = i32, 0x7E = i64
//! ```

use crate::common::errors::ParamError;
use num_enum::{IntoPrimitive, TryFromPrimitive};
use std::any::Any;

/// Size in bytes of one encoded argument
pub const PARAM_RECORD_LEN: usize = 17;

/// Guest value type byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum ValueType {
    I32 = 0x7F,
    I64 = 0x7E,
}

/// Caller-side argument, keeping the width the caller used
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Param {
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
}

/// Argument as seen by the entry point
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Value {
    I32(i32),
    I64(i64),
}

impl Param {
    /// Convert a dynamically typed value into a parameter.
    ///
    /// Only fixed-width integers are accepted; anything else (floats,
    /// strings, 128-bit integers) is rejected with `InvalidArgumentType`.
    pub fn from_any(index: usize, value: &dyn Any, type_name: &'static str) -> Result<Self, ParamError> {
        macro_rules! try_downcast {
            ($($ty:ty => $variant:ident),* $(,)?) => {
                $(
                    if let Some(v) = value.downcast_ref::<$ty>() {
                        return Ok(Param::$variant(*v));
                    }
                )*
            };
        }

        try_downcast!(
            i8 => I8, i16 => I16, i32 => I32, i64 => I64,
            u8 => U8, u16 => U16, u32 => U32, u64 => U64,
        );

        if let Some(v) = value.downcast_ref::<isize>() {
            return Ok(Param::I64(*v as i64));
        }
        if let Some(v) = value.downcast_ref::<usize>() {
            return Ok(Param::U64(*v as u64));
        }

        Err(ParamError::InvalidArgumentType { index, type_name })
    }

    /// Wire value type for this width
    pub fn value_type(&self) -> ValueType {
        match self {
            Param::I64(_) | Param::U64(_) => ValueType::I64,
            _ => ValueType::I32,
        }
    }

    /// Collapse to the guest value the entry point will observe
    pub fn to_value(self) -> Value {
        match self {
            Param::I8(v) => Value::I32(v as i32),
            Param::I16(v) => Value::I32(v as i32),
            Param::I32(v) => Value::I32(v),
            Param::U8(v) => Value::I32(v as i32),
            Param::U16(v) => Value::I32(v as i32),
            Param::U32(v) => Value::I32(v as i32),
            Param::I64(v) => Value::I64(v),
            Param::U64(v) => Value::I64(v as i64),
        }
    }
}

macro_rules! impl_param_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Param {
                fn from(v: $ty) -> Self {
                    Param::$variant(v)
                }
            }
        )*
    };
}

impl_param_from!(
    i8 => I8, i16 => I16, i32 => I32, i64 => I64,
    u8 => U8, u16 => U16, u32 => U32, u64 => U64,
);

impl Value {
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::I32(_) => ValueType::I32,
            Value::I64(_) => ValueType::I64,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::I32(v) => Some(*v),
            Value::I64(_) => None,
        }
    }

    /// 64-bit view, sign-extending 32-bit values
    pub fn as_i64(&self) -> i64 {
        match self {
            Value::I32(v) => *v as i64,
            Value::I64(v) => *v,
        }
    }
}

/// Encode arguments into the flat record block passed to `spawn`
pub fn encode_params(params: &[Param]) -> Vec<u8> {
    let mut out = Vec::with_capacity(params.len() * PARAM_RECORD_LEN);
    for param in params {
        let mut record = [0u8; PARAM_RECORD_LEN];
        record[0] = param.value_type().into();
        match param.to_value() {
            Value::I32(v) => record[1..5].copy_from_slice(&v.to_le_bytes()),
            Value::I64(v) => record[1..9].copy_from_slice(&v.to_le_bytes()),
        }
        out.extend_from_slice(&record);
    }
    out
}

/// Decode a record block back into guest values
pub fn decode_params(bytes: &[u8]) -> Result<Vec<Value>, ParamError> {
    if bytes.len() % PARAM_RECORD_LEN != 0 {
        return Err(ParamError::Misaligned {
            len: bytes.len(),
            record_len: PARAM_RECORD_LEN,
        });
    }

    bytes
        .chunks_exact(PARAM_RECORD_LEN)
        .enumerate()
        .map(|(index, record)| {
            let value_type = ValueType::try_from(record[0]).map_err(|_| {
                ParamError::UnsupportedValueType {
                    index,
                    type_byte: record[0],
                }
            })?;
            let mut raw = [0u8; 8];
            raw.copy_from_slice(&record[1..9]);
            Ok(match value_type {
                ValueType::I32 => {
                    let mut low = [0u8; 4];
                    low.copy_from_slice(&raw[..4]);
                    Value::I32(i32::from_le_bytes(low))
                }
                ValueType::I64 => Value::I64(i64::from_le_bytes(raw)),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_widths_collapse_to_guest_values() {
        assert_eq!(Param::from(-3i8).to_value(), Value::I32(-3));
        assert_eq!(Param::from(u16::MAX).to_value(), Value::I32(65535));
        assert_eq!(Param::from(u32::MAX).to_value(), Value::I32(-1));
        assert_eq!(Param::from(7u64).to_value(), Value::I64(7));
    }

    #[test]
    fn test_block_decodes_in_order() {
        let params = [Param::from(1i32), Param::from(-2i64), Param::from(300u16)];
        let block = encode_params(&params);
        assert_eq!(block.len(), 3 * PARAM_RECORD_LEN);
        assert_eq!(block[0], 0x7F);
        assert_eq!(block[PARAM_RECORD_LEN], 0x7E);

        let values = decode_params(&block).unwrap();
        assert_eq!(values, vec![Value::I32(1), Value::I64(-2), Value::I32(300)]);
    }

    #[test]
    fn test_non_integer_shapes_rejected() {
        let err = Param::from_any(2, &1.5f64, "f64").unwrap_err();
        assert_eq!(
            err,
            ParamError::InvalidArgumentType { index: 2, type_name: "f64" }
        );
        assert!(Param::from_any(0, &"text", "&str").is_err());
        assert!(Param::from_any(0, &1u128, "u128").is_err());
        assert_eq!(Param::from_any(0, &9u8, "u8").unwrap(), Param::U8(9));
    }

    #[test]
    fn test_malformed_blocks() {
        assert!(matches!(
            decode_params(&[0x7F; 5]),
            Err(ParamError::Misaligned { len: 5, .. })
        ));

        let mut block = encode_params(&[Param::from(1i32)]);
        block[0] = 0x7C; // f64 value type
        assert!(matches!(
            decode_params(&block),
            Err(ParamError::UnsupportedValueType { index: 0, type_byte: 0x7C })
        ));
    }
}

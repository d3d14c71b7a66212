//! Compile-time constant values.

use std::fmt;

use super::ty::PrimitiveType;

/// A constant folded by the binder.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConstantValue {
    Null,
    Boolean(bool),
    Char(u16),
    Int(i64),
    UInt(u64),
    Float32(f32),
    Float64(f64),
}

impl ConstantValue {
    /// The value as a raw 64-bit integer pattern, for integral layouts.
    fn integral_bits(&self) -> Option<u64> {
        match *self {
            ConstantValue::Boolean(b) => Some(u64::from(b)),
            ConstantValue::Char(c) => Some(u64::from(c)),
            ConstantValue::Int(v) => Some(v as u64),
            ConstantValue::UInt(v) => Some(v),
            ConstantValue::Null => Some(0),
            ConstantValue::Float32(_) | ConstantValue::Float64(_) => None,
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match *self {
            ConstantValue::Float32(v) => Some(f64::from(v)),
            ConstantValue::Float64(v) => Some(v),
            ConstantValue::Int(v) => Some(v as f64),
            ConstantValue::UInt(v) => Some(v as f64),
            _ => None,
        }
    }

    /// Append the little-endian layout of this constant as `prim`.
    ///
    /// Returns `false` (appending nothing) when the value has no layout at
    /// that type, including the address-sized integers.
    pub fn write_le_bytes(&self, prim: PrimitiveType, out: &mut Vec<u8>) -> bool {
        match prim {
            PrimitiveType::Float32 => match self.as_f64() {
                Some(v) => {
                    out.extend_from_slice(&(v as f32).to_le_bytes());
                    true
                }
                None => false,
            },
            PrimitiveType::Float64 => match self.as_f64() {
                Some(v) => {
                    out.extend_from_slice(&v.to_le_bytes());
                    true
                }
                None => false,
            },
            _ => {
                let (Some(bits), Some(size)) = (self.integral_bits(), prim.size_in_bytes()) else {
                    return false;
                };
                out.extend_from_slice(&bits.to_le_bytes()[..size as usize]);
                true
            }
        }
    }

    /// The value as an `i32` immediate, when it fits the 32-bit load form.
    pub fn as_i32_immediate(&self) -> Option<i32> {
        match *self {
            ConstantValue::Boolean(b) => Some(i32::from(b)),
            ConstantValue::Char(c) => Some(i32::from(c)),
            ConstantValue::Int(v) => i32::try_from(v).ok(),
            // Unsigned 32-bit values reuse the signed immediate bit pattern.
            ConstantValue::UInt(v) => u32::try_from(v).ok().map(|v| v as i32),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ConstantValue::Null)
    }
}

impl fmt::Display for ConstantValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstantValue::Null => write!(f, "null"),
            ConstantValue::Boolean(b) => write!(f, "{}", b),
            ConstantValue::Char(c) => write!(f, "'\\u{{{:04x}}}'", c),
            ConstantValue::Int(v) => write!(f, "{}", v),
            ConstantValue::UInt(v) => write!(f, "{}u", v),
            ConstantValue::Float32(v) => write!(f, "{}f", v),
            ConstantValue::Float64(v) => write!(f, "{}d", v),
        }
    }
}

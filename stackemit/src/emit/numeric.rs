//! Numeric conversion selection.
//!
//! Maps a (source, target, checked) triple over primitive layouts to the
//! `conv` instructions that reach the target. Values narrower than 32 bits
//! are already widened on the evaluation stack, so several pairs need no
//! instruction at all.

use crate::model::PrimitiveType;

use super::builder::{ConvTarget, Instruction, Overflow};

use PrimitiveType::*;

/// A `conv` whose overflow check, if any, respects the source signedness.
fn conv(target: ConvTarget, checked: bool, from_unsigned: bool) -> Instruction {
    let overflow = match (checked, from_unsigned) {
        (false, _) => Overflow::Unchecked,
        (true, false) => Overflow::Checked,
        (true, true) => Overflow::CheckedUnsigned,
    };
    Instruction::Conv(target, overflow)
}

/// A `conv` that is only needed when overflow is checked.
fn checked_only(target: ConvTarget, checked: bool, overflow: Overflow) -> Vec<Instruction> {
    if checked {
        vec![Instruction::Conv(target, overflow)]
    } else {
        Vec::new()
    }
}

/// Either the checked form or a plain `conv`, each given explicitly.
fn pick(checked: bool, when_checked: (ConvTarget, Overflow), unchecked: ConvTarget) -> Vec<Instruction> {
    if checked {
        vec![Instruction::Conv(when_checked.0, when_checked.1)]
    } else {
        vec![Instruction::Conv(unchecked, Overflow::Unchecked)]
    }
}

/// Instructions converting a `from` value on the stack to `to`.
///
/// Returns `None` when either side is not numeric.
pub fn numeric_conversion(from: PrimitiveType, to: PrimitiveType, checked: bool) -> Option<Vec<Instruction>> {
    if !from.is_numeric() || !to.is_numeric() {
        return None;
    }
    let un = from.is_unsigned();

    let steps = match to {
        Int8 => match from {
            Int8 => vec![],
            _ => vec![conv(ConvTarget::I1, checked, un)],
        },
        UInt8 => match from {
            UInt8 => vec![],
            _ => vec![conv(ConvTarget::U1, checked, un)],
        },
        Int16 => match from {
            Int8 | UInt8 | Int16 => vec![],
            _ => vec![conv(ConvTarget::I2, checked, un)],
        },
        Char | UInt16 => match from {
            UInt8 | UInt16 | Char => vec![],
            _ => vec![conv(ConvTarget::U2, checked, un)],
        },
        Int32 => match from {
            Int8 | UInt8 | Int16 | UInt16 | Int32 | Char => vec![],
            UInt32 => checked_only(ConvTarget::I4, checked, Overflow::CheckedUnsigned),
            _ => vec![conv(ConvTarget::I4, checked, un)],
        },
        UInt32 => match from {
            UInt8 | UInt16 | UInt32 | Char => vec![],
            Int8 | Int16 | Int32 => checked_only(ConvTarget::U4, checked, Overflow::Checked),
            _ => vec![conv(ConvTarget::U4, checked, un)],
        },
        IntPtr => match from {
            IntPtr => vec![],
            Int8 | Int16 | Int32 => vec![conv(ConvTarget::I, false, false)],
            UInt8 | UInt16 | Char => vec![conv(ConvTarget::U, false, false)],
            UInt32 => pick(checked, (ConvTarget::I, Overflow::CheckedUnsigned), ConvTarget::U),
            UIntPtr => checked_only(ConvTarget::I, checked, Overflow::CheckedUnsigned),
            UInt64 => pick(checked, (ConvTarget::I, Overflow::CheckedUnsigned), ConvTarget::I),
            _ => vec![conv(ConvTarget::I, checked, false)],
        },
        UIntPtr => match from {
            UIntPtr => vec![],
            UInt8 | UInt16 | UInt32 | Char => vec![conv(ConvTarget::U, false, false)],
            IntPtr => checked_only(ConvTarget::U, checked, Overflow::Checked),
            // Unchecked narrow signed sources sign-extend.
            Int8 | Int16 | Int32 => pick(checked, (ConvTarget::U, Overflow::Checked), ConvTarget::I),
            UInt64 => pick(checked, (ConvTarget::U, Overflow::CheckedUnsigned), ConvTarget::U),
            _ => vec![conv(ConvTarget::U, checked, false)],
        },
        Int64 => match from {
            Int64 => vec![],
            Int8 | Int16 | Int32 | IntPtr => vec![conv(ConvTarget::I8, false, false)],
            UInt8 | UInt16 | UInt32 | Char => vec![conv(ConvTarget::U8, false, false)],
            UIntPtr => pick(checked, (ConvTarget::I8, Overflow::CheckedUnsigned), ConvTarget::U8),
            UInt64 => checked_only(ConvTarget::I8, checked, Overflow::CheckedUnsigned),
            _ => vec![conv(ConvTarget::I8, checked, false)],
        },
        UInt64 => match from {
            UInt64 => vec![],
            UInt8 | UInt16 | UInt32 | UIntPtr | Char => vec![conv(ConvTarget::U8, false, false)],
            Int8 | Int16 | Int32 | IntPtr => {
                pick(checked, (ConvTarget::U8, Overflow::Checked), ConvTarget::I8)
            }
            Int64 => checked_only(ConvTarget::U8, checked, Overflow::Checked),
            _ => vec![conv(ConvTarget::U8, checked, false)],
        },
        Float32 | Float64 => {
            let mut steps = Vec::with_capacity(2);
            if matches!(from, UInt32 | UInt64 | UIntPtr) {
                steps.push(Instruction::Conv(ConvTarget::RUn, Overflow::Unchecked));
            }
            let target = if to == Float32 { ConvTarget::R4 } else { ConvTarget::R8 };
            steps.push(Instruction::Conv(target, Overflow::Unchecked));
            steps
        }
        Boolean => return None,
    };
    Some(steps)
}

//! Instruction set and the per-method instruction stream builder.

use std::fmt;

use crate::metadata::BlobToken;
use crate::model::{FieldRef, MethodRef, PrimitiveType, TypeKind, TypeRef};

use super::slots::LocalSlot;

/// A branch target within one method body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LabelId(pub u32);

impl fmt::Display for LabelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.0)
    }
}

/// Target representation of a `conv` instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConvTarget {
    I1,
    I2,
    I4,
    I8,
    U1,
    U2,
    U4,
    U8,
    /// Address-sized signed.
    I,
    /// Address-sized unsigned.
    U,
    R4,
    R8,
    /// Reinterpret an unsigned integer as floating point.
    RUn,
}

/// Overflow behaviour of a `conv` instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Overflow {
    Unchecked,
    /// Throws when the signed source does not fit.
    Checked,
    /// Throws when the source, read as unsigned, does not fit.
    CheckedUnsigned,
}

/// Width of an indirect load or store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IndirectKind {
    I1,
    U1,
    I2,
    U2,
    I4,
    U4,
    I8,
    I,
    R4,
    R8,
    /// An object reference.
    Ref,
    /// Any other value type, copied whole.
    Obj(TypeRef),
}

impl IndirectKind {
    pub fn of(ty: &TypeRef) -> Self {
        if let Some(prim) = ty.primitive() {
            return match prim {
                PrimitiveType::Int8 => IndirectKind::I1,
                PrimitiveType::Boolean | PrimitiveType::UInt8 => IndirectKind::U1,
                PrimitiveType::Int16 => IndirectKind::I2,
                PrimitiveType::Char | PrimitiveType::UInt16 => IndirectKind::U2,
                PrimitiveType::Int32 => IndirectKind::I4,
                PrimitiveType::UInt32 => IndirectKind::U4,
                PrimitiveType::Int64 | PrimitiveType::UInt64 => IndirectKind::I8,
                PrimitiveType::IntPtr | PrimitiveType::UIntPtr => IndirectKind::I,
                PrimitiveType::Float32 => IndirectKind::R4,
                PrimitiveType::Float64 => IndirectKind::R8,
            };
        }
        match ty.kind() {
            TypeKind::Pointer { .. } => IndirectKind::I,
            _ if ty.is_verifier_reference() => IndirectKind::Ref,
            _ => IndirectKind::Obj(ty.clone()),
        }
    }

    /// Store form for `ty`. Stores have no unsigned variants.
    pub fn store_of(ty: &TypeRef) -> Self {
        match Self::of(ty) {
            IndirectKind::U1 => IndirectKind::I1,
            IndirectKind::U2 => IndirectKind::I2,
            IndirectKind::U4 => IndirectKind::I4,
            kind => kind,
        }
    }
}

/// One instruction of the target stack machine.
#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    Dup,
    Pop,
    LdcI4(i32),
    LdcI8(i64),
    LdcR4(f32),
    LdcR8(f64),
    Ldnull,
    Ldarg(u16),
    Ldarga(u16),
    Starg(u16),
    Ldloc(LocalSlot),
    Ldloca(LocalSlot),
    Stloc(LocalSlot),
    Ldfld(FieldRef),
    Ldflda(FieldRef),
    Stfld(FieldRef),
    Ldsfld(FieldRef),
    Ldsflda(FieldRef),
    Stsfld(FieldRef),
    /// Address of an embedded data blob.
    LdsfldaBlob(BlobToken),
    /// Runtime handle of an embedded data blob.
    LdtokenBlob(BlobToken),
    Ldelem(TypeRef),
    /// Element address; `readonly` skips the covariance type check.
    Ldelema { ty: TypeRef, readonly: bool },
    Stelem(TypeRef),
    Ldind(IndirectKind),
    Stind(IndirectKind),
    Initobj(TypeRef),
    Box(TypeRef),
    UnboxAny(TypeRef),
    Castclass(TypeRef),
    Conv(ConvTarget, Overflow),
    Add,
    Mul,
    MulOvfUn,
    /// Prefix on `callvirt` for a receiver of generic type passed by address.
    Constrained(TypeRef),
    Call(MethodRef),
    Callvirt(MethodRef),
    Newobj(MethodRef),
    Ldftn(MethodRef),
    Ldvirtftn(MethodRef),
    Localloc,
    Initblk,
    Cpblk { unaligned: Option<u8> },
    Sizeof(TypeRef),
    Refanyval(TypeRef),
    Throw,
    Br(LabelId),
    Brtrue(LabelId),
    Brfalse(LabelId),
    /// Marks the position of a label; not an instruction at runtime.
    Label(LabelId),
}

impl Instruction {
    /// Net change in evaluation stack depth.
    pub fn stack_delta(&self) -> i32 {
        match self {
            Instruction::Dup
            | Instruction::LdcI4(_)
            | Instruction::LdcI8(_)
            | Instruction::LdcR4(_)
            | Instruction::LdcR8(_)
            | Instruction::Ldnull
            | Instruction::Ldarg(_)
            | Instruction::Ldarga(_)
            | Instruction::Ldloc(_)
            | Instruction::Ldloca(_)
            | Instruction::Ldsfld(_)
            | Instruction::Ldsflda(_)
            | Instruction::LdsfldaBlob(_)
            | Instruction::LdtokenBlob(_)
            | Instruction::Ldftn(_)
            | Instruction::Sizeof(_) => 1,

            Instruction::Ldfld(_)
            | Instruction::Ldflda(_)
            | Instruction::Ldind(_)
            | Instruction::Box(_)
            | Instruction::UnboxAny(_)
            | Instruction::Castclass(_)
            | Instruction::Conv(..)
            | Instruction::Ldvirtftn(_)
            | Instruction::Localloc
            | Instruction::Refanyval(_)
            | Instruction::Constrained(_)
            | Instruction::Br(_)
            | Instruction::Label(_) => 0,

            Instruction::Pop
            | Instruction::Starg(_)
            | Instruction::Stloc(_)
            | Instruction::Stsfld(_)
            | Instruction::Ldelem(_)
            | Instruction::Ldelema { .. }
            | Instruction::Initobj(_)
            | Instruction::Add
            | Instruction::Mul
            | Instruction::MulOvfUn
            | Instruction::Throw
            | Instruction::Brtrue(_)
            | Instruction::Brfalse(_) => -1,

            Instruction::Stfld(_) | Instruction::Stind(_) => -2,

            Instruction::Stelem(_) | Instruction::Initblk | Instruction::Cpblk { .. } => -3,

            Instruction::Call(method) | Instruction::Callvirt(method) => {
                i32::from(method.returns_value()) - method.stack_inputs()
            }
            Instruction::Newobj(ctor) => 1 - ctor.parameters.len() as i32,
        }
    }
}

impl fmt::Display for ConvTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConvTarget::I1 => "i1",
            ConvTarget::I2 => "i2",
            ConvTarget::I4 => "i4",
            ConvTarget::I8 => "i8",
            ConvTarget::U1 => "u1",
            ConvTarget::U2 => "u2",
            ConvTarget::U4 => "u4",
            ConvTarget::U8 => "u8",
            ConvTarget::I => "i",
            ConvTarget::U => "u",
            ConvTarget::R4 => "r4",
            ConvTarget::R8 => "r8",
            ConvTarget::RUn => "r.un",
        };
        f.write_str(name)
    }
}

impl fmt::Display for IndirectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndirectKind::I1 => f.write_str("i1"),
            IndirectKind::U1 => f.write_str("u1"),
            IndirectKind::I2 => f.write_str("i2"),
            IndirectKind::U2 => f.write_str("u2"),
            IndirectKind::I4 => f.write_str("i4"),
            IndirectKind::U4 => f.write_str("u4"),
            IndirectKind::I8 => f.write_str("i8"),
            IndirectKind::I => f.write_str("i"),
            IndirectKind::R4 => f.write_str("r4"),
            IndirectKind::R8 => f.write_str("r8"),
            IndirectKind::Ref => f.write_str("ref"),
            IndirectKind::Obj(ty) => write!(f, "obj {}", ty),
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::Dup => write!(f, "dup"),
            Instruction::Pop => write!(f, "pop"),
            Instruction::LdcI4(v) => write!(f, "ldc.i4 {}", v),
            Instruction::LdcI8(v) => write!(f, "ldc.i8 {}", v),
            Instruction::LdcR4(v) => write!(f, "ldc.r4 {}", v),
            Instruction::LdcR8(v) => write!(f, "ldc.r8 {}", v),
            Instruction::Ldnull => write!(f, "ldnull"),
            Instruction::Ldarg(i) => write!(f, "ldarg {}", i),
            Instruction::Ldarga(i) => write!(f, "ldarga {}", i),
            Instruction::Starg(i) => write!(f, "starg {}", i),
            Instruction::Ldloc(s) => write!(f, "ldloc {}", s),
            Instruction::Ldloca(s) => write!(f, "ldloca {}", s),
            Instruction::Stloc(s) => write!(f, "stloc {}", s),
            Instruction::Ldfld(fld) => write!(f, "ldfld {}", fld),
            Instruction::Ldflda(fld) => write!(f, "ldflda {}", fld),
            Instruction::Stfld(fld) => write!(f, "stfld {}", fld),
            Instruction::Ldsfld(fld) => write!(f, "ldsfld {}", fld),
            Instruction::Ldsflda(fld) => write!(f, "ldsflda {}", fld),
            Instruction::Stsfld(fld) => write!(f, "stsfld {}", fld),
            Instruction::LdsfldaBlob(blob) => write!(f, "ldsflda {}", blob),
            Instruction::LdtokenBlob(blob) => write!(f, "ldtoken {}", blob),
            Instruction::Ldelem(ty) => write!(f, "ldelem {}", ty),
            Instruction::Ldelema { ty, readonly: true } => write!(f, "readonly. ldelema {}", ty),
            Instruction::Ldelema { ty, readonly: false } => write!(f, "ldelema {}", ty),
            Instruction::Stelem(ty) => write!(f, "stelem {}", ty),
            Instruction::Ldind(IndirectKind::Obj(ty)) => write!(f, "ldobj {}", ty),
            Instruction::Ldind(kind) => write!(f, "ldind.{}", kind),
            Instruction::Stind(IndirectKind::Obj(ty)) => write!(f, "stobj {}", ty),
            Instruction::Stind(kind) => write!(f, "stind.{}", kind),
            Instruction::Initobj(ty) => write!(f, "initobj {}", ty),
            Instruction::Box(ty) => write!(f, "box {}", ty),
            Instruction::UnboxAny(ty) => write!(f, "unbox.any {}", ty),
            Instruction::Castclass(ty) => write!(f, "castclass {}", ty),
            Instruction::Conv(target, Overflow::Unchecked) => write!(f, "conv.{}", target),
            Instruction::Conv(target, Overflow::Checked) => write!(f, "conv.ovf.{}", target),
            Instruction::Conv(target, Overflow::CheckedUnsigned) => {
                write!(f, "conv.ovf.{}.un", target)
            }
            Instruction::Add => write!(f, "add"),
            Instruction::Mul => write!(f, "mul"),
            Instruction::MulOvfUn => write!(f, "mul.ovf.un"),
            Instruction::Constrained(ty) => write!(f, "constrained. {}", ty),
            Instruction::Call(m) => write!(f, "call {}", m),
            Instruction::Callvirt(m) => write!(f, "callvirt {}", m),
            Instruction::Newobj(m) => write!(f, "newobj {}", m),
            Instruction::Ldftn(m) => write!(f, "ldftn {}", m),
            Instruction::Ldvirtftn(m) => write!(f, "ldvirtftn {}", m),
            Instruction::Localloc => write!(f, "localloc"),
            Instruction::Initblk => write!(f, "initblk"),
            Instruction::Cpblk { unaligned: Some(n) } => write!(f, "unaligned. {} cpblk", n),
            Instruction::Cpblk { unaligned: None } => write!(f, "cpblk"),
            Instruction::Sizeof(ty) => write!(f, "sizeof {}", ty),
            Instruction::Refanyval(ty) => write!(f, "refanyval {}", ty),
            Instruction::Throw => write!(f, "throw"),
            Instruction::Br(l) => write!(f, "br {}", l),
            Instruction::Brtrue(l) => write!(f, "brtrue {}", l),
            Instruction::Brfalse(l) => write!(f, "brfalse {}", l),
            Instruction::Label(l) => write!(f, "{}:", l),
        }
    }
}

/// Ordered instruction stream for one method body, with stack tracking.
#[derive(Debug, Default)]
pub struct InstructionBuilder {
    instructions: Vec<Instruction>,
    stack_depth: i32,
    max_stack: i32,
    next_label: u32,
}

impl InstructionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an instruction.
    pub fn emit(&mut self, instruction: Instruction) {
        self.adjust_stack(instruction.stack_delta());
        self.instructions.push(instruction);
    }

    /// Account for stack effects the linear stream does not show, such as
    /// the value left by the branch that jumped over the current one.
    pub fn adjust_stack(&mut self, delta: i32) {
        self.stack_depth += delta;
        self.max_stack = self.max_stack.max(self.stack_depth);
    }

    pub fn emit_int_constant(&mut self, value: i32) {
        self.emit(Instruction::LdcI4(value));
    }

    pub fn define_label(&mut self) -> LabelId {
        let label = LabelId(self.next_label);
        self.next_label += 1;
        label
    }

    pub fn mark_label(&mut self, label: LabelId) {
        self.emit(Instruction::Label(label));
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn into_instructions(self) -> Vec<Instruction> {
        self.instructions
    }

    pub fn stack_depth(&self) -> i32 {
        self.stack_depth
    }

    pub fn max_stack(&self) -> i32 {
        self.max_stack
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// The stream as one instruction per line.
    pub fn listing(&self) -> String {
        self.instructions
            .iter()
            .map(|i| i.to_string())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

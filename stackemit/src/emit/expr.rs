//! Expression emission.

use crate::ice::EmitResult;
use crate::ice_err;
use crate::model::{
    AddressKind, ConstantValue, Expr, ExprKind, FieldRef, LocalRef, PrimitiveType, TypeRef,
};
use crate::span::Span;

use super::builder::{ConvTarget, IndirectKind, Instruction, Overflow};
use super::slots::LocalSlot;
use super::{CodeGenerator, UseKind};

/// Where an assignment stores its value, after the preamble has pushed
/// whatever the store instruction consumes besides the value.
#[derive(Debug)]
enum StoreTarget {
    /// The local lives on the evaluation stack; the value simply stays.
    StackLocal,
    Local(LocalSlot),
    Argument(u16),
    StaticField(FieldRef),
    /// Receiver pushed.
    InstanceField(FieldRef),
    /// Array and index pushed.
    ArrayElement(TypeRef),
    /// Address pushed.
    Indirect(TypeRef),
}

impl StoreTarget {
    /// Whether the preamble left operands below the value.
    fn uses_stack(&self) -> bool {
        matches!(
            self,
            StoreTarget::InstanceField(_) | StoreTarget::ArrayElement(_) | StoreTarget::Indirect(_)
        )
    }
}

impl CodeGenerator {
    /// Emit `expr`, leaving its value on the stack when `used`.
    pub fn emit_expression(&mut self, expr: &Expr, used: bool) -> EmitResult<()> {
        if let Some(value) = expr.constant {
            if used {
                self.emit_constant(value, &expr.ty, expr.span)?;
            }
            return Ok(());
        }

        match &expr.kind {
            ExprKind::Literal => {
                return Err(ice_err!(expr.span, "literal without a constant value"; "type" => &expr.ty));
            }
            ExprKind::ArrayElementAccess { array, index } => {
                self.emit_expression(array, true)?;
                self.emit_expression(index, true)?;
                self.builder.emit(Instruction::Ldelem(expr.ty.clone()));
                self.emit_pop_if_unused(used);
            }
            ExprKind::PointerDereference { operand } => {
                self.emit_expression(operand, true)?;
                self.emit_load_indirect(&expr.ty);
                self.emit_pop_if_unused(used);
            }
            ExprKind::RuntimeRefOperator { operand } => {
                self.emit_expression(operand, true)?;
                self.builder.emit(Instruction::Refanyval(expr.ty.clone()));
                self.emit_load_indirect(&expr.ty);
                self.emit_pop_if_unused(used);
            }
            ExprKind::ThisReference => {
                if used {
                    self.builder.emit(Instruction::Ldarg(0));
                    if expr.ty.is_value_type() {
                        self.emit_load_indirect(&expr.ty);
                    }
                }
            }
            ExprKind::ThrowMarker { operand } => self.emit_throw(operand, used)?,
            ExprKind::ParameterReference { parameter } => {
                if used {
                    self.builder.emit(Instruction::Ldarg(self.method.arg_index(parameter)));
                    if parameter.ref_kind.is_by_ref() {
                        self.emit_load_indirect(&parameter.ty);
                    }
                }
            }
            ExprKind::LocalReference { local } => {
                if used {
                    self.emit_local_load(local);
                }
            }
            ExprKind::Call(call) => self.emit_call(call, UseKind::from_used(used), expr.span)?,
            ExprKind::DuplicatedStackValue { ref_kind } => {
                if used || ref_kind.is_by_ref() {
                    self.builder.emit(Instruction::Dup);
                    if ref_kind.is_by_ref() {
                        // Read even when unused so a null reference faults.
                        self.emit_load_indirect(&expr.ty);
                    }
                    self.emit_pop_if_unused(used);
                }
            }
            ExprKind::FieldAccess { receiver, field, .. } => {
                self.emit_field_load(expr, receiver.as_deref(), field, used)?;
            }
            ExprKind::Sequence { locals, side_effects, value } => {
                self.define_sequence_locals(locals);
                for side_effect in side_effects {
                    self.emit_expression(side_effect, false)?;
                }
                self.emit_expression(value, used)?;
            }
            ExprKind::Assignment { left, right, is_ref } => {
                self.emit_assignment(expr, left, right, *is_ref, UseKind::from_used(used))?;
            }
            // Already on the stack.
            ExprKind::ConditionalReceiver { .. } => self.emit_pop_if_unused(used),
            ExprKind::ComplexConditionalReceiver {
                value_type_receiver,
                reference_type_receiver,
            } => {
                let value_type_label = self.builder.define_label();
                let done_label = self.builder.define_label();

                self.emit_boxed_default(&expr.ty);
                self.builder.emit(Instruction::Brtrue(value_type_label));
                self.emit_expression(reference_type_receiver, used)?;
                self.builder.emit(Instruction::Br(done_label));
                if used {
                    self.builder.adjust_stack(-1);
                }
                self.builder.mark_label(value_type_label);
                self.emit_expression(value_type_receiver, used)?;
                self.builder.mark_label(done_label);
            }
            ExprKind::ConditionalOperator { condition, consequence, alternative, .. } => {
                let consequence_label = self.builder.define_label();
                let done_label = self.builder.define_label();

                self.emit_expression(condition, true)?;
                self.builder.emit(Instruction::Brtrue(consequence_label));
                self.emit_expression(alternative, used)?;
                self.builder.emit(Instruction::Br(done_label));
                if used {
                    self.builder.adjust_stack(-1);
                }
                self.builder.mark_label(consequence_label);
                self.emit_expression(consequence, used)?;
                self.builder.mark_label(done_label);
            }
            ExprKind::Conversion(conversion) => {
                self.emit_conversion_expression(expr, conversion, used)?;
            }
            ExprKind::DelegateCreation { receiver, method, non_virtual } => {
                self.emit_delegate_creation(expr, receiver.as_deref(), method, *non_virtual, used)?;
            }
            ExprKind::StackAllocArray { element_type, count, initializers } => {
                self.emit_stackalloc(element_type, count, initializers.as_deref(), used, expr.span)?;
            }
        }
        Ok(())
    }

    pub(crate) fn emit_throw(&mut self, operand: &Expr, used: bool) -> EmitResult<()> {
        self.emit_expression(operand, true)?;
        self.builder.emit(Instruction::Throw);
        if used {
            // Typed as producing a value for the join that follows.
            self.builder.adjust_stack(1);
        }
        Ok(())
    }

    pub(crate) fn define_sequence_locals(&mut self, locals: &[LocalRef]) {
        for local in locals {
            if !self.is_stack_local(local.id) {
                self.slots.define_local(local);
            }
        }
    }

    fn emit_local_load(&mut self, local: &LocalRef) {
        if !self.is_stack_local(local.id) {
            let slot = self.slots.define_local(local);
            self.builder.emit(Instruction::Ldloc(slot));
        }
        if local.ref_kind.is_by_ref() {
            self.emit_load_indirect(&local.ty);
        }
    }

    fn emit_field_load(
        &mut self,
        expr: &Expr,
        receiver: Option<&Expr>,
        field: &FieldRef,
        used: bool,
    ) -> EmitResult<()> {
        if field.is_static {
            if used {
                self.builder.emit(Instruction::Ldsfld(field.clone()));
                if field.ref_kind.is_by_ref() {
                    self.emit_load_indirect(&field.ty);
                }
            }
            return Ok(());
        }

        let Some(receiver) = receiver else {
            return Err(ice_err!(expr.span, "instance field access without receiver";
                                "field" => field));
        };

        // Loading from a value-type receiver cannot fail.
        if !used && !receiver.ty.is_verifier_reference() {
            return self.emit_expression(receiver, false);
        }

        let temp = if !receiver.ty.is_verifier_reference()
            && self.has_home(receiver, AddressKind::ReadOnly)
        {
            self.emit_address(receiver, AddressKind::ReadOnly)?
        } else {
            self.emit_expression(receiver, true)?;
            None
        };
        self.builder.emit(Instruction::Ldfld(field.clone()));
        if let Some(temp) = temp {
            self.slots.free_temp(temp);
        }
        if field.ref_kind.is_by_ref() {
            self.emit_load_indirect(&field.ty);
        }
        self.emit_pop_if_unused(used);
        Ok(())
    }

    fn emit_constant(&mut self, value: ConstantValue, ty: &TypeRef, span: Span) -> EmitResult<()> {
        let bits = match value {
            ConstantValue::Null => {
                if ty.is_pointer() {
                    self.builder.emit_int_constant(0);
                    self.builder.emit(Instruction::Conv(ConvTarget::U, Overflow::Unchecked));
                } else {
                    self.builder.emit(Instruction::Ldnull);
                }
                return Ok(());
            }
            ConstantValue::Float32(v) => {
                self.builder.emit(Instruction::LdcR4(v));
                return Ok(());
            }
            ConstantValue::Float64(v) => {
                self.builder.emit(Instruction::LdcR8(v));
                return Ok(());
            }
            ConstantValue::Boolean(b) => i64::from(b),
            ConstantValue::Char(c) => i64::from(c),
            ConstantValue::Int(v) => v,
            ConstantValue::UInt(v) => v as i64,
        };

        match ty.primitive().unwrap_or(PrimitiveType::Int32) {
            PrimitiveType::Int64 | PrimitiveType::UInt64 => {
                self.builder.emit(Instruction::LdcI8(bits));
            }
            prim @ (PrimitiveType::IntPtr | PrimitiveType::UIntPtr) => {
                match i32::try_from(bits) {
                    Ok(small) => self.builder.emit_int_constant(small),
                    Err(_) => self.builder.emit(Instruction::LdcI8(bits)),
                }
                let target = if prim == PrimitiveType::IntPtr { ConvTarget::I } else { ConvTarget::U };
                self.builder.emit(Instruction::Conv(target, Overflow::Unchecked));
            }
            PrimitiveType::Float32 => self.builder.emit(Instruction::LdcR4(bits as f32)),
            PrimitiveType::Float64 => self.builder.emit(Instruction::LdcR8(bits as f64)),
            _ => {
                let immediate = value.as_i32_immediate().ok_or_else(|| {
                    ice_err!(span, "constant does not fit a 32-bit immediate";
                             "value" => value,
                             "type" => ty)
                })?;
                self.builder.emit_int_constant(immediate);
            }
        }
        Ok(())
    }

    // ========================================================================
    // Assignment
    // ========================================================================

    /// Emit `left = right` (or `left = ref right`).
    pub(crate) fn emit_assignment(
        &mut self,
        expr: &Expr,
        left: &Expr,
        right: &Expr,
        is_ref: bool,
        use_kind: UseKind,
    ) -> EmitResult<()> {
        if use_kind == UseKind::UsedAsAddress && !is_ref {
            return Err(ice_err!(expr.span, "address of a value assignment"));
        }

        let (target, preamble_temp) = self.emit_assignment_preamble(left, is_ref)?;

        if is_ref {
            // A read-only ref must still alias the storage, never a copy.
            let kind = if left.ref_kind().is_read_only_reference() {
                AddressKind::ReadOnlyStrict
            } else {
                AddressKind::Writable
            };
            // The stored reference may outlive any statement boundary.
            if let Some(temp) = self.emit_address(right, kind)? {
                self.slots.retire_temp(temp);
            }
        } else {
            self.emit_expression(right, true)?;
        }

        let duplicate = self.emit_assignment_duplication(&target, &left.ty, is_ref, use_kind);
        self.emit_store(target);

        if let Some(temp) = duplicate {
            self.builder.emit(Instruction::Ldloc(temp));
            self.slots.free_temp(temp);
        }
        if let Some(temp) = preamble_temp {
            self.slots.free_temp(temp);
        }
        if is_ref && use_kind == UseKind::UsedAsValue {
            self.emit_load_indirect(&left.ty);
        }
        Ok(())
    }

    fn emit_assignment_preamble(
        &mut self,
        left: &Expr,
        is_ref: bool,
    ) -> EmitResult<(StoreTarget, Option<LocalSlot>)> {
        let target = match &left.kind {
            ExprKind::LocalReference { local } => {
                let stores_through = local.ref_kind.is_by_ref() && !is_ref;
                if self.is_stack_local(local.id) {
                    if stores_through {
                        StoreTarget::Indirect(local.ty.clone())
                    } else {
                        StoreTarget::StackLocal
                    }
                } else {
                    let slot = self.slots.define_local(local);
                    if stores_through {
                        self.builder.emit(Instruction::Ldloc(slot));
                        StoreTarget::Indirect(local.ty.clone())
                    } else {
                        StoreTarget::Local(slot)
                    }
                }
            }
            ExprKind::ParameterReference { parameter } => {
                let index = self.method.arg_index(parameter);
                if parameter.ref_kind.is_by_ref() && !is_ref {
                    self.builder.emit(Instruction::Ldarg(index));
                    StoreTarget::Indirect(parameter.ty.clone())
                } else {
                    StoreTarget::Argument(index)
                }
            }
            ExprKind::FieldAccess { receiver, field, .. } => {
                let stores_through = field.ref_kind.is_by_ref() && !is_ref;
                let mut temp = None;
                if field.is_static {
                    if stores_through {
                        self.builder.emit(Instruction::Ldsfld(field.clone()));
                    }
                } else {
                    let Some(receiver) = receiver.as_deref() else {
                        return Err(ice_err!(left.span, "instance field store without receiver";
                                            "field" => field));
                    };
                    temp = self.emit_receiver_ref(receiver, AddressKind::Writable)?;
                    if stores_through {
                        self.builder.emit(Instruction::Ldfld(field.clone()));
                    }
                }
                let target = match (stores_through, field.is_static) {
                    (true, _) => StoreTarget::Indirect(field.ty.clone()),
                    (false, true) => StoreTarget::StaticField(field.clone()),
                    (false, false) => StoreTarget::InstanceField(field.clone()),
                };
                return Ok((target, temp));
            }
            ExprKind::ArrayElementAccess { array, index } => {
                self.emit_expression(array, true)?;
                self.emit_expression(index, true)?;
                StoreTarget::ArrayElement(left.ty.clone())
            }
            ExprKind::PointerDereference { operand } => {
                self.emit_expression(operand, true)?;
                StoreTarget::Indirect(left.ty.clone())
            }
            _ if is_ref => {
                return Err(ice_err!(left.span, "reference assignment to a non-reference location";
                                    "type" => &left.ty));
            }
            _ => {
                let temp = self.emit_address(left, AddressKind::Writable)?;
                return Ok((StoreTarget::Indirect(left.ty.clone()), temp));
            }
        };
        Ok((target, None))
    }

    /// Keep a copy of the assigned value for the enclosing expression.
    fn emit_assignment_duplication(
        &mut self,
        target: &StoreTarget,
        ty: &TypeRef,
        is_ref: bool,
        use_kind: UseKind,
    ) -> Option<LocalSlot> {
        if use_kind == UseKind::Unused {
            return None;
        }
        self.builder.emit(Instruction::Dup);
        if !target.uses_stack() {
            return None;
        }
        let temp = if is_ref {
            self.slots.allocate_ref_temp(ty)
        } else {
            self.slots.allocate_temp(ty)
        };
        self.builder.emit(Instruction::Stloc(temp));
        Some(temp)
    }

    fn emit_store(&mut self, target: StoreTarget) {
        match target {
            StoreTarget::StackLocal => {}
            StoreTarget::Local(slot) => self.builder.emit(Instruction::Stloc(slot)),
            StoreTarget::Argument(index) => self.builder.emit(Instruction::Starg(index)),
            StoreTarget::StaticField(field) => self.builder.emit(Instruction::Stsfld(field)),
            StoreTarget::InstanceField(field) => self.builder.emit(Instruction::Stfld(field)),
            StoreTarget::ArrayElement(ty) => self.builder.emit(Instruction::Stelem(ty)),
            StoreTarget::Indirect(ty) => {
                self.builder.emit(Instruction::Stind(IndirectKind::store_of(&ty)))
            }
        }
    }
}

//! Address emission.
//!
//! Loads a reference to an expression's storage. Expressions without a home
//! for the requested kind are spilled to a temporary first; the temporary is
//! returned so the caller can decide whether it may be reused.

use crate::ice::EmitResult;
use crate::ice_err;
use crate::model::{
    AddressKind, Expr, ExprKind, FieldRef, LocalRef, Parameter, RefKind, TypeRef,
};

use super::builder::{Instruction, IndirectKind};
use super::slots::LocalSlot;
use super::{CodeGenerator, UseKind};

impl CodeGenerator {
    /// Push the address of `expr`, usable for `kind`.
    pub fn emit_address(&mut self, expr: &Expr, kind: AddressKind) -> EmitResult<Option<LocalSlot>> {
        match &expr.kind {
            ExprKind::RuntimeRefOperator { operand } => {
                self.emit_expression(operand, true)?;
                self.builder.emit(Instruction::Refanyval(expr.ty.clone()));
                return Ok(None);
            }
            // The receiver reference is already on the stack.
            ExprKind::ConditionalReceiver { .. } => return Ok(None),
            ExprKind::ComplexConditionalReceiver {
                value_type_receiver,
                reference_type_receiver,
            } => {
                self.emit_complex_receiver_address(
                    expr,
                    value_type_receiver,
                    reference_type_receiver,
                    kind,
                )?;
                return Ok(None);
            }
            ExprKind::ThrowMarker { operand } => {
                self.emit_throw(operand, true)?;
                return Ok(None);
            }
            ExprKind::PointerDereference { operand } => {
                self.emit_expression(operand, true)?;
                return Ok(None);
            }
            _ => {}
        }

        if !self.has_home(expr, kind) {
            return self.emit_address_of_temp_copy(expr);
        }

        match &expr.kind {
            ExprKind::LocalReference { local } => {
                self.emit_local_address(expr, local)?;
                Ok(None)
            }
            ExprKind::ParameterReference { parameter } => {
                self.emit_parameter_address(parameter);
                Ok(None)
            }
            ExprKind::ThisReference => {
                if expr.ty.is_value_type() {
                    // `this` of a value type is already a reference.
                    self.builder.emit(Instruction::Ldarg(0));
                } else {
                    self.builder.emit(Instruction::Ldarga(0));
                }
                Ok(None)
            }
            ExprKind::ArrayElementAccess { array, index } => {
                self.emit_expression(array, true)?;
                self.emit_expression(index, true)?;
                let readonly = (kind == AddressKind::Constrained || kind.is_any_read_only())
                    && !expr.ty.is_value_type();
                self.builder.emit(Instruction::Ldelema { ty: expr.ty.clone(), readonly });
                Ok(None)
            }
            ExprKind::FieldAccess { receiver, field, .. } => {
                self.emit_field_address(expr, receiver.as_deref(), field, kind)
            }
            ExprKind::Call(call) => {
                self.emit_call(call, UseKind::UsedAsAddress, expr.span)?;
                Ok(None)
            }
            ExprKind::DuplicatedStackValue { .. } => {
                self.builder.emit(Instruction::Dup);
                Ok(None)
            }
            ExprKind::Sequence { locals, side_effects, value } => {
                self.define_sequence_locals(locals);
                for side_effect in side_effects {
                    self.emit_expression(side_effect, false)?;
                }
                self.emit_address(value, kind)
            }
            ExprKind::Assignment { left, right, is_ref } => {
                self.emit_assignment(expr, left, right, *is_ref, UseKind::UsedAsAddress)?;
                Ok(None)
            }
            ExprKind::ConditionalOperator { condition, consequence, alternative, .. } => {
                self.emit_conditional_address(condition, consequence, alternative, kind)?;
                Ok(None)
            }
            ExprKind::Literal
            | ExprKind::Conversion(_)
            | ExprKind::DelegateCreation { .. }
            | ExprKind::StackAllocArray { .. }
            | ExprKind::RuntimeRefOperator { .. }
            | ExprKind::ConditionalReceiver { .. }
            | ExprKind::ComplexConditionalReceiver { .. }
            | ExprKind::ThrowMarker { .. }
            | ExprKind::PointerDereference { .. } => Err(ice_err!(
                expr.span, "expression without a home reached direct address emission";
                "type" => &expr.ty)),
        }
    }

    /// Evaluate `expr` into a fresh temporary and push its address.
    fn emit_address_of_temp_copy(&mut self, expr: &Expr) -> EmitResult<Option<LocalSlot>> {
        self.emit_expression(expr, true)?;
        let temp = self.slots.allocate_temp(&expr.ty);
        self.builder.emit(Instruction::Stloc(temp));
        self.builder.emit(Instruction::Ldloca(temp));
        tracing::debug!(slot = %temp, ty = %expr.ty, "address of temporary copy");
        Ok(Some(temp))
    }

    fn emit_local_address(&mut self, expr: &Expr, local: &LocalRef) -> EmitResult<()> {
        if self.is_stack_local(local.id) {
            if local.ref_kind == RefKind::None {
                return Err(ice_err!(expr.span, "address of a stack-resident value local";
                                    "local" => local.id));
            }
            // The reference itself is on the stack.
            return Ok(());
        }
        let slot = self.slots.define_local(local);
        if local.ref_kind.is_by_ref() {
            self.builder.emit(Instruction::Ldloc(slot));
        } else {
            self.builder.emit(Instruction::Ldloca(slot));
        }
        Ok(())
    }

    fn emit_parameter_address(&mut self, parameter: &Parameter) {
        let index = self.method.arg_index(parameter);
        if parameter.ref_kind.is_by_ref() {
            self.builder.emit(Instruction::Ldarg(index));
        } else {
            self.builder.emit(Instruction::Ldarga(index));
        }
    }

    fn emit_field_address(
        &mut self,
        expr: &Expr,
        receiver: Option<&Expr>,
        field: &FieldRef,
        kind: AddressKind,
    ) -> EmitResult<Option<LocalSlot>> {
        let by_ref = field.ref_kind.is_by_ref();

        if field.is_static {
            self.builder.emit(if by_ref {
                Instruction::Ldsfld(field.clone())
            } else {
                Instruction::Ldsflda(field.clone())
            });
            return Ok(None);
        }

        let Some(receiver) = receiver else {
            return Err(ice_err!(expr.span, "instance field access without receiver";
                                "field" => field));
        };
        // Constrained permits calls on the field but not a writable reference
        // to the enclosing receiver.
        let receiver_kind = if kind == AddressKind::Constrained {
            AddressKind::Writable
        } else {
            kind
        };
        let temp = self.emit_receiver_ref(receiver, receiver_kind)?;
        self.builder.emit(if by_ref {
            Instruction::Ldfld(field.clone())
        } else {
            Instruction::Ldflda(field.clone())
        });
        Ok(temp)
    }

    /// Push a receiver: the value for reference types, otherwise an address.
    pub(crate) fn emit_receiver_ref(
        &mut self,
        receiver: &Expr,
        kind: AddressKind,
    ) -> EmitResult<Option<LocalSlot>> {
        if receiver.ty.is_verifier_reference() {
            self.emit_expression(receiver, true)?;
            return Ok(None);
        }
        self.emit_address(receiver, kind)
    }

    fn emit_conditional_address(
        &mut self,
        condition: &Expr,
        consequence: &Expr,
        alternative: &Expr,
        kind: AddressKind,
    ) -> EmitResult<()> {
        let consequence_label = self.builder.define_label();
        let done_label = self.builder.define_label();

        self.emit_expression(condition, true)?;
        self.builder.emit(Instruction::Brtrue(consequence_label));

        let alternative_temp = self.emit_address(alternative, kind)?;
        self.builder.emit(Instruction::Br(done_label));
        self.builder.adjust_stack(-1);

        self.builder.mark_label(consequence_label);
        let consequence_temp = self.emit_address(consequence, kind)?;
        self.builder.mark_label(done_label);

        // A reference to either temporary may be the result.
        for temp in alternative_temp.into_iter().chain(consequence_temp) {
            self.slots.retire_temp(temp);
        }
        Ok(())
    }

    /// Address of a receiver of unconstrained generic type: the value-type
    /// form when `default(T)` boxes to non-null, else the reference form.
    fn emit_complex_receiver_address(
        &mut self,
        expr: &Expr,
        value_type_receiver: &Expr,
        reference_type_receiver: &Expr,
        kind: AddressKind,
    ) -> EmitResult<()> {
        let value_type_label = self.builder.define_label();
        let done_label = self.builder.define_label();

        self.emit_boxed_default(&expr.ty);
        self.builder.emit(Instruction::Brtrue(value_type_label));

        if let Some(temp) = self.emit_address(reference_type_receiver, kind)? {
            self.slots.retire_temp(temp);
        }
        self.builder.emit(Instruction::Br(done_label));
        self.builder.adjust_stack(-1);

        self.builder.mark_label(value_type_label);
        if let Some(temp) = self.emit_receiver_ref(value_type_receiver, kind)? {
            self.slots.retire_temp(temp);
        }
        self.builder.mark_label(done_label);
        Ok(())
    }

    /// Push `default(T)` boxed, which is null exactly when `T` is a
    /// reference type.
    pub(crate) fn emit_boxed_default(&mut self, ty: &TypeRef) {
        let temp = self.slots.allocate_temp(ty);
        self.builder.emit(Instruction::Ldloca(temp));
        self.builder.emit(Instruction::Initobj(ty.clone()));
        self.builder.emit(Instruction::Ldloc(temp));
        self.builder.emit(Instruction::Box(ty.clone()));
        self.slots.free_temp(temp);
    }

    /// Load the value a reference on the stack points to.
    pub(crate) fn emit_load_indirect(&mut self, ty: &TypeRef) {
        self.builder.emit(Instruction::Ldind(IndirectKind::of(ty)));
    }
}

//! Conversion and delegate creation emission.

use crate::diagnostics::{Diagnostic, ErrorCode};
use crate::ice::EmitResult;
use crate::ice_err;
use crate::model::{
    Conversion, ConversionKind, Expr, MethodRef, PrimitiveType, TypeKind, TypeRef,
};
use crate::span::Span;

use super::builder::{ConvTarget, Instruction, Overflow};
use super::numeric::numeric_conversion;
use super::CodeGenerator;

impl Conversion {
    /// Whether the conversion may throw at runtime.
    pub fn has_side_effects(&self) -> bool {
        match self.kind {
            ConversionKind::Identity
            | ConversionKind::ImplicitNumeric
            | ConversionKind::ImplicitEnumeration
            | ConversionKind::ImplicitReference
            | ConversionKind::Boxing
            | ConversionKind::PointerToPointer
            | ConversionKind::PointerToVoid => false,
            ConversionKind::ExplicitNumeric
            | ConversionKind::ExplicitEnumeration
            | ConversionKind::PointerToInteger
            | ConversionKind::IntegerToPointer => self.checked,
            _ => true,
        }
    }
}

/// Primitive layout of a pointer-conversion endpoint; pointers are
/// address-sized unsigned integers.
fn pointer_layout(ty: &TypeRef) -> Option<PrimitiveType> {
    match ty.kind() {
        TypeKind::Pointer { .. } => Some(PrimitiveType::UIntPtr),
        _ => ty.primitive(),
    }
}

impl CodeGenerator {
    /// Emit a conversion expression.
    pub fn emit_conversion_expression(
        &mut self,
        expr: &Expr,
        conversion: &Conversion,
        used: bool,
    ) -> EmitResult<()> {
        match conversion.kind {
            ConversionKind::MethodGroup => {
                return Err(ice_err!(expr.span, "method group conversion reached emission";
                                    "target" => &expr.ty));
            }
            ConversionKind::NullToPointer => {
                // The null pointer is the unsigned zero.
                self.builder.emit_int_constant(0);
                self.builder.emit(Instruction::Conv(ConvTarget::U, Overflow::Unchecked));
                self.emit_pop_if_unused(used);
                return Ok(());
            }
            _ => {}
        }

        if !used && !conversion.has_side_effects() {
            return self.emit_expression(&conversion.operand, false);
        }

        self.emit_expression(&conversion.operand, true)?;
        self.emit_conversion(expr, conversion)?;
        self.emit_pop_if_unused(used);
        Ok(())
    }

    /// Convert the operand already on the stack to `expr.ty`.
    pub fn emit_conversion(&mut self, expr: &Expr, conversion: &Conversion) -> EmitResult<()> {
        let from = &conversion.operand.ty;
        let to = &expr.ty;

        match conversion.kind {
            ConversionKind::Identity => {
                // An explicit float cast still rounds values held at higher
                // precision on the stack.
                if conversion.explicit_in_source
                    && expr.constant.is_none()
                    && conversion.operand.constant.is_none()
                {
                    if let Some(prim @ (PrimitiveType::Float32 | PrimitiveType::Float64)) =
                        to.primitive()
                    {
                        self.emit_numeric_conversion(prim, prim, false, expr.span)?;
                    }
                }
            }
            ConversionKind::ImplicitNumeric
            | ConversionKind::ExplicitNumeric
            | ConversionKind::ImplicitEnumeration
            | ConversionKind::ExplicitEnumeration => {
                let (Some(src), Some(dst)) = (from.primitive(), to.primitive()) else {
                    return Err(ice_err!(expr.span, "numeric conversion between non-primitive types";
                                        "from" => from,
                                        "to" => to));
                };
                self.emit_numeric_conversion(src, dst, conversion.checked, expr.span)?;
            }
            ConversionKind::ImplicitReference | ConversionKind::Boxing => {
                if !from.is_verifier_reference() {
                    self.builder.emit(Instruction::Box(from.clone()));
                }
                if !to.is_verifier_reference() {
                    self.builder.emit(Instruction::UnboxAny(to.clone()));
                }
            }
            ConversionKind::ExplicitReference | ConversionKind::Unboxing => {
                if !from.is_verifier_reference() {
                    self.builder.emit(Instruction::Box(from.clone()));
                }
                if to.is_verifier_reference() {
                    self.builder.emit(Instruction::Castclass(to.clone()));
                } else {
                    self.builder.emit(Instruction::UnboxAny(to.clone()));
                }
            }
            ConversionKind::PointerToPointer | ConversionKind::PointerToVoid => {}
            ConversionKind::PointerToInteger | ConversionKind::IntegerToPointer => {
                let (Some(src), Some(dst)) = (pointer_layout(from), pointer_layout(to)) else {
                    return Err(ice_err!(expr.span, "pointer conversion with non-integral endpoint";
                                        "from" => from,
                                        "to" => to));
                };
                self.emit_numeric_conversion(src, dst, conversion.checked, expr.span)?;
            }
            ConversionKind::NullToPointer
            | ConversionKind::MethodGroup
            | ConversionKind::ImplicitUserDefined
            | ConversionKind::ExplicitUserDefined
            | ConversionKind::ImplicitNullable
            | ConversionKind::ExplicitNullable => {
                return Err(ice_err!(expr.span, "conversion should have been lowered";
                                    "kind" => format!("{:?}", conversion.kind),
                                    "to" => to));
            }
        }
        Ok(())
    }

    pub(crate) fn emit_numeric_conversion(
        &mut self,
        from: PrimitiveType,
        to: PrimitiveType,
        checked: bool,
        span: Span,
    ) -> EmitResult<()> {
        let steps = numeric_conversion(from, to, checked).ok_or_else(|| {
            ice_err!(span, "numeric conversion with non-numeric endpoint";
                     "from" => from.name(),
                     "to" => to.name())
        })?;
        for step in steps {
            self.builder.emit(step);
        }
        Ok(())
    }

    /// Emit a delegate bound to `method`, with `receiver` as its target
    /// (absent for static methods).
    pub fn emit_delegate_creation(
        &mut self,
        expr: &Expr,
        receiver: Option<&Expr>,
        method: &MethodRef,
        non_virtual: bool,
        used: bool,
    ) -> EmitResult<()> {
        let receiver = receiver.filter(|_| !method.is_static);

        if !used {
            if let Some(receiver) = receiver {
                self.emit_expression(receiver, false)?;
            }
            return Ok(());
        }

        match receiver {
            None => self.builder.emit(Instruction::Ldnull),
            Some(receiver) => {
                self.emit_expression(receiver, true)?;
                if !receiver.ty.is_verifier_reference() {
                    self.builder.emit(Instruction::Box(receiver.ty.clone()));
                }
            }
        }

        if method.is_virtual && !method.declaring_type.is_delegate() && !non_virtual {
            self.builder.emit(Instruction::Dup);
            self.builder.emit(Instruction::Ldvirtftn(method.clone()));
        } else {
            self.builder.emit(Instruction::Ldftn(method.clone()));
        }

        match self.delegate_constructor(&expr.ty, expr.span) {
            Some(ctor) => self.builder.emit(Instruction::Newobj(ctor)),
            // Both operands are still consumed and a delegate slot produced.
            None => self.builder.adjust_stack(-1),
        }
        Ok(())
    }

    /// The `(object, native int)` constructor of a delegate type.
    fn delegate_constructor(&self, delegate: &TypeRef, span: Span) -> Option<MethodRef> {
        let found = self.symbols.instance_constructors(delegate).into_iter().find(|ctor| {
            matches!(ctor.parameters.as_slice(), [target, handle]
                if matches!(target.ty.kind(), TypeKind::Object)
                    && matches!(
                        handle.ty.primitive(),
                        Some(PrimitiveType::IntPtr | PrimitiveType::UIntPtr)
                    )
                    && !handle.ty.is_enum())
        });

        if found.is_none() {
            self.diagnostics.push(
                Diagnostic::error(
                    format!("delegate '{}' does not have a valid constructor", delegate),
                    span,
                )
                .with_error_code(ErrorCode::BadDelegateConstructor)
                .with_primary_label(span, "delegate created here"),
            );
        }
        found
    }
}

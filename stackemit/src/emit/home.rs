//! # Addressability Analysis
//!
//! Decides whether an expression denotes a storage location (a "home") whose
//! address may be handed out for a given [`AddressKind`]. When it does not,
//! address emission falls back to copying the value into a temporary and
//! taking the temporary's address.
//!
//! ## Verdicts by expression
//!
//! | Expression | Home |
//! |------------|------|
//! | array element | unless a `ReadOnly` reference-typed element in verifier-compat mode |
//! | pointer deref, typed-ref extraction, throw, conditional receiver | always |
//! | `this` | unless a writable address of a value-type `this` in a read-only method |
//! | parameter | unless a writable address of an `in`/`ref readonly` parameter |
//! | local | unless a stack-resident by-value local, or writable use of a `ref readonly` local |
//! | call, duplicated value | `ref` returns; `ref readonly` returns for read-only kinds |
//! | sequence | the value's home |
//! | by-ref assignment | the left operand's reference mode decides |
//! | by-ref conditional | both branches |
//! | field access | see [`HomeQuery::field_has_home`] |
//! | anything else | never |
//!
//! Every query is a pure function of its inputs; nothing is cached.

use std::collections::HashSet;

use crate::model::{
    AddressKind, Expr, ExprKind, FieldRef, LocalId, MethodContext, MethodKind, RefKind,
};

/// The fixed inputs of a home query for one method body.
#[derive(Debug, Clone, Copy)]
pub struct HomeQuery<'a> {
    pub method: &'a MethodContext,
    pub verifier_compat: bool,
    pub stack_locals: &'a HashSet<LocalId>,
}

impl<'a> HomeQuery<'a> {
    pub fn new(
        method: &'a MethodContext,
        verifier_compat: bool,
        stack_locals: &'a HashSet<LocalId>,
    ) -> Self {
        Self { method, verifier_compat, stack_locals }
    }

    /// Whether `expr` has a home usable for `kind`.
    pub fn has_home(&self, expr: &Expr, kind: AddressKind) -> bool {
        let verdict = self.check(expr, kind);
        tracing::trace!(?kind, verdict, ty = %expr.ty, "home query");
        verdict
    }

    fn check(&self, expr: &Expr, kind: AddressKind) -> bool {
        match &expr.kind {
            ExprKind::ArrayElementAccess { .. } => {
                !(kind == AddressKind::ReadOnly
                    && !expr.ty.is_value_type()
                    && self.verifier_compat)
            }

            ExprKind::PointerDereference { .. }
            | ExprKind::RuntimeRefOperator { .. }
            | ExprKind::ThrowMarker { .. }
            | ExprKind::ConditionalReceiver { .. } => true,

            ExprKind::ComplexConditionalReceiver {
                value_type_receiver,
                reference_type_receiver,
            } => {
                debug_assert!(self.check(value_type_receiver, kind));
                debug_assert!(self.check(reference_type_receiver, kind));
                true
            }

            ExprKind::ThisReference => {
                if expr.ty.is_reference_type() {
                    return true;
                }
                kind.is_any_read_only() || !self.method.effectively_readonly
            }

            ExprKind::ParameterReference { parameter } => {
                kind.is_any_read_only()
                    || !matches!(parameter.ref_kind, RefKind::In | RefKind::RefReadOnlyParam)
            }

            ExprKind::LocalReference { local } => {
                let stack_value =
                    self.stack_locals.contains(&local.id) && local.ref_kind == RefKind::None;
                let writes_readonly_ref =
                    !kind.is_any_read_only() && local.ref_kind == RefKind::RefReadOnly;
                !(stack_value || writes_readonly_ref)
            }

            ExprKind::Call(call) => returned_ref_has_home(call.method.return_ref_kind, kind),

            ExprKind::DuplicatedStackValue { ref_kind } => returned_ref_has_home(*ref_kind, kind),

            ExprKind::FieldAccess { receiver, field, by_value } => {
                self.field_has_home(receiver.as_deref(), field, *by_value, kind)
            }

            ExprKind::Sequence { value, .. } => self.check(value, kind),

            ExprKind::Assignment { left, is_ref, .. } => {
                if !is_ref {
                    return false;
                }
                match left.ref_kind() {
                    RefKind::Ref => true,
                    RefKind::RefReadOnly | RefKind::RefReadOnlyParam => kind.is_any_read_only(),
                    _ => false,
                }
            }

            ExprKind::ConditionalOperator { consequence, alternative, is_ref, .. } => {
                *is_ref && self.check(consequence, kind) && self.check(alternative, kind)
            }

            ExprKind::Literal
            | ExprKind::Conversion(_)
            | ExprKind::DelegateCreation { .. }
            | ExprKind::StackAllocArray { .. } => false,
        }
    }

    /// Home of a field access.
    ///
    /// Read-only kinds are satisfied by any field outside verifier-compat
    /// mode. A mutable field of a value-typed receiver inherits the
    /// receiver's answer, except that a receiver with no home at all can
    /// still be spilled and written. A read-only field is writable only
    /// while its declaring type is being constructed, and an instance one
    /// only through `this`.
    pub fn field_has_home(
        &self,
        receiver: Option<&Expr>,
        field: &FieldRef,
        by_value: bool,
        kind: AddressKind,
    ) -> bool {
        if field.is_const {
            return false;
        }
        if field.ref_kind == RefKind::Ref {
            return true;
        }
        if kind == AddressKind::ReadOnlyStrict {
            return true;
        }
        if kind == AddressKind::ReadOnly && !self.verifier_compat {
            return true;
        }
        if by_value {
            return false;
        }
        if field.ref_kind == RefKind::RefReadOnly {
            return false;
        }

        if !field.is_readonly {
            if !self.verifier_compat {
                if let Some(receiver) = receiver.filter(|r| r.ty.is_value_type()) {
                    return self.check(receiver, kind)
                        || !self.check(receiver, AddressKind::ReadOnly);
                }
            }
            return true;
        }

        if field.declaring_type != self.method.declaring_type {
            return false;
        }
        if field.is_static {
            return self.method.kind == MethodKind::StaticConstructor;
        }
        matches!(self.method.kind, MethodKind::Constructor | MethodKind::InitOnlyMutator)
            && matches!(receiver.map(|r| &r.kind), Some(ExprKind::ThisReference))
    }
}

/// Shared rule for values produced by reference (calls, duplicates).
fn returned_ref_has_home(ref_kind: RefKind, kind: AddressKind) -> bool {
    ref_kind == RefKind::Ref || (kind.is_any_read_only() && ref_kind == RefKind::RefReadOnly)
}

/// Whether `expr` has a home usable for `kind` inside `method`.
pub fn has_home(
    expr: &Expr,
    kind: AddressKind,
    method: &MethodContext,
    verifier_compat: bool,
    stack_locals: &HashSet<LocalId>,
) -> bool {
    HomeQuery::new(method, verifier_compat, stack_locals).has_home(expr, kind)
}

// ============================================================================
// Tests
// ============================================================================

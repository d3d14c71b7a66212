//! Lowered expressions.
//!
//! The tree is produced by lowering and is immutable by the time emission
//! sees it. Every analysis in [`crate::emit`] dispatches on [`ExprKind`] with
//! an exhaustive match, so a new variant fails to compile until each
//! analysis decides what to do with it.

use crate::span::Span;

use super::constant::ConstantValue;
use super::symbols::{FieldRef, LocalRef, MethodRef, Parameter, RefKind};
use super::ty::TypeRef;

/// A lowered, type-checked expression.
#[derive(Debug, Clone)]
pub struct Expr {
    pub kind: ExprKind,
    /// Result type.
    pub ty: TypeRef,
    /// Folded value, when the binder proved the expression constant.
    pub constant: Option<ConstantValue>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    /// A constant; the value is in [`Expr::constant`].
    Literal,
    /// `array[index]` on a single-dimensional array.
    ArrayElementAccess { array: Box<Expr>, index: Box<Expr> },
    /// `*pointer`
    PointerDereference { operand: Box<Expr> },
    /// Extracts the reference stored in a typed reference.
    RuntimeRefOperator { operand: Box<Expr> },
    ThisReference,
    /// A `throw` in expression position.
    ThrowMarker { operand: Box<Expr> },
    ParameterReference { parameter: Parameter },
    LocalReference { local: LocalRef },
    Call(Box<CallExpr>),
    /// A value the emitter already duplicated on the stack.
    DuplicatedStackValue { ref_kind: RefKind },
    FieldAccess {
        /// Absent for static fields.
        receiver: Option<Box<Expr>>,
        field: FieldRef,
        /// The access must produce a value; it never has a home.
        by_value: bool,
    },
    Sequence {
        locals: Vec<LocalRef>,
        side_effects: Vec<Expr>,
        value: Box<Expr>,
    },
    Assignment {
        left: Box<Expr>,
        right: Box<Expr>,
        /// Rebinds a reference rather than storing a value.
        is_ref: bool,
    },
    /// The receiver of a conditional access, already on the stack.
    ConditionalReceiver { id: u32 },
    /// A receiver of unconstrained generic type: the value-type form is used
    /// when the runtime type turns out to be a value type.
    ComplexConditionalReceiver {
        value_type_receiver: Box<Expr>,
        reference_type_receiver: Box<Expr>,
    },
    ConditionalOperator {
        condition: Box<Expr>,
        consequence: Box<Expr>,
        alternative: Box<Expr>,
        is_ref: bool,
    },
    Conversion(Box<Conversion>),
    DelegateCreation {
        /// Absent for static targets.
        receiver: Option<Box<Expr>>,
        method: MethodRef,
        /// Bind the exact method even if it is overridable.
        non_virtual: bool,
    },
    StackAllocArray {
        element_type: TypeRef,
        count: Box<Expr>,
        initializers: Option<Vec<Expr>>,
    },
}

#[derive(Debug, Clone)]
pub struct CallExpr {
    pub receiver: Option<Expr>,
    pub method: MethodRef,
    pub arguments: Vec<Expr>,
    /// Call the exact method even if it is overridable (`base.M()`).
    pub non_virtual: bool,
}

/// Conversion kinds that can reach emission, plus the ones lowering must
/// have removed (emitting those is an internal error).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConversionKind {
    Identity,
    ImplicitNumeric,
    ExplicitNumeric,
    ImplicitReference,
    Boxing,
    ExplicitReference,
    Unboxing,
    ImplicitEnumeration,
    ExplicitEnumeration,
    PointerToInteger,
    IntegerToPointer,
    PointerToPointer,
    PointerToVoid,
    NullToPointer,
    MethodGroup,
    ImplicitUserDefined,
    ExplicitUserDefined,
    ImplicitNullable,
    ExplicitNullable,
}

#[derive(Debug, Clone)]
pub struct Conversion {
    pub operand: Expr,
    pub kind: ConversionKind,
    /// Overflow-checked context.
    pub checked: bool,
    /// Written as a cast in source, as opposed to inserted by the binder.
    pub explicit_in_source: bool,
}

impl Expr {
    pub fn new(kind: ExprKind, ty: TypeRef) -> Self {
        Self {
            kind,
            ty,
            constant: None,
            span: Span::dummy(),
        }
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn with_constant(mut self, value: ConstantValue) -> Self {
        self.constant = Some(value);
        self
    }

    pub fn is_constant(&self) -> bool {
        self.constant.is_some()
    }

    // Convenience constructors

    pub fn literal(ty: TypeRef, value: ConstantValue) -> Self {
        Self::new(ExprKind::Literal, ty).with_constant(value)
    }

    pub fn int32(value: i32) -> Self {
        Self::literal(TypeRef::int32(), ConstantValue::Int(i64::from(value)))
    }

    pub fn local(local: LocalRef) -> Self {
        let ty = local.ty.clone();
        Self::new(ExprKind::LocalReference { local }, ty)
    }

    pub fn parameter(parameter: Parameter) -> Self {
        let ty = parameter.ty.clone();
        Self::new(ExprKind::ParameterReference { parameter }, ty)
    }

    pub fn this(ty: TypeRef) -> Self {
        Self::new(ExprKind::ThisReference, ty)
    }

    pub fn field(receiver: Option<Expr>, field: FieldRef) -> Self {
        let ty = field.ty.clone();
        Self::new(
            ExprKind::FieldAccess {
                receiver: receiver.map(Box::new),
                field,
                by_value: false,
            },
            ty,
        )
    }

    pub fn array_element(array: Expr, index: Expr) -> Self {
        let ty = array
            .ty
            .element_type()
            .cloned()
            .unwrap_or_else(TypeRef::object);
        Self::new(
            ExprKind::ArrayElementAccess {
                array: Box::new(array),
                index: Box::new(index),
            },
            ty,
        )
    }

    pub fn call(receiver: Option<Expr>, method: MethodRef, arguments: Vec<Expr>) -> Self {
        let ty = method.return_type.clone();
        Self::new(
            ExprKind::Call(Box::new(CallExpr {
                receiver,
                method,
                arguments,
                non_virtual: false,
            })),
            ty,
        )
    }

    pub fn conversion(operand: Expr, kind: ConversionKind, ty: TypeRef) -> Self {
        Self::new(
            ExprKind::Conversion(Box::new(Conversion {
                operand,
                kind,
                checked: false,
                explicit_in_source: false,
            })),
            ty,
        )
    }

    pub fn conditional(condition: Expr, consequence: Expr, alternative: Expr, is_ref: bool) -> Self {
        let ty = consequence.ty.clone();
        Self::new(
            ExprKind::ConditionalOperator {
                condition: Box::new(condition),
                consequence: Box::new(consequence),
                alternative: Box::new(alternative),
                is_ref,
            },
            ty,
        )
    }

    pub fn sequence(locals: Vec<LocalRef>, side_effects: Vec<Expr>, value: Expr) -> Self {
        let ty = value.ty.clone();
        Self::new(
            ExprKind::Sequence {
                locals,
                side_effects,
                value: Box::new(value),
            },
            ty,
        )
    }

    pub fn assignment(left: Expr, right: Expr, is_ref: bool) -> Self {
        let ty = left.ty.clone();
        Self::new(
            ExprKind::Assignment {
                left: Box::new(left),
                right: Box::new(right),
                is_ref,
            },
            ty,
        )
    }

    /// The reference mode this expression produces when used as an lvalue.
    pub fn ref_kind(&self) -> RefKind {
        match &self.kind {
            ExprKind::LocalReference { local } => local.ref_kind,
            ExprKind::ParameterReference { parameter } => parameter.ref_kind,
            ExprKind::FieldAccess { field, .. } => field.ref_kind,
            ExprKind::Call(call) => call.method.return_ref_kind,
            ExprKind::DuplicatedStackValue { ref_kind } => *ref_kind,
            ExprKind::Sequence { value, .. } => value.ref_kind(),
            ExprKind::Assignment { left, is_ref: true, .. } => left.ref_kind(),
            ExprKind::ConditionalOperator { is_ref: true, .. } => RefKind::Ref,
            _ => RefKind::None,
        }
    }
}

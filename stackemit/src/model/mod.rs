//! # Expression Model
//!
//! The data shared by every emission component: the lowered expression tree
//! and the symbol facts attached to it.
//!
//! ## Module Structure
//!
//! - [`ty`] - Type descriptors and their representation predicates
//! - [`symbols`] - Parameters, locals, fields, methods, reference modes
//! - [`constant`] - Folded constants and their byte layout
//! - [`expr`] - The closed expression variant set

pub mod constant;
pub mod expr;
pub mod symbols;
pub mod ty;

pub use constant::ConstantValue;
pub use expr::{CallExpr, Conversion, ConversionKind, Expr, ExprKind};
pub use symbols::{
    AddressKind, FieldData, FieldRef, LocalData, LocalId, LocalRef, MethodContext, MethodData,
    MethodKind, MethodRef, Parameter, RefKind, ScopeKind,
};
pub use ty::{PrimitiveType, TypeKind, TypeParamConstraints, TypeRef};

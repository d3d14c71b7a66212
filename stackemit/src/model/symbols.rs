//! Symbol descriptors: parameters, locals, fields, methods and the
//! enclosing-method context.

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use super::ty::TypeRef;

// ============================================================================
// Reference modes and address kinds
// ============================================================================

/// How a parameter, local, field or return value is passed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RefKind {
    /// By value.
    #[default]
    None,
    /// By mutable reference.
    Ref,
    /// By read-only reference, argument may be an rvalue.
    In,
    /// By reference, written before read.
    Out,
    /// By read-only reference.
    RefReadOnly,
    /// Read-only reference parameter that requires an lvalue argument.
    RefReadOnlyParam,
}

impl RefKind {
    pub fn is_by_ref(self) -> bool {
        self != RefKind::None
    }

    /// Whether a callee may write through a reference of this kind.
    pub fn is_writable_reference(self) -> bool {
        matches!(self, RefKind::Ref | RefKind::Out)
    }

    pub fn is_read_only_reference(self) -> bool {
        matches!(self, RefKind::In | RefKind::RefReadOnly | RefKind::RefReadOnlyParam)
    }
}

/// The caller's intended use of an address.
///
/// Ordered: `Writable < Constrained < ReadOnly < ReadOnlyStrict`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AddressKind {
    /// The reference may be written to.
    Writable,
    /// Not written to, but may be used as a call receiver. Same as
    /// `Writable` except for array elements, where it permits a
    /// `readonly.` prefix.
    Constrained,
    /// Neither written to nor used to modify fields.
    ReadOnly,
    /// Like `ReadOnly`, but a reference to a copy is never acceptable,
    /// regardless of verifier compatibility.
    ReadOnlyStrict,
}

impl AddressKind {
    pub fn is_any_read_only(self) -> bool {
        self >= AddressKind::ReadOnly
    }
}

/// Whether a parameter's references may outlive the call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ScopeKind {
    #[default]
    Unscoped,
    Scoped,
}

// ============================================================================
// Parameters and locals
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Parameter {
    pub name: String,
    /// Zero-based position among declared parameters (the receiver is not
    /// counted).
    pub ordinal: u16,
    pub ty: TypeRef,
    pub ref_kind: RefKind,
    pub scope: ScopeKind,
}

impl Parameter {
    pub fn new(name: impl Into<String>, ordinal: u16, ty: TypeRef) -> Self {
        Self {
            name: name.into(),
            ordinal,
            ty,
            ref_kind: RefKind::None,
            scope: ScopeKind::Unscoped,
        }
    }

    pub fn with_ref_kind(mut self, ref_kind: RefKind) -> Self {
        self.ref_kind = ref_kind;
        self
    }

    pub fn with_scope(mut self, scope: ScopeKind) -> Self {
        self.scope = scope;
        self
    }
}

/// A unique identifier for a local within a method body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LocalId(pub u32);

impl LocalId {
    pub const fn new(id: u32) -> Self {
        LocalId(id)
    }
}

impl fmt::Display for LocalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "_{}", self.0)
    }
}

#[derive(Debug, PartialEq, Eq, Hash)]
pub struct LocalData {
    pub id: LocalId,
    pub name: Option<String>,
    pub ty: TypeRef,
    pub ref_kind: RefKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LocalRef(Arc<LocalData>);

impl LocalRef {
    pub fn new(id: LocalId, ty: TypeRef) -> Self {
        Self::from_data(LocalData { id, name: None, ty, ref_kind: RefKind::None })
    }

    /// A by-reference local.
    pub fn new_ref(id: LocalId, ty: TypeRef, ref_kind: RefKind) -> Self {
        Self::from_data(LocalData { id, name: None, ty, ref_kind })
    }

    pub fn from_data(data: LocalData) -> Self {
        LocalRef(Arc::new(data))
    }
}

impl Deref for LocalRef {
    type Target = LocalData;

    fn deref(&self) -> &LocalData {
        &self.0
    }
}

// ============================================================================
// Fields
// ============================================================================

#[derive(Debug, PartialEq, Eq, Hash)]
pub struct FieldData {
    pub name: String,
    pub declaring_type: TypeRef,
    pub ty: TypeRef,
    /// A literal with no storage.
    pub is_const: bool,
    pub is_static: bool,
    /// Assignable only while the declaring type is being constructed.
    pub is_readonly: bool,
    /// `None`, `Ref` or `RefReadOnly`.
    pub ref_kind: RefKind,
}

impl FieldData {
    /// A mutable instance field.
    pub fn instance(name: impl Into<String>, declaring_type: TypeRef, ty: TypeRef) -> Self {
        Self {
            name: name.into(),
            declaring_type,
            ty,
            is_const: false,
            is_static: false,
            is_readonly: false,
            ref_kind: RefKind::None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldRef(Arc<FieldData>);

impl FieldRef {
    pub fn new(data: FieldData) -> Self {
        FieldRef(Arc::new(data))
    }
}

impl Deref for FieldRef {
    type Target = FieldData;

    fn deref(&self) -> &FieldData {
        &self.0
    }
}

impl fmt::Display for FieldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.declaring_type, self.name)
    }
}

// ============================================================================
// Methods
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MethodKind {
    Constructor,
    StaticConstructor,
    /// An init-only setter: may assign read-only instance fields.
    InitOnlyMutator,
    #[default]
    Ordinary,
}

#[derive(Debug, PartialEq, Eq, Hash)]
pub struct MethodData {
    pub name: String,
    pub declaring_type: TypeRef,
    pub kind: MethodKind,
    pub is_static: bool,
    /// Dispatched through the virtual table in metadata.
    pub is_virtual: bool,
    /// An instance method on a value type that cannot mutate `this`.
    pub is_effectively_readonly: bool,
    pub return_type: TypeRef,
    pub return_ref_kind: RefKind,
    pub parameters: Vec<Parameter>,
}

impl MethodData {
    /// An ordinary instance method returning `return_type` by value.
    pub fn new(name: impl Into<String>, declaring_type: TypeRef, return_type: TypeRef) -> Self {
        Self {
            name: name.into(),
            declaring_type,
            kind: MethodKind::Ordinary,
            is_static: false,
            is_virtual: false,
            is_effectively_readonly: false,
            return_type,
            return_ref_kind: RefKind::None,
            parameters: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodRef(Arc<MethodData>);

impl MethodRef {
    pub fn new(data: MethodData) -> Self {
        MethodRef(Arc::new(data))
    }

    /// The implicit receiver parameter of an instance method.
    ///
    /// Value-type receivers are passed by reference (read-only when the
    /// method is effectively read-only); reference-type receivers by value.
    pub fn this_parameter(&self) -> Option<Parameter> {
        if self.is_static {
            return None;
        }
        let ref_kind = if self.declaring_type.is_value_type() {
            if self.is_effectively_readonly {
                RefKind::In
            } else {
                RefKind::Ref
            }
        } else {
            RefKind::None
        };
        Some(Parameter {
            name: "this".to_string(),
            ordinal: 0,
            ty: self.declaring_type.clone(),
            ref_kind,
            scope: ScopeKind::Unscoped,
        })
    }

    /// Whether the call pushes a result.
    pub fn returns_value(&self) -> bool {
        !self.return_type.is_void() || self.return_ref_kind.is_by_ref()
    }

    /// Number of stack slots the call consumes, receiver included.
    pub fn stack_inputs(&self) -> i32 {
        self.parameters.len() as i32 + i32::from(!self.is_static)
    }
}

impl Deref for MethodRef {
    type Target = MethodData;

    fn deref(&self) -> &MethodData {
        &self.0
    }
}

impl fmt::Display for MethodRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.declaring_type, self.name)
    }
}

/// The method whose body is being emitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodContext {
    pub kind: MethodKind,
    pub declaring_type: TypeRef,
    pub is_static: bool,
    /// Instance method on a value type that cannot mutate `this`.
    pub effectively_readonly: bool,
}

impl MethodContext {
    pub fn of(method: &MethodData) -> Self {
        Self {
            kind: method.kind,
            declaring_type: method.declaring_type.clone(),
            is_static: method.is_static,
            effectively_readonly: method.is_effectively_readonly,
        }
    }

    /// An ordinary instance method of `declaring_type`.
    pub fn ordinary(declaring_type: TypeRef) -> Self {
        Self {
            kind: MethodKind::Ordinary,
            declaring_type,
            is_static: false,
            effectively_readonly: false,
        }
    }

    /// Argument slot of a declared parameter.
    pub fn arg_index(&self, param: &Parameter) -> u16 {
        if self.is_static {
            param.ordinal
        } else {
            param.ordinal + 1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_kind_ordering() {
        assert!(AddressKind::Writable < AddressKind::Constrained);
        assert!(AddressKind::Constrained < AddressKind::ReadOnly);
        assert!(AddressKind::ReadOnly < AddressKind::ReadOnlyStrict);
    }

    #[test]
    fn test_is_any_read_only() {
        assert!(!AddressKind::Writable.is_any_read_only());
        assert!(!AddressKind::Constrained.is_any_read_only());
        assert!(AddressKind::ReadOnly.is_any_read_only());
        assert!(AddressKind::ReadOnlyStrict.is_any_read_only());
    }

    #[test]
    fn test_writable_reference_kinds() {
        assert!(RefKind::Ref.is_writable_reference());
        assert!(RefKind::Out.is_writable_reference());
        assert!(!RefKind::In.is_writable_reference());
        assert!(!RefKind::RefReadOnlyParam.is_writable_reference());
        assert!(!RefKind::None.is_writable_reference());
    }

    #[test]
    fn test_this_parameter_modes() {
        let point = TypeRef::structure("Point");
        let mut data = MethodData::new("Length", point.clone(), TypeRef::float64());
        data.is_effectively_readonly = true;
        let readonly_method = MethodRef::new(data);
        assert_eq!(readonly_method.this_parameter().unwrap().ref_kind, RefKind::In);

        let mutating = MethodRef::new(MethodData::new("Scale", point, TypeRef::void()));
        assert_eq!(mutating.this_parameter().unwrap().ref_kind, RefKind::Ref);

        let mut data = MethodData::new("Create", TypeRef::class("Factory"), TypeRef::object());
        data.is_static = true;
        assert!(MethodRef::new(data).this_parameter().is_none());
    }

    #[test]
    fn test_arg_index() {
        let param = Parameter::new("x", 1, TypeRef::int32());
        let mut ctx = MethodContext::ordinary(TypeRef::class("C"));
        assert_eq!(ctx.arg_index(&param), 2);
        ctx.is_static = true;
        assert_eq!(ctx.arg_index(&param), 1);
    }
}

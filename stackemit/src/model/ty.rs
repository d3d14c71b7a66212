//! Type descriptors consumed by emission.
//!
//! These are not the binder's types; they carry only the facts emission
//! decisions depend on: value vs. reference representation, whether the
//! verifier tracks the value as an object reference, stack-only-ness,
//! read-only-ness and primitive layout.

use std::fmt;
use std::sync::Arc;

/// Primitive layouts the stack machine knows natively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveType {
    Boolean,
    Char,
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Float32,
    Float64,
    /// Address-sized signed integer.
    IntPtr,
    /// Address-sized unsigned integer.
    UIntPtr,
}

impl PrimitiveType {
    /// Size in bytes, or `None` for the address-sized integers whose width
    /// depends on the target.
    pub fn size_in_bytes(self) -> Option<u32> {
        match self {
            PrimitiveType::Boolean | PrimitiveType::Int8 | PrimitiveType::UInt8 => Some(1),
            PrimitiveType::Char | PrimitiveType::Int16 | PrimitiveType::UInt16 => Some(2),
            PrimitiveType::Int32 | PrimitiveType::UInt32 | PrimitiveType::Float32 => Some(4),
            PrimitiveType::Int64 | PrimitiveType::UInt64 | PrimitiveType::Float64 => Some(8),
            PrimitiveType::IntPtr | PrimitiveType::UIntPtr => None,
        }
    }

    pub fn is_unsigned(self) -> bool {
        matches!(
            self,
            PrimitiveType::Char
                | PrimitiveType::UInt8
                | PrimitiveType::UInt16
                | PrimitiveType::UInt32
                | PrimitiveType::UInt64
                | PrimitiveType::UIntPtr
        )
    }

    pub fn is_floating(self) -> bool {
        matches!(self, PrimitiveType::Float32 | PrimitiveType::Float64)
    }

    /// Everything but `Boolean` participates in numeric conversions.
    pub fn is_numeric(self) -> bool {
        self != PrimitiveType::Boolean
    }

    /// Whether constants of this type can be laid out in a data blob.
    pub fn is_blittable(self) -> bool {
        self.size_in_bytes().is_some()
    }

    pub fn name(self) -> &'static str {
        match self {
            PrimitiveType::Boolean => "bool",
            PrimitiveType::Char => "char",
            PrimitiveType::Int8 => "i8",
            PrimitiveType::UInt8 => "u8",
            PrimitiveType::Int16 => "i16",
            PrimitiveType::UInt16 => "u16",
            PrimitiveType::Int32 => "i32",
            PrimitiveType::UInt32 => "u32",
            PrimitiveType::Int64 => "i64",
            PrimitiveType::UInt64 => "u64",
            PrimitiveType::Float32 => "f32",
            PrimitiveType::Float64 => "f64",
            PrimitiveType::IntPtr => "nint",
            PrimitiveType::UIntPtr => "nuint",
        }
    }
}

/// Constraints on a type parameter that matter for representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TypeParamConstraints {
    /// Constrained to reference types.
    pub reference_type: bool,
    /// Constrained to value types.
    pub value_type: bool,
    /// May be instantiated with a stack-only type.
    pub allows_ref_like: bool,
}

/// The kind of a type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeKind {
    Void,
    Primitive(PrimitiveType),
    /// The root reference type.
    Object,
    String,
    Class,
    Interface,
    Delegate,
    Struct {
        /// Stack-only: may contain references and never lives on the heap.
        ref_like: bool,
        readonly: bool,
    },
    Enum {
        underlying: PrimitiveType,
    },
    Array {
        element: TypeRef,
    },
    Pointer {
        pointee: TypeRef,
    },
    TypeParameter(TypeParamConstraints),
}

#[derive(Debug, PartialEq, Eq, Hash)]
pub struct TypeData {
    pub name: String,
    pub kind: TypeKind,
}

/// A shared, immutable type descriptor.
///
/// Equality is structural (name and kind), which is how the binder's
/// nominal identity is observed here.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct TypeRef {
    data: Arc<TypeData>,
}

impl TypeRef {
    pub fn new(name: impl Into<String>, kind: TypeKind) -> Self {
        Self {
            data: Arc::new(TypeData {
                name: name.into(),
                kind,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.data.name
    }

    pub fn kind(&self) -> &TypeKind {
        &self.data.kind
    }

    // Convenience constructors

    pub fn void() -> Self {
        Self::new("void", TypeKind::Void)
    }

    pub fn from_primitive(prim: PrimitiveType) -> Self {
        Self::new(prim.name(), TypeKind::Primitive(prim))
    }

    pub fn boolean() -> Self {
        Self::from_primitive(PrimitiveType::Boolean)
    }

    pub fn uint8() -> Self {
        Self::from_primitive(PrimitiveType::UInt8)
    }

    pub fn int16() -> Self {
        Self::from_primitive(PrimitiveType::Int16)
    }

    pub fn int32() -> Self {
        Self::from_primitive(PrimitiveType::Int32)
    }

    pub fn uint32() -> Self {
        Self::from_primitive(PrimitiveType::UInt32)
    }

    pub fn int64() -> Self {
        Self::from_primitive(PrimitiveType::Int64)
    }

    pub fn float32() -> Self {
        Self::from_primitive(PrimitiveType::Float32)
    }

    pub fn float64() -> Self {
        Self::from_primitive(PrimitiveType::Float64)
    }

    pub fn intptr() -> Self {
        Self::from_primitive(PrimitiveType::IntPtr)
    }

    pub fn uintptr() -> Self {
        Self::from_primitive(PrimitiveType::UIntPtr)
    }

    pub fn object() -> Self {
        Self::new("object", TypeKind::Object)
    }

    pub fn string() -> Self {
        Self::new("string", TypeKind::String)
    }

    pub fn class(name: impl Into<String>) -> Self {
        Self::new(name, TypeKind::Class)
    }

    pub fn interface(name: impl Into<String>) -> Self {
        Self::new(name, TypeKind::Interface)
    }

    pub fn delegate(name: impl Into<String>) -> Self {
        Self::new(name, TypeKind::Delegate)
    }

    /// An ordinary mutable struct.
    pub fn structure(name: impl Into<String>) -> Self {
        Self::new(name, TypeKind::Struct { ref_like: false, readonly: false })
    }

    pub fn readonly_struct(name: impl Into<String>) -> Self {
        Self::new(name, TypeKind::Struct { ref_like: false, readonly: true })
    }

    /// A stack-only struct.
    pub fn ref_struct(name: impl Into<String>, readonly: bool) -> Self {
        Self::new(name, TypeKind::Struct { ref_like: true, readonly })
    }

    pub fn enumeration(name: impl Into<String>, underlying: PrimitiveType) -> Self {
        Self::new(name, TypeKind::Enum { underlying })
    }

    pub fn array(element: TypeRef) -> Self {
        let name = format!("{}[]", element.name());
        Self::new(name, TypeKind::Array { element })
    }

    pub fn pointer(pointee: TypeRef) -> Self {
        let name = format!("{}*", pointee.name());
        Self::new(name, TypeKind::Pointer { pointee })
    }

    pub fn type_parameter(name: impl Into<String>, constraints: TypeParamConstraints) -> Self {
        Self::new(name, TypeKind::TypeParameter(constraints))
    }

    // Representation predicates

    pub fn is_void(&self) -> bool {
        matches!(self.kind(), TypeKind::Void)
    }

    pub fn is_value_type(&self) -> bool {
        match self.kind() {
            TypeKind::Primitive(_)
            | TypeKind::Struct { .. }
            | TypeKind::Enum { .. }
            | TypeKind::Pointer { .. } => true,
            TypeKind::TypeParameter(c) => c.value_type,
            _ => false,
        }
    }

    pub fn is_reference_type(&self) -> bool {
        match self.kind() {
            TypeKind::Object
            | TypeKind::String
            | TypeKind::Class
            | TypeKind::Interface
            | TypeKind::Delegate
            | TypeKind::Array { .. } => true,
            TypeKind::TypeParameter(c) => c.reference_type,
            _ => false,
        }
    }

    /// Whether the verifier tracks values of this type as object references
    /// without boxing. Type parameters never qualify, even when constrained
    /// to reference types.
    pub fn is_verifier_reference(&self) -> bool {
        self.is_reference_type() && !matches!(self.kind(), TypeKind::TypeParameter(_))
    }

    /// Stack-only types, including type parameters that may be instantiated
    /// with one.
    pub fn is_ref_like(&self) -> bool {
        match self.kind() {
            TypeKind::Struct { ref_like, .. } => *ref_like,
            TypeKind::TypeParameter(c) => c.allows_ref_like,
            _ => false,
        }
    }

    pub fn is_readonly(&self) -> bool {
        matches!(self.kind(), TypeKind::Struct { readonly: true, .. })
    }

    pub fn is_delegate(&self) -> bool {
        matches!(self.kind(), TypeKind::Delegate)
    }

    pub fn is_pointer(&self) -> bool {
        matches!(self.kind(), TypeKind::Pointer { .. })
    }

    pub fn is_enum(&self) -> bool {
        matches!(self.kind(), TypeKind::Enum { .. })
    }

    /// The primitive layout of this type, looking through enums.
    pub fn primitive(&self) -> Option<PrimitiveType> {
        match self.kind() {
            TypeKind::Primitive(p) => Some(*p),
            TypeKind::Enum { underlying } => Some(*underlying),
            _ => None,
        }
    }

    /// Known size of the type in bytes. Anything without a fixed primitive
    /// layout reports `None` and is measured at runtime with `sizeof`.
    pub fn size_in_bytes(&self) -> Option<u32> {
        self.primitive().and_then(PrimitiveType::size_in_bytes)
    }

    /// Element type of arrays and pointee type of pointers.
    pub fn element_type(&self) -> Option<&TypeRef> {
        match self.kind() {
            TypeKind::Array { element } => Some(element),
            TypeKind::Pointer { pointee } => Some(pointee),
            _ => None,
        }
    }
}

impl fmt::Debug for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primitive_sizes() {
        assert_eq!(PrimitiveType::Boolean.size_in_bytes(), Some(1));
        assert_eq!(PrimitiveType::Char.size_in_bytes(), Some(2));
        assert_eq!(PrimitiveType::Float64.size_in_bytes(), Some(8));
        assert_eq!(PrimitiveType::IntPtr.size_in_bytes(), None);
        assert!(!PrimitiveType::UIntPtr.is_blittable());
    }

    #[test]
    fn test_verifier_reference() {
        assert!(TypeRef::object().is_verifier_reference());
        assert!(TypeRef::array(TypeRef::int32()).is_verifier_reference());
        assert!(!TypeRef::int32().is_verifier_reference());

        let class_param = TypeRef::type_parameter(
            "T",
            TypeParamConstraints { reference_type: true, ..Default::default() },
        );
        assert!(class_param.is_reference_type());
        assert!(!class_param.is_verifier_reference());
    }

    #[test]
    fn test_ref_like_and_readonly() {
        let span = TypeRef::ref_struct("Span", false);
        let ro_span = TypeRef::ref_struct("ReadOnlySpan", true);
        assert!(span.is_ref_like() && !span.is_readonly());
        assert!(ro_span.is_ref_like() && ro_span.is_readonly());
        assert!(!TypeRef::structure("Point").is_ref_like());
    }

    #[test]
    fn test_enum_primitive_layout() {
        let color = TypeRef::enumeration("Color", PrimitiveType::UInt8);
        assert_eq!(color.primitive(), Some(PrimitiveType::UInt8));
        assert_eq!(color.size_in_bytes(), Some(1));
        assert!(color.is_value_type());
    }

    #[test]
    fn test_structural_equality() {
        assert_eq!(TypeRef::class("Widget"), TypeRef::class("Widget"));
        assert_ne!(TypeRef::class("Widget"), TypeRef::structure("Widget"));
    }
}

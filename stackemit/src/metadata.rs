//! Symbol-table lookups and the module-level data blob table.
//!
//! Emission never builds metadata itself. It asks the [`SymbolTable`] for
//! members it needs by shape (delegate constructors, the blob-view helper)
//! and asks the shared [`ModuleBuilder`] for tokens naming embedded data.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use dashmap::DashMap;

use crate::model::{MethodData, MethodKind, MethodRef, Parameter, RefKind, TypeRef};

// ============================================================================
// Symbol table seam
// ============================================================================

/// Runtime helper that turns a data blob into a read-only view of `T` and
/// yields a pinnable reference to its first element.
#[derive(Debug, Clone)]
pub struct BlobViewHelper {
    /// Static method `(field handle) -> view`.
    pub create_view: MethodRef,
    /// The read-only view type, instantiated at the element type.
    pub view_type: TypeRef,
    /// Instance method on the view returning a read-only reference.
    pub pin_view: MethodRef,
}

/// Read-only member lookups, shared by all method-body workers.
pub trait SymbolTable: Send + Sync {
    /// Instance constructors declared on `ty`.
    fn instance_constructors(&self, ty: &TypeRef) -> Vec<MethodRef>;

    /// The blob-view helper instantiated at `element`, if the target
    /// runtime provides one.
    fn blob_view_helper(&self, element: &TypeRef) -> Option<BlobViewHelper>;
}

/// A [`SymbolTable`] populated up front, for drivers and tests.
#[derive(Debug, Default)]
pub struct InMemorySymbolTable {
    constructors: HashMap<TypeRef, Vec<MethodRef>>,
    has_blob_view_helper: bool,
}

impl InMemorySymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a constructor of `ty` taking `parameters`.
    pub fn add_constructor(&mut self, ty: &TypeRef, parameters: Vec<Parameter>) -> MethodRef {
        let mut data = MethodData::new(".ctor", ty.clone(), TypeRef::void());
        data.kind = MethodKind::Constructor;
        data.parameters = parameters;
        let ctor = MethodRef::new(data);
        self.constructors.entry(ty.clone()).or_default().push(ctor.clone());
        ctor
    }

    /// Register the standard `(object, native int)` delegate constructor.
    pub fn add_delegate_constructor(&mut self, delegate: &TypeRef) -> MethodRef {
        self.add_constructor(
            delegate,
            vec![
                Parameter::new("object", 0, TypeRef::object()),
                Parameter::new("method", 1, TypeRef::intptr()),
            ],
        )
    }

    /// Make the runtime's blob-view helper available.
    pub fn with_blob_view_helper(mut self) -> Self {
        self.has_blob_view_helper = true;
        self
    }
}

impl SymbolTable for InMemorySymbolTable {
    fn instance_constructors(&self, ty: &TypeRef) -> Vec<MethodRef> {
        self.constructors.get(ty).cloned().unwrap_or_default()
    }

    fn blob_view_helper(&self, element: &TypeRef) -> Option<BlobViewHelper> {
        if !self.has_blob_view_helper {
            return None;
        }

        let view_type = TypeRef::ref_struct(format!("ReadOnlySpan<{}>", element), true);

        let mut create = MethodData::new(
            format!("CreateSpan<{}>", element),
            TypeRef::class("RuntimeHelpers"),
            view_type.clone(),
        );
        create.is_static = true;
        create.parameters = vec![Parameter::new("fldHandle", 0, TypeRef::intptr())];

        let mut pin = MethodData::new("GetPinnableReference", view_type.clone(), element.clone());
        pin.return_ref_kind = RefKind::RefReadOnly;
        pin.is_effectively_readonly = true;

        Some(BlobViewHelper {
            create_view: MethodRef::new(create),
            view_type,
            pin_view: MethodRef::new(pin),
        })
    }
}

// ============================================================================
// Data blobs
// ============================================================================

/// Token naming an embedded constant data blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlobToken(pub u32);

impl fmt::Display for BlobToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "blob#{}", self.0)
    }
}

/// An embedded blob as it will be written to the module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataBlob {
    pub token: BlobToken,
    pub bytes: Arc<[u8]>,
    pub alignment: u16,
}

/// Module-wide table of embedded blobs.
///
/// Identical `(bytes, alignment)` pairs share one token, including when
/// requested concurrently by different method-body workers.
#[derive(Debug, Default)]
pub struct ModuleBuilder {
    blobs: DashMap<(Arc<[u8]>, u16), BlobToken>,
    next_token: AtomicU32,
}

impl ModuleBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get or create the blob holding `bytes`.
    pub fn blob_for(&self, bytes: &[u8], alignment: u16) -> BlobToken {
        *self
            .blobs
            .entry((Arc::from(bytes), alignment))
            .or_insert_with(|| {
                let token = BlobToken(self.next_token.fetch_add(1, Ordering::Relaxed));
                tracing::trace!(%token, len = bytes.len(), alignment, "new data blob");
                token
            })
    }

    pub fn blob_count(&self) -> usize {
        self.blobs.len()
    }

    /// All blobs, in token order.
    pub fn blobs(&self) -> Vec<DataBlob> {
        let mut blobs: Vec<_> = self
            .blobs
            .iter()
            .map(|entry| {
                let (bytes, alignment) = entry.key();
                DataBlob {
                    token: *entry.value(),
                    bytes: Arc::clone(bytes),
                    alignment: *alignment,
                }
            })
            .collect();
        blobs.sort_by_key(|blob| blob.token);
        blobs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blob_dedup() {
        let module = ModuleBuilder::new();
        let a = module.blob_for(&[1, 2, 3], 1);
        let b = module.blob_for(&[1, 2, 3], 1);
        let c = module.blob_for(&[1, 2, 3], 4);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(module.blob_count(), 2);
    }

    #[test]
    fn test_blobs_in_token_order() {
        let module = ModuleBuilder::new();
        module.blob_for(&[9], 1);
        module.blob_for(&[8], 1);
        let blobs = module.blobs();
        assert_eq!(blobs[0].token, BlobToken(0));
        assert_eq!(&*blobs[1].bytes, &[8]);
    }

    #[test]
    fn test_concurrent_blob_requests_share_token() {
        let module = Arc::new(ModuleBuilder::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let module = Arc::clone(&module);
                std::thread::spawn(move || module.blob_for(&[7, 7, 1, 2], 2))
            })
            .collect();
        let tokens: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(tokens.iter().all(|t| *t == tokens[0]));
        assert_eq!(module.blob_count(), 1);
    }

    #[test]
    fn test_delegate_constructor_lookup() {
        let mut table = InMemorySymbolTable::new();
        let handler = TypeRef::delegate("Handler");
        table.add_delegate_constructor(&handler);
        assert_eq!(table.instance_constructors(&handler).len(), 1);
        assert!(table.instance_constructors(&TypeRef::delegate("Other")).is_empty());
    }

    #[test]
    fn test_blob_view_helper_optional() {
        let element = TypeRef::int32();
        assert!(InMemorySymbolTable::new().blob_view_helper(&element).is_none());
        let helper = InMemorySymbolTable::new()
            .with_blob_view_helper()
            .blob_view_helper(&element)
            .unwrap();
        assert!(helper.view_type.is_ref_like());
        assert_eq!(helper.pin_view.return_ref_kind, RefKind::RefReadOnly);
    }
}

//! # Reference Escape Analysis
//!
//! After a call, a temporary passed by reference may be reused only if the
//! callee had no way to stash that reference somewhere that outlives the
//! call. Escaping requires a *source* (a stack-only value that may carry
//! references in) and a *target* (a slot the callee can write a reference
//! out through):
//!
//! | Slot | Source | Target |
//! |------|--------|--------|
//! | return value | never | observed, and by-ref or stack-only |
//! | parameter / receiver | stack-only type, unscoped | also writable by-ref, type not read-only |
//!
//! A receiver passed by read-only address is never a target. The verdict is
//! conservative: it only looks at the signature.

use crate::model::{AddressKind, MethodRef, Parameter, RefKind, ScopeKind, TypeRef};

#[derive(Debug, Default)]
struct CaptureCounts {
    sources: u32,
    targets: u32,
}

impl CaptureCounts {
    fn may_capture(&self) -> bool {
        self.sources > 0 && self.targets > 0
    }

    /// Record a parameter; returns the running verdict.
    fn add_parameter(&mut self, param: &Parameter, read_only_address: bool) -> bool {
        if param.ty.is_ref_like() && param.scope == ScopeKind::Unscoped {
            self.sources += 1;
            if param.ref_kind.is_writable_reference() && !param.ty.is_readonly() && !read_only_address
            {
                self.targets += 1;
            }
        }
        self.may_capture()
    }
}

/// Whether a call with this signature might capture a reference to one of
/// its by-reference argument temporaries.
pub fn might_escape_temporary_refs(
    used: bool,
    return_type: &TypeRef,
    return_ref_kind: RefKind,
    this_param: Option<&Parameter>,
    receiver_address_kind: Option<AddressKind>,
    parameters: &[Parameter],
) -> bool {
    let mut counts = CaptureCounts::default();

    if used && (return_ref_kind.is_by_ref() || return_type.is_ref_like()) {
        counts.targets += 1;
    }

    if let Some(this_param) = this_param {
        let read_only_address = receiver_address_kind.is_some_and(AddressKind::is_any_read_only);
        if counts.add_parameter(this_param, read_only_address) {
            return true;
        }
    }

    parameters.iter().any(|param| counts.add_parameter(param, false))
}

/// [`might_escape_temporary_refs`] for a call to `method`.
pub fn call_might_escape(
    method: &MethodRef,
    used: bool,
    receiver_address_kind: Option<AddressKind>,
) -> bool {
    let this_param = method.this_parameter();
    let verdict = might_escape_temporary_refs(
        used,
        &method.return_type,
        method.return_ref_kind,
        this_param.as_ref(),
        receiver_address_kind,
        &method.parameters,
    );
    tracing::trace!(%method, used, verdict, "escape query");
    verdict
}

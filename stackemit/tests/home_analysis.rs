//! Addressability scenarios, checked through the public `has_home` entry
//! point and through the address each verdict leads to.

mod common;

use std::collections::HashSet;

use common::*;
use stackemit::config::EmitOptions;
use stackemit::emit::{has_home, SlotState};
use stackemit::metadata::InMemorySymbolTable;
use stackemit::model::{
    AddressKind, Expr, ExprKind, FieldData, FieldRef, LocalId, MethodContext, MethodKind, RefKind,
    TypeRef,
};

const ALL_KINDS: [AddressKind; 4] = [
    AddressKind::Writable,
    AddressKind::Constrained,
    AddressKind::ReadOnly,
    AddressKind::ReadOnlyStrict,
];

fn home(expr: &Expr, kind: AddressKind, method: &MethodContext) -> bool {
    has_home(expr, kind, method, false, &HashSet::new())
}

#[test]
fn test_read_only_ordering() {
    assert!(AddressKind::ReadOnly.is_any_read_only());
    assert!(AddressKind::ReadOnlyStrict.is_any_read_only());
    assert!(!AddressKind::Writable.is_any_read_only());
    assert!(!AddressKind::Constrained.is_any_read_only());
}

#[test]
fn test_stack_resident_locals() {
    let method = class_method("Program");
    let stack_locals: HashSet<_> = [LocalId::new(0)].into_iter().collect();

    let by_value = local(0, TypeRef::int32());
    let by_ref = ref_local(0, TypeRef::int32(), RefKind::Ref);

    for kind in ALL_KINDS {
        assert!(!has_home(&by_value, kind, &method, false, &stack_locals));
        assert!(has_home(&by_ref, kind, &method, false, &stack_locals));
        assert!(has_home(&by_ref, kind, &method, false, &HashSet::new()));
    }
}

#[test]
fn test_ref_readonly_local_is_read_only() {
    let method = class_method("Program");
    let alias = ref_local(3, TypeRef::int32(), RefKind::RefReadOnly);
    assert!(!home(&alias, AddressKind::Writable, &method));
    assert!(!home(&alias, AddressKind::Constrained, &method));
    assert!(home(&alias, AddressKind::ReadOnly, &method));
}

#[test]
fn test_in_parameter_needs_read_only_use() {
    let method = class_method("Program");
    for mode in [RefKind::In, RefKind::RefReadOnlyParam] {
        let p = param(0, TypeRef::int32(), mode);
        assert!(!home(&p, AddressKind::Writable, &method));
        assert!(home(&p, AddressKind::ReadOnlyStrict, &method));
    }
    let plain = param(0, TypeRef::int32(), RefKind::None);
    assert!(home(&plain, AddressKind::Writable, &method));
}

#[test]
fn test_this_in_readonly_struct_method() {
    let point = TypeRef::structure("Point");
    let readonly_method = readonly_struct_method(&point);
    let this = Expr::this(point.clone());

    assert!(!home(&this, AddressKind::Writable, &readonly_method));
    assert!(!home(&this, AddressKind::Constrained, &readonly_method));
    assert!(home(&this, AddressKind::ReadOnly, &readonly_method));
    assert!(home(&this, AddressKind::Writable, &MethodContext::ordinary(point.clone())));

    // Being a constructor does not reopen a read-only `this`.
    let readonly_ctor = MethodContext { kind: MethodKind::Constructor, ..readonly_method.clone() };
    assert!(!home(&this, AddressKind::Writable, &readonly_ctor));
    assert!(home(&this, AddressKind::ReadOnlyStrict, &readonly_ctor));

    let widget = TypeRef::class("Widget");
    assert!(home(&Expr::this(widget.clone()), AddressKind::Writable, &class_method("Widget")));
}

#[test]
fn test_covariant_array_element_in_verifier_mode() {
    let method = class_method("Program");
    let strings = Expr::array_element(local(0, TypeRef::array(TypeRef::string())), Expr::int32(0));
    let ints = Expr::array_element(local(1, TypeRef::array(TypeRef::int32())), Expr::int32(0));

    assert!(!has_home(&strings, AddressKind::ReadOnly, &method, true, &HashSet::new()));
    assert!(has_home(&strings, AddressKind::ReadOnly, &method, false, &HashSet::new()));
    assert!(has_home(&strings, AddressKind::Writable, &method, true, &HashSet::new()));
    assert!(has_home(&ints, AddressKind::ReadOnly, &method, true, &HashSet::new()));
}

#[test]
fn test_call_returns() {
    let method = class_method("Program");
    let by_ref = Expr::call(None, ref_returning("Get", TypeRef::int32(), RefKind::Ref), vec![]);
    let by_readonly_ref =
        Expr::call(None, ref_returning("Peek", TypeRef::int32(), RefKind::RefReadOnly), vec![]);
    let by_value = Expr::call(None, static_method("Make", TypeRef::int32(), vec![]), vec![]);

    for kind in ALL_KINDS {
        assert!(home(&by_ref, kind, &method));
        assert_eq!(home(&by_readonly_ref, kind, &method), kind.is_any_read_only());
        assert!(!home(&by_value, kind, &method));
    }
}

#[test]
fn test_assignments() {
    let method = class_method("Program");
    let target = ref_local(0, TypeRef::int32(), RefKind::Ref);
    let readonly_target = ref_local(1, TypeRef::int32(), RefKind::RefReadOnly);
    let source = local(2, TypeRef::int32());

    let value = Expr::assignment(local(3, TypeRef::int32()), Expr::int32(1), false);
    let rebind = Expr::assignment(target, source.clone(), true);
    let readonly_rebind = Expr::assignment(readonly_target, source, true);

    for kind in ALL_KINDS {
        assert!(!home(&value, kind, &method));
        assert!(home(&rebind, kind, &method));
        assert_eq!(home(&readonly_rebind, kind, &method), kind.is_any_read_only());
    }
}

#[test]
fn test_sequence_uses_value_home() {
    let method = class_method("Program");
    let seq = Expr::sequence(vec![], vec![Expr::int32(1)], local(0, TypeRef::int32()));
    let literal_seq = Expr::sequence(vec![], vec![], Expr::int32(1));
    assert!(home(&seq, AddressKind::Writable, &method));
    assert!(!home(&literal_seq, AddressKind::ReadOnly, &method));
}

#[test]
fn test_value_conditional_never_has_home() {
    let method = class_method("Program");
    let cond = Expr::conditional(
        local(0, TypeRef::boolean()),
        local(1, TypeRef::int32()),
        local(2, TypeRef::int32()),
        false,
    );
    for kind in ALL_KINDS {
        assert!(!home(&cond, kind, &method));
    }
}

#[test]
fn test_rvalues_never_have_home() {
    let method = class_method("Program");
    let literal = Expr::int32(4);
    let conversion = Expr::conversion(
        local(0, TypeRef::int32()),
        stackemit::model::ConversionKind::Boxing,
        TypeRef::object(),
    );
    for kind in ALL_KINDS {
        assert!(!home(&literal, kind, &method));
        assert!(!home(&conversion, kind, &method));
    }
}

// ============================================================================
// Fields
// ============================================================================

#[test]
fn test_field_through_writable_receiver() {
    let method = class_method("Program");
    let point = TypeRef::structure("Point");
    let x = mutable_field(&point, "X", TypeRef::int32());

    let through_local = Expr::field(Some(local(0, point.clone())), x.clone());
    assert!(home(&through_local, AddressKind::Writable, &method));

    let readonly_alias = ref_local(1, point, RefKind::RefReadOnly);
    let through_alias = Expr::field(Some(readonly_alias), x);
    assert!(!home(&through_alias, AddressKind::Writable, &method));
    assert!(home(&through_alias, AddressKind::ReadOnly, &method));
}

#[test]
fn test_field_through_homeless_receiver_is_spilled_above() {
    let method = class_method("Program");
    let point = TypeRef::structure("Point");
    let x = mutable_field(&point, "X", TypeRef::int32());
    let make = static_method("MakePoint", point, vec![]);

    let through_call = Expr::field(Some(Expr::call(None, make, vec![])), x);
    assert!(home(&through_call, AddressKind::Writable, &method));
}

#[test]
fn test_field_leaf_rules() {
    let method = class_method("Program");
    let owner = TypeRef::class("Program");
    let this = || Some(Expr::this(owner.clone()));

    let constant = FieldRef::new(FieldData {
        is_const: true,
        ..FieldData::instance("Max", owner.clone(), TypeRef::int32())
    });
    let ref_field = FieldRef::new(FieldData {
        ref_kind: RefKind::Ref,
        ..FieldData::instance("target", owner.clone(), TypeRef::int32())
    });
    let readonly_ref_field = FieldRef::new(FieldData {
        ref_kind: RefKind::RefReadOnly,
        ..FieldData::instance("view", owner.clone(), TypeRef::int32())
    });

    for kind in ALL_KINDS {
        assert!(!home(&Expr::field(this(), constant.clone()), kind, &method));
        assert!(home(&Expr::field(this(), ref_field.clone()), kind, &method));
    }
    assert!(!home(&Expr::field(this(), readonly_ref_field.clone()), AddressKind::Writable, &method));
    assert!(home(&Expr::field(this(), readonly_ref_field), AddressKind::ReadOnlyStrict, &method));
}

#[test]
fn test_by_value_field_access() {
    let method = class_method("Program");
    let owner = TypeRef::class("Program");
    let count = mutable_field(&owner, "count", TypeRef::int32());
    let access = Expr::new(
        ExprKind::FieldAccess {
            receiver: Some(Box::new(Expr::this(owner))),
            field: count,
            by_value: true,
        },
        TypeRef::int32(),
    );
    assert!(!home(&access, AddressKind::Writable, &method));
    assert!(home(&access, AddressKind::ReadOnlyStrict, &method));
}

#[test]
fn test_readonly_fields_during_construction() {
    let owner = TypeRef::class("Config");
    let other = TypeRef::class("Other");
    let limit = readonly_field(&owner, "limit", TypeRef::int32());
    let shared = static_readonly_field(&owner, "Shared", TypeRef::int32());

    let via_this = Expr::field(Some(Expr::this(owner.clone())), limit.clone());
    let via_local = Expr::field(Some(local(0, owner.clone())), limit);
    let static_access = Expr::field(None, shared);

    let ctor = method_of_kind(owner.clone(), MethodKind::Constructor);
    let init = method_of_kind(owner.clone(), MethodKind::InitOnlyMutator);
    let cctor = method_of_kind(owner.clone(), MethodKind::StaticConstructor);
    let ordinary = MethodContext::ordinary(owner);
    let foreign_ctor = method_of_kind(other, MethodKind::Constructor);

    assert!(home(&via_this, AddressKind::Writable, &ctor));
    assert!(home(&via_this, AddressKind::Writable, &init));
    assert!(!home(&via_this, AddressKind::Writable, &ordinary));
    assert!(!home(&via_this, AddressKind::Writable, &cctor));
    assert!(!home(&via_this, AddressKind::Writable, &foreign_ctor));
    assert!(!home(&via_local, AddressKind::Writable, &ctor));

    assert!(home(&static_access, AddressKind::Writable, &cctor));
    assert!(!home(&static_access, AddressKind::Writable, &ctor));
    assert!(home(&static_access, AddressKind::ReadOnly, &ordinary));
}

#[test]
fn test_verifier_mode_copies_readonly_fields() {
    let method = class_method("Program");
    let owner = TypeRef::class("Program");
    let limit = readonly_field(&owner, "limit", TypeRef::int32());
    let access = Expr::field(Some(Expr::this(owner)), limit);

    assert!(!has_home(&access, AddressKind::ReadOnly, &method, true, &HashSet::new()));
    assert!(has_home(&access, AddressKind::ReadOnlyStrict, &method, true, &HashSet::new()));
}

// ============================================================================
// Verdicts drive emission
// ============================================================================

#[test]
fn test_homeless_field_is_copied_not_the_receiver() {
    let harness = Harness::new(InMemorySymbolTable::new());
    let point = TypeRef::structure("Point");
    let x = mutable_field(&point, "X", TypeRef::int32());
    let alias = ref_local(0, point, RefKind::RefReadOnly);
    let access = Expr::field(Some(alias), x);

    let mut generator = harness.generator(class_method("Program"));
    let temp = generator.emit_address(&access, AddressKind::Writable).unwrap();

    assert_eq!(
        listing(&generator),
        ["ldloc V_0", "ldfld Point::X", "stloc V_1", "ldloca V_1"]
    );
    assert_eq!(generator.slots().state(temp.unwrap()), Some(SlotState::TempInUse));
}

#[test]
fn test_verifier_mode_array_read_copies_element() {
    let harness = Harness::new(InMemorySymbolTable::new())
        .with_options(EmitOptions::default().with_verifier_compat(true));
    let element = Expr::array_element(local(0, TypeRef::array(TypeRef::string())), Expr::int32(1));

    let mut generator = harness.generator(class_method("Program"));
    let temp = generator.emit_address(&element, AddressKind::ReadOnly).unwrap();

    assert!(temp.is_some());
    assert_eq!(
        listing(&generator),
        ["ldloc V_0", "ldc.i4 1", "ldelem string", "stloc V_1", "ldloca V_1"]
    );
}

#![allow(
    clippy::unwrap_used,
    reason = "test code uses unwrap/expect for concise assertions"
)]

use std::sync::Arc;

use kiln_diagnostic::FaultKind;
use kiln_ir::{AtomId, Clid, Slot, Span, StringInterner};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

use super::names::canonicalize;
use super::overload::resolve_call;
use super::*;

fn table() -> AtomTable {
    AtomTable::new(Arc::new(StringInterner::new()))
}

fn function(
    atoms: &mut AtomTable,
    scope: AtomId,
    name: &str,
    params: &[TypeId],
    ret: TypeId,
) -> AtomId {
    let id = atoms
        .declare(scope, name, AtomKind::Function, Span::DUMMY)
        .unwrap();
    atoms.set_signature(id, params, ret).unwrap();
    id
}

// Type pool

#[test]
fn primitives_are_preinterned_at_fixed_handles() {
    let mut pool = TypePool::new();
    assert_eq!(pool.len(), TypeId::PRIMITIVE_COUNT as usize);
    assert_eq!(pool.intern(TypeData::Int(IntKind::new(64, true))), TypeId::INT);
    assert_eq!(pool.intern(TypeData::Float { bits: 64 }), TypeId::FLOAT);
    assert_eq!(TypePool::primitive_by_name("i64"), Some(TypeId::INT));
    assert_eq!(TypePool::primitive_by_name("byte"), Some(TypeId::BYTE));
    assert_eq!(TypePool::primitive_by_name("Point"), None);
}

#[test]
fn composite_types_intern_once() {
    let mut pool = TypePool::new();
    let a = pool.function(&[TypeId::INT, TypeId::STR], TypeId::VOID);
    let b = pool.function(&[TypeId::INT, TypeId::STR], TypeId::VOID);
    let c = pool.function(&[TypeId::INT], TypeId::VOID);
    assert_eq!(a, b);
    assert_ne!(a, c);
    assert_eq!(pool.signature(a), Some((&[TypeId::INT, TypeId::STR][..], TypeId::VOID)));
    let class = pool.class(AtomId::new(3));
    assert_eq!(pool.class_atom(class), Some(AtomId::new(3)));
    assert_eq!(
        pool.describe(a, &|atom| atom.to_string()),
        "fn(int, str) -> void"
    );
}

#[test]
fn int_bounds_follow_width_and_signedness() {
    assert_eq!(IntKind::new(8, true).bounds(), (-128, 127));
    assert_eq!(IntKind::new(8, false).bounds(), (0, 255));
    assert_eq!(
        IntKind::new(64, false).bounds(),
        (0, i128::from(u64::MAX))
    );
    assert!(IntKind::new(16, true).contains(-32768));
    assert!(!IntKind::new(16, true).contains(32768));
}

#[test]
fn cast_table() {
    let pool = TypePool::new();
    assert!(pool.cast_allowed(TypeId::INT, TypeId::FLOAT));
    assert!(pool.cast_allowed(TypeId::BOOL, TypeId::BYTE));
    assert!(pool.cast_allowed(TypeId::STR, TypeId::INT));
    assert!(pool.cast_allowed(TypeId::FLOAT, TypeId::STR));
    assert!(!pool.cast_allowed(TypeId::STR, TypeId::BOOL));
    assert!(!pool.cast_allowed(TypeId::VOID, TypeId::INT));
}

// Names

#[test]
fn canonicalize_plain_and_operator_names() {
    assert_eq!(canonicalize("total_2").unwrap(), "total_2");
    assert_eq!(canonicalize("operator+").unwrap(), "operator+");
    assert_eq!(canonicalize("operator ==").unwrap(), "operator==");
    assert_eq!(canonicalize("operator add").unwrap(), "operator+");
    assert_eq!(canonicalize("operator_index").unwrap(), "operator[]");
    assert_eq!(canonicalize("operatorshl").unwrap(), "operator<<");
    assert_eq!(canonicalize("operator_count").unwrap(), "operator_count");
}

#[test]
fn canonicalize_rejects_reserved_and_malformed_names() {
    for bad in ["while", "fn", "operator", "operator plus", "2fast", "a-b", ""] {
        let err = canonicalize(bad).unwrap_err();
        assert_eq!(err.kind(), FaultKind::InvalidIdentifier, "{bad:?}");
    }
}

// Overload resolution

fn candidate(atom: u32, params: &[TypeId], pool: &mut TypePool) -> Candidate {
    Candidate {
        atom: AtomId::new(atom),
        params: params.into(),
        ret: TypeId::VOID,
        ty: pool.function(params, TypeId::VOID),
    }
}

#[test]
fn overloads_filter_by_arity_then_exact_type() {
    let mut pool = TypePool::new();
    let set = vec![
        candidate(1, &[TypeId::INT], &mut pool),
        candidate(2, &[TypeId::FLOAT], &mut pool),
        candidate(3, &[TypeId::INT, TypeId::INT], &mut pool),
    ];
    assert_eq!(resolve_call(&set, &[Some(TypeId::INT)]).unwrap().atom, AtomId::new(1));
    assert_eq!(resolve_call(&set, &[Some(TypeId::FLOAT)]).unwrap().atom, AtomId::new(2));
    assert!(resolve_call(&set, &[Some(TypeId::STR)]).is_err());
    // no implicit widening from i32 to int
    assert!(resolve_call(&set, &[Some(TypeId::I32)]).is_err());
}

#[test]
fn most_specific_overload_wins_over_any() {
    let mut pool = TypePool::new();
    let set = vec![
        candidate(1, &[TypeId::ANY, TypeId::ANY], &mut pool),
        candidate(2, &[TypeId::INT, TypeId::ANY], &mut pool),
    ];
    let args = [Some(TypeId::INT), Some(TypeId::STR)];
    assert_eq!(resolve_call(&set, &args).unwrap().atom, AtomId::new(2));
}

#[test]
fn crossing_specificity_is_ambiguous() {
    let mut pool = TypePool::new();
    let set = vec![
        candidate(1, &[TypeId::INT, TypeId::ANY], &mut pool),
        candidate(2, &[TypeId::ANY, TypeId::INT], &mut pool),
    ];
    let args = [Some(TypeId::INT), Some(TypeId::INT)];
    assert_eq!(
        resolve_call(&set, &args).unwrap_err(),
        overload::OverloadError::Ambiguous(vec![AtomId::new(1), AtomId::new(2)])
    );
}

// Classdefs

#[test]
fn unresolved_adopts_then_concrete_rejects_other_types() {
    let pool = TypePool::new();
    let mut defs = ClassdefTable::new();
    let x = defs.declare(AtomId::new(1));
    assert_eq!(defs.resolve(x), Resolution::Pending);
    assert_eq!(defs.unify(&pool, x, TypeId::INT).unwrap(), TypeId::INT);
    // idempotent
    assert_eq!(defs.unify(&pool, x, TypeId::INT).unwrap(), TypeId::INT);
    let err = defs.unify(&pool, x, TypeId::FLOAT).unwrap_err();
    assert_eq!(err.kind(), FaultKind::TypeConflict);
    assert_eq!(defs.resolve(x), Resolution::Concrete(TypeId::INT));
}

#[test]
fn slots_are_numbered_per_atom() {
    let mut defs = ClassdefTable::new();
    let a = AtomId::new(1);
    let b = AtomId::new(2);
    assert_eq!(defs.declare(a), Clid::new(a, Slot::new(0)));
    assert_eq!(defs.declare(a), Clid::new(a, Slot::new(1)));
    assert_eq!(defs.declare(b), Clid::new(b, Slot::new(0)));
    assert_eq!(defs.slot_count(a), 2);
    assert_eq!(defs.matching(Clid::any(a)).count(), 2);
    assert!(!defs.contains(Clid::any(a)));
}

#[test]
fn linked_slots_resolve_together() {
    let pool = TypePool::new();
    let mut defs = ClassdefTable::new();
    let atom = AtomId::new(1);
    let x = defs.declare(atom);
    let y = defs.declare(atom);
    let z = defs.declare(atom);
    defs.unify_slots(&pool, y, x).unwrap();
    defs.unify_slots(&pool, z, y).unwrap();
    defs.unify(&pool, x, TypeId::STR).unwrap();
    assert_eq!(defs.concrete(y), Some(TypeId::STR));
    assert_eq!(defs.concrete(z), Some(TypeId::STR));
    assert!(defs.lingering(atom).is_empty());
}

#[test]
fn overloaded_slot_collapses_by_call_shape() {
    let mut pool = TypePool::new();
    let mut defs = ClassdefTable::new();
    let f = defs.declare(AtomId::new(9));
    let set = vec![
        candidate(1, &[TypeId::INT], &mut pool),
        candidate(2, &[TypeId::FLOAT], &mut pool),
    ];
    defs.mark_overloaded(&pool, f, set).unwrap();
    assert_eq!(defs.resolve(f), Resolution::Pending);
    assert_eq!(
        defs.lingering(AtomId::new(9)),
        vec![(Slot::new(0), Lingering::Overloaded { candidates: 2 })]
    );

    let shape = defs.unify_call(&pool, f, &[Some(TypeId::FLOAT)]).unwrap();
    assert_eq!(shape.atom, Some(AtomId::new(2)));
    assert_eq!(defs.resolution(f), Some(AtomId::new(2)));
    let float_fn = pool.function(&[TypeId::FLOAT], TypeId::VOID);
    assert_eq!(defs.concrete(f), Some(float_fn));

    // once collapsed, the other shape conflicts
    let err = defs.unify_call(&pool, f, &[Some(TypeId::INT)]).unwrap_err();
    assert_eq!(err.kind(), FaultKind::TypeConflict);
}

#[test]
fn overloaded_slot_collapses_by_function_type() {
    let mut pool = TypePool::new();
    let mut defs = ClassdefTable::new();
    let f = defs.declare(AtomId::new(9));
    let set = vec![
        candidate(1, &[TypeId::INT], &mut pool),
        candidate(2, &[TypeId::STR], &mut pool),
    ];
    let str_fn = set[1].ty;
    defs.mark_overloaded(&pool, f, set).unwrap();
    defs.unify(&pool, f, str_fn).unwrap();
    assert_eq!(defs.resolution(f), Some(AtomId::new(2)));

    let g = defs.declare(AtomId::new(9));
    let set = vec![
        candidate(1, &[TypeId::INT], &mut pool),
        candidate(2, &[TypeId::STR], &mut pool),
    ];
    defs.mark_overloaded(&pool, g, set).unwrap();
    let err = defs.unify(&pool, g, TypeId::INT).unwrap_err();
    assert_eq!(err, UnifyError::NotCallable { found: TypeId::INT });
}

#[test]
fn overloaded_slots_intersect() {
    let mut pool = TypePool::new();
    let mut defs = ClassdefTable::new();
    let atom = AtomId::new(4);
    let a = defs.declare(atom);
    let b = defs.declare(atom);
    let c1 = candidate(1, &[TypeId::INT], &mut pool);
    let c2 = candidate(2, &[TypeId::FLOAT], &mut pool);
    let c3 = candidate(3, &[TypeId::STR], &mut pool);
    defs.mark_overloaded(&pool, a, vec![c1.clone(), c2.clone()]).unwrap();
    defs.mark_overloaded(&pool, b, vec![c2.clone(), c3]).unwrap();
    defs.unify_slots(&pool, a, b).unwrap();
    assert_eq!(defs.concrete(a), Some(c2.ty));
    assert_eq!(defs.resolution(b), Some(AtomId::new(2)));
}

#[test]
fn calling_unresolved_slot_is_uninferred() {
    let pool = TypePool::new();
    let mut defs = ClassdefTable::new();
    let f = defs.declare(AtomId::new(1));
    let err = defs.unify_call(&pool, f, &[]).unwrap_err();
    assert_eq!(err.kind(), FaultKind::UninferredType);
}

#[test]
fn freeze_reports_lingering_slots_as_error_type() {
    let pool = TypePool::new();
    let mut defs = ClassdefTable::new();
    let atom = AtomId::new(2);
    let a = defs.declare(atom);
    let _b = defs.declare(atom);
    defs.unify(&pool, a, TypeId::BOOL).unwrap();
    assert_eq!(
        defs.lingering(atom),
        vec![(Slot::new(1), Lingering::Unresolved)]
    );
    let frozen = defs.freeze(atom);
    assert_eq!(&*frozen, &[TypeId::BOOL, TypeId::ERROR]);
    assert_eq!(defs.frozen(atom).map(|f| f.len()), Some(2));
}

#[test]
fn poison_closes_open_slots_after_a_point() {
    let pool = TypePool::new();
    let mut defs = ClassdefTable::new();
    let atom = AtomId::new(2);
    let a = defs.declare(atom);
    let b = defs.declare(atom);
    let c = defs.declare(atom);
    defs.unify(&pool, b, TypeId::INT).unwrap();
    defs.poison_from(atom, Slot::new(1));
    assert_eq!(defs.resolve(a), Resolution::Pending);
    assert_eq!(defs.resolve(b), Resolution::Concrete(TypeId::INT));
    assert_eq!(defs.resolve(c), Resolution::Conflict);
}

fn primitive() -> impl Strategy<Value = TypeId> {
    (0..TypeId::ANY.raw()).prop_map(TypeId::from_raw)
}

proptest! {
    #[test]
    fn unify_slots_is_commutative(ta in proptest::option::of(primitive()), tb in proptest::option::of(primitive())) {
        let pool = TypePool::new();
        let run = |swap: bool| {
            let mut defs = ClassdefTable::new();
            let atom = AtomId::new(1);
            let a = defs.declare(atom);
            let b = defs.declare(atom);
            if let Some(t) = ta { defs.unify(&pool, a, t).unwrap(); }
            if let Some(t) = tb { defs.unify(&pool, b, t).unwrap(); }
            let outcome = if swap { defs.unify_slots(&pool, b, a) } else { defs.unify_slots(&pool, a, b) };
            (outcome.is_ok(), defs.resolve(a), defs.resolve(b))
        };
        prop_assert_eq!(run(false), run(true));
    }

    #[test]
    fn unify_is_idempotent(t in primitive()) {
        let pool = TypePool::new();
        let mut defs = ClassdefTable::new();
        let a = defs.declare(AtomId::new(1));
        let first = defs.unify(&pool, a, t).unwrap();
        let second = defs.unify(&pool, a, t).unwrap();
        prop_assert_eq!(first, second);
        prop_assert_eq!(defs.resolve(a), Resolution::Concrete(t));
    }

    #[test]
    fn overload_resolution_ignores_candidate_order(
        params in proptest::collection::vec(proptest::collection::vec(prop_oneof![Just(TypeId::ANY), Just(TypeId::INT), Just(TypeId::STR)], 2), 1..5),
        args in proptest::collection::vec(proptest::option::of(prop_oneof![Just(TypeId::INT), Just(TypeId::STR)]), 2),
    ) {
        let mut pool = TypePool::new();
        let set: Vec<_> = params
            .iter()
            .enumerate()
            .map(|(i, p)| candidate(u32::try_from(i).unwrap(), p, &mut pool))
            .collect();
        let mut reversed = set.clone();
        reversed.reverse();
        let forward = resolve_call(&set, &args).map(|c| c.atom);
        let backward = resolve_call(&reversed, &args).map(|c| c.atom);
        prop_assert_eq!(forward, backward);
    }
}

// Atom table

#[test]
fn overload_scenario_int_float_str() {
    let mut atoms = table();
    let root = atoms.root();
    let f_int = function(&mut atoms, root, "f", &[TypeId::INT], TypeId::INT);
    let f_float = function(&mut atoms, root, "f", &[TypeId::FLOAT], TypeId::FLOAT);

    assert_eq!(atoms.resolve_call(root, "f", &[Some(TypeId::INT)]), Ok(f_int));
    assert_eq!(atoms.resolve_call(root, "f", &[Some(TypeId::FLOAT)]), Ok(f_float));
    let err = atoms.resolve_call(root, "f", &[Some(TypeId::STR)]).unwrap_err();
    assert_eq!(err.kind(), FaultKind::NoMatchingOverload);
}

#[test]
fn identical_signatures_are_duplicates() {
    let mut atoms = table();
    let root = atoms.root();
    function(&mut atoms, root, "f", &[TypeId::INT], TypeId::INT);
    let again = atoms
        .declare(root, "f", AtomKind::Function, Span::DUMMY)
        .unwrap();
    let err = atoms.set_signature(again, &[TypeId::INT], TypeId::VOID).unwrap_err();
    assert!(matches!(err, ResolveError::Duplicate { .. }));
}

#[test]
fn inner_scope_shadows_instead_of_merging() {
    let mut atoms = table();
    let root = atoms.root();
    function(&mut atoms, root, "f", &[TypeId::INT], TypeId::INT);
    let ns = atoms
        .declare(root, "inner", AtomKind::Namespace, Span::DUMMY)
        .unwrap();
    let inner_f = function(&mut atoms, ns, "f", &[TypeId::STR], TypeId::VOID);

    let name = atoms.interner().get("f").unwrap();
    assert_eq!(atoms.lookup(ns, name), &[inner_f]);
    // the outer int overload is hidden from inside the namespace
    let err = atoms.resolve_call(ns, "f", &[Some(TypeId::INT)]).unwrap_err();
    assert_eq!(err.kind(), FaultKind::NoMatchingOverload);
}

#[test]
fn namespaces_reopen_and_qualified_lookup_descends() {
    let mut atoms = table();
    let root = atoms.root();
    let geo = atoms
        .declare(root, "geo", AtomKind::Namespace, Span::DUMMY)
        .unwrap();
    let again = atoms
        .declare(root, "geo", AtomKind::Namespace, Span::DUMMY)
        .unwrap();
    assert_eq!(geo, again);

    let point = atoms
        .declare(geo, "Point", AtomKind::Class, Span::DUMMY)
        .unwrap();
    let len = function(&mut atoms, point, "len", &[TypeId::INT], TypeId::FLOAT);
    assert_eq!(atoms.lookup_path(root, "geo::Point::len").unwrap().as_slice(), &[len]);
    assert_eq!(atoms.qualified_name(len), "geo::Point::len");

    // members are not found through the scope chain from outside
    assert!(atoms.lookup_path(root, "len").is_err());
    assert!(matches!(
        atoms.lookup_path(root, "geo::Point::len::Point"),
        Err(ResolveError::NotAScope { .. })
    ));
    assert!(matches!(
        atoms.lookup_path(root, "geo::Line"),
        Err(ResolveError::Unknown { .. })
    ));
}

#[test]
fn classes_and_variables_cannot_share_names() {
    let mut atoms = table();
    let root = atoms.root();
    atoms
        .declare(root, "Point", AtomKind::Class, Span::DUMMY)
        .unwrap();
    let err = atoms
        .declare(root, "Point", AtomKind::Function, Span::DUMMY)
        .unwrap_err();
    assert_eq!(err.kind(), FaultKind::InvalidIdentifier);
    let err = atoms
        .declare(root, "let", AtomKind::Variable, Span::DUMMY)
        .unwrap_err();
    assert_eq!(err.kind(), FaultKind::InvalidIdentifier);
}

#[test]
fn operator_names_resolve_through_any_spelling() {
    let mut atoms = table();
    let root = atoms.root();
    let add = atoms
        .declare(root, "operator add", AtomKind::Function, Span::DUMMY)
        .unwrap();
    assert_eq!(atoms.name_of(add), "operator+");
    assert_eq!(atoms.lookup_path(root, "operator+").unwrap().as_slice(), &[add]);
}

#[test]
fn hidden_atoms_are_not_looked_up() {
    let mut atoms = table();
    let root = atoms.root();
    let init = atoms.declare_hidden(root, "{init}", AtomKind::Function, Span::DUMMY);
    assert_eq!(atoms.name_of(init), "{init}");
    assert!(atoms.lookup_path(root, "{init}").is_err());
}

#[test]
fn explain_renders_type_names() {
    let mut atoms = table();
    let root = atoms.root();
    let point = atoms
        .declare(root, "Point", AtomKind::Class, Span::DUMMY)
        .unwrap();
    let ty = atoms.class_type(point);
    let msg = atoms.explain_unify(&UnifyError::Conflict {
        expected: TypeId::INT,
        found: ty,
    });
    assert_eq!(msg, "type conflict: expected `int`, found `Point`");
}

// Intrinsics

#[test]
fn standard_registry_contents() {
    let registry = IntrinsicRegistry::standard();
    assert_eq!(
        registry.names(),
        vec!["abs", "argc", "argv", "concat", "int_to_str", "print", "println", "sqrt", "str_len"]
    );
    let concat = registry.lookup("concat").unwrap();
    assert_eq!(concat.arity(), 2);
    assert_eq!(concat.ret, TypeId::STR);
    assert!(registry.lookup("exit").is_none());
}

#[test]
fn registering_twice_is_rejected() {
    let mut registry = IntrinsicRegistry::new();
    registry.register("clock", &[], TypeId::FLOAT).unwrap();
    assert!(matches!(
        registry.register("clock", &[], TypeId::FLOAT),
        Err(RegistryError::Duplicate { .. })
    ));
    assert!(matches!(
        registry.register("id", &[TypeId::ANY], TypeId::ANY),
        Err(RegistryError::AnyReturn { .. })
    ));
}

#![allow(
    clippy::unwrap_used,
    reason = "test code uses unwrap/expect for concise assertions"
)]

use super::*;

#[test]
fn interner_round_trips_and_dedups() {
    let interner = StringInterner::new();
    let a = interner.intern("main");
    let b = interner.intern("main");
    assert_eq!(a, b);
    assert_eq!(interner.lookup(a), "main");
    assert_eq!(interner.lookup(Name::EMPTY), "");
    assert_eq!(interner.get("main"), Some(a));
    assert_eq!(interner.get("absent"), None);
}

#[test]
fn interner_is_shareable_across_threads() {
    let interner = std::sync::Arc::new(StringInterner::new());
    let handles: Vec<_> = (0..4)
        .map(|i| {
            let interner = std::sync::Arc::clone(&interner);
            std::thread::spawn(move || interner.intern(&format!("name{}", i % 2)))
        })
        .collect();
    let names: Vec<Name> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(names[0], names[2]);
    assert_eq!(names[1], names[3]);
}

#[test]
fn clid_equality_needs_both_components() {
    let a = Clid::new(AtomId::new(1), Slot::new(2));
    assert_eq!(a, Clid::new(AtomId::new(1), Slot::new(2)));
    assert_ne!(a, Clid::new(AtomId::new(2), Slot::new(2)));
    assert_ne!(a, Clid::new(AtomId::new(1), Slot::new(3)));
}

#[test]
fn wildcard_slot_matches_every_slot_of_its_atom() {
    let any = Clid::any(AtomId::new(1));
    assert!(any.matches(Clid::new(AtomId::new(1), Slot::new(0))));
    assert!(any.matches(Clid::new(AtomId::new(1), Slot::new(77))));
    assert!(!any.matches(Clid::new(AtomId::new(2), Slot::new(0))));
    assert!(!Clid::new(AtomId::new(1), Slot::new(0)).matches(any));
}

#[test]
fn span_merge_covers_both() {
    assert_eq!(Span::new(4, 8).merge(Span::new(2, 5)), Span::new(2, 8));
    assert_eq!(Span::from_range(3..9).len(), 6);
}

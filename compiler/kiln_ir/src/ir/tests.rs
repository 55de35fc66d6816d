#![allow(
    clippy::unwrap_used,
    reason = "test code uses unwrap/expect for concise assertions"
)]

use pretty_assertions::assert_eq;
use proptest::prelude::*;

use super::*;
use crate::{AtomId, Label, Slot, Span, StringInterner};

fn atom() -> AtomId {
    AtomId::new(3)
}

fn begin() -> Op {
    Op::BlueprintBegin {
        magic: BLUEPRINT_MAGIC,
        atom: atom(),
    }
}

fn end() -> Op {
    Op::BlueprintEnd {
        magic: BLUEPRINT_MAGIC,
        atom: atom(),
    }
}

/// begin, const, jmp <target>, ret, end
fn with_jump(target: u32) -> IrSequence {
    let mut seq = IrSequence::new();
    seq.push(begin(), Span::DUMMY);
    seq.push(
        Op::Const {
            dst: Slot::new(0),
            value: Constant::Int(1),
        },
        Span::DUMMY,
    );
    seq.push(
        Op::Jump {
            target: Label::new(target),
        },
        Span::DUMMY,
    );
    seq.push(Op::Return { value: None }, Span::DUMMY);
    seq.push(end(), Span::DUMMY);
    seq
}

#[test]
fn push_returns_positions_in_order() {
    let mut seq = IrSequence::new();
    assert_eq!(seq.push(begin(), Span::DUMMY), Label::new(0));
    assert_eq!(seq.push(end(), Span::DUMMY), Label::new(1));
    assert_eq!(seq.len(), 2);
}

#[test]
fn valid_sequence_yields_blueprint() {
    let seq = with_jump(3);
    let bp = seq.validate().unwrap();
    assert_eq!(
        bp,
        Blueprint {
            atom: atom(),
            begin: 0,
            end: 4
        }
    );
    assert_eq!(bp.entry(), 1);
}

#[test]
fn backward_jumps_are_legal() {
    assert!(with_jump(1).validate().is_ok());
}

#[test]
fn label_past_end_is_rejected() {
    let err = with_jump(9).validate().unwrap_err();
    assert!(err.is_label_error());
    assert_eq!(
        err,
        SealError::InvalidLabel {
            position: 2,
            target: Label::new(9),
            begin: 0,
            end: 4,
            len: 5,
        }
    );
}

#[test]
fn label_on_begin_marker_is_outside_the_region() {
    assert!(with_jump(0).validate().unwrap_err().is_label_error());
}

#[test]
fn missing_end_marker_is_structural() {
    let mut seq = IrSequence::new();
    seq.push(begin(), Span::DUMMY);
    seq.push(Op::Return { value: None }, Span::DUMMY);
    let err = seq.validate().unwrap_err();
    assert_eq!(err, SealError::MissingEnd { atom: atom() });
    assert!(!err.is_label_error());
}

#[test]
fn end_marker_for_other_atom_is_mismatched() {
    let mut seq = IrSequence::new();
    seq.push(begin(), Span::DUMMY);
    seq.push(
        Op::BlueprintEnd {
            magic: BLUEPRINT_MAGIC,
            atom: AtomId::new(4),
        },
        Span::DUMMY,
    );
    assert!(matches!(
        seq.validate(),
        Err(SealError::MismatchedMarker { position: 1, .. })
    ));
}

#[test]
fn corrupt_magic_is_detected() {
    let mut seq = IrSequence::new();
    seq.push(
        Op::BlueprintBegin {
            magic: 0xDEAD_BEEF,
            atom: atom(),
        },
        Span::DUMMY,
    );
    seq.push(end(), Span::DUMMY);
    assert_eq!(
        seq.validate(),
        Err(SealError::CorruptMagic {
            position: 0,
            found: 0xDEAD_BEEF
        })
    );
}

#[test]
fn nested_marker_is_stray() {
    let mut seq = IrSequence::new();
    seq.push(begin(), Span::DUMMY);
    seq.push(begin(), Span::DUMMY);
    seq.push(end(), Span::DUMMY);
    assert_eq!(seq.validate(), Err(SealError::StrayMarker { position: 1 }));
}

#[test]
fn listing_renders_one_op_per_line() {
    let interner = StringInterner::new();
    let listing = with_jump(3).listing(&interner).to_string();
    assert_eq!(
        listing,
        "0000  blueprint.begin atom#3 magic=0x4b494c4e\n\
         0001  %0 = const 1\n\
         0002  jmp @3\n\
         0003  ret\n\
         0004  blueprint.end atom#3 magic=0x4b494c4e\n"
    );
}

#[test]
fn binop_symbols_parse() {
    assert_eq!(BinOp::from_symbol("<="), Some(BinOp::Le));
    assert_eq!(BinOp::from_symbol("checked*"), Some(BinOp::CheckedMul));
    assert_eq!(BinOp::CheckedMul.symbol(), "*");
    assert_eq!(BinOp::from_symbol("**"), None);
}

proptest! {
    #[test]
    fn validation_accepts_exactly_in_region_targets(target in 0u32..32) {
        let seq = with_jump(target);
        let accepted = seq.validate().is_ok();
        prop_assert_eq!(accepted, (1..=4).contains(&target));
    }
}

//! Constructors for every fault the VM raises.
//!
//! Keeping the messages in one place keeps their wording consistent between
//! the dispatch loop, the arithmetic helpers and the native handlers.

use kiln_diagnostic::{Fault, FaultKind};
use kiln_ir::ir::SealError;
use kiln_ir::Label;

// Arithmetic

pub fn division_by_zero() -> Fault {
    Fault::new(FaultKind::DivideByZero, "integer division by zero")
}

pub fn remainder_by_zero() -> Fault {
    Fault::new(FaultKind::DivideByZero, "integer remainder by zero")
}

pub fn overflow(op: &str, ty: &str) -> Fault {
    Fault::new(
        FaultKind::Overflow,
        format!("`{op}` overflowed `{ty}`"),
    )
}

pub fn invalid_cast(from: &str, to: &str) -> Fault {
    Fault::new(
        FaultKind::InvalidCast,
        format!("cannot cast `{from}` to `{to}`"),
    )
}

pub fn cast_out_of_range(value: &str, to: &str) -> Fault {
    Fault::new(
        FaultKind::InvalidCast,
        format!("value `{value}` does not fit in `{to}`"),
    )
}

pub fn unparsable(text: &str, to: &str) -> Fault {
    Fault::new(
        FaultKind::InvalidCast,
        format!("cannot parse {text:?} as `{to}`"),
    )
}

// Control flow

pub fn invalid_label(err: &SealError, target: Label) -> Fault {
    Fault::new(FaultKind::InvalidLabel, err.to_string()).at_label(target)
}

pub fn assertion_failed(message: &str) -> Fault {
    Fault::new(FaultKind::Assert, message)
}

pub fn stack_overflow(depth: usize) -> Fault {
    Fault::new(
        FaultKind::StackOverflow,
        format!("call depth exceeded the limit of {depth} frames"),
    )
}

pub fn unexpected_opcode(mnemonic: &str) -> Fault {
    Fault::new(
        FaultKind::UnexpectedOpcode,
        format!("unrecognised opcode `{mnemonic}`"),
    )
    .with_opcode(mnemonic)
}

// Atoms and objects

pub fn invalid_atom(name: &str) -> Fault {
    Fault::new(
        FaultKind::InvalidAtom,
        format!("`{name}` failed to lower and cannot run"),
    )
}

pub fn uninitialised_global(name: &str) -> Fault {
    Fault::new(
        FaultKind::InvalidAtom,
        format!("global `{name}` was read before it was initialised"),
    )
}

pub fn no_destructor(class: &str) -> Fault {
    Fault::new(
        FaultKind::InvalidDtor,
        format!("class `{class}` declares no destructor"),
    )
}

pub fn destroyed_twice(class: &str) -> Fault {
    Fault::new(
        FaultKind::InvalidDtor,
        format!("`{class}` object was already destroyed"),
    )
}

// Internal

pub fn operand_mismatch(op: &str, found: &str) -> Fault {
    Fault::ice(format!("`{op}` applied to a `{found}` operand"))
}

pub fn unknown_native(name: &str) -> Fault {
    Fault::ice(format!("no native handler for intrinsic `{name}`"))
}

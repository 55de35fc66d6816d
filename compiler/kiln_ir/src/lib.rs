//! Kiln IR - shared data model of the middle-end.
//!
//! This crate holds the types every other phase agrees on:
//! - Spans and interned names
//! - The immutable AST handed over by the parser
//! - Atom, slot and label identities (`AtomId`, `Slot`, `Clid`, `Label`)
//! - The opcode set and the append-only [`IrSequence`](ir::IrSequence)
//!
//! It has no knowledge of types or symbol resolution; those live in
//! `kiln_types`.

/// Compile-time assertion that a type has a specific size.
#[macro_export]
macro_rules! static_assert_size {
    ($ty:ty, $size:expr) => {
        const _: [(); $size] = [(); ::std::mem::size_of::<$ty>()];
    };
}

pub mod ast;
mod ids;
mod interner;
pub mod ir;
mod name;
mod span;

pub use ast::{AstNode, Fingerprint, Literal, Rule};
pub use ids::{AtomId, Clid, Label, Slot};
pub use interner::{InternError, StringInterner};
pub use name::Name;
pub use span::Span;

#[cfg(target_pointer_width = "64")]
mod size_asserts {
    use super::{Clid, Name, Span};
    crate::static_assert_size!(Name, 4);
    crate::static_assert_size!(Span, 8);
    crate::static_assert_size!(Clid, 8);
}

#[cfg(test)]
mod tests;

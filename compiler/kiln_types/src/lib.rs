//! Kiln Types - resolution engine of the middle-end.
//!
//! - [`TypePool`]: interned type handles with exact-match identity
//! - [`ClassdefTable`]: per-slot type descriptors refined by unification
//! - [`AtomTable`]: named entities, nested scopes and overload resolution
//! - [`IntrinsicRegistry`]: signatures of external functions
//!
//! One `AtomTable` (which owns the pool and the classdefs) belongs to one
//! compilation target and is mutated by a single lowering session. Only the
//! registry is shared between targets.

mod atoms;
mod classdef;
mod error;
mod intrinsics;
pub mod names;
pub mod overload;
mod pool;

pub use atoms::{Atom, AtomFlags, AtomKind, AtomTable};
pub use classdef::{CallShape, Classdef, ClassdefTable, Lingering, Resolution};
pub use error::{RegistryError, ResolveError, UnifyError};
pub use intrinsics::{Intrinsic, IntrinsicRegistry};
pub use overload::Candidate;
pub use pool::{IntKind, TypeData, TypeId, TypePool};

#[cfg(test)]
mod tests;

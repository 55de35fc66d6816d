//! Resolution errors.
//!
//! These carry raw handles; callers holding the tables render them into
//! user-facing messages (see `AtomTable::explain_unify`).

use kiln_diagnostic::FaultKind;
use kiln_ir::{AtomId, Clid};

use crate::TypeId;

#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum UnifyError {
    #[error("type conflict: expected {expected:?}, found {found:?}")]
    Conflict { expected: TypeId, found: TypeId },

    #[error("no overload among {candidates} candidates accepts these arguments")]
    NoMatchingOverload { candidates: usize },

    #[error("ambiguous overload between {atoms:?}")]
    AmbiguousOverload { atoms: Vec<AtomId> },

    #[error("expected {expected} arguments, found {found}")]
    ArityMismatch { expected: usize, found: usize },

    #[error("value of type {found:?} is not callable")]
    NotCallable { found: TypeId },

    #[error("type of {clid} is not known yet")]
    Uninferred { clid: Clid },
}

impl UnifyError {
    pub fn kind(&self) -> FaultKind {
        match self {
            UnifyError::Conflict { .. } | UnifyError::NotCallable { .. } => {
                FaultKind::TypeConflict
            }
            UnifyError::NoMatchingOverload { .. } | UnifyError::ArityMismatch { .. } => {
                FaultKind::NoMatchingOverload
            }
            UnifyError::AmbiguousOverload { .. } => FaultKind::AmbiguousOverload,
            UnifyError::Uninferred { .. } => FaultKind::UninferredType,
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum ResolveError {
    #[error("`{name}` is not a valid identifier")]
    InvalidIdentifier { name: String },

    #[error("`{name}` is already declared in this scope")]
    Duplicate { name: String },

    #[error("unknown identifier `{name}`")]
    Unknown { name: String },

    #[error("`{name}` is not a namespace or class")]
    NotAScope { name: String },

    #[error("`{name}` is not a function")]
    NotAFunction { name: String },

    #[error("no overload of `{name}` accepts {arity} argument(s) of these types")]
    NoMatchingOverload { name: String, arity: usize },

    #[error("call to `{name}` is ambiguous")]
    AmbiguousOverload { name: String, atoms: Vec<AtomId> },
}

impl ResolveError {
    pub fn kind(&self) -> FaultKind {
        match self {
            ResolveError::InvalidIdentifier { .. } | ResolveError::Duplicate { .. } => {
                FaultKind::InvalidIdentifier
            }
            ResolveError::Unknown { .. } | ResolveError::NotAScope { .. } => {
                FaultKind::UnknownIdentifier
            }
            ResolveError::NotAFunction { .. } => FaultKind::TypeConflict,
            ResolveError::NoMatchingOverload { .. } => FaultKind::NoMatchingOverload,
            ResolveError::AmbiguousOverload { .. } => FaultKind::AmbiguousOverload,
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum RegistryError {
    #[error("intrinsic `{name}` is already registered")]
    Duplicate { name: String },

    #[error("intrinsic `{name}` uses `any` as its return type")]
    AnyReturn { name: String },
}

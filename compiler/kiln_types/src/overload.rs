//! Call-site overload resolution.
//!
//! Candidates are filtered by arity, then by exact per-parameter match, then
//! narrowed by specificity. A concrete parameter is more specific than an
//! `any` parameter; one candidate wins only if it is at least as specific as
//! every other survivor on all parameters and strictly more specific on at
//! least one. The outcome depends only on the candidate set, never on its
//! order.

use kiln_ir::AtomId;
use smallvec::SmallVec;

use crate::TypeId;

/// One function signature eligible at a call site.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct Candidate {
    pub atom: AtomId,
    pub params: Box<[TypeId]>,
    pub ret: TypeId,
    /// Interned function type `fn(params) -> ret`.
    pub ty: TypeId,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum OverloadError {
    NoMatch,
    Ambiguous(Vec<AtomId>),
}

/// Whether a parameter of type `param` accepts an argument of type `arg`.
///
/// `None` is an argument whose type is not known yet; it constrains
/// nothing.
#[inline]
pub fn accepts(param: TypeId, arg: Option<TypeId>) -> bool {
    match arg {
        None => true,
        Some(arg) => param == TypeId::ANY || arg == param || arg == TypeId::ERROR,
    }
}

pub fn applicable(candidate: &Candidate, args: &[Option<TypeId>]) -> bool {
    candidate.params.len() == args.len()
        && candidate
            .params
            .iter()
            .zip(args)
            .all(|(&param, &arg)| accepts(param, arg))
}

#[inline]
fn specificity(param: TypeId) -> u8 {
    u8::from(param != TypeId::ANY)
}

/// `a` is at least as specific as `b` everywhere and strictly more somewhere.
fn dominates(a: &Candidate, b: &Candidate) -> bool {
    let mut strictly = false;
    for (&pa, &pb) in a.params.iter().zip(b.params.iter()) {
        match specificity(pa).cmp(&specificity(pb)) {
            std::cmp::Ordering::Less => return false,
            std::cmp::Ordering::Greater => strictly = true,
            std::cmp::Ordering::Equal => {}
        }
    }
    strictly
}

pub fn resolve_call<'c>(
    candidates: &'c [Candidate],
    args: &[Option<TypeId>],
) -> Result<&'c Candidate, OverloadError> {
    let viable: SmallVec<[&Candidate; 4]> = candidates
        .iter()
        .filter(|c| applicable(c, args))
        .collect();

    match viable.as_slice() {
        [] => Err(OverloadError::NoMatch),
        [only] => Ok(only),
        _ => viable
            .iter()
            .find(|a| {
                viable
                    .iter()
                    .all(|b| a.atom == b.atom || dominates(a, b))
            })
            .copied()
            .ok_or_else(|| {
                let mut atoms: Vec<_> = viable.iter().map(|c| c.atom).collect();
                atoms.sort_unstable();
                OverloadError::Ambiguous(atoms)
            }),
    }
}

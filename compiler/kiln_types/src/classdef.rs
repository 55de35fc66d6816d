//! Classdef table: one evolving type descriptor per local identity.
//!
//! Each slot is in one of four states. `Unresolved` adopts the first type
//! it meets, `Concrete` only ever meets its own type again, and
//! `Overloaded` collapses to one candidate as soon as a call shape or a
//! function type narrows it. `Link` forwards to another slot after two
//! unresolved slots were unified; chains are shortened on every lookup
//! (union-find with path compression), so `let x; let y = x; x = 3`
//! resolves both locals.
//!
//! Slots are numbered per atom from a strictly increasing counter. After an
//! atom's body is lowered its slots are frozen into an immutable
//! `Arc<[TypeId]>` which is all the VM ever reads.

use std::sync::Arc;

use kiln_ir::{AtomId, Clid, Slot};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::overload::{self, accepts, Candidate, OverloadError};
use crate::{TypeId, TypePool, UnifyError};

#[derive(Clone, Debug, PartialEq, Eq)]
enum State {
    Unresolved,
    Link(Clid),
    Concrete(TypeId),
    /// Sorted by atom id, never fewer than two candidates.
    Overloaded(Vec<Candidate>),
}

/// Read-only view of one slot after following links.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Classdef<'a> {
    Unresolved,
    Concrete(TypeId),
    Overloaded(&'a [Candidate]),
}

/// Outcome of `resolve(clid)`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Resolution {
    Concrete(TypeId),
    /// No type yet, or overloads still open.
    Pending,
    /// The slot absorbed an already reported failure.
    Conflict,
}

/// Result of typing a call through a callable slot.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CallShape {
    pub ret: TypeId,
    /// The function the slot is known to hold, if overload resolution
    /// picked one.
    pub atom: Option<AtomId>,
}

/// Why a slot cannot be frozen as-is.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Lingering {
    Unresolved,
    Overloaded { candidates: usize },
}

#[derive(Debug, Default)]
pub struct ClassdefTable {
    slots: FxHashMap<AtomId, Vec<State>>,
    resolutions: FxHashMap<Clid, AtomId>,
    frozen: FxHashMap<AtomId, Arc<[TypeId]>>,
}

impl ClassdefTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next slot of `atom` with a fresh unresolved classdef.
    pub fn declare(&mut self, atom: AtomId) -> Clid {
        let states = self.slots.entry(atom).or_default();
        let slot = Slot::new(u32::try_from(states.len()).unwrap_or(u32::MAX - 1));
        states.push(State::Unresolved);
        Clid::new(atom, slot)
    }

    pub fn slot_count(&self, atom: AtomId) -> u32 {
        self.slots
            .get(&atom)
            .map_or(0, |s| u32::try_from(s.len()).unwrap_or(u32::MAX))
    }

    pub fn contains(&self, clid: Clid) -> bool {
        self.state(clid).is_some()
    }

    fn state(&self, clid: Clid) -> Option<&State> {
        if clid.slot.is_any() {
            return None;
        }
        self.slots.get(&clid.atom)?.get(clid.slot.index())
    }

    fn set(&mut self, clid: Clid, state: State) {
        if let Some(slot) = self
            .slots
            .get_mut(&clid.atom)
            .and_then(|s| s.get_mut(clid.slot.index()))
        {
            *slot = state;
        }
    }

    /// Root of `clid`'s link chain, compressing the chain on the way.
    fn find(&mut self, clid: Clid) -> Clid {
        let root = self.find_readonly(clid);
        let mut cur = clid;
        while let Some(&State::Link(next)) = self.state(cur) {
            if next != root {
                self.set(cur, State::Link(root));
            }
            cur = next;
        }
        root
    }

    fn find_readonly(&self, clid: Clid) -> Clid {
        let mut cur = clid;
        while let Some(State::Link(next)) = self.state(cur) {
            cur = *next;
        }
        cur
    }

    fn root_state(&mut self, clid: Clid) -> Result<(Clid, State), UnifyError> {
        let root = self.find(clid);
        match self.state(root) {
            Some(state) => Ok((root, state.clone())),
            None => Err(UnifyError::Uninferred { clid }),
        }
    }

    pub fn classdef(&self, clid: Clid) -> Option<Classdef<'_>> {
        match self.state(self.find_readonly(clid))? {
            State::Unresolved | State::Link(_) => Some(Classdef::Unresolved),
            State::Concrete(ty) => Some(Classdef::Concrete(*ty)),
            State::Overloaded(set) => Some(Classdef::Overloaded(set)),
        }
    }

    pub fn resolve(&self, clid: Clid) -> Resolution {
        match self.classdef(clid) {
            Some(Classdef::Concrete(TypeId::ERROR)) => Resolution::Conflict,
            Some(Classdef::Concrete(ty)) => Resolution::Concrete(ty),
            _ => Resolution::Pending,
        }
    }

    pub fn concrete(&self, clid: Clid) -> Option<TypeId> {
        match self.classdef(clid)? {
            Classdef::Concrete(ty) => Some(ty),
            _ => None,
        }
    }

    /// The function atom an overloaded slot collapsed to.
    pub fn resolution(&self, clid: Clid) -> Option<AtomId> {
        let root = self.find_readonly(clid);
        self.resolutions
            .get(&root)
            .or_else(|| self.resolutions.get(&clid))
            .copied()
    }

    /// Narrow `clid` with the candidate type `ty`.
    pub fn unify(
        &mut self,
        pool: &TypePool,
        clid: Clid,
        ty: TypeId,
    ) -> Result<TypeId, UnifyError> {
        let (root, existing) = self.root_state(clid)?;
        let (state, chosen) = join(pool, existing, State::Concrete(ty))?;
        let resolved = match state {
            State::Concrete(t) => t,
            _ => ty,
        };
        self.commit(root, state, chosen);
        Ok(resolved)
    }

    /// Make two slots denote the same type. Commutative: the resolved type
    /// of both slots does not depend on argument order.
    pub fn unify_slots(&mut self, pool: &TypePool, a: Clid, b: Clid) -> Result<(), UnifyError> {
        let (ra, sa) = self.root_state(a)?;
        let (rb, sb) = self.root_state(b)?;
        if ra == rb {
            return Ok(());
        }
        if matches!(sb, State::Unresolved) {
            self.set(rb, State::Link(ra));
        } else if matches!(sa, State::Unresolved) {
            self.set(ra, State::Link(rb));
        } else {
            let (state, chosen) = join(pool, sa, sb)?;
            let carried = chosen.or_else(|| self.resolutions.get(&rb).copied());
            self.commit(ra, state, carried);
            self.set(rb, State::Link(ra));
        }
        Ok(())
    }

    /// Mark `clid` as holding one of `candidates`, to be decided later.
    pub fn mark_overloaded(
        &mut self,
        pool: &TypePool,
        clid: Clid,
        mut candidates: Vec<Candidate>,
    ) -> Result<(), UnifyError> {
        candidates.sort_by_key(|c| c.atom);
        candidates.dedup_by_key(|c| c.atom);
        let (incoming, chosen) = normalize(candidates)?;
        let (root, existing) = self.root_state(clid)?;
        let (state, joined) = join(pool, existing, incoming)?;
        self.commit(root, state, joined.or(chosen));
        Ok(())
    }

    /// Type a call through the callable slot `clid`.
    pub fn unify_call(
        &mut self,
        pool: &TypePool,
        clid: Clid,
        args: &[Option<TypeId>],
    ) -> Result<CallShape, UnifyError> {
        let (root, state) = self.root_state(clid)?;
        match state {
            State::Unresolved | State::Link(_) => Err(UnifyError::Uninferred { clid }),
            State::Concrete(TypeId::ERROR) => Ok(CallShape {
                ret: TypeId::ERROR,
                atom: None,
            }),
            State::Concrete(ty) => {
                let (params, ret) = pool
                    .signature(ty)
                    .ok_or(UnifyError::NotCallable { found: ty })?;
                if params.len() != args.len() {
                    return Err(UnifyError::ArityMismatch {
                        expected: params.len(),
                        found: args.len(),
                    });
                }
                for (&param, &arg) in params.iter().zip(args) {
                    if !accepts(param, arg) {
                        return Err(UnifyError::Conflict {
                            expected: param,
                            found: arg.unwrap_or(TypeId::ERROR),
                        });
                    }
                }
                Ok(CallShape {
                    ret,
                    atom: self.resolution(root),
                })
            }
            State::Overloaded(set) => {
                let chosen = pick(&set, args)?.clone();
                tracing::debug!(%clid, atom = %chosen.atom, "overloaded slot collapsed by call");
                self.commit(root, State::Concrete(chosen.ty), Some(chosen.atom));
                Ok(CallShape {
                    ret: chosen.ret,
                    atom: Some(chosen.atom),
                })
            }
        }
    }

    /// Force every still-open slot of `atom` from `first` onward to the
    /// error type. Used when a statement's partial output is discarded.
    pub fn poison_from(&mut self, atom: AtomId, first: Slot) {
        if let Some(states) = self.slots.get_mut(&atom) {
            for state in states.iter_mut().skip(first.index()) {
                if matches!(state, State::Unresolved | State::Overloaded(_)) {
                    *state = State::Concrete(TypeId::ERROR);
                }
            }
        }
    }

    /// Every slot of `clid.atom` when `clid` is a wildcard, else just `clid`.
    pub fn matching(&self, clid: Clid) -> impl Iterator<Item = (Clid, Classdef<'_>)> + '_ {
        let count = if clid.slot.is_any() {
            self.slot_count(clid.atom)
        } else {
            0
        };
        let single = (!clid.slot.is_any()).then_some(clid);
        (0..count)
            .map(move |i| Clid::new(clid.atom, Slot::new(i)))
            .chain(single)
            .filter_map(move |c| self.classdef(c).map(|def| (c, def)))
    }

    /// Slots of `atom` that would not freeze to a concrete type.
    pub fn lingering(&self, atom: AtomId) -> Vec<(Slot, Lingering)> {
        self.matching(Clid::any(atom))
            .filter_map(|(clid, def)| match def {
                Classdef::Unresolved => Some((clid.slot, Lingering::Unresolved)),
                Classdef::Overloaded(set) => Some((
                    clid.slot,
                    Lingering::Overloaded {
                        candidates: set.len(),
                    },
                )),
                Classdef::Concrete(_) => None,
            })
            .collect()
    }

    /// Snapshot the slot types of `atom`. Open slots freeze as the error
    /// type; callers check [`lingering`](Self::lingering) first.
    pub fn freeze(&mut self, atom: AtomId) -> Arc<[TypeId]> {
        let frozen: Arc<[TypeId]> = (0..self.slot_count(atom))
            .map(|i| {
                self.concrete(Clid::new(atom, Slot::new(i)))
                    .unwrap_or(TypeId::ERROR)
            })
            .collect();
        self.frozen.insert(atom, Arc::clone(&frozen));
        frozen
    }

    pub fn frozen(&self, atom: AtomId) -> Option<&Arc<[TypeId]>> {
        self.frozen.get(&atom)
    }

    fn commit(&mut self, root: Clid, state: State, chosen: Option<AtomId>) {
        self.set(root, state);
        if let Some(atom) = chosen {
            self.resolutions.insert(root, atom);
        }
    }
}

fn pick<'c>(set: &'c [Candidate], args: &[Option<TypeId>]) -> Result<&'c Candidate, UnifyError> {
    overload::resolve_call(set, args).map_err(|err| match err {
        OverloadError::NoMatch => UnifyError::NoMatchingOverload {
            candidates: set.len(),
        },
        OverloadError::Ambiguous(atoms) => UnifyError::AmbiguousOverload { atoms },
    })
}

fn normalize(set: Vec<Candidate>) -> Result<(State, Option<AtomId>), UnifyError> {
    match set.len() {
        0 => Err(UnifyError::NoMatchingOverload { candidates: 0 }),
        1 => Ok((State::Concrete(set[0].ty), Some(set[0].atom))),
        _ => Ok((State::Overloaded(set), None)),
    }
}

/// Merge two root states. Symmetric up to which side an error names.
fn join(pool: &TypePool, a: State, b: State) -> Result<(State, Option<AtomId>), UnifyError> {
    match (a, b) {
        (State::Unresolved | State::Link(_), other)
        | (other, State::Unresolved | State::Link(_)) => Ok((other, None)),
        (State::Concrete(TypeId::ERROR), _) | (_, State::Concrete(TypeId::ERROR)) => {
            Ok((State::Concrete(TypeId::ERROR), None))
        }
        (State::Concrete(x), State::Concrete(y)) => {
            if x == y {
                Ok((State::Concrete(x), None))
            } else {
                Err(UnifyError::Conflict {
                    expected: x,
                    found: y,
                })
            }
        }
        (State::Overloaded(set), State::Concrete(ty))
        | (State::Concrete(ty), State::Overloaded(set)) => collapse(pool, &set, ty),
        (State::Overloaded(a), State::Overloaded(b)) => {
            let total = a.len() + b.len();
            let common: Vec<Candidate> = a
                .into_iter()
                .filter(|c| b.iter().any(|o| o.atom == c.atom))
                .collect();
            if common.is_empty() {
                return Err(UnifyError::NoMatchingOverload { candidates: total });
            }
            normalize(common)
        }
    }
}

/// Decide an overloaded slot against a concrete function type by its shape.
fn collapse(
    pool: &TypePool,
    set: &[Candidate],
    ty: TypeId,
) -> Result<(State, Option<AtomId>), UnifyError> {
    let (params, _) = pool
        .signature(ty)
        .ok_or(UnifyError::NotCallable { found: ty })?;
    let args: SmallVec<[Option<TypeId>; 4]> = params.iter().map(|&p| Some(p)).collect();
    let chosen = pick(set, &args)?;
    if chosen.ty != ty {
        return Err(UnifyError::Conflict {
            expected: chosen.ty,
            found: ty,
        });
    }
    tracing::debug!(atom = %chosen.atom, "overloaded slot collapsed by type");
    Ok((State::Concrete(ty), Some(chosen.atom)))
}

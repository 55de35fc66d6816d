//! Atom table: every named entity of one compilation target.
//!
//! The table owns all atoms, their IR bodies, the type pool and the
//! classdef table. Scopes are per-atom member maps linked by the non-owning
//! `parent` back-reference; lookup walks outward and stops at the first
//! scope that has any member of the name, so inner declarations shadow
//! outer ones instead of adding overloads.

use std::ops::Index;
use std::sync::Arc;

use bitflags::bitflags;
use kiln_ir::ir::IrSequence;
use kiln_ir::{AtomId, Clid, Name, Slot, Span, StringInterner};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::classdef::{CallShape, ClassdefTable};
use crate::names::canonicalize;
use crate::overload::{self, Candidate, OverloadError};
use crate::{ResolveError, TypeData, TypeId, TypePool, UnifyError};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum AtomKind {
    Module,
    Namespace,
    Class,
    Function,
    Variable,
}

impl AtomKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            AtomKind::Module => "module",
            AtomKind::Namespace => "namespace",
            AtomKind::Class => "class",
            AtomKind::Function => "function",
            AtomKind::Variable => "variable",
        }
    }

    /// Kinds whose members can be reached with `a::b`.
    pub const fn is_scope(self) -> bool {
        matches!(
            self,
            AtomKind::Module | AtomKind::Namespace | AtomKind::Class
        )
    }
}

bitflags! {
    #[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
    pub struct AtomFlags: u8 {
        /// Lowering failed; executing the atom faults.
        const INVALID = 1 << 0;
        /// Class declares a destructor.
        const HAS_DTOR = 1 << 1;
        /// Function forwards to an intrinsic.
        const INTRINSIC_SHIM = 1 << 2;
        /// Function synthesized for a closure literal.
        const CLOSURE = 1 << 3;
        /// Body has been lowered and sealed.
        const LOWERED = 1 << 4;
    }
}

#[derive(Clone, Debug)]
pub struct Atom {
    pub id: AtomId,
    pub name: Name,
    pub kind: AtomKind,
    pub parent: Option<AtomId>,
    pub flags: AtomFlags,
    pub span: Span,
    /// Parameter types. Parameters occupy slots `0..params.len()`; for
    /// methods slot 0 is the receiver.
    pub params: SmallVec<[TypeId; 4]>,
    pub ret: TypeId,
    /// Instance type of a class, function type of a function, value type of
    /// a variable.
    pub ty: Option<TypeId>,
    /// Ordered instance fields of a class.
    pub fields: Vec<(Name, TypeId)>,
    pub dtor: Option<AtomId>,
    pub body: Option<IrSequence>,
}

impl Atom {
    fn new(id: AtomId, name: Name, kind: AtomKind, parent: Option<AtomId>, span: Span) -> Self {
        Atom {
            id,
            name,
            kind,
            parent,
            flags: AtomFlags::empty(),
            span,
            params: SmallVec::new(),
            ret: TypeId::VOID,
            ty: None,
            fields: Vec::new(),
            dtor: None,
            body: None,
        }
    }

    #[inline]
    pub fn is_invalid(&self) -> bool {
        self.flags.contains(AtomFlags::INVALID)
    }

    #[inline]
    pub fn arity(&self) -> usize {
        self.params.len()
    }

    pub fn param_clid(&self, index: usize) -> Clid {
        Clid::new(self.id, Slot::new(u32::try_from(index).unwrap_or(u32::MAX - 1)))
    }

    /// Overload candidate for a function whose signature is set.
    pub fn candidate(&self) -> Option<Candidate> {
        if self.kind != AtomKind::Function {
            return None;
        }
        Some(Candidate {
            atom: self.id,
            params: self.params.iter().copied().collect(),
            ret: self.ret,
            ty: self.ty?,
        })
    }

    pub fn field(&self, name: Name) -> Option<(u32, TypeId)> {
        self.fields
            .iter()
            .position(|(field, _)| *field == name)
            .map(|i| (u32::try_from(i).unwrap_or(u32::MAX), self.fields[i].1))
    }
}

type Members = FxHashMap<Name, SmallVec<[AtomId; 2]>>;

pub struct AtomTable {
    interner: Arc<StringInterner>,
    atoms: Vec<Atom>,
    scopes: FxHashMap<AtomId, Members>,
    types: TypePool,
    classdefs: ClassdefTable,
}

impl AtomTable {
    /// Root module name; not a valid identifier so it never collides.
    pub const ROOT_NAME: &'static str = "{root}";

    pub fn new(interner: Arc<StringInterner>) -> Self {
        let root_name = interner.intern(Self::ROOT_NAME);
        let root = Atom::new(
            AtomId::new(0),
            root_name,
            AtomKind::Module,
            None,
            Span::DUMMY,
        );
        AtomTable {
            interner,
            atoms: vec![root],
            scopes: FxHashMap::default(),
            types: TypePool::new(),
            classdefs: ClassdefTable::new(),
        }
    }

    #[inline]
    pub fn root(&self) -> AtomId {
        AtomId::new(0)
    }

    pub fn interner(&self) -> &Arc<StringInterner> {
        &self.interner
    }

    pub fn types(&self) -> &TypePool {
        &self.types
    }

    pub fn types_mut(&mut self) -> &mut TypePool {
        &mut self.types
    }

    pub fn classdefs(&self) -> &ClassdefTable {
        &self.classdefs
    }

    pub fn classdefs_mut(&mut self) -> &mut ClassdefTable {
        &mut self.classdefs
    }

    pub fn get(&self, id: AtomId) -> Option<&Atom> {
        self.atoms.get(id.index())
    }

    pub fn get_mut(&mut self, id: AtomId) -> Option<&mut Atom> {
        self.atoms.get_mut(id.index())
    }

    pub fn len(&self) -> usize {
        self.atoms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Atom> {
        self.atoms.iter()
    }

    pub fn name_of(&self, id: AtomId) -> &'static str {
        self.get(id)
            .map_or("<unknown>", |atom| self.interner.lookup(atom.name))
    }

    /// `ns::Class::method`, without the root module.
    pub fn qualified_name(&self, id: AtomId) -> String {
        let mut parts = Vec::new();
        let mut cur = Some(id);
        while let Some(atom) = cur.and_then(|c| self.get(c)) {
            if atom.parent.is_none() {
                break;
            }
            parts.push(self.interner.lookup(atom.name));
            cur = atom.parent;
        }
        parts.reverse();
        parts.join("::")
    }

    // Declaration

    /// Enter `raw` into `parent`'s scope after canonicalising it.
    ///
    /// Namespaces reopen: declaring one that already exists returns it.
    /// Functions may share a name with other functions only.
    pub fn declare(
        &mut self,
        parent: AtomId,
        raw: &str,
        kind: AtomKind,
        span: Span,
    ) -> Result<AtomId, ResolveError> {
        let canonical = canonicalize(raw)?;
        let name = self.interner.intern(&canonical);
        let existing = self.members(parent, name);

        if kind == AtomKind::Namespace {
            if let [ns] = existing {
                if self[*ns].kind == AtomKind::Namespace {
                    return Ok(*ns);
                }
            }
        }
        let overloadable = kind == AtomKind::Function
            && existing.iter().all(|&id| self[id].kind == AtomKind::Function);
        if !existing.is_empty() && !overloadable {
            return Err(ResolveError::Duplicate {
                name: canonical.into_owned(),
            });
        }

        let id = self.push(name, kind, parent, span);
        self.scopes
            .entry(parent)
            .or_default()
            .entry(name)
            .or_default()
            .push(id);
        tracing::debug!(atom = %id, name = %canonical, kind = kind.as_str(), "atom declared");
        Ok(id)
    }

    /// Declare an atom that is not reachable by name lookup, such as the
    /// global initializer or a closure body.
    pub fn declare_hidden(
        &mut self,
        parent: AtomId,
        name: &str,
        kind: AtomKind,
        span: Span,
    ) -> AtomId {
        let name = self.interner.intern(name);
        self.push(name, kind, parent, span)
    }

    fn push(&mut self, name: Name, kind: AtomKind, parent: AtomId, span: Span) -> AtomId {
        let id = AtomId::from_index(self.atoms.len());
        self.atoms.push(Atom::new(id, name, kind, Some(parent), span));
        id
    }

    /// Fix a function's signature. Two overloads with identical parameter
    /// types are a duplicate declaration.
    pub fn set_signature(
        &mut self,
        id: AtomId,
        params: &[TypeId],
        ret: TypeId,
    ) -> Result<TypeId, ResolveError> {
        let atom = &self[id];
        if let Some(parent) = atom.parent {
            let clash = self.members(parent, atom.name).iter().any(|&other| {
                other != id
                    && self[other].ty.is_some()
                    && self[other].params.as_slice() == params
            });
            if clash {
                return Err(ResolveError::Duplicate {
                    name: self.interner.lookup(atom.name).to_string(),
                });
            }
        }
        let ty = self.types.function(params, ret);
        if let Some(atom) = self.get_mut(id) {
            atom.params = params.iter().copied().collect();
            atom.ret = ret;
            atom.ty = Some(ty);
        }
        Ok(ty)
    }

    pub fn add_flags(&mut self, id: AtomId, flags: AtomFlags) {
        if let Some(atom) = self.get_mut(id) {
            atom.flags |= flags;
        }
    }

    pub fn mark_invalid(&mut self, id: AtomId) {
        if let Some(atom) = self.get_mut(id) {
            if !atom.is_invalid() {
                tracing::debug!(atom = %id, "atom marked invalid");
            }
            atom.flags |= AtomFlags::INVALID;
        }
    }

    pub fn set_body(&mut self, id: AtomId, body: IrSequence) {
        if let Some(atom) = self.get_mut(id) {
            atom.body = Some(body);
            atom.flags |= AtomFlags::LOWERED;
        }
    }

    // Lookup

    /// Members of `scope` named `name`, without walking outward.
    pub fn members(&self, scope: AtomId, name: Name) -> &[AtomId] {
        self.scopes
            .get(&scope)
            .and_then(|m| m.get(&name))
            .map_or(&[], |ids| ids.as_slice())
    }

    /// Candidates for `name` in the innermost scope of the chain starting
    /// at `scope` that declares it.
    pub fn lookup(&self, scope: AtomId, name: Name) -> &[AtomId] {
        let mut cur = Some(scope);
        while let Some(id) = cur {
            let found = self.members(id, name);
            if !found.is_empty() {
                return found;
            }
            cur = self.get(id).and_then(|a| a.parent);
        }
        &[]
    }

    /// Resolve a possibly qualified name such as `geo::Point::len`.
    ///
    /// The first segment is found through the scope chain; later segments
    /// descend through members only.
    pub fn lookup_path(
        &self,
        scope: AtomId,
        path: &str,
    ) -> Result<SmallVec<[AtomId; 2]>, ResolveError> {
        let unknown = || ResolveError::Unknown {
            name: path.to_string(),
        };
        let mut found: Option<&[AtomId]> = None;
        for segment in path.split("::") {
            let canonical = canonicalize(segment.trim()).map_err(|_| unknown())?;
            let name = self.interner.get(&canonical).ok_or_else(unknown)?;
            found = Some(match found {
                None => self.lookup(scope, name),
                Some([outer]) if self[*outer].kind.is_scope() => self.members(*outer, name),
                Some(_) => {
                    return Err(ResolveError::NotAScope {
                        name: path.to_string(),
                    })
                }
            });
            if found.is_some_and(<[AtomId]>::is_empty) {
                return Err(unknown());
            }
        }
        found.map(SmallVec::from_slice).ok_or_else(unknown)
    }

    /// Overload candidates among `ids`.
    pub fn candidates(&self, ids: &[AtomId]) -> Vec<Candidate> {
        ids.iter().filter_map(|&id| self[id].candidate()).collect()
    }

    /// Pick the function `path` names for a call with `args`.
    pub fn resolve_call(
        &self,
        scope: AtomId,
        path: &str,
        args: &[Option<TypeId>],
    ) -> Result<AtomId, ResolveError> {
        let ids = self.lookup_path(scope, path)?;
        self.select(path, &ids, args)
    }

    /// Overload resolution over an already looked-up candidate set.
    pub fn select(
        &self,
        name: &str,
        ids: &[AtomId],
        args: &[Option<TypeId>],
    ) -> Result<AtomId, ResolveError> {
        let candidates = self.candidates(ids);
        if candidates.is_empty() {
            return Err(ResolveError::NotAFunction {
                name: name.to_string(),
            });
        }
        let chosen = overload::resolve_call(&candidates, args).map_err(|err| match err {
            OverloadError::NoMatch => ResolveError::NoMatchingOverload {
                name: name.to_string(),
                arity: args.len(),
            },
            OverloadError::Ambiguous(atoms) => ResolveError::AmbiguousOverload {
                name: name.to_string(),
                atoms,
            },
        })?;
        tracing::debug!(name, atom = %chosen.atom, "overload resolved");
        Ok(chosen.atom)
    }

    // Classdefs

    pub fn declare_slot(&mut self, atom: AtomId) -> Clid {
        self.classdefs.declare(atom)
    }

    pub fn unify(&mut self, clid: Clid, ty: TypeId) -> Result<TypeId, UnifyError> {
        self.classdefs.unify(&self.types, clid, ty)
    }

    pub fn unify_slots(&mut self, a: Clid, b: Clid) -> Result<(), UnifyError> {
        self.classdefs.unify_slots(&self.types, a, b)
    }

    pub fn unify_call(
        &mut self,
        clid: Clid,
        args: &[Option<TypeId>],
    ) -> Result<CallShape, UnifyError> {
        self.classdefs.unify_call(&self.types, clid, args)
    }

    pub fn mark_overloaded(
        &mut self,
        clid: Clid,
        candidates: Vec<Candidate>,
    ) -> Result<(), UnifyError> {
        self.classdefs.mark_overloaded(&self.types, clid, candidates)
    }

    // Rendering

    pub fn describe_type(&self, ty: TypeId) -> String {
        self.types.describe(ty, &|atom| self.qualified_name(atom))
    }

    /// User-facing message for a unification failure.
    pub fn explain_unify(&self, err: &UnifyError) -> String {
        match err {
            UnifyError::Conflict { expected, found } => format!(
                "type conflict: expected `{}`, found `{}`",
                self.describe_type(*expected),
                self.describe_type(*found)
            ),
            UnifyError::NoMatchingOverload { candidates } => {
                format!("none of the {candidates} overloads accepts these arguments")
            }
            UnifyError::AmbiguousOverload { atoms } => {
                let names: Vec<_> = atoms.iter().map(|&a| self.describe_candidate(a)).collect();
                format!("ambiguous overload: {}", names.join(", "))
            }
            UnifyError::ArityMismatch { expected, found } => {
                format!("expected {expected} argument(s), found {found}")
            }
            UnifyError::NotCallable { found } => {
                format!("value of type `{}` is not callable", self.describe_type(*found))
            }
            UnifyError::Uninferred { .. } => "type of this value is not known here".to_string(),
        }
    }

    /// `name(fn(int) -> int)` for diagnostics.
    pub fn describe_candidate(&self, id: AtomId) -> String {
        let ty = self.get(id).and_then(|a| a.ty).unwrap_or(TypeId::ERROR);
        format!("`{}` : {}", self.qualified_name(id), self.describe_type(ty))
    }

    /// Instance type of class atom `id`.
    pub fn class_type(&mut self, id: AtomId) -> TypeId {
        if let Some(ty) = self.get(id).and_then(|a| a.ty) {
            return ty;
        }
        let ty = self.types.intern(TypeData::Class(id));
        if let Some(atom) = self.get_mut(id) {
            atom.ty = Some(ty);
        }
        ty
    }
}

impl Index<AtomId> for AtomTable {
    type Output = Atom;

    fn index(&self, id: AtomId) -> &Atom {
        &self.atoms[id.index()]
    }
}

//! Body pass: lowers one atom's statements into a sealed `IrSequence`.
//!
//! Every expression result and every local gets a fresh slot of the atom
//! being lowered; parameters occupy the first slots. Statement failures are
//! recovered locally (see [`BodyLowerer::lower_statement`]); whatever is
//! still unresolved when the body ends is reported and the atom is marked
//! invalid.

mod calls;
mod control_flow;
mod expr;
mod stmt;

use std::sync::Arc;

use kiln_diagnostic::{Fault, FaultKind};
use kiln_ir::ir::Op;
use kiln_ir::{AstNode, AtomId, Clid, Label, Name, Rule, Slot, Span};
use kiln_types::{AtomKind, Lingering, TypeId};

use crate::builder::BodyBuilder;
use crate::declare::{FnShape, PendingFn, PendingGlobal};
use crate::diag::{unexpected, unify_fault};
use crate::scope::LocalScope;
use crate::session::Context;

/// Hidden name of the global initializer atom.
pub(crate) const INIT_NAME: &str = "{init}";

#[derive(Copy, Clone, Debug)]
struct LoopTargets {
    head: Label,
    exit: Label,
}

pub(crate) fn lower_function(cx: &mut Context, pending: &PendingFn<'_>) {
    let receiver = matches!(pending.shape, FnShape::Method(_));
    let mut lowerer = BodyLowerer::new(cx, Arc::clone(pending.source), pending.atom, pending.scope);
    lowerer.lower_body(pending.node, receiver);
    lowerer.finish();
}

/// Lower every global initializer into one `{init}` atom and return it.
pub(crate) fn lower_globals(cx: &mut Context, globals: &[PendingGlobal<'_>]) -> AtomId {
    let root = cx.atoms.root();
    let init = cx
        .atoms
        .declare_hidden(root, INIT_NAME, AtomKind::Function, Span::DUMMY);
    if let Err(err) = cx.atoms.set_signature(init, &[], TypeId::VOID) {
        tracing::debug!(%err, "initializer signature rejected");
    }

    let mut lowerer = match globals.first() {
        Some(first) => BodyLowerer::new(cx, Arc::clone(first.source), init, root),
        None => return init,
    };
    for global in globals {
        lowerer.scope = global.scope;
        lowerer.source = Arc::clone(global.source);
        let ok = lowerer.recover(|this| this.global_init(global.atom, global.node));
        if !ok {
            lowerer.cx.atoms.mark_invalid(global.atom);
        }
    }
    lowerer.finish();
    init
}

pub(crate) struct BodyLowerer<'a> {
    cx: &'a mut Context,
    source: Arc<str>,
    atom: AtomId,
    /// Scope atom names are resolved from.
    scope: AtomId,
    ret: TypeId,
    builder: BodyBuilder,
    locals: LocalScope,
    loops: Vec<LoopTargets>,
    /// Span of the node each slot was allocated for.
    slot_spans: Vec<Span>,
    /// Untyped locals declared without an initializer.
    defaulted: Vec<(Name, Clid, Span)>,
}

impl<'a> BodyLowerer<'a> {
    pub(crate) fn new(cx: &'a mut Context, source: Arc<str>, atom: AtomId, scope: AtomId) -> Self {
        let ret = cx.atoms.get(atom).map_or(TypeId::VOID, |a| a.ret);
        BodyLowerer {
            cx,
            source,
            atom,
            scope,
            ret,
            builder: BodyBuilder::new(),
            locals: LocalScope::new(),
            loops: Vec::new(),
            slot_spans: Vec::new(),
            defaulted: Vec::new(),
        }
    }

    /// Lower a function-shaped node: parameters, then the body block or
    /// an intrinsic forwarding shim.
    pub(crate) fn lower_body(&mut self, node: &AstNode, receiver: bool) {
        self.bind_params(node, receiver);

        let mut body = None;
        for child in &node.children {
            match child.rule {
                Rule::Params | Rule::Type => {}
                Rule::Block | Rule::Intrinsic if body.is_none() => body = Some(child),
                _ => self.fail(unexpected(child, "a function")),
            }
        }
        match body {
            Some(block) if block.rule == Rule::Block => self.lower_block(block),
            Some(shim) => {
                self.recover(|this| this.lower_shim(shim));
            }
            None => self.fail(
                Fault::new(
                    FaultKind::UnexpectedNode,
                    format!("`{}` has no body", self.cx.atoms.qualified_name(self.atom)),
                )
                .or_span(node.span),
            ),
        }
    }

    fn bind_params(&mut self, node: &AstNode, receiver: bool) {
        let params = self.cx.atoms[self.atom].params.clone();
        let mut names = Vec::with_capacity(params.len());
        if receiver {
            names.push("self");
        }
        if let Some(list) = node.child(Rule::Params) {
            names.extend(list.children.iter().filter_map(AstNode::text));
        }
        for (i, ty) in params.iter().enumerate() {
            let span = node.span;
            let clid = self.fresh(span);
            if let Err(fault) = self.unify(clid, *ty, span) {
                self.fail(fault);
            }
            if let Some(name) = names.get(i) {
                let name = self.cx.atoms.interner().intern(name);
                self.locals.bind(name, clid);
            }
        }
    }

    /// Seal the body: implicit-return check, lingering slots, freeze.
    pub(crate) fn finish(mut self) {
        let invalid = self.cx.atoms[self.atom].is_invalid();
        let returns_value = self.ret != TypeId::VOID && self.ret != TypeId::ERROR;
        if !invalid && returns_value && self.builder.is_reachable() {
            let span = self.cx.atoms[self.atom].span;
            let fault = Fault::new(
                FaultKind::TypeConflict,
                format!(
                    "`{}` can reach the end of its body without returning `{}`",
                    self.cx.atoms.qualified_name(self.atom),
                    self.cx.atoms.describe_type(self.ret)
                ),
            )
            .or_span(span);
            self.fail(fault);
        }

        for (name, clid, span) in std::mem::take(&mut self.defaulted) {
            let Some(ty) = self.concrete(clid) else {
                continue;
            };
            if let Err(fault) = self.check_default(name, ty, clid, span) {
                self.fail(fault);
            }
        }

        let lingering = self.cx.atoms.classdefs().lingering(self.atom);
        for (slot, lingering) in lingering {
            let span = self.slot_spans.get(slot.index()).copied().unwrap_or(Span::DUMMY);
            let fault = match lingering {
                Lingering::Unresolved => Fault::new(
                    FaultKind::UninferredType,
                    "type of this value could not be inferred",
                ),
                Lingering::Overloaded { candidates } => Fault::new(
                    FaultKind::AmbiguousOverload,
                    format!(
                        "overloaded function is never narrowed to one of its {candidates} candidates"
                    ),
                ),
            };
            self.fail(fault.at_slot(slot).or_span(span));
        }

        let frozen = self.cx.atoms.classdefs_mut().freeze(self.atom);
        let atom = self.atom;
        match std::mem::replace(&mut self.builder, BodyBuilder::new()).finish(atom) {
            Ok(seq) => {
                tracing::debug!(
                    %atom,
                    name = %self.cx.atoms.qualified_name(atom),
                    slots = frozen.len(),
                    ops = seq.len(),
                    "atom body lowered"
                );
                self.cx.atoms.set_body(atom, seq);
            }
            Err(err) => {
                let fault = if err.is_label_error() {
                    Fault::new(FaultKind::InvalidLabel, err.to_string())
                } else {
                    Fault::ice(format!("sealing a lowered body failed: {err}"))
                };
                self.fail(fault);
            }
        }
    }

    // Recovery

    /// Run one statement-sized step. On failure its ops are discarded, its
    /// slots are poisoned, the fault is reported and the atom is marked
    /// invalid. Returns whether the step succeeded.
    pub(crate) fn recover(
        &mut self,
        step: impl FnOnce(&mut Self) -> Result<(), Fault>,
    ) -> bool {
        let mark = self.builder.mark();
        let first_slot = self.cx.atoms.classdefs().slot_count(self.atom);
        let depth = self.locals.depth();
        let loops = self.loops.len();
        match step(self) {
            Ok(()) => true,
            Err(fault) => {
                self.builder.rollback(mark);
                self.locals.truncate(depth);
                self.loops.truncate(loops);
                self.cx
                    .atoms
                    .classdefs_mut()
                    .poison_from(self.atom, Slot::new(first_slot));
                self.fail(fault);
                false
            }
        }
    }

    fn fail(&mut self, fault: Fault) {
        let fault = if fault.atom.is_some() {
            fault
        } else {
            fault.in_atom(self.atom)
        };
        self.cx.diag.fault(&fault, &self.source);
        self.cx.atoms.mark_invalid(self.atom);
    }

    // Slots

    fn fresh(&mut self, span: Span) -> Clid {
        self.slot_spans.push(span);
        self.cx.atoms.declare_slot(self.atom)
    }

    /// Fresh slot already narrowed to `ty`.
    fn typed(&mut self, ty: TypeId, span: Span) -> Result<Clid, Fault> {
        let clid = self.fresh(span);
        self.unify(clid, ty, span)?;
        Ok(clid)
    }

    fn unify(&mut self, clid: Clid, ty: TypeId, span: Span) -> Result<TypeId, Fault> {
        self.cx
            .atoms
            .unify(clid, ty)
            .map_err(|err| unify_fault(&self.cx.atoms, &err, span))
    }

    fn unify_slots(&mut self, a: Clid, b: Clid, span: Span) -> Result<(), Fault> {
        self.cx
            .atoms
            .unify_slots(a, b)
            .map_err(|err| unify_fault(&self.cx.atoms, &err, span))
    }

    fn concrete(&self, clid: Clid) -> Option<TypeId> {
        self.cx.atoms.classdefs().concrete(clid)
    }

    /// Concrete type of `clid`, or `UninferredType` at `span`.
    fn known(&self, clid: Clid, span: Span) -> Result<TypeId, Fault> {
        self.concrete(clid).ok_or_else(|| {
            Fault::new(
                FaultKind::UninferredType,
                "type of this value is not known here",
            )
            .at_slot(clid.slot)
            .or_span(span)
        })
    }

    fn describe(&self, ty: TypeId) -> String {
        self.cx.atoms.describe_type(ty)
    }

    fn emit(&mut self, op: Op, span: Span) {
        self.builder.emit(op, span);
    }
}

//! Declaration pass: enter every item into the atom table, then fix
//! field types, signatures and declared global types.

use std::sync::Arc;

use kiln_diagnostic::{Fault, FaultKind};
use kiln_ir::{AstNode, AtomId, Rule};
use kiln_types::names::{is_plain_identifier, RESERVED};
use kiln_types::{AtomFlags, AtomKind, AtomTable, TypeId};

use crate::diag::{missing, resolve_fault, unexpected};
use crate::session::{Context, SourceUnit};
use crate::ty::{resolve_type, TypePosition};

/// Hidden name of a class destructor atom.
pub(crate) const DTOR_NAME: &str = "{dtor}";

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum FnShape {
    Free,
    /// Method or destructor: parameter 0 is the receiver.
    Method(TypeId),
}

pub(crate) struct PendingFn<'a> {
    pub(crate) atom: AtomId,
    /// Scope the body's names are resolved from.
    pub(crate) scope: AtomId,
    pub(crate) node: &'a AstNode,
    pub(crate) source: &'a Arc<str>,
    pub(crate) shape: FnShape,
    /// Signature was fixed; bodies of unsigned functions are skipped.
    pub(crate) signed: bool,
}

pub(crate) struct PendingGlobal<'a> {
    pub(crate) atom: AtomId,
    pub(crate) scope: AtomId,
    pub(crate) node: &'a AstNode,
    pub(crate) source: &'a Arc<str>,
}

struct PendingClass<'a> {
    atom: AtomId,
    node: &'a AstNode,
    source: &'a Arc<str>,
}

#[derive(Default)]
pub(crate) struct Plan<'a> {
    classes: Vec<PendingClass<'a>>,
    pub(crate) functions: Vec<PendingFn<'a>>,
    pub(crate) globals: Vec<PendingGlobal<'a>>,
}

pub(crate) fn collect<'a>(cx: &mut Context, unit: &'a SourceUnit, plan: &mut Plan<'a>) {
    if unit.root.rule != Rule::Module {
        cx.diag.fault(&unexpected(&unit.root, "a source unit"), &unit.name);
        return;
    }
    let root = cx.atoms.root();
    collect_items(cx, root, &unit.root.children, &unit.name, plan);
}

fn collect_items<'a>(
    cx: &mut Context,
    scope: AtomId,
    items: &'a [AstNode],
    source: &'a Arc<str>,
    plan: &mut Plan<'a>,
) {
    for item in items {
        if let Err(fault) = collect_item(cx, scope, item, source, plan) {
            cx.diag.fault(&fault, source);
        }
    }
}

fn collect_item<'a>(
    cx: &mut Context,
    scope: AtomId,
    item: &'a AstNode,
    source: &'a Arc<str>,
    plan: &mut Plan<'a>,
) -> Result<(), Fault> {
    match item.rule {
        Rule::Namespace => {
            let ns = declare(&mut cx.atoms, scope, item, AtomKind::Namespace)?;
            collect_items(cx, ns, &item.children, source, plan);
        }
        Rule::Class => {
            let class = declare(&mut cx.atoms, scope, item, AtomKind::Class)?;
            let ty = cx.atoms.class_type(class);
            plan.classes.push(PendingClass {
                atom: class,
                node: item,
                source,
            });
            for member in &item.children {
                if let Err(fault) = collect_member(cx, class, ty, member, source, plan) {
                    cx.atoms.mark_invalid(class);
                    cx.diag.fault(&fault, source);
                }
            }
        }
        Rule::Function => {
            let atom = declare(&mut cx.atoms, scope, item, AtomKind::Function)?;
            plan.functions.push(PendingFn {
                atom,
                scope,
                node: item,
                source,
                shape: FnShape::Free,
                signed: false,
            });
        }
        Rule::Global => {
            let atom = declare(&mut cx.atoms, scope, item, AtomKind::Variable)?;
            plan.globals.push(PendingGlobal {
                atom,
                scope,
                node: item,
                source,
            });
        }
        _ => return Err(unexpected(item, "a module")),
    }
    Ok(())
}

fn collect_member<'a>(
    cx: &mut Context,
    class: AtomId,
    ty: TypeId,
    member: &'a AstNode,
    source: &'a Arc<str>,
    plan: &mut Plan<'a>,
) -> Result<(), Fault> {
    match member.rule {
        // Field types may name classes declared later; resolved with signatures.
        Rule::Field => Ok(()),
        Rule::Function => {
            let atom = declare(&mut cx.atoms, class, member, AtomKind::Function)?;
            plan.functions.push(PendingFn {
                atom,
                scope: class,
                node: member,
                source,
                shape: FnShape::Method(ty),
                signed: false,
            });
            Ok(())
        }
        Rule::Destructor => {
            if cx.atoms[class].dtor.is_some() {
                return Err(Fault::new(
                    FaultKind::InvalidIdentifier,
                    format!(
                        "class `{}` declares more than one destructor",
                        cx.atoms.qualified_name(class)
                    ),
                )
                .or_span(member.span));
            }
            let dtor = cx
                .atoms
                .declare_hidden(class, DTOR_NAME, AtomKind::Function, member.span);
            if let Some(atom) = cx.atoms.get_mut(class) {
                atom.dtor = Some(dtor);
            }
            cx.atoms.add_flags(class, AtomFlags::HAS_DTOR);
            plan.functions.push(PendingFn {
                atom: dtor,
                scope: class,
                node: member,
                source,
                shape: FnShape::Method(ty),
                signed: false,
            });
            Ok(())
        }
        _ => Err(unexpected(member, "a class body")),
    }
}

fn declare(
    atoms: &mut AtomTable,
    scope: AtomId,
    node: &AstNode,
    kind: AtomKind,
) -> Result<AtomId, Fault> {
    let name = node.text().ok_or_else(|| missing(node, "a name"))?;
    atoms
        .declare(scope, name, kind, node.span)
        .map_err(|err| resolve_fault(&err, node.span))
}

/// Name of a local, parameter or field: a plain, non-reserved identifier.
pub(crate) fn local_name(node: &AstNode) -> Result<&str, Fault> {
    let raw = node.text().ok_or_else(|| missing(node, "a name"))?;
    if is_plain_identifier(raw) && !RESERVED.contains(&raw) {
        Ok(raw)
    } else {
        Err(Fault::new(
            FaultKind::InvalidIdentifier,
            format!("`{raw}` is not a valid identifier"),
        )
        .or_span(node.span))
    }
}

pub(crate) fn resolve_signatures(cx: &mut Context, plan: &mut Plan<'_>) {
    for class in &plan.classes {
        if let Err(fault) = resolve_fields(&mut cx.atoms, class) {
            cx.atoms.mark_invalid(class.atom);
            cx.diag.fault(&fault.in_atom(class.atom), class.source);
        }
    }

    for pending in &mut plan.functions {
        let result = signature(&mut cx.atoms, pending.scope, pending.node, pending.shape)
            .and_then(|(params, ret)| {
                cx.atoms
                    .set_signature(pending.atom, &params, ret)
                    .map_err(|err| resolve_fault(&err, pending.node.span))
            });
        match result {
            Ok(_) => pending.signed = true,
            Err(fault) => {
                cx.atoms.mark_invalid(pending.atom);
                cx.diag.fault(&fault.in_atom(pending.atom), pending.source);
            }
        }
    }

    for global in &plan.globals {
        let Some(ty_node) = global.node.child(Rule::Type) else {
            continue;
        };
        match resolve_type(&mut cx.atoms, global.scope, ty_node, TypePosition::Other) {
            Ok(ty) => {
                if let Some(atom) = cx.atoms.get_mut(global.atom) {
                    atom.ty = Some(ty);
                }
            }
            Err(fault) => {
                cx.atoms.mark_invalid(global.atom);
                cx.diag.fault(&fault.in_atom(global.atom), global.source);
            }
        }
    }
}

fn resolve_fields(atoms: &mut AtomTable, class: &PendingClass<'_>) -> Result<(), Fault> {
    let mut fields = Vec::new();
    for field in class.node.children_of(Rule::Field) {
        let name = atoms.interner().intern(local_name(field)?);
        if fields.iter().any(|(existing, _)| *existing == name) {
            return Err(Fault::new(
                FaultKind::InvalidIdentifier,
                format!("field `{}` is declared twice", atoms.interner().lookup(name)),
            )
            .or_span(field.span));
        }
        let ty_node = field
            .child(Rule::Type)
            .ok_or_else(|| missing(field, "a type"))?;
        let ty = resolve_type(atoms, class.atom, ty_node, TypePosition::Other)?;
        fields.push((name, ty));
    }
    if let Some(atom) = atoms.get_mut(class.atom) {
        atom.fields = fields;
    }
    Ok(())
}

/// Parameter and return types of a function, method, destructor or
/// canonical closure node.
pub(crate) fn signature(
    atoms: &mut AtomTable,
    scope: AtomId,
    node: &AstNode,
    shape: FnShape,
) -> Result<(Vec<TypeId>, TypeId), Fault> {
    let mut params = Vec::new();
    if let FnShape::Method(receiver) = shape {
        params.push(receiver);
    }
    if node.rule == Rule::Destructor {
        return Ok((params, TypeId::VOID));
    }
    if let Some(list) = node.child(Rule::Params) {
        for param in &list.children {
            if param.rule != Rule::Param {
                return Err(unexpected(param, "a parameter list"));
            }
            local_name(param)?;
            let ty_node = param
                .child(Rule::Type)
                .ok_or_else(|| missing(param, "a type"))?;
            params.push(resolve_type(atoms, scope, ty_node, TypePosition::Param)?);
        }
    }
    let ret = match node.child(Rule::Type) {
        Some(ty) => resolve_type(atoms, scope, ty, TypePosition::Other)?,
        None => TypeId::VOID,
    };
    Ok((params, ret))
}

//! Calls, construction and closures.

use std::sync::Arc;

use kiln_diagnostic::{Fault, FaultKind};
use kiln_ir::ir::{FuncRef, Op};
use kiln_ir::{AstNode, AtomId, Clid, Rule};
use kiln_types::names::{canonicalize, operator_name};
use kiln_types::{AtomFlags, AtomKind, ResolveError, TypeId};

use super::BodyLowerer;
use crate::declare::{signature, FnShape};
use crate::diag::{missing, resolve_fault, unify_fault};

/// Hidden name of closure atoms.
pub(crate) const CLOSURE_NAME: &str = "{closure}";

/// Desugar a closure literal into a function node: the body becomes a
/// block, and an expression body becomes `(return e)` when a return type
/// is declared.
pub(crate) fn canonical_closure(node: &AstNode) -> AstNode {
    let mut function = AstNode::new(Rule::Function, node.span).with_symbol(CLOSURE_NAME);
    let mut returns = false;
    let mut body = None;
    for child in &node.children {
        match child.rule {
            Rule::Params => function.children.push(child.clone()),
            Rule::Type => {
                returns = true;
                function.children.push(child.clone());
            }
            _ if body.is_none() => body = Some(child),
            _ => function.children.push(child.clone()),
        }
    }
    let block = match body {
        Some(block) if block.rule == Rule::Block => block.clone(),
        Some(expr) => {
            let stmt = if returns {
                AstNode::new(Rule::Return, expr.span).with_child(expr.clone())
            } else {
                expr.clone()
            };
            AstNode::new(Rule::Block, expr.span).with_child(stmt)
        }
        None => AstNode::new(Rule::Block, node.span),
    };
    function.with_child(block)
}

impl BodyLowerer<'_> {
    /// `(call NAME args*)`: a local or global holding a function, or a
    /// named function chosen by overload resolution.
    pub(super) fn lower_call(&mut self, node: &AstNode) -> Result<Clid, Fault> {
        let path = node.text().ok_or_else(|| missing(node, "a callee"))?;
        if let Some(callee) = self.local(path) {
            let args = self.lower_args(&node.children, &[])?;
            return self.call_indirect(callee, &args, node);
        }

        let ids = self
            .cx
            .atoms
            .lookup_path(self.scope, path)
            .map_err(|err| resolve_fault(&err, node.span))?;
        if let [id] = ids.as_slice() {
            if self.cx.atoms[*id].kind == AtomKind::Variable {
                let (global, ty) = self.global(path, node)?;
                let callee = self.typed(ty, node.span)?;
                self.emit(
                    Op::LoadGlobal {
                        dst: callee.slot,
                        global,
                    },
                    node.span,
                );
                let args = self.lower_args(&node.children, &[])?;
                return self.call_indirect(callee, &args, node);
            }
        }

        let hints = self.param_hints(&ids, node.children.len(), 0);
        let args = self.lower_args(&node.children, &hints)?;
        let types = self.arg_types(&args);
        let callee = self
            .cx
            .atoms
            .select(path, &ids, &types)
            .map_err(|err| resolve_fault(&err, node.span))?;
        self.emit_call(callee, &args, node)
    }

    /// `(method NAME receiver args*)`: overloads are the class's members.
    pub(super) fn lower_method(&mut self, node: &AstNode) -> Result<Clid, Fault> {
        let name = node.text().ok_or_else(|| missing(node, "a method name"))?;
        let [recv_node, arg_nodes @ ..] = node.children.as_slice() else {
            return Err(missing(node, "a receiver"));
        };
        let recv = self.lower_expr(recv_node)?;
        let ty = self.known(recv, recv_node.span)?;
        let Some(class) = self.cx.atoms.types().class_atom(ty) else {
            return Err(Fault::new(
                FaultKind::TypeConflict,
                format!("`{}` has no methods", self.describe(ty)),
            )
            .or_span(recv_node.span));
        };

        let canonical = canonicalize(name).map_err(|err| resolve_fault(&err, node.span))?;
        let ids: Vec<AtomId> = self
            .cx
            .atoms
            .interner()
            .get(&canonical)
            .map(|n| self.cx.atoms.members(class, n).to_vec())
            .unwrap_or_default();
        if ids.is_empty() {
            return Err(Fault::new(
                FaultKind::UnknownIdentifier,
                format!(
                    "class `{}` has no method `{canonical}`",
                    self.cx.atoms.qualified_name(class)
                ),
            )
            .or_span(node.span));
        }

        let hints = self.param_hints(&ids, arg_nodes.len(), 1);
        let mut args = vec![recv];
        args.extend(self.lower_args(arg_nodes, &hints)?);
        let types = self.arg_types(&args);
        let callee = self
            .cx
            .atoms
            .select(&canonical, &ids, &types)
            .map_err(|err| resolve_fault(&err, node.span))?;
        self.emit_call(callee, &args, node)
    }

    /// `(intrinsic NAME args*)`, checked against the registry.
    pub(super) fn lower_intrinsic(&mut self, node: &AstNode) -> Result<Clid, Fault> {
        let name = node.text().ok_or_else(|| missing(node, "an intrinsic name"))?;
        let intrinsic = self.cx.registry.lookup(name).cloned().ok_or_else(|| {
            Fault::new(
                FaultKind::UnknownIdentifier,
                format!("unknown intrinsic `{name}`"),
            )
            .or_span(node.span)
        })?;
        if node.children.len() != intrinsic.arity() {
            return Err(Fault::new(
                FaultKind::NoMatchingOverload,
                format!(
                    "intrinsic `{name}` takes {} argument(s), found {}",
                    intrinsic.arity(),
                    node.children.len()
                ),
            )
            .or_span(node.span));
        }

        let hints: Vec<_> = intrinsic
            .params
            .iter()
            .map(|&p| (p != TypeId::ANY).then_some(p))
            .collect();
        let args = self.lower_args(&node.children, &hints)?;
        for (arg, (&param, arg_node)) in args.iter().zip(intrinsic.params.iter().zip(&node.children)) {
            if param != TypeId::ANY {
                self.unify(*arg, param, arg_node.span)?;
            }
        }
        let dst = self.typed(intrinsic.ret, node.span)?;
        let name = self.cx.atoms.interner().intern(name);
        self.emit(
            Op::Intrinsic {
                dst: dst.slot,
                name,
                args: args.iter().map(|a| a.slot).collect(),
            },
            node.span,
        );
        Ok(dst)
    }

    /// `(new CLASS field-values*)` in field declaration order.
    pub(super) fn lower_new(&mut self, node: &AstNode) -> Result<Clid, Fault> {
        let path = node.text().ok_or_else(|| missing(node, "a class name"))?;
        let ids = self
            .cx
            .atoms
            .lookup_path(self.scope, path)
            .map_err(|err| resolve_fault(&err, node.span))?;
        let class = match ids.as_slice() {
            [class] if self.cx.atoms[*class].kind == AtomKind::Class => *class,
            _ => {
                return Err(Fault::new(
                    FaultKind::TypeConflict,
                    format!("`{path}` is not a class"),
                )
                .or_span(node.span))
            }
        };
        let ty = self.cx.atoms.class_type(class);
        let fields: Vec<TypeId> = self.cx.atoms[class].fields.iter().map(|(_, t)| *t).collect();
        if node.children.len() != fields.len() {
            return Err(Fault::new(
                FaultKind::NoMatchingOverload,
                format!(
                    "`{path}` has {} field(s), found {} value(s)",
                    fields.len(),
                    node.children.len()
                ),
            )
            .or_span(node.span));
        }

        let hints: Vec<_> = fields.iter().copied().map(Some).collect();
        let args = self.lower_args(&node.children, &hints)?;
        for ((arg, &field), arg_node) in args.iter().zip(&fields).zip(&node.children) {
            self.unify(*arg, field, arg_node.span)?;
        }
        let dst = self.typed(ty, node.span)?;
        self.emit(
            Op::New {
                dst: dst.slot,
                class,
                fields: args.iter().map(|a| a.slot).collect(),
            },
            node.span,
        );
        Ok(dst)
    }

    /// `(closure (params ...) (type T)? body)`: a hidden function atom
    /// lowered from the cached canonical fragment. Closures do not capture;
    /// their bodies see only their parameters and atoms.
    pub(super) fn lower_closure(&mut self, node: &AstNode) -> Result<Clid, Fault> {
        let template = self.cx.templates.get_or_build(node, canonical_closure);
        let closure = self.cx.atoms.declare_hidden(
            self.scope,
            CLOSURE_NAME,
            AtomKind::Function,
            node.span,
        );
        self.cx.atoms.add_flags(closure, AtomFlags::CLOSURE);

        let signed = signature(&mut self.cx.atoms, self.scope, &template, FnShape::Free)
            .and_then(|(params, ret)| {
                self.cx
                    .atoms
                    .set_signature(closure, &params, ret)
                    .map_err(|err| resolve_fault(&err, node.span))
            });
        let ty = match signed {
            Ok(ty) => ty,
            Err(fault) => {
                self.cx.atoms.mark_invalid(closure);
                return Err(fault);
            }
        };

        let mut inner = BodyLowerer::new(&mut *self.cx, Arc::clone(&self.source), closure, self.scope);
        inner.lower_body(&template, false);
        inner.finish();
        if self.cx.atoms[closure].is_invalid() {
            self.cx.atoms.mark_invalid(self.atom);
        }

        let dst = self.typed(ty, node.span)?;
        self.emit(
            Op::LoadFunc {
                dst: dst.slot,
                func: FuncRef::Direct(closure),
            },
            node.span,
        );
        Ok(dst)
    }

    /// Call `operator<symbol>` for operands of non-builtin types.
    pub(super) fn operator_call(
        &mut self,
        symbol: &str,
        args: &[Clid],
        node: &AstNode,
    ) -> Result<Clid, Fault> {
        let name = operator_name(symbol);
        let types = self.arg_types(args);
        let callee = self
            .cx
            .atoms
            .resolve_call(self.scope, &name, &types)
            .map_err(|err| match err {
                ResolveError::Unknown { .. } => {
                    let operands: Vec<_> = types
                        .iter()
                        .map(|t| t.map_or_else(|| "_".to_string(), |t| self.describe(t)))
                        .collect();
                    Fault::new(
                        FaultKind::UnknownIdentifier,
                        format!("no `{name}` is declared for ({})", operands.join(", ")),
                    )
                    .or_span(node.span)
                }
                other => resolve_fault(&other, node.span),
            })?;
        self.emit_call(callee, args, node)
    }

    // Shared pieces

    fn lower_args(
        &mut self,
        nodes: &[AstNode],
        hints: &[Option<TypeId>],
    ) -> Result<Vec<Clid>, Fault> {
        nodes
            .iter()
            .enumerate()
            .map(|(i, arg)| self.lower_expr_hint(arg, hints.get(i).copied().flatten()))
            .collect()
    }

    fn arg_types(&self, args: &[Clid]) -> Vec<Option<TypeId>> {
        args.iter().map(|&a| self.concrete(a)).collect()
    }

    /// Parameter types of the only overload with the right arity, used to
    /// type bare literal arguments. `skip` drops a receiver.
    fn param_hints(&self, ids: &[AtomId], arity: usize, skip: usize) -> Vec<Option<TypeId>> {
        let mut fitting = ids
            .iter()
            .map(|&id| &self.cx.atoms[id])
            .filter(|a| a.kind == AtomKind::Function && a.arity() == arity + skip);
        match (fitting.next(), fitting.next()) {
            (Some(only), None) => only
                .params
                .iter()
                .skip(skip)
                .map(|&p| (p != TypeId::ANY).then_some(p))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Direct call to a resolved atom; arguments are narrowed to its
    /// parameter types.
    fn emit_call(&mut self, callee: AtomId, args: &[Clid], node: &AstNode) -> Result<Clid, Fault> {
        let (params, ret) = {
            let atom = &self.cx.atoms[callee];
            (atom.params.clone(), atom.ret)
        };
        for (&arg, &param) in args.iter().zip(params.iter()) {
            if param != TypeId::ANY {
                self.unify(arg, param, node.span)?;
            }
        }
        let dst = self.typed(ret, node.span)?;
        self.emit(
            Op::Call {
                dst: dst.slot,
                callee,
                args: args.iter().map(|a| a.slot).collect(),
            },
            node.span,
        );
        Ok(dst)
    }

    /// Call through a slot holding a function value.
    fn call_indirect(&mut self, callee: Clid, args: &[Clid], node: &AstNode) -> Result<Clid, Fault> {
        let types = self.arg_types(args);
        let shape = self
            .cx
            .atoms
            .unify_call(callee, &types)
            .map_err(|err| unify_fault(&self.cx.atoms, &err, node.span))?;
        let params = self
            .concrete(callee)
            .and_then(|ty| self.cx.atoms.types().signature(ty))
            .map(|(params, _)| params.to_vec())
            .unwrap_or_default();
        for (&arg, &param) in args.iter().zip(&params) {
            if param != TypeId::ANY {
                self.unify(arg, param, node.span)?;
            }
        }
        let dst = self.typed(shape.ret, node.span)?;
        self.emit(
            Op::CallIndirect {
                dst: dst.slot,
                callee: callee.slot,
                args: args.iter().map(|a| a.slot).collect(),
            },
            node.span,
        );
        Ok(dst)
    }
}

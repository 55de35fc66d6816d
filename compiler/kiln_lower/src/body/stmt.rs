//! Statements.

use kiln_diagnostic::{ErrorCode, Fault, FaultKind};
use kiln_ir::ir::{Constant, Op};
use kiln_ir::{AstNode, AtomId, Clid, Literal, Name, Rule, Slot, Span};
use kiln_types::{AtomFlags, AtomKind, TypeId};

use super::BodyLowerer;
use crate::declare::local_name;
use crate::diag::{missing, resolve_fault, unexpected};
use crate::ty::{resolve_type, TypePosition};

/// Children of `node` other than its type annotation.
pub(super) fn values(node: &AstNode) -> impl Iterator<Item = &AstNode> {
    node.children.iter().filter(|c| c.rule != Rule::Type)
}

impl BodyLowerer<'_> {
    pub(super) fn lower_block(&mut self, block: &AstNode) {
        self.locals.push();
        let mut warned = false;
        for stmt in &block.children {
            if !warned && !self.builder.is_reachable() && self.cx.options.warn_unreachable {
                warned = true;
                self.cx
                    .diag
                    .warning(ErrorCode::K3002, "unreachable code", &self.source, stmt.span);
            }
            self.lower_statement(stmt);
        }
        self.locals.pop();
    }

    /// Lower one statement, recovering from its failure.
    pub(super) fn lower_statement(&mut self, node: &AstNode) {
        self.recover(|this| this.statement(node));
    }

    fn statement(&mut self, node: &AstNode) -> Result<(), Fault> {
        match node.rule {
            Rule::Block => {
                self.lower_block(node);
                Ok(())
            }
            Rule::Let => self.lower_let(node),
            Rule::Assign => self.lower_assign(node),
            Rule::SetField => self.lower_set_field(node),
            Rule::Return => self.lower_return(node),
            Rule::If => self.lower_if(node),
            Rule::While => self.lower_while(node),
            Rule::Break | Rule::Continue => self.lower_loop_jump(node),
            Rule::Assert => self.lower_assert(node),
            Rule::Destroy => self.lower_destroy(node),
            rule if rule.is_expression() => self.lower_expr(node).map(drop),
            _ => Err(unexpected(node, "a block")),
        }
    }

    fn lower_let(&mut self, node: &AstNode) -> Result<(), Fault> {
        let name = local_name(node)?;
        let name = self.cx.atoms.interner().intern(name);
        let declared = node
            .child(Rule::Type)
            .map(|t| resolve_type(&mut self.cx.atoms, self.scope, t, TypePosition::Other))
            .transpose()?;

        let slot = self.fresh(node.span);
        if let Some(ty) = declared {
            self.unify(slot, ty, node.span)?;
        }
        let mut init = values(node);
        if let Some(value_node) = init.next() {
            let value = self.lower_expr_hint(value_node, declared)?;
            self.unify_slots(slot, value, value_node.span)?;
            self.emit(
                Op::Move {
                    dst: slot.slot,
                    src: value.slot,
                },
                node.span,
            );
        } else {
            match declared {
                Some(ty) => self.check_default(name, ty, slot, node.span)?,
                // Checked once the body has settled the slot's type.
                None => self.defaulted.push((name, slot, node.span)),
            }
            self.emit(Op::Zero { dst: slot.slot }, node.span);
        }
        if let Some(extra) = init.next() {
            return Err(unexpected(extra, "`let`"));
        }
        // Bound after the initializer: `let x = x` reads the outer `x`.
        self.locals.bind(name, slot);
        Ok(())
    }

    /// An uninitialised local starts at its type's default value, which only
    /// builtin operand types have.
    pub(super) fn check_default(
        &self,
        name: Name,
        ty: TypeId,
        slot: Clid,
        span: Span,
    ) -> Result<(), Fault> {
        if ty == TypeId::ERROR || self.cx.atoms.types().is_builtin_operand(ty) {
            return Ok(());
        }
        Err(Fault::new(
            FaultKind::TypeConflict,
            format!(
                "`{}` of type `{}` needs an initializer",
                self.cx.atoms.interner().lookup(name),
                self.describe(ty)
            ),
        )
        .at_slot(slot.slot)
        .or_span(span))
    }

    fn lower_assign(&mut self, node: &AstNode) -> Result<(), Fault> {
        let target = node.text().ok_or_else(|| missing(node, "a target"))?;
        let value_node = values(node)
            .next()
            .ok_or_else(|| missing(node, "a value"))?;

        if let Some(local) = self.local(target) {
            let hint = self.concrete(local);
            let value = self.lower_expr_hint(value_node, hint)?;
            self.unify_slots(local, value, value_node.span)?;
            self.emit(
                Op::Move {
                    dst: local.slot,
                    src: value.slot,
                },
                node.span,
            );
            return Ok(());
        }

        let (global, ty) = self.global(target, node)?;
        let value = self.lower_expr_hint(value_node, Some(ty))?;
        self.unify(value, ty, value_node.span)?;
        self.emit(
            Op::StoreGlobal {
                global,
                src: value.slot,
            },
            node.span,
        );
        Ok(())
    }

    fn lower_set_field(&mut self, node: &AstNode) -> Result<(), Fault> {
        let field = node.text().ok_or_else(|| missing(node, "a field name"))?;
        let mut parts = values(node);
        let obj_node = parts.next().ok_or_else(|| missing(node, "an object"))?;
        let value_node = parts.next().ok_or_else(|| missing(node, "a value"))?;

        let obj = self.lower_expr(obj_node)?;
        let (index, field_ty) = self.field_of(obj, field, obj_node)?;
        let value = self.lower_expr_hint(value_node, Some(field_ty))?;
        self.unify(value, field_ty, value_node.span)?;
        self.emit(
            Op::SetField {
                obj: obj.slot,
                field: index,
                src: value.slot,
            },
            node.span,
        );
        Ok(())
    }

    fn lower_return(&mut self, node: &AstNode) -> Result<(), Fault> {
        match values(node).next() {
            Some(value_node) => {
                let value = self.lower_expr_hint(value_node, Some(self.ret))?;
                self.unify(value, self.ret, value_node.span)?;
                self.emit(
                    Op::Return {
                        value: Some(value.slot),
                    },
                    node.span,
                );
            }
            None => {
                if self.ret != TypeId::VOID && self.ret != TypeId::ERROR {
                    return Err(Fault::new(
                        FaultKind::TypeConflict,
                        format!("expected a `{}` return value", self.describe(self.ret)),
                    )
                    .or_span(node.span));
                }
                self.emit(Op::Return { value: None }, node.span);
            }
        }
        Ok(())
    }

    fn lower_assert(&mut self, node: &AstNode) -> Result<(), Fault> {
        let mut parts = node.children.iter();
        let cond_node = parts.next().ok_or_else(|| missing(node, "a condition"))?;
        let message = match parts.next() {
            None => "assertion failed",
            Some(AstNode {
                rule: Rule::Str,
                literal: Some(Literal::Str(text)),
                ..
            }) => text.as_str(),
            Some(other) => return Err(unexpected(other, "`assert`")),
        };
        let cond = self.lower_expr_hint(cond_node, Some(TypeId::BOOL))?;
        self.unify(cond, TypeId::BOOL, cond_node.span)?;
        let message = self.cx.atoms.interner().intern(message);
        self.emit(
            Op::Assert {
                cond: cond.slot,
                message,
            },
            node.span,
        );
        Ok(())
    }

    fn lower_destroy(&mut self, node: &AstNode) -> Result<(), Fault> {
        let obj_node = node
            .children
            .first()
            .ok_or_else(|| missing(node, "a value"))?;
        let obj = self.lower_expr(obj_node)?;
        let ty = self.known(obj, obj_node.span)?;
        let Some(class) = self.cx.atoms.types().class_atom(ty) else {
            return Err(Fault::new(
                FaultKind::TypeConflict,
                format!("only class instances can be destroyed, found `{}`", self.describe(ty)),
            )
            .or_span(obj_node.span));
        };
        if self.cx.atoms[class].dtor.is_none() {
            let message = format!(
                "class `{}` declares no destructor; destroying it faults at run time",
                self.cx.atoms.qualified_name(class)
            );
            self.cx
                .diag
                .warning(ErrorCode::K3003, message, &self.source, node.span);
        }
        self.emit(Op::Destroy { obj: obj.slot }, node.span);
        Ok(())
    }

    // Globals and shims

    pub(super) fn global_init(&mut self, global: AtomId, node: &AstNode) -> Result<(), Fault> {
        let declared = self.cx.atoms[global].ty;
        let value = match values(node).next() {
            Some(init) => {
                let value = self.lower_expr_hint(init, declared)?;
                if let Some(ty) = declared {
                    self.unify(value, ty, init.span)?;
                }
                value
            }
            None => {
                let ty = declared.ok_or_else(|| {
                    Fault::new(
                        FaultKind::UninferredType,
                        format!(
                            "global `{}` needs a type or an initializer",
                            self.cx.atoms.qualified_name(global)
                        ),
                    )
                    .or_span(node.span)
                })?;
                self.zero_value(ty, node)?
            }
        };
        let ty = self.known(value, node.span)?;
        if let Some(atom) = self.cx.atoms.get_mut(global) {
            atom.ty = Some(ty);
        }
        self.emit(
            Op::StoreGlobal {
                global,
                src: value.slot,
            },
            node.span,
        );
        Ok(())
    }

    fn zero_value(&mut self, ty: TypeId, node: &AstNode) -> Result<Clid, Fault> {
        let types = self.cx.atoms.types();
        let value = if ty == TypeId::BOOL {
            Constant::Bool(false)
        } else if types.is_integer(ty) {
            Constant::Int(0)
        } else if types.is_float(ty) {
            Constant::float(0.0)
        } else if ty == TypeId::STR {
            Constant::Str(self.cx.atoms.interner().intern(""))
        } else {
            return Err(Fault::new(
                FaultKind::TypeConflict,
                format!("a global of type `{}` needs an initializer", self.describe(ty)),
            )
            .or_span(node.span));
        };
        let dst = self.typed(ty, node.span)?;
        self.emit(
            Op::Const {
                dst: dst.slot,
                value,
            },
            node.span,
        );
        Ok(dst)
    }

    /// `(fn sqrt2 (params (param x (type float))) (type float) (intrinsic sqrt))`
    /// forwards its parameters to the intrinsic.
    pub(super) fn lower_shim(&mut self, shim: &AstNode) -> Result<(), Fault> {
        let name = shim.text().ok_or_else(|| missing(shim, "an intrinsic name"))?;
        if let Some(extra) = shim.children.first() {
            return Err(unexpected(extra, "an intrinsic shim"));
        }
        let intrinsic = self.cx.registry.lookup(name).cloned().ok_or_else(|| {
            Fault::new(
                FaultKind::UnknownIdentifier,
                format!("unknown intrinsic `{name}`"),
            )
            .or_span(shim.span)
        })?;
        let atom = &self.cx.atoms[self.atom];
        if atom.params.as_slice() != &*intrinsic.params || atom.ret != intrinsic.ret {
            let expected = self.describe(atom.ty.unwrap_or(TypeId::ERROR));
            return Err(Fault::new(
                FaultKind::TypeConflict,
                format!("signature `{expected}` does not match intrinsic `{name}`"),
            )
            .or_span(shim.span));
        }
        self.cx
            .atoms
            .add_flags(self.atom, AtomFlags::INTRINSIC_SHIM);

        let args = (0..intrinsic.arity())
            .map(|i| Slot::new(u32::try_from(i).unwrap_or(u32::MAX)))
            .collect();
        let dst = self.typed(intrinsic.ret, shim.span)?;
        let name = self.cx.atoms.interner().intern(name);
        self.emit(
            Op::Intrinsic {
                dst: dst.slot,
                name,
                args,
            },
            shim.span,
        );
        let value = (intrinsic.ret != TypeId::VOID).then_some(dst.slot);
        self.emit(Op::Return { value }, shim.span);
        Ok(())
    }

    // Name helpers

    /// The local slot bound to an unqualified `name`, if any.
    pub(super) fn local(&self, name: &str) -> Option<Clid> {
        if name.contains("::") {
            return None;
        }
        let name = self.cx.atoms.interner().get(name)?;
        self.locals.lookup(name)
    }

    /// The variable atom `path` names and its type.
    pub(super) fn global(&self, path: &str, node: &AstNode) -> Result<(AtomId, TypeId), Fault> {
        let ids = self
            .cx
            .atoms
            .lookup_path(self.scope, path)
            .map_err(|err| resolve_fault(&err, node.span))?;
        let [id] = ids.as_slice() else {
            return Err(not_a_variable(path, node));
        };
        let atom = &self.cx.atoms[*id];
        if atom.kind != AtomKind::Variable {
            return Err(not_a_variable(path, node));
        }
        if atom.is_invalid() {
            return Ok((*id, atom.ty.unwrap_or(TypeId::ERROR)));
        }
        let ty = atom.ty.ok_or_else(|| {
            Fault::new(
                FaultKind::UninferredType,
                format!("type of global `{path}` is not known here"),
            )
            .or_span(node.span)
        })?;
        Ok((*id, ty))
    }

    /// Index and type of `field` on the class instance in `obj`.
    pub(super) fn field_of(
        &self,
        obj: Clid,
        field: &str,
        obj_node: &AstNode,
    ) -> Result<(u32, TypeId), Fault> {
        let ty = self.known(obj, obj_node.span)?;
        let Some(class) = self.cx.atoms.types().class_atom(ty) else {
            return Err(Fault::new(
                FaultKind::TypeConflict,
                format!("`{}` has no fields", self.describe(ty)),
            )
            .or_span(obj_node.span));
        };
        self.cx
            .atoms
            .interner()
            .get(field)
            .and_then(|name| self.cx.atoms[class].field(name))
            .ok_or_else(|| {
                Fault::new(
                    FaultKind::UnknownIdentifier,
                    format!(
                        "class `{}` has no field `{field}`",
                        self.cx.atoms.qualified_name(class)
                    ),
                )
                .or_span(obj_node.span)
            })
    }
}

fn not_a_variable(path: &str, node: &AstNode) -> Fault {
    Fault::new(
        FaultKind::TypeConflict,
        format!("`{path}` is not a variable"),
    )
    .or_span(node.span)
}

//! Expressions. Each returns the slot holding its value.

use kiln_diagnostic::{Fault, FaultKind};
use kiln_ir::ir::{BinOp, Constant, FuncRef, Op, UnOp};
use kiln_ir::{AstNode, AtomId, Clid, Literal, Rule};
use kiln_stack::ensure_sufficient_stack;
use kiln_types::{AtomKind, TypeId, TypePool};

use super::BodyLowerer;
use crate::diag::{missing, resolve_fault, unexpected, unify_fault};
use crate::ty::{resolve_type, TypePosition};

/// An integer or float literal with no type annotation, whose type comes
/// from its context.
fn is_bare_literal(node: &AstNode) -> bool {
    matches!(node.rule, Rule::Int | Rule::Float) && node.child(Rule::Type).is_none()
}

impl BodyLowerer<'_> {
    pub(super) fn lower_expr(&mut self, node: &AstNode) -> Result<Clid, Fault> {
        self.lower_expr_hint(node, None)
    }

    /// Lower `node`; `hint` is the type the context expects, used to type
    /// bare numeric literals.
    pub(super) fn lower_expr_hint(
        &mut self,
        node: &AstNode,
        hint: Option<TypeId>,
    ) -> Result<Clid, Fault> {
        ensure_sufficient_stack(|| self.expr(node, hint))
    }

    fn expr(&mut self, node: &AstNode, hint: Option<TypeId>) -> Result<Clid, Fault> {
        match node.rule {
            Rule::Int => self.lower_int(node, hint),
            Rule::Float => self.lower_float(node, hint),
            Rule::Bool => match node.literal {
                Some(Literal::Bool(value)) => {
                    self.constant(Constant::Bool(value), TypeId::BOOL, node)
                }
                _ => Err(missing(node, "a boolean")),
            },
            Rule::Str => match &node.literal {
                Some(Literal::Str(text)) => {
                    let name = self.cx.atoms.interner().intern(text);
                    self.constant(Constant::Str(name), TypeId::STR, node)
                }
                _ => Err(missing(node, "a string")),
            },
            Rule::Ident => self.lower_ident(node),
            Rule::Binary => self.lower_binary(node),
            Rule::Unary => self.lower_unary(node),
            Rule::And | Rule::Or => self.lower_logical(node),
            Rule::Call => self.lower_call(node),
            Rule::Method => self.lower_method(node),
            Rule::Intrinsic => self.lower_intrinsic(node),
            Rule::Cast => self.lower_cast(node),
            Rule::New => self.lower_new(node),
            Rule::GetField => self.lower_get_field(node),
            Rule::Closure => self.lower_closure(node),
            _ => Err(unexpected(node, "an expression")),
        }
    }

    fn constant(&mut self, value: Constant, ty: TypeId, node: &AstNode) -> Result<Clid, Fault> {
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

    /// Explicit `(type T)` child, else the hint when it fits, else `fallback`.
    fn literal_type(
        &mut self,
        node: &AstNode,
        hint: Option<TypeId>,
        fits: fn(&TypePool, TypeId) -> bool,
        fallback: TypeId,
    ) -> Result<TypeId, Fault> {
        let ty = match node.child(Rule::Type) {
            Some(t) => resolve_type(&mut self.cx.atoms, self.scope, t, TypePosition::Other)?,
            None => hint
                .filter(|&h| fits(self.cx.atoms.types(), h))
                .unwrap_or(fallback),
        };
        if fits(self.cx.atoms.types(), ty) {
            Ok(ty)
        } else {
            Err(Fault::new(
                FaultKind::TypeConflict,
                format!("`{}` literal cannot have type `{}`", node.rule, self.describe(ty)),
            )
            .or_span(node.span))
        }
    }

    fn lower_int(&mut self, node: &AstNode, hint: Option<TypeId>) -> Result<Clid, Fault> {
        let Some(Literal::Int(value)) = node.literal else {
            return Err(missing(node, "an integer"));
        };
        let ty = self.literal_type(node, hint, |pool, t| pool.is_integer(t), TypeId::INT)?;
        let in_range = self
            .cx
            .atoms
            .types()
            .int_kind(ty)
            .is_some_and(|kind| kind.contains(value));
        if !in_range {
            return Err(Fault::new(
                FaultKind::TypeConflict,
                format!("literal `{value}` does not fit in `{}`", self.describe(ty)),
            )
            .or_span(node.span));
        }
        self.constant(Constant::Int(value), ty, node)
    }

    fn lower_float(&mut self, node: &AstNode, hint: Option<TypeId>) -> Result<Clid, Fault> {
        #[allow(clippy::cast_precision_loss)]
        let value = match node.literal {
            Some(Literal::Float(v)) => v,
            Some(Literal::Int(v)) => v as f64,
            _ => return Err(missing(node, "a number")),
        };
        let ty = self.literal_type(node, hint, |pool, t| pool.is_float(t), TypeId::FLOAT)?;
        #[allow(clippy::cast_possible_truncation)]
        let value = if self.cx.atoms.types().float_bits(ty) == Some(32) {
            f64::from(value as f32)
        } else {
            value
        };
        self.constant(Constant::float(value), ty, node)
    }

    /// A local, a global, or a function used as a value.
    fn lower_ident(&mut self, node: &AstNode) -> Result<Clid, Fault> {
        let path = node.text().ok_or_else(|| missing(node, "a name"))?;
        if let Some(local) = self.local(path) {
            return Ok(local);
        }
        let ids = self
            .cx
            .atoms
            .lookup_path(self.scope, path)
            .map_err(|err| resolve_fault(&err, node.span))?;

        if let [id] = ids.as_slice() {
            match self.cx.atoms[*id].kind {
                AtomKind::Variable => {
                    let (global, ty) = self.global(path, node)?;
                    let dst = self.typed(ty, node.span)?;
                    self.emit(
                        Op::LoadGlobal {
                            dst: dst.slot,
                            global,
                        },
                        node.span,
                    );
                    return Ok(dst);
                }
                AtomKind::Function => {}
                kind => {
                    return Err(Fault::new(
                        FaultKind::TypeConflict,
                        format!("`{path}` is a {}, not a value", kind.as_str()),
                    )
                    .or_span(node.span))
                }
            }
        }
        self.function_value(path, &ids, node)
    }

    /// Load one of the functions `ids`. With several overloads the slot is
    /// left pending until a call or a typed context narrows it.
    pub(super) fn function_value(
        &mut self,
        path: &str,
        ids: &[AtomId],
        node: &AstNode,
    ) -> Result<Clid, Fault> {
        let candidates = self.cx.atoms.candidates(ids);
        match candidates.len() {
            0 => Err(Fault::new(
                FaultKind::UninferredType,
                format!("signature of `{path}` is not known"),
            )
            .or_span(node.span)),
            1 => {
                let (atom, ty) = (candidates[0].atom, candidates[0].ty);
                let dst = self.typed(ty, node.span)?;
                self.emit(
                    Op::LoadFunc {
                        dst: dst.slot,
                        func: FuncRef::Direct(atom),
                    },
                    node.span,
                );
                Ok(dst)
            }
            _ => {
                let dst = self.fresh(node.span);
                self.cx
                    .atoms
                    .mark_overloaded(dst, candidates)
                    .map_err(|err| unify_fault(&self.cx.atoms, &err, node.span))?;
                self.emit(
                    Op::LoadFunc {
                        dst: dst.slot,
                        func: FuncRef::Pending,
                    },
                    node.span,
                );
                Ok(dst)
            }
        }
    }

    /// `(binary OP lhs rhs)`. Operands of builtin types use the opcode;
    /// anything else calls `operator<OP>`.
    fn lower_binary(&mut self, node: &AstNode) -> Result<Clid, Fault> {
        let symbol = node.text().ok_or_else(|| missing(node, "an operator"))?;
        let [lhs_node, rhs_node] = node.children.as_slice() else {
            return Err(missing(node, "two operands"));
        };

        // A bare literal takes its type from the other operand.
        let (lhs, rhs) = if is_bare_literal(lhs_node) && !is_bare_literal(rhs_node) {
            let rhs = self.lower_expr(rhs_node)?;
            let lhs = self.lower_expr_hint(lhs_node, self.concrete(rhs))?;
            (lhs, rhs)
        } else {
            let lhs = self.lower_expr(lhs_node)?;
            let rhs = self.lower_expr_hint(rhs_node, self.concrete(lhs))?;
            (lhs, rhs)
        };

        let builtin = |ty: Option<TypeId>| {
            ty.map_or(true, |t| t == TypeId::ERROR || self.cx.atoms.types().is_builtin_operand(t))
        };
        if !builtin(self.concrete(lhs)) || !builtin(self.concrete(rhs)) {
            return self.operator_call(symbol, &[lhs, rhs], node);
        }

        let op = BinOp::from_symbol(symbol).ok_or_else(|| {
            Fault::new(
                FaultKind::UnexpectedNode,
                format!("unknown binary operator `{symbol}`"),
            )
            .or_span(node.span)
        })?;
        self.unify_slots(lhs, rhs, node.span)?;
        let operand = self.concrete(lhs);
        if let Some(ty) = operand {
            self.check_binary(op, ty, node)?;
        }

        let dst = self.fresh(node.span);
        if op.is_comparison() {
            self.unify(dst, TypeId::BOOL, node.span)?;
        } else {
            self.unify_slots(dst, lhs, node.span)?;
        }
        self.emit(
            Op::Binary {
                op,
                dst: dst.slot,
                lhs: lhs.slot,
                rhs: rhs.slot,
            },
            node.span,
        );
        Ok(dst)
    }

    fn check_binary(&self, op: BinOp, ty: TypeId, node: &AstNode) -> Result<(), Fault> {
        let types = self.cx.atoms.types();
        let ok = ty == TypeId::ERROR
            || match op {
                BinOp::Eq | BinOp::Ne => true,
                BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => {
                    types.is_numeric(ty) || ty == TypeId::STR
                }
                BinOp::Add => types.is_numeric(ty) || ty == TypeId::STR,
                BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::Rem => types.is_numeric(ty),
                _ => types.is_integer(ty),
            };
        if ok {
            Ok(())
        } else {
            Err(Fault::new(
                FaultKind::TypeConflict,
                format!(
                    "operator `{}` cannot be applied to `{}`",
                    op.mnemonic(),
                    self.describe(ty)
                ),
            )
            .or_span(node.span))
        }
    }

    /// `(unary OP operand)`
    fn lower_unary(&mut self, node: &AstNode) -> Result<Clid, Fault> {
        let symbol = node.text().ok_or_else(|| missing(node, "an operator"))?;
        let [operand_node] = node.children.as_slice() else {
            return Err(missing(node, "one operand"));
        };
        let src = self.lower_expr(operand_node)?;
        if let Some(ty) = self.concrete(src) {
            if ty != TypeId::ERROR && !self.cx.atoms.types().is_builtin_operand(ty) {
                return self.operator_call(symbol, &[src], node);
            }
        }
        let op = UnOp::from_symbol(symbol).ok_or_else(|| {
            Fault::new(
                FaultKind::UnexpectedNode,
                format!("unknown unary operator `{symbol}`"),
            )
            .or_span(node.span)
        })?;
        if let Some(ty) = self.concrete(src) {
            let types = self.cx.atoms.types();
            let ok = ty == TypeId::ERROR
                || match op {
                    UnOp::Neg => types.is_numeric(ty),
                    UnOp::Not => ty == TypeId::BOOL || types.is_integer(ty),
                };
            if !ok {
                return Err(Fault::new(
                    FaultKind::TypeConflict,
                    format!(
                        "operator `{}` cannot be applied to `{}`",
                        op.symbol(),
                        self.describe(ty)
                    ),
                )
                .or_span(node.span));
            }
        }
        let dst = self.fresh(node.span);
        self.unify_slots(dst, src, node.span)?;
        self.emit(
            Op::Unary {
                op,
                dst: dst.slot,
                src: src.slot,
            },
            node.span,
        );
        Ok(dst)
    }

    /// `(cast (type T) value)`. Whether the conversion is legal is decided
    /// by the VM against the frozen classdefs.
    fn lower_cast(&mut self, node: &AstNode) -> Result<Clid, Fault> {
        let ty_node = node
            .child(Rule::Type)
            .ok_or_else(|| missing(node, "a target type"))?;
        let value_node = super::stmt::values(node)
            .next()
            .ok_or_else(|| missing(node, "a value"))?;
        let ty = resolve_type(&mut self.cx.atoms, self.scope, ty_node, TypePosition::Other)?;
        let src = self.lower_expr(value_node)?;
        let dst = self.typed(ty, node.span)?;
        self.emit(
            Op::Cast {
                dst: dst.slot,
                src: src.slot,
            },
            node.span,
        );
        Ok(dst)
    }

    /// `(get FIELD obj)`
    fn lower_get_field(&mut self, node: &AstNode) -> Result<Clid, Fault> {
        let field = node.text().ok_or_else(|| missing(node, "a field name"))?;
        let [obj_node] = node.children.as_slice() else {
            return Err(missing(node, "an object"));
        };
        let obj = self.lower_expr(obj_node)?;
        let (index, ty) = self.field_of(obj, field, obj_node)?;
        let dst = self.typed(ty, node.span)?;
        self.emit(
            Op::GetField {
                dst: dst.slot,
                obj: obj.slot,
                field: index,
            },
            node.span,
        );
        Ok(dst)
    }
}

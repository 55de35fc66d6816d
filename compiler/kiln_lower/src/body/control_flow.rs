//! Branches, loops and short-circuit operators.
//!
//! Labels are symbolic until the body is sealed. Reachability is tracked
//! through the builder so an `if` whose arms both return leaves the code
//! after it unreachable.

use kiln_diagnostic::Fault;
use kiln_ir::ir::Op;
use kiln_ir::{AstNode, Clid, Rule};
use kiln_types::TypeId;

use super::{BodyLowerer, LoopTargets};
use crate::diag::{missing, unexpected};

impl BodyLowerer<'_> {
    /// `(if cond (block) (block)?)`; the else arm may also be a nested `if`.
    pub(super) fn lower_if(&mut self, node: &AstNode) -> Result<(), Fault> {
        let mut parts = node.children.iter();
        let cond_node = parts.next().ok_or_else(|| missing(node, "a condition"))?;
        let then_block = parts.next().ok_or_else(|| missing(node, "a then block"))?;
        if then_block.rule != Rule::Block {
            return Err(unexpected(then_block, "`if`"));
        }
        let else_arm = parts.next();
        if let Some(arm) = else_arm {
            if !matches!(arm.rule, Rule::Block | Rule::If) {
                return Err(unexpected(arm, "`if`"));
            }
        }
        if let Some(extra) = parts.next() {
            return Err(unexpected(extra, "`if`"));
        }

        let cond = self.condition(cond_node)?;
        let else_label = self.builder.new_label();
        self.emit(
            Op::JumpUnless {
                cond: cond.slot,
                target: else_label,
            },
            cond_node.span,
        );
        self.lower_block(then_block);

        let Some(arm) = else_arm else {
            self.builder.bind(else_label);
            return Ok(());
        };
        let end = self.builder.new_label();
        let then_reaches = self.builder.is_reachable();
        if then_reaches {
            self.emit(Op::Jump { target: end }, node.span);
        }
        self.builder.bind(else_label);
        if arm.rule == Rule::Block {
            self.lower_block(arm);
        } else {
            self.lower_statement(arm);
        }
        let else_reaches = self.builder.is_reachable();
        self.builder.bind(end);
        self.builder.set_reachable(then_reaches || else_reaches);
        Ok(())
    }

    /// `(while cond (block))`
    pub(super) fn lower_while(&mut self, node: &AstNode) -> Result<(), Fault> {
        let [cond_node, body] = node.children.as_slice() else {
            return Err(missing(node, "a condition and a body"));
        };
        if body.rule != Rule::Block {
            return Err(unexpected(body, "`while`"));
        }

        let head = self.builder.new_label();
        self.builder.bind(head);
        let cond = self.condition(cond_node)?;
        let exit = self.builder.new_label();
        self.emit(
            Op::JumpUnless {
                cond: cond.slot,
                target: exit,
            },
            cond_node.span,
        );

        self.loops.push(LoopTargets { head, exit });
        self.lower_block(body);
        self.loops.pop();

        self.emit(Op::Jump { target: head }, node.span);
        self.builder.bind(exit);
        Ok(())
    }

    /// `(break)` / `(continue)`
    pub(super) fn lower_loop_jump(&mut self, node: &AstNode) -> Result<(), Fault> {
        let Some(targets) = self.loops.last().copied() else {
            return Err(unexpected(node, "code outside a loop"));
        };
        if let Some(extra) = node.children.first() {
            return Err(unexpected(extra, &format!("`{}`", node.rule)));
        }
        let target = if node.rule == Rule::Break {
            targets.exit
        } else {
            targets.head
        };
        self.emit(Op::Jump { target }, node.span);
        Ok(())
    }

    /// `(and l r)` / `(or l r)`: `r` is evaluated only when `l` does not
    /// decide the result.
    pub(super) fn lower_logical(&mut self, node: &AstNode) -> Result<Clid, Fault> {
        let [lhs_node, rhs_node] = node.children.as_slice() else {
            return Err(missing(node, "two operands"));
        };
        let dst = self.typed(TypeId::BOOL, node.span)?;
        let lhs = self.condition(lhs_node)?;
        self.emit(
            Op::Move {
                dst: dst.slot,
                src: lhs.slot,
            },
            node.span,
        );

        let end = self.builder.new_label();
        let skip = if node.rule == Rule::And {
            Op::JumpUnless {
                cond: lhs.slot,
                target: end,
            }
        } else {
            Op::JumpIf {
                cond: lhs.slot,
                target: end,
            }
        };
        self.emit(skip, node.span);

        let rhs = self.condition(rhs_node)?;
        self.emit(
            Op::Move {
                dst: dst.slot,
                src: rhs.slot,
            },
            node.span,
        );
        self.builder.bind(end);
        Ok(dst)
    }

    fn condition(&mut self, node: &AstNode) -> Result<Clid, Fault> {
        let cond = self.lower_expr_hint(node, Some(TypeId::BOOL))?;
        self.unify(cond, TypeId::BOOL, node.span)?;
        Ok(cond)
    }
}

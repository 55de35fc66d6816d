//! Body builder: collects one atom's ops with symbolic labels.
//!
//! Labels are handed out before their position is known and bound later.
//! [`finish`](BodyBuilder::finish) wraps the ops in blueprint markers,
//! rewrites every jump to its bound position and validates the result, so
//! a sealed body never carries an unchecked target.

use kiln_ir::ir::{IrSequence, Op, SealError, BLUEPRINT_MAGIC};
use kiln_ir::{AtomId, Label, Span};

/// Rollback point taken before lowering a statement.
#[derive(Copy, Clone, Debug)]
pub(crate) struct Mark {
    ops: usize,
    labels: usize,
    binds: usize,
    reachable: bool,
}

#[derive(Debug)]
pub(crate) struct BodyBuilder {
    ops: Vec<(Op, Span)>,
    /// Op index each symbolic label is bound to.
    labels: Vec<Option<usize>>,
    /// Every `bind` in order, with the binding it replaced.
    binds: Vec<(usize, Option<usize>)>,
    reachable: bool,
}

impl BodyBuilder {
    pub(crate) fn new() -> Self {
        BodyBuilder {
            ops: Vec::new(),
            labels: Vec::new(),
            binds: Vec::new(),
            reachable: true,
        }
    }

    pub(crate) fn emit(&mut self, op: Op, span: Span) {
        if op.is_terminator() {
            self.reachable = false;
        }
        self.ops.push((op, span));
    }

    pub(crate) fn new_label(&mut self) -> Label {
        let label = Label::from_index(self.labels.len());
        self.labels.push(None);
        label
    }

    /// Bind `label` to the next op emitted. Code after a bound label is
    /// reachable through it.
    pub(crate) fn bind(&mut self, label: Label) {
        if let Some(slot) = self.labels.get_mut(label.index()) {
            self.binds.push((label.index(), *slot));
            *slot = Some(self.ops.len());
        }
        self.reachable = true;
    }

    #[inline]
    pub(crate) fn is_reachable(&self) -> bool {
        self.reachable
    }

    pub(crate) fn set_reachable(&mut self, reachable: bool) {
        self.reachable = reachable;
    }

    pub(crate) fn mark(&self) -> Mark {
        Mark {
            ops: self.ops.len(),
            labels: self.labels.len(),
            binds: self.binds.len(),
            reachable: self.reachable,
        }
    }

    /// Discard everything emitted and bound since `mark`.
    ///
    /// Binds are undone newest first, so a label bound before the mark
    /// keeps its position even when it equals the mark's op count.
    pub(crate) fn rollback(&mut self, mark: Mark) {
        while self.binds.len() > mark.binds {
            let Some((index, previous)) = self.binds.pop() else {
                break;
            };
            if let Some(slot) = self.labels.get_mut(index) {
                *slot = previous;
            }
        }
        self.ops.truncate(mark.ops);
        self.labels.truncate(mark.labels);
        self.reachable = mark.reachable;
    }

    /// Seal the body of `atom` into a validated sequence.
    ///
    /// An unbound label becomes a target past the end, which validation
    /// rejects as `InvalidLabel`.
    pub(crate) fn finish(self, atom: AtomId) -> Result<IrSequence, SealError> {
        let mut seq = IrSequence::with_capacity(self.ops.len() + 2);
        seq.push(
            Op::BlueprintBegin {
                magic: BLUEPRINT_MAGIC,
                atom,
            },
            Span::DUMMY,
        );
        for (mut op, span) in self.ops {
            if let Some(target) = op.target_mut() {
                *target = match self.labels.get(target.index()).copied().flatten() {
                    Some(pos) => Label::from_index(pos + 1),
                    None => Label::new(u32::MAX),
                };
            }
            seq.push(op, span);
        }
        seq.push(
            Op::BlueprintEnd {
                magic: BLUEPRINT_MAGIC,
                atom,
            },
            Span::DUMMY,
        );
        seq.validate()?;
        Ok(seq)
    }
}

//! The append-only IR buffer owned by one atom.

use std::fmt;

use crate::ir::Op;
use crate::{AtomId, Label, Span, StringInterner};

/// Tag carried by both blueprint markers ("KILN").
///
/// A marker with any other value means the sequence was corrupted or an
/// index was computed against the wrong body.
pub const BLUEPRINT_MAGIC: u32 = 0x4B49_4C4E;

/// Structural defect found while validating a sequence.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum SealError {
    #[error("sequence does not start with a blueprint begin marker")]
    MissingBegin,
    #[error("blueprint for {atom} has no end marker")]
    MissingEnd { atom: AtomId },
    #[error("blueprint marker at {position} carries magic {found:#010x}")]
    CorruptMagic { position: usize, found: u32 },
    #[error("blueprint marker at {position} names {found}, expected {expected}")]
    MismatchedMarker {
        position: usize,
        expected: AtomId,
        found: AtomId,
    },
    #[error("stray blueprint marker at {position} inside the body")]
    StrayMarker { position: usize },
    #[error("jump at {position} targets {target}, outside blueprint {begin}..={end} (length {len})")]
    InvalidLabel {
        position: usize,
        target: Label,
        begin: usize,
        end: usize,
        len: usize,
    },
}

impl SealError {
    /// Label errors are user-visible `InvalidLabel` faults; every other
    /// defect means lowering produced a malformed body.
    pub fn is_label_error(&self) -> bool {
        matches!(self, SealError::InvalidLabel { .. })
    }
}

/// Bounds of one atom's body inside its sequence.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Blueprint {
    pub atom: AtomId,
    /// Position of the begin marker.
    pub begin: usize,
    /// Position of the end marker.
    pub end: usize,
}

impl Blueprint {
    /// Jump targets may land on any op after the begin marker, up to and
    /// including the end marker.
    #[inline]
    pub fn contains(&self, target: Label) -> bool {
        target.index() > self.begin && target.index() <= self.end
    }

    /// First op executed when the body is entered.
    #[inline]
    pub fn entry(&self) -> usize {
        self.begin + 1
    }
}

/// Ordered, append-only opcode buffer.
///
/// Ops are only ever pushed; positions handed out by [`push`](Self::push)
/// stay valid for the sequence's lifetime.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct IrSequence {
    ops: Vec<Op>,
    spans: Vec<Span>,
}

impl IrSequence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        IrSequence {
            ops: Vec::with_capacity(capacity),
            spans: Vec::with_capacity(capacity),
        }
    }

    /// Append an op, returning its position.
    pub fn push(&mut self, op: Op, span: Span) -> Label {
        let label = Label::from_index(self.ops.len());
        self.ops.push(op);
        self.spans.push(span);
        label
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    #[inline]
    pub fn get(&self, position: usize) -> Option<&Op> {
        self.ops.get(position)
    }

    pub fn span(&self, position: usize) -> Span {
        self.spans.get(position).copied().unwrap_or(Span::DUMMY)
    }

    pub fn ops(&self) -> &[Op] {
        &self.ops
    }

    pub fn iter(&self) -> impl Iterator<Item = (Label, &Op)> {
        self.ops
            .iter()
            .enumerate()
            .map(|(i, op)| (Label::from_index(i), op))
    }

    /// Locate the blueprint: a begin marker at position 0, a matching end
    /// marker at the last position, and no markers in between.
    pub fn blueprint(&self) -> Result<Blueprint, SealError> {
        let Some(Op::BlueprintBegin { magic, atom }) = self.ops.first() else {
            return Err(SealError::MissingBegin);
        };
        if *magic != BLUEPRINT_MAGIC {
            return Err(SealError::CorruptMagic {
                position: 0,
                found: *magic,
            });
        }
        let atom = *atom;
        let end = self.ops.len() - 1;
        match self.ops.get(end) {
            Some(Op::BlueprintEnd { magic, atom: found }) if end > 0 => {
                if *magic != BLUEPRINT_MAGIC {
                    return Err(SealError::CorruptMagic {
                        position: end,
                        found: *magic,
                    });
                }
                if *found != atom {
                    return Err(SealError::MismatchedMarker {
                        position: end,
                        expected: atom,
                        found: *found,
                    });
                }
            }
            _ => return Err(SealError::MissingEnd { atom }),
        }
        if let Some(position) = self.ops[1..end].iter().position(Op::is_marker) {
            return Err(SealError::StrayMarker {
                position: position + 1,
            });
        }
        Ok(Blueprint {
            atom,
            begin: 0,
            end,
        })
    }

    /// Resolve a jump target against `blueprint`.
    ///
    /// Targets outside the region, including ones past the end of the
    /// sequence, are rejected; nothing is wrapped or clamped.
    pub fn resolve(
        &self,
        blueprint: &Blueprint,
        position: usize,
        target: Label,
    ) -> Result<usize, SealError> {
        if blueprint.contains(target) && target.index() < self.ops.len() {
            Ok(target.index())
        } else {
            Err(SealError::InvalidLabel {
                position,
                target,
                begin: blueprint.begin,
                end: blueprint.end,
                len: self.ops.len(),
            })
        }
    }

    /// Post-lowering validation: blueprint structure plus every jump target.
    pub fn validate(&self) -> Result<Blueprint, SealError> {
        let blueprint = self.blueprint()?;
        for (position, op) in self.ops.iter().enumerate() {
            if let Some(target) = op.target() {
                self.resolve(&blueprint, position, target)?;
            }
        }
        Ok(blueprint)
    }

    /// Human-readable listing, one op per line.
    pub fn listing<'a>(&'a self, interner: &'a StringInterner) -> Listing<'a> {
        Listing {
            seq: self,
            interner,
        }
    }
}

pub struct Listing<'a> {
    seq: &'a IrSequence,
    interner: &'a StringInterner,
}

impl fmt::Display for Listing<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (label, op) in self.seq.iter() {
            writeln!(f, "{:04}  {}", label.raw(), op.display(self.interner))?;
        }
        Ok(())
    }
}

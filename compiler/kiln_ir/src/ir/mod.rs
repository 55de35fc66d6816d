//! Linear IR: opcodes and the per-atom sequence that holds them.

mod op;
mod sequence;

pub use op::{BinOp, Constant, FuncRef, Op, OpDisplay, SlotList, UnOp};
pub use sequence::{Blueprint, IrSequence, Listing, SealError, BLUEPRINT_MAGIC};

#[cfg(test)]
mod tests;

//! Kiln VM - executes lowered IR.
//!
//! The VM interprets one atom's [`IrSequence`](kiln_ir::ir::IrSequence) at a
//! time against a register file sized by the atom's frozen classdef view.
//! Calls push frames onto an explicit stack; nothing recurses on the host
//! stack, so call depth is bounded only by [`VmOptions::max_call_depth`].
//!
//! - [`Value`]: runtime values
//! - [`arith`]: width-aware arithmetic, comparison and casts
//! - [`NativeTable`]: handlers behind `intrinsic` ops
//! - [`PrintHandler`]: where `print` output goes
//! - [`Vm`]: the dispatch loop, producing an [`Execution`]

pub mod arith;
pub mod errors;
mod frame;
mod interpreter;
mod natives;
mod print_handler;
mod value;

pub use interpreter::{Execution, Vm, VmOptions};
pub use natives::{NativeContext, NativeFn, NativeTable};
pub use print_handler::{
    buffer_handler, silent_handler, stdout_handler, PrintHandler, SharedPrintHandler,
};
pub use value::{Object, Value};

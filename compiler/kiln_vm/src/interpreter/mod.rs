//! The dispatch loop.
//!
//! Execution starts at the op after the entry atom's begin marker and ends
//! when the outermost frame returns or reaches its end marker. A fault ends
//! execution outright: the frame stack is dropped and the fault is returned
//! as [`Execution::Faulted`].

use std::sync::Arc;

use kiln_diagnostic::Fault;
use kiln_ir::ir::{Constant, FuncRef, Op, BLUEPRINT_MAGIC};
use kiln_ir::{AtomId, Clid, Label, Slot, Span};
use kiln_types::AtomTable;
use rustc_hash::FxHashMap;

use crate::arith;
use crate::errors::{
    assertion_failed, destroyed_twice, invalid_atom, invalid_label, no_destructor,
    operand_mismatch, stack_overflow, uninitialised_global, unexpected_opcode, unknown_native,
};
use crate::frame::Frame;
use crate::{NativeContext, NativeTable, SharedPrintHandler, Value};

#[derive(Clone, Debug)]
pub struct VmOptions {
    /// Frames allowed on the call stack before `StackOverflow`.
    pub max_call_depth: usize,
    /// Log every executed op at `trace` level.
    pub trace_ops: bool,
}

impl Default for VmOptions {
    fn default() -> Self {
        VmOptions {
            max_call_depth: 1024,
            trace_ops: false,
        }
    }
}

/// How a run ended.
#[derive(Clone, Debug, PartialEq)]
pub enum Execution {
    Completed(Value),
    Faulted(Fault),
}

impl Execution {
    /// Process exit status: an `int` result is the status, any other result
    /// is 0, a fault is 1 and an internal error is 70.
    pub fn exit_status(&self) -> i32 {
        match self {
            Execution::Completed(Value::Int(v)) => {
                i32::try_from((*v).clamp(i128::from(i32::MIN), i128::from(i32::MAX)))
                    .unwrap_or(1)
            }
            Execution::Completed(_) => 0,
            Execution::Faulted(fault) if fault.is_ice() => 70,
            Execution::Faulted(_) => 1,
        }
    }

    pub fn fault(&self) -> Option<&Fault> {
        match self {
            Execution::Faulted(fault) => Some(fault),
            Execution::Completed(_) => None,
        }
    }

    pub fn value(&self) -> Option<&Value> {
        match self {
            Execution::Completed(value) => Some(value),
            Execution::Faulted(_) => None,
        }
    }
}

enum Flow {
    Next,
    Finished(Value),
}

pub struct Vm<'a> {
    atoms: &'a AtomTable,
    natives: &'a NativeTable,
    options: VmOptions,
    print: SharedPrintHandler,
    args: Vec<Arc<str>>,
    globals: FxHashMap<AtomId, Value>,
    frames: Vec<Frame<'a>>,
}

impl<'a> Vm<'a> {
    pub fn new(
        atoms: &'a AtomTable,
        natives: &'a NativeTable,
        options: VmOptions,
        print: SharedPrintHandler,
    ) -> Self {
        Vm {
            atoms,
            natives,
            options,
            print,
            args: Vec::new(),
            globals: FxHashMap::default(),
            frames: Vec::new(),
        }
    }

    /// Program arguments visible through `argc` / `argv`.
    #[must_use]
    pub fn with_args<S: Into<Arc<str>>>(mut self, args: impl IntoIterator<Item = S>) -> Self {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Run the global initializer, if any, then `entry` with no arguments.
    #[tracing::instrument(level = "debug", skip_all, fields(entry = %entry))]
    pub fn run(&mut self, init: Option<AtomId>, entry: AtomId) -> Execution {
        if let Some(init) = init {
            if let Err(fault) = self.call(init, Vec::new()) {
                return Execution::Faulted(fault);
            }
        }
        match self.call(entry, Vec::new()) {
            Ok(value) => Execution::Completed(value),
            Err(fault) => Execution::Faulted(fault),
        }
    }

    /// Execute `atom` with `args` bound to its parameter slots.
    pub fn call(&mut self, atom: AtomId, args: Vec<Value>) -> Result<Value, Fault> {
        self.frames.clear();
        let result = self
            .push_frame(atom, args, None)
            .and_then(|()| self.dispatch());
        self.frames.clear();
        result.map_err(|fault| {
            tracing::debug!(kind = %fault.kind, message = %fault.message, "fault raised");
            fault
        })
    }

    /// Value of global `id`, once its initializer has run.
    pub fn global(&self, id: AtomId) -> Option<&Value> {
        self.globals.get(&id)
    }

    fn name(&self, id: AtomId) -> String {
        self.atoms.qualified_name(id)
    }

    fn push_frame(
        &mut self,
        id: AtomId,
        args: Vec<Value>,
        ret_to: Option<Slot>,
    ) -> Result<(), Fault> {
        let atoms = self.atoms;
        let atom = atoms
            .get(id)
            .ok_or_else(|| Fault::ice(format!("call to undeclared {id}")))?;
        if atom.is_invalid() {
            return Err(invalid_atom(&self.name(id)).in_atom(id));
        }
        let body = atom
            .body
            .as_ref()
            .ok_or_else(|| invalid_atom(&self.name(id)).in_atom(id))?;
        if self.frames.len() >= self.options.max_call_depth {
            return Err(stack_overflow(self.options.max_call_depth));
        }

        let blueprint = body
            .blueprint()
            .map_err(|err| Fault::ice(err.to_string()).in_atom(id))?;
        if blueprint.atom != id {
            return Err(Fault::ice(format!(
                "body of {id} carries the blueprint of {}",
                blueprint.atom
            ))
            .in_atom(id));
        }
        let types = atoms
            .classdefs()
            .frozen(id)
            .ok_or_else(|| Fault::ice(format!("{id} has no frozen classdef view")).in_atom(id))?;
        if args.len() != atom.arity() || args.len() > types.len() {
            return Err(Fault::ice(format!(
                "{id} takes {} argument(s), called with {}",
                atom.arity(),
                args.len()
            ))
            .in_atom(id));
        }

        tracing::trace!(atom = %id, depth = self.frames.len() + 1, "frame push");
        self.frames
            .push(Frame::new(id, body, blueprint, types, args, ret_to));
        Ok(())
    }

    fn pop_frame(&mut self, value: Value) -> Result<Flow, Fault> {
        let frame = self
            .frames
            .pop()
            .ok_or_else(|| Fault::ice("return with no active frame"))?;
        tracing::trace!(atom = %frame.atom, depth = self.frames.len(), "frame pop");
        match self.frames.last_mut() {
            None => Ok(Flow::Finished(value)),
            Some(caller) => {
                if let Some(dst) = frame.ret_to {
                    caller.set(dst, value)?;
                }
                Ok(Flow::Next)
            }
        }
    }

    fn frame(&mut self) -> Result<&mut Frame<'a>, Fault> {
        self.frames
            .last_mut()
            .ok_or_else(|| Fault::ice("no active frame"))
    }

    fn dispatch(&mut self) -> Result<Value, Fault> {
        loop {
            let frame = self.frame()?;
            let (atom, pc, body) = (frame.atom, frame.pc, frame.body);
            let op = body
                .get(pc)
                .ok_or_else(|| Fault::ice(format!("{atom} ran past its end marker")))?;
            frame.pc = pc + 1;

            if self.options.trace_ops {
                tracing::trace!(
                    atom = %atom,
                    pc,
                    op = %op.display(self.atoms.interner()),
                    "exec"
                );
            }
            match self.step(op, pc) {
                Ok(Flow::Next) => {}
                Ok(Flow::Finished(value)) => return Ok(value),
                Err(fault) => return Err(locate(fault, atom, body.span(pc))),
            }
        }
    }

    fn jump(&mut self, pc: usize, target: Label) -> Result<Flow, Fault> {
        let frame = self.frame()?;
        let next = frame
            .body
            .resolve(&frame.blueprint, pc, target)
            .map_err(|err| invalid_label(&err, target))?;
        frame.pc = next;
        Ok(Flow::Next)
    }

    fn condition(&mut self, cond: Slot, op: &Op) -> Result<bool, Fault> {
        let value = self.frame()?.get(cond)?;
        value
            .as_bool()
            .ok_or_else(|| operand_mismatch(op.mnemonic(), value.kind_name()))
    }

    #[allow(clippy::too_many_lines)]
    fn step(&mut self, op: &'a Op, pc: usize) -> Result<Flow, Fault> {
        let atoms = self.atoms;
        let pool = atoms.types();
        let interner = atoms.interner();

        match op {
            Op::BlueprintBegin { .. } => Err(Fault::ice(format!("stray begin marker at {pc}"))),
            Op::BlueprintEnd { magic, atom } => {
                let current = self.frame()?.atom;
                if *magic != BLUEPRINT_MAGIC || *atom != current {
                    return Err(Fault::ice(format!(
                        "end marker for {atom} (magic {magic:#010x}) closes the body of {current}"
                    )));
                }
                self.pop_frame(Value::Void)
            }

            Op::Const { dst, value } => {
                let frame = self.frame()?;
                let value = match *value {
                    Constant::Void => Value::Void,
                    Constant::Bool(b) => Value::Bool(b),
                    Constant::Int(v) => match pool.int_kind(frame.ty(*dst)?) {
                        Some(kind) => Value::Int(arith::wrap(v, kind)),
                        None => Value::Int(v),
                    },
                    Constant::Float(bits) => Value::Float(f64::from_bits(bits)),
                    Constant::Str(name) => Value::Str(Arc::from(interner.lookup(name))),
                };
                frame.set(*dst, value)?;
                Ok(Flow::Next)
            }
            Op::Zero { dst } => {
                let frame = self.frame()?;
                let ty = frame.ty(*dst)?;
                let value = arith::zero(ty, pool).ok_or_else(|| {
                    Fault::ice(format!("no default value for `{}`", atoms.describe_type(ty)))
                        .at_slot(*dst)
                })?;
                frame.set(*dst, value)?;
                Ok(Flow::Next)
            }
            Op::Move { dst, src } => {
                let frame = self.frame()?;
                let value = frame.get(*src)?.clone();
                frame.set(*dst, value)?;
                Ok(Flow::Next)
            }
            Op::Binary { op, dst, lhs, rhs } => {
                let frame = self.frame()?;
                let ty = frame.ty(*lhs)?;
                let value = arith::binary(*op, frame.get(*lhs)?, frame.get(*rhs)?, ty, pool)?;
                frame.set(*dst, value)?;
                Ok(Flow::Next)
            }
            Op::Unary { op, dst, src } => {
                let frame = self.frame()?;
                let value = arith::unary(*op, frame.get(*src)?, frame.ty(*src)?, pool)?;
                frame.set(*dst, value)?;
                Ok(Flow::Next)
            }

            Op::Jump { target } => self.jump(pc, *target),
            Op::JumpIf { cond, target } => {
                if self.condition(*cond, op)? {
                    self.jump(pc, *target)
                } else {
                    Ok(Flow::Next)
                }
            }
            Op::JumpUnless { cond, target } => {
                if self.condition(*cond, op)? {
                    Ok(Flow::Next)
                } else {
                    self.jump(pc, *target)
                }
            }

            Op::Call { dst, callee, args } => {
                let args = self.frame()?.collect(args)?;
                self.push_frame(*callee, args, Some(*dst))?;
                Ok(Flow::Next)
            }
            Op::CallIndirect { dst, callee, args } => {
                let frame = self.frame()?;
                let target = match frame.get(*callee)? {
                    Value::Func(atom) => *atom,
                    other => return Err(operand_mismatch(op.mnemonic(), other.kind_name())),
                };
                let args = frame.collect(args)?;
                self.push_frame(target, args, Some(*dst))?;
                Ok(Flow::Next)
            }
            Op::LoadFunc { dst, func } => {
                let frame = self.frame()?;
                let target = match func {
                    FuncRef::Direct(atom) => *atom,
                    FuncRef::Pending => atoms
                        .classdefs()
                        .resolution(Clid::new(frame.atom, *dst))
                        .ok_or_else(|| {
                            Fault::ice(format!("overload of {dst} was never resolved"))
                                .at_slot(*dst)
                        })?,
                };
                frame.set(*dst, Value::Func(target))?;
                Ok(Flow::Next)
            }
            Op::LoadGlobal { dst, global } => {
                let value = self
                    .globals
                    .get(global)
                    .cloned()
                    .ok_or_else(|| uninitialised_global(&self.name(*global)))?;
                self.frame()?.set(*dst, value)?;
                Ok(Flow::Next)
            }
            Op::StoreGlobal { global, src } => {
                let value = self.frame()?.get(*src)?.clone();
                self.globals.insert(*global, value);
                Ok(Flow::Next)
            }
            Op::Intrinsic { dst, name, args } => {
                let name = interner.lookup(*name);
                let handler = self
                    .natives
                    .lookup(name)
                    .ok_or_else(|| unknown_native(name))?;
                let values = self.frame()?.collect(args)?;
                let cx = NativeContext {
                    print: &self.print,
                    args: &self.args,
                };
                let result = handler(&cx, &values)?;
                self.frame()?.set(*dst, result)?;
                Ok(Flow::Next)
            }

            Op::Cast { dst, src } => {
                let frame = self.frame()?;
                let value = arith::cast(frame.get(*src)?, frame.ty(*src)?, frame.ty(*dst)?, pool)?;
                frame.set(*dst, value)?;
                Ok(Flow::Next)
            }
            Op::New { dst, class, fields } => {
                let frame = self.frame()?;
                let values = frame.collect(fields)?;
                frame.set(*dst, Value::object(*class, values))?;
                Ok(Flow::Next)
            }
            Op::GetField { dst, obj, field } => {
                let frame = self.frame()?;
                let value = match frame.get(*obj)? {
                    Value::Object(o) => o.borrow().fields.get(*field as usize).cloned(),
                    other => return Err(operand_mismatch(op.mnemonic(), other.kind_name())),
                }
                .ok_or_else(|| Fault::ice(format!("object has no field #{field}")))?;
                frame.set(*dst, value)?;
                Ok(Flow::Next)
            }
            Op::SetField { obj, field, src } => {
                let frame = self.frame()?;
                let value = frame.get(*src)?.clone();
                let Value::Object(o) = frame.get(*obj)? else {
                    return Err(operand_mismatch(op.mnemonic(), frame.get(*obj)?.kind_name()));
                };
                let mut o = o.borrow_mut();
                let slot = o
                    .fields
                    .get_mut(*field as usize)
                    .ok_or_else(|| Fault::ice(format!("object has no field #{field}")))?;
                *slot = value;
                Ok(Flow::Next)
            }
            Op::Destroy { obj } => {
                let value = self.frame()?.get(*obj)?.clone();
                let Value::Object(o) = &value else {
                    return Err(operand_mismatch(op.mnemonic(), value.kind_name()));
                };
                let class = o.borrow().class;
                let dtor = atoms
                    .get(class)
                    .and_then(|c| c.dtor)
                    .ok_or_else(|| no_destructor(&self.name(class)))?;
                if std::mem::replace(&mut o.borrow_mut().destroyed, true) {
                    return Err(destroyed_twice(&self.name(class)));
                }
                self.push_frame(dtor, vec![value], None)?;
                Ok(Flow::Next)
            }
            Op::Assert { cond, message } => {
                if self.condition(*cond, op)? {
                    Ok(Flow::Next)
                } else {
                    Err(assertion_failed(interner.lookup(*message)))
                }
            }
            Op::Return { value } => {
                let value = match value {
                    Some(slot) => self.frame()?.get(*slot)?.clone(),
                    None => Value::Void,
                };
                self.pop_frame(value)
            }

            Op::Unknown { code, mnemonic } => {
                let name = mnemonic.map_or_else(
                    || format!("op#{code}"),
                    |n| interner.lookup(n).to_string(),
                );
                Err(unexpected_opcode(&name))
            }
        }
    }
}

/// Attach the executing atom and op span unless the fault already names
/// its own atom.
fn locate(fault: Fault, atom: AtomId, span: Span) -> Fault {
    let fault = if fault.atom.is_none() {
        fault.in_atom(atom)
    } else {
        fault
    };
    fault.or_span(span)
}

#[cfg(test)]
mod tests;

//! One activation record.

use kiln_diagnostic::Fault;
use kiln_ir::ir::{Blueprint, IrSequence};
use kiln_ir::{AtomId, Slot};
use kiln_types::TypeId;

use crate::Value;

pub(crate) struct Frame<'a> {
    pub atom: AtomId,
    pub body: &'a IrSequence,
    pub blueprint: Blueprint,
    /// Frozen slot types; `regs` has one entry per type.
    pub types: &'a [TypeId],
    pub regs: Vec<Value>,
    /// Position of the next op to execute.
    pub pc: usize,
    /// Caller slot that receives this frame's return value.
    pub ret_to: Option<Slot>,
}

impl<'a> Frame<'a> {
    pub fn new(
        atom: AtomId,
        body: &'a IrSequence,
        blueprint: Blueprint,
        types: &'a [TypeId],
        args: Vec<Value>,
        ret_to: Option<Slot>,
    ) -> Self {
        let mut regs = args;
        regs.resize(types.len(), Value::Void);
        Frame {
            atom,
            body,
            pc: blueprint.entry(),
            blueprint,
            types,
            regs,
            ret_to,
        }
    }

    fn out_of_frame(&self, slot: Slot) -> Fault {
        Fault::ice(format!(
            "slot {slot} is outside the frame of {} ({} slots)",
            self.atom,
            self.regs.len()
        ))
        .at_slot(slot)
    }

    #[inline]
    pub fn get(&self, slot: Slot) -> Result<&Value, Fault> {
        self.regs
            .get(slot.index())
            .ok_or_else(|| self.out_of_frame(slot))
    }

    #[inline]
    pub fn set(&mut self, slot: Slot, value: Value) -> Result<(), Fault> {
        match self.regs.get_mut(slot.index()) {
            Some(reg) => {
                *reg = value;
                Ok(())
            }
            None => Err(self.out_of_frame(slot)),
        }
    }

    #[inline]
    pub fn ty(&self, slot: Slot) -> Result<TypeId, Fault> {
        self.types
            .get(slot.index())
            .copied()
            .ok_or_else(|| self.out_of_frame(slot))
    }

    /// Clone the values of `slots`, in order.
    pub fn collect(&self, slots: &[Slot]) -> Result<Vec<Value>, Fault> {
        slots.iter().map(|&s| self.get(s).cloned()).collect()
    }
}

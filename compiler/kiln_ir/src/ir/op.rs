//! Opcodes of the linear IR.
//!
//! Operands are frame-local [`Slot`]s; the owning atom is implied by the
//! sequence the op lives in, so a slot operand names the CLID
//! `(owning atom, slot)`.

use std::fmt;

use smallvec::SmallVec;

use crate::{AtomId, Label, Name, Slot, StringInterner};

/// Argument lists rarely exceed four slots.
pub type SlotList = SmallVec<[Slot; 4]>;

/// Constant loaded by [`Op::Const`].
///
/// Floats are stored as bits so ops stay `Eq + Hash`.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Constant {
    Void,
    Bool(bool),
    Int(i128),
    Float(u64),
    Str(Name),
}

impl Constant {
    pub fn float(value: f64) -> Self {
        Constant::Float(value.to_bits())
    }
}

/// Binary operators. The operand width comes from the slot classdefs.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    /// Overflow-checked variants; the wrapping forms never fault.
    CheckedAdd,
    CheckedSub,
    CheckedMul,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl BinOp {
    /// Parse the operator spelling used in the tree text format.
    pub fn from_symbol(symbol: &str) -> Option<BinOp> {
        Some(match symbol {
            "+" => BinOp::Add,
            "-" => BinOp::Sub,
            "*" => BinOp::Mul,
            "/" => BinOp::Div,
            "%" => BinOp::Rem,
            "checked+" => BinOp::CheckedAdd,
            "checked-" => BinOp::CheckedSub,
            "checked*" => BinOp::CheckedMul,
            "&" => BinOp::BitAnd,
            "|" => BinOp::BitOr,
            "^" => BinOp::BitXor,
            "<<" => BinOp::Shl,
            ">>" => BinOp::Shr,
            "==" => BinOp::Eq,
            "!=" => BinOp::Ne,
            "<" => BinOp::Lt,
            "<=" => BinOp::Le,
            ">" => BinOp::Gt,
            ">=" => BinOp::Ge,
            _ => return None,
        })
    }

    /// Source spelling; checked variants share the plain operator's symbol.
    pub const fn symbol(self) -> &'static str {
        match self {
            BinOp::Add | BinOp::CheckedAdd => "+",
            BinOp::Sub | BinOp::CheckedSub => "-",
            BinOp::Mul | BinOp::CheckedMul => "*",
            BinOp::Div => "/",
            BinOp::Rem => "%",
            BinOp::BitAnd => "&",
            BinOp::BitOr => "|",
            BinOp::BitXor => "^",
            BinOp::Shl => "<<",
            BinOp::Shr => ">>",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
        }
    }

    pub const fn mnemonic(self) -> &'static str {
        match self {
            BinOp::Add => "add",
            BinOp::Sub => "sub",
            BinOp::Mul => "mul",
            BinOp::Div => "div",
            BinOp::Rem => "rem",
            BinOp::CheckedAdd => "add.checked",
            BinOp::CheckedSub => "sub.checked",
            BinOp::CheckedMul => "mul.checked",
            BinOp::BitAnd => "and",
            BinOp::BitOr => "or",
            BinOp::BitXor => "xor",
            BinOp::Shl => "shl",
            BinOp::Shr => "shr",
            BinOp::Eq => "eq",
            BinOp::Ne => "ne",
            BinOp::Lt => "lt",
            BinOp::Le => "le",
            BinOp::Gt => "gt",
            BinOp::Ge => "ge",
        }
    }

    pub const fn is_comparison(self) -> bool {
        matches!(
            self,
            BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge
        )
    }

    pub const fn is_checked(self) -> bool {
        matches!(self, BinOp::CheckedAdd | BinOp::CheckedSub | BinOp::CheckedMul)
    }

    /// Operators that only make sense on integers.
    pub const fn is_bitwise(self) -> bool {
        matches!(
            self,
            BinOp::BitAnd | BinOp::BitOr | BinOp::BitXor | BinOp::Shl | BinOp::Shr
        )
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum UnOp {
    Neg,
    Not,
}

impl UnOp {
    pub fn from_symbol(symbol: &str) -> Option<UnOp> {
        match symbol {
            "-" => Some(UnOp::Neg),
            "!" => Some(UnOp::Not),
            _ => None,
        }
    }

    pub const fn symbol(self) -> &'static str {
        match self {
            UnOp::Neg => "-",
            UnOp::Not => "!",
        }
    }
}

/// Target of a function load.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum FuncRef {
    Direct(AtomId),
    /// Overload-pending sentinel: the destination slot's classdef was
    /// marked has-overloads at lowering time, and the chosen atom is read
    /// from the classdef table's resolution record when the op executes.
    Pending,
}

/// One IR instruction.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum Op {
    /// Start of an atom's body.
    BlueprintBegin { magic: u32, atom: AtomId },
    /// End of an atom's body; executing it returns `void`.
    BlueprintEnd { magic: u32, atom: AtomId },

    Const { dst: Slot, value: Constant },
    /// Default value of the slot's type: `false`, zero or `""`.
    Zero { dst: Slot },
    Move { dst: Slot, src: Slot },
    Binary { op: BinOp, dst: Slot, lhs: Slot, rhs: Slot },
    Unary { op: UnOp, dst: Slot, src: Slot },

    Jump { target: Label },
    JumpIf { cond: Slot, target: Label },
    JumpUnless { cond: Slot, target: Label },

    Call { dst: Slot, callee: AtomId, args: SlotList },
    CallIndirect { dst: Slot, callee: Slot, args: SlotList },
    LoadFunc { dst: Slot, func: FuncRef },
    LoadGlobal { dst: Slot, global: AtomId },
    StoreGlobal { global: AtomId, src: Slot },
    Intrinsic { dst: Slot, name: Name, args: SlotList },

    Cast { dst: Slot, src: Slot },
    New { dst: Slot, class: AtomId, fields: SlotList },
    GetField { dst: Slot, obj: Slot, field: u32 },
    SetField { obj: Slot, field: u32, src: Slot },
    Destroy { obj: Slot },
    Assert { cond: Slot, message: Name },
    Return { value: Option<Slot> },

    /// An opcode this build does not implement, e.g. one produced by a
    /// newer lowering pass. Executing it is an `UnexpectedOpcode` fault.
    Unknown { code: u16, mnemonic: Option<Name> },
}

impl Op {
    pub fn mnemonic(&self) -> &'static str {
        match self {
            Op::BlueprintBegin { .. } => "blueprint.begin",
            Op::BlueprintEnd { .. } => "blueprint.end",
            Op::Const { .. } => "const",
            Op::Zero { .. } => "zero",
            Op::Move { .. } => "mov",
            Op::Binary { op, .. } => op.mnemonic(),
            Op::Unary { op: UnOp::Neg, .. } => "neg",
            Op::Unary { op: UnOp::Not, .. } => "not",
            Op::Jump { .. } => "jmp",
            Op::JumpIf { .. } => "jmp.if",
            Op::JumpUnless { .. } => "jmp.unless",
            Op::Call { .. } => "call",
            Op::CallIndirect { .. } => "call.indirect",
            Op::LoadFunc { .. } => "ld.func",
            Op::LoadGlobal { .. } => "ld.global",
            Op::StoreGlobal { .. } => "st.global",
            Op::Intrinsic { .. } => "intrinsic",
            Op::Cast { .. } => "cast",
            Op::New { .. } => "new",
            Op::GetField { .. } => "ld.field",
            Op::SetField { .. } => "st.field",
            Op::Destroy { .. } => "destroy",
            Op::Assert { .. } => "assert",
            Op::Return { .. } => "ret",
            Op::Unknown { .. } => "unknown",
        }
    }

    /// Jump target, for control-transfer ops.
    pub fn target(&self) -> Option<Label> {
        match self {
            Op::Jump { target } | Op::JumpIf { target, .. } | Op::JumpUnless { target, .. } => {
                Some(*target)
            }
            _ => None,
        }
    }

    /// Mutable jump target, used when symbolic labels are bound to positions.
    pub fn target_mut(&mut self) -> Option<&mut Label> {
        match self {
            Op::Jump { target } | Op::JumpIf { target, .. } | Op::JumpUnless { target, .. } => {
                Some(target)
            }
            _ => None,
        }
    }

    pub const fn is_marker(&self) -> bool {
        matches!(self, Op::BlueprintBegin { .. } | Op::BlueprintEnd { .. })
    }

    /// Whether control never falls through to the next op.
    pub const fn is_terminator(&self) -> bool {
        matches!(
            self,
            Op::Jump { .. } | Op::Return { .. } | Op::BlueprintEnd { .. }
        )
    }

    /// Render with names resolved through `interner`.
    pub fn display<'a>(&'a self, interner: &'a StringInterner) -> OpDisplay<'a> {
        OpDisplay { op: self, interner }
    }
}

pub struct OpDisplay<'a> {
    op: &'a Op,
    interner: &'a StringInterner,
}

fn write_slots(f: &mut fmt::Formatter<'_>, slots: &[Slot]) -> fmt::Result {
    f.write_str("(")?;
    for (i, slot) in slots.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{slot}")?;
    }
    f.write_str(")")
}

impl fmt::Display for OpDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = |n: Name| self.interner.lookup(n);
        let op = self.op;
        let mnemonic = op.mnemonic();
        match op {
            Op::BlueprintBegin { magic, atom } | Op::BlueprintEnd { magic, atom } => {
                write!(f, "{mnemonic} {atom} magic={magic:#010x}")
            }
            Op::Const { dst, value } => match value {
                Constant::Void => write!(f, "{dst} = const void"),
                Constant::Bool(b) => write!(f, "{dst} = const {b}"),
                Constant::Int(v) => write!(f, "{dst} = const {v}"),
                Constant::Float(bits) => write!(f, "{dst} = const {:?}", f64::from_bits(*bits)),
                Constant::Str(s) => write!(f, "{dst} = const {:?}", name(*s)),
            },
            Op::Zero { dst } => write!(f, "{dst} = {mnemonic}"),
            Op::Move { dst, src } => write!(f, "{dst} = {mnemonic} {src}"),
            Op::Binary { dst, lhs, rhs, .. } => write!(f, "{dst} = {mnemonic} {lhs}, {rhs}"),
            Op::Unary { dst, src, .. } => write!(f, "{dst} = {mnemonic} {src}"),
            Op::Jump { target } => write!(f, "{mnemonic} {target}"),
            Op::JumpIf { cond, target } | Op::JumpUnless { cond, target } => {
                write!(f, "{mnemonic} {cond}, {target}")
            }
            Op::Call { dst, callee, args } => {
                write!(f, "{dst} = {mnemonic} {callee}")?;
                write_slots(f, args)
            }
            Op::CallIndirect { dst, callee, args } => {
                write!(f, "{dst} = {mnemonic} {callee}")?;
                write_slots(f, args)
            }
            Op::LoadFunc { dst, func } => match func {
                FuncRef::Direct(atom) => write!(f, "{dst} = {mnemonic} {atom}"),
                FuncRef::Pending => write!(f, "{dst} = {mnemonic} <overload-pending>"),
            },
            Op::LoadGlobal { dst, global } => write!(f, "{dst} = {mnemonic} {global}"),
            Op::StoreGlobal { global, src } => write!(f, "{mnemonic} {global}, {src}"),
            Op::Intrinsic { dst, name: n, args } => {
                write!(f, "{dst} = {mnemonic} {}", name(*n))?;
                write_slots(f, args)
            }
            Op::Cast { dst, src } => write!(f, "{dst} = {mnemonic} {src}"),
            Op::New { dst, class, fields } => {
                write!(f, "{dst} = {mnemonic} {class}")?;
                write_slots(f, fields)
            }
            Op::GetField { dst, obj, field } => write!(f, "{dst} = {mnemonic} {obj}.{field}"),
            Op::SetField { obj, field, src } => write!(f, "{mnemonic} {obj}.{field}, {src}"),
            Op::Destroy { obj } => write!(f, "{mnemonic} {obj}"),
            Op::Assert { cond, message } => write!(f, "{mnemonic} {cond}, {:?}", name(*message)),
            Op::Return { value: Some(v) } => write!(f, "{mnemonic} {v}"),
            Op::Return { value: None } => f.write_str(mnemonic),
            Op::Unknown { code, mnemonic: m } => match m {
                Some(m) => write!(f, "{mnemonic} {code:#06x} ({})", name(*m)),
                None => write!(f, "{mnemonic} {code:#06x}"),
            },
        }
    }
}

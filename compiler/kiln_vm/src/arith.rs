//! Numeric semantics.
//!
//! Integer results are computed in `i128` and then normalised to the width
//! of the operand type: truncated to `bits` and, for signed types,
//! sign-extended. Every wrapping opcode follows this rule, including signed
//! `MIN / -1`. The checked opcodes raise `Overflow` instead of wrapping.
//! Division and remainder by zero always fault.
//!
//! Float results are rounded to the operand's width, so `f32` arithmetic
//! behaves like single precision even though values travel as `f64`.

use std::cmp::Ordering;

use kiln_diagnostic::Fault;
use kiln_ir::ir::{BinOp, UnOp};
use kiln_types::{IntKind, TypeData, TypeId, TypePool};

use crate::errors::{
    cast_out_of_range, division_by_zero, invalid_cast, operand_mismatch, overflow,
    remainder_by_zero, unparsable,
};
use crate::Value;

/// Normalise `value` to `kind`'s width and signedness.
pub fn wrap(value: i128, kind: IntKind) -> i128 {
    let bits = u32::from(kind.bits);
    if bits >= 128 {
        return value;
    }
    let modulus = 1i128 << bits;
    let low = value & (modulus - 1);
    if kind.signed && low >> (bits - 1) != 0 {
        low - modulus
    } else {
        low
    }
}

/// Round to single precision when `bits` is 32.
pub fn round_float(value: f64, bits: u8) -> f64 {
    if bits == 32 {
        #[allow(clippy::cast_possible_truncation)]
        let narrowed = value as f32;
        f64::from(narrowed)
    } else {
        value
    }
}

/// Default value of a builtin operand type; `None` for every other type.
pub fn zero(ty: TypeId, pool: &TypePool) -> Option<Value> {
    match pool.get(ty) {
        TypeData::Bool => Some(Value::Bool(false)),
        TypeData::Int(_) => Some(Value::Int(0)),
        TypeData::Float { .. } => Some(Value::Float(0.0)),
        TypeData::Str => Some(Value::str("")),
        _ => None,
    }
}

fn type_name(pool: &TypePool, ty: TypeId) -> String {
    pool.describe(ty, &|atom| atom.to_string())
}

/// Apply `op` to two operands of type `ty`.
pub fn binary(
    op: BinOp,
    lhs: &Value,
    rhs: &Value,
    ty: TypeId,
    pool: &TypePool,
) -> Result<Value, Fault> {
    match (lhs, rhs) {
        (Value::Int(a), Value::Int(b)) => {
            let kind = pool
                .int_kind(ty)
                .ok_or_else(|| operand_mismatch(op.symbol(), &type_name(pool, ty)))?;
            int_binary(op, *a, *b, kind, || type_name(pool, ty))
        }
        (Value::Float(a), Value::Float(b)) => {
            let bits = pool.float_bits(ty).unwrap_or(64);
            float_binary(op, *a, *b, bits)
        }
        (Value::Bool(a), Value::Bool(b)) => bool_binary(op, *a, *b),
        (Value::Str(a), Value::Str(b)) => match op {
            BinOp::Add => Ok(Value::Str(format!("{a}{b}").into())),
            _ => compare(op, a.as_ref().cmp(b.as_ref())),
        },
        _ => Err(operand_mismatch(op.symbol(), lhs.kind_name())),
    }
}

fn compare(op: BinOp, ordering: Ordering) -> Result<Value, Fault> {
    let result = match op {
        BinOp::Eq => ordering.is_eq(),
        BinOp::Ne => ordering.is_ne(),
        BinOp::Lt => ordering.is_lt(),
        BinOp::Le => ordering.is_le(),
        BinOp::Gt => ordering.is_gt(),
        BinOp::Ge => ordering.is_ge(),
        _ => return Err(operand_mismatch(op.symbol(), "str")),
    };
    Ok(Value::Bool(result))
}

fn int_binary(
    op: BinOp,
    a: i128,
    b: i128,
    kind: IntKind,
    name: impl Fn() -> String,
) -> Result<Value, Fault> {
    let checked = |result: Option<i128>| match result {
        Some(v) if kind.contains(v) => Ok(Value::Int(v)),
        _ => Err(overflow(op.symbol(), &name())),
    };
    let bits = u32::from(kind.bits);
    let shift = || u32::try_from(b.rem_euclid(i128::from(bits))).unwrap_or(0);

    let value = match op {
        BinOp::Add => a.wrapping_add(b),
        BinOp::Sub => a.wrapping_sub(b),
        BinOp::Mul => a.wrapping_mul(b),
        BinOp::Div => {
            if b == 0 {
                return Err(division_by_zero());
            }
            a.wrapping_div(b)
        }
        BinOp::Rem => {
            if b == 0 {
                return Err(remainder_by_zero());
            }
            a.wrapping_rem(b)
        }
        BinOp::CheckedAdd => return checked(a.checked_add(b)),
        BinOp::CheckedSub => return checked(a.checked_sub(b)),
        BinOp::CheckedMul => return checked(a.checked_mul(b)),
        BinOp::BitAnd => a & b,
        BinOp::BitOr => a | b,
        BinOp::BitXor => a ^ b,
        BinOp::Shl => a << shift(),
        BinOp::Shr => a >> shift(),
        BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => {
            return compare(op, a.cmp(&b));
        }
    };
    Ok(Value::Int(wrap(value, kind)))
}

fn float_binary(op: BinOp, a: f64, b: f64, bits: u8) -> Result<Value, Fault> {
    let value = match op {
        BinOp::Add => a + b,
        BinOp::Sub => a - b,
        BinOp::Mul => a * b,
        BinOp::Div => a / b,
        BinOp::Rem => a % b,
        BinOp::Eq => return Ok(Value::Bool(a == b)),
        BinOp::Ne => return Ok(Value::Bool(a != b)),
        BinOp::Lt => return Ok(Value::Bool(a < b)),
        BinOp::Le => return Ok(Value::Bool(a <= b)),
        BinOp::Gt => return Ok(Value::Bool(a > b)),
        BinOp::Ge => return Ok(Value::Bool(a >= b)),
        _ => return Err(operand_mismatch(op.symbol(), "float")),
    };
    Ok(Value::Float(round_float(value, bits)))
}

fn bool_binary(op: BinOp, a: bool, b: bool) -> Result<Value, Fault> {
    let value = match op {
        BinOp::Eq => a == b,
        BinOp::Ne => a != b,
        BinOp::BitAnd => a & b,
        BinOp::BitOr => a | b,
        BinOp::BitXor => a ^ b,
        _ => return Err(operand_mismatch(op.symbol(), "bool")),
    };
    Ok(Value::Bool(value))
}

pub fn unary(op: UnOp, src: &Value, ty: TypeId, pool: &TypePool) -> Result<Value, Fault> {
    match (op, src) {
        (UnOp::Neg, Value::Int(v)) => {
            let kind = pool
                .int_kind(ty)
                .ok_or_else(|| operand_mismatch("-", &type_name(pool, ty)))?;
            Ok(Value::Int(wrap(v.wrapping_neg(), kind)))
        }
        (UnOp::Neg, Value::Float(v)) => Ok(Value::Float(-v)),
        (UnOp::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
        (UnOp::Not, Value::Int(v)) => {
            let kind = pool
                .int_kind(ty)
                .ok_or_else(|| operand_mismatch("!", &type_name(pool, ty)))?;
            Ok(Value::Int(wrap(!v, kind)))
        }
        _ => Err(operand_mismatch(op.symbol(), src.kind_name())),
    }
}

/// Convert `value` of type `from` to `to`.
///
/// Integer narrowing wraps. Float to integer, and parsing from `str`,
/// fault when the result does not fit.
pub fn cast(value: &Value, from: TypeId, to: TypeId, pool: &TypePool) -> Result<Value, Fault> {
    if from == to {
        return Ok(value.clone());
    }
    let target = || type_name(pool, to);
    if !pool.cast_allowed(from, to) {
        return Err(invalid_cast(&type_name(pool, from), &target()));
    }

    match (value, pool.get(to)) {
        (Value::Int(v), TypeData::Int(kind)) => Ok(Value::Int(wrap(*v, *kind))),
        (Value::Int(v), TypeData::Float { bits }) => {
            #[allow(clippy::cast_precision_loss)]
            let f = *v as f64;
            Ok(Value::Float(round_float(f, *bits)))
        }
        (Value::Int(v), TypeData::Bool) => Ok(Value::Bool(*v != 0)),
        (Value::Float(f), TypeData::Int(kind)) => float_to_int(*f, *kind, target),
        (Value::Float(f), TypeData::Float { bits }) => Ok(Value::Float(round_float(*f, *bits))),
        (Value::Bool(b), TypeData::Int(_)) => Ok(Value::Int(i128::from(*b))),
        (Value::Bool(_) | Value::Int(_) | Value::Float(_), TypeData::Str) => {
            Ok(Value::Str(value.to_string().into()))
        }
        (Value::Str(s), TypeData::Int(kind)) => {
            let parsed: i128 = s.trim().parse().map_err(|_| unparsable(s, &target()))?;
            if kind.contains(parsed) {
                Ok(Value::Int(parsed))
            } else {
                Err(cast_out_of_range(s, &target()))
            }
        }
        (Value::Str(s), TypeData::Float { bits }) => {
            let parsed: f64 = s.trim().parse().map_err(|_| unparsable(s, &target()))?;
            Ok(Value::Float(round_float(parsed, *bits)))
        }
        _ => Err(invalid_cast(value.kind_name(), &target())),
    }
}

fn float_to_int(f: f64, kind: IntKind, target: impl Fn() -> String) -> Result<Value, Fault> {
    let truncated = f.trunc();
    let (min, max) = kind.bounds();
    #[allow(clippy::cast_precision_loss)]
    let in_range = truncated.is_finite() && truncated >= min as f64 && truncated <= max as f64;
    if !in_range {
        return Err(cast_out_of_range(&format!("{f:?}"), &target()));
    }
    #[allow(clippy::cast_possible_truncation)]
    let v = truncated as i128;
    // `max as f64` rounds up for 64-bit types; the float compare above lets
    // that one value through.
    if kind.contains(v) {
        Ok(Value::Int(v))
    } else {
        Err(cast_out_of_range(&format!("{f:?}"), &target()))
    }
}

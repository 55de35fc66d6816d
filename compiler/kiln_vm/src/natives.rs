//! Native handlers behind `intrinsic` ops.
//!
//! The registry in `kiln_types` only describes signatures; this table holds
//! the code. Lowering has already checked argument types against the
//! registry, so handlers only guard against operand shapes that lowering
//! cannot produce.

use std::sync::Arc;

use kiln_diagnostic::{Fault, FaultKind};
use kiln_types::IntKind;
use rustc_hash::FxHashMap;

use crate::arith::wrap;
use crate::errors::operand_mismatch;
use crate::{PrintHandler, Value};

/// What a native handler may touch besides its arguments.
pub struct NativeContext<'a> {
    pub print: &'a PrintHandler,
    /// Program arguments, as passed after `--`.
    pub args: &'a [Arc<str>],
}

pub type NativeFn = fn(&NativeContext<'_>, &[Value]) -> Result<Value, Fault>;

#[derive(Clone, Default)]
pub struct NativeTable {
    handlers: FxHashMap<String, NativeFn>,
}

impl NativeTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handlers for every intrinsic in `IntrinsicRegistry::standard`.
    pub fn standard() -> Self {
        let mut table = Self::new();
        table.register("print", native_print);
        table.register("println", native_println);
        table.register("sqrt", native_sqrt);
        table.register("abs", native_abs);
        table.register("argc", native_argc);
        table.register("argv", native_argv);
        table.register("str_len", native_str_len);
        table.register("int_to_str", native_int_to_str);
        table.register("concat", native_concat);
        table
    }

    /// Install `handler` for `name`, replacing any previous one.
    pub fn register(&mut self, name: &str, handler: NativeFn) {
        self.handlers.insert(name.to_string(), handler);
    }

    pub fn lookup(&self, name: &str) -> Option<NativeFn> {
        self.handlers.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

const INT: IntKind = IntKind::new(64, true);

fn arg<'v>(args: &'v [Value], index: usize, name: &str) -> Result<&'v Value, Fault> {
    args.get(index)
        .ok_or_else(|| Fault::ice(format!("`{name}` called with {} argument(s)", args.len())))
}

fn int_arg(args: &[Value], index: usize, name: &str) -> Result<i128, Fault> {
    let value = arg(args, index, name)?;
    value
        .as_int()
        .ok_or_else(|| operand_mismatch(name, value.kind_name()))
}

fn str_arg<'v>(args: &'v [Value], index: usize, name: &str) -> Result<&'v str, Fault> {
    let value = arg(args, index, name)?;
    value
        .as_str()
        .ok_or_else(|| operand_mismatch(name, value.kind_name()))
}

fn native_print(cx: &NativeContext<'_>, args: &[Value]) -> Result<Value, Fault> {
    cx.print.print(&arg(args, 0, "print")?.to_string());
    Ok(Value::Void)
}

fn native_println(cx: &NativeContext<'_>, args: &[Value]) -> Result<Value, Fault> {
    cx.print.println(&arg(args, 0, "println")?.to_string());
    Ok(Value::Void)
}

fn native_sqrt(_: &NativeContext<'_>, args: &[Value]) -> Result<Value, Fault> {
    match arg(args, 0, "sqrt")? {
        Value::Float(f) => Ok(Value::Float(f.sqrt())),
        other => Err(operand_mismatch("sqrt", other.kind_name())),
    }
}

fn native_abs(_: &NativeContext<'_>, args: &[Value]) -> Result<Value, Fault> {
    let v = int_arg(args, 0, "abs")?;
    Ok(Value::Int(wrap(v.wrapping_abs(), INT)))
}

fn native_argc(cx: &NativeContext<'_>, _: &[Value]) -> Result<Value, Fault> {
    Ok(Value::Int(i128::try_from(cx.args.len()).unwrap_or(i128::MAX)))
}

fn native_argv(cx: &NativeContext<'_>, args: &[Value]) -> Result<Value, Fault> {
    let index = int_arg(args, 0, "argv")?;
    usize::try_from(index)
        .ok()
        .and_then(|i| cx.args.get(i))
        .map(|a| Value::Str(Arc::clone(a)))
        .ok_or_else(|| {
            Fault::new(
                FaultKind::Assert,
                format!(
                    "argument index {index} is out of range ({} argument(s))",
                    cx.args.len()
                ),
            )
        })
}

fn native_str_len(_: &NativeContext<'_>, args: &[Value]) -> Result<Value, Fault> {
    let s = str_arg(args, 0, "str_len")?;
    Ok(Value::Int(i128::try_from(s.chars().count()).unwrap_or(i128::MAX)))
}

fn native_int_to_str(_: &NativeContext<'_>, args: &[Value]) -> Result<Value, Fault> {
    let v = int_arg(args, 0, "int_to_str")?;
    Ok(Value::Str(v.to_string().into()))
}

fn native_concat(_: &NativeContext<'_>, args: &[Value]) -> Result<Value, Fault> {
    let a = str_arg(args, 0, "concat")?;
    let b = str_arg(args, 1, "concat")?;
    Ok(Value::Str(format!("{a}{b}").into()))
}

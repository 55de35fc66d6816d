//! Runtime values.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use kiln_ir::AtomId;

/// A value held in one register.
///
/// Integers of every width share one representation; the VM keeps each one
/// normalised to the width and signedness of the slot it lives in.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Value {
    #[default]
    Void,
    Bool(bool),
    Int(i128),
    Float(f64),
    Str(Arc<str>),
    Func(AtomId),
    Object(Rc<RefCell<Object>>),
}

/// Instance of a class: its atom and field values in declaration order.
#[derive(Clone, Debug, PartialEq)]
pub struct Object {
    pub class: AtomId,
    pub fields: Vec<Value>,
    /// Set once the destructor has run.
    pub destroyed: bool,
}

impl Value {
    pub fn object(class: AtomId, fields: Vec<Value>) -> Self {
        Value::Object(Rc::new(RefCell::new(Object {
            class,
            fields,
            destroyed: false,
        })))
    }

    pub fn str(text: &str) -> Self {
        Value::Str(Arc::from(text))
    }

    /// Name of the value's runtime category, for fault messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Void => "void",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::Func(_) => "function",
            Value::Object(_) => "object",
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i128> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Void => f.write_str("void"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(v) => write!(f, "{v}"),
            // Debug keeps the trailing `.0` on whole floats.
            Value::Float(v) => write!(f, "{v:?}"),
            Value::Str(s) => f.write_str(s),
            Value::Func(atom) => write!(f, "<fn {atom}>"),
            Value::Object(obj) => write!(f, "<object {}>", obj.borrow().class),
        }
    }
}

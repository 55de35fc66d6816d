//! Structured faults raised by resolution, lowering and execution.
//!
//! A fault is a plain value. It carries the atom, slot, label and opcode
//! needed to render a diagnostic, never a handle into live tables, so it can
//! outlive the session that raised it.

use std::fmt;
use std::sync::Arc;

use kiln_ir::{AtomId, Label, Slot, Span};

use crate::{ErrorCode, Location, Report, Severity};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum FaultKind {
    // Resolution and lowering
    TypeConflict,
    NoMatchingOverload,
    AmbiguousOverload,
    UnknownIdentifier,
    InvalidIdentifier,
    UninferredType,
    UnexpectedNode,

    // Execution
    InvalidLabel,
    DivideByZero,
    InvalidCast,
    InvalidDtor,
    Assert,
    Overflow,
    StackOverflow,
    InvalidAtom,
    UnexpectedOpcode,

    Ice,
}

impl FaultKind {
    pub const fn name(self) -> &'static str {
        match self {
            FaultKind::TypeConflict => "type conflict",
            FaultKind::NoMatchingOverload => "no matching overload",
            FaultKind::AmbiguousOverload => "ambiguous overload",
            FaultKind::UnknownIdentifier => "unknown identifier",
            FaultKind::InvalidIdentifier => "invalid identifier",
            FaultKind::UninferredType => "uninferred type",
            FaultKind::UnexpectedNode => "unexpected node",
            FaultKind::InvalidLabel => "invalid label",
            FaultKind::DivideByZero => "divide by zero",
            FaultKind::InvalidCast => "invalid cast",
            FaultKind::InvalidDtor => "invalid destructor",
            FaultKind::Assert => "assertion failed",
            FaultKind::Overflow => "arithmetic overflow",
            FaultKind::StackOverflow => "stack overflow",
            FaultKind::InvalidAtom => "invalid atom",
            FaultKind::UnexpectedOpcode => "unexpected opcode",
            FaultKind::Ice => "internal compiler error",
        }
    }

    pub const fn code(self) -> ErrorCode {
        match self {
            FaultKind::TypeConflict => ErrorCode::K2001,
            FaultKind::NoMatchingOverload => ErrorCode::K2002,
            FaultKind::AmbiguousOverload => ErrorCode::K2003,
            FaultKind::UnknownIdentifier => ErrorCode::K2004,
            FaultKind::InvalidIdentifier => ErrorCode::K2005,
            FaultKind::UninferredType => ErrorCode::K2006,
            FaultKind::UnexpectedNode => ErrorCode::K3001,
            FaultKind::InvalidLabel => ErrorCode::K6001,
            FaultKind::DivideByZero => ErrorCode::K6002,
            FaultKind::InvalidCast => ErrorCode::K6003,
            FaultKind::InvalidDtor => ErrorCode::K6004,
            FaultKind::Assert => ErrorCode::K6005,
            FaultKind::Overflow => ErrorCode::K6006,
            FaultKind::StackOverflow => ErrorCode::K6007,
            FaultKind::InvalidAtom => ErrorCode::K6008,
            FaultKind::UnexpectedOpcode => ErrorCode::K6009,
            FaultKind::Ice => ErrorCode::K9001,
        }
    }

    #[inline]
    pub const fn is_ice(self) -> bool {
        matches!(self, FaultKind::Ice)
    }

    /// Faults raised by the VM; these always abort the whole execution.
    pub const fn is_runtime(self) -> bool {
        matches!(
            self,
            FaultKind::InvalidLabel
                | FaultKind::DivideByZero
                | FaultKind::InvalidCast
                | FaultKind::InvalidDtor
                | FaultKind::Assert
                | FaultKind::Overflow
                | FaultKind::StackOverflow
                | FaultKind::InvalidAtom
                | FaultKind::UnexpectedOpcode
        )
    }

    pub const fn severity(self) -> Severity {
        if self.is_ice() {
            Severity::Ice
        } else {
            Severity::Error
        }
    }
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A tagged failure with enough context to render a diagnostic.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct Fault {
    pub kind: FaultKind,
    pub message: String,
    pub atom: Option<AtomId>,
    pub slot: Option<Slot>,
    pub label: Option<Label>,
    /// Mnemonic of the op being executed, or the symbolic name of an
    /// unrecognized one.
    pub opcode: Option<String>,
    pub span: Option<Span>,
}

impl Fault {
    pub fn new(kind: FaultKind, message: impl Into<String>) -> Self {
        Fault {
            kind,
            message: message.into(),
            atom: None,
            slot: None,
            label: None,
            opcode: None,
            span: None,
        }
    }

    pub fn ice(message: impl Into<String>) -> Self {
        Self::new(FaultKind::Ice, message)
    }

    #[must_use]
    pub fn in_atom(mut self, atom: AtomId) -> Self {
        self.atom = Some(atom);
        self
    }

    #[must_use]
    pub fn at_slot(mut self, slot: Slot) -> Self {
        self.slot = Some(slot);
        self
    }

    #[must_use]
    pub fn at_label(mut self, label: Label) -> Self {
        self.label = Some(label);
        self
    }

    #[must_use]
    pub fn with_opcode(mut self, opcode: impl Into<String>) -> Self {
        self.opcode = Some(opcode.into());
        self
    }

    /// Attach a span unless one is already set; the innermost site wins.
    #[must_use]
    pub fn or_span(mut self, span: Span) -> Self {
        if self.span.is_none() && span != Span::DUMMY {
            self.span = Some(span);
        }
        self
    }

    pub fn is_ice(&self) -> bool {
        self.kind.is_ice()
    }

    /// Render as a report for `source`.
    pub fn to_report(&self, source: Option<&Arc<str>>) -> Report {
        let mut report = Report::new(self.kind.severity(), self.message.clone())
            .with_code(self.kind.code());
        if let (Some(source), Some(span)) = (source, self.span) {
            report = report.at(Location::new(Arc::clone(source), span));
        }
        let mut context = Vec::new();
        if let Some(atom) = self.atom {
            context.push(format!("in {atom}"));
        }
        if let Some(label) = self.label {
            context.push(format!("at {label}"));
        }
        if let Some(slot) = self.slot {
            context.push(format!("slot {slot}"));
        }
        if let Some(op) = &self.opcode {
            context.push(format!("op `{op}`"));
        }
        if !context.is_empty() {
            report = report.with_note(format!("{}: {}", self.kind, context.join(", ")));
        }
        report
    }
}

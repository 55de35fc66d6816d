//! Kiln Lower - the lowering engine.
//!
//! Turns parsed source units into per-atom IR bodies:
//! - a declaration pass enters namespaces, classes, functions and globals
//!   into the [`AtomTable`](kiln_types::AtomTable) and fixes signatures
//! - a body pass walks every function in source order, allocating one slot
//!   per expression result and local, driving unification and overload
//!   resolution, and emitting ops through a builder with symbolic labels
//!
//! Faults abort the smallest enclosing statement; the atom is marked
//! invalid and lowering continues, so one pass surfaces every independent
//! error. Everything is reported through the session's
//! [`ReportSink`](kiln_diagnostic::ReportSink).

mod body;
mod builder;
mod declare;
mod diag;
mod scope;
mod session;
mod template;
mod ty;

pub use session::{LowerOptions, Lowered, Session, SourceUnit};
pub use template::TemplateCache;

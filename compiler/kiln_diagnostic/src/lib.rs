//! Kiln Diagnostic - reporting for every phase of the toolchain.
//!
//! - [`Severity`] and [`ErrorCode`] classify what went wrong
//! - [`Fault`] is the structured failure raised by resolution, lowering and
//!   the VM
//! - [`ReportSink`] is the append-only consumer all phases push to;
//!   [`Reporter`] is the collecting implementation
//! - [`emitter`] renders reports for humans

pub mod emitter;
mod error_code;
mod fault;
mod report;
mod severity;
pub mod span_utils;

pub use error_code::ErrorCode;
pub use fault::{Fault, FaultKind};
pub use report::{Location, NullSink, Report, ReportSink, Reporter};
pub use severity::Severity;

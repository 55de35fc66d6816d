//! Kiln Compiler Driver
//!
//! Orchestrates the core crates for one or more compilation targets:
//! - [`Source`] produces an AST from a file or an in-memory buffer
//! - [`Target`] aggregates sources and exposes the two operations of the
//!   core: [`Target::lower_all`] and [`Compiled::execute_entry`]
//! - [`run`] is the embedding entry point, returning a process exit status
//! - [`commands`] backs the `kiln` binary

pub mod commands;
mod driver;
mod errors;
mod source;
mod target;
mod tracing_setup;

pub use driver::{emit_reports, run, run_with, DriverOptions};
pub use errors::DriverError;
pub use source::Source;
pub use target::{lower_targets_parallel, Compiled, Target};
pub use tracing_setup::init_tracing;

#[cfg(test)]
mod tests;

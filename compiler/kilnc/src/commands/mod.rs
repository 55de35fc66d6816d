//! Command handlers for the `kiln` binary.
//!
//! Each handler returns the process exit status; `main` does the exiting.

mod check;
mod explain;
mod ir;
mod run;

pub use check::check_files;
pub use explain::explain_error;
pub use ir::{print_ir, render_ir};
pub use run::run_files;

use crate::Source;

fn sources_of(paths: &[String]) -> Vec<Source> {
    paths.iter().map(Source::file).collect()
}

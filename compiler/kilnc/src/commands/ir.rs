//! The `ir` command: print the lowered IR of every atom with a body.

use std::fmt::Write as _;
use std::sync::Arc;

use kiln_diagnostic::{Report, ReportSink, Reporter};
use kiln_types::IntrinsicRegistry;

use crate::{emit_reports, init_tracing, Compiled, DriverOptions, Target};

use super::sources_of;

/// One block per atom, in declaration order:
///
/// ```text
/// ; main (atom#3)
/// 0000  blueprint.begin atom#3 magic=0x4b494c4e
/// ...
/// ```
pub fn render_ir(compiled: &Compiled) -> String {
    let atoms = &compiled.lowered.atoms;
    let interner = atoms.interner();
    let mut out = String::new();
    for atom in atoms.iter() {
        let Some(body) = &atom.body else {
            continue;
        };
        if !out.is_empty() {
            out.push('\n');
        }
        let _ = writeln!(out, "; {} ({})", atoms.qualified_name(atom.id), atom.id);
        let _ = write!(out, "{}", body.listing(interner));
    }
    out
}

pub fn print_ir(paths: &[String], options: &DriverOptions) -> i32 {
    init_tracing();
    let sources = sources_of(paths);
    let target = Target::new("main", sources.clone()).with_lower_options(options.lower);
    let registry = Arc::new(IntrinsicRegistry::standard());
    let sink = Reporter::shared();

    let status = match target.lower_all(&registry, &sink) {
        Ok(compiled) => {
            print!("{}", render_ir(&compiled));
            0
        }
        Err(err) => {
            if !err.is_reported() {
                sink.report(Report::error(err.to_string()));
            }
            1
        }
    };
    emit_reports(&sink, &sources, options.emitter);
    status
}

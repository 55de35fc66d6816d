//! The `check` command: lower files without executing them.

use std::sync::Arc;

use kiln_diagnostic::{Report, ReportSink, Reporter};
use kiln_types::IntrinsicRegistry;

use crate::{emit_reports, init_tracing, lower_targets_parallel, DriverOptions, Target};

use super::sources_of;

/// Lower each file as an independent target, in parallel.
///
/// Every file is checked even when an earlier one fails, so one run shows
/// all problems.
pub fn check_files(paths: &[String], options: &DriverOptions) -> i32 {
    init_tracing();
    let sources = sources_of(paths);
    let targets: Vec<Target> = sources
        .iter()
        .map(|source| {
            Target::new(source.name().to_string(), vec![source.clone()])
                .with_lower_options(options.lower)
        })
        .collect();

    let registry = Arc::new(IntrinsicRegistry::standard());
    let sink = Reporter::shared();
    let results = lower_targets_parallel(&targets, &registry, &sink, options.jobs);

    let mut failed = false;
    for result in &results {
        match result {
            Ok(compiled) => {
                let atoms = &compiled.lowered.atoms;
                let lowered = atoms.iter().filter(|atom| atom.body.is_some()).count();
                println!("OK: {} ({lowered} bodies lowered)", compiled.name);
            }
            Err(err) => {
                failed = true;
                if !err.is_reported() {
                    sink.report(Report::error(err.to_string()));
                }
            }
        }
    }
    emit_reports(&sink, &sources, options.emitter);
    i32::from(failed)
}

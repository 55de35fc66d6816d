//! The embedding entry point.

use std::io::IsTerminal;
use std::sync::Arc;

use kiln_diagnostic::emitter::{EmitterConfig, ReportEmitter, TerminalEmitter};
use kiln_diagnostic::{Report, ReportSink, Reporter, Severity};
use kiln_lower::LowerOptions;
use kiln_types::IntrinsicRegistry;
use kiln_vm::{stdout_handler, SharedPrintHandler, VmOptions};

use crate::{init_tracing, Source, Target};

#[derive(Clone, Debug)]
pub struct DriverOptions {
    pub vm: VmOptions,
    pub lower: LowerOptions,
    /// Name of the function to execute.
    pub entry: String,
    /// Worker threads for lowering independent targets; 0 lets rayon
    /// decide.
    pub jobs: usize,
    pub emitter: EmitterConfig,
}

impl Default for DriverOptions {
    fn default() -> Self {
        DriverOptions {
            vm: VmOptions::default(),
            lower: LowerOptions::default(),
            entry: "main".to_string(),
            jobs: 0,
            emitter: EmitterConfig::default(),
        }
    }
}

/// Lower `sources` as one target and execute its entry function.
///
/// Program output goes to stdout, diagnostics to stderr. Returns the exit
/// status of the program, or 1 if it could not be lowered or started.
pub fn run(options: &DriverOptions, sources: Vec<Source>, args: &[String]) -> i32 {
    init_tracing();
    let sink = Reporter::shared();
    let status = run_with(options, sources.clone(), args, &sink, stdout_handler());
    emit_reports(&sink, &sources, options.emitter);
    status
}

/// [`run`] with a caller-provided sink and print handler; nothing is
/// written to stderr.
pub fn run_with(
    options: &DriverOptions,
    sources: Vec<Source>,
    args: &[String],
    sink: &Arc<Reporter>,
    print: SharedPrintHandler,
) -> i32 {
    let registry = Arc::new(IntrinsicRegistry::standard());
    let target = Target::new("main", sources).with_lower_options(options.lower);

    let outcome = target
        .lower_all(&registry, sink)
        .and_then(|compiled| {
            let execution = compiled.execute_entry(&options.entry, &options.vm, args, print)?;
            Ok((compiled, execution))
        });
    match outcome {
        Ok((compiled, execution)) => {
            if let Some(report) = compiled.fault_report(&execution) {
                sink.report(report);
            }
            execution.exit_status()
        }
        Err(err) => {
            tracing::debug!(%err, "target stopped");
            if !err.is_reported() {
                sink.report(Report::error(err.to_string()));
            }
            1
        }
    }
}

/// Render everything in `sink` to stderr, followed by a summary line.
///
/// Sources are read again for excerpts; one that cannot be read is shown
/// without them.
pub fn emit_reports(sink: &Reporter, sources: &[Source], config: EmitterConfig) {
    let reports = sink.reports();
    if reports.is_empty() {
        return;
    }
    let is_tty = std::io::stderr().is_terminal();
    let mut emitter = TerminalEmitter::<std::io::Stderr>::stderr(config, is_tty);
    for source in sources {
        if let Ok(text) = source.read() {
            emitter.add_source(source.name(), text);
        }
    }
    emitter.emit_all(&reports);
    let warnings = reports
        .iter()
        .filter(|r| r.severity == Severity::Warning)
        .count();
    emitter.emit_summary(sink.error_count() + sink.ice_count(), warnings);
    emitter.flush();
}

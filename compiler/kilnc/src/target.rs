//! Compilation targets.

use std::sync::Arc;

use kiln_diagnostic::{Report, ReportSink, Reporter};
use kiln_ir::{AtomId, StringInterner};
use kiln_lower::{LowerOptions, Lowered, Session};
use kiln_types::{AtomKind, IntrinsicRegistry};
use kiln_vm::{Execution, NativeTable, SharedPrintHandler, Vm, VmOptions};
use rayon::prelude::*;

use crate::{DriverError, Source};

/// A named group of sources lowered into one atom table.
#[derive(Clone, Debug)]
pub struct Target {
    pub name: String,
    pub sources: Vec<Source>,
    pub lower: LowerOptions,
}

impl Target {
    pub fn new(name: impl Into<String>, sources: Vec<Source>) -> Self {
        Target {
            name: name.into(),
            sources,
            lower: LowerOptions::default(),
        }
    }

    #[must_use]
    pub fn with_lower_options(mut self, lower: LowerOptions) -> Self {
        self.lower = lower;
        self
    }

    /// Produce every source's AST, then lower them together.
    ///
    /// Load failures are reported per source and stop the target before
    /// lowering. Lowering errors are reported by the session.
    #[tracing::instrument(level = "debug", skip_all, fields(target = %self.name))]
    pub fn lower_all(
        &self,
        registry: &Arc<IntrinsicRegistry>,
        sink: &Arc<Reporter>,
    ) -> Result<Compiled, DriverError> {
        if self.sources.is_empty() {
            return Err(DriverError::NoSources {
                target: self.name.clone(),
            });
        }

        let mut units = Vec::with_capacity(self.sources.len());
        let mut failed = 0;
        for source in &self.sources {
            match source.produce_ast() {
                Ok(unit) => units.push(unit),
                Err(err) => {
                    failed += 1;
                    sink.report(err.to_report(&source.name()));
                }
            }
        }
        if failed > 0 {
            return Err(DriverError::Load {
                target: self.name.clone(),
                count: failed,
            });
        }

        let sink: Arc<dyn ReportSink> = Arc::clone(sink) as Arc<dyn ReportSink>;
        let mut session = Session::new(
            Arc::new(StringInterner::new()),
            Arc::clone(registry),
            sink,
            self.lower,
        );
        session.lower_units(&units);
        let lowered = session.finish();
        if lowered.has_errors() {
            return Err(DriverError::Lowering {
                target: self.name.clone(),
                errors: lowered.errors,
            });
        }

        Ok(Compiled {
            name: self.name.clone(),
            sources: self.sources.iter().map(Source::name).collect(),
            lowered,
        })
    }
}

/// A target whose sources all lowered without errors.
pub struct Compiled {
    pub name: String,
    /// Diagnostic names of the target's sources, in order.
    pub sources: Vec<Arc<str>>,
    pub lowered: Lowered,
}

impl Compiled {
    /// The zero-argument function called `entry`.
    pub fn entry(&self, entry: &str) -> Result<AtomId, DriverError> {
        let atoms = &self.lowered.atoms;
        atoms
            .lookup_path(atoms.root(), entry)
            .ok()
            .and_then(|found| {
                found
                    .into_iter()
                    .find(|&id| atoms[id].kind == AtomKind::Function && atoms[id].arity() == 0)
            })
            .ok_or_else(|| DriverError::MissingEntry {
                target: self.name.clone(),
                entry: entry.to_string(),
            })
    }

    /// Run the global initializer, then `entry`.
    #[tracing::instrument(level = "debug", skip_all, fields(target = %self.name, entry = entry))]
    pub fn execute_entry(
        &self,
        entry: &str,
        options: &VmOptions,
        args: &[String],
        print: SharedPrintHandler,
    ) -> Result<Execution, DriverError> {
        let entry = self.entry(entry)?;
        let natives = NativeTable::standard();
        let mut vm = Vm::new(&self.lowered.atoms, &natives, options.clone(), print)
            .with_args(args.iter().map(String::as_str));
        Ok(vm.run(self.lowered.init, entry))
    }

    /// Render a runtime fault for the sink.
    ///
    /// Atoms do not record their source unit, so the location is attached
    /// only when the target has a single source.
    pub fn fault_report(&self, execution: &Execution) -> Option<Report> {
        let fault = execution.fault()?;
        let source = match self.sources.as_slice() {
            [only] => Some(only),
            _ => None,
        };
        let mut report = fault.to_report(source);
        if let Some(atom) = fault.atom.filter(|&id| self.lowered.atoms.get(id).is_some()) {
            report = report.with_note(format!(
                "while executing `{}`",
                self.lowered.atoms.qualified_name(atom)
            ));
        }
        Some(report)
    }
}

/// Lower independent targets concurrently.
///
/// Targets share only the registry and the sink. `jobs == 0` uses rayon's
/// global pool.
#[tracing::instrument(level = "debug", skip_all, fields(targets = targets.len(), jobs = jobs))]
pub fn lower_targets_parallel(
    targets: &[Target],
    registry: &Arc<IntrinsicRegistry>,
    sink: &Arc<Reporter>,
    jobs: usize,
) -> Vec<Result<Compiled, DriverError>> {
    let lower = || -> Vec<Result<Compiled, DriverError>> {
        targets
            .par_iter()
            .map(|target| target.lower_all(registry, sink))
            .collect()
    };
    if jobs == 0 {
        return lower();
    }
    match rayon::ThreadPoolBuilder::new().num_threads(jobs).build() {
        Ok(pool) => pool.install(lower),
        Err(err) => {
            tracing::debug!(%err, "thread pool unavailable, using the global pool");
            lower()
        }
    }
}

//! Report emitters.

mod terminal;

pub use terminal::{ColorMode, EmitterConfig, TerminalEmitter};

use crate::Report;

/// Renders reports to some output.
pub trait ReportEmitter {
    fn emit(&mut self, report: &Report);

    fn emit_all(&mut self, reports: &[Report]) {
        for report in reports {
            self.emit(report);
        }
    }

    fn emit_summary(&mut self, error_count: usize, warning_count: usize);

    fn flush(&mut self);
}

//! Reports and the append-only reporting sink.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use kiln_ir::Span;
use parking_lot::Mutex;

use crate::{ErrorCode, Severity};

/// Where a report points: a source unit and a byte span inside it.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct Location {
    pub source: Arc<str>,
    pub span: Span,
}

impl Location {
    pub fn new(source: Arc<str>, span: Span) -> Self {
        Location { source, span }
    }
}

/// One message pushed to the sink.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
#[must_use = "reports should be pushed to a sink, not silently dropped"]
pub struct Report {
    pub severity: Severity,
    pub code: Option<ErrorCode>,
    pub message: String,
    pub location: Option<Location>,
    pub notes: Vec<String>,
}

impl Report {
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Report {
            severity,
            code: None,
            message: message.into(),
            location: None,
            notes: Vec::new(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(Severity::Error, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, message)
    }

    pub fn with_code(mut self, code: ErrorCode) -> Self {
        self.code = Some(code);
        self
    }

    pub fn at(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }
}

/// Consumer of reports.
///
/// Implementations must accept concurrent pushes: independent targets
/// lowered in parallel share one sink.
pub trait ReportSink: Send + Sync {
    fn report(&self, report: Report);

    /// Convenience form of the `report(severity, message, location)` call.
    fn report_message(&self, severity: Severity, message: &str, location: Option<Location>) {
        let mut report = Report::new(severity, message);
        report.location = location;
        self.report(report);
    }
}

impl<S: ReportSink + ?Sized> ReportSink for Arc<S> {
    fn report(&self, report: Report) {
        (**self).report(report);
    }
}

/// Collecting sink: keeps every report and tracks failure.
#[derive(Debug, Default)]
pub struct Reporter {
    reports: Mutex<Vec<Report>>,
    failed: AtomicBool,
    errors: AtomicUsize,
    ices: AtomicUsize,
}

impl Reporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> Arc<Reporter> {
        Arc::new(Self::new())
    }

    /// Whether an ICE or error has been reported.
    pub fn has_failed(&self) -> bool {
        self.failed.load(Ordering::Acquire)
    }

    pub fn error_count(&self) -> usize {
        self.errors.load(Ordering::Relaxed)
    }

    pub fn ice_count(&self) -> usize {
        self.ices.load(Ordering::Relaxed)
    }

    /// Snapshot of everything reported so far, in push order.
    pub fn reports(&self) -> Vec<Report> {
        self.reports.lock().clone()
    }

    /// Reports at exactly `severity`.
    pub fn with_severity(&self, severity: Severity) -> Vec<Report> {
        self.reports
            .lock()
            .iter()
            .filter(|r| r.severity == severity)
            .cloned()
            .collect()
    }

    /// Drain all reports, keeping the failure flag.
    pub fn take(&self) -> Vec<Report> {
        std::mem::take(&mut *self.reports.lock())
    }
}

impl ReportSink for Reporter {
    fn report(&self, report: Report) {
        match report.severity {
            Severity::Ice => {
                self.ices.fetch_add(1, Ordering::Relaxed);
            }
            Severity::Error => {
                self.errors.fetch_add(1, Ordering::Relaxed);
            }
            _ => {}
        }
        if report.severity.marks_failure() {
            self.failed.store(true, Ordering::Release);
        }
        self.reports.lock().push(report);
    }
}

/// Sink that drops everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl ReportSink for NullSink {
    fn report(&self, _report: Report) {}
}

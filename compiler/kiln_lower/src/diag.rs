//! Reporting and fault construction shared by the lowering passes.

use std::sync::Arc;

use kiln_diagnostic::{ErrorCode, Fault, FaultKind, Location, Report, ReportSink};
use kiln_ir::{AstNode, Span};
use kiln_types::{AtomTable, ResolveError, UnifyError};

/// The session's handle on the sink, with running counts.
pub(crate) struct Diagnostics {
    sink: Arc<dyn ReportSink>,
    errors: usize,
    warnings: usize,
}

impl Diagnostics {
    pub(crate) fn new(sink: Arc<dyn ReportSink>) -> Self {
        Diagnostics {
            sink,
            errors: 0,
            warnings: 0,
        }
    }

    pub(crate) fn fault(&mut self, fault: &Fault, source: &Arc<str>) {
        let report = fault.to_report(Some(source));
        if report.severity.marks_failure() {
            self.errors += 1;
        }
        tracing::debug!(kind = %fault.kind, message = %fault.message, "lowering fault");
        self.sink.report(report);
    }

    pub(crate) fn warning(
        &mut self,
        code: ErrorCode,
        message: impl Into<String>,
        source: &Arc<str>,
        span: Span,
    ) {
        self.warnings += 1;
        let mut report = Report::warning(message).with_code(code);
        if span != Span::DUMMY {
            report = report.at(Location::new(Arc::clone(source), span));
        }
        self.sink.report(report);
    }

    pub(crate) fn errors(&self) -> usize {
        self.errors
    }

    pub(crate) fn warnings(&self) -> usize {
        self.warnings
    }
}

/// `node` has no visitor in `context`.
pub(crate) fn unexpected(node: &AstNode, context: &str) -> Fault {
    Fault::new(
        FaultKind::UnexpectedNode,
        format!("unexpected `{}` node in {context}", node.rule),
    )
    .or_span(node.span)
}

/// `node` lacks a required part.
pub(crate) fn missing(node: &AstNode, what: &str) -> Fault {
    Fault::new(
        FaultKind::UnexpectedNode,
        format!("`{}` node is missing {what}", node.rule),
    )
    .or_span(node.span)
}

pub(crate) fn resolve_fault(err: &ResolveError, span: Span) -> Fault {
    Fault::new(err.kind(), err.to_string()).or_span(span)
}

pub(crate) fn unify_fault(atoms: &AtomTable, err: &UnifyError, span: Span) -> Fault {
    Fault::new(err.kind(), atoms.explain_unify(err)).or_span(span)
}

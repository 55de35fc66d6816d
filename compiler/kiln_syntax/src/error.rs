use std::path::PathBuf;
use std::sync::Arc;

use kiln_diagnostic::{ErrorCode, Location, Report};
use kiln_ir::Span;

/// Failure to turn a source unit into a tree.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("cannot read `{}`: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unrecognized token")]
    BadToken { span: Span },

    #[error("expected {expected}, found {found}")]
    Unexpected {
        span: Span,
        expected: &'static str,
        found: String,
    },

    #[error("unknown rule `{name}`")]
    UnknownRule { span: Span, name: String },

    #[error("`{rule}` node has more than one literal or a literal after a child")]
    MisplacedLiteral { span: Span, rule: &'static str },

    #[error("unclosed `(`")]
    Unclosed { span: Span },

    #[error("input continues after the root node")]
    TrailingInput { span: Span },

    #[error("source is empty")]
    Empty,
}

impl LoadError {
    pub fn span(&self) -> Option<Span> {
        match self {
            LoadError::BadToken { span }
            | LoadError::Unexpected { span, .. }
            | LoadError::UnknownRule { span, .. }
            | LoadError::MisplacedLiteral { span, .. }
            | LoadError::Unclosed { span }
            | LoadError::TrailingInput { span } => Some(*span),
            LoadError::Io { .. } | LoadError::Empty => None,
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            LoadError::Io { .. } => ErrorCode::K1002,
            _ => ErrorCode::K1001,
        }
    }

    pub fn to_report(&self, source: &Arc<str>) -> Report {
        let report = Report::error(self.to_string()).with_code(self.code());
        match self.span() {
            Some(span) => report.at(Location::new(Arc::clone(source), span)),
            None => report,
        }
    }
}

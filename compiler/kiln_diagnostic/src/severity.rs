//! Report severities.

use std::fmt;

/// Severity of a report pushed to the sink.
///
/// Only [`Severity::Ice`] and [`Severity::Error`] mark a compilation as
/// failed; everything else is informational.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum Severity {
    /// Internal compiler error: a defect in lowering or the VM itself.
    Ice,
    Error,
    Warning,
    Hint,
    Suggest,
    Success,
    Info,
    Verbose,
    Trace,
    None,
}

impl Severity {
    pub const ALL: [Severity; 10] = [
        Severity::Ice,
        Severity::Error,
        Severity::Warning,
        Severity::Hint,
        Severity::Suggest,
        Severity::Success,
        Severity::Info,
        Severity::Verbose,
        Severity::Trace,
        Severity::None,
    ];

    #[inline]
    pub const fn marks_failure(self) -> bool {
        matches!(self, Severity::Ice | Severity::Error)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Severity::Ice => "internal compiler error",
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Hint => "hint",
            Severity::Suggest => "suggestion",
            Severity::Success => "success",
            Severity::Info => "info",
            Severity::Verbose => "verbose",
            Severity::Trace => "trace",
            Severity::None => "none",
        }
    }

    /// Parse a CLI spelling (`error`, `warning`, `ice`, ...).
    pub fn parse(s: &str) -> Option<Severity> {
        match s {
            "ice" => Some(Severity::Ice),
            "suggest" => Some(Severity::Suggest),
            _ => Severity::ALL.into_iter().find(|sev| sev.as_str() == s),
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

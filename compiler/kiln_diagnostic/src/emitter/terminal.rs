//! Human-readable report output with optional ANSI colors.

use std::io::{self, Write};
use std::sync::Arc;

use crate::span_utils::LineOffsetTable;
use crate::{Report, Severity};

use super::ReportEmitter;

mod colors {
    pub const ICE: &str = "\x1b[1;35m"; // Bold magenta
    pub const ERROR: &str = "\x1b[1;31m"; // Bold red
    pub const WARNING: &str = "\x1b[1;33m"; // Bold yellow
    pub const NOTE: &str = "\x1b[1;36m"; // Bold cyan
    pub const BOLD: &str = "\x1b[1m";
    pub const LOCATION: &str = "\x1b[1;34m"; // Bold blue
    pub const RESET: &str = "\x1b[0m";
}

#[inline]
fn plural_s(count: usize) -> &'static str {
    if count == 1 {
        ""
    } else {
        "s"
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ColorMode {
    /// Color only when the output is a terminal.
    #[default]
    Auto,
    Always,
    Never,
}

impl ColorMode {
    pub fn should_use_colors(self, is_tty: bool) -> bool {
        match self {
            ColorMode::Auto => is_tty,
            ColorMode::Always => true,
            ColorMode::Never => false,
        }
    }

    pub fn parse(s: &str) -> Option<ColorMode> {
        match s {
            "auto" => Some(ColorMode::Auto),
            "always" => Some(ColorMode::Always),
            "never" => Some(ColorMode::Never),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EmitterConfig {
    pub color: ColorMode,
    /// Reports less severe than this are not printed.
    pub min_severity: Severity,
}

impl Default for EmitterConfig {
    fn default() -> Self {
        EmitterConfig {
            color: ColorMode::Auto,
            min_severity: Severity::Hint,
        }
    }
}

struct SourceText {
    name: Arc<str>,
    text: Arc<str>,
    lines: LineOffsetTable,
}

pub struct TerminalEmitter<W: Write> {
    writer: W,
    colors: bool,
    min_severity: Severity,
    sources: Vec<SourceText>,
}

impl<W: Write> TerminalEmitter<W> {
    pub fn new(writer: W, config: EmitterConfig, is_tty: bool) -> Self {
        TerminalEmitter {
            writer,
            colors: config.color.should_use_colors(is_tty),
            min_severity: config.min_severity,
            sources: Vec::new(),
        }
    }

    pub fn stderr(config: EmitterConfig, is_tty: bool) -> TerminalEmitter<io::Stderr> {
        TerminalEmitter::new(io::stderr(), config, is_tty)
    }

    /// Make `text` available so locations in `name` render as `line:col`
    /// with a source excerpt.
    pub fn add_source(&mut self, name: Arc<str>, text: Arc<str>) {
        let lines = LineOffsetTable::build(&text);
        self.sources.retain(|s| s.name != name);
        self.sources.push(SourceText { name, text, lines });
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write_colored(&mut self, text: &str, color: &str) {
        if self.colors {
            let _ = write!(self.writer, "{color}{text}{}", colors::RESET);
        } else {
            let _ = write!(self.writer, "{text}");
        }
    }

    fn severity_color(severity: Severity) -> &'static str {
        match severity {
            Severity::Ice => colors::ICE,
            Severity::Error => colors::ERROR,
            Severity::Warning => colors::WARNING,
            _ => colors::NOTE,
        }
    }

    fn write_location(&mut self, report: &Report) {
        let Some(location) = &report.location else {
            return;
        };
        let source = self.sources.iter().find(|s| s.name == location.source);
        let (position, excerpt) = match source {
            Some(src) => {
                let (line, col) = src.lines.span_start(&src.text, location.span);
                let excerpt = src
                    .lines
                    .line_text(&src.text, line)
                    .map(|text| (line, col, text.to_owned()));
                (format!("{}:{line}:{col}", location.source), excerpt)
            }
            None => (format!("{}@{:?}", location.source, location.span), None),
        };
        let _ = write!(self.writer, "  --> ");
        self.write_colored(&position, colors::LOCATION);
        let _ = writeln!(self.writer);

        if let Some((line, col, text)) = excerpt {
            let gutter = line.to_string();
            let pad = " ".repeat(gutter.len());
            let _ = writeln!(self.writer, "{pad} |");
            let _ = writeln!(self.writer, "{gutter} | {text}");
            let width = location.span.len().max(1) as usize;
            let caret = format!("{}{}", " ".repeat(col as usize - 1), "^".repeat(width));
            let _ = write!(self.writer, "{pad} | ");
            self.write_colored(&caret, Self::severity_color(report.severity));
            let _ = writeln!(self.writer);
        }
    }
}

impl<W: Write> ReportEmitter for TerminalEmitter<W> {
    fn emit(&mut self, report: &Report) {
        if report.severity > self.min_severity {
            return;
        }
        self.write_colored(
            report.severity.as_str(),
            Self::severity_color(report.severity),
        );
        if let Some(code) = report.code {
            self.write_colored(&format!("[{code}]"), colors::BOLD);
        }
        let _ = writeln!(self.writer, ": {}", report.message);
        self.write_location(report);
        for note in &report.notes {
            let _ = write!(self.writer, "  = ");
            self.write_colored("note", colors::NOTE);
            let _ = writeln!(self.writer, ": {note}");
        }
    }

    fn emit_summary(&mut self, error_count: usize, warning_count: usize) {
        if error_count == 0 && warning_count == 0 {
            return;
        }
        let mut parts = Vec::new();
        if error_count > 0 {
            parts.push(format!("{error_count} error{}", plural_s(error_count)));
        }
        if warning_count > 0 {
            parts.push(format!("{warning_count} warning{}", plural_s(warning_count)));
        }
        let _ = writeln!(self.writer, "{} emitted", parts.join(" and "));
    }

    fn flush(&mut self) {
        let _ = self.writer.flush();
    }
}

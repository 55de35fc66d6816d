//! Lowering session: one per compilation target.

use std::sync::Arc;

use kiln_diagnostic::ReportSink;
use kiln_ir::{AstNode, AtomId, StringInterner};
use kiln_types::{AtomTable, IntrinsicRegistry};

use crate::body;
use crate::declare::{self, Plan};
use crate::diag::Diagnostics;
use crate::template::TemplateCache;

#[derive(Copy, Clone, Debug)]
pub struct LowerOptions {
    /// Warn once per block about statements after `return`, `break` or
    /// `continue`.
    pub warn_unreachable: bool,
}

impl Default for LowerOptions {
    fn default() -> Self {
        LowerOptions {
            warn_unreachable: true,
        }
    }
}

/// A parsed source unit and the name its diagnostics are reported under.
#[derive(Clone, Debug)]
pub struct SourceUnit {
    pub name: Arc<str>,
    pub root: AstNode,
}

impl SourceUnit {
    pub fn new(name: impl Into<Arc<str>>, root: AstNode) -> Self {
        SourceUnit {
            name: name.into(),
            root,
        }
    }
}

/// Output of a finished session.
pub struct Lowered {
    pub atoms: AtomTable,
    /// Synthesized atom initialising module globals, if there are any.
    pub init: Option<AtomId>,
    pub errors: usize,
    pub warnings: usize,
}

impl Lowered {
    pub fn has_errors(&self) -> bool {
        self.errors > 0
    }
}

/// State the passes share while lowering one target.
pub(crate) struct Context {
    pub(crate) atoms: AtomTable,
    pub(crate) registry: Arc<IntrinsicRegistry>,
    pub(crate) diag: Diagnostics,
    pub(crate) templates: TemplateCache,
    pub(crate) options: LowerOptions,
}

/// Owns the atom table of one target while it is being lowered.
///
/// Lowering is single-threaded per session; independent sessions may run
/// in parallel and share only the registry and the sink.
pub struct Session {
    cx: Context,
    init: Option<AtomId>,
}

impl Session {
    pub fn new(
        interner: Arc<StringInterner>,
        registry: Arc<IntrinsicRegistry>,
        sink: Arc<dyn ReportSink>,
        options: LowerOptions,
    ) -> Self {
        Session {
            cx: Context {
                atoms: AtomTable::new(interner),
                registry,
                diag: Diagnostics::new(sink),
                templates: TemplateCache::new(),
                options,
            },
            init: None,
        }
    }

    /// Lower every unit of the target.
    ///
    /// All units are declared before any body is lowered, so functions and
    /// classes may be referenced across units and ahead of their
    /// declaration. Globals are initialised in source order by a
    /// synthesized `{init}` atom.
    #[tracing::instrument(level = "debug", skip_all, fields(units = units.len()))]
    pub fn lower_units(&mut self, units: &[SourceUnit]) {
        let mut plan = Plan::default();
        for unit in units {
            declare::collect(&mut self.cx, unit, &mut plan);
        }
        declare::resolve_signatures(&mut self.cx, &mut plan);

        if !plan.globals.is_empty() {
            self.init = Some(body::lower_globals(&mut self.cx, &plan.globals));
        }
        for pending in plan.functions.iter().filter(|f| f.signed) {
            body::lower_function(&mut self.cx, pending);
        }
        tracing::debug!(
            atoms = self.cx.atoms.len(),
            errors = self.cx.diag.errors(),
            templates = self.cx.templates.len(),
            "lowering finished"
        );
    }

    pub fn atoms(&self) -> &AtomTable {
        &self.cx.atoms
    }

    pub fn templates(&self) -> &TemplateCache {
        &self.cx.templates
    }

    pub fn init_atom(&self) -> Option<AtomId> {
        self.init
    }

    pub fn error_count(&self) -> usize {
        self.cx.diag.errors()
    }

    pub fn warning_count(&self) -> usize {
        self.cx.diag.warnings()
    }

    pub fn finish(self) -> Lowered {
        Lowered {
            errors: self.cx.diag.errors(),
            warnings: self.cx.diag.warnings(),
            atoms: self.cx.atoms,
            init: self.init,
        }
    }
}

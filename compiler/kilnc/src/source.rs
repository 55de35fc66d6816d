//! Source descriptors.

use std::path::PathBuf;
use std::sync::Arc;

use kiln_lower::SourceUnit;
use kiln_syntax::LoadError;

/// Where a source unit's tree text comes from.
#[derive(Clone, Debug)]
pub enum Source {
    File(PathBuf),
    Memory { name: Arc<str>, text: Arc<str> },
}

impl Source {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Source::File(path.into())
    }

    pub fn memory(name: impl Into<Arc<str>>, text: impl Into<Arc<str>>) -> Self {
        Source::Memory {
            name: name.into(),
            text: text.into(),
        }
    }

    /// Name used in diagnostics: the path as given, or the buffer's name.
    pub fn name(&self) -> Arc<str> {
        match self {
            Source::File(path) => path.display().to_string().into(),
            Source::Memory { name, .. } => Arc::clone(name),
        }
    }

    /// The raw text, for rendering source excerpts.
    pub fn read(&self) -> Result<Arc<str>, LoadError> {
        match self {
            Source::File(path) => std::fs::read_to_string(path)
                .map(Into::into)
                .map_err(|source| LoadError::Io {
                    path: path.clone(),
                    source,
                }),
            Source::Memory { text, .. } => Ok(Arc::clone(text)),
        }
    }

    /// The staged operation of a source: parse it into a unit ready for
    /// lowering.
    pub fn produce_ast(&self) -> Result<SourceUnit, LoadError> {
        let root = match self {
            Source::File(path) => kiln_syntax::load_from_file(path)?,
            Source::Memory { text, .. } => kiln_syntax::load_from_memory(text)?,
        };
        Ok(SourceUnit::new(self.name(), root))
    }
}

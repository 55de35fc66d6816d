//! Kiln Syntax - loads source units written in the tree text format.
//!
//! A source unit holds exactly one parenthesised tree:
//!
//! ```text
//! ; comments run to the end of the line
//! (module
//!   (fn main (params) (type int)
//!     (block (return (binary + (int 40) (int 2))))))
//! ```
//!
//! Each node is `(rule literal? child*)`. The rule is one of the names in
//! [`Rule`](kiln_ir::Rule); the optional literal is an integer, float,
//! string, `true`/`false`, or a bare word (names, operators, types).

mod error;
mod lexer;
mod parser;

use std::path::Path;

use kiln_ir::AstNode;

pub use error::LoadError;

/// Parse a tree held in memory.
#[tracing::instrument(level = "debug", skip_all)]
pub fn load_from_memory(text: &str) -> Result<AstNode, LoadError> {
    let root = parser::parse(text)?;
    tracing::debug!(nodes = root.size(), "tree loaded");
    Ok(root)
}

/// Read and parse the tree stored at `path`.
pub fn load_from_file(path: &Path) -> Result<AstNode, LoadError> {
    let text = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    load_from_memory(&text)
}

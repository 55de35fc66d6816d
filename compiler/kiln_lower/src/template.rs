//! Reuse cache for canonical closure fragments.
//!
//! Each distinct closure literal is desugared once into a full function
//! node and shared read-only by every later instantiation with the same
//! structure. Instantiations differ only in the atom and slots they
//! allocate. The cache lives as long as its lowering session.
//!
//! Entries are bucketed by fingerprint; a hit also requires the stored
//! source to match structurally, so colliding fingerprints never share a
//! fragment.

use std::sync::Arc;

use kiln_ir::{AstNode, Fingerprint};
use rustc_hash::FxHashMap;

#[derive(Debug)]
struct Template {
    source: AstNode,
    canonical: Arc<AstNode>,
}

#[derive(Debug, Default)]
pub struct TemplateCache {
    entries: FxHashMap<Fingerprint, Vec<Template>>,
    len: usize,
    hits: u64,
    misses: u64,
}

impl TemplateCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The canonical fragment for `node`, building it on first use.
    pub fn get_or_build(
        &mut self,
        node: &AstNode,
        build: impl FnOnce(&AstNode) -> AstNode,
    ) -> Arc<AstNode> {
        self.get_or_build_keyed(node.fingerprint(), node, build)
    }

    pub(crate) fn get_or_build_keyed(
        &mut self,
        key: Fingerprint,
        node: &AstNode,
        build: impl FnOnce(&AstNode) -> AstNode,
    ) -> Arc<AstNode> {
        let bucket = self.entries.entry(key).or_default();
        if let Some(hit) = bucket.iter().find(|t| t.source.same_structure(node)) {
            self.hits += 1;
            tracing::trace!(fingerprint = key.0, "template cache hit");
            return Arc::clone(&hit.canonical);
        }
        self.misses += 1;
        if !bucket.is_empty() {
            tracing::debug!(fingerprint = key.0, "template fingerprint collision");
        }
        tracing::trace!(fingerprint = key.0, "template cache miss");
        let canonical = Arc::new(build(node));
        bucket.push(Template {
            source: node.clone(),
            canonical: Arc::clone(&canonical),
        });
        self.len += 1;
        canonical
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

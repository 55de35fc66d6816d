//! Lexical scopes for locals inside one body.

use kiln_ir::{Clid, Name};
use rustc_hash::FxHashMap;

/// Stack of block frames mapping local names to their slots.
///
/// Locals are visible from their declaration to the end of the enclosing
/// block; inner blocks shadow outer ones.
#[derive(Debug, Default)]
pub(crate) struct LocalScope {
    frames: Vec<FxHashMap<Name, Clid>>,
}

impl LocalScope {
    pub(crate) fn new() -> Self {
        LocalScope {
            frames: vec![FxHashMap::default()],
        }
    }

    pub(crate) fn push(&mut self) {
        self.frames.push(FxHashMap::default());
    }

    pub(crate) fn pop(&mut self) {
        if self.frames.len() > 1 {
            self.frames.pop();
        }
    }

    pub(crate) fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Drop frames opened after `depth` was recorded.
    pub(crate) fn truncate(&mut self, depth: usize) {
        self.frames.truncate(depth.max(1));
    }

    pub(crate) fn bind(&mut self, name: Name, clid: Clid) {
        if let Some(frame) = self.frames.last_mut() {
            frame.insert(name, clid);
        }
    }

    pub(crate) fn lookup(&self, name: Name) -> Option<Clid> {
        self.frames
            .iter()
            .rev()
            .find_map(|frame| frame.get(&name).copied())
    }
}

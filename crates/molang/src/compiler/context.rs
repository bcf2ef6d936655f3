use smol_str::SmolStr;

use crate::{ast::Node, eval::scope::SlotTable};

/// Working state of a single compile pass.
///
/// A context is created per call to [`Compiler::compile`](super::Compiler::compile)
/// and never shared, which keeps the compiler reentrant.
#[derive(Debug, Default)]
pub(crate) struct CompileContext {
    /// Slots of the `temp` variables seen so far
    slots: SlotTable,
    /// Number of loops unrolled at compile time
    pub unrolled_loops: usize,
    /// Number of subtrees replaced by their folded value
    pub folded_subtrees: usize,
}

impl CompileContext {
    pub fn new(root: &Node) -> Self {
        Self {
            slots: SlotTable::collect(root),
            ..Default::default()
        }
    }

    pub fn slot(&mut self, name: &SmolStr) -> usize {
        self.slots.slot(name)
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }
}

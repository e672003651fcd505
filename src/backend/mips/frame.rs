//! Stack frame layout
//!
//! ```text
//!   fp + 84 + ...   arguments, first parameter lowest
//!   fp + 80         saved $ra (pushed by the caller)
//!   fp + 76 - 4i    saved pool register i
//!   fp + 4          caller's $fp
//!   fp - off        locals, growing down
//! ```

use std::collections::HashMap;

use crate::backend::mips::registers::TEMPORARIES;
use crate::frontend::ast::NodeId;
use crate::types::WORD;

/// Bytes taken by the saved pool registers
pub const SAVED_REGS: usize = TEMPORARIES.len() * WORD;

/// Offset of the caller's `$fp`
pub const OLD_FP: usize = WORD;

/// Where `$sp` sat when the callee was entered: just below the saved `$ra`
pub const ENTRY_SP: usize = SAVED_REGS + OLD_FP;

/// Distance from `$fp` to the first argument
pub const HEADER: usize = SAVED_REGS + WORD + WORD + WORD;

/// Offset of saved pool register `index`
pub fn saved_reg_offset(index: usize) -> usize {
    SAVED_REGS + OLD_FP - WORD * index
}

/// Frame position of a parameter or local
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameSlot {
    /// `off($fp)`, in the caller's frame
    Parameter(usize),
    /// `-off($fp)`, in the callee's frame
    Local(usize),
}

/// Slot assignment for one function at a time
#[derive(Debug, Default)]
pub struct FrameLayout {
    slots: HashMap<NodeId, FrameSlot>,
    /// Next free local offset; shared by every block of the function, so
    /// sibling blocks never reuse a slot
    next_local: usize,
}

impl FrameLayout {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new function
    pub fn reset(&mut self) {
        self.slots.clear();
        self.next_local = 0;
    }

    /// Lay out parameters in declaration order; each item is `(decl, slot size)`
    pub fn assign_params(&mut self, params: impl IntoIterator<Item = (NodeId, usize)>) {
        let mut offset = HEADER;
        for (id, size) in params {
            self.slots.insert(id, FrameSlot::Parameter(offset));
            offset += size;
        }
    }

    /// Reserve `size` bytes for a local and return its offset
    pub fn alloc_local(&mut self, id: NodeId, size: usize) -> usize {
        let offset = self.next_local;
        self.slots.insert(id, FrameSlot::Local(offset));
        self.next_local += size;
        offset
    }

    /// Bytes of locals reserved so far; `fp - next_local` is the first free word
    pub fn next_local(&self) -> usize {
        self.next_local
    }

    pub fn slot(&self, id: NodeId) -> Option<FrameSlot> {
        self.slots.get(&id).copied()
    }

    pub fn slots(&self) -> impl Iterator<Item = (NodeId, FrameSlot)> + '_ {
        self.slots.iter().map(|(id, slot)| (*id, *slot))
    }
}

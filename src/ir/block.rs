//! Basic blocks.

use crate::ir::{BlockId, Phi, Stmt, Terminator};

/// A basic block: PHI nodes, straight-line statements, one terminator.
///
/// `abnormal` lists extra successors reached through exceptional control
/// flow (a call that may unwind, for instance). The analysis treats them as
/// always taken when the block executes and never places assertions on them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub(crate) phis: Vec<Phi>,
    pub(crate) stmts: Vec<Stmt>,
    pub(crate) terminator: Terminator,
    pub(crate) abnormal: Vec<BlockId>,
    /// Created by splitting an edge to hold assertions.
    pub(crate) split: bool,
}

impl Block {
    pub(crate) fn new(terminator: Terminator) -> Self {
        Self {
            phis: Vec::new(),
            stmts: Vec::new(),
            terminator,
            abnormal: Vec::new(),
            split: false,
        }
    }

    /// PHI nodes at the head of the block.
    #[must_use]
    pub fn phis(&self) -> &[Phi] {
        &self.phis
    }

    /// Statements in execution order.
    #[must_use]
    pub fn stmts(&self) -> &[Stmt] {
        &self.stmts
    }

    /// The terminator.
    #[must_use]
    pub fn terminator(&self) -> &Terminator {
        &self.terminator
    }

    /// Exceptional successors.
    #[must_use]
    pub fn abnormal_successors(&self) -> &[BlockId] {
        &self.abnormal
    }

    /// Whether the block was created by edge splitting.
    #[must_use]
    pub fn is_split_block(&self) -> bool {
        self.split
    }
}

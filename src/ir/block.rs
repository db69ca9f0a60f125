//! Basic blocks, statements and terminators.

use super::arena::Id;
use super::tree::TreeId;

/// Block id.
pub type BlockId = Id<BasicBlock>;

/// Statement id.
pub type StmtId = Id<Stmt>;

/// A statement: one rooted expression tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub root: TreeId,
}

/// How control leaves a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Terminator {
    /// Continue with the lexically next block.
    FallThrough,
    /// Unconditional jump.
    Jump(BlockId),
    /// Branch to `target` when `cond` is non-zero, else fall through.
    CondJump { cond: TreeId, target: BlockId },
    /// Leave the method.
    Ret,
}

impl Terminator {
    /// Can control reach the lexically next block?
    #[inline]
    pub fn falls_through(&self) -> bool {
        matches!(self, Terminator::FallThrough | Terminator::CondJump { .. })
    }

    /// Explicit jump destination, if any.
    #[inline]
    pub fn jump_target(&self) -> Option<BlockId> {
        match *self {
            Terminator::Jump(target) => Some(target),
            Terminator::CondJump { target, .. } => Some(target),
            _ => None,
        }
    }
}

/// A basic block: statements in order plus the terminator.
#[derive(Debug, Clone, PartialEq)]
pub struct BasicBlock {
    pub stmts: Vec<StmtId>,
    pub preds: Vec<BlockId>,
    pub terminator: Terminator,
}

impl BasicBlock {
    pub fn new() -> Self {
        BasicBlock {
            stmts: Vec::new(),
            preds: Vec::new(),
            terminator: Terminator::FallThrough,
        }
    }
}

impl Default for BasicBlock {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Tests
// =============================================================================

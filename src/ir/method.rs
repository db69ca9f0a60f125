//! The per-method IR container.

use rustc_hash::FxHashMap;

use super::arena::Arena;
use super::block::{BasicBlock, BlockId, Stmt, StmtId};
use super::tree::{LclNum, SsaNum, Tree, TreeId, TreeKind, ValueType};
use crate::vn::ValueNum;

// =============================================================================
// Method
// =============================================================================

/// A method in tree-form SSA: blocks in program order, statements per
/// block, trees per statement, plus the SSA side tables the analyses need.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Method {
    pub(crate) trees: Arena<Tree>,
    pub(crate) stmts: Arena<Stmt>,
    pub(crate) blocks: Arena<BasicBlock>,
    /// Value number of each SSA name.
    pub(crate) ssa_values: FxHashMap<(LclNum, SsaNum), ValueNum>,
    /// Defined SSA version for the use-position target of a compound
    /// add-assignment.
    pub(crate) compound_defs: FxHashMap<TreeId, SsaNum>,
}

impl Method {
    pub fn new() -> Self {
        Method::default()
    }

    // =========================================================================
    // Access
    // =========================================================================

    #[inline]
    pub fn tree(&self, id: TreeId) -> &Tree {
        &self.trees[id]
    }

    #[inline]
    pub fn stmt(&self, id: StmtId) -> &Stmt {
        &self.stmts[id]
    }

    #[inline]
    pub fn block(&self, id: BlockId) -> &BasicBlock {
        &self.blocks[id]
    }

    #[inline]
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Blocks in program order.
    pub fn block_ids(&self) -> impl Iterator<Item = BlockId> {
        self.blocks.ids()
    }

    /// The lexical successor of a block, if any.
    pub fn next_block(&self, block: BlockId) -> Option<BlockId> {
        let next = block.index() + 1;
        if (next as usize) < self.blocks.len() {
            Some(BlockId::new(next))
        } else {
            None
        }
    }

    /// Value number of an SSA name, `NONE` if the name is unknown.
    pub fn ssa_value(&self, lcl: LclNum, ssa: SsaNum) -> ValueNum {
        self.ssa_values
            .get(&(lcl, ssa))
            .copied()
            .unwrap_or(ValueNum::NONE)
    }

    /// The SSA version defined by the use-position target of a compound
    /// add-assignment, `RESERVED` if none is recorded.
    pub fn ssa_num_for_compound_def(&self, tree: TreeId) -> SsaNum {
        self.compound_defs
            .get(&tree)
            .copied()
            .unwrap_or(SsaNum::RESERVED)
    }

    // =========================================================================
    // Walks
    // =========================================================================

    /// Visit every tree of a statement pre-order, with its parent.
    pub fn walk_stmt_preorder<F>(&self, stmt: StmtId, f: &mut F)
    where
        F: FnMut(TreeId, Option<TreeId>),
    {
        self.walk_tree_preorder(self.stmts[stmt].root, None, f);
    }

    fn walk_tree_preorder<F>(&self, tree: TreeId, parent: Option<TreeId>, f: &mut F)
    where
        F: FnMut(TreeId, Option<TreeId>),
    {
        f(tree, parent);
        for operand in self.trees[tree].operands() {
            self.walk_tree_preorder(operand, Some(tree), f);
        }
    }

    /// All bounds-check nodes in program order: block order, statement
    /// order, pre-order within the statement.
    pub fn bounds_check_sites(&self) -> Vec<(BlockId, StmtId, TreeId)> {
        let mut sites = Vec::new();
        for block in self.block_ids() {
            for &stmt in &self.blocks[block].stmts {
                self.walk_stmt_preorder(stmt, &mut |tree, _| {
                    if let TreeKind::BoundsCheck { .. } = self.trees[tree].kind {
                        sites.push((block, stmt, tree));
                    }
                });
            }
        }
        sites
    }

    // =========================================================================
    // Mutation
    // =========================================================================

    /// Remove a proven-redundant bounds check. The node becomes a `Nop`;
    /// this is the only IR mutation the optimizer performs.
    pub fn remove_bounds_check(&mut self, stmt: StmtId, tree: TreeId) {
        debug_assert!(self.stmts.get(stmt).is_some());
        debug_assert!(
            matches!(self.trees[tree].kind, TreeKind::BoundsCheck { .. }),
            "remove_bounds_check on a non-check node"
        );
        let node = &mut self.trees[tree];
        node.kind = TreeKind::Nop;
        node.ty = ValueType::Void;
        node.vn = ValueNum::NONE;
    }

    // =========================================================================
    // Verification
    // =========================================================================

    /// Structural consistency check: id validity, assignment targets,
    /// phi arguments against block predecessors, terminator targets.
    pub fn verify(&self) -> Result<(), VerifyError> {
        let tree_count = self.trees.len() as u32;
        for (id, tree) in self.trees.iter() {
            for operand in tree.operands() {
                if operand.index() >= tree_count {
                    return Err(VerifyError::DanglingTree { tree: id });
                }
            }
            match tree.kind {
                TreeKind::Assign { dst, .. } => {
                    if !matches!(self.trees[dst].kind, TreeKind::LclVar { .. }) {
                        return Err(VerifyError::BadAssignTarget { tree: id });
                    }
                }
                TreeKind::AssignAdd { dst, .. } => {
                    let ok = matches!(self.trees[dst].kind, TreeKind::LclVar { .. })
                        && !self.ssa_num_for_compound_def(dst).is_reserved();
                    if !ok {
                        return Err(VerifyError::BadAssignTarget { tree: id });
                    }
                }
                _ => {}
            }
        }

        for block in self.block_ids() {
            let data = &self.blocks[block];
            for &stmt in &data.stmts {
                if self.stmts.get(stmt).is_none() {
                    return Err(VerifyError::DanglingStmt { block });
                }
            }
            if let Some(target) = data.terminator.jump_target() {
                if target.index() as usize >= self.blocks.len() {
                    return Err(VerifyError::BadJumpTarget { block });
                }
            }
            // Every phi argument must name a predecessor of its block.
            for &stmt in &data.stmts {
                let root = self.stmts[stmt].root;
                if let TreeKind::Assign { src, .. } = self.trees[root].kind {
                    if let TreeKind::Phi { ref args } = self.trees[src].kind {
                        for &arg in args {
                            let pred = match self.trees[arg].kind {
                                TreeKind::PhiArg { pred, .. } => pred,
                                _ => return Err(VerifyError::BadPhiArg { phi: src }),
                            };
                            if !data.preds.contains(&pred) {
                                return Err(VerifyError::BadPhiArg { phi: src });
                            }
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

// =============================================================================
// Verify errors
// =============================================================================

/// Structural inconsistency found by [`Method::verify`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyError {
    DanglingTree { tree: TreeId },
    DanglingStmt { block: BlockId },
    BadAssignTarget { tree: TreeId },
    BadPhiArg { phi: TreeId },
    BadJumpTarget { block: BlockId },
}

impl std::fmt::Display for VerifyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VerifyError::DanglingTree { tree } => {
                write!(f, "tree {tree:?} references an out-of-range operand")
            }
            VerifyError::DanglingStmt { block } => {
                write!(f, "block {block:?} lists an out-of-range statement")
            }
            VerifyError::BadAssignTarget { tree } => {
                write!(f, "assignment {tree:?} does not target a local")
            }
            VerifyError::BadPhiArg { phi } => {
                write!(f, "phi {phi:?} argument does not match a predecessor")
            }
            VerifyError::BadJumpTarget { block } => {
                write!(f, "block {block:?} jumps to an out-of-range block")
            }
        }
    }
}

impl std::error::Error for VerifyError {}

// =============================================================================
// Tests
// =============================================================================

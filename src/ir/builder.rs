//! Method construction.
//!
//! `MethodBuilder` builds blocks, statements and trees, and value-numbers
//! everything as it goes: constants are interned, additions get function
//! value numbers (folding constant operands), array lengths are numbered
//! over the array's value, and compare trees whose shape matches one of the
//! recognized bound predicates get the corresponding bound-relation value
//! number so assertion sets can refer to them.
//!
//! SSA discipline is the caller's: every assignment allocates the next
//! version of its local, and phi definitions use a version reserved up
//! front (so body blocks can reference it before the phi itself is built).

use smallvec::SmallVec;

use super::block::{BasicBlock, BlockId, Stmt, StmtId, Terminator};
use super::method::Method;
use super::tree::{ArithOp, LclNum, RelOp, SsaNum, Tree, TreeId, TreeKind, ValueType};
use crate::vn::{ValueNum, ValueStore};

use rustc_hash::FxHashMap;

/// Builder for a [`Method`] and its [`ValueStore`].
#[derive(Debug)]
pub struct MethodBuilder {
    method: Method,
    values: ValueStore,
    next_ssa: FxHashMap<LclNum, u32>,
}

impl MethodBuilder {
    pub fn new() -> Self {
        MethodBuilder {
            method: Method::new(),
            values: ValueStore::new(),
            next_ssa: FxHashMap::default(),
        }
    }

    // =========================================================================
    // Blocks and terminators
    // =========================================================================

    /// Append a new block (fall-through terminator by default).
    pub fn block(&mut self) -> BlockId {
        self.method.blocks.alloc(BasicBlock::new())
    }

    pub fn jump(&mut self, block: BlockId, target: BlockId) {
        self.method.blocks[block].terminator = Terminator::Jump(target);
    }

    pub fn cond_jump(&mut self, block: BlockId, cond: TreeId, target: BlockId) {
        self.method.blocks[block].terminator = Terminator::CondJump { cond, target };
    }

    pub fn ret(&mut self, block: BlockId) {
        self.method.blocks[block].terminator = Terminator::Ret;
    }

    // =========================================================================
    // SSA names
    // =========================================================================

    /// Reserve the next SSA version of `lcl` with a fresh opaque value.
    /// Used for phi definitions, which are named before they are built.
    pub fn reserve_ssa(&mut self, lcl: LclNum) -> SsaNum {
        self.reserve_ssa_typed(lcl, ValueType::Int)
    }

    fn reserve_ssa_typed(&mut self, lcl: LclNum, ty: ValueType) -> SsaNum {
        let vn = self.values.fresh(ty);
        self.alloc_ssa(lcl, vn)
    }

    fn alloc_ssa(&mut self, lcl: LclNum, vn: ValueNum) -> SsaNum {
        let counter = self.next_ssa.entry(lcl).or_insert(SsaNum::FIRST.0);
        let ssa = SsaNum(*counter);
        *counter += 1;
        self.method.ssa_values.insert((lcl, ssa), vn);
        ssa
    }

    /// Declare an integer parameter. Parameters have no definition site.
    pub fn param_int(&mut self, lcl: LclNum) -> SsaNum {
        self.reserve_ssa_typed(lcl, ValueType::Int)
    }

    /// Declare a 64-bit integer parameter.
    pub fn param_long(&mut self, lcl: LclNum) -> SsaNum {
        self.reserve_ssa_typed(lcl, ValueType::Long)
    }

    /// Declare an array parameter.
    pub fn param_array(&mut self, lcl: LclNum) -> SsaNum {
        self.reserve_ssa_typed(lcl, ValueType::Ref)
    }

    // =========================================================================
    // Trees
    // =========================================================================

    fn tree(&mut self, kind: TreeKind, ty: ValueType, vn: ValueNum) -> TreeId {
        self.method.trees.alloc(Tree { kind, ty, vn })
    }

    pub fn const_int(&mut self, value: i32) -> TreeId {
        let vn = self.values.vn_for_int32(value);
        self.tree(TreeKind::ConstInt(value), ValueType::Int, vn)
    }

    pub fn const_long(&mut self, value: i64) -> TreeId {
        let vn = self.values.vn_for_int64(value);
        self.tree(TreeKind::ConstLong(value), ValueType::Long, vn)
    }

    /// A use of an existing SSA name.
    pub fn use_lcl(&mut self, lcl: LclNum, ssa: SsaNum) -> TreeId {
        let vn = self.method.ssa_value(lcl, ssa);
        debug_assert!(!vn.is_none(), "use of an undeclared SSA name");
        let ty = self.values.type_of(vn);
        self.tree(TreeKind::LclVar { lcl, ssa }, ty, vn)
    }

    pub fn add(&mut self, lhs: TreeId, rhs: TreeId) -> TreeId {
        let vn = self
            .values
            .vn_for_add(self.method.trees[lhs].vn, self.method.trees[rhs].vn);
        self.tree(TreeKind::Add { lhs, rhs }, ValueType::Int, vn)
    }

    /// Array length of `arr`.
    pub fn arr_len(&mut self, arr: TreeId) -> TreeId {
        let vn = self.values.vn_for_arr_len(self.method.trees[arr].vn);
        self.tree(TreeKind::ArrLen { arr }, ValueType::Int, vn)
    }

    /// Array allocation. A constant length registers the allocation size
    /// with the value store.
    pub fn new_arr(&mut self, len: TreeId) -> TreeId {
        let vn = self.values.fresh(ValueType::Ref);
        if let TreeKind::ConstInt(size) = self.method.trees[len].kind {
            self.values.set_new_arr_size(vn, size);
        }
        self.tree(TreeKind::NewArr { len }, ValueType::Ref, vn)
    }

    /// Relational compare. Shapes the assertion machinery understands are
    /// value-numbered as bound relations:
    /// `x relop c`, `x relop arr.len`, `x relop arr.len + c`.
    pub fn cmp(&mut self, op: RelOp, lhs: TreeId, rhs: TreeId) -> TreeId {
        let lhs_vn = self.method.trees[lhs].vn;
        let vn = self
            .bound_vn(op, lhs_vn, rhs)
            .unwrap_or_else(|| self.values.fresh(ValueType::Int));
        self.tree(TreeKind::Cmp { op, lhs, rhs }, ValueType::Int, vn)
    }

    fn bound_vn(&mut self, op: RelOp, lhs_vn: ValueNum, rhs: TreeId) -> Option<ValueNum> {
        let rhs_tree = self.method.trees[rhs].clone();
        if let Some(c) = self.values.const_int32(rhs_tree.vn) {
            return Some(self.values.vn_for_constant_bound(lhs_vn, op, c));
        }
        if self.values.is_arr_len(rhs_tree.vn) {
            let array = self.values.array_of_arr_len(rhs_tree.vn);
            return Some(self.values.vn_for_arr_len_bound(lhs_vn, op, array));
        }
        // arr.len + c / arr.len - c, written as an addition with a
        // possibly negative constant.
        if let TreeKind::Add { lhs: al, rhs: ar } = rhs_tree.kind {
            let len_vn = self.method.trees[al].vn;
            let cns_vn = self.method.trees[ar].vn;
            if self.values.is_arr_len(len_vn) {
                if let Some(c) = self.values.const_int32(cns_vn) {
                    let array = self.values.array_of_arr_len(len_vn);
                    let (oper, magnitude) = if c < 0 {
                        (ArithOp::Sub, c.checked_neg()?)
                    } else {
                        (ArithOp::Add, c)
                    };
                    let arr_op = self.values.vn_for_int32(magnitude);
                    return Some(
                        self.values
                            .vn_for_arr_len_arith_bound(lhs_vn, op, array, oper, arr_op),
                    );
                }
            }
        }
        None
    }

    // =========================================================================
    // Statements
    // =========================================================================

    fn append_stmt(&mut self, block: BlockId, root: TreeId) -> StmtId {
        let stmt = self.method.stmts.alloc(Stmt { root });
        self.method.blocks[block].stmts.push(stmt);
        stmt
    }

    /// `lcl = src`, defining the next SSA version of `lcl`. The defined
    /// name takes the value number of the right-hand side.
    pub fn assign(&mut self, block: BlockId, lcl: LclNum, src: TreeId) -> SsaNum {
        let vn = self.method.trees[src].vn;
        let ty = self.method.trees[src].ty;
        let ssa = self.alloc_ssa(lcl, vn);
        let dst = self.tree(TreeKind::LclVar { lcl, ssa }, ty, vn);
        let root = self.tree(TreeKind::Assign { dst, src }, ValueType::Void, ValueNum::NONE);
        self.append_stmt(block, root);
        ssa
    }

    /// `lcl += src` as a compound use-then-assign. `use_ssa` is the
    /// incoming version; the defined version is recorded in the method's
    /// compound-def side table and returned.
    pub fn assign_add(
        &mut self,
        block: BlockId,
        lcl: LclNum,
        use_ssa: SsaNum,
        src: TreeId,
    ) -> SsaNum {
        let use_vn = self.method.ssa_value(lcl, use_ssa);
        let def_vn = self.values.vn_for_add(use_vn, self.method.trees[src].vn);
        let dst = self.tree(TreeKind::LclVar { lcl, ssa: use_ssa }, ValueType::Int, use_vn);
        let def_ssa = self.alloc_ssa(lcl, def_vn);
        self.method.compound_defs.insert(dst, def_ssa);
        let root = self.tree(
            TreeKind::AssignAdd { dst, src },
            ValueType::Void,
            ValueNum::NONE,
        );
        self.append_stmt(block, root);
        def_ssa
    }

    /// `def_ssa = phi(args)` at the head of `block`. `def_ssa` must have
    /// been reserved with [`MethodBuilder::reserve_ssa`].
    pub fn phi(
        &mut self,
        block: BlockId,
        lcl: LclNum,
        def_ssa: SsaNum,
        args: &[(SsaNum, BlockId)],
    ) -> TreeId {
        let mut arg_trees: SmallVec<[TreeId; 2]> = SmallVec::new();
        for &(ssa, pred) in args {
            let vn = self.method.ssa_value(lcl, ssa);
            arg_trees.push(self.tree(TreeKind::PhiArg { lcl, ssa, pred }, ValueType::Int, vn));
        }
        let def_vn = self.method.ssa_value(lcl, def_ssa);
        debug_assert!(!def_vn.is_none(), "phi definition was not reserved");
        let phi = self.tree(TreeKind::Phi { args: arg_trees }, ValueType::Int, def_vn);
        let dst = self.tree(
            TreeKind::LclVar {
                lcl,
                ssa: def_ssa,
            },
            ValueType::Int,
            def_vn,
        );
        let root = self.tree(
            TreeKind::Assign { dst, src: phi },
            ValueType::Void,
            ValueNum::NONE,
        );
        self.append_stmt(block, root);
        phi
    }

    /// Bounds check of `index` against `len`, as its own statement.
    pub fn bounds_check(&mut self, block: BlockId, index: TreeId, len: TreeId) -> TreeId {
        let root = self.tree(
            TreeKind::BoundsCheck { index, len },
            ValueType::Void,
            ValueNum::NONE,
        );
        self.append_stmt(block, root);
        root
    }

    // =========================================================================
    // Finish
    // =========================================================================

    /// Compute predecessor lists and hand out the finished method.
    pub fn finish(mut self) -> (Method, ValueStore) {
        let count = self.method.blocks.len() as u32;
        for index in 0..count {
            let block = BlockId::new(index);
            let terminator = self.method.blocks[block].terminator;
            if terminator.falls_through() && index + 1 < count {
                self.method.blocks[BlockId::new(index + 1)].preds.push(block);
            }
            if let Some(target) = terminator.jump_target() {
                self.method.blocks[target].preds.push(block);
            }
        }
        debug_assert!(self.method.verify().is_ok(), "builder produced bad IR");
        (self.method, self.values)
    }
}

// =============================================================================
// Tests
// =============================================================================

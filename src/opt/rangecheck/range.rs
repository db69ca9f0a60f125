//! The range-inference engine.
//!
//! Computes a symbolic [`Range`] for an IR expression by recursing over
//! the def-use graph: constants are themselves, a local's range is its
//! definition's, an addition adds operand ranges, and a phi merges its
//! arguments. A node reached again while already on the search path gets
//! `Dependent` and relies on edge assertions; that is what terminates
//! phi cycles.
//!
//! Results are memoized per check in the range cache. Each newly entered
//! node spends one unit of the pass-wide visit budget; over budget (or
//! past the depth cap, or for 64-bit types) the engine answers `Unknown`,
//! which is lattice top and stops enclosing searches as well.

use log::trace;

use super::limit::{Limit, Range, RangeOps};
use super::{RangeAnalyzer, SearchPath, MAX_SEARCH_DEPTH};
use crate::ir::{BlockId, StmtId, TreeId, TreeKind};

impl RangeAnalyzer<'_> {
    /// Cached range if present, else compute and cache.
    pub(crate) fn get_range(
        &mut self,
        block: BlockId,
        stmt: StmtId,
        expr: TreeId,
        path: &mut SearchPath,
        monotonic: bool,
    ) -> Range {
        if let Some(&cached) = self.range_cache.get(&expr) {
            trace!("range of {expr:?} (cached): {cached}");
            return cached;
        }
        let range = self.compute_range(block, stmt, expr, path, monotonic);
        trace!("range of {expr:?}: {range}");
        range
    }

    fn compute_range(
        &mut self,
        block: BlockId,
        stmt: StmtId,
        expr: TreeId,
        path: &mut SearchPath,
        monotonic: bool,
    ) -> Range {
        let newly_added = path.insert(expr);
        if newly_added {
            // A node that was resolved and cached while off the path must
            // come from the cache, not be recomputed.
            debug_assert!(
                !self.range_cache.contains_key(&expr),
                "re-entered resolved node {expr:?}"
            );
            self.spend_budget();
        }

        let method = self.method;
        let tree = method.tree(expr);
        let vn = tree.vn;

        let range = if self.over_budget() {
            trace!("range of {expr:?} not tractable within the visit budget");
            Range::single(Limit::Unknown)
        } else if path.len() > MAX_SEARCH_DEPTH {
            trace!("range of {expr:?} not tractable within the depth cap");
            Range::single(Limit::Unknown)
        } else if tree.ty.is_64bit() {
            // No reasoning about 64-bit quantities.
            Range::single(Limit::Unknown)
        } else if self.values.is_constant(vn) {
            match self.values.const_int32(vn) {
                Some(value) => Range::single(Limit::Constant(value)),
                None => Range::single(Limit::Unknown),
            }
        } else if tree.is_local() {
            let mut range = self.compute_range_for_local(block, stmt, expr, path, monotonic);
            self.merge_assertion(block, expr, &mut range);
            range
        } else if let TreeKind::Add { lhs, rhs } = tree.kind {
            self.compute_range_for_binop(block, stmt, lhs, rhs, path, monotonic)
        } else if matches!(tree.kind, TreeKind::Phi { .. }) {
            self.compute_range_for_phi(block, stmt, expr, path, monotonic)
        } else {
            // Unrecognized expression kind.
            Range::single(Limit::Unknown)
        };

        self.range_cache.insert(expr, range);
        path.remove(expr);
        range
    }

    /// Range of an SSA local: the range of its definition's right-hand
    /// side, tightened by the querying block's incoming assertions.
    fn compute_range_for_local(
        &mut self,
        block: BlockId,
        _stmt: StmtId,
        expr: TreeId,
        path: &mut SearchPath,
        monotonic: bool,
    ) -> Range {
        let method = self.method;
        let assertions = self.assertions;
        let Some((lcl, ssa)) = method.tree(expr).local() else {
            return Range::single(Limit::Unknown);
        };
        let Some(def) = self.get_def(lcl, ssa) else {
            // No reaching definition in this method (parameter or
            // untrusted input); only assertions can bound it.
            return Range::single(Limit::Unknown);
        };
        match method.tree(def.parent).kind {
            TreeKind::Assign { dst, src } => {
                let mut range = self.get_range(def.block, def.stmt, src, path, monotonic);
                self.merge_edge_assertions(dst, assertions.assertions_in(block.as_usize()), &mut range);
                range
            }
            TreeKind::AssignAdd { dst, src } => {
                // Both operands of a compound add are uses.
                self.compute_range_for_binop(def.block, def.stmt, dst, src, path, monotonic)
            }
            _ => Range::single(Limit::Unknown),
        }
    }

    fn compute_range_for_binop(
        &mut self,
        block: BlockId,
        stmt: StmtId,
        op1: TreeId,
        op2: TreeId,
        path: &mut SearchPath,
        monotonic: bool,
    ) -> Range {
        let r1 = self.operand_range(block, stmt, op1, path, monotonic);
        let r2 = self.operand_range(block, stmt, op2, path, monotonic);
        let result = RangeOps::add(&r1, &r2);
        trace!("add ranges {r1} + {r2} = {result}");
        result
    }

    fn operand_range(
        &mut self,
        block: BlockId,
        stmt: StmtId,
        op: TreeId,
        path: &mut SearchPath,
        monotonic: bool,
    ) -> Range {
        if let Some(&cached) = self.range_cache.get(&op) {
            return cached;
        }
        let mut range = if !path.contains(op) {
            self.get_range(block, stmt, op, path, monotonic)
        } else {
            // Already being computed along this path; only assertions
            // can say anything about it here.
            Range::single(Limit::Dependent)
        };
        self.merge_assertion(block, op, &mut range);
        range
    }

    /// Merge the ranges of all phi arguments, calling an argument that is
    /// already on the path `Dependent`.
    fn compute_range_for_phi(
        &mut self,
        block: BlockId,
        stmt: StmtId,
        expr: TreeId,
        path: &mut SearchPath,
        monotonic: bool,
    ) -> Range {
        let args = match &self.method.tree(expr).kind {
            TreeKind::Phi { args } => args.clone(),
            _ => return Range::single(Limit::Unknown),
        };
        let mut range = Range::single(Limit::Undef);
        for arg in args {
            let mut arg_range = if path.contains(arg) {
                trace!("phi argument {arg:?} is already being computed");
                Range::single(Limit::Dependent)
            } else {
                self.get_range(block, stmt, arg, path, monotonic)
            };
            self.merge_assertion(block, arg, &mut arg_range);
            debug_assert!(!arg_range.lower.is_undef() && !arg_range.upper.is_undef());
            range = RangeOps::merge(&range, &arg_range, monotonic);
            trace!("phi merge -> {range}");
        }
        range
    }
}

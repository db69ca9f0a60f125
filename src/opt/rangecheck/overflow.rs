//! The overflow engine.
//!
//! A recursion parallel to the range engine, with its own memo table,
//! deciding whether the arithmetic producing an expression may wrap
//! 32-bit signed integers. Only upper limits are sampled: the question is
//! whether the computed index can exceed `i32::MAX`, never whether it can
//! underflow (a negative index fails the bounds decision anyway).

use log::trace;

use super::limit::Limit;
use super::{RangeAnalyzer, SearchPath, ARRLEN_MAX, MAX_SEARCH_DEPTH};
use crate::ir::{BlockId, StmtId, TreeId, TreeKind};

impl RangeAnalyzer<'_> {
    /// Cached verdict if present, else compute and cache.
    pub(crate) fn does_overflow(
        &mut self,
        block: BlockId,
        stmt: StmtId,
        expr: TreeId,
        path: &mut SearchPath,
    ) -> bool {
        if let Some(&overflows) = self.overflow_cache.get(&expr) {
            return overflows;
        }
        self.compute_does_overflow(block, stmt, expr, path)
    }

    fn compute_does_overflow(
        &mut self,
        block: BlockId,
        stmt: StmtId,
        expr: TreeId,
        path: &mut SearchPath,
    ) -> bool {
        path.insert(expr);
        let method = self.method;
        let tree = method.tree(expr);
        let vn = tree.vn;

        let overflows = if path.len() > MAX_SEARCH_DEPTH {
            true
        } else if self.values.is_constant(vn) {
            false
        } else if tree.is_local() {
            self.does_var_def_overflow(expr, path)
        } else if let TreeKind::Add { lhs, rhs } = tree.kind {
            self.does_binop_overflow(block, stmt, lhs, rhs, path)
        } else if matches!(tree.kind, TreeKind::Phi { .. }) {
            self.does_phi_overflow(block, stmt, expr, path)
        } else {
            true
        };

        self.overflow_cache.insert(expr, overflows);
        path.remove(expr);
        overflows
    }

    fn does_var_def_overflow(&mut self, expr: TreeId, path: &mut SearchPath) -> bool {
        let method = self.method;
        let Some((lcl, ssa)) = method.tree(expr).local() else {
            return true;
        };
        let Some(def) = self.get_def(lcl, ssa) else {
            // No definition in this method: the value is an input,
            // produced by no arithmetic we can see.
            return false;
        };
        match method.tree(def.parent).kind {
            TreeKind::Assign { src, .. } => self.does_overflow(def.block, def.stmt, src, path),
            TreeKind::AssignAdd { dst, src } => {
                self.does_binop_overflow(def.block, def.stmt, dst, src, path)
            }
            _ => true,
        }
    }

    fn does_binop_overflow(
        &mut self,
        block: BlockId,
        stmt: StmtId,
        op1: TreeId,
        op2: TreeId,
        path: &mut SearchPath,
    ) -> bool {
        if !path.contains(op1) && self.does_overflow(block, stmt, op1, path) {
            return true;
        }
        if !path.contains(op2) && self.does_overflow(block, stmt, op2, path) {
            return true;
        }

        // The range engine has already run; an operand it never resolved
        // is conservatively overflowing.
        let Some(mut r1) = self.range_cache.get(&op1).copied() else {
            return true;
        };
        let Some(mut r2) = self.range_cache.get(&op2).copied() else {
            return true;
        };

        // A Dependent upper limit may still be pinned down by assertions.
        if r1.upper.is_dependent() {
            self.merge_assertion(block, op1, &mut r1);
            self.range_cache.insert(op1, r1);
        }
        if r2.upper.is_dependent() {
            self.merge_assertion(block, op2, &mut r2);
            self.range_cache.insert(op2, r2);
        }

        trace!("overflow check on {} + {}", r1, r2);
        self.add_overflows(&r1.upper, &r2.upper)
    }

    fn does_phi_overflow(
        &mut self,
        block: BlockId,
        stmt: StmtId,
        expr: TreeId,
        path: &mut SearchPath,
    ) -> bool {
        let args = match &self.method.tree(expr).kind {
            TreeKind::Phi { args } => args.clone(),
            _ => return true,
        };
        for arg in args {
            if path.contains(arg) {
                continue;
            }
            if self.does_overflow(block, stmt, arg, path) {
                return true;
            }
        }
        false
    }

    /// Whether `limit1 + limit2` can exceed `i32::MAX`, sampling each
    /// limit at its maximum possible value.
    pub(crate) fn add_overflows(&self, limit1: &Limit, limit2: &Limit) -> bool {
        let (Some(max1), Some(max2)) = (self.limit_max(limit1), self.limit_max(limit2)) else {
            return true;
        };
        max1.checked_add(max2).is_none()
    }

    /// Maximum value a limit can take. An array length with no known
    /// allocation size is pessimized to `ARRLEN_MAX`.
    fn limit_max(&self, limit: &Limit) -> Option<i32> {
        match *limit {
            Limit::Constant(value) => Some(value),
            Limit::Array(array) => {
                let mut len = self.arr_length(array);
                if len <= 0 {
                    len = ARRLEN_MAX;
                }
                Some(len)
            }
            Limit::BinOpArray(array, cns) => {
                let mut len = self.arr_length(array);
                if len <= 0 {
                    len = ARRLEN_MAX;
                }
                len.checked_add(cns)
            }
            Limit::SsaVar(vn) => self.values.const_int32(vn),
            Limit::BinOp(vn, cns) => self.values.const_int32(vn)?.checked_add(cns),
            _ => None,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

//! The monotonicity prover.
//!
//! Decides whether an expression is non-decreasing along its definition
//! chain: constants qualify, `x + c` qualifies for `c >= 0` when `x`
//! does, and a phi qualifies when every argument does. A node already on
//! the search path is assumed safe; the caller re-checks the cycle by
//! recomputing the range under the liberal merge rule.
//!
//! Path entries are released on every exit, success or failure.

use log::trace;

use super::{RangeAnalyzer, SearchPath, MAX_SEARCH_DEPTH};
use crate::ir::{TreeId, TreeKind};

impl RangeAnalyzer<'_> {
    pub(crate) fn is_monotonically_increasing(
        &mut self,
        expr: TreeId,
        path: &mut SearchPath,
    ) -> bool {
        if path.contains(expr) {
            return true;
        }
        path.insert(expr);
        let result = self.monotonic_step(expr, path);
        path.remove(expr);
        result
    }

    fn monotonic_step(&mut self, expr: TreeId, path: &mut SearchPath) -> bool {
        let method = self.method;
        let tree = method.tree(expr);

        if path.len() > MAX_SEARCH_DEPTH {
            return false;
        }
        // A constant is not part of the dependency cycle that has to
        // grow.
        if self.values.is_constant(tree.vn) {
            return true;
        }
        if tree.is_local() {
            let Some((lcl, ssa)) = tree.local() else {
                return false;
            };
            let Some(def) = self.get_def(lcl, ssa) else {
                return false;
            };
            return match method.tree(def.parent).kind {
                TreeKind::Assign { src, .. } => self.is_monotonically_increasing(src, path),
                TreeKind::AssignAdd { dst, src } => {
                    self.is_binop_monotonically_increasing(dst, src, path)
                }
                _ => {
                    trace!("unknown definition kind for {expr:?}");
                    false
                }
            };
        }
        match tree.kind {
            TreeKind::Add { lhs, rhs } => self.is_binop_monotonically_increasing(lhs, rhs, path),
            TreeKind::Phi { ref args } => {
                for &arg in args.clone().iter() {
                    if path.contains(arg) {
                        continue;
                    }
                    if !self.is_monotonically_increasing(arg, path) {
                        trace!("phi argument {arg:?} is not monotonic");
                        return false;
                    }
                }
                true
            }
            _ => false,
        }
    }

    /// `op1 + op2` is non-decreasing when it is local + local with both
    /// monotonic, or local + non-negative constant with the local
    /// monotonic.
    fn is_binop_monotonically_increasing(
        &mut self,
        op1: TreeId,
        op2: TreeId,
        path: &mut SearchPath,
    ) -> bool {
        let method = self.method;
        let (op1, op2) = if method.tree(op2).is_local() {
            (op2, op1)
        } else {
            (op1, op2)
        };
        if !method.tree(op1).is_local() {
            trace!("not monotonic: neither addend is a local");
            return false;
        }
        match method.tree(op2).kind {
            TreeKind::LclVar { .. } | TreeKind::PhiArg { .. } => {
                self.is_monotonically_increasing(op1, path)
                    && self.is_monotonically_increasing(op2, path)
            }
            TreeKind::ConstInt(value) => {
                value >= 0 && self.is_monotonically_increasing(op1, path)
            }
            _ => false,
        }
    }
}

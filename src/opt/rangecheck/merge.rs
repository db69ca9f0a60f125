//! Edge-assertion merging.
//!
//! Tightens an in-flight [`Range`] with the predicates assertion
//! propagation attached to incoming control-flow edges. Only three
//! predicate shapes are understood, all compared against zero:
//!
//! - `i relop constant`
//! - `i relop arr.len`
//! - `i relop arr.len +/- constant`
//!
//! A `pred == 0` assertion is the predicate known false, so its relation
//! is reversed before use. Strict compares are shifted by one to make
//! both bounds inclusive; a shift that would wrap 32-bit discards the
//! assertion.

use log::trace;

use super::limit::{Limit, Range};
use super::RangeAnalyzer;
use crate::assertions::AssertionKind;
use crate::ir::arena::BitSet;
use crate::ir::{ArithOp, BlockId, RelOp, TreeId, TreeKind, ValueType};
use crate::vn::ValueNum;

impl RangeAnalyzer<'_> {
    /// Merge the assertion set reaching `op` into `range`.
    ///
    /// A phi argument uses the predecessor's edge-out set (fall-through
    /// or taken-branch, by terminator shape); a plain local uses the
    /// querying block's edge-in set.
    pub(crate) fn merge_assertion(&self, block: BlockId, op: TreeId, range: &mut Range) {
        let method = self.method;
        let assertions = self.assertions;
        let set: &BitSet = match method.tree(op).kind {
            TreeKind::PhiArg { pred, .. } => {
                let terminator = method.block(pred).terminator;
                if terminator.falls_through() && method.next_block(pred) == Some(block) {
                    assertions.out_fallthrough(pred.as_usize())
                } else if terminator.jump_target() == Some(block) {
                    assertions.out_true_branch(pred.as_usize())
                } else {
                    return;
                }
            }
            TreeKind::LclVar { .. } => assertions.assertions_in(block.as_usize()),
            _ => return,
        };
        if set.is_empty() {
            return;
        }
        self.merge_edge_assertions(op, set, range);
    }

    /// Apply every recognized assertion about `lcl_tree`'s value number.
    pub(crate) fn merge_edge_assertions(&self, lcl_tree: TreeId, set: &BitSet, range: &mut Range) {
        let method = self.method;
        let values = self.values;
        let assertions = self.assertions;

        let Some((lcl, ssa)) = method.tree(lcl_tree).local() else {
            return;
        };
        if ssa.is_reserved() {
            return;
        }
        let lcl_vn = method.ssa_value(lcl, ssa);
        let zero = values.zero_vn(ValueType::Int);

        for index in set.iter() {
            let assertion = assertions.get(index);
            let relation = assertion.op1_vn;

            let mut limit;
            let mut cmp_oper;
            if let Some(info) = values.arr_len_arith_bound_info(relation) {
                if info.cmp_op != lcl_vn {
                    continue;
                }
                // The operand applied to the length must be a 32-bit
                // constant for the limit to be expressible.
                limit = Limit::Undef;
                if let Some(cns) = values.const_int32(info.arr_op) {
                    let signed = match info.arr_oper {
                        ArithOp::Add => Some(cns),
                        ArithOp::Sub => cns.checked_neg(),
                    };
                    if let Some(offset) = signed {
                        limit = Limit::BinOpArray(info.vn_array, offset);
                    }
                }
                cmp_oper = info.cmp_oper;
            } else if let Some(info) = values.arr_len_bound_info(relation) {
                if info.cmp_op != lcl_vn {
                    continue;
                }
                limit = Limit::Array(info.vn_array);
                cmp_oper = info.cmp_oper;
            } else if let Some(info) = values.constant_bound_info(relation) {
                if info.cmp_op != lcl_vn {
                    continue;
                }
                limit = Limit::Constant(info.const_val);
                cmp_oper = info.cmp_oper;
            } else {
                continue;
            }
            if limit.is_undef() {
                continue;
            }

            // Only predicates tested against zero are understood.
            if assertion.op2_vn != zero {
                continue;
            }

            // (i < n) == 0 is i >= n.
            if assertion.kind == AssertionKind::Equal {
                cmp_oper = cmp_oper.reverse();
            }

            // Bounds are inclusive: shift strict compares by one.
            if cmp_oper == RelOp::Lt && !limit.add_constant(-1) {
                continue;
            }
            if cmp_oper == RelOp::Gt && !limit.add_constant(1) {
                continue;
            }

            match cmp_oper {
                RelOp::Lt | RelOp::Le => {
                    if Self::tightens(&range.upper, &limit, self.cur_arr_ref, true) {
                        range.upper = limit;
                        trace!("assertion #{index} tightened upper to {limit}");
                    }
                }
                RelOp::Gt | RelOp::Ge => {
                    if Self::tightens(&range.lower, &limit, self.cur_arr_ref, false) {
                        range.lower = limit;
                        trace!("assertion #{index} tightened lower to {limit}");
                    }
                }
                _ => {}
            }
        }
    }

    /// Would replacing `current` with `incoming` demonstrably tighten the
    /// bound? `upper` selects the direction of improvement.
    fn tightens(current: &Limit, incoming: &Limit, arr_ref: ValueNum, upper: bool) -> bool {
        match *current {
            // A constant bound yields to a tighter constant, or to any
            // bound on the check's own array; other quantities are not
            // comparable with it.
            Limit::Constant(cur) => match *incoming {
                Limit::Constant(inc) => {
                    if upper {
                        inc < cur
                    } else {
                        inc > cur
                    }
                }
                _ => !arr_ref.is_none() && incoming.vn() == arr_ref,
            },
            // A bound already on the check's array only yields to a
            // strictly better offset on the same array.
            Limit::Array(_) | Limit::BinOpArray(..) if current.vn() == arr_ref => {
                if incoming.vn() != arr_ref {
                    return false;
                }
                let (cur, inc) = (current.constant(), incoming.constant());
                if upper {
                    inc < cur
                } else {
                    inc > cur
                }
            }
            // Dependent, Unknown, or a bound on some unrelated quantity:
            // the incoming dominating fact is an improvement.
            _ => true,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn vn(raw: u32) -> ValueNum {
        // Distinct opaque value numbers for form comparisons.
        let mut store = crate::vn::ValueStore::new();
        let mut last = store.fresh(ValueType::Ref);
        for _ in 0..raw {
            last = store.fresh(ValueType::Ref);
        }
        last
    }

    #[test]
    fn test_tightens_replaces_lattice_elements() {
        let a = vn(0);
        for current in [Limit::Dependent, Limit::Unknown, Limit::Undef] {
            assert!(RangeAnalyzer::tightens(
                &current,
                &Limit::BinOpArray(a, -1),
                a,
                true
            ));
            assert!(RangeAnalyzer::tightens(&current, &Limit::Constant(0), a, false));
        }
    }

    #[test]
    fn test_tightens_constant_vs_constant_is_directional() {
        let none = ValueNum::NONE;
        assert!(RangeAnalyzer::tightens(
            &Limit::Constant(5),
            &Limit::Constant(3),
            none,
            true
        ));
        assert!(!RangeAnalyzer::tightens(
            &Limit::Constant(3),
            &Limit::Constant(5),
            none,
            true
        ));
        assert!(!RangeAnalyzer::tightens(
            &Limit::Constant(3),
            &Limit::Constant(3),
            none,
            true
        ));
        // Lower bounds improve upward.
        assert!(RangeAnalyzer::tightens(
            &Limit::Constant(3),
            &Limit::Constant(5),
            none,
            false
        ));
    }

    #[test]
    fn test_tightens_constant_accepts_own_array_bound() {
        let a = vn(1);
        assert!(RangeAnalyzer::tightens(
            &Limit::Constant(0),
            &Limit::BinOpArray(a, -1),
            a,
            true
        ));
        // But not a bound on a different array, and not when the check
        // has no array at all.
        let b = vn(2);
        assert!(!RangeAnalyzer::tightens(
            &Limit::Constant(0),
            &Limit::BinOpArray(b, -1),
            a,
            true
        ));
        assert!(!RangeAnalyzer::tightens(
            &Limit::Constant(0),
            &Limit::BinOpArray(a, -1),
            ValueNum::NONE,
            true
        ));
    }

    #[test]
    fn test_tightens_same_array_needs_strictly_better_offset() {
        let a = vn(1);
        let current = Limit::BinOpArray(a, -1);
        assert!(RangeAnalyzer::tightens(
            &current,
            &Limit::BinOpArray(a, -2),
            a,
            true
        ));
        assert!(!RangeAnalyzer::tightens(
            &current,
            &Limit::BinOpArray(a, -1),
            a,
            true
        ));
        assert!(!RangeAnalyzer::tightens(
            &current,
            &Limit::Array(a),
            a,
            true
        ));
        // Constant incoming does not displace an own-array bound.
        assert!(!RangeAnalyzer::tightens(&current, &Limit::Constant(3), a, true));
    }

    #[test]
    fn test_tightens_foreign_array_current_is_replaceable() {
        let a = vn(1);
        let other = vn(2);
        assert!(RangeAnalyzer::tightens(
            &Limit::BinOpArray(other, -1),
            &Limit::BinOpArray(a, -1),
            a,
            true
        ));
    }
}

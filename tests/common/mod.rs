#![allow(dead_code)]
//! Shared IR fixtures for the bounds-check elimination suites.
//!
//! Loop fixtures all share one skeleton (jump-to-test form, the shape the
//! bytecode front end produces for `while` loops):
//!
//! ```text
//! B0: init                    -> jump B2
//! B1: check a[index]; step    -> jump B2      (body)
//! B2: i = phi(B0: i0, B1: i2); if cond -> B1  (test)
//! B3: ret
//! ```
//!
//! The loop-guard predicate is attached the way assertion propagation
//! would: on B2's taken branch and on entry to the body.

use kestrel_jit::assertions::{Assertion, AssertionKind, AssertionStore};
use kestrel_jit::ir::{LclNum, Method, MethodBuilder, RelOp, TreeId, ValueType};
use kestrel_jit::vn::ValueStore;

pub const ARRAY: LclNum = 0;
pub const INDEX: LclNum = 1;

/// Initial value of the induction variable.
#[derive(Clone, Copy)]
pub enum LoopInit {
    Zero,
    LenMinusOne,
}

/// Loop guard, tested in B2.
#[derive(Clone, Copy)]
pub enum LoopCond {
    /// i < a.len
    LtLen,
    /// i < a.len - 1
    LtLenMinusOne,
    /// i < a.len + 1
    LtLenPlusOne,
    /// i >= 0
    GeZero,
}

/// Index expression of the checked access.
#[derive(Clone, Copy)]
pub enum LoopIndex {
    I,
    IPlusOne,
}

/// Induction step in the body.
#[derive(Clone, Copy)]
pub enum LoopStep {
    PlusOne,
    MinusOne,
    /// `i += 1` as a compound use-then-assign.
    CompoundPlusOne,
}

pub struct Fixture {
    pub method: Method,
    pub values: ValueStore,
    pub assertions: AssertionStore,
    /// The bounds-check nodes, in program order.
    pub checks: Vec<TreeId>,
}

pub fn build_loop(init: LoopInit, cond: LoopCond, index: LoopIndex, step: LoopStep) -> Fixture {
    let mut b = MethodBuilder::new();
    let b0 = b.block();
    let b1 = b.block();
    let b2 = b.block();
    let b3 = b.block();

    let a1 = b.param_array(ARRAY);

    // B0: i0 = <init>
    let init_tree = match init {
        LoopInit::Zero => b.const_int(0),
        LoopInit::LenMinusOne => {
            let a_use = b.use_lcl(ARRAY, a1);
            let len = b.arr_len(a_use);
            let minus_one = b.const_int(-1);
            b.add(len, minus_one)
        }
    };
    let i0 = b.assign(b0, INDEX, init_tree);
    b.jump(b0, b2);

    // B1: check a[<index>]; i2 = i1 <step>
    let i1 = b.reserve_ssa(INDEX);
    let index_tree = match index {
        LoopIndex::I => b.use_lcl(INDEX, i1),
        LoopIndex::IPlusOne => {
            let i_use = b.use_lcl(INDEX, i1);
            let one = b.const_int(1);
            b.add(i_use, one)
        }
    };
    let a_use = b.use_lcl(ARRAY, a1);
    let len_tree = b.arr_len(a_use);
    let check = b.bounds_check(b1, index_tree, len_tree);
    let i2 = match step {
        LoopStep::PlusOne => {
            let i_use = b.use_lcl(INDEX, i1);
            let one = b.const_int(1);
            let next = b.add(i_use, one);
            b.assign(b1, INDEX, next)
        }
        LoopStep::MinusOne => {
            let i_use = b.use_lcl(INDEX, i1);
            let minus_one = b.const_int(-1);
            let next = b.add(i_use, minus_one);
            b.assign(b1, INDEX, next)
        }
        LoopStep::CompoundPlusOne => {
            let one = b.const_int(1);
            b.assign_add(b1, INDEX, i1, one)
        }
    };
    b.jump(b1, b2);

    // B2: i1 = phi(i0, i2); if <cond> goto B1
    b.phi(b2, INDEX, i1, &[(i0, b0), (i2, b1)]);
    let i_cond = b.use_lcl(INDEX, i1);
    let cond_tree = match cond {
        LoopCond::LtLen => {
            let a_use = b.use_lcl(ARRAY, a1);
            let len = b.arr_len(a_use);
            b.cmp(RelOp::Lt, i_cond, len)
        }
        LoopCond::LtLenMinusOne => {
            let a_use = b.use_lcl(ARRAY, a1);
            let len = b.arr_len(a_use);
            let minus_one = b.const_int(-1);
            let bound = b.add(len, minus_one);
            b.cmp(RelOp::Lt, i_cond, bound)
        }
        LoopCond::LtLenPlusOne => {
            let a_use = b.use_lcl(ARRAY, a1);
            let len = b.arr_len(a_use);
            let one = b.const_int(1);
            let bound = b.add(len, one);
            b.cmp(RelOp::Lt, i_cond, bound)
        }
        LoopCond::GeZero => {
            let zero = b.const_int(0);
            b.cmp(RelOp::Ge, i_cond, zero)
        }
    };
    b.cond_jump(b2, cond_tree, b1);
    b.ret(b3);

    let (method, values) = b.finish();

    // The guard holds on the taken branch into the body.
    let mut assertions = AssertionStore::with_block_count(method.block_count());
    let guard = assertions.add(Assertion {
        kind: AssertionKind::NotEqual,
        op1_vn: method.tree(cond_tree).vn,
        op2_vn: values.zero_vn(ValueType::Int),
    });
    assertions.attach_out_true_branch(b2.as_usize(), guard);
    assertions.attach_in(b1.as_usize(), guard);

    Fixture {
        method,
        values,
        assertions,
        checks: vec![check],
    }
}

/// Straight-line method with a guarded untrusted index:
///
/// ```text
/// B0: if (i < 0)     goto B3
/// B1: if (i >= a.len) goto B3
/// B2: check a[i]
/// B3: ret
/// ```
pub fn build_guarded_param() -> Fixture {
    let mut b = MethodBuilder::new();
    let b0 = b.block();
    let b1 = b.block();
    let b2 = b.block();
    let b3 = b.block();

    let a1 = b.param_array(ARRAY);
    let i1 = b.param_int(INDEX);

    let i_use0 = b.use_lcl(INDEX, i1);
    let zero = b.const_int(0);
    let negative = b.cmp(RelOp::Lt, i_use0, zero);
    b.cond_jump(b0, negative, b3);

    let i_use1 = b.use_lcl(INDEX, i1);
    let a_use1 = b.use_lcl(ARRAY, a1);
    let len1 = b.arr_len(a_use1);
    let too_big = b.cmp(RelOp::Ge, i_use1, len1);
    b.cond_jump(b1, too_big, b3);

    let i_use2 = b.use_lcl(INDEX, i1);
    let a_use2 = b.use_lcl(ARRAY, a1);
    let len2 = b.arr_len(a_use2);
    let check = b.bounds_check(b2, i_use2, len2);
    b.ret(b3);

    let (method, values) = b.finish();
    let zero_vn = values.zero_vn(ValueType::Int);

    let mut assertions = AssertionStore::with_block_count(method.block_count());
    let not_negative = assertions.add(Assertion {
        kind: AssertionKind::Equal,
        op1_vn: method.tree(negative).vn,
        op2_vn: zero_vn,
    });
    let not_too_big = assertions.add(Assertion {
        kind: AssertionKind::Equal,
        op1_vn: method.tree(too_big).vn,
        op2_vn: zero_vn,
    });
    assertions.attach_out_fallthrough(b0.as_usize(), not_negative);
    assertions.attach_in(b1.as_usize(), not_negative);
    assertions.attach_out_fallthrough(b1.as_usize(), not_too_big);
    assertions.attach_in(b2.as_usize(), not_negative);
    assertions.attach_in(b2.as_usize(), not_too_big);

    Fixture {
        method,
        values,
        assertions,
        checks: vec![check],
    }
}

/// Ids of checks still present in the method.
pub fn live_checks(method: &Method) -> Vec<TreeId> {
    method
        .bounds_check_sites()
        .into_iter()
        .map(|(_, _, tree)| tree)
        .collect()
}

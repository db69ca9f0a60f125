//! End-to-end elimination scenarios.
//!
//! Each test builds a method the way the front end would, runs the pass,
//! and checks which bounds checks survived. Where a check is removed, the
//! reference evaluator executes the original method to demonstrate that
//! the removed check could never have trapped, including at the boundary
//! indices 0 and len - 1.

mod common;

use common::*;

use kestrel_jit::assertions::{Assertion, AssertionKind, AssertionStore};
use kestrel_jit::ir::{CheckEvent, Evaluator, MethodBuilder, Outcome, RelOp, ValueType};
use kestrel_jit::opt::optimize_range_checks;

#[test]
fn counted_loop_check_is_removed() {
    // for (i = 0; i < a.len; i++) use(a[i]);
    let mut f = build_loop(
        LoopInit::Zero,
        LoopCond::LtLen,
        LoopIndex::I,
        LoopStep::PlusOne,
    );
    let original = f.method.clone();

    let stats = optimize_range_checks(&mut f.method, &f.values, &f.assertions);
    assert_eq!(stats.checks_seen, 1);
    assert_eq!(stats.removed_by_range, 1);
    assert_eq!(stats.removed_fast_path, 0);
    // The lower bound comes from the monotonic rerun.
    assert_eq!(stats.widened, 1);
    assert!(live_checks(&f.method).is_empty());

    // Soundness: the original checks never trap, boundaries included.
    for len in [0, 1, 5] {
        let mut eval = Evaluator::new(&original).bind_array(ARRAY, len);
        assert_eq!(eval.run(), Outcome::Finished);
        assert!(eval.events().iter().all(CheckEvent::in_bounds));
        let indices: Vec<_> = eval.events().iter().map(|e| e.index).collect();
        assert_eq!(indices, (0..len).collect::<Vec<_>>());
    }
}

#[test]
fn counted_loop_with_compound_step_is_removed() {
    // Same loop written with i += 1.
    let mut f = build_loop(
        LoopInit::Zero,
        LoopCond::LtLen,
        LoopIndex::I,
        LoopStep::CompoundPlusOne,
    );
    let original = f.method.clone();

    let stats = optimize_range_checks(&mut f.method, &f.values, &f.assertions);
    assert_eq!(stats.removed(), 1);
    assert!(live_checks(&f.method).is_empty());

    let mut eval = Evaluator::new(&original).bind_array(ARRAY, 3);
    assert_eq!(eval.run(), Outcome::Finished);
    assert!(eval.events().iter().all(CheckEvent::in_bounds));
}

#[test]
fn offset_index_loop_is_removed() {
    // for (i = 0; i < a.len - 1; i++) use(a[i + 1]);
    let mut f = build_loop(
        LoopInit::Zero,
        LoopCond::LtLenMinusOne,
        LoopIndex::IPlusOne,
        LoopStep::PlusOne,
    );
    let original = f.method.clone();

    let stats = optimize_range_checks(&mut f.method, &f.values, &f.assertions);
    assert_eq!(stats.removed_by_range, 1);
    assert!(live_checks(&f.method).is_empty());

    for len in [0, 1, 2, 6] {
        let mut eval = Evaluator::new(&original).bind_array(ARRAY, len);
        assert_eq!(eval.run(), Outcome::Finished);
        assert!(eval.events().iter().all(CheckEvent::in_bounds));
    }
}

#[test]
fn decreasing_loop_is_kept() {
    // for (i = a.len - 1; i >= 0; i--) use(a[i]);
    // The prover only handles non-decreasing chains.
    let mut f = build_loop(
        LoopInit::LenMinusOne,
        LoopCond::GeZero,
        LoopIndex::I,
        LoopStep::MinusOne,
    );
    let stats = optimize_range_checks(&mut f.method, &f.values, &f.assertions);
    assert_eq!(stats.removed(), 0);
    assert_eq!(live_checks(&f.method), f.checks);
}

#[test]
fn inclusive_upper_guard_is_kept() {
    // for (i = 0; i < a.len + 1; i++) use(a[i]): the derived upper limit
    // is a.len + 0, which the bounds decision rejects outright.
    let mut f = build_loop(
        LoopInit::Zero,
        LoopCond::LtLenPlusOne,
        LoopIndex::I,
        LoopStep::PlusOne,
    );
    let stats = optimize_range_checks(&mut f.method, &f.values, &f.assertions);
    assert_eq!(stats.removed(), 0);
    assert_eq!(live_checks(&f.method), f.checks);
}

#[test]
fn guarded_untrusted_index_is_removed() {
    // i = <untrusted>; if (i >= 0 && i < a.len) use(a[i]);
    let mut f = build_guarded_param();
    let original = f.method.clone();

    let stats = optimize_range_checks(&mut f.method, &f.values, &f.assertions);
    assert_eq!(stats.removed_by_range, 1);
    assert_eq!(stats.widened, 0);
    assert!(live_checks(&f.method).is_empty());

    // In-range, boundary and out-of-range inputs: the guards route
    // out-of-range indices around the access entirely.
    for (i, len) in [(0, 5), (4, 5), (5, 5), (-3, 5), (0, 1), (7, 0)] {
        let mut eval = Evaluator::new(&original).bind_array(ARRAY, len).bind_int(INDEX, i);
        assert_eq!(eval.run(), Outcome::Finished);
        assert!(eval.events().iter().all(CheckEvent::in_bounds));
    }
}

#[test]
fn sum_of_two_guarded_indices_is_kept() {
    // if (0 <= i < a.len && 0 <= j < a.len) use(a[i + j]);
    // Neither addend has a constant upper limit, so the addition may
    // overflow and the check stays. The plain a[i] access in the same
    // method is still removed.
    let mut b = MethodBuilder::new();
    let b0 = b.block();
    let b1 = b.block();
    let b2 = b.block();
    let b3 = b.block();
    let b4 = b.block();
    let b5 = b.block();

    let a = 0;
    let i = 1;
    let j = 2;
    let a1 = b.param_array(a);
    let i1 = b.param_int(i);
    let j1 = b.param_int(j);

    let mut guards = Vec::new();
    for (neg_block, big_block, lcl, ssa) in [(b0, b1, i, i1), (b2, b3, j, j1)] {
        let use_neg = b.use_lcl(lcl, ssa);
        let zero = b.const_int(0);
        let negative = b.cmp(RelOp::Lt, use_neg, zero);
        b.cond_jump(neg_block, negative, b5);

        let use_big = b.use_lcl(lcl, ssa);
        let a_use = b.use_lcl(a, a1);
        let len = b.arr_len(a_use);
        let too_big = b.cmp(RelOp::Ge, use_big, len);
        b.cond_jump(big_block, too_big, b5);
        guards.push(negative);
        guards.push(too_big);
    }

    let i_sum = b.use_lcl(i, i1);
    let j_sum = b.use_lcl(j, j1);
    let sum = b.add(i_sum, j_sum);
    let a_use = b.use_lcl(a, a1);
    let len = b.arr_len(a_use);
    let sum_check = b.bounds_check(b4, sum, len);

    let i_plain = b.use_lcl(i, i1);
    let a_use2 = b.use_lcl(a, a1);
    let len2 = b.arr_len(a_use2);
    let plain_check = b.bounds_check(b4, i_plain, len2);
    b.ret(b5);

    let (mut method, values) = b.finish();
    let zero_vn = values.zero_vn(ValueType::Int);

    let mut assertions = AssertionStore::with_block_count(method.block_count());
    for (guard_pos, cond) in guards.iter().enumerate() {
        let idx = assertions.add(Assertion {
            kind: AssertionKind::Equal,
            op1_vn: method.tree(*cond).vn,
            op2_vn: zero_vn,
        });
        // Valid from the block after its test onward.
        let first_block = guard_pos + 1;
        for block in first_block..5 {
            assertions.attach_in(block, idx);
        }
        assertions.attach_out_fallthrough(guard_pos, idx);
    }

    let stats = optimize_range_checks(&mut method, &values, &assertions);
    assert_eq!(stats.checks_seen, 2);
    assert_eq!(stats.removed(), 1);
    let live = live_checks(&method);
    assert_eq!(live, vec![sum_check]);
    assert!(!live.contains(&plain_check));
}

#[test]
fn constant_index_into_known_allocation_is_removed() {
    // a = new int[5]; use(a[2]);
    let mut b = MethodBuilder::new();
    let b0 = b.block();
    let a = 0;
    let five = b.const_int(5);
    let alloc = b.new_arr(five);
    let a1 = b.assign(b0, a, alloc);
    let a_use = b.use_lcl(a, a1);
    let len = b.arr_len(a_use);
    let two = b.const_int(2);
    b.bounds_check(b0, two, len);
    b.ret(b0);
    let (mut method, values) = b.finish();
    let assertions = AssertionStore::with_block_count(method.block_count());

    let stats = optimize_range_checks(&mut method, &values, &assertions);
    assert_eq!(stats.removed_fast_path, 1);
    assert_eq!(stats.removed_by_range, 0);
    assert!(live_checks(&method).is_empty());
}

#[test]
fn out_of_range_constant_index_is_kept() {
    // a = new int[5]; use(a[7]);
    let mut b = MethodBuilder::new();
    let b0 = b.block();
    let a = 0;
    let five = b.const_int(5);
    let alloc = b.new_arr(five);
    let a1 = b.assign(b0, a, alloc);
    let a_use = b.use_lcl(a, a1);
    let len = b.arr_len(a_use);
    let seven = b.const_int(7);
    let check = b.bounds_check(b0, seven, len);
    b.ret(b0);
    let (mut method, values) = b.finish();
    let assertions = AssertionStore::with_block_count(method.block_count());

    let stats = optimize_range_checks(&mut method, &values, &assertions);
    assert_eq!(stats.removed(), 0);
    assert_eq!(live_checks(&method), vec![check]);
}

#[test]
fn constant_index_into_unknown_array_is_kept() {
    // use(a[2]) with a of unknown length: nothing to prove against.
    let mut b = MethodBuilder::new();
    let b0 = b.block();
    let a = 0;
    let a1 = b.param_array(a);
    let a_use = b.use_lcl(a, a1);
    let len = b.arr_len(a_use);
    let two = b.const_int(2);
    let check = b.bounds_check(b0, two, len);
    b.ret(b0);
    let (mut method, values) = b.finish();
    let assertions = AssertionStore::with_block_count(method.block_count());

    let stats = optimize_range_checks(&mut method, &values, &assertions);
    assert_eq!(stats.removed(), 0);
    assert_eq!(live_checks(&method), vec![check]);
}

#[test]
fn long_typed_index_is_kept() {
    // The engines refuse 64-bit indices even with perfect guards.
    let mut b = MethodBuilder::new();
    let b0 = b.block();
    let a = 0;
    let k = 1;
    let a1 = b.param_array(a);
    let k1 = b.param_long(k);
    let k_use = b.use_lcl(k, k1);
    let a_use = b.use_lcl(a, a1);
    let len = b.arr_len(a_use);
    let check = b.bounds_check(b0, k_use, len);
    b.ret(b0);
    let (mut method, values) = b.finish();
    let assertions = AssertionStore::with_block_count(method.block_count());

    let stats = optimize_range_checks(&mut method, &values, &assertions);
    assert_eq!(stats.removed(), 0);
    assert_eq!(live_checks(&method), vec![check]);
}

#[test]
fn long_constant_index_is_kept() {
    let mut b = MethodBuilder::new();
    let b0 = b.block();
    let a = 0;
    let five = b.const_int(5);
    let alloc = b.new_arr(five);
    let a1 = b.assign(b0, a, alloc);
    let a_use = b.use_lcl(a, a1);
    let len = b.arr_len(a_use);
    let two = b.const_long(2);
    let check = b.bounds_check(b0, two, len);
    b.ret(b0);
    let (mut method, values) = b.finish();
    let assertions = AssertionStore::with_block_count(method.block_count());

    let stats = optimize_range_checks(&mut method, &values, &assertions);
    assert_eq!(stats.removed(), 0);
    assert_eq!(live_checks(&method), vec![check]);
}

//! Redundant array bounds-check elimination.
//!
//! Walks every bounds check in the method and removes the ones whose
//! index is provably inside `[0, arr.len)` on every execution reaching
//! the check. The proof combines three recursions over the SSA def-use
//! graph, all guarded by one search path and one visit budget:
//!
//! - the **range engine** computes a symbolic interval for the index
//!   ([`limit`]), ending phi cycles with the `Dependent` lattice element
//!   and tightening intermediate results with edge assertions,
//! - the **overflow engine** proves the arithmetic producing the index
//!   cannot wrap 32-bit signed integers,
//! - the **monotonicity prover** justifies a second, liberal range
//!   computation (widening) when the first pass only learned that the
//!   lower limit depends on a loop.
//!
//! # Decision procedure per check
//!
//! ```text
//! start -> constant-fast -> range-compute -> overflow-check
//!        -> widen (at most once) -> bounds-decide -> {remove, keep}
//! ```
//!
//! Every step falls back to `keep` on failure or exhausted budget; only a
//! successful bounds decision removes the check. Failure is silent by
//! design: an unprovable check is simply retained.
//!
//! # Example
//!
//! ```text
//! for (i = 0; i < a.len; i++)
//!     a[i] = 0;           // check on a[i] removed:
//!                         // phi {0, i+1} widens to [0, a.len - 1]
//! ```

mod defs;
mod limit;
mod merge;
mod monotonic;
mod overflow;
mod range;

pub use defs::{DefIndex, Location};
pub use limit::{Limit, Range, RangeOps};

use log::{debug, trace};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::assertions::AssertionStore;
use crate::ir::{BlockId, Method, StmtId, TreeId, TreeKind};
use crate::opt::OptimizationPass;
use crate::vn::{ValueNum, ValueStore};

/// Max search-path depth when walking a def-use chain.
pub(crate) const MAX_SEARCH_DEPTH: usize = 100;

/// Max nodes the range engine may enter per method.
pub const MAX_VISIT_BUDGET: i32 = 8192;

/// Stand-in for an allocation size the store does not know.
pub(crate) const ARRLEN_MAX: i32 = i32::MAX;

// =============================================================================
// Search path
// =============================================================================

/// Recursion guard: the set of nodes on the current inference path.
///
/// Every insertion is paired with a removal on every exit path of the
/// recursion that added it; the guard is only accurate under that
/// discipline.
#[derive(Debug, Default)]
pub(crate) struct SearchPath {
    nodes: FxHashSet<TreeId>,
}

impl SearchPath {
    fn new() -> Self {
        SearchPath::default()
    }

    /// Returns true when the node was not already on the path.
    #[inline]
    pub(crate) fn insert(&mut self, node: TreeId) -> bool {
        self.nodes.insert(node)
    }

    #[inline]
    pub(crate) fn remove(&mut self, node: TreeId) {
        self.nodes.remove(&node);
    }

    #[inline]
    pub(crate) fn contains(&self, node: TreeId) -> bool {
        self.nodes.contains(&node)
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.nodes.len()
    }

    fn clear(&mut self) {
        self.nodes.clear();
    }
}

// =============================================================================
// Stats and pass
// =============================================================================

/// Counters from one run of the pass.
#[derive(Debug, Clone, Default)]
pub struct RangeCheckStats {
    /// Bounds checks found in the method.
    pub checks_seen: usize,
    /// Removed because index and length resolved to constants.
    pub removed_fast_path: usize,
    /// Removed by the full range analysis.
    pub removed_by_range: usize,
    /// Checks whose range was recomputed under monotonicity.
    pub widened: usize,
    /// The visit budget ran out; remaining checks were kept unexamined.
    pub budget_exhausted: bool,
}

impl RangeCheckStats {
    /// Total checks removed.
    pub fn removed(&self) -> usize {
        self.removed_fast_path + self.removed_by_range
    }
}

/// The bounds-check elimination pass.
#[derive(Debug)]
pub struct RangeCheckElimination {
    budget: i32,
    stats: RangeCheckStats,
}

impl RangeCheckElimination {
    pub fn new() -> Self {
        Self::with_budget(MAX_VISIT_BUDGET)
    }

    /// A pass with a custom visit budget (smaller budgets give up on
    /// deeper def-use chains sooner).
    pub fn with_budget(budget: i32) -> Self {
        RangeCheckElimination {
            budget,
            stats: RangeCheckStats::default(),
        }
    }

    /// Statistics from the last run.
    pub fn stats(&self) -> &RangeCheckStats {
        &self.stats
    }
}

impl Default for RangeCheckElimination {
    fn default() -> Self {
        Self::new()
    }
}

impl OptimizationPass for RangeCheckElimination {
    fn name(&self) -> &'static str {
        "rangecheck"
    }

    fn run(
        &mut self,
        method: &mut Method,
        values: &ValueStore,
        assertions: &AssertionStore,
    ) -> bool {
        self.stats = run_with_budget(method, values, assertions, self.budget);
        self.stats.removed() > 0
    }
}

/// Entry point: remove zero or more bounds checks from `method` in place.
pub fn optimize_range_checks(
    method: &mut Method,
    values: &ValueStore,
    assertions: &AssertionStore,
) -> RangeCheckStats {
    run_with_budget(method, values, assertions, MAX_VISIT_BUDGET)
}

fn run_with_budget(
    method: &mut Method,
    values: &ValueStore,
    assertions: &AssertionStore,
    budget: i32,
) -> RangeCheckStats {
    let sites = method.bounds_check_sites();
    let mut stats = RangeCheckStats {
        checks_seen: sites.len(),
        ..RangeCheckStats::default()
    };
    let mut removed: Vec<(StmtId, TreeId)> = Vec::new();

    let mut analyzer = RangeAnalyzer::new(method, values, assertions, budget);
    for (block, stmt, tree) in sites {
        if analyzer.over_budget() {
            debug!("rangecheck: visit budget exhausted, keeping remaining checks");
            stats.budget_exhausted = true;
            break;
        }
        match analyzer.optimize_check(block, stmt, tree) {
            CheckOutcome::RemovedFastPath => {
                stats.removed_fast_path += 1;
                removed.push((stmt, tree));
            }
            CheckOutcome::Removed { widened } => {
                stats.removed_by_range += 1;
                stats.widened += widened as usize;
                removed.push((stmt, tree));
            }
            CheckOutcome::Kept { widened } => {
                stats.widened += widened as usize;
            }
        }
    }
    drop(analyzer);

    for &(stmt, tree) in &removed {
        method.remove_bounds_check(stmt, tree);
    }
    debug!(
        "rangecheck: removed {}/{} checks",
        removed.len(),
        stats.checks_seen
    );
    stats
}

// =============================================================================
// Per-method analysis
// =============================================================================

/// What happened to one check.
enum CheckOutcome {
    RemovedFastPath,
    Removed { widened: bool },
    Kept { widened: bool },
}

/// Analysis state for one method: the lazily built def index, the
/// per-check memo tables, the visit budget and the array the current
/// check is against. Built per method, discarded with the pass.
pub(crate) struct RangeAnalyzer<'a> {
    method: &'a Method,
    values: &'a ValueStore,
    assertions: &'a AssertionStore,
    defs: Option<DefIndex>,
    range_cache: FxHashMap<TreeId, Range>,
    overflow_cache: FxHashMap<TreeId, bool>,
    budget: i32,
    /// Array value number of the current check's length operand, `NONE`
    /// when the length is not an array length.
    cur_arr_ref: ValueNum,
}

impl<'a> RangeAnalyzer<'a> {
    fn new(
        method: &'a Method,
        values: &'a ValueStore,
        assertions: &'a AssertionStore,
        budget: i32,
    ) -> Self {
        RangeAnalyzer {
            method,
            values,
            assertions,
            defs: None,
            range_cache: FxHashMap::default(),
            overflow_cache: FxHashMap::default(),
            budget,
            cur_arr_ref: ValueNum::NONE,
        }
    }

    #[inline]
    pub(crate) fn over_budget(&self) -> bool {
        self.budget <= 0
    }

    #[inline]
    pub(crate) fn spend_budget(&mut self) {
        self.budget -= 1;
    }

    /// Definition site of an SSA name, if the method has one.
    pub(crate) fn get_def(&mut self, lcl: crate::ir::LclNum, ssa: crate::ir::SsaNum) -> Option<Location> {
        if ssa.is_reserved() {
            return None;
        }
        let method = self.method;
        self.defs
            .get_or_insert_with(|| DefIndex::build(method))
            .lookup(lcl, ssa)
            .copied()
    }

    /// Statically known allocation size of an array value, 0 when unknown.
    #[inline]
    pub(crate) fn arr_length(&self, array: ValueNum) -> i32 {
        self.values.new_arr_size(array)
    }

    // =========================================================================
    // Driver
    // =========================================================================

    fn optimize_check(&mut self, block: BlockId, stmt: StmtId, tree: TreeId) -> CheckOutcome {
        let method = self.method;
        let values = self.values;
        let (index, len) = match method.tree(tree).kind {
            TreeKind::BoundsCheck { index, len } => (index, len),
            _ => return CheckOutcome::Kept { widened: false },
        };
        let idx_vn = method.tree(index).vn;
        let len_vn = method.tree(len).vn;

        // Constant fast path: a[2] on an array of known size.
        let arr_size = if let Some(size) = values.const_int32(len_vn) {
            size
        } else if values.is_arr_len(len_vn) {
            self.arr_length(values.array_of_arr_len(len_vn))
        } else {
            0
        };
        if let Some(idx) = values.const_int32(idx_vn) {
            if arr_size > 0 && idx >= 0 && idx < arr_size {
                debug!("rangecheck: constant index {idx} < {arr_size}, removing {tree:?}");
                return CheckOutcome::RemovedFastPath;
            }
        }

        // Stale entries from the previous check (Dependent in particular)
        // must not survive into this one.
        self.range_cache.clear();
        self.overflow_cache.clear();
        self.cur_arr_ref = if values.is_arr_len(len_vn) {
            values.array_of_arr_len(len_vn)
        } else {
            ValueNum::NONE
        };

        let mut path = SearchPath::new();
        let mut range = self.get_range(block, stmt, index, &mut path, false);

        // An Unknown endpoint would also have defeated the overflow walk.
        if range.lower.is_unknown() || range.upper.is_unknown() {
            trace!("rangecheck: {tree:?} has unknown range {range}");
            return CheckOutcome::Kept { widened: false };
        }

        if self.does_overflow(block, stmt, index, &mut path) {
            debug!("rangecheck: index of {tree:?} may overflow");
            return CheckOutcome::Kept { widened: false };
        }

        path.clear();
        let widened = self.widen(block, stmt, index, &mut path, &mut range);

        if range.lower.is_unknown() || range.upper.is_unknown() {
            return CheckOutcome::Kept { widened };
        }

        if self.between_bounds(&range, len_vn) {
            debug!("rangecheck: {range} within [0, {len_vn}), removing {tree:?}");
            CheckOutcome::Removed { widened }
        } else {
            CheckOutcome::Kept { widened }
        }
    }

    /// Retry the range under the liberal merge rule when the lower limit
    /// is still loop-dependent and the chain only ever grows. Clearing
    /// the range cache first is mandatory: a stale `Dependent` computed
    /// under the strict rule would poison the rerun.
    fn widen(
        &mut self,
        block: BlockId,
        stmt: StmtId,
        tree: TreeId,
        path: &mut SearchPath,
        range: &mut Range,
    ) -> bool {
        if range.lower.is_dependent() || range.lower.is_unknown() {
            if self.is_monotonically_increasing(tree, path) {
                trace!("rangecheck: {tree:?} is monotonic, recomputing {range}");
                self.range_cache.clear();
                *range = self.get_range(block, stmt, tree, path, true);
                return true;
            }
        }
        false
    }

    /// Does `range` fit inside `[0, len)`?
    ///
    /// The length resolves either to a constant or to the length of an
    /// array with a (possibly unknown) allocation size. Note the strict
    /// `offset < 0` test on a symbolic upper limit: `a.len + 0` is
    /// rejected even though `a.len - 1` would be accepted.
    fn between_bounds(&self, range: &Range, len_vn: ValueNum) -> bool {
        let values = self.values;
        let (arr_ref, arr_size) = if let Some(size) = values.const_int32(len_vn) {
            (ValueNum::NONE, size)
        } else if values.is_arr_len(len_vn) {
            let array = values.array_of_arr_len(len_vn);
            (array, self.arr_length(array))
        } else {
            return false;
        };

        match range.upper {
            // Upper limit a.len + ucns.
            Limit::BinOpArray(upper_vn, ucns) if ucns < 0 => {
                if upper_vn != arr_ref {
                    return false;
                }
                match range.lower {
                    Limit::Array(_) => false,
                    Limit::Constant(lcns) => lcns >= 0,
                    Limit::BinOpArray(lower_vn, lcns) => {
                        arr_size > 0
                            && lower_vn == arr_ref
                            && lcns <= 0
                            && -(lcns as i64) <= arr_size as i64
                            && lcns <= ucns
                    }
                    _ => false,
                }
            }
            // Constant upper limit against a known allocation size.
            Limit::Constant(ucns) => {
                if arr_size <= 0 || ucns < 0 || ucns >= arr_size {
                    return false;
                }
                match range.lower {
                    Limit::Constant(lcns) => lcns >= 0 && lcns <= ucns,
                    Limit::BinOpArray(lower_vn, lcns) => {
                        lower_vn == arr_ref
                            && lcns <= 0
                            && -(lcns as i64) <= arr_size as i64
                            && arr_size as i64 + lcns as i64 <= ucns as i64
                    }
                    _ => false,
                }
            }
            _ => false,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

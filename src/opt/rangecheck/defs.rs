//! Definition-site index for SSA names.

use rustc_hash::FxHashMap;

use crate::ir::{BlockId, LclNum, Method, SsaNum, StmtId, TreeId, TreeKind};

/// Program location of one SSA definition: enough to reach both the
/// defining node and the statement carrying it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    pub block: BlockId,
    pub stmt: StmtId,
    pub tree: TreeId,
    pub parent: TreeId,
}

/// Map from `(local, ssa version)` to the unique definition site.
///
/// Built at most once per pass, on first demand, by a pre-order walk over
/// every statement of every block. Every SSA name appears at most once;
/// a duplicate insertion is an internal error.
#[derive(Debug, Default)]
pub struct DefIndex {
    defs: FxHashMap<u64, Location>,
}

impl DefIndex {
    /// Walk the whole method and record every definition.
    pub fn build(method: &Method) -> DefIndex {
        let mut index = DefIndex::default();
        for block in method.block_ids() {
            for &stmt in &method.block(block).stmts {
                method.walk_stmt_preorder(stmt, &mut |tree, parent| {
                    let Some(parent) = parent else { return };
                    index.record(
                        method,
                        Location {
                            block,
                            stmt,
                            tree,
                            parent,
                        },
                    );
                });
            }
        }
        index
    }

    fn record(&mut self, method: &Method, loc: Location) {
        let Some((lcl, ssa)) = method.tree(loc.tree).local() else {
            return;
        };
        if ssa.is_reserved() {
            return;
        }
        match method.tree(loc.parent).kind {
            TreeKind::Assign { dst, .. } if dst == loc.tree => self.insert(lcl, ssa, loc),
            TreeKind::AssignAdd { dst, .. } if dst == loc.tree => {
                // The target of a compound assignment is a use; the
                // defined version comes from the side table.
                let def_ssa = method.ssa_num_for_compound_def(loc.tree);
                if !def_ssa.is_reserved() {
                    self.insert(lcl, def_ssa, loc);
                }
            }
            _ => {}
        }
    }

    fn insert(&mut self, lcl: LclNum, ssa: SsaNum, loc: Location) {
        let previous = self.defs.insert(Self::key(lcl, ssa), loc);
        debug_assert!(
            previous.is_none(),
            "duplicate definition of local {lcl} version {}",
            ssa.0
        );
    }

    pub fn lookup(&self, lcl: LclNum, ssa: SsaNum) -> Option<&Location> {
        self.defs.get(&Self::key(lcl, ssa))
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }

    #[inline]
    fn key(lcl: LclNum, ssa: SsaNum) -> u64 {
        (lcl as u64) << 32 | ssa.0 as u64
    }
}

// =============================================================================
// Tests
// =============================================================================

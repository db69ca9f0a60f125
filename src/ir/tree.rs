//! Expression tree node definitions.

use smallvec::SmallVec;

use super::arena::Id;
use super::block::BlockId;
use crate::vn::ValueNum;

/// Tree node id.
pub type TreeId = Id<Tree>;

/// Local variable number.
pub type LclNum = u32;

// =============================================================================
// SSA numbering
// =============================================================================

/// SSA version of a local. Version 0 is reserved for "not renamed".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SsaNum(pub u32);

impl SsaNum {
    /// The reserved version carried by locals outside SSA form.
    pub const RESERVED: SsaNum = SsaNum(0);

    /// First real SSA version.
    pub const FIRST: SsaNum = SsaNum(1);

    #[inline]
    pub fn is_reserved(self) -> bool {
        self == Self::RESERVED
    }
}

// =============================================================================
// Operator vocabulary
// =============================================================================

/// Value types the IR distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    Int,
    Long,
    ULong,
    Ref,
    Void,
}

impl ValueType {
    /// 64-bit integer types are outside what the range analyses reason about.
    #[inline]
    pub fn is_64bit(self) -> bool {
        matches!(self, ValueType::Long | ValueType::ULong)
    }
}

/// Relational operators for compare trees and bound predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl RelOp {
    /// Logical negation: `reverse(a op b) == !(a op b)`.
    #[inline]
    pub fn reverse(self) -> RelOp {
        match self {
            RelOp::Eq => RelOp::Ne,
            RelOp::Ne => RelOp::Eq,
            RelOp::Lt => RelOp::Ge,
            RelOp::Le => RelOp::Gt,
            RelOp::Gt => RelOp::Le,
            RelOp::Ge => RelOp::Lt,
        }
    }
}

/// Arithmetic operator applied to an array length in a bound predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArithOp {
    Add,
    Sub,
}

// =============================================================================
// Trees
// =============================================================================

/// One expression tree node.
#[derive(Debug, Clone, PartialEq)]
pub struct Tree {
    pub kind: TreeKind,
    pub ty: ValueType,
    pub vn: ValueNum,
}

/// Tree node operations.
#[derive(Debug, Clone, PartialEq)]
pub enum TreeKind {
    /// 32-bit integer constant.
    ConstInt(i32),
    /// 64-bit integer constant.
    ConstLong(i64),
    /// Use or definition of an SSA local.
    LclVar { lcl: LclNum, ssa: SsaNum },
    /// SSA merge. Operands are `PhiArg` trees.
    Phi { args: SmallVec<[TreeId; 2]> },
    /// One phi operand, tagged with the predecessor it flows in from.
    PhiArg {
        lcl: LclNum,
        ssa: SsaNum,
        pred: BlockId,
    },
    /// 32-bit signed addition.
    Add { lhs: TreeId, rhs: TreeId },
    /// Relational compare producing 0 or 1.
    Cmp {
        op: RelOp,
        lhs: TreeId,
        rhs: TreeId,
    },
    /// Length of the array operand.
    ArrLen { arr: TreeId },
    /// Array allocation with the given element count.
    NewArr { len: TreeId },
    /// Plain assignment; `dst` is the defining `LclVar`.
    Assign { dst: TreeId, src: TreeId },
    /// Compound add-assignment. `dst` is a use of the incoming version;
    /// the defined version lives in the method's compound-def side table.
    AssignAdd { dst: TreeId, src: TreeId },
    /// Array bounds check: traps unless `0 <= index < len`.
    BoundsCheck { index: TreeId, len: TreeId },
    /// Removed or neutral node.
    Nop,
}

impl Tree {
    /// Is this node a use/def of an SSA local (plain or phi argument)?
    #[inline]
    pub fn is_local(&self) -> bool {
        matches!(
            self.kind,
            TreeKind::LclVar { .. } | TreeKind::PhiArg { .. }
        )
    }

    /// The `(local, ssa)` pair of a local node.
    #[inline]
    pub fn local(&self) -> Option<(LclNum, SsaNum)> {
        match self.kind {
            TreeKind::LclVar { lcl, ssa } => Some((lcl, ssa)),
            TreeKind::PhiArg { lcl, ssa, .. } => Some((lcl, ssa)),
            _ => None,
        }
    }

    /// Operand list in evaluation order.
    pub fn operands(&self) -> SmallVec<[TreeId; 2]> {
        match &self.kind {
            TreeKind::ConstInt(_)
            | TreeKind::ConstLong(_)
            | TreeKind::LclVar { .. }
            | TreeKind::PhiArg { .. }
            | TreeKind::Nop => SmallVec::new(),
            TreeKind::Phi { args } => args.clone(),
            TreeKind::Add { lhs, rhs } | TreeKind::Cmp { lhs, rhs, .. } => {
                SmallVec::from_slice(&[*lhs, *rhs])
            }
            TreeKind::ArrLen { arr } => SmallVec::from_slice(&[*arr]),
            TreeKind::NewArr { len } => SmallVec::from_slice(&[*len]),
            TreeKind::Assign { dst, src } | TreeKind::AssignAdd { dst, src } => {
                SmallVec::from_slice(&[*dst, *src])
            }
            TreeKind::BoundsCheck { index, len } => SmallVec::from_slice(&[*index, *len]),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

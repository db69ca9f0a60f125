//! The symbolic limit lattice and range combinators.
//!
//! A [`Limit`] is one endpoint of a closed interval over 32-bit signed
//! integers, expressed symbolically in terms of constants and array
//! lengths. Three lattice elements sit alongside the concrete forms:
//!
//! ```text
//!        Unknown (top)
//!           |
//!        Dependent          "being computed along this search path"
//!           |
//!   Constant / Array / BinOpArray / SsaVar / BinOp
//! ```
//!
//! `Undef` is a transient placeholder: it seeds the phi-merge fold and
//! never survives an analysis step.
//!
//! [`RangeOps`] hosts the two pure combinators. `add` is elementwise
//! symbolic addition; `merge` is interval union (smaller lower limit,
//! larger upper limit) under the lattice rules, with a liberal variant
//! that drops `Dependent` in favor of a concrete endpoint once the
//! enclosing chain has been proven monotonic.

use crate::vn::ValueNum;

// =============================================================================
// Limit
// =============================================================================

/// One symbolic interval endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Limit {
    /// Transient placeholder.
    Undef,
    /// Lattice top; nothing is known.
    Unknown,
    /// Being computed along the current search path.
    Dependent,
    /// The integer itself.
    Constant(i32),
    /// Length of the array with the given value number.
    Array(ValueNum),
    /// Length of the array plus a constant (possibly negative).
    BinOpArray(ValueNum, i32),
    /// The value with the given value number.
    SsaVar(ValueNum),
    /// The value plus a constant.
    BinOp(ValueNum, i32),
}

impl Limit {
    #[inline]
    pub fn is_undef(&self) -> bool {
        matches!(self, Limit::Undef)
    }

    #[inline]
    pub fn is_unknown(&self) -> bool {
        matches!(self, Limit::Unknown)
    }

    #[inline]
    pub fn is_dependent(&self) -> bool {
        matches!(self, Limit::Dependent)
    }

    #[inline]
    pub fn is_constant(&self) -> bool {
        matches!(self, Limit::Constant(_))
    }

    #[inline]
    pub fn is_array(&self) -> bool {
        matches!(self, Limit::Array(_))
    }

    #[inline]
    pub fn is_binop_array(&self) -> bool {
        matches!(self, Limit::BinOpArray(..))
    }

    /// The value number a symbolic limit refers to, `NONE` for the rest.
    #[inline]
    pub fn vn(&self) -> ValueNum {
        match *self {
            Limit::Array(vn)
            | Limit::BinOpArray(vn, _)
            | Limit::SsaVar(vn)
            | Limit::BinOp(vn, _) => vn,
            _ => ValueNum::NONE,
        }
    }

    /// The constant part of a limit; symbolic forms without an explicit
    /// offset read as zero.
    #[inline]
    pub fn constant(&self) -> i32 {
        match *self {
            Limit::Constant(c) | Limit::BinOpArray(_, c) | Limit::BinOp(_, c) => c,
            _ => 0,
        }
    }

    /// Add a constant in place. Fails (leaving the limit unchanged) on
    /// 32-bit overflow or on a lattice element.
    pub fn add_constant(&mut self, cns: i32) -> bool {
        match *self {
            Limit::Constant(c) => match c.checked_add(cns) {
                Some(sum) => {
                    *self = Limit::Constant(sum);
                    true
                }
                None => false,
            },
            Limit::Array(vn) => {
                *self = Limit::BinOpArray(vn, cns);
                true
            }
            Limit::BinOpArray(vn, c) => match c.checked_add(cns) {
                Some(sum) => {
                    *self = Limit::BinOpArray(vn, sum);
                    true
                }
                None => false,
            },
            Limit::SsaVar(vn) => {
                *self = Limit::BinOp(vn, cns);
                true
            }
            Limit::BinOp(vn, c) => match c.checked_add(cns) {
                Some(sum) => {
                    *self = Limit::BinOp(vn, sum);
                    true
                }
                None => false,
            },
            Limit::Undef | Limit::Unknown | Limit::Dependent => false,
        }
    }
}

impl std::fmt::Display for Limit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fn offset(f: &mut std::fmt::Formatter<'_>, c: i32) -> std::fmt::Result {
            if c < 0 {
                write!(f, " - {}", -(c as i64))
            } else {
                write!(f, " + {c}")
            }
        }
        match *self {
            Limit::Undef => write!(f, "undef"),
            Limit::Unknown => write!(f, "unknown"),
            Limit::Dependent => write!(f, "dependent"),
            Limit::Constant(c) => write!(f, "{c}"),
            Limit::Array(vn) => write!(f, "len({vn})"),
            Limit::BinOpArray(vn, c) => {
                write!(f, "len({vn})")?;
                offset(f, c)
            }
            Limit::SsaVar(vn) => write!(f, "{vn}"),
            Limit::BinOp(vn, c) => {
                write!(f, "{vn}")?;
                offset(f, c)
            }
        }
    }
}

// =============================================================================
// Range
// =============================================================================

/// A closed symbolic interval `[lower, upper]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Range {
    pub lower: Limit,
    pub upper: Limit,
}

impl Range {
    #[inline]
    pub fn new(lower: Limit, upper: Limit) -> Self {
        Range { lower, upper }
    }

    /// Both endpoints set to the same limit.
    #[inline]
    pub fn single(limit: Limit) -> Self {
        Range {
            lower: limit,
            upper: limit,
        }
    }
}

impl std::fmt::Display for Range {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {}]", self.lower, self.upper)
    }
}

// =============================================================================
// RangeOps
// =============================================================================

/// Pure combinators over [`Range`] values.
pub struct RangeOps;

impl RangeOps {
    /// Elementwise symbolic addition.
    pub fn add(a: &Range, b: &Range) -> Range {
        Range::new(
            Self::add_limits(&a.lower, &b.lower),
            Self::add_limits(&a.upper, &b.upper),
        )
    }

    fn add_limits(l: &Limit, r: &Limit) -> Limit {
        if l.is_unknown() || l.is_undef() || r.is_unknown() || r.is_undef() {
            return Limit::Unknown;
        }
        if l.is_dependent() || r.is_dependent() {
            return Limit::Dependent;
        }
        match (*l, *r) {
            (Limit::Constant(a), Limit::Constant(b)) => match a.checked_add(b) {
                Some(sum) => Limit::Constant(sum),
                None => Limit::Unknown,
            },
            (Limit::Constant(c), Limit::Array(vn)) | (Limit::Array(vn), Limit::Constant(c)) => {
                Limit::BinOpArray(vn, c)
            }
            (Limit::Constant(c), Limit::BinOpArray(vn, d))
            | (Limit::BinOpArray(vn, d), Limit::Constant(c)) => match d.checked_add(c) {
                Some(sum) => Limit::BinOpArray(vn, sum),
                None => Limit::Unknown,
            },
            // Two distinct symbolic quantities; no algebra for them.
            _ => Limit::Unknown,
        }
    }

    /// Phi merge: interval union under the lattice rules. With
    /// `monotonic`, a `Dependent` endpoint yields to a concrete one.
    pub fn merge(a: &Range, b: &Range, monotonic: bool) -> Range {
        Range::new(
            Self::merge_limits(&a.lower, &b.lower, monotonic, false),
            Self::merge_limits(&a.upper, &b.upper, monotonic, true),
        )
    }

    fn merge_limits(l1: &Limit, l2: &Limit, monotonic: bool, upper: bool) -> Limit {
        if l1.is_unknown() || l2.is_unknown() {
            return Limit::Unknown;
        }
        // Undef is the fold identity.
        if l1.is_undef() {
            return *l2;
        }
        if l2.is_undef() {
            return *l1;
        }
        if l1.is_dependent() || l2.is_dependent() {
            if monotonic {
                return if l1.is_dependent() { *l2 } else { *l1 };
            }
            return Limit::Dependent;
        }
        let pick = |a: i32, b: i32| if upper { a.max(b) } else { a.min(b) };
        match (*l1, *l2) {
            (Limit::Constant(a), Limit::Constant(b)) => Limit::Constant(pick(a, b)),
            (Limit::Array(a), Limit::Array(b)) if a == b => Limit::Array(a),
            (Limit::BinOpArray(a, c1), Limit::BinOpArray(b, c2)) if a == b => {
                Limit::BinOpArray(a, pick(c1, c2))
            }
            (Limit::SsaVar(a), Limit::SsaVar(b)) if a == b => Limit::SsaVar(a),
            (Limit::BinOp(a, c1), Limit::BinOp(b, c2)) if a == b => Limit::BinOp(a, pick(c1, c2)),
            // Concrete limits of different forms (or over different
            // arrays) have no common refinement here.
            _ => Limit::Unknown,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

//! Method-tier JIT midend for Kestrel.
//!
//! Mid-level optimization infrastructure operating on a tree-form SSA IR:
//! - Arena-allocated expression trees grouped into statements and blocks
//! - A value-numbering store shared by all analyses
//! - Per-edge predicate assertions produced by the front half of the pipeline
//! - Optimization passes, currently redundant array bounds-check elimination
#![deny(unsafe_op_in_unsafe_fn)]
pub mod assertions;
pub mod ir;
pub mod opt;
pub mod vn;

//! Tree-form SSA intermediate representation.
//!
//! A method is a list of basic blocks in program order; each block holds a
//! list of statements, and each statement is an expression tree. Locals are
//! in SSA form: every use names a `(local, ssa version)` pair and every
//! version has exactly one definition site. Phi nodes merge versions at
//! control-flow joins; their arguments are tagged with the predecessor
//! block they flow in from.
//!
//! Trees, statements and blocks live in typed arenas owned by [`Method`],
//! so the rest of the crate passes around plain 32-bit ids.

pub mod arena;
pub mod block;
pub mod builder;
pub mod eval;
pub mod method;
pub mod tree;

pub use arena::{Arena, BitSet, Id};
pub use block::{BasicBlock, BlockId, Stmt, StmtId, Terminator};
pub use builder::MethodBuilder;
pub use eval::{CheckEvent, Evaluator, Outcome, Value};
pub use method::{Method, VerifyError};
pub use tree::{ArithOp, LclNum, RelOp, SsaNum, Tree, TreeId, TreeKind, ValueType};

//! Reference evaluator for the tree IR.
//!
//! Executes a method with concrete parameter bindings under 32-bit
//! wrapping arithmetic, recording the outcome of every bounds check it
//! reaches. The optimizer's test suite uses this to demonstrate that a
//! removed check could never have trapped on the executions exercised.
//!
//! Execution is deliberately simple-minded: locals are dynamic slots keyed
//! by local number (SSA versions of one local share a slot, which is
//! exactly what SSA deconstruction would produce), and a fuel counter
//! bounds runaway loops.

use rustc_hash::FxHashMap;

use super::block::{BlockId, Terminator};
use super::method::Method;
use super::tree::{LclNum, RelOp, TreeId, TreeKind};

/// Default fuel: evaluated tree nodes before the evaluator gives up.
const DEFAULT_FUEL: u64 = 1 << 20;

/// A runtime value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Value {
    Int(i32),
    Array { len: i32 },
}

impl Value {
    fn as_int(self) -> i32 {
        match self {
            Value::Int(v) => v,
            Value::Array { .. } => 0,
        }
    }
}

/// One bounds check reached during execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckEvent {
    pub tree: TreeId,
    pub index: i32,
    pub len: i32,
}

impl CheckEvent {
    #[inline]
    pub fn in_bounds(&self) -> bool {
        self.index >= 0 && self.index < self.len
    }
}

/// How execution ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Ran off the end of the method or hit a return.
    Finished,
    /// A live bounds check failed.
    Trapped { tree: TreeId },
    /// Fuel ran out.
    OutOfFuel,
}

/// Tree-walking evaluator over one method.
pub struct Evaluator<'m> {
    method: &'m Method,
    locals: FxHashMap<LclNum, Value>,
    events: Vec<CheckEvent>,
    trapped: Option<TreeId>,
    fuel: u64,
}

impl<'m> Evaluator<'m> {
    pub fn new(method: &'m Method) -> Self {
        Evaluator {
            method,
            locals: FxHashMap::default(),
            events: Vec::new(),
            trapped: None,
            fuel: DEFAULT_FUEL,
        }
    }

    /// Bind an integer parameter.
    pub fn bind_int(mut self, lcl: LclNum, value: i32) -> Self {
        self.locals.insert(lcl, Value::Int(value));
        self
    }

    /// Bind an array parameter of the given length.
    pub fn bind_array(mut self, lcl: LclNum, len: i32) -> Self {
        self.locals.insert(lcl, Value::Array { len });
        self
    }

    /// Bounds checks reached so far, in execution order.
    pub fn events(&self) -> &[CheckEvent] {
        &self.events
    }

    /// Execute from the first block.
    pub fn run(&mut self) -> Outcome {
        if self.method.block_count() == 0 {
            return Outcome::Finished;
        }
        let mut current = BlockId::new(0);
        loop {
            self.fuel = self.fuel.saturating_sub(1);
            if self.fuel == 0 {
                return Outcome::OutOfFuel;
            }
            let block = self.method.block(current);
            for &stmt in &block.stmts {
                self.eval(self.method.stmt(stmt).root);
                if let Some(tree) = self.trapped {
                    return Outcome::Trapped { tree };
                }
                if self.fuel == 0 {
                    return Outcome::OutOfFuel;
                }
            }
            let next = match block.terminator {
                Terminator::FallThrough => self.method.next_block(current),
                Terminator::Jump(target) => Some(target),
                Terminator::CondJump { cond, target } => {
                    if self.eval(cond).as_int() != 0 {
                        Some(target)
                    } else {
                        self.method.next_block(current)
                    }
                }
                Terminator::Ret => None,
            };
            if self.fuel == 0 {
                return Outcome::OutOfFuel;
            }
            match next {
                Some(block) => current = block,
                None => return Outcome::Finished,
            }
        }
    }

    fn eval(&mut self, tree: TreeId) -> Value {
        self.fuel = self.fuel.saturating_sub(1);
        if self.fuel == 0 {
            return Value::Int(0);
        }
        let node = self.method.tree(tree);
        match &node.kind {
            TreeKind::ConstInt(v) => Value::Int(*v),
            TreeKind::ConstLong(v) => Value::Int(*v as i32),
            TreeKind::LclVar { lcl, .. } | TreeKind::PhiArg { lcl, .. } => {
                self.locals.get(lcl).copied().unwrap_or(Value::Int(0))
            }
            TreeKind::Phi { args } => {
                // All arguments rename the same local; the predecessor
                // already stored the flowing value in its slot.
                match args.first() {
                    Some(&arg) => self.eval(arg),
                    None => Value::Int(0),
                }
            }
            TreeKind::Add { lhs, rhs } => {
                let l = self.eval(*lhs).as_int();
                let r = self.eval(*rhs).as_int();
                Value::Int(l.wrapping_add(r))
            }
            TreeKind::Cmp { op, lhs, rhs } => {
                let l = self.eval(*lhs).as_int();
                let r = self.eval(*rhs).as_int();
                let hit = match op {
                    RelOp::Eq => l == r,
                    RelOp::Ne => l != r,
                    RelOp::Lt => l < r,
                    RelOp::Le => l <= r,
                    RelOp::Gt => l > r,
                    RelOp::Ge => l >= r,
                };
                Value::Int(hit as i32)
            }
            TreeKind::ArrLen { arr } => match self.eval(*arr) {
                Value::Array { len } => Value::Int(len),
                Value::Int(_) => Value::Int(0),
            },
            TreeKind::NewArr { len } => {
                let len = self.eval(*len).as_int();
                Value::Array { len }
            }
            TreeKind::Assign { dst, src } => {
                let value = self.eval(*src);
                if let Some((lcl, _)) = self.method.tree(*dst).local() {
                    self.locals.insert(lcl, value);
                }
                value
            }
            TreeKind::AssignAdd { dst, src } => {
                let addend = self.eval(*src).as_int();
                if let Some((lcl, _)) = self.method.tree(*dst).local() {
                    let old = self
                        .locals
                        .get(&lcl)
                        .copied()
                        .unwrap_or(Value::Int(0))
                        .as_int();
                    let new = Value::Int(old.wrapping_add(addend));
                    self.locals.insert(lcl, new);
                    new
                } else {
                    Value::Int(0)
                }
            }
            TreeKind::BoundsCheck { index, len } => {
                let index = self.eval(*index).as_int();
                let len = self.eval(*len).as_int();
                let event = CheckEvent { tree, index, len };
                self.events.push(event);
                if !event.in_bounds() {
                    self.trapped = Some(tree);
                }
                Value::Int(0)
            }
            TreeKind::Nop => Value::Int(0),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

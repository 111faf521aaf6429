use std::collections::BTreeMap;
use std::rc::Rc;

use sym::{Expr, Sort};

use crate::context::ModuleContext;
use crate::emulator::{Error, Result};
use crate::instruction::ValueType;
use crate::mem::SymbolicMemory;
use crate::solver::{PathCondition, Solver, Z3Solver};

/// Value of a global variable. The global section of a module provides plain integers and
/// strings; globals written during execution hold expressions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GlobalValue {
    Integer(i64),
    Text(String),
    Symbolic(Expr),
}

impl GlobalValue {
    /// The value as it is pushed on the stack. Plain values become 32-bit constants.
    pub fn to_expr(&self) -> Option<Expr> {
        match self {
            Self::Integer(value) => Some(Expr::bv(*value as u64, 32)),
            Self::Text(text) => parse_integer(text).map(|value| Expr::bv(value, 32)),
            Self::Symbolic(expr) if expr.sort() == Sort::Bool => None,
            Self::Symbolic(expr) => Some(expr.clone()),
        }
    }
}

/// Parse a decimal or `0x` prefixed hexadecimal integer. Negative values are returned in two's
/// complement.
pub(crate) fn parse_integer(text: &str) -> Option<u64> {
    let text = text.trim();
    if let Some(hex) = text.strip_prefix("0x") {
        return u64::from_str_radix(hex, 16).ok();
    }

    text.parse::<u64>()
        .ok()
        .or_else(|| text.parse::<i64>().ok().map(|value| value as u64))
}

/// The control flow edge that produced a state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeType {
    ConditionalTrue(u64),
    ConditionalFalse(u64),
}

impl std::fmt::Display for EdgeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ConditionalTrue(target) => write!(f, "conditional_true_{target}"),
            Self::ConditionalFalse(target) => write!(f, "conditional_false_{target}"),
        }
    }
}

/// Caller state saved when control enters an internal function.
#[derive(Debug, Clone)]
pub struct CallFrame {
    pub caller_func_name: String,
    pub return_block: String,
    pub saved_stack: Vec<Expr>,
    pub saved_locals: BTreeMap<u32, Expr>,
    pub has_return_value: bool,
}

/// A parameter handed to a library model. Constant bit-vectors are concretized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Param {
    Concrete(u64),
    Symbolic(Expr),
}

impl Param {
    pub fn as_concrete(&self) -> Option<u64> {
        match self {
            Self::Concrete(value) => Some(*value),
            Self::Symbolic(_) => None,
        }
    }
}

impl From<Expr> for Param {
    fn from(value: Expr) -> Self {
        match (value.sort(), value.as_bv()) {
            (Sort::BitVec(_), Some(concrete)) => Self::Concrete(concrete),
            _ => Self::Symbolic(value),
        }
    }
}

impl From<u64> for Param {
    fn from(value: u64) -> Self {
        Self::Concrete(value)
    }
}

/// A snapshot of one execution path. Cloning a state forks it: the clone shares no mutable data
/// with the original.
#[derive(Debug, Clone)]
pub struct ExecutionState<S: Solver = Z3Solver> {
    pub symbolic_stack: Vec<Expr>,
    pub local_var: BTreeMap<u32, Expr>,
    pub globals: Rc<BTreeMap<u32, GlobalValue>>,
    pub symbolic_memory: SymbolicMemory,
    pub solver: PathCondition<S>,
    pub context_stack: Vec<CallFrame>,
    pub current_func_name: String,
    pub current_block: String,
    pub edge_type: Option<EdgeType>,

    /// Callee resolved by the most recent `call_indirect`
    pub call_indirect_callee: Option<String>,
}

impl<S: Solver> ExecutionState<S> {
    pub fn new(func_name: impl Into<String>, solver: S) -> Self {
        Self {
            symbolic_stack: Vec::new(),
            local_var: BTreeMap::new(),
            globals: Default::default(),
            symbolic_memory: SymbolicMemory::new(),
            solver: PathCondition::new(solver),
            context_stack: Vec::new(),
            current_func_name: func_name.into(),
            current_block: String::new(),
            edge_type: None,
            call_indirect_callee: None,
        }
    }

    /// Initialize globals, typically from [ModuleContext::globals].
    pub fn with_globals(mut self, globals: BTreeMap<u32, GlobalValue>) -> Self {
        self.globals = Rc::new(globals);
        self
    }

    pub fn push(&mut self, value: Expr) {
        self.symbolic_stack.push(value);
    }

    pub fn pop(&mut self) -> Result<Expr> {
        self.symbolic_stack.pop().ok_or(Error::StackUnderflow)
    }

    pub fn peek(&self) -> Result<&Expr> {
        self.symbolic_stack.last().ok_or(Error::StackUnderflow)
    }

    pub fn local(&self, index: u32) -> Result<&Expr> {
        self.local_var
            .get(&index)
            .ok_or(Error::UninitializedLocal(index))
    }

    pub fn set_local(&mut self, index: u32, value: Expr) {
        self.local_var.insert(index, value);
    }

    /// Zero-initialize the locals declared by a function body, numbered from `first`. Locals
    /// that already hold a value are left unchanged.
    pub fn declare_locals(&mut self, first: u32, types: &[ValueType]) {
        for (index, ty) in (first..).zip(types) {
            self.local_var.entry(index).or_insert_with(|| zero(*ty));
        }
    }

    pub fn global(&self, index: u32) -> Result<Expr> {
        let value = self
            .globals
            .get(&index)
            .ok_or(Error::UndefinedGlobal(index))?;

        value.to_expr().ok_or_else(|| Error::UnsupportedGlobal {
            index,
            value: format!("{value:?}"),
        })
    }

    pub fn set_global(&mut self, index: u32, value: Expr) {
        Rc::make_mut(&mut self.globals).insert(index, GlobalValue::Symbolic(value));
    }

    /// Pop `count` parameters for a library model. Parameters are returned in declaration order.
    pub fn pop_params(&mut self, count: usize) -> Result<Vec<Param>> {
        let mut params = (0..count)
            .map(|_| self.pop().map(Param::from))
            .collect::<Result<Vec<_>>>()?;
        params.reverse();
        Ok(params)
    }

    /// Store the low `size` bytes of `value`. Integers are stored as constants of `8 * size`
    /// bits.
    pub fn store_n(&mut self, address: u64, size: u32, value: impl Into<Param>) -> Result<()> {
        let value = match value.into() {
            Param::Concrete(value) => Expr::bv(value, 8 * size),
            Param::Symbolic(value) => value,
        };

        Ok(self.symbolic_memory.store(address, size, &value)?)
    }

    /// Load `size` bytes. Constant results are concretized.
    pub fn load_n(&self, address: u64, size: u32, context: &ModuleContext) -> Result<Param> {
        let value = self
            .symbolic_memory
            .load(address, size, &context.data_section)?;

        Ok(value.into())
    }
}

/// The zero value of a type.
pub fn zero(ty: ValueType) -> Expr {
    match ty {
        ValueType::I32 => Expr::bv(0, 32),
        ValueType::I64 => Expr::bv(0, 64),
        ValueType::F32 => Expr::f32(0.0),
        ValueType::F64 => Expr::f64(0.0),
    }
}

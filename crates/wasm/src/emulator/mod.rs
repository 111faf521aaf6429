use sym::{Expr, FloatSort, Sort, SortError};
use tracing::{debug, trace, warn};

use crate::context::ModuleContext;
use crate::dispatch::{LibraryModels, NoLibraryModels};
use crate::instruction::{DecodeError, Instruction, OpCode};
use crate::mem;
use crate::solver::{Solver, SolverError};
use crate::state::ExecutionState;

mod arithmetic;
mod bitwise;
mod constant;
mod control;
mod conversion;
mod logical;
mod memory;
mod parametric;
mod variable;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// Error occurred while accessing linear memory.
    #[error(transparent)]
    Memory(#[from] mem::Error),

    #[error(transparent)]
    Solver(#[from] SolverError),

    /// An expression was built from operands of the wrong sort.
    #[error(transparent)]
    Sort(#[from] SortError),

    /// Emulation of this instruction is not implemented, or its operand is malformed.
    #[error("unsupported instruction {instruction}")]
    UnsupportedInstruction { instruction: Box<Instruction> },

    /// An operand or result does not have the sort required by the instruction.
    #[error("{instruction}: expected {expected}, found {actual}")]
    TypeMismatch {
        instruction: Box<Instruction>,
        expected: Sort,
        actual: Sort,
    },

    #[error("pop from empty stack")]
    StackUnderflow,

    #[error("local {0} read before it was written")]
    UninitializedLocal(u32),

    #[error("global {0} is not defined")]
    UndefinedGlobal(u32),

    #[error("global {index} holds unsupported value {value}")]
    UnsupportedGlobal { index: u32, value: String },

    /// The table index of an indirect call is not a constant.
    #[error("symbolic call_indirect target {0}")]
    SymbolicCallTarget(String),

    #[error("unknown function {0}")]
    UnknownFunction(String),

    /// Neither side of a branch is feasible, so the path condition itself is unsatisfiable.
    #[error("no feasible branch at {instruction}")]
    UnreachablePath { instruction: Box<Instruction> },

    /// A branch table produced no successor state.
    #[error("no successor for {instruction}")]
    NoSuccessor { instruction: Box<Instruction> },

    /// A library model violated its calling convention.
    #[error("model of {name} {reason}")]
    ModelContract { name: String, reason: String },

    /// An internal error occurred. This is a fatal error that cannot be safely handled.
    #[error("internal error: {0}")]
    InternalError(String),
}

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureCode {
    AssertFail,
}

/// Normal end of a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    Success { exit_code: i32 },
    Failure { code: FailureCode },
}

/// Outcome of emulating one instruction.
#[derive(Debug, Clone)]
pub enum Transition<S: Solver> {
    /// Execution continues in each of the successor states.
    Continue(Vec<ExecutionState<S>>),

    /// The path ended.
    Halt {
        state: Box<ExecutionState<S>>,
        termination: Termination,
    },
}

impl<S: Solver> Transition<S> {
    pub fn halt(state: ExecutionState<S>, termination: Termination) -> Self {
        Self::Halt {
            state: Box::new(state),
            termination,
        }
    }

    /// The successor states, or `None` if the path ended.
    pub fn into_states(self) -> Option<Vec<ExecutionState<S>>> {
        match self {
            Self::Continue(states) => Some(states),
            Self::Halt { .. } => None,
        }
    }

    pub fn termination(&self) -> Option<Termination> {
        match self {
            Self::Continue(_) => None,
            Self::Halt { termination, .. } => Some(*termination),
        }
    }
}

/// Symbolic emulator of WebAssembly instructions.
#[derive(Debug, Clone)]
pub struct WasmEmulator<L: LibraryModels = NoLibraryModels> {
    context: ModuleContext,
    library: L,
}

impl WasmEmulator {
    /// Create an emulator without library models.
    pub fn new(context: ModuleContext) -> Self {
        Self::with_library(context, NoLibraryModels::default())
    }
}

impl<L: LibraryModels> WasmEmulator<L> {
    pub fn with_library(context: ModuleContext, library: L) -> Self {
        Self { context, library }
    }

    pub fn context(&self) -> &ModuleContext {
        &self.context
    }

    pub fn library(&self) -> &L {
        &self.library
    }

    /// Emulate a single instruction, producing the successor states of `state`.
    pub fn emulate<S: Solver>(
        &self,
        instruction: &Instruction,
        mut state: ExecutionState<S>,
    ) -> Result<Transition<S>> {
        trace!(%instruction, function = %state.current_func_name, "emulate");
        match instruction.op_code {
            OpCode::Control(op) => return self.control(op, instruction, state),
            OpCode::Parametric(op) => return parametric::emulate(op, instruction, state),
            OpCode::Variable(op) => variable::emulate(op, instruction, &mut state)?,
            OpCode::Constant(ty) => constant::emulate(ty, instruction, &mut state)?,
            OpCode::IntArithmetic(width, op) => {
                arithmetic::emulate_int(width, op, instruction, &mut state)?
            }
            OpCode::FloatArithmetic(width, op) => {
                arithmetic::emulate_float(width, op, instruction, &mut state)?
            }
            OpCode::Bitwise(width, op) => bitwise::emulate(width, op, instruction, &mut state)?,
            OpCode::Conversion(op) => conversion::emulate(op, instruction, &mut state)?,
            OpCode::IntCompare(width, op) => {
                logical::emulate_int(width, op, instruction, &mut state)?
            }
            OpCode::FloatCompare(width, op) => {
                logical::emulate_float(width, op, instruction, &mut state)?
            }
            OpCode::Load(op) => memory::load(op, instruction, &mut state, &self.context)?,
            OpCode::Store(op) => memory::store(op, instruction, &mut state)?,
        }

        Ok(Transition::Continue(vec![state]))
    }
}

fn unsupported(instruction: &Instruction) -> Error {
    Error::UnsupportedInstruction {
        instruction: Box::new(instruction.clone()),
    }
}

fn require_sort(value: &Expr, expected: Sort, instruction: &Instruction) -> Result<()> {
    if value.sort() == expected {
        Ok(())
    } else {
        Err(Error::TypeMismatch {
            instruction: Box::new(instruction.clone()),
            expected,
            actual: value.sort(),
        })
    }
}

/// Booleans produced by comparisons become `1` or `0` of the required width. Constant booleans
/// fold and symbolic ones become an `ite` over the two constants.
fn coerce_bitvec(value: Expr, width: u32) -> Result<Expr> {
    if value.sort() != Sort::Bool {
        return Ok(value);
    }

    if value.as_bool().is_none() {
        warn!(%value, width, "boolean operand coerced to bit-vector");
    }

    Ok(value.ite(&Expr::bv(1, width), &Expr::bv(0, width))?)
}

fn pop_bitvec<S: Solver>(
    state: &mut ExecutionState<S>,
    width: u32,
    instruction: &Instruction,
) -> Result<Expr> {
    let value = coerce_bitvec(state.pop()?, width)?;
    require_sort(&value, Sort::BitVec(width), instruction)?;
    Ok(value)
}

fn pop_float<S: Solver>(
    state: &mut ExecutionState<S>,
    sort: FloatSort,
    instruction: &Instruction,
) -> Result<Expr> {
    let value = state.pop()?;
    require_sort(&value, Sort::Float(sort), instruction)?;
    Ok(value)
}

/// Push the canonical form of `value`.
fn push_result<S: Solver>(state: &mut ExecutionState<S>, value: Expr) {
    let value = state.solver.simplify(&value);
    state.push(value);
}

/// Interpret a branch operand as a boolean. Bit-vectors are true when non-zero.
fn condition<S: Solver>(
    state: &ExecutionState<S>,
    value: Expr,
    instruction: &Instruction,
) -> Result<Expr> {
    let condition = match value.sort() {
        Sort::Bool => value,
        Sort::BitVec(width) => value.ne(&Expr::bv(0, width))?,
        actual => {
            return Err(Error::TypeMismatch {
                instruction: Box::new(instruction.clone()),
                expected: Sort::BitVec(32),
                actual,
            })
        }
    };

    Ok(state.solver.simplify(&condition))
}

/// Feasible successors of a two-way branch.
struct Fork<S: Solver> {
    taken: Option<ExecutionState<S>>,
    not_taken: Option<ExecutionState<S>>,
}

/// Split `state` on `condition`. A constant condition selects one side without querying the
/// solver. Otherwise each side is checked against the path condition and the state is copied
/// only if both sides are feasible. Each returned state carries the constraint of its side.
fn fork<S: Solver>(
    mut state: ExecutionState<S>,
    condition: &Expr,
    instruction: &Instruction,
) -> Result<Fork<S>> {
    match condition.as_bool() {
        Some(true) => {
            return Ok(Fork {
                taken: Some(state),
                not_taken: None,
            })
        }
        Some(false) => {
            return Ok(Fork {
                taken: None,
                not_taken: Some(state),
            })
        }
        None => (),
    }

    let negated = condition.bool_not()?;
    let taken_feasible = state.solver.is_feasible(condition)?;
    let not_taken_feasible = state.solver.is_feasible(&negated)?;
    match (taken_feasible, not_taken_feasible) {
        (true, true) => {
            debug!(%condition, function = %state.current_func_name, "forking state");
            let mut other = state.clone();
            state.solver.add(condition.clone())?;
            other.solver.add(negated)?;
            Ok(Fork {
                taken: Some(state),
                not_taken: Some(other),
            })
        }
        (true, false) => {
            state.solver.add(condition.clone())?;
            Ok(Fork {
                taken: Some(state),
                not_taken: None,
            })
        }
        (false, true) => {
            state.solver.add(negated)?;
            Ok(Fork {
                taken: None,
                not_taken: Some(state),
            })
        }
        (false, false) => Err(Error::UnreachablePath {
            instruction: Box::new(instruction.clone()),
        }),
    }
}

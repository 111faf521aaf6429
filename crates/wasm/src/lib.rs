//! Instruction level symbolic execution of WebAssembly.
//!
//! Every instruction is emulated over [sym::Expr] values. Emulating an instruction consumes an
//! [state::ExecutionState] and produces the successor states, each annotated with the path
//! constraints under which it is reachable.
//!
//! ### Emulator
//!
//! [emulator::WasmEmulator] dispatches decoded [instruction::Instruction]s to the semantics
//! modules. It is configured with a [context::ModuleContext] that describes the module under
//! analysis and a [dispatch::LibraryModels] implementation for calls into modeled library
//! functions.
//!
//! ### Solver
//!
//! Branches are only forked when both sides are feasible. Feasibility is decided through the
//! [solver::Solver] trait, implemented by [solver::Z3Solver]. Z3 must be installed locally as a
//! shared library.

/// Module facts shared by every state of an analysis run.
pub mod context;

/// Resolution of call targets to modeled library functions.
pub mod dispatch;

/// WebAssembly instruction emulation.
pub mod emulator;

/// Decoded instructions.
pub mod instruction;

/// Byte addressable symbolic linear memory.
pub mod mem;

/// Path conditions and satisfiability queries.
pub mod solver;

/// The unit of symbolic exploration.
pub mod state;

//! Symbolic values for WebAssembly emulation.
//!
//! An [Expr] is a typed expression over bit-vectors, IEEE floats and booleans. Constructors check
//! operand sorts and fold constant operands, so concrete computations stay concrete. The
//! [Display](std::fmt::Display) form of an expression is an SMT-LIB term.

mod convert;
mod expr;
mod fold;
mod sort;

pub use crate::convert::ConcretizationError;
pub use crate::expr::{
    BoolOp, BvBinaryOp, BvUnaryOp, CompareOp, Expr, FpBinaryOp, FpCompareOp, FpUnaryOp, Node,
    SortError,
};
pub use crate::sort::*;

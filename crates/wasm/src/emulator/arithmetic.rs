use sym::{Expr, FloatSort, RoundingMode};

use super::{pop_bitvec, pop_float, push_result, Result};
use crate::instruction::{FloatArithmeticOp, FloatWidth, Instruction, IntArithmeticOp, IntWidth};
use crate::solver::Solver;
use crate::state::ExecutionState;

/// Rounding mode of WebAssembly float arithmetic
const RNE: RoundingMode = RoundingMode::NearestTiesToEven;

macro_rules! int_binary_op {
    ($state:ident, $instr:ident, $width:expr, $op:ident) => {{
        let rhs = pop_bitvec($state, $width, $instr)?;
        let lhs = pop_bitvec($state, $width, $instr)?;
        lhs.$op(&rhs)?
    }};
}

macro_rules! int_unary_op {
    ($state:ident, $instr:ident, $width:expr, $op:ident) => {{
        pop_bitvec($state, $width, $instr)?.$op()?
    }};
}

pub(super) fn emulate_int<S: Solver>(
    width: IntWidth,
    op: IntArithmeticOp,
    instruction: &Instruction,
    state: &mut ExecutionState<S>,
) -> Result<()> {
    let bits = width.bits();
    let result = match op {
        IntArithmeticOp::Add => int_binary_op!(state, instruction, bits, add),
        IntArithmeticOp::Sub => int_binary_op!(state, instruction, bits, sub),
        IntArithmeticOp::Mul => int_binary_op!(state, instruction, bits, mul),
        IntArithmeticOp::DivS => int_binary_op!(state, instruction, bits, sdiv),
        IntArithmeticOp::DivU => int_binary_op!(state, instruction, bits, udiv),
        IntArithmeticOp::RemS => int_binary_op!(state, instruction, bits, srem),
        IntArithmeticOp::RemU => int_binary_op!(state, instruction, bits, urem),
        IntArithmeticOp::Clz => int_unary_op!(state, instruction, bits, clz),
        IntArithmeticOp::Ctz => int_unary_op!(state, instruction, bits, ctz),
        IntArithmeticOp::Popcnt => int_unary_op!(state, instruction, bits, popcnt),
    };

    push_result(state, result);
    Ok(())
}

pub(super) fn emulate_float<S: Solver>(
    width: FloatWidth,
    op: FloatArithmeticOp,
    instruction: &Instruction,
    state: &mut ExecutionState<S>,
) -> Result<()> {
    use FloatArithmeticOp as Op;

    let sort = width.sort();
    let result = match op {
        Op::Add | Op::Sub | Op::Mul | Op::Div | Op::Min | Op::Max | Op::Copysign => {
            let arg1 = pop_float(state, sort, instruction)?;
            let arg2 = pop_float(state, sort, instruction)?;
            match op {
                Op::Add => arg2.fp_add(RNE, &arg1)?,
                Op::Sub => arg2.fp_sub(RNE, &arg1)?,
                Op::Mul => arg2.fp_mul(RNE, &arg1)?,
                Op::Div => arg2.fp_div(RNE, &arg1)?,
                Op::Min => arg2.fp_min(&arg1)?,
                Op::Max => arg2.fp_max(&arg1)?,
                _ => copysign(sort, &arg1, &arg2)?,
            }
        }
        Op::Sqrt => pop_float(state, sort, instruction)?.fp_sqrt(RNE)?,
        Op::Floor => round(state, sort, instruction, RoundingMode::TowardNegative)?,
        Op::Ceil => round(state, sort, instruction, RoundingMode::TowardPositive)?,
        Op::Trunc => round(state, sort, instruction, RoundingMode::TowardZero)?,
        Op::Nearest => round(state, sort, instruction, RNE)?,
        Op::Abs => pop_float(state, sort, instruction)?.fp_abs()?,
        Op::Neg => pop_float(state, sort, instruction)?.fp_neg()?,
    };

    push_result(state, result);
    Ok(())
}

fn round<S: Solver>(
    state: &mut ExecutionState<S>,
    sort: FloatSort,
    instruction: &Instruction,
    rm: RoundingMode,
) -> Result<Expr> {
    Ok(pop_float(state, sort, instruction)?.fp_round_to_integral(rm)?)
}

/// `magnitude` with the sign bit of `sign`. Operates on the IEEE encoding so NaN payloads are
/// preserved.
fn copysign(sort: FloatSort, magnitude: &Expr, sign: &Expr) -> Result<Expr> {
    let width = sort.width();
    let sign_bit = Expr::bv(1u64 << (width - 1), width);
    let magnitude_mask = Expr::bv(!(1u64 << (width - 1)), width);

    let sign_bits = sign.to_ieee_bv()?.and(&sign_bit)?;
    let result = magnitude
        .to_ieee_bv()?
        .and(&magnitude_mask)?
        .or(&sign_bits)?;

    Ok(result.from_ieee_bv(sort)?)
}

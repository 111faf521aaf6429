use sym::Expr;

use super::{pop_bitvec, pop_float, push_result, Result};
use crate::instruction::{FloatCompareOp, FloatWidth, Instruction, IntCompareOp, IntWidth};
use crate::solver::Solver;
use crate::state::ExecutionState;

// Comparisons push booleans. Consumers expecting an integer coerce them.

pub(super) fn emulate_int<S: Solver>(
    width: IntWidth,
    op: IntCompareOp,
    instruction: &Instruction,
    state: &mut ExecutionState<S>,
) -> Result<()> {
    let bits = width.bits();
    if op == IntCompareOp::Eqz {
        let arg = pop_bitvec(state, bits, instruction)?;
        push_result(state, arg.eq(&Expr::bv(0, bits))?);
        return Ok(());
    }

    let arg1 = pop_bitvec(state, bits, instruction)?;
    let arg2 = pop_bitvec(state, bits, instruction)?;
    let result = match op {
        IntCompareOp::Eqz | IntCompareOp::Eq => arg2.eq(&arg1)?,
        IntCompareOp::Ne => arg2.ne(&arg1)?,
        IntCompareOp::LtS => arg2.slt(&arg1)?,
        IntCompareOp::LtU => arg2.ult(&arg1)?,
        IntCompareOp::GtS => arg2.sgt(&arg1)?,
        IntCompareOp::GtU => arg2.ugt(&arg1)?,
        IntCompareOp::LeS => arg2.sle(&arg1)?,
        IntCompareOp::LeU => arg2.ule(&arg1)?,
        IntCompareOp::GeS => arg2.sge(&arg1)?,
        IntCompareOp::GeU => arg2.uge(&arg1)?,
    };

    push_result(state, result);
    Ok(())
}

/// Float comparisons are false when either operand is NaN, except `ne` which is true.
pub(super) fn emulate_float<S: Solver>(
    width: FloatWidth,
    op: FloatCompareOp,
    instruction: &Instruction,
    state: &mut ExecutionState<S>,
) -> Result<()> {
    let sort = width.sort();
    let arg1 = pop_float(state, sort, instruction)?;
    let arg2 = pop_float(state, sort, instruction)?;
    let result = match op {
        FloatCompareOp::Eq => arg2.fp_eq(&arg1)?,
        FloatCompareOp::Ne => arg2.fp_eq(&arg1)?.bool_not()?,
        FloatCompareOp::Lt => arg2.fp_lt(&arg1)?,
        FloatCompareOp::Gt => arg2.fp_gt(&arg1)?,
        FloatCompareOp::Le => arg2.fp_le(&arg1)?,
        FloatCompareOp::Ge => arg2.fp_ge(&arg1)?,
    };

    push_result(state, result);
    Ok(())
}

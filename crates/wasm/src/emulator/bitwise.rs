use sym::Expr;

use super::{pop_bitvec, push_result, Result};
use crate::instruction::{BitwiseOp, Instruction, IntWidth};
use crate::solver::Solver;
use crate::state::ExecutionState;

/// Emulate a bitwise instruction. Shift amounts are taken modulo the operand width.
pub(super) fn emulate<S: Solver>(
    width: IntWidth,
    op: BitwiseOp,
    instruction: &Instruction,
    state: &mut ExecutionState<S>,
) -> Result<()> {
    let bits = width.bits();
    let arg1 = pop_bitvec(state, bits, instruction)?;
    let arg2 = pop_bitvec(state, bits, instruction)?;
    let shift_amount = || arg1.and(&Expr::bv(u64::from(bits - 1), bits));

    let result = match op {
        BitwiseOp::And => arg2.and(&arg1)?,
        BitwiseOp::Or => arg2.or(&arg1)?,
        BitwiseOp::Xor => arg2.xor(&arg1)?,
        BitwiseOp::Shl => arg2.shl(&shift_amount()?)?,
        BitwiseOp::ShrS => arg2.ashr(&shift_amount()?)?,
        BitwiseOp::ShrU => arg2.lshr(&shift_amount()?)?,
        BitwiseOp::Rotl => arg2.rotl(&arg1)?,
        BitwiseOp::Rotr => arg2.rotr(&arg1)?,
    };

    push_result(state, result);
    Ok(())
}

use sym::FloatSort;

use super::{pop_bitvec, pop_float, push_result, Result};
use crate::context::ModuleContext;
use crate::instruction::{Instruction, LoadOp, MemArg, StoreOp, ValueType};
use crate::mem::{self, concrete_address};
use crate::solver::Solver;
use crate::state::ExecutionState;

/// Effective address of a memory access: the popped base plus the static offset.
fn effective_address<S: Solver>(
    state: &mut ExecutionState<S>,
    instruction: &Instruction,
    size: u32,
) -> Result<u64> {
    let memarg = MemArg::decode(&instruction.operand)?;
    let base = concrete_address(&pop_bitvec(state, 32, instruction)?)?;
    let address = base
        .checked_add(memarg.offset)
        .ok_or(mem::Error::AddressOverflow {
            address: base,
            size,
        })?;

    Ok(address)
}

pub(super) fn load<S: Solver>(
    op: LoadOp,
    instruction: &Instruction,
    state: &mut ExecutionState<S>,
    context: &ModuleContext,
) -> Result<()> {
    let address = effective_address(state, instruction, op.bytes)?;
    let value = state
        .symbolic_memory
        .load(address, op.bytes, &context.data_section)?;

    let extra = op.ty.bits() - 8 * op.bytes;
    let result = match op.ty {
        ValueType::I32 | ValueType::I64 if extra == 0 => value,
        ValueType::I32 | ValueType::I64 if op.signed => value.sign_extend(extra)?,
        ValueType::I32 | ValueType::I64 => value.zero_extend(extra)?,
        ValueType::F32 => value.from_ieee_bv(FloatSort::F32)?,
        ValueType::F64 => value.from_ieee_bv(FloatSort::F64)?,
    };

    push_result(state, result);
    Ok(())
}

pub(super) fn store<S: Solver>(
    op: StoreOp,
    instruction: &Instruction,
    state: &mut ExecutionState<S>,
) -> Result<()> {
    let value = match op.ty {
        ValueType::I32 | ValueType::I64 => pop_bitvec(state, op.ty.bits(), instruction)?,
        ValueType::F32 => pop_float(state, FloatSort::F32, instruction)?.to_ieee_bv()?,
        ValueType::F64 => pop_float(state, FloatSort::F64, instruction)?.to_ieee_bv()?,
    };

    let address = effective_address(state, instruction, op.bytes)?;
    let value = if 8 * op.bytes < op.ty.bits() {
        value.extract(8 * op.bytes - 1, 0)?
    } else {
        value
    };

    state.symbolic_memory.store(address, op.bytes, &value)?;
    Ok(())
}

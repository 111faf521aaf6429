use super::Result;
use crate::instruction::{DecodeError, Instruction, VariableOp};
use crate::solver::Solver;
use crate::state::ExecutionState;

/// Padding emitted before some global indices by TinyGo
const INDEX_PADDING: [u8; 4] = [0x80; 4];

pub(super) fn emulate<S: Solver>(
    op: VariableOp,
    instruction: &Instruction,
    state: &mut ExecutionState<S>,
) -> Result<()> {
    let index = variable_index(&instruction.operand)?;
    match op {
        VariableOp::LocalGet => {
            let value = state.local(index)?.clone();
            state.push(value);
        }
        VariableOp::LocalSet => {
            let value = state.pop()?;
            state.set_local(index, value);
        }
        VariableOp::LocalTee => {
            let value = state.peek()?.clone();
            state.set_local(index, value);
        }
        VariableOp::GlobalGet => {
            let value = state.global(index)?;
            state.push(value);
        }
        VariableOp::GlobalSet => {
            let value = state.pop()?;
            state.set_global(index, value);
        }
    }

    Ok(())
}

/// Read the little-endian variable index.
fn variable_index(operand: &[u8]) -> Result<u32> {
    let operand = operand.strip_prefix(&INDEX_PADDING).unwrap_or(operand);
    if operand.len() > 4 {
        return Err(DecodeError::OperandOverflow.into());
    }

    Ok(operand
        .iter()
        .rev()
        .fold(0, |index, byte| (index << 8) | u32::from(*byte)))
}

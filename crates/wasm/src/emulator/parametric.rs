use super::{condition, fork, Result, Transition};
use crate::instruction::{Instruction, ParametricOp};
use crate::solver::Solver;
use crate::state::ExecutionState;

pub(super) fn emulate<S: Solver>(
    op: ParametricOp,
    instruction: &Instruction,
    mut state: ExecutionState<S>,
) -> Result<Transition<S>> {
    match op {
        ParametricOp::Drop => {
            state.pop()?;
            Ok(Transition::Continue(vec![state]))
        }
        ParametricOp::Select => select(instruction, state),
    }
}

/// Pops the condition, then `arg1`, then `arg2`. A non-zero condition selects `arg2` and a zero
/// condition selects `arg1`. A symbolic condition yields one state per feasible choice.
fn select<S: Solver>(
    instruction: &Instruction,
    mut state: ExecutionState<S>,
) -> Result<Transition<S>> {
    let value = state.pop()?;
    let arg1 = state.pop()?;
    let arg2 = state.pop()?;
    let condition = condition(&state, value, instruction)?;

    let fork = fork(state, &condition, instruction)?;
    let mut states = Vec::with_capacity(2);
    if let Some(mut state) = fork.taken {
        state.push(arg2);
        states.push(state);
    }

    if let Some(mut state) = fork.not_taken {
        state.push(arg1);
        states.push(state);
    }

    Ok(Transition::Continue(states))
}

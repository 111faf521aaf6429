use sym::Expr;
use tracing::info;

use super::{
    condition, fork, pop_bitvec, unsupported, Error, FailureCode, Result, Termination, Transition,
    WasmEmulator,
};
use crate::context::FunctionPrototype;
use crate::dispatch::{ExternalCall, Library, LibraryModels, TERMINATING_FUNCTIONS};
use crate::instruction::{BranchTable, ControlOp, Instruction};
use crate::solver::Solver;
use crate::state::{CallFrame, EdgeType, ExecutionState};

impl<L: LibraryModels> WasmEmulator<L> {
    pub(super) fn control<S: Solver>(
        &self,
        op: ControlOp,
        instruction: &Instruction,
        mut state: ExecutionState<S>,
    ) -> Result<Transition<S>> {
        match op {
            ControlOp::Block
            | ControlOp::Loop
            | ControlOp::End
            | ControlOp::Br
            | ControlOp::Else
            | ControlOp::Return
            | ControlOp::Unreachable => Ok(Transition::Continue(vec![state])),
            ControlOp::Nop if instruction.function_exit => self.restore_context(state),
            ControlOp::Nop => Ok(Transition::Continue(vec![state])),
            ControlOp::If | ControlOp::BrIf => {
                let value = state.pop()?;
                let condition = condition(&state, value, instruction)?;
                self.conditional_branch(state, &condition, instruction)
            }
            ControlOp::BrTable => self.branch_table(state, instruction),
            ControlOp::Call => {
                let offset = call_target(instruction)?;
                self.call(offset, state)
            }
            ControlOp::CallIndirect => self.call_indirect(state),
        }
    }

    fn conditional_branch<S: Solver>(
        &self,
        state: ExecutionState<S>,
        condition: &Expr,
        instruction: &Instruction,
    ) -> Result<Transition<S>> {
        let fork = fork(state, condition, instruction)?;
        let mut states = Vec::with_capacity(2);
        if let Some(mut state) = fork.taken {
            state.edge_type = Some(EdgeType::ConditionalTrue(0));
            states.push(state);
        }

        if let Some(mut state) = fork.not_taken {
            state.edge_type = Some(EdgeType::ConditionalFalse(0));
            states.push(state);
        }

        Ok(Transition::Continue(states))
    }

    /// One successor per distinct branch target whose condition may hold, plus the default
    /// target if the index may be out of range. Conditions are conjoined without querying the
    /// solver.
    fn branch_table<S: Solver>(
        &self,
        mut state: ExecutionState<S>,
        instruction: &Instruction,
    ) -> Result<Transition<S>> {
        let index = pop_bitvec(&mut state, 32, instruction)?;
        let table = BranchTable::decode(&instruction.operand)?;

        // Group table indices by target, in order of first appearance
        let mut targets: Vec<(u64, Vec<u64>)> = Vec::new();
        for (i, &target) in (0u64..).zip(&table.targets) {
            match targets.iter_mut().find(|(existing, _)| *existing == target) {
                Some((_, indices)) => indices.push(i),
                None => targets.push((target, vec![i])),
            }
        }

        let mut states = Vec::new();
        for (target, indices) in targets {
            let matches = indices
                .into_iter()
                .map(|i| index.eq(&Expr::bv(i, 32)))
                .collect::<std::result::Result<Vec<_>, _>>()?;
            let condition = state.solver.simplify(&Expr::any(matches)?);
            if condition.is_false() {
                continue;
            }

            let mut successor = state.clone();
            successor.solver.add(condition)?;
            successor.edge_type = Some(EdgeType::ConditionalTrue(target));
            states.push(successor);
        }

        let count = Expr::bv(table.targets.len() as u64, 32);
        let default = state.solver.simplify(&index.uge(&count)?);
        if !default.is_false() {
            state.solver.add(default)?;
            state.edge_type = Some(EdgeType::ConditionalFalse(0));
            states.push(state);
        }

        if states.is_empty() {
            return Err(Error::NoSuccessor {
                instruction: Box::new(instruction.clone()),
            });
        }

        Ok(Transition::Continue(states))
    }

    fn call_indirect<S: Solver>(&self, mut state: ExecutionState<S>) -> Result<Transition<S>> {
        let value = state.pop()?;
        let element = value
            .as_bv()
            .ok_or_else(|| Error::SymbolicCallTarget(value.to_string()))?;

        let callee = element
            .checked_sub(self.context.table_offset)
            .and_then(|index| self.context.elem_index_to_func.get(&index))
            .ok_or_else(|| Error::UnknownFunction(format!("table element {element}")))?;

        let offset = self
            .context
            .find_prototype(callee)
            .ok_or_else(|| Error::UnknownFunction(callee.clone()))?;

        state.call_indirect_callee = Some(callee.clone());
        self.call(offset, state)
    }

    /// Dispatch a call to the prototype at `offset`.
    fn call<S: Solver>(&self, offset: usize, state: ExecutionState<S>) -> Result<Transition<S>> {
        let prototype = self
            .context
            .prototype(offset)
            .ok_or_else(|| Error::UnknownFunction(format!("function offset {offset}")))?;
        let name = self.context.readable_name(&prototype.name);

        if self.context.instrumentation_hooks && name.starts_with("checker") {
            let index = name
                .split('$')
                .nth(1)
                .and_then(|index| index.parse::<i64>().ok())
                .ok_or_else(|| Error::UnknownFunction(name.to_string()))?;

            let depth = state.context_stack.len();
            let transition = self.library.checker(index, state)?;
            return check_model_contract(name, depth, transition);
        }

        let library = self
            .context
            .source_language
            .library()
            .filter(|library| self.library.is_modeled(name, *library))
            .or_else(|| Some(Library::Wasi).filter(|wasi| self.library.is_modeled(name, *wasi)));
        if let Some(library) = library {
            let call = ExternalCall {
                name,
                library,
                prototype,
                context: &self.context,
            };

            return self.invoke_model(&call, state);
        }

        if TERMINATING_FUNCTIONS.contains(&name) {
            info!(function = name, "termination");
            return Ok(Transition::halt(
                state,
                Termination::Failure {
                    code: FailureCode::AssertFail,
                },
            ));
        }

        self.store_context(prototype, name, state)
    }

    fn invoke_model<S: Solver>(
        &self,
        call: &ExternalCall<'_>,
        state: ExecutionState<S>,
    ) -> Result<Transition<S>> {
        info!(function = call.name, library = %call.library, "invoking model");
        let depth = state.context_stack.len();
        let transition = self.library.invoke(call, state)?;
        check_model_contract(call.name, depth, transition)
    }

    /// Enter an internal function. The callee's parameters are popped into locals `0..N` and the
    /// caller's remaining stack and locals are saved in a new frame.
    fn store_context<S: Solver>(
        &self,
        prototype: &FunctionPrototype,
        callee: &str,
        mut state: ExecutionState<S>,
    ) -> Result<Transition<S>> {
        info!(
            caller = self.context.readable_name(&state.current_func_name),
            callee, "call"
        );

        let args = (0..prototype.params.len())
            .map(|_| state.pop())
            .collect::<Result<Vec<_>>>()?;

        state.context_stack.push(CallFrame {
            caller_func_name: std::mem::replace(&mut state.current_func_name, callee.to_string()),
            return_block: state.current_block.clone(),
            saved_stack: state.symbolic_stack.clone(),
            saved_locals: std::mem::take(&mut state.local_var),
            has_return_value: prototype.has_result(),
        });

        // The last argument is popped first
        state.local_var = (0u32..).zip(args.into_iter().rev()).collect();
        Ok(Transition::Continue(vec![state]))
    }

    /// Return from the current function to the most recent caller. Returning with an empty
    /// context stack ends the path successfully.
    fn restore_context<S: Solver>(&self, mut state: ExecutionState<S>) -> Result<Transition<S>> {
        let Some(frame) = state.context_stack.pop() else {
            info!(
                function = self.context.readable_name(&state.current_func_name),
                "exit"
            );
            return Ok(Transition::halt(state, Termination::Success { exit_code: 0 }));
        };

        info!(
            function = self.context.readable_name(&state.current_func_name),
            "return"
        );

        let return_value = if frame.has_return_value {
            Some(state.pop()?)
        } else {
            None
        };

        state.current_func_name = frame.caller_func_name;
        state.current_block = frame.return_block;
        state.symbolic_stack = frame.saved_stack;
        state.local_var = frame.saved_locals;
        state.symbolic_stack.extend(return_value);
        Ok(Transition::Continue(vec![state]))
    }
}

/// Function offset operand of `call`, in decimal or hexadecimal.
fn call_target(instruction: &Instruction) -> Result<usize> {
    let operand = instruction
        .token(1)
        .ok_or_else(|| unsupported(instruction))?;

    let offset = match operand.strip_prefix("0x") {
        Some(hex) => usize::from_str_radix(hex, 16).ok(),
        None => operand
            .parse::<usize>()
            .ok()
            .or_else(|| usize::from_str_radix(operand, 16).ok()),
    };

    offset.ok_or_else(|| unsupported(instruction))
}

fn check_model_contract<S: Solver>(
    name: &str,
    depth: usize,
    transition: Transition<S>,
) -> Result<Transition<S>> {
    let violation = match &transition {
        Transition::Continue(states) if states.is_empty() => Some("returned no successor states"),
        Transition::Continue(states)
            if states.iter().any(|state| state.context_stack.len() != depth) =>
        {
            Some("modified the call context stack")
        }
        Transition::Halt { state, .. } if state.context_stack.len() != depth => {
            Some("modified the call context stack")
        }
        _ => None,
    };

    match violation {
        Some(reason) => Err(Error::ModelContract {
            name: name.to_string(),
            reason: reason.to_string(),
        }),
        None => Ok(transition),
    }
}

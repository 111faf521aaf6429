use symbolic_wasm::dispatch::LibraryModels;
use symbolic_wasm::emulator::{self, Termination, Transition, WasmEmulator};
use symbolic_wasm::instruction::Instruction;
use symbolic_wasm::solver::{Solver, Z3Solver};
use symbolic_wasm::state::ExecutionState;
use tracing_subscriber::EnvFilter;

pub type State = ExecutionState<Z3Solver>;

/// Route emulator logs to the test output. `RUST_LOG` overrides the default level.
pub fn initialize_logger() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // Only the first test to initialize the subscriber succeeds
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

pub fn entry_state() -> State {
    ExecutionState::new("$func0", Z3Solver::new())
}

/// Instruction without operand bytes, e.g. `i32.const 7`.
pub fn op(text: &str) -> Instruction {
    op_with(text, &[])
}

pub fn op_with(text: &str, operand: &[u8]) -> Instruction {
    let mnemonic = text.split(' ').next().unwrap_or(text);
    Instruction::new(mnemonic, operand, text)
        .unwrap_or_else(|err| panic!("failed to decode {text}: {err}"))
}

/// States reached after executing a program on every path.
#[derive(Debug)]
pub struct Exploration<S: Solver> {
    pub live: Vec<ExecutionState<S>>,
    pub halted: Vec<(ExecutionState<S>, Termination)>,
}

/// Execute `program` in lockstep: each instruction is applied to every live state. Branch
/// targets are not followed, so programs are straight-line sequences that may fork.
pub fn execute<L: LibraryModels, S: Solver>(
    emulator: &WasmEmulator<L>,
    program: &[Instruction],
    state: ExecutionState<S>,
) -> emulator::Result<Exploration<S>> {
    let mut live = vec![state];
    let mut halted = Vec::new();

    for instruction in program {
        let mut successors = Vec::with_capacity(live.len());
        for state in live {
            match emulator.emulate(instruction, state)? {
                Transition::Continue(states) => successors.extend(states),
                Transition::Halt { state, termination } => halted.push((*state, termination)),
            }
        }

        live = successors;
    }

    Ok(Exploration { live, halted })
}

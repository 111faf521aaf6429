use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use sym::{Expr, Sort};
use symbolic_wasm::context::ModuleContext;
use symbolic_wasm::emulator::{Transition, WasmEmulator};
use symbolic_wasm::instruction::Instruction;
use symbolic_wasm::solver::Z3Solver;
use symbolic_wasm::state::ExecutionState;

type State = ExecutionState<Z3Solver>;

fn new_state() -> State {
    ExecutionState::new("$func0", Z3Solver::new())
}

fn instruction(text: &str, operand: &[u8]) -> Instruction {
    let mnemonic = text.split(' ').next().unwrap_or(text);
    Instruction::new(mnemonic, operand, text).expect("failed to decode instruction")
}

fn setup_int_divide_signed() -> (State, Instruction) {
    let mut state = new_state();
    state.push(Expr::bv(0xfedcba9876543210, 64));
    state.push(Expr::bv(0x0123456789abcdef, 64));
    (state, instruction("i64.div_s", &[]))
}

fn setup_symbolic_add() -> (State, Instruction) {
    let mut state = new_state();
    state.push(Expr::var("x", Sort::BitVec(32)));
    state.push(Expr::bv(0x1234, 32));
    (state, instruction("i32.add", &[]))
}

fn setup_float_sqrt() -> (State, Instruction) {
    let mut state = new_state();
    state.push(Expr::f64(2.0));
    (state, instruction("f64.sqrt", &[]))
}

fn setup_store() -> (State, Instruction) {
    let mut state = new_state();
    state.push(Expr::bv(0x5678, 32));
    state.push(Expr::bv(0x1122334455667788, 64));
    (state, instruction("i64.store", &[3, 0]))
}

fn setup_load() -> (State, Instruction) {
    let mut state = new_state();
    state
        .store_n(0x5678, 8, Expr::var("x", Sort::BitVec(64)))
        .expect("failed to write data");
    state.push(Expr::bv(0x5678, 32));
    (state, instruction("i64.load", &[3, 0]))
}

fn setup_branch() -> (State, Instruction) {
    let condition = Expr::var("x", Sort::BitVec(32))
        .ult(&Expr::bv(10, 32))
        .expect("failed to build condition");
    let mut state = new_state();
    state.push(condition);
    (state, instruction("br_if 0", &[]))
}

fn setup_branch_table() -> (State, Instruction) {
    let mut state = new_state();
    state.push(Expr::var("i", Sort::BitVec(32)));
    (state, instruction("br_table 0 1 2 3", &[3, 0, 1, 2, 3]))
}

fn standard_emulator(c: &mut Criterion) {
    let emulator = WasmEmulator::new(ModuleContext::default());

    let benches: [(&str, fn() -> (State, Instruction)); 7] = [
        ("int_divide_signed", setup_int_divide_signed),
        ("symbolic_add", setup_symbolic_add),
        ("float_sqrt", setup_float_sqrt),
        ("store", setup_store),
        ("load", setup_load),
        ("branch", setup_branch),
        ("branch_table", setup_branch_table),
    ];

    for (name, setup) in benches {
        c.bench_function(name, |b| {
            b.iter_batched(
                setup,
                |(state, instruction)| -> Transition<Z3Solver> {
                    emulator
                        .emulate(&instruction, state)
                        .expect("failed to emulate instruction")
                },
                BatchSize::SmallInput,
            )
        });
    }
}

criterion_group!(benches, standard_emulator);
criterion_main!(benches);

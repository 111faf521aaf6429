use std::collections::BTreeMap;

use sym::{Expr, FloatSort, Sort};

use super::*;
use crate::context::ModuleContext;
use crate::emulator::Error;
use crate::instruction::DecodeError;
use crate::mem;
use crate::solver::PathCondition;
use crate::state::GlobalValue;

fn evaluate(texts: &[&str]) -> Result<Expr> {
    let state = run(&emulator(), texts, new_state())?;
    assert_eq!(state.symbolic_stack.len(), 1, "{texts:?}");
    Ok(state.peek()?.clone())
}

fn int_result(texts: &[&str]) -> Result<u64> {
    let result = evaluate(texts)?;
    Ok(result
        .as_bv()
        .unwrap_or_else(|| panic!("{texts:?} produced {result}")))
}

fn bool_result(texts: &[&str]) -> Result<bool> {
    let result = evaluate(texts)?;
    Ok(result
        .as_bool()
        .unwrap_or_else(|| panic!("{texts:?} produced {result}")))
}

fn f64_result(texts: &[&str]) -> Result<f64> {
    let result = evaluate(texts)?;
    assert_eq!(result.sort(), Sort::Float(FloatSort::F64));
    Ok(f64::from_bits(result.as_fp().unwrap_or_else(|| {
        panic!("{texts:?} produced {result}")
    })))
}

fn f32_bits(texts: &[&str]) -> Result<u32> {
    let result = evaluate(texts)?;
    assert_eq!(result.sort(), Sort::Float(FloatSort::F32));
    Ok(result
        .as_fp()
        .unwrap_or_else(|| panic!("{texts:?} produced {result}")) as u32)
}

/// Emulate an instruction with operand bytes that must produce exactly one successor.
fn step_with(text: &str, operand: &[u8], state: State) -> Result<State> {
    let mut states = successors(&emulator(), &with_operand(text, operand)?, state)?;
    assert_eq!(states.len(), 1, "{text} forked");
    Ok(states.remove(0))
}

#[test]
fn integer_arithmetic() -> Result<()> {
    assert_eq!(int_result(&["i32.const 7", "i32.const 3", "i32.div_s"])?, 2);
    assert_eq!(int_result(&["i32.const 10", "i32.const 3", "i32.sub"])?, 7);
    assert_eq!(int_result(&["i32.const 6", "i32.const 7", "i32.mul"])?, 42);
    assert_eq!(
        int_result(&["i32.const -7", "i32.const 3", "i32.rem_s"])?,
        0xFFFF_FFFF
    );
    assert_eq!(int_result(&["i32.const -7", "i32.const 3", "i32.rem_u"])?, 0);
    assert_eq!(
        int_result(&["i32.const 0xFFFFFFFF", "i32.const 1", "i32.add"])?,
        0
    );
    assert_eq!(
        int_result(&["i64.const -1", "i64.const 2", "i64.div_u"])?,
        u64::MAX / 2
    );
    Ok(())
}

#[test]
fn bit_counting() -> Result<()> {
    assert_eq!(int_result(&["i32.const 0", "i32.clz"])?, 32);
    assert_eq!(int_result(&["i64.const 0", "i64.ctz"])?, 64);
    assert_eq!(int_result(&["i32.const 0x00F0", "i32.clz"])?, 24);
    assert_eq!(int_result(&["i32.const 0x00F0", "i32.ctz"])?, 4);
    assert_eq!(int_result(&["i64.const 0x00F0", "i64.popcnt"])?, 4);
    Ok(())
}

#[test]
fn symbolic_arithmetic() -> Result<()> {
    let x = Expr::var("x", Sort::BitVec(32));
    let mut state = new_state();
    state.push(x.clone());

    let state = run(&emulator(), &["i32.const 0", "i32.add"], state)?;
    assert_eq!(state.peek()?, &x.add(&Expr::bv(0, 32))?.simplify());
    assert_eq!(state.peek()?.sort(), Sort::BitVec(32));
    Ok(())
}

#[test]
fn operand_sorts() -> Result<()> {
    let mut state = new_state();
    state.push(Expr::bv(1, 64));
    state.push(Expr::bv(1, 32));
    let result = emulator().emulate(&instruction("i32.add")?, state);
    assert!(matches!(
        result,
        Err(Error::TypeMismatch {
            expected: Sort::BitVec(32),
            actual: Sort::BitVec(64),
            ..
        })
    ));

    let result = emulator().emulate(&instruction("i32.add")?, new_state());
    assert!(matches!(result, Err(Error::StackUnderflow)));
    Ok(())
}

#[test]
fn float_constants() -> Result<()> {
    assert_eq!(f64_result(&["f64.const 0x1.9p+6 (;=100;)"])?, 100.0);
    assert_eq!(f64_result(&["f64.const 0x4059000000000000"])?, 100.0);
    assert_eq!(f32_bits(&["f32.const 0x3f800000"])?, 0x3f80_0000);

    // Short bit patterns are left padded
    assert_eq!(f32_bits(&["f32.const 0x1"])?, 1);

    for literal in ["f32.const 0x123456789", "f32.const 1.5", "f64.const (;=abc;)"] {
        let result = emulator().emulate(&instruction(literal)?, new_state());
        assert!(
            matches!(result, Err(Error::UnsupportedInstruction { .. })),
            "{literal}"
        );
    }

    Ok(())
}

#[test]
fn float_arithmetic() -> Result<()> {
    assert_eq!(
        f64_result(&["f64.const 0x1.9p+6 (;=100;)", "f64.sqrt"])?,
        10.0
    );
    assert_eq!(
        f64_result(&["f64.const (;=10;)", "f64.const (;=4;)", "f64.sub"])?,
        6.0
    );
    assert_eq!(
        f64_result(&["f64.const (;=1;)", "f64.const (;=4;)", "f64.div"])?,
        0.25
    );
    assert_eq!(f64_result(&["f64.const (;=-2.5;)", "f64.abs"])?, 2.5);
    assert_eq!(f64_result(&["f64.const (;=2.5;)", "f64.neg"])?, -2.5);
    Ok(())
}

#[test]
fn rounding() -> Result<()> {
    assert_eq!(f64_result(&["f64.const (;=2.5;)", "f64.nearest"])?, 2.0);
    assert_eq!(f64_result(&["f64.const (;=3.5;)", "f64.nearest"])?, 4.0);
    assert_eq!(f64_result(&["f64.const (;=-1.5;)", "f64.floor"])?, -2.0);
    assert_eq!(f64_result(&["f64.const (;=1.2;)", "f64.ceil"])?, 2.0);
    assert_eq!(f64_result(&["f64.const (;=-1.7;)", "f64.trunc"])?, -1.0);
    Ok(())
}

#[test]
fn copysign() -> Result<()> {
    // The magnitude is taken from the top of the stack and the sign from the value below it
    assert_eq!(
        f64_result(&["f64.const (;=2;)", "f64.const (;=-3;)", "f64.copysign"])?,
        3.0
    );
    assert_eq!(
        f64_result(&["f64.const (;=-2;)", "f64.const (;=3;)", "f64.copysign"])?,
        -3.0
    );

    // NaN payloads survive
    assert_eq!(
        f32_bits(&["f32.const (;=-1;)", "f32.const 0x7fc00001", "f32.copysign"])?,
        0xffc0_0001
    );
    Ok(())
}

#[test]
fn min_max() -> Result<()> {
    assert_eq!(
        f32_bits(&["f32.const 0x7fc00000", "f32.const (;=1;)", "f32.min"])?,
        0x7fc0_0000
    );
    assert_eq!(
        f64_result(&["f64.const (;=1;)", "f64.const (;=2;)", "f64.max"])?,
        2.0
    );
    assert_eq!(
        f64_result(&["f64.const (;=0;)", "f64.const (;=-0;)", "f64.min"])?.to_bits(),
        (-0.0f64).to_bits()
    );
    Ok(())
}

#[test]
fn bitwise() -> Result<()> {
    assert_eq!(int_result(&["i32.const 0xF0", "i32.const 0x3C", "i32.and"])?, 0x30);
    assert_eq!(int_result(&["i32.const 0xF0", "i32.const 0x0F", "i32.or"])?, 0xFF);
    assert_eq!(int_result(&["i32.const 0xFF", "i32.const 0x0F", "i32.xor"])?, 0xF0);

    // Shift amounts wrap at the operand width
    assert_eq!(int_result(&["i32.const 1", "i32.const 33", "i32.shl"])?, 2);
    assert_eq!(int_result(&["i64.const 1", "i64.const 65", "i64.shl"])?, 2);
    assert_eq!(
        int_result(&["i32.const 0x80000000", "i32.const 4", "i32.shr_s"])?,
        0xF800_0000
    );
    assert_eq!(
        int_result(&["i32.const 0x80000000", "i32.const 36", "i32.shr_u"])?,
        0x0800_0000
    );
    assert_eq!(
        int_result(&["i32.const 0x80000001", "i32.const 1", "i32.rotl"])?,
        3
    );
    assert_eq!(
        int_result(&["i32.const 0x80000001", "i32.const 1", "i32.rotr"])?,
        0xC000_0000
    );
    Ok(())
}

#[test]
fn comparisons() -> Result<()> {
    assert!(bool_result(&["i32.const 3", "i32.const 5", "i32.lt_u"])?);
    assert!(bool_result(&["i32.const -1", "i32.const 0", "i32.lt_s"])?);
    assert!(!bool_result(&["i32.const -1", "i32.const 0", "i32.lt_u"])?);
    assert!(bool_result(&["i64.const 5", "i64.const 5", "i64.ge_s"])?);
    assert!(!bool_result(&["i64.const 5", "i64.const 5", "i64.ne"])?);
    assert!(bool_result(&["i32.const 0", "i32.eqz"])?);
    assert!(!bool_result(&["i32.const 9", "i32.eqz"])?);

    assert!(bool_result(&["f32.const (;=1;)", "f32.const (;=2;)", "f32.lt"])?);
    assert!(!bool_result(&["f32.const (;=1;)", "f32.const (;=2;)", "f32.ge"])?);

    let nan = "f64.const 0x7ff8000000000000";
    assert!(!bool_result(&[nan, nan, "f64.eq"])?);
    assert!(bool_result(&[nan, nan, "f64.ne"])?);
    assert!(!bool_result(&[nan, "f64.const (;=1;)", "f64.gt"])?);
    Ok(())
}

#[test]
fn boolean_operands() -> Result<()> {
    assert_eq!(
        int_result(&["i32.const 1", "i32.const 2", "i32.lt_s", "i32.const 1", "i32.add"])?,
        2
    );
    assert_eq!(
        int_result(&["i32.const 3", "i32.const 2", "i32.lt_s", "i32.const 1", "i32.add"])?,
        1
    );

    let x = Expr::var("x", Sort::BitVec(32));
    let mut state = new_state();
    state.push(x.clone());
    let state = run(
        &emulator(),
        &["i32.const 5", "i32.lt_s", "i32.const 1", "i32.add"],
        state,
    )?;

    let less = x.slt(&Expr::bv(5, 32))?;
    let expected = less.ite(&Expr::bv(2, 32), &Expr::bv(1, 32))?;
    assert_eq!(state.peek()?.sort(), Sort::BitVec(32));
    assert_eq!(state.peek()?.as_bv(), None);
    let mut path = PathCondition::new(Z3Solver::new());
    assert!(!path.is_feasible(&state.peek()?.ne(&expected)?)?);
    Ok(())
}

#[test]
fn integer_conversions() -> Result<()> {
    assert_eq!(
        int_result(&["i64.const 0x100000005", "i32.wrap_i64"])?,
        5
    );
    assert_eq!(
        int_result(&["i32.const -1", "i64.extend_i32_s"])?,
        u64::MAX
    );
    assert_eq!(
        int_result(&["i32.const -1", "i64.extend_u/i32"])?,
        0xFFFF_FFFF
    );
    assert_eq!(int_result(&["i32.const 0x80", "i32.extend8_s"])?, 0xFFFF_FF80);
    assert_eq!(int_result(&["i32.const 0x80", "i32.extend_s/i8"])?, 0xFFFF_FF80);
    assert_eq!(int_result(&["i32.const 0x17F", "i32.extend8_s"])?, 0x7F);
    assert_eq!(
        int_result(&["i64.const 0x80000000", "i64.extend32_s"])?,
        0xFFFF_FFFF_8000_0000
    );
    Ok(())
}

#[test]
fn narrow_extension_operand() -> Result<()> {
    let mut state = new_state();
    state.push(Expr::var("b", Sort::BitVec(8)));

    let result = emulator().emulate(&instruction("i32.extend8_s")?, state);
    assert!(matches!(
        result,
        Err(Error::TypeMismatch {
            expected: Sort::BitVec(32),
            actual: Sort::BitVec(8),
            ..
        })
    ));

    let byte = Expr::var("b", Sort::BitVec(32));
    let mut state = new_state();
    state.push(byte.clone());
    let state = step(&emulator(), "i32.extend8_s", state)?;
    assert_eq!(state.peek()?, &byte.extract(7, 0)?.sign_extend(24)?);
    Ok(())
}

#[test]
fn float_conversions() -> Result<()> {
    assert_eq!(
        int_result(&["f64.const (;=-3.7;)", "i32.trunc_f64_s"])?,
        0xFFFF_FFFD
    );
    assert_eq!(int_result(&["f32.const (;=3.9;)", "i64.trunc_f32_u"])?, 3);
    assert_eq!(
        f64_result(&["i32.const -1", "f64.convert_i32_u"])?,
        4294967295.0
    );
    assert_eq!(f64_result(&["i32.const -1", "f64.convert_i32_s"])?, -1.0);
    assert_eq!(f64_result(&["f32.const (;=1.5;)", "f64.promote_f32"])?, 1.5);
    assert_eq!(
        f32_bits(&["f64.const (;=1.5;)", "f32.demote_f64"])?,
        1.5f32.to_bits()
    );
    Ok(())
}

#[test]
fn reinterpret() -> Result<()> {
    // A NaN with a payload keeps its exact encoding
    assert_eq!(
        int_result(&[
            "i32.const 0x7FC00001",
            "f32.reinterpret_i32",
            "i32.reinterpret_f32"
        ])?,
        0x7FC0_0001
    );
    assert_eq!(
        int_result(&["f64.const (;=1;)", "i64.reinterpret/f64"])?,
        1.0f64.to_bits()
    );

    let x = Expr::var("x", Sort::BitVec(32));
    let mut state = new_state();
    state.push(x.clone());
    let state = run(
        &emulator(),
        &["f32.reinterpret_i32", "i32.reinterpret_f32"],
        state,
    )?;
    assert_eq!(state.peek()?, &x);
    Ok(())
}

#[test]
fn conversion_type_mismatch() -> Result<()> {
    let mut state = new_state();
    state.push(Expr::bv(1, 32));
    let result = emulator().emulate(&instruction("f64.promote_f32")?, state);
    assert!(matches!(
        result,
        Err(Error::TypeMismatch {
            expected: Sort::Float(FloatSort::F32),
            actual: Sort::BitVec(32),
            ..
        })
    ));
    Ok(())
}

#[test]
fn select() -> Result<()> {
    let select = |condition: &str| {
        int_result(&["i32.const 9", "i32.const 5", condition, "select"])
    };

    assert_eq!(select("i32.const 0")?, 5);
    assert_eq!(select("i32.const 1")?, 9);
    assert_eq!(select("i32.const -3")?, 9);
    Ok(())
}

#[test]
fn symbolic_select() -> Result<()> {
    let mut state = new_state();
    state.push(Expr::bv(9, 32));
    state.push(Expr::bv(5, 32));
    state.push(Expr::var("c", Sort::BitVec(32)));

    let states = successors(&emulator(), &instruction("select")?, state)?;
    assert_eq!(states.len(), 2);

    let values = states
        .iter()
        .map(|state| state.peek().map(Expr::as_bv))
        .collect::<Result<Vec<_>>>()?;
    assert_eq!(values, vec![Some(9), Some(5)]);
    assert!(states
        .iter()
        .all(|state| state.solver.constraints().len() == 1));
    Ok(())
}

#[test]
fn drop() -> Result<()> {
    assert_eq!(int_result(&["i32.const 1", "i32.const 2", "drop"])?, 1);
    Ok(())
}

#[test]
fn locals() -> Result<()> {
    let state = step(&emulator(), "i32.const 4", new_state())?;
    let state = step_with("local.set", &[1], state)?;
    assert!(state.symbolic_stack.is_empty());

    let state = step_with("get_local", &[1], state)?;
    let state = step_with("local.tee", &[2], state)?;
    assert_eq!(state.peek()?.as_bv(), Some(4));
    assert_eq!(state.local(2)?.as_bv(), Some(4));

    let result = emulator().emulate(&with_operand("local.get", [7u8])?, state);
    assert!(matches!(result, Err(Error::UninitializedLocal(7))));
    Ok(())
}

#[test]
fn globals() -> Result<()> {
    let globals = BTreeMap::from([(2, GlobalValue::Integer(11))]);
    let state = new_state().with_globals(globals);

    // Some producers pad the index with continuation bytes
    let state = step_with("global.get", &[0x80, 0x80, 0x80, 0x80, 0x02], state)?;
    assert_eq!(state.peek()?.as_bv(), Some(11));

    let state = step(&emulator(), "i32.const 12", state)?;
    let state = step_with("set_global", &[0x02], state)?;
    assert_eq!(state.global(2)?.as_bv(), Some(12));

    let result = emulator().emulate(&with_operand("global.get", [1u8, 2, 3, 4, 5])?, state);
    assert!(matches!(
        result,
        Err(Error::Decode(DecodeError::OperandOverflow))
    ));
    Ok(())
}

#[test]
fn memory() -> Result<()> {
    // Store at 0x100 with a static offset of 4
    let state = run(
        &emulator(),
        &["i32.const 0x100", "i32.const 0x11223344"],
        new_state(),
    )?;
    let state = step_with("i32.store", &[0x02, 0x04], state)?;
    assert!(state.symbolic_stack.is_empty());

    let state = step(&emulator(), "i32.const 0x100", state)?;
    let state = step_with("i32.load8_u", &[0x00, 0x05], state)?;
    assert_eq!(state.peek()?.as_bv(), Some(0x33));

    let state = step(&emulator(), "i32.const 0x104", state)?;
    let state = step_with("i64.load", &[0x03, 0x00], state)?;
    assert_eq!(state.peek()?.as_bv(), Some(0x11223344));

    let state = run(&emulator(), &["i32.const 0x200", "i64.const -2"], state)?;
    let state = step_with("i64.store8", &[0x00, 0x00], state)?;
    let state = step(&emulator(), "i32.const 0x200", state)?;
    let state = step_with("i32.load8_s", &[0x00, 0x00], state)?;
    assert_eq!(state.peek()?.as_bv(), Some(0xFFFF_FFFE));
    Ok(())
}

#[test]
fn float_memory() -> Result<()> {
    let state = run(
        &emulator(),
        &["i32.const 8", "f64.const (;=1.5;)"],
        new_state(),
    )?;
    let state = step_with("f64.store", &[0x03, 0x00], state)?;
    let state = step(&emulator(), "i32.const 8", state)?;
    let state = step_with("f64.load", &[0x03, 0x00], state)?;
    assert_eq!(state.peek()?, &Expr::f64(1.5));

    let state = step(&emulator(), "i32.const 12", state)?;
    let state = step_with("i32.load", &[0x02, 0x00], state)?;
    assert_eq!(state.peek()?.as_bv(), Some(1.5f64.to_bits() >> 32));
    Ok(())
}

#[test]
fn data_section_memory() -> Result<()> {
    let mut context = ModuleContext::default();
    context.data_section.insert(0x400, *b"\x01\x02\x03\x04");
    let emulator = WasmEmulator::new(context);

    let state = step(&emulator, "i32.const 0x400", new_state())?;
    let mut states = successors(&emulator, &with_operand("i32.load", [2u8, 0])?, state)?;
    assert_eq!(states.remove(0).peek()?.as_bv(), Some(0x04030201));
    Ok(())
}

#[test]
fn symbolic_address() -> Result<()> {
    let mut state = new_state();
    state.push(Expr::var("p", Sort::BitVec(32)));
    let result = emulator().emulate(&with_operand("i32.load", [2u8, 0])?, state);
    assert!(matches!(
        result,
        Err(Error::Memory(mem::Error::SymbolicAddress(_)))
    ));
    Ok(())
}

use sym::{Expr, FloatSort};

use super::{unsupported, Result};
use crate::instruction::{Instruction, ValueType};
use crate::solver::Solver;
use crate::state::{parse_integer, ExecutionState};

/// Push the literal of a `const` instruction. The literal is the last token of the text form.
///
/// Float literals are read from a `(;=decimal;)` annotation when present, otherwise from a
/// hexadecimal bit pattern which is left padded with zeros to the width of the type.
pub(super) fn emulate<S: Solver>(
    ty: ValueType,
    instruction: &Instruction,
    state: &mut ExecutionState<S>,
) -> Result<()> {
    let literal = instruction
        .last_token()
        .ok_or_else(|| unsupported(instruction))?;

    let value = match ty {
        ValueType::I32 | ValueType::I64 => {
            parse_integer(literal).map(|value| Expr::bv(value, ty.bits()))
        }
        ValueType::F32 => float_literal(literal, FloatSort::F32),
        ValueType::F64 => float_literal(literal, FloatSort::F64),
    };

    state.push(value.ok_or_else(|| unsupported(instruction))?);
    Ok(())
}

fn float_literal(literal: &str, sort: FloatSort) -> Option<Expr> {
    match annotation(literal) {
        Some(decimal) if sort == FloatSort::F32 => decimal.parse::<f32>().ok().map(Expr::f32),
        Some(decimal) => decimal.parse::<f64>().ok().map(Expr::f64),
        None => bit_pattern(literal, sort.width() as usize / 4).map(|bits| Expr::fp(bits, sort)),
    }
}

fn annotation(literal: &str) -> Option<&str> {
    literal.strip_prefix("(;=")?.strip_suffix(";)")
}

/// Parse at most `digits` hex digits after a `0x` prefix.
fn bit_pattern(literal: &str, digits: usize) -> Option<u64> {
    let hex = literal.strip_prefix("0x")?;
    if hex.is_empty() || hex.len() > digits {
        return None;
    }

    u64::from_str_radix(hex, 16).ok()
}

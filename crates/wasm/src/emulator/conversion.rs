use sym::{FloatSort, RoundingMode, Sort};

use super::{pop_bitvec, pop_float, push_result, require_sort, Result};
use crate::instruction::{ConversionOp, FloatWidth, Instruction, IntWidth};
use crate::solver::Solver;
use crate::state::ExecutionState;

pub(super) fn emulate<S: Solver>(
    op: ConversionOp,
    instruction: &Instruction,
    state: &mut ExecutionState<S>,
) -> Result<()> {
    let (result, expected) = match op {
        ConversionOp::Wrap => (
            pop_bitvec(state, 64, instruction)?.extract(31, 0)?,
            Sort::BitVec(32),
        ),
        ConversionOp::Extend { signed } => {
            let arg = pop_bitvec(state, 32, instruction)?;
            let result = if signed {
                arg.sign_extend(32)?
            } else {
                arg.zero_extend(32)?
            };

            (result, Sort::BitVec(64))
        }
        ConversionOp::ExtendLow { width, from_bits } => {
            let bits = width.bits();
            let low = pop_bitvec(state, bits, instruction)?.extract(from_bits - 1, 0)?;
            (low.sign_extend(bits - from_bits)?, Sort::BitVec(bits))
        }
        ConversionOp::Truncate { signed, to, from } => {
            let arg = pop_float(state, from.sort(), instruction)?;
            let result = if signed {
                arg.fp_to_sbv(RoundingMode::TowardZero, to.bits())?
            } else {
                arg.fp_to_ubv(RoundingMode::TowardZero, to.bits())?
            };

            (result, Sort::BitVec(to.bits()))
        }
        ConversionOp::Demote => (
            pop_float(state, FloatSort::F64, instruction)?
                .fp_to_fp(RoundingMode::NearestTiesToEven, FloatSort::F32)?,
            Sort::Float(FloatSort::F32),
        ),
        ConversionOp::Promote => (
            pop_float(state, FloatSort::F32, instruction)?
                .fp_to_fp(RoundingMode::NearestTiesToEven, FloatSort::F64)?,
            Sort::Float(FloatSort::F64),
        ),
        ConversionOp::Convert { signed, to, from } => {
            let arg = pop_bitvec(state, from.bits(), instruction)?;
            let result = if signed {
                arg.sbv_to_fp(RoundingMode::NearestTiesToEven, to.sort())?
            } else {
                arg.ubv_to_fp(RoundingMode::NearestTiesToEven, to.sort())?
            };

            (result, Sort::Float(to.sort()))
        }
        ConversionOp::ReinterpretFloat(width) => (
            pop_float(state, width.sort(), instruction)?.to_ieee_bv()?,
            Sort::BitVec(width.bits()),
        ),
        ConversionOp::ReinterpretInt(width) => {
            let sort = float_of(width).sort();
            (
                pop_bitvec(state, width.bits(), instruction)?.from_ieee_bv(sort)?,
                Sort::Float(sort),
            )
        }
    };

    require_sort(&result, expected, instruction)?;
    push_result(state, result);
    Ok(())
}

/// The float type sharing the width of an integer type.
fn float_of(width: IntWidth) -> FloatWidth {
    match width {
        IntWidth::W32 => FloatWidth::F32,
        IntWidth::W64 => FloatWidth::F64,
    }
}

//! Concrete evaluation used to fold constant operands. Integer operations follow the SMT-LIB
//! bit-vector semantics, which are total. Floating-point operations are only folded for the
//! single and double precision formats and only for the rounding modes natively supported.

use crate::sort::{FloatSort, RoundingMode};

pub(crate) fn mask(width: u32) -> u64 {
    if width >= u64::BITS {
        u64::MAX
    } else {
        (1u64 << width) - 1
    }
}

pub(crate) fn sign_bit(value: u64, width: u32) -> bool {
    (value >> (width - 1)) & 1 == 1
}

/// Interpret the low `width` bits of `value` as a two's complement integer.
pub(crate) fn to_signed(value: u64, width: u32) -> i64 {
    let shift = u64::BITS - width;
    ((value << shift) as i64) >> shift
}

pub(crate) fn sign_extend(value: u64, from: u32, to: u32) -> u64 {
    (to_signed(value, from) as u64) & mask(to)
}

pub(crate) fn udiv(lhs: u64, rhs: u64, width: u32) -> u64 {
    if rhs == 0 {
        mask(width)
    } else {
        lhs / rhs
    }
}

pub(crate) fn urem(lhs: u64, rhs: u64) -> u64 {
    if rhs == 0 {
        lhs
    } else {
        lhs % rhs
    }
}

pub(crate) fn sdiv(lhs: u64, rhs: u64, width: u32) -> u64 {
    if rhs == 0 {
        return if sign_bit(lhs, width) { 1 } else { mask(width) };
    }

    let quotient = to_signed(lhs, width).wrapping_div(to_signed(rhs, width));
    (quotient as u64) & mask(width)
}

pub(crate) fn srem(lhs: u64, rhs: u64, width: u32) -> u64 {
    if rhs == 0 {
        return lhs;
    }

    let remainder = to_signed(lhs, width).wrapping_rem(to_signed(rhs, width));
    (remainder as u64) & mask(width)
}

pub(crate) fn shl(lhs: u64, rhs: u64, width: u32) -> u64 {
    if rhs >= u64::from(width) {
        0
    } else {
        (lhs << rhs) & mask(width)
    }
}

pub(crate) fn lshr(lhs: u64, rhs: u64, width: u32) -> u64 {
    if rhs >= u64::from(width) {
        0
    } else {
        lhs >> rhs
    }
}

pub(crate) fn ashr(lhs: u64, rhs: u64, width: u32) -> u64 {
    let amount = rhs.min(u64::from(width) - 1);
    ((to_signed(lhs, width) >> amount) as u64) & mask(width)
}

pub(crate) fn rotl(lhs: u64, rhs: u64, width: u32) -> u64 {
    let amount = (rhs % u64::from(width)) as u32;
    if amount == 0 {
        return lhs;
    }

    ((lhs << amount) | (lhs >> (width - amount))) & mask(width)
}

pub(crate) fn rotr(lhs: u64, rhs: u64, width: u32) -> u64 {
    let amount = (rhs % u64::from(width)) as u32;
    if amount == 0 {
        return lhs;
    }

    ((lhs >> amount) | (lhs << (width - amount))) & mask(width)
}

pub(crate) fn clz(value: u64, width: u32) -> u64 {
    if value == 0 {
        u64::from(width)
    } else {
        u64::from(value.leading_zeros() - (u64::BITS - width))
    }
}

pub(crate) fn ctz(value: u64, width: u32) -> u64 {
    if value == 0 {
        u64::from(width)
    } else {
        u64::from(value.trailing_zeros())
    }
}

/// A natively supported float value.
#[derive(Debug, Clone, Copy)]
enum Native {
    Single(f32),
    Double(f64),
}

impl Native {
    fn decode(bits: u64, sort: FloatSort) -> Option<Self> {
        if sort == FloatSort::F32 {
            Some(Native::Single(f32::from_bits(bits as u32)))
        } else if sort == FloatSort::F64 {
            Some(Native::Double(f64::from_bits(bits)))
        } else {
            None
        }
    }

    fn bits(self) -> u64 {
        match self {
            Native::Single(value) => u64::from(value.to_bits()),
            Native::Double(value) => value.to_bits(),
        }
    }

    fn as_f64(self) -> f64 {
        match self {
            Native::Single(value) => f64::from(value),
            Native::Double(value) => value,
        }
    }
}

macro_rules! native_binary {
    ($lhs:ident, $rhs:ident, $op:tt) => {
        match ($lhs, $rhs) {
            (Native::Single(x), Native::Single(y)) => Some(Native::Single(x $op y).bits()),
            (Native::Double(x), Native::Double(y)) => Some(Native::Double(x $op y).bits()),
            _ => None,
        }
    };
}

pub(crate) fn is_nan(bits: u64, sort: FloatSort) -> bool {
    let exponent = (bits >> sort.mantissa_bits()) & mask(sort.ebits);
    let mantissa = bits & mask(sort.mantissa_bits());
    exponent == mask(sort.ebits) && mantissa != 0
}

/// `fp.isNegative` is false for NaN values regardless of the sign bit.
pub(crate) fn is_negative(bits: u64, sort: FloatSort) -> bool {
    sign_bit(bits, sort.width()) && !is_nan(bits, sort)
}

pub(crate) fn abs(bits: u64, sort: FloatSort) -> u64 {
    bits & !(1 << (sort.width() - 1))
}

pub(crate) fn neg(bits: u64, sort: FloatSort) -> u64 {
    bits ^ (1 << (sort.width() - 1))
}

pub(crate) fn sqrt(bits: u64, sort: FloatSort, rm: RoundingMode) -> Option<u64> {
    if rm != RoundingMode::NearestTiesToEven {
        return None;
    }

    match Native::decode(bits, sort)? {
        Native::Single(x) => Some(Native::Single(x.sqrt()).bits()),
        Native::Double(x) => Some(Native::Double(x.sqrt()).bits()),
    }
}

pub(crate) fn round_to_integral(bits: u64, sort: FloatSort, rm: RoundingMode) -> Option<u64> {
    let rounded = match Native::decode(bits, sort)? {
        Native::Single(x) => Native::Single(match rm {
            RoundingMode::NearestTiesToEven => x.round_ties_even(),
            RoundingMode::TowardPositive => x.ceil(),
            RoundingMode::TowardNegative => x.floor(),
            RoundingMode::TowardZero => x.trunc(),
        }),
        Native::Double(x) => Native::Double(match rm {
            RoundingMode::NearestTiesToEven => x.round_ties_even(),
            RoundingMode::TowardPositive => x.ceil(),
            RoundingMode::TowardNegative => x.floor(),
            RoundingMode::TowardZero => x.trunc(),
        }),
    };

    Some(rounded.bits())
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum Arithmetic {
    Add,
    Sub,
    Mul,
    Div,
}

pub(crate) fn arithmetic(
    op: Arithmetic,
    lhs: u64,
    rhs: u64,
    sort: FloatSort,
    rm: RoundingMode,
) -> Option<u64> {
    if rm != RoundingMode::NearestTiesToEven {
        return None;
    }

    let lhs = Native::decode(lhs, sort)?;
    let rhs = Native::decode(rhs, sort)?;
    match op {
        Arithmetic::Add => native_binary!(lhs, rhs, +),
        Arithmetic::Sub => native_binary!(lhs, rhs, -),
        Arithmetic::Mul => native_binary!(lhs, rhs, *),
        Arithmetic::Div => native_binary!(lhs, rhs, /),
    }
}

/// WebAssembly `min`/`max`: NaN operands produce NaN and negative zero orders below positive
/// zero.
pub(crate) fn min_max(lhs: u64, rhs: u64, sort: FloatSort, is_max: bool) -> Option<u64> {
    let x = Native::decode(lhs, sort)?.as_f64();
    let y = Native::decode(rhs, sort)?.as_f64();

    if x.is_nan() {
        return Some(lhs);
    }

    if y.is_nan() {
        return Some(rhs);
    }

    if x == 0.0 && y == 0.0 {
        let lhs_negative = sign_bit(lhs, sort.width());
        let rhs_negative = sign_bit(rhs, sort.width());
        let pick_lhs = if is_max {
            !lhs_negative || rhs_negative
        } else {
            lhs_negative || !rhs_negative
        };
        return Some(if pick_lhs { lhs } else { rhs });
    }

    let pick_lhs = if is_max { x >= y } else { x <= y };
    Some(if pick_lhs { lhs } else { rhs })
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum Comparison {
    Eq,
    Lt,
    Le,
}

pub(crate) fn compare(op: Comparison, lhs: u64, rhs: u64, sort: FloatSort) -> Option<bool> {
    let x = Native::decode(lhs, sort)?.as_f64();
    let y = Native::decode(rhs, sort)?.as_f64();
    Some(match op {
        Comparison::Eq => x == y,
        Comparison::Lt => x < y,
        Comparison::Le => x <= y,
    })
}

/// Convert a float to an integer of the given width. Values that are NaN, infinite, or out of
/// range after rounding are unspecified and are not folded.
pub(crate) fn to_integer(
    bits: u64,
    sort: FloatSort,
    rm: RoundingMode,
    signed: bool,
    width: u32,
) -> Option<u64> {
    let rounded = Native::decode(round_to_integral(bits, sort, rm)?, sort)?.as_f64();
    if !rounded.is_finite() {
        return None;
    }

    // Powers of two are exactly representable so these bounds are exact.
    let limit = 2f64.powi(width as i32);
    if signed {
        let half = limit / 2.0;
        if rounded < -half || rounded >= half {
            return None;
        }
        Some((rounded as i64 as u64) & mask(width))
    } else {
        // Negative zero compares equal to zero and is in range
        if rounded < 0.0 || rounded >= limit {
            return None;
        }
        Some(rounded as u64)
    }
}

pub(crate) fn from_integer(
    value: u64,
    width: u32,
    signed: bool,
    sort: FloatSort,
    rm: RoundingMode,
) -> Option<u64> {
    if rm != RoundingMode::NearestTiesToEven {
        return None;
    }

    // Rust integer to float casts round to nearest, ties to even.
    let converted = if sort == FloatSort::F32 {
        if signed {
            Native::Single(to_signed(value, width) as f32)
        } else {
            Native::Single(value as f32)
        }
    } else if sort == FloatSort::F64 {
        if signed {
            Native::Double(to_signed(value, width) as f64)
        } else {
            Native::Double(value as f64)
        }
    } else {
        return None;
    };

    Some(converted.bits())
}

pub(crate) fn convert_float(
    bits: u64,
    from: FloatSort,
    to: FloatSort,
    rm: RoundingMode,
) -> Option<u64> {
    if from == to {
        return Some(bits);
    }

    match Native::decode(bits, from)? {
        // Promotion is exact
        Native::Single(x) if to == FloatSort::F64 => Some(Native::Double(f64::from(x)).bits()),
        Native::Double(x) if to == FloatSort::F32 && rm == RoundingMode::NearestTiesToEven => {
            Some(Native::Single(x as f32).bits())
        }
        _ => None,
    }
}

use crate::expr::Expr;
use crate::sort::{FloatSort, Sort};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ConcretizationError {
    /// The expression is not a constant.
    #[error("expression is symbolic: {0}")]
    Symbolic(String),

    /// The constant does not have the sort required by the target type.
    #[error("expected {expected}, found {actual}")]
    WrongSort { expected: Sort, actual: Sort },
}

fn require_sort(expr: &Expr, expected: Sort) -> Result<(), ConcretizationError> {
    if expr.sort() == expected {
        Ok(())
    } else {
        Err(ConcretizationError::WrongSort {
            expected,
            actual: expr.sort(),
        })
    }
}

fn bv_value(expr: &Expr, width: u32) -> Result<u64, ConcretizationError> {
    require_sort(expr, Sort::BitVec(width))?;
    expr.as_bv()
        .ok_or_else(|| ConcretizationError::Symbolic(expr.to_string()))
}

fn fp_bits(expr: &Expr, sort: FloatSort) -> Result<u64, ConcretizationError> {
    require_sort(expr, Sort::Float(sort))?;
    expr.as_fp()
        .ok_or_else(|| ConcretizationError::Symbolic(expr.to_string()))
}

macro_rules! concrete_bitvec {
    ($ty:ty, $width:expr) => {
        impl TryFrom<&Expr> for $ty {
            type Error = ConcretizationError;

            fn try_from(expr: &Expr) -> Result<Self, Self::Error> {
                bv_value(expr, $width).map(|value| value as $ty)
            }
        }
    };
}

concrete_bitvec!(u8, 8);
concrete_bitvec!(u16, 16);
concrete_bitvec!(u32, 32);
concrete_bitvec!(i32, 32);
concrete_bitvec!(u64, 64);
concrete_bitvec!(i64, 64);

impl TryFrom<&Expr> for f32 {
    type Error = ConcretizationError;

    fn try_from(expr: &Expr) -> Result<Self, Self::Error> {
        fp_bits(expr, FloatSort::F32).map(|bits| f32::from_bits(bits as u32))
    }
}

impl TryFrom<&Expr> for f64 {
    type Error = ConcretizationError;

    fn try_from(expr: &Expr) -> Result<Self, Self::Error> {
        fp_bits(expr, FloatSort::F64).map(f64::from_bits)
    }
}

impl TryFrom<&Expr> for bool {
    type Error = ConcretizationError;

    fn try_from(expr: &Expr) -> Result<Self, Self::Error> {
        require_sort(expr, Sort::Bool)?;
        expr.as_bool()
            .ok_or_else(|| ConcretizationError::Symbolic(expr.to_string()))
    }
}

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use crate::fold::{self, mask};
use crate::sort::{FloatSort, RoundingMode, Sort};

/// Errors raised when constructing an expression from operands of the wrong sort.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SortError {
    /// The operation is not defined for operands of this sort.
    #[error("{operation} is not defined for {sort}")]
    Unsupported { operation: &'static str, sort: Sort },

    /// The operation requires both operands to have the same sort.
    #[error("{operation} requires matching sorts, found {lhs} and {rhs}")]
    Mismatch {
        operation: &'static str,
        lhs: Sort,
        rhs: Sort,
    },

    /// The requested bit range does not lie within the operand.
    #[error("bit range [{high}:{low}] is not valid for a {width}-bit value")]
    InvalidExtract { high: u32, low: u32, width: u32 },

    /// Bit-vectors are limited to 64 bits.
    #[error("bit-vector width {0} is not supported")]
    UnsupportedWidth(u32),
}

pub type Result<T> = std::result::Result<T, SortError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BvUnaryOp {
    Not,
    Neg,
    Clz,
    Ctz,
    Popcnt,
}

impl BvUnaryOp {
    pub fn name(&self) -> &'static str {
        match self {
            BvUnaryOp::Not => "bvnot",
            BvUnaryOp::Neg => "bvneg",
            BvUnaryOp::Clz => "bvclz",
            BvUnaryOp::Ctz => "bvctz",
            BvUnaryOp::Popcnt => "bvpopcnt",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BvBinaryOp {
    Add,
    Sub,
    Mul,
    SignedDiv,
    UnsignedDiv,
    SignedRem,
    UnsignedRem,
    And,
    Or,
    Xor,
    Shl,
    LogicalShr,
    ArithmeticShr,
    RotateLeft,
    RotateRight,
}

impl BvBinaryOp {
    pub fn name(&self) -> &'static str {
        match self {
            BvBinaryOp::Add => "bvadd",
            BvBinaryOp::Sub => "bvsub",
            BvBinaryOp::Mul => "bvmul",
            BvBinaryOp::SignedDiv => "bvsdiv",
            BvBinaryOp::UnsignedDiv => "bvudiv",
            BvBinaryOp::SignedRem => "bvsrem",
            BvBinaryOp::UnsignedRem => "bvurem",
            BvBinaryOp::And => "bvand",
            BvBinaryOp::Or => "bvor",
            BvBinaryOp::Xor => "bvxor",
            BvBinaryOp::Shl => "bvshl",
            BvBinaryOp::LogicalShr => "bvlshr",
            BvBinaryOp::ArithmeticShr => "bvashr",
            BvBinaryOp::RotateLeft => "ext_rotate_left",
            BvBinaryOp::RotateRight => "ext_rotate_right",
        }
    }

    fn fold(&self, lhs: u64, rhs: u64, width: u32) -> u64 {
        match self {
            BvBinaryOp::Add => lhs.wrapping_add(rhs) & mask(width),
            BvBinaryOp::Sub => lhs.wrapping_sub(rhs) & mask(width),
            BvBinaryOp::Mul => lhs.wrapping_mul(rhs) & mask(width),
            BvBinaryOp::SignedDiv => fold::sdiv(lhs, rhs, width),
            BvBinaryOp::UnsignedDiv => fold::udiv(lhs, rhs, width),
            BvBinaryOp::SignedRem => fold::srem(lhs, rhs, width),
            BvBinaryOp::UnsignedRem => fold::urem(lhs, rhs),
            BvBinaryOp::And => lhs & rhs,
            BvBinaryOp::Or => lhs | rhs,
            BvBinaryOp::Xor => lhs ^ rhs,
            BvBinaryOp::Shl => fold::shl(lhs, rhs, width),
            BvBinaryOp::LogicalShr => fold::lshr(lhs, rhs, width),
            BvBinaryOp::ArithmeticShr => fold::ashr(lhs, rhs, width),
            BvBinaryOp::RotateLeft => fold::rotl(lhs, rhs, width),
            BvBinaryOp::RotateRight => fold::rotr(lhs, rhs, width),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Eq,
    UnsignedLt,
    UnsignedLe,
    SignedLt,
    SignedLe,
}

impl CompareOp {
    pub fn name(&self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::UnsignedLt => "bvult",
            CompareOp::UnsignedLe => "bvule",
            CompareOp::SignedLt => "bvslt",
            CompareOp::SignedLe => "bvsle",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FpUnaryOp {
    Sqrt(RoundingMode),
    RoundToIntegral(RoundingMode),
    Abs,
    Neg,
}

impl FpUnaryOp {
    pub fn name(&self) -> &'static str {
        match self {
            FpUnaryOp::Sqrt(_) => "fp.sqrt",
            FpUnaryOp::RoundToIntegral(_) => "fp.roundToIntegral",
            FpUnaryOp::Abs => "fp.abs",
            FpUnaryOp::Neg => "fp.neg",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FpBinaryOp {
    Add(RoundingMode),
    Sub(RoundingMode),
    Mul(RoundingMode),
    Div(RoundingMode),
    Min,
    Max,
}

impl FpBinaryOp {
    pub fn name(&self) -> &'static str {
        match self {
            FpBinaryOp::Add(_) => "fp.add",
            FpBinaryOp::Sub(_) => "fp.sub",
            FpBinaryOp::Mul(_) => "fp.mul",
            FpBinaryOp::Div(_) => "fp.div",
            FpBinaryOp::Min => "fp.min",
            FpBinaryOp::Max => "fp.max",
        }
    }

    pub fn rounding_mode(&self) -> Option<RoundingMode> {
        match self {
            FpBinaryOp::Add(rm) | FpBinaryOp::Sub(rm) | FpBinaryOp::Mul(rm) | FpBinaryOp::Div(rm) => {
                Some(*rm)
            }
            FpBinaryOp::Min | FpBinaryOp::Max => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FpCompareOp {
    Eq,
    Lt,
    Le,
}

impl FpCompareOp {
    pub fn name(&self) -> &'static str {
        match self {
            FpCompareOp::Eq => "fp.eq",
            FpCompareOp::Lt => "fp.lt",
            FpCompareOp::Le => "fp.leq",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BoolOp {
    And,
    Or,
    Xor,
}

impl BoolOp {
    pub fn name(&self) -> &'static str {
        match self {
            BoolOp::And => "and",
            BoolOp::Or => "or",
            BoolOp::Xor => "xor",
        }
    }
}

/// The operation at the root of an [Expr].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Node {
    BvConst {
        value: u64,
        width: u32,
    },

    /// Floats are stored as their IEEE encoding so that NaN payloads are preserved.
    FpConst {
        bits: u64,
        sort: FloatSort,
    },

    BoolConst(bool),

    /// A free variable. Variables with the same name and sort are the same variable.
    Var {
        name: Rc<str>,
        sort: Sort,
    },

    BvUnary(BvUnaryOp, Expr),
    BvBinary(BvBinaryOp, Expr, Expr),
    Compare(CompareOp, Expr, Expr),

    Extract {
        high: u32,
        low: u32,
        arg: Expr,
    },

    Extend {
        signed: bool,
        extra: u32,
        arg: Expr,
    },

    /// The first operand occupies the most significant bits.
    Concat(Expr, Expr),

    FpUnary(FpUnaryOp, Expr),
    FpBinary(FpBinaryOp, Expr, Expr),
    FpCompare(FpCompareOp, Expr, Expr),
    FpIsNegative(Expr),

    FpToBv {
        signed: bool,
        width: u32,
        rm: RoundingMode,
        arg: Expr,
    },

    FpToFp {
        rm: RoundingMode,
        sort: FloatSort,
        arg: Expr,
    },

    BvToFp {
        signed: bool,
        rm: RoundingMode,
        sort: FloatSort,
        arg: Expr,
    },

    ToIeeeBv(Expr),

    FromIeeeBv {
        sort: FloatSort,
        arg: Expr,
    },

    BoolNot(Expr),
    BoolBinary(BoolOp, Expr, Expr),
    Ite(Expr, Expr, Expr),
}

struct Inner {
    node: Node,
    sort: Sort,
    hash: u64,
}

/// An immutable, reference counted symbolic expression. Cloning is cheap and shares the
/// underlying node.
///
/// Expressions are built through constructors that check operand sorts and fold constant
/// operands, so a value built entirely from constants is itself a constant.
#[derive(Clone)]
pub struct Expr(Rc<Inner>);

impl PartialEq for Expr {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
            || (self.0.hash == other.0.hash
                && self.0.sort == other.0.sort
                && self.0.node == other.0.node)
    }
}

impl Eq for Expr {}

impl Hash for Expr {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.0.hash);
    }
}

impl Expr {
    fn make(node: Node, sort: Sort) -> Self {
        let mut hasher = DefaultHasher::new();
        node.hash(&mut hasher);
        sort.hash(&mut hasher);
        let hash = hasher.finish();
        Self(Rc::new(Inner { node, sort, hash }))
    }

    /// A bit-vector constant. The value is truncated to the given width.
    pub fn bv(value: u64, width: u32) -> Self {
        Self::make(
            Node::BvConst {
                value: value & mask(width),
                width,
            },
            Sort::BitVec(width),
        )
    }

    pub fn bool(value: bool) -> Self {
        Self::make(Node::BoolConst(value), Sort::Bool)
    }

    /// A float constant given by its IEEE encoding.
    pub fn fp(bits: u64, sort: FloatSort) -> Self {
        Self::make(
            Node::FpConst {
                bits: bits & mask(sort.width()),
                sort,
            },
            Sort::Float(sort),
        )
    }

    pub fn f32(value: f32) -> Self {
        Self::fp(u64::from(value.to_bits()), FloatSort::F32)
    }

    pub fn f64(value: f64) -> Self {
        Self::fp(value.to_bits(), FloatSort::F64)
    }

    pub fn var(name: impl AsRef<str>, sort: Sort) -> Self {
        Self::make(
            Node::Var {
                name: Rc::from(name.as_ref()),
                sort,
            },
            sort,
        )
    }

    pub fn sort(&self) -> Sort {
        self.0.sort
    }

    pub fn node(&self) -> &Node {
        &self.0.node
    }

    pub fn width(&self) -> u32 {
        self.0.sort.width()
    }

    /// Returns `true` if both expressions share the same allocation.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Stable identity of the underlying allocation, valid while this expression is alive.
    pub fn id(&self) -> usize {
        Rc::as_ptr(&self.0) as usize
    }

    pub fn as_bv(&self) -> Option<u64> {
        match self.node() {
            Node::BvConst { value, .. } => Some(*value),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self.node() {
            Node::BoolConst(value) => Some(*value),
            _ => None,
        }
    }

    /// The IEEE encoding of a float constant.
    pub fn as_fp(&self) -> Option<u64> {
        match self.node() {
            Node::FpConst { bits, .. } => Some(*bits),
            _ => None,
        }
    }

    pub fn is_constant(&self) -> bool {
        matches!(
            self.node(),
            Node::BvConst { .. } | Node::FpConst { .. } | Node::BoolConst(_)
        )
    }

    pub fn is_true(&self) -> bool {
        self.as_bool() == Some(true)
    }

    pub fn is_false(&self) -> bool {
        self.as_bool() == Some(false)
    }

    fn require_bitvec(&self, operation: &'static str) -> Result<u32> {
        match self.sort() {
            Sort::BitVec(width) => Ok(width),
            sort => Err(SortError::Unsupported { operation, sort }),
        }
    }

    fn require_float(&self, operation: &'static str) -> Result<FloatSort> {
        match self.sort() {
            Sort::Float(sort) => Ok(sort),
            sort => Err(SortError::Unsupported { operation, sort }),
        }
    }

    fn require_bool(&self, operation: &'static str) -> Result<()> {
        match self.sort() {
            Sort::Bool => Ok(()),
            sort => Err(SortError::Unsupported { operation, sort }),
        }
    }

    fn require_same_sort(&self, operation: &'static str, rhs: &Self) -> Result<Sort> {
        if self.sort() == rhs.sort() {
            Ok(self.sort())
        } else {
            Err(SortError::Mismatch {
                operation,
                lhs: self.sort(),
                rhs: rhs.sort(),
            })
        }
    }

    pub fn bv_unary(&self, op: BvUnaryOp) -> Result<Self> {
        let width = self.require_bitvec(op.name())?;
        if let Some(value) = self.as_bv() {
            let result = match op {
                BvUnaryOp::Not => !value,
                BvUnaryOp::Neg => value.wrapping_neg(),
                BvUnaryOp::Clz => fold::clz(value, width),
                BvUnaryOp::Ctz => fold::ctz(value, width),
                BvUnaryOp::Popcnt => u64::from(value.count_ones()),
            };
            return Ok(Self::bv(result, width));
        }

        if let Node::BvUnary(inner, arg) = self.node() {
            if *inner == op && matches!(op, BvUnaryOp::Not | BvUnaryOp::Neg) {
                return Ok(arg.clone());
            }
        }

        Ok(Self::make(
            Node::BvUnary(op, self.clone()),
            Sort::BitVec(width),
        ))
    }

    pub fn bv_binary(&self, op: BvBinaryOp, rhs: &Self) -> Result<Self> {
        let width = self.require_bitvec(op.name())?;
        self.require_same_sort(op.name(), rhs)?;

        if let (Some(x), Some(y)) = (self.as_bv(), rhs.as_bv()) {
            return Ok(Self::bv(op.fold(x, y, width), width));
        }

        if let Some(result) = Self::bv_identity(op, self, rhs, width) {
            return Ok(result);
        }

        Ok(Self::make(
            Node::BvBinary(op, self.clone(), rhs.clone()),
            Sort::BitVec(width),
        ))
    }

    fn bv_identity(op: BvBinaryOp, lhs: &Self, rhs: &Self, width: u32) -> Option<Self> {
        let is_zero = |x: &Self| x.as_bv() == Some(0);
        let is_one = |x: &Self| x.as_bv() == Some(1);
        let is_ones = |x: &Self| x.as_bv() == Some(mask(width));

        use BvBinaryOp::*;
        match op {
            Add | Or | Xor if is_zero(rhs) => Some(lhs.clone()),
            Add | Or | Xor if is_zero(lhs) => Some(rhs.clone()),
            Sub | Shl | LogicalShr | ArithmeticShr | RotateLeft | RotateRight if is_zero(rhs) => {
                Some(lhs.clone())
            }
            Sub | Xor if lhs == rhs => Some(Self::bv(0, width)),
            Mul | And if is_zero(lhs) || is_zero(rhs) => Some(Self::bv(0, width)),
            Mul | SignedDiv | UnsignedDiv if is_one(rhs) => Some(lhs.clone()),
            Mul if is_one(lhs) => Some(rhs.clone()),
            And if is_ones(rhs) => Some(lhs.clone()),
            And if is_ones(lhs) => Some(rhs.clone()),
            Or if is_ones(lhs) || is_ones(rhs) => Some(Self::bv(mask(width), width)),
            And | Or if lhs == rhs => Some(lhs.clone()),
            _ => None,
        }
    }

    pub fn compare(&self, op: CompareOp, rhs: &Self) -> Result<Self> {
        if op == CompareOp::Eq && self.sort().is_bool() {
            rhs.require_bool(op.name())?;
            return self.bool_binary(BoolOp::Xor, rhs)?.bool_not();
        }

        let width = self.require_bitvec(op.name())?;
        self.require_same_sort(op.name(), rhs)?;

        if let (Some(x), Some(y)) = (self.as_bv(), rhs.as_bv()) {
            let result = match op {
                CompareOp::Eq => x == y,
                CompareOp::UnsignedLt => x < y,
                CompareOp::UnsignedLe => x <= y,
                CompareOp::SignedLt => fold::to_signed(x, width) < fold::to_signed(y, width),
                CompareOp::SignedLe => fold::to_signed(x, width) <= fold::to_signed(y, width),
            };
            return Ok(Self::bool(result));
        }

        if self == rhs {
            let reflexive = matches!(
                op,
                CompareOp::Eq | CompareOp::UnsignedLe | CompareOp::SignedLe
            );
            return Ok(Self::bool(reflexive));
        }

        Ok(Self::make(
            Node::Compare(op, self.clone(), rhs.clone()),
            Sort::Bool,
        ))
    }

    pub fn extract(&self, high: u32, low: u32) -> Result<Self> {
        let width = self.require_bitvec("extract")?;
        if high < low || high >= width {
            return Err(SortError::InvalidExtract { high, low, width });
        }

        let result_width = high - low + 1;
        if result_width == width {
            return Ok(self.clone());
        }

        if let Some(value) = self.as_bv() {
            return Ok(Self::bv(value >> low, result_width));
        }

        if let Node::Extract {
            low: inner_low,
            arg,
            ..
        } = self.node()
        {
            return arg.extract(inner_low + high, inner_low + low);
        }

        Ok(Self::make(
            Node::Extract {
                high,
                low,
                arg: self.clone(),
            },
            Sort::BitVec(result_width),
        ))
    }

    fn extend(&self, signed: bool, extra: u32) -> Result<Self> {
        let width = self.require_bitvec(if signed { "sign_extend" } else { "zero_extend" })?;
        let result_width = width + extra;
        if result_width > u64::BITS {
            return Err(SortError::UnsupportedWidth(result_width));
        }

        if extra == 0 {
            return Ok(self.clone());
        }

        if let Some(value) = self.as_bv() {
            let value = if signed {
                fold::sign_extend(value, width, result_width)
            } else {
                value
            };
            return Ok(Self::bv(value, result_width));
        }

        Ok(Self::make(
            Node::Extend {
                signed,
                extra,
                arg: self.clone(),
            },
            Sort::BitVec(result_width),
        ))
    }

    pub fn zero_extend(&self, extra: u32) -> Result<Self> {
        self.extend(false, extra)
    }

    pub fn sign_extend(&self, extra: u32) -> Result<Self> {
        self.extend(true, extra)
    }

    /// Concatenate two bit-vectors. `self` occupies the most significant bits of the result.
    pub fn concat(&self, rhs: &Self) -> Result<Self> {
        let high_width = self.require_bitvec("concat")?;
        let low_width = rhs.require_bitvec("concat")?;
        let width = high_width + low_width;
        if width > u64::BITS {
            return Err(SortError::UnsupportedWidth(width));
        }

        if let (Some(high), Some(low)) = (self.as_bv(), rhs.as_bv()) {
            return Ok(Self::bv((high << low_width) | low, width));
        }

        // Adjacent slices of the same value
        if let (
            Node::Extract {
                high: hi,
                low: mid_high,
                arg: high_arg,
            },
            Node::Extract {
                high: mid_low,
                low: lo,
                arg: low_arg,
            },
        ) = (self.node(), rhs.node())
        {
            if high_arg == low_arg && *mid_high == mid_low + 1 {
                return high_arg.extract(*hi, *lo);
            }
        }

        Ok(Self::make(
            Node::Concat(self.clone(), rhs.clone()),
            Sort::BitVec(width),
        ))
    }

    pub fn add(&self, rhs: &Self) -> Result<Self> {
        self.bv_binary(BvBinaryOp::Add, rhs)
    }

    pub fn sub(&self, rhs: &Self) -> Result<Self> {
        self.bv_binary(BvBinaryOp::Sub, rhs)
    }

    pub fn mul(&self, rhs: &Self) -> Result<Self> {
        self.bv_binary(BvBinaryOp::Mul, rhs)
    }

    pub fn sdiv(&self, rhs: &Self) -> Result<Self> {
        self.bv_binary(BvBinaryOp::SignedDiv, rhs)
    }

    pub fn udiv(&self, rhs: &Self) -> Result<Self> {
        self.bv_binary(BvBinaryOp::UnsignedDiv, rhs)
    }

    pub fn srem(&self, rhs: &Self) -> Result<Self> {
        self.bv_binary(BvBinaryOp::SignedRem, rhs)
    }

    pub fn urem(&self, rhs: &Self) -> Result<Self> {
        self.bv_binary(BvBinaryOp::UnsignedRem, rhs)
    }

    pub fn shl(&self, rhs: &Self) -> Result<Self> {
        self.bv_binary(BvBinaryOp::Shl, rhs)
    }

    pub fn lshr(&self, rhs: &Self) -> Result<Self> {
        self.bv_binary(BvBinaryOp::LogicalShr, rhs)
    }

    pub fn ashr(&self, rhs: &Self) -> Result<Self> {
        self.bv_binary(BvBinaryOp::ArithmeticShr, rhs)
    }

    pub fn rotl(&self, rhs: &Self) -> Result<Self> {
        self.bv_binary(BvBinaryOp::RotateLeft, rhs)
    }

    pub fn rotr(&self, rhs: &Self) -> Result<Self> {
        self.bv_binary(BvBinaryOp::RotateRight, rhs)
    }

    pub fn neg(&self) -> Result<Self> {
        self.bv_unary(BvUnaryOp::Neg)
    }

    pub fn clz(&self) -> Result<Self> {
        self.bv_unary(BvUnaryOp::Clz)
    }

    pub fn ctz(&self) -> Result<Self> {
        self.bv_unary(BvUnaryOp::Ctz)
    }

    pub fn popcnt(&self) -> Result<Self> {
        self.bv_unary(BvUnaryOp::Popcnt)
    }

    /// Bitwise or logical negation depending on the sort of `self`.
    pub fn not(&self) -> Result<Self> {
        match self.sort() {
            Sort::Bool => self.bool_not(),
            _ => self.bv_unary(BvUnaryOp::Not),
        }
    }

    /// Bitwise or logical conjunction depending on the sort of `self`.
    pub fn and(&self, rhs: &Self) -> Result<Self> {
        match self.sort() {
            Sort::Bool => self.bool_binary(BoolOp::And, rhs),
            _ => self.bv_binary(BvBinaryOp::And, rhs),
        }
    }

    /// Bitwise or logical disjunction depending on the sort of `self`.
    pub fn or(&self, rhs: &Self) -> Result<Self> {
        match self.sort() {
            Sort::Bool => self.bool_binary(BoolOp::Or, rhs),
            _ => self.bv_binary(BvBinaryOp::Or, rhs),
        }
    }

    /// Bitwise or logical exclusive or depending on the sort of `self`.
    pub fn xor(&self, rhs: &Self) -> Result<Self> {
        match self.sort() {
            Sort::Bool => self.bool_binary(BoolOp::Xor, rhs),
            _ => self.bv_binary(BvBinaryOp::Xor, rhs),
        }
    }

    pub fn eq(&self, rhs: &Self) -> Result<Self> {
        self.compare(CompareOp::Eq, rhs)
    }

    pub fn ne(&self, rhs: &Self) -> Result<Self> {
        self.eq(rhs)?.bool_not()
    }

    pub fn ult(&self, rhs: &Self) -> Result<Self> {
        self.compare(CompareOp::UnsignedLt, rhs)
    }

    pub fn ule(&self, rhs: &Self) -> Result<Self> {
        self.compare(CompareOp::UnsignedLe, rhs)
    }

    pub fn ugt(&self, rhs: &Self) -> Result<Self> {
        rhs.ult(self)
    }

    pub fn uge(&self, rhs: &Self) -> Result<Self> {
        rhs.ule(self)
    }

    pub fn slt(&self, rhs: &Self) -> Result<Self> {
        self.compare(CompareOp::SignedLt, rhs)
    }

    pub fn sle(&self, rhs: &Self) -> Result<Self> {
        self.compare(CompareOp::SignedLe, rhs)
    }

    pub fn sgt(&self, rhs: &Self) -> Result<Self> {
        rhs.slt(self)
    }

    pub fn sge(&self, rhs: &Self) -> Result<Self> {
        rhs.sle(self)
    }

    pub fn fp_unary(&self, op: FpUnaryOp) -> Result<Self> {
        let sort = self.require_float(op.name())?;
        if let Some(bits) = self.as_fp() {
            let folded = match op {
                FpUnaryOp::Abs => Some(fold::abs(bits, sort)),
                FpUnaryOp::Neg => Some(fold::neg(bits, sort)),
                FpUnaryOp::Sqrt(rm) => fold::sqrt(bits, sort, rm),
                FpUnaryOp::RoundToIntegral(rm) => fold::round_to_integral(bits, sort, rm),
            };

            if let Some(bits) = folded {
                return Ok(Self::fp(bits, sort));
            }
        }

        if let Node::FpUnary(FpUnaryOp::Neg, arg) = self.node() {
            if op == FpUnaryOp::Neg {
                return Ok(arg.clone());
            }
        }

        Ok(Self::make(
            Node::FpUnary(op, self.clone()),
            Sort::Float(sort),
        ))
    }

    pub fn fp_binary(&self, op: FpBinaryOp, rhs: &Self) -> Result<Self> {
        let sort = self.require_float(op.name())?;
        self.require_same_sort(op.name(), rhs)?;

        if let (Some(x), Some(y)) = (self.as_fp(), rhs.as_fp()) {
            let folded = match op {
                FpBinaryOp::Add(rm) => fold::arithmetic(fold::Arithmetic::Add, x, y, sort, rm),
                FpBinaryOp::Sub(rm) => fold::arithmetic(fold::Arithmetic::Sub, x, y, sort, rm),
                FpBinaryOp::Mul(rm) => fold::arithmetic(fold::Arithmetic::Mul, x, y, sort, rm),
                FpBinaryOp::Div(rm) => fold::arithmetic(fold::Arithmetic::Div, x, y, sort, rm),
                FpBinaryOp::Min => fold::min_max(x, y, sort, false),
                FpBinaryOp::Max => fold::min_max(x, y, sort, true),
            };

            if let Some(bits) = folded {
                return Ok(Self::fp(bits, sort));
            }
        }

        Ok(Self::make(
            Node::FpBinary(op, self.clone(), rhs.clone()),
            Sort::Float(sort),
        ))
    }

    pub fn fp_compare(&self, op: FpCompareOp, rhs: &Self) -> Result<Self> {
        let sort = self.require_float(op.name())?;
        self.require_same_sort(op.name(), rhs)?;

        if let (Some(x), Some(y)) = (self.as_fp(), rhs.as_fp()) {
            let folded = match op {
                FpCompareOp::Eq => fold::compare(fold::Comparison::Eq, x, y, sort),
                FpCompareOp::Lt => fold::compare(fold::Comparison::Lt, x, y, sort),
                FpCompareOp::Le => fold::compare(fold::Comparison::Le, x, y, sort),
            };

            if let Some(result) = folded {
                return Ok(Self::bool(result));
            }
        }

        Ok(Self::make(
            Node::FpCompare(op, self.clone(), rhs.clone()),
            Sort::Bool,
        ))
    }

    pub fn fp_abs(&self) -> Result<Self> {
        self.fp_unary(FpUnaryOp::Abs)
    }

    pub fn fp_neg(&self) -> Result<Self> {
        self.fp_unary(FpUnaryOp::Neg)
    }

    pub fn fp_sqrt(&self, rm: RoundingMode) -> Result<Self> {
        self.fp_unary(FpUnaryOp::Sqrt(rm))
    }

    pub fn fp_round_to_integral(&self, rm: RoundingMode) -> Result<Self> {
        self.fp_unary(FpUnaryOp::RoundToIntegral(rm))
    }

    pub fn fp_add(&self, rm: RoundingMode, rhs: &Self) -> Result<Self> {
        self.fp_binary(FpBinaryOp::Add(rm), rhs)
    }

    pub fn fp_sub(&self, rm: RoundingMode, rhs: &Self) -> Result<Self> {
        self.fp_binary(FpBinaryOp::Sub(rm), rhs)
    }

    pub fn fp_mul(&self, rm: RoundingMode, rhs: &Self) -> Result<Self> {
        self.fp_binary(FpBinaryOp::Mul(rm), rhs)
    }

    pub fn fp_div(&self, rm: RoundingMode, rhs: &Self) -> Result<Self> {
        self.fp_binary(FpBinaryOp::Div(rm), rhs)
    }

    pub fn fp_min(&self, rhs: &Self) -> Result<Self> {
        self.fp_binary(FpBinaryOp::Min, rhs)
    }

    pub fn fp_max(&self, rhs: &Self) -> Result<Self> {
        self.fp_binary(FpBinaryOp::Max, rhs)
    }

    pub fn fp_eq(&self, rhs: &Self) -> Result<Self> {
        self.fp_compare(FpCompareOp::Eq, rhs)
    }

    pub fn fp_lt(&self, rhs: &Self) -> Result<Self> {
        self.fp_compare(FpCompareOp::Lt, rhs)
    }

    pub fn fp_le(&self, rhs: &Self) -> Result<Self> {
        self.fp_compare(FpCompareOp::Le, rhs)
    }

    pub fn fp_gt(&self, rhs: &Self) -> Result<Self> {
        rhs.fp_lt(self)
    }

    pub fn fp_ge(&self, rhs: &Self) -> Result<Self> {
        rhs.fp_le(self)
    }

    /// True if the value is negative. NaN is neither positive nor negative.
    pub fn fp_is_negative(&self) -> Result<Self> {
        let sort = self.require_float("fp.isNegative")?;
        if let Some(bits) = self.as_fp() {
            return Ok(Self::bool(fold::is_negative(bits, sort)));
        }

        Ok(Self::make(Node::FpIsNegative(self.clone()), Sort::Bool))
    }

    fn fp_to_bv(&self, signed: bool, rm: RoundingMode, width: u32) -> Result<Self> {
        let sort = self.require_float(if signed { "fp.to_sbv" } else { "fp.to_ubv" })?;
        if width == 0 || width > u64::BITS {
            return Err(SortError::UnsupportedWidth(width));
        }

        if let Some(value) = self
            .as_fp()
            .and_then(|bits| fold::to_integer(bits, sort, rm, signed, width))
        {
            return Ok(Self::bv(value, width));
        }

        Ok(Self::make(
            Node::FpToBv {
                signed,
                width,
                rm,
                arg: self.clone(),
            },
            Sort::BitVec(width),
        ))
    }

    pub fn fp_to_sbv(&self, rm: RoundingMode, width: u32) -> Result<Self> {
        self.fp_to_bv(true, rm, width)
    }

    pub fn fp_to_ubv(&self, rm: RoundingMode, width: u32) -> Result<Self> {
        self.fp_to_bv(false, rm, width)
    }

    pub fn fp_to_fp(&self, rm: RoundingMode, sort: FloatSort) -> Result<Self> {
        let from = self.require_float("to_fp")?;
        if from == sort {
            return Ok(self.clone());
        }

        if let Some(bits) = self
            .as_fp()
            .and_then(|bits| fold::convert_float(bits, from, sort, rm))
        {
            return Ok(Self::fp(bits, sort));
        }

        Ok(Self::make(
            Node::FpToFp {
                rm,
                sort,
                arg: self.clone(),
            },
            Sort::Float(sort),
        ))
    }

    fn bv_to_fp(&self, signed: bool, rm: RoundingMode, sort: FloatSort) -> Result<Self> {
        let width = self.require_bitvec(if signed { "to_fp" } else { "to_fp_unsigned" })?;
        if let Some(bits) = self
            .as_bv()
            .and_then(|value| fold::from_integer(value, width, signed, sort, rm))
        {
            return Ok(Self::fp(bits, sort));
        }

        Ok(Self::make(
            Node::BvToFp {
                signed,
                rm,
                sort,
                arg: self.clone(),
            },
            Sort::Float(sort),
        ))
    }

    pub fn sbv_to_fp(&self, rm: RoundingMode, sort: FloatSort) -> Result<Self> {
        self.bv_to_fp(true, rm, sort)
    }

    pub fn ubv_to_fp(&self, rm: RoundingMode, sort: FloatSort) -> Result<Self> {
        self.bv_to_fp(false, rm, sort)
    }

    /// Reinterpret a float as its IEEE encoding.
    pub fn to_ieee_bv(&self) -> Result<Self> {
        let sort = self.require_float("fp.to_ieee_bv")?;
        if let Some(bits) = self.as_fp() {
            return Ok(Self::bv(bits, sort.width()));
        }

        if let Node::FromIeeeBv { arg, .. } = self.node() {
            return Ok(arg.clone());
        }

        Ok(Self::make(
            Node::ToIeeeBv(self.clone()),
            Sort::BitVec(sort.width()),
        ))
    }

    /// Reinterpret an IEEE encoding as a float of the given format.
    pub fn from_ieee_bv(&self, sort: FloatSort) -> Result<Self> {
        let width = self.require_bitvec("to_fp")?;
        if width != sort.width() {
            return Err(SortError::Mismatch {
                operation: "to_fp",
                lhs: self.sort(),
                rhs: Sort::Float(sort),
            });
        }

        if let Some(bits) = self.as_bv() {
            return Ok(Self::fp(bits, sort));
        }

        if let Node::ToIeeeBv(arg) = self.node() {
            if arg.sort() == Sort::Float(sort) {
                return Ok(arg.clone());
            }
        }

        Ok(Self::make(
            Node::FromIeeeBv {
                sort,
                arg: self.clone(),
            },
            Sort::Float(sort),
        ))
    }

    pub fn bool_not(&self) -> Result<Self> {
        self.require_bool("not")?;
        if let Some(value) = self.as_bool() {
            return Ok(Self::bool(!value));
        }

        if let Node::BoolNot(arg) = self.node() {
            return Ok(arg.clone());
        }

        Ok(Self::make(Node::BoolNot(self.clone()), Sort::Bool))
    }

    pub fn bool_binary(&self, op: BoolOp, rhs: &Self) -> Result<Self> {
        self.require_bool(op.name())?;
        rhs.require_bool(op.name())?;

        match (op, self.as_bool(), rhs.as_bool()) {
            (BoolOp::And, Some(x), Some(y)) => return Ok(Self::bool(x && y)),
            (BoolOp::Or, Some(x), Some(y)) => return Ok(Self::bool(x || y)),
            (BoolOp::Xor, Some(x), Some(y)) => return Ok(Self::bool(x ^ y)),
            (BoolOp::And, Some(false), _) | (BoolOp::And, _, Some(false)) => {
                return Ok(Self::bool(false))
            }
            (BoolOp::Or, Some(true), _) | (BoolOp::Or, _, Some(true)) => {
                return Ok(Self::bool(true))
            }
            (BoolOp::And, Some(true), _)
            | (BoolOp::Or, Some(false), _)
            | (BoolOp::Xor, Some(false), _) => return Ok(rhs.clone()),
            (BoolOp::And, _, Some(true))
            | (BoolOp::Or, _, Some(false))
            | (BoolOp::Xor, _, Some(false)) => return Ok(self.clone()),
            (BoolOp::Xor, Some(true), _) => return rhs.bool_not(),
            (BoolOp::Xor, _, Some(true)) => return self.bool_not(),
            _ => (),
        }

        if self == rhs {
            return Ok(match op {
                BoolOp::And | BoolOp::Or => self.clone(),
                BoolOp::Xor => Self::bool(false),
            });
        }

        Ok(Self::make(
            Node::BoolBinary(op, self.clone(), rhs.clone()),
            Sort::Bool,
        ))
    }

    /// `if self then lhs else rhs`
    pub fn ite(&self, lhs: &Self, rhs: &Self) -> Result<Self> {
        self.require_bool("ite")?;
        let sort = lhs.require_same_sort("ite", rhs)?;

        match self.as_bool() {
            Some(true) => return Ok(lhs.clone()),
            Some(false) => return Ok(rhs.clone()),
            None => (),
        }

        if lhs == rhs {
            return Ok(lhs.clone());
        }

        Ok(Self::make(
            Node::Ite(self.clone(), lhs.clone(), rhs.clone()),
            sort,
        ))
    }

    /// Conjunction of all expressions. An empty iterator is `true`.
    pub fn all(exprs: impl IntoIterator<Item = Self>) -> Result<Self> {
        exprs
            .into_iter()
            .try_fold(Self::bool(true), |acc, expr| acc.bool_binary(BoolOp::And, &expr))
    }

    /// Disjunction of all expressions. An empty iterator is `false`.
    pub fn any(exprs: impl IntoIterator<Item = Self>) -> Result<Self> {
        exprs
            .into_iter()
            .try_fold(Self::bool(false), |acc, expr| acc.bool_binary(BoolOp::Or, &expr))
    }

    /// Rebuild the expression bottom-up through the folding constructors. Shared subexpressions
    /// are only rebuilt once.
    pub fn simplify(&self) -> Self {
        let mut rebuilt = HashMap::new();
        self.rebuild(&mut rebuilt)
    }

    fn rebuild(&self, rebuilt: &mut HashMap<usize, Expr>) -> Self {
        if let Some(expr) = rebuilt.get(&self.id()) {
            return expr.clone();
        }

        let mut r = |expr: &Expr| expr.rebuild(rebuilt);
        let result = match self.node() {
            Node::BvConst { .. } | Node::FpConst { .. } | Node::BoolConst(_) | Node::Var { .. } => {
                Ok(self.clone())
            }
            Node::BvUnary(op, arg) => r(arg).bv_unary(*op),
            Node::BvBinary(op, lhs, rhs) => r(lhs).bv_binary(*op, &r(rhs)),
            Node::Compare(op, lhs, rhs) => r(lhs).compare(*op, &r(rhs)),
            Node::Extract { high, low, arg } => r(arg).extract(*high, *low),
            Node::Extend { signed, extra, arg } => r(arg).extend(*signed, *extra),
            Node::Concat(lhs, rhs) => r(lhs).concat(&r(rhs)),
            Node::FpUnary(op, arg) => r(arg).fp_unary(*op),
            Node::FpBinary(op, lhs, rhs) => r(lhs).fp_binary(*op, &r(rhs)),
            Node::FpCompare(op, lhs, rhs) => r(lhs).fp_compare(*op, &r(rhs)),
            Node::FpIsNegative(arg) => r(arg).fp_is_negative(),
            Node::FpToBv {
                signed,
                width,
                rm,
                arg,
            } => r(arg).fp_to_bv(*signed, *rm, *width),
            Node::FpToFp { rm, sort, arg } => r(arg).fp_to_fp(*rm, *sort),
            Node::BvToFp {
                signed,
                rm,
                sort,
                arg,
            } => r(arg).bv_to_fp(*signed, *rm, *sort),
            Node::ToIeeeBv(arg) => r(arg).to_ieee_bv(),
            Node::FromIeeeBv { sort, arg } => r(arg).from_ieee_bv(*sort),
            Node::BoolNot(arg) => r(arg).bool_not(),
            Node::BoolBinary(op, lhs, rhs) => r(lhs).bool_binary(*op, &r(rhs)),
            Node::Ite(cond, lhs, rhs) => r(cond).ite(&r(lhs), &r(rhs)),
        };

        // Rebuilding a well-sorted expression cannot introduce a sort error
        let result = result.unwrap_or_else(|_| self.clone());
        rebuilt.insert(self.id(), result.clone());
        result
    }
}

impl std::fmt::Display for Expr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.node() {
            Node::BvConst { value, width } => {
                if width % 4 == 0 {
                    let digits = (*width / 4) as usize;
                    write!(f, "#x{value:0digits$x}")
                } else {
                    let digits = *width as usize;
                    write!(f, "#b{value:0digits$b}")
                }
            }
            Node::FpConst { bits, sort } => {
                let digits = sort.width().div_ceil(4) as usize;
                write!(
                    f,
                    "((_ to_fp {ebits} {sbits}) #x{bits:0digits$x})",
                    ebits = sort.ebits,
                    sbits = sort.sbits
                )
            }
            Node::BoolConst(value) => write!(f, "{value}"),
            Node::Var { name, .. } => write!(f, "{name}"),
            Node::BvUnary(op, arg) => write!(f, "({} {arg})", op.name()),
            Node::BvBinary(op, lhs, rhs) => write!(f, "({} {lhs} {rhs})", op.name()),
            Node::Compare(op, lhs, rhs) => write!(f, "({} {lhs} {rhs})", op.name()),
            Node::Extract { high, low, arg } => write!(f, "((_ extract {high} {low}) {arg})"),
            Node::Extend { signed, extra, arg } => {
                let name = if *signed { "sign_extend" } else { "zero_extend" };
                write!(f, "((_ {name} {extra}) {arg})")
            }
            Node::Concat(lhs, rhs) => write!(f, "(concat {lhs} {rhs})"),
            Node::FpUnary(op, arg) => match op {
                FpUnaryOp::Sqrt(rm) | FpUnaryOp::RoundToIntegral(rm) => {
                    write!(f, "({} {rm} {arg})", op.name())
                }
                FpUnaryOp::Abs | FpUnaryOp::Neg => write!(f, "({} {arg})", op.name()),
            },
            Node::FpBinary(op, lhs, rhs) => match op.rounding_mode() {
                Some(rm) => write!(f, "({} {rm} {lhs} {rhs})", op.name()),
                None => write!(f, "({} {lhs} {rhs})", op.name()),
            },
            Node::FpCompare(op, lhs, rhs) => write!(f, "({} {lhs} {rhs})", op.name()),
            Node::FpIsNegative(arg) => write!(f, "(fp.isNegative {arg})"),
            Node::FpToBv {
                signed,
                width,
                rm,
                arg,
            } => {
                let name = if *signed { "fp.to_sbv" } else { "fp.to_ubv" };
                write!(f, "((_ {name} {width}) {rm} {arg})")
            }
            Node::FpToFp { rm, sort, arg } => write!(
                f,
                "((_ to_fp {ebits} {sbits}) {rm} {arg})",
                ebits = sort.ebits,
                sbits = sort.sbits
            ),
            Node::BvToFp {
                signed,
                rm,
                sort,
                arg,
            } => {
                let name = if *signed { "to_fp" } else { "to_fp_unsigned" };
                write!(
                    f,
                    "((_ {name} {ebits} {sbits}) {rm} {arg})",
                    ebits = sort.ebits,
                    sbits = sort.sbits
                )
            }
            Node::ToIeeeBv(arg) => write!(f, "(fp.to_ieee_bv {arg})"),
            Node::FromIeeeBv { sort, arg } => write!(
                f,
                "((_ to_fp {ebits} {sbits}) {arg})",
                ebits = sort.ebits,
                sbits = sort.sbits
            ),
            Node::BoolNot(arg) => write!(f, "(not {arg})"),
            Node::BoolBinary(op, lhs, rhs) => write!(f, "({} {lhs} {rhs})", op.name()),
            Node::Ite(cond, lhs, rhs) => write!(f, "(ite {cond} {lhs} {rhs})"),
        }
    }
}

impl std::fmt::Debug for Expr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self}")
    }
}

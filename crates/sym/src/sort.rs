/// IEEE-754 binary floating-point format described by its exponent and significand widths. The
/// significand width includes the hidden bit, matching the SMT-LIB `FloatingPoint` sort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FloatSort {
    pub ebits: u32,
    pub sbits: u32,
}

impl FloatSort {
    /// Single precision (`f32`)
    pub const F32: FloatSort = FloatSort {
        ebits: 8,
        sbits: 24,
    };

    /// Double precision (`f64`)
    pub const F64: FloatSort = FloatSort {
        ebits: 11,
        sbits: 53,
    };

    /// Number of bits in the IEEE interchange encoding of this format.
    pub fn width(&self) -> u32 {
        self.ebits + self.sbits
    }

    /// Number of explicitly stored significand bits.
    pub fn mantissa_bits(&self) -> u32 {
        self.sbits - 1
    }
}

/// The sort (type) of a symbolic expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Sort {
    BitVec(u32),
    Float(FloatSort),
    Bool,
}

impl Sort {
    /// The number of bits required to represent a value of this sort. Booleans occupy a single
    /// bit and floats occupy their IEEE interchange width.
    pub fn width(&self) -> u32 {
        match self {
            Sort::BitVec(width) => *width,
            Sort::Float(sort) => sort.width(),
            Sort::Bool => 1,
        }
    }

    pub fn is_bitvec(&self) -> bool {
        matches!(self, Sort::BitVec(_))
    }

    pub fn is_float(&self) -> bool {
        matches!(self, Sort::Float(_))
    }

    pub fn is_bool(&self) -> bool {
        matches!(self, Sort::Bool)
    }
}

impl std::fmt::Display for Sort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Sort::BitVec(width) => write!(f, "(_ BitVec {width})"),
            Sort::Float(FloatSort { ebits, sbits }) => {
                write!(f, "(_ FloatingPoint {ebits} {sbits})")
            }
            Sort::Bool => write!(f, "Bool"),
        }
    }
}

/// IEEE-754 rounding modes used by floating-point operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RoundingMode {
    NearestTiesToEven,
    TowardPositive,
    TowardNegative,
    TowardZero,
}

impl std::fmt::Display for RoundingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RoundingMode::NearestTiesToEven => "RNE",
            RoundingMode::TowardPositive => "RTP",
            RoundingMode::TowardNegative => "RTN",
            RoundingMode::TowardZero => "RTZ",
        };

        f.write_str(name)
    }
}

use std::str::FromStr;

use sym::FloatSort;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("unknown mnemonic {0}")]
    UnknownMnemonic(String),

    /// The operand ended in the middle of a LEB128 encoded value.
    #[error("truncated operand")]
    TruncatedOperand,

    /// A LEB128 encoded value does not fit in 64 bits.
    #[error("operand value exceeds 64 bits")]
    OperandOverflow,
}

pub type Result<T> = std::result::Result<T, DecodeError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntWidth {
    W32,
    W64,
}

impl IntWidth {
    pub fn bits(&self) -> u32 {
        match self {
            Self::W32 => 32,
            Self::W64 => 64,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FloatWidth {
    F32,
    F64,
}

impl FloatWidth {
    pub fn sort(&self) -> FloatSort {
        match self {
            Self::F32 => FloatSort::F32,
            Self::F64 => FloatSort::F64,
        }
    }

    pub fn bits(&self) -> u32 {
        self.sort().width()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    I32,
    I64,
    F32,
    F64,
}

impl ValueType {
    pub fn bits(&self) -> u32 {
        match self {
            Self::I32 | Self::F32 => 32,
            Self::I64 | Self::F64 => 64,
        }
    }
}

impl FromStr for ValueType {
    type Err = DecodeError;

    fn from_str(name: &str) -> Result<Self> {
        match name {
            "i32" => Ok(Self::I32),
            "i64" => Ok(Self::I64),
            "f32" => Ok(Self::F32),
            "f64" => Ok(Self::F64),
            _ => Err(DecodeError::UnknownMnemonic(name.to_string())),
        }
    }
}

impl std::fmt::Display for ValueType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::I32 => "i32",
            Self::I64 => "i64",
            Self::F32 => "f32",
            Self::F64 => "f64",
        };

        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlOp {
    Nop,
    Block,
    Loop,
    End,
    Br,
    Else,
    Return,
    Unreachable,
    If,
    BrIf,
    BrTable,
    Call,
    CallIndirect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParametricOp {
    Drop,
    Select,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VariableOp {
    LocalGet,
    LocalSet,
    LocalTee,
    GlobalGet,
    GlobalSet,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntArithmeticOp {
    Add,
    Sub,
    Mul,
    DivS,
    DivU,
    RemS,
    RemU,
    Clz,
    Ctz,
    Popcnt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FloatArithmeticOp {
    Add,
    Sub,
    Mul,
    Div,
    Min,
    Max,
    Copysign,
    Sqrt,
    Floor,
    Ceil,
    Trunc,
    Nearest,
    Abs,
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BitwiseOp {
    And,
    Or,
    Xor,
    Shl,
    ShrS,
    ShrU,
    Rotl,
    Rotr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConversionOp {
    /// `i32.wrap_i64`
    Wrap,

    /// `i64.extend_i32_s` and `i64.extend_i32_u`
    Extend { signed: bool },

    /// Sign extension of the low `from_bits` of an integer, e.g. `i32.extend8_s`
    ExtendLow { width: IntWidth, from_bits: u32 },

    /// Float to integer truncation toward zero, e.g. `i32.trunc_f64_s`
    Truncate {
        signed: bool,
        to: IntWidth,
        from: FloatWidth,
    },

    /// `f32.demote_f64`
    Demote,

    /// `f64.promote_f32`
    Promote,

    /// Integer to float conversion, e.g. `f64.convert_i32_u`
    Convert {
        signed: bool,
        to: FloatWidth,
        from: IntWidth,
    },

    /// Float bits as an integer of the same width, e.g. `i32.reinterpret_f32`
    ReinterpretFloat(FloatWidth),

    /// Integer bits as a float of the same width, e.g. `f32.reinterpret_i32`
    ReinterpretInt(IntWidth),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntCompareOp {
    Eqz,
    Eq,
    Ne,
    LtS,
    LtU,
    GtS,
    GtU,
    LeS,
    LeU,
    GeS,
    GeU,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FloatCompareOp {
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
}

/// A memory load of `bytes` bytes producing a value of type `ty`. Narrow integer loads extend
/// the loaded value according to `signed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LoadOp {
    pub ty: ValueType,
    pub bytes: u32,
    pub signed: bool,
}

/// A memory store of the low `bytes` bytes of a value of type `ty`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StoreOp {
    pub ty: ValueType,
    pub bytes: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpCode {
    Control(ControlOp),
    Parametric(ParametricOp),
    Variable(VariableOp),
    Constant(ValueType),
    IntArithmetic(IntWidth, IntArithmeticOp),
    FloatArithmetic(FloatWidth, FloatArithmeticOp),
    Bitwise(IntWidth, BitwiseOp),
    Conversion(ConversionOp),
    IntCompare(IntWidth, IntCompareOp),
    FloatCompare(FloatWidth, FloatCompareOp),
    Load(LoadOp),
    Store(StoreOp),
}

impl FromStr for OpCode {
    type Err = DecodeError;

    /// Parse a mnemonic. Both the legacy text format names (`get_local`, `i32.wrap/i64`) and the
    /// current names (`local.get`, `i32.wrap_i64`) are accepted.
    fn from_str(mnemonic: &str) -> Result<Self> {
        let op_code = match mnemonic {
            "nop" => Self::Control(ControlOp::Nop),
            "block" => Self::Control(ControlOp::Block),
            "loop" => Self::Control(ControlOp::Loop),
            "end" => Self::Control(ControlOp::End),
            "br" => Self::Control(ControlOp::Br),
            "else" => Self::Control(ControlOp::Else),
            "return" => Self::Control(ControlOp::Return),
            "unreachable" => Self::Control(ControlOp::Unreachable),
            "if" => Self::Control(ControlOp::If),
            "br_if" => Self::Control(ControlOp::BrIf),
            "br_table" => Self::Control(ControlOp::BrTable),
            "call" => Self::Control(ControlOp::Call),
            "call_indirect" => Self::Control(ControlOp::CallIndirect),
            "drop" => Self::Parametric(ParametricOp::Drop),
            "select" => Self::Parametric(ParametricOp::Select),
            "get_local" | "local.get" => Self::Variable(VariableOp::LocalGet),
            "set_local" | "local.set" => Self::Variable(VariableOp::LocalSet),
            "tee_local" | "local.tee" => Self::Variable(VariableOp::LocalTee),
            "get_global" | "global.get" => Self::Variable(VariableOp::GlobalGet),
            "set_global" | "global.set" => Self::Variable(VariableOp::GlobalSet),
            _ => Self::parse_typed(mnemonic)
                .ok_or_else(|| DecodeError::UnknownMnemonic(mnemonic.to_string()))?,
        };

        Ok(op_code)
    }
}

impl OpCode {
    /// Parse a `type.operation` mnemonic.
    fn parse_typed(mnemonic: &str) -> Option<Self> {
        let (prefix, name) = mnemonic.split_once('.')?;
        let ty = prefix.parse::<ValueType>().ok()?;
        if name == "const" {
            return Some(Self::Constant(ty));
        }

        if let Some(op_code) = Self::parse_memory(ty, name) {
            return Some(op_code);
        }

        match ty {
            ValueType::I32 => Self::parse_int(IntWidth::W32, name),
            ValueType::I64 => Self::parse_int(IntWidth::W64, name),
            ValueType::F32 => Self::parse_float(FloatWidth::F32, name),
            ValueType::F64 => Self::parse_float(FloatWidth::F64, name),
        }
    }

    fn parse_memory(ty: ValueType, name: &str) -> Option<Self> {
        let is_int = matches!(ty, ValueType::I32 | ValueType::I64);
        let load = |bytes, signed| Some(Self::Load(LoadOp { ty, bytes, signed }));
        let store = |bytes| Some(Self::Store(StoreOp { ty, bytes }));
        match name {
            "load" => load(ty.bits() / 8, false),
            "store" => store(ty.bits() / 8),
            "load8_s" if is_int => load(1, true),
            "load8_u" if is_int => load(1, false),
            "load16_s" if is_int => load(2, true),
            "load16_u" if is_int => load(2, false),
            "load32_s" if ty == ValueType::I64 => load(4, true),
            "load32_u" if ty == ValueType::I64 => load(4, false),
            "store8" if is_int => store(1),
            "store16" if is_int => store(2),
            "store32" if ty == ValueType::I64 => store(4),
            _ => None,
        }
    }

    fn parse_int(width: IntWidth, name: &str) -> Option<Self> {
        use IntArithmeticOp as A;
        use IntCompareOp as C;

        let arithmetic = |op| Some(Self::IntArithmetic(width, op));
        let bitwise = |op| Some(Self::Bitwise(width, op));
        let compare = |op| Some(Self::IntCompare(width, op));
        match name {
            "add" => arithmetic(A::Add),
            "sub" => arithmetic(A::Sub),
            "mul" => arithmetic(A::Mul),
            "div_s" => arithmetic(A::DivS),
            "div_u" => arithmetic(A::DivU),
            "rem_s" => arithmetic(A::RemS),
            "rem_u" => arithmetic(A::RemU),
            "clz" => arithmetic(A::Clz),
            "ctz" => arithmetic(A::Ctz),
            "popcnt" => arithmetic(A::Popcnt),
            "and" => bitwise(BitwiseOp::And),
            "or" => bitwise(BitwiseOp::Or),
            "xor" => bitwise(BitwiseOp::Xor),
            "shl" => bitwise(BitwiseOp::Shl),
            "shr_s" => bitwise(BitwiseOp::ShrS),
            "shr_u" => bitwise(BitwiseOp::ShrU),
            "rotl" => bitwise(BitwiseOp::Rotl),
            "rotr" => bitwise(BitwiseOp::Rotr),
            "eqz" => compare(C::Eqz),
            "eq" => compare(C::Eq),
            "ne" => compare(C::Ne),
            "lt_s" => compare(C::LtS),
            "lt_u" => compare(C::LtU),
            "gt_s" => compare(C::GtS),
            "gt_u" => compare(C::GtU),
            "le_s" => compare(C::LeS),
            "le_u" => compare(C::LeU),
            "ge_s" => compare(C::GeS),
            "ge_u" => compare(C::GeU),
            "extend8_s" => Self::extend_low(width, 8),
            "extend16_s" => Self::extend_low(width, 16),
            "extend32_s" if width == IntWidth::W64 => Self::extend_low(width, 32),
            _ => Self::parse_int_conversion(width, name),
        }
    }

    fn extend_low(width: IntWidth, from_bits: u32) -> Option<Self> {
        Some(Self::Conversion(ConversionOp::ExtendLow { width, from_bits }))
    }

    fn parse_int_conversion(width: IntWidth, name: &str) -> Option<Self> {
        let (verb, signed, source) = split_conversion(name)?;
        let op = match (width, verb, signed, source) {
            (IntWidth::W32, "wrap", None, "i64") => ConversionOp::Wrap,
            (IntWidth::W64, "extend", Some(signed), "i32") => ConversionOp::Extend { signed },
            (_, "extend", Some(true), "i8") => ConversionOp::ExtendLow {
                width,
                from_bits: 8,
            },
            (_, "extend", Some(true), "i16") => ConversionOp::ExtendLow {
                width,
                from_bits: 16,
            },
            (_, "trunc", Some(signed), source) => ConversionOp::Truncate {
                signed,
                to: width,
                from: float_width(source)?,
            },
            (IntWidth::W32, "reinterpret", None, "f32") => {
                ConversionOp::ReinterpretFloat(FloatWidth::F32)
            }
            (IntWidth::W64, "reinterpret", None, "f64") => {
                ConversionOp::ReinterpretFloat(FloatWidth::F64)
            }
            _ => return None,
        };

        Some(Self::Conversion(op))
    }

    fn parse_float(width: FloatWidth, name: &str) -> Option<Self> {
        use FloatArithmeticOp as A;
        use FloatCompareOp as C;

        let arithmetic = |op| Some(Self::FloatArithmetic(width, op));
        let compare = |op| Some(Self::FloatCompare(width, op));
        match name {
            "add" => arithmetic(A::Add),
            "sub" => arithmetic(A::Sub),
            "mul" => arithmetic(A::Mul),
            "div" => arithmetic(A::Div),
            "min" => arithmetic(A::Min),
            "max" => arithmetic(A::Max),
            "copysign" => arithmetic(A::Copysign),
            "sqrt" => arithmetic(A::Sqrt),
            "floor" => arithmetic(A::Floor),
            "ceil" => arithmetic(A::Ceil),
            "trunc" => arithmetic(A::Trunc),
            "nearest" => arithmetic(A::Nearest),
            "abs" => arithmetic(A::Abs),
            "neg" => arithmetic(A::Neg),
            "eq" => compare(C::Eq),
            "ne" => compare(C::Ne),
            "lt" => compare(C::Lt),
            "gt" => compare(C::Gt),
            "le" => compare(C::Le),
            "ge" => compare(C::Ge),
            _ => Self::parse_float_conversion(width, name),
        }
    }

    fn parse_float_conversion(width: FloatWidth, name: &str) -> Option<Self> {
        let (verb, signed, source) = split_conversion(name)?;
        let op = match (width, verb, signed, source) {
            (_, "convert", Some(signed), source) => ConversionOp::Convert {
                signed,
                to: width,
                from: int_width(source)?,
            },
            (FloatWidth::F32, "demote", None, "f64") => ConversionOp::Demote,
            (FloatWidth::F64, "promote", None, "f32") => ConversionOp::Promote,
            (FloatWidth::F32, "reinterpret", None, "i32") => {
                ConversionOp::ReinterpretInt(IntWidth::W32)
            }
            (FloatWidth::F64, "reinterpret", None, "i64") => {
                ConversionOp::ReinterpretInt(IntWidth::W64)
            }
            _ => return None,
        };

        Some(Self::Conversion(op))
    }
}

fn int_width(name: &str) -> Option<IntWidth> {
    match name {
        "i32" => Some(IntWidth::W32),
        "i64" => Some(IntWidth::W64),
        _ => None,
    }
}

fn float_width(name: &str) -> Option<FloatWidth> {
    match name {
        "f32" => Some(FloatWidth::F32),
        "f64" => Some(FloatWidth::F64),
        _ => None,
    }
}

fn split_sign(name: &str) -> (&str, Option<bool>) {
    if let Some(name) = name.strip_suffix("_s") {
        (name, Some(true))
    } else if let Some(name) = name.strip_suffix("_u") {
        (name, Some(false))
    } else {
        (name, None)
    }
}

/// Split a conversion name into its verb, signedness and source type. Accepts the legacy form
/// `trunc_s/f32` and the current form `trunc_f32_s`.
fn split_conversion(name: &str) -> Option<(&str, Option<bool>, &str)> {
    if let Some((verb, source)) = name.split_once('/') {
        let (verb, signed) = split_sign(verb);
        return Some((verb, signed, source));
    }

    let (name, signed) = split_sign(name);
    let (verb, source) = name.split_once('_')?;
    Some((verb, signed, source))
}

/// Read an unsigned LEB128 value. Returns the value and the number of bytes consumed.
pub fn read_leb128(bytes: &[u8]) -> Result<(u64, usize)> {
    let mut value = 0u64;
    for (i, byte) in bytes.iter().enumerate() {
        let shift = 7 * i as u32;
        let payload = u64::from(byte & 0x7F);
        if shift >= u64::BITS || (payload << shift) >> shift != payload {
            return Err(DecodeError::OperandOverflow);
        }

        value |= payload << shift;
        if byte & 0x80 == 0 {
            return Ok((value, i + 1));
        }
    }

    Err(DecodeError::TruncatedOperand)
}

/// Read consecutive unsigned LEB128 values until the input is exhausted.
fn read_leb128_all(mut bytes: &[u8]) -> Result<Vec<u64>> {
    let mut values = Vec::new();
    while !bytes.is_empty() {
        let (value, len) = read_leb128(bytes)?;
        values.push(value);
        bytes = &bytes[len..];
    }

    Ok(values)
}

/// Operands of `br_table`: the branch depth for each index followed by the default depth.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchTable {
    pub targets: Vec<u64>,
    pub default: u64,
}

impl BranchTable {
    /// Decode the target count, each target and the default target.
    pub fn decode(operand: &[u8]) -> Result<Self> {
        let values = read_leb128_all(operand)?;
        let (&count, rest) = values.split_first().ok_or(DecodeError::TruncatedOperand)?;
        let count = usize::try_from(count).map_err(|_| DecodeError::OperandOverflow)?;
        if rest.len() < count + 1 {
            return Err(DecodeError::TruncatedOperand);
        }

        Ok(Self {
            targets: rest[..count].to_vec(),
            default: rest[count],
        })
    }
}

/// Alignment and offset immediates of a memory instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemArg {
    pub align: u64,
    pub offset: u64,
}

impl MemArg {
    pub fn decode(operand: &[u8]) -> Result<Self> {
        let (align, len) = read_leb128(operand)?;
        let (offset, _) = read_leb128(&operand[len..])?;
        Ok(Self { align, offset })
    }
}

/// A decoded instruction as produced by the module decoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    pub op_code: OpCode,
    pub mnemonic: String,

    /// Raw operand bytes
    pub operand: Vec<u8>,

    /// Textual form, e.g. `i32.const 42`
    pub text: String,

    /// Marks the synthetic `nop` that ends a function. Emulating it returns to the caller.
    pub function_exit: bool,
}

impl Instruction {
    pub fn new(
        mnemonic: impl Into<String>,
        operand: impl Into<Vec<u8>>,
        text: impl Into<String>,
    ) -> Result<Self> {
        let mnemonic = mnemonic.into();
        Ok(Self {
            op_code: mnemonic.parse()?,
            mnemonic,
            operand: operand.into(),
            text: text.into(),
            function_exit: false,
        })
    }

    /// An instruction without operands whose text is the mnemonic.
    pub fn simple(mnemonic: &str) -> Result<Self> {
        Self::new(mnemonic, Vec::<u8>::new(), mnemonic)
    }

    /// Mark this instruction as the exit of its function.
    pub fn function_exit(mut self) -> Self {
        self.function_exit = true;
        self
    }

    /// The whitespace separated token of the text form at `index`.
    pub fn token(&self, index: usize) -> Option<&str> {
        self.text.split(' ').nth(index)
    }

    /// The final token of the text form.
    pub fn last_token(&self) -> Option<&str> {
        self.text.split(' ').last()
    }
}

impl std::fmt::Display for Instruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text)
    }
}

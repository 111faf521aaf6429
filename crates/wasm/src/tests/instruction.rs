use crate::instruction::*;

fn op_code(mnemonic: &str) -> Result<OpCode> {
    mnemonic.parse()
}

#[test]
fn legacy_and_current_names() -> Result<()> {
    let pairs = [
        ("get_local", "local.get"),
        ("set_local", "local.set"),
        ("tee_local", "local.tee"),
        ("get_global", "global.get"),
        ("set_global", "global.set"),
        ("i32.wrap/i64", "i32.wrap_i64"),
        ("i64.extend_s/i32", "i64.extend_i32_s"),
        ("i64.extend_u/i32", "i64.extend_i32_u"),
        ("i32.trunc_s/f64", "i32.trunc_f64_s"),
        ("i64.trunc_u/f32", "i64.trunc_f32_u"),
        ("f32.demote/f64", "f32.demote_f64"),
        ("f64.promote/f32", "f64.promote_f32"),
        ("f32.convert_u/i64", "f32.convert_i64_u"),
        ("i32.reinterpret/f32", "i32.reinterpret_f32"),
        ("f64.reinterpret/i64", "f64.reinterpret_i64"),
        ("i32.extend_s/i8", "i32.extend8_s"),
    ];

    for (legacy, current) in pairs {
        assert_eq!(op_code(legacy)?, op_code(current)?, "{legacy} != {current}");
    }

    Ok(())
}

#[test]
fn conversions() -> Result<()> {
    assert_eq!(
        op_code("i64.extend_i32_s")?,
        OpCode::Conversion(ConversionOp::Extend { signed: true })
    );
    assert_eq!(
        op_code("f32.convert_u/i64")?,
        OpCode::Conversion(ConversionOp::Convert {
            signed: false,
            to: FloatWidth::F32,
            from: IntWidth::W64,
        })
    );
    assert_eq!(
        op_code("i32.trunc_f64_s")?,
        OpCode::Conversion(ConversionOp::Truncate {
            signed: true,
            to: IntWidth::W32,
            from: FloatWidth::F64,
        })
    );
    assert_eq!(
        op_code("i64.extend32_s")?,
        OpCode::Conversion(ConversionOp::ExtendLow {
            width: IntWidth::W64,
            from_bits: 32,
        })
    );
    assert_eq!(
        op_code("f32.reinterpret_i32")?,
        OpCode::Conversion(ConversionOp::ReinterpretInt(IntWidth::W32))
    );
    Ok(())
}

#[test]
fn typed_operations() -> Result<()> {
    assert_eq!(
        op_code("i64.rem_u")?,
        OpCode::IntArithmetic(IntWidth::W64, IntArithmeticOp::RemU)
    );
    assert_eq!(
        op_code("f32.nearest")?,
        OpCode::FloatArithmetic(FloatWidth::F32, FloatArithmeticOp::Nearest)
    );
    assert_eq!(
        op_code("i32.rotr")?,
        OpCode::Bitwise(IntWidth::W32, BitwiseOp::Rotr)
    );
    assert_eq!(
        op_code("i32.ge_u")?,
        OpCode::IntCompare(IntWidth::W32, IntCompareOp::GeU)
    );
    assert_eq!(
        op_code("f64.ne")?,
        OpCode::FloatCompare(FloatWidth::F64, FloatCompareOp::Ne)
    );
    assert_eq!(op_code("f64.const")?, OpCode::Constant(ValueType::F64));
    Ok(())
}

#[test]
fn memory_operations() -> Result<()> {
    assert_eq!(
        op_code("i64.load32_u")?,
        OpCode::Load(LoadOp {
            ty: ValueType::I64,
            bytes: 4,
            signed: false,
        })
    );
    assert_eq!(
        op_code("i32.load8_s")?,
        OpCode::Load(LoadOp {
            ty: ValueType::I32,
            bytes: 1,
            signed: true,
        })
    );
    assert_eq!(
        op_code("f64.store")?,
        OpCode::Store(StoreOp {
            ty: ValueType::F64,
            bytes: 8,
        })
    );
    Ok(())
}

#[test]
fn unknown_mnemonics() {
    for mnemonic in [
        "i32.frobnicate",
        "v128.const",
        "f32.load8_s",
        "i32.load32_u",
        "i32.extend_i32_s",
        "f32.promote_f32",
        "",
    ] {
        assert_eq!(
            op_code(mnemonic),
            Err(DecodeError::UnknownMnemonic(mnemonic.to_string())),
            "{mnemonic}"
        );
    }
}

#[test]
fn leb128() -> Result<()> {
    assert_eq!(read_leb128(&[0x02])?, (2, 1));
    assert_eq!(read_leb128(&[0xE5, 0x8E, 0x26, 0xFF])?, (624485, 3));
    assert_eq!(read_leb128(&[0x80]), Err(DecodeError::TruncatedOperand));
    assert_eq!(read_leb128(&[]), Err(DecodeError::TruncatedOperand));

    let mut max = vec![0xFF; 9];
    max.push(0x01);
    assert_eq!(read_leb128(&max)?, (u64::MAX, 10));

    let mut overflow = vec![0x80; 10];
    overflow.push(0x01);
    assert_eq!(read_leb128(&overflow), Err(DecodeError::OperandOverflow));
    Ok(())
}

#[test]
fn branch_table() -> Result<()> {
    let table = BranchTable::decode(&[3, 0, 1, 0, 2])?;
    assert_eq!(table.targets, vec![0, 1, 0]);
    assert_eq!(table.default, 2);

    let table = BranchTable::decode(&[0, 5])?;
    assert!(table.targets.is_empty());
    assert_eq!(table.default, 5);

    assert_eq!(
        BranchTable::decode(&[3, 0, 1]),
        Err(DecodeError::TruncatedOperand)
    );
    assert_eq!(BranchTable::decode(&[]), Err(DecodeError::TruncatedOperand));
    Ok(())
}

#[test]
fn memarg() -> Result<()> {
    assert_eq!(
        MemArg::decode(&[0x02, 0x90, 0x01])?,
        MemArg {
            align: 2,
            offset: 144
        }
    );
    assert_eq!(MemArg::decode(&[0x02]), Err(DecodeError::TruncatedOperand));
    Ok(())
}

#[test]
fn text_form() -> Result<()> {
    let text = "f64.const 0x1.9p+6 (;=100;)";
    let instruction = Instruction::new("f64.const", Vec::<u8>::new(), text)?;
    assert_eq!(instruction.to_string(), "f64.const 0x1.9p+6 (;=100;)");
    assert_eq!(instruction.token(1), Some("0x1.9p+6"));
    assert_eq!(instruction.last_token(), Some("(;=100;)"));
    assert!(!instruction.function_exit);
    assert!(Instruction::simple("nop")?.function_exit().function_exit);
    Ok(())
}

use crate::*;

#[test]
fn concrete_integers() {
    let value = Expr::bv(0xFFFF_FFFE, 32);
    assert_eq!(u32::try_from(&value), Ok(0xFFFF_FFFE));
    assert_eq!(i32::try_from(&value), Ok(-2));
    assert_eq!(u8::try_from(&Expr::bv(0x7F, 8)), Ok(0x7F));
    assert_eq!(i64::try_from(&Expr::bv(u64::MAX, 64)), Ok(-1));
}

#[test]
fn width_must_match() {
    let result = u64::try_from(&Expr::bv(1, 32));
    assert_eq!(
        result,
        Err(ConcretizationError::WrongSort {
            expected: Sort::BitVec(64),
            actual: Sort::BitVec(32),
        })
    );
}

#[test]
fn symbolic_value() {
    let x = Expr::var("x", Sort::BitVec(32));
    assert_eq!(
        u32::try_from(&x),
        Err(ConcretizationError::Symbolic("x".to_string()))
    );
}

#[test]
fn concrete_floats() {
    assert_eq!(f32::try_from(&Expr::f32(1.25)), Ok(1.25));
    assert_eq!(f64::try_from(&Expr::f64(-3.5)), Ok(-3.5));
}

#[test]
fn concrete_bool() {
    assert_eq!(bool::try_from(&Expr::bool(true)), Ok(true));
    assert!(bool::try_from(&Expr::bv(1, 1)).is_err());
}

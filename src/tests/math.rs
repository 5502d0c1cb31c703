use super::*;

#[test]
fn test_arithmetic() {
    assert_result(Value::Int(14), "2 + 3 * 4");
    assert_result(Value::Int(15), "(2 + 3) * 3");
    assert_result(Value::Int(-2), "-5 + 3");
    assert_result(Value::Float(2.5), "1.0 + 1.5");
    assert_result(Value::Int(256), "0xff + 1");
}

#[test]
fn test_integer_left_truncates_right_literal() {
    // A number literal opposite an integer-typed left operand truncates.
    assert_result(Value::Int(2), "1 + 1.5");
    assert_result(Value::Int(3), "let a : integer = 2; a + 1.5");
    // A float left operand keeps the literal as written.
    assert_result(Value::Float(3.5), "let a = 2; a + 1.5");
}

#[test]
fn test_division() {
    // Integer division stays integral only when it divides evenly.
    assert_result(Value::Int(5), "10 / 2");
    assert_result(Value::Float(3.5), "7 / 2");
    assert_result(Value::Float(2.5), "5.0 / 2");
}

#[test]
fn test_division_by_zero() {
    assert!(matches!(
        runtime_error("1 / 0", &Value::Null),
        LangErrorMsg::DivisionByZero
    ));
    assert!(matches!(
        runtime_error("7 % 0", &Value::Null),
        LangErrorMsg::DivisionByZero
    ));
}

#[test]
fn test_modulo() {
    assert_result(Value::Int(1), "7 % 3");
    assert_result(Value::Int(0), "let n : integer = 8; n % 2");
}

#[test]
fn test_modulo_rejected_on_floats() {
    assert!(matches!(
        compile_error("7.5 % 2"),
        LangErrorMsg::UnsupportedOperator { .. }
    ));
    // Untyped variables default to float, so this is rejected too.
    assert!(matches!(
        compile_error("let n = 8; n % 2"),
        LangErrorMsg::UnsupportedOperator { .. }
    ));
}

#[test]
fn test_string_concat() {
    assert_result(Value::Str("a1".to_owned()), "'a' + 1");
    assert_result(Value::Str("12b".to_owned()), "1 + '2b'");
    assert_result(Value::Str("ab".to_owned()), "\"a\" + \"b\"");
}

#[test]
fn test_comparisons() {
    assert_result(Value::Bool(true), "3 > 2");
    assert_result(Value::Bool(false), "3 < 2");
    assert_result(Value::Bool(true), "2 <= 2");
    assert_result(Value::Bool(true), "2 == 2.0");
    assert_result(Value::Bool(true), "2 != 3");
    assert_result(Value::Bool(true), "'apple' < 'banana'");
    assert_result(Value::Bool(true), "2 + 5 == 7");
    assert_result(Value::Bool(true), "2 + 5 == (3 * 7) / 3");
}

#[test]
fn test_logical_operators() {
    // `&&` and `||` yield one of their operands.
    assert_result(Value::Int(5), "0 || 5");
    assert_result(Value::Int(7), "1 && 7");
    assert_result(Value::Int(0), "0 && 7");
    assert_result(Value::Bool(true), "true xor false");
    assert_result(Value::Bool(false), "true xor true");
    // Keyword spellings.
    assert_result(Value::Int(2), "1 and 2");
    assert_result(Value::Int(1), "1 or 2");
}

#[test]
fn test_shifts() {
    assert_result(Value::Int(2), "8 >> 2");
    assert_result(Value::Int(4), "32 >>> 3");
}

#[test]
fn test_not() {
    assert_result(Value::Bool(true), "!0");
    assert_result(Value::Bool(false), "!'x'");
}

#[test]
fn test_builtin_functions() {
    assert_result(Value::Int(2), "floor(2.7)");
    assert_result(Value::Int(3), "ceil(2.1)");
    assert_result(Value::Int(3), "round(2.6)");
    assert_result(Value::Int(4), "abs(-4)");
    assert_result(Value::Float(3.0), "sqrt(9.0)");
    assert_result(Value::Float(3.5), "max(2, 3.5)");
    assert_result(Value::Int(2), "min(2, 3)");
    assert_result(Value::Float(8.0), "pow(2, 3)");
}

#[test]
fn test_builtin_arity() {
    assert!(matches!(
        compile_error("floor(1, 2)"),
        LangErrorMsg::ArityMismatch {
            expected: 1,
            got: 2,
            ..
        }
    ));
}

#[test]
fn test_unknown_function() {
    assert!(matches!(
        compile_error("nope(1)"),
        LangErrorMsg::UnknownFunction(_)
    ));
}

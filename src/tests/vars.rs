use super::*;

#[test]
fn test_let_and_use() {
    assert_result(Value::Int(6), "let a = 2; let b = 3; a * b");
    assert_result(Value::Int(5), "let a = 2, b = 3; a + b");
}

#[test]
fn test_integer_declaration_truncates() {
    assert_result(Value::Int(2), "let a : integer = 2.9; a");
    assert_result(Value::Int(3), "let a : longint = 3.5; a");
}

#[test]
fn test_assignment_expression_value() {
    assert_result(Value::Int(5), "let a = 1; a = 5");
    // Assigning to an integer variable keeps it integral.
    assert_result(Value::Int(2), "let a : integer = 5; a = a / 2; a");
}

#[test]
fn test_shadowing() {
    // A second declaration appends a new slot; the latest one wins.
    assert_result(Value::Int(2), "let a = 1; let a = 2; a");
}

#[test]
fn test_block_declarations_leak() {
    // Plain blocks share the surrounding scope.
    assert_result(Value::Int(5), "{ let a = 5; } a");
}

#[test]
fn test_constants() {
    assert_result(Value::Float(6.28), "constant PI = 3.14; PI * 2");
    assert_result(Value::Str("on".to_owned()), "constant MODE = 'on'; MODE");
}

#[test]
fn test_constant_resolves_before_locals() {
    // The constant table is consulted first, so a later `let` with the
    // same name does not shadow the constant.
    assert_result(Value::Int(1), "constant X = 1; let X = 2; X");
    // Constant values carry their type into inference.
    assert_result(Value::Int(0), "constant N = 8; N % 2");
}

#[test]
fn test_constant_not_assignable() {
    assert!(matches!(
        compile_error("constant X = 1; X = 2;"),
        LangErrorMsg::InvalidAssignmentTarget
    ));
}

#[test]
fn test_compound_assignment() {
    assert_result(Value::Int(3), "let a : integer = 1; a += 2; a");
    assert!(matches!(
        compile_error("let a = 1; a += a;"),
        LangErrorMsg::UnsupportedOperator { .. }
    ));
    assert!(matches!(
        compile_error("let a = 1; a -= 1;"),
        LangErrorMsg::UnsupportedOperator { .. }
    ));
}

#[test]
fn test_assignment_to_undeclared() {
    assert!(matches!(
        compile_error("b = 1;"),
        LangErrorMsg::UnknownVariable(_)
    ));
}

#[test]
fn test_member_assignment() {
    assert_result(Value::Int(9), "let xs = [1, 2, 3]; xs[1] = 9; xs[1]");
    assert_result(
        Value::Array(vec![Value::Int(1), Value::Int(9), Value::Int(3)]),
        "let xs = [1, 2, 3]; xs[1] = 9; xs",
    );
}

#[test]
fn test_assignment_copies_arrays() {
    // Assigning one variable to another copies the value; mutating the
    // copy leaves the source alone.
    assert_result(
        Value::Int(1),
        "let a = [1, 2]; let b = a; b[0] = 9; a[0]",
    );
}

#[test]
fn test_member_assignment_out_of_range() {
    assert!(matches!(
        runtime_error("let xs = [1]; xs[5] = 2;", &Value::Null),
        LangErrorMsg::InvalidArrayAccess(_)
    ));
}

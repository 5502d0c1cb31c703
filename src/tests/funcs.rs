use super::*;

#[test]
fn test_function_call() {
    assert_result(
        Value::Int(5),
        "function add(a, b) { return a + b; } add(2, 3)",
    );
}

#[test]
fn test_implicit_return() {
    // A function body's last expression is its result.
    assert_result(Value::Int(8), "function double(x) { x * 2 } double(4)");
}

#[test]
fn test_function_arity() {
    assert!(matches!(
        compile_error("function f(a) { return a; } f(1, 2)"),
        LangErrorMsg::ArityMismatch {
            expected: 1,
            got: 2,
            ..
        }
    ));
}

#[test]
fn test_return_type_checked() {
    assert!(matches!(
        compile_error("function f() : string { return 1; } f()"),
        LangErrorMsg::InvalidReturnType { .. }
    ));
    // The numeric types are interchangeable.
    assert_result(Value::Int(1), "function f() : float { return 1; } f()");
}

#[test]
fn test_function_scope_is_isolated() {
    assert_result(
        Value::Int(100),
        "let a = 1; function f() { let a = 99; return a; } f() + a",
    );
}

#[test]
fn test_typed_parameters() {
    assert_result(
        Value::Bool(true),
        "function even(n : integer) { return n % 2 == 0; } even(4)",
    );
}

#[test]
fn test_functions_compose() {
    assert_result(
        Value::Int(10),
        "function inc(x) { return x + 1; } \
         function twice(x) { return inc(inc(x)); } \
         twice(8)",
    );
}

#[test]
fn test_call_on_non_function_expression() {
    assert!(matches!(
        compile_error("let f = 1; (f)()"),
        LangErrorMsg::UnknownFunction(_)
    ));
}

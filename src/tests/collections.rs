use super::*;

#[test]
fn test_for_each() {
    assert_result(
        Value::Int(6),
        "let xs = [1, 2, 3]; let total : integer = 0; \
         forEach x in xs { total = x + total; } total",
    );
}

#[test]
fn test_for_each_over_payload() {
    assert_result_with(
        Value::Int(60),
        "let total : integer = 0; forEach x in payload.items { total = x + total; } total",
        &Value::from_pairs(vec![(
            "items",
            Value::Array(vec![Value::Int(10), Value::Int(20), Value::Int(30)]),
        )]),
    );
}

#[test]
fn test_for_each_over_non_array() {
    assert!(matches!(
        runtime_error("forEach x in payload.items { x; }", &Value::Null),
        LangErrorMsg::InvalidArrayAccess(_)
    ));
}

#[test]
fn test_map_statement_rewrites_source() {
    assert_result(
        Value::Array(vec![Value::Int(2), Value::Int(4), Value::Int(6)]),
        "let xs = [1, 2, 3]; map x in xs { x * 2 }; xs",
    );
    // `to` before the body is accepted.
    assert_result(
        Value::Array(vec![Value::Int(0), Value::Int(1), Value::Int(2)]),
        "let xs = [1, 2, 3]; map x in xs to { x - 1 }; xs",
    );
}

#[test]
fn test_map_statement_needs_local() {
    // The standalone form writes back into its source, so a payload list
    // cannot be used.
    assert!(matches!(
        compile_error("map x in payload.items { x }"),
        LangErrorMsg::UnknownVariable(_)
    ));
}

#[test]
fn test_map_expression() {
    assert_result(
        Value::Array(vec![Value::Int(2), Value::Int(3), Value::Int(4)]),
        "let xs = [1, 2, 3]; let ys = map x in xs { x + 1 }; ys",
    );
    // The expression form reads payload lists without rebinding anything.
    assert_result_with(
        Value::Array(vec![Value::Int(2), Value::Int(4)]),
        "let ys = map x in payload.items { x * 2 }; ys",
        &Value::from_pairs(vec![(
            "items",
            Value::Array(vec![Value::Int(1), Value::Int(2)]),
        )]),
    );
}

#[test]
fn test_filter_statement() {
    assert_result(
        Value::Array(vec![Value::Int(2), Value::Int(4)]),
        "let xs = [1, 2, 3, 4]; filter x in xs where x % 2 == 0; xs",
    );
}

#[test]
fn test_filter_expression() {
    assert_result(
        Value::Int(2),
        "let xs = [1, 2, 3, 4]; let ys = filter x in xs where x > 2; ys.length",
    );
}

#[test]
fn test_array_indexing() {
    assert_result(Value::Int(1), "let xs = [1, 2, 3]; xs[0]");
    // Negative indices count from the end.
    assert_result(Value::Int(3), "let xs = [1, 2, 3]; xs[-1]");
    assert_result(Value::Null, "let xs = [1]; xs[5]");
}

#[test]
fn test_string_indexing() {
    assert_result(Value::Str("e".to_owned()), "'hello'[1]");
    assert_result(Value::Str("o".to_owned()), "'hello'[-1]");
}

#[test]
fn test_length() {
    assert_result(Value::Int(3), "let xs = [1, 2, 3]; xs.length");
    assert_result(Value::Int(5), "'hello'.length");
}

#[test]
fn test_typed_array_elements() {
    assert_result(Value::Int(1), "let xs : integer[] = [1, 2]; xs[0]");
    assert!(matches!(
        compile_error("let xs : integer[] = [1, 'a'];"),
        LangErrorMsg::ElementTypeMismatch
    ));
}

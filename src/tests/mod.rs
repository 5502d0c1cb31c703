//! Black-box tests that compile and run whole programs.

mod blocks;
mod collections;
mod funcs;
mod markup;
mod math;
mod props;
mod vars;

use crate::*;

/// Compiles a program with default options and runs it against the given
/// payload.
pub fn run_with(source: &str, payload: &Value) -> Value {
    compile(source)
        .expect("Compilation failed")
        .run(payload)
        .expect("Runtime error")
}

/// Compiles and runs a program that does not use its payload.
pub fn run(source: &str) -> Value {
    run_with(source, &Value::Null)
}

/// Asserts a program's result.
pub fn assert_result(expected: Value, source: &str) {
    assert_eq!(expected, run(source), "program: {:?}", source);
}

/// Asserts a program's result against a payload.
pub fn assert_result_with(expected: Value, source: &str, payload: &Value) {
    assert_eq!(expected, run_with(source, payload), "program: {:?}", source);
}

/// Asserts that compilation fails, returning the error.
pub fn compile_error(source: &str) -> LangErrorMsg {
    compile(source)
        .expect_err(&format!("Program should not compile: {:?}", source))
        .msg
}

/// Asserts that a program compiles but fails at runtime.
pub fn runtime_error(source: &str, payload: &Value) -> LangErrorMsg {
    compile(source)
        .expect("Compilation failed")
        .run(payload)
        .expect_err(&format!("Program should fail at runtime: {:?}", source))
        .msg
}

#[test]
fn test_concurrent_runs() {
    use std::sync::Arc;
    use std::thread;

    let program = Arc::new(compile("let a : integer = 0; a = payload.n; a * 2").unwrap());
    let handles: Vec<_> = (0..8)
        .map(|n| {
            let program = Arc::clone(&program);
            thread::spawn(move || {
                let payload = Value::from_pairs(vec![("n", Value::Int(n))]);
                program.run(&payload).unwrap()
            })
        })
        .collect();
    for (n, handle) in handles.into_iter().enumerate() {
        assert_eq!(Value::Int(n as i64 * 2), handle.join().unwrap());
    }
}

#[test]
fn test_error_display_with_source() {
    let source = "let a = $;";
    let err = compile(source).unwrap_err();
    assert!(matches!(err.msg, LangErrorMsg::UnexpectedCharacter('$')));
    let display = err.with_source(source).to_string();
    assert!(display.contains("let a = $;"));
    assert!(display.contains('^'));
}

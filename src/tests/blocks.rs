use super::*;
use crate::registry::BlockMeta;

fn options_with_block(name: &str) -> CompileOptions {
    let mut options = CompileOptions::default();
    options.blocks.register_block(
        name,
        BlockMeta {
            description: "test block".to_owned(),
        },
    );
    options
}

#[test]
fn test_custom_block_sees_preceding_declarations() {
    let options = options_with_block("when");
    let program = compile_with("let threshold = 50; when { threshold + 3 }", &options)
        .expect("Compilation failed");
    let block = program.blocks.get("when").expect("block not compiled");
    assert_eq!("test block", block.description);
    assert_eq!(Value::Int(53), block.run(&Value::Null).unwrap());
}

#[test]
fn test_custom_block_mixes_locals_and_payload() {
    let options = options_with_block("adjust");
    let program = compile_with(
        "let a = 42; adjust { let b = 5; a = a + b; a = a + c; return a; }",
        &options,
    )
    .unwrap();
    let block = program.blocks.get("adjust").unwrap();
    let payload = Value::from_pairs(vec![("c", Value::Int(6))]);
    assert_eq!(Value::Int(53), block.run(&payload).unwrap());
}

#[test]
fn test_custom_block_runs_with_own_payload() {
    let options = options_with_block("when");
    let program = compile_with("when { payload.v * 2 }", &options).unwrap();
    let block = program.blocks.get("when").unwrap();
    let payload = Value::from_pairs(vec![("v", Value::Int(21))]);
    assert_eq!(Value::Int(42), block.run(&payload).unwrap());
}

#[test]
fn test_custom_block_declarations_stay_inside() {
    let options = options_with_block("when");
    let program = compile_with("when { let inner = 1; } inner", &options).unwrap();
    // After the block, `inner` is not a local; it falls back to the payload.
    assert_eq!(Value::Null, program.run(&Value::Null).unwrap());
}

#[test]
fn test_unknown_block() {
    assert!(matches!(
        compile_error("verify { 1 }"),
        LangErrorMsg::UnknownBlock(name) if name == "verify"
    ));
}

#[test]
fn test_unregister_block() {
    let mut options = options_with_block("when");
    options.blocks.unregister_block("when");
    let err = compile_with("when { 1 }", &options).unwrap_err();
    assert!(matches!(err.msg, LangErrorMsg::UnknownBlock(_)));
}

#[test]
fn test_custom_functions() {
    use std::sync::Arc;

    let mut options = CompileOptions::default();
    options.functions.register_function(
        "triple",
        1,
        false,
        Arc::new(|args: &[Value]| match args[0].as_int() {
            Some(i) => Value::Int(i * 3),
            None => Value::Null,
        }),
    );
    let program = compile_with("triple(7)", &options).unwrap();
    assert_eq!(Value::Int(21), program.run(&Value::Null).unwrap());
    assert!(program.bindings.contains_key("triple"));
}

#[test]
fn test_custom_function_receives_payload_first() {
    use std::sync::Arc;

    let mut options = CompileOptions::default();
    options.functions.register_function(
        "fieldOf",
        1,
        true,
        Arc::new(|args: &[Value]| {
            // args[0] is the payload, args[1] the script argument.
            match (&args[0], args[1].as_str()) {
                (Value::Object(map), Some(key)) => {
                    map.get(key).cloned().unwrap_or(Value::Null)
                }
                _ => Value::Null,
            }
        }),
    );
    let program = compile_with("fieldOf('count')", &options).unwrap();
    let payload = Value::from_pairs(vec![("count", Value::Int(12))]);
    assert_eq!(Value::Int(12), program.run(&payload).unwrap());
}

#[test]
fn test_custom_function_shadows_builtin() {
    use std::sync::Arc;

    let mut options = CompileOptions::default();
    options
        .functions
        .register_function("abs", 1, false, Arc::new(|_| Value::Int(-1)));
    let program = compile_with("abs(5)", &options).unwrap();
    assert_eq!(Value::Int(-1), program.run(&Value::Null).unwrap());
}

#[test]
fn test_custom_function_arity_checked() {
    use std::sync::Arc;

    let mut options = CompileOptions::default();
    options
        .functions
        .register_function("one", 1, false, Arc::new(|_| Value::Null));
    let err = compile_with("one(1, 2)", &options).unwrap_err();
    assert!(matches!(err.msg, LangErrorMsg::ArityMismatch { .. }));
}

//! Compiled program representation.
//!
//! Code generation produces a tree of closures rather than bytecode; each
//! statement becomes a `StmtFn` and each expression an `ExprFn`. Running a
//! program allocates a fresh local-slot frame, so one `CompiledProgram` can
//! be run concurrently from many threads.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::value::Value;
use crate::errors::*;

/// A compiled statement.
pub type StmtFn = Arc<dyn Fn(&mut Rt) -> LangResult<Flow> + Send + Sync>;
/// A compiled expression.
pub type ExprFn = Arc<dyn Fn(&mut Rt) -> LangResult<Value> + Send + Sync>;

/// What a statement did to control flow.
pub enum Flow {
    /// Statement completed with no interesting value.
    Next,
    /// An expression statement completed; its value becomes the program
    /// result if it is the last one.
    Value(Value),
    /// A `return` executed; unwind to the enclosing function or program.
    Return(Value),
}

/// Per-invocation runtime state.
pub struct Rt<'a> {
    /// The input value the program was invoked with.
    pub payload: &'a Value,
    /// Flat local-slot frame; slots are assigned positionally at compile
    /// time.
    pub locals: Vec<Value>,
}
impl<'a> Rt<'a> {
    pub fn new(payload: &'a Value, slot_count: usize) -> Self {
        Self {
            payload,
            locals: vec![Value::Null; slot_count],
        }
    }
}

/// Runs a statement list, tracking the value of the last expression
/// statement. `Return` short-circuits.
pub fn run_body(body: &[StmtFn], rt: &mut Rt) -> LangResult<Flow> {
    let mut last = Value::Null;
    for stmt in body {
        match stmt(rt)? {
            Flow::Next => (),
            Flow::Value(v) => last = v,
            Flow::Return(v) => return Ok(Flow::Return(v)),
        }
    }
    Ok(Flow::Value(last))
}

/// A program compiled into a callable.
pub struct CompiledProgram {
    pub(crate) body: Vec<StmtFn>,
    pub(crate) slot_count: usize,
    /// Payload paths the program reads, in first-use order, deduplicated.
    /// Member chains appear as dotted paths such as `"user.name"`.
    pub payload_fields: Vec<String>,
    /// The host-registered functions this program actually calls, by name.
    pub bindings: HashMap<String, crate::registry::NativeFn>,
    /// Custom-block bodies compiled alongside the main program, by block
    /// name.
    pub blocks: HashMap<String, CompiledBlock>,
}
impl CompiledProgram {
    /// Runs the program against a payload value. The result is the value of
    /// the last expression statement, or of an executed `return`.
    pub fn run(&self, payload: &Value) -> LangResult<Value> {
        let mut rt = Rt::new(payload, self.slot_count);
        match run_body(&self.body, &mut rt)? {
            Flow::Value(v) | Flow::Return(v) => Ok(v),
            Flow::Next => Ok(Value::Null),
        }
    }

    /// Checks that the payload carries every field the program reads.
    /// Dotted paths are checked by their first segment. Returns the first
    /// missing field as an error.
    pub fn validate_payload(&self, payload: &Value) -> LangResult<()> {
        for field in &self.payload_fields {
            let root = field.split('.').next().unwrap_or_else(|| field.as_str());
            let present = match payload {
                Value::Object(map) => map.contains_key(root),
                _ => false,
            };
            if !present {
                return Err(LangErrorMsg::MissingPayloadField(field.clone()).without_span());
            }
        }
        Ok(())
    }
}
impl fmt::Debug for CompiledProgram {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("CompiledProgram")
            .field("slot_count", &self.slot_count)
            .field("payload_fields", &self.payload_fields)
            .field("bindings", &self.bindings.keys().collect::<Vec<_>>())
            .field("blocks", &self.blocks.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// A custom block's compiled body. Blocks see the top-level variable
/// declarations that precede them in the script, but run against their own
/// payload.
pub struct CompiledBlock {
    pub(crate) program: CompiledProgram,
    /// Description carried over from the block registry.
    pub description: String,
}
impl CompiledBlock {
    pub fn run(&self, payload: &Value) -> LangResult<Value> {
        self.program.run(payload)
    }
}
impl fmt::Debug for CompiledBlock {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("CompiledBlock")
            .field("description", &self.description)
            .finish()
    }
}

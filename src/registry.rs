//! Registries for host-provided custom functions and custom blocks.

use std::collections::HashMap;
use std::sync::Arc;

use crate::compiler::Value;

/// A host function callable from scripts.
pub type NativeFn = Arc<dyn Fn(&[Value]) -> Value + Send + Sync>;

/// A registered custom function.
#[derive(Clone)]
pub struct CustomFunction {
    pub func: NativeFn,
    /// Number of arguments the function expects at the call site.
    pub arity: usize,
    /// When set, the compiled program's payload is prepended to the call
    /// arguments, so the function sees `arity + 1` values.
    pub receive_payload_first: bool,
}

/// Functions registered by the host and resolved before the built-in
/// function table.
#[derive(Default, Clone)]
pub struct CustomFunctionRegistry {
    functions: HashMap<String, CustomFunction>,
}
impl CustomFunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn register_function(
        &mut self,
        name: impl Into<String>,
        arity: usize,
        receive_payload_first: bool,
        func: NativeFn,
    ) {
        self.functions.insert(
            name.into(),
            CustomFunction {
                func,
                arity,
                receive_payload_first,
            },
        );
    }
    pub fn unregister_function(&mut self, name: &str) {
        self.functions.remove(name);
    }
    pub fn get(&self, name: &str) -> Option<&CustomFunction> {
        self.functions.get(name)
    }
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.functions.keys().map(|s| s.as_str())
    }
}

/// Blocks registered by the host; a registered block name followed by `{ ... }`
/// parses as a custom block statement, and its body compiles into a separate
/// program shipped alongside the main one.
#[derive(Default, Clone)]
pub struct CustomBlockRegistry {
    blocks: HashMap<String, BlockMeta>,
}

/// Host-side metadata for a registered block.
#[derive(Debug, Clone, Default)]
pub struct BlockMeta {
    /// Free-form description carried through to the compiled output.
    pub description: String,
}

impl CustomBlockRegistry {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn register_block(&mut self, name: impl Into<String>, meta: BlockMeta) {
        self.blocks.insert(name.into(), meta);
    }
    pub fn unregister_block(&mut self, name: &str) {
        self.blocks.remove(name);
    }
    pub fn contains(&self, name: &str) -> bool {
        self.blocks.contains_key(name)
    }
    pub fn get(&self, name: &str) -> Option<&BlockMeta> {
        self.blocks.get(name)
    }
}

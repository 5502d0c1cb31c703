//! A compiler for a small expression language.
//!
//! Scripts are tokenized, parsed and compiled into a callable that takes a
//! single payload value and produces the value of the script's last
//! expression. The language has typed local variables, functions,
//! conditionals, loops, the collection operators `forEach`, `map` and
//! `filter`, and an escape hatch into an embeddable markup sub-language
//! parsed by a host-provided collaborator.
//!
//! ```
//! use exprlang::{compile, Value};
//!
//! let program = compile("let a = 1; a + payload.x").unwrap();
//! let payload = Value::from_pairs(vec![("x", Value::Int(41))]);
//! assert_eq!(Value::Int(42), program.run(&payload).unwrap());
//! ```

use std::sync::Arc;

pub mod ast;
pub mod compiler;
pub mod errors;
pub mod lexer;
pub mod markup;
pub mod parser;
pub mod registry;
pub mod span;
pub mod types;

#[cfg(test)]
mod tests;

pub use compiler::{CompiledBlock, CompiledProgram, Value};
pub use errors::{CompleteLangResult, LangError, LangErrorMsg, LangResult};
pub use markup::{MarkupParse, MarkupParser, MarkupTree};
pub use registry::{CustomBlockRegistry, CustomFunctionRegistry, NativeFn};
pub use types::VarType;

/// Everything the compiler takes from the host: custom functions, custom
/// blocks, and the markup collaborator.
#[derive(Default, Clone)]
pub struct CompileOptions {
    /// Whether `<` in expression position starts a markup expression. Has no
    /// effect unless a markup collaborator is also set.
    pub support_markup: bool,
    pub functions: CustomFunctionRegistry,
    pub blocks: CustomBlockRegistry,
    pub markup: Option<Arc<dyn MarkupParser>>,
}

/// Compiles source code with default options.
pub fn compile(source: &str) -> LangResult<CompiledProgram> {
    compile_with(source, &CompileOptions::default())
}

/// Compiles source code against host-provided options.
pub fn compile_with(source: &str, options: &CompileOptions) -> LangResult<CompiledProgram> {
    let program = parser::parse(source, options)?;
    compiler::compile_program(&program, options)
}

/// Parses source code to an AST without generating code. Useful for tooling
/// that inspects scripts.
pub fn parse_to_ast(source: &str, options: &CompileOptions) -> LangResult<ast::Program> {
    parser::parse(source, options)
}

//! Code generation.
//!
//! The code generator walks the AST once and produces a tree of `Arc`
//! closures; running the program is running the root closures against a
//! fresh frame of local slots. Variables are positional: each declaration
//! takes the next slot, shadowing appends rather than replaces, and lookup
//! scans from the end so the innermost declaration wins.

use lazy_static::lazy_static;
use log::debug;
use std::collections::HashMap;
use std::sync::Arc;

mod program;
mod value;

pub use program::{CompiledBlock, CompiledProgram, Flow, Rt};
pub use value::Value;

use program::{run_body, ExprFn, StmtFn};

use crate::ast::*;
use crate::errors::*;
use crate::types::{LangFloat, LangInt, VarType};
use crate::CompileOptions;
use LangErrorMsg::*;

/// Compiles a parsed program against the given options.
pub fn compile_program(
    program: &Program,
    options: &CompileOptions,
) -> LangResult<CompiledProgram> {
    let mut compiler = Compiler::new(options);
    let mut body = Vec::with_capacity(program.body.len());
    for stmt in &program.body {
        let compiled = compiler.compile_statement(stmt)?;
        // Top-level declarations are replayed at the start of every custom
        // block compiled later in the script, so the block sees them.
        if let Statement::Variable(_) = stmt {
            compiler.prelude.push(Arc::clone(&compiled));
        }
        body.push(compiled);
    }
    debug!(
        "compiled program: {} slot(s), payload fields {:?}, {} block(s)",
        compiler.slot_high_water,
        compiler.payload_fields,
        compiler.blocks.len()
    );
    Ok(CompiledProgram {
        body,
        slot_count: compiler.slot_high_water,
        payload_fields: compiler.payload_fields,
        bindings: compiler.bindings,
        blocks: compiler.blocks,
    })
}

/// A user-declared function compiled into its own slot frame. Parameters
/// occupy the first slots.
struct UserFunction {
    body: Vec<StmtFn>,
    slot_count: usize,
    /// Declared parameter types; arguments coerce to these on entry.
    param_types: Vec<VarType>,
    return_type: Option<VarType>,
}
impl UserFunction {
    fn arity(&self) -> usize {
        self.param_types.len()
    }
}

/// One step of a member-assignment path.
enum PathSeg {
    /// A static `.field` access.
    Field(String),
    /// A computed `[index]` access.
    Index(ExprFn),
}

/// Positional variable scope. Declaration appends; lookup scans from the end
/// so shadowing works; leaving a loop scope truncates back to a mark.
#[derive(Default)]
struct Scope {
    names: Vec<String>,
    types: Vec<VarType>,
}
impl Scope {
    fn declare(&mut self, name: &str, var_type: VarType) -> usize {
        self.names.push(name.to_owned());
        self.types.push(var_type);
        self.names.len() - 1
    }
    fn lookup(&self, name: &str) -> Option<(usize, VarType)> {
        self.names
            .iter()
            .rposition(|n| n == name)
            .map(|i| (i, self.types[i]))
    }
    fn len(&self) -> usize {
        self.names.len()
    }
    fn truncate(&mut self, len: usize) {
        self.names.truncate(len);
        self.types.truncate(len);
    }
}

struct Compiler<'a> {
    options: &'a CompileOptions,
    scope: Scope,
    /// Highest slot count seen in the current compilation unit; becomes the
    /// frame size.
    slot_high_water: usize,
    constants: HashMap<String, Value>,
    functions: HashMap<String, Arc<UserFunction>>,
    /// Name and declared return type of the function currently being
    /// compiled, if any.
    current_function: Option<(String, Option<VarType>)>,
    /// Payload paths read by the program, in first-use order. Member chains
    /// record their full dotted path.
    payload_fields: Vec<String>,
    /// Set while compiling the object of a member chain whose dotted path
    /// has already been recorded, so the chain's root is not recorded again.
    suppress_payload_record: bool,
    /// Compiled top-level variable declarations, replayed in custom blocks.
    prelude: Vec<StmtFn>,
    /// Host functions referenced by the program so far.
    bindings: HashMap<String, crate::registry::NativeFn>,
    blocks: HashMap<String, CompiledBlock>,
}

impl<'a> Compiler<'a> {
    fn new(options: &'a CompileOptions) -> Self {
        Self {
            options,
            scope: Scope::default(),
            slot_high_water: 0,
            constants: HashMap::new(),
            functions: HashMap::new(),
            current_function: None,
            payload_fields: Vec::new(),
            suppress_payload_record: false,
            prelude: Vec::new(),
            bindings: HashMap::new(),
            blocks: HashMap::new(),
        }
    }

    fn declare(&mut self, name: &str, var_type: VarType) -> usize {
        let slot = self.scope.declare(name, var_type);
        if self.scope.len() > self.slot_high_water {
            self.slot_high_water = self.scope.len();
        }
        slot
    }

    fn record_payload_field(&mut self, name: &str) {
        if self.suppress_payload_record {
            return;
        }
        // `.length` is an accessor, not payload data.
        if name != "length" && !self.payload_fields.iter().any(|f| f == name) {
            self.payload_fields.push(name.to_owned());
        }
    }

    /// The dotted payload path of a member chain ending in `prop`, when the
    /// chain is built entirely from static field accesses and roots in the
    /// payload or in an identifier that falls back to it. Chains rooted in a
    /// local or constant, and chains with computed segments, yield `None`.
    fn payload_member_path(&self, object: &Expr, prop: &str) -> Option<String> {
        let mut segs = vec![prop.to_owned()];
        let mut cursor = object;
        loop {
            match cursor {
                Expr::Member {
                    object,
                    property,
                    computed: false,
                } => {
                    if let Expr::Identifier(name) = &**property {
                        segs.push(name.clone());
                        cursor = object;
                    } else {
                        return None;
                    }
                }
                Expr::Payload => break,
                Expr::Identifier(name) => {
                    if self.scope.lookup(name).is_some() || self.constants.contains_key(name) {
                        return None;
                    }
                    segs.push(name.clone());
                    break;
                }
                _ => return None,
            }
        }
        segs.reverse();
        Some(segs.join("."))
    }

    /// Static type of an expression, as far as it can be known. The left
    /// operand decides for binary and assignment expressions; anything
    /// opaque (payload fields, member access) defaults to float.
    fn type_from_node(&self, expr: &Expr) -> VarType {
        match expr {
            Expr::Identifier(name) => {
                if let Some(value) = self.constants.get(name) {
                    return match value {
                        Value::Int(_) => VarType::Integer,
                        Value::Str(_) => VarType::String,
                        Value::Bool(_) => VarType::Boolean,
                        Value::Array(_) => VarType::Array,
                        _ => VarType::Float,
                    };
                }
                match self.scope.lookup(name) {
                    Some((_, t)) => t,
                    None => VarType::Float,
                }
            }
            Expr::Number { has_decimals, .. } => {
                if *has_decimals {
                    VarType::Float
                } else {
                    VarType::Integer
                }
            }
            Expr::Str(_) => VarType::String,
            Expr::Bool(_) => VarType::Boolean,
            Expr::Array(_) => VarType::Array,
            Expr::Markup(_) => VarType::Markup,
            Expr::RangeAddr(_) => VarType::Range,
            Expr::Binary { left, .. }
            | Expr::Logical { left, .. }
            | Expr::Assignment { left, .. } => self.type_from_node(left),
            Expr::Unary { operand, .. } => self.type_from_node(operand),
            Expr::Call { callee, .. } => {
                if let Expr::Identifier(name) = &**callee {
                    if let Some(func) = self.functions.get(name) {
                        if let Some(t) = func.return_type {
                            return t;
                        }
                    }
                }
                VarType::Float
            }
            _ => VarType::Float,
        }
    }

    fn compile_statement(&mut self, stmt: &Statement) -> LangResult<StmtFn> {
        match stmt {
            Statement::Empty => Ok(Arc::new(|_| Ok(Flow::Next))),

            Statement::Block(stmts) => {
                // Plain blocks share the enclosing scope; declarations made
                // inside remain visible after the block.
                let fns = self.compile_statements(stmts)?;
                Ok(Arc::new(move |rt| {
                    for f in &fns {
                        if let Flow::Return(v) = f(rt)? {
                            return Ok(Flow::Return(v));
                        }
                    }
                    Ok(Flow::Next)
                }))
            }

            Statement::Expression(expr) => {
                let f = self.compile_expr(expr)?;
                Ok(Arc::new(move |rt| Ok(Flow::Value(f(rt)?))))
            }

            Statement::Variable(decls) => {
                let mut compiled = Vec::with_capacity(decls.len());
                for decl in decls {
                    compiled.push(self.compile_variable_decl(decl)?);
                }
                Ok(Arc::new(move |rt| {
                    for f in &compiled {
                        f(rt)?;
                    }
                    Ok(Flow::Next)
                }))
            }

            Statement::Constant { name, value } => {
                let value = self.const_eval(value)?;
                self.constants.insert(name.clone(), value);
                Ok(Arc::new(|_| Ok(Flow::Next)))
            }

            Statement::Return(expr) => {
                if let (Some((fn_name, Some(declared))), Some(e)) =
                    (self.current_function.clone(), expr.as_ref())
                {
                    let got = self.type_from_node(e);
                    if !types_compatible(declared, got) {
                        return Err(InvalidReturnType {
                            function: fn_name,
                            got: got.to_string(),
                        }
                        .without_span());
                    }
                }
                let f = match expr {
                    Some(e) => Some(self.compile_expr(e)?),
                    None => None,
                };
                Ok(Arc::new(move |rt| {
                    let v = match &f {
                        Some(f) => f(rt)?,
                        None => Value::Null,
                    };
                    Ok(Flow::Return(v))
                }))
            }

            Statement::If {
                test,
                consequent,
                alternate,
            } => {
                let test = self.compile_expr(test)?;
                let consequent = self.compile_statement(consequent)?;
                let alternate = match alternate {
                    Some(s) => Some(self.compile_statement(s)?),
                    None => None,
                };
                Ok(Arc::new(move |rt| {
                    if test(rt)?.is_truthy() {
                        consequent(rt)
                    } else if let Some(alt) = &alternate {
                        alt(rt)
                    } else {
                        Ok(Flow::Next)
                    }
                }))
            }

            Statement::While { test, body } => {
                // An empty body compiles to nothing at all.
                if matches!(&**body, Statement::Block(stmts) if stmts.is_empty()) {
                    return Ok(Arc::new(|_| Ok(Flow::Next)));
                }
                self.check_loop_progress(test, body)?;
                let test = self.compile_expr(test)?;
                let body = self.compile_statement(body)?;
                Ok(Arc::new(move |rt| {
                    while test(rt)?.is_truthy() {
                        if let Flow::Return(v) = body(rt)? {
                            return Ok(Flow::Return(v));
                        }
                    }
                    Ok(Flow::Next)
                }))
            }

            Statement::DoWhile { body, test } => {
                let body = self.compile_statement(body)?;
                let test = self.compile_expr(test)?;
                Ok(Arc::new(move |rt| {
                    loop {
                        if let Flow::Return(v) = body(rt)? {
                            return Ok(Flow::Return(v));
                        }
                        if !test(rt)?.is_truthy() {
                            return Ok(Flow::Next);
                        }
                    }
                }))
            }

            Statement::ForEach { item, list, body } => {
                let desc = expr_desc(list);
                let list = self.compile_expr(list)?;
                let mark = self.scope.len();
                let slot = self.declare(item, VarType::Integer);
                let body = self.compile_statement(body)?;
                self.scope.truncate(mark);
                Ok(Arc::new(move |rt| {
                    let items = match list(rt)? {
                        Value::Array(items) => items,
                        _ => return Err(InvalidArrayAccess(desc.clone()).without_span()),
                    };
                    for item in items {
                        rt.locals[slot] = item;
                        if let Flow::Return(v) = body(rt)? {
                            return Ok(Flow::Return(v));
                        }
                    }
                    Ok(Flow::Next)
                }))
            }

            Statement::Map { item, list, body } => {
                // The standalone form rewrites its source variable, so the
                // source must be a declared local.
                let (list_slot, _) = match list {
                    Expr::Identifier(name) => self
                        .scope
                        .lookup(name)
                        .ok_or_else(|| UnknownVariable(name.clone()).without_span())?,
                    other => {
                        return Err(UnknownVariable(expr_desc(other)).without_span());
                    }
                };
                let desc = expr_desc(list);
                let mark = self.scope.len();
                let slot = self.declare(item, VarType::Integer);
                let body = self.compile_statements(body)?;
                self.scope.truncate(mark);
                Ok(Arc::new(move |rt| {
                    let items = match rt.locals[list_slot].clone() {
                        Value::Array(items) => items,
                        _ => return Err(InvalidArrayAccess(desc.clone()).without_span()),
                    };
                    let mut result = Vec::with_capacity(items.len());
                    for item in items {
                        rt.locals[slot] = item;
                        match run_body(&body, rt)? {
                            Flow::Value(v) | Flow::Return(v) => result.push(v),
                            Flow::Next => result.push(Value::Null),
                        }
                    }
                    rt.locals[list_slot] = Value::Array(result);
                    Ok(Flow::Value(rt.locals[list_slot].clone()))
                }))
            }

            Statement::Filter { item, list, test } => {
                let (list_slot, _) = match list {
                    Expr::Identifier(name) => self
                        .scope
                        .lookup(name)
                        .ok_or_else(|| UnknownVariable(name.clone()).without_span())?,
                    other => {
                        return Err(UnknownVariable(expr_desc(other)).without_span());
                    }
                };
                let desc = expr_desc(list);
                let mark = self.scope.len();
                let slot = self.declare(item, VarType::Integer);
                let test = self.compile_expr(test)?;
                self.scope.truncate(mark);
                Ok(Arc::new(move |rt| {
                    let items = match rt.locals[list_slot].clone() {
                        Value::Array(items) => items,
                        _ => return Err(InvalidArrayAccess(desc.clone()).without_span()),
                    };
                    let mut result = Vec::new();
                    for item in items {
                        rt.locals[slot] = item.clone();
                        if test(rt)?.is_truthy() {
                            result.push(item);
                        }
                    }
                    rt.locals[list_slot] = Value::Array(result);
                    Ok(Flow::Value(rt.locals[list_slot].clone()))
                }))
            }

            Statement::FunctionDecl {
                name,
                params,
                return_type,
                body,
            } => {
                self.compile_function(name, params, *return_type, body)?;
                Ok(Arc::new(|_| Ok(Flow::Next)))
            }

            Statement::CustomBlock { name, body } => {
                let meta = self
                    .options
                    .blocks
                    .get(name)
                    .ok_or_else(|| UnknownBlock(name.clone()).without_span())?
                    .clone();
                // The block body compiles against the current scope, but its
                // own declarations stay inside it.
                let mark = self.scope.len();
                let body_fns = self.compile_statements(body)?;
                self.scope.truncate(mark);
                let mut program_body = self.prelude.clone();
                program_body.extend(body_fns);
                self.blocks.insert(
                    name.clone(),
                    CompiledBlock {
                        program: CompiledProgram {
                            body: program_body,
                            slot_count: self.slot_high_water,
                            payload_fields: Vec::new(),
                            bindings: HashMap::new(),
                            blocks: HashMap::new(),
                        },
                        description: meta.description,
                    },
                );
                Ok(Arc::new(|_| Ok(Flow::Next)))
            }
        }
    }

    fn compile_statements(&mut self, stmts: &[Statement]) -> LangResult<Vec<StmtFn>> {
        stmts.iter().map(|s| self.compile_statement(s)).collect()
    }

    fn compile_variable_decl(&mut self, decl: &VariableDecl) -> LangResult<StmtFn> {
        if let (Some(elem_type), Some(Expr::Array(elems))) = (decl.sub_type, decl.init.as_ref()) {
            for elem in elems {
                if !types_compatible(elem_type, self.type_from_node(elem)) {
                    return Err(ElementTypeMismatch.without_span());
                }
            }
        }
        let init = match &decl.init {
            Some(e) => Some(self.compile_expr(e)?),
            None => None,
        };
        let var_type = decl.var_type;
        let slot = self.declare(&decl.name, var_type);
        Ok(Arc::new(move |rt| {
            let value = match &init {
                Some(f) => coerce_decl(f(rt)?, var_type),
                None => Value::Null,
            };
            rt.locals[slot] = value;
            Ok(Flow::Next)
        }))
    }

    fn compile_function(
        &mut self,
        name: &str,
        params: &[Param],
        return_type: Option<VarType>,
        body: &[Statement],
    ) -> LangResult<()> {
        // Functions get their own slot frame; save and restore the
        // surrounding compilation unit's state.
        let saved_scope = std::mem::take(&mut self.scope);
        let saved_high_water = std::mem::replace(&mut self.slot_high_water, 0);
        let saved_current = std::mem::replace(
            &mut self.current_function,
            Some((name.to_owned(), return_type)),
        );
        for param in params {
            self.declare(&param.name, param.var_type.unwrap_or(VarType::Float));
        }
        let result = self.compile_statements(body);
        let slot_count = self.slot_high_water;
        self.scope = saved_scope;
        self.slot_high_water = saved_high_water;
        self.current_function = saved_current;
        let body = result?;
        self.functions.insert(
            name.to_owned(),
            Arc::new(UserFunction {
                body,
                slot_count,
                param_types: params
                    .iter()
                    .map(|p| p.var_type.unwrap_or(VarType::Float))
                    .collect(),
                return_type,
            }),
        );
        Ok(())
    }

    /// Rejects while loops whose body can never terminate the loop: the
    /// test's variable must be reassigned by a statement directly in the
    /// loop body. Assignments nested deeper do not count, and the rule
    /// applies no matter what the test variable resolves to; a test with no
    /// variable at all can never make progress.
    fn check_loop_progress(&self, test: &Expr, body: &Statement) -> LangResult<()> {
        let test_var = match leftmost_identifier(test) {
            Some(name) => name,
            None => return Err(UnsafeLoop(expr_desc(test)).without_span()),
        };
        let stmts: &[Statement] = match body {
            Statement::Block(stmts) => stmts,
            other => std::slice::from_ref(other),
        };
        let assigns = stmts.iter().any(|s| {
            matches!(
                s,
                Statement::Expression(Expr::Assignment { op, left, .. })
                    if matches!(op, AssignOp::Assign | AssignOp::AddAssign)
                        && matches!(&**left, Expr::Identifier(n) if n.as_str() == test_var)
            )
        });
        if assigns {
            Ok(())
        } else {
            Err(UnsafeLoop(test_var.to_owned()).without_span())
        }
    }

    /// Evaluates a constant initializer at compile time. Only literals and
    /// unary minus on numbers are allowed.
    fn const_eval(&self, expr: &Expr) -> LangResult<Value> {
        match expr {
            Expr::Number {
                value,
                has_decimals,
            } => Ok(number_value(*value, *has_decimals)),
            Expr::Str(s) => Ok(Value::Str(s.clone())),
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::Null => Ok(Value::Null),
            Expr::Unary {
                op: UnaryOp::Neg,
                operand,
            } => match self.const_eval(operand)? {
                Value::Int(i) => Ok(Value::Int(-i)),
                Value::Float(f) => Ok(Value::Float(-f)),
                _ => Err(InternalError("non-numeric constant negation".into()).without_span()),
            },
            Expr::Identifier(name) => self
                .constants
                .get(name)
                .cloned()
                .ok_or_else(|| UnknownVariable(name.clone()).without_span()),
            _ => Err(InternalError("constant initializer must be a literal".into()).without_span()),
        }
    }

    fn compile_expr(&mut self, expr: &Expr) -> LangResult<ExprFn> {
        match expr {
            Expr::Identifier(name) => {
                // Constants take precedence over scope slots, so a later
                // `let` cannot shadow a constant.
                if let Some(value) = self.constants.get(name) {
                    let value = value.clone();
                    Ok(Arc::new(move |_| Ok(value.clone())))
                } else if let Some((slot, _)) = self.scope.lookup(name) {
                    Ok(Arc::new(move |rt| Ok(rt.locals[slot].clone())))
                } else {
                    // Unknown names fall back to payload fields; a missing
                    // field reads as null at runtime.
                    self.record_payload_field(name);
                    let key = name.clone();
                    Ok(Arc::new(move |rt| {
                        Ok(match rt.payload {
                            Value::Object(map) => {
                                map.get(&key).cloned().unwrap_or(Value::Null)
                            }
                            _ => Value::Null,
                        })
                    }))
                }
            }

            Expr::Number {
                value,
                has_decimals,
            } => {
                let value = number_value(*value, *has_decimals);
                Ok(Arc::new(move |_| Ok(value.clone())))
            }
            Expr::Str(s) => {
                let s = s.clone();
                Ok(Arc::new(move |_| Ok(Value::Str(s.clone()))))
            }
            Expr::Bool(b) => {
                let b = *b;
                Ok(Arc::new(move |_| Ok(Value::Bool(b))))
            }
            Expr::Null => Ok(Arc::new(|_| Ok(Value::Null))),
            Expr::Payload => Ok(Arc::new(|rt| Ok(rt.payload.clone()))),

            // Address literals evaluate to their own text; interpreting them
            // is up to the host.
            Expr::RangeAddr(s) | Expr::RowAddr(s) | Expr::ColumnAddr(s) => {
                let s = s.clone();
                Ok(Arc::new(move |_| Ok(Value::Str(s.clone()))))
            }

            Expr::Array(elems) => {
                let fns: Vec<ExprFn> = elems
                    .iter()
                    .map(|e| self.compile_expr(e))
                    .collect::<LangResult<_>>()?;
                Ok(Arc::new(move |rt| {
                    let mut items = Vec::with_capacity(fns.len());
                    for f in &fns {
                        items.push(f(rt)?);
                    }
                    Ok(Value::Array(items))
                }))
            }

            Expr::Markup(tree) => {
                let tree = tree.clone();
                let parser = self.options.markup.clone();
                Ok(Arc::new(move |_| {
                    Ok(match &parser {
                        Some(p) => p.render_markup(&tree),
                        None => Value::Markup(tree.clone()),
                    })
                }))
            }

            Expr::Member {
                object,
                property,
                computed,
            } => self.compile_member(object, property, *computed),

            Expr::Call { callee, args } => self.compile_call(callee, args),

            Expr::Assignment { op, left, right } => self.compile_assignment(*op, left, right),

            Expr::Binary { op, left, right } => {
                let left_type = self.type_from_node(left);
                if *op == BinaryOp::Mod && left_type == VarType::Float {
                    return Err(modulo_on_float().without_span());
                }
                let op = *op;
                let left = self.compile_expr(left)?;
                // A number literal opposite an integer-typed left operand
                // truncates to an integer.
                let right = match &**right {
                    Expr::Number { value, .. } if left_type == VarType::Integer => {
                        let value = Value::Int(*value as LangInt);
                        Arc::new(move |_: &mut Rt| Ok(value.clone())) as ExprFn
                    }
                    other => self.compile_expr(other)?,
                };
                Ok(Arc::new(move |rt| {
                    let a = left(rt)?;
                    let b = right(rt)?;
                    binary_op(op, a, b)
                }))
            }

            Expr::Logical { op, left, right } => {
                let op = *op;
                let left = self.compile_expr(left)?;
                let right = self.compile_expr(right)?;
                Ok(Arc::new(move |rt| {
                    match op {
                        LogicalOp::And => {
                            let a = left(rt)?;
                            if a.is_truthy() {
                                right(rt)
                            } else {
                                Ok(a)
                            }
                        }
                        LogicalOp::Or => {
                            let a = left(rt)?;
                            if a.is_truthy() {
                                Ok(a)
                            } else {
                                right(rt)
                            }
                        }
                        LogicalOp::Xor => {
                            let a = left(rt)?.is_truthy();
                            let b = right(rt)?.is_truthy();
                            Ok(Value::Bool(a ^ b))
                        }
                        LogicalOp::Shr => {
                            let a = left(rt)?.as_int().unwrap_or(0);
                            let b = right(rt)?.as_int().unwrap_or(0);
                            Ok(Value::Int(a >> (b & 63)))
                        }
                        LogicalOp::ShrUnsigned => {
                            let a = left(rt)?.as_int().unwrap_or(0);
                            let b = right(rt)?.as_int().unwrap_or(0);
                            Ok(Value::Int(((a as u64) >> (b & 63) as u32) as LangInt))
                        }
                    }
                }))
            }

            Expr::Unary { op, operand } => {
                let op = *op;
                let f = self.compile_expr(operand)?;
                Ok(Arc::new(move |rt| {
                    let v = f(rt)?;
                    Ok(match op {
                        UnaryOp::Not => Value::Bool(!v.is_truthy()),
                        UnaryOp::Neg => match v {
                            Value::Int(i) => Value::Int(-i),
                            other => Value::Float(-other.as_float().unwrap_or(0.0)),
                        },
                        UnaryOp::Pos => match v {
                            Value::Int(i) => Value::Int(i),
                            other => Value::Float(other.as_float().unwrap_or(0.0)),
                        },
                    })
                }))
            }

            Expr::MapExpr { item, list, body } => {
                let desc = expr_desc(list);
                let list = self.compile_expr(list)?;
                let mark = self.scope.len();
                let slot = self.declare(item, VarType::Integer);
                let body = self.compile_statements(body)?;
                self.scope.truncate(mark);
                Ok(Arc::new(move |rt| {
                    let items = match list(rt)? {
                        Value::Array(items) => items,
                        _ => return Err(InvalidArrayAccess(desc.clone()).without_span()),
                    };
                    let mut result = Vec::with_capacity(items.len());
                    for item in items {
                        rt.locals[slot] = item;
                        match run_body(&body, rt)? {
                            Flow::Value(v) | Flow::Return(v) => result.push(v),
                            Flow::Next => result.push(Value::Null),
                        }
                    }
                    Ok(Value::Array(result))
                }))
            }

            Expr::Filter { item, list, test } => {
                let desc = expr_desc(list);
                let list = self.compile_expr(list)?;
                let mark = self.scope.len();
                let slot = self.declare(item, VarType::Integer);
                let test = self.compile_expr(test)?;
                self.scope.truncate(mark);
                Ok(Arc::new(move |rt| {
                    let items = match list(rt)? {
                        Value::Array(items) => items,
                        _ => return Err(InvalidArrayAccess(desc.clone()).without_span()),
                    };
                    let mut result = Vec::new();
                    for item in items {
                        rt.locals[slot] = item.clone();
                        if test(rt)?.is_truthy() {
                            result.push(item);
                        }
                    }
                    Ok(Value::Array(result))
                }))
            }
        }
    }

    fn compile_member(
        &mut self,
        object: &Expr,
        property: &Expr,
        computed: bool,
    ) -> LangResult<ExprFn> {
        if !computed {
            let prop = match property {
                Expr::Identifier(name) => name.clone(),
                _ => {
                    return Err(
                        InternalError("non-identifier property in member access".into())
                            .without_span(),
                    )
                }
            };
            // `.length` accesses record the object's path instead, when the
            // object compiles below.
            let path = if prop == "length" {
                None
            } else {
                self.payload_member_path(object, &prop)
            };
            if let Some(path) = &path {
                self.record_payload_field(path);
            }
            let saved = self.suppress_payload_record;
            self.suppress_payload_record = saved || path.is_some();
            let obj = self.compile_expr(object);
            self.suppress_payload_record = saved;
            let obj = obj?;
            if prop == "length" {
                return Ok(Arc::new(move |rt| {
                    Ok(match obj(rt)? {
                        Value::Array(items) => Value::Int(items.len() as LangInt),
                        Value::Str(s) => Value::Int(s.chars().count() as LangInt),
                        _ => Value::Null,
                    })
                }));
            }
            Ok(Arc::new(move |rt| {
                Ok(match obj(rt)? {
                    Value::Object(map) => map.get(&prop).cloned().unwrap_or(Value::Null),
                    _ => Value::Null,
                })
            }))
        } else {
            if let (Expr::Payload, Expr::Str(key)) = (object, property) {
                self.record_payload_field(key);
            }
            let desc = expr_desc(object);
            let obj = self.compile_expr(object)?;
            let index = self.compile_expr(property)?;
            Ok(Arc::new(move |rt| {
                let obj = obj(rt)?;
                let index = index(rt)?;
                match obj {
                    Value::Array(items) => {
                        Ok(array_index(&items, &index)
                            .map(|i| items[i].clone())
                            .unwrap_or(Value::Null))
                    }
                    Value::Str(s) => {
                        let chars: Vec<char> = s.chars().collect();
                        Ok(array_index_len(chars.len(), &index)
                            .map(|i| Value::Str(chars[i].to_string()))
                            .unwrap_or(Value::Null))
                    }
                    Value::Object(map) => {
                        let key = match index {
                            Value::Str(s) => s,
                            other => other.to_string(),
                        };
                        Ok(map.get(&key).cloned().unwrap_or(Value::Null))
                    }
                    _ => Err(InvalidArrayAccess(desc.clone()).without_span()),
                }
            }))
        }
    }

    fn compile_call(&mut self, callee: &Expr, args: &[Expr]) -> LangResult<ExprFn> {
        let name = match callee {
            Expr::Identifier(name) => name.clone(),
            other => return Err(UnknownFunction(expr_desc(other)).without_span()),
        };
        let arg_fns: Vec<ExprFn> = args
            .iter()
            .map(|a| self.compile_expr(a))
            .collect::<LangResult<_>>()?;

        // Host-registered functions take precedence, then user-declared
        // functions, then the built-in table.
        if let Some(custom) = self.options.functions.get(&name) {
            if custom.arity != arg_fns.len() {
                return Err(ArityMismatch {
                    name,
                    expected: custom.arity,
                    got: arg_fns.len(),
                }
                .without_span());
            }
            let func = Arc::clone(&custom.func);
            let prepend_payload = custom.receive_payload_first;
            self.bindings.insert(name, Arc::clone(&func));
            return Ok(Arc::new(move |rt| {
                let mut values = Vec::with_capacity(arg_fns.len() + 1);
                if prepend_payload {
                    values.push(rt.payload.clone());
                }
                for f in &arg_fns {
                    values.push(f(rt)?);
                }
                Ok(func(&values))
            }));
        }

        if let Some(func) = self.functions.get(&name) {
            if func.arity() != arg_fns.len() {
                return Err(ArityMismatch {
                    name,
                    expected: func.arity(),
                    got: arg_fns.len(),
                }
                .without_span());
            }
            let func = Arc::clone(func);
            return Ok(Arc::new(move |rt| {
                let mut values = Vec::with_capacity(arg_fns.len());
                for f in &arg_fns {
                    values.push(f(rt)?);
                }
                let mut frame = Rt::new(rt.payload, func.slot_count);
                for (slot, value) in values.into_iter().enumerate() {
                    // Arguments take on the declared parameter type.
                    frame.locals[slot] = coerce_decl(value, func.param_types[slot]);
                }
                match run_body(&func.body, &mut frame)? {
                    Flow::Value(v) | Flow::Return(v) => Ok(v),
                    Flow::Next => Ok(Value::Null),
                }
            }));
        }

        if let Some(&(arity, func)) = BUILTIN_FUNCTIONS.get(name.as_str()) {
            if arity != arg_fns.len() {
                return Err(ArityMismatch {
                    name,
                    expected: arity,
                    got: arg_fns.len(),
                }
                .without_span());
            }
            return Ok(Arc::new(move |rt| {
                let mut values = Vec::with_capacity(arg_fns.len());
                for f in &arg_fns {
                    values.push(f(rt)?);
                }
                func(&values)
            }));
        }

        Err(UnknownFunction(name).without_span())
    }

    fn compile_assignment(
        &mut self,
        op: AssignOp,
        left: &Expr,
        right: &Expr,
    ) -> LangResult<ExprFn> {
        match op {
            AssignOp::Assign => (),
            AssignOp::AddAssign => {
                // Only increment-by-literal is supported.
                if !matches!(right, Expr::Number { .. }) {
                    return Err(UnsupportedOperator {
                        op: op.to_string(),
                        reason: "with a non-literal right-hand side".into(),
                    }
                    .without_span());
                }
            }
            AssignOp::SubAssign | AssignOp::MulAssign | AssignOp::DivAssign => {
                return Err(UnsupportedOperator {
                    op: op.to_string(),
                    reason: "in assignment expressions".into(),
                }
                .without_span());
            }
        }

        match left {
            Expr::Identifier(name) => {
                if self.constants.contains_key(name) {
                    return Err(InvalidAssignmentTarget.without_span());
                }
                let (slot, var_type) = self
                    .scope
                    .lookup(name)
                    .ok_or_else(|| UnknownVariable(name.clone()).without_span())?;
                let right = self.compile_expr(right)?;
                let add = op == AssignOp::AddAssign;
                Ok(Arc::new(move |rt| {
                    let value = if add {
                        binary_op(BinaryOp::Add, rt.locals[slot].clone(), right(rt)?)?
                    } else {
                        right(rt)?
                    };
                    let value = coerce_decl(value, var_type);
                    rt.locals[slot] = value.clone();
                    Ok(value)
                }))
            }
            Expr::Member { .. } => {
                let (slot, segs) = self.member_path(left)?;
                let right = self.compile_expr(right)?;
                Ok(Arc::new(move |rt| {
                    let value = right(rt)?;
                    // Resolve computed keys before taking a mutable path
                    // into the slot.
                    let mut keys = Vec::with_capacity(segs.len());
                    for seg in &segs {
                        keys.push(match seg {
                            PathSeg::Field(name) => Value::Str(name.clone()),
                            PathSeg::Index(f) => f(rt)?,
                        });
                    }
                    let mut target = &mut rt.locals[slot];
                    for key in &keys {
                        target = match target {
                            Value::Object(map) => {
                                let key = match key {
                                    Value::Str(s) => s.clone(),
                                    other => other.to_string(),
                                };
                                map.entry(key).or_insert(Value::Null)
                            }
                            Value::Array(items) => {
                                let idx = array_index_len(items.len(), key).ok_or_else(
                                    || InvalidArrayAccess(key.to_string()).without_span(),
                                )?;
                                &mut items[idx]
                            }
                            _ => {
                                return Err(
                                    InvalidArrayAccess(key.to_string()).without_span()
                                )
                            }
                        };
                    }
                    *target = value.clone();
                    Ok(value)
                }))
            }
            _ => Err(InvalidAssignmentTarget.without_span()),
        }
    }

    /// Resolves a member-assignment target to a local slot and the path of
    /// accesses below it. Only local variables may be assigned through;
    /// writing into the payload is rejected.
    fn member_path(&mut self, expr: &Expr) -> LangResult<(usize, Vec<PathSeg>)> {
        let mut segs = Vec::new();
        let mut cursor = expr;
        loop {
            match cursor {
                Expr::Member {
                    object,
                    property,
                    computed,
                } => {
                    if *computed {
                        segs.push(PathSeg::Index(self.compile_expr(property)?));
                    } else if let Expr::Identifier(name) = &**property {
                        segs.push(PathSeg::Field(name.clone()));
                    } else {
                        return Err(InvalidAssignmentTarget.without_span());
                    }
                    cursor = object;
                }
                Expr::Identifier(name) => {
                    let (slot, _) = self
                        .scope
                        .lookup(name)
                        .ok_or_else(|| InvalidAssignmentTarget.without_span())?;
                    segs.reverse();
                    return Ok((slot, segs));
                }
                _ => return Err(InvalidAssignmentTarget.without_span()),
            }
        }
    }
}

/// Builds a number literal's value: a decimal point makes it a float.
fn number_value(value: f64, has_decimals: bool) -> Value {
    if has_decimals {
        Value::Float(value)
    } else {
        Value::Int(value as LangInt)
    }
}

/// Coerces a value to a declared variable type. Integer declarations
/// truncate; float declarations widen; everything else passes through.
fn coerce_decl(value: Value, var_type: VarType) -> Value {
    match var_type {
        VarType::Integer => match value {
            Value::Float(f) => Value::Int(f.trunc() as LangInt),
            other => other,
        },
        VarType::Float => match value {
            Value::Int(i) => Value::Float(i as LangFloat),
            other => other,
        },
        _ => value,
    }
}

/// Whether a value of type `got` may appear where `declared` is expected.
/// The two numeric types are interchangeable.
fn types_compatible(declared: VarType, got: VarType) -> bool {
    declared == got
        || (matches!(declared, VarType::Integer | VarType::Float)
            && matches!(got, VarType::Integer | VarType::Float))
}

/// Resolves an index value against an array, counting negative indices from
/// the end. Out of range yields None.
fn array_index(items: &[Value], index: &Value) -> Option<usize> {
    array_index_len(items.len(), index)
}
fn array_index_len(len: usize, index: &Value) -> Option<usize> {
    let idx = index.as_int()?;
    let len = len as LangInt;
    let i = if idx < 0 { idx + len } else { idx };
    if (0..len).contains(&i) {
        Some(i as usize)
    } else {
        None
    }
}

/// The leftmost identifier in an expression, following the left operand of
/// binary and logical operators. This names the loop variable of a while
/// test.
fn leftmost_identifier(expr: &Expr) -> Option<&str> {
    match expr {
        Expr::Identifier(name) => Some(name),
        Expr::Binary { left, .. } | Expr::Logical { left, .. } => leftmost_identifier(left),
        Expr::Unary { operand, .. } => leftmost_identifier(operand),
        _ => None,
    }
}

/// A short description of an expression for error messages.
fn expr_desc(expr: &Expr) -> String {
    match expr {
        Expr::Identifier(name) => name.clone(),
        Expr::Payload => "payload".to_owned(),
        Expr::Member { object, property, computed } => {
            if let (false, Expr::Identifier(prop)) = (computed, &**property) {
                format!("{}.{}", expr_desc(object), prop)
            } else {
                format!("{}[..]", expr_desc(object))
            }
        }
        Expr::Call { callee, .. } => format!("{}(..)", expr_desc(callee)),
        _ => "(expression)".to_owned(),
    }
}

fn non_numeric(op: &str) -> LangError {
    UnsupportedOperator {
        op: op.to_owned(),
        reason: "for non-numeric operands".into(),
    }
    .without_span()
}

/// Applies a binary operator to two values.
fn binary_op(op: BinaryOp, a: Value, b: Value) -> LangResult<Value> {
    match op {
        BinaryOp::Add => {
            // `+` concatenates as soon as either side is a string.
            if matches!(a, Value::Str(_)) || matches!(b, Value::Str(_)) {
                return Ok(Value::Str(format!("{}{}", a, b)));
            }
            match (&a, &b) {
                (Value::Int(x), Value::Int(y)) => Ok(Value::Int(x + y)),
                _ => match (a.as_float(), b.as_float()) {
                    (Some(x), Some(y)) => Ok(Value::Float(x + y)),
                    _ => Err(non_numeric("+")),
                },
            }
        }
        BinaryOp::Sub => match (&a, &b) {
            (Value::Int(x), Value::Int(y)) => Ok(Value::Int(x - y)),
            _ => match (a.as_float(), b.as_float()) {
                (Some(x), Some(y)) => Ok(Value::Float(x - y)),
                _ => Err(non_numeric("-")),
            },
        },
        BinaryOp::Mul => match (&a, &b) {
            (Value::Int(x), Value::Int(y)) => Ok(Value::Int(x * y)),
            _ => match (a.as_float(), b.as_float()) {
                (Some(x), Some(y)) => Ok(Value::Float(x * y)),
                _ => Err(non_numeric("*")),
            },
        },
        BinaryOp::Div => {
            let y = b.as_float().ok_or_else(|| non_numeric("/"))?;
            let x = a.as_float().ok_or_else(|| non_numeric("/"))?;
            if y == 0.0 {
                return Err(DivisionByZero.without_span());
            }
            // Integer division stays integral when it divides evenly.
            if let (Value::Int(xi), Value::Int(yi)) = (&a, &b) {
                if xi % yi == 0 {
                    return Ok(Value::Int(xi / yi));
                }
            }
            Ok(Value::Float(x / y))
        }
        BinaryOp::Mod => {
            let x = a.as_int().ok_or_else(|| non_numeric("%"))?;
            let y = b.as_int().ok_or_else(|| non_numeric("%"))?;
            if y == 0 {
                return Err(DivisionByZero.without_span());
            }
            Ok(Value::Int(x % y))
        }
        BinaryOp::Eq => Ok(Value::Bool(a.loose_eq(&b))),
        BinaryOp::Neq => Ok(Value::Bool(!a.loose_eq(&b))),
        BinaryOp::Lt => Ok(Value::Bool(
            a.loose_cmp(&b) == Some(std::cmp::Ordering::Less),
        )),
        BinaryOp::Lte => Ok(Value::Bool(matches!(
            a.loose_cmp(&b),
            Some(std::cmp::Ordering::Less) | Some(std::cmp::Ordering::Equal)
        ))),
        BinaryOp::Gt => Ok(Value::Bool(
            a.loose_cmp(&b) == Some(std::cmp::Ordering::Greater),
        )),
        BinaryOp::Gte => Ok(Value::Bool(matches!(
            a.loose_cmp(&b),
            Some(std::cmp::Ordering::Greater) | Some(std::cmp::Ordering::Equal)
        ))),
    }
}

type BuiltinFn = fn(&[Value]) -> LangResult<Value>;

fn arg_float(args: &[Value], i: usize, name: &str) -> LangResult<LangFloat> {
    args[i].as_float().ok_or_else(|| {
        UnsupportedOperator {
            op: name.to_owned(),
            reason: "for non-numeric arguments".into(),
        }
        .without_span()
    })
}

fn b_abs(args: &[Value]) -> LangResult<Value> {
    match &args[0] {
        Value::Int(i) => Ok(Value::Int(i.abs())),
        _ => Ok(Value::Float(arg_float(args, 0, "abs")?.abs())),
    }
}
fn b_ceil(args: &[Value]) -> LangResult<Value> {
    Ok(Value::Int(arg_float(args, 0, "ceil")?.ceil() as LangInt))
}
fn b_floor(args: &[Value]) -> LangResult<Value> {
    Ok(Value::Int(arg_float(args, 0, "floor")?.floor() as LangInt))
}
fn b_round(args: &[Value]) -> LangResult<Value> {
    Ok(Value::Int(arg_float(args, 0, "round")?.round() as LangInt))
}
fn b_sqrt(args: &[Value]) -> LangResult<Value> {
    Ok(Value::Float(arg_float(args, 0, "sqrt")?.sqrt()))
}
fn b_min(args: &[Value]) -> LangResult<Value> {
    let a = arg_float(args, 0, "min")?;
    let b = arg_float(args, 1, "min")?;
    Ok(if a <= b { args[0].clone() } else { args[1].clone() })
}
fn b_max(args: &[Value]) -> LangResult<Value> {
    let a = arg_float(args, 0, "max")?;
    let b = arg_float(args, 1, "max")?;
    Ok(if a >= b { args[0].clone() } else { args[1].clone() })
}
fn b_pow(args: &[Value]) -> LangResult<Value> {
    let a = arg_float(args, 0, "pow")?;
    let b = arg_float(args, 1, "pow")?;
    Ok(Value::Float(a.powf(b)))
}

lazy_static! {
    /// Built-in math functions with their arities, consulted after custom
    /// and user-declared functions.
    static ref BUILTIN_FUNCTIONS: HashMap<&'static str, (usize, BuiltinFn)> = {
        let mut map: HashMap<&'static str, (usize, BuiltinFn)> = HashMap::new();
        map.insert("abs", (1, b_abs));
        map.insert("ceil", (1, b_ceil));
        map.insert("floor", (1, b_floor));
        map.insert("round", (1, b_round));
        map.insert("sqrt", (1, b_sqrt));
        map.insert("min", (2, b_min));
        map.insert("max", (2, b_max));
        map.insert("pow", (2, b_pow));
        map
    };
}

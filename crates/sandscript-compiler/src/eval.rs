//! Reference tree-walking evaluator.
//!
//! Executes a decorated [`ClassNode`] directly against the catalog's native
//! member implementations. Dynamic call sites go through the inline-cache
//! runtime of [`crate::bootstrap`], reading the catalog and symbol handles from
//! the static fields installed by static-support injection, the same way
//! emitted code would.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use rustc_hash::FxHashMap;
use sandscript_catalog::Catalog;
use sandscript_core::{
    FunctionValue, NativeFn, PrimitiveKind, ScriptException, ScriptFault, ScriptPosition,
    ScriptType, Value,
};
use thiserror::Error;

use crate::bootstrap::BOOTSTRAP_METHOD;
use crate::ir::{
    BlockNode, ClassNode, ExpressionKind, ExpressionNode, FunctionNode, Modifiers, StatementNode,
    StaticValue,
};
use crate::ops::{self, BinaryOp};
use crate::passes::{DEFINITION_FIELD, FUNCTIONS_FIELD, NAME_FIELD, SOURCE_FIELD, STATEMENTS_FIELD};
use crate::settings::CompilerSettings;
use crate::symbols::SymbolTable;

/// Nested script calls allowed before execution is aborted.
pub const MAX_CALL_DEPTH: usize = 256;

/// A failure escaping a script function.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExecutionError {
    /// Normalized by the sandbox.
    #[error(transparent)]
    Exception(#[from] ScriptException),

    /// Raw fault from an unsandboxed function.
    #[error(transparent)]
    Fault(#[from] ScriptFault),
}

impl ExecutionError {
    /// The underlying fault, whether or not it was normalized.
    pub fn fault(&self) -> &ScriptFault {
        match self {
            ExecutionError::Exception(exception) => &exception.cause,
            ExecutionError::Fault(fault) => fault,
        }
    }
}

// ============================================================================
// Execution state
// ============================================================================

enum Flow {
    Normal,
    Return(Value),
}

enum Escape {
    /// A fault raised at the statement starting at `offset`.
    Fault { fault: ScriptFault, offset: u32 },
    /// An already normalized exception; no catch clause intercepts it.
    Exception(Box<ScriptException>),
}

impl From<Escape> for ExecutionError {
    fn from(escape: Escape) -> Self {
        match escape {
            Escape::Fault { fault, .. } => ExecutionError::Fault(fault),
            Escape::Exception(exception) => ExecutionError::Exception(*exception),
        }
    }
}

#[derive(Default)]
struct Frame {
    locals: FxHashMap<String, Value>,
    caught: FxHashMap<String, (ScriptFault, u32)>,
    offset: u32,
    /// Counted loop iterations across every loop of this invocation.
    iterations: u64,
}

impl Frame {
    fn fault(&self, fault: ScriptFault) -> Escape {
        Escape::Fault {
            fault,
            offset: self.offset,
        }
    }
}

/// Releases one level of call depth when a script function returns.
struct DepthGuard<'a>(&'a AtomicUsize);

impl Drop for DepthGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }
}

fn default_value(ty: ScriptType) -> Value {
    match ty.as_primitive() {
        Some(PrimitiveKind::Bool) => Value::Bool(false),
        Some(PrimitiveKind::Byte) => Value::Byte(0),
        Some(PrimitiveKind::Short) => Value::Short(0),
        Some(PrimitiveKind::Char) => Value::Char(0),
        Some(PrimitiveKind::Int) => Value::Int(0),
        Some(PrimitiveKind::Long) => Value::Long(0),
        Some(PrimitiveKind::Float) => Value::Float(0.0),
        Some(PrimitiveKind::Double) => Value::Double(0.0),
        None => Value::Null,
    }
}

// ============================================================================
// Interpreter
// ============================================================================

/// Runs the functions of one compiled script class.
#[derive(Debug, Clone)]
pub struct Interpreter {
    class: Arc<ClassNode>,
    catalog: Arc<Catalog>,
    settings: Arc<CompilerSettings>,
    context: Value,
    /// Script frames active in the current run, function references included.
    depth: Arc<AtomicUsize>,
}

impl Interpreter {
    pub fn new(
        class: Arc<ClassNode>,
        catalog: Arc<Catalog>,
        settings: Arc<CompilerSettings>,
    ) -> Self {
        Self {
            class,
            catalog,
            settings,
            context: Value::Null,
            depth: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// The host context object `LoadContext` evaluates to.
    pub fn with_context(mut self, context: Value) -> Self {
        self.context = context;
        self
    }

    pub fn class(&self) -> &ClassNode {
        &self.class
    }

    /// Run the entry function.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn execute(&self, args: Vec<Value>) -> Result<Value, ExecutionError> {
        self.call(&self.settings.entry_function, args)
    }

    /// Run any script function by name.
    pub fn call(&self, name: &str, args: Vec<Value>) -> Result<Value, ExecutionError> {
        let run = Self {
            depth: Arc::new(AtomicUsize::new(0)),
            ..self.clone()
        };
        run.call_function(name, args).map_err(ExecutionError::from)
    }

    fn call_function(&self, name: &str, args: Vec<Value>) -> Result<Value, Escape> {
        let unrecoverable = |message: String| Escape::Fault {
            fault: ScriptFault::unrecoverable(message),
            offset: 0,
        };
        let depth = self.depth.fetch_add(1, Ordering::Relaxed);
        let _guard = DepthGuard(&self.depth);
        if depth >= MAX_CALL_DEPTH {
            return Err(Escape::Fault {
                fault: ScriptFault::resource_exhausted(format!(
                    "call depth exceeded {MAX_CALL_DEPTH} in [{name}]"
                )),
                offset: 0,
            });
        }
        let function = self
            .class
            .function_with_arity(name, args.len())
            .ok_or_else(|| {
                unrecoverable(format!(
                    "no function [{name}/{}] in [{}]",
                    args.len(),
                    self.class.name
                ))
            })?;
        if function.modifiers.contains(Modifiers::NATIVE) {
            return Err(unrecoverable(format!("[{name}] is implemented by the runtime")));
        }
        self.run_function(function, args)
    }

    fn run_function(&self, function: &FunctionNode, args: Vec<Value>) -> Result<Value, Escape> {
        let mut frame = Frame {
            offset: function.span.offset,
            ..Frame::default()
        };
        for (param, value) in function.params.iter().zip(args) {
            frame.locals.insert(param.name.clone(), value);
        }
        match self.exec_block(&function.body, &mut frame)? {
            Flow::Return(value) => Ok(value),
            Flow::Normal => Ok(Value::Null),
        }
    }

    // ==========================================================================
    // Statements
    // ==========================================================================

    fn exec_block(&self, block: &BlockNode, frame: &mut Frame) -> Result<Flow, Escape> {
        for statement in &block.statements {
            if let Flow::Return(value) = self.exec_statement(statement, frame)? {
                return Ok(Flow::Return(value));
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_statement(&self, statement: &StatementNode, frame: &mut Frame) -> Result<Flow, Escape> {
        frame.offset = statement.span().offset;
        match statement {
            StatementNode::Declaration { name, ty, init, .. } => {
                let value = match init {
                    Some(init) => self.eval(init, frame)?,
                    None => default_value(*ty),
                };
                frame.locals.insert(name.clone(), value);
                Ok(Flow::Normal)
            }
            StatementNode::Expression(expr) => {
                self.eval(expr, frame)?;
                Ok(Flow::Normal)
            }
            StatementNode::Return { value, .. } => {
                let value = match value {
                    Some(value) => self.eval(value, frame)?,
                    None => Value::Null,
                };
                Ok(Flow::Return(value))
            }
            StatementNode::Throw { value, .. } => Err(self.throw(value, frame)),
            StatementNode::If {
                condition,
                then_block,
                else_block,
                ..
            } => {
                let taken = self.eval(condition, frame)?.as_bool().map_err(|f| frame.fault(f))?;
                if taken {
                    self.exec_block(then_block, frame)
                } else if let Some(else_block) = else_block {
                    self.exec_block(else_block, frame)
                } else {
                    Ok(Flow::Normal)
                }
            }
            StatementNode::While {
                condition,
                body,
                counted,
                span,
            } => {
                let limit = self.settings.max_loop_counter;
                loop {
                    frame.offset = span.offset;
                    if !self.eval(condition, frame)?.as_bool().map_err(|f| frame.fault(f))? {
                        return Ok(Flow::Normal);
                    }
                    if *counted && limit > 0 {
                        frame.iterations += 1;
                        if frame.iterations > limit {
                            return Err(frame.fault(ScriptFault::resource_exhausted(format!(
                                "loop iteration limit of {limit} reached in one call"
                            ))));
                        }
                    }
                    if let Flow::Return(value) = self.exec_block(body, frame)? {
                        return Ok(Flow::Return(value));
                    }
                }
            }
            StatementNode::Try { block, catches, .. } => match self.exec_block(block, frame) {
                Err(Escape::Fault { fault, offset }) => {
                    let Some(clause) = catches.iter().find(|c| c.category.catches(&fault)) else {
                        return Err(Escape::Fault { fault, offset });
                    };
                    frame.caught.insert(clause.binding.clone(), (fault, offset));
                    self.exec_block(&clause.block, frame)
                }
                other => other,
            },
        }
    }

    fn throw(&self, value: &ExpressionNode, frame: &mut Frame) -> Escape {
        match &value.kind {
            ExpressionKind::ConvertFault { binding } => match frame.caught.get(binding) {
                Some((fault, offset)) => {
                    Escape::Exception(Box::new(self.convert(fault.clone(), *offset)))
                }
                None => frame.fault(ScriptFault::unrecoverable(format!(
                    "no fault bound to [{binding}]"
                ))),
            },
            ExpressionKind::Local(name) if frame.caught.contains_key(name) => {
                let (fault, offset) = frame.caught[name].clone();
                Escape::Fault { fault, offset }
            }
            _ => match self.eval(value, frame) {
                Ok(thrown) => frame.fault(ScriptFault::illegal_argument(format!(
                    "cannot throw a value of type [{}]",
                    thrown.type_label()
                ))),
                Err(escape) => escape,
            },
        }
    }

    /// Normalize `fault` into the host-visible exception.
    fn convert(&self, fault: ScriptFault, offset: u32) -> ScriptException {
        let name = self.static_str(NAME_FIELD).unwrap_or(self.class.name.as_str());
        let source = self.static_str(SOURCE_FIELD).unwrap_or("");
        let boundaries = self
            .class
            .field(STATEMENTS_FIELD)
            .and_then(|f| f.value.as_ref())
            .and_then(StaticValue::as_offsets)
            .unwrap_or(&[]);

        let position = (!boundaries.is_empty()).then(|| {
            let start = boundaries.iter().rev().find(|&&b| b <= offset).copied().unwrap_or(offset);
            let end = boundaries
                .iter()
                .find(|&&b| b > offset)
                .copied()
                .unwrap_or(source.len() as u32);
            ScriptPosition { offset, start, end }
        });
        let snippet = position
            .as_ref()
            .and_then(|p| source.get(p.start as usize..p.end as usize))
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        ScriptException {
            script_name: name.to_string(),
            message: fault.to_string(),
            position,
            snippet,
            headers: fault.headers().to_vec(),
            cause: fault,
        }
    }

    fn static_value(&self, name: &str) -> Option<&StaticValue> {
        self.class.field(name).and_then(|f| f.value.as_ref())
    }

    fn static_str(&self, name: &str) -> Option<&str> {
        self.static_value(name).and_then(StaticValue::as_str)
    }

    // ==========================================================================
    // Expressions
    // ==========================================================================

    fn eval_all(&self, exprs: &[ExpressionNode], frame: &mut Frame) -> Result<Vec<Value>, Escape> {
        exprs.iter().map(|e| self.eval(e, frame)).collect()
    }

    fn eval(&self, expr: &ExpressionNode, frame: &mut Frame) -> Result<Value, Escape> {
        let value = self.eval_raw(expr, frame)?;
        match &expr.cast {
            Some(cast) => cast.apply(&self.catalog, value).map_err(|f| frame.fault(f)),
            None => Ok(value),
        }
    }

    fn eval_raw(&self, expr: &ExpressionNode, frame: &mut Frame) -> Result<Value, Escape> {
        match &expr.kind {
            ExpressionKind::Constant(constant) => Ok(constant.to_value()),
            ExpressionKind::Local(name) => frame
                .locals
                .get(name)
                .cloned()
                .ok_or_else(|| {
                    frame.fault(ScriptFault::unrecoverable(format!("undefined local [{name}]")))
                }),
            ExpressionKind::Assign { name, value } => {
                let value = self.eval(value, frame)?;
                frame.locals.insert(name.clone(), value.clone());
                Ok(value)
            }
            ExpressionKind::LoadContext => Ok(self.context.clone()),
            ExpressionKind::LoadStatic(name) => self
                .static_value(name)
                .map(StaticValue::to_value)
                .ok_or_else(|| {
                    frame.fault(ScriptFault::unrecoverable(format!("no static field [{name}]")))
                }),
            ExpressionKind::Group(inner) => self.eval(inner, frame),
            ExpressionKind::HostField { field, receiver } => {
                let receiver = match receiver {
                    Some(receiver) => Some(self.eval(receiver, frame)?),
                    None => None,
                };
                field.read(receiver.as_ref()).map_err(|f| frame.fault(f))
            }
            ExpressionKind::Binary { op, lhs, rhs } => {
                if op.is_logical() {
                    let left = self.eval(lhs, frame)?.as_bool().map_err(|f| frame.fault(f))?;
                    let short_circuit = match op {
                        BinaryOp::And => !left,
                        _ => left,
                    };
                    if short_circuit {
                        return Ok(Value::Bool(left));
                    }
                    let right = self.eval(rhs, frame)?.as_bool().map_err(|f| frame.fault(f))?;
                    return Ok(Value::Bool(right));
                }
                let left = self.eval(lhs, frame)?;
                let right = self.eval(rhs, frame)?;
                ops::binary(*op, &left, &right).map_err(|f| frame.fault(f))
            }
            ExpressionKind::Unary { op, operand } => {
                let value = self.eval(operand, frame)?;
                ops::unary(*op, &value).map_err(|f| frame.fault(f))
            }
            ExpressionKind::Compare { op, lhs, rhs } => {
                let left = self.eval(lhs, frame)?;
                let right = self.eval(rhs, frame)?;
                ops::compare(*op, &left, &right).map_err(|f| frame.fault(f))
            }
            ExpressionKind::Invoke {
                method,
                receiver,
                args,
            } => {
                let mut values = Vec::with_capacity(args.len() + 1);
                if let Some(receiver) = receiver {
                    let receiver = self.eval(receiver, frame)?;
                    if receiver.is_null() {
                        return Err(frame.fault(ScriptFault::null_pointer(format!(
                            "cannot invoke [{}] on a null reference",
                            method.name
                        ))));
                    }
                    values.push(receiver);
                }
                values.extend(self.eval_all(args, frame)?);
                method.invoke(&values).map_err(|f| frame.fault(f))
            }
            ExpressionKind::InvokeLocal { name, args } => {
                let values = self.eval_all(args, frame)?;
                self.call_function(name, values)
            }
            ExpressionKind::New { constructor, args } => {
                let values = self.eval_all(args, frame)?;
                constructor.invoke(&values).map_err(|f| frame.fault(f))
            }
            ExpressionKind::Dynamic { site, args } => {
                let values = self.eval_all(args, frame)?;
                let (catalog, symbols) = self.dispatch_handles().map_err(|f| frame.fault(f))?;
                site.invoke(catalog, symbols, &values).map_err(|f| frame.fault(f))
            }
            ExpressionKind::FunctionRef { binding, captures } => {
                let captured = self.eval_all(captures, frame)?;
                let binding = binding.clone();
                let interpreter = self.clone();
                let interface = binding.interface;
                let target = NativeFn::new(move |args: &[Value]| {
                    binding.invoke(&interpreter.catalog, &captured, args, |name, values| {
                        interpreter.call_function(name, values).map_err(|escape| match escape {
                            Escape::Fault { fault, .. } => fault,
                            Escape::Exception(exception) => exception.cause,
                        })
                    })
                });
                Ok(Value::Function(FunctionValue { interface, target }))
            }
            ExpressionKind::ConvertFault { binding } => {
                Err(frame.fault(ScriptFault::unrecoverable(format!(
                    "fault [{binding}] converted outside a throw"
                ))))
            }
        }
    }

    /// Catalog and symbol table as installed on the script class.
    fn dispatch_handles(&self) -> Result<(&Catalog, &SymbolTable), ScriptFault> {
        if self.class.function(BOOTSTRAP_METHOD).is_none() {
            return Err(ScriptFault::unrecoverable(format!(
                "script [{}] has dynamic call sites but no [{BOOTSTRAP_METHOD}]",
                self.class.name
            )));
        }
        let catalog = match self.static_value(DEFINITION_FIELD) {
            Some(StaticValue::Catalog(catalog)) => catalog.as_ref(),
            _ => return Err(ScriptFault::unrecoverable(format!("missing [{DEFINITION_FIELD}]"))),
        };
        let symbols = match self.static_value(FUNCTIONS_FIELD) {
            Some(StaticValue::Symbols(symbols)) => symbols.as_ref(),
            _ => return Err(ScriptFault::unrecoverable(format!("missing [{FUNCTIONS_FIELD}]"))),
        };
        Ok((catalog, symbols))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{collect_used_variables, statement_offsets};
    use crate::context::CompilationContext;
    use crate::ir::{Constant, Parameter};
    use crate::ops::CompareOp;
    use crate::passes::{DecorationPipeline, fixtures};
    use crate::symbols::LocalFunction;
    use sandscript_core::{FaultCategory, HostObject, RuntimeFaultKind, Span};

    const SOURCE: &str = "int x = 10;\nint y = 0;\nreturn x / y;";

    fn decorate(mut class: ClassNode, mut ctx: CompilationContext) -> Interpreter {
        ctx.set_used_variables(collect_used_variables(&class));
        ctx.set_statement_offsets(statement_offsets(&class));
        DecorationPipeline::standard().run(&mut class, &mut ctx).unwrap();
        Interpreter::new(Arc::new(class), ctx.catalog().clone(), ctx.settings().clone())
    }

    fn context(source: &str) -> CompilationContext {
        let fixture = fixtures::compilation();
        CompilationContext::new(
            fixture.catalog().clone(),
            Arc::new(CompilerSettings::default()),
            "Divide",
            source,
        )
    }

    fn int(v: i32, offset: u32) -> ExpressionNode {
        ExpressionNode::new(
            ExpressionKind::Constant(Constant::Int(v)),
            ScriptType::INT,
            Span::at(offset),
        )
    }

    fn divide_script(ctx: &CompilationContext) -> ClassNode {
        let b = ctx.builder();
        let x = b.local("x", ScriptType::INT, Span::at(35));
        let y = b.local("y", ScriptType::INT, Span::at(39));
        let quotient = b.binary(BinaryOp::Div, x, y, Span::at(35)).unwrap();
        let body = BlockNode::new(
            vec![
                StatementNode::Declaration {
                    name: "x".into(),
                    ty: ScriptType::INT,
                    init: Some(int(10, 8)),
                    span: Span::at(0),
                },
                StatementNode::Declaration {
                    name: "y".into(),
                    ty: ScriptType::INT,
                    init: Some(int(0, 20)),
                    span: Span::at(12),
                },
                StatementNode::Return {
                    value: Some(quotient),
                    span: Span::at(23),
                },
            ],
            Span::default(),
        );
        let mut class = ClassNode::new("Divide");
        class.add_function(FunctionNode::new("execute", vec![], ScriptType::INT, body));
        class
    }

    #[test]
    fn division_by_zero_surfaces_as_script_exception() {
        let ctx = context(SOURCE);
        let class = divide_script(&ctx);
        let err = decorate(class, ctx).execute(vec![]).unwrap_err();
        match err {
            ExecutionError::Exception(exception) => {
                assert_eq!(exception.script_name, "Divide");
                assert_eq!(exception.cause.category(), FaultCategory::Any);
                assert!(matches!(
                    exception.cause,
                    ScriptFault::Runtime {
                        kind: RuntimeFaultKind::Arithmetic,
                        ..
                    }
                ));
                let position = exception.position.unwrap();
                assert_eq!((position.start, position.end), (23, SOURCE.len() as u32));
                assert_eq!(exception.snippet.as_deref(), Some("return x / y;"));
            }
            other => panic!("expected a normalized exception, got {other:?}"),
        }
    }

    #[test]
    fn unsandboxed_functions_report_raw_faults() {
        let ctx = context(SOURCE);
        let mut class = divide_script(&ctx);
        class.functions[0].name = "helper".into();
        let interpreter =
            Interpreter::new(Arc::new(class), ctx.catalog().clone(), ctx.settings().clone());
        let err = interpreter.call("helper", vec![]).unwrap_err();
        assert!(matches!(err, ExecutionError::Fault(ScriptFault::Runtime { .. })));
        assert!(matches!(
            interpreter.execute(vec![]),
            Err(ExecutionError::Fault(ScriptFault::Unrecoverable { .. }))
        ));
    }

    #[test]
    fn counted_loops_are_bounded() {
        let settings = CompilerSettings {
            max_loop_counter: 3,
            ..CompilerSettings::default()
        };
        let fixture = fixtures::compilation();
        let mut ctx =
            CompilationContext::new(fixture.catalog().clone(), Arc::new(settings), "Loop", "");
        let b = ctx.builder();
        let forever = StatementNode::While {
            condition: b.constant(Constant::Bool(true), Span::default()),
            body: BlockNode::default(),
            counted: true,
            span: Span::default(),
        };
        let mut class = ClassNode::new("Loop");
        class.add_function(FunctionNode::new(
            "execute",
            vec![],
            ScriptType::Void,
            BlockNode::new(vec![forever], Span::default()),
        ));
        ctx.set_used_variables(collect_used_variables(&class));
        DecorationPipeline::standard().run(&mut class, &mut ctx).unwrap();
        let interpreter =
            Interpreter::new(Arc::new(class), ctx.catalog().clone(), ctx.settings().clone());
        let err = interpreter.execute(vec![]).unwrap_err();
        assert_eq!(err.fault().category(), FaultCategory::ResourceExhausted);
        assert!(matches!(err, ExecutionError::Exception(_)));
    }

    /// `int i = 0; int total = 0;`
    /// `while (i < 3) { int j = 0; while (j < 3) { total++; j++; } i++; }`
    /// `return total;`
    fn nested_loops(limit: u64) -> Result<Value, ExecutionError> {
        let settings = CompilerSettings {
            max_loop_counter: limit,
            ..CompilerSettings::default()
        };
        let fixture = fixtures::compilation();
        let ctx =
            CompilationContext::new(fixture.catalog().clone(), Arc::new(settings), "Nested", "");
        let b = ctx.builder();
        let local = |name: &str| b.local(name, ScriptType::INT, Span::default());
        let bump = |name: &str| {
            let next = b.binary(BinaryOp::Add, local(name), int(1, 0), Span::default()).unwrap();
            let assign = b.assign(name, ScriptType::INT, next, Span::default()).unwrap();
            StatementNode::Expression(assign)
        };
        let declare = |name: &str| StatementNode::Declaration {
            name: name.into(),
            ty: ScriptType::INT,
            init: Some(int(0, 0)),
            span: Span::default(),
        };
        let below_three = |name: &str| {
            b.compare(CompareOp::Lt, local(name), int(3, 0), Span::default())
                .unwrap()
        };
        let inner = StatementNode::While {
            condition: below_three("j"),
            body: BlockNode::new(vec![bump("total"), bump("j")], Span::default()),
            counted: true,
            span: Span::default(),
        };
        let outer = StatementNode::While {
            condition: below_three("i"),
            body: BlockNode::new(vec![declare("j"), inner, bump("i")], Span::default()),
            counted: true,
            span: Span::default(),
        };
        let body = BlockNode::new(
            vec![
                declare("i"),
                declare("total"),
                outer,
                StatementNode::Return {
                    value: Some(local("total")),
                    span: Span::default(),
                },
            ],
            Span::default(),
        );
        let mut class = ClassNode::new("Nested");
        class.add_function(FunctionNode::new("execute", vec![], ScriptType::INT, body));
        decorate(class, ctx).execute(vec![])
    }

    #[test]
    fn loop_bound_is_shared_by_nested_loops() {
        // 3 outer plus 9 inner iterations
        assert_eq!(nested_loops(12).unwrap(), Value::Int(9));
        let err = nested_loops(5).unwrap_err();
        assert_eq!(err.fault().category(), FaultCategory::ResourceExhausted);
        assert!(matches!(err, ExecutionError::Exception(_)));
    }

    #[test]
    fn recursion_through_function_references_is_depth_limited() {
        let run = std::thread::Builder::new()
            .stack_size(256 << 20)
            .spawn(|| {
                let mut ctx = context("");
                ctx.symbols_mut()
                    .add_function(
                        LocalFunction::new("spin", vec![ScriptType::Dynamic], ScriptType::Dynamic),
                        Span::default(),
                    )
                    .unwrap();
                let function = ctx
                    .catalog()
                    .resolve_script_type("Function", Span::default())
                    .unwrap();
                let b = ctx.builder();
                // def spin(def n) { Function f = this::spin; return f.apply(n); }
                let reference = b
                    .function_ref(function, "this", "spin", vec![], Span::default())
                    .unwrap();
                let f = b.local("f", function, Span::default());
                let n = b.local("n", ScriptType::Dynamic, Span::default());
                let applied = b.call(f, "apply", vec![n], Span::default()).unwrap();
                let start = b.call_local("spin", vec![int(0, 0)], Span::default()).unwrap();

                let mut class = ClassNode::new("Spin");
                class.add_function(FunctionNode::new(
                    "execute",
                    vec![],
                    ScriptType::Dynamic,
                    BlockNode::new(
                        vec![StatementNode::Return {
                            value: Some(start),
                            span: Span::default(),
                        }],
                        Span::default(),
                    ),
                ));
                class.add_function(FunctionNode::new(
                    "spin",
                    vec![Parameter::new("n", ScriptType::Dynamic)],
                    ScriptType::Dynamic,
                    BlockNode::new(
                        vec![
                            StatementNode::Declaration {
                                name: "f".into(),
                                ty: function,
                                init: Some(reference),
                                span: Span::default(),
                            },
                            StatementNode::Return {
                                value: Some(applied),
                                span: Span::default(),
                            },
                        ],
                        Span::default(),
                    ),
                ));
                let interpreter = decorate(class, ctx);
                for _ in 0..2 {
                    let err = interpreter.execute(vec![]).unwrap_err();
                    assert_eq!(err.fault().category(), FaultCategory::ResourceExhausted);
                    assert!(matches!(err, ExecutionError::Exception(_)));
                }
            })
            .unwrap();
        run.join().unwrap();
    }

    #[test]
    fn loops_locals_and_local_calls() {
        let mut ctx = context("");
        ctx.symbols_mut()
            .add_function(
                LocalFunction::new("twice", vec![ScriptType::INT], ScriptType::INT),
                Span::default(),
            )
            .unwrap();
        let b = ctx.builder();

        let n = b.local("n", ScriptType::INT, Span::default());
        let doubled = b.binary(BinaryOp::Mul, n, int(2, 0), Span::default()).unwrap();
        let twice = FunctionNode::new(
            "twice",
            vec![Parameter::new("n", ScriptType::INT)],
            ScriptType::INT,
            BlockNode::new(
                vec![StatementNode::Return {
                    value: Some(doubled),
                    span: Span::default(),
                }],
                Span::default(),
            ),
        );

        // int i = 0; int acc = 0; while (i < 4) { acc = acc + twice(i); i = i + 1; } return acc;
        let i = || b.local("i", ScriptType::INT, Span::default());
        let acc = || b.local("acc", ScriptType::INT, Span::default());
        let call = b.call_local("twice", vec![i()], Span::default()).unwrap();
        let sum = b.binary(BinaryOp::Add, acc(), call, Span::default()).unwrap();
        let next = b.binary(BinaryOp::Add, i(), int(1, 0), Span::default()).unwrap();
        let body = BlockNode::new(
            vec![
                StatementNode::Expression(
                    b.assign("acc", ScriptType::INT, sum, Span::default())
                        .unwrap(),
                ),
                StatementNode::Expression(
                    b.assign("i", ScriptType::INT, next, Span::default())
                        .unwrap(),
                ),
            ],
            Span::default(),
        );
        let entry = BlockNode::new(
            vec![
                StatementNode::Declaration {
                    name: "i".into(),
                    ty: ScriptType::INT,
                    init: None,
                    span: Span::default(),
                },
                StatementNode::Declaration {
                    name: "acc".into(),
                    ty: ScriptType::INT,
                    init: Some(int(0, 0)),
                    span: Span::default(),
                },
                StatementNode::While {
                    condition: b.compare(CompareOp::Lt, i(), int(4, 0), Span::default()).unwrap(),
                    body,
                    counted: true,
                    span: Span::default(),
                },
                StatementNode::Return {
                    value: Some(acc()),
                    span: Span::default(),
                },
            ],
            Span::default(),
        );
        let mut class = ClassNode::new("Divide");
        class.add_function(FunctionNode::new("execute", vec![], ScriptType::INT, entry));
        class.add_function(twice);
        assert_eq!(decorate(class, ctx).execute(vec![]).unwrap(), Value::Int(12));
    }

    #[test]
    fn dynamic_sites_and_context_getters() {
        let mut ctx = fixtures::compilation();
        let mut class = fixtures::script();
        let b = ctx.builder();
        // def d = doc; return d.length();
        let entry = class.function_mut("execute").unwrap();
        entry.return_type = ScriptType::Dynamic;
        let string = ScriptType::Struct(sandscript_core::TypeHash::from_name("lang.String"));
        let doc = b.local("doc", string, Span::default());
        let d = b.cast(doc, ScriptType::Dynamic, false).unwrap();
        let call = b.call(d, "length", vec![], Span::default()).unwrap();
        entry.body.statements[2] = StatementNode::Return {
            value: Some(call),
            span: Span::at(26),
        };
        ctx.set_used_variables(collect_used_variables(&class));
        DecorationPipeline::standard().run(&mut class, &mut ctx).unwrap();
        let host = Value::Object(HostObject::new(fixtures::context_type(), ()));
        let interpreter =
            Interpreter::new(Arc::new(class), ctx.catalog().clone(), ctx.settings().clone())
                .with_context(host);
        // getDoc formats its receiver; the host object displays as an object label.
        let result = interpreter.execute(vec![]).unwrap();
        assert!(matches!(result, Value::Int(n) if n > 4));
        assert_eq!(interpreter.call("needsDoc", vec![]).unwrap(), Value::Bool(true));
        assert_eq!(interpreter.call("needsScore", vec![]).unwrap(), Value::Bool(false));
        assert_eq!(interpreter.call("getName", vec![]).unwrap(), Value::string("Script"));
    }

    #[test]
    fn explainable_faults_keep_headers() {
        let mut ctx = fixtures::compilation();
        let fault = ScriptFault::Explainable {
            message: "score is not available".into(),
            headers: vec![("script".into(), vec!["score".into()])],
        };
        let raise = NativeFn::new(move |_: &[Value]| Err(fault.clone()));
        let whitelist = fixtures::context_whitelist().class(
            sandscript_catalog::WhitelistClass::new("test.Fail").method(
                sandscript_catalog::WhitelistMethod::static_method(
                    "raise",
                    Vec::<String>::new(),
                    "int",
                )
                .native(raise),
            ),
        );
        let catalog = Catalog::shared([whitelist]).unwrap();
        let settings = ctx.settings().clone();
        ctx = CompilationContext::new(catalog, settings, "Explain", "return Fail.raise();");
        let b = ctx.builder();
        let call = b.call_static("Fail", "raise", vec![], Span::default()).unwrap();
        let mut class = ClassNode::new("Explain");
        class.add_function(FunctionNode::new(
            "execute",
            vec![],
            ScriptType::INT,
            BlockNode::new(
                vec![StatementNode::Return {
                    value: Some(call),
                    span: Span::default(),
                }],
                Span::default(),
            ),
        ));
        let err = decorate(class, ctx).execute(vec![]).unwrap_err();
        match err {
            ExecutionError::Exception(exception) => {
                assert_eq!(
                    exception.headers,
                    vec![("script".to_string(), vec!["score".to_string()])]
                );
                assert_eq!(exception.snippet.as_deref(), Some("return Fail.raise();"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}

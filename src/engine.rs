//! Engine façade.
//!
//! A [`ScriptEngine`] owns the frozen catalog and the compiler settings. Each
//! script is built as a [`ScriptUnit`]: the IR builder fills its class through
//! the unit's [`CompilationContext`], then [`ScriptEngine::compile`] runs the
//! used-variable analysis and the decoration pipeline and hands back a
//! [`CompiledScript`].
//!
//! ```
//! use sandscript::prelude::*;
//!
//! let engine = ScriptEngine::new(Vec::new()).unwrap();
//! let mut unit = engine.unit("Answer", "return 42;");
//! let answer = unit.builder().constant(Constant::Int(42), Span::at(0));
//! unit.class_mut().add_function(FunctionNode::new(
//!     "execute",
//!     vec![],
//!     ScriptType::INT,
//!     BlockNode::new(
//!         vec![StatementNode::Return { value: Some(answer), span: Span::at(0) }],
//!         Span::at(0),
//!     ),
//! ));
//!
//! let script = engine.compile(unit).unwrap();
//! assert_eq!(script.execute(Value::Null, vec![]).unwrap(), Value::Int(42));
//! ```

use std::sync::Arc;

use sandscript_catalog::{Catalog, Whitelist};
use sandscript_compiler::analysis::{collect_used_variables, statement_offsets};
use sandscript_compiler::ir::{ClassNode, ExprBuilder};
use sandscript_compiler::{
    CompilationContext, CompilerSettings, DecorationPipeline, ExecutionError, Interpreter,
    PassReport,
};
use sandscript_core::{CompilationError, TypeHash, Value};
use xxhash_rust::xxh64::xxh64;

use crate::error::EngineError;

/// Catalog, settings and decoration pipeline shared by every compilation.
#[derive(Debug)]
pub struct ScriptEngine {
    catalog: Arc<Catalog>,
    settings: Arc<CompilerSettings>,
    pipeline: DecorationPipeline,
}

impl ScriptEngine {
    /// Build the catalog from `whitelists` on top of the base whitelist.
    pub fn new(whitelists: impl IntoIterator<Item = Whitelist>) -> Result<Self, EngineError> {
        Ok(Self {
            catalog: Catalog::shared(whitelists)?,
            settings: Arc::new(CompilerSettings::default()),
            pipeline: DecorationPipeline::standard(),
        })
    }

    /// Build the catalog from TOML descriptors, each given as `(origin, source)`.
    pub fn from_toml<'a>(
        descriptors: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Result<Self, EngineError> {
        let whitelists = descriptors
            .into_iter()
            .map(|(origin, source)| Whitelist::from_toml(origin, source))
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(whitelists)
    }

    pub fn with_settings(mut self, settings: CompilerSettings) -> Result<Self, EngineError> {
        settings.validate()?;
        self.settings = Arc::new(settings);
        Ok(self)
    }

    /// Replace the settings from a TOML table; missing keys keep their defaults.
    pub fn with_settings_toml(self, source: &str) -> Result<Self, EngineError> {
        let settings = CompilerSettings::from_toml(source)?;
        self.with_settings(settings)
    }

    pub fn with_pipeline(mut self, pipeline: DecorationPipeline) -> Self {
        self.pipeline = pipeline;
        self
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn settings(&self) -> &CompilerSettings {
        &self.settings
    }

    /// Start a script named `name` with source text `source`.
    pub fn unit(&self, name: &str, source: &str) -> ScriptUnit {
        ScriptUnit {
            context: CompilationContext::new(
                self.catalog.clone(),
                self.settings.clone(),
                name,
                source,
            ),
            class: ClassNode::new(name),
        }
    }

    /// Analyze and decorate `unit`.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn compile(&self, unit: ScriptUnit) -> Result<CompiledScript, CompilationError> {
        let ScriptUnit { mut context, mut class } = unit;
        context.set_used_variables(collect_used_variables(&class));
        context.set_statement_offsets(statement_offsets(&class));
        let reports = self.pipeline.run(&mut class, &mut context)?;

        let name = context.script_name().to_string();
        let source = context.source().clone();
        Ok(CompiledScript {
            source_hash: xxh64(source.as_bytes(), 0),
            name,
            source,
            reports,
            interpreter: Interpreter::new(
                Arc::new(class),
                self.catalog.clone(),
                self.settings.clone(),
            ),
        })
    }
}

// ============================================================================
// Units
// ============================================================================

/// A script under construction: its class and the compilation state the IR
/// builder resolves against.
#[derive(Debug)]
pub struct ScriptUnit {
    context: CompilationContext,
    class: ClassNode,
}

impl ScriptUnit {
    /// Host type whose getters feed lazy variables and needs checks.
    pub fn with_context_type(mut self, context: TypeHash) -> Self {
        self.class.context = Some(context);
        self
    }

    pub fn context(&self) -> &CompilationContext {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut CompilationContext {
        &mut self.context
    }

    pub fn builder(&self) -> ExprBuilder<'_> {
        self.context.builder()
    }

    pub fn class(&self) -> &ClassNode {
        &self.class
    }

    pub fn class_mut(&mut self) -> &mut ClassNode {
        &mut self.class
    }

    /// Split borrow for building the class while resolving against the context.
    pub fn parts_mut(&mut self) -> (&CompilationContext, &mut ClassNode) {
        (&self.context, &mut self.class)
    }
}

// ============================================================================
// Compiled scripts
// ============================================================================

/// A decorated script, executable through the reference evaluator.
#[derive(Debug, Clone)]
pub struct CompiledScript {
    name: String,
    source: Arc<str>,
    source_hash: u64,
    reports: Vec<PassReport>,
    interpreter: Interpreter,
}

impl CompiledScript {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// xxh64 of the source text.
    pub fn source_hash(&self) -> u64 {
        self.source_hash
    }

    /// What each decoration pass changed.
    pub fn reports(&self) -> &[PassReport] {
        &self.reports
    }

    pub fn class(&self) -> &ClassNode {
        self.interpreter.class()
    }

    /// Run the entry function against the host `context`.
    pub fn execute(&self, context: Value, args: Vec<Value>) -> Result<Value, ExecutionError> {
        self.interpreter.clone().with_context(context).execute(args)
    }

    /// Answer of the `check` needs method, or `None` if the script has no such check.
    pub fn needs(&self, check: &str) -> Option<bool> {
        self.class().function_with_arity(check, 0)?;
        self.interpreter.call(check, Vec::new()).ok()?.as_bool().ok()
    }
}

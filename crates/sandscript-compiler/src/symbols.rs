//! Per-compilation table of script-local functions.
//!
//! The IR builder registers every function the script declares. The table is
//! consulted for local calls and `this::name` references, and a frozen copy is
//! handed to the dispatch bootstrap through a static field.

use rustc_hash::FxHashMap;
use sandscript_core::{CompilationError, ScriptType, Span, TypeHash};

/// Signature of a script-local function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFunction {
    pub hash: TypeHash,
    pub name: String,
    pub params: Vec<ScriptType>,
    pub return_type: ScriptType,
}

impl LocalFunction {
    pub fn new(name: impl Into<String>, params: Vec<ScriptType>, return_type: ScriptType) -> Self {
        let name = name.into();
        Self {
            hash: TypeHash::from_function(&name, params.len()),
            name,
            params,
            return_type,
        }
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }
}

#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    functions: FxHashMap<TypeHash, LocalFunction>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a function; a second function with the same `(name, arity)` is an error.
    pub fn add_function(
        &mut self,
        function: LocalFunction,
        span: Span,
    ) -> Result<(), CompilationError> {
        if self.functions.contains_key(&function.hash) {
            return Err(CompilationError::Internal {
                message: format!(
                    "at {span}: function [{}/{}] is already defined",
                    function.name,
                    function.arity()
                ),
            });
        }
        self.functions.insert(function.hash, function);
        Ok(())
    }

    pub fn get(&self, name: &str, arity: usize) -> Option<&LocalFunction> {
        self.functions.get(&TypeHash::from_function(name, arity))
    }

    pub fn contains_name(&self, name: &str) -> bool {
        self.functions.values().any(|f| f.name == name)
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LocalFunction> {
        self.functions.values()
    }
}

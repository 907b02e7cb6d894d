//! Per-compilation state threaded through analysis and decoration.

use std::sync::Arc;

use rustc_hash::FxHashSet;
use sandscript_catalog::Catalog;

use crate::ir::ExprBuilder;
use crate::settings::CompilerSettings;
use crate::symbols::SymbolTable;

/// Everything one script compilation owns.
///
/// The catalog and settings are shared read-only; the rest belongs to this
/// compilation alone, so concurrent compilations never synchronize.
#[derive(Debug)]
pub struct CompilationContext {
    catalog: Arc<Catalog>,
    settings: Arc<CompilerSettings>,
    symbols: SymbolTable,
    used_variables: FxHashSet<String>,
    script_name: String,
    source: Arc<str>,
    statement_offsets: Vec<u32>,
    synthetic: u32,
}

impl CompilationContext {
    pub fn new(
        catalog: Arc<Catalog>,
        settings: Arc<CompilerSettings>,
        script_name: impl Into<String>,
        source: impl Into<Arc<str>>,
    ) -> Self {
        Self {
            catalog,
            settings,
            symbols: SymbolTable::new(),
            used_variables: FxHashSet::default(),
            script_name: script_name.into(),
            source: source.into(),
            statement_offsets: Vec::new(),
            synthetic: 0,
        }
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn settings(&self) -> &Arc<CompilerSettings> {
        &self.settings
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    pub fn symbols_mut(&mut self) -> &mut SymbolTable {
        &mut self.symbols
    }

    pub fn script_name(&self) -> &str {
        &self.script_name
    }

    pub fn source(&self) -> &Arc<str> {
        &self.source
    }

    /// Expression factory bound to this compilation.
    pub fn builder(&self) -> ExprBuilder<'_> {
        ExprBuilder::new(self)
    }

    // ==========================================================================
    // Analysis results
    // ==========================================================================

    pub fn used_variables(&self) -> &FxHashSet<String> {
        &self.used_variables
    }

    pub fn set_used_variables(&mut self, used: FxHashSet<String>) {
        self.used_variables = used;
    }

    /// Whether any function of the script reads `name`.
    pub fn uses(&self, name: &str) -> bool {
        self.used_variables.contains(name)
    }

    /// Sorted start offsets of every statement in the script.
    pub fn statement_offsets(&self) -> &[u32] {
        &self.statement_offsets
    }

    pub fn set_statement_offsets(&mut self, mut offsets: Vec<u32>) {
        offsets.sort_unstable();
        offsets.dedup();
        self.statement_offsets = offsets;
    }

    /// A fresh name for compiler-introduced locals, unique within this compilation.
    pub fn next_synthetic(&mut self, prefix: &str) -> String {
        let name = format!("{prefix}{}", self.synthetic);
        self.synthetic += 1;
        name
    }
}

//! Decoration passes.
//!
//! After the IR builder produces a script class, four rewrites run over it in a
//! fixed order:
//!
//! 1. [`AccessorInjection`]: lazy context variables read their getter, unused
//!    ones are dropped
//! 2. [`NeedsCheckInjection`]: `needs*` checks answering which context
//!    variables are read
//! 3. [`StaticSupportInjection`]: catalog and symbol handles, bootstrap entry
//!    point, script metadata
//! 4. [`Sandboxing`]: the entry body is wrapped so every fault leaves as one
//!    exception type
//!
//! Every pass locates the entry function first and fails with
//! [`CompilationError::MissingEntryFunction`] when the builder did not produce it.

mod accessor;
mod needs;
mod sandbox;
mod statics;

pub use accessor::AccessorInjection;
pub use needs::{NEEDS_PREFIX, NeedsCheckInjection};
pub use sandbox::{FAULT_BINDING_PREFIX, Sandboxing};
pub use statics::{
    DEFINITION_FIELD, FUNCTIONS_FIELD, NAME_FIELD, SOURCE_FIELD, STATEMENTS_FIELD,
    StaticSupportInjection,
};

use sandscript_core::CompilationError;

use crate::context::CompilationContext;
use crate::ir::{ClassNode, FunctionNode};

/// What one pass changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassReport {
    pub pass: &'static str,
    pub changes: Vec<String>,
}

impl PassReport {
    pub fn new(pass: &'static str) -> Self {
        Self {
            pass,
            changes: Vec::new(),
        }
    }

    pub fn record(&mut self, change: impl Into<String>) {
        self.changes.push(change.into());
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

/// A rewrite over a script class.
pub trait DecorationPass: Send + Sync {
    fn name(&self) -> &'static str;

    fn run(
        &self,
        class: &mut ClassNode,
        ctx: &mut CompilationContext,
    ) -> Result<PassReport, CompilationError>;
}

/// The entry function of `class`, as named by the compiler settings.
pub fn entry_function_mut<'c>(
    class: &'c mut ClassNode,
    ctx: &CompilationContext,
) -> Result<&'c mut FunctionNode, CompilationError> {
    let name = &ctx.settings().entry_function;
    let class_name = class.name.clone();
    class
        .function_mut(name)
        .ok_or_else(|| CompilationError::MissingEntryFunction {
            name: name.clone(),
            class: class_name,
        })
}

/// Ordered list of passes applied to every compiled script.
pub struct DecorationPipeline {
    passes: Vec<Box<dyn DecorationPass>>,
}

impl DecorationPipeline {
    /// An empty pipeline.
    pub fn new() -> Self {
        Self { passes: Vec::new() }
    }

    /// The four standard passes in their required order.
    pub fn standard() -> Self {
        Self::new()
            .with(AccessorInjection)
            .with(NeedsCheckInjection)
            .with(StaticSupportInjection)
            .with(Sandboxing)
    }

    pub fn with(mut self, pass: impl DecorationPass + 'static) -> Self {
        self.passes.push(Box::new(pass));
        self
    }

    pub fn pass_names(&self) -> Vec<&'static str> {
        self.passes.iter().map(|p| p.name()).collect()
    }

    /// Run every pass in order, stopping at the first error.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn run(
        &self,
        class: &mut ClassNode,
        ctx: &mut CompilationContext,
    ) -> Result<Vec<PassReport>, CompilationError> {
        self.passes.iter().map(|pass| pass.run(class, ctx)).collect()
    }
}

impl Default for DecorationPipeline {
    fn default() -> Self {
        Self::standard()
    }
}

impl std::fmt::Debug for DecorationPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecorationPipeline")
            .field("passes", &self.pass_names())
            .finish()
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::collect_used_variables;

    #[test]
    fn standard_order() {
        assert_eq!(
            DecorationPipeline::standard().pass_names(),
            vec![
                "accessor-injection",
                "needs-check-injection",
                "static-support-injection",
                "sandboxing"
            ]
        );
    }

    #[test]
    fn every_pass_requires_the_entry_function() {
        let pipeline = DecorationPipeline::standard();
        for pass in &pipeline.passes {
            let mut ctx = fixtures::compilation();
            let mut class = ClassNode::new("Empty");
            match pass.run(&mut class, &mut ctx) {
                Err(CompilationError::MissingEntryFunction { name, class }) => {
                    assert_eq!(name, "execute");
                    assert_eq!(class, "Empty");
                }
                other => panic!("{} accepted a class without entry: {other:?}", pass.name()),
            }
        }
    }

    #[test]
    fn full_pipeline_reports_changes() {
        let mut ctx = fixtures::compilation();
        let mut class = fixtures::script();
        ctx.set_used_variables(collect_used_variables(&class));
        let reports = DecorationPipeline::standard().run(&mut class, &mut ctx).unwrap();
        assert_eq!(reports.len(), 4);
        assert!(reports.iter().all(|r| !r.is_empty()));
    }
}

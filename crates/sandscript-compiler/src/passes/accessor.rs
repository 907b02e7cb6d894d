//! Lazy context variables.
//!
//! A top-level declaration in the entry function with no initializer, whose
//! name matches a getter property of the host context, is a lazy context
//! variable. If the script reads it anywhere, the declaration is initialized
//! from the getter; otherwise the declaration is removed so the host never
//! computes a value nobody reads.

use sandscript_core::{CompilationError, Span};

use super::{DecorationPass, PassReport, entry_function_mut};
use crate::context::CompilationContext;
use crate::ir::{ClassNode, StatementNode};

#[derive(Debug, Clone, Copy, Default)]
pub struct AccessorInjection;

impl DecorationPass for AccessorInjection {
    fn name(&self) -> &'static str {
        "accessor-injection"
    }

    #[cfg_attr(feature = "profiling", profiling::function)]
    fn run(
        &self,
        class: &mut ClassNode,
        ctx: &mut CompilationContext,
    ) -> Result<PassReport, CompilationError> {
        let mut report = PassReport::new(self.name());
        let context = class.context;
        let entry = entry_function_mut(class, ctx)?;
        let Some(context) = context else {
            return Ok(report);
        };

        let builder = ctx.builder();
        let mut kept = Vec::with_capacity(entry.body.statements.len());
        for statement in &entry.body.statements {
            let (name, ty, span) = match statement {
                StatementNode::Declaration {
                    name,
                    ty,
                    init: None,
                    span,
                } if ctx.catalog().lookup_getter(context, name).is_some() => {
                    (name.clone(), *ty, *span)
                }
                other => {
                    kept.push(other.clone());
                    continue;
                }
            };
            if !ctx.uses(&name) {
                report.record(format!("removed unused context variable '{name}'"));
                continue;
            }
            let value = builder.load(builder.context(context, Span::at(span.offset)), &name, span)?;
            let init = builder.cast(value, ty, false)?;
            report.record(format!("initialized '{name}' from the context"));
            kept.push(StatementNode::Declaration {
                name,
                ty,
                init: Some(init),
                span,
            });
        }
        entry.body.statements = kept;
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::collect_used_variables;
    use crate::ir::ExpressionKind;
    use crate::passes::fixtures;
    use sandscript_core::ScriptType;

    fn run_twice() -> (ClassNode, PassReport, PassReport) {
        let mut ctx = fixtures::compilation();
        let mut class = fixtures::script();
        ctx.set_used_variables(collect_used_variables(&class));
        let first = AccessorInjection.run(&mut class, &mut ctx).unwrap();
        let second = AccessorInjection.run(&mut class, &mut ctx).unwrap();
        (class, first, second)
    }

    #[test]
    fn used_variables_read_their_getter() {
        let (class, first, _) = run_twice();
        let body = &class.function("execute").unwrap().body;
        match &body.statements[0] {
            StatementNode::Declaration {
                name,
                init: Some(init),
                ..
            } => {
                assert_eq!(name, "score");
                assert_eq!(init.result_type(), ScriptType::DOUBLE);
                match &init.kind {
                    ExpressionKind::Invoke { method, receiver, .. } => {
                        assert_eq!(method.name, "getScore");
                        assert!(matches!(
                            receiver.as_deref().map(|r| &r.kind),
                            Some(ExpressionKind::LoadContext)
                        ));
                    }
                    other => panic!("unexpected initializer {other:?}"),
                }
            }
            other => panic!("unexpected statement {other:?}"),
        }
        assert_eq!(first.changes.len(), 2);
    }

    #[test]
    fn unused_variables_are_removed() {
        let (class, _, _) = run_twice();
        let body = &class.function("execute").unwrap().body;
        assert_eq!(body.statements.len(), 2);
        assert!(!body.statements.iter().any(|s| matches!(
            s,
            StatementNode::Declaration { name, .. } if name == "doc"
        )));
    }

    #[test]
    fn idempotent() {
        let (class, _, second) = run_twice();
        assert!(second.is_empty());
        assert_eq!(class.function("execute").unwrap().body.statements.len(), 2);
    }

    #[test]
    fn plain_declarations_are_untouched() {
        let mut ctx = fixtures::compilation();
        let mut class = fixtures::script();
        class
            .function_mut("execute")
            .unwrap()
            .body
            .statements
            .insert(0, fixtures::declare("total", ScriptType::INT, 0));
        ctx.set_used_variables(collect_used_variables(&class));
        AccessorInjection.run(&mut class, &mut ctx).unwrap();
        assert!(matches!(
            &class.function("execute").unwrap().body.statements[0],
            StatementNode::Declaration { name, init: None, .. } if name == "total"
        ));
    }

    #[test]
    fn failed_injection_leaves_the_body_intact() {
        let mut ctx = fixtures::compilation();
        let mut class = fixtures::script();
        class.function_mut("execute").unwrap().body.statements[0] =
            fixtures::declare("score", ScriptType::BOOLEAN, 0);
        ctx.set_used_variables(collect_used_variables(&class));
        let err = AccessorInjection.run(&mut class, &mut ctx).unwrap_err();
        assert!(matches!(err, CompilationError::NoSuchCast { .. }), "{err:?}");
        let body = &class.function("execute").unwrap().body;
        assert_eq!(body.statements.len(), 3);
        assert!(matches!(
            &body.statements[0],
            StatementNode::Declaration { name, init: None, .. } if name == "score"
        ));
    }

    #[test]
    fn class_without_context_is_unchanged() {
        let mut ctx = fixtures::compilation();
        let mut class = fixtures::script();
        class.context = None;
        let report = AccessorInjection.run(&mut class, &mut ctx).unwrap();
        assert!(report.is_empty());
        assert_eq!(class.function("execute").unwrap().body.statements.len(), 3);
    }
}

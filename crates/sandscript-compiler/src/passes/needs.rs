//! Needs checks.
//!
//! The host context declares zero-argument `needs<Name>()` methods returning
//! `boolean`. Each one gets a synthesized script function of the same name that
//! answers whether the script reads the variable `<name>`, so the host can skip
//! work the script never looks at.

use sandscript_catalog::property_name;
use sandscript_core::{CompilationError, ScriptType};

use super::{DecorationPass, PassReport, entry_function_mut};
use crate::context::CompilationContext;
use crate::ir::{
    BlockNode, ClassNode, Constant, ExpressionKind, ExpressionNode, FunctionNode, Modifiers,
    StatementNode,
};

/// Method-name prefix of a needs check.
pub const NEEDS_PREFIX: &str = "needs";

#[derive(Debug, Clone, Copy, Default)]
pub struct NeedsCheckInjection;

impl DecorationPass for NeedsCheckInjection {
    fn name(&self) -> &'static str {
        "needs-check-injection"
    }

    #[cfg_attr(feature = "profiling", profiling::function)]
    fn run(
        &self,
        class: &mut ClassNode,
        ctx: &mut CompilationContext,
    ) -> Result<PassReport, CompilationError> {
        let mut report = PassReport::new(self.name());
        let span = entry_function_mut(class, ctx)?.span;
        let Some(context) = class.context.and_then(|hash| ctx.catalog().lookup_struct(hash)) else {
            return Ok(report);
        };

        let mut checks: Vec<(String, String)> = context
            .methods
            .iter()
            .filter(|m| !m.is_static && m.arity() == 0 && m.return_type == ScriptType::BOOLEAN)
            .filter_map(|m| {
                property_name(&m.name, NEEDS_PREFIX).map(|variable| (m.name.clone(), variable))
            })
            .collect();
        checks.sort();

        for (check, variable) in checks {
            if class.function_with_arity(&check, 0).is_some() {
                continue;
            }
            let answer = ctx.uses(&variable);
            let value = ExpressionNode::new(
                ExpressionKind::Constant(Constant::Bool(answer)),
                ScriptType::BOOLEAN,
                span,
            );
            let body = BlockNode::new(
                vec![StatementNode::Return {
                    value: Some(value),
                    span,
                }],
                span,
            );
            class.add_function(
                FunctionNode::new(check.as_str(), Vec::new(), ScriptType::BOOLEAN, body)
                    .with_modifiers(Modifiers::PUBLIC | Modifiers::SYNTHETIC),
            );
            report.record(format!("{check}() = {answer}"));
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::collect_used_variables;
    use crate::passes::fixtures;

    fn answer(class: &ClassNode, check: &str) -> bool {
        let function = class.function(check).unwrap();
        assert!(function.modifiers.contains(Modifiers::SYNTHETIC));
        match &function.body.statements[..] {
            [StatementNode::Return { value: Some(value), .. }] => match &value.kind {
                ExpressionKind::Constant(Constant::Bool(b)) => *b,
                other => panic!("unexpected check body {other:?}"),
            },
            other => panic!("unexpected check body {other:?}"),
        }
    }

    #[test]
    fn checks_answer_variable_usage() {
        let mut ctx = fixtures::compilation();
        let mut class = fixtures::script();
        ctx.set_used_variables(collect_used_variables(&class));
        let report = NeedsCheckInjection.run(&mut class, &mut ctx).unwrap();
        assert!(answer(&class, "needsScore"));
        assert!(!answer(&class, "needsDoc"));
        assert!(class.function("needsWith").is_none());
        assert_eq!(report.changes, vec!["needsDoc() = false", "needsScore() = true"]);
    }

    #[test]
    fn existing_checks_are_kept() {
        let mut ctx = fixtures::compilation();
        let mut class = fixtures::script();
        ctx.set_used_variables(collect_used_variables(&class));
        NeedsCheckInjection.run(&mut class, &mut ctx).unwrap();
        let count = class.functions.len();
        let again = NeedsCheckInjection.run(&mut class, &mut ctx).unwrap();
        assert!(again.is_empty());
        assert_eq!(class.functions.len(), count);
    }
}

//! Sandboxing of the entry function.
//!
//! The decorated entry body becomes the protected block of a single try with
//! one catch per fault category, in [`FaultCategory::SANDBOX_ORDER`]. Every
//! catch rethrows the fault converted into the host-visible exception, which
//! carries the script name, the statement position and any diagnostic headers.

use sandscript_core::{CompilationError, FaultCategory, ScriptType};

use super::{DecorationPass, PassReport, entry_function_mut};
use crate::context::CompilationContext;
use crate::ir::{
    BlockNode, CatchNode, ClassNode, ExpressionKind, ExpressionNode, Modifiers, StatementNode,
};

/// Prefix of the locals that hold a caught fault.
pub const FAULT_BINDING_PREFIX: &str = "$fault";

#[derive(Debug, Clone, Copy, Default)]
pub struct Sandboxing;

impl DecorationPass for Sandboxing {
    fn name(&self) -> &'static str {
        "sandboxing"
    }

    #[cfg_attr(feature = "profiling", profiling::function)]
    fn run(
        &self,
        class: &mut ClassNode,
        ctx: &mut CompilationContext,
    ) -> Result<PassReport, CompilationError> {
        let mut report = PassReport::new(self.name());
        let entry = entry_function_mut(class, ctx)?;
        if entry.modifiers.contains(Modifiers::SANDBOXED) {
            return Ok(report);
        }

        let span = entry.body.span;
        let catches = FaultCategory::SANDBOX_ORDER
            .iter()
            .map(|&category| {
                let binding = ctx.next_synthetic(FAULT_BINDING_PREFIX);
                let convert = ExpressionNode::new(
                    ExpressionKind::ConvertFault {
                        binding: binding.clone(),
                    },
                    ScriptType::Dynamic,
                    span,
                );
                CatchNode {
                    category,
                    binding,
                    block: BlockNode::new(
                        vec![StatementNode::Throw {
                            value: convert,
                            span,
                        }],
                        span,
                    ),
                }
            })
            .collect::<Vec<_>>();

        let protected = std::mem::take(&mut entry.body);
        entry.body = BlockNode::new(
            vec![StatementNode::Try {
                block: protected,
                catches,
                span,
            }],
            span,
        );
        entry.modifiers |= Modifiers::SANDBOXED;
        report.record(format!(
            "wrapped {} with {} catch clauses",
            entry.name,
            FaultCategory::SANDBOX_ORDER.len()
        ));
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::passes::fixtures;

    #[test]
    fn wraps_the_entry_body_once() {
        let mut ctx = fixtures::compilation();
        let mut class = fixtures::script();
        Sandboxing.run(&mut class, &mut ctx).unwrap();
        let again = Sandboxing.run(&mut class, &mut ctx).unwrap();
        assert!(again.is_empty());

        let entry = class.function("execute").unwrap();
        assert!(entry.modifiers.contains(Modifiers::SANDBOXED));
        match &entry.body.statements[..] {
            [StatementNode::Try { block, catches, .. }] => {
                assert_eq!(block.statements.len(), 3);
                let order: Vec<_> = catches.iter().map(|c| c.category).collect();
                assert_eq!(order, FaultCategory::SANDBOX_ORDER);
                assert_eq!(catches[0].binding, "$fault0");
                assert_eq!(catches[3].binding, "$fault3");
                for catch in catches {
                    let [StatementNode::Throw { value, .. }] = &catch.block.statements[..] else {
                        panic!("catch clause should only rethrow");
                    };
                    assert!(matches!(
                        &value.kind,
                        ExpressionKind::ConvertFault { binding } if *binding == catch.binding
                    ));
                }
            }
            other => panic!("unexpected body {other:?}"),
        }
    }

    #[test]
    fn other_functions_are_not_wrapped() {
        let mut ctx = fixtures::compilation();
        let mut class = fixtures::script();
        let mut helper = class.function("execute").unwrap().clone();
        helper.name = "helper".to_string();
        class.add_function(helper);
        Sandboxing.run(&mut class, &mut ctx).unwrap();
        assert_eq!(class.function("helper").unwrap().body.statements.len(), 3);
    }
}

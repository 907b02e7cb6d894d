//! Whole-class analyses run before decoration.

use rustc_hash::FxHashSet;

use crate::ir::visit::{walk_block, walk_statements};
use crate::ir::{ClassNode, ExpressionKind};

/// Names of every local read anywhere in `class`.
///
/// Assignments alone do not count as a use.
#[cfg_attr(feature = "profiling", profiling::function)]
pub fn collect_used_variables(class: &ClassNode) -> FxHashSet<String> {
    let mut used = FxHashSet::default();
    for function in &class.functions {
        walk_block(&function.body, &mut |expr| {
            if let ExpressionKind::Local(name) = &expr.kind {
                used.insert(name.clone());
            }
        });
    }
    used
}

/// Start offsets of every statement in `class`, sorted and de-duplicated.
pub fn statement_offsets(class: &ClassNode) -> Vec<u32> {
    let mut offsets = Vec::new();
    for function in &class.functions {
        walk_statements(&function.body, &mut |statement| offsets.push(statement.span().offset));
    }
    offsets.sort_unstable();
    offsets.dedup();
    offsets
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{BlockNode, Constant, ExpressionNode, FunctionNode, StatementNode};
    use sandscript_core::{ScriptType, Span};

    fn local(name: &str, offset: u32) -> ExpressionNode {
        ExpressionNode::new(
            ExpressionKind::Local(name.to_string()),
            ScriptType::INT,
            Span::at(offset),
        )
    }

    fn class() -> ClassNode {
        let assign = ExpressionNode::new(
            ExpressionKind::Assign {
                name: "written".to_string(),
                value: Box::new(local("read_in_assign", 4)),
            },
            ScriptType::INT,
            Span::at(4),
        );
        let nested = StatementNode::If {
            condition: local("flag", 12),
            then_block: BlockNode::new(
                vec![StatementNode::Return {
                    value: Some(local("x", 20)),
                    span: Span::at(20),
                }],
                Span::at(18),
            ),
            else_block: None,
            span: Span::at(12),
        };
        let body = BlockNode::new(
            vec![
                StatementNode::Expression(assign),
                nested,
                StatementNode::Declaration {
                    name: "unused".to_string(),
                    ty: ScriptType::INT,
                    init: Some(ExpressionNode::new(
                        ExpressionKind::Constant(Constant::Int(1)),
                        ScriptType::INT,
                        Span::at(4),
                    )),
                    span: Span::at(4),
                },
            ],
            Span::default(),
        );
        let mut class = ClassNode::new("Script");
        class.add_function(FunctionNode::new("execute", vec![], ScriptType::INT, body));
        class
    }

    #[test]
    fn reads_are_collected_across_nested_blocks() {
        let used = collect_used_variables(&class());
        assert!(used.contains("x"));
        assert!(used.contains("flag"));
        assert!(used.contains("read_in_assign"));
        assert!(!used.contains("written"));
        assert!(!used.contains("unused"));
    }

    #[test]
    fn offsets_are_sorted_and_unique() {
        assert_eq!(statement_offsets(&class()), vec![4, 12, 20]);
    }
}

//! Read-only traversal of the IR.

use super::{BlockNode, ExpressionNode, StatementNode};

/// Call `f` on every expression in `block`, parents before children.
pub fn walk_block<'a>(block: &'a BlockNode, f: &mut impl FnMut(&'a ExpressionNode)) {
    for statement in &block.statements {
        walk_statement(statement, f);
    }
}

pub fn walk_statement<'a>(statement: &'a StatementNode, f: &mut impl FnMut(&'a ExpressionNode)) {
    match statement {
        StatementNode::Declaration { init, .. } => {
            if let Some(init) = init {
                walk_expression(init, f);
            }
        }
        StatementNode::Expression(expr) | StatementNode::Throw { value: expr, .. } => {
            walk_expression(expr, f)
        }
        StatementNode::Return { value, .. } => {
            if let Some(value) = value {
                walk_expression(value, f);
            }
        }
        StatementNode::If {
            condition,
            then_block,
            else_block,
            ..
        } => {
            walk_expression(condition, f);
            walk_block(then_block, f);
            if let Some(else_block) = else_block {
                walk_block(else_block, f);
            }
        }
        StatementNode::While { condition, body, .. } => {
            walk_expression(condition, f);
            walk_block(body, f);
        }
        StatementNode::Try { block, catches, .. } => {
            walk_block(block, f);
            for catch in catches {
                walk_block(&catch.block, f);
            }
        }
    }
}

pub fn walk_expression<'a>(expr: &'a ExpressionNode, f: &mut impl FnMut(&'a ExpressionNode)) {
    f(expr);
    for child in expr.children() {
        walk_expression(child, f);
    }
}

/// Call `f` on every statement in `block`, including nested ones.
pub fn walk_statements<'a>(block: &'a BlockNode, f: &mut impl FnMut(&'a StatementNode)) {
    for statement in &block.statements {
        f(statement);
        match statement {
            StatementNode::If {
                then_block,
                else_block,
                ..
            } => {
                walk_statements(then_block, f);
                if let Some(else_block) = else_block {
                    walk_statements(else_block, f);
                }
            }
            StatementNode::While { body, .. } => walk_statements(body, f),
            StatementNode::Try { block, catches, .. } => {
                walk_statements(block, f);
                for catch in catches {
                    walk_statements(&catch.block, f);
                }
            }
            _ => {}
        }
    }
}

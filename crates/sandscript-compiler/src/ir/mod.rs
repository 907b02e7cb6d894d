//! Typed intermediate representation of a script class.
//!
//! An IR builder (outside this crate) lowers parsed source into these nodes
//! through [`ExprBuilder`]; the decoration passes then rewrite the tree before
//! it is handed to a backend.

mod build;
mod expr;
mod node;
pub mod visit;

pub use build::ExprBuilder;
pub use expr::{Constant, ExpressionKind, ExpressionNode};
pub use node::{
    BlockNode, CatchNode, ClassNode, FieldNode, FunctionNode, Modifiers, Parameter, StatementNode,
    StaticValue,
};

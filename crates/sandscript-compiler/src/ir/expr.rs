//! Expression nodes.

use std::sync::Arc;

use ordered_float::OrderedFloat;
use sandscript_catalog::{ConstructorDescriptor, FieldDescriptor, MethodDescriptor};
use sandscript_core::{ScriptType, Span, Value};

use crate::bootstrap::CallSite;
use crate::cast::CastDescriptor;
use crate::funcref::FunctionReferenceBinding;
use crate::ops::{BinaryOp, CompareOp, UnaryOp};

/// A literal. Floats are wrapped so constants stay hashable.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Constant {
    Null,
    Bool(bool),
    Char(u16),
    Int(i32),
    Long(i64),
    Float(OrderedFloat<f32>),
    Double(OrderedFloat<f64>),
    Str(Arc<str>),
}

impl Constant {
    pub fn to_value(&self) -> Value {
        match self {
            Constant::Null => Value::Null,
            Constant::Bool(v) => Value::Bool(*v),
            Constant::Char(v) => Value::Char(*v),
            Constant::Int(v) => Value::Int(*v),
            Constant::Long(v) => Value::Long(*v),
            Constant::Float(v) => Value::Float(v.into_inner()),
            Constant::Double(v) => Value::Double(v.into_inner()),
            Constant::Str(s) => Value::Str(s.clone()),
        }
    }
}

#[derive(Debug, Clone)]
pub enum ExpressionKind {
    Constant(Constant),
    Local(String),
    Assign {
        name: String,
        value: Box<ExpressionNode>,
    },
    /// The host context object the script runs against.
    LoadContext,
    /// A static field of the script class.
    LoadStatic(String),
    /// Inner expression with its own cast; lets a second cast stack on top.
    Group(Box<ExpressionNode>),
    HostField {
        field: Arc<FieldDescriptor>,
        receiver: Option<Box<ExpressionNode>>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<ExpressionNode>,
        rhs: Box<ExpressionNode>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<ExpressionNode>,
    },
    Compare {
        op: CompareOp,
        lhs: Box<ExpressionNode>,
        rhs: Box<ExpressionNode>,
    },
    /// Call of a whitelisted method. Instance calls carry a receiver.
    Invoke {
        method: Arc<MethodDescriptor>,
        receiver: Option<Box<ExpressionNode>>,
        args: Vec<ExpressionNode>,
    },
    InvokeLocal {
        name: String,
        args: Vec<ExpressionNode>,
    },
    New {
        constructor: Arc<ConstructorDescriptor>,
        args: Vec<ExpressionNode>,
    },
    /// Call through the dispatch bootstrap. The receiver is `args[0]`.
    Dynamic {
        site: Arc<CallSite>,
        args: Vec<ExpressionNode>,
    },
    FunctionRef {
        binding: Arc<FunctionReferenceBinding>,
        captures: Vec<ExpressionNode>,
    },
    /// Normalize the fault bound to `binding` into the host-visible exception.
    /// Only valid as the operand of a throw.
    ConvertFault {
        binding: String,
    },
}

/// An expression with its resolved type and an optional conversion applied to
/// its result.
#[derive(Debug, Clone)]
pub struct ExpressionNode {
    pub kind: ExpressionKind,
    pub ty: ScriptType,
    pub cast: Option<CastDescriptor>,
    pub span: Span,
}

impl ExpressionNode {
    pub fn new(kind: ExpressionKind, ty: ScriptType, span: Span) -> Self {
        Self {
            kind,
            ty,
            cast: None,
            span,
        }
    }

    /// Type after the attached cast, if any.
    pub fn result_type(&self) -> ScriptType {
        self.cast.map_or(self.ty, |c| c.to)
    }

    /// Direct children, in evaluation order.
    pub fn children(&self) -> Vec<&ExpressionNode> {
        match &self.kind {
            ExpressionKind::Constant(_)
            | ExpressionKind::Local(_)
            | ExpressionKind::LoadContext
            | ExpressionKind::LoadStatic(_)
            | ExpressionKind::ConvertFault { .. } => Vec::new(),
            ExpressionKind::Assign { value, .. } => vec![&**value],
            ExpressionKind::Group(inner) => vec![&**inner],
            ExpressionKind::HostField { receiver, .. } => receiver.iter().map(|r| &**r).collect(),
            ExpressionKind::Binary { lhs, rhs, .. } | ExpressionKind::Compare { lhs, rhs, .. } => {
                vec![&**lhs, &**rhs]
            }
            ExpressionKind::Unary { operand, .. } => vec![&**operand],
            ExpressionKind::Invoke { receiver, args, .. } => {
                receiver.iter().map(|r| &**r).chain(args.iter()).collect()
            }
            ExpressionKind::InvokeLocal { args, .. }
            | ExpressionKind::New { args, .. }
            | ExpressionKind::Dynamic { args, .. } => args.iter().collect(),
            ExpressionKind::FunctionRef { captures, .. } => captures.iter().collect(),
        }
    }
}

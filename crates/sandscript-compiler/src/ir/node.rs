//! Class, function and statement nodes.

use std::sync::Arc;

use bitflags::bitflags;
use sandscript_catalog::Catalog;
use sandscript_core::{
    FaultCategory, HostObject, ScriptType, Span, TypeHash, Value, OBJECT_HOST_NAME,
};

use super::ExpressionNode;
use crate::symbols::SymbolTable;

bitflags! {
    /// Modifiers on fields and functions of a script class.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Modifiers: u16 {
        const PUBLIC = 1 << 0;
        const STATIC = 1 << 1;
        const FINAL = 1 << 2;
        /// Introduced by the compiler, not written by the script author.
        const SYNTHETIC = 1 << 3;
        /// Implemented by the runtime; the body is empty.
        const NATIVE = 1 << 4;
        /// Body already wrapped by the sandbox.
        const SANDBOXED = 1 << 5;
    }
}

// ============================================================================
// Class
// ============================================================================

/// Root of a compiled script.
#[derive(Debug, Clone)]
pub struct ClassNode {
    pub name: String,
    /// Host type whose getters feed lazy context variables and needs checks.
    pub context: Option<TypeHash>,
    pub fields: Vec<FieldNode>,
    pub functions: Vec<FunctionNode>,
}

impl ClassNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            context: None,
            fields: Vec::new(),
            functions: Vec::new(),
        }
    }

    pub fn with_context(mut self, context: TypeHash) -> Self {
        self.context = Some(context);
        self
    }

    pub fn add_function(&mut self, function: FunctionNode) {
        self.functions.push(function);
    }

    pub fn add_field(&mut self, field: FieldNode) {
        self.fields.push(field);
    }

    /// First function named `name`.
    pub fn function(&self, name: &str) -> Option<&FunctionNode> {
        self.functions.iter().find(|f| f.name == name)
    }

    pub fn function_mut(&mut self, name: &str) -> Option<&mut FunctionNode> {
        self.functions.iter_mut().find(|f| f.name == name)
    }

    pub fn function_with_arity(&self, name: &str, arity: usize) -> Option<&FunctionNode> {
        self.functions
            .iter()
            .find(|f| f.name == name && f.params.len() == arity)
    }

    pub fn field(&self, name: &str) -> Option<&FieldNode> {
        self.fields.iter().find(|f| f.name == name)
    }
}

// ============================================================================
// Fields
// ============================================================================

/// Compile-time constant stored in a static field.
#[derive(Debug, Clone)]
pub enum StaticValue {
    Catalog(Arc<Catalog>),
    Symbols(Arc<SymbolTable>),
    Str(Arc<str>),
    Offsets(Arc<[u32]>),
}

impl StaticValue {
    /// Runtime view of this constant. Handles become opaque host objects.
    pub fn to_value(&self) -> Value {
        let object = TypeHash::from_name(OBJECT_HOST_NAME);
        let opaque = match self {
            StaticValue::Str(s) => return Value::Str(s.clone()),
            StaticValue::Catalog(catalog) => HostObject::new(object, catalog.clone()),
            StaticValue::Symbols(symbols) => HostObject::new(object, symbols.clone()),
            StaticValue::Offsets(offsets) => HostObject::new(object, offsets.clone()),
        };
        Value::Object(opaque)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            StaticValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_offsets(&self) -> Option<&[u32]> {
        match self {
            StaticValue::Offsets(offsets) => Some(offsets),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FieldNode {
    pub name: String,
    pub ty: ScriptType,
    pub modifiers: Modifiers,
    pub value: Option<StaticValue>,
}

impl FieldNode {
    /// A `static final` synthetic field holding `value`.
    pub fn constant(name: impl Into<String>, ty: ScriptType, value: StaticValue) -> Self {
        Self {
            name: name.into(),
            ty,
            modifiers: Modifiers::PUBLIC
                | Modifiers::STATIC
                | Modifiers::FINAL
                | Modifiers::SYNTHETIC,
            value: Some(value),
        }
    }
}

// ============================================================================
// Functions
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    pub name: String,
    pub ty: ScriptType,
}

impl Parameter {
    pub fn new(name: impl Into<String>, ty: ScriptType) -> Self {
        Self { name: name.into(), ty }
    }
}

#[derive(Debug, Clone)]
pub struct FunctionNode {
    pub name: String,
    pub params: Vec<Parameter>,
    pub return_type: ScriptType,
    pub body: BlockNode,
    pub modifiers: Modifiers,
    pub span: Span,
}

impl FunctionNode {
    pub fn new(
        name: impl Into<String>,
        params: Vec<Parameter>,
        return_type: ScriptType,
        body: BlockNode,
    ) -> Self {
        Self {
            name: name.into(),
            params,
            return_type,
            span: body.span,
            body,
            modifiers: Modifiers::PUBLIC,
        }
    }

    pub fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }
}

// ============================================================================
// Statements
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct BlockNode {
    pub statements: Vec<StatementNode>,
    pub span: Span,
}

impl BlockNode {
    pub fn new(statements: Vec<StatementNode>, span: Span) -> Self {
        Self { statements, span }
    }
}

/// A catch clause keyed by fault category.
#[derive(Debug, Clone)]
pub struct CatchNode {
    pub category: FaultCategory,
    /// Local the caught fault is bound to.
    pub binding: String,
    pub block: BlockNode,
}

#[derive(Debug, Clone)]
pub enum StatementNode {
    Declaration {
        name: String,
        ty: ScriptType,
        init: Option<ExpressionNode>,
        span: Span,
    },
    Expression(ExpressionNode),
    Return {
        value: Option<ExpressionNode>,
        span: Span,
    },
    Throw {
        value: ExpressionNode,
        span: Span,
    },
    If {
        condition: ExpressionNode,
        then_block: BlockNode,
        else_block: Option<BlockNode>,
        span: Span,
    },
    While {
        condition: ExpressionNode,
        body: BlockNode,
        /// Whether the loop carries an iteration bound.
        counted: bool,
        span: Span,
    },
    Try {
        block: BlockNode,
        catches: Vec<CatchNode>,
        span: Span,
    },
}

impl StatementNode {
    pub fn span(&self) -> Span {
        match self {
            StatementNode::Expression(expr) => expr.span,
            StatementNode::Declaration { span, .. }
            | StatementNode::Return { span, .. }
            | StatementNode::Throw { span, .. }
            | StatementNode::If { span, .. }
            | StatementNode::While { span, .. }
            | StatementNode::Try { span, .. } => *span,
        }
    }
}

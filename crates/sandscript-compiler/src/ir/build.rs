//! Typed construction of expression nodes.
//!
//! [`ExprBuilder`] is the surface an IR builder uses to produce resolved
//! expressions: member lookups go through the catalog, arguments receive their
//! implicit casts, and anything whose receiver is `def` becomes a dynamic call
//! site linked through the bootstrap.

use std::sync::Arc;

use sandscript_core::{
    CompilationError, PrimitiveKind, STRING_HOST_NAME, ScriptType, Span, TypeHash,
};

use super::{Constant, ExpressionKind, ExpressionNode};
use crate::bootstrap::{CallSite, DispatchFlavor};
use crate::cast::{CastDescriptor, promote_kinds, promote_numeric, resolve_cast};
use crate::context::CompilationContext;
use crate::funcref::FunctionReferenceResolver;
use crate::ops::{BinaryOp, CompareOp, UnaryOp};
use crate::resolve::{
    check_arguments, resolve_constructor, resolve_field, resolve_local_function, resolve_method,
};

type Result<T> = std::result::Result<T, CompilationError>;

pub struct ExprBuilder<'a> {
    ctx: &'a CompilationContext,
}

impl<'a> ExprBuilder<'a> {
    pub fn new(ctx: &'a CompilationContext) -> Self {
        Self { ctx }
    }

    fn string_type(&self) -> ScriptType {
        ScriptType::Struct(TypeHash::from_name(STRING_HOST_NAME))
    }

    fn is_string(&self, ty: ScriptType) -> bool {
        ty == self.string_type()
    }

    /// The struct named by `name`; primitive names resolve to their box.
    fn struct_named(&self, name: &str, span: Span) -> Result<TypeHash> {
        match self.ctx.catalog().resolve_script_type(name, span)? {
            ScriptType::Struct(hash) => Ok(hash),
            ScriptType::Primitive(kind) => Ok(kind.boxed_hash()),
            _ => Err(CompilationError::UnknownType {
                name: name.to_string(),
                span,
            }),
        }
    }

    // ==========================================================================
    // Values
    // ==========================================================================

    pub fn constant(&self, constant: Constant, span: Span) -> ExpressionNode {
        let ty = match &constant {
            Constant::Null => ScriptType::Dynamic,
            Constant::Bool(_) => ScriptType::BOOLEAN,
            Constant::Char(_) => ScriptType::CHAR,
            Constant::Int(_) => ScriptType::INT,
            Constant::Long(_) => ScriptType::LONG,
            Constant::Float(_) => ScriptType::FLOAT,
            Constant::Double(_) => ScriptType::DOUBLE,
            Constant::Str(_) => self.string_type(),
        };
        ExpressionNode::new(ExpressionKind::Constant(constant), ty, span)
    }

    pub fn local(&self, name: impl Into<String>, ty: ScriptType, span: Span) -> ExpressionNode {
        ExpressionNode::new(ExpressionKind::Local(name.into()), ty, span)
    }

    /// `name = value`, converting `value` to the local's type.
    pub fn assign(
        &self,
        name: impl Into<String>,
        ty: ScriptType,
        value: ExpressionNode,
        span: Span,
    ) -> Result<ExpressionNode> {
        let value = self.cast(value, ty, false)?;
        Ok(ExpressionNode::new(
            ExpressionKind::Assign {
                name: name.into(),
                value: Box::new(value),
            },
            ty,
            span,
        ))
    }

    /// The host context object, typed as `context`.
    pub fn context(&self, context: TypeHash, span: Span) -> ExpressionNode {
        ExpressionNode::new(ExpressionKind::LoadContext, ScriptType::Struct(context), span)
    }

    /// Convert `expr` to `to`. Explicit conversions need `explicit`.
    pub fn cast(
        &self,
        expr: ExpressionNode,
        to: ScriptType,
        explicit: bool,
    ) -> Result<ExpressionNode> {
        let from = expr.result_type();
        if from == to {
            return Ok(expr);
        }
        let cast = resolve_cast(self.ctx.catalog(), from, to, explicit, expr.span)?;
        Ok(attach(expr, cast))
    }

    fn convert_args(
        &self,
        call: &str,
        params: &[ScriptType],
        args: Vec<ExpressionNode>,
        span: Span,
    ) -> Result<Vec<ExpressionNode>> {
        let types: Vec<ScriptType> = args.iter().map(ExpressionNode::result_type).collect();
        let casts = check_arguments(self.ctx.catalog(), call, params, &types, span)?;
        Ok(args.into_iter().zip(casts).map(|(arg, cast)| attach(arg, cast)).collect())
    }

    // ==========================================================================
    // Calls
    // ==========================================================================

    /// `receiver.name(args...)`.
    pub fn call(
        &self,
        receiver: ExpressionNode,
        name: &str,
        args: Vec<ExpressionNode>,
        span: Span,
    ) -> Result<ExpressionNode> {
        match receiver.result_type() {
            ScriptType::Dynamic => {
                let mut operands = Vec::with_capacity(args.len() + 1);
                operands.push(receiver);
                operands.extend(args);
                self.dynamic(DispatchFlavor::MethodCall, name, operands, ScriptType::Dynamic, span)
            }
            ScriptType::Primitive(kind) => {
                let boxed = self.cast(receiver, ScriptType::Struct(kind.boxed_hash()), false)?;
                self.call(boxed, name, args, span)
            }
            ScriptType::Struct(owner) => {
                let catalog = self.ctx.catalog();
                let method = resolve_method(catalog, owner, name, args.len(), false, span)?;
                let call = format!(
                    "{}.{}/{}",
                    catalog.type_name(ScriptType::Struct(owner)),
                    name,
                    args.len()
                );
                let args = self.convert_args(&call, &method.params, args, span)?;
                let ty = method.return_type;
                Ok(ExpressionNode::new(
                    ExpressionKind::Invoke {
                        method,
                        receiver: Some(Box::new(receiver)),
                        args,
                    },
                    ty,
                    span,
                ))
            }
            ScriptType::Void => Err(CompilationError::NoSuchMethod {
                owner: ScriptType::Void.to_string(),
                name: name.to_string(),
                arity: args.len(),
                kind: "instance",
                candidates: Vec::new(),
                span,
            }),
        }
    }

    /// `Type.name(args...)`.
    pub fn call_static(
        &self,
        type_name: &str,
        name: &str,
        args: Vec<ExpressionNode>,
        span: Span,
    ) -> Result<ExpressionNode> {
        let owner = self.struct_named(type_name, span)?;
        let method = resolve_method(self.ctx.catalog(), owner, name, args.len(), true, span)?;
        let call = format!("{type_name}.{name}/{}", args.len());
        let args = self.convert_args(&call, &method.params, args, span)?;
        let ty = method.return_type;
        Ok(ExpressionNode::new(
            ExpressionKind::Invoke {
                method,
                receiver: None,
                args,
            },
            ty,
            span,
        ))
    }

    /// Call of a function declared by the script.
    pub fn call_local(
        &self,
        name: &str,
        args: Vec<ExpressionNode>,
        span: Span,
    ) -> Result<ExpressionNode> {
        let function = resolve_local_function(self.ctx.symbols(), name, args.len(), span)?;
        let ty = function.return_type;
        let call = format!("{name}/{}", args.len());
        let args = self.convert_args(&call, &function.params, args, span)?;
        Ok(ExpressionNode::new(
            ExpressionKind::InvokeLocal {
                name: name.to_string(),
                args,
            },
            ty,
            span,
        ))
    }

    /// `new Type(args...)`.
    pub fn new_instance(
        &self,
        type_name: &str,
        args: Vec<ExpressionNode>,
        span: Span,
    ) -> Result<ExpressionNode> {
        let owner = self.struct_named(type_name, span)?;
        let constructor = resolve_constructor(self.ctx.catalog(), owner, args.len(), span)?;
        let call = format!("new {type_name}/{}", args.len());
        let args = self.convert_args(&call, &constructor.params, args, span)?;
        Ok(ExpressionNode::new(
            ExpressionKind::New { constructor, args },
            ScriptType::Struct(owner),
            span,
        ))
    }

    /// `lhs::rhs` converted to the functional interface `target`.
    pub fn function_ref(
        &self,
        target: ScriptType,
        lhs: &str,
        rhs: &str,
        captures: Vec<ExpressionNode>,
        span: Span,
    ) -> Result<ExpressionNode> {
        let capture_types: Vec<ScriptType> =
            captures.iter().map(ExpressionNode::result_type).collect();
        let resolver = FunctionReferenceResolver::new(self.ctx.catalog(), self.ctx.symbols());
        let binding = resolver.resolve(target, lhs, rhs, &capture_types, span)?;
        Ok(ExpressionNode::new(
            ExpressionKind::FunctionRef {
                binding: Arc::new(binding),
                captures,
            },
            target,
            span,
        ))
    }

    // ==========================================================================
    // Members
    // ==========================================================================

    /// `receiver.property`, through a getter or an instance field.
    pub fn load(
        &self,
        receiver: ExpressionNode,
        property: &str,
        span: Span,
    ) -> Result<ExpressionNode> {
        match receiver.result_type() {
            ScriptType::Dynamic => self.dynamic(
                DispatchFlavor::Load,
                property,
                vec![receiver],
                ScriptType::Dynamic,
                span,
            ),
            ScriptType::Primitive(kind) => {
                let boxed = self.cast(receiver, ScriptType::Struct(kind.boxed_hash()), false)?;
                self.load(boxed, property, span)
            }
            ScriptType::Struct(owner) => {
                let catalog = self.ctx.catalog();
                if let Some(getter) = catalog.lookup_getter(owner, property) {
                    let ty = getter.return_type;
                    return Ok(ExpressionNode::new(
                        ExpressionKind::Invoke {
                            method: getter.clone(),
                            receiver: Some(Box::new(receiver)),
                            args: Vec::new(),
                        },
                        ty,
                        span,
                    ));
                }
                let field = resolve_field(catalog, owner, property, false, span)?;
                let ty = field.ty;
                Ok(ExpressionNode::new(
                    ExpressionKind::HostField {
                        field,
                        receiver: Some(Box::new(receiver)),
                    },
                    ty,
                    span,
                ))
            }
            ScriptType::Void => Err(CompilationError::NoSuchField {
                owner: ScriptType::Void.to_string(),
                name: property.to_string(),
                kind: "instance",
                span,
            }),
        }
    }

    /// `receiver.property = value`. Static receivers need a setter.
    pub fn store(
        &self,
        receiver: ExpressionNode,
        property: &str,
        value: ExpressionNode,
        span: Span,
    ) -> Result<ExpressionNode> {
        match receiver.result_type() {
            ScriptType::Dynamic => self.dynamic(
                DispatchFlavor::Store,
                property,
                vec![receiver, value],
                ScriptType::Dynamic,
                span,
            ),
            ScriptType::Struct(owner) => {
                let catalog = self.ctx.catalog();
                let owner_name = catalog.type_name(ScriptType::Struct(owner));
                let setter = catalog
                    .lookup_setter(owner, property)
                    .cloned()
                    .ok_or_else(|| CompilationError::NoSuchField {
                        owner: owner_name.clone(),
                        name: property.to_string(),
                        kind: "writable",
                        span,
                    })?;
                let call = format!("{owner_name}.{}", setter.name);
                let args = self.convert_args(&call, &setter.params, vec![value], span)?;
                let ty = setter.return_type;
                Ok(ExpressionNode::new(
                    ExpressionKind::Invoke {
                        method: setter,
                        receiver: Some(Box::new(receiver)),
                        args,
                    },
                    ty,
                    span,
                ))
            }
            other => Err(CompilationError::NoSuchField {
                owner: self.ctx.catalog().type_name(other),
                name: property.to_string(),
                kind: "writable",
                span,
            }),
        }
    }

    /// `Type.FIELD`.
    pub fn load_static(&self, type_name: &str, field: &str, span: Span) -> Result<ExpressionNode> {
        let owner = self.struct_named(type_name, span)?;
        let field = resolve_field(self.ctx.catalog(), owner, field, true, span)?;
        let ty = field.ty;
        Ok(ExpressionNode::new(
            ExpressionKind::HostField { field, receiver: None },
            ty,
            span,
        ))
    }

    /// `receiver[index]`.
    pub fn index(
        &self,
        receiver: ExpressionNode,
        index: ExpressionNode,
        span: Span,
    ) -> Result<ExpressionNode> {
        if receiver.result_type().is_dynamic() {
            return self.dynamic(
                DispatchFlavor::IndexLoad,
                "get",
                vec![receiver, index],
                ScriptType::Dynamic,
                span,
            );
        }
        self.call(receiver, "get", vec![index], span)
    }

    // ==========================================================================
    // Operators
    // ==========================================================================

    fn operand_kind(&self, expr: &ExpressionNode) -> Option<PrimitiveKind> {
        let ty = expr.result_type();
        ty.as_primitive().or_else(|| ty.unboxed())
    }

    fn no_operator(
        &self,
        op: impl std::fmt::Display,
        lhs: &ExpressionNode,
        rhs: Option<&ExpressionNode>,
    ) -> CompilationError {
        let catalog = self.ctx.catalog();
        CompilationError::NoSuchCast {
            from: catalog.type_name(lhs.result_type()),
            to: match rhs {
                Some(rhs) => format!("{} ({op})", catalog.type_name(rhs.result_type())),
                None => format!("operand of ({op})"),
            },
            span: lhs.span,
        }
    }

    pub fn binary(
        &self,
        op: BinaryOp,
        lhs: ExpressionNode,
        rhs: ExpressionNode,
        span: Span,
    ) -> Result<ExpressionNode> {
        let node = |lhs: ExpressionNode, rhs: ExpressionNode, ty: ScriptType| {
            ExpressionNode::new(
                ExpressionKind::Binary {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                },
                ty,
                span,
            )
        };

        if op.is_logical() {
            let lhs = self.cast(lhs, ScriptType::BOOLEAN, false)?;
            let rhs = self.cast(rhs, ScriptType::BOOLEAN, false)?;
            return Ok(node(lhs, rhs, ScriptType::BOOLEAN));
        }
        if lhs.result_type().is_dynamic() || rhs.result_type().is_dynamic() {
            let flavor = if op.is_shift() {
                DispatchFlavor::ShiftOperator
            } else {
                DispatchFlavor::BinaryOperator
            };
            return self.dynamic(flavor, op.name(), vec![lhs, rhs], ScriptType::Dynamic, span);
        }
        let concat = self.is_string(lhs.result_type()) || self.is_string(rhs.result_type());
        if op == BinaryOp::Add && concat {
            let ty = self.string_type();
            return Ok(node(lhs, rhs, ty));
        }

        let (Some(left), Some(right)) = (self.operand_kind(&lhs), self.operand_kind(&rhs)) else {
            return Err(self.no_operator(op, &lhs, Some(&rhs)));
        };
        if op.is_bitwise() && left == PrimitiveKind::Bool && right == PrimitiveKind::Bool {
            let lhs = self.cast(lhs, ScriptType::BOOLEAN, false)?;
            let rhs = self.cast(rhs, ScriptType::BOOLEAN, false)?;
            return Ok(node(lhs, rhs, ScriptType::BOOLEAN));
        }
        if op.is_shift() {
            if !left.is_integral() || !right.is_integral() {
                return Err(self.no_operator(op, &lhs, Some(&rhs)));
            }
            let promoted = promote_kinds(left, PrimitiveKind::Int);
            let distance = promote_kinds(right, PrimitiveKind::Int);
            let lhs = self.cast(lhs, ScriptType::Primitive(promoted), false)?;
            let rhs = self.cast(rhs, ScriptType::Primitive(distance), false)?;
            return Ok(node(lhs, rhs, ScriptType::Primitive(promoted)));
        }

        let Some(promoted) = promote_numeric(lhs.result_type(), rhs.result_type()) else {
            return Err(self.no_operator(op, &lhs, Some(&rhs)));
        };
        if op.is_bitwise() && !promoted.is_integral() {
            return Err(self.no_operator(op, &lhs, Some(&rhs)));
        }
        let ty = ScriptType::Primitive(promoted);
        let lhs = self.cast(lhs, ty, false)?;
        let rhs = self.cast(rhs, ty, false)?;
        Ok(node(lhs, rhs, ty))
    }

    pub fn compare(
        &self,
        op: CompareOp,
        lhs: ExpressionNode,
        rhs: ExpressionNode,
        span: Span,
    ) -> Result<ExpressionNode> {
        let node = |lhs: ExpressionNode, rhs: ExpressionNode| {
            ExpressionNode::new(
                ExpressionKind::Compare {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                },
                ScriptType::BOOLEAN,
                span,
            )
        };

        if lhs.result_type().is_dynamic() || rhs.result_type().is_dynamic() {
            return self.dynamic(
                DispatchFlavor::Compare,
                op.name(),
                vec![lhs, rhs],
                ScriptType::BOOLEAN,
                span,
            );
        }
        if let Some(promoted) = promote_numeric(lhs.result_type(), rhs.result_type()) {
            let ty = ScriptType::Primitive(promoted);
            let lhs = self.cast(lhs, ty, false)?;
            let rhs = self.cast(rhs, ty, false)?;
            return Ok(node(lhs, rhs));
        }
        let strings = self.is_string(lhs.result_type()) && self.is_string(rhs.result_type());
        if op.is_equality() || strings {
            return Ok(node(lhs, rhs));
        }
        Err(self.no_operator(op.name(), &lhs, Some(&rhs)))
    }

    pub fn unary(
        &self,
        op: UnaryOp,
        operand: ExpressionNode,
        span: Span,
    ) -> Result<ExpressionNode> {
        let node = |operand: ExpressionNode, ty: ScriptType| {
            ExpressionNode::new(
                ExpressionKind::Unary {
                    op,
                    operand: Box::new(operand),
                },
                ty,
                span,
            )
        };

        if op == UnaryOp::Not {
            let operand = self.cast(operand, ScriptType::BOOLEAN, false)?;
            return Ok(node(operand, ScriptType::BOOLEAN));
        }
        if operand.result_type().is_dynamic() {
            return self.dynamic(
                DispatchFlavor::UnaryOperator,
                op.name(),
                vec![operand],
                ScriptType::Dynamic,
                span,
            );
        }
        let kind = match self.operand_kind(&operand) {
            Some(kind) if kind.is_numeric() && (op != UnaryOp::BitNot || kind.is_integral()) => {
                kind
            }
            _ => return Err(self.no_operator(op.name(), &operand, None)),
        };
        let ty = ScriptType::Primitive(promote_kinds(kind, PrimitiveKind::Int));
        let operand = self.cast(operand, ty, false)?;
        Ok(node(operand, ty))
    }

    // ==========================================================================
    // Dynamic dispatch
    // ==========================================================================

    /// A call site dispatched through the bootstrap. Operands are boxed to `def`.
    fn dynamic(
        &self,
        flavor: DispatchFlavor,
        name: &str,
        operands: Vec<ExpressionNode>,
        ty: ScriptType,
        span: Span,
    ) -> Result<ExpressionNode> {
        let args = operands
            .into_iter()
            .map(|operand| self.cast(operand, ScriptType::Dynamic, false))
            .collect::<Result<Vec<_>>>()?;
        let settings = self.ctx.settings();
        let site = CallSite::link(
            self.ctx.script_name(),
            name,
            settings.initial_call_site_depth,
            flavor.into(),
            settings.max_cache_depth,
        )?;
        Ok(ExpressionNode::new(
            ExpressionKind::Dynamic {
                site: Arc::new(site),
                args,
            },
            ty,
            span,
        ))
    }
}

/// Attach `cast` to `expr`, nesting when `expr` already converts its result.
fn attach(expr: ExpressionNode, cast: CastDescriptor) -> ExpressionNode {
    if cast.is_identity() {
        return expr;
    }
    let mut node = if expr.cast.is_some() {
        let (ty, span) = (expr.result_type(), expr.span);
        ExpressionNode::new(ExpressionKind::Group(Box::new(expr)), ty, span)
    } else {
        expr
    };
    node.cast = Some(cast);
    node
}

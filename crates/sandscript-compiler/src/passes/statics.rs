//! Static support for compiled scripts.
//!
//! Adds the static state emitted code and the runtime need: handles to the
//! catalog and the per-compilation symbol table, the bootstrap entry point for
//! dynamic call sites, and the script's name, source and statement boundaries
//! together with their accessors.

use std::sync::Arc;

use sandscript_core::{CompilationError, ScriptType, Span, TypeHash, STRING_HOST_NAME};

use super::{DecorationPass, PassReport, entry_function_mut};
use crate::bootstrap::{BOOTSTRAP_METHOD, BOOTSTRAP_PARAMETERS};
use crate::context::CompilationContext;
use crate::ir::{
    BlockNode, ClassNode, ExpressionKind, ExpressionNode, FieldNode, FunctionNode, Modifiers,
    Parameter, StatementNode, StaticValue,
};

pub const DEFINITION_FIELD: &str = "$DEFINITION";
pub const FUNCTIONS_FIELD: &str = "$FUNCTIONS";
pub const NAME_FIELD: &str = "$NAME";
pub const SOURCE_FIELD: &str = "$SOURCE";
pub const STATEMENTS_FIELD: &str = "$STATEMENTS";

#[derive(Debug, Clone, Copy, Default)]
pub struct StaticSupportInjection;

impl StaticSupportInjection {
    fn bootstrap_function(string: ScriptType) -> FunctionNode {
        let types = [
            ScriptType::Dynamic,
            ScriptType::Dynamic,
            string,
            string,
            ScriptType::INT,
            ScriptType::BYTE,
            ScriptType::Dynamic,
        ];
        let params = BOOTSTRAP_PARAMETERS
            .iter()
            .zip(types)
            .map(|(name, ty)| Parameter::new(*name, ty))
            .collect();
        FunctionNode::new(BOOTSTRAP_METHOD, params, ScriptType::Dynamic, BlockNode::default())
            .with_modifiers(
                Modifiers::PUBLIC | Modifiers::STATIC | Modifiers::NATIVE | Modifiers::SYNTHETIC,
            )
    }

    fn accessor(name: &str, field: &str, ty: ScriptType, span: Span) -> FunctionNode {
        let value = ExpressionNode::new(ExpressionKind::LoadStatic(field.to_string()), ty, span);
        let body = BlockNode::new(
            vec![StatementNode::Return {
                value: Some(value),
                span,
            }],
            span,
        );
        FunctionNode::new(name, Vec::new(), ty, body)
            .with_modifiers(Modifiers::PUBLIC | Modifiers::STATIC | Modifiers::SYNTHETIC)
    }
}

impl DecorationPass for StaticSupportInjection {
    fn name(&self) -> &'static str {
        "static-support-injection"
    }

    #[cfg_attr(feature = "profiling", profiling::function)]
    fn run(
        &self,
        class: &mut ClassNode,
        ctx: &mut CompilationContext,
    ) -> Result<PassReport, CompilationError> {
        let mut report = PassReport::new(self.name());
        let span = entry_function_mut(class, ctx)?.span;

        let object = ScriptType::Struct(ctx.catalog().object_type());
        let string = ScriptType::Struct(TypeHash::from_name(STRING_HOST_NAME));
        let offsets: Arc<[u32]> = if ctx.settings().statement_map {
            ctx.statement_offsets().into()
        } else {
            Arc::from(Vec::new())
        };
        let fields = [
            (DEFINITION_FIELD, object, StaticValue::Catalog(ctx.catalog().clone())),
            (FUNCTIONS_FIELD, object, StaticValue::Symbols(Arc::new(ctx.symbols().clone()))),
            (NAME_FIELD, string, StaticValue::Str(ctx.script_name().into())),
            (SOURCE_FIELD, string, StaticValue::Str(ctx.source().clone())),
            (STATEMENTS_FIELD, object, StaticValue::Offsets(offsets)),
        ];
        for (name, ty, value) in fields {
            if class.field(name).is_none() {
                class.add_field(FieldNode::constant(name, ty, value));
                report.record(format!("field {name}"));
            }
        }

        let functions = [
            Self::bootstrap_function(string),
            Self::accessor("getName", NAME_FIELD, string, span),
            Self::accessor("getSource", SOURCE_FIELD, string, span),
            Self::accessor("getStatements", STATEMENTS_FIELD, object, span),
        ];
        for function in functions {
            if class.function_with_arity(&function.name, function.arity()).is_none() {
                report.record(format!("function {}/{}", function.name, function.arity()));
                class.add_function(function);
            }
        }
        Ok(report)
    }
}

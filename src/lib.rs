//! Sandboxed scripting core.
//!
//! A host describes what scripts may touch with [`Whitelist`] descriptors. The
//! [`ScriptEngine`] freezes them into a [`Catalog`], decorates each script class
//! the IR builder produces, and runs it through the reference evaluator.

mod engine;
mod error;

pub use engine::{CompiledScript, ScriptEngine, ScriptUnit};
pub use error::{EngineError, Result};

pub use sandscript_catalog::{
    Catalog, Whitelist, WhitelistClass, WhitelistConstructor, WhitelistField, WhitelistMethod,
};
pub use sandscript_compiler::{CompilerSettings, DecorationPipeline, ExecutionError, PassReport};
pub use sandscript_core::{
    CompilationError, ScriptException, ScriptFault, ScriptType, Span, TypeHash, Value,
    WhitelistError,
};

pub mod catalog {
    pub use sandscript_catalog::*;
}

pub mod compiler {
    pub use sandscript_compiler::*;
}

pub mod core {
    pub use sandscript_core::*;
}

pub mod prelude {
    pub use crate::engine::*;
    pub use crate::error::EngineError;
    pub use sandscript_catalog::{
        Catalog, Whitelist, WhitelistClass, WhitelistConstructor, WhitelistField, WhitelistMethod,
    };
    pub use sandscript_compiler::ir::{
        BlockNode, CatchNode, ClassNode, Constant, ExprBuilder, ExpressionKind, ExpressionNode,
        FieldNode, FunctionNode, Modifiers, Parameter, StatementNode,
    };
    pub use sandscript_compiler::{CompilerSettings, DecorationPipeline, ExecutionError, PassReport};
    pub use sandscript_core::{
        CompilationError, FaultCategory, NativeFn, ScriptException, ScriptFault, ScriptType, Span,
        TypeHash, Value, arg,
    };
}

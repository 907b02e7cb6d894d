//! Semantic core of the sandscript compiler.
//!
//! Sits between an external IR builder and a code-generating backend:
//!
//! - [`cast`] and [`resolve`]: conversions and member binding against the catalog
//! - [`ir`]: the typed tree the builder produces, with [`ir::ExprBuilder`] as its factory
//! - [`passes`]: the decoration pipeline applied to every script class
//! - [`bootstrap`]: the dynamic-dispatch calling convention and its inline-cache runtime
//! - [`funcref`]: binding of `Type::method` references to functional interfaces
//! - [`eval`]: a reference evaluator for decorated classes
//!
//! All per-script state lives in a [`CompilationContext`]; the catalog is shared
//! read-only across compilations.

pub mod analysis;
pub mod bootstrap;
pub mod cast;
mod context;
pub mod eval;
pub mod funcref;
pub mod ir;
pub mod ops;
pub mod passes;
pub mod resolve;
mod settings;
mod symbols;

pub use bootstrap::{BOOTSTRAP_ABI_VERSION, BOOTSTRAP_METHOD, CallSite, DispatchFlavor, InlineCache};
pub use cast::{Boxing, CastDescriptor, CastKind, is_implicitly_castable, resolve_cast};
pub use context::CompilationContext;
pub use eval::{ExecutionError, Interpreter};
pub use funcref::{FunctionReferenceBinding, FunctionReferenceResolver, InvocationKind};
pub use passes::{DecorationPass, DecorationPipeline, PassReport};
pub use settings::{CompilerSettings, SettingsError};
pub use symbols::{LocalFunction, SymbolTable};

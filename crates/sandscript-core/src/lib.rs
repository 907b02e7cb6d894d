//! Core definitions shared by every sandscript crate.
//!
//! - [`TypeHash`]: deterministic identity for host types and members
//! - [`PrimitiveKind`], [`ScriptType`]: the script type system
//! - [`Value`], [`NativeFn`]: runtime values and host implementations
//! - [`error`]: the error hierarchy for catalog build, compilation and execution

pub mod error;
mod native_fn;
mod primitive_kind;
mod script_type;
mod span;
mod type_hash;
mod value;

pub use error::{
    CompilationError, FaultCategory, RuntimeFaultKind, SandscriptError, ScriptException,
    ScriptFault, ScriptPosition, WhitelistError, WhitelistErrorKind,
};
pub use native_fn::{NativeCallable, NativeFn, arg};
pub use primitive_kind::PrimitiveKind;
pub use script_type::{DYNAMIC_TYPE_NAME, ScriptType, VOID_TYPE_NAME};
pub use span::Span;
pub use type_hash::{TypeHash, hash_constants};
pub use value::{FunctionValue, HostObject, OBJECT_HOST_NAME, STRING_HOST_NAME, Value};

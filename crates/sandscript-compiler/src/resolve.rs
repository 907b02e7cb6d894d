//! Member and overload resolution.
//!
//! Overloads are keyed purely by `(name, arity)`. Once the arity picks a
//! descriptor, every argument must convert implicitly to its parameter type or
//! the call is rejected; there is no search over argument types.

use std::sync::Arc;

use sandscript_catalog::{
    Catalog, ConstructorDescriptor, FieldDescriptor, MethodDescriptor, StructType,
};
use sandscript_core::{CompilationError, ScriptType, Span, TypeHash};

use crate::cast::{CastDescriptor, resolve_cast};
use crate::symbols::{LocalFunction, SymbolTable};

fn owner_struct(
    catalog: &Catalog,
    owner: TypeHash,
    span: Span,
) -> Result<&StructType, CompilationError> {
    catalog.lookup_struct(owner).ok_or_else(|| CompilationError::UnknownType {
        name: catalog.type_name(ScriptType::Struct(owner)),
        span,
    })
}

/// Resolve an instance or static method by `(name, arity)`.
#[cfg_attr(feature = "profiling", profiling::function)]
pub fn resolve_method(
    catalog: &Catalog,
    owner: TypeHash,
    name: &str,
    arity: usize,
    is_static: bool,
    span: Span,
) -> Result<Arc<MethodDescriptor>, CompilationError> {
    let owner_type = owner_struct(catalog, owner, span)?;
    let found = if is_static {
        owner_type.static_method(name, arity)
    } else {
        owner_type.method(name, arity)
    };
    found.cloned().ok_or_else(|| CompilationError::NoSuchMethod {
        owner: owner_type.name.clone(),
        name: name.to_string(),
        arity,
        kind: if is_static { "static" } else { "instance" },
        candidates: owner_type.candidates(name, is_static),
        span,
    })
}

pub fn resolve_constructor(
    catalog: &Catalog,
    owner: TypeHash,
    arity: usize,
    span: Span,
) -> Result<Arc<ConstructorDescriptor>, CompilationError> {
    let owner_type = owner_struct(catalog, owner, span)?;
    owner_type
        .constructor(arity)
        .cloned()
        .ok_or_else(|| CompilationError::NoSuchConstructor {
            owner: owner_type.name.clone(),
            arity,
            candidates: owner_type.constructor_candidates(),
            span,
        })
}

pub fn resolve_field(
    catalog: &Catalog,
    owner: TypeHash,
    name: &str,
    is_static: bool,
    span: Span,
) -> Result<Arc<FieldDescriptor>, CompilationError> {
    let owner_type = owner_struct(catalog, owner, span)?;
    owner_type
        .field(name, is_static)
        .cloned()
        .ok_or_else(|| CompilationError::NoSuchField {
            owner: owner_type.name.clone(),
            name: name.to_string(),
            kind: if is_static { "static" } else { "instance" },
            span,
        })
}

/// Check `args` against `params`, returning the implicit cast each argument needs.
///
/// `call` names the callee in diagnostics.
pub fn check_arguments(
    catalog: &Catalog,
    call: &str,
    params: &[ScriptType],
    args: &[ScriptType],
    span: Span,
) -> Result<Vec<CastDescriptor>, CompilationError> {
    if params.len() != args.len() {
        return Err(CompilationError::Internal {
            message: format!(
                "at {span}: [{call}] resolved with {} parameter(s) for {} argument(s)",
                params.len(),
                args.len()
            ),
        });
    }
    params
        .iter()
        .zip(args)
        .enumerate()
        .map(|(index, (&param, &arg))| {
            resolve_cast(catalog, arg, param, false, span).map_err(|_| {
                CompilationError::ArgumentMismatch {
                    call: call.to_string(),
                    index,
                    expected: catalog.type_name(param),
                    found: catalog.type_name(arg),
                    span,
                }
            })
        })
        .collect()
}

pub fn resolve_local_function<'a>(
    symbols: &'a SymbolTable,
    name: &str,
    arity: usize,
    span: Span,
) -> Result<&'a LocalFunction, CompilationError> {
    symbols.get(name, arity).ok_or_else(|| CompilationError::UnknownFunction {
        name: name.to_string(),
        arity,
        span,
    })
}

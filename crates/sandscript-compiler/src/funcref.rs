//! Function-reference resolution.
//!
//! Binds `Type::name`, `Type::new` and `this::name` to the single functional
//! method of a target interface. Captured values are passed ahead of the
//! interface arguments, so a reference with `c` captures targeting an `n`-ary
//! functional method needs a delegate taking `n + c` values. For instance
//! methods the first of those values is the receiver. Constructor references
//! look up a constructor of arity `n - c` and reject captured values.

use std::sync::Arc;

use sandscript_catalog::{Catalog, ConstructorDescriptor, MethodDescriptor};
use sandscript_core::{CompilationError, ScriptFault, ScriptType, Span, TypeHash, Value};

use crate::cast::{CastDescriptor, resolve_cast};
use crate::resolve::resolve_constructor;
use crate::symbols::{LocalFunction, SymbolTable};

/// Right-hand side naming a constructor.
pub const CONSTRUCTOR_REFERENCE: &str = "new";

/// Left-hand side naming the script itself.
pub const THIS_REFERENCE: &str = "this";

/// How the delegate is invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InvocationKind {
    Construct,
    Static,
    Virtual,
    Interface,
    /// A function declared by the script.
    Local,
}

#[derive(Debug, Clone)]
pub enum Delegate {
    Constructor(Arc<ConstructorDescriptor>),
    Method(Arc<MethodDescriptor>),
    Local(LocalFunction),
}

/// A resolved function reference, ready for code emission.
#[derive(Debug, Clone)]
pub struct FunctionReferenceBinding {
    /// The reference as written, for diagnostics.
    pub syntax: String,
    pub interface: TypeHash,
    pub interface_method: Arc<MethodDescriptor>,
    /// Type declaring the delegate; `None` for script-local functions.
    pub declaring_type: Option<TypeHash>,
    /// Whether the declaring type is an interface.
    pub is_interface: bool,
    pub kind: InvocationKind,
    pub delegate: Delegate,
    pub captures: usize,
    /// Conversions from `captures ++ interface arguments` to the delegate's
    /// parameters, receiver first for instance delegates.
    pub arg_casts: Vec<CastDescriptor>,
    /// Conversion of the delegate result; `None` when the functional method
    /// returns `void`.
    pub return_cast: Option<CastDescriptor>,
}

impl FunctionReferenceBinding {
    /// Values the delegate receives: captures plus interface arguments.
    pub fn delegate_arity(&self) -> usize {
        self.arg_casts.len()
    }

    /// Call the delegate with captured values and interface arguments.
    ///
    /// `local` runs script-local delegates, which only the executing script
    /// can reach.
    pub fn invoke(
        &self,
        catalog: &Catalog,
        captured: &[Value],
        args: &[Value],
        local: impl FnOnce(&str, Vec<Value>) -> Result<Value, ScriptFault>,
    ) -> Result<Value, ScriptFault> {
        if captured.len() + args.len() != self.arg_casts.len() {
            return Err(ScriptFault::illegal_argument(format!(
                "[{}] expects {} argument(s), got {}",
                self.syntax,
                self.arg_casts.len() - self.captures,
                args.len()
            )));
        }
        let values = captured
            .iter()
            .chain(args)
            .zip(&self.arg_casts)
            .map(|(value, cast)| cast.apply(catalog, value.clone()))
            .collect::<Result<Vec<_>, _>>()?;

        let result = match &self.delegate {
            Delegate::Constructor(constructor) => constructor.invoke(&values)?,
            Delegate::Method(method) => {
                let null_receiver = values.first().is_some_and(Value::is_null);
                if self.kind != InvocationKind::Static && null_receiver {
                    return Err(ScriptFault::null_pointer(format!(
                        "[{}] invoked on a null receiver",
                        self.syntax
                    )));
                }
                method.invoke(&values)?
            }
            Delegate::Local(function) => local(&function.name, values)?,
        };
        match &self.return_cast {
            Some(cast) => cast.apply(catalog, result),
            None => Ok(Value::Null),
        }
    }
}

/// Resolves method references against the catalog and the script's own functions.
pub struct FunctionReferenceResolver<'a> {
    catalog: &'a Catalog,
    symbols: &'a SymbolTable,
}

impl<'a> FunctionReferenceResolver<'a> {
    pub fn new(catalog: &'a Catalog, symbols: &'a SymbolTable) -> Self {
        Self { catalog, symbols }
    }

    /// Resolve `lhs::rhs` against the functional interface `target`.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn resolve(
        &self,
        target: ScriptType,
        lhs: &str,
        rhs: &str,
        captures: &[ScriptType],
        span: Span,
    ) -> Result<FunctionReferenceBinding, CompilationError> {
        let syntax = format!("{lhs}::{rhs}");
        let target_name = self.catalog.type_name(target);
        let Some((interface, interface_method)) = target
            .struct_hash()
            .and_then(|hash| self.catalog.functional_method(hash).map(|m| (hash, m.clone())))
        else {
            return Err(CompilationError::NotFunctional {
                syntax,
                target: target_name,
                span,
            });
        };

        let arity = interface_method.arity();
        let fail = |reason: String| CompilationError::FunctionReference {
            syntax: syntax.clone(),
            target: target_name.clone(),
            method: interface_method.name.clone(),
            arity,
            reason: Some(reason),
            span,
        };

        let resolved = if lhs == THIS_REFERENCE {
            let total = arity + captures.len();
            let function = self
                .symbols
                .get(rhs, total)
                .ok_or_else(|| fail(format!("no script function [{rhs}/{total}]")))?;
            let params = function.params.clone();
            let returns = function.return_type;
            (
                None,
                false,
                InvocationKind::Local,
                Delegate::Local(function.clone()),
                params,
                returns,
            )
        } else {
            let owner = self.owner(lhs, span)?;
            let owner_type = self
                .catalog
                .lookup_struct(owner)
                .ok_or_else(|| fail(format!("[{lhs}] is not a whitelisted type")))?;
            let is_interface = owner_type.is_interface();

            if rhs == CONSTRUCTOR_REFERENCE {
                let ctor_arity = arity.checked_sub(captures.len()).ok_or_else(|| {
                    fail(format!("{} captures exceed the method arity", captures.len()))
                })?;
                if !captures.is_empty() {
                    return Err(fail(format!(
                        "constructor [<init>/{ctor_arity}] cannot receive {} captured value(s)",
                        captures.len()
                    )));
                }
                let constructor = resolve_constructor(self.catalog, owner, ctor_arity, span)
                    .map_err(|e| fail(e.to_string()))?;
                let params = constructor.params.clone();
                (
                    Some(owner),
                    is_interface,
                    InvocationKind::Construct,
                    Delegate::Constructor(constructor),
                    params,
                    ScriptType::Struct(owner),
                )
            } else {
                let total = arity + captures.len();
                if let Some(method) = owner_type.static_method(rhs, total) {
                    let params = method.params.clone();
                    let returns = method.return_type;
                    (
                        Some(owner),
                        is_interface,
                        InvocationKind::Static,
                        Delegate::Method(method.clone()),
                        params,
                        returns,
                    )
                } else if let Some(method) =
                    total.checked_sub(1).and_then(|n| owner_type.method(rhs, n))
                {
                    let mut params = Vec::with_capacity(total);
                    params.push(ScriptType::Struct(owner));
                    params.extend_from_slice(&method.params);
                    let kind = if is_interface {
                        InvocationKind::Interface
                    } else {
                        InvocationKind::Virtual
                    };
                    let returns = method.return_type;
                    (
                        Some(owner),
                        is_interface,
                        kind,
                        Delegate::Method(method.clone()),
                        params,
                        returns,
                    )
                } else {
                    return Err(fail(format!(
                        "no static [{rhs}/{total}] or instance [{rhs}/{}] on [{}]",
                        total.saturating_sub(1),
                        owner_type.name
                    )));
                }
            }
        };
        let (declaring_type, is_interface, kind, delegate, params, returns) = resolved;

        let inputs: Vec<ScriptType> = captures
            .iter()
            .chain(&interface_method.params)
            .copied()
            .collect();
        let arg_casts = inputs
            .iter()
            .zip(&params)
            .enumerate()
            .map(|(index, (&from, &to))| {
                resolve_cast(self.catalog, from, to, true, span).map_err(|_| {
                    fail(format!(
                        "argument {index}: cannot convert [{}] to [{}]",
                        self.catalog.type_name(from),
                        self.catalog.type_name(to)
                    ))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let return_cast = if interface_method.return_type.is_void() {
            None
        } else if returns.is_void() {
            return Err(fail("delegate returns void".to_string()));
        } else {
            let expected = interface_method.return_type;
            let cast = resolve_cast(self.catalog, returns, expected, true, span).map_err(|_| {
                fail(format!(
                    "cannot convert result [{}] to [{}]",
                    self.catalog.type_name(returns),
                    self.catalog.type_name(expected)
                ))
            })?;
            Some(cast)
        };

        Ok(FunctionReferenceBinding {
            syntax,
            interface,
            interface_method,
            declaring_type,
            is_interface,
            kind,
            delegate,
            captures: captures.len(),
            arg_casts,
            return_cast,
        })
    }

    /// The struct a reference's left-hand side names; primitives name their box.
    fn owner(&self, lhs: &str, span: Span) -> Result<TypeHash, CompilationError> {
        match self.catalog.resolve_script_type(lhs, span)? {
            ScriptType::Struct(hash) => Ok(hash),
            ScriptType::Primitive(kind) => Ok(kind.boxed_hash()),
            other => Err(CompilationError::UnknownType {
                name: other.to_string(),
                span,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sandscript_catalog::{
        CatalogBuilder, Whitelist, WhitelistClass, WhitelistConstructor, WhitelistMethod,
    };
    use sandscript_core::NativeFn;

    fn catalog() -> Catalog {
        let mut util = WhitelistClass::new("util.Pair")
            .constructor(WhitelistConstructor::new(["def", "def"]))
            .method(WhitelistMethod::static_method("combine", ["def", "def"], "String"))
            .method(WhitelistMethod::new("combine", ["def"], "String"))
            .method(WhitelistMethod::new("first", Vec::<String>::new(), "def"));
        assert!(util.bind_method(
            "combine",
            2,
            NativeFn::new(|args: &[Value]| {
                Ok(Value::string(format!("static:{}+{}", args[0], args[1])))
            }),
        ));
        CatalogBuilder::new()
            .whitelist(Whitelist::new("test.util").class(util))
            .build()
            .unwrap()
    }

    fn ty(catalog: &Catalog, name: &str) -> ScriptType {
        catalog.resolve_script_type(name, Span::default()).unwrap()
    }

    #[test]
    fn static_method_wins_over_instance() {
        let catalog = catalog();
        let symbols = SymbolTable::new();
        let resolver = FunctionReferenceResolver::new(&catalog, &symbols);
        let binding = resolver
            .resolve(ty(&catalog, "BiFunction"), "Pair", "combine", &[], Span::default())
            .unwrap();
        assert_eq!(binding.kind, InvocationKind::Static);
        assert_eq!(binding.captures, 0);
        assert_eq!(binding.delegate_arity(), 2);
        let result = binding
            .invoke(&catalog, &[], &[Value::Int(1), Value::Int(2)], |_, _| unreachable!())
            .unwrap();
        assert_eq!(result, Value::string("static:1+2"));
    }

    #[test]
    fn instance_method_with_receiver_argument() {
        let catalog = catalog();
        let symbols = SymbolTable::new();
        let resolver = FunctionReferenceResolver::new(&catalog, &symbols);
        let binding = resolver
            .resolve(ty(&catalog, "Function"), "String", "length", &[], Span::default())
            .unwrap();
        assert_eq!(binding.kind, InvocationKind::Virtual);
        assert_eq!(binding.declaring_type, catalog.lookup_struct_by_name("String").map(|s| s.hash));
        let result = binding
            .invoke(&catalog, &[], &[Value::string("four")], |_, _| unreachable!())
            .unwrap();
        assert_eq!(result, Value::Int(4));
        assert!(binding.invoke(&catalog, &[], &[Value::Int(3)], |_, _| unreachable!()).is_err());
    }

    #[test]
    fn captured_receiver() {
        let catalog = catalog();
        let symbols = SymbolTable::new();
        let resolver = FunctionReferenceResolver::new(&catalog, &symbols);
        let string = ty(&catalog, "String");
        let binding = resolver
            .resolve(ty(&catalog, "Predicate"), "String", "startsWith", &[string], Span::default())
            .unwrap();
        assert_eq!(binding.kind, InvocationKind::Virtual);
        assert_eq!(binding.captures, 1);
        let captured = [Value::string("prefix")];
        let result = binding
            .invoke(&catalog, &captured, &[Value::string("pre")], |_, _| unreachable!())
            .unwrap();
        assert_eq!(result, Value::Bool(true));
    }

    #[test]
    fn constructor_reference() {
        let catalog = catalog();
        let symbols = SymbolTable::new();
        let resolver = FunctionReferenceResolver::new(&catalog, &symbols);
        let binding = resolver
            .resolve(ty(&catalog, "BiFunction"), "Pair", "new", &[], Span::default())
            .unwrap();
        assert_eq!(binding.kind, InvocationKind::Construct);
        assert_eq!(binding.delegate_arity(), 2);
        assert_eq!(binding.declaring_type, catalog.lookup_struct_by_name("Pair").map(|s| s.hash));

        let err = resolver
            .resolve(ty(&catalog, "Function"), "Pair", "new", &[], Span::default())
            .unwrap_err();
        assert!(err.to_string().contains("<init>/1"), "{err}");
        let err = resolver
            .resolve(ty(&catalog, "BiFunction"), "Pair", "new", &[ScriptType::INT], Span::default())
            .unwrap_err();
        assert!(matches!(err, CompilationError::FunctionReference { .. }));
    }

    #[test]
    fn local_function_reference() {
        let catalog = catalog();
        let mut symbols = SymbolTable::new();
        symbols
            .add_function(
                LocalFunction::new("twice", vec![ScriptType::INT], ScriptType::INT),
                Span::default(),
            )
            .unwrap();
        let resolver = FunctionReferenceResolver::new(&catalog, &symbols);
        let binding = resolver
            .resolve(ty(&catalog, "Function"), "this", "twice", &[], Span::default())
            .unwrap();
        assert_eq!(binding.kind, InvocationKind::Local);
        assert_eq!(binding.declaring_type, None);
        let result = binding
            .invoke(&catalog, &[], &[Value::Int(21)], |name, args| {
                assert_eq!(name, "twice");
                Ok(Value::Int(args[0].as_i64()? as i32 * 2))
            })
            .unwrap();
        assert_eq!(result, Value::Int(42));
    }

    #[test]
    fn combined_diagnosis_names_the_syntax() {
        let catalog = catalog();
        let symbols = SymbolTable::new();
        let resolver = FunctionReferenceResolver::new(&catalog, &symbols);
        let err = resolver
            .resolve(ty(&catalog, "Function"), "Pair", "missing", &[], Span::default())
            .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("Pair::missing"), "{message}");
        assert!(message.contains("no static [missing/1] or instance [missing/0]"), "{message}");
    }

    #[test]
    fn non_functional_target() {
        let catalog = catalog();
        let symbols = SymbolTable::new();
        let resolver = FunctionReferenceResolver::new(&catalog, &symbols);
        let err = resolver
            .resolve(ty(&catalog, "String"), "String", "length", &[], Span::default())
            .unwrap_err();
        assert!(matches!(err, CompilationError::NotFunctional { .. }));
        let err = resolver
            .resolve(ScriptType::Dynamic, "String", "length", &[], Span::default())
            .unwrap_err();
        assert!(matches!(err, CompilationError::NotFunctional { .. }));
    }
}

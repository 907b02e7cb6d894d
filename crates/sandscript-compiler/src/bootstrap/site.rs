//! Linked dynamic call sites.

use std::fmt;
use std::sync::Arc;

use sandscript_catalog::{Catalog, FieldDescriptor, MethodDescriptor};
use sandscript_core::{CompilationError, ScriptFault, ScriptType, TypeHash, Value};

use super::{DispatchFlavor, InlineCache};
use crate::cast::CastDescriptor;
use crate::ops::{self, BinaryOp, CompareOp, UnaryOp};
use crate::symbols::SymbolTable;

/// The operation a site performs, parsed once at link time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Member,
    Unary(UnaryOp),
    Binary(BinaryOp),
    Compare(CompareOp),
}

/// What a receiver type resolved to.
#[derive(Debug, Clone)]
pub enum Target {
    Method(Arc<MethodDescriptor>),
    Getter(Arc<MethodDescriptor>),
    Setter(Arc<MethodDescriptor>),
    FieldGet(Arc<FieldDescriptor>),
    FieldSet(Arc<FieldDescriptor>),
    /// Arithmetic or comparison on the unboxed operands.
    Operator(Operation),
}

/// One dynamic call site with its inline cache.
pub struct CallSite {
    lookup: String,
    name: String,
    flavor: DispatchFlavor,
    operation: Operation,
    initial_depth: u32,
    cache: InlineCache<Target>,
}

impl fmt::Debug for CallSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallSite")
            .field("lookup", &self.lookup)
            .field("name", &self.name)
            .field("flavor", &self.flavor)
            .field("observed", &self.cache.observed())
            .finish_non_exhaustive()
    }
}

impl CallSite {
    /// Link a call site from the constant part of the bootstrap arguments.
    ///
    /// `max_depth` bounds the types cached before the site turns megamorphic;
    /// `initial_depth` of them are considered already spent.
    pub fn link(
        lookup: impl Into<String>,
        name: impl Into<String>,
        initial_depth: u32,
        flavor: u8,
        max_depth: usize,
    ) -> Result<Self, CompilationError> {
        let name = name.into();
        let flavor = DispatchFlavor::try_from(flavor).map_err(|_| CompilationError::Internal {
            message: format!("unknown dispatch flavor {flavor} for [{name}]"),
        })?;
        let operation = match flavor {
            DispatchFlavor::UnaryOperator => UnaryOp::from_name(&name).map(Operation::Unary),
            DispatchFlavor::BinaryOperator | DispatchFlavor::ShiftOperator => {
                BinaryOp::from_name(&name).map(Operation::Binary)
            }
            DispatchFlavor::Compare => CompareOp::from_name(&name).map(Operation::Compare),
            _ => Some(Operation::Member),
        }
        .ok_or_else(|| CompilationError::Internal {
            message: format!("unknown dynamic operator [{name}]"),
        })?;

        Ok(Self {
            lookup: lookup.into(),
            name,
            flavor,
            operation,
            initial_depth,
            cache: InlineCache::new(max_depth.saturating_sub(initial_depth as usize)),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn flavor(&self) -> DispatchFlavor {
        self.flavor
    }

    pub fn initial_depth(&self) -> u32 {
        self.initial_depth
    }

    /// Distinct receiver types seen so far.
    pub fn observed(&self) -> usize {
        self.cache.observed()
    }

    pub fn is_megamorphic(&self) -> bool {
        self.cache.is_megamorphic()
    }

    /// Dispatch one invocation. `args[0]` is the receiver (or left operand).
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn invoke(
        &self,
        catalog: &Catalog,
        symbols: &SymbolTable,
        args: &[Value],
    ) -> Result<Value, ScriptFault> {
        let receiver = args.first().ok_or_else(|| {
            ScriptFault::unrecoverable(format!(
                "dynamic [{}] invoked without a receiver",
                self.name
            ))
        })?;

        let Some(receiver_type) = receiver.runtime_type() else {
            if self.flavor.is_member() {
                return Err(ScriptFault::null_pointer(format!(
                    "cannot access [{}] on a null def reference",
                    self.name
                )));
            }
            return self.apply(catalog, &Target::Operator(self.operation), args);
        };

        let target = match self.cache.get(receiver_type) {
            Some(target) => target,
            None => {
                let target = self.resolve(catalog, symbols, receiver_type, args.len() - 1)?;
                self.cache.insert(receiver_type, target.clone());
                target
            }
        };
        self.apply(catalog, &target, args)
    }

    fn resolve(
        &self,
        catalog: &Catalog,
        symbols: &SymbolTable,
        receiver: TypeHash,
        arity: usize,
    ) -> Result<Target, ScriptFault> {
        let structure = catalog.lookup_struct(receiver).ok_or_else(|| {
            ScriptFault::illegal_argument(format!("type {receiver} is not whitelisted"))
        })?;
        let missing = |what: &str| {
            let mut message = format!(
                "unable to find dynamic {what} [{}] with [{arity}] arguments for class [{}]",
                self.name, structure.name
            );
            if self.flavor == DispatchFlavor::MethodCall && symbols.contains_name(&self.name) {
                message.push_str("; script functions cannot be called on a def receiver");
            }
            ScriptFault::illegal_argument(message)
        };

        match self.flavor {
            DispatchFlavor::MethodCall => structure
                .method(&self.name, arity)
                .cloned()
                .map(Target::Method)
                .ok_or_else(|| missing("method")),
            DispatchFlavor::Load => structure
                .getters
                .get(&self.name)
                .cloned()
                .map(Target::Getter)
                .or_else(|| structure.field(&self.name, false).cloned().map(Target::FieldGet))
                .ok_or_else(|| missing("field")),
            DispatchFlavor::Store => structure
                .setters
                .get(&self.name)
                .cloned()
                .map(Target::Setter)
                .or_else(|| structure.field(&self.name, false).cloned().map(Target::FieldSet))
                .ok_or_else(|| missing("field")),
            DispatchFlavor::IndexLoad => structure
                .method("get", 1)
                .cloned()
                .map(Target::Method)
                .ok_or_else(|| missing("index get")),
            DispatchFlavor::IndexStore => structure
                .method("set", 2)
                .or_else(|| structure.method("put", 2))
                .cloned()
                .map(Target::Method)
                .ok_or_else(|| missing("index set")),
            DispatchFlavor::Iterate => structure
                .method("iterator", 0)
                .cloned()
                .map(Target::Method)
                .ok_or_else(|| missing("iterator")),
            _ => Ok(Target::Operator(self.operation)),
        }
    }

    fn apply(
        &self,
        catalog: &Catalog,
        target: &Target,
        args: &[Value],
    ) -> Result<Value, ScriptFault> {
        match target {
            Target::Method(method) | Target::Setter(method) => {
                let mut call = Vec::with_capacity(args.len());
                call.push(args[0].clone());
                for (value, &param) in args[1..].iter().zip(&method.params) {
                    call.push(coerce(catalog, value.clone(), param)?);
                }
                let result = method.invoke(&call)?;
                match target {
                    // Assignment yields the stored value.
                    Target::Setter(_) => Ok(call.pop().unwrap_or(Value::Null)),
                    _ => Ok(result),
                }
            }
            Target::Getter(getter) => getter.invoke(&args[..1]),
            Target::FieldGet(field) => field.read(Some(&args[0])),
            Target::FieldSet(field) => {
                let value = coerce(catalog, operand(args, 1)?.clone(), field.ty)?;
                field.write(Some(&args[0]), value.clone())?;
                Ok(value)
            }
            Target::Operator(Operation::Unary(op)) => ops::unary(*op, &args[0]),
            Target::Operator(Operation::Binary(op)) => {
                ops::binary(*op, &args[0], operand(args, 1)?)
            }
            Target::Operator(Operation::Compare(op)) => {
                ops::compare(*op, &args[0], operand(args, 1)?)
            }
            Target::Operator(Operation::Member) => Err(ScriptFault::unrecoverable(format!(
                "member site [{}] resolved to an operator",
                self.name
            ))),
        }
    }
}

fn operand(args: &[Value], index: usize) -> Result<&Value, ScriptFault> {
    sandscript_core::arg(args, index)
}

fn coerce(catalog: &Catalog, value: Value, to: ScriptType) -> Result<Value, ScriptFault> {
    if to.is_dynamic() {
        return Ok(value);
    }
    CastDescriptor::runtime_check(to).apply(catalog, value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sandscript_catalog::CatalogBuilder;

    fn catalog() -> Catalog {
        CatalogBuilder::new().build().unwrap()
    }

    fn site(name: &str, flavor: DispatchFlavor) -> CallSite {
        CallSite::link("Test", name, 0, flavor.into(), 2).unwrap()
    }

    #[test]
    fn monomorphic_method_call() {
        let catalog = catalog();
        let symbols = SymbolTable::new();
        let length = site("length", DispatchFlavor::MethodCall);
        for text in ["a", "bb", "ccc"] {
            let result = length.invoke(&catalog, &symbols, &[Value::string(text)]).unwrap();
            assert_eq!(result, Value::Int(text.len() as i32));
        }
        assert_eq!(length.observed(), 1);
        assert!(!length.is_megamorphic());
    }

    #[test]
    fn turns_megamorphic_and_keeps_dispatching() {
        let catalog = catalog();
        let symbols = SymbolTable::new();
        let to_string = site("toString", DispatchFlavor::MethodCall);
        let receivers = [Value::Int(1), Value::string("s"), Value::Bool(true), Value::Double(0.5)];
        for receiver in &receivers {
            let result = to_string
                .invoke(&catalog, &symbols, std::slice::from_ref(receiver))
                .unwrap();
            assert_eq!(result, Value::string(receiver.to_string()));
        }
        assert!(to_string.is_megamorphic());
        assert_eq!(to_string.observed(), 4);
        // Cached and fallback entries both still answer.
        let again = to_string.invoke(&catalog, &symbols, &[Value::Double(0.5)]).unwrap();
        assert_eq!(again, Value::string("0.5"));
    }

    #[test]
    fn arguments_are_unboxed_into_parameter_slots() {
        let catalog = catalog();
        let symbols = SymbolTable::new();
        let substring = site("substring", DispatchFlavor::MethodCall);
        let result = substring
            .invoke(&catalog, &symbols, &[Value::string("hello"), Value::Short(1)])
            .unwrap();
        assert_eq!(result, Value::string("ello"));
        let err = substring
            .invoke(&catalog, &symbols, &[Value::string("hello"), Value::Double(1.0)])
            .unwrap_err();
        assert!(matches!(err, ScriptFault::Runtime { .. }));
    }

    #[test]
    fn null_receiver_and_missing_member() {
        let catalog = catalog();
        let mut symbols = SymbolTable::new();
        symbols
            .add_function(
                crate::symbols::LocalFunction::new("helper", vec![], ScriptType::INT),
                sandscript_core::Span::default(),
            )
            .unwrap();
        let helper = site("helper", DispatchFlavor::MethodCall);
        let err = helper.invoke(&catalog, &symbols, &[Value::Null]).unwrap_err();
        assert!(err.to_string().contains("null"));
        let err = helper.invoke(&catalog, &symbols, &[Value::Int(1)]).unwrap_err();
        assert!(err.to_string().contains("script functions"));
    }

    #[test]
    fn property_load_uses_getter() {
        let catalog = catalog();
        let symbols = SymbolTable::new();
        let empty = site("empty", DispatchFlavor::Load);
        assert_eq!(
            empty.invoke(&catalog, &symbols, &[Value::string("")]).unwrap(),
            Value::Bool(true)
        );
    }

    #[test]
    fn operators() {
        let catalog = catalog();
        let symbols = SymbolTable::new();
        let add = site("add", DispatchFlavor::BinaryOperator);
        assert_eq!(
            add.invoke(&catalog, &symbols, &[Value::Int(2), Value::Long(3)]).unwrap(),
            Value::Long(5)
        );
        let eq = site("eq", DispatchFlavor::Compare);
        assert_eq!(
            eq.invoke(&catalog, &symbols, &[Value::Null, Value::Null]).unwrap(),
            Value::Bool(true)
        );
        let flavor: u8 = DispatchFlavor::BinaryOperator.into();
        assert!(CallSite::link("Test", "pow", 0, flavor, 2).is_err());
        assert!(CallSite::link("Test", "x", 0, 200, 2).is_err());
    }
}

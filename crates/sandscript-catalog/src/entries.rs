//! Frozen catalog entries.
//!
//! Every member descriptor is shared through an `Arc`: inherited members are
//! copied down by handle, so a method declared once on an ancestor is the same
//! descriptor in every descendant that inherits it.

use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use sandscript_core::{NativeFn, ScriptFault, ScriptType, TypeHash, Value};

use crate::TypeKind;

// ============================================================================
// Members
// ============================================================================

/// Overload key of a method: name and arity. Parameter types never take part.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MethodKey {
    pub name: String,
    pub arity: usize,
}

impl MethodKey {
    pub fn new(name: impl Into<String>, arity: usize) -> Self {
        Self {
            name: name.into(),
            arity,
        }
    }
}

impl fmt::Display for MethodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.name, self.arity)
    }
}

/// A whitelisted method.
#[derive(Debug, Clone)]
pub struct MethodDescriptor {
    /// Identity of this overload on its declaring type.
    pub hash: TypeHash,
    pub name: String,
    /// Declaring type.
    pub owner: TypeHash,
    /// Type whose static function implements this method, receiving the
    /// receiver as its first argument.
    pub augmentation: Option<TypeHash>,
    pub params: Vec<ScriptType>,
    pub return_type: ScriptType,
    pub is_static: bool,
    /// Interface method without an implementation.
    pub is_abstract: bool,
    /// Interface method with a default implementation.
    pub is_default: bool,
    pub native: Option<NativeFn>,
}

impl MethodDescriptor {
    pub fn arity(&self) -> usize {
        self.params.len()
    }

    pub fn key(&self) -> MethodKey {
        MethodKey::new(self.name.clone(), self.arity())
    }

    /// Same parameter and return types.
    pub fn same_signature(&self, other: &MethodDescriptor) -> bool {
        self.params == other.params && self.return_type == other.return_type
    }

    /// Call the native implementation. Instance methods expect the receiver in
    /// `args[0]`.
    pub fn invoke(&self, args: &[Value]) -> Result<Value, ScriptFault> {
        match &self.native {
            Some(native) => native.call(args),
            None => Err(ScriptFault::unrecoverable(format!(
                "method [{}/{}] has no native implementation",
                self.name,
                self.arity()
            ))),
        }
    }
}

/// A whitelisted constructor.
#[derive(Debug, Clone)]
pub struct ConstructorDescriptor {
    pub hash: TypeHash,
    pub owner: TypeHash,
    pub params: Vec<ScriptType>,
    pub native: Option<NativeFn>,
}

impl ConstructorDescriptor {
    pub fn arity(&self) -> usize {
        self.params.len()
    }

    pub fn same_signature(&self, other: &ConstructorDescriptor) -> bool {
        self.params == other.params
    }

    pub fn invoke(&self, args: &[Value]) -> Result<Value, ScriptFault> {
        match &self.native {
            Some(native) => native.call(args),
            None => Err(ScriptFault::unrecoverable(format!(
                "constructor <init>/{} has no native implementation",
                self.arity()
            ))),
        }
    }
}

/// A whitelisted field.
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    pub hash: TypeHash,
    pub name: String,
    pub owner: TypeHash,
    pub ty: ScriptType,
    pub is_static: bool,
    pub is_final: bool,
    /// Reads the field; instance fields receive the receiver as `args[0]`.
    pub getter: Option<NativeFn>,
    /// Writes the field; the new value is the last argument.
    pub setter: Option<NativeFn>,
}

impl FieldDescriptor {
    pub fn same_signature(&self, other: &FieldDescriptor) -> bool {
        self.ty == other.ty && self.is_static == other.is_static && self.is_final == other.is_final
    }

    pub fn read(&self, receiver: Option<&Value>) -> Result<Value, ScriptFault> {
        let getter = self.getter.as_ref().ok_or_else(|| {
            ScriptFault::unrecoverable(format!("field [{}] is not readable", self.name))
        })?;
        match receiver {
            Some(receiver) => getter.call(std::slice::from_ref(receiver)),
            None => getter.call(&[]),
        }
    }

    pub fn write(&self, receiver: Option<&Value>, value: Value) -> Result<(), ScriptFault> {
        if self.is_final {
            return Err(ScriptFault::unrecoverable(format!(
                "field [{}] is final",
                self.name
            )));
        }
        let setter = self.setter.as_ref().ok_or_else(|| {
            ScriptFault::unrecoverable(format!("field [{}] is not writable", self.name))
        })?;
        match receiver {
            Some(receiver) => setter.call(&[receiver.clone(), value]),
            None => setter.call(&[value]),
        }
        .map(|_| ())
    }
}

// ============================================================================
// Method Table
// ============================================================================

/// Methods of one type, keyed by `(name, arity)`.
///
/// Lookups borrow the name, so resolving a call never allocates.
#[derive(Debug, Clone, Default)]
pub struct MethodTable {
    by_name: FxHashMap<String, Vec<Arc<MethodDescriptor>>>,
}

impl MethodTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str, arity: usize) -> Option<&Arc<MethodDescriptor>> {
        self.by_name
            .get(name)?
            .iter()
            .find(|m| m.arity() == arity)
    }

    pub fn contains(&self, name: &str, arity: usize) -> bool {
        self.get(name, arity).is_some()
    }

    /// Insert `method`, or hand back the descriptor already occupying its key.
    pub fn insert(
        &mut self,
        method: Arc<MethodDescriptor>,
    ) -> Result<(), Arc<MethodDescriptor>> {
        let overloads = self.by_name.entry(method.name.clone()).or_default();
        if let Some(existing) = overloads.iter().find(|m| m.arity() == method.arity()) {
            return Err(Arc::clone(existing));
        }
        overloads.push(method);
        overloads.sort_by_key(|m| m.arity());
        Ok(())
    }

    /// Insert `method`, replacing any descriptor with the same key.
    pub fn replace(&mut self, method: Arc<MethodDescriptor>) {
        let overloads = self.by_name.entry(method.name.clone()).or_default();
        overloads.retain(|m| m.arity() != method.arity());
        overloads.push(method);
        overloads.sort_by_key(|m| m.arity());
    }

    /// All overloads of `name`, ordered by arity.
    pub fn overloads(&self, name: &str) -> &[Arc<MethodDescriptor>] {
        self.by_name.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<MethodDescriptor>> {
        self.by_name.values().flatten()
    }

    pub fn len(&self) -> usize {
        self.by_name.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

// ============================================================================
// Struct Type
// ============================================================================

/// One host type as seen by scripts.
#[derive(Debug, Clone)]
pub struct StructType {
    /// Canonical script name.
    pub name: String,
    /// Full host name.
    pub host_name: String,
    pub hash: TypeHash,
    pub kind: TypeKind,
    /// Whether the whitelist required this type to be functional.
    pub marked_functional: bool,
    pub superclass: Option<TypeHash>,
    /// Directly implemented (or extended, for interfaces) interfaces.
    pub interfaces: Vec<TypeHash>,
    /// Superclass chain nearest-first, then reachable interfaces in worklist order.
    pub ancestry: Vec<TypeHash>,
    pub constructors: FxHashMap<usize, Arc<ConstructorDescriptor>>,
    pub methods: MethodTable,
    pub static_methods: MethodTable,
    pub fields: FxHashMap<String, Arc<FieldDescriptor>>,
    pub static_fields: FxHashMap<String, Arc<FieldDescriptor>>,
    /// Property name to zero-arity getter.
    pub getters: FxHashMap<String, Arc<MethodDescriptor>>,
    /// Property name to single-argument setter.
    pub setters: FxHashMap<String, Arc<MethodDescriptor>>,
    /// The single abstract method making this type a lambda target.
    pub functional_method: Option<Arc<MethodDescriptor>>,
}

impl StructType {
    pub(crate) fn new(name: String, host_name: String, kind: TypeKind) -> Self {
        Self {
            hash: TypeHash::from_name(&host_name),
            name,
            host_name,
            kind,
            marked_functional: false,
            superclass: None,
            interfaces: Vec::new(),
            ancestry: Vec::new(),
            constructors: FxHashMap::default(),
            methods: MethodTable::new(),
            static_methods: MethodTable::new(),
            fields: FxHashMap::default(),
            static_fields: FxHashMap::default(),
            getters: FxHashMap::default(),
            setters: FxHashMap::default(),
            functional_method: None,
        }
    }

    pub fn is_interface(&self) -> bool {
        self.kind == TypeKind::Interface
    }

    pub fn script_type(&self) -> ScriptType {
        ScriptType::Struct(self.hash)
    }

    /// Whether values of this type can be used where `other` is expected.
    pub fn is_subtype_of(&self, other: TypeHash) -> bool {
        self.hash == other || self.ancestry.contains(&other)
    }

    pub fn method(&self, name: &str, arity: usize) -> Option<&Arc<MethodDescriptor>> {
        self.methods.get(name, arity)
    }

    pub fn static_method(&self, name: &str, arity: usize) -> Option<&Arc<MethodDescriptor>> {
        self.static_methods.get(name, arity)
    }

    pub fn constructor(&self, arity: usize) -> Option<&Arc<ConstructorDescriptor>> {
        self.constructors.get(&arity)
    }

    pub fn field(&self, name: &str, is_static: bool) -> Option<&Arc<FieldDescriptor>> {
        if is_static {
            self.static_fields.get(name)
        } else {
            self.fields.get(name)
        }
    }

    /// `name/arity` of every overload of `name`, for diagnostics.
    pub fn candidates(&self, name: &str, is_static: bool) -> Vec<String> {
        let table = if is_static {
            &self.static_methods
        } else {
            &self.methods
        };
        table
            .overloads(name)
            .iter()
            .map(|m| format!("{}/{}", m.name, m.arity()))
            .collect()
    }

    /// `<init>/arity` of every constructor, for diagnostics.
    pub fn constructor_candidates(&self) -> Vec<String> {
        let mut arities: Vec<usize> = self.constructors.keys().copied().collect();
        arities.sort_unstable();
        arities.into_iter().map(|a| format!("<init>/{a}")).collect()
    }
}

// ============================================================================
// Build Diagnostics
// ============================================================================

/// An inherited member shadowed by an earlier declaration with a different signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InheritanceConflict {
    /// Type that inherits both declarations.
    pub type_name: String,
    /// `name/arity` for methods, `name` for fields.
    pub member: String,
    /// Owner of the declaration that was kept.
    pub kept: String,
    /// Owner of the declaration that was dropped.
    pub dropped: String,
}

impl fmt::Display for InheritanceConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: inherited [{}] from '{}' shadows incompatible declaration from '{}'",
            self.type_name, self.member, self.kept, self.dropped
        )
    }
}

/// Counters reported after a catalog build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildStats {
    pub whitelists: usize,
    pub structs: usize,
    /// Script names registered, including full-name aliases.
    pub names: usize,
    pub constructors: usize,
    pub methods: usize,
    pub fields: usize,
    /// Members copied down from ancestors.
    pub inherited: usize,
    pub functional: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn method(name: &str, params: Vec<ScriptType>, ret: ScriptType) -> Arc<MethodDescriptor> {
        let owner = TypeHash::from_name("T");
        Arc::new(MethodDescriptor {
            hash: TypeHash::from_method(owner, name, params.len()),
            name: name.to_string(),
            owner,
            augmentation: None,
            params,
            return_type: ret,
            is_static: false,
            is_abstract: false,
            is_default: false,
            native: None,
        })
    }

    #[test]
    fn method_table_keys_by_arity() {
        let mut table = MethodTable::new();
        table.insert(method("get", vec![ScriptType::INT], ScriptType::Dynamic)).unwrap();
        table.insert(method("get", vec![], ScriptType::Dynamic)).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.get("get", 1).unwrap().params, vec![ScriptType::INT]);
        assert!(table.get("get", 2).is_none());
        assert_eq!(table.overloads("get")[0].arity(), 0);

        let clash = table.insert(method("get", vec![ScriptType::LONG], ScriptType::Dynamic));
        assert!(clash.is_err());
    }

    #[test]
    fn same_signature_compares_types() {
        let a = method("f", vec![ScriptType::INT], ScriptType::Void);
        let b = method("f", vec![ScriptType::INT], ScriptType::Void);
        let c = method("f", vec![ScriptType::LONG], ScriptType::Void);
        assert!(a.same_signature(&b));
        assert!(!a.same_signature(&c));
    }

    #[test]
    fn invoke_without_native_is_unrecoverable() {
        let m = method("f", vec![], ScriptType::Void);
        assert!(matches!(
            m.invoke(&[]),
            Err(ScriptFault::Unrecoverable { .. })
        ));
    }

    #[test]
    fn final_field_rejects_writes() {
        let owner = TypeHash::from_name("T");
        let field = FieldDescriptor {
            hash: TypeHash::from_field(owner, "MAX"),
            name: "MAX".to_string(),
            owner,
            ty: ScriptType::INT,
            is_static: true,
            is_final: true,
            getter: Some(NativeFn::new(|_: &[Value]| Ok(Value::Int(7)))),
            setter: None,
        };
        assert_eq!(field.read(None).unwrap(), Value::Int(7));
        assert!(field.write(None, Value::Int(1)).is_err());
    }
}

//! The frozen type catalog.
//!
//! [`Catalog`] is the resolution authority and the security boundary: a script can
//! only name types registered here and only call members listed here. It is built
//! once by [`CatalogBuilder`](crate::CatalogBuilder) and never mutated afterwards, so
//! a single `Arc<Catalog>` is shared by every concurrent compilation without locking.

use std::sync::Arc;

use rustc_hash::FxHashMap;
use sandscript_core::{
    CompilationError, OBJECT_HOST_NAME, ScriptType, Span, TypeHash, WhitelistError,
};

use crate::{
    BuildStats, CatalogBuilder, ConstructorDescriptor, FieldDescriptor, InheritanceConflict,
    MethodDescriptor, StructType, Whitelist,
};

/// Read-only catalog of whitelisted host types.
#[derive(Debug)]
pub struct Catalog {
    pub(crate) structs: FxHashMap<TypeHash, StructType>,
    /// Script name (canonical or alias) to type.
    pub(crate) names: FxHashMap<String, TypeHash>,
    pub(crate) conflicts: Vec<InheritanceConflict>,
    pub(crate) stats: BuildStats,
}

impl Catalog {
    /// Build a catalog from the base whitelist plus `whitelists`.
    pub fn build(whitelists: impl IntoIterator<Item = Whitelist>) -> Result<Self, WhitelistError> {
        let mut builder = CatalogBuilder::new();
        for whitelist in whitelists {
            builder = builder.whitelist(whitelist);
        }
        builder.build()
    }

    /// Build and wrap for sharing.
    pub fn shared(
        whitelists: impl IntoIterator<Item = Whitelist>,
    ) -> Result<Arc<Self>, WhitelistError> {
        Self::build(whitelists).map(Arc::new)
    }

    // ==========================================================================
    // Types
    // ==========================================================================

    pub fn lookup_struct(&self, hash: TypeHash) -> Option<&StructType> {
        self.structs.get(&hash)
    }

    /// Look up a type by canonical script name or alias.
    pub fn lookup_struct_by_name(&self, name: &str) -> Option<&StructType> {
        self.names.get(name).and_then(|hash| self.structs.get(hash))
    }

    /// Resolve a type name written in a script.
    pub fn resolve_script_type(
        &self,
        name: &str,
        span: Span,
    ) -> Result<ScriptType, CompilationError> {
        if let Some(builtin) = ScriptType::builtin(name) {
            return Ok(builtin);
        }
        self.names
            .get(name)
            .map(|hash| ScriptType::Struct(*hash))
            .ok_or_else(|| CompilationError::UnknownType {
                name: name.to_string(),
                span,
            })
    }

    /// Canonical script name of `ty`, for diagnostics.
    pub fn type_name(&self, ty: ScriptType) -> String {
        match ty {
            ScriptType::Struct(hash) => self
                .structs
                .get(&hash)
                .map(|s| s.name.clone())
                .unwrap_or_else(|| format!("<unknown {hash}>")),
            other => other.to_string(),
        }
    }

    /// Identity of the top-level object type.
    pub fn object_type(&self) -> TypeHash {
        TypeHash::from_name(OBJECT_HOST_NAME)
    }

    /// Whether a value of type `from` may be used where `to` is expected
    /// without a runtime check.
    pub fn is_subtype(&self, from: TypeHash, to: TypeHash) -> bool {
        from == to
            || self
                .structs
                .get(&from)
                .is_some_and(|s| s.is_subtype_of(to))
    }

    pub fn structs(&self) -> impl Iterator<Item = &StructType> {
        self.structs.values()
    }

    // ==========================================================================
    // Members
    // ==========================================================================

    pub fn lookup_method(
        &self,
        owner: TypeHash,
        name: &str,
        arity: usize,
    ) -> Option<&Arc<MethodDescriptor>> {
        self.structs.get(&owner)?.method(name, arity)
    }

    pub fn lookup_static_method(
        &self,
        owner: TypeHash,
        name: &str,
        arity: usize,
    ) -> Option<&Arc<MethodDescriptor>> {
        self.structs.get(&owner)?.static_method(name, arity)
    }

    pub fn lookup_constructor(
        &self,
        owner: TypeHash,
        arity: usize,
    ) -> Option<&Arc<ConstructorDescriptor>> {
        self.structs.get(&owner)?.constructor(arity)
    }

    pub fn lookup_field(
        &self,
        owner: TypeHash,
        name: &str,
        is_static: bool,
    ) -> Option<&Arc<FieldDescriptor>> {
        self.structs.get(&owner)?.field(name, is_static)
    }

    pub fn lookup_getter(&self, owner: TypeHash, property: &str) -> Option<&Arc<MethodDescriptor>> {
        self.structs.get(&owner)?.getters.get(property)
    }

    pub fn lookup_setter(&self, owner: TypeHash, property: &str) -> Option<&Arc<MethodDescriptor>> {
        self.structs.get(&owner)?.setters.get(property)
    }

    /// The single abstract method of a functional interface.
    pub fn functional_method(&self, ty: TypeHash) -> Option<&Arc<MethodDescriptor>> {
        self.structs.get(&ty)?.functional_method.as_ref()
    }

    // ==========================================================================
    // Diagnostics
    // ==========================================================================

    /// Inherited declarations shadowed during copy-down.
    pub fn inheritance_conflicts(&self) -> &[InheritanceConflict] {
        &self.conflicts
    }

    pub fn stats(&self) -> BuildStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{WhitelistClass, WhitelistMethod};

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn catalog_is_shareable() {
        assert_send_sync::<Catalog>();
        assert_send_sync::<Arc<Catalog>>();
    }

    #[test]
    fn resolve_builtin_and_struct_names() {
        let catalog = Catalog::build([Whitelist::new("test")
            .class(WhitelistClass::new("util.Counter").method(WhitelistMethod::new(
                "count",
                Vec::<String>::new(),
                "int",
            )))])
        .unwrap();

        assert_eq!(
            catalog.resolve_script_type("def", Span::default()).unwrap(),
            ScriptType::Dynamic
        );
        let counter = catalog.resolve_script_type("Counter", Span::default()).unwrap();
        let full = catalog.resolve_script_type("util.Counter", Span::default()).unwrap();
        assert_eq!(counter, full);
        assert_eq!(catalog.type_name(counter), "Counter");

        let err = catalog
            .resolve_script_type("Missing", Span::at(4))
            .unwrap_err();
        assert!(matches!(err, CompilationError::UnknownType { ref name, .. } if name == "Missing"));
    }

    #[test]
    fn member_lookups() {
        let catalog = Catalog::build([Whitelist::new("test").class(
            WhitelistClass::new("util.Box")
                .method(WhitelistMethod::new("get", Vec::<String>::new(), "def"))
                .method(WhitelistMethod::static_method("of", ["def"], "util.Box")),
        )])
        .unwrap();
        let hash = TypeHash::from_name("util.Box");
        assert!(catalog.lookup_method(hash, "get", 0).is_some());
        assert!(catalog.lookup_method(hash, "of", 1).is_none());
        assert!(catalog.lookup_static_method(hash, "of", 1).is_some());
        assert!(catalog.lookup_getter(hash, "get").is_none());
        assert!(catalog.is_subtype(hash, catalog.object_type()));
    }
}

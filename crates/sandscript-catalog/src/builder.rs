//! Catalog construction.
//!
//! [`CatalogBuilder`] turns whitelists into a frozen [`Catalog`] in four stages:
//!
//! 1. **Names**: register every host type under its script name(s), validating
//!    syntax, reserved names and uniqueness.
//! 2. **Members**: register constructors, methods and fields, resolving every
//!    referenced type against the names from stage 1.
//! 3. **Inheritance**: reject inheritance cycles, linearize each type's ancestry and
//!    copy inherited members down.
//! 4. **Derivation**: build property accessor maps and find functional methods.
//!
//! Every failure is a [`WhitelistError`] carrying the origin of the whitelist that
//! declared the offending type. The builder is single-threaded and consumed by
//! [`build`](CatalogBuilder::build).
//!
//! # Inherited member tie-break
//!
//! Members are copied down in linearized ancestry order: the type's own
//! declarations, then the superclass chain nearest-first, then interfaces in
//! worklist order. The first declaration of a key wins. A later declaration of the
//! same key with a different signature is recorded as an [`InheritanceConflict`].

use std::collections::VecDeque;
use std::sync::Arc;

use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use rustc_hash::{FxHashMap, FxHashSet};
use sandscript_core::{
    OBJECT_HOST_NAME, ScriptType, TypeHash, WhitelistError, WhitelistErrorKind,
};

use crate::base::base_whitelist;
use crate::{
    BuildStats, Catalog, ConstructorDescriptor, FieldDescriptor, InheritanceConflict,
    MethodDescriptor, MethodTable, StructType, TypeKind, Whitelist, WhitelistClass,
};

/// Builds a [`Catalog`] from whitelists.
pub struct CatalogBuilder {
    whitelists: Vec<Whitelist>,
}

impl Default for CatalogBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CatalogBuilder {
    /// A builder seeded with the base whitelist.
    pub fn new() -> Self {
        Self {
            whitelists: vec![base_whitelist()],
        }
    }

    /// A builder without the base whitelist.
    pub fn bare() -> Self {
        Self {
            whitelists: Vec::new(),
        }
    }

    pub fn whitelist(mut self, whitelist: Whitelist) -> Self {
        self.whitelists.push(whitelist);
        self
    }

    /// Run every stage and freeze the result.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn build(self) -> Result<Catalog, WhitelistError> {
        let mut state = BuildState::default();
        state.stats.whitelists = self.whitelists.len();

        for whitelist in &self.whitelists {
            for class in &whitelist.classes {
                state.register_name(&whitelist.origin, class)?;
            }
        }
        for whitelist in &self.whitelists {
            for class in &whitelist.classes {
                state.register_members(&whitelist.origin, class)?;
            }
        }
        state.resolve_inheritance()?;
        state.derive()?;
        Ok(state.freeze())
    }
}

// ============================================================================
// Build State
// ============================================================================

#[derive(Default)]
struct BuildState {
    structs: FxHashMap<TypeHash, StructType>,
    names: FxHashMap<String, TypeHash>,
    /// Origin of the whitelist that first declared each type.
    origins: FxHashMap<TypeHash, String>,
    /// Registration order, for deterministic traversal.
    order: Vec<TypeHash>,
    conflicts: Vec<InheritanceConflict>,
    stats: BuildStats,
}

/// Whether `name` is a dot-separated sequence of identifiers.
pub fn is_valid_type_name(name: &str) -> bool {
    !name.is_empty()
        && name.split('.').all(|segment| {
            let mut chars = segment.chars();
            matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        })
}

fn short_name(name: &str) -> &str {
    name.rsplit('.').next().unwrap_or(name)
}

impl BuildState {
    fn error(&self, origin: &str, kind: WhitelistErrorKind) -> WhitelistError {
        WhitelistError::new(origin, kind)
    }

    fn origin_of(&self, hash: TypeHash) -> &str {
        self.origins.get(&hash).map(String::as_str).unwrap_or("<unknown>")
    }

    fn name_of(&self, hash: TypeHash) -> String {
        self.structs
            .get(&hash)
            .map(|s| s.name.clone())
            .unwrap_or_else(|| hash.to_string())
    }

    // ==========================================================================
    // Stage 1: Names
    // ==========================================================================

    fn register_name(
        &mut self,
        origin: &str,
        class: &WhitelistClass,
    ) -> Result<(), WhitelistError> {
        let host_name = class.name.as_str();
        if !is_valid_type_name(host_name) {
            return Err(self.error(origin, WhitelistErrorKind::InvalidName(host_name.to_string())));
        }
        let canonical = if class.no_import { host_name } else { short_name(host_name) };
        let mut aliases = vec![canonical];
        if canonical != host_name {
            aliases.push(host_name);
        }
        if let Some(reserved) = aliases.iter().find(|alias| ScriptType::is_reserved_name(alias)) {
            return Err(self.error(origin, WhitelistErrorKind::ReservedName(reserved.to_string())));
        }

        let hash = TypeHash::from_name(host_name);
        if let Some(existing) = self.structs.get_mut(&hash) {
            // The same host type may be extended by several whitelists.
            if existing.kind != class.kind {
                return Err(WhitelistError::new(
                    origin,
                    WhitelistErrorKind::Malformed(format!(
                        "type '{host_name}' redeclared with a different kind"
                    )),
                ));
            }
            existing.marked_functional |= class.functional;
            return Ok(());
        }

        for alias in &aliases {
            if let Some(other) = self.names.get(*alias) {
                let existing = self
                    .structs
                    .get(other)
                    .map(|s| s.host_name.clone())
                    .unwrap_or_default();
                return Err(self.error(
                    origin,
                    WhitelistErrorKind::DuplicateScriptName {
                        name: alias.to_string(),
                        existing,
                        host: host_name.to_string(),
                    },
                ));
            }
        }
        for alias in aliases {
            self.names.insert(alias.to_string(), hash);
            self.stats.names += 1;
        }

        let mut entry = StructType::new(canonical.to_string(), host_name.to_string(), class.kind);
        entry.marked_functional = class.functional;
        self.structs.insert(hash, entry);
        self.origins.insert(hash, origin.to_string());
        self.order.push(hash);
        self.stats.structs += 1;
        Ok(())
    }

    // ==========================================================================
    // Stage 2: Members
    // ==========================================================================

    fn resolve_type(
        &self,
        origin: &str,
        name: &str,
        context: &dyn Fn() -> String,
    ) -> Result<ScriptType, WhitelistError> {
        if let Some(builtin) = ScriptType::builtin(name) {
            return Ok(builtin);
        }
        self.names
            .get(name)
            .map(|hash| ScriptType::Struct(*hash))
            .ok_or_else(|| {
                self.error(
                    origin,
                    WhitelistErrorKind::UnknownType {
                        name: name.to_string(),
                        context: context(),
                    },
                )
            })
    }

    fn resolve_struct(
        &self,
        origin: &str,
        name: &str,
        context: &dyn Fn() -> String,
    ) -> Result<TypeHash, WhitelistError> {
        match self.resolve_type(origin, name, context)? {
            ScriptType::Struct(hash) => Ok(hash),
            _ => Err(self.error(
                origin,
                WhitelistErrorKind::UnknownType {
                    name: name.to_string(),
                    context: context(),
                },
            )),
        }
    }

    fn resolve_params(
        &self,
        origin: &str,
        params: &[String],
        context: &dyn Fn() -> String,
    ) -> Result<Vec<ScriptType>, WhitelistError> {
        params
            .iter()
            .map(|param| match self.resolve_type(origin, param, context)? {
                ScriptType::Void => Err(self.error(
                    origin,
                    WhitelistErrorKind::Malformed(format!("void parameter in {}", context())),
                )),
                ty => Ok(ty),
            })
            .collect()
    }

    #[cfg_attr(feature = "profiling", profiling::function)]
    fn register_members(
        &mut self,
        origin: &str,
        class: &WhitelistClass,
    ) -> Result<(), WhitelistError> {
        let hash = TypeHash::from_name(&class.name);
        let owner_name = self.name_of(hash);
        let is_interface = class.kind == TypeKind::Interface;

        // Parents
        let superclass = match &class.superclass {
            Some(parent) => {
                let context = || format!("superclass of [{owner_name}]");
                let parent_hash = self.resolve_struct(origin, parent, &context)?;
                let reason = if is_interface {
                    Some("interfaces cannot have a superclass")
                } else if self.structs.get(&parent_hash).is_some_and(StructType::is_interface) {
                    Some("superclass is an interface")
                } else {
                    None
                };
                if let Some(reason) = reason {
                    return Err(self.error(
                        origin,
                        WhitelistErrorKind::InvalidParent {
                            name: owner_name.clone(),
                            parent: parent.clone(),
                            reason,
                        },
                    ));
                }
                Some(parent_hash)
            }
            None => None,
        };
        let mut interfaces = Vec::with_capacity(class.interfaces.len());
        for interface in &class.interfaces {
            let context = || format!("interfaces of [{owner_name}]");
            let interface_hash = self.resolve_struct(origin, interface, &context)?;
            if !self.structs.get(&interface_hash).is_some_and(StructType::is_interface) {
                return Err(self.error(
                    origin,
                    WhitelistErrorKind::InvalidParent {
                        name: owner_name.clone(),
                        parent: interface.clone(),
                        reason: "not an interface",
                    },
                ));
            }
            interfaces.push(interface_hash);
        }

        // Constructors
        let mut constructors = Vec::with_capacity(class.constructors.len());
        for ctor in &class.constructors {
            if is_interface {
                return Err(self.error(
                    origin,
                    WhitelistErrorKind::Malformed(format!(
                        "interface [{owner_name}] cannot declare constructors"
                    )),
                ));
            }
            let context = || format!("constructor [{owner_name}, <init>/{}]", ctor.params.len());
            let params = self.resolve_params(origin, &ctor.params, &context)?;
            constructors.push(ConstructorDescriptor {
                hash: TypeHash::from_constructor(hash, params.len()),
                owner: hash,
                params,
                native: ctor.native.clone(),
            });
        }

        // Methods
        let mut methods = Vec::with_capacity(class.methods.len());
        for method in &class.methods {
            let context = || {
                format!("method [{owner_name}, {}/{}]", method.name, method.params.len())
            };
            if !is_valid_type_name(&method.name) || method.name.contains('.') {
                let kind = WhitelistErrorKind::InvalidName(method.name.clone());
                return Err(self.error(origin, kind));
            }
            let params = self.resolve_params(origin, &method.params, &context)?;
            let return_type = self.resolve_type(origin, &method.returns, &context)?;
            let augmentation = match &method.augmented_by {
                Some(augmentation) => Some(self.resolve_struct(origin, augmentation, &context)?),
                None => None,
            };
            let member_hash = if method.is_static {
                TypeHash::from_static_method(hash, &method.name, params.len())
            } else {
                TypeHash::from_method(hash, &method.name, params.len())
            };
            let is_default = is_interface && method.is_default;
            let is_abstract =
                is_interface && !method.is_static && !is_default && augmentation.is_none();
            methods.push(MethodDescriptor {
                hash: member_hash,
                name: method.name.clone(),
                owner: hash,
                augmentation,
                params,
                return_type,
                is_static: method.is_static,
                is_abstract,
                is_default,
                native: method.native.clone(),
            });
        }

        // Fields
        let mut fields = Vec::with_capacity(class.fields.len());
        for field in &class.fields {
            let context = || format!("field [{owner_name}, {}]", field.name);
            let ty = match self.resolve_type(origin, &field.ty, &context)? {
                ScriptType::Void => {
                    return Err(self.error(
                        origin,
                        WhitelistErrorKind::Malformed(format!("void type in {}", context())),
                    ));
                }
                ty => ty,
            };
            fields.push(FieldDescriptor {
                hash: TypeHash::from_field(hash, &field.name),
                name: field.name.clone(),
                owner: hash,
                ty,
                is_static: field.is_static,
                is_final: field.is_final,
                getter: field.getter.clone(),
                setter: field.setter.clone(),
            });
        }

        let incompatible = |key: String, kind: &'static str| {
            WhitelistError::new(
                origin,
                WhitelistErrorKind::IncompatibleMember {
                    owner: owner_name.clone(),
                    key,
                    kind,
                },
            )
        };

        let Some(entry) = self.structs.get_mut(&hash) else {
            return Err(WhitelistError::new(
                origin,
                WhitelistErrorKind::UnknownType {
                    name: class.name.clone(),
                    context: "member registration".to_string(),
                },
            ));
        };

        if let Some(parent) = superclass {
            match entry.superclass {
                Some(existing) if existing != parent => {
                    return Err(WhitelistError::new(
                        origin,
                        WhitelistErrorKind::Malformed(format!(
                            "type [{owner_name}] redeclared with a different superclass"
                        )),
                    ));
                }
                _ => entry.superclass = Some(parent),
            }
        }
        for interface in interfaces {
            if !entry.interfaces.contains(&interface) {
                entry.interfaces.push(interface);
            }
        }

        for ctor in constructors {
            let arity = ctor.arity();
            match entry.constructors.get(&arity).cloned() {
                Some(existing) if !existing.same_signature(&ctor) => {
                    return Err(incompatible(format!("<init>/{arity}"), "constructor"));
                }
                Some(existing) if existing.native.is_some() || ctor.native.is_none() => {}
                _ => {
                    if !entry.constructors.contains_key(&arity) {
                        self.stats.constructors += 1;
                    }
                    entry.constructors.insert(arity, Arc::new(ctor));
                }
            }
        }

        for method in methods {
            let table = if method.is_static {
                &mut entry.static_methods
            } else {
                &mut entry.methods
            };
            let key = format!("{}/{}", method.name, method.arity());
            match table.get(&method.name, method.arity()).cloned() {
                Some(existing) if !existing.same_signature(&method) => {
                    return Err(incompatible(key, "method"));
                }
                Some(existing) if existing.native.is_some() || method.native.is_none() => {}
                Some(_) => table.replace(Arc::new(method)),
                None => {
                    table.replace(Arc::new(method));
                    self.stats.methods += 1;
                }
            }
        }

        for field in fields {
            let table = if field.is_static {
                &mut entry.static_fields
            } else {
                &mut entry.fields
            };
            match table.get(&field.name).cloned() {
                Some(existing) if !existing.same_signature(&field) => {
                    return Err(incompatible(field.name.clone(), "field"));
                }
                Some(_) => {}
                None => {
                    table.insert(field.name.clone(), Arc::new(field));
                    self.stats.fields += 1;
                }
            }
        }

        Ok(())
    }

    // ==========================================================================
    // Stage 3: Inheritance
    // ==========================================================================

    #[cfg_attr(feature = "profiling", profiling::function)]
    fn resolve_inheritance(&mut self) -> Result<(), WhitelistError> {
        let object = TypeHash::from_name(OBJECT_HOST_NAME);
        let has_object = self.structs.contains_key(&object);

        // Classes without a superclass extend the top-level object type.
        if has_object {
            for hash in &self.order {
                if *hash == object {
                    continue;
                }
                if let Some(entry) = self.structs.get_mut(hash) {
                    if !entry.is_interface() && entry.superclass.is_none() {
                        entry.superclass = Some(object);
                    }
                }
            }
        }

        self.check_cycles()?;

        let order = self.order.clone();
        for hash in &order {
            let ancestry = self.linearize(*hash, has_object.then_some(object));
            if let Some(entry) = self.structs.get_mut(hash) {
                entry.ancestry = ancestry;
            }
        }

        self.copy_down(&order);
        Ok(())
    }

    fn check_cycles(&self) -> Result<(), WhitelistError> {
        let mut graph: DiGraph<TypeHash, ()> = DiGraph::new();
        let mut nodes: FxHashMap<TypeHash, NodeIndex> = FxHashMap::default();
        for hash in &self.order {
            nodes.insert(*hash, graph.add_node(*hash));
        }
        for hash in &self.order {
            let Some(entry) = self.structs.get(hash) else {
                continue;
            };
            let child = nodes[hash];
            for parent in entry.superclass.iter().chain(entry.interfaces.iter()) {
                if let Some(parent_node) = nodes.get(parent) {
                    graph.add_edge(child, *parent_node, ());
                }
            }
        }

        toposort(&graph, None).map(|_| ()).map_err(|cycle| {
            let hash = graph[cycle.node_id()];
            self.error(
                self.origin_of(hash),
                WhitelistErrorKind::InheritanceCycle(self.name_of(hash)),
            )
        })
    }

    /// Superclass chain nearest-first, then interfaces reachable from the type and
    /// its superclasses in worklist order, without duplicates.
    fn linearize(&self, hash: TypeHash, object: Option<TypeHash>) -> Vec<TypeHash> {
        let mut ancestry = Vec::new();
        let mut chain = vec![hash];

        let mut cursor = self.structs.get(&hash).and_then(|s| s.superclass);
        while let Some(parent) = cursor {
            ancestry.push(parent);
            chain.push(parent);
            cursor = self.structs.get(&parent).and_then(|s| s.superclass);
        }

        let mut seen: FxHashSet<TypeHash> = ancestry.iter().copied().collect();
        seen.insert(hash);
        let mut worklist: VecDeque<TypeHash> = chain
            .iter()
            .filter_map(|h| self.structs.get(h))
            .flat_map(|s| s.interfaces.iter().copied())
            .collect();
        while let Some(interface) = worklist.pop_front() {
            if !seen.insert(interface) {
                continue;
            }
            ancestry.push(interface);
            if let Some(entry) = self.structs.get(&interface) {
                worklist.extend(entry.interfaces.iter().copied());
            }
        }

        if let Some(object) = object {
            if object != hash && !ancestry.contains(&object) {
                ancestry.push(object);
            }
        }
        ancestry
    }

    fn copy_down(&mut self, order: &[TypeHash]) {
        // Declared members only; copies must not cascade through intermediate types.
        let declared: FxHashMap<TypeHash, (MethodTable, Vec<Arc<FieldDescriptor>>)> = self
            .structs
            .iter()
            .map(|(hash, s)| {
                let mut fields: Vec<_> = s.fields.values().cloned().collect();
                fields.sort_by(|a, b| a.name.cmp(&b.name));
                (*hash, (s.methods.clone(), fields))
            })
            .collect();

        for hash in order {
            let Some(entry) = self.structs.get(hash) else {
                continue;
            };
            let ancestry = entry.ancestry.clone();
            let type_name = entry.name.clone();
            let mut copied = 0;
            let mut conflicts = Vec::new();
            let names: FxHashMap<TypeHash, String> = ancestry
                .iter()
                .map(|h| (*h, self.name_of(*h)))
                .chain(std::iter::once((*hash, type_name.clone())))
                .collect();
            let owner_name = |h: TypeHash| names.get(&h).cloned().unwrap_or_else(|| h.to_string());

            let Some(entry) = self.structs.get_mut(hash) else {
                continue;
            };
            for ancestor in &ancestry {
                let Some((methods, fields)) = declared.get(ancestor) else {
                    continue;
                };
                let mut inherited: Vec<_> = methods.iter().cloned().collect();
                inherited.sort_by(|a, b| (&a.name, a.arity()).cmp(&(&b.name, b.arity())));
                for method in inherited {
                    match entry.methods.insert(Arc::clone(&method)) {
                        Ok(()) => copied += 1,
                        Err(existing) if !existing.same_signature(&method) => {
                            conflicts.push(InheritanceConflict {
                                type_name: type_name.clone(),
                                member: format!("{}/{}", method.name, method.arity()),
                                kept: owner_name(existing.owner),
                                dropped: owner_name(method.owner),
                            });
                        }
                        Err(_) => {}
                    }
                }
                for field in fields {
                    match entry.fields.get(&field.name) {
                        None => {
                            entry.fields.insert(field.name.clone(), Arc::clone(field));
                            copied += 1;
                        }
                        Some(existing) if !existing.same_signature(field) => {
                            conflicts.push(InheritanceConflict {
                                type_name: type_name.clone(),
                                member: field.name.clone(),
                                kept: owner_name(existing.owner),
                                dropped: owner_name(field.owner),
                            });
                        }
                        Some(_) => {}
                    }
                }
            }
            self.stats.inherited += copied;
            self.conflicts.extend(conflicts);
        }
    }

    // ==========================================================================
    // Stage 4: Derivation
    // ==========================================================================

    #[cfg_attr(feature = "profiling", profiling::function)]
    fn derive(&mut self) -> Result<(), WhitelistError> {
        let object_keys: FxHashSet<(String, usize)> = self
            .structs
            .get(&TypeHash::from_name(OBJECT_HOST_NAME))
            .map(|object| {
                object
                    .methods
                    .iter()
                    .map(|m| (m.name.clone(), m.arity()))
                    .collect()
            })
            .unwrap_or_default();

        let order = self.order.clone();
        for hash in &order {
            let origin = self.origin_of(*hash).to_string();
            let Some(entry) = self.structs.get_mut(hash) else {
                continue;
            };

            let mut methods: Vec<_> = entry.methods.iter().cloned().collect();
            methods.sort_by(|a, b| (&a.name, a.arity()).cmp(&(&b.name, b.arity())));

            for method in &methods {
                if method.arity() == 0 && !method.return_type.is_void() {
                    let property = property_name(&method.name, "get")
                        .or_else(|| property_name(&method.name, "is"));
                    if let Some(property) = property {
                        entry.getters.entry(property).or_insert_with(|| Arc::clone(method));
                    }
                } else if method.arity() == 1 {
                    if let Some(property) = property_name(&method.name, "set") {
                        entry.setters.entry(property).or_insert_with(|| Arc::clone(method));
                    }
                }
            }

            if entry.is_interface() || entry.marked_functional {
                let qualifying: Vec<_> = methods
                    .iter()
                    .filter(|m| {
                        m.is_abstract
                            && !m.is_static
                            && !m.is_default
                            && !object_keys.contains(&(m.name.clone(), m.arity()))
                    })
                    .collect();
                if entry.marked_functional && qualifying.len() != 1 {
                    return Err(WhitelistError::new(
                        origin,
                        WhitelistErrorKind::NotFunctional {
                            name: entry.name.clone(),
                            found: qualifying.len(),
                        },
                    ));
                }
                if let [single] = qualifying.as_slice() {
                    entry.functional_method = Some(Arc::clone(single));
                    self.stats.functional += 1;
                }
            }
        }
        Ok(())
    }

    fn freeze(mut self) -> Catalog {
        self.conflicts
            .sort_by(|a, b| (&a.type_name, &a.member).cmp(&(&b.type_name, &b.member)));
        Catalog {
            structs: self.structs,
            names: self.names,
            conflicts: self.conflicts,
            stats: self.stats,
        }
    }
}

/// Property named by an accessor: `getScore` is `score`, `get_score` is `_score`.
pub fn property_name(method: &str, prefix: &str) -> Option<String> {
    let rest = method.strip_prefix(prefix)?;
    let mut chars = rest.chars();
    let first = chars.next()?;
    if !(first.is_ascii_uppercase() || first == '_') {
        return None;
    }
    let mut property = String::with_capacity(rest.len());
    property.push(first.to_ascii_lowercase());
    property.extend(chars);
    Some(property)
}

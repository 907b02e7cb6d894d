//! Whitelist descriptors.
//!
//! A [`Whitelist`] lists the host types a script may reach, each with the
//! constructors, methods and fields it exposes. Descriptors name types by script
//! name (`int`, `def`, `String`, `util.List`, ...); names are resolved when the
//! catalog is built, so declaration order within and across whitelists does not
//! matter.
//!
//! Whitelists are assembled through the builder API or loaded from TOML:
//!
//! ```toml
//! [[class]]
//! name = "util.Counter"
//!
//! [[class.constructor]]
//! params = ["int"]
//!
//! [[class.method]]
//! name = "increment"
//! returns = "int"
//! ```
//!
//! Native implementations can only be attached through the builder API.

use serde::Deserialize;

use sandscript_core::{NativeFn, VOID_TYPE_NAME, WhitelistError, WhitelistErrorKind};

/// Whether a host type is a concrete class or an interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeKind {
    #[default]
    Class,
    Interface,
}

/// A named set of host types.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Whitelist {
    /// Source identity attached to every error raised for this whitelist.
    #[serde(skip)]
    pub origin: String,
    #[serde(default, rename = "class")]
    pub classes: Vec<WhitelistClass>,
}

impl Whitelist {
    pub fn new(origin: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            classes: Vec::new(),
        }
    }

    /// Parse a TOML descriptor. `origin` names the source in errors.
    pub fn from_toml(origin: impl Into<String>, source: &str) -> Result<Self, WhitelistError> {
        let origin = origin.into();
        let mut whitelist: Whitelist = toml::from_str(source).map_err(|e| {
            WhitelistError::new(
                origin.clone(),
                WhitelistErrorKind::Malformed(e.to_string().trim_end().to_string()),
            )
        })?;
        whitelist.origin = origin;
        Ok(whitelist)
    }

    pub fn class(mut self, class: WhitelistClass) -> Self {
        self.classes.push(class);
        self
    }

    /// Mutable access to a declared class, for attaching natives after loading.
    pub fn class_mut(&mut self, name: &str) -> Option<&mut WhitelistClass> {
        self.classes.iter_mut().find(|c| c.name == name)
    }
}

/// One host type entry.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WhitelistClass {
    /// Full host name, dot separated.
    pub name: String,
    /// Register only the full name; the short name is not imported.
    #[serde(default)]
    pub no_import: bool,
    #[serde(default)]
    pub kind: TypeKind,
    /// Require exactly one qualifying abstract method.
    #[serde(default)]
    pub functional: bool,
    #[serde(default)]
    pub superclass: Option<String>,
    #[serde(default)]
    pub interfaces: Vec<String>,
    #[serde(default, rename = "constructor")]
    pub constructors: Vec<WhitelistConstructor>,
    #[serde(default, rename = "method")]
    pub methods: Vec<WhitelistMethod>,
    #[serde(default, rename = "field")]
    pub fields: Vec<WhitelistField>,
}

impl WhitelistClass {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn interface(name: impl Into<String>) -> Self {
        Self {
            kind: TypeKind::Interface,
            ..Self::new(name)
        }
    }

    pub fn no_import(mut self) -> Self {
        self.no_import = true;
        self
    }

    pub fn functional(mut self) -> Self {
        self.functional = true;
        self
    }

    pub fn extends(mut self, superclass: impl Into<String>) -> Self {
        self.superclass = Some(superclass.into());
        self
    }

    pub fn implements(mut self, interface: impl Into<String>) -> Self {
        self.interfaces.push(interface.into());
        self
    }

    pub fn constructor(mut self, constructor: WhitelistConstructor) -> Self {
        self.constructors.push(constructor);
        self
    }

    pub fn method(mut self, method: WhitelistMethod) -> Self {
        self.methods.push(method);
        self
    }

    pub fn field(mut self, field: WhitelistField) -> Self {
        self.fields.push(field);
        self
    }

    /// Attach a native to the instance or static method `(name, arity)`.
    pub fn bind_method(&mut self, name: &str, arity: usize, native: NativeFn) -> bool {
        match self
            .methods
            .iter_mut()
            .find(|m| m.name == name && m.params.len() == arity)
        {
            Some(method) => {
                method.native = Some(native);
                true
            }
            None => false,
        }
    }

    /// Attach a native to the constructor taking `arity` arguments.
    pub fn bind_constructor(&mut self, arity: usize, native: NativeFn) -> bool {
        match self.constructors.iter_mut().find(|c| c.params.len() == arity) {
            Some(ctor) => {
                ctor.native = Some(native);
                true
            }
            None => false,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WhitelistConstructor {
    #[serde(default)]
    pub params: Vec<String>,
    #[serde(skip)]
    pub native: Option<NativeFn>,
}

impl WhitelistConstructor {
    pub fn new<S: Into<String>>(params: impl IntoIterator<Item = S>) -> Self {
        Self {
            params: params.into_iter().map(Into::into).collect(),
            native: None,
        }
    }

    pub fn native(mut self, native: NativeFn) -> Self {
        self.native = Some(native);
        self
    }
}

fn void_name() -> String {
    VOID_TYPE_NAME.to_string()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WhitelistMethod {
    pub name: String,
    #[serde(default)]
    pub params: Vec<String>,
    #[serde(default = "void_name")]
    pub returns: String,
    #[serde(default, rename = "static")]
    pub is_static: bool,
    /// Interface method with a default body; never abstract.
    #[serde(default, rename = "default")]
    pub is_default: bool,
    /// Extension method implemented by a static function of this type.
    #[serde(default)]
    pub augmented_by: Option<String>,
    #[serde(skip)]
    pub native: Option<NativeFn>,
}

impl WhitelistMethod {
    pub fn new<S: Into<String>>(
        name: impl Into<String>,
        params: impl IntoIterator<Item = S>,
        returns: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            params: params.into_iter().map(Into::into).collect(),
            returns: returns.into(),
            is_static: false,
            is_default: false,
            augmented_by: None,
            native: None,
        }
    }

    pub fn static_method<S: Into<String>>(
        name: impl Into<String>,
        params: impl IntoIterator<Item = S>,
        returns: impl Into<String>,
    ) -> Self {
        Self {
            is_static: true,
            ..Self::new(name, params, returns)
        }
    }

    pub fn default_method(mut self) -> Self {
        self.is_default = true;
        self
    }

    pub fn augmented_by(mut self, augmentation: impl Into<String>) -> Self {
        self.augmented_by = Some(augmentation.into());
        self
    }

    pub fn native(mut self, native: NativeFn) -> Self {
        self.native = Some(native);
        self
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WhitelistField {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
    #[serde(default, rename = "static")]
    pub is_static: bool,
    #[serde(default, rename = "final")]
    pub is_final: bool,
    #[serde(skip)]
    pub getter: Option<NativeFn>,
    #[serde(skip)]
    pub setter: Option<NativeFn>,
}

impl WhitelistField {
    pub fn new(name: impl Into<String>, ty: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ty: ty.into(),
            is_static: false,
            is_final: false,
            getter: None,
            setter: None,
        }
    }

    pub fn static_field(mut self) -> Self {
        self.is_static = true;
        self
    }

    pub fn final_field(mut self) -> Self {
        self.is_final = true;
        self
    }

    pub fn getter(mut self, getter: NativeFn) -> Self {
        self.getter = Some(getter);
        self
    }

    pub fn setter(mut self, setter: NativeFn) -> Self {
        self.setter = Some(setter);
        self
    }
}

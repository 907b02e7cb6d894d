//! Whitelist-driven type catalog.
//!
//! The catalog is the single authority for which host types, constructors, methods
//! and fields a script may use. It is built once from [`Whitelist`] descriptors,
//! frozen, and shared read-only by every compilation.
//!
//! ```
//! use sandscript_catalog::{Catalog, Whitelist, WhitelistClass, WhitelistMethod};
//!
//! let catalog = Catalog::build([Whitelist::new("example").class(
//!     WhitelistClass::new("util.Counter")
//!         .method(WhitelistMethod::new("getCount", Vec::<String>::new(), "int")),
//! )])
//! .unwrap();
//!
//! let counter = catalog.lookup_struct_by_name("Counter").unwrap();
//! assert!(counter.getters.contains_key("count"));
//! ```

mod base;
mod builder;
mod catalog;
mod descriptor;
mod entries;

pub use base::{BASE_ORIGIN, base_whitelist};
pub use builder::{CatalogBuilder, is_valid_type_name, property_name};
pub use catalog::Catalog;
pub use descriptor::{
    TypeKind, Whitelist, WhitelistClass, WhitelistConstructor, WhitelistField, WhitelistMethod,
};
pub use entries::{
    BuildStats, ConstructorDescriptor, FieldDescriptor, InheritanceConflict, MethodDescriptor,
    MethodKey, MethodTable, StructType,
};

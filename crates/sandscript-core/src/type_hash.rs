//! Deterministic hash-based identity for host types and their members.
//!
//! [`TypeHash`] is a 64-bit hash that identifies a host type, a method overload,
//! a constructor, or a script-local function. Hashes are computed from host names
//! and `(name, arity)` overload keys, so:
//!
//! - The identity of a type is known before the type is registered (forward references)
//! - Registration order never changes identities
//! - A whitelist can be rebuilt on configuration reload and keep the same identities
//!
//! # Domains
//!
//! Uses XXHash64 with domain-specific mixing constants so that a type, a method and a
//! constructor sharing the same name never collide.
//!
//! # Examples
//!
//! ```
//! use sandscript_core::TypeHash;
//!
//! let list = TypeHash::from_name("util.List");
//! assert_eq!(list, TypeHash::from_name("util.List"));
//!
//! // Overloads are keyed by arity, not by parameter types
//! let get1 = TypeHash::from_method(list, "get", 1);
//! let get2 = TypeHash::from_method(list, "get", 2);
//! assert_ne!(get1, get2);
//! ```

use std::fmt;

use xxhash_rust::xxh64::xxh64;

/// Seeds that keep the identity domains apart.
pub mod hash_constants {
    /// Separator constant used when folding arity into a member hash.
    pub const SEP: u64 = 0x9e3779b97f4a7c15;

    /// Domain marker for type hashes.
    pub const TYPE: u64 = 0x51a7c0de0b5e55ed;

    /// Domain marker for script-local function hashes.
    pub const FUNCTION: u64 = 0x6c8e9cf570932bd5;

    /// Domain marker for instance method hashes.
    pub const METHOD: u64 = 0xd1b54a32d192ed03;

    /// Domain marker for static method hashes.
    pub const STATIC: u64 = 0xaf251af3b0f025b5;

    /// Domain marker for constructor hashes.
    pub const CONSTRUCTOR: u64 = 0xe7037ed1a0b428db;

    /// Domain marker for field hashes.
    pub const FIELD: u64 = 0x8ebc6af09c88c6e3;
}

/// A deterministic 64-bit hash identifying a host type or one of its members.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct TypeHash(pub u64);

impl TypeHash {
    /// Identity of nothing; never produced by the constructors below.
    pub const EMPTY: TypeHash = TypeHash(0);

    /// Create a type hash from a host type name.
    #[inline]
    pub fn from_name(name: &str) -> Self {
        TypeHash(hash_constants::TYPE ^ xxh64(name.as_bytes(), 0))
    }

    /// Create a hash for an instance method overload `(name, arity)` of `owner`.
    #[inline]
    pub fn from_method(owner: TypeHash, name: &str, arity: usize) -> Self {
        Self::fold_arity(hash_constants::METHOD ^ owner.0 ^ xxh64(name.as_bytes(), 0), arity)
    }

    /// Create a hash for a static method overload `(name, arity)` of `owner`.
    #[inline]
    pub fn from_static_method(owner: TypeHash, name: &str, arity: usize) -> Self {
        Self::fold_arity(hash_constants::STATIC ^ owner.0 ^ xxh64(name.as_bytes(), 0), arity)
    }

    /// Create a hash for the constructor of `owner` taking `arity` arguments.
    #[inline]
    pub fn from_constructor(owner: TypeHash, arity: usize) -> Self {
        Self::fold_arity(hash_constants::CONSTRUCTOR ^ owner.0, arity)
    }

    /// Create a hash for a field of `owner`.
    #[inline]
    pub fn from_field(owner: TypeHash, name: &str) -> Self {
        TypeHash(hash_constants::FIELD ^ owner.0 ^ xxh64(name.as_bytes(), 0))
    }

    /// Create a hash for a script-local function `(name, arity)`.
    #[inline]
    pub fn from_function(name: &str, arity: usize) -> Self {
        Self::fold_arity(hash_constants::FUNCTION ^ xxh64(name.as_bytes(), 0), arity)
    }

    #[inline]
    fn fold_arity(seed: u64, arity: usize) -> Self {
        // wrapping_mul keeps arity 0 and the bare seed distinct
        TypeHash(
            seed.wrapping_mul(hash_constants::SEP)
                .wrapping_add(arity as u64 + 1),
        )
    }

    /// `true` for [`TypeHash::EMPTY`].
    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Raw 64-bit identity.
    #[inline]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for TypeHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TypeHash").field(&format_args!("{:016x}", self.0)).finish()
    }
}

impl fmt::Display for TypeHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:016x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_hash_deterministic() {
        assert_eq!(
            TypeHash::from_name("lang.String"),
            TypeHash::from_name("lang.String")
        );
        assert_ne!(
            TypeHash::from_name("lang.String"),
            TypeHash::from_name("lang.Integer")
        );
    }

    #[test]
    fn method_hash_keyed_by_arity() {
        let owner = TypeHash::from_name("util.Map");
        assert_eq!(
            TypeHash::from_method(owner, "get", 1),
            TypeHash::from_method(owner, "get", 1)
        );
        assert_ne!(
            TypeHash::from_method(owner, "get", 1),
            TypeHash::from_method(owner, "get", 2)
        );
    }

    #[test]
    fn domains_do_not_collide() {
        let owner = TypeHash::from_name("lang.Math");
        let instance = TypeHash::from_method(owner, "max", 2);
        let statik = TypeHash::from_static_method(owner, "max", 2);
        let ctor = TypeHash::from_constructor(owner, 2);
        let local = TypeHash::from_function("max", 2);
        assert_ne!(instance, statik);
        assert_ne!(instance, ctor);
        assert_ne!(statik, local);
        assert_ne!(ctor, local);
    }

    #[test]
    fn owner_changes_method_hash() {
        let a = TypeHash::from_method(TypeHash::from_name("A"), "m", 0);
        let b = TypeHash::from_method(TypeHash::from_name("B"), "m", 0);
        assert_ne!(a, b);
    }

    #[test]
    fn named_hashes_are_never_empty() {
        assert!(TypeHash::EMPTY.is_empty());
        assert!(!TypeHash::from_name("").is_empty());
        assert!(!TypeHash::from_name("lang.Object").is_empty());
    }

    #[test]
    fn formats_as_padded_hex() {
        let hash = TypeHash(0xbeef);
        assert_eq!(hash.to_string(), "#000000000000beef");
        assert_eq!(format!("{hash:?}"), "TypeHash(000000000000beef)");
    }
}

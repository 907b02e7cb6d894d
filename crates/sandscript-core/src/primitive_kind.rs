//! Primitive value kinds and their boxed host counterparts.

use std::fmt;

use crate::TypeHash;

/// Primitive type kinds.
///
/// Every primitive has a boxed host counterpart registered by the base whitelist;
/// the dynamic type stores primitives in their boxed representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PrimitiveKind {
    Bool,
    Byte,
    Short,
    Char,
    Int,
    Long,
    Float,
    Double,
}

impl PrimitiveKind {
    /// All primitive kinds, in declaration order.
    pub const ALL: [PrimitiveKind; 8] = [
        PrimitiveKind::Bool,
        PrimitiveKind::Byte,
        PrimitiveKind::Short,
        PrimitiveKind::Char,
        PrimitiveKind::Int,
        PrimitiveKind::Long,
        PrimitiveKind::Float,
        PrimitiveKind::Double,
    ];

    /// Script-visible name of this primitive.
    pub const fn name(self) -> &'static str {
        match self {
            PrimitiveKind::Bool => "boolean",
            PrimitiveKind::Byte => "byte",
            PrimitiveKind::Short => "short",
            PrimitiveKind::Char => "char",
            PrimitiveKind::Int => "int",
            PrimitiveKind::Long => "long",
            PrimitiveKind::Float => "float",
            PrimitiveKind::Double => "double",
        }
    }

    /// Host name of the boxed counterpart.
    pub const fn boxed_host_name(self) -> &'static str {
        match self {
            PrimitiveKind::Bool => "lang.Boolean",
            PrimitiveKind::Byte => "lang.Byte",
            PrimitiveKind::Short => "lang.Short",
            PrimitiveKind::Char => "lang.Character",
            PrimitiveKind::Int => "lang.Integer",
            PrimitiveKind::Long => "lang.Long",
            PrimitiveKind::Float => "lang.Float",
            PrimitiveKind::Double => "lang.Double",
        }
    }

    /// Identity of the boxed counterpart.
    pub fn boxed_hash(self) -> TypeHash {
        TypeHash::from_name(self.boxed_host_name())
    }

    /// Look up a primitive by its script name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    /// Find the primitive whose boxed counterpart has the given identity.
    pub fn from_boxed_hash(hash: TypeHash) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.boxed_hash() == hash)
    }

    /// Whether this is a numeric kind (everything except `boolean`).
    pub const fn is_numeric(self) -> bool {
        !matches!(self, PrimitiveKind::Bool)
    }

    /// Whether this is an integral kind.
    pub const fn is_integral(self) -> bool {
        matches!(
            self,
            PrimitiveKind::Byte
                | PrimitiveKind::Short
                | PrimitiveKind::Char
                | PrimitiveKind::Int
                | PrimitiveKind::Long
        )
    }

    /// Whether a value of `self` converts to `target` without loss of range.
    ///
    /// `byte → short → int → long → float → double`, and `char → int` onwards.
    /// Nothing widens into `char`, and `boolean` widens to nothing.
    pub fn widens_to(self, target: PrimitiveKind) -> bool {
        use PrimitiveKind::*;

        if self == target {
            return true;
        }
        match (self, target) {
            (Bool, _) | (_, Bool) | (_, Char) => false,
            (Char, Short) | (Char, Byte) => false,
            (Char, _) => Self::rank(target) >= Self::rank(Int),
            (from, to) => Self::rank(from) < Self::rank(to),
        }
    }

    fn rank(kind: PrimitiveKind) -> u8 {
        match kind {
            PrimitiveKind::Bool => 0,
            PrimitiveKind::Byte => 1,
            PrimitiveKind::Short => 2,
            PrimitiveKind::Char => 2,
            PrimitiveKind::Int => 3,
            PrimitiveKind::Long => 4,
            PrimitiveKind::Float => 5,
            PrimitiveKind::Double => 6,
        }
    }
}

impl fmt::Display for PrimitiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
